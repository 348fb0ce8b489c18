use crate::error::{Result, ShellError};
use crate::eval::EvalResult;
use crate::global;
use crate::types::Token;

pub type Builtin = fn(&mut global::State, &[Token]) -> Result<EvalResult>;

/// Reads a decimal integer of any length, optionally signed, modulo 256.
fn parse_status(arg: &[u8]) -> Option<u8> {
	let (negative, digits) = match arg.split_first() {
		Some((&b'-', rest)) => (true, rest),
		Some((&b'+', rest)) => (false, rest),
		_ => (false, arg),
	};
	if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
		return None;
	}
	let n = digits.iter().fold(0u8, |acc, &d| acc.wrapping_mul(10).wrapping_add(d - b'0'));
	Some(if negative { n.wrapping_neg() } else { n })
}

pub fn builtin_exit(state: &mut global::State, args: &[Token]) -> Result<EvalResult> {
	let usage = |message: &str| ShellError::Usage { builtin: "exit", message: message.to_string() };
	match args {
		[] => Ok(EvalResult::Exit(state.last_status)),
		[code] => parse_status(code)
			.map(EvalResult::Exit)
			.ok_or_else(|| usage("numeric argument required")),
		_ => Err(usage("too many arguments")),
	}
}

pub fn match_builtin(name: &[u8]) -> Option<Builtin> {
	match name {
		b"exit" => Some(builtin_exit),
		_ => None,
	}
}
