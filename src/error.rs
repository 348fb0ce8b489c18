//! Errors raised in the shell process while planning or launching a line.
//!
//! Failures inside a forked child never surface here; they are reported by
//! the child itself and observed only through its exit status.

use std::ffi;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
	#[error("too many arguments (limit is {limit})")]
	TooManyTokens { limit: usize },
	#[error("too many pipeline stages (limit is {limit})")]
	TooManyStages { limit: usize },
	#[error("syntax error: empty command in pipeline stage {}", .stage + 1)]
	EmptyStage { stage: usize },
	#[error("cannot create pipe: {0}")]
	Pipe(#[source] nix::Error),
	#[error("cannot fork: {0}")]
	Fork(#[source] nix::Error),
	#[error("wait failed: {0}")]
	Wait(#[source] nix::Error),
	#[error("cannot set up signal handling: {0}")]
	Signal(#[source] nix::Error),
	#[error("{builtin}: {message}")]
	Usage { builtin: &'static str, message: String },
	/// Never produced for a parsed line: the tokenizer ends the line at the
	/// first nul byte. Building a `CString` still returns this error type.
	#[error("argument contains a nul byte: {0}")]
	Nul(#[from] ffi::NulError),
}

impl ShellError {
	/// Status reported to the caller for a line that failed with this error.
	pub fn code(&self) -> u8 {
		match *self {
			ShellError::EmptyStage { .. } | ShellError::Usage { .. } => 2,
			_ => 1,
		}
	}
}

pub type Result<T> = std::result::Result<T, ShellError>;
