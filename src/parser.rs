//! Splitting a line into tokens and planning the pipeline stages.
//!
//! Tokens are separated by runs of spaces and tabs only; `|` and `&` are
//! operators only when they stand alone as a whole token.

use crate::config::Limits;
use crate::error::{Result, ShellError};
use crate::types::*;

struct Parser<'a> {
	line: &'a [u8],
	i: usize,
}

impl<'a> Parser<'a> {
	fn proceed_while<F>(&mut self, f: F) where F: Fn(u8) -> bool {
		while let Some(c) = self.line.get(self.i) {
			if !f(*c) { break; }
			self.i += 1;
		}
	}

	fn is_whitespace(c: u8) -> bool {
		match c {
			b' ' | b'\t' => true,
			_ => false,
		}
	}

	// The line ends at a newline or an embedded nul, whichever comes first.
	fn is_terminator(c: u8) -> bool {
		match c {
			b'\n' | b'\0' => true,
			_ => false,
		}
	}

	fn is_letter(c: u8) -> bool {
		!Parser::is_whitespace(c) && !Parser::is_terminator(c)
	}

	fn skip_whitespaces(&mut self) {
		self.proceed_while(Parser::is_whitespace);
	}

	fn read_word(&mut self) -> Token<'a> {
		let orig = self.i;
		self.proceed_while(Parser::is_letter);
		&self.line[orig .. self.i]
	}
}

/// Splits `line` into tokens borrowed from it.
///
/// A line with more than `max_tokens` tokens is rejected as a whole rather
/// than truncated.
pub fn tokenize<'a>(line: &'a [u8], max_tokens: usize) -> Result<Vec<Token<'a>>> {
	let mut parser: Parser<'a> = Parser { line: line, i: 0 };
	let mut tokens: Vec<Token<'a>> = vec![];
	loop {
		parser.skip_whitespaces();
		let word = parser.read_word();
		if word.is_empty() {
			break;
		}
		if tokens.len() == max_tokens {
			return Err(ShellError::TooManyTokens { limit: max_tokens });
		}
		tokens.push(word);
	}
	Ok(tokens)
}

/// Strips a trailing background marker and locates the pipe separators.
///
/// Every stage must hold at least one token; a separator at either end or
/// two adjacent separators make the whole line fail before anything runs.
pub fn plan<'a>(mut tokens: Vec<Token<'a>>, max_stages: usize) -> Result<Pipeline<'a>> {
	let is_background = tokens.last() == Some(&BACKGROUND);
	if is_background {
		tokens.pop();
	}

	let separators: Vec<usize> = tokens.iter()
		.enumerate()
		.filter(|&(_, &t)| t == PIPE)
		.map(|(i, _)| i)
		.collect();
	if separators.len() >= max_stages {
		return Err(ShellError::TooManyStages { limit: max_stages });
	}

	let pipeline = Pipeline { tokens: tokens, separators: separators, is_background: is_background };
	if let Some(stage) = (0 .. pipeline.stage_count()).find(|&k| pipeline.stage(k).is_empty()) {
		return Err(ShellError::EmptyStage { stage: stage });
	}
	Ok(pipeline)
}

/// Tokenizes and plans one line. A blank line yields `None`.
pub fn parse<'a>(line: &'a [u8], limits: &Limits) -> Result<Option<Pipeline<'a>>> {
	let tokens = tokenize(line, limits.max_tokens)?;
	if tokens.is_empty() {
		return Ok(None);
	}
	plan(tokens, limits.max_stages).map(Some)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::str;

	fn strs<'a>(tokens: &[Token<'a>]) -> Vec<&'a str> {
		tokens.iter().map(|t| str::from_utf8(t).unwrap()).collect()
	}

	fn words(line: &[u8]) -> Vec<&str> {
		strs(&tokenize(line, 64).unwrap())
	}

	#[test]
	fn splits_on_spaces_and_tabs() {
		assert_eq!(words(b"  ls\t-l   /tmp  "), vec!["ls", "-l", "/tmp"]);
	}

	#[test]
	fn blank_lines_have_no_tokens() {
		assert!(words(b"").is_empty());
		assert!(words(b" \t \n").is_empty());
		assert!(words(b"\n").is_empty());
	}

	#[test]
	fn newline_ends_the_line() {
		assert_eq!(words(b"echo a\necho b"), vec!["echo", "a"]);
		assert_eq!(words(b"echo a\0b"), vec!["echo", "a"]);
	}

	#[test]
	fn nul_bytes_never_reach_tokens() {
		let tokens = tokenize(b"a\0b c\0\0 d", 64).unwrap();
		assert_eq!(strs(&tokens), vec!["a"]);
		let tokens = tokenize(b"\0echo hi", 64).unwrap();
		assert!(tokens.is_empty());
		for line in [&b"x y\0z"[..], &b" \0"[..], &b"p | q\0| r"[..]] {
			assert!(tokenize(line, 64).unwrap().iter().all(|t| !t.contains(&0)));
		}
	}

	#[test]
	fn tokens_borrow_from_the_line() {
		let line = b"cat  file".to_vec();
		let tokens = tokenize(&line, 64).unwrap();
		assert_eq!(tokens[1].as_ptr(), line[5 ..].as_ptr());
	}

	#[test]
	fn operators_are_only_whole_tokens() {
		assert_eq!(words(b"a|b & c"), vec!["a|b", "&", "c"]);
	}

	#[test]
	fn too_many_tokens_is_rejected() {
		assert_eq!(tokenize(b"a b c", 3).unwrap().len(), 3);
		match tokenize(b"a b c d", 3) {
			Err(ShellError::TooManyTokens { limit: 3 }) => {},
			r => panic!("unexpected {:?}", r),
		}
	}

	fn planned(line: &[u8]) -> Pipeline {
		parse(line, &Limits::default()).unwrap().unwrap()
	}

	fn empty_stage(line: &[u8]) -> usize {
		match parse(line, &Limits::default()) {
			Err(ShellError::EmptyStage { stage }) => stage,
			r => panic!("unexpected {:?}", r),
		}
	}

	#[test]
	fn single_command_is_one_stage() {
		let p = planned(b"ls -l\n");
		assert_eq!(p.stage_count(), 1);
		assert!(p.separators.is_empty());
		assert!(!p.is_background);
		assert_eq!(strs(p.stage(0)), vec!["ls", "-l"]);
	}

	#[test]
	fn separators_split_stages() {
		let p = planned(b"printf x | grep y | wc -l");
		assert_eq!(p.separators, vec![2, 5]);
		assert_eq!(p.stage_count(), 3);
		assert_eq!(p.stage_range(1), 3 .. 5);
		let stages: Vec<Vec<&str>> = p.stages().map(strs).collect();
		assert_eq!(stages, vec![vec!["printf", "x"], vec!["grep", "y"], vec!["wc", "-l"]]);
	}

	#[test]
	fn trailing_ampersand_means_background() {
		let p = planned(b"sleep 1 &");
		assert!(p.is_background);
		assert_eq!(strs(&p.tokens), vec!["sleep", "1"]);

		let p = planned(b"echo a | cat &\n");
		assert!(p.is_background);
		assert_eq!(strs(p.stage(1)), vec!["cat"]);
	}

	#[test]
	fn inner_ampersand_is_an_argument() {
		let p = planned(b"echo & x");
		assert!(!p.is_background);
		assert_eq!(p.tokens.len(), 3);
	}

	#[test]
	fn empty_stages_are_rejected() {
		assert_eq!(empty_stage(b"| cat"), 0);
		assert_eq!(empty_stage(b"cat |"), 1);
		assert_eq!(empty_stage(b"cat | | wc"), 1);
		assert_eq!(empty_stage(b"|"), 0);
		assert_eq!(empty_stage(b"cat | &"), 1);
		assert_eq!(empty_stage(b"&"), 0);
	}

	#[test]
	fn blank_line_plans_nothing() {
		assert!(parse(b"   \n", &Limits::default()).unwrap().is_none());
	}

	#[test]
	fn too_many_stages_is_rejected() {
		let limits = Limits { max_tokens: 64, max_stages: 2 };
		assert!(parse(b"a | b", &limits).is_ok());
		match parse(b"a | b | c", &limits) {
			Err(ShellError::TooManyStages { limit: 2 }) => {},
			r => panic!("unexpected {:?}", r),
		}
	}
}
