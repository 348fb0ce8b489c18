use std::ops::Range;

/// One argument of a command line, borrowed from the line buffer.
pub type Token<'a> = &'a [u8];

pub const PIPE: &'static [u8] = b"|";
pub const BACKGROUND: &'static [u8] = b"&";

/// A planned command line: the tokens with the background marker removed,
/// and the positions of the pipe separators among them.
#[derive(Debug, PartialEq, Eq)]
pub struct Pipeline<'a> {
	pub tokens: Vec<Token<'a>>,
	pub separators: Vec<usize>,
	pub is_background: bool,
}

impl<'a> Pipeline<'a> {
	pub fn stage_count(&self) -> usize {
		self.separators.len() + 1
	}

	/// Half-open token range of stage `k`, separators excluded.
	pub fn stage_range(&self, k: usize) -> Range<usize> {
		let start = if k == 0 { 0 } else { self.separators[k - 1] + 1 };
		let end = self.separators.get(k).map_or(self.tokens.len(), |&p| p);
		start .. end
	}

	pub fn stage(&self, k: usize) -> &[Token<'a>] {
		&self.tokens[self.stage_range(k)]
	}

	pub fn stages(&self) -> impl Iterator<Item = &[Token<'a>]> + '_ {
		(0 .. self.stage_count()).map(move |k| self.stage(k))
	}
}
