/// Default upper bound on the number of tokens in one line.
pub const MAX_TOKENS: usize = 256;
/// Default upper bound on the number of stages in one pipeline.
pub const MAX_STAGES: usize = 64;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Limits {
	pub max_tokens: usize,
	pub max_stages: usize,
}

impl Default for Limits {
	fn default() -> Limits {
		Limits { max_tokens: MAX_TOKENS, max_stages: MAX_STAGES }
	}
}
