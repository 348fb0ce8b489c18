use crate::config::Limits;

pub struct State {
	pub limits: Limits,
	/// Status of the most recent line that ran.
	pub last_status: u8,
	background_seq: usize,
}

impl State {
	pub fn new(limits: Limits) -> State {
		State { limits: limits, last_status: 0, background_seq: 0 }
	}

	/// Label for the next background launch, counting from 1.
	pub fn next_label(&mut self) -> usize {
		self.background_seq += 1;
		self.background_seq
	}
}
