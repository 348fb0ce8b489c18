use std::fmt;

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{self, WaitStatus};
use nix::unistd::{self, Pid};
use tracing::{debug, warn};

use crate::error::{Result, ShellError};

/// Status of one pipeline stage as seen by the shell.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Status {
	Running,
	Exited(i32),
	Signaled(Signal),
	/// The child was collected by someone else and its status is unknown.
	Lost,
}

impl Status {
	pub fn is_failure(self) -> bool {
		match self {
			Status::Running | Status::Exited(0) => false,
			Status::Exited(_) | Status::Signaled(_) | Status::Lost => true,
		}
	}

	pub fn code(self) -> u8 {
		match self {
			Status::Running => 0,
			Status::Exited(code) => code as u8,
			Status::Signaled(sig) => 128u8.wrapping_add(sig as u8),
			Status::Lost => 1,
		}
	}
}

pub trait WaitStatusExt {
	fn terminal_status(self) -> Option<Status>;
}

impl WaitStatusExt for WaitStatus {
	fn terminal_status(self) -> Option<Status> {
		match self {
			WaitStatus::Exited(_, code) => Some(Status::Exited(code)),
			WaitStatus::Signaled(_, sig, _) => Some(Status::Signaled(sig)),
			_ => None,
		}
	}
}

/// Blocks until `pid` terminates.
fn wait_terminated(pid: Pid) -> Result<Status> {
	loop {
		match wait::waitpid(pid, None) {
			Ok(ws) => if let Some(status) = ws.terminal_status() {
				return Ok(status);
			},
			Err(Errno::EINTR) => {},
			Err(Errno::ECHILD) => return Ok(Status::Lost),
			Err(e) => return Err(ShellError::Wait(e)),
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Process {
	pub pid: Pid,
	pub status: Status,
}

/// The processes of one pipeline, in stage order.
#[derive(Debug)]
pub struct Job {
	processes: Vec<Process>,
}

impl Job {
	pub fn processes(&self) -> &[Process] {
		&self.processes
	}

	pub fn pids(&self) -> Vec<Pid> {
		self.processes.iter().map(|pr| pr.pid).collect()
	}

	/// The process whose output ends the pipeline.
	pub fn last_pid(&self) -> Pid {
		self.processes[self.processes.len() - 1].pid
	}

	pub fn is_done(&self) -> bool {
		self.processes.iter().all(|pr| pr.status != Status::Running)
	}

	/// Indices of the stages that did not exit with status 0.
	pub fn failed_stages(&self) -> Vec<usize> {
		self.processes.iter()
			.enumerate()
			.filter(|&(_, pr)| pr.status.is_failure())
			.map(|(i, _)| i)
			.collect()
	}

	/// 0 iff no stage failed, otherwise the status of the rightmost failed stage.
	pub fn code(&self) -> u8 {
		self.processes.iter()
			.rev()
			.find(|pr| pr.status.is_failure())
			.map_or(0, |pr| pr.status.code())
	}

	/// Collects every stage. All stages already run concurrently, so the
	/// order of the waits does not matter.
	pub fn wait(&mut self) -> Result<()> {
		for pr in self.processes.iter_mut().filter(|pr| pr.status == Status::Running) {
			pr.status = wait_terminated(pr.pid)?;
			debug!(pid = %pr.pid, status = ?pr.status, "stage finished");
		}
		Ok(())
	}
}

#[derive(Debug)]
pub struct JobBuilder {
	imp: Job,
}

impl JobBuilder {
	pub fn new(size_hint: usize) -> JobBuilder {
		JobBuilder {
			imp: Job { processes: Vec::with_capacity(size_hint) }
		}
	}

	/// Forks one stage, recording the child on the parent side.
	///
	/// The caller must keep the child to async-signal-safe calls until it
	/// replaces its image or exits.
	pub fn push_fork(&mut self) -> nix::Result<unistd::ForkResult> {
		let r = unsafe { unistd::fork() }?;
		if let unistd::ForkResult::Parent { child: pid } = r {
			self.imp.processes.push(Process { pid: pid, status: Status::Running });
		}
		Ok(r)
	}

	pub fn is_empty(&self) -> bool {
		self.imp.processes.is_empty()
	}

	/// Kills and reaps every stage launched so far.
	pub fn abort(mut self) {
		if self.is_empty() {
			return;
		}
		for pr in &mut self.imp.processes {
			if let Err(e) = signal::kill(pr.pid, Signal::SIGKILL) {
				warn!(pid = %pr.pid, error = %e, "cannot kill stage of aborted pipeline");
			}
			pr.status = wait_terminated(pr.pid).unwrap_or(Status::Lost);
		}
		warn!(stages = self.imp.processes.len(), "aborted partially launched pipeline");
	}

	pub fn build(self) -> Job {
		assert!(!self.imp.processes.is_empty());
		self.imp
	}
}

/// A pipeline left running; the reaper collects it when it ends.
#[derive(Debug)]
pub struct BackgroundJob {
	pub label: usize,
	pub job: Job,
}

impl BackgroundJob {
	pub fn pid(&self) -> Pid {
		self.job.last_pid()
	}
}

impl fmt::Display for BackgroundJob {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "[{}] {}", self.label, self.pid())
	}
}
