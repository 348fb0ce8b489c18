//! Collection of terminated children that the shell does not wait for.
//!
//! The reaper runs as a `SIGCHLD` handler and drains every terminated child
//! with non-blocking waits. While the shell spawns a pipeline and waits for
//! it in the foreground, `SIGCHLD` stays blocked on the evaluating thread
//! through [`ChildSignalGuard`], so the explicit waits always see their own
//! children; signals that arrive meanwhile are delivered on unblock. The
//! mask is per thread, so evaluation must stay on a single thread.

use std::sync::atomic::{AtomicUsize, Ordering};

use nix::errno::Errno;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal};
use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::error::{Result, ShellError};

static REAPED: AtomicUsize = AtomicUsize::new(0);

/// Number of children collected by the reaper so far.
pub fn reaped() -> usize {
	REAPED.load(Ordering::Relaxed)
}

/// Collects every child that has already terminated and returns how many
/// there were. Never blocks.
pub fn reap() -> usize {
	let mut n = 0;
	loop {
		match wait::waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
			Ok(WaitStatus::StillAlive) => break,
			Ok(_) => n += 1,
			Err(Errno::EINTR) => {},
			// ECHILD: no children left at all
			Err(_) => break,
		}
	}
	REAPED.fetch_add(n, Ordering::Relaxed);
	n
}

extern "C" fn on_sigchld(_: libc::c_int) {
	let saved = Errno::last_raw();
	reap();
	Errno::set_raw(saved);
}

/// Installs the reaper as the process-wide `SIGCHLD` handler.
pub fn install() -> Result<()> {
	let action = SigAction::new(
		SigHandler::Handler(on_sigchld),
		SaFlags::SA_RESTART | SaFlags::SA_NOCLDSTOP,
		SigSet::empty());
	unsafe { signal::sigaction(Signal::SIGCHLD, &action) }.map_err(ShellError::Signal)?;
	Ok(())
}

/// Keeps `SIGCHLD` blocked on the current thread until dropped.
pub struct ChildSignalGuard {
	saved: SigSet,
}

impl ChildSignalGuard {
	pub fn block() -> Result<ChildSignalGuard> {
		let mut set = SigSet::empty();
		set.add(Signal::SIGCHLD);
		let mut saved = SigSet::empty();
		signal::pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&set), Some(&mut saved))
			.map_err(ShellError::Signal)?;
		Ok(ChildSignalGuard { saved: saved })
	}

	/// The mask in effect before blocking; children restore it before exec.
	pub fn saved_mask(&self) -> &SigSet {
		&self.saved
	}
}

impl Drop for ChildSignalGuard {
	fn drop(&mut self) {
		let _ = signal::pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&self.saved), None);
	}
}
