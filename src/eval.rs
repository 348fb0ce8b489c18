use std::convert::Infallible;
use std::ffi::CString;
use std::ptr;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::signal::{self, SigHandler, SigSet, SigmaskHow, Signal};
use nix::unistd::{self, ForkResult, Pid};
use tracing::debug;

use crate::builtin;
use crate::error::{Result, ShellError};
use crate::global;
use crate::job::{BackgroundJob, Job, JobBuilder};
use crate::parser;
use crate::reaper::ChildSignalGuard;
use crate::types::{Pipeline, Token};

/// Exit status of a stage whose program does not exist.
pub const STATUS_NOT_FOUND: i32 = 127;
/// Exit status of a stage that failed to start for any other reason.
pub const STATUS_CANNOT_EXEC: i32 = 126;

/// Argument vector of one stage, built in full before any fork: the
/// null-terminated pointer array handed to `execvp` as well as the strings
/// it points into, so the child does not allocate.
struct Argv {
	args: Vec<CString>,
	ptrs: Vec<*const libc::c_char>,
	diag_prefix: Vec<u8>,
}

impl Argv {
	fn new(stage: &[Token]) -> Result<Argv> {
		let args = stage.iter()
			.map(|&s| CString::new(s))
			.collect::<std::result::Result<Vec<CString>, _>>()?;
		// The pointers stay valid while `args` lives; moving a CString does
		// not move its heap buffer.
		let mut ptrs: Vec<*const libc::c_char> = args.iter().map(|a| a.as_ptr()).collect();
		ptrs.push(ptr::null());
		let mut diag_prefix = b"psh: ".to_vec();
		diag_prefix.extend_from_slice(stage[0]);
		diag_prefix.extend_from_slice(b": ");
		Ok(Argv { args: args, ptrs: ptrs, diag_prefix: diag_prefix })
	}
}

/// The data channels of one pipeline; channel `k` carries stage `k`'s
/// output to stage `k + 1`. Every end is closed when this is dropped.
struct Channels {
	pipes: Vec<(OwnedFd, OwnedFd)>,
}

impl Channels {
	fn open(count: usize) -> Result<Channels> {
		let pipes = (0 .. count)
			.map(|_| unistd::pipe2(OFlag::O_CLOEXEC))
			.collect::<nix::Result<Vec<_>>>()
			.map_err(ShellError::Pipe)?;
		Ok(Channels { pipes: pipes })
	}

	fn reader(&self, k: usize) -> RawFd {
		self.pipes[k].0.as_raw_fd()
	}

	fn writer(&self, k: usize) -> RawFd {
		self.pipes[k].1.as_raw_fd()
	}

	fn raw_ends(&self) -> Vec<RawFd> {
		self.pipes.iter().flat_map(|(r, w)| [r.as_raw_fd(), w.as_raw_fd()]).collect()
	}
}

/// How a child's standard streams are connected before exec.
struct Wiring<'a> {
	stdin: Option<RawFd>,
	stdout: Option<RawFd>,
	/// Closed in the child once the redirections are in place.
	close: &'a [RawFd],
	mask: &'a SigSet,
}

fn do_exec_stage(argv: &Argv, wiring: &Wiring) -> nix::Result<Infallible> {
	// An ignored disposition survives exec, and the Rust runtime ignores SIGPIPE.
	unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) }?;
	signal::pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(wiring.mask), None)?;
	if let Some(fd) = wiring.stdin {
		unistd::dup2(fd, libc::STDIN_FILENO)?;
	}
	if let Some(fd) = wiring.stdout {
		unistd::dup2(fd, libc::STDOUT_FILENO)?;
	}
	for &fd in wiring.close {
		unistd::close(fd)?;
	}
	unsafe { libc::execvp(argv.args[0].as_ptr(), argv.ptrs.as_ptr()) };
	Err(Errno::last())
}

// Runs in the forked child: only async-signal-safe calls from here on.
fn exec_stage(argv: &Argv, wiring: &Wiring) -> ! {
	let e = match do_exec_stage(argv, wiring) {
		Ok(never) => match never {},
		Err(e) => e,
	};
	let stderr = unsafe { BorrowedFd::borrow_raw(libc::STDERR_FILENO) };
	let _ = unistd::write(stderr, &argv.diag_prefix);
	let _ = unistd::write(stderr, e.desc().as_bytes());
	let _ = unistd::write(stderr, b"\n");
	let status = if e == Errno::ENOENT { STATUS_NOT_FOUND } else { STATUS_CANNOT_EXEC };
	unsafe { libc::_exit(status) }
}

/// Starts one process running `argv`, wired as described. The child never
/// returns from here.
fn launch(argv: &Argv, wiring: &Wiring, job_builder: &mut JobBuilder) -> nix::Result<Pid> {
	match job_builder.push_fork()? {
		ForkResult::Parent { child } => Ok(child),
		ForkResult::Child => exec_stage(argv, wiring),
	}
}

fn spawn_stages(pipeline: &Pipeline, mask: &SigSet, job_builder: &mut JobBuilder) -> Result<()> {
	let argvs = pipeline.stages().map(Argv::new).collect::<Result<Vec<Argv>>>()?;
	let n = argvs.len();
	let channels = Channels::open(n - 1)?;
	let all_ends = channels.raw_ends();

	for (k, argv) in argvs.iter().enumerate() {
		let wiring = Wiring {
			stdin: if k > 0 { Some(channels.reader(k - 1)) } else { None },
			stdout: if k + 1 < n { Some(channels.writer(k)) } else { None },
			close: &all_ends,
			mask: mask,
		};
		let pid = launch(argv, &wiring, job_builder).map_err(ShellError::Fork)?;
		debug!(stage = k, pid = %pid, "spawned stage");
	}
	drop(channels);
	Ok(())
}

#[derive(Debug)]
pub enum EvalResult {
	/// Nothing to run.
	Empty,
	/// The session should end with this status.
	Exit(u8),
	/// The line was rejected, or could not be launched.
	Failed(ShellError),
	/// A foreground pipeline ran to completion.
	Done(Job),
	/// A background pipeline was launched and left running.
	Running(BackgroundJob),
}

impl EvalResult {
	/// The status shown to the user: 0 iff the line succeeded.
	pub fn code(&self) -> u8 {
		match *self {
			EvalResult::Empty => 0,
			EvalResult::Exit(code) => code,
			EvalResult::Failed(ref e) => e.code(),
			EvalResult::Done(ref job) => job.code(),
			EvalResult::Running(_) => 0,
		}
	}
}

fn eval_pipeline(state: &mut global::State, pipeline: &Pipeline) -> Result<EvalResult> {
	if pipeline.stage_count() == 1 {
		let command = pipeline.stage(0);
		if let Some(builtin) = builtin::match_builtin(command[0]) {
			return builtin(state, &command[1 ..]);
		}
	}

	let guard = ChildSignalGuard::block()?;
	let mut job_builder = JobBuilder::new(pipeline.stage_count());
	if let Err(e) = spawn_stages(pipeline, guard.saved_mask(), &mut job_builder) {
		job_builder.abort();
		return Err(e);
	}
	let mut job = job_builder.build();

	if pipeline.is_background {
		let bg = BackgroundJob { label: state.next_label(), job: job };
		let mut stdout = io::stdout();
		let _ = writeln!(stdout, "{}", bg);
		let _ = stdout.flush();
		debug!(label = bg.label, pids = ?bg.job.pids(), "pipeline left in background");
		Ok(EvalResult::Running(bg))
	} else {
		job.wait()?;
		debug!(code = job.code(), failed = ?job.failed_stages(), "pipeline finished");
		Ok(EvalResult::Done(job))
	}
}

/// Runs one input line to completion (or into the background) and records
/// its status in `state`. Errors are reported on stderr here.
pub fn eval(state: &mut global::State, line: &[u8]) -> EvalResult {
	let r = parser::parse(line, &state.limits).and_then(|pipeline| match pipeline {
		Some(pipeline) => eval_pipeline(state, &pipeline),
		None => Ok(EvalResult::Empty),
	});
	let r = r.unwrap_or_else(|e| {
		let _ = writeln!(&mut io::stderr(), "psh: {}", e);
		EvalResult::Failed(e)
	});
	if let EvalResult::Empty = r {
		return r;
	}
	state.last_status = r.code();
	r
}
