//! Running out of descriptors while creating a pipeline's channels. The
//! descriptor limit is process-wide, so this runs without the test harness.

use std::fs;

use nix::errno::Errno;
use nix::sys::resource::{self, Resource};
use nix::sys::wait::{self, WaitPidFlag};
use nix::unistd::Pid;

use psh::config::Limits;
use psh::error::ShellError;
use psh::eval::{self, EvalResult};
use psh::global::State;

fn open_descriptors() -> usize {
	fs::read_dir("/proc/self/fd").unwrap().count()
}

fn wide_pipeline(stages: usize) -> Vec<u8> {
	let mut line = b"true".to_vec();
	for _ in 1 .. stages {
		line.extend_from_slice(b" | true");
	}
	line
}

fn channel_exhaustion_fails_cleanly() {
	let mut state = State::new(Limits::default());
	match eval::eval(&mut state, b"true | true") {
		EvalResult::Done(job) => assert_eq!(job.code(), 0),
		other => panic!("expected a finished job, got {:?}", other),
	}
	let before = open_descriptors();

	let (soft, hard) = resource::getrlimit(Resource::RLIMIT_NOFILE).unwrap();
	resource::setrlimit(Resource::RLIMIT_NOFILE, before as u64 + 4, hard).unwrap();
	let r = eval::eval(&mut state, &wide_pipeline(20));
	resource::setrlimit(Resource::RLIMIT_NOFILE, soft, hard).unwrap();

	match r {
		EvalResult::Failed(ref e @ ShellError::Pipe(Errno::EMFILE)) => assert_eq!(e.code(), 1),
		ref other => panic!("expected pipe creation to fail, got {:?}", other),
	}
	assert_eq!(r.code(), 1);
	assert_eq!(state.last_status, 1);

	// The channels made before the failure are closed and nothing was forked.
	assert_eq!(open_descriptors(), before);
	assert_eq!(wait::waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)), Err(Errno::ECHILD));

	// The session goes on.
	match eval::eval(&mut state, b"true | true | true") {
		EvalResult::Done(job) => {
			assert_eq!(job.processes().len(), 3);
			assert_eq!(job.code(), 0);
		},
		other => panic!("expected a finished job, got {:?}", other),
	}
	assert_eq!(state.last_status, 0);
	assert_eq!(open_descriptors(), before);
}

fn main() {
	channel_exhaustion_fails_cleanly();
	println!("test channel_exhaustion_fails_cleanly ... ok");
}
