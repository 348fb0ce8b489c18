use std::io;
use std::process::ExitCode;
use io::{BufRead, IsTerminal, Write};

use clap::builder::RangedU64ValueParser;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use psh::config::{self, Limits};
use psh::eval::{self, EvalResult};
use psh::global;
use psh::reaper;

const PROMPT: &'static str = "psh";

#[derive(Debug, Parser)]
#[command(name = "psh", version, about = "A small shell that runs pipelines")]
struct Args {
	/// Run LINE and exit with its status
	#[arg(short = 'c', value_name = "LINE")]
	command: Option<String>,

	/// Largest number of tokens accepted on one line
	#[arg(long, env = "PSH_MAX_TOKENS", default_value_t = config::MAX_TOKENS,
		value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
	max_tokens: usize,

	/// Largest number of stages accepted in one pipeline
	#[arg(long, env = "PSH_MAX_STAGES", default_value_t = config::MAX_STAGES,
		value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
	max_stages: usize,
}

fn init_logging() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(io::stderr)
		.init();
}

fn prompt(stdout: &mut io::Stdout, last_status: u8) {
	let _ = if last_status == 0 {
		write!(stdout, "{}> ", PROMPT)
	} else {
		write!(stdout, "{} [{}]> ", PROMPT, last_status)
	};
	let _ = stdout.flush();
}

fn run_session(state: &mut global::State) -> u8 {
	let mut stdout = io::stdout();
	let stdin = io::stdin();
	let interactive = stdin.is_terminal();
	let mut stdin_locked = stdin.lock();
	loop {
		if interactive {
			prompt(&mut stdout, state.last_status);
		}
		let mut line: Vec<u8> = vec![];
		match stdin_locked.read_until(b'\n', &mut line) {
			Ok(0) => return state.last_status,
			Ok(_) => {},
			Err(e) => {
				error!(error = %e, "cannot read input");
				return 1;
			},
		}
		if let EvalResult::Exit(code) = eval::eval(state, &line) {
			return code;
		}
	}
}

fn main() -> ExitCode {
	let args = Args::parse();
	init_logging();

	if let Err(e) = reaper::install() {
		let _ = writeln!(&mut io::stderr(), "psh: {}", e);
	}
	let limits = Limits { max_tokens: args.max_tokens, max_stages: args.max_stages };
	let mut state = global::State::new(limits);

	let code = match args.command {
		Some(line) => eval::eval(&mut state, line.as_bytes()).code(),
		None => run_session(&mut state),
	};
	ExitCode::from(code)
}
