//! Pipeline execution core of `psh`.
//!
//! A line is split into tokens ([`parser`]), planned into stages joined by
//! `|`, and launched as one process per stage with pipes between
//! neighbours ([`eval`]). Foreground pipelines are waited for and their
//! stage statuses folded into one code ([`job`]); background pipelines are
//! left to the [`reaper`].

pub mod builtin;
pub mod config;
pub mod error;
pub mod eval;
pub mod global;
pub mod job;
pub mod parser;
pub mod reaper;
pub mod types;
