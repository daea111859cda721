//! Reusable core of an embeddable POSIX-subset shell evaluator.
//!
//! This crate takes the AST produced by `posh-parser` and runs it against a
//! host-supplied environment: command registry, open-file table, field
//! splitting, and the settings that govern error escalation and which
//! collaborators (file opener, `cd`) are consulted. It does not parse shell
//! source text itself — see [`posh_parser`] for that half of the pipeline.

mod commands;
mod env;
mod error;
mod executor;
mod expansion;
mod openfiles;
mod settings;

pub use commands::{Command, CommandRegistry, Env, NamedCommand};
pub use env::ExecEnv;
pub use error::{Error, ErrorKind};
pub use executor::Executor;
pub use expansion::{join_fields, split_fields};
pub use openfiles::{OpenFile, OpenFiles, STDERR_FD, STDIN_FD, STDOUT_FD};
pub use settings::{CdFn, OpenFlags, OpenFn, Settings};
