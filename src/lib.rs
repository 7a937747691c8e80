//! A small line-oriented command interpreter.
//!
//! Each input line is split into pipeline stages on `|`. A stage is tokenized with
//! shell-like quoting, `$NAME` and `$?` are expanded, and the `<`, `>`, `>>` and `2>`
//! operators are pulled out as redirections. A single stage naming a builtin runs
//! in-process; anything else is resolved on the search path and spawned, with the
//! stages of a pipeline connected by OS pipes.
//!
//! The main entry point is [`Interpreter`]: [`Interpreter::run_pipeline`] runs one
//! line and [`Interpreter::repl`] drives an interactive session with history and
//! tab completion.

pub mod builtin;
pub mod command;
pub mod completion;
pub mod config;
pub mod error;
pub mod expand;
mod external;
pub mod history;
mod interpreter;
mod io_adapters;
pub mod lexer;
pub mod logging;
pub mod parser;
pub mod pipeline;
pub mod state;

pub use command::{ExitCode, Outcome};
pub use interpreter::Interpreter;
pub use io_adapters::{MemWriter, OutputSink};
pub use state::ShellState;
