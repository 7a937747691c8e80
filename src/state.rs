use crate::command::ExitCode;
use crate::history::History;
use std::collections::HashMap;
use std::env as stdenv;
use std::path::{Path, PathBuf};

/// State shared by every line the interpreter runs.
///
/// The state contains:
/// - `vars`: the variables handed to spawned processes and consulted by `$NAME`.
/// - `current_dir`: the working directory for builtins, redirections and spawned processes.
/// - `last_exit_code`: status of the previous line, consulted by `$?`.
/// - `history`: lines entered so far, oldest first.
///
/// Only builtins and the interpreter loop mutate it, and never while a pipeline runs.
#[derive(Debug, Clone)]
pub struct ShellState {
    pub vars: HashMap<String, String>,
    pub current_dir: PathBuf,
    pub last_exit_code: ExitCode,
    pub history: History,
}

impl ShellState {
    /// Capture the current process environment and working directory.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::with_vars(stdenv::vars().collect(), current_dir)
    }

    /// Build a state from an explicit variable map, detached from the process environment.
    pub fn with_vars(vars: HashMap<String, String>, current_dir: PathBuf) -> Self {
        Self {
            vars,
            current_dir,
            last_exit_code: 0,
            history: History::default(),
        }
    }

    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    pub fn remove_var(&mut self, key: &str) -> Option<String> {
        self.vars.remove(key)
    }

    /// Resolve `path` against the shell's working directory.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.current_dir.join(path)
    }
}

impl Default for ShellState {
    fn default() -> Self {
        Self::new()
    }
}
