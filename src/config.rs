//! Runtime configuration read from the environment at startup.

use crate::history;
use log::LevelFilter;
use std::env;
use std::path::PathBuf;

pub const HISTFILE_VAR: &str = "PIPESH_HISTFILE";
pub const LOG_VAR: &str = "PIPESH_LOG";
const DEFAULT_HISTFILE: &str = "~/.pipesh_history";

#[derive(Debug, Clone, PartialEq)]
pub struct ShellConfig {
    /// Where the line history is loaded from and saved to; `~` already expanded.
    pub history_file: PathBuf,
    pub history_limit: usize,
    pub log_level: LevelFilter,
}

impl ShellConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let histfile = lookup(HISTFILE_VAR)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_HISTFILE.to_string());
        let log_level = lookup(LOG_VAR)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(LevelFilter::Off);

        Self {
            history_file: PathBuf::from(shellexpand::tilde(&histfile).into_owned()),
            history_limit: history::DEFAULT_LIMIT,
            log_level,
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
