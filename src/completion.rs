//! Tab completion for the interactive loop.
//!
//! The first word of a stage completes to builtin names and executables found on
//! the search path; any other word completes to file system entries.

use crate::external;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

const WORD_BREAKS: &[char] = &[' ', '\t', '\n', ';', '|', '&', '<', '>'];

/// Editor helper holding what completion needs to know about the shell.
///
/// The interpreter refreshes it before every prompt, so `cd` and `export PATH=...`
/// are reflected on the next Tab press.
#[derive(Debug, Default, Clone)]
pub struct ShellHelper {
    pub builtins: Vec<&'static str>,
    pub path_var: String,
    pub cwd: PathBuf,
    /// Executable extensions, lower-cased; empty outside Windows.
    pub extensions: Vec<String>,
}

impl ShellHelper {
    pub fn new(builtins: Vec<&'static str>) -> Self {
        Self {
            builtins,
            ..Self::default()
        }
    }

    /// Completions for `prefix`, sorted and without duplicates.
    pub fn candidates(&self, prefix: &str, is_first_word: bool) -> Vec<String> {
        if is_first_word {
            command_candidates(prefix, &self.builtins, &self.path_var, &self.extensions)
        } else {
            path_candidates(prefix, &self.cwd)
        }
    }
}

/// Byte offset where the word under the cursor starts.
fn word_start(line: &str, pos: usize) -> usize {
    line[..pos]
        .rfind(WORD_BREAKS)
        .map(|i| i + 1)
        .unwrap_or(0)
}

fn starts_stage(before_word: &str) -> bool {
    let before_word = before_word.trim_end();
    before_word.is_empty() || before_word.ends_with('|')
}

pub fn command_candidates(
    prefix: &str,
    builtins: &[&str],
    path_var: &str,
    extensions: &[String],
) -> Vec<String> {
    let mut found: BTreeSet<String> = builtins
        .iter()
        .filter(|name| name.starts_with(prefix))
        .map(|name| name.to_string())
        .collect();

    for dir in std::env::split_paths(OsStr::new(path_var)) {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(prefix) || !has_executable_extension(&name, extensions) {
                continue;
            }
            if external::is_executable(&entry.path()) {
                found.insert(name);
            }
        }
    }
    found.into_iter().collect()
}

fn has_executable_extension(name: &str, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    let lower = name.to_lowercase();
    extensions.iter().any(|ext| lower.ends_with(ext.as_str()))
}

pub fn path_candidates(prefix: &str, cwd: &Path) -> Vec<String> {
    let (dir_part, file_part) = match prefix.rfind('/') {
        Some(i) => prefix.split_at(i + 1),
        None => ("", prefix),
    };
    let dir = if dir_part.is_empty() {
        cwd.to_path_buf()
    } else {
        cwd.join(shellexpand::tilde(dir_part).as_ref())
    };

    let Ok(entries) = fs::read_dir(&dir) else {
        return Vec::new();
    };
    let mut found: Vec<String> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(file_part) {
                return None;
            }
            let slash = if entry.path().is_dir() { "/" } else { "" };
            Some(format!("{dir_part}{name}{slash}"))
        })
        .collect();
    found.sort();
    found
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = word_start(line, pos);
        let prefix = &line[start..pos];
        let matches = self
            .candidates(prefix, starts_stage(&line[..start]))
            .into_iter()
            .map(|replacement| Pair {
                display: replacement.clone(),
                replacement,
            })
            .collect();
        Ok((start, matches))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}
