//! Command history kept by the shell and persisted as plain text, one line per entry.

use std::collections::VecDeque;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Number of entries kept in memory and on disk.
pub const DEFAULT_LIMIT: usize = 1000;

#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<String>,
    limit: usize,
}

impl History {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit,
        }
    }

    /// Append `line`, evicting the oldest entry when full.
    pub fn push(&mut self, line: impl Into<String>) {
        if self.limit == 0 {
            return;
        }
        if self.entries.len() == self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(line.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read entries from `path`, keeping only the most recent ones.
    ///
    /// A missing file is an empty history.
    pub fn load(&mut self, path: &Path) -> io::Result<()> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        for line in text.lines().filter(|l| !l.is_empty()) {
            self.push(line);
        }
        Ok(())
    }

    /// Overwrite `path` with the current entries, most recent last.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = io::BufWriter::new(fs::File::create(path)?);
        for entry in &self.entries {
            writeln!(file, "{entry}")?;
        }
        file.flush()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::with_limit(DEFAULT_LIMIT)
    }
}
