//! Spawning external stages and wiring their streams together.
//!
//! Every stage is parsed and resolved by [`plan`] before anything starts, so a bad
//! name or a syntax error never leaves processes behind. [`execute`] then starts the
//! stages left to right, connecting each stage's output to the next stage's input,
//! and waits for all of them. The status of the line is the status of the last stage.

use crate::command::{ExitCode, Redirections};
use crate::error::{Result, ShellError};
use crate::external;
use crate::io_adapters::OutputSink;
use crate::parser::{self, Stage};
use crate::state::ShellState;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

/// A stage whose command name resolved to an executable file.
#[derive(Debug, Clone)]
pub struct ResolvedStage {
    pub stage: Stage,
    pub program: PathBuf,
}

impl ResolvedStage {
    /// Resolve the command of an already parsed stage.
    pub fn resolve(stage: Stage, state: &ShellState) -> Result<Self> {
        let name = stage.name().ok_or(ShellError::EmptyCommand)?;
        let program = external::resolve(name, state)
            .ok_or_else(|| ShellError::CommandNotFound(name.to_string()))?;
        Ok(Self { stage, program })
    }

    fn name(&self) -> &str {
        self.stage.name().unwrap_or_default()
    }
}

/// Parse and resolve every stage text in order, stopping at the first failure.
pub fn plan(sources: &[&str], state: &ShellState) -> Result<Vec<ResolvedStage>> {
    sources
        .iter()
        .map(|source| {
            let stage =
                parser::parse_stage(source, |name| state.get_var(name), state.last_exit_code)?;
            ResolvedStage::resolve(stage, state)
        })
        .collect()
}

/// Run resolved stages as one pipeline and return the last stage's status.
///
/// Only the first stage's `<` and the last stage's `>`, `>>` and `2>` take effect; the
/// connections between stages are always pipes. When a stage fails to start, the
/// stages already running are killed and reaped before the error is returned.
pub fn execute(
    stages: &[ResolvedStage],
    state: &ShellState,
    out: &mut OutputSink,
    err: &mut OutputSink,
) -> Result<ExitCode> {
    if stages.is_empty() {
        return Ok(0);
    }
    let mut running = Running::default();
    if let Err(e) = running.spawn_all(stages, state, out, err) {
        running.abort();
        return Err(e);
    }
    running.finish(out, err)
}

#[derive(Default)]
struct Running {
    children: Vec<Child>,
    /// Output of the last stage when it has to be copied into the interpreter's sink.
    captured: Option<ChildStdout>,
    /// Error streams being collected for an in-memory sink.
    drains: Vec<JoinHandle<io::Result<Vec<u8>>>>,
}

impl Running {
    fn spawn_all(
        &mut self,
        stages: &[ResolvedStage],
        state: &ShellState,
        out: &OutputSink,
        err: &OutputSink,
    ) -> Result<()> {
        let last = stages.len() - 1;
        let mut upstream: Option<ChildStdout> = None;

        for (i, resolved) in stages.iter().enumerate() {
            let redirections = &resolved.stage.redirections;
            note_ignored_redirections(i, last, redirections);

            let stdin = match upstream.take() {
                Some(pipe) => Stdio::from(pipe),
                None => match &redirections.stdin {
                    Some(path) => Stdio::from(open_input(state, path)?),
                    None => Stdio::inherit(),
                },
            };

            let mut copy_stdout = false;
            let stdout = if i < last {
                Stdio::piped()
            } else if let Some(path) = &redirections.stdout {
                Stdio::from(open_output(state, path, redirections.append)?)
            } else {
                out.child_stdio().unwrap_or_else(|| {
                    copy_stdout = true;
                    Stdio::piped()
                })
            };

            let mut drain_stderr = false;
            let stderr = match &redirections.stderr {
                Some(path) if i == last => Stdio::from(open_output(state, path, false)?),
                _ => err.child_stdio().unwrap_or_else(|| {
                    drain_stderr = true;
                    Stdio::piped()
                }),
            };

            let mut cmd = Command::new(&resolved.program);
            cmd.args(resolved.stage.args())
                .env_clear()
                .envs(&state.vars)
                .current_dir(&state.current_dir)
                .stdin(stdin)
                .stdout(stdout)
                .stderr(stderr);
            set_arg0(&mut cmd, resolved.name());

            let mut child = cmd.spawn().map_err(|source| ShellError::Spawn {
                name: resolved.name().to_string(),
                source,
            })?;
            // The command still holds our copies of the pipe ends; release them so the
            // connected stages alone own the stream.
            drop(cmd);
            log::debug!("spawned stage {i} ({}) as pid {}", resolved.name(), child.id());

            if i < last {
                upstream = child.stdout.take();
            } else if copy_stdout {
                self.captured = child.stdout.take();
            }
            if drain_stderr {
                if let Some(pipe) = child.stderr.take() {
                    self.drains.push(drain(pipe));
                }
            }
            self.children.push(child);
        }
        Ok(())
    }

    fn finish(mut self, out: &mut OutputSink, err: &mut OutputSink) -> Result<ExitCode> {
        let copied = match self.captured.take() {
            Some(mut pipe) => io::copy(&mut pipe, out).map(drop),
            None => Ok(()),
        };

        let mut status = 0;
        let mut wait_error = None;
        for child in &mut self.children {
            match child.wait() {
                Ok(exit) => status = exit_code(exit),
                Err(e) => wait_error = Some(e),
            }
        }

        for handle in self.drains {
            match handle.join() {
                Ok(Ok(bytes)) => err.write_all(&bytes)?,
                Ok(Err(e)) => log::warn!("reading stage error output failed: {e}"),
                Err(_) => log::warn!("stage error reader panicked"),
            }
        }

        copied?;
        if let Some(e) = wait_error {
            return Err(e.into());
        }
        Ok(status)
    }

    fn abort(&mut self) {
        self.captured = None;
        for child in &mut self.children {
            if let Err(e) = child.kill() {
                log::debug!("kill {}: {e}", child.id());
            }
            let _ = child.wait();
        }
        for handle in self.drains.drain(..) {
            let _ = handle.join();
        }
    }
}

fn note_ignored_redirections(i: usize, last: usize, redirections: &Redirections) {
    if i > 0 && redirections.stdin.is_some() {
        log::debug!("stage {i}: '<' ignored, input comes from the previous stage");
    }
    if i < last && redirections.stdout.is_some() {
        log::debug!("stage {i}: output redirection ignored, output feeds the next stage");
    }
    if i < last && redirections.stderr.is_some() {
        log::debug!("stage {i}: '2>' ignored, only the last stage's errors are redirected");
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

/// Open a `<` target relative to the shell's working directory.
pub(crate) fn open_input(state: &ShellState, path: &Path) -> Result<File> {
    File::open(state.resolve_path(path)).map_err(|source| ShellError::Redirect {
        path: path.to_path_buf(),
        source,
    })
}

/// Open a `>`, `>>` or `2>` target relative to the shell's working directory.
pub(crate) fn open_output(state: &ShellState, path: &Path, append: bool) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(state.resolve_path(path))
        .map_err(|source| ShellError::Redirect {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(unix)]
fn set_arg0(cmd: &mut Command, name: &str) {
    use std::os::unix::process::CommandExt;
    cmd.arg0(name);
}

#[cfg(not(unix))]
fn set_arg0(_cmd: &mut Command, _name: &str) {}

fn exit_code(exit_status: ExitStatus) -> ExitCode {
    match exit_status.code() {
        Some(x) => x,
        None => terminated_by_signal(exit_status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}
