use std::path::PathBuf;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Status reported when a command name cannot be resolved.
pub const NOT_FOUND: ExitCode = 127;

/// Result of running a line, a stage or a builtin.
///
/// `exit` is the only command that produces [`Outcome::Exit`]; it travels up through
/// the executor and the read loop as an ordinary value instead of terminating the
/// process on the spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The command finished with this status.
    Code(ExitCode),
    /// The interpreter should terminate with this status.
    Exit(ExitCode),
}

impl Outcome {
    pub const SUCCESS: Outcome = Outcome::Code(0);
    pub const FAILURE: Outcome = Outcome::Code(1);

    /// Status code carried by either variant.
    pub fn code(self) -> ExitCode {
        match self {
            Outcome::Code(code) | Outcome::Exit(code) => code,
        }
    }
}

impl From<ExitCode> for Outcome {
    fn from(code: ExitCode) -> Self {
        Outcome::Code(code)
    }
}

/// Redirection targets collected from one stage.
///
/// At most one target of each kind is kept; a later operator of the same kind
/// replaces the earlier path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redirections {
    /// `< file`
    pub stdin: Option<PathBuf>,
    /// `> file` or `>> file`
    pub stdout: Option<PathBuf>,
    /// Set by `>>`, cleared by `>`.
    pub append: bool,
    /// `2> file`
    pub stderr: Option<PathBuf>,
}

impl Redirections {
    pub fn is_empty(&self) -> bool {
        self.stdin.is_none() && self.stdout.is_none() && self.stderr.is_none()
    }
}
