use crate::command::{Outcome, Redirections};
use crate::error::reason;
use crate::external;
use crate::io_adapters::OutputSink;
use crate::parser::Stage;
use crate::pipeline::open_output;
use crate::state::ShellState;
use anyhow::{Result, anyhow};
use argh::{EarlyExit, FromArgs};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

/// A command implemented inside the shell process.
///
/// The body runs against the shared state instead of a spawned child.
pub(crate) trait BuiltinCommand: Sized {
    /// Reserved name the command is dispatched under.
    fn name() -> &'static str;

    /// Build the command from the words after its name.
    ///
    /// Commands with options parse them with [`argh`]; the rest take their words
    /// verbatim, so `-1` or `help` are ordinary arguments for them.
    fn parse(args: &[&str]) -> std::result::Result<Self, EarlyExit>;

    /// Executes the command with the streams of its stage and the shell state.
    ///
    /// An error is reported on the stage's error stream and turns into status 1.
    fn execute(self, io: &mut Invocation<'_>, state: &mut ShellState) -> Result<Outcome>;
}

/// Streams a builtin writes to, already pointed at any redirection targets.
pub struct Invocation<'a> {
    pub stdout: &'a mut dyn Write,
    pub stderr: &'a mut dyn Write,
    /// The registry the builtin was dispatched from.
    pub builtins: &'a BuiltinRegistry,
}

/// Entry of the builtin table: arguments after the command name, streams, shell state.
pub type BuiltinHandler = fn(&[String], &mut Invocation<'_>, &mut ShellState) -> Outcome;

/// Table of reserved command names and their in-process handlers.
#[derive(Clone)]
pub struct BuiltinRegistry {
    handlers: BTreeMap<&'static str, BuiltinHandler>,
}

impl BuiltinRegistry {
    /// A registry without any builtin.
    pub fn empty() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Register (or replace) the handler for `name`.
    pub fn insert(&mut self, name: &'static str, handler: BuiltinHandler) -> &mut Self {
        self.handlers.insert(name, handler);
        self
    }

    pub(crate) fn register<T: BuiltinCommand>(&mut self) -> &mut Self {
        self.insert(T::name(), run::<T>)
    }

    pub fn get(&self, name: &str) -> Option<BuiltinHandler> {
        self.handlers.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }

    /// Run `stage` in-process if its command is a builtin.
    ///
    /// `>`, `>>` and `2>` are honored by opening the targets before the handler runs;
    /// `<` is ignored because no builtin reads its input. Returns `None` when the
    /// name is not registered.
    pub fn dispatch(
        &self,
        stage: &Stage,
        state: &mut ShellState,
        out: &mut OutputSink,
        err: &mut OutputSink,
    ) -> Option<Outcome> {
        let name = stage.name()?;
        let handler = self.get(name)?;
        Some(self.invoke(name, handler, stage.args(), &stage.redirections, state, out, err))
    }

    #[allow(clippy::too_many_arguments)]
    fn invoke(
        &self,
        name: &str,
        handler: BuiltinHandler,
        args: &[String],
        redirections: &Redirections,
        state: &mut ShellState,
        out: &mut OutputSink,
        err: &mut OutputSink,
    ) -> Outcome {
        if redirections.stdin.is_some() {
            log::debug!("{name}: input redirection ignored by builtin");
        }

        let mut stderr_file;
        let stderr: &mut dyn Write = match &redirections.stderr {
            Some(path) => match open_output(state, path, false) {
                Ok(file) => {
                    stderr_file = file;
                    &mut stderr_file
                }
                Err(e) => {
                    let _ = writeln!(err, "{name}: {e}");
                    return Outcome::FAILURE;
                }
            },
            None => err,
        };

        let mut stdout_file;
        let stdout: &mut dyn Write = match &redirections.stdout {
            Some(path) => match open_output(state, path, redirections.append) {
                Ok(file) => {
                    stdout_file = file;
                    &mut stdout_file
                }
                Err(e) => {
                    let _ = writeln!(stderr, "{name}: {e}");
                    return Outcome::FAILURE;
                }
            },
            None => out,
        };

        let mut io = Invocation {
            stdout,
            stderr,
            builtins: self,
        };
        let outcome = handler(args, &mut io, state);
        if let Err(e) = io.stdout.flush() {
            log::warn!("{name}: flushing output failed: {e}");
        }
        outcome
    }
}

impl Default for BuiltinRegistry {
    /// Create a registry with the shell's reserved names:
    /// `cd`, `pwd`, `echo`, `exit`, `export`, `unset`, `history`, `type`, `ls`, `cat`, `clear`.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register::<Cd>()
            .register::<Pwd>()
            .register::<Echo>()
            .register::<Exit>()
            .register::<Export>()
            .register::<Unset>()
            .register::<History>()
            .register::<Type>()
            .register::<Ls>()
            .register::<Cat>()
            .register::<Clear>();
        registry
    }
}

fn words(args: &[&str]) -> Vec<String> {
    args.iter().map(|w| w.to_string()).collect()
}

/// Parse `args` for `T` and run it, turning argument and execution errors into statuses.
fn run<T: BuiltinCommand>(args: &[String], io: &mut Invocation<'_>, state: &mut ShellState) -> Outcome {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let cmd = match T::parse(&args) {
        Ok(cmd) => cmd,
        Err(EarlyExit { output, status }) => {
            let (stream, outcome) = match status {
                Ok(()) => (&mut *io.stdout, Outcome::SUCCESS),
                Err(()) => (&mut *io.stderr, Outcome::FAILURE),
            };
            let _ = write!(stream, "{}", output);
            if !output.ends_with('\n') {
                let _ = writeln!(stream);
            }
            return outcome;
        }
    };
    match cmd.execute(io, state) {
        Ok(outcome) => outcome,
        Err(e) => {
            let _ = writeln!(io.stderr, "{e}");
            Outcome::FAILURE
        }
    }
}

/// Print the shell's working directory.
pub struct Pwd;

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn parse(_args: &[&str]) -> std::result::Result<Self, EarlyExit> {
        Ok(Pwd)
    }

    fn execute(self, io: &mut Invocation<'_>, state: &mut ShellState) -> Result<Outcome> {
        writeln!(io.stdout, "{}", state.current_dir.to_string_lossy())?;
        Ok(Outcome::SUCCESS)
    }
}

/// Change the shell's working directory (to $HOME without an argument).
///
/// Only [`ShellState::current_dir`] moves; the process working directory is left alone.
pub struct Cd {
    /// Target directory; `~` is expanded.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn parse(args: &[&str]) -> std::result::Result<Self, EarlyExit> {
        Ok(Cd {
            target: args.first().map(|t| t.to_string()),
        })
    }

    fn execute(self, _io: &mut Invocation<'_>, state: &mut ShellState) -> Result<Outcome> {
        let target = match self.target.filter(|t| !t.is_empty()) {
            Some(t) => shellexpand::tilde_with_context(&t, || state.get_var("HOME")).into_owned(),
            None => state
                .get_var("HOME")
                .ok_or_else(|| anyhow!("cd: HOME not set"))?,
        };

        let new_dir = state.resolve_path(&target);
        let canonical = fs::canonicalize(&new_dir)
            .map_err(|e| anyhow!("cd: {}: {}", target, reason(&e)))?;
        if !canonical.is_dir() {
            return Err(anyhow!("cd: {}: Not a directory", target));
        }

        state.current_dir = canonical;
        Ok(Outcome::SUCCESS)
    }
}

/// Exit the shell with the given status (0 by default).
pub struct Exit {
    /// Requested status; words after it are ignored.
    pub code: Option<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn parse(args: &[&str]) -> std::result::Result<Self, EarlyExit> {
        Ok(Exit {
            code: args.first().map(|c| c.to_string()),
        })
    }

    fn execute(self, _io: &mut Invocation<'_>, _state: &mut ShellState) -> Result<Outcome> {
        let code = match &self.code {
            Some(arg) => arg
                .parse()
                .map_err(|_| anyhow!("exit: {}: numeric argument required", arg))?,
            None => 0,
        };
        Ok(Outcome::Exit(code))
    }
}

/// Print the arguments joined by single spaces.
///
/// A leading `-n` drops the final newline; every other word is printed as is.
pub struct Echo {
    pub no_newline: bool,
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn parse(args: &[&str]) -> std::result::Result<Self, EarlyExit> {
        let (no_newline, words) = match args.split_first() {
            Some((&"-n", rest)) => (true, rest),
            _ => (false, args),
        };
        Ok(Echo {
            no_newline,
            args: words.iter().map(|w| w.to_string()).collect(),
        })
    }

    fn execute(self, io: &mut Invocation<'_>, _state: &mut ShellState) -> Result<Outcome> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(io.stdout, "{}", s)?;
        } else {
            writeln!(io.stdout, "{}", s)?;
        }
        Ok(Outcome::SUCCESS)
    }
}

/// Set shell variables passed to commands, as NAME=VALUE or NAME.
pub struct Export {
    /// A bare NAME that is unset becomes empty.
    pub assignments: Vec<String>,
}

impl BuiltinCommand for Export {
    fn name() -> &'static str {
        "export"
    }

    fn parse(args: &[&str]) -> std::result::Result<Self, EarlyExit> {
        Ok(Export {
            assignments: words(args),
        })
    }

    fn execute(self, _io: &mut Invocation<'_>, state: &mut ShellState) -> Result<Outcome> {
        for assignment in self.assignments {
            let (key, value) = match assignment.split_once('=') {
                Some((key, value)) => (key, Some(value)),
                None => (assignment.as_str(), None),
            };
            if key.is_empty() {
                return Err(anyhow!("export: `{}': not a valid identifier", assignment));
            }
            match value {
                Some(value) => state.set_var(key, value),
                None if state.get_var(key).is_none() => state.set_var(key, ""),
                None => {}
            }
        }
        Ok(Outcome::SUCCESS)
    }
}

/// Remove shell variables.
pub struct Unset {
    pub names: Vec<String>,
}

impl BuiltinCommand for Unset {
    fn name() -> &'static str {
        "unset"
    }

    fn parse(args: &[&str]) -> std::result::Result<Self, EarlyExit> {
        Ok(Unset { names: words(args) })
    }

    fn execute(self, _io: &mut Invocation<'_>, state: &mut ShellState) -> Result<Outcome> {
        for name in &self.names {
            state.remove_var(name);
        }
        Ok(Outcome::SUCCESS)
    }
}

/// Show the command history.
pub struct History;

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn parse(_args: &[&str]) -> std::result::Result<Self, EarlyExit> {
        Ok(History)
    }

    fn execute(self, io: &mut Invocation<'_>, state: &mut ShellState) -> Result<Outcome> {
        for (i, entry) in state.history.iter().enumerate() {
            writeln!(io.stdout, "{:5}  {}", i + 1, entry)?;
        }
        Ok(Outcome::SUCCESS)
    }
}

/// Tell how each name would be interpreted as a command.
pub struct Type {
    pub names: Vec<String>,
}

impl BuiltinCommand for Type {
    fn name() -> &'static str {
        "type"
    }

    fn parse(args: &[&str]) -> std::result::Result<Self, EarlyExit> {
        Ok(Type { names: words(args) })
    }

    fn execute(self, io: &mut Invocation<'_>, state: &mut ShellState) -> Result<Outcome> {
        if self.names.is_empty() {
            return Err(anyhow!("type: usage: type command"));
        }
        for name in &self.names {
            if io.builtins.contains(name) {
                writeln!(io.stdout, "{} is a shell builtin", name)?;
            } else if let Some(path) = external::resolve(name, state) {
                writeln!(io.stdout, "{} is {}", name, path.display())?;
            } else {
                return Err(anyhow!("type: {}: not found", name));
            }
        }
        Ok(Outcome::SUCCESS)
    }
}

#[derive(FromArgs)]
/// List directory contents.
pub struct Ls {
    #[argh(switch, short = 'a')]
    /// include entries whose names start with a dot.
    pub all: bool,

    #[argh(switch, short = 'l')]
    /// one entry per line with type and size.
    pub long: bool,

    #[argh(positional)]
    /// directory to list; only the first is used. Defaults to the current directory.
    pub paths: Vec<String>,
}

impl BuiltinCommand for Ls {
    fn name() -> &'static str {
        "ls"
    }

    fn parse(args: &[&str]) -> std::result::Result<Self, EarlyExit> {
        Ls::from_args(&[Self::name()], args)
    }

    fn execute(self, io: &mut Invocation<'_>, state: &mut ShellState) -> Result<Outcome> {
        let target = self.paths.first().map(String::as_str).unwrap_or(".");
        let dir = state.resolve_path(target);

        let mut entries = fs::read_dir(&dir)
            .and_then(|rd| {
                rd.map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
                    .collect::<std::io::Result<Vec<_>>>()
            })
            .map_err(|e| anyhow!("ls: {}: {}", target, reason(&e)))?;
        if !self.all {
            entries.retain(|e| !e.starts_with('.'));
        }
        entries.sort();

        if self.long {
            let lines: Vec<String> = entries
                .iter()
                .map(|entry| long_entry(&dir.join(entry), entry))
                .collect();
            writeln!(io.stdout, "{}", lines.join("\n"))?;
        } else {
            writeln!(io.stdout, "{}", entries.join("  "))?;
        }
        Ok(Outcome::SUCCESS)
    }
}

fn long_entry(path: &Path, name: &str) -> String {
    match fs::metadata(path) {
        Ok(meta) => {
            let kind = if meta.is_dir() { 'd' } else { '-' };
            format!("{}  {:>10}  {}", kind, meta.len(), name)
        }
        Err(_) => format!("-  {:>10}  {}", "?", name),
    }
}

/// Concatenate files to the output.
pub struct Cat {
    pub files: Vec<String>,
}

impl BuiltinCommand for Cat {
    fn name() -> &'static str {
        "cat"
    }

    fn parse(args: &[&str]) -> std::result::Result<Self, EarlyExit> {
        Ok(Cat { files: words(args) })
    }

    fn execute(self, io: &mut Invocation<'_>, state: &mut ShellState) -> Result<Outcome> {
        if self.files.is_empty() {
            return Err(anyhow!("cat: usage: cat file..."));
        }
        let mut contents = Vec::new();
        for fname in &self.files {
            let data = fs::read(state.resolve_path(fname))
                .map_err(|e| anyhow!("cat: {}: {}", fname, reason(&e)))?;
            contents.extend_from_slice(&data);
        }
        io.stdout.write_all(&contents)?;
        Ok(Outcome::SUCCESS)
    }
}

/// Clear the terminal screen.
pub struct Clear;

impl BuiltinCommand for Clear {
    fn name() -> &'static str {
        "clear"
    }

    fn parse(_args: &[&str]) -> std::result::Result<Self, EarlyExit> {
        Ok(Clear)
    }

    fn execute(self, io: &mut Invocation<'_>, _state: &mut ShellState) -> Result<Outcome> {
        write!(io.stdout, "\x1b[2J\x1b[H")?;
        Ok(Outcome::SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io_adapters::MemWriter;
    use crate::parser::parse_stage;
    use std::collections::HashMap;
    use std::env as stdenv;
    use std::path::PathBuf;

    fn state_in(dir: &std::path::Path) -> ShellState {
        ShellState::with_vars(HashMap::new(), dir.to_path_buf())
    }

    /// Run a builtin directly, returning (outcome, stdout, stderr).
    fn call(name: &str, args: &[&str], state: &mut ShellState) -> (Outcome, String, String) {
        let registry = BuiltinRegistry::default();
        let handler = registry.get(name).expect("registered builtin");
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let outcome = {
            let mut io = Invocation {
                stdout: &mut out,
                stderr: &mut err,
                builtins: &registry,
            };
            handler(&args, &mut io, state)
        };
        (
            outcome,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn test_registry_holds_reserved_names() {
        let registry = BuiltinRegistry::default();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(
            names,
            vec![
                "cat", "cd", "clear", "echo", "exit", "export", "history", "ls", "pwd", "type",
                "unset"
            ]
        );
        assert!(!registry.contains("grep"));
        assert!(BuiltinRegistry::empty().get("echo").is_none());
    }

    #[test]
    fn test_registry_accepts_custom_handlers() {
        fn hello(_: &[String], io: &mut Invocation<'_>, _: &mut ShellState) -> Outcome {
            let _ = writeln!(io.stdout, "hi");
            Outcome::Code(42)
        }
        let mut registry = BuiltinRegistry::empty();
        registry.insert("hello", hello);

        let mut state = ShellState::new();
        let stage = parse_stage("hello", |_| None, 0).unwrap();
        let (mw, buf) = MemWriter::with_handle();
        let mut out = OutputSink::Memory(mw);
        let mut err = OutputSink::Memory(MemWriter::new());
        let outcome = registry.dispatch(&stage, &mut state, &mut out, &mut err);
        assert_eq!(outcome, Some(Outcome::Code(42)));
        assert_eq!(buf.borrow().as_slice(), b"hi\n");

        let other = parse_stage("ls", |_| None, 0).unwrap();
        assert!(registry.dispatch(&other, &mut state, &mut out, &mut err).is_none());
    }

    #[test]
    fn test_pwd_prints_current_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_in(dir.path());
        let (outcome, out, _) = call("pwd", &[], &mut state);
        assert_eq!(outcome, Outcome::SUCCESS);
        assert_eq!(out, format!("{}\n", dir.path().to_string_lossy()));
    }

    #[test]
    fn test_echo_with_and_without_newline() {
        let mut state = ShellState::new();
        let (outcome, out, _) = call("echo", &["hello", "world"], &mut state);
        assert_eq!(outcome, Outcome::SUCCESS);
        assert_eq!(out, "hello world\n");

        let (_, out, _) = call("echo", &["-n", "foo", "bar"], &mut state);
        assert_eq!(out, "foo bar");

        let (_, out, _) = call("echo", &[], &mut state);
        assert_eq!(out, "\n");
    }

    #[test]
    fn test_echo_prints_option_like_words() {
        let mut state = ShellState::new();
        let (outcome, out, err) = call("echo", &["help"], &mut state);
        assert_eq!(outcome, Outcome::SUCCESS);
        assert_eq!(out, "help\n");
        assert!(err.is_empty());

        let (_, out, _) = call("echo", &["-e", "x"], &mut state);
        assert_eq!(out, "-e x\n");

        let (_, out, _) = call("echo", &["--help"], &mut state);
        assert_eq!(out, "--help\n");

        let (_, out, _) = call("echo", &["a", "-n"], &mut state);
        assert_eq!(out, "a -n\n");
    }

    #[test]
    fn test_unknown_flag_is_reported_on_stderr() {
        let mut state = ShellState::new();
        let (outcome, out, err) = call("ls", &["--bogus"], &mut state);
        assert_eq!(outcome, Outcome::FAILURE);
        assert!(out.is_empty());
        assert!(err.contains("--bogus"), "{err}");
    }

    #[test]
    fn test_help_goes_to_stdout() {
        let mut state = ShellState::new();
        let (outcome, out, _) = call("ls", &["--help"], &mut state);
        assert_eq!(outcome, Outcome::SUCCESS);
        assert!(out.contains("Usage: ls"), "{out}");
    }

    #[test]
    fn test_cd_to_absolute_path() {
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).expect("canonicalize failed");
        let orig = stdenv::current_dir().unwrap();

        let mut state = state_in(&orig);
        let target = canonical_temp.to_string_lossy().to_string();
        let (outcome, _, err) = call("cd", &[&target], &mut state);

        assert_eq!(outcome, Outcome::SUCCESS, "{err}");
        assert_eq!(state.current_dir, canonical_temp);
        assert_eq!(stdenv::current_dir().unwrap(), orig);
    }

    #[test]
    fn test_cd_into_directory_named_like_an_option() {
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();
        fs::create_dir(canonical_temp.join("help")).unwrap();

        let mut state = state_in(&canonical_temp);
        let (outcome, out, err) = call("cd", &["help"], &mut state);
        assert_eq!(outcome, Outcome::SUCCESS, "{err}");
        assert!(out.is_empty());
        assert_eq!(state.current_dir, canonical_temp.join("help"));
    }

    #[test]
    fn test_cd_to_home_when_none_and_tilde() {
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();
        fs::create_dir(canonical_temp.join("sub")).unwrap();
        let orig = stdenv::current_dir().unwrap();

        let mut state = state_in(&orig);
        state.set_var("HOME", canonical_temp.to_string_lossy().to_string());

        let (outcome, _, _) = call("cd", &[], &mut state);
        assert_eq!(outcome, Outcome::SUCCESS);
        assert_eq!(state.current_dir, canonical_temp);

        state.current_dir = orig.clone();
        let (outcome, _, _) = call("cd", &["~/sub"], &mut state);
        assert_eq!(outcome, Outcome::SUCCESS);
        assert_eq!(state.current_dir, canonical_temp.join("sub"));
    }

    #[test]
    fn test_cd_relative_to_state_dir() {
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();
        fs::create_dir(canonical_temp.join("inner")).unwrap();

        let mut state = state_in(&canonical_temp);
        let (outcome, _, _) = call("cd", &["inner"], &mut state);
        assert_eq!(outcome, Outcome::SUCCESS);
        assert_eq!(state.current_dir, canonical_temp.join("inner"));
    }

    #[test]
    fn test_cd_nonexistent_path_errors() {
        let orig = stdenv::current_dir().unwrap();
        let mut state = state_in(&orig);

        let name = format!("nonexistent_dir_for_cd_test_{}", std::process::id());
        let (outcome, _, err) = call("cd", &[&name], &mut state);

        assert_eq!(outcome, Outcome::FAILURE);
        assert_eq!(err, format!("cd: {}: No such file or directory\n", name));
        assert_eq!(state.current_dir, orig);
        assert_eq!(stdenv::current_dir().unwrap(), orig);
    }

    #[test]
    fn test_cd_without_home_fails() {
        let mut state = ShellState::with_vars(HashMap::new(), PathBuf::from("."));
        let (outcome, _, err) = call("cd", &[], &mut state);
        assert_eq!(outcome, Outcome::FAILURE);
        assert_eq!(err, "cd: HOME not set\n");
    }

    #[test]
    fn test_exit_requests_termination() {
        let mut state = ShellState::new();
        assert_eq!(call("exit", &[], &mut state).0, Outcome::Exit(0));
        assert_eq!(call("exit", &["3"], &mut state).0, Outcome::Exit(3));
        assert_eq!(call("exit", &["4", "ignored"], &mut state).0, Outcome::Exit(4));
        assert_eq!(call("exit", &["-1"], &mut state).0, Outcome::Exit(-1));

        let (outcome, _, err) = call("exit", &["soon"], &mut state);
        assert_eq!(outcome, Outcome::FAILURE);
        assert_eq!(err, "exit: soon: numeric argument required\n");
    }

    #[test]
    fn test_export_and_unset() {
        let mut state = ShellState::with_vars(HashMap::new(), PathBuf::from("."));
        state.set_var("KEEP", "kept");

        let (outcome, _, _) = call("export", &["FOO=bar", "EQ=a=b", "EMPTY", "KEEP"], &mut state);
        assert_eq!(outcome, Outcome::SUCCESS);
        assert_eq!(state.get_var("FOO").as_deref(), Some("bar"));
        assert_eq!(state.get_var("EQ").as_deref(), Some("a=b"));
        assert_eq!(state.get_var("EMPTY").as_deref(), Some(""));
        assert_eq!(state.get_var("KEEP").as_deref(), Some("kept"));

        let (outcome, _, _) = call("unset", &["FOO", "NEVER_SET"], &mut state);
        assert_eq!(outcome, Outcome::SUCCESS);
        assert_eq!(state.get_var("FOO"), None);

        let (outcome, _, err) = call("export", &["=oops"], &mut state);
        assert_eq!(outcome, Outcome::FAILURE);
        assert!(err.starts_with("export: "), "{err}");

        let (outcome, out, _) = call("export", &["help"], &mut state);
        assert_eq!(outcome, Outcome::SUCCESS);
        assert!(out.is_empty());
        assert_eq!(state.get_var("help").as_deref(), Some(""));
    }

    #[test]
    fn test_history_lists_entries() {
        let mut state = ShellState::new();
        state.history.push("echo one");
        state.history.push("pwd");
        let (_, out, _) = call("history", &[], &mut state);
        assert_eq!(out, "    1  echo one\n    2  pwd\n");
    }

    #[test]
    fn test_type_reports_kind() {
        let mut state = ShellState::new();
        let (outcome, out, _) = call("type", &["cd", "echo"], &mut state);
        assert_eq!(outcome, Outcome::SUCCESS);
        assert_eq!(out, "cd is a shell builtin\necho is a shell builtin\n");

        #[cfg(unix)]
        {
            state.set_var("PATH", "/bin");
            let (outcome, out, _) = call("type", &["sh"], &mut state);
            assert_eq!(outcome, Outcome::SUCCESS);
            assert_eq!(out, "sh is /bin/sh\n");
        }

        let (outcome, _, err) = call("type", &["nosuchcmd123"], &mut state);
        assert_eq!(outcome, Outcome::FAILURE);
        assert_eq!(err, "type: nosuchcmd123: not found\n");

        let (outcome, _, err) = call("type", &[], &mut state);
        assert_eq!(outcome, Outcome::FAILURE);
        assert_eq!(err, "type: usage: type command\n");
    }

    #[test]
    fn test_ls_short_long_and_hidden() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "12345").unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();
        fs::write(dir.path().join(".hidden"), "").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let mut state = state_in(dir.path());

        let (outcome, out, _) = call("ls", &[], &mut state);
        assert_eq!(outcome, Outcome::SUCCESS);
        assert_eq!(out, "a.txt  b.txt  sub\n");

        let (_, out, _) = call("ls", &["-a", "."], &mut state);
        assert_eq!(out, ".hidden  a.txt  b.txt  sub\n");

        let (_, out, _) = call("ls", &["-l"], &mut state);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], format!("-  {:>10}  a.txt", 0));
        assert_eq!(lines[1], format!("-  {:>10}  b.txt", 5));
        assert!(lines[2].starts_with("d  ") && lines[2].ends_with("  sub"));
    }

    #[test]
    fn test_ls_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_in(dir.path());
        let (outcome, out, err) = call("ls", &["-a", "nonexistent_dir"], &mut state);
        assert_eq!(outcome, Outcome::FAILURE);
        assert!(out.is_empty());
        assert_eq!(err, "ls: nonexistent_dir: No such file or directory\n");
    }

    #[test]
    fn test_cat_reads_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("one"), "hello\n").unwrap();
        fs::write(dir.path().join("two"), "world").unwrap();
        let mut state = state_in(dir.path());

        let (outcome, out, _) = call("cat", &["one", "two"], &mut state);
        assert_eq!(outcome, Outcome::SUCCESS);
        assert_eq!(out, "hello\nworld");
    }

    #[test]
    fn test_cat_errors() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("one"), "hello\n").unwrap();
        let mut state = state_in(dir.path());

        let (outcome, out, err) = call("cat", &["one", "missing"], &mut state);
        assert_eq!(outcome, Outcome::FAILURE);
        assert!(out.is_empty());
        assert_eq!(err, "cat: missing: No such file or directory\n");

        let (outcome, _, err) = call("cat", &[], &mut state);
        assert_eq!(outcome, Outcome::FAILURE);
        assert_eq!(err, "cat: usage: cat file...\n");
    }

    #[test]
    fn test_cat_treats_dash_as_a_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_in(dir.path());

        let (outcome, _, err) = call("cat", &["-"], &mut state);
        assert_eq!(outcome, Outcome::FAILURE);
        assert_eq!(err, "cat: -: No such file or directory\n");

        fs::write(dir.path().join("-"), "dash\n").unwrap();
        let (outcome, out, _) = call("cat", &["-"], &mut state);
        assert_eq!(outcome, Outcome::SUCCESS);
        assert_eq!(out, "dash\n");
    }

    #[test]
    fn test_clear_writes_escape_sequence() {
        let mut state = ShellState::new();
        let (_, out, _) = call("clear", &[], &mut state);
        assert_eq!(out, "\x1b[2J\x1b[H");
    }

    #[test]
    fn test_dispatch_redirects_output_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_in(dir.path());
        let registry = BuiltinRegistry::default();
        let (out_mw, out_buf) = MemWriter::with_handle();
        let (err_mw, err_buf) = MemWriter::with_handle();
        let mut out = OutputSink::Memory(out_mw);
        let mut err = OutputSink::Memory(err_mw);

        let stage = parse_stage("echo first > log.txt", |_| None, 0).unwrap();
        registry.dispatch(&stage, &mut state, &mut out, &mut err);
        let stage = parse_stage("echo second >> log.txt", |_| None, 0).unwrap();
        registry.dispatch(&stage, &mut state, &mut out, &mut err);
        assert_eq!(
            fs::read_to_string(dir.path().join("log.txt")).unwrap(),
            "first\nsecond\n"
        );

        let stage = parse_stage("cat missing 2> err.txt", |_| None, 0).unwrap();
        let outcome = registry.dispatch(&stage, &mut state, &mut out, &mut err);
        assert_eq!(outcome, Some(Outcome::FAILURE));
        assert_eq!(
            fs::read_to_string(dir.path().join("err.txt")).unwrap(),
            "cat: missing: No such file or directory\n"
        );

        assert!(out_buf.borrow().is_empty());
        assert!(err_buf.borrow().is_empty());
    }

    #[test]
    fn test_dispatch_reports_unopenable_target() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("adir")).unwrap();
        let mut state = state_in(dir.path());
        let registry = BuiltinRegistry::default();
        let (err_mw, err_buf) = MemWriter::with_handle();
        let mut out = OutputSink::Memory(MemWriter::new());
        let mut err = OutputSink::Memory(err_mw);

        let stage = parse_stage("echo hi > adir", |_| None, 0).unwrap();
        let outcome = registry.dispatch(&stage, &mut state, &mut out, &mut err);
        assert_eq!(outcome, Some(Outcome::FAILURE));
        let msg = String::from_utf8(err_buf.borrow().clone()).unwrap();
        assert!(msg.starts_with("echo: adir: "), "{msg}");
    }
}
