use crate::builtin::BuiltinRegistry;
use crate::command::{ExitCode, Outcome};
use crate::completion::ShellHelper;
use crate::config::ShellConfig;
use crate::error::Result;
use crate::external;
use crate::history::History;
use crate::io_adapters::OutputSink;
use crate::parser;
use crate::pipeline::{self, ResolvedStage};
use crate::state::ShellState;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A line-oriented shell: builtins run in-process, everything else is spawned.
///
/// The interpreter owns the [`ShellState`] and the builtin table. Output of builtins,
/// spawned stages and diagnostics goes to the two [`OutputSink`]s, which are the
/// process's standard streams unless the interpreter was built with
/// [`Interpreter::with_output`].
///
/// Example
/// ```
/// use pipesh::{Interpreter, MemWriter, Outcome, OutputSink};
/// let (out, buf) = MemWriter::with_handle();
/// let mut sh = Interpreter::with_output(OutputSink::Memory(out), OutputSink::Stderr);
/// let outcome = sh.run_pipeline("echo hello world");
/// assert_eq!(outcome, Outcome::Code(0));
/// assert_eq!(buf.borrow().as_slice(), b"hello world\n");
/// ```
pub struct Interpreter {
    state: ShellState,
    builtins: BuiltinRegistry,
    config: ShellConfig,
    out: OutputSink,
    err: OutputSink,
}

impl Interpreter {
    pub fn new(config: ShellConfig) -> Self {
        let mut state = ShellState::new();
        state.history = History::with_limit(config.history_limit);
        Self {
            state,
            builtins: BuiltinRegistry::default(),
            config,
            out: OutputSink::Stdout,
            err: OutputSink::Stderr,
        }
    }

    /// Interpreter writing its output and diagnostics to the given sinks.
    pub fn with_output(out: OutputSink, err: OutputSink) -> Self {
        Self {
            out,
            err,
            ..Self::default()
        }
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ShellState {
        &mut self.state
    }

    pub fn builtins_mut(&mut self) -> &mut BuiltinRegistry {
        &mut self.builtins
    }

    /// Run one input line and record its status for `$?`.
    ///
    /// Errors are printed on the error sink and turned into the status they map to;
    /// only `exit` yields [`Outcome::Exit`].
    pub fn run_pipeline(&mut self, line: &str) -> Outcome {
        let outcome = match self.run_line(line) {
            Ok(outcome) => outcome,
            Err(e) => {
                let _ = writeln!(self.err, "{e}");
                Outcome::Code(e.exit_code())
            }
        };
        self.state.last_exit_code = outcome.code();
        let _ = self.out.flush();
        let _ = self.err.flush();
        outcome
    }

    fn run_line(&mut self, line: &str) -> Result<Outcome> {
        let sources = parser::split_pipeline(line);
        match sources.as_slice() {
            [] => Ok(Outcome::SUCCESS),
            [source] => self.run_single(source),
            _ => {
                let stages = pipeline::plan(&sources, &self.state)?;
                pipeline::execute(&stages, &self.state, &mut self.out, &mut self.err)
                    .map(Outcome::Code)
            }
        }
    }

    fn run_single(&mut self, source: &str) -> Result<Outcome> {
        let stage = parser::parse_stage(
            source,
            |name| self.state.get_var(name),
            self.state.last_exit_code,
        )?;
        if stage.argv.is_empty() {
            return Ok(Outcome::SUCCESS);
        }
        if let Some(outcome) =
            self.builtins
                .dispatch(&stage, &mut self.state, &mut self.out, &mut self.err)
        {
            return Ok(outcome);
        }
        let resolved = ResolvedStage::resolve(stage, &self.state)?;
        pipeline::execute(&[resolved], &self.state, &mut self.out, &mut self.err).map(Outcome::Code)
    }

    /// Read-eval-print loop on the terminal.
    ///
    /// Returns the status the process should exit with: the argument of `exit`, or 0
    /// at end of input.
    pub fn repl(&mut self) -> anyhow::Result<ExitCode> {
        // Children get the default disposition back on exec; the shell keeps running.
        let interrupted = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&interrupted))?;

        let config = Config::builder()
            .max_history_size(self.config.history_limit)?
            .auto_add_history(false)
            .build();
        let mut rl: Editor<ShellHelper, DefaultHistory> = Editor::with_config(config)?;
        rl.set_helper(Some(ShellHelper::new(self.builtins.names().collect())));
        self.load_history(&mut rl);

        if io::stdin().is_terminal() {
            writeln!(self.out, "pipesh: type 'exit' to quit")?;
        }
        loop {
            if let Some(helper) = rl.helper_mut() {
                helper.path_var = self.state.get_var("PATH").unwrap_or_default();
                helper.cwd = self.state.current_dir.clone();
                helper.extensions = external::executable_extensions(&self.state);
            }

            match rl.readline(&self.prompt()) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line)?;
                    self.state.history.push(line);

                    let outcome = self.run_pipeline(line);
                    if interrupted.swap(false, Ordering::Relaxed) {
                        log::debug!("interrupt delivered while running {line:?}");
                    }
                    if let Outcome::Exit(code) = outcome {
                        self.save_history();
                        return Ok(code);
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    writeln!(self.out, "^C")?;
                }
                Err(ReadlineError::Eof) => {
                    self.save_history();
                    return Ok(0);
                }
                Err(e) => {
                    self.save_history();
                    return Err(e.into());
                }
            }
        }
    }

    /// `<cwd> $ ` with the home directory shown as `~`.
    fn prompt(&self) -> String {
        let cwd = &self.state.current_dir;
        let shown = match self.state.get_var("HOME") {
            Some(home) if !home.is_empty() => match cwd.strip_prefix(Path::new(&home)) {
                Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
                Ok(rest) => format!("~/{}", rest.display()),
                Err(_) => cwd.display().to_string(),
            },
            _ => cwd.display().to_string(),
        };
        format!("{shown} $ ")
    }

    fn load_history(&mut self, rl: &mut Editor<ShellHelper, DefaultHistory>) {
        if let Err(e) = self.state.history.load(&self.config.history_file) {
            log::warn!(
                "cannot read history {}: {e}",
                self.config.history_file.display()
            );
            return;
        }
        for entry in self.state.history.iter() {
            let _ = rl.add_history_entry(entry);
        }
    }

    fn save_history(&self) {
        if let Err(e) = self.state.history.save(&self.config.history_file) {
            log::warn!(
                "cannot write history {}: {e}",
                self.config.history_file.display()
            );
        }
    }
}

impl Default for Interpreter {
    /// Interpreter on the standard streams with the built-in commands
    /// and the default configuration.
    fn default() -> Self {
        Self::new(ShellConfig::default())
    }
}
