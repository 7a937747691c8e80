use crate::command::{ExitCode, Redirections};
use crate::error::{Result, ShellError};
use crate::expand::expand;
use crate::lexer::{self, Token};
use std::fmt;
use std::path::PathBuf;

/// Kind of redirection
///
/// Defines which stream of a stage an operator rebinds to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// Input redirection (`<`): reads standard input from a file.
    Input,
    /// Output redirection (`>`): writes standard output to a file, **overwriting** it.
    Output,
    /// Output redirection with append (`>>`): writes standard output to the end of a file.
    Append,
    /// Error redirection (`2>`): writes standard error to a file, overwriting it.
    Error,
}

impl RedirectKind {
    /// Recognize a whole token as an operator.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "<" => Some(RedirectKind::Input),
            ">" => Some(RedirectKind::Output),
            ">>" => Some(RedirectKind::Append),
            "2>" => Some(RedirectKind::Error),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            RedirectKind::Input => "<",
            RedirectKind::Output => ">",
            RedirectKind::Append => ">>",
            RedirectKind::Error => "2>",
        }
    }
}

impl fmt::Display for RedirectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One command of a pipeline after tokenizing, expansion and redirection parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Text of the stage as it appeared between pipe separators.
    pub source: String,
    /// `argv[0]` is the command name; empty when the stage held only redirections or a comment.
    pub argv: Vec<Token>,
    pub redirections: Redirections,
}

impl Stage {
    pub fn name(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    pub fn args(&self) -> &[Token] {
        self.argv.get(1..).unwrap_or(&[])
    }
}

/// Split a raw line on `|` into the texts of its stages.
///
/// Blank pieces are dropped, so a line made only of separators yields no stages.
/// The split is textual: a `|` inside quotes separates stages as well.
pub fn split_pipeline(line: &str) -> Vec<&str> {
    line.split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Pull `<`, `>`, `>>` and `2>` operators and their file names out of `tokens`.
///
/// The remaining tokens keep their order. An operator without a following token is a
/// syntax error for the whole stage.
pub fn parse_redirections(tokens: Vec<Token>) -> Result<(Vec<Token>, Redirections)> {
    let mut residual = Vec::with_capacity(tokens.len());
    let mut redirections = Redirections::default();
    let mut iter = tokens.into_iter();

    while let Some(token) = iter.next() {
        let Some(kind) = RedirectKind::from_token(&token) else {
            residual.push(token);
            continue;
        };
        let target = iter
            .next()
            .map(PathBuf::from)
            .ok_or(ShellError::MissingRedirectTarget(kind))?;
        match kind {
            RedirectKind::Input => redirections.stdin = Some(target),
            RedirectKind::Output | RedirectKind::Append => {
                redirections.stdout = Some(target);
                redirections.append = kind == RedirectKind::Append;
            }
            RedirectKind::Error => redirections.stderr = Some(target),
        }
    }

    Ok((residual, redirections))
}

/// Run one stage's text through tokenizing, comment stripping, expansion and
/// redirection parsing.
pub fn parse_stage<F>(source: &str, lookup: F, last_exit_code: ExitCode) -> Result<Stage>
where
    F: Fn(&str) -> Option<String>,
{
    let tokens = lexer::strip_comment(lexer::tokenize(source));
    let tokens = expand(&tokens, lookup, last_exit_code);
    let (argv, redirections) = parse_redirections(tokens)?;
    Ok(Stage {
        source: source.to_string(),
        argv,
        redirections,
    })
}
