use crate::command::ExitCode;
use crate::lexer::Token;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// `$?` or `$` followed by a run of name characters.
static REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\?|[A-Za-z0-9_]+)").expect("valid reference pattern"));

/// Replace `$NAME` and `$?` references in every token.
///
/// Unset names expand to an empty string and a `$` that starts no reference stays as
/// it is. Substituted text is never scanned again.
pub fn expand<F>(tokens: &[Token], lookup: F, last_exit_code: ExitCode) -> Vec<Token>
where
    F: Fn(&str) -> Option<String>,
{
    tokens
        .iter()
        .map(|token| expand_token(token, &lookup, last_exit_code))
        .collect()
}

fn expand_token<F>(token: &str, lookup: &F, last_exit_code: ExitCode) -> Token
where
    F: Fn(&str) -> Option<String>,
{
    if !token.contains('$') {
        return token.to_string();
    }
    REFERENCE
        .replace_all(token, |caps: &Captures| match &caps[1] {
            "?" => last_exit_code.to_string(),
            name => lookup(name).unwrap_or_default(),
        })
        .into_owned()
}
