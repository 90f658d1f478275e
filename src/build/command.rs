//! Turning expanded recipe text into argv tokens.

use crate::platform::ESCAPED_QUOTE;
use std::collections::HashSet;
use thiserror::Error;

pub const SOURCE_FILE: &str = "{source_file}";
pub const OBJECT_FILE: &str = "{object_file}";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("cannot split command (unbalanced quotes?): {command}")]
    Tokenize { command: String },
}

/// Replaces the `{source_file}` and `{object_file}` markers.
pub fn substitute_files(recipe: &str, source: &str, object: &str) -> String {
    recipe.replace(SOURCE_FILE, source).replace(OBJECT_FILE, object)
}

/// Converts the stored escaped-quote marker back into a literal `"`.
pub fn unescape_quotes(command: &str) -> String {
    command.replace(ESCAPED_QUOTE, "\"")
}

/// Unescapes quotes and splits with POSIX shell-word rules.
pub fn tokenize(command: &str) -> Result<Vec<String>, CommandError> {
    let unescaped = unescape_quotes(command);
    shlex::split(&unescaped).ok_or(CommandError::Tokenize {
        command: unescaped,
    })
}

/// Drops exact-duplicate tokens, keeping the first occurrence of each.
pub fn deduplicate(tokens: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tokens
        .iter()
        .filter(|token| seen.insert(token.as_str()))
        .cloned()
        .collect()
}

/// Joins tokens back into a copy-pasteable command line.
pub fn join(tokens: &[String]) -> String {
    shlex::try_join(tokens.iter().map(String::as_str)).unwrap_or_else(|_| tokens.join(" "))
}
