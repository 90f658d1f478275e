//! Line parser for `platform.txt` / `boards.txt` style files.
//!
//! Every meaningful line is a `dotted.name = value` assignment. Names whose
//! final segment is `pattern` hold command-line templates ("patterns"); all
//! other names hold plain substitutable values ("variables").

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Stands in for a literal `"` inside stored pattern values.
///
/// The marker survives template expansion untouched and is turned back into
/// a quote right before a command is split into argv tokens.
pub const ESCAPED_QUOTE: &str = "\\\"";

/// Origin label used when parsing text that did not come from a file.
const INLINE_ORIGIN: &str = "<input>";

static DEFINE_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(-D\w*=)"(\{[\w.]*\})""#).expect("define assignment regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// A command-line template (`recipe.c.o.pattern`).
    Pattern,
    /// A plain value (`compiler.path`, `build.mcu`).
    Variable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub name: String,
    pub value: String,
    pub kind: EntryKind,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{origin}:{line}: expected `name = value`, found `{text}`")]
    MalformedLine {
        origin: String,
        line: usize,
        text: String,
    },
    #[error("failed to read {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Parses configuration text into entries, in file order.
///
/// With `board_filter`, only names starting with `"<board>."` are kept and
/// the prefix is stripped. A line that is neither a comment, blank, nor a
/// well-formed assignment aborts the whole parse.
pub fn parse(text: &str, board_filter: Option<&str>) -> Result<Vec<ConfigEntry>, ConfigError> {
    parse_with_origin(text, board_filter, INLINE_ORIGIN)
}

pub(crate) fn parse_with_origin(
    text: &str,
    board_filter: Option<&str>,
    origin: &str,
) -> Result<Vec<ConfigEntry>, ConfigError> {
    let prefix = board_filter.map(|board| format!("{board}."));
    let mut entries = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let malformed = || ConfigError::MalformedLine {
            origin: origin.to_string(),
            line: idx + 1,
            text: trimmed.to_string(),
        };

        let (lhs, rhs) = trimmed.split_once('=').ok_or_else(malformed)?;
        let full_name = lhs.trim();
        if !is_valid_name(full_name) {
            return Err(malformed());
        }

        let name = match &prefix {
            Some(prefix) => match full_name.strip_prefix(prefix.as_str()) {
                Some(rest) if !rest.is_empty() => rest,
                _ => continue,
            },
            None => full_name,
        };

        let value = extract_value(rhs);
        let entry = if is_pattern_name(name) {
            ConfigEntry {
                name: name.to_string(),
                value: escape_pattern(&value),
                kind: EntryKind::Pattern,
            }
        } else {
            ConfigEntry {
                name: name.to_string(),
                value,
                kind: EntryKind::Variable,
            }
        };
        entries.push(entry);
    }

    Ok(entries)
}

/// True when the last dot segment of `name` is exactly `pattern`.
pub fn is_pattern_name(name: &str) -> bool {
    name.rsplit('.').next() == Some("pattern")
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        })
}

/// Value text up to the first unescaped `#`, trimmed. `\#` yields `#`.
fn extract_value(raw: &str) -> String {
    let mut value = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'#') => {
                value.push('#');
                chars.next();
            }
            '#' => break,
            _ => value.push(c),
        }
    }
    value.trim().to_string()
}

/// Applies the quoting rules pattern values are stored with.
///
/// `-DNAME="{placeholder}"` keeps an extra escape level so the quotes reach
/// the preprocessor, then every remaining `"` becomes [`ESCAPED_QUOTE`].
pub fn escape_pattern(value: &str) -> String {
    let defines = DEFINE_ASSIGNMENT.replace_all(value, r#"${1}\"${2}\""#);
    defines.replace('"', ESCAPED_QUOTE)
}
