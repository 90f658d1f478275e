//! `{name}` placeholder expansion.

use super::store::ConfigStore;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([\w.-]+)\}").expect("placeholder regex is valid"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpandError {
    /// A value refers back to a placeholder that is still being expanded.
    #[error("placeholder cycle: {}", chain.join(" -> "))]
    Cycle { chain: Vec<String> },
}

pub fn has_placeholders(text: &str) -> bool {
    PLACEHOLDER.is_match(text)
}

/// Distinct placeholder names in `text`, in order of first appearance.
pub fn placeholders(text: &str) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(text) {
        if let Some(name) = caps.get(1).map(|m| m.as_str())
            && !names.contains(&name)
        {
            names.push(name);
        }
    }
    names
}

/// Expands every known placeholder in `template`, recursively.
///
/// Unknown names stay in the output as `{name}`. Each distinct name is looked
/// up once and every occurrence receives the same fully expanded value.
pub fn expand(template: &str, store: &ConfigStore) -> Result<String, ExpandError> {
    let mut chain = Vec::new();
    expand_inner(template, store, &mut chain)
}

fn expand_inner(
    template: &str,
    store: &ConfigStore,
    chain: &mut Vec<String>,
) -> Result<String, ExpandError> {
    if !has_placeholders(template) {
        return Ok(template.to_string());
    }

    let mut resolved: HashMap<&str, String> = HashMap::new();
    for name in placeholders(template) {
        let Some(value) = store.get(name) else {
            continue;
        };

        if chain.iter().any(|seen| seen == name) {
            let mut cycle = chain.clone();
            cycle.push(name.to_string());
            return Err(ExpandError::Cycle { chain: cycle });
        }

        let value = if has_placeholders(value) {
            chain.push(name.to_string());
            let nested = expand_inner(value, store, chain);
            chain.pop();
            nested?
        } else {
            value.to_string()
        };
        resolved.insert(name, value);
    }

    let expanded = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        match resolved.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        }
    });
    Ok(expanded.into_owned())
}
