use super::parser::{self, ConfigEntry, ConfigError, EntryKind};
use std::fs;
use std::path::Path;
use tracing::debug;

/// One namespace of configuration entries (patterns or variables).
///
/// Entries keep their file order and are never deduplicated. Lookup is a
/// linear scan where the first match wins, except that values injected at
/// runtime through [`ConfigStore::insert`] are consulted first, newest
/// insertion first.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    kind: EntryKind,
    loaded: Vec<(String, String)>,
    injected: Vec<(String, String)>,
}

impl ConfigStore {
    pub fn new(kind: EntryKind) -> Self {
        Self {
            kind,
            loaded: Vec::new(),
            injected: Vec::new(),
        }
    }

    pub fn patterns() -> Self {
        Self::new(EntryKind::Pattern)
    }

    pub fn variables() -> Self {
        Self::new(EntryKind::Variable)
    }

    /// Builds a variable store from literal pairs, in priority order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut store = Self::variables();
        store.loaded = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        store
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Appends parsed entries of this store's kind; returns how many were kept.
    pub fn extend_entries<'a, I>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = &'a ConfigEntry>,
    {
        let kind = self.kind;
        let before = self.loaded.len();
        self.loaded.extend(
            entries
                .into_iter()
                .filter(|entry| entry.kind == kind)
                .map(|entry| (entry.name.clone(), entry.value.clone())),
        );
        self.loaded.len() - before
    }

    pub fn load(&mut self, text: &str, board_filter: Option<&str>) -> Result<usize, ConfigError> {
        let entries = parser::parse(text, board_filter)?;
        Ok(self.extend_entries(&entries))
    }

    pub fn load_file(
        &mut self,
        path: &Path,
        board_filter: Option<&str>,
    ) -> Result<usize, ConfigError> {
        let entries = parse_file(path, board_filter)?;
        let kept = self.extend_entries(&entries);
        debug!(path = %path.display(), kind = ?self.kind, kept, "loaded configuration entries");
        Ok(kept)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.injected
            .iter()
            .rev()
            .chain(self.loaded.iter())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Adds a runtime value that takes priority over everything loaded.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.injected.push((name.into(), value.into()));
    }

    /// First value (in lookup order) whose name contains `fragment`.
    pub fn find(&self, fragment: &str) -> Option<&str> {
        self.iter()
            .find(|(name, _)| name.contains(fragment))
            .map(|(_, value)| value)
    }

    /// All entries in lookup order, duplicates included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.injected
            .iter()
            .rev()
            .chain(self.loaded.iter())
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.loaded.len() + self.injected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reads and parses one configuration file, reporting errors against its path.
pub fn parse_file(
    path: &Path,
    board_filter: Option<&str>,
) -> Result<Vec<ConfigEntry>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parser::parse_with_origin(&text, board_filter, &path.display().to_string())
}
