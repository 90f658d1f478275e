//! Hardware platform description (`platform.txt` + `boards.txt`).
//!
//! A [`Platform`] owns two [`ConfigStore`]s: one for variables and one for
//! patterns. Board-specific values from `boards.txt` are loaded before the
//! generic `platform.txt` values so that they win the first-match lookup.
//!
//! ## Example
//!
//! ```no_run
//! use ardent::platform::Platform;
//! use std::path::Path;
//!
//! let mut platform = Platform::open(Path::new("/opt/arduino/hardware/arduino/avr"), "uno")?;
//! platform.set("build.path", "/tmp/blink");
//! let recipe = platform.recipe("recipe.cpp.o.pattern")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod expand;
pub mod parser;
pub mod store;

pub use expand::{ExpandError, expand, has_placeholders, placeholders};
pub use parser::{ConfigEntry, ConfigError, ESCAPED_QUOTE, EntryKind, parse};
pub use store::ConfigStore;

use std::path::{Path, PathBuf};
use tracing::debug;

pub const PLATFORM_FILE: &str = "platform.txt";
pub const BOARDS_FILE: &str = "boards.txt";

pub const RECIPE_C: &str = "recipe.c.o.pattern";
pub const RECIPE_CPP: &str = "recipe.cpp.o.pattern";
pub const RECIPE_ASM: &str = "recipe.S.o.pattern";
pub const RECIPE_ARCHIVE: &str = "recipe.ar.pattern";
pub const RECIPE_LINK: &str = "recipe.c.combine.pattern";
pub const RECIPE_OBJCOPY_PREFIX: &str = "recipe.objcopy.";

#[derive(Debug, Clone)]
pub struct Platform {
    dir: PathBuf,
    board: String,
    variables: ConfigStore,
    patterns: ConfigStore,
}

impl Platform {
    /// Loads `boards.txt` (filtered to `board`) and then `platform.txt` from `dir`.
    pub fn open(dir: &Path, board: &str) -> Result<Self, ConfigError> {
        let mut variables = ConfigStore::variables();
        let mut patterns = ConfigStore::patterns();

        let board_entries = store::parse_file(&dir.join(BOARDS_FILE), Some(board))?;
        variables.extend_entries(&board_entries);
        patterns.extend_entries(&board_entries);

        let platform_entries = store::parse_file(&dir.join(PLATFORM_FILE), None)?;
        variables.extend_entries(&platform_entries);
        patterns.extend_entries(&platform_entries);

        debug!(
            dir = %dir.display(),
            board,
            variables = variables.len(),
            patterns = patterns.len(),
            "opened platform"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            board: board.to_string(),
            variables,
            patterns,
        })
    }

    /// Opens `<root>/hardware/<vendor>/<arch>` of an Arduino installation.
    pub fn from_arduino_root(
        root: &Path,
        vendor: &str,
        arch: &str,
        board: &str,
    ) -> Result<Self, ConfigError> {
        let mut platform = Self::open(&hardware_dir(root, vendor, arch), board)?;
        platform.set("runtime.ide.path", root.to_string_lossy());
        Ok(platform)
    }

    /// Assembles a platform from already-built stores.
    pub fn from_stores(
        dir: impl Into<PathBuf>,
        board: impl Into<String>,
        variables: ConfigStore,
        patterns: ConfigStore,
    ) -> Self {
        Self {
            dir: dir.into(),
            board: board.into(),
            variables,
            patterns,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn board(&self) -> &str {
        &self.board
    }

    pub fn variables(&self) -> &ConfigStore {
        &self.variables
    }

    pub fn patterns(&self) -> &ConfigStore {
        &self.patterns
    }

    /// Injects a runtime variable visible to all later expansions.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name, value);
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name)
    }

    pub fn expand(&self, template: &str) -> Result<String, ExpandError> {
        expand::expand(template, &self.variables)
    }

    /// The named pattern expanded against the variables, if it exists.
    pub fn recipe(&self, name: &str) -> Result<Option<String>, ExpandError> {
        self.patterns
            .get(name)
            .map(|pattern| self.expand(pattern))
            .transpose()
    }

    /// The compile recipe for `source`, chosen by file extension.
    pub fn recipe_for(&self, source: &Path) -> Result<Option<String>, ExpandError> {
        match recipe_name_for(source) {
            Some(name) => self.recipe(name),
            None => Ok(None),
        }
    }

    /// Names of the `recipe.objcopy.*.pattern` entries, in file order.
    pub fn objcopy_recipes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for (name, _) in self.patterns.iter() {
            if name.starts_with(RECIPE_OBJCOPY_PREFIX) && !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

pub fn hardware_dir(root: &Path, vendor: &str, arch: &str) -> PathBuf {
    root.join("hardware").join(vendor).join(arch)
}

/// Pattern name used to compile a source with this extension.
pub fn recipe_name_for(source: &Path) -> Option<&'static str> {
    let ext = source.extension()?.to_str()?;
    match ext {
        "c" => Some(RECIPE_C),
        "cpp" | "cc" | "cxx" | "ino" => Some(RECIPE_CPP),
        "S" | "s" => Some(RECIPE_ASM),
        _ => None,
    }
}
