//! Project configuration (`ardent.toml`).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "ardent.toml";

#[derive(Deserialize, Debug, Clone)]
pub struct ProjectConfig {
    pub board: BoardConfig,
    pub sketch: SketchConfig,
    #[serde(default)]
    pub build: BuildConfig,
    /// Injected into the platform after loading; wins over both files.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BoardConfig {
    /// Directory holding `platform.txt` and `boards.txt`.
    pub platform: PathBuf,
    /// Board prefix in `boards.txt`, e.g. `uno`.
    pub id: String,
    pub umbrella_header: Option<String>,
    /// Arduino installation root, exposed as `{runtime.ide.path}`.
    pub ide_root: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SketchConfig {
    pub path: PathBuf,
    /// Extra directories searched for libraries.
    #[serde(default)]
    pub libraries: Vec<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BuildConfig {
    #[serde(default = "default_build_dir")]
    pub dir: PathBuf,
    pub jobs: Option<usize>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            dir: default_build_dir(),
            jobs: None,
        }
    }
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

impl ProjectConfig {
    pub fn umbrella_header(&self) -> &str {
        self.board
            .umbrella_header
            .as_deref()
            .unwrap_or(crate::sketch::DEFAULT_UMBRELLA_HEADER)
    }

    /// File name of the primary sketch, used as `{build.project_name}`.
    pub fn project_name(&self) -> String {
        self.sketch
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sketch".to_string())
    }

    /// Makes relative paths relative to `base` instead of the working directory.
    pub fn rebase(&mut self, base: &Path) {
        for path in [
            &mut self.board.platform,
            &mut self.sketch.path,
            &mut self.build.dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        if let Some(root) = &mut self.board.ide_root
            && root.is_relative()
        {
            *root = base.join(&*root);
        }
        for lib in &mut self.sketch.libraries {
            if lib.is_relative() {
                *lib = base.join(&*lib);
            }
        }
    }
}

pub fn parse_config(text: &str) -> Result<ProjectConfig> {
    toml::from_str(text).context(format!(
        "Failed to parse {CONFIG_FILE} - check for syntax errors (missing quotes, brackets)"
    ))
}

/// Reads the config at `path`; relative paths inside it are resolved
/// against the file's directory.
pub fn load_config(path: &Path) -> Result<ProjectConfig> {
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "{} not found.\n\n\
            💡 Tip: Create one with a [board] table (platform, id) and a [sketch] path.",
            path.display()
        ));
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} - check file permissions", path.display()))?;
    let mut config = parse_config(&text)?;

    if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        config.rebase(base);
    }
    Ok(config)
}
