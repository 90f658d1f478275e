//! Incremental build units: one source file, one object file.

use super::command::{self, CommandError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The decision taken for one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildUnit {
    source_path: PathBuf,
    output_path: PathBuf,
    needs_rebuild: bool,
    command_tokens: Option<Vec<String>>,
}

impl BuildUnit {
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn needs_rebuild(&self) -> bool {
        self.needs_rebuild
    }

    pub fn command_tokens(&self) -> Option<&[String]> {
        self.command_tokens.as_deref()
    }

    /// The command without repeated flags, first occurrence kept.
    pub fn deduplicate_tokens(&self) -> Option<Vec<String>> {
        self.command_tokens.as_deref().map(command::deduplicate)
    }

    pub fn command_line(&self) -> Option<String> {
        self.command_tokens.as_deref().map(command::join)
    }
}

/// `output_dir/<file name>.o`; the suffix is appended, never replaced.
pub fn object_path(output_dir: &Path, source: &Path) -> PathBuf {
    let file_name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_dir.join(format!("{file_name}.o"))
}

/// True when `output` is missing or strictly older than `source`.
///
/// Equal timestamps count as up to date. If the source cannot be inspected
/// the output is treated as stale so the compiler gets to report why.
pub fn is_stale(source: &Path, output: &Path) -> bool {
    let Ok(output_time) = fs::metadata(output).and_then(|m| m.modified()) else {
        return true;
    };
    match fs::metadata(source).and_then(|m| m.modified()) {
        Ok(source_time) => source_time > output_time,
        Err(_) => true,
    }
}

/// Resolves `source` against a recipe into a [`BuildUnit`] inside `output_dir`.
pub fn resolve(
    output_dir: &Path,
    source: &Path,
    recipe: Option<&str>,
) -> Result<BuildUnit, CommandError> {
    resolve_to(source, &object_path(output_dir, source), recipe)
}

/// Like [`resolve`], with an explicit output path.
pub fn resolve_to(
    source: &Path,
    output: &Path,
    recipe: Option<&str>,
) -> Result<BuildUnit, CommandError> {
    let Some(recipe) = recipe else {
        debug!(source = %source.display(), "no recipe, nothing to do");
        return Ok(BuildUnit {
            source_path: source.to_path_buf(),
            output_path: output.to_path_buf(),
            needs_rebuild: false,
            command_tokens: None,
        });
    };

    if !is_stale(source, output) {
        debug!(source = %source.display(), "up to date");
        return Ok(BuildUnit {
            source_path: source.to_path_buf(),
            output_path: output.to_path_buf(),
            needs_rebuild: false,
            command_tokens: None,
        });
    }

    let command = command::substitute_files(
        recipe,
        &source.to_string_lossy(),
        &output.to_string_lossy(),
    );
    let tokens = command::tokenize(&command)?;
    debug!(source = %source.display(), output = %output.display(), "needs rebuild");

    Ok(BuildUnit {
        source_path: source.to_path_buf(),
        output_path: output.to_path_buf(),
        needs_rebuild: true,
        command_tokens: Some(tokens),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{ConfigStore, expand};
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    fn touch(path: &Path, time: SystemTime) {
        if !path.exists() {
            fs::write(path, "").unwrap();
        }
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn test_object_path_appends_suffix() {
        let out = object_path(Path::new("build"), Path::new("src/foo.cpp"));
        assert_eq!(out, Path::new("build").join("foo.cpp.o"));
        let c = object_path(Path::new("build"), Path::new("src/foo.c"));
        assert_ne!(out, c);
    }

    #[test]
    fn test_resolve_missing_object_produces_tokens() {
        let vars = ConfigStore::from_pairs([("cc", "gcc")]);
        let recipe = expand("{cc} -c {source_file} -o {object_file}", &vars).unwrap();

        let unit = resolve(Path::new("build"), Path::new("a.cpp"), Some(&recipe)).unwrap();
        assert!(unit.needs_rebuild());
        assert_eq!(
            unit.command_tokens().unwrap(),
            ["gcc", "-c", "a.cpp", "-o", "build/a.cpp.o"]
        );
    }

    #[test]
    fn test_absent_recipe_is_never_work() {
        let unit = resolve(Path::new("nowhere"), Path::new("boot.S"), None).unwrap();
        assert!(!unit.needs_rebuild());
        assert!(unit.command_tokens().is_none());
        assert!(unit.command_line().is_none());
    }

    #[test]
    fn test_newer_object_is_up_to_date() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.c");
        let object = object_path(dir.path(), &source);
        let base = SystemTime::now() - Duration::from_secs(3600);
        touch(&source, base);
        touch(&object, base + Duration::from_secs(10));

        let unit = resolve(dir.path(), &source, Some("cc -c {source_file}")).unwrap();
        assert!(!unit.needs_rebuild());
        assert!(unit.command_tokens().is_none());
    }

    #[test]
    fn test_newer_source_needs_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.c");
        let object = object_path(dir.path(), &source);
        let base = SystemTime::now() - Duration::from_secs(3600);
        touch(&object, base);
        touch(&source, base + Duration::from_secs(10));

        let unit = resolve(dir.path(), &source, Some("cc -c {source_file}")).unwrap();
        assert!(unit.needs_rebuild());
    }

    #[test]
    fn test_equal_times_skip_work() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.c");
        let object = object_path(dir.path(), &source);
        let base = SystemTime::now() - Duration::from_secs(3600);
        touch(&source, base);
        touch(&object, base);

        assert!(!is_stale(&source, &object));
    }

    #[test]
    fn test_missing_source_with_existing_object_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let object = dir.path().join("gone.c.o");
        fs::write(&object, "").unwrap();
        assert!(is_stale(&dir.path().join("gone.c"), &object));
    }

    #[test]
    fn test_deduplicate_tokens_on_unit() {
        let unit = resolve(
            Path::new("out"),
            Path::new("x.c"),
            Some("gcc -Wall -Wall -c {source_file}"),
        )
        .unwrap();
        assert_eq!(
            unit.deduplicate_tokens().unwrap(),
            ["gcc", "-Wall", "-c", "x.c"]
        );
        assert_eq!(unit.command_tokens().unwrap().len(), 5);
    }

    #[test]
    fn test_escaped_quotes_are_resolved_before_splitting() {
        let unit = resolve(
            Path::new("out dir"),
            Path::new("my sketch.cpp"),
            Some(r#"\"g++\" -c \"{source_file}\" -o \"{object_file}\""#),
        )
        .unwrap();
        let expected_object = Path::new("out dir").join("my sketch.cpp.o");
        assert_eq!(
            unit.command_tokens().unwrap(),
            [
                "g++".to_string(),
                "-c".to_string(),
                "my sketch.cpp".to_string(),
                "-o".to_string(),
                expected_object.to_string_lossy().into_owned(),
            ]
        );
    }
}
