//! Sketch preprocessing.
//!
//! A sketch is a primary `.ino` file plus its sibling `.ino` fragments. They
//! are merged into one C++ translation unit: the umbrella header comes first,
//! then the primary file's leading `#include` block, then a forward
//! declaration for every function defined anywhere in the sketch, then the
//! rest of the code.

pub mod scanner;

pub use scanner::{DeclarationScanner, LineClass, ScanState};

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_UMBRELLA_HEADER: &str = "Arduino.h";

static INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*#\s*include\s*[<"]([^>"]+)[>"]"#).expect("include regex is valid")
});

#[derive(Debug, Error)]
pub enum SketchError {
    #[error("sketch path {0} has no file name")]
    InvalidPath(PathBuf),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What preprocessing produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SketchOutput {
    /// The merged translation unit that was written.
    pub cpp_path: PathBuf,
    /// Header names from the leading include block, without directories or
    /// extension (`<SPI.h>` -> `SPI`).
    pub includes: Vec<String>,
    /// The forward declarations that were inserted.
    pub declarations: Vec<String>,
}

/// Primary file first, then same-extension siblings sorted by file name.
pub fn collect_fragments(primary: &Path) -> Result<Vec<PathBuf>, SketchError> {
    let file_name = primary
        .file_name()
        .ok_or_else(|| SketchError::InvalidPath(primary.to_path_buf()))?;
    let extension = primary.extension();
    let dir = match primary.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let entries = fs::read_dir(dir).map_err(|source| SketchError::Read {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut siblings: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension() == extension)
        .filter(|path| path.file_name() != Some(file_name))
        .collect();
    siblings.sort();

    let mut fragments = vec![primary.to_path_buf()];
    fragments.extend(siblings);
    Ok(fragments)
}

/// Concatenates the lines of every fragment, in order.
pub fn merge_fragments(fragments: &[PathBuf]) -> Result<Vec<String>, SketchError> {
    let mut lines = Vec::new();
    for path in fragments {
        let text = fs::read_to_string(path).map_err(|source| SketchError::Read {
            path: path.clone(),
            source,
        })?;
        lines.extend(text.lines().map(str::to_string));
    }
    Ok(lines)
}

/// Header name of an `#include` line, or `None` if the line is not one.
pub fn include_name(line: &str) -> Option<String> {
    let caps = INCLUDE.captures(line)?;
    let header = caps.get(1)?.as_str();
    let last = header.rsplit(['/', '\\']).next().unwrap_or(header);
    let stem = last.split_once('.').map_or(last, |(stem, _)| stem);
    Some(stem.to_string())
}

/// Builds the merged translation unit text from already merged lines.
///
/// Returns the text, the include names and the inserted declarations.
pub fn render(lines: &[String], umbrella_header: &str) -> (String, Vec<String>, Vec<String>) {
    let mut scanner = DeclarationScanner::new();
    scanner.scan(lines.iter().map(String::as_str));
    let declarations = scanner.declarations();

    let umbrella_stem = umbrella_header
        .split_once('.')
        .map_or(umbrella_header, |(stem, _)| stem);

    let mut out = format!("#include <{umbrella_header}>\n");
    let mut includes: Vec<String> = Vec::new();
    let mut rest = lines.iter().peekable();

    while let Some(line) = rest.peek() {
        let Some(name) = include_name(line) else {
            break;
        };
        out.push_str(line);
        out.push('\n');
        if name != umbrella_stem && !includes.contains(&name) {
            includes.push(name);
        }
        rest.next();
    }

    for declaration in &declarations {
        out.push_str(declaration);
        out.push('\n');
    }

    for line in rest {
        out.push_str(line);
        out.push('\n');
    }

    (out, includes, declarations)
}

/// Merges the sketch rooted at `primary` into `output_dir/<stem>.cpp`.
pub fn preprocess(
    primary: &Path,
    output_dir: &Path,
    umbrella_header: &str,
) -> Result<SketchOutput, SketchError> {
    let stem = primary
        .file_stem()
        .ok_or_else(|| SketchError::InvalidPath(primary.to_path_buf()))?;

    let fragments = collect_fragments(primary)?;
    debug!(primary = %primary.display(), fragments = fragments.len(), "merging sketch");
    let lines = merge_fragments(&fragments)?;
    let (text, includes, declarations) = render(&lines, umbrella_header);

    let cpp_path = output_dir.join(format!("{}.cpp", stem.to_string_lossy()));
    fs::create_dir_all(output_dir).map_err(|source| SketchError::Write {
        path: output_dir.to_path_buf(),
        source,
    })?;
    // Unchanged output keeps its mtime so the sketch object stays up to date.
    let unchanged = fs::read_to_string(&cpp_path).is_ok_and(|existing| existing == text);
    if !unchanged {
        fs::write(&cpp_path, text).map_err(|source| SketchError::Write {
            path: cpp_path.clone(),
            source,
        })?;
    }

    debug!(
        output = %cpp_path.display(),
        includes = includes.len(),
        declarations = declarations.len(),
        "sketch written"
    );

    Ok(SketchOutput {
        cpp_path,
        includes,
        declarations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_include_name_strips_directories_and_extension() {
        assert_eq!(include_name("#include <Foo.h>").as_deref(), Some("Foo"));
        assert_eq!(include_name("  #include \"util/delay.h\"").as_deref(), Some("delay"));
        assert_eq!(include_name("#include<Wire.h>").as_deref(), Some("Wire"));
        assert_eq!(include_name("# include <vector>").as_deref(), Some("vector"));
        assert_eq!(include_name("// #include <Foo.h> is not needed"), None);
        assert_eq!(include_name("void setup() {}"), None);
    }

    #[test]
    fn test_render_places_declarations_after_includes() {
        let (text, includes, decls) =
            render(&lines("#include <Foo.h>\nvoid setup(){}\nvoid loop(){}\n"), "Arduino.h");
        assert_eq!(includes, ["Foo"]);
        assert_eq!(decls, ["void setup();", "void loop();"]);
        assert_eq!(
            text,
            "#include <Arduino.h>\n#include <Foo.h>\nvoid setup();\nvoid loop();\nvoid setup(){}\nvoid loop(){}\n"
        );
    }

    #[test]
    fn test_render_without_includes() {
        let (text, includes, _) = render(&lines("void loop() {\n}\n"), "Arduino.h");
        assert!(includes.is_empty());
        assert_eq!(text, "#include <Arduino.h>\nvoid loop();\nvoid loop() {\n}\n");
    }

    #[test]
    fn test_render_include_block_ends_at_first_other_line() {
        let source = "#include <SPI.h>\n\n#include <Late.h>\nvoid go() {}\n";
        let (text, includes, _) = render(&lines(source), "Arduino.h");
        assert_eq!(includes, ["SPI"]);
        assert!(text.starts_with("#include <Arduino.h>\n#include <SPI.h>\nvoid go();\n\n#include <Late.h>\n"));
    }

    #[test]
    fn test_render_skips_umbrella_and_duplicate_includes() {
        let source = "#include <Arduino.h>\n#include <Servo.h>\n#include \"Servo.h\"\nint x;\n";
        let (_, includes, _) = render(&lines(source), "Arduino.h");
        assert_eq!(includes, ["Servo"]);
    }

    #[test]
    fn test_render_only_includes_appends_declarations() {
        let (text, _, decls) = render(&lines("#include <A.h>\n"), "Arduino.h");
        assert!(decls.is_empty());
        assert_eq!(text, "#include <Arduino.h>\n#include <A.h>\n");
    }

    #[test]
    fn test_fragments_put_primary_first() {
        let dir = tempfile::tempdir().unwrap();
        let sketch = dir.path().join("Blink");
        fs::create_dir_all(&sketch).unwrap();
        fs::write(sketch.join("Blink.ino"), "void setup() {}\n").unwrap();
        fs::write(sketch.join("a_helpers.ino"), "void helper() {}\n").unwrap();
        fs::write(sketch.join("z_more.ino"), "void more() {}\n").unwrap();
        fs::write(sketch.join("notes.txt"), "not code\n").unwrap();

        let fragments = collect_fragments(&sketch.join("Blink.ino")).unwrap();
        let names: Vec<_> = fragments
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["Blink.ino", "a_helpers.ino", "z_more.ino"]);
    }

    #[test]
    fn test_preprocess_writes_merged_unit() {
        let dir = tempfile::tempdir().unwrap();
        let sketch = dir.path().join("Demo");
        fs::create_dir_all(&sketch).unwrap();
        fs::write(
            sketch.join("Demo.ino"),
            "#include <Foo.h>\nvoid setup(){}\nvoid loop(){}\n",
        )
        .unwrap();
        let out_dir = dir.path().join("build").join("sketch");

        let output = preprocess(&sketch.join("Demo.ino"), &out_dir, DEFAULT_UMBRELLA_HEADER).unwrap();
        assert_eq!(output.cpp_path, out_dir.join("Demo.cpp"));
        assert_eq!(output.includes, ["Foo"]);

        let written = fs::read_to_string(&output.cpp_path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "#include <Arduino.h>");
        assert_eq!(lines[1], "#include <Foo.h>");
        assert_eq!(&lines[2..4], ["void setup();", "void loop();"]);
        assert_eq!(&lines[4..], ["void setup(){}", "void loop(){}"]);
    }

    #[test]
    fn test_preprocess_collects_declarations_from_siblings() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Main.ino"), "#include <Servo.h>\nvoid setup() {\n  helper();\n}\n").unwrap();
        fs::write(dir.path().join("helpers.ino"), "int helper()\n{\n  return 1;\n}\n").unwrap();

        let output = preprocess(&dir.path().join("Main.ino"), &dir.path().join("out"), "Arduino.h").unwrap();
        assert_eq!(output.declarations, ["void setup();", "int helper();"]);
        let written = fs::read_to_string(&output.cpp_path).unwrap();
        let helper_decl = written.find("int helper();").unwrap();
        let setup_body = written.find("void setup() {").unwrap();
        assert!(helper_decl < setup_body);
    }

    #[test]
    fn test_preprocess_keeps_unchanged_output() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("Same.ino");
        fs::write(&primary, "void loop() {}\n").unwrap();
        let out_dir = dir.path().join("out");

        let first = preprocess(&primary, &out_dir, "Arduino.h").unwrap();
        let before = fs::metadata(&first.cpp_path).unwrap().modified().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        preprocess(&primary, &out_dir, "Arduino.h").unwrap();
        let after = fs::metadata(&first.cpp_path).unwrap().modified().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_preprocess_missing_primary_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = preprocess(&dir.path().join("Missing.ino"), dir.path(), "Arduino.h").unwrap_err();
        assert!(matches!(err, SketchError::Read { .. }));
    }
}
