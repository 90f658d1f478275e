//! Build artifact cleanup (`ardent clean`).

use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::Path;

/// Removes the build directory. Returns whether anything was removed.
pub fn clean(build_dir: &Path) -> Result<bool> {
    if !build_dir.exists() {
        println!("{} Nothing to clean", "!".yellow());
        return Ok(false);
    }

    fs::remove_dir_all(build_dir)
        .with_context(|| format!("Failed to remove {}", build_dir.display()))?;
    println!("{} Removed {}", "✓".green(), build_dir.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_removes_build_dir() {
        let dir = tempfile::tempdir().unwrap();
        let build = dir.path().join("build");
        fs::create_dir_all(build.join("core")).unwrap();
        fs::write(build.join("core").join("main.cpp.o"), "").unwrap();

        assert!(clean(&build).unwrap());
        assert!(!build.exists());
        assert!(!clean(&build).unwrap());
    }
}
