use colored::*;
use regex::Regex;
use std::sync::LazyLock;

static MISSING_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"fatal error: ([\w./-]+): No such file or directory")
        .expect("header regex is valid")
});

static UNDECLARED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"'(\w+)' was not declared in this scope").expect("undeclared regex is valid")
});

/// Turns compiler and linker output into a hint for the user.
pub struct FeedbackAnalyzer;

impl FeedbackAnalyzer {
    pub fn analyze(output: &str) -> Option<String> {
        if output.contains("will not fit in region") || output.contains("region `text' overflowed")
        {
            return Some(format!(
                "The sketch is {} for the selected board.\nTry removing unused libraries or check the {} in {}.",
                "too big".bold().red(),
                "board id".bold().yellow(),
                "ardent.toml".bold().yellow()
            ));
        }

        if output.contains("undefined reference to `setup'")
            || output.contains("undefined reference to `loop'")
        {
            return Some(format!(
                "Every sketch needs {} and {} functions.",
                "setup()".bold().yellow(),
                "loop()".bold().yellow()
            ));
        }

        if output.contains("undefined reference to") {
            return Some(format!(
                "It looks like a {} error.\nA library's sources may be missing; only libraries {} by the sketch's leading includes are compiled.",
                "Linker".bold().red(),
                "#include".bold().green()
            ));
        }

        if let Some(caps) = MISSING_HEADER.captures(output) {
            let header = &caps[1];
            let library = header.split('.').next().unwrap_or(header);
            return Some(format!(
                "It looks like a {} error ({}).\nInstall a library named {} in the platform's libraries/ directory or list its parent in {} of {}.",
                "Missing Header".bold().red(),
                header,
                library.bold().green(),
                "[sketch] libraries".bold().yellow(),
                "ardent.toml".bold().yellow()
            ));
        }

        if let Some(caps) = UNDECLARED.captures(output) {
            return Some(format!(
                "{} is used before it is declared.\nForward declarations are only generated for functions; declare globals and types above their first use.",
                caps[1].bold().yellow()
            ));
        }

        None
    }
}
