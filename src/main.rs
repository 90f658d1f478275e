//! # ardent CLI Entry Point
//!
//! Parses arguments with clap, loads `ardent.toml` and routes commands to
//! the library.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ardent::build;
use ardent::config::{self, ProjectConfig};
use ardent::ui;

#[derive(Parser)]
#[command(name = "ardent")]
#[command(about = "Builds Arduino sketches from platform.txt recipes", version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    /// Show debug diagnostics (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Project configuration file
    #[arg(long, global = true, default_value = config::CONFIG_FILE)]
    config: PathBuf,
    /// Board id to use instead of the configured one
    #[arg(long, global = true)]
    board: Option<String>,
    /// Build directory to use instead of the configured one
    #[arg(long, global = true)]
    build_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the sketch into one C++ file with forward declarations
    Sketch,
    /// Print a pattern from platform.txt fully expanded
    Recipe {
        /// Pattern name, e.g. recipe.cpp.o.pattern
        name: String,
    },
    /// List variables and patterns
    Vars {
        /// Only names containing this text
        filter: Option<String>,
    },
    /// Show what a build would run, without running it
    Plan,
    /// Compile, archive, link and convert the sketch
    Build {
        /// Number of parallel compile jobs
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Remove the build directory
    Clean,
    /// Generate shell completions
    Completion { shell: Shell },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn load(cli: &Cli) -> Result<ProjectConfig> {
    let mut project = config::load_config(&cli.config)?;
    if let Some(board) = &cli.board {
        project.board.id = board.clone();
    }
    if let Some(dir) = &cli.build_dir {
        project.build.dir = dir.clone();
    }
    Ok(project)
}

fn print_sketch(project: &ProjectConfig) -> Result<()> {
    let output = build::preprocess_sketch(project)?;
    println!("{} Wrote {}", "✓".green(), output.cpp_path.display());
    if !output.includes.is_empty() {
        println!("   {} includes: {}", "→".dimmed(), output.includes.join(", "));
    }
    for declaration in &output.declarations {
        println!("   {} {}", "+".green(), declaration);
    }
    Ok(())
}

fn print_vars(project: &ProjectConfig, filter: Option<&str>) -> Result<()> {
    let platform = build::open_platform(project)?;
    let mut table = ui::Table::new(&["Name", "Kind", "Value"]);
    let mut seen = HashSet::new();

    let stores = [("var", platform.variables()), ("pattern", platform.patterns())];
    for (kind, store) in stores {
        for (name, value) in store.iter() {
            if filter.is_some_and(|f| !name.contains(f)) || !seen.insert(name) {
                continue;
            }
            table.add_row(vec![name.to_string(), kind.to_string(), value.to_string()]);
        }
    }

    if table.is_empty() {
        println!("{} No matching entries", "!".yellow());
    } else {
        table.print();
    }
    Ok(())
}

fn print_plan(project: &ProjectConfig) -> Result<()> {
    let (_, _, plan) = build::plan_project(project)?;

    let mut table = ui::Table::new(&["Group", "Source", "Status"]);
    for compile in &plan.compiles {
        let status = if compile.unit.needs_rebuild() {
            "compile".yellow().to_string()
        } else {
            "fresh".green().to_string()
        };
        table.add_row(vec![
            compile.group.label().to_string(),
            compile.unit.source_path().display().to_string(),
            status,
        ]);
    }
    table.print();
    build::print_plan(&plan);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Sketch => print_sketch(&load(&cli)?),
        Commands::Recipe { name } => build::show_recipe(&load(&cli)?, name),
        Commands::Vars { filter } => print_vars(&load(&cli)?, filter.as_deref()),
        Commands::Plan => print_plan(&load(&cli)?),
        Commands::Build { jobs } => {
            if !build::build_project(&load(&cli)?, *jobs)? {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Clean => build::clean(&load(&cli)?.build.dir).map(|_| ()),
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, bin_name, &mut std::io::stdout());
            Ok(())
        }
    }
}
