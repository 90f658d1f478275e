use super::command;
use super::feedback::FeedbackAnalyzer;
use super::plan::{self, BuildPlan, PlanRequest, Step};
use crate::config::ProjectConfig;
use crate::platform::{self, Platform};
use crate::sketch::{self, SketchOutput};
use anyhow::{Context, Result, bail};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::Instant;

pub const COMPILE_COMMANDS: &str = "compile_commands.json";

/// Opens the configured platform and applies `[variables]` overrides.
pub fn open_platform(config: &ProjectConfig) -> Result<Platform> {
    let mut platform = Platform::open(&config.board.platform, &config.board.id)
        .with_context(|| format!("Failed to load platform {}", config.board.platform.display()))?;
    if let Some(root) = &config.board.ide_root {
        platform.set("runtime.ide.path", root.to_string_lossy());
    }
    for (name, value) in &config.variables {
        platform.set(name.clone(), value.clone());
    }
    Ok(platform)
}

pub fn preprocess_sketch(config: &ProjectConfig) -> Result<SketchOutput> {
    let output = sketch::preprocess(
        &config.sketch.path,
        &config.build.dir.join("sketch"),
        config.umbrella_header(),
    )
    .with_context(|| format!("Failed to preprocess {}", config.sketch.path.display()))?;
    Ok(output)
}

/// Preprocesses the sketch and plans the build without running anything.
pub fn plan_project(config: &ProjectConfig) -> Result<(Platform, SketchOutput, BuildPlan)> {
    let mut platform = open_platform(config)?;
    let sketch = preprocess_sketch(config)?;
    let project_name = config.project_name();
    let request = PlanRequest {
        sketch: &sketch,
        build_dir: &config.build.dir,
        project_name: &project_name,
        library_roots: &config.sketch.libraries,
    };
    let plan = plan::plan(&mut platform, &request).context("Failed to plan the build")?;
    Ok((platform, sketch, plan))
}

/// One `compile_commands.json` entry per compile unit, including up-to-date ones.
pub fn compile_commands(platform: &Platform, plan: &BuildPlan) -> Result<Vec<serde_json::Value>> {
    let directory = std::env::current_dir()?;
    let mut entries = Vec::new();
    for compile in &plan.compiles {
        let unit = &compile.unit;
        let tokens = match unit.command_tokens() {
            Some(tokens) => tokens.to_vec(),
            None => {
                let Some(recipe) = platform.recipe_for(unit.source_path())? else {
                    continue;
                };
                let text = command::substitute_files(
                    &recipe,
                    &unit.source_path().to_string_lossy(),
                    &unit.output_path().to_string_lossy(),
                );
                command::tokenize(&text)?
            }
        };
        entries.push(json!({
            "directory": directory.to_string_lossy(),
            "arguments": tokens,
            "file": unit.source_path().to_string_lossy(),
            "output": unit.output_path().to_string_lossy(),
        }));
    }
    Ok(entries)
}

pub fn write_compile_commands(platform: &Platform, plan: &BuildPlan) -> Result<PathBuf> {
    let entries = compile_commands(platform, plan)?;
    let path = plan.build_dir.join(COMPILE_COMMANDS);
    fs::write(&path, serde_json::to_string_pretty(&entries)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Prints every command the plan would run.
pub fn print_plan(plan: &BuildPlan) {
    if plan.is_up_to_date() {
        println!("{} Up to date", "⚡".green());
        return;
    }
    for (label, tokens) in plan.commands() {
        println!("{} {}", "→".dimmed(), label.bold());
        println!("    {}", command::join(&tokens));
    }
}

fn run(tokens: &[String]) -> Result<Output> {
    let Some((program, args)) = tokens.split_first() else {
        bail!("empty command");
    };
    Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("Failed to execute {program}"))
}

fn report_failure(what: &str, output: &Output) {
    let stderr = String::from_utf8_lossy(&output.stderr);
    println!("{} {} failed:\n{}", "x".red(), what, stderr);
    if let Some(hint) = FeedbackAnalyzer::analyze(&stderr) {
        println!("\n{} {}", "💡".yellow(), hint);
    }
}

/// Runs a sequential phase; false if any step failed.
fn run_steps(steps: &[Step], message: &str) -> Result<bool> {
    if steps.is_empty() {
        return Ok(true);
    }
    println!("   {} {}", "→".cyan(), message);
    for step in steps {
        let output = run(&step.tokens)?;
        if !output.status.success() {
            report_failure(&step.label, &output);
            return Ok(false);
        }
    }
    Ok(true)
}

fn compile_all(plan: &BuildPlan) -> Result<bool> {
    let pending: Vec<_> = plan.pending_compiles().collect();
    if pending.is_empty() {
        return Ok(true);
    }

    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
        .progress_chars("#>-");
    let pb = ProgressBar::new(pending.len() as u64);
    pb.set_style(style);
    pb.set_message("Compiling...");

    let failures: usize = pending
        .par_iter()
        .map(|compile| -> Result<usize> {
            let unit = &compile.unit;
            let Some(tokens) = unit.command_tokens() else {
                pb.inc(1);
                return Ok(0);
            };
            let name = unit
                .source_path()
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            pb.set_message(format!("Compiling {} ({})", name, compile.group.label()));

            let output = run(tokens)?;
            let stderr = String::from_utf8_lossy(&output.stderr);
            pb.inc(1);
            if !output.status.success() {
                pb.suspend(|| report_failure(&format!("Compiling {}", unit.source_path().display()), &output));
                return Ok(1);
            }
            if !stderr.trim().is_empty() {
                pb.println(format!(
                    "{} Warning in {}:\n{}",
                    "!".yellow(),
                    unit.source_path().display(),
                    stderr
                ));
            }
            Ok(0)
        })
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .sum();

    if failures > 0 {
        pb.abandon_with_message(format!("{failures} file(s) failed"));
        return Ok(false);
    }
    pb.finish_with_message("Compilation complete");
    Ok(true)
}

/// Runs a plan. Returns false when a command failed; its output has
/// already been reported.
pub fn execute(plan: &BuildPlan, jobs: Option<usize>) -> Result<bool> {
    plan::prepare_dirs(plan).context("Failed to create build directories")?;

    let compiled = match jobs {
        Some(jobs) => rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .context("Failed to create the compile thread pool")?
            .install(|| compile_all(plan))?,
        None => compile_all(plan)?,
    };
    if !compiled {
        return Ok(false);
    }

    if !run_steps(&plan.archive, "Archiving core...")? {
        return Ok(false);
    }
    if let Some(link) = &plan.link
        && !run_steps(std::slice::from_ref(link), "Linking...")?
    {
        return Ok(false);
    }
    run_steps(&plan.outputs, "Converting images...")
}

// --- CORE: Build Project ---
pub fn build_project(config: &ProjectConfig, jobs: Option<usize>) -> Result<bool> {
    let start_time = Instant::now();
    let (platform, sketch, plan) = plan_project(config)?;
    println!(
        "{} {} ({} declarations, {} includes)",
        "✓".green(),
        sketch.cpp_path.display(),
        sketch.declarations.len(),
        sketch.includes.len()
    );

    fs::create_dir_all(&plan.build_dir)
        .with_context(|| format!("Failed to create {}", plan.build_dir.display()))?;
    write_compile_commands(&platform, &plan)?;

    if plan.is_up_to_date() {
        println!("{} Up to date", "⚡".green());
        return Ok(true);
    }

    if !execute(&plan, jobs.or(config.build.jobs))? {
        println!("{} Build failed", "x".red());
        return Ok(false);
    }

    println!(
        "{} Build finished in {:.2?} → {}",
        "✓".green(),
        start_time.elapsed(),
        plan.elf_path.display()
    );
    Ok(true)
}

/// Prints a fully expanded pattern.
pub fn show_recipe(config: &ProjectConfig, name: &str) -> Result<()> {
    let mut platform = open_platform(config)?;
    plan::inject_runtime_variables(&mut platform, &config.build.dir, &config.project_name());
    match platform.recipe(name)? {
        Some(text) => {
            let tokens = command::tokenize(&text)?;
            println!("{}", command::join(&tokens));
            Ok(())
        }
        None => bail!(
            "{name} is not defined by {}\n\n💡 Tip: Run 'ardent vars pattern' to list the available patterns.",
            platform::PLATFORM_FILE
        ),
    }
}
