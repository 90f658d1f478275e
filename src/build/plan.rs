//! Build planning: which commands have to run, in which phase.
//!
//! The planner injects the runtime variables recipes expect, discovers core,
//! variant and library sources, resolves every source into a [`BuildUnit`]
//! and derives the archive, link and image conversion steps from them.

use super::command::{self, CommandError};
use super::unit::{self, BuildUnit};
use crate::platform::{self, ExpandError, Platform};
use crate::sketch::SketchOutput;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

const SOURCE_EXTENSIONS: [&str; 5] = ["c", "cpp", "cc", "S", "s"];
const ARCHIVE_FILE: &str = "core.a";
const DEFAULT_IDE_VERSION: &str = "10819";

#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Expand(#[from] ExpandError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("{first} and {second} would both be compiled to {output}")]
    DuplicateOutput {
        output: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("the platform does not define {0}")]
    MissingRecipe(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceGroup {
    Sketch,
    Variant,
    Library,
    Core,
}

impl SourceGroup {
    pub fn label(self) -> &'static str {
        match self {
            SourceGroup::Sketch => "sketch",
            SourceGroup::Variant => "variant",
            SourceGroup::Library => "library",
            SourceGroup::Core => "core",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompileUnit {
    pub group: SourceGroup,
    pub unit: BuildUnit,
}

/// A non-compile command in the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub label: String,
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BuildPlan {
    pub build_dir: PathBuf,
    pub compiles: Vec<CompileUnit>,
    pub archive: Vec<Step>,
    pub link: Option<Step>,
    pub outputs: Vec<Step>,
    pub elf_path: PathBuf,
}

impl BuildPlan {
    pub fn pending_compiles(&self) -> impl Iterator<Item = &CompileUnit> {
        self.compiles.iter().filter(|c| c.unit.needs_rebuild())
    }

    pub fn is_up_to_date(&self) -> bool {
        self.pending_compiles().next().is_none()
            && self.archive.is_empty()
            && self.link.is_none()
            && self.outputs.is_empty()
    }

    /// Every command in execution order, labelled.
    pub fn commands(&self) -> Vec<(String, Vec<String>)> {
        let mut commands: Vec<(String, Vec<String>)> = self
            .pending_compiles()
            .filter_map(|c| {
                let tokens = c.unit.command_tokens()?.to_vec();
                let label = format!("compile {}", c.unit.source_path().display());
                Some((label, tokens))
            })
            .collect();
        commands.extend(
            self.archive
                .iter()
                .chain(self.link.iter())
                .chain(self.outputs.iter())
                .map(|step| (step.label.clone(), step.tokens.clone())),
        );
        commands
    }
}

/// What the planner needs besides the platform.
#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    pub sketch: &'a SketchOutput,
    pub build_dir: &'a Path,
    /// Used for `{build.project_name}`, usually the primary sketch file name.
    pub project_name: &'a str,
    /// Extra directories searched for libraries before `<platform>/libraries`.
    pub library_roots: &'a [PathBuf],
}

/// Directories resolved while injecting runtime variables.
#[derive(Debug, Clone, Default)]
pub struct RuntimePaths {
    pub core: Option<PathBuf>,
    pub variant: Option<PathBuf>,
    pub archive: PathBuf,
}

/// Sets the variables a build expects to be computed at runtime.
pub fn inject_runtime_variables(
    platform: &mut Platform,
    build_dir: &Path,
    project_name: &str,
) -> RuntimePaths {
    let dir = platform.dir().to_path_buf();
    let archive = build_dir.join(ARCHIVE_FILE);

    platform.set("build.path", build_dir.to_string_lossy());
    platform.set("build.project_name", project_name);
    platform.set("runtime.platform.path", dir.to_string_lossy());
    platform.set("build.system.path", dir.join("system").to_string_lossy());
    platform.set("archive_file", ARCHIVE_FILE);
    platform.set("archive_file_path", archive.to_string_lossy());

    if let Some(arch) = dir.file_name() {
        platform.set("build.arch", arch.to_string_lossy().to_uppercase());
    }
    if platform.variable("software").is_none() {
        platform.set("software", "ARDUINO");
    }
    if platform.variable("runtime.ide.version").is_none() {
        platform.set("runtime.ide.version", DEFAULT_IDE_VERSION);
    }

    let core = platform
        .variable("build.core")
        .map(|core| dir.join("cores").join(strip_vendor(core)));
    if let Some(core) = &core {
        platform.set("build.core.path", core.to_string_lossy());
    }

    let variant = platform
        .variable("build.variant")
        .filter(|variant| !variant.is_empty())
        .map(|variant| dir.join("variants").join(strip_vendor(variant)));
    if let Some(variant) = &variant {
        platform.set("build.variant.path", variant.to_string_lossy());
    }

    RuntimePaths {
        core,
        variant,
        archive,
    }
}

/// `arduino:avr` style references point into another vendor's tree; only the
/// last part is used.
fn strip_vendor(reference: &str) -> &str {
    reference.rsplit(':').next().unwrap_or(reference)
}

/// Source files under `dir`, sorted. Directories named `examples` or
/// `extras` are skipped.
pub fn discover_sources(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut sources: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            let skipped = entry.file_type().is_dir() && (name == "examples" || name == "extras");
            entry.depth() == 0 || !skipped
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
        })
        .collect();
    sources.sort();
    sources
}

/// A library found for one of the sketch's includes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    pub name: String,
    pub include_dir: PathBuf,
    pub sources: Vec<PathBuf>,
}

/// Looks up each include name as a library directory under `roots`.
pub fn find_libraries(includes: &[String], roots: &[PathBuf]) -> Vec<Library> {
    let mut libraries = Vec::new();
    for name in includes {
        let Some(dir) = roots.iter().map(|root| root.join(name)).find(|dir| dir.is_dir()) else {
            debug!(include = %name, "no library directory");
            continue;
        };

        let library = if dir.join("src").is_dir() {
            let include_dir = dir.join("src");
            Library {
                name: name.clone(),
                sources: discover_sources(&include_dir, true),
                include_dir,
            }
        } else {
            let mut sources = discover_sources(&dir, false);
            sources.extend(discover_sources(&dir.join("utility"), true));
            Library {
                name: name.clone(),
                include_dir: dir,
                sources,
            }
        };
        libraries.push(library);
    }
    libraries
}

fn quoted_list<'a, I>(paths: I, prefix: &str) -> String
where
    I: IntoIterator<Item = &'a Path>,
{
    paths
        .into_iter()
        .map(|path| format!("\"{prefix}{}\"", path.display()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Expands a pattern, warning about placeholders nothing defines.
fn expanded_recipe(platform: &Platform, name: &str) -> Result<Option<String>, ExpandError> {
    let recipe = platform.recipe(name)?;
    if let Some(text) = &recipe {
        let leftovers: Vec<&str> = platform::placeholders(text)
            .into_iter()
            .filter(|p| *p != "source_file" && *p != "object_file")
            .collect();
        if !leftovers.is_empty() {
            warn!(recipe = name, ?leftovers, "recipe has undefined placeholders");
        }
    }
    Ok(recipe)
}

pub fn plan(platform: &mut Platform, request: &PlanRequest<'_>) -> Result<BuildPlan, PlanError> {
    let build_dir = request.build_dir;
    let paths = inject_runtime_variables(platform, build_dir, request.project_name);

    let mut roots = request.library_roots.to_vec();
    roots.push(platform.dir().join("libraries"));
    let libraries = find_libraries(&request.sketch.includes, &roots);

    let mut include_dirs: Vec<&Path> = Vec::new();
    include_dirs.extend(paths.core.as_deref());
    include_dirs.extend(paths.variant.as_deref());
    include_dirs.extend(libraries.iter().map(|lib| lib.include_dir.as_path()));
    platform.set("includes", quoted_list(include_dirs, "-I"));

    // (group, source, object dir)
    let mut sources: Vec<(SourceGroup, PathBuf, PathBuf)> = vec![(
        SourceGroup::Sketch,
        request.sketch.cpp_path.clone(),
        build_dir.join("sketch"),
    )];
    if let Some(variant) = &paths.variant {
        for source in discover_sources(variant, false) {
            sources.push((SourceGroup::Variant, source, build_dir.join("variant")));
        }
    }
    for library in &libraries {
        let obj_dir = build_dir.join("libraries").join(&library.name);
        for source in &library.sources {
            sources.push((SourceGroup::Library, source.clone(), obj_dir.clone()));
        }
    }
    if let Some(core) = &paths.core {
        for source in discover_sources(core, true) {
            sources.push((SourceGroup::Core, source, build_dir.join("core")));
        }
    }

    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
    for (_, source, obj_dir) in &sources {
        let output = unit::object_path(obj_dir, source);
        if let Some(first) = claimed.insert(output.clone(), source.clone()) {
            return Err(PlanError::DuplicateOutput {
                output,
                first,
                second: source.clone(),
            });
        }
    }

    let platform_ref: &Platform = platform;
    let compiles = sources
        .par_iter()
        .map(|(group, source, obj_dir)| -> Result<CompileUnit, PlanError> {
            let recipe = match platform::recipe_name_for(source) {
                Some(name) => expanded_recipe(platform_ref, name)?,
                None => None,
            };
            let unit = unit::resolve(obj_dir, source, recipe.as_deref())?;
            Ok(CompileUnit {
                group: *group,
                unit,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let (core, rest): (Vec<&CompileUnit>, Vec<&CompileUnit>) = compiles
        .iter()
        .filter(|c| platform::recipe_name_for(c.unit.source_path()).is_some())
        .partition(|c| c.group == SourceGroup::Core);
    let core_objects: Vec<&Path> = core.iter().map(|c| c.unit.output_path()).collect();
    let mut link_objects: Vec<&Path> = rest.iter().map(|c| c.unit.output_path()).collect();

    let mut archive = Vec::new();
    let archive_recipe = expanded_recipe(platform, platform::RECIPE_ARCHIVE)?;
    let archived = archive_recipe.is_some() && !core_objects.is_empty();
    match archive_recipe {
        Some(recipe) => {
            let core_changed = core.iter().any(|c| c.unit.needs_rebuild());
            if !core_objects.is_empty() && (core_changed || !paths.archive.exists()) {
                for object in &core_objects {
                    let text = command::substitute_files(&recipe, "", &object.to_string_lossy());
                    archive.push(Step {
                        label: format!("archive {}", object.display()),
                        tokens: command::tokenize(&text)?,
                    });
                }
            }
        }
        None => link_objects.extend(core_objects.iter().copied()),
    }

    platform.set("object_files", quoted_list(link_objects.iter().copied(), ""));

    let elf_path = build_dir.join(format!("{}.elf", request.project_name));
    let needs_link = !archive.is_empty()
        || compiles.iter().any(|c| c.unit.needs_rebuild())
        || link_objects.iter().any(|object| unit::is_stale(object, &elf_path))
        || (archived && unit::is_stale(&paths.archive, &elf_path));

    let mut link = None;
    let mut outputs = Vec::new();
    if needs_link {
        let recipe = expanded_recipe(platform, platform::RECIPE_LINK)?
            .ok_or(PlanError::MissingRecipe(platform::RECIPE_LINK))?;
        link = Some(Step {
            label: format!("link {}", elf_path.display()),
            tokens: command::tokenize(&recipe)?,
        });

        let names: Vec<String> = platform
            .objcopy_recipes()
            .into_iter()
            .map(str::to_string)
            .collect();
        for name in names {
            if let Some(recipe) = expanded_recipe(platform, &name)? {
                outputs.push(Step {
                    label: name.trim_end_matches(".pattern").to_string(),
                    tokens: command::tokenize(&recipe)?,
                });
            }
        }
    }

    debug!(
        compiles = compiles.len(),
        archive = archive.len(),
        link = link.is_some(),
        outputs = outputs.len(),
        "plan ready"
    );

    Ok(BuildPlan {
        build_dir: build_dir.to_path_buf(),
        compiles,
        archive,
        link,
        outputs,
        elf_path,
    })
}

/// Creates the object directories the plan writes into.
pub fn prepare_dirs(plan: &BuildPlan) -> std::io::Result<()> {
    fs::create_dir_all(&plan.build_dir)?;
    for compile in &plan.compiles {
        if let Some(parent) = compile.unit.output_path().parent() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
