//! # ardent - Arduino sketch builder
//!
//! ardent reads an Arduino-style platform description (`platform.txt` and
//! `boards.txt`), expands its `{name}` recipes and turns a sketch into the
//! compile, archive, link and image conversion commands that are out of date.
//!
//! ## Module Organization
//!
//! - [`platform`] - Config parsing, layered lookup and placeholder expansion
//! - [`sketch`] - Merging `.ino` files and synthesizing forward declarations
//! - [`build`] - Build units, planning and execution
//! - [`config`] - Project configuration (`ardent.toml`)
//!
//! ```no_run
//! use ardent::platform::Platform;
//! use std::path::Path;
//!
//! let platform = Platform::open(Path::new("hardware/arduino/avr"), "uno")?;
//! if let Some(recipe) = platform.recipe("recipe.cpp.o.pattern")? {
//!     println!("{recipe}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Build units, planning and parallel execution.
pub mod build;

/// Project configuration (`ardent.toml`).
pub mod config;

/// `platform.txt` / `boards.txt` parsing and expansion.
pub mod platform;

/// Sketch preprocessing.
pub mod sketch;

/// Terminal tables.
pub mod ui;
