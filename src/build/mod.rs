pub mod command;
pub mod plan;
pub mod unit;

mod clean;
mod core;
mod feedback;

pub use clean::clean;
pub use core::{
    COMPILE_COMMANDS, build_project, compile_commands, execute, open_platform, plan_project,
    preprocess_sketch, print_plan, show_recipe, write_compile_commands,
};
pub use feedback::FeedbackAnalyzer;
pub use plan::{BuildPlan, PlanError, PlanRequest, SourceGroup, Step};
pub use unit::{BuildUnit, is_stale, object_path, resolve};
