//! Per-project PRISM state, owned entirely by the project directory's
//! `.prism/` folder.

pub mod config;
pub mod layout;
pub mod templates;

pub use {
    config::{ProjectConfig, load_project_config, save_project_config, update_task_map},
    layout::PrismDir,
};
