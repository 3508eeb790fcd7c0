//! Task-list handling: parse `tasks.md` files and emit augmented copies
//! with per-task context blocks.

pub mod augment;
pub mod parser;

pub use {
    augment::{AUGMENT_MARKER, AugmentOptions, AugmentOutcome, augment_file, is_augmented},
    parser::{ParsedTask, parse_tasks, slug},
};
