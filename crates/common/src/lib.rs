//! Shared error taxonomy and result alias used across the PRISM crates.

pub mod error;

pub use error::{Error, Result};
