//! Configuration
//!
//! Loading, validation and overrides for the controller's YAML
//! configuration. Every field has a default, so no file is required.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLoader, ConfigOverrides, LoadResult, LoadWarning, LoaderOptions};
pub use schema::*;
pub use validation::{ValidationResult, Validator};
