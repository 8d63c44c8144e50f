//! `veil-config`: Veil settings management.
//!
//! Provides:
//! - Typed settings schema with a lenient stored form
//! - Per-field defaults for missing or unusable values
//! - Range validation
//! - Load/save through the key-value store, JSON Merge Patch updates
//! - A debounced writer for rapidly changing settings

pub mod debounce;
pub mod defaults;
pub mod io;
pub mod schema;
pub mod validation;

pub use debounce::{DebouncedWriter, DEFAULT_QUIET_PERIOD};
pub use defaults::apply_all_defaults;
pub use io::{
    apply_merge_patch, data_dir, load_settings, parse_settings, save_settings, store_file_path,
    SETTINGS_KEY,
};
pub use schema::{RawSettings, Settings};
pub use validation::{validate, ConfigValidationError, ValidationReport};
