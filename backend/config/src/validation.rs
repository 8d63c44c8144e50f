//! Settings validation with field paths and user-facing messages.

use thiserror::Error;

use crate::defaults::{PANEL_OPACITY_RANGE, TOGGLE_OPACITY_RANGE, TOGGLE_SIZE_SCALE_RANGE};
use crate::schema::Settings;

/// A settings validation problem with field path and message.
#[derive(Debug, Error)]
#[error("Settings validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation problems found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    pub(crate) fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Emit every warning and error through `tracing`.
    pub fn log(&self) {
        for warning in &self.warnings {
            tracing::warn!(path = %warning.path, message = %warning.message, "Settings warning");
        }
        for error in &self.errors {
            tracing::error!(path = %error.path, message = %error.message, "Settings error");
        }
    }
}

/// Validate in-memory settings (e.g. after a slider change).
pub fn validate(settings: &Settings) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_range(
        &mut report,
        "panelOpacity",
        settings.panel_opacity,
        PANEL_OPACITY_RANGE.start(),
        PANEL_OPACITY_RANGE.end(),
    );
    check_range(
        &mut report,
        "toggleSizeScale",
        settings.toggle_size_scale,
        TOGGLE_SIZE_SCALE_RANGE.start(),
        TOGGLE_SIZE_SCALE_RANGE.end(),
    );
    check_range(
        &mut report,
        "toggleOpacity",
        settings.toggle_opacity,
        TOGGLE_OPACITY_RANGE.start(),
        TOGGLE_OPACITY_RANGE.end(),
    );
    report
}

fn check_range(report: &mut ValidationReport, path: &str, value: f64, min: &f64, max: &f64) {
    if !value.is_finite() {
        report.error(path, "must be a finite number");
    } else if value < *min || value > *max {
        report.error(path, format!("{value} must be between {min} and {max}"));
    }
}
