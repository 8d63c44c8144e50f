//! Settings defaults: fills in every field that is missing or unusable.

use std::ops::RangeInclusive;

use serde_json::Value;

use crate::schema::{RawSettings, Settings};
use crate::validation::ValidationReport;

pub const DEFAULT_INCLUDE_SITE_NAME: bool = true;

pub const DEFAULT_PANEL_OPACITY: f64 = 0.65;

pub const DEFAULT_TOGGLE_SIZE_SCALE: f64 = 1.0;

pub const DEFAULT_TOGGLE_OPACITY: f64 = 1.0;

pub const DEFAULT_SHOW_LOGO: bool = false;

pub const DEFAULT_TEMP_BLOCKING_DISABLED: bool = false;

pub const PANEL_OPACITY_RANGE: RangeInclusive<f64> = 0.1..=1.0;

pub const TOGGLE_SIZE_SCALE_RANGE: RangeInclusive<f64> = 0.5..=2.0;

pub const TOGGLE_OPACITY_RANGE: RangeInclusive<f64> = 0.1..=1.0;

/// Turn stored settings into runtime settings, one field at a time.
///
/// Each field that is present but unusable is reported as a warning and
/// replaced by its default. Absent fields default silently.
pub fn apply_all_defaults(raw: RawSettings, report: &mut ValidationReport) -> Settings {
    Settings {
        include_site_name: bool_or_default(
            raw.include_site_name,
            "includeSiteName",
            DEFAULT_INCLUDE_SITE_NAME,
            report,
        ),
        panel_opacity: ranged_or_default(
            raw.panel_opacity,
            "panelOpacity",
            DEFAULT_PANEL_OPACITY,
            PANEL_OPACITY_RANGE,
            report,
        ),
        toggle_size_scale: ranged_or_default(
            raw.toggle_size_scale,
            "toggleSizeScale",
            DEFAULT_TOGGLE_SIZE_SCALE,
            TOGGLE_SIZE_SCALE_RANGE,
            report,
        ),
        toggle_opacity: ranged_or_default(
            raw.toggle_opacity,
            "toggleOpacity",
            DEFAULT_TOGGLE_OPACITY,
            TOGGLE_OPACITY_RANGE,
            report,
        ),
        show_logo: bool_or_default(raw.show_logo, "showLogo", DEFAULT_SHOW_LOGO, report),
        temp_blocking_disabled: bool_or_default(
            raw.temp_blocking_disabled,
            "tempBlockingDisabled",
            DEFAULT_TEMP_BLOCKING_DISABLED,
            report,
        ),
    }
}

fn bool_or_default(
    value: Option<Value>,
    path: &str,
    default: bool,
    report: &mut ValidationReport,
) -> bool {
    match value {
        None | Some(Value::Null) => default,
        Some(Value::Bool(b)) => b,
        Some(other) => {
            report.warn(path, format!("expected a boolean, got {other}; using {default}"));
            default
        }
    }
}

fn ranged_or_default(
    value: Option<Value>,
    path: &str,
    default: f64,
    range: RangeInclusive<f64>,
    report: &mut ValidationReport,
) -> f64 {
    match value {
        None | Some(Value::Null) => default,
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) if range.contains(&v) => v,
            _ => {
                report.warn(
                    path,
                    format!(
                        "{n} is outside {}..={}; using {default}",
                        range.start(),
                        range.end()
                    ),
                );
                default
            }
        },
        Some(other) => {
            report.warn(path, format!("expected a number, got {other}; using {default}"));
            default
        }
    }
}
