//! Veil settings schema.
//!
//! [`Settings`] is the validated, fully-populated form used at runtime.
//! [`RawSettings`] is what comes out of storage: every field optional and
//! untyped, so one bad field never discards the others.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::defaults::{
    DEFAULT_INCLUDE_SITE_NAME, DEFAULT_PANEL_OPACITY, DEFAULT_SHOW_LOGO,
    DEFAULT_TEMP_BLOCKING_DISABLED, DEFAULT_TOGGLE_OPACITY, DEFAULT_TOGGLE_SIZE_SCALE,
};

// ---------------------------------------------------------------------------
// Runtime settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Prefix new rules with the current host.
    pub include_site_name: bool,

    /// Opacity of the selection panel, `0.1..=1.0`.
    pub panel_opacity: f64,

    /// Size multiplier of the floating toggle button, `0.5..=2.0`.
    pub toggle_size_scale: f64,

    /// Opacity of the floating toggle button, `0.1..=1.0`.
    pub toggle_opacity: f64,

    /// Show the logo on the toggle button.
    pub show_logo: bool,

    /// Lift all suppression without touching the stored rules.
    pub temp_blocking_disabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            include_site_name: DEFAULT_INCLUDE_SITE_NAME,
            panel_opacity: DEFAULT_PANEL_OPACITY,
            toggle_size_scale: DEFAULT_TOGGLE_SIZE_SCALE,
            toggle_opacity: DEFAULT_TOGGLE_OPACITY,
            show_logo: DEFAULT_SHOW_LOGO,
            temp_blocking_disabled: DEFAULT_TEMP_BLOCKING_DISABLED,
        }
    }
}

// ---------------------------------------------------------------------------
// Stored form
// ---------------------------------------------------------------------------

/// Settings as found in storage, before defaults are applied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSettings {
    pub include_site_name: Option<Value>,
    pub panel_opacity: Option<Value>,
    pub toggle_size_scale: Option<Value>,
    pub toggle_opacity: Option<Value>,
    pub show_logo: Option<Value>,
    pub temp_blocking_disabled: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(json["includeSiteName"], Value::Bool(true));
        assert_eq!(json["panelOpacity"], serde_json::json!(0.65));
        assert_eq!(json["tempBlockingDisabled"], Value::Bool(false));
    }

    #[test]
    fn raw_settings_accept_any_field_types() {
        let raw: RawSettings =
            serde_json::from_str(r#"{"panelOpacity": "loud", "showLogo": 1, "extra": true}"#)
                .unwrap();
        assert_eq!(raw.panel_opacity, Some(Value::String("loud".into())));
        assert_eq!(raw.show_logo, Some(serde_json::json!(1)));
        assert!(raw.include_site_name.is_none());
    }
}
