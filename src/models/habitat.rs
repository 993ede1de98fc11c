//! Domain types for the habitat dashboard: roles, control groups and their
//! control items.
//!
//! Notes
//! - Ids are string newtypes; group ids are time-based, control ids are only
//!   unique within their owning group.
//! - Time-of-day fields stay `"HH:MM"` strings, as entered by the user.

use core::fmt;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// =====================
// Scalar ID newtype wrappers
// =====================

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlId(pub String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        GroupId(id.into())
    }
}

impl ControlId {
    pub fn new(id: impl Into<String>) -> Self {
        ControlId(id.into())
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =====================
// Enums
// =====================

/// Permission level of whoever is driving the dashboard.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Viewer,
    #[default]
    Operator,
    Programmer,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Viewer => "viewer",
            UserRole::Operator => "operator",
            UserRole::Programmer => "programmer",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "viewer" => Ok(UserRole::Viewer),
            "operator" => Ok(UserRole::Operator),
            "programmer" => Ok(UserRole::Programmer),
            other => Err(format!(
                "unknown role '{}': expected viewer, operator or programmer",
                other
            )),
        }
    }
}

/// Commanded state of a control.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    #[default]
    Off,
    Auto,
    On,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlIcon {
    Lightbulb,
    Moon,
}

impl ControlIcon {
    /// `"light"` controls get a lightbulb, everything else a moon.
    pub fn for_control_type(control_type: &str) -> Self {
        if control_type == "light" {
            ControlIcon::Lightbulb
        } else {
            ControlIcon::Moon
        }
    }
}

// =====================
// Auto settings
// =====================

pub const DEFAULT_START_TIME: &str = "00:00";
pub const DEFAULT_END_TIME: &str = "23:59";

/// Stored auto-mode schedule. Defaults are applied when a patch is merged, so
/// only `enabled` can be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoSettings {
    pub start_time: String,
    pub end_time: String,
    /// Seconds.
    pub duration: u32,
    /// Seconds between periodic evaluations; 0 means the default cadence.
    pub interval: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl AutoSettings {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }
}

/// Fields supplied by a save of the auto-mode form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoSettingsPatch {
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub interval: Option<u32>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

// =====================
// Controls and groups
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlItem {
    pub id: ControlId,
    pub title: String,
    pub icon: ControlIcon,
    pub mode: ControlMode,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_settings: Option<AutoSettings>,
}

impl ControlItem {
    /// A control as it appears in the seed data: off, inactive, unconfigured.
    pub fn seeded(id: &str, title: &str, icon: ControlIcon) -> Self {
        ControlItem {
            id: ControlId::new(id),
            title: title.to_string(),
            icon,
            mode: ControlMode::Off,
            is_active: false,
            name: None,
            kind: None,
            auto_settings: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlGroup {
    pub id: GroupId,
    pub name: String,
    pub controls: Vec<ControlItem>,
    pub expanded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Programmer".parse::<UserRole>(), Ok(UserRole::Programmer));
        assert_eq!(" viewer ".parse::<UserRole>(), Ok(UserRole::Viewer));
        assert!("admin".parse::<UserRole>().is_err());
        assert_eq!(UserRole::default(), UserRole::Operator);
    }

    #[test]
    fn icon_follows_control_type() {
        assert_eq!(ControlIcon::for_control_type("light"), ControlIcon::Lightbulb);
        assert_eq!(ControlIcon::for_control_type("pump"), ControlIcon::Moon);
        assert_eq!(ControlIcon::for_control_type("Light"), ControlIcon::Moon);
    }

    #[test]
    fn control_serializes_with_dashboard_field_names() {
        let mut control = ControlItem::seeded("4", "Water Filter", ControlIcon::Moon);
        control.auto_settings = Some(AutoSettings {
            start_time: "08:00".into(),
            end_time: "20:00".into(),
            duration: 0,
            interval: 5,
            enabled: Some(true),
        });
        let value = serde_json::to_value(&control).expect("serialize control");
        assert_eq!(value["isActive"], serde_json::json!(false));
        assert_eq!(value["mode"], serde_json::json!("off"));
        assert_eq!(value["icon"], serde_json::json!("moon"));
        assert_eq!(value["autoSettings"]["startTime"], serde_json::json!("08:00"));
        assert!(value.get("type").is_none());
    }
}
