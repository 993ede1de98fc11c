//! Scripted dashboard sessions.
//!
//! A scenario is a JSON list of timed steps, each one action a user could take
//! on the panel:
//!
//! ```json
//! { "steps": [
//!     { "at_secs": 0, "action": "set_role", "role": "programmer" },
//!     { "at_secs": 1, "action": "save_auto_settings", "group_id": "1", "control_id": "2",
//!       "settings": { "startTime": "22:00", "endTime": "06:00", "interval": 4 } },
//!     { "at_secs": 2, "action": "set_control_mode", "group_id": "1", "control_id": "2", "mode": "auto" }
//! ] }
//! ```

use crate::models::habitat::{AutoSettingsPatch, ControlId, ControlMode, GroupId, UserRole};
use crate::services::dashboard::{Dashboard, PanelError};
use core::fmt;
use log::{info, warn};
use serde::Deserialize;
use std::error::Error;
use std::path::Path;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub enum ScenarioError {
    Io(std::io::Error),
    /// Parse failure with the JSON path of the offending value.
    Parse { path: String, source: serde_json::Error },
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioError::Io(e) => write!(f, "io error: {}", e),
            ScenarioError::Parse { path, source } => write!(f, "invalid scenario at {}: {}", path, source),
        }
    }
}

impl Error for ScenarioError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ScenarioError::Io(e) => Some(e),
            ScenarioError::Parse { source, .. } => Some(source),
        }
    }
}

impl From<std::io::Error> for ScenarioError {
    fn from(value: std::io::Error) -> Self {
        ScenarioError::Io(value)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    SetRole {
        role: UserRole,
    },
    CycleRole,
    SetControlMode {
        group_id: GroupId,
        control_id: ControlId,
        mode: ControlMode,
    },
    SaveAutoSettings {
        group_id: GroupId,
        control_id: ControlId,
        settings: AutoSettingsPatch,
    },
    AddGroup {
        name: String,
    },
    EditGroup {
        group_id: GroupId,
        name: String,
    },
    DeleteGroup {
        group_id: GroupId,
    },
    ToggleGroupExpanded {
        group_id: GroupId,
    },
    AddControl {
        name: String,
        control_type: String,
    },
    DeleteControl {
        group_id: GroupId,
        control_id: ControlId,
    },
    SelectGroup {
        group_id: GroupId,
    },
    ShowAllControls,
    PauseMetric {
        title: String,
    },
    ResumeMetric {
        title: String,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub at_secs: u64,
    #[serde(flatten)]
    pub action: Action,
}

impl Step {
    fn due_at(&self, started: Instant) -> Option<Instant> {
        started.checked_add(Duration::from_secs(self.at_secs))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Scenario {
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        let de = &mut serde_json::Deserializer::from_str(json);
        let mut scenario: Scenario = serde_path_to_error::deserialize(de).map_err(|e| ScenarioError::Parse {
            path: e.path().to_string(),
            source: e.into_inner(),
        })?;
        // stable: steps sharing a second keep their file order
        scenario.steps.sort_by_key(|s| s.at_secs);
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn into_player(self) -> ScenarioPlayer {
        ScenarioPlayer {
            steps: self.steps,
            cursor: 0,
        }
    }
}

/// Replays scenario steps as their offsets from the start elapse.
pub struct ScenarioPlayer {
    steps: Vec<Step>,
    cursor: usize,
}

impl ScenarioPlayer {
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.steps.len()
    }

    /// When the next step falls due. `None` once finished, or when the step's
    /// offset lies beyond what the clock can represent.
    pub fn next_deadline(&self, started: Instant) -> Option<Instant> {
        self.steps.get(self.cursor).and_then(|s| s.due_at(started))
    }

    /// Apply every step due by `now`. Rejected actions are logged and skipped.
    /// Returns how many steps were applied successfully.
    pub fn apply_due(&mut self, dashboard: &mut Dashboard, started: Instant, now: Instant) -> usize {
        let mut applied = 0;
        while let Some(step) = self.steps.get(self.cursor) {
            // unrepresentable offsets never come due
            if step.due_at(started).is_none_or(|due| due > now) {
                break;
            }
            self.cursor += 1;
            match apply(dashboard, &step.action, now) {
                Ok(()) => {
                    info!("Scenario: t+{}s {:?}", step.at_secs, step.action);
                    applied += 1;
                }
                Err(e) => warn!("Scenario: t+{}s {:?} rejected: {}", step.at_secs, step.action, e),
            }
        }
        applied
    }
}

pub fn apply(dashboard: &mut Dashboard, action: &Action, now: Instant) -> Result<(), PanelError> {
    match action {
        Action::SetRole { role } => dashboard.set_role(*role),
        Action::CycleRole => {
            dashboard.cycle_role();
        }
        Action::SetControlMode {
            group_id,
            control_id,
            mode,
        } => dashboard.set_control_mode(group_id, control_id, *mode)?,
        Action::SaveAutoSettings {
            group_id,
            control_id,
            settings,
        } => dashboard.save_auto_settings(group_id, control_id, settings.clone())?,
        Action::AddGroup { name } => {
            dashboard.add_group(name)?;
        }
        Action::EditGroup { group_id, name } => dashboard.edit_group(group_id, name)?,
        Action::DeleteGroup { group_id } => dashboard.delete_group(group_id)?,
        Action::ToggleGroupExpanded { group_id } => dashboard.toggle_group_expanded(group_id)?,
        Action::AddControl { name, control_type } => {
            dashboard.add_control(name, control_type)?;
        }
        Action::DeleteControl { group_id, control_id } => dashboard.delete_control(group_id, control_id)?,
        Action::SelectGroup { group_id } => dashboard.select_group(group_id.clone()),
        Action::ShowAllControls => dashboard.show_all_controls(),
        Action::PauseMetric { title } => dashboard.pause_metric(title)?,
        Action::ResumeMetric { title } => dashboard.resume_metric(title, now)?,
    }
    dashboard.sync_cards(now);
    Ok(())
}
