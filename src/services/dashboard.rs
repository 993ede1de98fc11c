//! The caller side of the stores: role checks, input validation, mounted
//! control cards and metric feeds.
//!
//! Store operations stay silent on unknown ids; the dashboard only rejects
//! what a user could not have done from the panel (wrong role, blank names,
//! no group selected).

use crate::models::habitat::{AutoSettingsPatch, ControlId, ControlMode, GroupId, UserRole};
use crate::services::auto_mode::ControlCard;
use crate::services::metrics::{FeedSettings, MetricFeed, HABITAT_METRICS};
use crate::stores::groups::GroupsStore;
use crate::stores::user_mode::UserModeStore;
use chrono::{DateTime, Local};
use core::fmt;
use log::info;
use rand::rngs::SmallRng;
use std::error::Error;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelError {
    /// The current role may not perform this action.
    PermissionDenied { action: &'static str, role: UserRole },
    /// Name was empty after trimming.
    EmptyName,
    /// Adding a control needs a selected group.
    NoActiveGroup,
    UnknownMetric(String),
}

impl fmt::Display for PanelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelError::PermissionDenied { action, role } => {
                write!(f, "{} is not allowed for role {}", action, role)
            }
            PanelError::EmptyName => write!(f, "name must not be empty"),
            PanelError::NoActiveGroup => write!(f, "no group selected"),
            PanelError::UnknownMetric(title) => write!(f, "unknown metric '{}'", title),
        }
    }
}

impl Error for PanelError {}

pub struct Dashboard {
    user_mode: UserModeStore,
    groups: GroupsStore,
    cards: Vec<ControlCard>,
    feeds: Vec<MetricFeed>,
    rng: SmallRng,
}

impl Dashboard {
    /// Mount a card for every control currently in `groups`, and one feed per
    /// habitat metric.
    pub fn new(
        user_mode: UserModeStore,
        groups: GroupsStore,
        feed_settings: FeedSettings,
        mut rng: SmallRng,
        wall_clock: DateTime<Local>,
        now: Instant,
    ) -> Self {
        let cards = groups
            .groups()
            .iter()
            .flat_map(|g| {
                g.controls
                    .iter()
                    .map(|c| ControlCard::new(g.id.clone(), c.id.clone()))
            })
            .collect();
        let feeds = HABITAT_METRICS
            .iter()
            .map(|spec| MetricFeed::new(*spec, feed_settings, wall_clock, now, &mut rng))
            .collect();
        Dashboard {
            user_mode,
            groups,
            cards,
            feeds,
            rng,
        }
    }

    pub fn role(&self) -> UserRole {
        self.user_mode.mode()
    }

    pub fn groups(&self) -> &GroupsStore {
        &self.groups
    }

    pub fn cards(&self) -> &[ControlCard] {
        &self.cards
    }

    pub fn feeds(&self) -> &[MetricFeed] {
        &self.feeds
    }

    pub fn set_role(&mut self, role: UserRole) {
        self.user_mode.set_mode(role);
        info!("Role: {}", role);
    }

    pub fn cycle_role(&mut self) -> UserRole {
        let role = self.user_mode.cycle();
        info!("Role: {}", role);
        role
    }

    fn require_operator(&self, action: &'static str) -> Result<(), PanelError> {
        if self.user_mode.is_operator() {
            Ok(())
        } else {
            Err(self.denied(action))
        }
    }

    fn require_operator_or_programmer(&self, action: &'static str) -> Result<(), PanelError> {
        if self.user_mode.is_operator() || self.user_mode.is_programmer() {
            Ok(())
        } else {
            Err(self.denied(action))
        }
    }

    fn require_programmer(&self, action: &'static str) -> Result<(), PanelError> {
        if self.user_mode.is_programmer() {
            Ok(())
        } else {
            Err(self.denied(action))
        }
    }

    fn denied(&self, action: &'static str) -> PanelError {
        PanelError::PermissionDenied {
            action,
            role: self.user_mode.mode(),
        }
    }

    pub fn set_control_mode(
        &mut self,
        group_id: &GroupId,
        control_id: &ControlId,
        mode: ControlMode,
    ) -> Result<(), PanelError> {
        self.require_operator_or_programmer("set control mode")?;
        self.groups.update_control_mode(group_id, control_id, mode);
        Ok(())
    }

    /// Save the auto-mode form; saving always enables the schedule.
    pub fn save_auto_settings(
        &mut self,
        group_id: &GroupId,
        control_id: &ControlId,
        mut patch: AutoSettingsPatch,
    ) -> Result<(), PanelError> {
        self.require_programmer("save auto settings")?;
        patch.enabled = Some(true);
        self.groups.update_auto_settings(group_id, control_id, patch);
        Ok(())
    }

    pub fn add_group(&mut self, name: &str) -> Result<GroupId, PanelError> {
        self.require_operator("add group")?;
        let name = non_blank(name)?;
        let id = self.groups.add_group(name);
        info!("Panel: added group {} '{}'", id, name);
        Ok(id)
    }

    pub fn edit_group(&mut self, group_id: &GroupId, name: &str) -> Result<(), PanelError> {
        self.require_operator("edit group")?;
        let name = non_blank(name)?;
        self.groups.edit_group(group_id, name);
        Ok(())
    }

    pub fn delete_group(&mut self, group_id: &GroupId) -> Result<(), PanelError> {
        self.require_operator("delete group")?;
        self.groups.delete_group(group_id);
        self.unmount_orphaned_cards();
        Ok(())
    }

    pub fn toggle_group_expanded(&mut self, group_id: &GroupId) -> Result<(), PanelError> {
        self.require_operator("toggle group")?;
        self.groups.toggle_group_expanded(group_id);
        Ok(())
    }

    /// Add a control to the selected group and mount a card for it.
    pub fn add_control(&mut self, name: &str, control_type: &str) -> Result<Option<ControlId>, PanelError> {
        self.require_operator("add control")?;
        let name = non_blank(name)?;
        let group_id = self.groups.active_group_id().cloned().ok_or(PanelError::NoActiveGroup)?;
        let added = self.groups.add_control_to_group(&group_id, name, control_type);
        if let Some(control_id) = &added {
            info!("Panel: added control {} '{}' to group {}", control_id, name, group_id);
            self.cards.push(ControlCard::new(group_id, control_id.clone()));
        }
        Ok(added)
    }

    pub fn delete_control(&mut self, group_id: &GroupId, control_id: &ControlId) -> Result<(), PanelError> {
        self.require_operator("delete control")?;
        self.groups.delete_control_from_group(group_id, control_id);
        self.unmount_orphaned_cards();
        Ok(())
    }

    fn unmount_orphaned_cards(&mut self) {
        let groups = &self.groups;
        self.cards.retain(|card| {
            let mounted = groups.control(card.group_id(), card.control_id()).is_some();
            if !mounted {
                info!("Panel: unmounted card {}/{}", card.group_id(), card.control_id());
            }
            mounted
        });
    }

    pub fn select_group(&mut self, group_id: GroupId) {
        self.groups.set_active_group_id(group_id);
        self.groups.set_show_all_controls(false);
    }

    pub fn show_all_controls(&mut self) {
        self.groups.set_show_all_controls(true);
    }

    pub fn pause_metric(&mut self, title: &str) -> Result<(), PanelError> {
        self.feed_mut(title)?.pause();
        Ok(())
    }

    pub fn resume_metric(&mut self, title: &str, now: Instant) -> Result<(), PanelError> {
        self.feed_mut(title)?.resume(now);
        Ok(())
    }

    fn feed_mut(&mut self, title: &str) -> Result<&mut MetricFeed, PanelError> {
        self.feeds
            .iter_mut()
            .find(|f| f.spec().title.eq_ignore_ascii_case(title))
            .ok_or_else(|| PanelError::UnknownMetric(title.to_string()))
    }

    /// Fire every due card and feed. Returns how many timers fired.
    pub fn tick(&mut self, now: Instant, wall_clock: DateTime<Local>) -> usize {
        let mut fired = 0;
        let time_of_day = wall_clock.time();
        for card in &mut self.cards {
            if card.poll(&mut self.groups, now, time_of_day).is_some() {
                fired += 1;
            }
        }
        for feed in &mut self.feeds {
            if feed.poll(now, wall_clock, &mut self.rng).is_some() {
                fired += 1;
            }
        }
        fired
    }

    /// Re-arm or disarm cards after actions changed the stores.
    pub fn sync_cards(&mut self, now: Instant) {
        for card in &mut self.cards {
            card.sync(&self.groups, now);
        }
    }

    /// Earliest pending card or feed deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.cards
            .iter()
            .filter_map(ControlCard::next_due)
            .chain(self.feeds.iter().filter_map(MetricFeed::next_due))
            .min()
    }
}

fn non_blank(name: &str) -> Result<&str, PanelError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(PanelError::EmptyName)
    } else {
        Ok(trimmed)
    }
}
