//! In-memory store for control groups and their controls.
//!
//! Every mutator is a no-op when the addressed group or control does not
//! exist. Callers validate their input (e.g. trimmed names) before calling in.

use crate::models::habitat::{
    AutoSettings, AutoSettingsPatch, ControlGroup, ControlIcon, ControlId, ControlItem, ControlMode, GroupId,
    DEFAULT_END_TIME, DEFAULT_START_TIME,
};
use crate::services::schedule::one_shot_is_active;
use crate::utils::serde_enum_name;
use chrono::{Local, NaiveTime, Utc};
use log::debug;
use rand::rngs::SmallRng;
use rand::Rng;

pub struct GroupsStore {
    groups: Vec<ControlGroup>,
    active_group_id: Option<GroupId>,
    show_all_controls: bool,
    rng: SmallRng,
    last_generated_id: i64,
}

impl GroupsStore {
    /// Empty store: no groups, no active group, showing all controls.
    pub fn new(rng: SmallRng) -> Self {
        GroupsStore {
            groups: Vec::new(),
            active_group_id: None,
            show_all_controls: true,
            rng,
            last_generated_id: 0,
        }
    }

    /// Store preloaded with the three default habitat groups, group "1" active.
    pub fn with_seed_data(rng: SmallRng) -> Self {
        let mut store = GroupsStore::new(rng);
        store.groups = seed_groups();
        store.active_group_id = Some(GroupId::new("1"));
        store
    }

    pub fn groups(&self) -> &[ControlGroup] {
        &self.groups
    }

    pub fn group(&self, id: &GroupId) -> Option<&ControlGroup> {
        self.groups.iter().find(|g| g.id == *id)
    }

    pub fn control(&self, group_id: &GroupId, control_id: &ControlId) -> Option<&ControlItem> {
        self.group(group_id)?.controls.iter().find(|c| c.id == *control_id)
    }

    pub fn active_group_id(&self) -> Option<&GroupId> {
        self.active_group_id.as_ref()
    }

    pub fn set_active_group_id(&mut self, id: GroupId) {
        self.active_group_id = Some(id);
    }

    pub fn show_all_controls(&self) -> bool {
        self.show_all_controls
    }

    pub fn set_show_all_controls(&mut self, show: bool) {
        self.show_all_controls = show;
    }

    /// Append a new, expanded, empty group. Names are not checked for
    /// uniqueness.
    pub fn add_group(&mut self, name: &str) -> GroupId {
        let id = GroupId(self.next_generated_id().to_string());
        self.groups.push(ControlGroup {
            id: id.clone(),
            name: name.to_string(),
            controls: Vec::new(),
            expanded: true,
        });
        debug!("Groups: added group {} ({})", id, name);
        id
    }

    pub fn edit_group(&mut self, id: &GroupId, name: &str) {
        if let Some(group) = self.groups.iter_mut().find(|g| g.id == *id) {
            group.name = name.to_string();
        }
    }

    /// Remove a group and its controls. The active group id is left as is,
    /// even when it pointed at the removed group.
    pub fn delete_group(&mut self, id: &GroupId) {
        let before = self.groups.len();
        self.groups.retain(|g| g.id != *id);
        if self.groups.len() != before {
            debug!("Groups: deleted group {}", id);
        }
    }

    pub fn toggle_group_expanded(&mut self, id: &GroupId) {
        if let Some(group) = self.groups.iter_mut().find(|g| g.id == *id) {
            group.expanded = !group.expanded;
        }
    }

    /// Append a new control (off, inactive) to a group. Returns the new id, or
    /// `None` when the group does not exist.
    pub fn add_control_to_group(
        &mut self,
        group_id: &GroupId,
        control_name: &str,
        control_type: &str,
    ) -> Option<ControlId> {
        if self.group(group_id).is_none() {
            return None;
        }
        let id = ControlId(format!("control-{}", self.next_generated_id()));
        let control = ControlItem {
            id: id.clone(),
            title: control_name.to_string(),
            icon: ControlIcon::for_control_type(control_type),
            mode: ControlMode::Off,
            is_active: false,
            name: Some(control_name.to_string()),
            kind: Some(control_type.to_string()),
            auto_settings: None,
        };
        let group = self.groups.iter_mut().find(|g| g.id == *group_id)?;
        group.controls.push(control);
        debug!("Groups: added control {} ({}) to group {}", id, control_name, group_id);
        Some(id)
    }

    pub fn delete_control_from_group(&mut self, group_id: &GroupId, control_id: &ControlId) {
        if let Some(group) = self.groups.iter_mut().find(|g| g.id == *group_id) {
            group.controls.retain(|c| c.id != *control_id);
        }
    }

    /// Set a control's mode against the local wall clock.
    pub fn update_control_mode(&mut self, group_id: &GroupId, control_id: &ControlId, mode: ControlMode) {
        self.update_control_mode_at(group_id, control_id, mode, Local::now().time());
    }

    /// Set a control's mode and derive `is_active`.
    ///
    /// `on`/`off` map straight to active/inactive. `auto` with enabled settings
    /// checks `now` against the window as plain strings (no wraparound); `auto`
    /// without them draws active/inactive at random, once.
    pub fn update_control_mode_at(
        &mut self,
        group_id: &GroupId,
        control_id: &ControlId,
        mode: ControlMode,
        now: NaiveTime,
    ) {
        let Some(control) = find_control_mut(&mut self.groups, group_id, control_id) else {
            return;
        };
        let is_active = match mode {
            ControlMode::On => true,
            ControlMode::Off => false,
            ControlMode::Auto => match control.auto_settings.as_ref() {
                Some(s) if s.is_enabled() && !s.start_time.is_empty() && !s.end_time.is_empty() => {
                    one_shot_is_active(&s.start_time, &s.end_time, now)
                }
                _ => self.rng.random_bool(0.5),
            },
        };
        control.mode = mode;
        control.is_active = is_active;
        debug!(
            "Groups: control {}/{} mode={} active={}",
            group_id,
            control_id,
            serde_enum_name(&mode).unwrap_or_default(),
            is_active
        );
    }

    /// Merge a saved form into a control's auto settings.
    ///
    /// Times, duration and interval always come from the patch, with defaults
    /// for omitted or empty values. `enabled` is only replaced when given.
    pub fn update_auto_settings(&mut self, group_id: &GroupId, control_id: &ControlId, patch: AutoSettingsPatch) {
        let Some(control) = find_control_mut(&mut self.groups, group_id, control_id) else {
            return;
        };
        let previous_enabled = control.auto_settings.as_ref().and_then(|s| s.enabled);
        control.auto_settings = Some(AutoSettings {
            start_time: non_empty_or(patch.start_time, DEFAULT_START_TIME),
            end_time: non_empty_or(patch.end_time, DEFAULT_END_TIME),
            duration: patch.duration.unwrap_or(0),
            interval: patch.interval.unwrap_or(0),
            enabled: patch.enabled.or(previous_enabled),
        });
    }

    /// Controls on display: every group's controls in order when showing all,
    /// otherwise the active group's controls (empty if it no longer exists).
    pub fn visible_controls(&self) -> Vec<&ControlItem> {
        if self.show_all_controls {
            return self.groups.iter().flat_map(|g| g.controls.iter()).collect();
        }
        self.active_group_id
            .as_ref()
            .and_then(|id| self.group(id))
            .map(|g| g.controls.iter().collect())
            .unwrap_or_default()
    }

    /// Epoch milliseconds, bumped past the last id handed out.
    fn next_generated_id(&mut self) -> i64 {
        let id = Utc::now().timestamp_millis().max(self.last_generated_id + 1);
        self.last_generated_id = id;
        id
    }
}

fn find_control_mut<'a>(
    groups: &'a mut [ControlGroup],
    group_id: &GroupId,
    control_id: &ControlId,
) -> Option<&'a mut ControlItem> {
    groups
        .iter_mut()
        .find(|g| g.id == *group_id)?
        .controls
        .iter_mut()
        .find(|c| c.id == *control_id)
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => default.to_string(),
    }
}

fn seed_groups() -> Vec<ControlGroup> {
    use ControlIcon::{Lightbulb, Moon};

    let group = |id: &str, name: &str, expanded: bool, controls: Vec<ControlItem>| ControlGroup {
        id: GroupId::new(id),
        name: name.to_string(),
        controls,
        expanded,
    };

    vec![
        group(
            "1",
            "Lighting",
            true,
            vec![
                ControlItem::seeded("1", "Wave Generator", Lightbulb),
                ControlItem::seeded("2", "Lighting", Lightbulb),
            ],
        ),
        group(
            "2",
            "Water Systems",
            false,
            vec![
                ControlItem::seeded("3", "Oxygen Pump", Lightbulb),
                ControlItem::seeded("4", "Water Filter", Moon),
            ],
        ),
        group(
            "3",
            "Environment",
            false,
            vec![
                ControlItem::seeded("5", "Temperature", Lightbulb),
                ControlItem::seeded("6", "Feeding System", Moon),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn seeded_store() -> GroupsStore {
        GroupsStore::with_seed_data(SmallRng::seed_from_u64(7))
    }

    fn gid(id: &str) -> GroupId {
        GroupId::new(id)
    }

    fn cid(id: &str) -> ControlId {
        ControlId::new(id)
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn visible_ids(store: &GroupsStore) -> Vec<&str> {
        store.visible_controls().iter().map(|c| c.id.0.as_str()).collect()
    }

    fn enable_window(store: &mut GroupsStore, group: &str, control: &str, start: &str, end: &str) {
        store.update_auto_settings(
            &gid(group),
            &cid(control),
            AutoSettingsPatch {
                start_time: Some(start.into()),
                end_time: Some(end.into()),
                enabled: Some(true),
                ..Default::default()
            },
        );
    }

    #[test]
    fn on_and_off_force_active_flag() {
        let mut store = seeded_store();
        for _ in 0..3 {
            store.update_control_mode_at(&gid("2"), &cid("3"), ControlMode::On, at(3, 0));
            let control = store.control(&gid("2"), &cid("3")).unwrap();
            assert_eq!(control.mode, ControlMode::On);
            assert!(control.is_active);

            store.update_control_mode_at(&gid("2"), &cid("3"), ControlMode::Off, at(3, 0));
            let control = store.control(&gid("2"), &cid("3")).unwrap();
            assert_eq!(control.mode, ControlMode::Off);
            assert!(!control.is_active);
        }
    }

    #[test]
    fn auto_with_enabled_window_uses_current_time() {
        let mut store = seeded_store();
        enable_window(&mut store, "1", "1", "08:00", "20:00");

        store.update_control_mode_at(&gid("1"), &cid("1"), ControlMode::Auto, at(14, 0));
        let control = store.control(&gid("1"), &cid("1")).unwrap();
        assert_eq!(control.mode, ControlMode::Auto);
        assert!(control.is_active);

        store.update_control_mode_at(&gid("1"), &cid("1"), ControlMode::Auto, at(22, 0));
        assert!(!store.control(&gid("1"), &cid("1")).unwrap().is_active);
    }

    #[test]
    fn auto_one_shot_ignores_overnight_windows() {
        let mut store = seeded_store();
        enable_window(&mut store, "1", "1", "22:00", "06:00");
        for now in [at(23, 30), at(2, 0), at(10, 0)] {
            store.update_control_mode_at(&gid("1"), &cid("1"), ControlMode::Auto, now);
            assert!(!store.control(&gid("1"), &cid("1")).unwrap().is_active);
        }
    }

    #[test]
    fn auto_without_settings_draws_both_outcomes() {
        let mut store = seeded_store();
        let mut seen = [false, false];
        for _ in 0..64 {
            store.update_control_mode_at(&gid("3"), &cid("6"), ControlMode::Auto, at(12, 0));
            let control = store.control(&gid("3"), &cid("6")).unwrap();
            assert_eq!(control.mode, ControlMode::Auto);
            seen[control.is_active as usize] = true;
        }
        assert_eq!(seen, [true, true]);
    }

    #[test]
    fn visible_controls_show_all_in_group_order() {
        let store = seeded_store();
        assert!(store.show_all_controls());
        let total: usize = store.groups().iter().map(|g| g.controls.len()).sum();
        assert_eq!(store.visible_controls().len(), total);
        assert_eq!(visible_ids(&store), vec!["1", "2", "3", "4", "5", "6"]);
    }

    #[test]
    fn visible_controls_for_active_group() {
        let mut store = seeded_store();
        store.set_show_all_controls(false);
        store.set_active_group_id(gid("2"));
        assert_eq!(visible_ids(&store), vec!["3", "4"]);

        store.set_active_group_id(gid("missing"));
        assert!(store.visible_controls().is_empty());
    }

    #[test]
    fn delete_group_cascades_and_ignores_unknown_ids() {
        let mut store = seeded_store();
        store.delete_group(&gid("2"));
        assert_eq!(store.groups().len(), 2);
        assert_eq!(visible_ids(&store), vec!["1", "2", "5", "6"]);

        store.delete_group(&gid("nope"));
        assert_eq!(store.groups().len(), 2);
    }

    #[test]
    fn deleting_active_group_keeps_stale_selection() {
        let mut store = seeded_store();
        store.set_show_all_controls(false);
        store.set_active_group_id(gid("2"));
        store.delete_group(&gid("2"));
        assert_eq!(store.active_group_id(), Some(&gid("2")));
        assert!(store.visible_controls().is_empty());
    }

    #[test]
    fn add_control_appends_light_as_lightbulb() {
        let mut store = seeded_store();
        let before = store.group(&gid("1")).unwrap().controls.len();
        let id = store.add_control_to_group(&gid("1"), "Skimmer", "light").unwrap();

        let group = store.group(&gid("1")).unwrap();
        assert_eq!(group.controls.len(), before + 1);
        let added = group.controls.last().unwrap();
        assert_eq!(added.id, id);
        assert!(id.0.starts_with("control-"));
        assert_eq!(added.title, "Skimmer");
        assert_eq!(added.icon, ControlIcon::Lightbulb);
        assert_eq!(added.mode, ControlMode::Off);
        assert!(!added.is_active);
        assert_eq!(added.kind.as_deref(), Some("light"));

        assert!(store.add_control_to_group(&gid("9"), "Heater", "heat").is_none());
    }

    #[test]
    fn generated_ids_are_unique() {
        let mut store = GroupsStore::new(SmallRng::seed_from_u64(1));
        let a = store.add_group("Reef");
        let b = store.add_group("Reef");
        assert_ne!(a, b);
        assert_eq!(store.groups().len(), 2);
        assert!(store.group(&a).unwrap().expanded);
        assert!(store.group(&a).unwrap().controls.is_empty());
    }

    #[test]
    fn edit_and_toggle_group() {
        let mut store = seeded_store();
        store.edit_group(&gid("3"), "Climate");
        store.toggle_group_expanded(&gid("3"));
        let group = store.group(&gid("3")).unwrap();
        assert_eq!(group.name, "Climate");
        assert!(group.expanded);

        store.edit_group(&gid("42"), "Ghost");
        assert!(store.groups().iter().all(|g| g.name != "Ghost"));
    }

    #[test]
    fn delete_control_only_touches_matching_pair() {
        let mut store = seeded_store();
        store.delete_control_from_group(&gid("1"), &cid("3"));
        assert_eq!(store.group(&gid("2")).unwrap().controls.len(), 2);

        store.delete_control_from_group(&gid("2"), &cid("3"));
        let ids: Vec<_> = store.group(&gid("2")).unwrap().controls.iter().map(|c| c.id.0.clone()).collect();
        assert_eq!(ids, vec!["4".to_string()]);
    }

    #[test]
    fn auto_settings_apply_defaults_but_keep_enabled() {
        let mut store = seeded_store();
        enable_window(&mut store, "1", "2", "07:30", "19:00");
        store.update_auto_settings(
            &gid("1"),
            &cid("2"),
            AutoSettingsPatch {
                start_time: Some(String::new()),
                interval: Some(10),
                ..Default::default()
            },
        );
        let settings = store.control(&gid("1"), &cid("2")).unwrap().auto_settings.clone().unwrap();
        assert_eq!(settings.start_time, "00:00");
        assert_eq!(settings.end_time, "23:59");
        assert_eq!(settings.duration, 0);
        assert_eq!(settings.interval, 10);
        assert_eq!(settings.enabled, Some(true));
    }

    #[test]
    fn auto_settings_leave_enabled_unset_when_never_given() {
        let mut store = seeded_store();
        store.update_auto_settings(&gid("2"), &cid("4"), AutoSettingsPatch::default());
        let settings = store.control(&gid("2"), &cid("4")).unwrap().auto_settings.clone().unwrap();
        assert_eq!(settings.enabled, None);
    }
}
