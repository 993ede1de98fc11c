//! Periodic auto-mode evaluation for mounted control cards.
//!
//! A card is bound to a `(group, control)` pair and looks its control up by id
//! on every pass, so deleted controls simply disarm it. The timer lives only
//! while the control's mode is `auto`. Each tick commits a concrete `on`/`off`,
//! which takes the control out of auto mode and therefore disarms the card
//! until auto is selected again.

use crate::models::habitat::{AutoSettings, ControlId, ControlMode, GroupId};
use crate::services::schedule;
use crate::stores::groups::GroupsStore;
use crate::utils::serde_enum_name;
use chrono::NaiveTime;
use log::{debug, info};
use std::time::{Duration, Instant};

pub const DEFAULT_AUTO_INTERVAL: Duration = Duration::from_secs(2);

/// Configured interval when non-zero, else [`DEFAULT_AUTO_INTERVAL`].
pub fn interval_for(settings: Option<&AutoSettings>) -> Duration {
    match settings.map(|s| s.interval) {
        Some(secs) if secs > 0 => Duration::from_secs(u64::from(secs)),
        _ => DEFAULT_AUTO_INTERVAL,
    }
}

#[derive(Debug, Clone)]
struct AutoTimer {
    interval: Duration,
    next_due: Instant,
    // settings the timer was armed with; a change re-arms it
    settings: Option<AutoSettings>,
}

#[derive(Debug, Clone)]
pub struct ControlCard {
    group_id: GroupId,
    control_id: ControlId,
    timer: Option<AutoTimer>,
}

impl ControlCard {
    pub fn new(group_id: GroupId, control_id: ControlId) -> Self {
        ControlCard {
            group_id,
            control_id,
            timer: None,
        }
    }

    pub fn group_id(&self) -> &GroupId {
        &self.group_id
    }

    pub fn control_id(&self) -> &ControlId {
        &self.control_id
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.timer.as_ref().map(|t| t.next_due)
    }

    /// Arm, re-arm or disarm the timer to match the control's current state.
    pub fn sync(&mut self, store: &GroupsStore, now: Instant) {
        match store.control(&self.group_id, &self.control_id) {
            Some(control) if control.mode == ControlMode::Auto => {
                let settings = control.auto_settings.clone();
                let rearm = self.timer.as_ref().is_none_or(|t| t.settings != settings);
                if rearm {
                    let interval = interval_for(settings.as_ref());
                    debug!(
                        "Auto: arming {}/{} every {}s",
                        self.group_id,
                        self.control_id,
                        interval.as_secs()
                    );
                    self.timer = Some(AutoTimer {
                        interval,
                        next_due: now + interval,
                        settings,
                    });
                }
            }
            _ => {
                if self.timer.take().is_some() {
                    debug!("Auto: disarmed {}/{}", self.group_id, self.control_id);
                }
            }
        }
    }

    /// Fire the timer if it is due. Returns the mode committed, if any.
    pub fn poll(&mut self, store: &mut GroupsStore, now: Instant, wall_clock: NaiveTime) -> Option<ControlMode> {
        self.sync(store, now);
        let timer = self.timer.as_mut()?;
        if now < timer.next_due {
            return None;
        }
        timer.next_due += timer.interval;

        let settings = store
            .control(&self.group_id, &self.control_id)
            .and_then(|c| c.auto_settings.clone());
        let mode = schedule::evaluate(settings.as_ref(), wall_clock);
        store.update_control_mode_at(&self.group_id, &self.control_id, mode, wall_clock);
        info!(
            "Auto: {}/{} scheduled {} at {}",
            self.group_id,
            self.control_id,
            serde_enum_name(&mode).unwrap_or_default(),
            schedule::format_hhmm(wall_clock)
        );

        self.sync(store, now);
        Some(mode)
    }
}
