//! Daily time-window rules behind auto mode.
//!
//! Two rules coexist:
//! - [`window_is_active`] is the one the periodic evaluator uses. It works on
//!   minutes since midnight and understands windows that wrap past midnight.
//! - [`one_shot_is_active`] is the check applied when auto mode is selected.
//!   It compares `"HH:MM"` strings and never matches a wrapping window.

use crate::models::habitat::{AutoSettings, ControlMode, DEFAULT_START_TIME};
use chrono::{NaiveTime, Timelike};

/// Format a time of day as zero-padded 24-hour `"HH:MM"`.
pub fn format_hhmm(now: NaiveTime) -> String {
    now.format("%H:%M").to_string()
}

pub fn minutes_since_midnight(now: NaiveTime) -> u32 {
    now.hour() * 60 + now.minute()
}

/// Parse `"HH:MM"` into minutes since midnight.
///
/// Only the first two `:`-separated parts are read; an empty part counts as
/// zero. Anything non-numeric, or a missing minute part, is rejected.
pub fn parse_time_of_day(raw: &str) -> Option<u32> {
    let mut parts = raw.split(':');
    let hours = parse_component(parts.next()?)?;
    let minutes = parse_component(parts.next()?)?;
    hours.checked_mul(60)?.checked_add(minutes)
}

fn parse_component(part: &str) -> Option<u32> {
    let part = part.trim();
    if part.is_empty() {
        return Some(0);
    }
    part.parse::<u32>().ok()
}

/// Overnight-aware window check.
///
/// `start < end` is a same-day window `[start, end)`; otherwise the window
/// runs from `start` through midnight to `end`. Unparseable bounds are never
/// active.
pub fn window_is_active(start: &str, end: &str, now: NaiveTime) -> bool {
    let (Some(start), Some(end)) = (parse_time_of_day(start), parse_time_of_day(end)) else {
        return false;
    };
    let now = minutes_since_midnight(now);
    if start < end {
        now >= start && now < end
    } else {
        now >= start || now < end
    }
}

/// Mode the periodic evaluator commits for a control's settings at `now`.
/// Missing settings behave as `"00:00"`–`"00:00"`, i.e. always on.
pub fn evaluate(settings: Option<&AutoSettings>, now: NaiveTime) -> ControlMode {
    let start = settings.map_or(DEFAULT_START_TIME, |s| s.start_time.as_str());
    let end = settings.map_or(DEFAULT_START_TIME, |s| s.end_time.as_str());
    if window_is_active(start, end, now) {
        ControlMode::On
    } else {
        ControlMode::Off
    }
}

/// Inclusive lexicographic check on `"HH:MM"` strings.
pub fn one_shot_is_active(start: &str, end: &str, now: NaiveTime) -> bool {
    let current = format_hhmm(now);
    current.as_str() >= start && current.as_str() <= end
}
