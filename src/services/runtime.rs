use crate::services::dashboard::Dashboard;
use crate::services::scenario::ScenarioPlayer;
use chrono::Local;
use log::{debug, info, warn};
use std::thread;
use std::time::{Duration, Instant};

/// Longest single sleep, so the loop keeps noticing the run deadline.
const MAX_IDLE: Duration = Duration::from_secs(1);

/// Drive the dashboard until `run_for` has elapsed (`None` runs forever).
///
/// Each pass applies due scenario steps, fires due cards and feeds, then sleeps
/// until the earliest pending deadline.
pub fn run_loop(dashboard: &mut Dashboard, mut scenario: Option<ScenarioPlayer>, run_for: Option<Duration>) {
    let started = Instant::now();
    let stop_at = stop_deadline(started, run_for);
    dashboard.sync_cards(started);

    loop {
        let now = Instant::now();
        if stop_at.is_some_and(|stop| now >= stop) {
            break;
        }

        if let Some(player) = scenario.as_mut() {
            player.apply_due(dashboard, started, now);
            if player.is_finished() {
                info!("Scenario: all steps applied");
                scenario = None;
            }
        }

        let fired = dashboard.tick(now, Local::now());
        if fired > 0 {
            debug!("Runtime: {} timer(s) fired", fired);
        }

        let next = [
            dashboard.next_deadline(),
            scenario.as_ref().and_then(|p| p.next_deadline(started)),
            stop_at,
            Some(now + MAX_IDLE),
        ]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(now + MAX_IDLE);

        let wait = next.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            thread::sleep(wait);
        }
    }
}

fn stop_deadline(started: Instant, run_for: Option<Duration>) -> Option<Instant> {
    let run_for = run_for?;
    let stop_at = started.checked_add(run_for);
    if stop_at.is_none() {
        warn!("Runtime: run length of {}s is out of range, running until stopped", run_for.as_secs());
    }
    stop_at
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::habitat::{ControlId, ControlMode, GroupId, UserRole};
    use crate::services::metrics::FeedSettings;
    use crate::services::scenario::Scenario;
    use crate::stores::groups::GroupsStore;
    use crate::stores::user_mode::UserModeStore;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn dashboard() -> Dashboard {
        Dashboard::new(
            UserModeStore::default(),
            GroupsStore::with_seed_data(SmallRng::seed_from_u64(41)),
            FeedSettings::default(),
            SmallRng::seed_from_u64(42),
            Local::now(),
            Instant::now(),
        )
    }

    #[test]
    fn stop_deadline_follows_run_length() {
        let t0 = Instant::now();
        assert_eq!(stop_deadline(t0, None), None);
        assert_eq!(
            stop_deadline(t0, Some(Duration::from_secs(5))),
            Some(t0 + Duration::from_secs(5))
        );
        assert_eq!(stop_deadline(t0, Some(Duration::MAX)), None);
    }

    #[test]
    fn loop_applies_scenario_and_settles_auto_control() {
        let json = r#"{ "steps": [
            { "at_secs": 0, "action": "set_role", "role": "programmer" },
            { "at_secs": 0, "action": "save_auto_settings", "group_id": "3", "control_id": "5",
              "settings": { "startTime": "00:00", "endTime": "23:59", "interval": 1 } },
            { "at_secs": 0, "action": "set_control_mode", "group_id": "3", "control_id": "5", "mode": "auto" }
        ] }"#;
        let player = Scenario::from_json(json).unwrap().into_player();
        let mut dash = dashboard();

        let started = Instant::now();
        run_loop(&mut dash, Some(player), Some(Duration::from_secs(2)));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2), "stopped early after {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(5), "overran: {:?}", elapsed);

        assert_eq!(dash.role(), UserRole::Programmer);
        let control = dash
            .groups()
            .control(&GroupId::new("3"), &ControlId::new("5"))
            .unwrap();
        assert_eq!(control.auto_settings.as_ref().map(|s| s.interval), Some(1));
        assert_ne!(control.mode, ControlMode::Auto);
        assert_eq!(control.is_active, control.mode == ControlMode::On);
        assert!(dash.cards().iter().all(|card| !card.is_armed()));
    }

    #[test]
    fn loop_survives_step_beyond_the_clock() {
        let json = format!(r#"{{ "steps": [ {{ "at_secs": {}, "action": "cycle_role" }} ] }}"#, u64::MAX);
        let player = Scenario::from_json(&json).unwrap().into_player();
        let mut dash = dashboard();

        run_loop(&mut dash, Some(player), Some(Duration::from_millis(200)));
        assert_eq!(dash.role(), UserRole::Operator);
    }
}
