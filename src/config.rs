//! Runtime configuration from the environment (optionally seeded from a
//! `.env` file by `main`).

use crate::models::habitat::UserRole;
use std::path::PathBuf;
use std::time::{Duration, Instant};

pub const DEFAULT_RUN_SECS: u64 = 60;
pub const DEFAULT_METRIC_INTERVAL_MS: u64 = 3000;
pub const DEFAULT_METRIC_VARIANCE_PCT: f64 = 5.0;

#[derive(Debug, Clone)]
pub struct Config {
    /// Role the session starts in.
    pub role: UserRole,
    /// How long to run; `None` runs until the process is stopped.
    pub run_for: Option<Duration>,
    pub metrics_enabled: bool,
    pub metric_interval: Duration,
    pub metric_variance_pct: f64,
    /// Fixed seed for every random draw; OS entropy when unset.
    pub rng_seed: Option<u64>,
    pub scenario_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let role = match var("HABITAT_ROLE") {
            Some(s) => s.parse::<UserRole>().map_err(|e| format!("HABITAT_ROLE: {}", e))?,
            None => UserRole::default(),
        };

        let run_secs = parse_u64(var("HABITAT_RUN_SECS"), "HABITAT_RUN_SECS")?.unwrap_or(DEFAULT_RUN_SECS);
        let run_for = (run_secs > 0).then(|| Duration::from_secs(run_secs));
        if run_for.is_some_and(|d| Instant::now().checked_add(d).is_none()) {
            return Err(format!("HABITAT_RUN_SECS is too large: {} (use 0 to run forever)", run_secs));
        }

        let metrics_enabled = match var("HABITAT_METRICS_ENABLED") {
            Some(s) => parse_bool(&s).ok_or_else(|| format!("HABITAT_METRICS_ENABLED must be true/false, got '{}'", s))?,
            None => true,
        };

        let metric_interval_ms = parse_u64(var("HABITAT_METRIC_INTERVAL_MS"), "HABITAT_METRIC_INTERVAL_MS")?
            .unwrap_or(DEFAULT_METRIC_INTERVAL_MS);
        if metric_interval_ms == 0 {
            return Err("HABITAT_METRIC_INTERVAL_MS must be greater than zero".to_string());
        }

        let metric_variance_pct = match var("HABITAT_METRIC_VARIANCE_PCT") {
            Some(s) => match s.trim().parse::<f64>() {
                Ok(v) if v.is_finite() && v >= 0.0 => v,
                _ => return Err(format!("HABITAT_METRIC_VARIANCE_PCT must be a non-negative number, got '{}'", s)),
            },
            None => DEFAULT_METRIC_VARIANCE_PCT,
        };

        let rng_seed = parse_u64(var("HABITAT_RNG_SEED"), "HABITAT_RNG_SEED")?;
        let scenario_file = var("HABITAT_SCENARIO_FILE").map(|s| PathBuf::from(s.trim()));

        Ok(Config {
            role,
            run_for,
            metrics_enabled,
            metric_interval: Duration::from_millis(metric_interval_ms),
            metric_variance_pct,
            rng_seed,
            scenario_file,
        })
    }
}

fn parse_u64(value: Option<String>, key: &str) -> Result<Option<u64>, String> {
    value
        .map(|s| {
            s.trim()
                .parse::<u64>()
                .map_err(|_| format!("{} must be a non-negative integer, got '{}'", key, s))
        })
        .transpose()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, String> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.role, UserRole::Operator);
        assert_eq!(cfg.run_for, Some(Duration::from_secs(DEFAULT_RUN_SECS)));
        assert!(cfg.metrics_enabled);
        assert_eq!(cfg.metric_interval, Duration::from_millis(3000));
        assert_eq!(cfg.metric_variance_pct, 5.0);
        assert_eq!(cfg.rng_seed, None);
        assert_eq!(cfg.scenario_file, None);
    }

    #[test]
    fn reads_overrides() {
        let cfg = config(&[
            ("HABITAT_ROLE", "Programmer"),
            ("HABITAT_RUN_SECS", "0"),
            ("HABITAT_METRICS_ENABLED", "FALSE"),
            ("HABITAT_METRIC_INTERVAL_MS", "500"),
            ("HABITAT_METRIC_VARIANCE_PCT", "2.5"),
            ("HABITAT_RNG_SEED", "42"),
            ("HABITAT_SCENARIO_FILE", "tests/data/scenario.json"),
        ])
        .unwrap();
        assert_eq!(cfg.role, UserRole::Programmer);
        assert_eq!(cfg.run_for, None);
        assert!(!cfg.metrics_enabled);
        assert_eq!(cfg.metric_interval, Duration::from_millis(500));
        assert_eq!(cfg.metric_variance_pct, 2.5);
        assert_eq!(cfg.rng_seed, Some(42));
        assert_eq!(cfg.scenario_file, Some(PathBuf::from("tests/data/scenario.json")));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = config(&[("HABITAT_ROLE", "  "), ("HABITAT_RUN_SECS", "")]).unwrap();
        assert_eq!(cfg.role, UserRole::Operator);
        assert_eq!(cfg.run_for, Some(Duration::from_secs(DEFAULT_RUN_SECS)));
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(config(&[("HABITAT_ROLE", "admin")]).is_err());
        assert!(config(&[("HABITAT_RUN_SECS", "-1")]).is_err());
        assert!(config(&[("HABITAT_METRICS_ENABLED", "maybe")]).is_err());
        assert!(config(&[("HABITAT_METRIC_INTERVAL_MS", "0")]).is_err());
        assert!(config(&[("HABITAT_METRIC_VARIANCE_PCT", "-3")]).is_err());
        assert!(config(&[("HABITAT_RNG_SEED", "seed")]).is_err());
    }

    #[test]
    fn rejects_run_length_past_the_clock() {
        let err = config(&[("HABITAT_RUN_SECS", &u64::MAX.to_string())]).unwrap_err();
        assert!(err.starts_with("HABITAT_RUN_SECS is too large"), "{}", err);

        let cfg = config(&[("HABITAT_RUN_SECS", "86400")]).unwrap();
        assert_eq!(cfg.run_for, Some(Duration::from_secs(86400)));
    }
}
