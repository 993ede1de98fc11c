pub mod models {
    pub mod habitat;
}

pub mod config;
pub mod stores {
    pub mod groups;
    pub mod user_mode;
}
pub mod utils;
pub mod services {
    pub mod auto_mode;
    pub mod dashboard;
    pub mod metrics;
    pub mod runtime;
    pub mod scenario;
    pub mod schedule;
}

use crate::config::Config;
use crate::services::dashboard::Dashboard;
use crate::services::metrics::FeedSettings;
use crate::services::scenario::Scenario;
use crate::services::runtime;
use crate::stores::groups::GroupsStore;
use crate::stores::user_mode::UserModeStore;
use crate::utils::{feeds_snapshot, groups_snapshot, seeded_rng};
use chrono::Local;
use log::{error, info};
use std::path::{Path, PathBuf};
use std::time::Instant;

// Separate random streams so seeded runs stay reproducible per concern.
const GROUPS_RNG_STREAM: u64 = 1;
const METRICS_RNG_STREAM: u64 = 2;

#[derive(Debug)]
struct LoadedEnvFile {
    path: PathBuf,
    explicit: bool,
}

pub fn run() -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (role={}, run_for={}, metrics_enabled={}, metric_interval={}ms, metric_variance={}%, seed={}, scenario={})",
        cfg.role,
        cfg.run_for
            .map(|d| format!("{}s", d.as_secs()))
            .unwrap_or_else(|| "forever".to_string()),
        cfg.metrics_enabled,
        cfg.metric_interval.as_millis(),
        cfg.metric_variance_pct,
        cfg.rng_seed.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
        cfg.scenario_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string()),
    );

    // 2) Load the scenario before touching any state, so a bad file fails fast
    let scenario = match cfg.scenario_file.as_deref() {
        Some(path) => {
            let scenario = Scenario::load(path).map_err(|e| format!("loading {} failed: {}", path.display(), e))?;
            info!("Loaded scenario with {} step(s)", scenario.steps.len());
            Some(scenario.into_player())
        }
        None => None,
    };

    // 3) Build stores and mount the dashboard
    let groups = GroupsStore::with_seed_data(seeded_rng(cfg.rng_seed, GROUPS_RNG_STREAM));
    let feed_settings = FeedSettings {
        live: cfg.metrics_enabled,
        update_interval: cfg.metric_interval,
        variance_pct: cfg.metric_variance_pct,
    };
    let mut dashboard = Dashboard::new(
        UserModeStore::new(cfg.role),
        groups,
        feed_settings,
        seeded_rng(cfg.rng_seed, METRICS_RNG_STREAM),
        Local::now(),
        Instant::now(),
    );
    info!(
        "Dashboard ready: {} group(s), {} control card(s), {} metric feed(s)",
        dashboard.groups().groups().len(),
        dashboard.cards().len(),
        dashboard.feeds().len()
    );

    // 4) Run until the configured duration elapses
    runtime::run_loop(&mut dashboard, scenario, cfg.run_for);

    // 5) Final state
    for feed in dashboard.feeds() {
        let spec = feed.spec();
        info!(
            "Metric {}: {:.2} {} (range {}-{}, trend {:?}{})",
            spec.title,
            feed.current(),
            spec.unit,
            spec.min,
            spec.max,
            spec.trend,
            if feed.is_paused() { ", paused" } else { "" }
        );
    }
    info!("Final metrics: {}", feeds_snapshot(dashboard.feeds())?);
    info!("Final groups: {}", groups_snapshot(dashboard.groups().groups())?);

    Ok(())
}

fn configure_env_from_cli() -> Result<Option<LoadedEnvFile>, String> {
    let mut args = std::env::args_os();
    args.next(); // skip program name

    let mut env_file: Option<PathBuf> = None;
    while let Some(arg) = args.next() {
        let value = match arg.to_str() {
            Some("--env-file") => Some(PathBuf::from(
                args.next().ok_or_else(|| "`--env-file` requires a path argument".to_string())?,
            )),
            Some(s) if s.starts_with("--env-file=") => Some(PathBuf::from(&s["--env-file=".len()..])),
            Some("--") => break,
            Some(other) => return Err(format!("unrecognised argument: {}", other)),
            None => return Err("argument contains invalid UTF-8".to_string()),
        };
        if env_file.is_some() {
            return Err("`--env-file` provided more than once".to_string());
        }
        env_file = value.filter(|p| !p.as_os_str().is_empty());
        if env_file.is_none() {
            return Err("`--env-file` requires a path argument".to_string());
        }
    }

    match env_file {
        Some(path) => {
            if !path.is_file() {
                return Err(format!("env file not found: {}", path.display()));
            }
            load_env_file(&path)?;
            Ok(Some(LoadedEnvFile { path, explicit: true }))
        }
        None => {
            let cwd = std::env::current_dir().map_err(|e| format!("unable to read current directory: {}", e))?;
            let default_path = cwd.join(".env");
            if !default_path.is_file() {
                return Ok(None);
            }
            load_env_file(&default_path)?;
            Ok(Some(LoadedEnvFile {
                path: default_path,
                explicit: false,
            }))
        }
    }
}

fn load_env_file(path: &Path) -> Result<(), String> {
    let contents = std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;

    for (index, line) in contents.lines().enumerate() {
        let parsed = parse_env_assignment(line).map_err(|e| format!("{}:{}: {}", path.display(), index + 1, e))?;
        if let Some((key, value)) = parsed {
            // Variables already present in the process environment win.
            if std::env::var_os(&key).is_none() {
                // Updating process-level environment variables is unsafe on some targets.
                unsafe {
                    std::env::set_var(key, value);
                }
            }
        }
    }

    Ok(())
}

/// `KEY=value`, optionally prefixed with `export`, with `#` comments and
/// single- or double-quoted values.
fn parse_env_assignment(line: &str) -> Result<Option<(String, String)>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let assignment = trimmed.strip_prefix("export ").map(str::trim_start).unwrap_or(trimmed);

    let (key, raw_value) = assignment
        .split_once('=')
        .ok_or_else(|| "missing '=' in assignment".to_string())?;
    let key = key.trim();
    if key.is_empty() {
        return Err("environment variable name cannot be empty".to_string());
    }
    if key.chars().any(char::is_whitespace) {
        return Err(format!("environment variable name contains whitespace: {}", key));
    }

    Ok(Some((key.to_string(), parse_env_value(raw_value.trim())?)))
}

fn parse_env_value(raw: &str) -> Result<String, String> {
    let Some(quote) = raw.chars().next().filter(|c| *c == '"' || *c == '\'') else {
        return Ok(raw.split('#').next().unwrap_or_default().trim_end().to_string());
    };

    let mut value = String::new();
    let mut chars = raw[1..].chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if quote == '"' => match chars.next() {
                Some('n') => value.push('\n'),
                Some('r') => value.push('\r'),
                Some('t') => value.push('\t'),
                Some(other) => value.push(other),
                None => return Err("unterminated escape sequence in double-quoted value".to_string()),
            },
            c if c == quote => {
                let rest = chars.as_str().trim();
                return if rest.is_empty() || rest.starts_with('#') {
                    Ok(value)
                } else {
                    Err("unexpected characters after closing quote".to_string())
                };
            }
            c => value.push(c),
        }
    }
    Err("unterminated quoted value".to_string())
}

fn main() {
    let loaded_env = match configure_env_from_cli() {
        Ok(info) => info,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "CLI-specified" } else { "default" };
        info!("Environment loaded from {} .env file: {}", origin, info.path.display());
    }

    info!(
        "wave-habitat {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run() {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
