//! Simulated water-quality metrics.
//!
//! Each feed starts with a day of hourly history scattered around its base
//! value, then drifts by a random percentage on every refresh while it is live
//! and not paused. Values are clamped to the metric's range.

use chrono::{DateTime, Duration as ChronoDuration, Local};
use log::debug;
use rand::rngs::SmallRng;
use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub const CHART_POINTS: usize = 24;
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(3000);
pub const DEFAULT_VARIANCE_PCT: f64 = 5.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSpec {
    pub title: &'static str,
    pub unit: &'static str,
    pub base: f64,
    pub min: f64,
    pub max: f64,
    /// Spread of the generated history around `base`.
    pub chart_variance: f64,
    pub trend: Trend,
}

pub const HABITAT_METRICS: [MetricSpec; 6] = [
    MetricSpec {
        title: "Oxygen Levels",
        unit: "mg/L",
        base: 8.5,
        min: 7.0,
        max: 10.0,
        chart_variance: 0.5,
        trend: Trend::Up,
    },
    MetricSpec {
        title: "Temperature",
        unit: "°C",
        base: 24.2,
        min: 22.0,
        max: 26.0,
        chart_variance: 0.3,
        trend: Trend::Stable,
    },
    MetricSpec {
        title: "pH Level",
        unit: "pH",
        base: 7.8,
        min: 7.0,
        max: 8.5,
        chart_variance: 0.2,
        trend: Trend::Stable,
    },
    MetricSpec {
        title: "Salinity",
        unit: "ppt",
        base: 35.2,
        min: 34.0,
        max: 36.5,
        chart_variance: 0.4,
        trend: Trend::Down,
    },
    MetricSpec {
        title: "Turbidity",
        unit: "NTU",
        base: 1.2,
        min: 0.5,
        max: 2.0,
        chart_variance: 0.3,
        trend: Trend::Stable,
    },
    MetricSpec {
        title: "Ammonia",
        unit: "ppm",
        base: 0.05,
        min: 0.0,
        max: 0.1,
        chart_variance: 0.02,
        trend: Trend::Stable,
    },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPoint {
    pub time: DateTime<Local>,
    pub value: f64,
}

/// Serializable view of a feed: its metric, latest value and chart series.
#[derive(Debug, Serialize)]
pub struct FeedSnapshot<'a> {
    #[serde(flatten)]
    pub spec: &'a MetricSpec,
    pub current: f64,
    pub paused: bool,
    pub chart: &'a VecDeque<DataPoint>,
}

#[derive(Debug, Copy, Clone)]
pub struct FeedSettings {
    pub live: bool,
    pub update_interval: Duration,
    /// Maximum drift per refresh, in percent of the current value.
    pub variance_pct: f64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        FeedSettings {
            live: true,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            variance_pct: DEFAULT_VARIANCE_PCT,
        }
    }
}

/// `count` hourly points ending one hour before `now`, each `base ± variance`.
pub fn generate_chart_data(
    base: f64,
    variance: f64,
    count: usize,
    now: DateTime<Local>,
    rng: &mut SmallRng,
) -> VecDeque<DataPoint> {
    (0..count)
        .map(|i| {
            let hours_back = (count - i) as i64;
            let offset = rng.random_range(-1.0..=1.0) * variance;
            DataPoint {
                time: now - ChronoDuration::hours(hours_back),
                value: base + offset,
            }
        })
        .collect()
}

pub struct MetricFeed {
    spec: MetricSpec,
    settings: FeedSettings,
    current: f64,
    chart: VecDeque<DataPoint>,
    paused: bool,
    next_due: Option<Instant>,
}

impl MetricFeed {
    pub fn new(
        spec: MetricSpec,
        settings: FeedSettings,
        wall_clock: DateTime<Local>,
        now: Instant,
        rng: &mut SmallRng,
    ) -> Self {
        let chart = generate_chart_data(spec.base, spec.chart_variance, CHART_POINTS, wall_clock, rng);
        let next_due = settings.live.then(|| now + settings.update_interval);
        MetricFeed {
            spec,
            settings,
            current: spec.base,
            chart,
            paused: false,
            next_due,
        }
    }

    pub fn spec(&self) -> &MetricSpec {
        &self.spec
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn chart(&self) -> &VecDeque<DataPoint> {
        &self.chart
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    pub fn snapshot(&self) -> FeedSnapshot<'_> {
        FeedSnapshot {
            spec: &self.spec,
            current: self.current,
            paused: self.paused,
            chart: self.chart(),
        }
    }

    pub fn pause(&mut self) {
        self.paused = true;
        self.next_due = None;
    }

    /// Resume refreshing; the next value arrives a full interval from `now`.
    pub fn resume(&mut self, now: Instant) {
        self.paused = false;
        if self.settings.live && self.next_due.is_none() {
            self.next_due = Some(now + self.settings.update_interval);
        }
    }

    /// Refresh the value if due. Returns the new value when it refreshed.
    pub fn poll(&mut self, now: Instant, wall_clock: DateTime<Local>, rng: &mut SmallRng) -> Option<f64> {
        let due = self.next_due?;
        if now < due {
            return None;
        }
        self.next_due = Some(due + self.settings.update_interval);

        let drift = rng.random_range(-1.0..=1.0) * self.settings.variance_pct / 100.0;
        let value = (self.current * (1.0 + drift)).clamp(self.spec.min, self.spec.max);
        let value = (value * 100.0).round() / 100.0;
        self.current = value;

        self.chart.pop_front();
        self.chart.push_back(DataPoint {
            time: wall_clock,
            value,
        });
        debug!("Metrics: {} = {:.2} {}", self.spec.title, value, self.spec.unit);
        Some(value)
    }
}
