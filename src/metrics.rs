//! Per-step timing and outcome metrics
//!
//! Goose already aggregates raw HTTP requests. The scenario layer reports
//! logical steps (one reservation may be several requests) through the
//! [`MetricsSink`] trait. [`ScenarioMetrics`] is the in-process sink: it is
//! built once per run, shared by every simulated user, and summarized by the
//! host once the attack finishes.
//!
//! Latencies are kept as `f64` milliseconds so sub-millisecond steps keep
//! their precision.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A logical step of the customer flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Login,
    BrowseCourts,
    BrowseSlots,
    CreateReservation,
    ViewReservations,
    CancelReservation,
    NewUser,
}

impl Step {
    pub const ALL: [Step; 7] = [
        Step::Login,
        Step::BrowseCourts,
        Step::BrowseSlots,
        Step::CreateReservation,
        Step::ViewReservations,
        Step::CancelReservation,
        Step::NewUser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Login => "login",
            Step::BrowseCourts => "browse_courts",
            Step::BrowseSlots => "browse_slots",
            Step::CreateReservation => "create_reservation",
            Step::ViewReservations => "view_reservations",
            Step::CancelReservation => "cancel_reservation",
            Step::NewUser => "new_user",
        }
    }
}

/// How a step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Success,
    /// Nothing eligible to act on (no slots, nothing to cancel).
    NoOp,
    /// 400/409 on a write: another user got there first.
    ExpectedConflict,
    Failure,
}

/// Receives step events. Must tolerate concurrent callers.
pub trait MetricsSink: Send + Sync {
    fn record_duration(&self, step: Step, elapsed: Duration);
    fn record_outcome(&self, step: Step, outcome: StepOutcome);
}

/// Thread-safe aggregator for step latencies and outcome counts
#[derive(Default)]
pub struct ScenarioMetrics {
    latencies: Mutex<HashMap<Step, Vec<f64>>>,
    outcomes: Mutex<HashMap<(Step, StepOutcome), u64>>,
}

impl ScenarioMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get percentiles (p50, p95, p99) for a step, in milliseconds
    pub fn percentiles(&self, step: Step) -> (f64, f64, f64) {
        let Ok(map) = self.latencies.lock() else {
            return (0.0, 0.0, 0.0);
        };
        match map.get(&step) {
            Some(times) if !times.is_empty() => {
                let mut sorted = times.clone();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                let len = sorted.len();
                let p50 = sorted[((len as f64 * 0.50) as usize).min(len - 1)];
                let p95 = sorted[((len as f64 * 0.95) as usize).min(len - 1)];
                let p99 = sorted[((len as f64 * 0.99) as usize).min(len - 1)];
                (p50, p95, p99)
            }
            _ => (0.0, 0.0, 0.0),
        }
    }

    /// Number of timed executions of a step
    pub fn count(&self, step: Step) -> usize {
        self.latencies
            .lock()
            .map(|map| map.get(&step).map(Vec::len).unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn outcome_count(&self, step: Step, outcome: StepOutcome) -> u64 {
        self.outcomes
            .lock()
            .map(|map| map.get(&(step, outcome)).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn failures(&self, step: Step) -> u64 {
        self.outcome_count(step, StepOutcome::Failure)
    }

    /// Snapshot of every step that recorded at least one event.
    pub fn summary(&self) -> Vec<StepSummary> {
        Step::ALL
            .iter()
            .filter_map(|&step| {
                let count = self.count(step);
                let outcomes: u64 = [
                    StepOutcome::Success,
                    StepOutcome::NoOp,
                    StepOutcome::ExpectedConflict,
                    StepOutcome::Failure,
                ]
                .iter()
                .map(|&o| self.outcome_count(step, o))
                .sum();
                if count == 0 && outcomes == 0 {
                    return None;
                }
                let (p50, p95, p99) = self.percentiles(step);
                Some(StepSummary {
                    step,
                    count,
                    successes: self.outcome_count(step, StepOutcome::Success),
                    no_ops: self.outcome_count(step, StepOutcome::NoOp),
                    conflicts: self.outcome_count(step, StepOutcome::ExpectedConflict),
                    failures: self.failures(step),
                    p50,
                    p95,
                    p99,
                })
            })
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut map) = self.latencies.lock() {
            map.clear();
        }
        if let Ok(mut map) = self.outcomes.lock() {
            map.clear();
        }
    }
}

impl MetricsSink for ScenarioMetrics {
    fn record_duration(&self, step: Step, elapsed: Duration) {
        if let Ok(mut map) = self.latencies.lock() {
            map.entry(step)
                .or_default()
                .push(elapsed.as_secs_f64() * 1000.0);
        }
    }

    fn record_outcome(&self, step: Step, outcome: StepOutcome) {
        if let Ok(mut map) = self.outcomes.lock() {
            *map.entry((step, outcome)).or_default() += 1;
        }
    }
}

/// Aggregated figures for one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepSummary {
    pub step: Step,
    pub count: usize,
    pub successes: u64,
    #[serde(rename = "noOps")]
    pub no_ops: u64,
    pub conflicts: u64,
    pub failures: u64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Times one step and reports it to a sink.
pub struct StepTimer<'a, M: MetricsSink + ?Sized> {
    sink: &'a M,
    step: Step,
    start: Instant,
}

impl<'a, M: MetricsSink + ?Sized> StepTimer<'a, M> {
    pub fn start(sink: &'a M, step: Step) -> Self {
        Self {
            sink,
            step,
            start: Instant::now(),
        }
    }

    /// Record the elapsed time and the outcome.
    pub fn finish(self, outcome: StepOutcome) -> Duration {
        let elapsed = self.start.elapsed();
        self.sink.record_duration(self.step, elapsed);
        self.sink.record_outcome(self.step, outcome);
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_over_recorded_latencies() {
        let metrics = ScenarioMetrics::new();
        for ms in 1..=100 {
            metrics.record_duration(Step::BrowseCourts, Duration::from_millis(ms));
        }

        let (p50, p95, p99) = metrics.percentiles(Step::BrowseCourts);
        assert_eq!(metrics.count(Step::BrowseCourts), 100);
        assert!((p50 - 51.0).abs() < 1e-6);
        assert!((p95 - 96.0).abs() < 1e-6);
        assert!((p99 - 100.0).abs() < 1e-6);
        assert_eq!(metrics.percentiles(Step::NewUser), (0.0, 0.0, 0.0));
    }

    #[test]
    fn summary_skips_silent_steps() {
        let metrics = ScenarioMetrics::new();
        StepTimer::start(&metrics, Step::CreateReservation).finish(StepOutcome::ExpectedConflict);
        StepTimer::start(&metrics, Step::CreateReservation).finish(StepOutcome::Failure);

        let summary = metrics.summary();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].step, Step::CreateReservation);
        assert_eq!(summary[0].count, 2);
        assert_eq!(summary[0].conflicts, 1);
        assert_eq!(summary[0].failures, 1);
    }

    #[test]
    fn clear_resets_everything() {
        let metrics = ScenarioMetrics::new();
        metrics.record_outcome(Step::Login, StepOutcome::Failure);
        metrics.clear();
        assert_eq!(metrics.failures(Step::Login), 0);
        assert!(metrics.summary().is_empty());
    }
}
