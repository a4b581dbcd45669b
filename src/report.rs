//! Run summary output
//!
//! Threshold checks and the HTTP request report belong to Goose. This is the
//! complementary view: per-step figures from [`ScenarioMetrics`] plus how the
//! setup phase went, as one JSON document.

use serde::Serialize;
use tracing::{info, warn};

use crate::metrics::{ScenarioMetrics, StepSummary};

/// JSON result format for the customer-flow binary
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub test: String,
    pub profile: String,
    #[serde(rename = "sessionsRequested")]
    pub sessions_requested: usize,
    #[serde(rename = "sessionsEstablished")]
    pub sessions_established: usize,
    #[serde(rename = "durationSecs")]
    pub duration_secs: f64,
    #[serde(rename = "httpRequests")]
    pub http_requests: usize,
    #[serde(rename = "httpFailures")]
    pub http_failures: usize,
    pub steps: Vec<StepSummary>,
    pub timestamp: String,
}

impl RunSummary {
    pub fn new(
        test: &str,
        profile: &str,
        sessions_requested: usize,
        sessions_established: usize,
    ) -> Self {
        Self {
            test: test.to_string(),
            profile: profile.to_string(),
            sessions_requested,
            sessions_established,
            duration_secs: 0.0,
            http_requests: 0,
            http_failures: 0,
            steps: Vec::new(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_steps(mut self, metrics: &ScenarioMetrics) -> Self {
        self.steps = metrics.summary();
        self
    }

    pub fn with_http_totals(
        mut self,
        requests: usize,
        failures: usize,
        duration_secs: f64,
    ) -> Self {
        self.http_requests = requests;
        self.http_failures = failures;
        self.duration_secs = duration_secs;
        self
    }

    /// Print a one-line overview per step to the log.
    pub fn log(&self) {
        info!(
            "setup: {}/{} sessions, {} requests ({} failed) in {:.1}s",
            self.sessions_established,
            self.sessions_requested,
            self.http_requests,
            self.http_failures,
            self.duration_secs
        );
        for step in &self.steps {
            info!(
                "{:<20} n={:<6} ok={:<6} noop={:<5} conflict={:<5} failed={:<5} \
                 p50={:.1}ms p95={:.1}ms p99={:.1}ms",
                step.step.as_str(),
                step.count,
                step.successes,
                step.no_ops,
                step.conflicts,
                step.failures,
                step.p50,
                step.p95,
                step.p99
            );
        }
    }

    /// Write JSON to `result_file` (if set) and stdout
    pub fn emit(&self, result_file: Option<&str>) {
        match serde_json::to_string(self) {
            Ok(json) => {
                if let Some(path) = result_file {
                    if let Err(e) = std::fs::write(path, &json) {
                        warn!("failed to write result file {path}: {e}");
                    }
                }
                println!("{json}");
            }
            Err(e) => warn!("failed to serialize run summary: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricsSink, Step, StepOutcome};
    use std::time::Duration;

    #[test]
    fn summary_serializes_with_camel_case_keys() {
        let metrics = ScenarioMetrics::new();
        metrics.record_duration(Step::ViewReservations, Duration::from_millis(12));
        metrics.record_outcome(Step::ViewReservations, StepOutcome::Success);

        let summary = RunSummary::new("customer-flow", "stress", 10, 9)
            .with_steps(&metrics)
            .with_http_totals(120, 3, 240.0);
        let value = serde_json::to_value(&summary).unwrap();

        assert_eq!(value["sessionsEstablished"], 9);
        assert_eq!(value["httpFailures"], 3);
        assert_eq!(value["steps"][0]["step"], "view_reservations");
        assert_eq!(value["steps"][0]["successes"], 1);
    }

    #[test]
    fn emit_writes_result_file() {
        let path = std::env::temp_dir().join(format!("turnos-summary-{}.json", std::process::id()));
        let summary = RunSummary::new("customer-flow", "spike", 1, 1);
        summary.emit(path.to_str());

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"profile\":\"spike\""));
        let _ = std::fs::remove_file(&path);
    }
}
