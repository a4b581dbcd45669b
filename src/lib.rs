//! Goose load tests for the Deporturnos reservation API
//!
//! Simulated customers browse courts and slots, book, review and cancel
//! reservations against a shared pool of pre-authenticated accounts, while
//! riding out transient server errors.
//!
//! ## Features
//! - One retry executor for every request (bounded attempts, exponential
//!   backoff, 4xx never retried)
//! - Login-or-signup bootstrap producing reusable sessions
//! - Reservation actions with their parsing and no-op policies
//! - Weighted customer-flow scenario with injectable randomness
//! - Per-step latency and outcome metrics alongside Goose's request metrics
//!
//! Goose owns scheduling: it ramps users, calls the iteration transaction
//! repeatedly and reports HTTP-level results. Everything here runs inside
//! one simulated user at a time.

pub mod actions;
pub mod config;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod model;
pub mod report;
pub mod retry;
pub mod scenario;
pub mod session;
pub mod transport;

pub use actions::{CancelOutcome, CreateOutcome, ReservationActions};
pub use config::{CancellationPolicy, LoadConfig, LoadProfile, ReservationConfig, ScenarioConfig};
pub use error::{ActionError, ConfigError, TransportError};
pub use metrics::{MetricsSink, ScenarioMetrics, Step, StepOutcome};
pub use report::RunSummary;
pub use retry::{AttemptResult, Exhaustion, RetryPolicy, RetryingExecutor};
pub use scenario::{CustomerFlow, IterationReport};
pub use session::{Credentials, Session, SessionBootstrapper, SessionPool};
pub use transport::{
    GooseTransport, HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport,
};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` wins over `default`.
pub fn init_logging(default: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already installed");
    }
}
