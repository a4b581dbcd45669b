//! Run configuration
//!
//! All test parameters are centralized here. Values come from `TURNOS_*`
//! environment variables with the defaults below; the binary reads them once
//! and passes the typed structs down.

use rand::Rng;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::model::ReservationState;
use crate::retry::RetryPolicy;
use crate::session::Credentials;

/// Base URL for the reservation API
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Sport category browsed by every user
pub const DEFAULT_SPORT: &str = "FUTBOL";

/// Generated pool size when no users file is given
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Password shared by generated pool accounts
pub const DEFAULT_POOL_PASSWORD: &str = "password123/*";

// ============================================================================
// Cancellation eligibility
// ============================================================================

/// Which reservation states a user may cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancellationPolicy {
    /// PENDIENTE or CONFIRMADA
    #[default]
    Active,
    /// CONFIRMADA only
    ConfirmedOnly,
}

impl CancellationPolicy {
    pub fn is_eligible(&self, state: ReservationState) -> bool {
        match self {
            Self::Active => matches!(
                state,
                ReservationState::Pendiente | ReservationState::Confirmada
            ),
            Self::ConfirmedOnly => state == ReservationState::Confirmada,
        }
    }
}

impl FromStr for CancellationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" | "pending-confirmed" => Ok(Self::Active),
            "confirmed" | "confirmed-only" => Ok(Self::ConfirmedOnly),
            other => Err(format!("expected `active` or `confirmed`, got `{other}`")),
        }
    }
}

// ============================================================================
// Actions and scenario
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationConfig {
    pub sport: String,
    pub court_ids: RangeInclusive<u32>,
    /// Days after today a new booking may target.
    pub date_window_days: RangeInclusive<i64>,
    pub cancellation: CancellationPolicy,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            sport: DEFAULT_SPORT.to_string(),
            court_ids: 1..=4,
            date_window_days: 1..=30,
            cancellation: CancellationPolicy::default(),
        }
    }
}

/// A randomized pause between `min` and `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PauseRange {
    pub min: Duration,
    pub max: Duration,
}

impl PauseRange {
    pub const NONE: PauseRange = PauseRange {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    pub fn millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        self.min + (self.max - self.min).mul_f64(rng.gen::<f64>())
    }
}

/// Branch thresholds and think times of the customer flow.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    /// Draws below this create a reservation.
    pub reserve_threshold: f64,
    /// Draws in the top `cancel_share` of the same draw cancel one.
    pub cancel_share: f64,
    /// Independent chance of a brand-new user signing up and booking.
    pub new_user_probability: f64,
    /// After each browse or view request.
    pub step_pause: PauseRange,
    /// After browsing slots and after a new-user signup.
    pub think_time: PauseRange,
    /// End of every iteration.
    pub pacing: PauseRange,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            reserve_threshold: 0.6,
            cancel_share: 0.1,
            new_user_probability: 0.05,
            step_pause: PauseRange::millis(200, 400),
            think_time: PauseRange::millis(500, 1000),
            pacing: PauseRange::millis(500, 1500),
        }
    }
}

impl ScenarioConfig {
    /// Default thresholds with every pause removed.
    pub fn without_pauses() -> Self {
        Self {
            step_pause: PauseRange::NONE,
            think_time: PauseRange::NONE,
            pacing: PauseRange::NONE,
            ..Self::default()
        }
    }

    pub fn reserves(&self, chance: f64) -> bool {
        chance < self.reserve_threshold
    }

    pub fn cancels(&self, chance: f64) -> bool {
        chance >= 1.0 - self.cancel_share
    }
}

// ============================================================================
// Load profiles
// ============================================================================

/// Ramp plan handed to Goose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadProfile {
    /// Ramp to 10, then 20 users, hold, ramp down.
    Stress,
    /// Short warm-up, sudden jump to 50 users, hold, fast recovery.
    Spike,
    /// Sustained 100 users.
    Load,
}

impl LoadProfile {
    /// Goose test plan: `users,time;users,time;...`
    pub fn test_plan(&self) -> &'static str {
        match self {
            Self::Stress => "10,30s;20,1m;20,2m;0,30s",
            Self::Spike => "5,10s;50,20s;50,1m;0,10s",
            Self::Load => "100,2m;100,10m;0,2m",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Stress => "stress",
            Self::Spike => "spike",
            Self::Load => "load",
        }
    }
}

impl FromStr for LoadProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stress" => Ok(Self::Stress),
            "spike" => Ok(Self::Spike),
            "load" | "soak" => Ok(Self::Load),
            other => Err(format!("unknown profile `{other}`")),
        }
    }
}

/// Flat run replacing the ramp plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatRun {
    pub duration_secs: u64,
    pub users: usize,
}

// ============================================================================
// Top level
// ============================================================================

#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub base_url: String,
    pub profile: LoadProfile,
    pub flat_run: Option<FlatRun>,
    pub users: Vec<Credentials>,
    pub seed: Option<u64>,
    pub result_file: Option<String>,
    pub retry: RetryPolicy,
    pub reservation: ReservationConfig,
    pub scenario: ScenarioConfig,
}

impl LoadConfig {
    /// Load configuration from environment variables or defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("TURNOS_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let profile = parse_var(&lookup, "TURNOS_PROFILE")?.unwrap_or(LoadProfile::Stress);

        let flat_run = match parse_var::<u64, _>(&lookup, "TURNOS_TEST_DURATION")? {
            Some(duration_secs) => Some(FlatRun {
                duration_secs,
                users: parse_var(&lookup, "TURNOS_TEST_VUS")?.unwrap_or(20),
            }),
            None => None,
        };

        let users = match lookup("TURNOS_USERS_FILE") {
            Some(path) => read_users_file(&path)?,
            None => {
                let size = parse_var(&lookup, "TURNOS_POOL_SIZE")?.unwrap_or(DEFAULT_POOL_SIZE);
                generated_users(size)
            }
        };

        let mut reservation = ReservationConfig::default();
        if let Some(sport) = lookup("TURNOS_SPORT") {
            reservation.sport = sport;
        }
        if let Some(policy) = parse_var(&lookup, "TURNOS_CANCEL_ELIGIBLE")? {
            reservation.cancellation = policy;
        }

        let mut scenario = ScenarioConfig::default();
        if let Some(threshold) = parse_probability(&lookup, "TURNOS_RESERVE_THRESHOLD")? {
            scenario.reserve_threshold = threshold;
        }
        if let Some(share) = parse_probability(&lookup, "TURNOS_CANCEL_SHARE")? {
            scenario.cancel_share = share;
        }
        if let Some(probability) = parse_probability(&lookup, "TURNOS_NEW_USER_PROBABILITY")? {
            scenario.new_user_probability = probability;
        }

        Ok(Self {
            base_url,
            profile,
            flat_run,
            users,
            seed: parse_var(&lookup, "TURNOS_SEED")?,
            result_file: lookup("TURNOS_RESULT_FILE"),
            retry: RetryPolicy::default(),
            reservation,
            scenario,
        })
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                var,
                value,
                reason: e.to_string(),
            }),
    }
}

/// A fraction in `[0, 1]`.
fn parse_probability<F>(lookup: &F, var: &'static str) -> Result<Option<f64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_var::<f64, _>(lookup, var)? {
        Some(p) if !(0.0..=1.0).contains(&p) => Err(ConfigError::InvalidValue {
            var,
            value: p.to_string(),
            reason: "expected a value between 0 and 1".to_string(),
        }),
        parsed => Ok(parsed),
    }
}

fn read_users_file(path: &str) -> Result<Vec<Credentials>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::UsersFile {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::UsersFormat {
        path: path.to_string(),
        source,
    })
}

/// `loadtest_user_{i}@mail.com` accounts, created on first login if needed.
pub fn generated_users(count: usize) -> Vec<Credentials> {
    (0..count)
        .map(|i| Credentials::new(format!("loadtest_user_{i}@mail.com"), DEFAULT_POOL_PASSWORD))
        .collect()
}
