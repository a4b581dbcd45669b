//! Customer Flow Load Test
//!
//! Simulated customers browse courts and slots, book, review and cancel
//! reservations against a pool of accounts logged in before the attack.
//!
//! Usage:
//!   TURNOS_PROFILE=spike cargo run --release --bin load-customer-flow
//!   TURNOS_TEST_DURATION=60 TURNOS_TEST_VUS=10 cargo run --release --bin load-customer-flow
//!
//! Output: JSON run summary on stdout, and in TURNOS_RESULT_FILE when set

use goose::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use turnos_load::session::SETUP_CONCURRENCY;
use turnos_load::{
    init_logging, CustomerFlow, GooseTransport, LoadConfig, MetricsSink, ReqwestTransport,
    ReservationActions, RetryingExecutor, RunSummary, ScenarioMetrics, SessionBootstrapper,
    SessionPool,
};

/// Back-off for a user whose iteration had nobody to simulate
const EMPTY_POOL_BACKOFF: Duration = Duration::from_secs(1);

/// Ramp-up rate for flat runs (users per second)
const FLAT_HATCH_RATE: &str = "10";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("info");
    let config = LoadConfig::from_env()?;

    eprintln!("=== Customer Flow Load Test ===");
    info!(
        "target {} | profile {} | {} accounts",
        config.base_url,
        config.profile.name(),
        config.users.len()
    );

    let executor = RetryingExecutor::new(config.retry.clone());
    let bootstrapper = SessionBootstrapper::new(executor.clone());
    let metrics = Arc::new(ScenarioMetrics::new());

    // Log in (or sign up) every account before any user starts
    eprintln!("\n--- Establishing sessions ---");
    let setup_transport = ReqwestTransport::new(&config.base_url)?;
    let sink: Arc<dyn MetricsSink> = metrics.clone();
    let pool = SessionPool::establish(
        setup_transport,
        &bootstrapper,
        &config.users,
        sink.clone(),
        SETUP_CONCURRENCY,
    )
    .await;
    if pool.is_empty() {
        warn!("no session could be established, every iteration will be skipped");
    }

    let flow = Arc::new(CustomerFlow::new(
        bootstrapper,
        ReservationActions::new(executor, config.reservation.clone()),
        config.scenario.clone(),
        sink,
    ));

    eprintln!("\n--- Running Customer Flow ---");
    let goose_metrics = run_customer_flow(&config, flow, pool.clone()).await?;

    let mut total_success = 0usize;
    let mut total_fail = 0usize;
    for (_, agg) in goose_metrics.requests.iter() {
        total_success += agg.success_count;
        total_fail += agg.fail_count;
    }

    let summary = RunSummary::new(
        "customer-flow",
        config.profile.name(),
        config.users.len(),
        pool.len(),
    )
    .with_steps(&metrics)
    .with_http_totals(
        total_success + total_fail,
        total_fail,
        goose_metrics.duration as f64,
    );
    summary.log();
    summary.emit(config.result_file.as_deref());

    Ok(())
}

async fn run_customer_flow(
    config: &LoadConfig,
    flow: Arc<CustomerFlow>,
    pool: SessionPool,
) -> Result<GooseMetrics, GooseError> {
    let scenario = scenario!("Customer Flow")
        .register_transaction(customer_iteration(flow, pool, config.seed).set_name("iteration"));

    let attack = GooseAttack::initialize()?
        .register_scenario(scenario)
        .set_default(GooseDefault::Host, config.base_url.as_str())?
        .set_default(GooseDefault::AcceptInvalidCerts, true)?;

    let attack = match config.flat_run {
        Some(flat) => attack
            .set_default(GooseDefault::Users, flat.users)?
            .set_default(GooseDefault::RunTime, flat.duration_secs as usize)?
            .set_default(GooseDefault::HatchRate, FLAT_HATCH_RATE)?,
        None => attack.set_default(GooseDefault::TestPlan, config.profile.test_plan())?,
    };

    attack.execute().await
}

/// One Goose transaction per customer visit. With a seed, iteration `n`
/// draws from `seed + n`.
fn customer_iteration(
    flow: Arc<CustomerFlow>,
    pool: SessionPool,
    seed: Option<u64>,
) -> Transaction {
    let iterations = Arc::new(AtomicU64::new(0));

    let closure: TransactionFunction = Arc::new(move |user| {
        let flow = Arc::clone(&flow);
        let pool = pool.clone();
        let iterations = Arc::clone(&iterations);

        Box::pin(async move {
            let n = iterations.fetch_add(1, Ordering::Relaxed);
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(n)),
                None => StdRng::from_entropy(),
            };
            let user_index = user.weighted_users_index;
            let mut transport = GooseTransport::new(user);

            if flow
                .run_iteration(&mut transport, &pool, &mut rng, user_index)
                .await
                .is_none()
            {
                tokio::time::sleep(EMPTY_POOL_BACKOFF).await;
            }
            Ok(())
        })
    });

    Transaction::new(closure)
}
