//! Customer flow scenario
//!
//! One call to [`CustomerFlow::run_iteration`] is one visit of a simulated
//! customer:
//!
//! 1. browse courts (always)
//! 2. browse slots of a random court for today (always), then think
//! 3. create a reservation (reserve bucket of the iteration's draw)
//! 4. view own reservations (always)
//! 5. cancel a reservation (cancel bucket: the tail of the same draw)
//! 6. rarely, a brand-new customer signs up and books
//!
//! The draw is taken once per iteration, so reserving and cancelling are
//! mutually exclusive archetypes. Step 6 has its own independent draw. Every
//! step is timed and reported to the [`MetricsSink`]; a failed step is
//! counted and the flow moves on.

use chrono::Local;
use rand::Rng;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::actions::{CancelOutcome, CreateOutcome, ReservationActions};
use crate::config::{PauseRange, ScenarioConfig};
use crate::identity::{random_email, random_name, random_password};
use crate::metrics::{MetricsSink, Step, StepOutcome, StepTimer};
use crate::session::{Credentials, Session, SessionBootstrapper, SessionPool};
use crate::transport::Transport;

/// What happened during one iteration, in execution order.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    pub user_id: i64,
    /// The archetype draw for steps 3 and 5.
    pub chance: f64,
    pub steps: Vec<(Step, StepOutcome)>,
}

impl IterationReport {
    pub fn outcome(&self, step: Step) -> Option<StepOutcome> {
        self.steps
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, outcome)| *outcome)
    }

    pub fn ran(&self, step: Step) -> bool {
        self.outcome(step).is_some()
    }

    pub fn failures(&self) -> usize {
        self.steps
            .iter()
            .filter(|(_, outcome)| *outcome == StepOutcome::Failure)
            .count()
    }
}

impl From<&CreateOutcome> for StepOutcome {
    fn from(outcome: &CreateOutcome) -> Self {
        match outcome {
            CreateOutcome::Created { .. } => StepOutcome::Success,
            CreateOutcome::Conflict { .. } => StepOutcome::ExpectedConflict,
            CreateOutcome::NoSlots => StepOutcome::NoOp,
            CreateOutcome::Failed(_) => StepOutcome::Failure,
        }
    }
}

impl From<&CancelOutcome> for StepOutcome {
    fn from(outcome: &CancelOutcome) -> Self {
        match outcome {
            CancelOutcome::Cancelled { .. } => StepOutcome::Success,
            CancelOutcome::NothingToCancel => StepOutcome::NoOp,
            CancelOutcome::Failed(_) => StepOutcome::Failure,
        }
    }
}

pub struct CustomerFlow {
    bootstrapper: SessionBootstrapper,
    actions: ReservationActions,
    config: ScenarioConfig,
    metrics: Arc<dyn MetricsSink>,
}

impl CustomerFlow {
    pub fn new(
        bootstrapper: SessionBootstrapper,
        actions: ReservationActions,
        config: ScenarioConfig,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            bootstrapper,
            actions,
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Run one visit for a session drawn from `pool`. `None` when the pool
    /// is empty and there is nobody to simulate.
    pub async fn run_iteration<T, R>(
        &self,
        transport: &mut T,
        pool: &SessionPool,
        rng: &mut R,
        user_index: usize,
    ) -> Option<IterationReport>
    where
        T: Transport + ?Sized,
        R: Rng + Send,
    {
        let Some(session) = pool.pick(rng) else {
            debug!("session pool is empty, skipping iteration");
            return None;
        };
        let chance: f64 = rng.gen();
        let mut report = IterationReport {
            user_id: session.user_id(),
            chance,
            steps: Vec::with_capacity(6),
        };

        self.browse_courts(transport, session, &mut report).await;
        self.pause(self.config.step_pause, rng).await;

        self.browse_slots(transport, session, rng, &mut report).await;
        self.pause(self.config.step_pause, rng).await;
        self.pause(self.config.think_time, rng).await;

        if self.config.reserves(chance) {
            self.create_reservation(transport, session, rng, &mut report)
                .await;
            self.pause(self.config.step_pause, rng).await;
        }

        self.view_reservations(transport, session, &mut report).await;
        self.pause(self.config.step_pause, rng).await;

        if self.config.cancels(chance) {
            self.cancel_reservation(transport, session, rng, &mut report)
                .await;
            self.pause(self.config.step_pause, rng).await;
        }

        if rng.gen::<f64>() < self.config.new_user_probability {
            self.new_customer(transport, rng, user_index, &mut report)
                .await;
            self.pause(self.config.think_time, rng).await;
        }

        self.pause(self.config.pacing, rng).await;
        Some(report)
    }

    async fn browse_courts<T>(
        &self,
        transport: &mut T,
        session: &Session,
        report: &mut IterationReport,
    ) where
        T: Transport + ?Sized,
    {
        let timer = StepTimer::start(self.metrics.as_ref(), Step::BrowseCourts);
        let sport = &self.actions.config().sport;
        let outcome = match self
            .actions
            .list_available_courts(transport, session, sport)
            .await
        {
            Ok(_) => StepOutcome::Success,
            Err(e) => {
                warn!(user_id = session.user_id(), "courts status: {e}");
                StepOutcome::Failure
            }
        };
        timer.finish(outcome);
        report.steps.push((Step::BrowseCourts, outcome));
    }

    async fn browse_slots<T, R>(
        &self,
        transport: &mut T,
        session: &Session,
        rng: &mut R,
        report: &mut IterationReport,
    ) where
        T: Transport + ?Sized,
        R: Rng + Send,
    {
        let court_id = self.actions.random_court(rng);
        let today = Local::now().date_naive();

        let timer = StepTimer::start(self.metrics.as_ref(), Step::BrowseSlots);
        let outcome = match self
            .actions
            .list_available_slots(transport, session, court_id, today)
            .await
        {
            Ok(_) => StepOutcome::Success,
            Err(e) => {
                warn!(user_id = session.user_id(), court_id, "slots status: {e}");
                StepOutcome::Failure
            }
        };
        timer.finish(outcome);
        report.steps.push((Step::BrowseSlots, outcome));
    }

    async fn create_reservation<T, R>(
        &self,
        transport: &mut T,
        session: &Session,
        rng: &mut R,
        report: &mut IterationReport,
    ) where
        T: Transport + ?Sized,
        R: Rng + Send,
    {
        let timer = StepTimer::start(self.metrics.as_ref(), Step::CreateReservation);
        let created = self.actions.create_reservation(transport, session, rng).await;
        if let CreateOutcome::Failed(e) = &created {
            warn!(user_id = session.user_id(), "reservation not created: {e}");
        }
        let outcome = StepOutcome::from(&created);
        timer.finish(outcome);
        report.steps.push((Step::CreateReservation, outcome));
    }

    async fn view_reservations<T>(
        &self,
        transport: &mut T,
        session: &Session,
        report: &mut IterationReport,
    ) where
        T: Transport + ?Sized,
    {
        let timer = StepTimer::start(self.metrics.as_ref(), Step::ViewReservations);
        let outcome = match self.actions.list_user_reservations(transport, session).await {
            Ok(_) => StepOutcome::Success,
            Err(e) => {
                warn!(user_id = session.user_id(), "reservations status: {e}");
                StepOutcome::Failure
            }
        };
        timer.finish(outcome);
        report.steps.push((Step::ViewReservations, outcome));
    }

    async fn cancel_reservation<T, R>(
        &self,
        transport: &mut T,
        session: &Session,
        rng: &mut R,
        report: &mut IterationReport,
    ) where
        T: Transport + ?Sized,
        R: Rng + Send,
    {
        let timer = StepTimer::start(self.metrics.as_ref(), Step::CancelReservation);
        let cancelled = self.actions.cancel_reservation(transport, session, rng).await;
        if let CancelOutcome::Failed(e) = &cancelled {
            warn!(user_id = session.user_id(), "reservation not cancelled: {e}");
        }
        let outcome = StepOutcome::from(&cancelled);
        timer.finish(outcome);
        report.steps.push((Step::CancelReservation, outcome));
    }

    /// A first-time visitor: bootstrap a fresh identity, then book with it.
    async fn new_customer<T, R>(
        &self,
        transport: &mut T,
        rng: &mut R,
        user_index: usize,
        report: &mut IterationReport,
    ) where
        T: Transport + ?Sized,
        R: Rng + Send,
    {
        let name = random_name(rng);
        let credentials = Credentials {
            email: random_email(rng, user_index),
            password: random_password(rng),
            name: Some(name.clone()),
        };

        let timer = StepTimer::start(self.metrics.as_ref(), Step::NewUser);
        let session = self
            .bootstrapper
            .ensure_auth(transport, &credentials, &name)
            .await;
        let outcome = if session.is_some() {
            StepOutcome::Success
        } else {
            warn!(email = %credentials.email, "new customer could not be bootstrapped");
            StepOutcome::Failure
        };
        timer.finish(outcome);
        report.steps.push((Step::NewUser, outcome));

        if let Some(session) = session {
            self.pause(self.config.think_time, rng).await;
            self.create_reservation(transport, &session, rng, report).await;
        }
    }

    async fn pause<R: Rng + Send>(&self, range: PauseRange, rng: &mut R) {
        let pause = range.sample(rng);
        if !pause.is_zero() {
            sleep(pause).await;
        }
    }
}
