//! Reservation workflow actions
//!
//! Each action is one or more retried requests plus the parsing and edge-case
//! policy around them. Actions never panic and never return transport
//! errors directly: exhausted retries become [`ActionError::Unavailable`],
//! unreadable bodies are logged and degrade to an empty list or
//! [`ActionError::Malformed`].

use chrono::{Duration as ChronoDuration, Local, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};
use tracing::warn;

use crate::config::ReservationConfig;
use crate::error::ActionError;
use crate::model::{parse_reservations, parse_slots, Reservation, TimeSlot};
use crate::retry::{AttemptResult, RetryingExecutor};
use crate::session::Session;
use crate::transport::{HttpRequest, Transport};

/// Statuses on the create call that mean "someone else booked it first".
pub const CONFLICT_STATUSES: &[u16] = &[400, 409];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created { turno_id: i64 },
    /// 400/409: an expected race with another user, not a hard failure.
    Conflict { status: u16 },
    /// No slot was free for the chosen court and date; nothing was written.
    NoSlots,
    Failed(ActionError),
}

impl CreateOutcome {
    pub fn created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled { reservation_id: i64 },
    /// No reservation in an eligible state; nothing was written.
    NothingToCancel,
    Failed(ActionError),
}

impl CancelOutcome {
    /// Nothing to cancel counts as success.
    pub fn succeeded(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Turn a retried GET into its body, demanding a 200.
fn expect_ok(result: AttemptResult) -> Result<String, ActionError> {
    if !result.succeeded {
        return Err(ActionError::Unavailable {
            status: result.status,
        });
    }
    match result.status {
        Some(200) => Ok(result.body.unwrap_or_default()),
        Some(status) => Err(ActionError::UnexpectedStatus { status }),
        None => Err(ActionError::Unavailable { status: None }),
    }
}

#[derive(Debug, Clone)]
pub struct ReservationActions {
    executor: RetryingExecutor,
    config: ReservationConfig,
}

impl ReservationActions {
    pub fn new(executor: RetryingExecutor, config: ReservationConfig) -> Self {
        Self { executor, config }
    }

    pub fn config(&self) -> &ReservationConfig {
        &self.config
    }

    pub fn random_court<R: Rng>(&self, rng: &mut R) -> u32 {
        rng.gen_range(self.config.court_ids.clone())
    }

    /// A date inside the booking window, counted from `today`.
    pub fn random_date<R: Rng>(&self, rng: &mut R, today: NaiveDate) -> NaiveDate {
        let offset = rng.gen_range(self.config.date_window_days.clone());
        today + ChronoDuration::days(offset)
    }

    /// GET /api/canchas/disponibles/{sport}. Only the status matters; a body
    /// that is not a JSON array yields an empty list.
    pub async fn list_available_courts<T>(
        &self,
        transport: &mut T,
        session: &Session,
        sport: &str,
    ) -> Result<Vec<Value>, ActionError>
    where
        T: Transport + ?Sized,
    {
        let request = HttpRequest::get(
            format!("/api/canchas/disponibles/{sport}"),
            "GET /api/canchas/disponibles/{sport}",
        )
        .bearer(session.token());
        let body = expect_ok(self.executor.execute(transport, &request).await)?;
        Ok(serde_json::from_str::<Vec<Value>>(&body).unwrap_or_default())
    }

    /// GET /api/turnos/disponibles/{court}/cancha?fecha=YYYY-MM-DD.
    pub async fn list_available_slots<T>(
        &self,
        transport: &mut T,
        session: &Session,
        court_id: u32,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, ActionError>
    where
        T: Transport + ?Sized,
    {
        let request = HttpRequest::get(
            format!(
                "/api/turnos/disponibles/{court_id}/cancha?fecha={}",
                date.format("%Y-%m-%d")
            ),
            "GET /api/turnos/disponibles/{id}/cancha",
        )
        .bearer(session.token());
        let body = expect_ok(self.executor.execute(transport, &request).await)?;

        match parse_slots(&body) {
            Ok(slots) => Ok(slots),
            Err(e) => {
                warn!(court_id, %date, "could not parse slots response: {e}");
                Ok(Vec::new())
            }
        }
    }

    /// GET /api/usuarios/{id}/reservas, bare or paged.
    pub async fn list_user_reservations<T>(
        &self,
        transport: &mut T,
        session: &Session,
    ) -> Result<Vec<Reservation>, ActionError>
    where
        T: Transport + ?Sized,
    {
        let request = HttpRequest::get(
            format!("/api/usuarios/{}/reservas", session.user_id()),
            "GET /api/usuarios/{id}/reservas",
        )
        .bearer(session.token());
        let body = expect_ok(self.executor.execute(transport, &request).await)?;

        parse_reservations(&body).map_err(|e| {
            warn!(user_id = session.user_id(), "error parsing reservations: {e}");
            ActionError::Malformed(e.to_string())
        })
    }

    /// Book a random free slot on a random court and date.
    pub async fn create_reservation<T, R>(
        &self,
        transport: &mut T,
        session: &Session,
        rng: &mut R,
    ) -> CreateOutcome
    where
        T: Transport + ?Sized,
        R: Rng + Send,
    {
        let court_id = self.random_court(rng);
        let date = self.random_date(rng, Local::now().date_naive());

        let slots = match self
            .list_available_slots(transport, session, court_id, date)
            .await
        {
            Ok(slots) => slots,
            Err(e) => return CreateOutcome::Failed(e),
        };
        let Some(slot) = slots.choose(rng) else {
            return CreateOutcome::NoSlots;
        };

        let request = HttpRequest::post_json(
            "/api/reservas/byuser",
            "POST /api/reservas/byuser",
            &json!({ "turnoId": slot.id }),
        )
        .bearer(session.token())
        .accept_statuses(CONFLICT_STATUSES);
        let result = self.executor.execute(transport, &request).await;

        match result.status {
            _ if !result.succeeded => CreateOutcome::Failed(ActionError::Unavailable {
                status: result.status,
            }),
            Some(200 | 201) => CreateOutcome::Created { turno_id: slot.id },
            Some(status) if CONFLICT_STATUSES.contains(&status) => {
                CreateOutcome::Conflict { status }
            }
            Some(status) => CreateOutcome::Failed(ActionError::UnexpectedStatus { status }),
            None => CreateOutcome::Failed(ActionError::Unavailable { status: None }),
        }
    }

    /// Cancel one of the user's reservations that is still eligible.
    pub async fn cancel_reservation<T, R>(
        &self,
        transport: &mut T,
        session: &Session,
        rng: &mut R,
    ) -> CancelOutcome
    where
        T: Transport + ?Sized,
        R: Rng + Send,
    {
        let reservations = match self.list_user_reservations(transport, session).await {
            Ok(reservations) => reservations,
            Err(e) => return CancelOutcome::Failed(e),
        };

        let eligible: Vec<&Reservation> = reservations
            .iter()
            .filter(|r| self.config.cancellation.is_eligible(r.estado))
            .collect();
        let Some(reservation) = eligible.choose(rng) else {
            return CancelOutcome::NothingToCancel;
        };
        let reservation_id = reservation.id;

        let request = HttpRequest::put_empty(
            format!("/api/reservas/{reservation_id}/cancelar"),
            "PUT /api/reservas/{id}/cancelar",
        )
        .bearer(session.token());
        let result = self.executor.execute(transport, &request).await;

        if result.is_status(200) {
            CancelOutcome::Cancelled { reservation_id }
        } else if !result.succeeded {
            CancelOutcome::Failed(ActionError::Unavailable {
                status: result.status,
            })
        } else {
            CancelOutcome::Failed(ActionError::UnexpectedStatus {
                status: result.status.unwrap_or(0),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn actions() -> ReservationActions {
        ReservationActions::new(RetryingExecutor::default(), ReservationConfig::default())
    }

    #[test]
    fn random_court_and_date_stay_in_range() {
        let actions = actions();
        let mut rng = StdRng::seed_from_u64(11);
        let today = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        for _ in 0..500 {
            let court = actions.random_court(&mut rng);
            assert!((1..=4).contains(&court));
            let date = actions.random_date(&mut rng, today);
            assert!(date > today);
            assert!(date <= today + ChronoDuration::days(30));
        }
    }

    #[test]
    fn expect_ok_maps_statuses() {
        let ok = AttemptResult {
            succeeded: true,
            status: Some(200),
            body: Some("[]".into()),
            attempts: 1,
        };
        assert_eq!(expect_ok(ok).unwrap(), "[]");

        let forbidden = AttemptResult {
            succeeded: true,
            status: Some(403),
            body: None,
            attempts: 1,
        };
        assert_eq!(
            expect_ok(forbidden),
            Err(ActionError::UnexpectedStatus { status: 403 })
        );

        let exhausted = AttemptResult {
            succeeded: false,
            status: Some(503),
            body: None,
            attempts: 3,
        };
        assert_eq!(
            expect_ok(exhausted),
            Err(ActionError::Unavailable { status: Some(503) })
        );
    }

    #[test]
    fn outcome_helpers() {
        assert!(CreateOutcome::Created { turno_id: 1 }.created());
        assert!(!CreateOutcome::Conflict { status: 409 }.created());
        assert!(!CreateOutcome::NoSlots.created());
        assert!(CancelOutcome::NothingToCancel.succeeded());
        assert!(!CancelOutcome::Failed(ActionError::Malformed("x".into())).succeeded());
    }
}
