//! Domain records returned by the reservation API
//!
//! Only the fields the workload acts on are modelled; everything else in the
//! JSON is ignored.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a reservation (`estado`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationState {
    Pendiente,
    Confirmada,
    Cancelada,
    #[serde(other)]
    Other,
}

/// A bookable interval on one court and date (`turno`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub id: i64,
    #[serde(default)]
    pub fecha: Option<NaiveDate>,
    #[serde(default)]
    pub hora_inicio: Option<String>,
    #[serde(default)]
    pub hora_fin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SlotRef {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserRef {
    pub id: i64,
}

/// A booking linking a user to a slot (`reserva`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Reservation {
    pub id: i64,
    pub estado: ReservationState,
    #[serde(default)]
    pub turno: Option<SlotRef>,
    #[serde(default)]
    pub usuario: Option<UserRef>,
}

impl Reservation {
    pub fn turno_id(&self) -> Option<i64> {
        self.turno.as_ref().map(|t| t.id)
    }

    pub fn user_id(&self) -> Option<i64> {
        self.usuario.as_ref().map(|u| u.id)
    }
}

/// The reservation listing comes either as a bare array or wrapped in a
/// page envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReservationEnvelope {
    Bare(Vec<Reservation>),
    Page {
        #[serde(default)]
        content: Vec<Reservation>,
    },
}

/// Normalize either listing shape into one ordered sequence.
pub fn parse_reservations(body: &str) -> Result<Vec<Reservation>, serde_json::Error> {
    let envelope: ReservationEnvelope = serde_json::from_str(body)?;
    Ok(match envelope {
        ReservationEnvelope::Bare(items) => items,
        ReservationEnvelope::Page { content } => content,
    })
}

pub fn parse_slots(body: &str) -> Result<Vec<TimeSlot>, serde_json::Error> {
    serde_json::from_str(body)
}

/// Body of a successful login.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_and_paged_listings_normalize_equally() {
        let bare = parse_reservations(r#"[{"id":1,"estado":"CONFIRMADA"}]"#).unwrap();
        let paged =
            parse_reservations(r#"{"content":[{"id":1,"estado":"CONFIRMADA"}],"totalPages":1}"#)
                .unwrap();

        assert_eq!(bare, paged);
        assert_eq!(bare.len(), 1);
        assert_eq!(bare[0].id, 1);
        assert_eq!(bare[0].estado, ReservationState::Confirmada);
    }

    #[test]
    fn page_without_content_is_empty() {
        assert!(parse_reservations(r#"{"totalElements":0}"#).unwrap().is_empty());
    }

    #[test]
    fn unknown_state_is_other() {
        let items = parse_reservations(r#"[{"id":3,"estado":"COMPLETADA"}]"#).unwrap();
        assert_eq!(items[0].estado, ReservationState::Other);
    }

    #[test]
    fn nested_refs_are_exposed() {
        let body = r#"[{
            "id": 9,
            "estado": "PENDIENTE",
            "fecha": "2025-10-01",
            "turno": {"id": 44, "horaInicio": "10:00"},
            "usuario": {"id": 2, "nombre": "Ana"}
        }]"#;
        let items = parse_reservations(body).unwrap();
        assert_eq!(items[0].turno_id(), Some(44));
        assert_eq!(items[0].user_id(), Some(2));
    }

    #[test]
    fn slots_parse_with_optional_fields() {
        let body = r#"[
            {"id": 5, "fecha": "2025-10-01", "horaInicio": "18:00", "estado": "DISPONIBLE"},
            {"id": 6}
        ]"#;
        let slots = parse_slots(body).unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].fecha, NaiveDate::from_ymd_opt(2025, 10, 1));
        assert_eq!(slots[1].hora_inicio, None);
    }

    #[test]
    fn malformed_slots_are_an_error() {
        assert!(parse_slots(r#"{"error":"boom"}"#).is_err());
    }
}
