use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::{models::Booking, store::Store};

pub const EVENT_CAPACITY: usize = 128;

/// Shared handler context, built once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub events: broadcast::Sender<ServerEvent>,
    pub default_week: NaiveDate,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, default_week: NaiveDate) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            events,
            default_week,
        }
    }

    /// Publishes to connected calendars; having no listeners is fine.
    pub fn publish(&self, event: ServerEvent) {
        let _ = self.events.send(event);
    }
}

/// Calendar update pushed over `/api/events`. Carries no student data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerEvent {
    pub kind: String,
    pub time_slot_id: i64,
    pub teacher_id: i64,
    pub booking_id: String,
}

impl ServerEvent {
    pub fn slot_booked(booking: &Booking) -> Self {
        Self {
            kind: "slot_booked".to_string(),
            time_slot_id: booking.time_slot_id,
            teacher_id: booking.teacher_id,
            booking_id: booking.booking_id.clone(),
        }
    }
}
