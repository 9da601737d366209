use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    error::ApiError,
    models::{Booking, Teacher, TimeSlot},
    schedule,
    state::AppState,
};

const UNKNOWN_TEACHER: &str = "Неизвестный преподаватель";
const UNKNOWN_TIME: &str = "Неизвестное время";

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api/admin").service(web::resource("/bookings").route(web::get().to(list_bookings))));
}

/// One row of the booking overview.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BookingSummary {
    booking_id: String,
    student_name: String,
    student_grade: String,
    phone: String,
    email: String,
    teacher_name: String,
    slot_label: String,
    lesson_minutes: Option<u32>,
    created_at: DateTime<Utc>,
}

impl BookingSummary {
    fn new(booking: Booking, teachers: &HashMap<i64, Teacher>, slots: &HashMap<i64, TimeSlot>) -> Self {
        let teacher_name = teachers
            .get(&booking.teacher_id)
            .map_or_else(|| UNKNOWN_TEACHER.to_string(), |teacher| teacher.name.clone());
        let slot = slots.get(&booking.time_slot_id);
        let slot_label = slot.map_or_else(
            || UNKNOWN_TIME.to_string(),
            |slot| schedule::format_slot_range(slot.day_of_week, &slot.date, &slot.start_time, &slot.end_time),
        );

        Self {
            booking_id: booking.booking_id,
            student_name: booking.student_name,
            student_grade: booking.student_grade,
            phone: booking.phone,
            email: booking.email,
            teacher_name,
            slot_label,
            lesson_minutes: slot.map(TimeSlot::duration_minutes),
            created_at: booking.created_at,
        }
    }
}

async fn list_bookings(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let teachers: HashMap<i64, Teacher> = state
        .store
        .list_teachers()
        .await?
        .into_iter()
        .map(|teacher| (teacher.id, teacher))
        .collect();
    let slots: HashMap<i64, TimeSlot> = state
        .store
        .list_time_slots()
        .await?
        .into_iter()
        .map(|slot| (slot.id, slot))
        .collect();

    let mut bookings = state.store.list_bookings().await?;
    bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let rows: Vec<BookingSummary> = bookings
        .into_iter()
        .map(|booking| BookingSummary::new(booking, &teachers, &slots))
        .collect();
    Ok(HttpResponse::Ok().json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::DayOfWeek;

    fn booking() -> Booking {
        Booking {
            id: 1,
            booking_id: "BR-12345".into(),
            time_slot_id: 10,
            teacher_id: 1,
            student_name: "Пётр Иванов".into(),
            student_grade: "7".into(),
            parent_name: None,
            phone: "+79991234567".into(),
            email: "parent@example.org".into(),
            comments: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn summary_falls_back_for_missing_records() {
        let summary = BookingSummary::new(booking(), &HashMap::new(), &HashMap::new());
        assert_eq!(summary.teacher_name, UNKNOWN_TEACHER);
        assert_eq!(summary.slot_label, UNKNOWN_TIME);
        assert_eq!(summary.lesson_minutes, None);
    }

    #[test]
    fn summary_labels_slot() {
        let slot = TimeSlot {
            id: 10,
            teacher_id: 1,
            day_of_week: DayOfWeek::Mon,
            date: "2025-04-07".into(),
            start_time: "10:00".into(),
            end_time: "11:00".into(),
            is_booked: true,
            subject: "Математика".into(),
            is_overbooking: false,
        };
        let slots = HashMap::from([(10, slot.clone())]);
        let summary = BookingSummary::new(booking(), &HashMap::new(), &slots);
        assert_eq!(
            summary.slot_label,
            schedule::format_slot_range(slot.day_of_week, &slot.date, &slot.start_time, &slot.end_time)
        );
        assert_eq!(summary.lesson_minutes, Some(60));
    }
}
