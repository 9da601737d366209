use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schedule::DayOfWeek;

pub const STANDARD_SLOT_MINUTES: u32 = 60;
pub const OVERBOOKING_SLOT_MINUTES: u32 = 45;

pub const BOOKING_CODE_PREFIX: &str = "BR-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: i64,
    pub name: String,
    pub subject: String,
    pub email: String,
    pub grades: String,
    pub rating: String,
    pub review_count: i64,
    pub avatar: String,
    pub is_available: bool,
}

impl Teacher {
    /// Grade labels from the comma-separated `grades` column, blanks dropped.
    pub fn grade_labels(&self) -> impl Iterator<Item = &str> {
        self.grades
            .split(',')
            .map(str::trim)
            .filter(|grade| !grade.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub id: i64,
    pub teacher_id: i64,
    pub day_of_week: DayOfWeek,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub is_booked: bool,
    pub subject: String,
    pub is_overbooking: bool,
}

impl TimeSlot {
    pub fn duration_minutes(&self) -> u32 {
        if self.is_overbooking {
            OVERBOOKING_SLOT_MINUTES
        } else {
            STANDARD_SLOT_MINUTES
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: i64,
    pub booking_id: String,
    pub time_slot_id: i64,
    pub teacher_id: i64,
    pub student_name: String,
    pub student_grade: String,
    pub parent_name: Option<String>,
    pub phone: String,
    pub email: String,
    pub comments: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Teacher record before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTeacher {
    pub name: String,
    pub subject: String,
    pub email: String,
    pub grades: String,
    pub rating: String,
    pub review_count: i64,
    pub avatar: String,
    pub is_available: bool,
}

impl NewTeacher {
    pub fn into_teacher(self, id: i64) -> Teacher {
        Teacher {
            id,
            name: self.name,
            subject: self.subject,
            email: self.email,
            grades: self.grades,
            rating: self.rating,
            review_count: self.review_count,
            avatar: self.avatar,
            is_available: self.is_available,
        }
    }
}

/// Slot record before it is attached to a teacher. The owning teacher's id
/// and subject are filled in by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTimeSlot {
    pub day_of_week: DayOfWeek,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub is_booked: bool,
    pub is_overbooking: bool,
}

impl NewTimeSlot {
    pub fn into_slot(self, id: i64, teacher: &Teacher) -> TimeSlot {
        TimeSlot {
            id,
            teacher_id: teacher.id,
            day_of_week: self.day_of_week,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            is_booked: self.is_booked,
            subject: teacher.subject.clone(),
            is_overbooking: self.is_overbooking,
        }
    }
}

/// Validated booking payload handed to the store. `teacher_id` is copied
/// from the slot by the store, not trusted from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub time_slot_id: i64,
    pub student_name: String,
    pub student_grade: String,
    pub parent_name: Option<String>,
    pub phone: String,
    pub email: String,
    pub comments: Option<String>,
}

/// `BR-` followed by five digits.
pub fn is_booking_code(value: &str) -> bool {
    value
        .strip_prefix(BOOKING_CODE_PREFIX)
        .is_some_and(|digits| digits.len() == 5 && digits.bytes().all(|b| b.is_ascii_digit()))
}

pub fn new_booking_code() -> String {
    use rand::Rng;
    let number: u32 = rand::thread_rng().gen_range(10_000..100_000);
    format!("{BOOKING_CODE_PREFIX}{number}")
}
