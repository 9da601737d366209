use async_trait::async_trait;

use crate::models::{Booking, NewBooking, NewTeacher, NewTimeSlot, Teacher, TimeSlot};

/// Attempts at drawing an unused `BR-NNNNN` code before giving up.
pub const BOOKING_CODE_ATTEMPTS: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("teacher {0} not found")]
    TeacherNotFound(i64),
    #[error("time slot {0} not found")]
    SlotNotFound(i64),
    #[error("booking {0} not found")]
    BookingNotFound(String),
    #[error("no booking for time slot {0}")]
    NoBookingForSlot(i64),
    #[error("time slot {0} is already booked")]
    SlotAlreadyBooked(i64),
    #[error("could not allocate an unused booking code")]
    BookingCodesExhausted,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::TeacherNotFound(_)
                | StoreError::SlotNotFound(_)
                | StoreError::BookingNotFound(_)
                | StoreError::NoBookingForSlot(_)
        )
    }
}

/// Single source of truth for teachers, slots and bookings.
///
/// `reserve_slot` and `create_booking` are the only operations that flip
/// `TimeSlot::is_booked`; implementations must run their check-then-set as
/// one critical section so that racing callers see exactly one winner.
#[async_trait]
pub trait Store: Send + Sync {
    /// Teachers in creation order.
    async fn list_teachers(&self) -> Result<Vec<Teacher>, StoreError>;
    async fn get_teacher(&self, id: i64) -> Result<Teacher, StoreError>;
    async fn teacher_count(&self) -> Result<usize, StoreError>;

    /// Stores a teacher together with its slots. Slots inherit the teacher's
    /// id and subject.
    async fn insert_teacher(
        &self,
        teacher: NewTeacher,
        slots: Vec<NewTimeSlot>,
    ) -> Result<(Teacher, Vec<TimeSlot>), StoreError>;

    async fn list_time_slots(&self) -> Result<Vec<TimeSlot>, StoreError>;
    async fn list_time_slots_by_teacher(&self, teacher_id: i64) -> Result<Vec<TimeSlot>, StoreError>;
    async fn get_time_slot(&self, id: i64) -> Result<TimeSlot, StoreError>;

    /// Marks an available slot as booked. A booked slot yields
    /// `SlotAlreadyBooked` and is left untouched.
    async fn reserve_slot(&self, id: i64) -> Result<TimeSlot, StoreError>;

    /// Persists a booking and reserves its slot atomically.
    async fn create_booking(&self, booking: NewBooking) -> Result<Booking, StoreError>;

    async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError>;
    async fn get_booking(&self, booking_id: &str) -> Result<Booking, StoreError>;
    async fn get_booking_by_time_slot(&self, time_slot_id: i64) -> Result<Booking, StoreError>;
}
