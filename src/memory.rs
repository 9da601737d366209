use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    models::{new_booking_code, Booking, NewBooking, NewTeacher, NewTimeSlot, Teacher, TimeSlot},
    store::{Store, StoreError, BOOKING_CODE_ATTEMPTS},
};

/// Arena of records plus an id → position index.
#[derive(Debug)]
struct Table<T> {
    rows: Vec<T>,
    index: HashMap<i64, usize>,
    next_id: i64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            index: HashMap::new(),
            next_id: 1,
        }
    }
}

impl<T: Clone> Table<T> {
    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn push(&mut self, id: i64, row: T) -> usize {
        let position = self.rows.len();
        self.rows.push(row);
        self.index.insert(id, position);
        self.next_id = self.next_id.max(id + 1);
        position
    }

    fn get(&self, id: i64) -> Option<&T> {
        let position = *self.index.get(&id)?;
        self.rows.get(position)
    }

    fn get_mut(&mut self, id: i64) -> Option<&mut T> {
        let position = *self.index.get(&id)?;
        self.rows.get_mut(position)
    }

    fn contains(&self, id: i64) -> bool {
        self.index.contains_key(&id)
    }

    fn all(&self) -> Vec<T> {
        self.rows.clone()
    }
}

#[derive(Debug, Default)]
struct Tables {
    teachers: Table<Teacher>,
    slots: Table<TimeSlot>,
    bookings: Table<Booking>,
    booking_by_slot: HashMap<i64, usize>,
    booking_by_code: HashMap<String, usize>,
}

impl Tables {
    fn unused_booking_code(&self) -> Result<String, StoreError> {
        for _ in 0..BOOKING_CODE_ATTEMPTS {
            let code = new_booking_code();
            if !self.booking_by_code.contains_key(&code) {
                return Ok(code);
            }
        }
        Err(StoreError::BookingCodesExhausted)
    }

    fn mark_booked(&mut self, id: i64) -> Result<TimeSlot, StoreError> {
        let slot = self.slots.get_mut(id).ok_or(StoreError::SlotNotFound(id))?;
        if slot.is_booked {
            return Err(StoreError::SlotAlreadyBooked(id));
        }
        slot.is_booked = true;
        Ok(slot.clone())
    }
}

/// In-process store. One lock guards all tables, so every mutation is a
/// critical section and readers never see a booking whose slot is still free.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from records with fixed ids. Later inserts continue
    /// after the highest id seen. Slots marked booked here have no booking.
    pub fn from_records(teachers: Vec<Teacher>, slots: Vec<TimeSlot>) -> Self {
        let mut tables = Tables::default();
        for teacher in teachers {
            tables.teachers.push(teacher.id, teacher);
        }
        for slot in slots {
            tables.slots.push(slot.id, slot);
        }
        Self {
            tables: RwLock::new(tables),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_teachers(&self) -> Result<Vec<Teacher>, StoreError> {
        Ok(self.tables.read().await.teachers.all())
    }

    async fn get_teacher(&self, id: i64) -> Result<Teacher, StoreError> {
        self.tables
            .read()
            .await
            .teachers
            .get(id)
            .cloned()
            .ok_or(StoreError::TeacherNotFound(id))
    }

    async fn teacher_count(&self) -> Result<usize, StoreError> {
        Ok(self.tables.read().await.teachers.rows.len())
    }

    async fn insert_teacher(
        &self,
        teacher: NewTeacher,
        slots: Vec<NewTimeSlot>,
    ) -> Result<(Teacher, Vec<TimeSlot>), StoreError> {
        let mut tables = self.tables.write().await;
        let id = tables.teachers.allocate_id();
        let teacher = teacher.into_teacher(id);
        tables.teachers.push(id, teacher.clone());

        let mut created = Vec::with_capacity(slots.len());
        for slot in slots {
            let slot_id = tables.slots.allocate_id();
            let slot = slot.into_slot(slot_id, &teacher);
            tables.slots.push(slot_id, slot.clone());
            created.push(slot);
        }
        Ok((teacher, created))
    }

    async fn list_time_slots(&self) -> Result<Vec<TimeSlot>, StoreError> {
        Ok(self.tables.read().await.slots.all())
    }

    async fn list_time_slots_by_teacher(&self, teacher_id: i64) -> Result<Vec<TimeSlot>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .slots
            .rows
            .iter()
            .filter(|slot| slot.teacher_id == teacher_id)
            .cloned()
            .collect())
    }

    async fn get_time_slot(&self, id: i64) -> Result<TimeSlot, StoreError> {
        self.tables
            .read()
            .await
            .slots
            .get(id)
            .cloned()
            .ok_or(StoreError::SlotNotFound(id))
    }

    async fn reserve_slot(&self, id: i64) -> Result<TimeSlot, StoreError> {
        self.tables.write().await.mark_booked(id)
    }

    async fn create_booking(&self, booking: NewBooking) -> Result<Booking, StoreError> {
        let mut tables = self.tables.write().await;
        let slot_id = booking.time_slot_id;
        let slot = tables
            .slots
            .get(slot_id)
            .ok_or(StoreError::SlotNotFound(slot_id))?;
        if slot.is_booked || tables.booking_by_slot.contains_key(&slot_id) {
            return Err(StoreError::SlotAlreadyBooked(slot_id));
        }
        let teacher_id = slot.teacher_id;
        let code = tables.unused_booking_code()?;

        let id = tables.bookings.allocate_id();
        let record = Booking {
            id,
            booking_id: code.clone(),
            time_slot_id: slot_id,
            teacher_id,
            student_name: booking.student_name,
            student_grade: booking.student_grade,
            parent_name: booking.parent_name,
            phone: booking.phone,
            email: booking.email,
            comments: booking.comments,
            created_at: Utc::now(),
        };

        // Nothing below can fail once the slot passed the checks above, so
        // the booking and the flag change land together.
        tables.mark_booked(slot_id)?;
        let position = tables.bookings.push(id, record.clone());
        tables.booking_by_slot.insert(slot_id, position);
        tables.booking_by_code.insert(code, position);
        Ok(record)
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError> {
        Ok(self.tables.read().await.bookings.all())
    }

    async fn get_booking(&self, booking_id: &str) -> Result<Booking, StoreError> {
        let tables = self.tables.read().await;
        tables
            .booking_by_code
            .get(booking_id)
            .map(|&position| tables.bookings.rows[position].clone())
            .ok_or_else(|| StoreError::BookingNotFound(booking_id.to_string()))
    }

    async fn get_booking_by_time_slot(&self, time_slot_id: i64) -> Result<Booking, StoreError> {
        let tables = self.tables.read().await;
        tables
            .booking_by_slot
            .get(&time_slot_id)
            .map(|&position| tables.bookings.rows[position].clone())
            .ok_or(StoreError::NoBookingForSlot(time_slot_id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::schedule::DayOfWeek;

    fn teacher(id: i64) -> Teacher {
        Teacher {
            id,
            name: format!("Учитель {id}"),
            subject: "Физика".into(),
            email: format!("t{id}@example.org"),
            grades: "7, 8, 9".into(),
            rating: "4.5/5".into(),
            review_count: 20,
            avatar: String::new(),
            is_available: true,
        }
    }

    fn slot(id: i64, teacher_id: i64, is_booked: bool) -> TimeSlot {
        TimeSlot {
            id,
            teacher_id,
            day_of_week: DayOfWeek::Tue,
            date: "2025-04-08".into(),
            start_time: "12:00".into(),
            end_time: "13:00".into(),
            is_booked,
            subject: "Физика".into(),
            is_overbooking: false,
        }
    }

    fn request(time_slot_id: i64) -> NewBooking {
        NewBooking {
            time_slot_id,
            student_name: "Сидоров Петр".into(),
            student_grade: "8".into(),
            parent_name: None,
            phone: "+79990001122".into(),
            email: "parent@example.org".into(),
            comments: None,
        }
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids_and_copies_subject() {
        let store = MemoryStore::new();
        let new_slot = NewTimeSlot {
            day_of_week: DayOfWeek::Mon,
            date: "2025-04-07".into(),
            start_time: "09:00".into(),
            end_time: "10:00".into(),
            is_booked: false,
            is_overbooking: false,
        };
        let first = teacher(0);
        let (created, slots) = store
            .insert_teacher(
                NewTeacher {
                    name: first.name,
                    subject: "Химия".into(),
                    email: first.email,
                    grades: first.grades,
                    rating: first.rating,
                    review_count: first.review_count,
                    avatar: first.avatar,
                    is_available: first.is_available,
                },
                vec![new_slot.clone(), new_slot],
            )
            .await
            .unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(slots.iter().map(|s| s.id).collect::<Vec<_>>(), [1, 2]);
        assert!(slots.iter().all(|s| s.teacher_id == 1 && s.subject == "Химия"));
        assert_eq!(store.teacher_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn lookups_report_missing_records() {
        let store = MemoryStore::from_records(vec![teacher(1)], vec![slot(5, 1, false)]);
        assert!(matches!(store.get_teacher(2).await, Err(StoreError::TeacherNotFound(2))));
        assert!(matches!(store.get_time_slot(6).await, Err(StoreError::SlotNotFound(6))));
        assert!(matches!(
            store.get_booking("BR-00000").await,
            Err(StoreError::BookingNotFound(_))
        ));
        assert!(store.list_time_slots_by_teacher(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reserve_slot_is_one_shot() {
        let store = MemoryStore::from_records(vec![teacher(1)], vec![slot(5, 1, false)]);
        assert!(store.reserve_slot(5).await.unwrap().is_booked);
        assert!(matches!(store.reserve_slot(5).await, Err(StoreError::SlotAlreadyBooked(5))));
        assert!(matches!(store.reserve_slot(9).await, Err(StoreError::SlotNotFound(9))));
    }

    #[tokio::test]
    async fn create_booking_reserves_and_indexes() {
        let store = MemoryStore::from_records(vec![teacher(1)], vec![slot(5, 1, false)]);
        let booking = store.create_booking(request(5)).await.unwrap();
        assert_eq!(booking.teacher_id, 1);
        assert!(store.get_time_slot(5).await.unwrap().is_booked);
        assert_eq!(store.get_booking(&booking.booking_id).await.unwrap(), booking);
        assert_eq!(store.get_booking_by_time_slot(5).await.unwrap(), booking);
        assert!(matches!(
            store.create_booking(request(5)).await,
            Err(StoreError::SlotAlreadyBooked(5))
        ));
        assert_eq!(store.list_bookings().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_booking_rejects_preseeded_and_missing_slots() {
        let store = MemoryStore::from_records(vec![teacher(1)], vec![slot(5, 1, true)]);
        assert!(matches!(
            store.create_booking(request(5)).await,
            Err(StoreError::SlotAlreadyBooked(5))
        ));
        assert!(matches!(
            store.create_booking(request(6)).await,
            Err(StoreError::SlotNotFound(6))
        ));
        assert!(store.list_bookings().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_bookings_have_one_winner() {
        let store = Arc::new(MemoryStore::from_records(vec![teacher(1)], vec![slot(5, 1, false)]));
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.create_booking(request(5)).await })
            })
            .collect();

        let mut won = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => won += 1,
                Err(StoreError::SlotAlreadyBooked(5)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(won, 1);
        assert_eq!(store.list_bookings().await.unwrap().len(), 1);
    }
}
