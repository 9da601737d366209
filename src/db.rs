use std::{fs, path::Path, str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Sqlite, SqlitePool, Transaction,
};
use tokio::sync::Mutex;

use crate::{
    models::{new_booking_code, Booking, NewBooking, NewTeacher, NewTimeSlot, Teacher, TimeSlot},
    store::{Store, StoreError, BOOKING_CODE_ATTEMPTS},
};

const TEACHER_COLUMNS: &str =
    "id, name, subject, email, grades, rating, review_count, avatar, is_available";
const SLOT_COLUMNS: &str =
    "id, teacher_id, day_of_week, date, start_time, end_time, is_booked, subject, is_overbooking";
const BOOKING_COLUMNS: &str = "id, booking_id, time_slot_id, teacher_id, student_name, \
     student_grade, parent_name, phone, email, comments, created_at";

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let Some(path) = sqlite_path(db_url) else {
        return Ok(());
    };
    if let Some(parent) = Path::new(path).parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn sqlite_path(db_url: &str) -> Option<&str> {
    let path = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return None;
    }
    Some(path.strip_prefix("file:").unwrap_or(path))
}

fn is_in_memory(db_url: &str) -> bool {
    db_url.contains(":memory:") || db_url.contains("mode=memory")
}

/// Every connection to an in-memory database is a separate database, so such
/// a pool keeps exactly one connection open for the life of the process.
fn pool_options(db_url: &str, max_connections: u32) -> SqlitePoolOptions {
    if is_in_memory(db_url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(max_connections)
    }
}

/// Durable store on SQLite.
///
/// Writers in this process are serialized through `writes`; the conditional
/// `UPDATE ... AND is_booked = 0` and the unique indexes keep the booking
/// invariants even if another process shares the file.
pub struct SqliteStore {
    pool: SqlitePool,
    writes: Mutex<()>,
}

impl SqliteStore {
    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        ensure_sqlite_dir(db_url).map_err(|err| StoreError::Database(sqlx::Error::Io(err)))?;

        let connect_options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = pool_options(db_url, max_connections)
            .connect_with(connect_options)
            .await?;

        run_migrations(&pool).await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            writes: Mutex::new(()),
        }
    }

    async fn slot_in(tx: &mut Transaction<'_, Sqlite>, id: i64) -> Result<Option<TimeSlot>, StoreError> {
        let slot = sqlx::query_as::<_, TimeSlot>(&format!(
            "SELECT {SLOT_COLUMNS} FROM time_slots WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(slot)
    }

    async fn unused_booking_code(tx: &mut Transaction<'_, Sqlite>) -> Result<String, StoreError> {
        for _ in 0..BOOKING_CODE_ATTEMPTS {
            let code = new_booking_code();
            let taken = sqlx::query_as::<_, (i64,)>("SELECT id FROM bookings WHERE booking_id = ?")
                .bind(&code)
                .fetch_optional(&mut **tx)
                .await?;
            if taken.is_none() {
                return Ok(code);
            }
        }
        Err(StoreError::BookingCodesExhausted)
    }

    async fn insert_booking(
        tx: &mut Transaction<'_, Sqlite>,
        code: &str,
        teacher_id: i64,
        booking: &NewBooking,
    ) -> Result<i64, sqlx::Error> {
        let done = sqlx::query(
            r#"INSERT INTO bookings
               (booking_id, time_slot_id, teacher_id, student_name, student_grade, parent_name,
                phone, email, comments, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(code)
        .bind(booking.time_slot_id)
        .bind(teacher_id)
        .bind(&booking.student_name)
        .bind(&booking.student_grade)
        .bind(&booking.parent_name)
        .bind(&booking.phone)
        .bind(&booking.email)
        .bind(&booking.comments)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;
        Ok(done.last_insert_rowid())
    }
}

fn unique_violation_on(err: &sqlx::Error, column: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation() && db.message().contains(column),
        _ => false,
    }
}

/// Another writer stored the same `BR-` code between our check and insert.
fn is_code_collision(err: &sqlx::Error) -> bool {
    unique_violation_on(err, "bookings.booking_id")
}

fn unique_violation_as_conflict(err: sqlx::Error, slot_id: i64) -> StoreError {
    if unique_violation_on(&err, "bookings.time_slot_id") {
        StoreError::SlotAlreadyBooked(slot_id)
    } else {
        StoreError::Database(err)
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn list_teachers(&self) -> Result<Vec<Teacher>, StoreError> {
        let rows = sqlx::query_as::<_, Teacher>(&format!(
            "SELECT {TEACHER_COLUMNS} FROM teachers ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_teacher(&self, id: i64) -> Result<Teacher, StoreError> {
        sqlx::query_as::<_, Teacher>(&format!("SELECT {TEACHER_COLUMNS} FROM teachers WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::TeacherNotFound(id))
    }

    async fn teacher_count(&self) -> Result<usize, StoreError> {
        let (count,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM teachers")
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn insert_teacher(
        &self,
        teacher: NewTeacher,
        slots: Vec<NewTimeSlot>,
    ) -> Result<(Teacher, Vec<TimeSlot>), StoreError> {
        let _guard = self.writes.lock().await;
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query(
            r#"INSERT INTO teachers (name, subject, email, grades, rating, review_count, avatar, is_available)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&teacher.name)
        .bind(&teacher.subject)
        .bind(&teacher.email)
        .bind(&teacher.grades)
        .bind(&teacher.rating)
        .bind(teacher.review_count)
        .bind(&teacher.avatar)
        .bind(teacher.is_available)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
        let teacher = teacher.into_teacher(id);

        let mut created = Vec::with_capacity(slots.len());
        for slot in slots {
            let slot_id = sqlx::query(
                r#"INSERT INTO time_slots
                   (teacher_id, day_of_week, date, start_time, end_time, is_booked, subject, is_overbooking)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(teacher.id)
            .bind(slot.day_of_week)
            .bind(&slot.date)
            .bind(&slot.start_time)
            .bind(&slot.end_time)
            .bind(slot.is_booked)
            .bind(&teacher.subject)
            .bind(slot.is_overbooking)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();
            created.push(slot.into_slot(slot_id, &teacher));
        }

        tx.commit().await?;
        Ok((teacher, created))
    }

    async fn list_time_slots(&self) -> Result<Vec<TimeSlot>, StoreError> {
        let rows = sqlx::query_as::<_, TimeSlot>(&format!("SELECT {SLOT_COLUMNS} FROM time_slots ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn list_time_slots_by_teacher(&self, teacher_id: i64) -> Result<Vec<TimeSlot>, StoreError> {
        let rows = sqlx::query_as::<_, TimeSlot>(&format!(
            "SELECT {SLOT_COLUMNS} FROM time_slots WHERE teacher_id = ? ORDER BY id"
        ))
        .bind(teacher_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_time_slot(&self, id: i64) -> Result<TimeSlot, StoreError> {
        sqlx::query_as::<_, TimeSlot>(&format!("SELECT {SLOT_COLUMNS} FROM time_slots WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::SlotNotFound(id))
    }

    async fn reserve_slot(&self, id: i64) -> Result<TimeSlot, StoreError> {
        let _guard = self.writes.lock().await;
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE time_slots SET is_booked = 1 WHERE id = ? AND is_booked = 0")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let slot = Self::slot_in(&mut tx, id).await?.ok_or(StoreError::SlotNotFound(id))?;
        if updated == 0 {
            return Err(StoreError::SlotAlreadyBooked(id));
        }
        tx.commit().await?;
        Ok(slot)
    }

    async fn create_booking(&self, booking: NewBooking) -> Result<Booking, StoreError> {
        let _guard = self.writes.lock().await;
        let mut tx = self.pool.begin().await?;
        let slot_id = booking.time_slot_id;

        let slot = Self::slot_in(&mut tx, slot_id)
            .await?
            .ok_or(StoreError::SlotNotFound(slot_id))?;
        if slot.is_booked {
            return Err(StoreError::SlotAlreadyBooked(slot_id));
        }

        let updated = sqlx::query("UPDATE time_slots SET is_booked = 1 WHERE id = ? AND is_booked = 0")
            .bind(slot_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(StoreError::SlotAlreadyBooked(slot_id));
        }

        let mut inserted = None;
        for _ in 0..BOOKING_CODE_ATTEMPTS {
            let code = Self::unused_booking_code(&mut tx).await?;
            match Self::insert_booking(&mut tx, &code, slot.teacher_id, &booking).await {
                Ok(id) => {
                    inserted = Some(id);
                    break;
                }
                Err(err) if is_code_collision(&err) => {
                    log::warn!("Booking code {code} was taken concurrently, retrying");
                }
                Err(err) => return Err(unique_violation_as_conflict(err, slot_id)),
            }
        }
        let id = inserted.ok_or(StoreError::BookingCodesExhausted)?;

        let created = sqlx::query_as::<_, Booking>(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?"))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query_as::<_, Booking>(&format!("SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get_booking(&self, booking_id: &str) -> Result<Booking, StoreError> {
        sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE booking_id = ?"
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::BookingNotFound(booking_id.to_string()))
    }

    async fn get_booking_by_time_slot(&self, time_slot_id: i64) -> Result<Booking, StoreError> {
        sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE time_slot_id = ?"
        ))
        .bind(time_slot_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NoBookingForSlot(time_slot_id))
    }
}
