use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};

use crate::{
    models::{Booking, NewBooking},
    store::{Store, StoreError},
};

pub const MIN_STUDENT_NAME_CHARS: usize = 3;
pub const MIN_PHONE_CHARS: usize = 10;

/// One form field as received. A value of the wrong JSON type is kept as
/// `Mistyped` so it can be reported next to the other field errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue<T> {
    Missing,
    Given(T),
    Mistyped,
}

impl<T> Default for FormValue<T> {
    fn default() -> Self {
        FormValue::Missing
    }
}

impl<T> FormValue<T> {
    pub fn is_mistyped(&self) -> bool {
        matches!(self, FormValue::Mistyped)
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            FormValue::Given(value) => Some(value),
            FormValue::Missing | FormValue::Mistyped => None,
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for FormValue<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        if raw.is_null() {
            return Ok(FormValue::Missing);
        }
        Ok(serde_json::from_value(raw).map_or(FormValue::Mistyped, FormValue::Given))
    }
}

/// Registration form as submitted by the client. Fields are loose so that
/// missing and mistyped values are reported alongside invalid ones.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingRequest {
    pub time_slot_id: FormValue<i64>,
    pub teacher_id: FormValue<i64>,
    pub student_name: FormValue<String>,
    pub student_grade: FormValue<String>,
    pub parent_name: FormValue<String>,
    pub phone: FormValue<String>,
    pub email: FormValue<String>,
    pub comments: FormValue<String>,
    pub agree_terms: FormValue<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("invalid booking data: {}", .0.iter().map(|e| e.field).collect::<Vec<_>>().join(", "))]
    Validation(Vec<FieldError>),
    #[error("time slot {0} not found")]
    SlotNotFound(i64),
    #[error("time slot {0} is already booked")]
    SlotAlreadyBooked(i64),
    #[error("time slot {slot_id} belongs to teacher {slot_teacher_id}, not {requested_teacher_id}")]
    TeacherSlotMismatch {
        slot_id: i64,
        slot_teacher_id: i64,
        requested_teacher_id: i64,
    },
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SlotNotFound(id) => BookingError::SlotNotFound(id),
            StoreError::SlotAlreadyBooked(id) => BookingError::SlotAlreadyBooked(id),
            other => BookingError::Store(other),
        }
    }
}

/// Request that passed field validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidBooking {
    pub teacher_id: i64,
    pub booking: NewBooking,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Loose syntactic check: one `@`, a non-empty local part and a dotted domain
/// without empty labels or whitespace.
pub fn is_valid_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return false;
    }
    domain.split('.').all(|label| {
        !label.is_empty() && !label.starts_with('-') && !label.ends_with('-')
    })
}

impl BookingRequest {
    /// Checks every field and reports all failures at once.
    pub fn validate(self) -> Result<ValidBooking, Vec<FieldError>> {
        let mut errors = Vec::new();
        let time_slot_id = self.time_slot_id.into_option();
        let teacher_id = self.teacher_id.into_option();

        if time_slot_id.is_none() {
            errors.push(FieldError {
                field: "timeSlotId",
                message: "Выберите время занятия",
            });
        }
        if teacher_id.is_none() {
            errors.push(FieldError {
                field: "teacherId",
                message: "Выберите преподавателя",
            });
        }

        let student_name = non_empty(self.student_name.into_option());
        if student_name
            .as_deref()
            .map_or(true, |name| name.chars().count() < MIN_STUDENT_NAME_CHARS)
        {
            errors.push(FieldError {
                field: "studentName",
                message: "ФИО ученика обязательно",
            });
        }

        let student_grade = non_empty(self.student_grade.into_option());
        if student_grade.is_none() {
            errors.push(FieldError {
                field: "studentGrade",
                message: "Выберите класс",
            });
        }

        let phone = non_empty(self.phone.into_option());
        if phone
            .as_deref()
            .map_or(true, |phone| phone.chars().count() < MIN_PHONE_CHARS)
        {
            errors.push(FieldError {
                field: "phone",
                message: "Введите корректный номер телефона",
            });
        }

        let email = non_empty(self.email.into_option());
        if !email.as_deref().is_some_and(is_valid_email) {
            errors.push(FieldError {
                field: "email",
                message: "Введите корректный email",
            });
        }

        if self.parent_name.is_mistyped() {
            errors.push(FieldError {
                field: "parentName",
                message: "Некорректное значение",
            });
        }
        if self.comments.is_mistyped() {
            errors.push(FieldError {
                field: "comments",
                message: "Некорректное значение",
            });
        }

        if self.agree_terms.into_option() != Some(true) {
            errors.push(FieldError {
                field: "agreeTerms",
                message: "Необходимо согласиться с условиями",
            });
        }

        match (time_slot_id, teacher_id, student_name, student_grade, phone, email) {
            (Some(time_slot_id), Some(teacher_id), Some(student_name), Some(student_grade), Some(phone), Some(email))
                if errors.is_empty() =>
            {
                Ok(ValidBooking {
                    teacher_id,
                    booking: NewBooking {
                        time_slot_id,
                        student_name,
                        student_grade,
                        parent_name: non_empty(self.parent_name.into_option()),
                        phone,
                        email,
                        comments: non_empty(self.comments.into_option()),
                    },
                })
            }
            _ => Err(errors),
        }
    }
}

/// Validates a registration form and commits it.
///
/// Checks run in order: fields, slot existence, slot availability, then the
/// teacher/slot pairing. The store re-checks availability inside its critical
/// section, so a request that loses a race still gets `SlotAlreadyBooked`.
pub async fn submit_booking(store: &dyn Store, request: BookingRequest) -> Result<Booking, BookingError> {
    let ValidBooking { teacher_id, booking } = request.validate().map_err(BookingError::Validation)?;
    let slot_id = booking.time_slot_id;

    let slot = store.get_time_slot(slot_id).await?;
    if slot.is_booked {
        return Err(BookingError::SlotAlreadyBooked(slot_id));
    }
    if slot.teacher_id != teacher_id {
        return Err(BookingError::TeacherSlotMismatch {
            slot_id,
            slot_teacher_id: slot.teacher_id,
            requested_teacher_id: teacher_id,
        });
    }

    let created = store.create_booking(booking).await?;
    log::info!(
        "Booked slot {} with teacher {} as {}",
        created.time_slot_id,
        created.teacher_id,
        created.booking_id
    );
    Ok(created)
}
