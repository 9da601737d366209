use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;

use crate::{
    booking::{BookingError, FieldError},
    store::StoreError,
};

/// Error returned by HTTP handlers, rendered as `{"message": ..., "errors": [...]}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Booking(#[from] BookingError),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: String,
    #[serde(skip_serializing_if = "no_errors")]
    errors: &'a [FieldError],
}

fn no_errors(errors: &&[FieldError]) -> bool {
    errors.is_empty()
}

fn store_message(err: &StoreError) -> String {
    match err {
        StoreError::TeacherNotFound(_) => "Teacher not found".to_string(),
        StoreError::SlotNotFound(_) => "Time slot not found".to_string(),
        StoreError::BookingNotFound(_) | StoreError::NoBookingForSlot(_) => "Booking not found".to_string(),
        StoreError::SlotAlreadyBooked(_) => "Time slot is already booked".to_string(),
        StoreError::BookingCodesExhausted | StoreError::Database(_) | StoreError::Migrate(_) => {
            "Storage failure".to_string()
        }
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        err if err.is_not_found() => StatusCode::NOT_FOUND,
        StoreError::SlotAlreadyBooked(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    fn message(&self) -> String {
        match self {
            ApiError::BadRequest(message) => message.clone(),
            ApiError::Store(err) => store_message(err),
            ApiError::Booking(err) => match err {
                BookingError::Validation(_) => "Invalid booking data".to_string(),
                BookingError::SlotNotFound(_) => "Time slot not found".to_string(),
                BookingError::SlotAlreadyBooked(_) => "Time slot is already booked".to_string(),
                BookingError::TeacherSlotMismatch { .. } => {
                    "Time slot does not belong to the selected teacher".to_string()
                }
                BookingError::Store(err) => store_message(err),
            },
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(err) => store_status(err),
            ApiError::Booking(err) => match err {
                BookingError::Validation(_) | BookingError::TeacherSlotMismatch { .. } => StatusCode::BAD_REQUEST,
                BookingError::SlotNotFound(_) => StatusCode::NOT_FOUND,
                BookingError::SlotAlreadyBooked(_) => StatusCode::CONFLICT,
                BookingError::Store(err) => store_status(err),
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {self}");
        }

        let errors: &[FieldError] = match self {
            ApiError::Booking(BookingError::Validation(errors)) => errors,
            _ => &[],
        };
        HttpResponse::build(status).json(ErrorBody {
            message: self.message(),
            errors,
        })
    }
}
