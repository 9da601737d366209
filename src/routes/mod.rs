use actix_web::web;

use crate::error::ApiError;

pub mod admin;
pub mod calendar;
pub mod events;
pub mod public;

/// Registers every route. `calendar` goes first so that
/// `/api/teachers/available` is matched before `/api/teachers/{id}`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(format!("Invalid request body: {err}")).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(format!("Invalid query: {err}")).into()),
    )
    .configure(calendar::configure)
    .configure(public::configure)
    .configure(admin::configure)
    .configure(events::configure);
}

pub(crate) fn parse_id(raw: &str, what: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {what} ID")))
}
