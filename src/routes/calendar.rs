use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::{
    error::ApiError,
    grid::{self, Filters, GradeBand},
    schedule,
    state::AppState,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/calendar").route(web::get().to(calendar)))
        .service(web::resource("/api/teachers/available").route(web::get().to(available_teachers)))
        .service(web::resource("/api/subjects").route(web::get().to(subjects)))
        .service(web::resource("/api/grades").route(web::get().to(grades)));
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarQuery {
    week: Option<String>,
    search: Option<String>,
    subject: Option<String>,
    grade_group: Option<GradeBand>,
    overbooking: Option<bool>,
}

impl CalendarQuery {
    fn filters(&self) -> Filters {
        let defaults = Filters::default();
        Filters {
            search_text: self.search.clone().unwrap_or_default(),
            subject: self.subject.clone(),
            grade_group: self.grade_group.unwrap_or(defaults.grade_group),
            overbooking_only: self.overbooking.unwrap_or(defaults.overbooking_only),
        }
    }
}

async fn calendar(
    state: web::Data<AppState>,
    query: web::Query<CalendarQuery>,
) -> Result<HttpResponse, ApiError> {
    let week = match query.week.as_deref().map(str::trim).filter(|w| !w.is_empty()) {
        Some(raw) => schedule::parse_date(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid week {raw:?}, expected YYYY-MM-DD")))?,
        None => state.default_week,
    };

    let teachers = state.store.list_teachers().await?;
    let slots = state.store.list_time_slots().await?;
    let grid = grid::project_week(week, &query.filters(), &teachers, &slots);

    if !grid.warnings.is_empty() {
        log::warn!(
            "Calendar for {} skipped {} malformed slot(s)",
            grid.week_start,
            grid.warnings.len()
        );
        for warning in &grid.warnings {
            log::debug!("Skipped {warning}");
        }
    }

    Ok(HttpResponse::Ok().json(grid))
}

async fn available_teachers(
    state: web::Data<AppState>,
    query: web::Query<CalendarQuery>,
) -> Result<HttpResponse, ApiError> {
    let teachers = state.store.list_teachers().await?;
    Ok(HttpResponse::Ok().json(grid::list_available_teachers(&query.filters(), &teachers)))
}

async fn subjects(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let teachers = state.store.list_teachers().await?;
    Ok(HttpResponse::Ok().json(grid::list_subjects(&teachers)))
}

async fn grades(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let teachers = state.store.list_teachers().await?;
    Ok(HttpResponse::Ok().json(grid::list_grades(&teachers)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_falls_back_to_default_filters() {
        let filters = CalendarQuery::default().filters();
        assert_eq!(filters, Filters::default());
    }

    #[test]
    fn query_overrides_filters() {
        let query = CalendarQuery {
            search: Some("Иван".into()),
            subject: Some("Физика".into()),
            grade_group: Some(GradeBand::Senior),
            overbooking: Some(false),
            ..CalendarQuery::default()
        };
        let filters = query.filters();
        assert_eq!(filters.search_text, "Иван");
        assert_eq!(filters.subject.as_deref(), Some("Физика"));
        assert_eq!(filters.grade_group, GradeBand::Senior);
        assert!(!filters.overbooking_only);
    }
}
