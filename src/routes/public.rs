use actix_web::{web, HttpResponse};

use crate::{
    booking::{submit_booking, BookingRequest},
    error::ApiError,
    routes::parse_id,
    state::{AppState, ServerEvent},
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/api/teachers").route(web::get().to(list_teachers)))
        .service(web::resource("/api/teachers/{id}").route(web::get().to(get_teacher)))
        .service(web::resource("/api/teachers/{id}/timeslots").route(web::get().to(list_teacher_slots)))
        .service(web::resource("/api/timeslots").route(web::get().to(list_slots)))
        .service(web::resource("/api/timeslots/{id}").route(web::get().to(get_slot)))
        .service(
            web::resource("/api/bookings")
                .route(web::get().to(list_bookings))
                .route(web::post().to(create_booking)),
        )
        .service(web::resource("/api/bookings/{booking_id}").route(web::get().to(get_booking)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn list_teachers(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let teachers = state.store.list_teachers().await?;
    Ok(HttpResponse::Ok().json(teachers))
}

async fn get_teacher(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path, "teacher")?;
    let teacher = state.store.get_teacher(id).await?;
    Ok(HttpResponse::Ok().json(teacher))
}

async fn list_teacher_slots(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path, "teacher")?;
    let slots = state.store.list_time_slots_by_teacher(id).await?;
    Ok(HttpResponse::Ok().json(slots))
}

async fn list_slots(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let slots = state.store.list_time_slots().await?;
    Ok(HttpResponse::Ok().json(slots))
}

async fn get_slot(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path, "time slot")?;
    let slot = state.store.get_time_slot(id).await?;
    Ok(HttpResponse::Ok().json(slot))
}

async fn create_booking(
    state: web::Data<AppState>,
    form: web::Json<BookingRequest>,
) -> Result<HttpResponse, ApiError> {
    let booking = submit_booking(state.store.as_ref(), form.into_inner()).await?;
    state.publish(ServerEvent::slot_booked(&booking));
    Ok(HttpResponse::Created().json(booking))
}

async fn list_bookings(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let bookings = state.store.list_bookings().await?;
    Ok(HttpResponse::Ok().json(bookings))
}

async fn get_booking(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let booking = state.store.get_booking(path.trim()).await?;
    Ok(HttpResponse::Ok().json(booking))
}
