use std::sync::Arc;

use actix_web::{http::StatusCode, test, web, App};
use serde_json::{json, Value};

use tutor_booking::{
    memory::MemoryStore,
    models::{Teacher, TimeSlot},
    routes,
    schedule::{self, DayOfWeek},
    state::AppState,
    store::Store,
};

fn teacher(id: i64, name: &str, subject: &str) -> Teacher {
    Teacher {
        id,
        name: name.into(),
        subject: subject.into(),
        email: format!("teacher{id}@tutors.example"),
        grades: "5,6,7,8,9".into(),
        rating: "4.8".into(),
        review_count: 12,
        avatar: String::new(),
        is_available: true,
    }
}

fn slot(id: i64, teacher_id: i64, date: &str, start: &str, end: &str) -> TimeSlot {
    TimeSlot {
        id,
        teacher_id,
        day_of_week: DayOfWeek::of(schedule::parse_date(date).unwrap()),
        date: date.into(),
        start_time: start.into(),
        end_time: end.into(),
        is_booked: false,
        subject: "Математика".into(),
        is_overbooking: false,
    }
}

fn fixture() -> AppState {
    let store = MemoryStore::from_records(
        vec![teacher(1, "Анна Смирнова", "Математика"), teacher(2, "Олег Петров", "Физика")],
        vec![
            slot(10, 1, "2025-04-07", "10:00", "11:00"),
            slot(11, 1, "2025-04-14", "10:00", "11:00"),
            slot(20, 2, "2025-04-08", "9:00", "10:00"),
        ],
    );
    let store: Arc<dyn Store> = Arc::new(store);
    AppState::new(store, schedule::parse_date("2025-04-07").unwrap())
}

fn booking_body(slot_id: i64, teacher_id: i64) -> Value {
    json!({
        "timeSlotId": slot_id,
        "teacherId": teacher_id,
        "studentName": "Пётр Иванов",
        "studentGrade": "7",
        "phone": "+79991234567",
        "email": "parent@example.org",
        "agreeTerms": true
    })
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(routes::configure),
        )
        .await
    };
}

#[actix_web::test]
async fn booking_a_slot_once() {
    let state = fixture();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/bookings")
        .set_json(booking_body(10, 1))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let booking: Value = test::read_body_json(resp).await;
    let code = booking["bookingId"].as_str().unwrap();
    assert!(code.starts_with("BR-") && code.len() == 8, "{code}");
    assert_eq!(booking["timeSlotId"], 10);

    let req = test::TestRequest::get().uri("/api/timeslots/10").to_request();
    let slot: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(slot["isBooked"], true);

    let req = test::TestRequest::get()
        .uri(&format!("/api/bookings/{code}"))
        .to_request();
    let fetched: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(fetched["bookingId"], code);

    let req = test::TestRequest::post()
        .uri("/api/bookings")
        .set_json(booking_body(10, 1))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    assert_eq!(state.store.list_bookings().await.unwrap().len(), 1);
}

#[actix_web::test]
async fn invalid_booking_lists_field_errors() {
    let state = fixture();
    let app = app!(state);

    let mut body = booking_body(10, 1);
    body["studentName"] = json!("Ян");
    body["agreeTerms"] = json!(false);
    body.as_object_mut().unwrap().remove("email");

    let req = test::TestRequest::post().uri("/api/bookings").set_json(body).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let error: Value = test::read_body_json(resp).await;
    let fields: Vec<&str> = error["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"studentName"));
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"agreeTerms"));

    assert!(!state.store.get_time_slot(10).await.unwrap().is_booked);
}

#[actix_web::test]
async fn mistyped_fields_are_reported_per_field() {
    let state = fixture();
    let app = app!(state);

    let body = json!({
        "timeSlotId": "10",
        "teacherId": 1,
        "studentName": "Ив",
        "studentGrade": "7",
        "phone": "123",
        "email": "bad",
        "agreeTerms": "yes"
    });
    let req = test::TestRequest::post().uri("/api/bookings").set_json(body).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let error: Value = test::read_body_json(resp).await;
    let fields: Vec<&str> = error["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, ["timeSlotId", "studentName", "phone", "email", "agreeTerms"]);

    assert!(!state.store.get_time_slot(10).await.unwrap().is_booked);
}

#[actix_web::test]
async fn slot_of_another_teacher_is_rejected() {
    let state = fixture();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/bookings")
        .set_json(booking_body(20, 1))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(!state.store.get_time_slot(20).await.unwrap().is_booked);
}

#[actix_web::test]
async fn ids_are_checked() {
    let state = fixture();
    let app = app!(state);

    let req = test::TestRequest::get().uri("/api/teachers/abc").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let error: Value = test::read_body_json(resp).await;
    assert_eq!(error["message"], "Invalid teacher ID");

    let req = test::TestRequest::get().uri("/api/teachers/99").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri("/api/timeslots/99").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/api/bookings")
        .set_json(booking_body(99, 1))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn available_teachers_is_not_a_teacher_id() {
    let state = fixture();
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/api/teachers/available?subject=%D0%A4%D0%B8%D0%B7%D0%B8%D0%BA%D0%B0")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let teachers: Value = test::read_body_json(resp).await;
    let ids: Vec<i64> = teachers
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![2]);
}

#[actix_web::test]
async fn calendar_shows_one_week() {
    let state = fixture();
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/api/calendar?week=2025-04-07&overbooking=false")
        .to_request();
    let grid: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(grid["weekStart"], "2025-04-07");
    assert_eq!(grid["nextWeek"], "2025-04-14");

    let monday = &grid["days"]["2025-04-07"]["10"];
    assert_eq!(monday["available"][0]["id"], 10);
    let tuesday = &grid["days"]["2025-04-08"]["9"];
    assert_eq!(tuesday["available"][0]["id"], 20);
    assert!(grid["days"].get("2025-04-14").is_none());

    let req = test::TestRequest::get()
        .uri("/api/calendar?week=2025-04-14&overbooking=false")
        .to_request();
    let grid: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(grid["days"]["2025-04-14"]["10"]["available"][0]["id"], 11);

    let req = test::TestRequest::get().uri("/api/calendar?week=07.04.2025").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn admin_overview_labels_bookings() {
    let state = fixture();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/bookings")
        .set_json(booking_body(10, 1))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::get().uri("/api/admin/bookings").to_request();
    let rows: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(rows[0]["teacherName"], "Анна Смирнова");
    assert_eq!(rows[0]["slotLabel"], "Понедельник, 7 апреля, 10:00 - 11:00");
}

#[actix_web::test]
async fn booking_is_broadcast() {
    let state = fixture();
    let mut events = state.events.subscribe();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/bookings")
        .set_json(booking_body(10, 1))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let event = events.try_recv().unwrap();
    assert_eq!(event.kind, "slot_booked");
    assert_eq!(event.time_slot_id, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookings_have_one_winner() {
    let state = fixture();

    let attempts: Vec<_> = (0..16)
        .map(|_| {
            let store = state.store.clone();
            tokio::spawn(async move {
                let request = serde_json::from_value(booking_body(10, 1)).unwrap();
                tutor_booking::booking::submit_booking(store.as_ref(), request).await
            })
        })
        .collect();

    let mut winners = 0;
    for attempt in attempts {
        if attempt.await.unwrap().is_ok() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(state.store.list_bookings().await.unwrap().len(), 1);
}
