use actix_web::{http::header, web, HttpResponse};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::state::{AppState, ServerEvent};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/events").route(web::get().to(stream_events)));
}

async fn stream_events(state: web::Data<AppState>) -> HttpResponse {
    let rx = state.events.subscribe();
    // Lagged receivers skip the missed events instead of closing the stream.
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => Some(Ok::<web::Bytes, actix_web::Error>(event_to_bytes(&event))),
        Err(err) => {
            log::debug!("Event subscriber fell behind: {err}");
            None
        }
    });

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(stream)
}

fn event_to_bytes(event: &ServerEvent) -> web::Bytes {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    web::Bytes::from(format!("event: {}\ndata: {}\n\n", event.kind, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_is_framed_for_sse() {
        let event = ServerEvent {
            kind: "slot_booked".into(),
            time_slot_id: 10,
            teacher_id: 1,
            booking_id: "BR-12345".into(),
        };
        let bytes = event_to_bytes(&event);
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.starts_with("event: slot_booked\ndata: {"));
        assert!(text.contains("\"timeSlotId\":10"));
        assert!(text.ends_with("\n\n"));
    }
}
