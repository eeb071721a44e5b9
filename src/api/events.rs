use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;

use super::extract::Staff;
use super::state::AppState;
use crate::services::event_hub::is_for_business;

pub fn event_routes() -> Router<AppState> {
    Router::new().route("/", get(subscribe))
}

/// Server-Sent Events feed of the caller's new bookings and appointments.
#[tracing::instrument(skip(state, staff), fields(business_id = %staff.business_id))]
async fn subscribe(
    State(state): State<AppState>,
    staff: Staff,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let business_id = staff.business_id;
    tracing::info!("event stream opened");

    let stream = BroadcastStream::new(state.events.subscribe()).filter_map(move |received| async move {
        match received {
            Ok(event) if is_for_business(&event, business_id) => {
                let event = Event::default().event(event.name()).json_data(&event).ok()?;
                Some(Ok(event))
            }
            Ok(_) => None,
            Err(lagged) => {
                tracing::warn!(%business_id, error = %lagged, "event stream lagged");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
