use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::BookingEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Fan-out of booking notifications to connected staff sessions.
#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<BookingEvent>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publishes an event; having no subscribers is not an error.
    pub fn publish(&self, event: BookingEvent) {
        let business_id = event.business_id();
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(%business_id, event = name, receivers, "event published"),
            Err(_) => tracing::trace!(%business_id, event = name, "no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BookingEvent> {
        self.sender.subscribe()
    }
}

/// Whether `event` belongs to the business of a subscriber.
pub fn is_for_business(event: &BookingEvent, business_id: Uuid) -> bool {
    event.business_id() == business_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let hub = EventHub::new();
        let mut rx = hub.subscribe();
        let business_id = Uuid::new_v4();

        hub.publish(BookingEvent::BookingCreated {
            business_id,
            booking_id: Uuid::new_v4(),
            customer_name: "Ana".into(),
            appointment_time: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "booking_created");
        assert!(is_for_business(&event, business_id));
        assert!(!is_for_business(&event, Uuid::new_v4()));
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let hub = EventHub::new();
        hub.publish(BookingEvent::AppointmentCreated {
            business_id: Uuid::new_v4(),
            appointment_id: Uuid::new_v4(),
            appointment_time: Utc::now(),
        });
    }
}
