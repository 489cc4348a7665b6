//! JSON wire format for [`Event`].

use crate::error::{DecodeError, EncodeError};
use crate::event::Event;

/// Serializes an event for publishing.
pub fn encode(event: &Event) -> Result<Vec<u8>, EncodeError> {
    Ok(serde_json::to_vec(event)?)
}

/// Parses an inbound message.
///
/// Every field except the history is required; a body that does not carry a
/// complete envelope is rejected instead of being filled with defaults.
pub fn decode(bytes: &[u8]) -> Result<Event, DecodeError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(DecodeError::Empty);
    }
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventSource, Money, Order, OrderLine, Product, SagaStatus};

    fn sample_event() -> Event {
        let mut order = Order::new(vec![
            OrderLine::new(Product::new("BOOKS", Money::from_cents(1099)), 2),
            OrderLine::new(Product::new("MOVIES", Money::from_dollars(5)), 1),
        ]);
        order.total_amount = order.computed_amount().unwrap();
        order.total_items = order.computed_items().unwrap();

        let mut event = Event::start(order);
        event.record(EventSource::Orchestrator, SagaStatus::Success, "Saga started!");
        event.record(
            EventSource::PaymentService,
            SagaStatus::RollbackPending,
            "Fail to realize the payment: declined",
        );
        event
    }

    #[test]
    fn test_roundtrip_is_lossless() {
        let event = sample_event();
        let bytes = encode(&event).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_empty_body_is_rejected() {
        assert!(matches!(decode(b""), Err(DecodeError::Empty)));
        assert!(matches!(decode(b"  \n"), Err(DecodeError::Empty)));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            decode(b"not json"),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_empty_object_does_not_become_default_event() {
        assert!(matches!(decode(b"{}"), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let mut json = serde_json::to_value(sample_event()).unwrap();
        json["status"] = serde_json::json!("MAYBE");
        let bytes = serde_json::to_vec(&json).unwrap();
        assert!(matches!(decode(&bytes), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_missing_history_decodes_as_empty() {
        let mut json = serde_json::to_value(sample_event()).unwrap();
        json.as_object_mut().unwrap().remove("eventHistory");
        let bytes = serde_json::to_vec(&json).unwrap();
        let event = decode(&bytes).unwrap();
        assert!(event.history().is_empty());
    }
}
