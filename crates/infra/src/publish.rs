//! Publication of committed aggregate changes.
//!
//! Runs after the store accepted the write. Events are wrapped in
//! `EventEnvelope<JsonValue>` and handed to the bus one by one; a failure to
//! serialize or publish is logged and never undoes the commit.

use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use wardrobe_events::{Event, EventBus, EventEnvelope};

/// Publish `events` emitted by one aggregate whose version was `base_version`
/// before they were applied. Returns how many envelopes made it onto the bus.
pub fn publish_committed<B, E>(
    bus: &B,
    aggregate_type: &str,
    aggregate_id: Uuid,
    base_version: u64,
    events: &[E],
) -> usize
where
    B: EventBus<EventEnvelope<JsonValue>>,
    E: Event + Serialize,
{
    let mut published = 0;

    for (offset, event) in events.iter().enumerate() {
        let version = base_version + offset as u64 + 1;
        let envelope = match EventEnvelope::from_typed(aggregate_id, aggregate_type, version, event)
        {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(
                    aggregate_type,
                    %aggregate_id,
                    event_type = event.event_type(),
                    "event serialization failed: {e}"
                );
                continue;
            }
        };

        match bus.publish(envelope) {
            Ok(()) => published += 1,
            Err(e) => tracing::warn!(
                aggregate_type,
                %aggregate_id,
                event_type = event.event_type(),
                "event publication failed: {e:?}"
            ),
        }
    }

    published
}
