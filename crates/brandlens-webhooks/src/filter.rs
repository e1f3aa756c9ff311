use brandlens_core::{EventFilters, IntegrationStatus, MentionEvent};
use brandlens_db::IntegrationRow;

use crate::payload::WebhookMention;

/// Whether `integration` should receive `event` for `mention`.
///
/// The integration must be active. Its stored filters may then restrict the
/// event types, require `mentioned = true`, or cap the list position; a
/// mention without a position passes the position cap.
#[must_use]
pub fn should_deliver(
    integration: &IntegrationRow,
    event: MentionEvent,
    mention: &WebhookMention,
) -> bool {
    if integration.status != IntegrationStatus::Active.as_str() {
        return false;
    }

    let filters = EventFilters::from_json(&integration.event_filters);

    if let Some(events) = filters.events.as_deref() {
        if !events.is_empty() && !events.iter().any(|e| e == event.as_str()) {
            return false;
        }
    }

    if filters.mentioned_only == Some(true) && !mention.mentioned {
        return false;
    }

    if let (Some(max), Some(position)) = (filters.min_position, mention.position) {
        if position > max {
            return false;
        }
    }

    true
}
