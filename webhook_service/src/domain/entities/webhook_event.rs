use serde_json::Value as JsonValue;
use uuid::Uuid;

/// What the webhook receiver decided to do with an inbound notification
#[derive(Debug, PartialEq)]
pub enum WebhookAction {
    /// Provider verification handshake: echo the challenge back, nothing else
    Handshake(String),
    SourceCreated(Uuid),
    SourceDeleted(Uuid),
    /// Any other recognized data event attributable to a source:
    /// queued for asynchronous reconciliation
    RowChange(Uuid),
    /// No resolvable source id: acknowledged and dropped
    Unattributable,
}

/// Classifies a provider change-event envelope.
///
/// Structural events (`source.*`) carry the source as the event entity;
/// row-level events carry the row as the entity and the source as its parent.
/// Either field is accepted as a fallback for the other.
pub fn classify(body: &JsonValue) -> WebhookAction {
    if let Some(challenge) = body.get("challenge").and_then(JsonValue::as_str) {
        return WebhookAction::Handshake(challenge.to_string());
    }

    let event_type = body
        .get("event_type")
        .and_then(JsonValue::as_str)
        .unwrap_or_default();

    let entity_id = nested_uuid(body, &["entity", "id"]);
    let parent_id = nested_uuid(body, &["data", "parent", "id"]);

    match event_type {
        "source.created" => match entity_id.or(parent_id) {
            Some(source_id) => WebhookAction::SourceCreated(source_id),
            None => WebhookAction::Unattributable,
        },
        "source.deleted" => match entity_id.or(parent_id) {
            Some(source_id) => WebhookAction::SourceDeleted(source_id),
            None => WebhookAction::Unattributable,
        },
        _ => match parent_id.or(entity_id) {
            Some(source_id) => WebhookAction::RowChange(source_id),
            None => WebhookAction::Unattributable,
        },
    }
}

fn nested_uuid(body: &JsonValue, path: &[&str]) -> Option<Uuid> {
    let mut value = body;
    for key in path {
        value = value.get(key)?;
    }
    value.as_str().and_then(|s| Uuid::parse_str(s).ok())
}
