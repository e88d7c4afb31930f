//! Byte-level decoding of callback documents.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::envelope::EventEnvelope;
use crate::error::{DecodeError, DecodeResult, DocumentSide};
use crate::payload::{EventPayload, ProgressSnapshot};

/// A fully decoded callback invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    /// Event type and task metadata.
    pub envelope: EventEnvelope,
    /// Event-specific data.
    pub payload: EventPayload,
    /// Time the binding decoded the event.
    pub received_at: DateTime<Utc>,
}

impl DecodedEvent {
    /// Progress counters when the event is an `update`.
    #[must_use]
    pub const fn progress(&self) -> Option<&ProgressSnapshot> {
        self.payload.progress()
    }
}

/// Decode the envelope and payload documents of one callback invocation.
///
/// Empty (or whitespace-only) input and a JSON `null` decode as an empty object, since
/// the engine sends no payload for several event kinds.
///
/// # Errors
///
/// Returns [`DecodeError`] when either document is malformed, is not a JSON object, or
/// when a known envelope field has the wrong type.
pub fn decode(event: &[u8], payload: &[u8]) -> DecodeResult<DecodedEvent> {
    let envelope_fields = parse_object(event, DocumentSide::Envelope)?;
    let envelope: EventEnvelope = serde_json::from_value(Value::Object(envelope_fields))
        .map_err(|source| DecodeError::Envelope { source })?;
    let payload_fields = parse_object(payload, DocumentSide::Payload)?;
    let payload = EventPayload::from_fields(envelope.kind, payload_fields);
    Ok(DecodedEvent {
        envelope,
        payload,
        received_at: Utc::now(),
    })
}

fn parse_object(bytes: &[u8], side: DocumentSide) -> DecodeResult<Map<String, Value>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(DecodeError::NotAnObject {
            side,
            found: json_type(&other),
        }),
        Err(source) => Err(DecodeError::Malformed { side, source }),
    }
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EventKind;

    #[test]
    fn empty_inputs_decode_as_empty_objects() {
        let decoded = decode(b"", b"").expect("empty documents decode");
        assert_eq!(decoded.envelope, EventEnvelope::default());
        assert_eq!(decoded.envelope.kind, EventKind::Unknown);
        assert_eq!(decoded.payload, EventPayload::Unknown(Map::new()));
    }

    #[test]
    fn empty_payload_is_accepted_for_known_kinds() {
        let decoded = decode(br#"{"Type":"end"}"#, b"  ").expect("end without payload");
        assert_eq!(decoded.payload, EventPayload::Finished);

        let decoded = decode(br#"{"Type":"start"}"#, b"null").expect("null payload");
        assert_eq!(decoded.payload, EventPayload::Started);
    }

    #[test]
    fn update_event_reports_half_progress() {
        let decoded = decode(br#"{"Type":"update"}"#, br#"{"Downloaded":500,"Total":1000}"#)
            .expect("update decodes");
        let progress = decoded.progress().expect("progress payload");
        assert_eq!(progress.percent_complete(), Some(50.0));
    }

    #[test]
    fn malformed_json_is_reported_per_side() {
        let err = decode(b"{not json", b"{}").expect_err("malformed envelope");
        assert!(matches!(
            err,
            DecodeError::Malformed {
                side: DocumentSide::Envelope,
                ..
            }
        ));

        let err = decode(br#"{"Type":"msg"}"#, b"[1,2").expect_err("malformed payload");
        assert_eq!(err.side(), DocumentSide::Payload);
    }

    #[test]
    fn non_object_documents_are_rejected() {
        let err = decode(b"[]", b"{}").expect_err("array envelope");
        assert!(matches!(
            err,
            DecodeError::NotAnObject {
                side: DocumentSide::Envelope,
                found: "array"
            }
        ));
    }

    #[test]
    fn mistyped_envelope_fields_are_rejected() {
        let err = decode(br#"{"Type":"update","Index":"first"}"#, b"{}")
            .expect_err("string index");
        assert!(matches!(err, DecodeError::Envelope { .. }));
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let err = decode(&[0x7b, 0x22, 0xff, 0x22, 0x7d], b"{}").expect_err("bad utf8");
        assert!(matches!(err, DecodeError::Malformed { .. }));
    }
}
