//! Decoded dispatch events handed to the consumer

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::ProtocolError;
use crate::events::GatewayEventType;
use crate::protocol::{GatewayPayload, OpCode};

/// A named, sequenced server event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchEvent {
    /// Event name from the `t` field
    pub name: String,
    /// Sequence number from the `s` field, if any
    pub sequence: Option<u64>,
    /// Opaque event body
    pub data: Value,
    /// When the client decoded the event
    pub received_at: DateTime<Utc>,
}

impl DispatchEvent {
    /// Build from a dispatch envelope. Events without a name are labelled `UNKNOWN`.
    pub fn from_payload(payload: GatewayPayload) -> Result<Self, ProtocolError> {
        if payload.op != OpCode::Dispatch {
            return Err(ProtocolError::UnexpectedOpCode {
                expected: OpCode::Dispatch,
                actual: payload.op,
            });
        }

        Ok(Self {
            name: payload.t.unwrap_or_else(|| "UNKNOWN".to_string()),
            sequence: payload.s,
            data: payload.d,
            received_at: Utc::now(),
        })
    }

    /// The well-known kind of this event, if it has one
    #[must_use]
    pub fn kind(&self) -> Option<GatewayEventType> {
        GatewayEventType::from_name(&self.name)
    }

    /// Whether this is the session-establishing READY event
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.kind() == Some(GatewayEventType::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_dispatch_payload() {
        let payload = GatewayPayload::dispatch("MESSAGE_CREATE", 5, json!({"content": "hi"}));
        let event = DispatchEvent::from_payload(payload).unwrap();

        assert_eq!(event.name, "MESSAGE_CREATE");
        assert_eq!(event.sequence, Some(5));
        assert_eq!(event.data["content"], "hi");
        assert_eq!(event.kind(), Some(GatewayEventType::MessageCreate));
        assert!(!event.is_ready());
    }

    #[test]
    fn test_unknown_names_pass_through() {
        let payload = GatewayPayload::dispatch("SOMETHING_NEW", 9, json!({}));
        let event = DispatchEvent::from_payload(payload).unwrap();
        assert_eq!(event.name, "SOMETHING_NEW");
        assert_eq!(event.kind(), None);
    }

    #[test]
    fn test_rejects_non_dispatch() {
        let result = DispatchEvent::from_payload(GatewayPayload::heartbeat_ack());
        assert!(matches!(
            result,
            Err(ProtocolError::UnexpectedOpCode { actual: OpCode::HeartbeatAck, .. })
        ));
    }
}
