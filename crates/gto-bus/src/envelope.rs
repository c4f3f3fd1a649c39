use crate::BusError;

/// Version stamp on every message.
pub const ENVELOPE_SCHEMA: u32 = 1;

/// Message type tags used across the grid.
pub mod kind {
    /// A unit of CFR work, on a per-kind work queue.
    pub const TASK: &str = "task";
    /// A worker's report for one task attempt.
    pub const RESULT: &str = "result";
    /// Node registration announcement.
    pub const REGISTER: &str = "register";
    /// Node liveness and telemetry beacon.
    pub const HEARTBEAT: &str = "heartbeat";
    /// A node claiming a task it pulled, for attribution.
    pub const CLAIM: &str = "claim";
    /// Simulation cancellation notice fanned out to workers.
    pub const CANCEL: &str = "cancel";
}

/// The self-describing unit every queue carries.
///
/// Payloads are decoded exactly once, at the consuming boundary, via
/// [`parse`](Self::parse); everything in between moves opaque JSON. The
/// trace id follows the message through logs on both sides of the queue.
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Envelope {
    pub schema_version: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: serde_json::Value,
    pub trace_id: uuid::Uuid,
    pub enqueued_at: u64,
}

impl Envelope {
    pub fn new<T: serde::Serialize>(kind: &str, payload: &T) -> Self {
        Self {
            schema_version: ENVELOPE_SCHEMA,
            kind: kind.to_string(),
            payload: serde_json::to_value(payload).expect("domain types serialize"),
            trace_id: uuid::Uuid::now_v7(),
            enqueued_at: gto_core::now(),
        }
    }
    /// Decodes the payload, tagging failures with the trace id.
    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> Result<T, BusError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| BusError::Malformed {
            trace_id: self.trace_id,
            detail: format!("{} payload: {}", self.kind, e),
        })
    }
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("envelopes serialize")
    }
    pub fn from_json(json: &str) -> Result<Self, BusError> {
        serde_json::from_str(json).map_err(|e| BusError::Malformed {
            trace_id: uuid::Uuid::nil(),
            detail: format!("envelope: {}", e),
        })
    }
}
