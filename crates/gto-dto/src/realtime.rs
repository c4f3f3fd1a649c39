use serde::Deserialize;
use serde::Serialize;

/// A frame on the realtime channel.
///
/// `kind` serializes as `type` and takes one of: `simulation_update`,
/// `system_update`, `compute_node_update`, `subscription_confirmed`, `pong`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulation_id: Option<uuid::Uuid>,
    pub data: serde_json::Value,
}

impl RealtimeFrame {
    pub const SIMULATION_UPDATE: &'static str = "simulation_update";
    pub const SYSTEM_UPDATE: &'static str = "system_update";
    pub const COMPUTE_NODE_UPDATE: &'static str = "compute_node_update";
    pub const SUBSCRIPTION_CONFIRMED: &'static str = "subscription_confirmed";
    pub const PONG: &'static str = "pong";

    pub fn simulation(simulation_id: uuid::Uuid, data: serde_json::Value) -> Self {
        Self {
            kind: Self::SIMULATION_UPDATE.to_string(),
            simulation_id: Some(simulation_id),
            data,
        }
    }
    pub fn system(data: serde_json::Value) -> Self {
        Self {
            kind: Self::SYSTEM_UPDATE.to_string(),
            simulation_id: None,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_as_type() {
        let frame = RealtimeFrame::system(serde_json::json!({"connected": true}));
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "system_update");
        assert!(json.get("simulation_id").is_none());
    }
}
