use gto_core::*;

/// Where a simulation is in its life, as narrated to the realtime surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Running,
    Stalled,
    Completed,
    Failed,
    Cancelled,
}

/// One tick of simulation progress, broadcast after every closed wave and
/// at every terminal transition.
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct ProgressEvent {
    pub simulation_id: ID<Sim>,
    pub iterations: Epoch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exploitability: Option<f64>,
    pub phase: Phase,
}
