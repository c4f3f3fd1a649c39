use gto_bus::BusError;
use gto_cfr::CodecError;
use gto_cfr::EngineError;
use gto_core::*;
use gto_kernel::KernelError;
use gto_registry::RegistryError;

/// Orchestrator failures, grouped by consequence.
///
/// Validation errors surface to the caller without mutating anything;
/// transient infrastructure errors stall but never fail a simulation;
/// integrity errors fail the affected simulation and preserve the evidence
/// in its record.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("invalid simulation spec: {0}")]
    SpecInvalid(String),
    #[error("unknown simulation {0}")]
    NotFound(ID<Sim>),
    #[error("simulation {0} already started")]
    AlreadyStarted(ID<Sim>),
    #[error("simulation {0} has not completed")]
    NotCompleted(ID<Sim>),
    #[error(transparent)]
    Broker(#[from] BusError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("checkpoint integrity: {0}")]
    Checkpoint(#[from] CodecError),
    #[error("aggregation integrity: {0}")]
    Aggregation(KernelError),
    #[error("exploitability estimation: {0}")]
    Estimation(#[from] EngineError),
    #[error(transparent)]
    Kernel(#[from] KernelError),
    #[error("artifact store: {0}")]
    Artifacts(#[from] std::io::Error),
}

impl OrchestratorError {
    /// Transient conditions pause dispatch rather than failing simulations.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Broker(e) if e.is_transient())
    }
}
