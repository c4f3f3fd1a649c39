use gto_cards::EvaluatorError;
use gto_kernel::KernelError;

/// Engine failures, mapped one-to-one onto the worker's failure contract.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The payload cannot be interpreted: undecodable state, out-of-range
    /// player, colliding cards.
    #[error("invalid task: {0}")]
    InvalidTask(String),
    /// The traversal ran past its walltime deadline. Partial deltas are
    /// discarded; the whole task fails.
    #[error("task exceeded its compute budget")]
    BudgetExceeded,
    /// The hand evaluator failed; surfaced upward unchanged.
    #[error(transparent)]
    Evaluator(#[from] EvaluatorError),
    /// Cumulative state disagrees with the abstraction (regret arity drift).
    #[error("integrity: {0}")]
    Integrity(KernelError),
    /// The simulation was cancelled while this task was in flight.
    #[error("task cancelled")]
    Cancelled,
}

impl From<KernelError> for EngineError {
    fn from(e: KernelError) -> Self {
        match e {
            KernelError::Evaluator(inner) => Self::Evaluator(inner),
            KernelError::ArityMismatch { .. } | KernelError::MalformedKey(_) => Self::Integrity(e),
            other => Self::InvalidTask(other.to_string()),
        }
    }
}
