use crate::Action;
use gto_cards::EvaluatorError;
use gto_core::Position;

/// Kernel failures. All variants are programmer- or data-visible conditions;
/// nothing here is transient.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KernelError {
    #[error("invalid game configuration: {0}")]
    InvalidConfig(String),
    #[error("action {0} is not legal in this state")]
    IllegalAction(Action),
    #[error("no player action is pending")]
    NoActionPending,
    #[error("no card reveal is pending")]
    NoRevealPending,
    #[error("card dealt twice")]
    CardCollision,
    #[error("state is not terminal")]
    NotTerminal,
    #[error("seat {0} reached showdown without hole cards")]
    MissingHand(Position),
    #[error("malformed information set key: {0}")]
    MalformedKey(String),
    #[error("delta arity {got} does not match node arity {expected}")]
    ArityMismatch { expected: usize, got: usize },
    #[error(transparent)]
    Evaluator(#[from] EvaluatorError),
}
