/// Bus adapter failures.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The broker connection is down and the operation could not be
    /// buffered. Transient: callers back off and retry.
    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),
    /// The disconnect outbox hit capacity; the publish was refused.
    #[error("publish outbox at capacity")]
    OutboxFull,
    /// An envelope or payload failed to decode.
    #[error("malformed message [{trace_id}]: {detail}")]
    Malformed {
        trace_id: uuid::Uuid,
        detail: String,
    },
    /// Acknowledgement referenced a delivery this adapter is not holding.
    #[error("unknown delivery tag on {queue}")]
    UnknownDelivery { queue: String },
}

impl BusError {
    /// True for conditions that clear up on their own.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::BrokerUnavailable(_) | Self::OutboxFull)
    }
}

impl From<redis::RedisError> for BusError {
    fn from(e: redis::RedisError) -> Self {
        Self::BrokerUnavailable(e.to_string())
    }
}
