//! Core type aliases, identity types, and configuration for the solver grid.
//!
//! This crate provides the foundational types and tunable parameters shared
//! by every other crate in the workspace.

mod settings;

pub use settings::*;

// ============================================================================
// TYPE ALIASES
// ============================================================================
/// Chip quantities in fixed-point milli-chips (1 chip = 1000).
///
/// Integer chips keep game states hashable and the betting arithmetic exact
/// while the API boundary still accepts fractional blinds like 0.5.
pub type Chips = i64;
/// Seat index around the table.
pub type Position = usize;
/// CFR iteration counter; one epoch is one fully-closed wave of tasks.
pub type Epoch = u32;
/// Expected values, regrets, and payoffs.
pub type Utility = f64;
/// Strategy weights, sampling distributions, and reach probabilities.
pub type Probability = f64;

/// Fixed-point scale for [`Chips`].
pub const MILLI: Chips = 1_000;

/// Converts boundary-facing fractional chips into milli-chips.
pub fn chips(x: f64) -> Chips {
    (x * MILLI as f64).round() as Chips
}
/// Converts milli-chips back into fractional chips for display and DTOs.
pub fn unchips(x: Chips) -> f64 {
    x as f64 / MILLI as f64
}

// ============================================================================
// TRAITS
// ============================================================================
/// Random instance generation for testing and Monte Carlo sampling.
pub trait Arbitrary {
    /// Generate a uniformly random instance.
    fn random() -> Self;
}

// ============================================================================
// IDENTITY TYPES
// ============================================================================
use std::cmp::Ordering;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::hash::Hash;
use std::hash::Hasher;
use std::marker::PhantomData;

/// Generic ID wrapper providing compile-time type safety over uuid::Uuid.
///
/// `ID<Simulation>` and `ID<ComputeNode>` are distinct types even though both
/// are UUIDs on the wire; mixing them up is a compile error rather than a
/// 3 a.m. incident.
pub struct ID<T> {
    inner: uuid::Uuid,
    marker: PhantomData<T>,
}

impl<T> ID<T> {
    pub fn inner(&self) -> uuid::Uuid {
        self.inner
    }
    /// Parse from the canonical hyphenated form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        uuid::Uuid::parse_str(s).map(Self::from)
    }
}

impl<T> From<uuid::Uuid> for ID<T> {
    fn from(inner: uuid::Uuid) -> Self {
        Self {
            inner,
            marker: PhantomData,
        }
    }
}
impl<T> From<ID<T>> for uuid::Uuid {
    fn from(id: ID<T>) -> Self {
        id.inner()
    }
}

impl<T> Default for ID<T> {
    fn default() -> Self {
        Self::from(uuid::Uuid::now_v7())
    }
}

impl<T> Copy for ID<T> {}
impl<T> Clone for ID<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Eq for ID<T> {}
impl<T> PartialEq for ID<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T> Ord for ID<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.cmp(&other.inner)
    }
}
impl<T> PartialOrd for ID<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Hash for ID<T> {
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        self.inner.hash(state);
    }
}

impl<T> Debug for ID<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ID").field(&self.inner).finish()
    }
}
impl<T> Display for ID<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

impl<T> serde::Serialize for ID<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.inner.serialize(serializer)
    }
}
impl<'de, T> serde::Deserialize<'de> for ID<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        uuid::Uuid::deserialize(deserializer).map(Self::from)
    }
}

// ============================================================================
// IDENTITY MARKERS
// Records live with their owning component; the markers live here so lower
// crates can speak about identities without depending upward.
// ============================================================================
/// Identity marker for simulations (records owned by the orchestrator).
#[derive(Debug)]
pub enum Sim {}
/// Identity marker for compute nodes (records owned by the registry).
#[derive(Debug)]
pub enum Node {}

// ============================================================================
// ABSTRACTION PARAMETERS
// ============================================================================
/// Number of strategically-distinct preflop starting hands.
pub const PREFLOP_BUCKETS: u16 = 169;
/// Maximum raises per betting round (limits tree width).
pub const MAX_RAISE_REPEATS: usize = 3;
/// Default postflop equity bucket count (K).
pub const EQUITY_BUCKETS: u16 = 10;
/// Default Monte Carlo rollouts per equity estimate.
pub const EQUITY_SAMPLES: u32 = 200;

// ============================================================================
// ORCHESTRATION PARAMETERS
// ============================================================================
/// Maximum redeliveries of a failed or timed-out task before it is terminal.
pub const MAX_TASK_RETRIES: u32 = 3;
/// Seconds without a heartbeat before a compute node is considered offline.
pub const OFFLINE_AFTER_SECS: u64 = 60;
/// Default per-task compute deadline.
pub const TASK_DEADLINE_SECS: u64 = 120;
/// Slack past the deadline before the orchestrator declares a task lost.
pub const TASK_GRACE_SECS: u64 = 15;
/// Default exploitability recomputation cadence, in closed waves.
pub const EXPLOIT_CADENCE: Epoch = 50;
/// Default sampled hand pairs per exploitability estimate.
pub const EXPLOIT_SAMPLES: u32 = 256;
/// Default checkpoint cadence, in closed waves.
pub const CHECKPOINT_CADENCE: Epoch = 100;
/// Default tolerated per-wave task loss for sampled variants.
pub const LOSS_FRACTION: f64 = 0.1;
/// Number of locks the per-simulation node table is sharded across.
pub const TABLE_SHARDS: usize = 64;

// ============================================================================
// REGRET MATCHING
// ============================================================================
/// Minimum policy weight to prevent division by zero in normalization.
pub const POLICY_MIN: Probability = f64::MIN_POSITIVE;

// ============================================================================
// BUS ADAPTER
// ============================================================================
/// Capacity of the in-memory outbox buffering publishes across disconnects.
pub const OUTBOX_CAPACITY: usize = 1_024;
/// Initial reconnect backoff in milliseconds.
pub const BACKOFF_BASE_MS: u64 = 250;
/// Reconnect backoff ceiling in milliseconds.
pub const BACKOFF_CAP_MS: u64 = 30_000;
/// Seconds a consumed-but-unacked message may linger before redelivery.
pub const UNACKED_AFTER_SECS: u64 = 180;

// ============================================================================
// RUNTIME UTILITIES
// ============================================================================
/// Initialize dual logging (terminal + file) with timestamped log files.
/// Creates `logs/` directory and writes DEBUG level to file, INFO to terminal.
pub fn log() {
    std::fs::create_dir_all("logs").expect("create logs directory");
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let time = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time moves forward")
        .as_secs();
    let file = simplelog::WriteLogger::new(
        log::LevelFilter::Debug,
        config.clone(),
        std::fs::File::create(format!("logs/{}.log", time)).expect("create log file"),
    );
    let term = simplelog::TermLogger::new(
        log::LevelFilter::Info,
        config.clone(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    simplelog::CombinedLogger::init(vec![term, file]).expect("initialize logger");
}

/// Seconds since the UNIX epoch. The single wall-clock read used for
/// timestamps so records and envelopes agree on the format.
pub fn now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time moves forward")
        .as_secs()
}

/// Blocks the current task until Ctrl+C, for `main` functions that otherwise
/// just park while their service loops run.
pub async fn until_interrupted() {
    tokio::signal::ctrl_c().await.expect("install signal handler");
    log::warn!("interrupt received, shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chips_fixed_point_round_trip() {
        for x in [0.0, 0.5, 1.0, 2.5, 100.0] {
            assert_eq!(unchips(chips(x)), x);
        }
    }

    #[test]
    fn chips_rounds_to_nearest_milli() {
        assert_eq!(chips(0.0004), 0);
        assert_eq!(chips(0.0006), 1);
    }

    #[test]
    fn ids_are_distinct_and_ordered_by_time() {
        struct Marker;
        let a = ID::<Marker>::default();
        let b = ID::<Marker>::default();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn id_serde_is_transparent() {
        struct Marker;
        let id = ID::<Marker>::default();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }
}
