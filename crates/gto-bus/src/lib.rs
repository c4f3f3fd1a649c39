//! Typed publish/consume over named work queues.
//!
//! Every message is a self-describing [`Envelope`]; delivery is
//! at-least-once with manual acknowledgement, so consumers downstream must
//! be idempotent. The production adapter rides Redis lists; an in-memory
//! adapter backs the test suites. A small byte-cache seam lives here too,
//! since this is the crate that owns the broker/cache connections.

mod bus;
mod cache;
mod envelope;
mod error;
mod memory;
mod redis_bus;

pub use bus::*;
pub use cache::*;
pub use envelope::*;
pub use error::*;
pub use memory::*;
pub use redis_bus::*;
