//! Simulation orchestrator: lifecycle, dispatch, aggregation, convergence.
//!
//! One orchestrator process owns the simulation records and their strategy
//! tables. Each running simulation is a tokio task cycling through waves:
//! decompose the next iteration into tasks, publish them on the per-kind
//! work queue, fold the returning deltas into the sharded node table, and
//! close the wave, retrying or reissuing lost tasks along the way.
//! Progress fans out on a broadcast topic for the realtime surface.

mod artifacts;
mod error;
mod manager;
mod progress;
mod simulation;
mod spec;
mod table;
mod wave;

pub use artifacts::*;
pub use error::*;
pub use manager::*;
pub use progress::*;
pub use simulation::*;
pub use spec::*;
pub use table::*;
pub use wave::*;
