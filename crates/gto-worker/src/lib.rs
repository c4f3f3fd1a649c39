//! The compute-node agent: pull tasks, run the engine, report results.
//!
//! One agent process hosts a pool of `max_concurrent` executors. Each task
//! is pulled from its work queue, claimed for attribution, solved under a
//! walltime deadline on a blocking thread, and its result published back.
//! Only then is the task acknowledged, preserving at-least-once delivery
//! end to end. Heartbeats run on their own cadence regardless of load.

mod agent;

pub use agent::*;
