//! Concurrent redistribution of a partitioned store.
//!
//! The pipeline reads every partition of a source store and fans the
//! pairs out over a fresh destination store holding one `family_<i>`
//! partition per destination family, plus the `default` partition every
//! store carries. Reading and writing run on separate bounded worker
//! pools of plain OS threads; assignment is a per-partition round-robin.

mod assign;
mod job;
mod pool;
mod writer;

pub use assign::RoundRobin;
pub use job::{run, run_with_log, RestripeConfig, RestripeReport};
pub use pool::{TaskSubmitter, WorkerPool};
pub use writer::FamilyWriter;

/// Name of the destination partition for family `index`.
pub fn family_name(index: u32) -> String {
    format!("family_{}", index)
}
