//! Restripe Core
//!
//! Rebalances a partitioned key-value store: every key/value pair in every
//! source partition is redistributed round-robin across a freshly created
//! destination store with a configurable number of `family_<i>` partitions.

pub mod logging;
pub mod reshard;
pub mod store;

// Re-export main types
pub use logging::RunLog;
pub use reshard::{run, RestripeConfig, RestripeReport};
pub use store::{Cursor, PartitionHandle, Store, StoreOptions, DEFAULT_PARTITION};

/// Redistribution error type
#[derive(Debug, thiserror::Error)]
pub enum RestripeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store open failed: {0}")]
    StoreOpen(String),

    #[error("Partition create failed: {0}")]
    PartitionCreate(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Corrupt store: {0}")]
    Corrupt(String),

    #[error("Worker panicked: {0}")]
    WorkerPanic(String),
}

pub type Result<T> = std::result::Result<T, RestripeError>;
