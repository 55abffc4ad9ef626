//! Partitioned key-value store engine.
//!
//! A store is one directory: a `CATALOG` file naming partitions, a `LOCK`
//! file guarding writable opens, and one append-only log per partition.
//! The engine favors bulk sequential work. Appends buffer per partition
//! and cursors stream records back in append order.

mod catalog;
mod cursor;
mod format;
mod options;
mod store;

pub use catalog::DEFAULT_PARTITION;
pub use cursor::Cursor;
pub use options::StoreOptions;
pub use store::{PartitionHandle, Store};
