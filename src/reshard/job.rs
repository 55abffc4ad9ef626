//! Run orchestration.
//!
//! A run proceeds in three strictly ordered stages: enumerate the source
//! partitions, provision the destination store, then copy every pair
//! through the reader and writer pools. Any failure in any stage aborts
//! the whole run; nothing is retried and nothing is cleaned up.

use std::path::PathBuf;
use std::sync::Arc;

use super::pool::{TaskSubmitter, WorkerPool};
use super::writer::FamilyWriter;
use super::{family_name, RoundRobin};
use crate::logging::RunLog;
use crate::store::{Cursor, Store, StoreOptions};
use crate::{Result, RestripeError};

/// Depth of the write pool's task queue.
const WRITE_QUEUE_DEPTH: usize = 1024;

/// Everything one run needs to know.
#[derive(Debug, Clone)]
pub struct RestripeConfig {
    /// Source store to drain.
    pub input: PathBuf,
    /// Destination store directory. Must not already hold a store.
    pub output: PathBuf,
    /// Number of destination families; also the write worker count.
    pub family_count: u32,
    /// Severity every run message is classified under.
    pub log_level: String,
}

/// What a finished run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestripeReport {
    pub source_partitions: usize,
    pub family_count: u32,
    pub pairs_written: u64,
}

/// Runs a full redistribution described by `config`.
pub fn run(config: &RestripeConfig) -> Result<RestripeReport> {
    let log = Arc::new(RunLog::new(&config.log_level));
    run_with_log(config, log)
}

/// Runs a redistribution, classifying messages through a caller-built sink.
pub fn run_with_log(config: &RestripeConfig, log: Arc<RunLog>) -> Result<RestripeReport> {
    if config.family_count == 0 {
        return Err(fatal(
            &log,
            RestripeError::PartitionCreate("family count must be positive".to_string()),
        ));
    }

    log.log(&format!(
        "restriping {} into {} families at {}",
        config.input.display(),
        config.family_count,
        config.output.display()
    ));

    let names = enumerate_source(config, &log)?;
    provision_destination(config, &log)?;
    copy_pairs(config, names, log)
}

/// Stage one: list the source partitions.
fn enumerate_source(config: &RestripeConfig, log: &RunLog) -> Result<Vec<String>> {
    let names = Store::list_partitions(&config.input).map_err(|e| fatal(log, e))?;
    log.log(&format!("source has {} partition(s)", names.len()));
    Ok(names)
}

/// Stage two: create the destination store and its `family_<i>` partitions.
fn provision_destination(config: &RestripeConfig, log: &RunLog) -> Result<()> {
    let options = StoreOptions {
        create_if_missing: true,
        error_if_exists: true,
    };
    let store = Store::open(&config.output, &options).map_err(|e| fatal(log, e))?;
    for index in 0..config.family_count {
        store
            .create_partition(&family_name(index))
            .map_err(|e| fatal(log, e))?;
    }
    store.close().map_err(|e| fatal(log, e))?;
    Ok(())
}

/// Stage three: fan every source pair out to the destination families.
fn copy_pairs(
    config: &RestripeConfig,
    names: Vec<String>,
    log: Arc<RunLog>,
) -> Result<RestripeReport> {
    let (source, handles) =
        Store::open_with_partitions(&config.input, &names).map_err(|e| fatal(&log, e))?;
    let writer = Arc::new(
        FamilyWriter::open(&config.output, config.family_count, Arc::clone(&log))
            .map_err(|e| fatal(&log, e))?,
    );

    // One writer per family, one reader per source partition.
    let write_pool = WorkerPool::new("write", config.family_count as usize, WRITE_QUEUE_DEPTH)
        .map_err(|e| fatal(&log, e))?;
    let read_pool = WorkerPool::new("read", handles.len().max(1), handles.len().max(1))
        .map_err(|e| fatal(&log, e))?;
    let writes = write_pool.submitter();

    let mut spawn_error = None;
    for handle in &handles {
        let mut cursor = match source.cursor(handle) {
            Ok(cursor) => cursor,
            Err(e) => {
                spawn_error = Some(e);
                break;
            }
        };
        cursor.seek_first();
        let writer = Arc::clone(&writer);
        let writes = writes.clone();
        let family_count = config.family_count;
        read_pool.execute(move || drain_partition(cursor, family_count, writer, writes));
    }

    // Reader tasks own the cursors; the source handles can go now. The
    // job's own submitter must go too, or the write pool never drains.
    drop(writes);
    drop(source);

    let read_result = read_pool.join();
    let write_result = write_pool.join();

    if let Some(e) = spawn_error {
        return Err(fatal(&log, e));
    }
    read_result.map_err(|e| fatal(&log, e))?;
    write_result.map_err(|e| fatal(&log, e))?;
    writer.close().map_err(|e| fatal(&log, e))?;

    let report = RestripeReport {
        source_partitions: names.len(),
        family_count: config.family_count,
        pairs_written: writer.pairs_written(),
    };
    log.log(&format!(
        "restripe complete: {} pair(s) from {} partition(s) into {} families",
        report.pairs_written, report.source_partitions, report.family_count
    ));
    Ok(report)
}

/// Reader task: walk one partition, assign each pair, submit the writes.
///
/// The cursor arrives already positioned on the first record. Each source
/// partition gets its own assignor, so the assignment sequence restarts at
/// `1 % family_count` per partition.
fn drain_partition(
    mut cursor: Cursor,
    family_count: u32,
    writer: Arc<FamilyWriter>,
    writes: TaskSubmitter,
) -> Result<()> {
    let mut assignor = RoundRobin::new(family_count);
    while cursor.valid() {
        let key = cursor.key().to_vec();
        let value = cursor.value().to_vec();
        let index = assignor.next_index();
        let writer = Arc::clone(&writer);
        writes.submit(move || writer.put(index, &key, &value));
        cursor.next();
    }
    cursor.status()
}

/// Logs `err` through the run sink and hands it back for propagation.
fn fatal(log: &RunLog, err: RestripeError) -> RestripeError {
    log.log(&err.to_string());
    err
}
