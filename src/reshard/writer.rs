//! Shared destination writer.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::family_name;
use crate::logging::RunLog;
use crate::store::{PartitionHandle, Store, StoreOptions, DEFAULT_PARTITION};
use crate::{Result, RestripeError};

/// Writes redistributed pairs into the destination store.
///
/// One instance serves every write worker for the whole run. The
/// destination is opened exactly once; each `family_<i>` partition is
/// resolved to a handle up front and [`FamilyWriter::put`] routes by
/// family index. The store serializes appends within a partition, so the
/// writer takes `&self` throughout.
#[derive(Debug)]
pub struct FamilyWriter {
    store: Store,
    families: Vec<PartitionHandle>,
    log: Arc<RunLog>,
    pairs_written: AtomicU64,
}

impl FamilyWriter {
    /// Opens `output` for writing and resolves all `family_count` handles.
    ///
    /// The destination must hold exactly the partitions provisioning
    /// created: `default` plus `family_0..family_<count-1>`.
    pub fn open(output: &Path, family_count: u32, log: Arc<RunLog>) -> Result<Self> {
        let store = Store::open(output, &StoreOptions::default())?;

        let names = store.partition_names();
        let expected = family_count as usize + 1;
        if names.len() != expected {
            return Err(RestripeError::StoreOpen(format!(
                "destination {} holds {} partitions, expected {}",
                output.display(),
                names.len(),
                expected
            )));
        }
        if store.partition(DEFAULT_PARTITION).is_none() {
            return Err(RestripeError::StoreOpen(format!(
                "destination {} is missing the {} partition",
                output.display(),
                DEFAULT_PARTITION
            )));
        }

        let mut families = Vec::with_capacity(family_count as usize);
        for index in 0..family_count {
            let name = family_name(index);
            let handle = store.partition(&name).ok_or_else(|| {
                RestripeError::StoreOpen(format!(
                    "destination {} is missing partition {}",
                    output.display(),
                    name
                ))
            })?;
            families.push(handle);
        }

        Ok(Self {
            store,
            families,
            log,
            pairs_written: AtomicU64::new(0),
        })
    }

    /// Appends one pair to family `index`.
    ///
    /// Logs the stored pair on success and the engine status on failure.
    pub fn put(&self, index: u32, key: &[u8], value: &[u8]) -> Result<()> {
        let handle = match self.families.get(index as usize) {
            Some(handle) => handle,
            None => {
                let err = RestripeError::Write(format!(
                    "family index {} out of range ({} families)",
                    index,
                    self.families.len()
                ));
                self.log.log(&err.to_string());
                return Err(err);
            }
        };

        match self.store.put(handle, key, value) {
            Ok(()) => {
                self.pairs_written.fetch_add(1, Ordering::Relaxed);
                self.log.log(&format!(
                    "stored pair [key: {}; value: {}] in {}",
                    String::from_utf8_lossy(key),
                    String::from_utf8_lossy(value),
                    handle.name()
                ));
                Ok(())
            }
            Err(e) => {
                self.log.log(&format!(
                    "write of key {} failed: {}",
                    String::from_utf8_lossy(key),
                    e
                ));
                Err(e)
            }
        }
    }

    /// Pairs successfully written so far.
    pub fn pairs_written(&self) -> u64 {
        self.pairs_written.load(Ordering::Relaxed)
    }

    /// Number of destination families.
    pub fn family_count(&self) -> u32 {
        self.families.len() as u32
    }

    /// Flushes and syncs the destination.
    pub fn close(&self) -> Result<()> {
        self.store.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn provision(path: &Path, families: u32) {
        let options = StoreOptions {
            create_if_missing: true,
            error_if_exists: true,
        };
        let store = Store::open(path, &options).unwrap();
        for index in 0..families {
            store.create_partition(&family_name(index)).unwrap();
        }
        store.close().unwrap();
    }

    fn run_log() -> Arc<RunLog> {
        Arc::new(RunLog::new("info"))
    }

    fn pairs_in(path: &Path, name: &str) -> Vec<(Vec<u8>, Vec<u8>)> {
        let store = Store::open_read_only(path).unwrap();
        let handle = store.partition(name).unwrap();
        let mut cursor = store.cursor(&handle).unwrap();
        cursor.seek_first();
        let mut pairs = Vec::new();
        while cursor.valid() {
            pairs.push((cursor.key().to_vec(), cursor.value().to_vec()));
            cursor.next();
        }
        cursor.status().unwrap();
        pairs
    }

    #[test]
    fn test_put_routes_by_family_index() {
        let dir = tempdir().unwrap();
        provision(dir.path(), 2);

        let writer = FamilyWriter::open(dir.path(), 2, run_log()).unwrap();
        assert_eq!(writer.family_count(), 2);
        writer.put(1, b"a", b"1").unwrap();
        writer.put(0, b"b", b"2").unwrap();
        writer.put(1, b"c", b"3").unwrap();
        writer.close().unwrap();
        assert_eq!(writer.pairs_written(), 3);
        drop(writer);

        assert_eq!(
            pairs_in(dir.path(), "family_0"),
            vec![(b"b".to_vec(), b"2".to_vec())]
        );
        assert_eq!(
            pairs_in(dir.path(), "family_1"),
            vec![(b"a".to_vec(), b"1".to_vec()), (b"c".to_vec(), b"3".to_vec())]
        );
        assert!(pairs_in(dir.path(), DEFAULT_PARTITION).is_empty());
    }

    #[test]
    fn test_open_rejects_wrong_partition_count() {
        let dir = tempdir().unwrap();
        provision(dir.path(), 3);

        let err = FamilyWriter::open(dir.path(), 2, run_log()).unwrap_err();
        assert!(matches!(err, RestripeError::StoreOpen(_)));
    }

    #[test]
    fn test_open_rejects_missing_family() {
        let dir = tempdir().unwrap();
        // Right partition count, wrong names.
        let options = StoreOptions {
            create_if_missing: true,
            error_if_exists: true,
        };
        let store = Store::open(dir.path(), &options).unwrap();
        store.create_partition("family_0").unwrap();
        store.create_partition("not_a_family").unwrap();
        store.close().unwrap();
        drop(store);

        let err = FamilyWriter::open(dir.path(), 2, run_log()).unwrap_err();
        assert!(matches!(err, RestripeError::StoreOpen(_)));
    }

    #[test]
    fn test_put_fails_when_family_log_is_missing() {
        let dir = tempdir().unwrap();
        provision(dir.path(), 2);
        // family_1 was created second, so its log carries id 2.
        std::fs::remove_file(dir.path().join("part_000002.log")).unwrap();

        let writer = FamilyWriter::open(dir.path(), 2, run_log()).unwrap();
        writer.put(0, b"a", b"1").unwrap();
        let err = writer.put(1, b"b", b"2").unwrap_err();
        assert!(matches!(err, RestripeError::Write(_)));
        assert_eq!(writer.pairs_written(), 1);
    }

    #[test]
    fn test_out_of_range_index_is_a_write_error() {
        let dir = tempdir().unwrap();
        provision(dir.path(), 2);

        let writer = FamilyWriter::open(dir.path(), 2, run_log()).unwrap();
        let err = writer.put(2, b"k", b"v").unwrap_err();
        assert!(matches!(err, RestripeError::Write(_)));
        assert_eq!(writer.pairs_written(), 0);
    }
}
