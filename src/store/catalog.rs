//! Partition catalog.
//!
//! One `CATALOG` file per store records partition names in creation order
//! together with the numeric id that names each partition's log file.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, RestripeError};

/// Name of the partition every store carries from creation.
pub const DEFAULT_PARTITION: &str = "default";

pub(super) const CATALOG_FILE: &str = "CATALOG";
pub(super) const LOCK_FILE: &str = "LOCK";

/// One catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(super) struct PartitionEntry {
    pub id: u64,
    pub name: String,
}

/// Persistent name-to-id registry, ordered by creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct Catalog {
    next_id: u64,
    entries: Vec<PartitionEntry>,
}

impl Catalog {
    /// A catalog holding only the default partition.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            entries: vec![PartitionEntry {
                id: 0,
                name: DEFAULT_PARTITION.to_string(),
            }],
        }
    }

    /// Partition names in creation order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&PartitionEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn get_by_id(&self, id: u64) -> Option<&PartitionEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Registers a new partition and returns its entry.
    pub fn add(&mut self, name: &str) -> Result<PartitionEntry> {
        if self.get(name).is_some() {
            return Err(RestripeError::PartitionCreate(format!(
                "partition already exists: {}",
                name
            )));
        }
        let entry = PartitionEntry {
            id: self.next_id,
            name: name.to_string(),
        };
        self.next_id += 1;
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Loads the catalog stored under `root`.
    pub fn load(root: &Path) -> Result<Self> {
        let data = fs::read(root.join(CATALOG_FILE)).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                RestripeError::StoreOpen(format!("no store at {}", root.display()))
            } else {
                RestripeError::Io(e)
            }
        })?;
        bincode::deserialize(&data)
            .map_err(|e| RestripeError::Corrupt(format!("catalog unreadable: {}", e)))
    }

    /// Writes the catalog under `root`.
    pub fn save(&self, root: &Path) -> Result<()> {
        let data = bincode::serialize(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        fs::write(root.join(CATALOG_FILE), data)?;
        Ok(())
    }

    /// Whether `root` holds a store.
    pub fn exists(root: &Path) -> bool {
        root.join(CATALOG_FILE).is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_new_catalog_has_default_partition() {
        let catalog = Catalog::new();
        assert_eq!(catalog.names(), vec![DEFAULT_PARTITION.to_string()]);
        assert_eq!(catalog.get(DEFAULT_PARTITION).unwrap().id, 0);
    }

    #[test]
    fn test_add_assigns_increasing_ids() {
        let mut catalog = Catalog::new();
        let a = catalog.add("family_0").unwrap();
        let b = catalog.add("family_1").unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(
            catalog.names(),
            vec!["default".to_string(), "family_0".to_string(), "family_1".to_string()]
        );
    }

    #[test]
    fn test_add_rejects_duplicate_name() {
        let mut catalog = Catalog::new();
        catalog.add("family_0").unwrap();
        let err = catalog.add("family_0").unwrap_err();
        assert!(matches!(err, RestripeError::PartitionCreate(_)));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let mut catalog = Catalog::new();
        catalog.add("family_0").unwrap();
        catalog.add("family_1").unwrap();
        catalog.save(dir.path()).unwrap();

        let loaded = Catalog::load(dir.path()).unwrap();
        assert_eq!(loaded.names(), catalog.names());
        assert_eq!(loaded.get("family_1").unwrap().id, 2);
    }

    #[test]
    fn test_load_without_catalog_is_store_open_error() {
        let dir = tempdir().unwrap();
        let err = Catalog::load(dir.path()).unwrap_err();
        assert!(matches!(err, RestripeError::StoreOpen(_)));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CATALOG_FILE), b"\x01\x02\x03").unwrap();
        let err = Catalog::load(dir.path()).unwrap_err();
        assert!(matches!(err, RestripeError::Corrupt(_)));
    }
}
