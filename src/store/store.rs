//! Store engine: open, create partitions, append, iterate.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use parking_lot::{Mutex, RwLock};

use super::catalog::{Catalog, LOCK_FILE};
use super::cursor::Cursor;
use super::format::{self, LogHeader, LOG_HEADER_SIZE};
use super::options::StoreOptions;
use crate::{Result, RestripeError};

/// Size of each appender's write buffer.
const APPEND_BUF_SIZE: usize = 64 * 1024;

fn log_file_name(id: u64) -> String {
    format!("part_{:06}.log", id)
}

/// Cheap reference to one partition of one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionHandle {
    id: u64,
    name: String,
}

impl PartitionHandle {
    /// Partition name as registered in the catalog.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Serialized append stream for one partition.
#[derive(Debug)]
struct Appender {
    writer: Mutex<BufWriter<File>>,
}

impl Appender {
    fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::with_capacity(APPEND_BUF_SIZE, file)),
        })
    }

    fn append(&self, key: &[u8], value: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock();
        format::write_record(&mut *writer, key, value)
    }

    fn flush(&self) -> io::Result<()> {
        self.writer.lock().flush()
    }

    fn sync(&self) -> io::Result<()> {
        let mut writer = self.writer.lock();
        writer.flush()?;
        writer.get_ref().sync_all()
    }
}

/// A partitioned key-value store rooted at one directory.
///
/// Writable opens hold an exclusive file lock for the lifetime of the
/// value; read-only opens take no lock. All methods take `&self`. Appends
/// to the same partition are serialized; distinct partitions do not
/// contend.
#[derive(Debug)]
pub struct Store {
    root: PathBuf,
    read_only: bool,
    catalog: RwLock<Catalog>,
    appenders: RwLock<HashMap<u64, Arc<Appender>>>,
    _lock: Option<File>,
}

impl Store {
    /// Opens the store at `path` for writing, creating it when
    /// [`StoreOptions::create_if_missing`] is set.
    ///
    /// A freshly created store holds one empty `default` partition.
    pub fn open(path: impl AsRef<Path>, options: &StoreOptions) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let exists = Catalog::exists(&root);

        if exists && options.error_if_exists {
            return Err(RestripeError::StoreOpen(format!(
                "store already exists at {}",
                root.display()
            )));
        }
        if !exists && !options.create_if_missing {
            return Err(RestripeError::StoreOpen(format!(
                "no store at {}",
                root.display()
            )));
        }

        fs::create_dir_all(&root).map_err(|e| {
            RestripeError::StoreOpen(format!("cannot create {}: {}", root.display(), e))
        })?;
        let lock = Self::acquire_lock(&root)?;

        let catalog = if exists {
            Catalog::load(&root)?
        } else {
            let catalog = Catalog::new();
            Self::create_partition_log(&root, 0)
                .map_err(|e| RestripeError::StoreOpen(format!("cannot initialize store: {}", e)))?;
            catalog.save(&root)?;
            catalog
        };

        Ok(Self {
            root,
            read_only: false,
            catalog: RwLock::new(catalog),
            appenders: RwLock::new(HashMap::new()),
            _lock: Some(lock),
        })
    }

    /// Opens the store read-only. No lock is taken and writes are refused.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let catalog = Catalog::load(&root)?;
        Ok(Self {
            root,
            read_only: true,
            catalog: RwLock::new(catalog),
            appenders: RwLock::new(HashMap::new()),
            _lock: None,
        })
    }

    /// Lists partition names at `path` without keeping the store open.
    pub fn list_partitions(path: impl AsRef<Path>) -> Result<Vec<String>> {
        Ok(Catalog::load(path.as_ref())?.names())
    }

    /// Opens the store read-only together with handles for `names`, in order.
    pub fn open_with_partitions(
        path: impl AsRef<Path>,
        names: &[String],
    ) -> Result<(Self, Vec<PartitionHandle>)> {
        let store = Self::open_read_only(path)?;
        let mut handles = Vec::with_capacity(names.len());
        for name in names {
            let handle = store.partition(name).ok_or_else(|| {
                RestripeError::StoreOpen(format!("unknown partition: {}", name))
            })?;
            handles.push(handle);
        }
        Ok((store, handles))
    }

    /// Partition names in creation order.
    pub fn partition_names(&self) -> Vec<String> {
        self.catalog.read().names()
    }

    /// Handle for `name`, if registered.
    pub fn partition(&self, name: &str) -> Option<PartitionHandle> {
        self.catalog.read().get(name).map(|e| PartitionHandle {
            id: e.id,
            name: e.name.clone(),
        })
    }

    /// Store root directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Registers a new partition and provisions its empty log.
    pub fn create_partition(&self, name: &str) -> Result<PartitionHandle> {
        if self.read_only {
            return Err(RestripeError::PartitionCreate(
                "store is read-only".to_string(),
            ));
        }
        if name.is_empty() {
            return Err(RestripeError::PartitionCreate(
                "partition name must not be empty".to_string(),
            ));
        }
        let mut catalog = self.catalog.write();
        let entry = catalog.add(name)?;
        Self::create_partition_log(&self.root, entry.id)
            .map_err(|e| RestripeError::PartitionCreate(format!("{}: {}", name, e)))?;
        catalog.save(&self.root)?;
        Ok(PartitionHandle {
            id: entry.id,
            name: entry.name,
        })
    }

    /// Appends one pair to the partition behind `handle`.
    ///
    /// Durability follows [`Store::close`]; see [`Store::cursor`] for read
    /// visibility of buffered appends.
    pub fn put(&self, handle: &PartitionHandle, key: &[u8], value: &[u8]) -> Result<()> {
        if self.read_only {
            return Err(RestripeError::Write("store is read-only".to_string()));
        }
        let appender = self.appender(handle)?;
        appender
            .append(key, value)
            .map_err(|e| RestripeError::Write(format!("partition {}: {}", handle.name, e)))
    }

    /// Opens a read cursor over `handle`'s partition.
    ///
    /// The cursor owns its file handle and outlives this store. Appends
    /// still buffered for the partition are flushed first so the cursor
    /// sees them.
    pub fn cursor(&self, handle: &PartitionHandle) -> Result<Cursor> {
        if let Some(appender) = self.appenders.read().get(&handle.id) {
            appender
                .flush()
                .map_err(|e| RestripeError::Write(format!("partition {}: {}", handle.name, e)))?;
        }

        let path = self.root.join(log_file_name(handle.id));
        let mut file = File::open(&path).map_err(|e| {
            RestripeError::Corrupt(format!(
                "partition {} log missing or unreadable: {}",
                handle.name, e
            ))
        })?;

        let mut header_buf = [0u8; LOG_HEADER_SIZE];
        file.read_exact(&mut header_buf).map_err(|e| {
            RestripeError::Corrupt(format!("partition {}: short header: {}", handle.name, e))
        })?;
        let header = LogHeader::from_bytes(&header_buf).map_err(|e| match e {
            RestripeError::Corrupt(msg) => {
                RestripeError::Corrupt(format!("partition {}: {}", handle.name, msg))
            }
            other => other,
        })?;
        if header.partition_id != handle.id {
            return Err(RestripeError::Corrupt(format!(
                "partition {} log names id {}, catalog says {}",
                handle.name, header.partition_id, handle.id
            )));
        }

        Ok(Cursor::new(file, handle.name.clone()))
    }

    /// Flushes buffered appends to the operating system.
    pub fn flush(&self) -> Result<()> {
        for appender in self.appenders.read().values() {
            appender.flush()?;
        }
        Ok(())
    }

    /// Flushes and syncs every partition this store has appended to. The
    /// store stays usable afterwards.
    pub fn close(&self) -> Result<()> {
        for appender in self.appenders.read().values() {
            appender.sync()?;
        }
        Ok(())
    }

    fn appender(&self, handle: &PartitionHandle) -> Result<Arc<Appender>> {
        if let Some(appender) = self.appenders.read().get(&handle.id) {
            return Ok(Arc::clone(appender));
        }

        let mut appenders = self.appenders.write();
        if let Some(appender) = appenders.get(&handle.id) {
            return Ok(Arc::clone(appender));
        }
        if self.catalog.read().get_by_id(handle.id).is_none() {
            return Err(RestripeError::Write(format!(
                "partition {} is not part of this store",
                handle.name
            )));
        }
        let appender = Appender::open(&self.root.join(log_file_name(handle.id)))
            .map_err(|e| RestripeError::Write(format!("partition {}: {}", handle.name, e)))?;
        let appender = Arc::new(appender);
        appenders.insert(handle.id, Arc::clone(&appender));
        Ok(appender)
    }

    fn acquire_lock(root: &Path) -> Result<File> {
        let path = root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .map_err(|e| {
                RestripeError::StoreOpen(format!("cannot open lock file {}: {}", path.display(), e))
            })?;
        file.try_lock_exclusive().map_err(|e| {
            RestripeError::StoreOpen(format!("cannot lock store at {}: {}", root.display(), e))
        })?;
        Ok(file)
    }

    fn create_partition_log(root: &Path, id: u64) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(root.join(log_file_name(id)))?;
        file.write_all(&LogHeader::new(id).to_bytes())?;
        file.sync_all()?;
        Ok(())
    }
}
