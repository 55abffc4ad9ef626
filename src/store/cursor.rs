//! Forward iteration over one partition's records.

use std::fs::File;
use std::io::{self, BufReader, Seek, SeekFrom};

use super::format::{self, LOG_HEADER_SIZE};
use crate::{Result, RestripeError};

/// Size of a cursor's read buffer.
const CURSOR_BUF_SIZE: usize = 64 * 1024;

/// Read cursor over one partition log.
///
/// A cursor owns its file handle, so it stays usable after the
/// [`Store`](super::Store) that produced it is dropped. Records come back
/// in append order. Once the cursor goes invalid, [`Cursor::status`] tells
/// clean exhaustion apart from a read failure.
#[derive(Debug)]
pub struct Cursor {
    reader: BufReader<File>,
    partition: String,
    key: Vec<u8>,
    value: Vec<u8>,
    valid: bool,
    status: Option<RestripeError>,
}

impl Cursor {
    /// A fresh cursor is not positioned; call [`Cursor::seek_first`].
    pub(super) fn new(file: File, partition: String) -> Self {
        Self {
            reader: BufReader::with_capacity(CURSOR_BUF_SIZE, file),
            partition,
            key: Vec::new(),
            value: Vec::new(),
            valid: false,
            status: None,
        }
    }

    /// Positions the cursor on the first record, if any.
    pub fn seek_first(&mut self) {
        self.status = None;
        if let Err(e) = self.reader.seek(SeekFrom::Start(LOG_HEADER_SIZE as u64)) {
            self.valid = false;
            self.key.clear();
            self.value.clear();
            self.status = Some(self.contextualize(RestripeError::Io(e)));
            return;
        }
        self.valid = true;
        self.advance();
    }

    /// Moves to the next record. Does nothing on an invalid cursor.
    pub fn next(&mut self) {
        if self.valid {
            self.advance();
        }
    }

    /// Whether the cursor currently points at a record.
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Key under the cursor. Empty when the cursor is invalid.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Value under the cursor. Empty when the cursor is invalid.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Partition this cursor reads.
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Consumes the cursor and reports how iteration ended.
    ///
    /// `Ok(())` means every record was visited. An error means iteration
    /// stopped early on a decode or read failure, and records past the
    /// failure point were never seen.
    pub fn status(self) -> Result<()> {
        match self.status {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn advance(&mut self) {
        match format::read_record(&mut self.reader) {
            Ok(Some((key, value))) => {
                self.key = key;
                self.value = value;
            }
            Ok(None) => {
                self.valid = false;
                self.key.clear();
                self.value.clear();
            }
            Err(e) => {
                self.valid = false;
                self.key.clear();
                self.value.clear();
                self.status = Some(self.contextualize(e));
            }
        }
    }

    /// Stamps the partition name onto an iteration error.
    fn contextualize(&self, err: RestripeError) -> RestripeError {
        match err {
            RestripeError::Corrupt(msg) => {
                RestripeError::Corrupt(format!("partition {}: {}", self.partition, msg))
            }
            RestripeError::Io(e) => RestripeError::Io(io::Error::new(
                e.kind(),
                format!("partition {}: {}", self.partition, e),
            )),
            other => other,
        }
    }
}
