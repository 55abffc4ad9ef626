//! On-disk layout of partition log files.
//!
//! Each partition is one append-only file: a fixed header followed by
//! length-prefixed records. All numbers are little-endian.
//!
//! ```text
//! header:  magic [4] | version u16 | flags u16 | partition id u64 | crc32 u32 | reserved [4]
//! record:  key len u32 | value len u32 | key bytes | value bytes | crc32 u32
//! ```
//!
//! The record checksum covers the key bytes followed by the value bytes.

use std::io::{self, Read, Write};

use crate::{Result, RestripeError};

pub(super) const LOG_MAGIC: &[u8; 4] = b"RSPL";
pub(super) const LOG_VERSION: u16 = 1;
pub(super) const LOG_HEADER_SIZE: usize = 24;

/// Largest key or value length accepted when decoding. A length above this
/// is treated as corruption.
pub(super) const MAX_COMPONENT_LEN: u32 = 64 * 1024 * 1024;

/// Fixed header at offset zero of every partition log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct LogHeader {
    pub version: u16,
    pub flags: u16,
    pub partition_id: u64,
}

impl LogHeader {
    pub fn new(partition_id: u64) -> Self {
        Self {
            version: LOG_VERSION,
            flags: 0,
            partition_id,
        }
    }

    pub fn to_bytes(&self) -> [u8; LOG_HEADER_SIZE] {
        let mut buf = [0u8; LOG_HEADER_SIZE];
        buf[0..4].copy_from_slice(LOG_MAGIC);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6..8].copy_from_slice(&self.flags.to_le_bytes());
        buf[8..16].copy_from_slice(&self.partition_id.to_le_bytes());
        let crc = crc32fast::hash(&buf[0..16]);
        buf[16..20].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; LOG_HEADER_SIZE]) -> Result<Self> {
        if &buf[0..4] != LOG_MAGIC {
            return Err(RestripeError::Corrupt("bad partition log magic".into()));
        }
        let stored_crc = u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]);
        let computed_crc = crc32fast::hash(&buf[0..16]);
        if stored_crc != computed_crc {
            return Err(RestripeError::Corrupt(format!(
                "header checksum mismatch: stored {:08x}, computed {:08x}",
                stored_crc, computed_crc
            )));
        }
        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version != LOG_VERSION {
            return Err(RestripeError::Corrupt(format!(
                "unsupported partition log version {}",
                version
            )));
        }
        let flags = u16::from_le_bytes([buf[6], buf[7]]);
        let mut id_bytes = [0u8; 8];
        id_bytes.copy_from_slice(&buf[8..16]);
        Ok(Self {
            version,
            flags,
            partition_id: u64::from_le_bytes(id_bytes),
        })
    }
}

/// Appends one record to `writer`. The caller owns flushing.
pub(super) fn write_record<W: Write>(writer: &mut W, key: &[u8], value: &[u8]) -> io::Result<()> {
    if key.len() > MAX_COMPONENT_LEN as usize || value.len() > MAX_COMPONENT_LEN as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "key or value exceeds the record size limit",
        ));
    }
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(key);
    hasher.update(value);
    let crc = hasher.finalize();

    writer.write_all(&(key.len() as u32).to_le_bytes())?;
    writer.write_all(&(value.len() as u32).to_le_bytes())?;
    writer.write_all(key)?;
    writer.write_all(value)?;
    writer.write_all(&crc.to_le_bytes())?;
    Ok(())
}

/// Reads the next record, `Ok(None)` at end of data.
///
/// A record cut short by a dying writer reads as end of data. A fully
/// present record whose checksum does not match its payload is corruption.
pub(super) fn read_record<R: Read>(reader: &mut R) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
    let mut len_buf = [0u8; 8];
    if !fill(reader, &mut len_buf)? {
        return Ok(None);
    }
    let key_len = u32::from_le_bytes([len_buf[0], len_buf[1], len_buf[2], len_buf[3]]);
    let value_len = u32::from_le_bytes([len_buf[4], len_buf[5], len_buf[6], len_buf[7]]);
    if key_len > MAX_COMPONENT_LEN || value_len > MAX_COMPONENT_LEN {
        return Err(RestripeError::Corrupt(format!(
            "record with implausible lengths: key {}, value {}",
            key_len, value_len
        )));
    }

    let mut key = vec![0u8; key_len as usize];
    if !fill(reader, &mut key)? {
        return Ok(None);
    }
    let mut value = vec![0u8; value_len as usize];
    if !fill(reader, &mut value)? {
        return Ok(None);
    }
    let mut crc_buf = [0u8; 4];
    if !fill(reader, &mut crc_buf)? {
        return Ok(None);
    }

    let stored_crc = u32::from_le_bytes(crc_buf);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&key);
    hasher.update(&value);
    if stored_crc != hasher.finalize() {
        return Err(RestripeError::Corrupt(
            "record checksum mismatch".to_string(),
        ));
    }
    Ok(Some((key, value)))
}

/// Fills `buf` from `reader`. `Ok(false)` when the stream ends first.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Ok(false),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(RestripeError::Io(e)),
        }
    }
    Ok(true)
}
