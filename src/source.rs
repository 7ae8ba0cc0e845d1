//! Random-access byte sources.
//!
//! Directories built while opening a dictionary keep absolute offsets into
//! the file; per-query block reads go back through [`ByteSource::read_at`]
//! so the file never has to be materialized in memory.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use log::trace;

use crate::types::error::{MdictError, Result};

/// Random-access view of an open dictionary file.
///
/// Implementations must tolerate concurrent callers; the reader shares one
/// source across lookups.
pub trait ByteSource: Send + Sync {
    /// Fills `buf` with the bytes at `offset`. Short data is an error.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Total length of the source in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads `len` bytes at `offset` into a fresh buffer.
    fn read_vec(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }
}

/// A [`ByteSource`] over an opened file, serializing access with a mutex.
pub struct FileSource {
    file: Mutex<File>,
    len: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            len,
        })
    }
}

impl ByteSource for FileSource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        trace!("file read: {} bytes at offset {}", buf.len(), offset);
        let mut file = self.file.lock().map_err(|_| MdictError::LockPoisoned)?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn len(&self) -> u64 {
        self.len
    }
}

/// In-memory source, used by the tests and for pre-loaded images.
impl ByteSource for Vec<u8> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = usize::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::UnexpectedEof, "offset beyond buffer"))?;
        let end = start
            .checked_add(buf.len())
            .filter(|&end| end <= self.as_slice().len())
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "read beyond buffer"))?;
        buf.copy_from_slice(&self[start..end]);
        Ok(())
    }

    fn len(&self) -> u64 {
        self.as_slice().len() as u64
    }
}
