use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

use crate::TransferError;

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data` and returns the base64-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(data))
}

/// Computes SHA-256 of everything `reader` yields, base64-encoded.
pub fn checksum_reader(mut reader: impl Read) -> Result<String, TransferError> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(STANDARD.encode(hasher.finalize()))
}

/// Reads up to `len` bytes, stopping early only at EOF.
fn read_up_to(reader: impl Read, len: u64) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(usize::try_from(len).unwrap_or(usize::MAX).min(1 << 26));
    reader.take(len).read_to_end(&mut buf)?;
    Ok(buf)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// DataSource
// ---------------------------------------------------------------------------

/// Bytes to upload.
///
/// Random-access sources serve independent positioned reads, which is what
/// parallel transfers and resumes rely on. Every source also has a single
/// sequential cursor for serial transfers over streams.
pub trait DataSource: Send + Sync {
    /// Whether [`read_at`](Self::read_at) is supported.
    fn is_seekable(&self) -> bool;

    /// Total size in bytes, if known up front.
    fn size(&self) -> Option<u64>;

    /// Reads up to `len` bytes starting at `offset`, independent of the cursor.
    fn read_at(&self, offset: u64, len: u64) -> Result<Vec<u8>, TransferError>;

    /// Reads up to `len` bytes from the cursor and advances it. Returns fewer
    /// bytes only at the end of the source.
    fn read_next(&self, len: u64) -> Result<Vec<u8>, TransferError>;

    /// Advances the cursor by up to `len` bytes without returning them.
    fn skip(&self, len: u64) -> Result<u64, TransferError> {
        Ok(self.read_next(len)?.len() as u64)
    }

    /// Checksum of the entire content, as produced by [`checksum_bytes`].
    fn checksum(&self) -> Result<String, TransferError>;
}

// ---------------------------------------------------------------------------
// FileSource
// ---------------------------------------------------------------------------

/// A file on local disk.
///
/// Positioned reads open their own handle, so concurrent readers never share
/// a file offset.
pub struct FileSource {
    path: PathBuf,
    size: u64,
    cursor: Mutex<File>,
}

impl FileSource {
    /// Opens `path` for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path,
            size,
            cursor: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSource for FileSource {
    fn is_seekable(&self) -> bool {
        true
    }

    fn size(&self) -> Option<u64> {
        Some(self.size)
    }

    fn read_at(&self, offset: u64, len: u64) -> Result<Vec<u8>, TransferError> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(read_up_to(&mut file, len)?)
    }

    fn read_next(&self, len: u64) -> Result<Vec<u8>, TransferError> {
        let mut file = lock(&self.cursor);
        Ok(read_up_to(&mut *file, len)?)
    }

    fn skip(&self, len: u64) -> Result<u64, TransferError> {
        let mut file = lock(&self.cursor);
        let pos = file.stream_position()?;
        let n = len.min(self.size.saturating_sub(pos));
        file.seek(SeekFrom::Start(pos + n))?;
        Ok(n)
    }

    fn checksum(&self) -> Result<String, TransferError> {
        checksum_reader(File::open(&self.path)?)
    }
}

// ---------------------------------------------------------------------------
// MemorySource
// ---------------------------------------------------------------------------

/// An in-memory buffer.
pub struct MemorySource {
    data: Vec<u8>,
    cursor: Mutex<usize>,
}

impl MemorySource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            cursor: Mutex::new(0),
        }
    }

    fn slice(&self, offset: u64, len: u64) -> &[u8] {
        let total = self.data.len();
        let start = usize::try_from(offset).map_or(total, |o| o.min(total));
        let end = usize::try_from(len).map_or(total, |l| start.saturating_add(l).min(total));
        &self.data[start..end]
    }
}

impl DataSource for MemorySource {
    fn is_seekable(&self) -> bool {
        true
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn read_at(&self, offset: u64, len: u64) -> Result<Vec<u8>, TransferError> {
        Ok(self.slice(offset, len).to_vec())
    }

    fn read_next(&self, len: u64) -> Result<Vec<u8>, TransferError> {
        let mut cursor = lock(&self.cursor);
        let chunk = self.slice(*cursor as u64, len).to_vec();
        *cursor += chunk.len();
        Ok(chunk)
    }

    fn checksum(&self) -> Result<String, TransferError> {
        Ok(checksum_bytes(&self.data))
    }
}

// ---------------------------------------------------------------------------
// StreamSource
// ---------------------------------------------------------------------------

/// A forward-only reader such as a pipe or socket.
///
/// Only serial transfers of fresh uploads can use it: it cannot serve
/// positioned reads and cannot be checksummed without consuming it.
pub struct StreamSource<R> {
    reader: Mutex<R>,
}

impl<R: Read + Send> StreamSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Mutex::new(reader),
        }
    }
}

impl<R: Read + Send> DataSource for StreamSource<R> {
    fn is_seekable(&self) -> bool {
        false
    }

    fn size(&self) -> Option<u64> {
        None
    }

    fn read_at(&self, _offset: u64, _len: u64) -> Result<Vec<u8>, TransferError> {
        Err(TransferError::Unsupported("positioned read"))
    }

    fn read_next(&self, len: u64) -> Result<Vec<u8>, TransferError> {
        let mut reader = lock(&self.reader);
        Ok(read_up_to(&mut *reader, len)?)
    }

    fn checksum(&self) -> Result<String, TransferError> {
        Err(TransferError::Unsupported("whole-content checksum"))
    }
}
