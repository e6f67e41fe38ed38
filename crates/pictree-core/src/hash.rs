//! Content hashing for duplicate detection.
//!
//! [`HashEngine::full_hash`] streams a file through SHA-256 in
//! fixed-size chunks, so memory stays bounded regardless of file size.
//! [`HashEngine::quick_hash`] digests only the file size and the first
//! and last chunks — a cheap, collision-tolerant pre-filter that must
//! always be confirmed by a full hash.

use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{CoreError, CoreResult};

/// Default read chunk size: 64 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// The digest of one file's full content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashResult {
    pub path: PathBuf,
    /// Hex-encoded digest.
    pub digest: String,
    /// Digest algorithm identifier.
    pub algorithm: &'static str,
    /// File size in bytes at hash time.
    pub size: u64,
}

/// Streaming file hasher.
#[derive(Debug, Clone)]
pub struct HashEngine {
    chunk_size: usize,
}

impl Default for HashEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl HashEngine {
    /// Creates an engine reading `chunk_size` bytes per I/O call.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Returns the configured chunk size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Computes the SHA-256 digest of a file's entire content.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] — the path does not exist.
    /// - [`CoreError::NotAFile`] — the path is not a regular file.
    /// - [`CoreError::Io`] — a read failed mid-stream.
    pub fn full_hash(&self, path: &Path) -> CoreResult<HashResult> {
        let metadata = self.file_metadata(path)?;

        let mut file = std::fs::File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        Ok(HashResult {
            path: path.to_path_buf(),
            digest: format!("{:x}", hasher.finalize()),
            algorithm: "sha256",
            size: metadata.len(),
        })
    }

    /// Computes the quick pre-filter digest: file size plus the first
    /// chunk, plus the last chunk for files larger than twice the
    /// chunk size.
    ///
    /// Two files with equal quick hashes may still differ; only
    /// [`HashEngine::full_hash`] confirms identity.
    ///
    /// # Errors
    ///
    /// Same as [`HashEngine::full_hash`].
    pub fn quick_hash(&self, path: &Path) -> CoreResult<String> {
        let metadata = self.file_metadata(path)?;
        let file = std::fs::File::open(path)?;
        self.quick_hash_reader(file, metadata.len())
    }

    /// Short reads are legal for any `Read`, so both chunks are filled
    /// with a read loop; the hashed prefix length depends only on the
    /// file size and the chunk size.
    fn quick_hash_reader<R: Read + Seek>(&self, mut reader: R, size: u64) -> CoreResult<String> {
        let mut hasher = Sha256::new();
        hasher.update(size.to_le_bytes());

        let mut buf = vec![0u8; self.chunk_size];
        let n = read_fill(&mut reader, &mut buf)?;
        hasher.update(&buf[..n]);

        if size > 2 * self.chunk_size as u64 {
            reader.seek(SeekFrom::End(-(self.chunk_size as i64)))?;
            let n = read_fill(&mut reader, &mut buf)?;
            hasher.update(&buf[..n]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }

    fn file_metadata(&self, path: &Path) -> CoreResult<std::fs::Metadata> {
        let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CoreError::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => CoreError::PermissionDenied(path.to_path_buf()),
            _ => CoreError::Io(e),
        })?;
        if !metadata.is_file() {
            return Err(CoreError::NotAFile(path.to_path_buf()));
        }
        Ok(metadata)
    }
}

/// Reads until the buffer is full or the stream ends, returning the
/// number of bytes filled.
fn read_fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
