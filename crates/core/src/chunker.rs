//! Local-file chunk arithmetic and hashing.
//!
//! Files are split into fixed-size chunks: chunk `i` covers bytes
//! `[i * chunk_size, (i + 1) * chunk_size)`, and the final chunk carries
//! exactly the remaining bytes rather than a zero-padded buffer.

use crate::hash::{ContentHash, FileHash};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Number of chunks needed to cover `len` bytes.
///
/// An empty file still occupies one (empty) chunk so that it can be
/// registered and round-tripped like any other file.
pub fn chunk_count_for_len(len: u64, chunk_size: i64) -> i64 {
    let chunk_size = chunk_size as u64;
    if len == 0 {
        return 1;
    }
    len.div_ceil(chunk_size) as i64
}

/// Hash information for a local file: everything the reconciliation
/// algorithm needs to compare it against a remote FileInfo.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileHashInfo {
    /// Number of chunks at the given chunk size.
    pub chunk_count: i64,
    /// Modification time, seconds since the unix epoch.
    pub last_mod: i64,
    /// Whole-file SHA-256.
    pub file_hash: FileHash,
}

impl FileHashInfo {
    /// Compute chunk count, modification time, and whole-file hash for a
    /// local file, reading it once in `chunk_size` strides.
    pub fn for_file(path: impl AsRef<Path>, chunk_size: i64) -> crate::Result<Self> {
        if chunk_size <= 0 {
            return Err(crate::Error::InvalidChunkSize(chunk_size));
        }
        let path = path.as_ref();
        let meta = std::fs::metadata(path)?;
        let last_mod = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map_err(|_| crate::Error::PreEpochMtime)?
            .as_secs() as i64;

        let mut file = File::open(path)?;
        let mut hasher = ContentHash::hasher();
        let mut buf = vec![0u8; chunk_size as usize];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        Ok(Self {
            chunk_count: chunk_count_for_len(meta.len(), chunk_size),
            last_mod,
            file_hash: FileHash::from_content_hash(hasher.finalize()),
        })
    }
}

/// Invoke `f` for each chunk of the file at `path`, in ascending chunk
/// order. Each chunk is read from offset `i * chunk_size` and holds at most
/// `chunk_size` bytes; the final chunk holds exactly the remaining bytes.
///
/// `f` returns `Ok(true)` to continue, `Ok(false)` to stop early.
pub fn for_each_chunk<F>(
    path: impl AsRef<Path>,
    chunk_size: i64,
    chunk_count: i64,
    mut f: F,
) -> crate::Result<()>
where
    F: FnMut(i64, &[u8]) -> crate::Result<bool>,
{
    if chunk_size <= 0 {
        return Err(crate::Error::InvalidChunkSize(chunk_size));
    }
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();

    for i in 0..chunk_count {
        let offset = i as u64 * chunk_size as u64;
        let remaining = len.saturating_sub(offset);
        let this_len = remaining.min(chunk_size as u64) as usize;

        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; this_len];
        file.read_exact(&mut buf)?;

        if !f(i, &buf)? {
            break;
        }
    }
    Ok(())
}

/// Read a single chunk of the file at `path` by chunk number.
pub fn read_chunk(path: impl AsRef<Path>, chunk_size: i64, chunk_num: i64) -> crate::Result<Vec<u8>> {
    if chunk_size <= 0 {
        return Err(crate::Error::InvalidChunkSize(chunk_size));
    }
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();

    let offset = chunk_num as u64 * chunk_size as u64;
    let remaining = len.saturating_sub(offset);
    let this_len = remaining.min(chunk_size as u64) as usize;

    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; this_len];
    file.read_exact(&mut buf)?;
    Ok(buf)
}
