//! File reconciliation: decide, per (local path, remote path) pair, whether
//! to upload, download, repair missing chunks, or do nothing.

use crate::api_client::{ApiClient, ClientError, FilePutRequest};
use icebox_core::chunker::{self, FileHashInfo};
use icebox_core::hash::ChunkHash;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Outcome of reconciling one file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStatus {
    /// The pair diverged only by chunks the server reported missing; the
    /// missing chunks were re-uploaded.
    Missing,
    /// The local file won; it was uploaded.
    LocalNewer,
    /// The remote file won; it was downloaded.
    RemoteNewer,
    /// Nothing to do.
    Same,
}

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(
        "local ({local}) and remote ({remote}) differ but cannot be reconciled: \
         equal modification times and no missing chunks"
    )]
    Unreconciled { local: PathBuf, remote: String },

    #[error("chunk {chunk_num} of file {file_id} failed hash verification")]
    Corrupt { file_id: i64, chunk_num: i64 },

    #[error("neither a local file at {local} nor a remote file named {remote} exists")]
    NothingToSync { local: PathBuf, remote: String },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Core(#[from] icebox_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Reconcile one local file against one remote path.
///
/// Returns the chosen status and the number of chunks transferred. With
/// `extra_strict`, a whole-file hash match is additionally verified
/// chunk-by-chunk against the server's stored chunk hashes.
pub async fn sync_file(
    client: &ApiClient,
    local: &Path,
    remote: &str,
    extra_strict: bool,
) -> SyncResult<(SyncStatus, usize)> {
    let chunk_size = client.chunk_size();

    // Remote lookup drives the whole decision.
    let remote_info = client.get_file_by_name(remote).await?;

    let Some(remote_info) = remote_info else {
        // Not registered on the server: upload, if there is anything to upload.
        if !local.exists() {
            return Err(SyncError::NothingToSync {
                local: local.to_path_buf(),
                remote: remote.to_string(),
            });
        }
        let info = FileHashInfo::for_file(local, chunk_size)?;
        let count = upload(client, local, remote, &info).await?;
        tracing::info!(remote, chunks = count, "uploaded");
        return Ok((SyncStatus::LocalNewer, count));
    };

    // Registered remotely but absent locally: download.
    if !local.exists() {
        let count = download(client, &remote_info, local).await?;
        tracing::info!(remote, chunks = count, "downloaded");
        return Ok((SyncStatus::RemoteNewer, count));
    }

    let local_info = FileHashInfo::for_file(local, chunk_size)?;

    // A lastMod difference alone does not make the pair different; content
    // identity wins when everything else checks out.
    if local_info.file_hash.to_hex() == remote_info.file_hash
        && remote_info.missing_chunks.is_empty()
        && local_info.chunk_count == remote_info.chunk_count
    {
        let mut different = false;
        if extra_strict {
            let remote_chunks = client.get_chunk_list(remote_info.file_id).await?;
            if remote_chunks.len() as i64 == local_info.chunk_count {
                chunker::for_each_chunk(local, chunk_size, local_info.chunk_count, |i, data| {
                    let local_hash = ChunkHash::compute(data).to_hex();
                    if local_hash != remote_chunks[i as usize].chunk_hash {
                        different = true;
                        return Ok(false);
                    }
                    Ok(true)
                })?;
            }
        }

        if !different {
            tracing::info!(remote, "unchanged");
            return Ok((SyncStatus::Same, 0));
        }
    }

    // The pair diverges; the newer modification time picks the winner.
    if local_info.last_mod > remote_info.last_mod {
        client.delete_file(remote_info.file_id).await?;
        tracing::info!(remote, "deleted stale remote");
        let count = upload(client, local, remote, &local_info).await?;
        tracing::info!(remote, chunks = count, "uploaded");
        return Ok((SyncStatus::LocalNewer, count));
    }

    if local_info.last_mod < remote_info.last_mod {
        let count = download(client, &remote_info, local).await?;
        tracing::info!(remote, chunks = count, "downloaded");
        return Ok((SyncStatus::RemoteNewer, count));
    }

    // Same modification time. If the server is missing chunks, fill in
    // exactly those.
    if !remote_info.missing_chunks.is_empty() {
        let count = upload_chunks(
            client,
            local,
            remote_info.file_id,
            &remote_info.missing_chunks,
        )
        .await?;
        tracing::info!(remote, chunks = count, "repaired missing chunks");
        return Ok((SyncStatus::Missing, count));
    }

    // Divergent content, equal times, nothing missing: refuse to guess.
    Err(SyncError::Unreconciled {
        local: local.to_path_buf(),
        remote: remote.to_string(),
    })
}

/// Register the local file on the server and upload every chunk.
async fn upload(
    client: &ApiClient,
    local: &Path,
    remote: &str,
    info: &FileHashInfo,
) -> SyncResult<usize> {
    let registered = client
        .register_file(&FilePutRequest {
            file_name: remote.to_string(),
            last_mod: info.last_mod,
            chunk_count: info.chunk_count,
            file_hash: info.file_hash.to_hex(),
        })
        .await?;

    let all: Vec<i64> = (0..info.chunk_count).collect();
    upload_chunks(client, local, registered.file_id, &all).await
}

/// Upload the listed chunk numbers, reading each from its offset in the
/// local file.
async fn upload_chunks(
    client: &ApiClient,
    local: &Path,
    file_id: i64,
    chunk_nums: &[i64],
) -> SyncResult<usize> {
    let chunk_size = client.chunk_size();
    let mut uploaded = 0;
    for &num in chunk_nums {
        let data = chunker::read_chunk(local, chunk_size, num)?;
        let hash = ChunkHash::compute(&data).to_hex();
        client.put_chunk(file_id, num, &hash, data).await?;
        uploaded += 1;
        tracing::debug!(file_id, chunk = num, "uploaded chunk");
    }
    Ok(uploaded)
}

/// Download every chunk of the remote file, writing chunk `i` at offset
/// `i * chunk_size` of a freshly truncated local file.
///
/// The full chunk bytes are written verbatim; chunk lengths are exact, so
/// the reassembled file is byte-identical to the uploaded one.
async fn download(
    client: &ApiClient,
    remote_info: &crate::api_client::FileInfoResponse,
    local: &Path,
) -> SyncResult<usize> {
    use std::io::Write;

    if let Some(parent) = local.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(local)?;

    let mut written = 0;
    for num in 0..remote_info.chunk_count {
        let (data, stored_hash) = client.get_chunk(remote_info.file_id, num).await?;
        if let Some(stored_hash) = stored_hash
            && ChunkHash::compute(&data).to_hex() != stored_hash
        {
            return Err(SyncError::Corrupt {
                file_id: remote_info.file_id,
                chunk_num: num,
            });
        }
        file.write_all(&data)?;
        written += 1;
        tracing::debug!(file_id = remote_info.file_id, chunk = num, "downloaded chunk");
    }
    file.flush()?;
    Ok(written)
}

/// Summary of a directory sync.
#[derive(Debug, Default)]
pub struct DirSyncSummary {
    pub synced: usize,
    pub transferred_chunks: usize,
    pub failed: Vec<(String, String)>,
}

/// Reconcile a local directory tree against a remote prefix.
///
/// Syncs the union of local files under `local_dir` and remote files under
/// `remote_prefix`; a failure on one file is recorded and the walk
/// continues.
pub async fn sync_dir(
    client: &ApiClient,
    local_dir: &Path,
    remote_prefix: &str,
    extra_strict: bool,
) -> SyncResult<DirSyncSummary> {
    let remote_prefix = remote_prefix.trim_end_matches('/');

    // Union of relative paths: everything on disk plus everything the
    // server knows under the prefix.
    let mut rel_paths = std::collections::BTreeSet::new();
    collect_local_files(local_dir, Path::new(""), &mut rel_paths)?;
    let prefix_slash = format!("{remote_prefix}/");
    for entry in client.list_files().await? {
        if let Some(rel) = entry.file_name.strip_prefix(&prefix_slash) {
            rel_paths.insert(rel.to_string());
        }
    }

    let mut summary = DirSyncSummary::default();
    for rel in rel_paths {
        let local = local_dir.join(&rel);
        let remote = format!("{remote_prefix}/{rel}");
        match sync_file(client, &local, &remote, extra_strict).await {
            Ok((_, count)) => {
                summary.synced += 1;
                summary.transferred_chunks += count;
            }
            Err(e) => {
                tracing::warn!(remote = %remote, error = %e, "failed to sync file");
                summary.failed.push((remote, e.to_string()));
            }
        }
    }
    Ok(summary)
}

/// Collect relative paths of all regular files under `dir`, using `/` as
/// the separator so remote names are platform-independent.
fn collect_local_files(
    root: &Path,
    rel: &Path,
    out: &mut std::collections::BTreeSet<String>,
) -> SyncResult<()> {
    let dir = root.join(rel);
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let rel_child = rel.join(&name);
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_local_files(root, &rel_child, out)?;
        } else if file_type.is_file() {
            let rel_str = rel_child
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.insert(rel_str);
        }
    }
    Ok(())
}
