//! Upload dispatcher: enumerate local files, upload them with bounded
//! concurrency, and report per-file progress as structured events.
//!
//! Progress reporting is decoupled from the transfer itself: workers push
//! [`ProgressEvent`]s onto a channel and a single consumer logs them at a
//! throttled rate, so a slow terminal never stalls an upload.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::DeployConfig;
use crate::keys;
use crate::store::{ObjectStore, PutObject, StoreError};

/// Minimum interval between progress log lines per run. Completion events
/// are always logged.
const PROGRESS_LOG_INTERVAL: Duration = Duration::from_millis(350);

/// Read-chunk size when streaming a file into its upload body.
const READ_CHUNK: usize = 64 * 1024;

/// One planned upload: local path, derived remote key and size if known.
#[derive(Debug, Clone)]
pub struct PlannedUpload {
    pub path: PathBuf,
    pub key: String,
    pub size: Option<u64>,
}

/// Structured progress from the upload workers.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started {
        key: String,
        total: Option<u64>,
    },
    Transferred {
        key: String,
        loaded: u64,
        total: Option<u64>,
    },
    Completed {
        key: String,
        loaded: u64,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("failed to scan local directory {dir}: {source}")]
    Scan {
        dir: PathBuf,
        source: walkdir::Error,
    },

    #[error("local path {path} does not map to a remote key under {root}")]
    KeyDerivation { path: PathBuf, root: PathBuf },

    #[error("failed to read local file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Recursively enumerate all regular files under `local_dir` and derive
/// their remote keys. Enumeration order is deterministic (walkdir's sorted
/// traversal) so logs and tests are stable.
pub fn scan_local_dir(config: &DeployConfig) -> Result<Vec<PlannedUpload>, UploadError> {
    let root = &config.local_dir;
    let mut planned = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|source| UploadError::Scan {
            dir: root.clone(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path().to_path_buf();
        let key = keys::remote_key(root, &path, &config.s3.prefix).ok_or_else(|| {
            UploadError::KeyDerivation {
                path: path.clone(),
                root: root.clone(),
            }
        })?;
        let size = entry.metadata().ok().map(|m| m.len());
        planned.push(PlannedUpload { path, key, size });
    }

    info!(
        dir = %root.display(),
        files = planned.len(),
        "Scanned local directory"
    );
    Ok(planned)
}

/// Upload all planned files with bounded concurrency. Fail-fast: the first
/// error aborts the remaining batch; already-completed uploads are kept.
/// Returns the uploaded keys.
pub async fn upload_all<S: ObjectStore + ?Sized>(
    store: &S,
    config: &DeployConfig,
    planned: Vec<PlannedUpload>,
) -> Result<Vec<String>, UploadError> {
    let total_files = planned.len();
    info!(
        files = total_files,
        concurrency = config.s3.concurrency,
        "Starting uploads"
    );

    let (tx, rx) = mpsc::unbounded_channel();
    let logger = tokio::spawn(log_progress(rx));

    let result = stream::iter(planned.into_iter().map(|file| {
        let tx = tx.clone();
        async move { upload_one(store, config, file, tx).await }
    }))
    .buffer_unordered(config.s3.concurrency)
    .try_collect::<Vec<String>>()
    .await;

    // Close the channel so the logger drains and exits.
    drop(tx);
    let _ = logger.await;

    let uploaded = result?;
    info!(uploaded = uploaded.len(), "All uploads completed");
    Ok(uploaded)
}

async fn upload_one<S: ObjectStore + ?Sized>(
    store: &S,
    config: &DeployConfig,
    file: PlannedUpload,
    progress: mpsc::UnboundedSender<ProgressEvent>,
) -> Result<String, UploadError> {
    let _ = progress.send(ProgressEvent::Started {
        key: file.key.clone(),
        total: file.size,
    });

    let body = read_with_progress(&file.path, &file.key, file.size, &progress).await?;
    let loaded = body.len() as u64;

    store
        .put_object(
            &config.s3.bucket,
            PutObject {
                key: file.key.clone(),
                body,
                content_type: keys::content_type_for(&file.path),
                acl: config.s3.acl.clone(),
            },
        )
        .await?;

    let _ = progress.send(ProgressEvent::Completed {
        key: file.key.clone(),
        loaded,
    });
    Ok(file.key)
}

/// Read the file in chunks, emitting transfer progress per chunk. The total
/// may be unknown when metadata was unreadable at scan time.
async fn read_with_progress(
    path: &Path,
    key: &str,
    total: Option<u64>,
    progress: &mpsc::UnboundedSender<ProgressEvent>,
) -> Result<Vec<u8>, UploadError> {
    let map_err = |source| UploadError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut file = tokio::fs::File::open(path).await.map_err(map_err)?;
    let mut body = Vec::with_capacity(total.unwrap_or(0) as usize);
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let n = file.read(&mut chunk).await.map_err(map_err)?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
        let _ = progress.send(ProgressEvent::Transferred {
            key: key.to_string(),
            loaded: body.len() as u64,
            total,
        });
    }

    Ok(body)
}

/// Single consumer of progress events. Transfer updates are rate-limited to
/// one log line per interval; completions always log.
async fn log_progress(mut rx: mpsc::UnboundedReceiver<ProgressEvent>) {
    let mut last_log: Option<Instant> = None;

    while let Some(event) = rx.recv().await {
        match event {
            ProgressEvent::Started { key, total } => {
                info!(key = %key, total = ?total, "Upload started");
            }
            ProgressEvent::Transferred { key, loaded, total } => {
                let due = last_log
                    .map(|at| at.elapsed() >= PROGRESS_LOG_INTERVAL)
                    .unwrap_or(true);
                if !due {
                    continue;
                }
                match total {
                    Some(total) if total > 0 => {
                        let pct = (loaded as f64 / total as f64) * 100.0;
                        info!(key = %key, "{pct:.1}% (~{} KB)", loaded / 1024);
                    }
                    _ => {
                        info!(key = %key, loaded = loaded, "size not known yet");
                    }
                }
                last_log = Some(Instant::now());
            }
            ProgressEvent::Completed { key, loaded } => {
                info!(key = %key, bytes = loaded, "Upload completed");
                last_log = Some(Instant::now());
            }
        }
    }
}

/// Mirror sync: delete remote keys under the prefix that were not part of
/// the uploaded set. Only runs after a fully successful batch. Returns the
/// deleted keys.
pub async fn delete_removed<S: ObjectStore + ?Sized>(
    store: &S,
    config: &DeployConfig,
    uploaded: &[String],
) -> Result<Vec<String>, UploadError> {
    let keep: HashSet<&str> = uploaded.iter().map(String::as_str).collect();
    let remote = store
        .list_keys(&config.s3.bucket, &config.s3.prefix)
        .await?;

    let mut deleted = Vec::new();
    for key in remote {
        if keep.contains(key.as_str()) {
            continue;
        }
        warn!(key = %key, "Deleting remote object absent locally");
        store.delete_object(&config.s3.bucket, &key).await?;
        deleted.push(key);
    }

    info!(deleted = deleted.len(), "Mirror sync finished");
    Ok(deleted)
}
