use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use crate::error::{CaptureError, Result};

/// Recovery files kept on disk at any time
pub const MAX_RECOVERY_FILES: usize = 2;

const FILE_PREFIX: &str = "audio-";
const FILE_SUFFIX: &str = ".raw";

/// Default recovery directory: `<system temp>/voice-capture/recovery`
pub fn default_recovery_dir() -> PathBuf {
    std::env::temp_dir().join("voice-capture").join("recovery")
}

/// A recovery file found on disk
#[derive(Debug, Clone)]
pub struct RecoveryFile {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Rolling on-disk backup of captured bytes
///
/// Chunks accumulate in memory and are written to a fresh timestamped file on
/// every rotation. Only the newest `MAX_RECOVERY_FILES` files survive a prune.
/// The pending chunks are always queryable, flushed or not.
#[derive(Debug)]
pub struct RecoveryBuffer {
    dir: PathBuf,
    pending: Vec<Arc<[u8]>>,
    pending_bytes: usize,
    current_path: Option<PathBuf>,
    last_issued: Option<String>,
    max_files: usize,
}

impl RecoveryBuffer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pending: Vec::new(),
            pending_bytes: 0,
            current_path: None,
            last_issued: None,
            max_files: MAX_RECOVERY_FILES,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File the pending chunks will be written to on the next flush
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// Prepare for a new session: directory, empty pending list, fresh path.
    pub fn start(&mut self) -> Result<()> {
        self.clear_pending();
        fs::create_dir_all(&self.dir)?;
        self.current_path = Some(self.next_path());

        info!("Recovery buffer started in {}", self.dir.display());

        Ok(())
    }

    pub fn push(&mut self, bytes: Arc<[u8]>) {
        self.pending_bytes += bytes.len();
        self.pending.push(bytes);
    }

    /// Write pending chunks, prune old files, move on to a new file.
    ///
    /// The pending list is cleared even when the write fails; the returned
    /// error is for reporting only.
    pub fn rotate(&mut self) -> Result<()> {
        let written = self.flush_pending();
        self.prune_logged();
        self.current_path = Some(self.next_path());
        self.clear_pending();
        written
    }

    /// Final best-effort flush at session end.
    pub fn stop(&mut self) -> Result<()> {
        let written = self.flush_pending();
        if !self.pending.is_empty() {
            self.prune_logged();
        }
        self.clear_pending();
        self.current_path = None;

        debug!("Recovery buffer stopped");

        written
    }

    /// Bytes of every recovery file modified within `window`, followed by the
    /// pending in-memory chunks.
    ///
    /// Files come back in directory listing order, which is not necessarily
    /// chronological.
    pub fn recent(&self, window: Duration) -> Vec<Vec<u8>> {
        let cutoff = SystemTime::now()
            .checked_sub(window)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut buffers = Vec::new();

        match self.list_files() {
            Ok(files) => {
                for file in files.into_iter().filter(|f| f.modified >= cutoff) {
                    match fs::read(&file.path) {
                        Ok(bytes) => buffers.push(bytes),
                        Err(e) => warn!(
                            "Failed to read recovery file {}: {}",
                            file.path.display(),
                            e
                        ),
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to list recovery directory {}: {}",
                self.dir.display(),
                e
            ),
        }

        if !self.pending.is_empty() {
            buffers.push(self.pending_audio());
        }

        buffers
    }

    /// Delete every recovery file and drop the pending chunks.
    pub fn clear(&mut self) -> Result<usize> {
        self.clear_pending();

        let files = match self.list_files() {
            Ok(files) => files,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut deleted = 0;
        for file in files {
            match fs::remove_file(&file.path) {
                Ok(()) => deleted += 1,
                Err(e) => warn!(
                    "Failed to delete recovery file {}: {}",
                    file.path.display(),
                    e
                ),
            }
        }

        info!("Cleared {} recovery files", deleted);

        Ok(deleted)
    }

    /// Recovery files in the directory, in listing order
    pub fn list_files(&self) -> io::Result<Vec<RecoveryFile>> {
        let mut files = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if !is_recovery_file(&path) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };

            files.push(RecoveryFile {
                path,
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }

        Ok(files)
    }

    /// Keep the newest `max_files` files, delete the rest.
    pub fn prune(&self) -> io::Result<usize> {
        let mut files = self.list_files()?;
        if files.len() <= self.max_files {
            return Ok(0);
        }

        // Newest first, name breaks mtime ties
        files.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.path.file_name().cmp(&a.path.file_name()))
        });

        let mut deleted = 0;
        for file in files.into_iter().skip(self.max_files) {
            match fs::remove_file(&file.path) {
                Ok(()) => {
                    debug!("Pruned recovery file {}", file.path.display());
                    deleted += 1;
                }
                Err(e) => warn!(
                    "Failed to prune recovery file {}: {}",
                    file.path.display(),
                    e
                ),
            }
        }

        Ok(deleted)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_bytes(&self) -> usize {
        self.pending_bytes
    }

    /// Pending chunks concatenated in arrival order
    pub fn pending_audio(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pending_bytes);
        for bytes in &self.pending {
            out.extend_from_slice(bytes);
        }
        out
    }

    fn flush_pending(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let path = match self.current_path.clone() {
            Some(path) => path,
            None => self.next_path(),
        };

        fs::write(&path, self.pending_audio()).map_err(|e| CaptureError::WriteFailure {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        info!(
            "Recovery buffer written: {} ({} chunks, {} bytes)",
            path.display(),
            self.pending.len(),
            self.pending_bytes
        );

        Ok(())
    }

    fn prune_logged(&self) {
        if let Err(e) = self.prune() {
            warn!("Failed to prune recovery files: {}", e);
        }
    }

    fn clear_pending(&mut self) {
        self.pending.clear();
        self.pending_bytes = 0;
    }

    /// Timestamp-derived path that doesn't exist yet and sorts after every
    /// name issued before it, so name order follows creation order.
    fn next_path(&mut self) -> PathBuf {
        let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S%.3fZ").to_string();
        let last = self.last_issued.clone();

        let mut fallback = None;
        for n in 0..1000 {
            let name = file_name(&stamp, n);
            if last.as_deref() == Some(name.as_str()) || self.dir.join(&name).exists() {
                continue;
            }
            if last.as_deref().map_or(true, |last| name.as_str() > last) {
                return self.issue(name);
            }
            fallback.get_or_insert(name);
        }

        // Wall clock went backwards
        let name = fallback.unwrap_or_else(|| file_name(&stamp, 0));
        self.issue(name)
    }

    fn issue(&mut self, name: String) -> PathBuf {
        let path = self.dir.join(&name);
        self.last_issued = Some(name);
        path
    }
}

fn file_name(stamp: &str, collision: usize) -> String {
    if collision == 0 {
        format!("{}{}{}", FILE_PREFIX, stamp, FILE_SUFFIX)
    } else {
        format!("{}{}_{:03}{}", FILE_PREFIX, stamp, collision, FILE_SUFFIX)
    }
}

fn is_recovery_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(FILE_PREFIX) && n.ends_with(FILE_SUFFIX))
        .unwrap_or(false)
}
