//! Per-job scratch directories under a single temp root.
//!
//! Each job downloads into `<root>/<job_id>` and nothing else writes there.
//! The whole root is wiped on startup, so files from a crashed run never
//! pile up.

use std::io;
use std::path::{Path, PathBuf};

use fs_err::tokio as fs;

#[derive(Debug, Clone)]
pub struct TempStorage {
    root: PathBuf,
}

impl TempStorage {
    /// Creates the root directory and removes leftovers from previous runs.
    pub async fn start(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;

        let mut entries = fs::read_dir(&root).await?;
        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let result = if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => log::warn!("Failed to remove stale temp entry: {}", e),
            }
        }
        if removed > 0 {
            log::info!("Removed {} stale temp entries from {}", removed, root.display());
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.root.join(job_id)
    }

    /// Creates the job directory. Fails if it already exists.
    pub async fn allocate(&self, job_id: &str) -> io::Result<PathBuf> {
        let dir = self.job_dir(job_id);
        fs::create_dir(&dir).await?;
        log::debug!("Allocated temp dir {}", dir.display());
        Ok(dir)
    }

    /// Removes the job directory. Errors are logged, never returned.
    pub async fn cleanup(&self, job_id: &str) {
        let dir = self.job_dir(job_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => log::debug!("Removed temp dir {}", dir.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to clean up temp dir: {}", e),
        }
    }
}
