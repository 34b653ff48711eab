//! Per-job temporary directories.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// File name of the materialized source inside a workspace.
pub const SOURCE_FILE: &str = "main.cpp";

/// File name of the compiled program inside a workspace.
pub const BINARY_FILE: &str = "program";

/// A uniquely named directory holding one job's source, binary and outputs.
///
/// The directory and everything in it are removed when the value is dropped,
/// whichever way the job ends.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh workspace under `root`, creating `root` if needed.
    pub fn create(root: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix("prism-job-")
            .tempdir_in(root)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn source_path(&self) -> PathBuf {
        self.dir.path().join(SOURCE_FILE)
    }

    pub fn binary_path(&self) -> PathBuf {
        self.dir.path().join(BINARY_FILE)
    }

    /// Write `source` to [`SOURCE_FILE`] and return its path.
    pub async fn write_source(&self, source: &str) -> std::io::Result<PathBuf> {
        let path = self.source_path();
        tokio::fs::write(&path, source).await?;
        Ok(path)
    }
}
