//! Status snapshot sink.
//!
//! The snapshot is read by external tools (`cat`, `watch`), so it is written
//! to a sibling temporary file and renamed over the target. Readers see
//! either the previous dump or the new one, never a partial write.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::fs;

/// Plain-text status file, overwritten after every probe round.
#[derive(Debug, Clone)]
pub struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Replace the file contents with `contents` in one step.
    pub async fn write(&self, contents: &str) -> std::io::Result<()> {
        let temp = self.temp_path();
        fs::write(&temp, contents).await?;
        fs::rename(&temp, &self.path).await
    }
}
