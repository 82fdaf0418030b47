/*!
    Run-scoped scratch directory.
*/

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::Result;

/**
    Holds every intermediate file of one conversion.

    The directory and its contents are removed when the workspace is
    closed or dropped, whichever way the run ended.
*/
#[derive(Debug)]
pub struct TempWorkspace {
    dir: TempDir,
}

impl TempWorkspace {
    pub fn create_in(parent: &Path) -> Result<Self> {
        std::fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new()
            .prefix("reverse-")
            .tempdir_in(parent)?;
        debug!(path = %dir.path().display(), "workspace created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Decoded source audio.
    pub fn raw_pcm(&self) -> PathBuf {
        self.dir.path().join("source.pcm")
    }

    pub fn reversed_pcm(&self) -> PathBuf {
        self.dir.path().join("reversed.pcm")
    }

    /// Single-track container holding the reversed audio.
    pub fn audio_track(&self) -> PathBuf {
        self.dir.path().join("audio.mp4")
    }

    /// Single-track container holding the reversed video.
    pub fn video_track(&self) -> PathBuf {
        self.dir.path().join("video.mp4")
    }

    pub fn merged(&self) -> PathBuf {
        self.dir.path().join("merged.mp4")
    }

    /// Delete the workspace, reporting failure instead of ignoring it.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => {
                debug!(path = %path.display(), "workspace removed");
                Ok(())
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to remove workspace");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_on_close_and_on_drop() {
        let parent = tempfile::tempdir().unwrap();

        let workspace = TempWorkspace::create_in(parent.path()).unwrap();
        std::fs::write(workspace.raw_pcm(), [0u8; 16]).unwrap();
        let path = workspace.path().to_path_buf();
        workspace.close().unwrap();
        assert!(!path.exists());

        let workspace = TempWorkspace::create_in(parent.path()).unwrap();
        let path = workspace.path().to_path_buf();
        drop(workspace);
        assert!(!path.exists());
    }

    #[test]
    fn concurrent_workspaces_are_distinct() {
        let parent = tempfile::tempdir().unwrap();
        let a = TempWorkspace::create_in(parent.path()).unwrap();
        let b = TempWorkspace::create_in(parent.path()).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.merged().starts_with(a.path()));
    }

    #[test]
    fn creates_missing_parent() {
        let parent = tempfile::tempdir().unwrap();
        let nested = parent.path().join("a/b");
        let workspace = TempWorkspace::create_in(&nested).unwrap();
        assert!(workspace.path().starts_with(&nested));
    }
}
