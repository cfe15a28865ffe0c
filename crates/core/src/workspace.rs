//! Per-conversion scratch directory.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ConversionError;

const WORKSPACE_PREFIX: &str = "fileconverter_";

/// Uniquely named directory holding the intermediate files of one
/// conversion.
///
/// Released when dropped: removed recursively, or left on disk when the
/// workspace was created with `preserve` set.
#[derive(Debug)]
pub struct TempWorkspace {
    dir: Option<TempDir>,
    path: PathBuf,
    preserve: bool,
}

impl TempWorkspace {
    /// Create a workspace under `base`, or under the system temp directory.
    pub fn create(base: Option<&Path>, preserve: bool) -> Result<Self, ConversionError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);

        let dir = match base {
            Some(base) => builder.tempdir_in(base),
            None => builder.tempdir(),
        }
        .map_err(|source| ConversionError::Workspace {
            base: base.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir),
            source,
        })?;

        let path = dir.path().to_path_buf();
        debug!("Created workspace {:?}", path);
        Ok(Self {
            dir: Some(dir),
            path,
            preserve,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_preserved(&self) -> bool {
        self.preserve
    }

    /// Unique path for the output of intermediate stage `stage`.
    pub fn intermediate_path(&self, stage: usize, extension: &str) -> PathBuf {
        self.path.join(format!(
            "stage{}_{}.{}",
            stage,
            Uuid::new_v4().simple(),
            extension
        ))
    }

    /// Release the workspace now and return its path.
    pub fn finish(mut self) -> PathBuf {
        self.release();
        self.path.clone()
    }

    fn release(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };

        if self.preserve {
            let kept = dir.keep();
            debug!("Preserving workspace {:?}", kept);
        } else if let Err(e) = dir.close() {
            warn!("Failed to remove workspace {:?}: {}", self.path, e);
        }
    }
}

impl Drop for TempWorkspace {
    fn drop(&mut self) {
        self.release();
    }
}
