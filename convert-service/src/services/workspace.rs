use crate::models::TargetFormat;
use service_core::error::AppError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Longest original extension carried over to the upload's scratch name.
const MAX_SOURCE_EXTENSION_LEN: usize = 16;

/// The working directory where uploads and engine output live for the
/// duration of one request.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root).await?;
            tracing::info!(path = %root.display(), "Created working directory");
        }
        Ok(Self { root })
    }

    /// Slot for the bytes a client uploads: `<id>-upload<ext>`.
    pub fn upload_slot(&self, id: &Uuid, extension: &str) -> ScratchFile {
        ScratchFile::new(self.root.join(format!("{}-upload{}", id, extension)))
    }

    /// Slot for the converted result: `<id>.<format>`.
    pub fn output_slot(&self, id: &Uuid, format: &TargetFormat) -> ScratchFile {
        ScratchFile::new(self.root.join(format!("{}.{}", id, format)))
    }

    /// Readiness probe: can we still create and remove files here?
    pub async fn is_writable(&self) -> bool {
        let probe = ScratchFile::new(self.root.join(format!(".probe-{}", Uuid::new_v4())));
        match fs::write(probe.path(), b"").await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    path = %self.root.display(),
                    error = %e,
                    "Working directory is not writable"
                );
                false
            }
        }
    }
}

/// A file in the working directory that is deleted when this value is
/// dropped, whichever way the request ends.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    armed: bool,
}

impl ScratchFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// Delete the file now without blocking the runtime. Dropping the value
    /// afterwards does nothing.
    pub async fn remove(mut self) {
        self.armed = false;
        if let Err(e) = fs::remove_file(&self.path).await {
            log_removal_error(&self.path, &e);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

// Covers every path that never reaches `remove`.
impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed scratch file"),
            Err(e) => log_removal_error(&self.path, &e),
        }
    }
}

fn log_removal_error(path: &Path, e: &std::io::Error) {
    if e.kind() != ErrorKind::NotFound {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "Failed to remove scratch file"
        );
    }
}

/// Extension of the client's file name including the dot, or an empty
/// string when there is none or it is not safe to reuse in a path.
pub fn source_extension(file_name: Option<&str>) -> String {
    file_name
        .map(Path::new)
        .and_then(|p| p.extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_SOURCE_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default()
}
