use super::PipelineError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

/// How many suffixed names are tried before giving up on a colliding hint.
const MAX_NAME_ATTEMPTS: usize = 16;

/// Writes uploads into the shared staging directory.
#[derive(Debug, Clone)]
pub struct Stager {
    dir: PathBuf,
}

impl Stager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Make sure the staging directory exists. Safe to call concurrently.
    pub async fn ensure_dir(&self) -> Result<(), PipelineError> {
        fs::create_dir_all(&self.dir).await.map_err(|e| {
            PipelineError::StorageFailure(format!(
                "cannot create staging directory {}: {}",
                self.dir.display(),
                e
            ))
        })
    }

    /// Persist `bytes` under a name derived from `hint`. Existing files are
    /// never overwritten; on collision `name-1.ext`, `name-2.ext`, ... are tried.
    pub async fn stage(&self, bytes: &[u8], hint: &str) -> Result<StagedFile, PipelineError> {
        self.ensure_dir().await?;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = self.dir.join(candidate_name(hint, attempt));

            let mut file = match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(PipelineError::StorageFailure(format!(
                        "cannot create {}: {}",
                        path.display(),
                        e
                    )));
                }
            };

            // From here on the file exists and is ours to clean up
            let staged = StagedFile::new(path);
            let written = async {
                file.write_all(bytes).await?;
                file.flush().await
            }
            .await;
            drop(file);

            return match written {
                Ok(()) => {
                    tracing::debug!("Staged {} bytes at {}", bytes.len(), staged.path().display());
                    Ok(staged)
                }
                Err(e) => {
                    let message = format!("cannot write {}: {}", staged.path().display(), e);
                    staged.remove().await;
                    Err(PipelineError::StorageFailure(message))
                }
            };
        }

        Err(PipelineError::StorageFailure(format!(
            "no free staging name for '{}' after {} attempts",
            hint, MAX_NAME_ATTEMPTS
        )))
    }
}

fn candidate_name(hint: &str, attempt: usize) -> String {
    if attempt == 0 {
        return hint.to_string();
    }
    match hint.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}-{}.{}", stem, attempt, ext),
        _ => format!("{}-{}", hint, attempt),
    }
}

/// A temporary file owned by a single request.
///
/// [`StagedFile::remove`] is the one cleanup attempt. If the owner is dropped
/// without calling it (panic, client disconnect cancelling the handler), the
/// attempt happens in `Drop` instead.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    cleaned: bool,
}

impl StagedFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            cleaned: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> Result<Vec<u8>, PipelineError> {
        fs::read(&self.path).await.map_err(|e| {
            PipelineError::StorageFailure(format!("cannot read {}: {}", self.path.display(), e))
        })
    }

    /// Delete the file. Failures are logged, never returned.
    pub async fn remove(mut self) {
        self.cleaned = true;
        if let Err(e) = fs::remove_file(&self.path).await {
            tracing::warn!("Failed to remove staged file {}: {}", self.path.display(), e);
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!("Failed to remove abandoned staged file {}: {}", self.path.display(), e);
        } else {
            tracing::debug!("Removed abandoned staged file {}", self.path.display());
        }
    }
}
