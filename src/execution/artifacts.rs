//! Artifact storage for failure-only capture steps

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;
use walkdir::WalkDir;

/// Error types for artifact operations
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("No files found at {0}")]
    NotFound(PathBuf),

    #[error("Failed to store artifact '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// A request to persist a path under a fixed artifact name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRequest {
    pub run_id: Uuid,

    /// Job slug, keeps artifacts of sibling jobs apart
    pub job: String,

    /// Artifact name from the step
    pub name: String,

    /// Absolute path inside the job workspace
    pub source: PathBuf,
}

/// Where a captured artifact ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactReceipt {
    pub name: String,
    pub job: String,
    pub location: String,
    pub files: usize,
}

/// Trait for artifact storage backends
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist the requested path
    async fn capture(&self, request: &ArtifactRequest) -> Result<ArtifactReceipt, ArtifactError>;
}

/// Stores artifacts on the local filesystem under `<root>/<run-id>/<job>/<name>/`
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory an artifact is written to
    pub fn destination(&self, request: &ArtifactRequest) -> PathBuf {
        self.root
            .join(request.run_id.to_string())
            .join(&request.job)
            .join(&request.name)
    }
}

/// Copy a file or directory tree, returning the number of files copied
pub(crate) fn copy_tree(source: &Path, dest: &Path, skip: &[PathBuf]) -> std::io::Result<usize> {
    if source.is_file() {
        std::fs::create_dir_all(dest)?;
        let file_name = source
            .file_name()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"))?;
        std::fs::copy(source, dest.join(file_name))?;
        return Ok(1);
    }

    let mut files = 0;
    std::fs::create_dir_all(dest)?;

    let walker = WalkDir::new(source)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !skip.iter().any(|s| e.path().starts_with(s)));

    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
            files += 1;
        }
    }

    Ok(files)
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn capture(&self, request: &ArtifactRequest) -> Result<ArtifactReceipt, ArtifactError> {
        if !request.source.exists() {
            return Err(ArtifactError::NotFound(request.source.clone()));
        }

        let dest = self.destination(request);
        let source = request.source.clone();
        let target = dest.clone();
        debug!("Copying artifact {} -> {}", source.display(), target.display());

        let files = tokio::task::spawn_blocking(move || copy_tree(&source, &target, &[]))
            .await
            .map_err(|e| ArtifactError::Io {
                name: request.name.clone(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e),
            })?
            .map_err(|source| ArtifactError::Io {
                name: request.name.clone(),
                source,
            })?;

        info!(
            "Stored artifact '{}' for {} ({} files) at {}",
            request.name,
            request.job,
            files,
            dest.display()
        );

        Ok(ArtifactReceipt {
            name: request.name.clone(),
            job: request.job.clone(),
            location: dest.display().to_string(),
            files,
        })
    }
}

/// Records capture requests without touching the filesystem (for testing or dry runs)
pub struct InMemoryArtifactStore {
    captured: RwLock<Vec<ArtifactRequest>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self {
            captured: RwLock::new(Vec::new()),
        }
    }

    /// Every request received so far, in arrival order
    pub async fn captured(&self) -> Vec<ArtifactRequest> {
        self.captured.read().await.clone()
    }
}

impl Default for InMemoryArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn capture(&self, request: &ArtifactRequest) -> Result<ArtifactReceipt, ArtifactError> {
        self.captured.write().await.push(request.clone());
        Ok(ArtifactReceipt {
            name: request.name.clone(),
            job: request.job.clone(),
            location: format!("memory://{}/{}/{}", request.run_id, request.job, request.name),
            files: 0,
        })
    }
}
