//! Per-job workspaces - one isolated working directory per job instance

use crate::execution::artifacts::copy_tree;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Failed to prepare workspace {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Source directory does not exist: {0}")]
    MissingSource(PathBuf),

    #[error("Checkout into {path} failed: {source}")]
    Checkout {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Filesystem locations shared by all jobs of a run
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Tree copied into each workspace by `checkout`
    pub source_dir: PathBuf,

    /// Parent of every job workspace
    pub work_root: PathBuf,

    /// Root of the local artifact store
    pub artifacts_root: PathBuf,

    /// Leave workspaces on disk after jobs finish
    pub keep_workspaces: bool,
}

impl RunnerSettings {
    /// Defaults: current directory as source, data dir for work and artifacts
    pub fn with_defaults() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("matrix-pipeline");
        Self {
            source_dir: PathBuf::from("."),
            work_root: data_dir.join("work"),
            artifacts_root: data_dir.join("artifacts"),
            keep_workspaces: false,
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Working directory owned by one job instance
#[derive(Debug)]
pub struct JobWorkspace {
    path: PathBuf,
    keep: bool,
}

impl JobWorkspace {
    /// Create `<work_root>/<run-id>/<job-slug>`, replacing leftovers from an earlier run
    pub fn create(settings: &RunnerSettings, run_id: Uuid, job_slug: &str) -> Result<Self, WorkspaceError> {
        let path = settings.work_root.join(run_id.to_string()).join(job_slug);

        if path.exists() {
            std::fs::remove_dir_all(&path).map_err(|source| WorkspaceError::Create {
                path: path.clone(),
                source,
            })?;
        }
        std::fs::create_dir_all(&path).map_err(|source| WorkspaceError::Create {
            path: path.clone(),
            source,
        })?;

        debug!("Created workspace {}", path.display());
        Ok(Self {
            path,
            keep: settings.keep_workspaces,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the workspace unless configured to keep it
    pub fn cleanup(self) {
        if self.keep {
            debug!("Keeping workspace {}", self.path.display());
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            warn!("Failed to remove workspace {}: {}", self.path.display(), e);
        }
        // Drop the per-run directory once its last job is gone
        if let Some(run_dir) = self.path.parent() {
            let _ = std::fs::remove_dir(run_dir);
        }
    }
}

/// Copy `settings.source_dir` into `dest`, returning the number of files copied
pub fn checkout_into(settings: &RunnerSettings, dest: &Path) -> Result<usize, WorkspaceError> {
    let source = &settings.source_dir;
    if !source.is_dir() {
        return Err(WorkspaceError::MissingSource(source.clone()));
    }

    let skip: Vec<PathBuf> = [&settings.work_root, &settings.artifacts_root]
        .iter()
        .map(|p| absolute(p))
        .collect();
    let source = absolute(source);

    copy_tree(&source, dest, &skip).map_err(|e| WorkspaceError::Checkout {
        path: dest.to_path_buf(),
        source: e,
    })
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    })
}
