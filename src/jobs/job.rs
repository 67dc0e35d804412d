use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::archive::ArchiveMode;

/// The kind of external work a job performs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobKind {
    /// Containerized structure-prediction pipeline. Carries the container
    /// name used for runtime inspection and cancellation.
    ContainerPipeline { container: String },
    /// Direct invocation of the sequence-design script.
    DirectScript,
}

/// Lifecycle status of a job.
///
/// `Finished` and `Failed` are terminal: once committed they are never
/// revised, and the exit code is set at the same transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Finished,
    Failed,
    Cancelling,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
            JobStatus::Failed => "failed",
            JobStatus::Cancelling => "cancelling",
        };
        write!(f, "{s}")
    }
}

/// One submitted unit of external work.
///
/// The store owns this record; the OS or container runtime owns the actual
/// process. `id` is generated before any filesystem side effect and never
/// reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub log_path: PathBuf,
    pub status: JobStatus,
    pub exit_code: Option<i32>,
    /// Pid of the supervising shell, once launch is confirmed.
    pub pid: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    /// Cached buffered artifact, per archive mode.
    pub artifact_full: Option<PathBuf>,
    pub artifact_lite: Option<PathBuf>,
}

impl Job {
    /// Generate a fresh 8-hex-char job id.
    pub fn new_id() -> String {
        let id = Uuid::new_v4().simple().to_string();
        id[..8].to_string()
    }

    pub fn new(
        id: String,
        kind: JobKind,
        input_path: PathBuf,
        output_dir: PathBuf,
        log_path: PathBuf,
    ) -> Self {
        Self {
            id,
            kind,
            input_path,
            output_dir,
            log_path,
            status: JobStatus::Queued,
            exit_code: None,
            pid: None,
            created_at: Utc::now(),
            started_at: None,
            artifact_full: None,
            artifact_lite: None,
        }
    }

    /// Path of the sentinel exit-code file, derived from the log path.
    pub fn sentinel_path(&self) -> PathBuf {
        sentinel_for(&self.log_path)
    }

    pub fn artifact(&self, mode: ArchiveMode) -> Option<&PathBuf> {
        match mode {
            ArchiveMode::Full => self.artifact_full.as_ref(),
            ArchiveMode::Lite => self.artifact_lite.as_ref(),
        }
    }
}

/// Same path as the log file, with the extension replaced by `exit`.
pub fn sentinel_for(log_path: &Path) -> PathBuf {
    log_path.with_extension("exit")
}
