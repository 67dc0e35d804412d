//! The supervising facade: submit, poll, tail, cancel, download.
//!
//! Submission is non-blocking — it returns as soon as the detached process
//! has been started, never waiting to learn whether the external tool will
//! succeed. Configuration and validation problems are the only synchronous
//! failures and are raised before anything is launched; everything that
//! happens to the running tool is observed later, through polling.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use super::job::{Job, JobKind, JobStatus};
use super::launcher;
use super::status;
use super::store::JobStore;
use crate::archive::{self, ArchiveMode};
use crate::config::Config;
use crate::error::{FoldrunError, Result};
use crate::fsutil;
use crate::tools::{alphafold, proteinmpnn, CommandLine};

/// Hard cap on the number of log lines a single query may return.
pub const MAX_LOG_TAIL: usize = 4000;

/// Sentinel exit code reserved for "killed by user".
pub const CANCELLED_EXIT_CODE: i32 = 137;

/// One submission, with its kind-specific parameters. `upload` is the
/// already-written uploaded file; it is copied into the job's own input
/// directory under a sanitized name.
#[derive(Debug, Clone)]
pub enum SubmitRequest {
    ContainerPipeline {
        upload: PathBuf,
        params: alphafold::AlphaFoldParams,
    },
    DirectScript {
        upload: PathBuf,
        params: proteinmpnn::ProteinMpnnParams,
    },
}

impl SubmitRequest {
    fn upload(&self) -> &PathBuf {
        match self {
            SubmitRequest::ContainerPipeline { upload, .. } => upload,
            SubmitRequest::DirectScript { upload, .. } => upload,
        }
    }
}

/// The externally visible status pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub status: JobStatus,
    pub exit_code: Option<i32>,
}

pub struct JobSupervisor {
    config: Config,
    store: Arc<dyn JobStore>,
}

impl JobSupervisor {
    pub fn new(config: Config, store: Arc<dyn JobStore>) -> Self {
        Self { config, store }
    }

    /// Validate, prepare the job's directories, build the tool command and
    /// launch it detached. Returns the recorded job, already Running.
    pub fn submit(&self, request: &SubmitRequest) -> Result<Job> {
        let id = Job::new_id();

        let file_name = fsutil::safe_name(
            &request
                .upload()
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        if file_name.is_empty() {
            return Err(FoldrunError::Validation(
                "upload has no usable file name".into(),
            ));
        }

        let in_dir = self.config.input_base().join(&id);
        let out_dir = self.config.output_base().join(&id);
        let log_path = self.config.log_base().join(format!("{id}.log"));
        let input_path = in_dir.join(&file_name);

        // Cheap rejections first, before any directory is created.
        if let SubmitRequest::DirectScript { params, .. } = request {
            proteinmpnn::validate(&self.config.proteinmpnn, &input_path, params)?;
        }

        fsutil::ensure_dir(&in_dir)?;
        fsutil::ensure_dir(&out_dir)?;
        fs::copy(request.upload(), &input_path)?;

        let (command, kind) = self.build_command(&id, request, &input_path, &out_dir)?;

        let job = Job::new(id.clone(), kind, input_path, out_dir, log_path.clone());
        self.store.put(job);

        let pid = launcher::launch(&command, &log_path)?;
        self.store.mark_running(&id, pid);
        info!(job = %id, pid, "job launched");

        self.store
            .get(&id)
            .ok_or_else(|| FoldrunError::JobNotFound(id))
    }

    fn build_command(
        &self,
        id: &str,
        request: &SubmitRequest,
        input_path: &std::path::Path,
        out_dir: &std::path::Path,
    ) -> Result<(CommandLine, JobKind)> {
        match request {
            SubmitRequest::ContainerPipeline { params, .. } => {
                let (cmd, container) =
                    alphafold::build_command(&self.config.alphafold, id, input_path, out_dir, params)?;
                Ok((cmd, JobKind::ContainerPipeline { container }))
            }
            SubmitRequest::DirectScript { params, .. } => {
                let cmd =
                    proteinmpnn::build_command(&self.config.proteinmpnn, input_path, out_dir, params)?;
                Ok((cmd, JobKind::DirectScript))
            }
        }
    }

    /// Current `(status, exit code)` of a job, lazily re-derived.
    pub fn status(&self, id: &str) -> Result<StatusReport> {
        let (status, exit_code) = status::resolve(self.store.as_ref(), id)?;
        Ok(StatusReport { status, exit_code })
    }

    /// Last `tail` lines of the combined job log, capped at
    /// [`MAX_LOG_TAIL`].
    pub fn logs(&self, id: &str, tail: usize) -> Result<String> {
        let job = self
            .store
            .get(id)
            .ok_or_else(|| FoldrunError::JobNotFound(id.to_string()))?;
        fsutil::tail_lines(&job.log_path, tail.clamp(1, MAX_LOG_TAIL))
    }

    /// Best-effort cancellation. Acknowledges immediately; never waits for
    /// the external work to actually stop. Idempotent: once the job is
    /// terminal this performs no further side effects.
    pub fn cancel(&self, id: &str) -> Result<JobStatus> {
        let job = self
            .store
            .get(id)
            .ok_or_else(|| FoldrunError::JobNotFound(id.to_string()))?;

        if job.status.is_terminal() {
            return Ok(job.status);
        }

        self.store.mark_cancelling(id);
        // Force the sentinel first: any concurrent completion observer now
        // resolves to the cancelled state too.
        fs::write(job.sentinel_path(), CANCELLED_EXIT_CODE.to_string())?;
        self.store
            .compare_and_set_terminal(id, JobStatus::Failed, Some(CANCELLED_EXIT_CODE));

        if let JobKind::ContainerPipeline { container } = &job.kind {
            launcher::remove_container(container);
        }
        if let Some(pid) = job.pid {
            launcher::terminate(pid);
        }
        info!(job = %id, "cancellation requested");
        Ok(JobStatus::Cancelling)
    }

    /// Buffered artifact for a finished job, reusing the cached one when it
    /// still exists and building on demand otherwise.
    pub fn artifact(&self, id: &str, mode: ArchiveMode) -> Result<PathBuf> {
        let job = self.require_finished(id)?;
        if let Some(path) = job.artifact(mode) {
            if path.exists() {
                return Ok(path.clone());
            }
        }
        let path = archive::build_buffered(&job.output_dir, mode)?;
        self.store.set_artifact(id, mode, path.clone());
        info!(job = %id, mode = mode.as_str(), artifact = %path.display(), "artifact built");
        Ok(path)
    }

    /// Deliver the archive into `writer`. Prefers the buffered artifact;
    /// when buffering fails, falls back to streaming straight from the
    /// output tree rather than surfacing the build failure.
    pub fn download_to<W: Write>(&self, id: &str, mode: ArchiveMode, mut writer: W) -> Result<()> {
        match self.artifact(id, mode) {
            Ok(path) => {
                let mut file = fs::File::open(path)?;
                io::copy(&mut file, &mut writer)?;
                Ok(())
            }
            Err(e @ (FoldrunError::JobNotFound(_)
            | FoldrunError::NotFinished(_)
            | FoldrunError::OutputMissing(_))) => Err(e),
            Err(e) => {
                warn!(job = %id, error = %e, "buffered build failed, streaming instead");
                let job = self.require_finished(id)?;
                archive::stream(&job.output_dir, mode, writer)
            }
        }
    }

    /// Poll until the job reaches a terminal state.
    pub async fn wait_for_terminal(
        &self,
        id: &str,
        poll_interval: Duration,
    ) -> Result<StatusReport> {
        loop {
            let report = self.status(id)?;
            if report.status.is_terminal() {
                return Ok(report);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    fn require_finished(&self, id: &str) -> Result<Job> {
        let report = self.status(id)?;
        if report.status != JobStatus::Finished {
            return Err(FoldrunError::NotFinished(id.to_string()));
        }
        let job = self
            .store
            .get(id)
            .ok_or_else(|| FoldrunError::JobNotFound(id.to_string()))?;
        if !job.output_dir.is_dir() {
            return Err(FoldrunError::OutputMissing(job.output_dir));
        }
        Ok(job)
    }
}
