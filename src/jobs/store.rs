//! Job table behind a narrow, injectable interface.
//!
//! The original design kept a process-global mutable table; here the store
//! is an `Arc`-shared trait object so a single-instance deployment can use
//! the in-memory map while a durable backend could be swapped in without
//! touching any consumer. The one-way terminal transition goes through
//! `compare_and_set_terminal` so concurrent polls cannot race past it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use super::job::{Job, JobStatus};
use crate::archive::ArchiveMode;

pub trait JobStore: Send + Sync {
    /// Insert or replace a job record.
    fn put(&self, job: Job);

    /// Snapshot of a job record, if known.
    fn get(&self, id: &str) -> Option<Job>;

    /// Record launch confirmation: pid, Running status, start timestamp.
    /// No-op once the job is terminal.
    fn mark_running(&self, id: &str, pid: u32);

    /// Flip a non-terminal job to Cancelling. Returns the previous status.
    fn mark_cancelling(&self, id: &str) -> Option<JobStatus>;

    /// Commit the one-way terminal transition. Only the first caller for a
    /// job actually writes `status` and `exit_code`; later callers (and
    /// calls against an already-terminal job) leave the record untouched.
    /// Returns the record as of after the call.
    fn compare_and_set_terminal(
        &self,
        id: &str,
        status: JobStatus,
        exit_code: Option<i32>,
    ) -> Option<Job>;

    /// Remember a buffered artifact path for reuse across downloads.
    fn set_artifact(&self, id: &str, mode: ArchiveMode, path: PathBuf);
}

/// The default single-instance store: a locked hash map.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<String, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobStore for InMemoryJobStore {
    fn put(&self, job: Job) {
        self.jobs.lock().unwrap().insert(job.id.clone(), job);
    }

    fn get(&self, id: &str) -> Option<Job> {
        self.jobs.lock().unwrap().get(id).cloned()
    }

    fn mark_running(&self, id: &str, pid: u32) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.get_mut(id) {
            if !job.status.is_terminal() {
                job.pid = Some(pid);
                job.status = JobStatus::Running;
                job.started_at = Some(chrono::Utc::now());
            }
        }
    }

    fn mark_cancelling(&self, id: &str) -> Option<JobStatus> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(id)?;
        let previous = job.status;
        if !previous.is_terminal() {
            job.status = JobStatus::Cancelling;
        }
        Some(previous)
    }

    fn compare_and_set_terminal(
        &self,
        id: &str,
        status: JobStatus,
        exit_code: Option<i32>,
    ) -> Option<Job> {
        debug_assert!(status.is_terminal());
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(id)?;
        if !job.status.is_terminal() {
            job.status = status;
            job.exit_code = exit_code;
        }
        Some(job.clone())
    }

    fn set_artifact(&self, id: &str, mode: ArchiveMode, path: PathBuf) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.get_mut(id) {
            match mode {
                ArchiveMode::Full => job.artifact_full = Some(path),
                ArchiveMode::Lite => job.artifact_lite = Some(path),
            }
        }
    }
}
