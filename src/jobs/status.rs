//! Lazy status resolution.
//!
//! Status is re-derived on each poll instead of pushed, because the process
//! answering a status query is not necessarily the one that launched the
//! job; the filesystem sentinel (or the container runtime) is the only
//! rendezvous point the two are guaranteed to share. Resolution is
//! idempotent: terminal states are memoized in the store and the one-way
//! transition is committed through compare-and-set, so concurrent polls
//! agree on a single outcome.

use std::fs;
use std::path::Path;
use std::process::Command;

use tracing::info;

use super::job::{JobKind, JobStatus};
use super::store::JobStore;
use crate::error::{FoldrunError, Result};

/// What the container runtime reports for a named container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerProbe {
    Running,
    Exited(i32),
    /// Removed or never created.
    NotFound,
    /// The runtime itself could not be queried; tells us nothing.
    Unknown,
}

/// Read a sentinel exit-code file. `None` if it does not exist; an empty or
/// unparsable sentinel reads as `-1` (abnormal) rather than failing the
/// poll.
pub fn read_sentinel(path: &Path) -> Option<i32> {
    let contents = fs::read_to_string(path).ok()?;
    Some(contents.trim().parse().unwrap_or(-1))
}

/// Parse `docker inspect -f '{{.State.Status}} {{.State.ExitCode}}'`
/// output.
pub fn parse_inspect_output(out: &str) -> ContainerProbe {
    let mut parts = out.split_whitespace();
    match parts.next() {
        Some("running") => ContainerProbe::Running,
        Some("exited") | Some("dead") => {
            let code = parts.next().and_then(|c| c.parse().ok()).unwrap_or(-1);
            ContainerProbe::Exited(code)
        }
        Some(_) => ContainerProbe::Running, // created/restarting: not done yet
        None => ContainerProbe::Unknown,
    }
}

/// Ask the container runtime about a named container.
pub fn probe_container(name: &str) -> ContainerProbe {
    let output = Command::new("docker")
        .args(["inspect", "-f", "{{.State.Status}} {{.State.ExitCode}}"])
        .arg(name)
        .output();
    match output {
        Ok(out) if out.status.success() => {
            parse_inspect_output(&String::from_utf8_lossy(&out.stdout))
        }
        Ok(_) => ContainerProbe::NotFound,
        Err(_) => ContainerProbe::Unknown,
    }
}

/// Reconcile a job against its sentinel file (or container state) and
/// return the externally visible `(status, exit_code)` pair.
pub fn resolve(store: &dyn JobStore, id: &str) -> Result<(JobStatus, Option<i32>)> {
    resolve_with(store, id, probe_container)
}

// The probe is injected so container-state transitions can be exercised
// without a runtime on the host.
fn resolve_with(
    store: &dyn JobStore,
    id: &str,
    probe: impl Fn(&str) -> ContainerProbe,
) -> Result<(JobStatus, Option<i32>)> {
    let job = store
        .get(id)
        .ok_or_else(|| FoldrunError::JobNotFound(id.to_string()))?;

    if job.status.is_terminal() {
        return Ok((job.status, job.exit_code));
    }

    if let Some(code) = read_sentinel(&job.sentinel_path()) {
        return Ok(commit_terminal(store, id, code));
    }

    if let JobKind::ContainerPipeline { container } = &job.kind {
        match probe(container) {
            ContainerProbe::Running => {}
            ContainerProbe::Exited(code) => return Ok(commit_terminal(store, id, code)),
            ContainerProbe::NotFound => {
                // Removed or never started; no exit code to report.
                let committed = store
                    .compare_and_set_terminal(id, JobStatus::Failed, None)
                    .ok_or_else(|| FoldrunError::JobNotFound(id.to_string()))?;
                return Ok((committed.status, committed.exit_code));
            }
            ContainerProbe::Unknown => {}
        }
    }

    // No durable signal yet: still Queued until launch was confirmed,
    // Running (or Cancelling) afterwards.
    Ok((job.status, None))
}

fn commit_terminal(store: &dyn JobStore, id: &str, code: i32) -> (JobStatus, Option<i32>) {
    let status = if code == 0 {
        JobStatus::Finished
    } else {
        JobStatus::Failed
    };
    match store.compare_and_set_terminal(id, status, Some(code)) {
        Some(committed) => {
            if committed.status == status && committed.exit_code == Some(code) {
                info!(job = id, %status, code, "job reached terminal state");
            }
            (committed.status, committed.exit_code)
        }
        None => (status, Some(code)),
    }
}
