//! Detached process launching with durable completion signaling.
//!
//! The launched command is wrapped in a small shell pipeline that tees
//! combined stdout/stderr, line-buffered, into the job log and then writes
//! the command's exit code to a sentinel file as its very last effect. The
//! wrapper runs in its own process group, so it keeps running if the
//! supervising process goes away; the sentinel file is the only durable
//! completion signal and is what status resolution keys off. Because the
//! wrapping shell captures its own launch failures, a missing binary still
//! produces a sentinel (with a non-zero code) — callers never depend on an
//! exception path.

use std::fs;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use super::job::sentinel_for;
use crate::tools::{sh_quote, CommandLine};

/// Start `cmd` detached, teeing output to `log_file`. Returns the pid of
/// the supervising shell. Creates the log file's parent directory.
pub fn launch(cmd: &CommandLine, log_file: &Path) -> io::Result<u32> {
    if let Some(parent) = log_file.parent() {
        fs::create_dir_all(parent)?;
    }
    let sentinel = sentinel_for(log_file);
    let wrapper = format!(
        "set -o pipefail; ( {} ) 2>&1 | stdbuf -oL -eL tee -a {}; echo $? > {}",
        cmd.shell_string(),
        sh_quote(&log_file.to_string_lossy()),
        sh_quote(&sentinel.to_string_lossy()),
    );
    debug!(wrapper = %wrapper, "launching detached command");

    let child = Command::new("bash")
        .arg("-lc")
        .arg(&wrapper)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()?;
    Ok(child.id())
}

/// Best-effort SIGTERM to a tracked pid. Failure (process already gone,
/// permission) is ignored.
pub fn terminate(pid: u32) {
    let _ = Command::new("kill")
        .arg("-TERM")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

/// Best-effort force removal of a named container. Failure (container gone,
/// runtime missing) is ignored.
pub fn remove_container(name: &str) {
    let _ = Command::new("docker")
        .arg("rm")
        .arg("-f")
        .arg(name)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}
