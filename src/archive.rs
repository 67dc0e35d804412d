//! Output-tree packaging.
//!
//! A finished job's output directory is delivered as a gzip-compressed tar
//! whose single top-level entry is the directory's name. `Lite` mode drops
//! three families of large, regenerable intermediates: alignment working
//! directories (`msas`), per-model result files (`result_model_*`) and
//! serialized checkpoints (`*.pkl`). Compression goes through a `pigz`
//! subprocess when the binary is present and falls back to in-process gzip
//! otherwise; both produce a standard gzip stream, so callers cannot tell
//! which path ran. Archives are built only once a job is terminal, so the
//! tree is effectively read-only while it is walked.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{FoldrunError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveMode {
    Full,
    Lite,
}

impl ArchiveMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ArchiveMode::Full => "full",
            ArchiveMode::Lite => "lite",
        }
    }

    /// File-name suffix distinguishing the buffered artifacts.
    pub fn suffix(self) -> &'static str {
        match self {
            ArchiveMode::Full => "",
            ArchiveMode::Lite => "-lite",
        }
    }
}

impl FromStr for ArchiveMode {
    type Err = FoldrunError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "full" => Ok(ArchiveMode::Full),
            "lite" => Ok(ArchiveMode::Lite),
            other => Err(FoldrunError::Validation(format!(
                "unknown archive mode: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compressor {
    Pigz,
    Flate2,
}

fn pigz_available() -> bool {
    Command::new("pigz")
        .arg("-V")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

// The three excluded path families of lite mode, matched against the path
// relative to the output directory.
fn lite_excluded(rel: &Path) -> bool {
    if rel.components().any(|c| c.as_os_str() == "msas") {
        return true;
    }
    let name = rel
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    name.starts_with("result_model_") || name.ends_with(".pkl")
}

/// Write an uncompressed tar of `output_dir` to `writer`, rooted at the
/// directory's own name.
fn write_tar<W: Write>(output_dir: &Path, mode: ArchiveMode, writer: W) -> Result<W> {
    let root = output_dir
        .file_name()
        .map(|n| PathBuf::from(n))
        .ok_or_else(|| FoldrunError::Archive("output directory has no name".into()))?;

    let mut builder = tar::Builder::new(writer);
    builder.follow_symlinks(false);
    builder.append_dir(&root, output_dir)?;

    let mut walker = WalkDir::new(output_dir).min_depth(1).sort_by_file_name().into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(output_dir)
            .map_err(|e| FoldrunError::Archive(e.to_string()))?
            .to_path_buf();
        if mode == ArchiveMode::Lite && lite_excluded(&rel) {
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }
        let arc = root.join(&rel);
        if entry.file_type().is_dir() {
            builder.append_dir(&arc, entry.path())?;
        } else if entry.file_type().is_file() {
            builder.append_path_with_name(entry.path(), &arc)?;
        }
        // Symlinks and special files are skipped.
    }
    let writer = builder
        .into_inner()
        .map_err(|e| FoldrunError::Archive(e.to_string()))?;
    Ok(writer)
}

fn stream_with<W: Write>(
    output_dir: &Path,
    mode: ArchiveMode,
    compressor: Compressor,
    mut writer: W,
) -> Result<()> {
    if !output_dir.is_dir() {
        return Err(FoldrunError::OutputMissing(output_dir.to_path_buf()));
    }
    match compressor {
        Compressor::Flate2 => {
            let encoder = GzEncoder::new(writer, Compression::fast());
            let encoder = write_tar(output_dir, mode, encoder)?;
            encoder
                .finish()
                .map_err(|e| FoldrunError::Archive(e.to_string()))?;
            Ok(())
        }
        Compressor::Pigz => {
            let mut child = Command::new("pigz")
                .arg("-1")
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|e| FoldrunError::Archive(format!("pigz unavailable: {e}")))?;

            let stdin = child.stdin.take().expect("pigz stdin piped");
            let mut stdout = child.stdout.take().expect("pigz stdout piped");

            let dir = output_dir.to_path_buf();
            let feeder = std::thread::spawn(move || write_tar(&dir, mode, stdin).map(drop));

            io::copy(&mut stdout, &mut writer)?;
            let fed = feeder
                .join()
                .map_err(|_| FoldrunError::Archive("tar writer panicked".into()))?;
            let status = child.wait()?;
            fed?;
            if !status.success() {
                return Err(FoldrunError::Archive(format!(
                    "pigz exited with {status}"
                )));
            }
            Ok(())
        }
    }
}

/// Stream a compressed archive of `output_dir` into `writer` without
/// materializing it on disk.
pub fn stream<W: Write>(output_dir: &Path, mode: ArchiveMode, writer: W) -> Result<()> {
    let compressor = if pigz_available() {
        Compressor::Pigz
    } else {
        Compressor::Flate2
    };
    debug!(dir = %output_dir.display(), mode = mode.as_str(), ?compressor, "streaming archive");
    stream_with(output_dir, mode, compressor, writer)
}

/// Build the buffered artifact `<name><suffix>.tgz` next to `output_dir`
/// and return its path. The archive is written to a scratch name first and
/// renamed into place so a failed build never leaves a truncated artifact
/// behind.
pub fn build_buffered(output_dir: &Path, mode: ArchiveMode) -> Result<PathBuf> {
    let name = output_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| FoldrunError::Archive("output directory has no name".into()))?;
    let parent = output_dir
        .parent()
        .ok_or_else(|| FoldrunError::Archive("output directory has no parent".into()))?;
    let dest = parent.join(format!("{name}{}.tgz", mode.suffix()));
    let scratch = parent.join(format!("{name}{}.tgz.partial", mode.suffix()));

    let file = fs::File::create(&scratch)?;
    match stream(output_dir, mode, file) {
        Ok(()) => {
            fs::rename(&scratch, &dest)?;
            Ok(dest)
        }
        Err(e) => {
            let _ = fs::remove_file(&scratch);
            Err(e)
        }
    }
}
