//! Small filesystem helpers shared by the supervisor.

use std::fs;
use std::path::Path;

use crate::error::Result;

/// Strip an uploaded file name down to a safe subset: alphanumerics plus
/// `-`, `_`, `.` and `+`. Anything else (path separators included) is
/// dropped.
pub fn safe_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '+'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Create a directory and all parents, ignoring the already-exists case.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

/// Return the last `n` lines of a file, or an empty string if it does not
/// exist yet. `n` is clamped to at least one line.
pub fn tail_lines(path: &Path, n: usize) -> Result<String> {
    if !path.exists() {
        return Ok(String::new());
    }
    let n = n.max(1);
    let contents = fs::read_to_string(path)?;
    let lines: Vec<&str> = contents.lines().collect();
    let start = lines.len().saturating_sub(n);
    Ok(lines[start..].join("\n"))
}
