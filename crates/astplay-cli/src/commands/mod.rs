pub mod locate;
pub mod resolve;
pub mod run;
pub mod tree;
pub mod version;
pub mod watch;

use miette::{IntoDiagnostic, Result, WrapErr};
use std::path::{Path, PathBuf};

/// Resolve `path` against the working directory.
pub fn resolve_path(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Read a source or transform file relative to the working directory.
pub fn read_source(cwd: &Path, path: &Path) -> Result<String> {
    let full = resolve_path(cwd, path);
    std::fs::read_to_string(&full)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", full.display()))
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{json}");
    Ok(())
}
