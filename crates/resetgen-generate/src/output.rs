use std::fs::{OpenOptions, create_dir_all};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Write `data` to `path` through a temporary sibling file and a rename.
pub fn write_script_atomic(path: &Path, data: &str) -> io::Result<()> {
    if let Some(parent) = non_empty_parent(path) {
        create_dir_all(parent)?;
    }

    let tmp_path = sibling_path(path, "tmp")?;
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&tmp_path)?;
    file.write_all(data.as_bytes())?;
    file.sync_all()?;

    std::fs::rename(&tmp_path, path)
}

/// Move a script that failed verification out of the way.
///
/// Returns the new location, `<file>.failed`.
pub fn mark_failed(path: &Path) -> io::Result<PathBuf> {
    let failed_path = sibling_path(path, "failed")?;
    std::fs::rename(path, &failed_path)?;
    Ok(failed_path)
}

/// Best-effort removal of an unverified script from `path`.
///
/// Tries [`mark_failed`] first and deletes the file if the rename fails.
/// Returns where the script ended up, if anywhere.
pub fn discard_unverified(path: &Path) -> Option<PathBuf> {
    match mark_failed(path) {
        Ok(failed_path) => {
            tracing::warn!(event = "unverified_script_moved", path = %failed_path.display());
            Some(failed_path)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => None,
        Err(err) => {
            tracing::warn!(event = "unverified_script_move_failed", path = %path.display(), error = %err);
            if let Err(err) = std::fs::remove_file(path) {
                tracing::error!(event = "unverified_script_kept", path = %path.display(), error = %err);
            }
            None
        }
    }
}

fn sibling_path(path: &Path, suffix: &str) -> io::Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid script path: {}", path.display()),
        )
    })?;
    Ok(path.with_file_name(format!("{}.{suffix}", file_name.to_string_lossy())))
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|parent| !parent.as_os_str().is_empty())
}
