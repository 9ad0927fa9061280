//! Backup-guarded atomic file replacement.
//!
//! ## `write_atomic` protocol
//!
//! 1. If the target exists, copy it to `<target>.backup`.
//! 2. Write the new content to `<target>.ccr.tmp` (same directory).
//! 3. Rename the temp file over the target (atomic on POSIX).
//! 4. On success, remove the backup.
//! 5. On failure, remove the temp file, restore the target from the backup
//!    (best-effort) and return the original error.
//!
//! A crash between steps 3 and 4 leaves a stray `.backup`; readers treat it
//! as a recovery artifact, never as state.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// `<target>.backup`
pub fn backup_path(path: &Path) -> PathBuf {
    sibling(path, "backup")
}

/// `<target>.ccr.tmp`
pub fn tmp_path(path: &Path) -> PathBuf {
    sibling(path, "ccr.tmp")
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Replace `path` with `content` using the protocol above.
///
/// The parent directory must already exist.
pub fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    write_atomic_with_tmp(path, content, &tmp_path(path))
}

fn write_atomic_with_tmp(path: &Path, content: &[u8], tmp: &Path) -> io::Result<()> {
    let backup = backup_path(path);
    let had_original = path.exists();
    if had_original {
        fs::copy(path, &backup)?;
    }

    match replace(path, content, tmp) {
        Ok(()) => {
            if had_original {
                if let Err(e) = fs::remove_file(&backup) {
                    tracing::warn!("could not remove backup {}: {e}", backup.display());
                }
            }
            tracing::debug!("wrote: {}", path.display());
            Ok(())
        }
        Err(err) => {
            let _ = fs::remove_file(tmp);
            if had_original {
                restore(path, &backup);
            }
            Err(err)
        }
    }
}

fn replace(path: &Path, content: &[u8], tmp: &Path) -> io::Result<()> {
    fs::write(tmp, content)?;
    // Keep the target's permissions; a fresh temp file gets the umask default.
    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp, meta.permissions())?;
    }
    fs::rename(tmp, path)
}

fn restore(path: &Path, backup: &Path) {
    match fs::copy(backup, path) {
        Ok(_) => {
            let _ = fs::remove_file(backup);
            tracing::warn!("restored {} from backup after a failed write", path.display());
        }
        Err(e) => tracing::error!(
            "failed to restore {} from {}: {e}",
            path.display(),
            backup.display()
        ),
    }
}
