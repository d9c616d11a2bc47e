//! Moves classified images back into the content-addressed tree.
//!
//! A classification pass sorts images into "valid" and "invalid" trees.
//! Restoring moves every image whose name starts with an eight-digit id
//! back to `root/XX/YY/ZZ/<name>` and removes the directories left empty.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::DownloadError;
use crate::paths::{id_from_file_name, shard_dir};

/// Counts from one restore run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RestoreSummary {
    /// Files moved back.
    pub moved: u64,
    /// Files that could not be moved or had no id in their name.
    pub errors: u64,
    /// Empty directories removed afterwards.
    pub removed_dirs: u64,
}

/// Moves all images under `sources` back into `root`, then prunes empty
/// directories under every source and under `root`.
///
/// Missing source directories are skipped.
///
/// # Errors
///
/// Returns [`DownloadError::Io`] if a source directory exists but cannot
/// be listed.
pub fn restore_sorted_images(sources: &[PathBuf], root: &Path) -> Result<RestoreSummary, DownloadError> {
    let mut summary = RestoreSummary::default();

    for source in sources {
        if !source.is_dir() {
            log::warn!("Directory does not exist: {}", source.display());
            continue;
        }

        let mut files = Vec::new();
        collect_files(source, &mut files)?;
        log::info!("Moving {} file(s) from {}", files.len(), source.display());

        for file in files {
            match move_back(&file, root) {
                Ok(target) => {
                    log::debug!("Moved {} to {}", file.display(), target.display());
                    summary.moved += 1;
                }
                Err(message) => {
                    log::error!("Error moving {}: {message}", file.display());
                    summary.errors += 1;
                }
            }
        }
    }

    for dir in sources.iter().map(PathBuf::as_path).chain(std::iter::once(root)) {
        if dir.is_dir() {
            summary.removed_dirs += remove_empty_dirs(dir);
        }
    }

    log::info!(
        "Restore complete. Moved {} file(s). Encountered {} error(s).",
        summary.moved,
        summary.errors
    );
    Ok(summary)
}

fn move_back(file: &Path, root: &Path) -> Result<PathBuf, String> {
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| "file name is not valid UTF-8".to_string())?;
    let digits = id_from_file_name(name)
        .ok_or_else(|| format!("Unable to extract 8-digit ID from filename: {name}"))?;

    let dir = shard_dir(root, digits);
    std::fs::create_dir_all(&dir).map_err(|e| format!("create {}: {e}", dir.display()))?;

    let target = dir.join(name);
    move_file(file, &target, |from, to| std::fs::rename(from, to))
        .map_err(|e| format!("move to {}: {e}", target.display()))?;
    Ok(target)
}

/// Renames `from` to `to`, copying and then removing the source when the
/// two are on different file systems.
fn move_file(
    from: &Path,
    to: &Path,
    rename: impl FnOnce(&Path, &Path) -> std::io::Result<()>,
) -> std::io::Result<()> {
    match rename(from, to) {
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
            log::debug!("{} is on another device, copying", from.display());
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)
        }
        result => result,
    }
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), DownloadError> {
    let entries = std::fs::read_dir(dir).map_err(|e| DownloadError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| DownloadError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| DownloadError::io(&path, e))?;
        if file_type.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

/// Removes empty directories below `dir`, deepest first. `dir` itself is
/// kept. Returns how many were removed.
pub fn remove_empty_dirs(dir: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !entry.file_type().is_ok_and(|t| t.is_dir()) {
            continue;
        }
        removed += remove_empty_dirs(&path);
        let is_empty = std::fs::read_dir(&path).is_ok_and(|mut it| it.next().is_none());
        if is_empty {
            match std::fs::remove_dir(&path) {
                Ok(()) => {
                    log::debug!("Removed empty directory: {}", path.display());
                    removed += 1;
                }
                Err(e) => log::warn!("Could not remove {}: {e}", path.display()),
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"jpeg").unwrap();
    }

    #[test]
    fn moves_sorted_images_back_and_prunes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("pictures");
        let valid = dir.path().join("valid_pictures");
        let invalid = dir.path().join("invalid_pictures");

        touch(&valid.join("car/36281654.jpg"));
        touch(&invalid.join("01234567.jpg"));
        touch(&invalid.join("nested/deeper/notes.txt"));
        std::fs::create_dir_all(root.join("99/99/99")).unwrap();

        let summary =
            restore_sorted_images(&[valid.clone(), invalid.clone()], &root).unwrap();

        assert_eq!(summary.moved, 2);
        assert_eq!(summary.errors, 1);
        assert!(root.join("36/28/16/36281654.jpg").is_file());
        assert!(root.join("01/23/45/01234567.jpg").is_file());
        assert!(!valid.join("car").exists());
        assert!(invalid.join("nested/deeper/notes.txt").is_file());
        assert!(!root.join("99").exists());
        assert!(valid.is_dir(), "source roots are kept");
    }

    #[test]
    fn cross_device_moves_copy_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("valid/36281654.jpg");
        let to = dir.path().join("36281654.jpg");
        touch(&from);

        move_file(&from, &to, |_, _| {
            Err(std::io::Error::from(std::io::ErrorKind::CrossesDevices))
        })
        .unwrap();

        assert_eq!(std::fs::read(&to).unwrap(), b"jpeg");
        assert!(!from.exists());
    }

    #[test]
    fn other_move_errors_keep_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("36281654.jpg");
        let to = dir.path().join("out/36281654.jpg");
        touch(&from);

        let result = move_file(&from, &to, |_, _| {
            Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied))
        });

        assert_eq!(
            result.unwrap_err().kind(),
            std::io::ErrorKind::PermissionDenied
        );
        assert!(from.is_file());
        assert!(!to.exists());
    }

    #[test]
    fn missing_sources_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("pictures");

        let summary = restore_sorted_images(&[dir.path().join("nope")], &root).unwrap();

        assert_eq!(summary, RestoreSummary::default());
    }
}
