//! Turns listing records into download tasks.

use std::collections::{BTreeMap, HashSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use autolot_listing_models::{ListingId, ListingRecord};

use crate::DownloadError;
use crate::paths::destination_path;

/// One image to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub id: ListingId,
    /// Image URL as found in the record, before variant substitution.
    pub url: String,
    pub destination: PathBuf,
}

/// Tasks left to run plus the records that were filtered out.
#[derive(Debug, Default)]
pub struct DownloadPlan {
    pub tasks: Vec<DownloadTask>,
    /// Records whose image is already on disk.
    pub existing: u64,
    /// Records without a usable id. Includes records also missing a URL.
    pub no_id: u64,
    /// Records with an id but no image URL.
    pub no_url: u64,
}

/// Plans the downloads for `records` into the tree at `root`.
///
/// Each distinct destination directory is listed once; a directory that
/// does not exist yet counts as empty.
///
/// # Errors
///
/// Returns [`DownloadError::Io`] if a destination directory exists but
/// cannot be listed.
pub fn plan_downloads(records: &[ListingRecord], root: &Path) -> Result<DownloadPlan, DownloadError> {
    let mut plan = DownloadPlan::default();
    let mut candidates = Vec::with_capacity(records.len());

    for record in records {
        let Some(id) = record.id else {
            plan.no_id += 1;
            continue;
        };
        let Some(url) = record.image_url_text() else {
            plan.no_url += 1;
            continue;
        };
        candidates.push(DownloadTask {
            id,
            url: url.to_string(),
            destination: destination_path(root, id),
        });
    }

    let mut listings: BTreeMap<PathBuf, HashSet<OsString>> = BTreeMap::new();
    for task in &candidates {
        let Some(dir) = task.destination.parent() else {
            continue;
        };
        if !listings.contains_key(dir) {
            listings.insert(dir.to_path_buf(), list_dir(dir)?);
        }
    }

    for task in candidates {
        let on_disk = match (task.destination.parent(), task.destination.file_name()) {
            (Some(dir), Some(name)) => listings.get(dir).is_some_and(|names| names.contains(name)),
            _ => false,
        };
        if on_disk {
            plan.existing += 1;
        } else {
            plan.tasks.push(task);
        }
    }

    log::info!(
        "Planned {} download(s): {} already on disk, {} without id, {} without image URL ({} directories checked)",
        plan.tasks.len(),
        plan.existing,
        plan.no_id,
        plan.no_url,
        listings.len()
    );

    Ok(plan)
}

fn list_dir(dir: &Path) -> Result<HashSet<OsString>, DownloadError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(DownloadError::io(dir, e)),
    };

    entries
        .map(|entry| {
            entry
                .map(|e| e.file_name())
                .map_err(|e| DownloadError::io(dir, e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: Option<u64>, url: Option<&str>) -> ListingRecord {
        ListingRecord {
            id: id.map(ListingId),
            image_url: url.map(str::to_string),
            ..ListingRecord::default()
        }
    }

    #[test]
    fn missing_fields_are_counted_not_planned() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            record(None, Some("https://cdn/a__1bx.jpg")),
            record(Some(1), None),
            record(Some(2), Some("")),
            record(None, None),
            record(Some(3), Some("https://cdn/c__3bx.jpg")),
        ];

        let plan = plan_downloads(&records, dir.path()).unwrap();

        assert_eq!(plan.no_id, 2);
        assert_eq!(plan.no_url, 2);
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.tasks[0].id, ListingId(3));
        assert_eq!(
            plan.tasks[0].destination,
            dir.path().join("00/00/00/00000003.jpg")
        );
    }

    #[test]
    fn existing_images_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let existing = destination_path(dir.path(), ListingId(36_281_654));
        std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
        std::fs::write(&existing, b"jpeg").unwrap();

        let records = vec![
            record(Some(36_281_654), Some("https://cdn/x__1bx.jpg")),
            record(Some(36_281_655), Some("https://cdn/y__2bx.jpg")),
        ];
        let plan = plan_downloads(&records, dir.path()).unwrap();

        assert_eq!(plan.existing, 1);
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.tasks[0].id, ListingId(36_281_655));
    }

    #[test]
    fn replanning_after_completion_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let records: Vec<_> = (1..=25)
            .map(|i| record(Some(i * 1_000), Some("https://cdn/z__1bx.jpg")))
            .collect();

        let first = plan_downloads(&records, dir.path()).unwrap();
        assert_eq!(first.tasks.len(), 25);
        for task in &first.tasks {
            std::fs::create_dir_all(task.destination.parent().unwrap()).unwrap();
            std::fs::write(&task.destination, b"jpeg").unwrap();
        }

        let second = plan_downloads(&records, dir.path()).unwrap();
        assert!(second.tasks.is_empty());
        assert_eq!(second.existing, 25);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_aborts_the_plan() {
        let dir = tempfile::tempdir().unwrap();
        // A file where a shard directory should be makes read_dir fail
        // with something other than NotFound.
        std::fs::create_dir_all(dir.path().join("00/00")).unwrap();
        std::fs::write(dir.path().join("00/00/00"), b"not a directory").unwrap();

        let records = vec![record(Some(1), Some("https://cdn/a__1bx.jpg"))];
        let err = plan_downloads(&records, dir.path()).unwrap_err();
        assert!(matches!(err, DownloadError::Io { .. }));
    }
}
