//! Flat JSON file I/O for listing records and reference data.
//!
//! Files are written through a temporary sibling and renamed into place, so
//! an interrupted run never leaves a half-written listing file behind.

use std::io::{BufReader, BufWriter, Write as _};
use std::path::Path;

use autolot_listing_models::ListingRecord;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::SourceError;

/// Reads and decodes a JSON file.
///
/// # Errors
///
/// Returns [`SourceError::Io`] if the file cannot be opened and
/// [`SourceError::Json`] if it is not valid JSON for `T`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, SourceError> {
    let file = std::fs::File::open(path).map_err(|e| SourceError::io(path, e))?;
    let value = serde_json::from_reader(BufReader::new(file))?;
    Ok(value)
}

/// Writes `value` as pretty-printed JSON, replacing `path` atomically.
///
/// Parent directories are created as needed.
///
/// # Errors
///
/// Returns [`SourceError`] if the directory, temporary file, or rename
/// fails, or if serialization fails.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), SourceError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| SourceError::io(parent, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| SourceError::io(parent, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush().map_err(|e| SourceError::io(path, e))?;
    }
    tmp.persist(path)
        .map_err(|e| SourceError::io(path, e.error))?;
    Ok(())
}

/// Loads listing records from a JSON array file.
///
/// # Errors
///
/// Returns [`SourceError`] if the file is missing or malformed.
pub fn load_listings(path: &Path) -> Result<Vec<ListingRecord>, SourceError> {
    let records: Vec<ListingRecord> = read_json(path)?;
    log::info!("Loaded {} listing(s) from {}", records.len(), path.display());
    Ok(records)
}

/// Saves listing records as a JSON array file.
///
/// # Errors
///
/// Returns [`SourceError`] if the file cannot be written.
pub fn save_listings(path: &Path, records: &[ListingRecord]) -> Result<(), SourceError> {
    write_json(path, records)?;
    log::info!("Saved {} listing(s) to {}", records.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use autolot_listing_models::ListingId;

    use super::*;

    #[test]
    fn listings_survive_a_save_load_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cars.json");

        let records = vec![ListingRecord {
            id: Some(ListingId(36_281_654)),
            title: Some("Škoda Octavia A7 2017".to_string()),
            image_url: Some("https://cdn.example.com/skoda__1234bx.jpg".to_string()),
            ..ListingRecord::default()
        }];

        save_listings(&path, &records).unwrap();
        let loaded = load_listings(&path).unwrap();

        assert_eq!(loaded, records);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("Škoda"), "non-ASCII text is written unescaped");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cars.json");
        std::fs::write(&path, "[{\"ID\": 1,").unwrap();

        assert!(matches!(load_listings(&path), Err(SourceError::Json(_))));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_listings(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
