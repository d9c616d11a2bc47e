//! Content-addressed image paths.
//!
//! The id is zero-padded to eight digits and its first three digit pairs
//! become directories: listing `1234567` lives at
//! `root/01/23/45/01234567.jpg`.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use autolot_listing_models::ListingId;
use regex::Regex;

static LEADING_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{8})").expect("valid regex"));

/// Listing id zero-padded to eight digits.
#[must_use]
pub fn padded_id(id: ListingId) -> String {
    format!("{:08}", id.value())
}

/// Directory holding images whose padded id starts with `digits`.
///
/// `digits` must be at least six ASCII digits long.
#[must_use]
pub fn shard_dir(root: &Path, digits: &str) -> PathBuf {
    root.join(&digits[0..2])
        .join(&digits[2..4])
        .join(&digits[4..6])
}

/// Where the image for `id` is stored under `root`.
#[must_use]
pub fn destination_path(root: &Path, id: ListingId) -> PathBuf {
    let padded = padded_id(id);
    shard_dir(root, &padded).join(format!("{padded}.jpg"))
}

/// The eight leading digits of an image file name, if present.
#[must_use]
pub fn id_from_file_name(name: &str) -> Option<&str> {
    LEADING_ID
        .captures(name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_and_shards_short_ids() {
        assert_eq!(
            destination_path(Path::new("pics"), ListingId(1_234_567)),
            Path::new("pics/01/23/45/01234567.jpg")
        );
        assert_eq!(
            destination_path(Path::new("pics"), ListingId(7)),
            Path::new("pics/00/00/00/00000007.jpg")
        );
    }

    #[test]
    fn eight_digit_ids_are_unchanged() {
        assert_eq!(
            destination_path(Path::new("/data/pictures"), ListingId(36_281_654)),
            Path::new("/data/pictures/36/28/16/36281654.jpg")
        );
    }

    #[test]
    fn destination_is_pure() {
        let root = Path::new("r");
        assert_eq!(
            destination_path(root, ListingId(42)),
            destination_path(root, ListingId(42))
        );
    }

    #[test]
    fn extracts_leading_digits() {
        assert_eq!(id_from_file_name("36281654.jpg"), Some("36281654"));
        assert_eq!(id_from_file_name("36281654_crop.png"), Some("36281654"));
        assert_eq!(id_from_file_name("1234567.jpg"), None);
        assert_eq!(id_from_file_name("thumb_36281654.jpg"), None);
    }
}
