//! Pipeline configuration.
//!
//! The default configuration is embedded at compile time from
//! `config/default.toml`. An override file is merged over it key by key, so
//! a user file only needs the values it changes:
//!
//! ```toml
//! [download]
//! workers = 8
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Environment variable naming an override configuration file.
pub const CONFIG_ENV: &str = "AUTOLOT_CONFIG";

/// Environment variable overriding [`PathsConfig::data_dir`].
pub const DATA_DIR_ENV: &str = "AUTOLOT_DATA_DIR";

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Read {
        /// Path of the file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Configuration text is not valid TOML or does not fit the schema.
    #[error("Invalid config {origin}: {source}")]
    Parse {
        /// Where the text came from (file path or "embedded default").
        origin: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// A value is out of range.
    #[error("Invalid config value for {key}: {message}")]
    Invalid {
        /// Dotted key, e.g. `download.workers`.
        key: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// File and directory locations.
    pub paths: PathsConfig,
    /// Listing crawler settings.
    pub crawl: CrawlSettings,
    /// Reference catalog fetcher settings.
    pub catalog: CatalogSettings,
    /// Bulk image download settings.
    pub download: DownloadSettings,
}

/// File and directory locations. Relative entries are resolved against
/// `data_dir`.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Root of all pipeline data.
    pub data_dir: PathBuf,
    /// Raw crawled listings.
    pub listings: PathBuf,
    /// Listings annotated with brand, model, and vehicle type.
    pub annotated: PathBuf,
    /// Combined brand catalog.
    pub brands: PathBuf,
    /// Directory of per-brand, per-category model lists.
    pub models_dir: PathBuf,
    /// Content-addressed image tree.
    pub pictures: PathBuf,
    /// Images a classifier accepted.
    pub valid_pictures: PathBuf,
    /// Images a classifier rejected.
    pub invalid_pictures: PathBuf,
}

impl PathsConfig {
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    #[must_use]
    pub fn listings(&self) -> PathBuf {
        self.resolve(&self.listings)
    }

    #[must_use]
    pub fn annotated(&self) -> PathBuf {
        self.resolve(&self.annotated)
    }

    #[must_use]
    pub fn brands(&self) -> PathBuf {
        self.resolve(&self.brands)
    }

    #[must_use]
    pub fn models_dir(&self) -> PathBuf {
        self.resolve(&self.models_dir)
    }

    #[must_use]
    pub fn pictures(&self) -> PathBuf {
        self.resolve(&self.pictures)
    }

    #[must_use]
    pub fn valid_pictures(&self) -> PathBuf {
        self.resolve(&self.valid_pictures)
    }

    #[must_use]
    pub fn invalid_pictures(&self) -> PathBuf {
        self.resolve(&self.invalid_pictures)
    }
}

/// Listing crawler settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlSettings {
    /// First listing page.
    pub start_url: String,
    /// Pause between page requests in milliseconds.
    pub delay_ms: u64,
    /// Stop after this many pages. Unlimited when absent.
    #[serde(default)]
    pub max_pages: Option<u32>,
}

/// Reference catalog fetcher settings.
///
/// URL templates use `{category}` for the numeric category id and
/// `{brand}` for the brand's marketplace value.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSettings {
    pub brands_url: String,
    pub models_url: String,
    /// Pause after each model list download in milliseconds.
    pub delay_ms: u64,
}

impl CatalogSettings {
    /// Expands the brand list URL for a category id.
    #[must_use]
    pub fn brands_url_for(&self, category_id: u32) -> String {
        self.brands_url
            .replace("{category}", &category_id.to_string())
    }

    /// Expands the model list URL for a category id and brand value.
    #[must_use]
    pub fn models_url_for(&self, category_id: u32, brand_value: &str) -> String {
        self.models_url
            .replace("{category}", &category_id.to_string())
            .replace("{brand}", brand_value)
    }
}

/// Bulk image download settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadSettings {
    /// Maximum concurrent downloads.
    pub workers: usize,
    /// Global request budget per rolling second.
    pub requests_per_second: u32,
    /// Suffix substituted first (full-size variant).
    pub primary_suffix: String,
    /// Suffix tried after a server error on the primary variant.
    pub fallback_suffix: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl PipelineConfig {
    /// Loads the embedded default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the embedded file is invalid.
    pub fn embedded() -> Result<Self, ConfigError> {
        let table = parse_table(DEFAULT_CONFIG, "embedded default")?;
        Self::from_table(table, "embedded default")
    }

    /// Loads the configuration: embedded default, then the override file
    /// (`path`, or the file named by [`CONFIG_ENV`]), then [`DATA_DIR_ENV`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the override file cannot be read or
    /// parsed, or a value fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut table = parse_table(DEFAULT_CONFIG, "embedded default")?;

        let override_path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let origin = if let Some(override_path) = override_path {
            let text = std::fs::read_to_string(&override_path).map_err(|source| {
                ConfigError::Read {
                    path: override_path.display().to_string(),
                    source,
                }
            })?;
            let origin = override_path.display().to_string();
            let overlay = parse_table(&text, &origin)?;
            merge_tables(&mut table, overlay);
            log::debug!("Applied config overrides from {origin}");
            origin
        } else {
            "embedded default".to_string()
        };

        let mut config = Self::from_table(table, &origin)?;

        if let Some(data_dir) = std::env::var_os(DATA_DIR_ENV) {
            config.paths.data_dir = PathBuf::from(data_dir);
        }

        config.validate()?;
        Ok(config)
    }

    fn from_table(table: toml::Table, origin: &str) -> Result<Self, ConfigError> {
        toml::Value::Table(table)
            .try_into()
            .map_err(|source| ConfigError::Parse {
                origin: origin.to_string(),
                source,
            })
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for the first value out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.download.workers == 0 {
            return Err(ConfigError::Invalid {
                key: "download.workers",
                message: "must be at least 1".to_string(),
            });
        }
        if self.download.requests_per_second == 0 {
            return Err(ConfigError::Invalid {
                key: "download.requests_per_second",
                message: "must be at least 1".to_string(),
            });
        }
        if self.download.primary_suffix.is_empty() || self.download.fallback_suffix.is_empty() {
            return Err(ConfigError::Invalid {
                key: "download.primary_suffix",
                message: "URL variant suffixes must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_table(text: &str, origin: &str) -> Result<toml::Table, ConfigError> {
    text.parse::<toml::Table>()
        .map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })
}

/// Recursively merges `overlay` into `base`. Nested tables merge; every
/// other value replaces.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_default_is_valid() {
        let config = PipelineConfig::embedded().unwrap();
        config.validate().unwrap();

        assert_eq!(config.download.workers, 20);
        assert_eq!(config.download.requests_per_second, 10);
        assert_eq!(config.paths.listings(), Path::new("data").join("cars.json"));
        assert!(config.crawl.max_pages.is_none());
    }

    #[test]
    fn override_file_replaces_only_given_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.toml");
        std::fs::write(
            &path,
            "[download]\nworkers = 4\n\n[crawl]\nmax_pages = 3\n",
        )
        .unwrap();

        let config = PipelineConfig::load(Some(&path)).unwrap();

        assert_eq!(config.download.workers, 4);
        assert_eq!(config.download.requests_per_second, 10);
        assert_eq!(config.crawl.max_pages, Some(3));
        assert_eq!(config.crawl.delay_ms, 1000);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[download]\nworkers = 0\n").unwrap();

        let err = PipelineConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "download.workers",
                ..
            }
        ));
    }

    #[test]
    fn absolute_paths_are_not_rebased() {
        let mut config = PipelineConfig::embedded().unwrap();
        config.paths.pictures = PathBuf::from("/srv/images");
        assert_eq!(config.paths.pictures(), PathBuf::from("/srv/images"));
    }

    #[test]
    fn url_templates_expand() {
        let config = PipelineConfig::embedded().unwrap();
        let url = config.catalog.models_url_for(7, "2270");
        assert!(url.contains("/categories/7/marks/2270/models"));
        assert!(config.catalog.brands_url_for(1).contains("/categories/1/brands"));
    }
}
