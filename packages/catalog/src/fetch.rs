//! Downloads the brand and model reference lists.
//!
//! Every file that already exists on disk is reused, so an interrupted
//! fetch resumes where it stopped. A failed download is logged and skipped;
//! only writing the combined brand catalog can fail the whole run.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use autolot_catalog_models::BrandCatalog;
use autolot_listing_models::VehicleCategory;
use autolot_source::SourceError;
use autolot_source::config::{CatalogSettings, PathsConfig};
use autolot_source::progress::ProgressCallback;
use autolot_source::records::{read_json, write_json};
use autolot_source::retry;
use serde::Deserialize;

use crate::CatalogError;
use crate::loader::model_file_name;

/// Counts from one catalog fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Brand lists downloaded.
    pub brand_lists_downloaded: u64,
    /// Model lists downloaded.
    pub model_lists_downloaded: u64,
    /// Brand or model lists already on disk.
    pub reused: u64,
    /// Brand or model lists that could not be downloaded.
    pub failed: u64,
    /// Brands in the combined catalog.
    pub brands: u64,
}

/// One entry of a marketplace brand list. Other fields are ignored.
#[derive(Debug, Deserialize)]
struct RawBrand {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: Option<serde_json::Value>,
}

/// Fetches all reference lists and writes the combined brand catalog to
/// [`PathsConfig::brands`].
///
/// # Errors
///
/// Returns [`CatalogError`] if the combined catalog cannot be written.
pub async fn fetch_catalog(
    client: &reqwest::Client,
    settings: &CatalogSettings,
    paths: &PathsConfig,
    progress: Arc<dyn ProgressCallback>,
) -> Result<FetchSummary, CatalogError> {
    let models_dir = paths.models_dir();
    let mut summary = FetchSummary::default();
    let mut catalog = BrandCatalog::new();

    for &category in VehicleCategory::ALL {
        let brands_path = paths.data_dir.join(format!("{category}_brands.json"));
        let url = settings.brands_url_for(category.api_id());

        let Some(raw) = load_or_download(client, &url, &brands_path, &mut summary).await else {
            log::warn!("Skipping {category}: no brand list");
            continue;
        };
        summary.brand_lists_downloaded += u64::from(raw.downloaded);

        let brands: Vec<RawBrand> = match serde_json::from_value(raw.value) {
            Ok(brands) => brands,
            Err(e) => {
                log::error!("Brand list {} is not an array: {e}", brands_path.display());
                summary.failed += 1;
                continue;
            }
        };

        progress.set_message(format!("{category} models"));
        progress.set_total(brands.len() as u64);
        progress.set_position(0);

        for brand in brands {
            progress.inc(1);
            let Some((name, value)) = usable_brand(brand) else {
                continue;
            };

            catalog.insert(&name, value.clone(), &[category]);

            let models_path = models_dir.join(model_file_name(&name, category));
            if models_path.is_file() {
                log::debug!("Reusing {}", models_path.display());
                summary.reused += 1;
                continue;
            }

            let url = settings.models_url_for(category.api_id(), &value_text(&value));
            match download(client, &url, &models_path).await {
                Ok(()) => summary.model_lists_downloaded += 1,
                Err(e) => {
                    log::error!("Failed to fetch models for {name} ({category}): {e}");
                    summary.failed += 1;
                }
            }
            tokio::time::sleep(Duration::from_millis(settings.delay_ms)).await;
        }
    }

    progress.finish(format!("{} brand(s)", catalog.len()));

    let brands_path = paths.brands();
    write_json(&brands_path, &catalog)?;
    summary.brands = catalog.len() as u64;
    log::info!(
        "Combined brand catalog ({} brands) saved to {}",
        catalog.len(),
        brands_path.display()
    );

    Ok(summary)
}

struct RawList {
    value: serde_json::Value,
    downloaded: bool,
}

/// Reads `path` when it exists, otherwise downloads `url` into it.
async fn load_or_download(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
    summary: &mut FetchSummary,
) -> Option<RawList> {
    if path.is_file() {
        log::info!("Using existing file: {}", path.display());
        return match read_json(path) {
            Ok(value) => {
                summary.reused += 1;
                Some(RawList {
                    value,
                    downloaded: false,
                })
            }
            Err(e) => {
                log::error!("Failed to read {}: {e}", path.display());
                summary.failed += 1;
                None
            }
        };
    }

    match fetch_json(client, url, path).await {
        Ok(value) => Some(RawList {
            value,
            downloaded: true,
        }),
        Err(e) => {
            log::error!("Error downloading {url}: {e}");
            summary.failed += 1;
            None
        }
    }
}

async fn download(client: &reqwest::Client, url: &str, path: &Path) -> Result<(), SourceError> {
    fetch_json(client, url, path).await.map(|_| ())
}

async fn fetch_json(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
) -> Result<serde_json::Value, SourceError> {
    let value: serde_json::Value = retry::send_json(|| client.get(url)).await?;
    write_json(path, &value)?;
    log::info!("Downloaded and saved: {}", path.display());
    Ok(value)
}

/// Keeps brands that have a non-empty name and a non-empty value.
fn usable_brand(brand: RawBrand) -> Option<(String, serde_json::Value)> {
    let name = brand.name.filter(|n| !n.trim().is_empty())?;
    let value = brand.value.filter(|v| match v {
        serde_json::Value::Null => false,
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Number(n) => n.as_f64() != Some(0.0),
        _ => true,
    })?;
    Some((name, value))
}

/// Renders a brand value for use in a URL path.
fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use autolot_source::config::PipelineConfig;
    use autolot_source::progress::null_progress;

    use super::*;

    #[test]
    fn brands_without_name_or_value_are_skipped() {
        let raw: Vec<RawBrand> = serde_json::from_str(
            r#"[
                {"name": "Audi", "value": 6, "count": 1200},
                {"name": "", "value": 7},
                {"name": "Ghost", "value": 0},
                {"value": 9},
                {"name": "Tesla", "value": "tesla"}
            ]"#,
        )
        .unwrap();

        let kept: Vec<String> = raw
            .into_iter()
            .filter_map(usable_brand)
            .map(|(name, _)| name)
            .collect();
        assert_eq!(kept, ["Audi", "Tesla"]);
    }

    #[test]
    fn values_render_without_quotes() {
        assert_eq!(value_text(&serde_json::json!(48)), "48");
        assert_eq!(value_text(&serde_json::json!("tesla")), "tesla");
    }

    #[tokio::test]
    async fn existing_files_are_reused_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::embedded().unwrap();
        config.paths.data_dir = dir.path().to_path_buf();
        // Unroutable, so any request would fail the test via `failed`.
        config.catalog.brands_url = "http://127.0.0.1:9/{category}".to_string();
        config.catalog.models_url = "http://127.0.0.1:9/{category}/{brand}".to_string();
        config.catalog.delay_ms = 0;

        let models_dir = config.paths.models_dir();
        std::fs::create_dir_all(&models_dir).unwrap();
        std::fs::write(
            dir.path().join("passenger_car_brands.json"),
            r#"[{"name": "Volvo", "value": 85}, {"name": "Audi", "value": 6}]"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("bus_brands.json"),
            r#"[{"name": "Volvo", "value": 85}]"#,
        )
        .unwrap();
        for file in [
            "volvo_passenger_car_models.json",
            "audi_passenger_car_models.json",
            "volvo_bus_models.json",
        ] {
            std::fs::write(models_dir.join(file), "[]").unwrap();
        }

        let client = reqwest::Client::new();
        let summary = fetch_catalog(&client, &config.catalog, &config.paths, null_progress())
            .await
            .unwrap();

        assert_eq!(summary.failed, 0);
        assert_eq!(summary.reused, 5);
        assert_eq!(summary.brands, 2);

        let catalog: BrandCatalog = read_json(&config.paths.brands()).unwrap();
        let volvo = catalog.get("Volvo").unwrap();
        assert_eq!(
            volvo.categories,
            vec![VehicleCategory::PassengerCar, VehicleCategory::Bus]
        );
        let names: Vec<&str> = catalog.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["Volvo", "Audi"]);
    }
}
