//! Loads the reference catalog from the data directory.

use std::path::Path;
use std::sync::LazyLock;

use autolot_catalog_models::{BrandCatalog, ModelCatalog, VehicleModel};
use autolot_listing_models::VehicleCategory;
use autolot_source::records::read_json;
use regex::Regex;

use crate::CatalogError;

static RESERVED_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("valid regex"));

/// Turns a brand name into a file-system safe stem.
///
/// Lowercases, replaces spaces and the characters `<>:"/\|?*` with `_`,
/// trims leading and trailing dots and spaces, and falls back to
/// `"unnamed"` when nothing is left.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let lowered = name.to_lowercase().replace(' ', "_");
    let replaced = RESERVED_CHARS.replace_all(&lowered, "_");
    let trimmed = replaced.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// File name of the model list for `brand` in `category`.
#[must_use]
pub fn model_file_name(brand: &str, category: VehicleCategory) -> String {
    format!("{}_{category}_models.json", sanitize_filename(brand))
}

/// Loads the combined brand catalog, keeping its key order.
///
/// # Errors
///
/// Returns [`CatalogError`] if the file is missing or malformed.
pub fn load_brand_catalog(path: &Path) -> Result<BrandCatalog, CatalogError> {
    let catalog: BrandCatalog = read_json(path)?;
    log::info!("Loaded {} brand(s) from {}", catalog.len(), path.display());
    Ok(catalog)
}

/// Loads the model lists for every (brand, category) pair in `brands`.
///
/// Categories are visited in [`VehicleCategory::ALL`] order. A missing
/// file means the brand has no models in that category and is skipped.
///
/// # Errors
///
/// Returns [`CatalogError::ModelList`] if a model list exists but cannot
/// be read or decoded.
pub fn load_model_catalog(dir: &Path, brands: &BrandCatalog) -> Result<ModelCatalog, CatalogError> {
    let mut catalog = ModelCatalog::new();

    for brand in brands {
        for &category in VehicleCategory::ALL {
            if !brand.has_category(category) {
                continue;
            }

            let path = dir.join(model_file_name(&brand.name, category));
            if !path.is_file() {
                log::debug!(
                    "No {category} model list for {} ({})",
                    brand.name,
                    path.display()
                );
                continue;
            }

            let models: Vec<VehicleModel> =
                read_json(&path).map_err(|source| CatalogError::ModelList {
                    path: path.display().to_string(),
                    source,
                })?;
            catalog.insert(&brand.name, category, models);
        }
    }

    log::info!(
        "Loaded {} model(s) across {} list(s) from {}",
        catalog.model_count(),
        catalog.list_count(),
        dir.display()
    );
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_brand_names() {
        assert_eq!(sanitize_filename("Land Rover"), "land_rover");
        assert_eq!(sanitize_filename("Mercedes-Benz"), "mercedes-benz");
        assert_eq!(sanitize_filename("AC/DC: Motors?"), "ac_dc__motors_");
        assert_eq!(sanitize_filename(".Hidden."), "hidden");
        assert_eq!(sanitize_filename(" . "), "_._");
        assert_eq!(sanitize_filename("ЗАЗ"), "заз");
    }

    #[test]
    fn names_with_nothing_left_fall_back_to_unnamed() {
        assert_eq!(sanitize_filename(".."), "unnamed");
        assert_eq!(sanitize_filename(""), "unnamed");
        assert_eq!(sanitize_filename("..."), "unnamed");
    }

    #[test]
    fn model_file_names_include_category() {
        assert_eq!(
            model_file_name("Land Rover", VehicleCategory::PassengerCar),
            "land_rover_passenger_car_models.json"
        );
        assert_eq!(model_file_name("MAN", VehicleCategory::Bus), "man_bus_models.json");
    }

    #[test]
    fn loads_lists_for_declared_categories_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("toyota_passenger_car_models.json"),
            r#"[{"name": "Camry", "value": 698}, {"name": "Land Cruiser Prado"}]"#,
        )
        .unwrap();
        // Present on disk, but Toyota is not tagged as a bus brand.
        std::fs::write(
            dir.path().join("toyota_bus_models.json"),
            r#"[{"name": "Coaster"}]"#,
        )
        .unwrap();

        let mut brands = BrandCatalog::new();
        brands.insert("Toyota", 79.into(), &[VehicleCategory::PassengerCar]);
        brands.insert("Bogdan", 7.into(), &[VehicleCategory::Bus]);

        let models = load_model_catalog(dir.path(), &brands).unwrap();

        assert_eq!(models.list_count(), 1);
        assert_eq!(
            models
                .models("Toyota", VehicleCategory::PassengerCar)
                .unwrap()
                .len(),
            2
        );
        assert!(models.models("Toyota", VehicleCategory::Bus).is_none());
        assert!(models.models("Bogdan", VehicleCategory::Bus).is_none());
    }

    #[test]
    fn malformed_model_list_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("audi_passenger_car_models.json"), "{not json").unwrap();

        let mut brands = BrandCatalog::new();
        brands.insert("Audi", 6.into(), &[VehicleCategory::PassengerCar]);

        let err = load_model_catalog(dir.path(), &brands).unwrap_err();
        assert!(matches!(err, CatalogError::ModelList { .. }));
    }

    #[test]
    fn brand_catalog_keeps_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("car_brands.json");
        std::fs::write(
            &path,
            r#"{"Zaz": {"value": 89, "categories": ["passenger_car"]},
                "Audi": {"value": 6, "categories": ["passenger_car"]}}"#,
        )
        .unwrap();

        let catalog = load_brand_catalog(&path).unwrap();
        let names: Vec<&str> = catalog.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["Zaz", "Audi"]);
    }
}
