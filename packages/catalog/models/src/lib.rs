#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Brand and model reference catalog types.
//!
//! The brand catalog is an *ordered* sequence: the first brand that matches
//! a title wins, so iteration order must be reproducible across runs. On
//! disk it is a JSON object keyed by display name; [`BrandCatalog`] keeps the
//! key order of that object instead of collecting it into a hash map.

use std::collections::BTreeMap;
use std::fmt;

use autolot_listing_models::VehicleCategory;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A vehicle brand from the reference catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Brand {
    /// Display name (e.g. "Toyota", "Land Rover").
    pub name: String,
    /// Opaque marketplace identifier.
    pub value: serde_json::Value,
    /// Categories this brand has model lists for, in first-seen order.
    pub categories: Vec<VehicleCategory>,
}

impl Brand {
    /// Returns `true` if the brand has a model list for `category`.
    #[must_use]
    pub fn has_category(&self, category: VehicleCategory) -> bool {
        self.categories.contains(&category)
    }
}

/// On-disk value of one brand entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BrandEntry {
    value: serde_json::Value,
    #[serde(default)]
    categories: Vec<VehicleCategory>,
}

/// Ordered brand catalog with case-insensitive name lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrandCatalog {
    brands: Vec<Brand>,
}

impl BrandCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub const fn new() -> Self {
        Self { brands: Vec::new() }
    }

    /// Adds a brand, or extends the categories of an existing brand with
    /// the same case-insensitive name.
    ///
    /// The first-seen display name and value are kept.
    pub fn insert(&mut self, name: &str, value: serde_json::Value, categories: &[VehicleCategory]) {
        let lower = name.to_lowercase();
        let index = if let Some(i) = self
            .brands
            .iter()
            .position(|b| b.name.to_lowercase() == lower)
        {
            i
        } else {
            self.brands.push(Brand {
                name: name.to_string(),
                value,
                categories: Vec::with_capacity(categories.len()),
            });
            self.brands.len() - 1
        };

        let brand = &mut self.brands[index];
        for category in categories {
            if !brand.categories.contains(category) {
                brand.categories.push(*category);
            }
        }
    }

    /// Looks up a brand by name, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Brand> {
        let lower = name.to_lowercase();
        self.brands.iter().find(|b| b.name.to_lowercase() == lower)
    }

    /// Iterates brands in catalog order.
    pub fn iter(&self) -> std::slice::Iter<'_, Brand> {
        self.brands.iter()
    }

    /// Number of brands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.brands.len()
    }

    /// Returns `true` if the catalog has no brands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.brands.is_empty()
    }
}

impl<'a> IntoIterator for &'a BrandCatalog {
    type Item = &'a Brand;
    type IntoIter = std::slice::Iter<'a, Brand>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Serialize for BrandCatalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.brands.len()))?;
        for brand in &self.brands {
            map.serialize_entry(
                &brand.name,
                &BrandEntry {
                    value: brand.value.clone(),
                    categories: brand.categories.clone(),
                },
            )?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for BrandCatalog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CatalogVisitor;

        impl<'de> Visitor<'de> for CatalogVisitor {
            type Value = BrandCatalog;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of brand name to {value, categories}")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut catalog = BrandCatalog::new();
                while let Some((name, entry)) = access.next_entry::<String, BrandEntry>()? {
                    catalog.insert(&name, entry.value, &entry.categories);
                }
                Ok(catalog)
            }
        }

        deserializer.deserialize_map(CatalogVisitor)
    }
}

/// One model entry from a per-brand, per-category model list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleModel {
    /// Model display name (e.g. "Camry", "Land Cruiser Prado").
    pub name: String,
    /// Remaining fields of the reference entry (`value`, `count`, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl VehicleModel {
    /// Creates a model entry with no extra fields.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Model lists keyed by (lowercased brand name, category).
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    lists: BTreeMap<(String, VehicleCategory), Vec<VehicleModel>>,
}

impl ModelCatalog {
    /// Creates an empty model catalog.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lists: BTreeMap::new(),
        }
    }

    /// Stores the model list for `brand` in `category`, replacing any
    /// previous list.
    pub fn insert(&mut self, brand: &str, category: VehicleCategory, models: Vec<VehicleModel>) {
        self.lists.insert((brand.to_lowercase(), category), models);
    }

    /// Returns the model list for `brand` in `category`, if one was loaded.
    #[must_use]
    pub fn models(&self, brand: &str, category: VehicleCategory) -> Option<&[VehicleModel]> {
        self.lists
            .get(&(brand.to_lowercase(), category))
            .map(Vec::as_slice)
    }

    /// Number of (brand, category) lists loaded.
    #[must_use]
    pub fn list_count(&self) -> usize {
        self.lists.len()
    }

    /// Total number of models across all lists.
    #[must_use]
    pub fn model_count(&self) -> usize {
        self.lists.values().map(Vec::len).sum()
    }
}
