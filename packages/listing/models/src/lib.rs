#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Listing record types shared across the autolot pipeline.
//!
//! A [`ListingRecord`] is one scraped vehicle advertisement. The crawler
//! creates it, the reconciliation pass attaches brand/model/vehicle-type
//! annotations, and the download planner derives an image path from its
//! [`ListingId`].
//!
//! Annotations are modelled with [`Resolved`] so that "no match found" is an
//! explicit variant. The `"Unknown"` sentinel string only exists at the JSON
//! boundary.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Literal written to JSON output for an unresolved annotation.
pub const UNKNOWN: &str = "Unknown";

/// Externally assigned numeric listing identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(pub u64);

impl ListingId {
    /// Returns the raw numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ListingId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl FromStr for ListingId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Vehicle category a brand or model belongs to.
///
/// Declaration order is the preference order used when searching a brand's
/// model lists.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VehicleCategory {
    /// Passenger cars (marketplace category 1).
    PassengerCar,
    /// Buses (marketplace category 7).
    Bus,
}

impl VehicleCategory {
    /// All categories in match preference order.
    pub const ALL: &[Self] = &[Self::PassengerCar, Self::Bus];

    /// Returns the marketplace's numeric id for this category.
    #[must_use]
    pub const fn api_id(self) -> u32 {
        match self {
            Self::PassengerCar => 1,
            Self::Bus => 7,
        }
    }
}

/// Outcome of a reconciliation lookup.
///
/// Serializes `Known(v)` as `v` and `Unknown` as the literal [`UNKNOWN`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resolved<T> {
    /// A catalog entry matched.
    Known(T),
    /// No catalog entry matched.
    Unknown,
}

impl<T> Resolved<T> {
    /// Returns `true` for [`Resolved::Known`].
    #[must_use]
    pub const fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Returns the resolved value, if any.
    #[must_use]
    pub const fn as_known(&self) -> Option<&T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Unknown => None,
        }
    }
}

impl<T> From<Option<T>> for Resolved<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Unknown, Self::Known)
    }
}

impl<T: Serialize> Serialize for Resolved<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Known(value) => value.serialize(serializer),
            Self::Unknown => serializer.serialize_str(UNKNOWN),
        }
    }
}

impl<'de, T> Deserialize<'de> for Resolved<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == UNKNOWN {
            return Ok(Self::Unknown);
        }
        raw.parse().map(Self::Known).map_err(de::Error::custom)
    }
}

/// A scraped vehicle advertisement.
///
/// Field names follow the JSON produced by the crawler. Keys this struct
/// does not know about are kept in [`ListingRecord::extra`] and written back
/// unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    /// Marketplace listing id. `None` when absent or not numeric.
    #[serde(rename = "ID", default, deserialize_with = "deserialize_listing_id")]
    pub id: Option<ListingId>,
    /// Listing page URL.
    #[serde(rename = "URL", default)]
    pub url: Option<String>,
    /// Free-text advertisement title (e.g. "Toyota Camry 2015").
    #[serde(rename = "Title", default)]
    pub title: Option<String>,
    /// Asking price as displayed, with spaces removed.
    #[serde(rename = "Price", default)]
    pub price: Option<String>,
    /// Seller location.
    #[serde(rename = "Location", default)]
    pub location: Option<String>,
    /// Mileage in thousands of kilometres.
    #[serde(rename = "Mileage", default)]
    pub mileage: Option<String>,
    /// Model generation label.
    #[serde(rename = "Generation", default)]
    pub generation: Option<String>,
    /// Engine / powertrain descriptor.
    #[serde(rename = "EnginePowertrain", default)]
    pub engine_powertrain: Option<String>,
    /// Trim level.
    #[serde(rename = "Trim", default)]
    pub trim: Option<String>,
    /// Fuel type (e.g. "Бензин", "Електро").
    #[serde(rename = "FuelType", default)]
    pub fuel_type: Option<String>,
    /// Engine displacement as displayed.
    #[serde(rename = "EngineVolume", default)]
    pub engine_volume: Option<String>,
    /// Gearbox type.
    #[serde(rename = "Gearbox", default)]
    pub gearbox: Option<String>,
    /// Thumbnail image URL.
    #[serde(rename = "ImageURL", default)]
    pub image_url: Option<String>,
    /// Matched brand. Absent until reconciliation runs.
    #[serde(rename = "Brand", default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<Resolved<String>>,
    /// Matched model. Absent until reconciliation runs.
    #[serde(rename = "Model", default, skip_serializing_if = "Option::is_none")]
    pub model: Option<Resolved<String>>,
    /// Category of the matched model. Absent until reconciliation runs.
    #[serde(
        rename = "VehicleType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub vehicle_type: Option<Resolved<VehicleCategory>>,
    /// Any other fields present in the input.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ListingRecord {
    /// Returns the title when present and non-empty.
    #[must_use]
    pub fn title_text(&self) -> Option<&str> {
        self.title.as_deref().filter(|t| !t.is_empty())
    }

    /// Returns the image URL when present and non-empty.
    #[must_use]
    pub fn image_url_text(&self) -> Option<&str> {
        self.image_url.as_deref().filter(|u| !u.is_empty())
    }

    /// Attaches reconciliation results to this record.
    pub fn annotate(
        &mut self,
        brand: Resolved<String>,
        model: Resolved<String>,
        vehicle_type: Resolved<VehicleCategory>,
    ) {
        self.brand = Some(brand);
        self.model = Some(model);
        self.vehicle_type = Some(vehicle_type);
    }
}

/// Accepts a JSON number, a numeric string, or `null`.
///
/// Values that are not a non-negative integer are treated as missing so that
/// one malformed record is counted as `no_id` instead of failing the whole
/// file.
fn deserialize_listing_id<'de, D>(deserializer: D) -> Result<Option<ListingId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().map(ListingId),
        Some(serde_json::Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}
