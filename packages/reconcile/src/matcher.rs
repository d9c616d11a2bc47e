//! Title matching heuristic.
//!
//! Brand: the first catalog brand whose lowercased name equals the title's
//! first word, or appears in the lowercased title followed by a space.
//! Model: within the brand's model lists, the model sharing the most words
//! with the title. Both are approximations; transliterations and shared
//! words can produce false matches.

use std::collections::HashSet;

use autolot_catalog_models::{Brand, BrandCatalog, ModelCatalog, VehicleModel};
use autolot_listing_models::VehicleCategory;

/// Result of matching one title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitleMatch<'a> {
    /// Matched brand.
    pub brand: Option<&'a Brand>,
    /// Matched model. Only set when `brand` is.
    pub model: Option<&'a VehicleModel>,
    /// Category of the list `model` came from.
    pub category: Option<VehicleCategory>,
}

/// Finds the first brand in catalog order that matches `title`.
#[must_use]
pub fn match_brand<'a>(title: &str, brands: &'a BrandCatalog) -> Option<&'a Brand> {
    let lowered = title.to_lowercase();
    let first_word = lowered.split_whitespace().next();

    brands.iter().find(|brand| {
        let name = brand.name.to_lowercase();
        first_word == Some(name.as_str()) || lowered.contains(&format!("{name} "))
    })
}

/// Picks the model sharing the most words with `title_words`.
///
/// Ties keep the earlier model. Returns `None` if no model shares a word.
#[must_use]
pub fn match_model<'a>(
    title_words: &HashSet<String>,
    models: &'a [VehicleModel],
) -> Option<&'a VehicleModel> {
    let mut best = None;
    let mut best_overlap = 0;

    for model in models {
        let overlap = word_set(&model.name)
            .iter()
            .filter(|word| title_words.contains(*word))
            .count();
        if overlap > best_overlap {
            best_overlap = overlap;
            best = Some(model);
        }
    }

    best
}

/// Matches a title against the catalog.
///
/// Model lists are searched in [`VehicleCategory::ALL`] order and the
/// search stops at the first category with a match.
#[must_use]
pub fn match_title<'a>(
    title: &str,
    brands: &'a BrandCatalog,
    models: &'a ModelCatalog,
) -> TitleMatch<'a> {
    let Some(brand) = match_brand(title, brands) else {
        return TitleMatch {
            brand: None,
            model: None,
            category: None,
        };
    };

    let title_words = word_set(title);

    for &category in VehicleCategory::ALL {
        if !brand.has_category(category) {
            continue;
        }
        let Some(list) = models.models(&brand.name, category) else {
            continue;
        };
        if let Some(model) = match_model(&title_words, list) {
            return TitleMatch {
                brand: Some(brand),
                model: Some(model),
                category: Some(category),
            };
        }
    }

    TitleMatch {
        brand: Some(brand),
        model: None,
        category: None,
    }
}

/// Lowercased, whitespace-separated words of `text`.
fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brands(names: &[(&str, &[VehicleCategory])]) -> BrandCatalog {
        let mut catalog = BrandCatalog::new();
        for (i, (name, categories)) in names.iter().enumerate() {
            catalog.insert(name, i.into(), categories);
        }
        catalog
    }

    fn models(names: &[&str]) -> Vec<VehicleModel> {
        names.iter().map(|n| VehicleModel::named(n)).collect()
    }

    #[test]
    fn brand_matches_first_word_case_insensitively() {
        let catalog = brands(&[("Toyota", &[VehicleCategory::PassengerCar])]);
        assert_eq!(
            match_brand("TOYOTA Camry 2015", &catalog).map(|b| b.name.as_str()),
            Some("Toyota")
        );
        assert_eq!(
            match_brand("toyota", &catalog).map(|b| b.name.as_str()),
            Some("Toyota")
        );
    }

    #[test]
    fn brand_matches_followed_by_space_anywhere() {
        let catalog = brands(&[("Land Rover", &[VehicleCategory::PassengerCar])]);
        assert!(match_brand("Продам Land Rover Discovery", &catalog).is_some());
        // At the very end there is no trailing space and it is not the first word.
        assert!(match_brand("Продам Land Rover", &catalog).is_none());
    }

    #[test]
    fn catalog_order_decides_between_matching_brands() {
        let first = brands(&[
            ("Mercedes-Benz", &[VehicleCategory::PassengerCar]),
            ("Benz", &[VehicleCategory::PassengerCar]),
        ]);
        let second = brands(&[
            ("Benz", &[VehicleCategory::PassengerCar]),
            ("Mercedes-Benz", &[VehicleCategory::PassengerCar]),
        ]);
        let title = "Mercedes-Benz Sprinter 316 benz ";

        assert_eq!(match_brand(title, &first).unwrap().name, "Mercedes-Benz");
        assert_eq!(match_brand(title, &second).unwrap().name, "Benz");
        for _ in 0..10 {
            assert_eq!(match_brand(title, &first).unwrap().name, "Mercedes-Benz");
        }
    }

    #[test]
    fn largest_overlap_wins() {
        let list = models(&["Camry", "Camry LE"]);
        let words = word_set("camry le");
        assert_eq!(match_model(&words, &list).unwrap().name, "Camry LE");
    }

    #[test]
    fn ties_keep_first_model() {
        let list = models(&["Camry Hybrid", "Camry LE"]);
        let words = word_set("Toyota Camry 2015");
        assert_eq!(match_model(&words, &list).unwrap().name, "Camry Hybrid");
    }

    #[test]
    fn no_shared_words_means_no_model() {
        let list = models(&["Corolla", "RAV4"]);
        assert!(match_model(&word_set("Toyota Camry"), &list).is_none());
        assert!(match_model(&word_set("Toyota Camry"), &[]).is_none());
    }

    #[test]
    fn matches_brand_and_model() {
        let catalog = brands(&[("Toyota", &[VehicleCategory::PassengerCar])]);
        let mut lists = ModelCatalog::new();
        lists.insert(
            "Toyota",
            VehicleCategory::PassengerCar,
            models(&["Corolla", "Camry"]),
        );

        let found = match_title("Toyota Camry 2015", &catalog, &lists);

        assert_eq!(found.brand.unwrap().name, "Toyota");
        assert_eq!(found.model.unwrap().name, "Camry");
        assert_eq!(found.category, Some(VehicleCategory::PassengerCar));
    }

    #[test]
    fn falls_through_to_bus_models() {
        let catalog = brands(&[(
            "Mercedes-Benz",
            &[VehicleCategory::PassengerCar, VehicleCategory::Bus],
        )]);
        let mut lists = ModelCatalog::new();
        lists.insert(
            "Mercedes-Benz",
            VehicleCategory::PassengerCar,
            models(&["E 220", "Vito"]),
        );
        lists.insert(
            "Mercedes-Benz",
            VehicleCategory::Bus,
            models(&["Sprinter 313", "Sprinter 516"]),
        );

        let found = match_title("Mercedes-Benz Sprinter 516 2012", &catalog, &lists);

        assert_eq!(found.model.unwrap().name, "Sprinter 516");
        assert_eq!(found.category, Some(VehicleCategory::Bus));
    }

    #[test]
    fn passenger_car_list_wins_when_both_match() {
        let catalog = brands(&[(
            "Volkswagen",
            &[VehicleCategory::PassengerCar, VehicleCategory::Bus],
        )]);
        let mut lists = ModelCatalog::new();
        lists.insert(
            "Volkswagen",
            VehicleCategory::PassengerCar,
            models(&["Transporter"]),
        );
        lists.insert(
            "Volkswagen",
            VehicleCategory::Bus,
            models(&["Transporter T5 Kombi"]),
        );

        let found = match_title("Volkswagen Transporter T5 Kombi", &catalog, &lists);

        assert_eq!(found.category, Some(VehicleCategory::PassengerCar));
        assert_eq!(found.model.unwrap().name, "Transporter");
    }

    #[test]
    fn unknown_brand_matches_nothing() {
        let catalog = brands(&[("Toyota", &[VehicleCategory::PassengerCar])]);
        let models = ModelCatalog::new();
        let found = match_title("Mystery Brand X", &catalog, &models);
        assert!(found.brand.is_none());
        assert!(found.model.is_none());
        assert!(found.category.is_none());
    }
}
