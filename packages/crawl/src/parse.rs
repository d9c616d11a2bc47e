//! Listing page parsing.

use std::sync::LazyLock;

use autolot_listing_models::{ListingId, ListingRecord};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::CrawlError;

static ID_FROM_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_(\d+)\.html$").expect("valid regex"));

const MILEAGE_UNIT: &str = " тис. км";
const GENERATION_SEPARATOR: &str = " • ";

/// Records found on one listing page plus the link to the next page.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub records: Vec<ListingRecord>,
    /// Absolute URL of the next page, if the page links one.
    pub next_page: Option<String>,
}

/// Compiled selectors for the marketplace's listing markup.
pub struct ListingParser {
    card: Selector,
    address: Selector,
    title: Selector,
    price: Selector,
    mileage: Selector,
    location: Selector,
    list_item: Selector,
    generation: Selector,
    image: Selector,
    next_page: Selector,
}

impl ListingParser {
    /// Compiles the selectors.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Selector`] if a selector does not parse.
    pub fn new() -> Result<Self, CrawlError> {
        Ok(Self {
            card: parse_selector("div.content-bar")?,
            address: parse_selector("a.address")?,
            title: parse_selector("span.blue.bold")?,
            price: parse_selector("span.bold.size22.green")?,
            mileage: parse_selector("li.item-char.js-race")?,
            location: parse_selector("li.js-location")?,
            list_item: parse_selector("li")?,
            generation: parse_selector("div.generation")?,
            image: parse_selector("picture img")?,
            next_page: parse_selector("a.page-link.js-next")?,
        })
    }

    /// Extracts every listing card on `html`. Relative links are resolved
    /// against `page_url`.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::InvalidUrl`] if `page_url` is not a valid URL.
    pub fn parse(&self, html: &str, page_url: &str) -> Result<ListingPage, CrawlError> {
        let base = reqwest::Url::parse(page_url).map_err(|e| CrawlError::InvalidUrl {
            url: page_url.to_string(),
            message: e.to_string(),
        })?;
        let document = Html::parse_document(html);

        let records = document
            .select(&self.card)
            .map(|card| self.parse_card(card, &base))
            .collect();

        let next_page = document
            .select(&self.next_page)
            .find_map(|a| a.value().attr("href"))
            .and_then(|href| resolve(&base, href));

        Ok(ListingPage { records, next_page })
    }

    fn parse_card(&self, card: ElementRef<'_>, base: &reqwest::Url) -> ListingRecord {
        let url = card
            .select(&self.address)
            .find_map(|a| a.value().attr("href"))
            .map(|href| resolve(base, href).unwrap_or_else(|| href.to_string()));
        let id = url.as_deref().and_then(id_from_url);

        let title = first_text(card, &self.title);
        let price = first_text(card, &self.price)
            .map(|p| p.chars().filter(|c| !c.is_whitespace()).collect());
        let mileage = first_text(card, &self.mileage)
            .map(|m| m.replace(MILEAGE_UNIT, "").trim().to_string());
        let location = card
            .select(&self.location)
            .next()
            .and_then(text_after_location_icon);

        let (fuel_type, engine_volume) = self
            .item_with_icon(card, &["icon-fuel", "icon-battery"])
            .map_or((None, None), |fuel| split_fuel(&fuel));
        let gearbox = self.item_with_icon(card, &["icon-akp", "icon-transmission"]);

        let (generation, engine_powertrain, trim) = card
            .select(&self.generation)
            .next()
            .map_or((None, None, None), |el| split_generation(&joined_text(el)));

        let image_url = card
            .select(&self.image)
            .find_map(|img| img.value().attr("src"))
            .map(str::to_string);

        log::trace!("Parsed card {id:?}: fuel={fuel_type:?} volume={engine_volume:?}");

        ListingRecord {
            id,
            url,
            title,
            price,
            location,
            mileage,
            generation,
            engine_powertrain,
            trim,
            fuel_type,
            engine_volume,
            gearbox,
            image_url,
            ..ListingRecord::default()
        }
    }

    /// Text of the first `li` that has a direct `i` child carrying one of
    /// `icons` as a class.
    fn item_with_icon(&self, card: ElementRef<'_>, icons: &[&str]) -> Option<String> {
        card.select(&self.list_item)
            .filter(|li| {
                li.children().filter_map(ElementRef::wrap).any(|child| {
                    child.value().name() == "i"
                        && child.value().classes().any(|class| icons.contains(&class))
                })
            })
            .find_map(own_text)
    }
}

/// First non-blank text directly inside the first element matching
/// `selector`.
fn first_text(card: ElementRef<'_>, selector: &Selector) -> Option<String> {
    card.select(selector).next().and_then(own_text)
}

fn parse_selector(selector: &str) -> Result<Selector, CrawlError> {
    Selector::parse(selector)
        .map_err(|e| CrawlError::Selector(format!("invalid CSS selector '{selector}': {e}")))
}

fn resolve(base: &reqwest::Url, href: &str) -> Option<String> {
    base.join(href).ok().map(String::from)
}

/// Listing id from a URL ending in `_<digits>.html`.
fn id_from_url(url: &str) -> Option<ListingId> {
    ID_FROM_URL
        .captures(url)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// First non-blank text node that is a direct child of `el`, trimmed.
fn own_text(el: ElementRef<'_>) -> Option<String> {
    el.children()
        .filter_map(|node| node.value().as_text())
        .map(|text| text.trim())
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

/// All descendant text nodes of `el`, trimmed and joined with spaces.
fn joined_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// The first non-blank text node following the `i.icon-location` child.
fn text_after_location_icon(li: ElementRef<'_>) -> Option<String> {
    li.children()
        .skip_while(|node| {
            !ElementRef::wrap(*node).is_some_and(|el| {
                el.value().name() == "i" && el.value().classes().any(|c| c == "icon-location")
            })
        })
        .skip(1)
        .filter_map(|node| node.value().as_text())
        .map(|text| text.trim())
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

/// `"Бензин, 2.5 л"` becomes fuel type and engine volume; text without a
/// comma is only a fuel type.
fn split_fuel(text: &str) -> (Option<String>, Option<String>) {
    match text.split_once(',') {
        Some((fuel, rest)) => {
            let volume = rest.split(',').next().unwrap_or_default().trim();
            (
                Some(fuel.trim().to_string()),
                (!volume.is_empty()).then(|| volume.to_string()),
            )
        }
        None => (Some(text.to_string()), None),
    }
}

/// Splits `"XV50 • 2.5 AT • Comfort"` into generation, powertrain, trim.
fn split_generation(text: &str) -> (Option<String>, Option<String>, Option<String>) {
    if text.is_empty() {
        return (None, None, None);
    }
    let parts: Vec<&str> = text.split(GENERATION_SEPARATOR).collect();
    let generation = parts.first().map(|p| (*p).to_string());
    let trim = if parts.len() > 1 {
        parts.last().map(|p| (*p).to_string())
    } else {
        None
    };
    let powertrain = if parts.len() > 2 {
        Some(parts[1..parts.len() - 1].join(GENERATION_SEPARATOR))
    } else {
        None
    };
    (generation, powertrain, trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_URL: &str = "https://auto.ria.com/car/used/";

    fn parse_fixture(html: &str) -> ListingPage {
        ListingParser::new().unwrap().parse(html, PAGE_URL).unwrap()
    }

    #[test]
    fn extracts_complete_card() {
        let page = parse_fixture(include_str!("../fixtures/listing_page.html"));
        let camry = &page.records[0];

        assert_eq!(camry.id, Some(ListingId(36_281_654)));
        assert_eq!(
            camry.url.as_deref(),
            Some("https://auto.ria.com/uk/auto_toyota_camry_36281654.html")
        );
        assert_eq!(camry.title.as_deref(), Some("Toyota Camry"));
        assert_eq!(camry.price.as_deref(), Some("14500"));
        assert_eq!(camry.mileage.as_deref(), Some("186"));
        assert_eq!(camry.location.as_deref(), Some("Київ"));
        assert_eq!(camry.fuel_type.as_deref(), Some("Бензин"));
        assert_eq!(camry.engine_volume.as_deref(), Some("2.5 л"));
        assert_eq!(camry.gearbox.as_deref(), Some("Автомат"));
        assert_eq!(camry.generation.as_deref(), Some("XV50"));
        assert_eq!(camry.engine_powertrain.as_deref(), Some("2.5 AT (181 к.с.)"));
        assert_eq!(camry.trim.as_deref(), Some("Comfort"));
        assert_eq!(
            camry.image_url.as_deref(),
            Some("https://cdn0.riastatic.com/photosnew/auto/photo/toyota_camry__512345678bx.jpg")
        );
    }

    #[test]
    fn electric_card_has_no_engine_volume() {
        let page = parse_fixture(include_str!("../fixtures/listing_page.html"));
        let tesla = &page.records[1];

        assert_eq!(tesla.id, Some(ListingId(35_999_001)));
        assert_eq!(
            tesla.url.as_deref(),
            Some("https://auto.ria.com/uk/auto_tesla_model_3_35999001.html")
        );
        assert_eq!(tesla.fuel_type.as_deref(), Some("Електро"));
        assert_eq!(tesla.engine_volume, None);
        assert_eq!(tesla.gearbox.as_deref(), Some("Автомат"));
        assert_eq!(tesla.location.as_deref(), Some("Львів"));
        assert_eq!(tesla.generation.as_deref(), Some("Long Range"));
        assert_eq!(tesla.trim, None);
    }

    #[test]
    fn sparse_card_leaves_fields_empty() {
        let page = parse_fixture(include_str!("../fixtures/listing_page.html"));
        let bus = &page.records[2];

        assert_eq!(page.records.len(), 3);
        assert_eq!(bus.title.as_deref(), Some("Богдан A092"));
        assert_eq!(bus.generation.as_deref(), Some("I"));
        assert_eq!(bus.engine_powertrain, None);
        assert_eq!(bus.trim.as_deref(), Some("Trim Line"));
        assert_eq!(bus.location, None);
        assert_eq!(bus.fuel_type, None);
        assert_eq!(bus.image_url, None);
    }

    #[test]
    fn follows_next_link() {
        let page = parse_fixture(include_str!("../fixtures/listing_page.html"));
        assert_eq!(
            page.next_page.as_deref(),
            Some("https://auto.ria.com/car/used/?page=2")
        );

        let last = parse_fixture(include_str!("../fixtures/last_page.html"));
        assert_eq!(last.records.len(), 1);
        assert_eq!(last.next_page, None);
    }

    #[test]
    fn splits_generation_parts() {
        assert_eq!(
            split_generation("A • B • C • D"),
            (
                Some("A".to_string()),
                Some("B • C".to_string()),
                Some("D".to_string())
            )
        );
        assert_eq!(split_generation(""), (None, None, None));
    }

    #[test]
    fn splits_fuel_on_first_comma() {
        assert_eq!(
            split_fuel("Дизель, 3 л, турбо"),
            (Some("Дизель".to_string()), Some("3 л".to_string()))
        );
        assert_eq!(split_fuel("Газ"), (Some("Газ".to_string()), None));
    }

    #[test]
    fn id_requires_html_suffix() {
        assert_eq!(
            id_from_url("https://auto.ria.com/uk/auto_audi_a4_123.html"),
            Some(ListingId(123))
        );
        assert_eq!(id_from_url("https://auto.ria.com/uk/auto_audi_a4"), None);
    }
}
