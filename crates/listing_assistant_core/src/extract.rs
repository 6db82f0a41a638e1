//! crates/listing_assistant_core/src/extract.rs
//!
//! Pattern-based extraction of preference and filter fields from free text.
//!
//! This is keyword and regex matching, not language understanding. Every rule
//! is first-match-wins: there is no scoring and no disambiguation. Known effects:
//!
//! - "townhouse" contains "house", and since the house keyword comes first in the
//!   table, it resolves to `House`.
//! - Any `<num>-<num>` pair reads as a budget, so "2-3 bedroom places" yields a
//!   budget of {2, 3} next to the bedroom count and the price ceiling empties the grid.
//! - Amenity keywords are substrings: "competitive" contains "pet" and sets the
//!   pet-friendly flag. In open chat such an utterance counts as a filter request
//!   and never reaches the completion endpoint.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::domain::{AmenityFlags, BudgetRange, FilterCriteria, PropertyType};

static BUDGET_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\$?\s*(\d[\d,]*(?:\.\d+)?)\s*([km])?\s*(?:-|\bto\b)\s*\$?\s*(\d[\d,]*(?:\.\d+)?)\s*([km])?\b",
    )
    .expect("valid budget range regex")
});

static BUDGET_MAX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:maximum|max|under|less than|up to|\$)\s*\$?\s*(\d[\d,]*(?:\.\d+)?)\s*([km])?")
        .expect("valid budget ceiling regex")
});

static BEDROOMS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)[\s-]*(?:bedrooms?|beds?|br|bd)\b").expect("valid bedroom regex")
});

static BATHROOMS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)[\s-]*(?:bathrooms?|baths?|ba)\b").expect("valid bathroom regex")
});

static TOKEN_SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i),|\s+and\s+").expect("valid separator regex"));

/// Ordered keyword table for the property category.
const PROPERTY_TYPE_KEYWORDS: &[(&str, PropertyType)] = &[
    ("house", PropertyType::House),
    ("apartment", PropertyType::Apartment),
    ("apt", PropertyType::Apartment),
    ("condo", PropertyType::Condo),
    ("townhouse", PropertyType::Townhouse),
];

//=========================================================================================
// Field Extractors
//=========================================================================================

pub fn extract_property_type(text: &str) -> Option<PropertyType> {
    let lowered = text.to_lowercase();
    PROPERTY_TYPE_KEYWORDS
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, kind)| *kind)
}

/// Reads a budget such as `$300k-500k`, `$1.2m to $1.5m` or `under 700k`.
///
/// A range bound without a unit borrows the other bound's unit, and a reversed
/// range is put in order. Returns `None` when neither pattern matches; the caller
/// decides whether to re-prompt.
pub fn extract_budget(text: &str) -> Option<BudgetRange> {
    if let Some(caps) = BUDGET_RANGE_RE.captures(text) {
        let low_unit = caps.get(2).map(|unit| unit.as_str());
        let high_unit = caps.get(4).map(|unit| unit.as_str());
        let (low_unit, high_unit) = match (low_unit, high_unit) {
            (None, None) if text.contains(['k', 'K']) => (Some("k"), Some("k")),
            (low, high) => (low.or(high), high.or(low)),
        };
        let first = scale(parse_amount(&caps[1])?, low_unit);
        let second = scale(parse_amount(&caps[3])?, high_unit);
        let (min, max) = if first <= second { (first, second) } else { (second, first) };
        return Some(BudgetRange::new(min, max));
    }

    let caps = BUDGET_MAX_RE.captures(text)?;
    let value = parse_amount(&caps[1])?;
    Some(BudgetRange::new(0, scale(value, caps.get(2).map(|unit| unit.as_str()))))
}

fn scale(value: f64, unit: Option<&str>) -> u64 {
    let factor = match unit {
        Some(unit) if unit.eq_ignore_ascii_case("k") => 1_000.0,
        Some(unit) if unit.eq_ignore_ascii_case("m") => 1_000_000.0,
        _ => 1.0,
    };
    (value * factor).round() as u64
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok()
}

/// Splits on commas or the word "and", trimming and discarding empty pieces.
pub fn split_tokens(text: &str) -> Vec<String> {
    TOKEN_SEPARATOR_RE
        .split(text)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn split_locations(text: &str) -> Vec<String> {
    split_tokens(text)
}

/// Lower-cased amenity tokens plus the boolean flags implied by well-known keywords.
pub fn extract_amenities(text: &str) -> (Vec<String>, AmenityFlags) {
    let tokens = split_tokens(text)
        .into_iter()
        .map(|token| token.to_lowercase())
        .collect();
    (tokens, amenity_flags(text))
}

pub fn amenity_flags(text: &str) -> AmenityFlags {
    let lowered = text.to_lowercase();
    AmenityFlags {
        is_pet_friendly: lowered.contains("pet"),
        has_pool: lowered.contains("pool"),
        has_garden: lowered.contains("garden") || lowered.contains("yard"),
        has_parking: lowered.contains("parking") || lowered.contains("garage"),
        ..AmenityFlags::default()
    }
}

pub fn extract_bedrooms(text: &str) -> Option<u32> {
    first_count(&BEDROOMS_RE, text)
}

pub fn extract_bathrooms(text: &str) -> Option<u32> {
    first_count(&BATHROOMS_RE, text)
}

fn first_count(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text).and_then(|caps| caps[1].parse().ok())
}

//=========================================================================================
// Rule Table
//=========================================================================================

/// Fields pulled out of a single utterance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    pub property_type: Option<PropertyType>,
    pub budget: Option<BudgetRange>,
    pub location: Option<String>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub amenity_flags: AmenityFlags,
}

impl ExtractedFields {
    pub fn is_empty(&self) -> bool {
        *self == ExtractedFields::default()
    }

    pub fn to_criteria(&self) -> FilterCriteria {
        FilterCriteria {
            location: self.location.clone(),
            min_price: self.budget.map(|b| b.min).filter(|min| *min > 0),
            max_price: self.budget.map(|b| b.max),
            min_bedrooms: self.bedrooms,
            min_bathrooms: self.bathrooms.map(|n| n as f32),
            property_type: self.property_type,
            amenities: self.amenity_flags,
            ..FilterCriteria::default()
        }
    }
}

type RuleFn = Box<dyn Fn(&str, &mut ExtractedFields) -> bool + Send + Sync>;

/// One entry of the rule table: a named pattern and the field setter it drives.
pub struct ExtractionRule {
    name: &'static str,
    apply: RuleFn,
}

impl ExtractionRule {
    pub fn new<F>(name: &'static str, apply: F) -> Self
    where
        F: Fn(&str, &mut ExtractedFields) -> bool + Send + Sync + 'static,
    {
        Self {
            name,
            apply: Box::new(apply),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Runs the rule, returning whether it set a field.
    pub fn apply(&self, text: &str, fields: &mut ExtractedFields) -> bool {
        (self.apply)(text, fields)
    }
}

/// Runs an ordered rule table over an utterance.
pub struct Extractor {
    rules: Vec<ExtractionRule>,
}

impl Extractor {
    /// The default table: category, budget, bedrooms, bathrooms, amenity flags.
    pub fn new() -> Self {
        let rules = vec![
            ExtractionRule::new("property_type", |text, fields| {
                fields.property_type = extract_property_type(text);
                fields.property_type.is_some()
            }),
            ExtractionRule::new("budget", |text, fields| {
                fields.budget = extract_budget(text);
                fields.budget.is_some()
            }),
            ExtractionRule::new("bedrooms", |text, fields| {
                fields.bedrooms = extract_bedrooms(text);
                fields.bedrooms.is_some()
            }),
            ExtractionRule::new("bathrooms", |text, fields| {
                fields.bathrooms = extract_bathrooms(text);
                fields.bathrooms.is_some()
            }),
            ExtractionRule::new("amenities", |text, fields| {
                fields.amenity_flags = amenity_flags(text);
                !fields.amenity_flags.is_empty()
            }),
        ];
        Self { rules }
    }

    /// The default table plus a rule recognising any of `locations` (first listed wins).
    pub fn with_known_locations(locations: Vec<String>) -> Self {
        Self::new().push_rule(ExtractionRule::new("location", move |text, fields| {
            let lowered = text.to_lowercase();
            fields.location = locations
                .iter()
                .find(|location| lowered.contains(&location.to_lowercase()))
                .cloned();
            fields.location.is_some()
        }))
    }

    pub fn push_rule(mut self, rule: ExtractionRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(ExtractionRule::name).collect()
    }

    pub fn extract(&self, utterance: &str) -> ExtractedFields {
        let mut fields = ExtractedFields::default();
        let matched: Vec<&str> = self
            .rules
            .iter()
            .filter(|rule| rule.apply(utterance, &mut fields))
            .map(ExtractionRule::name)
            .collect();
        debug!("Extraction matched rules: {:?}", matched);
        fields
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_is_first_keyword_in_table_order() {
        assert_eq!(extract_property_type("A HOUSE please"), Some(PropertyType::House));
        assert_eq!(extract_property_type("an apt downtown"), Some(PropertyType::Apartment));
        assert_eq!(extract_property_type("condo or apartment"), Some(PropertyType::Apartment));
        assert_eq!(extract_property_type("somewhere nice"), None);
    }

    #[test]
    fn townhouse_resolves_to_house_first_match() {
        // Known heuristic limitation of first-match extraction.
        assert_eq!(extract_property_type("a townhouse"), Some(PropertyType::House));
    }

    #[test]
    fn budget_range_with_k_suffix() {
        assert_eq!(extract_budget("300k-500k"), Some(BudgetRange::new(300_000, 500_000)));
        assert_eq!(extract_budget("$300k - $500k"), Some(BudgetRange::new(300_000, 500_000)));
        assert_eq!(extract_budget("300-500K"), Some(BudgetRange::new(300_000, 500_000)));
    }

    #[test]
    fn budget_range_with_plain_numbers() {
        assert_eq!(
            extract_budget("$300,000-$500,000"),
            Some(BudgetRange::new(300_000, 500_000))
        );
    }

    #[test]
    fn budget_range_in_millions_keeps_both_bounds() {
        assert_eq!(
            extract_budget("$1.2m-$1.5m"),
            Some(BudgetRange::new(1_200_000, 1_500_000))
        );
        assert_eq!(
            extract_budget("between $1.2M to 2M"),
            Some(BudgetRange::new(1_200_000, 2_000_000))
        );
        assert_eq!(extract_budget("800k-1.2m"), Some(BudgetRange::new(800_000, 1_200_000)));
    }

    #[test]
    fn reversed_budget_range_is_ordered() {
        assert_eq!(extract_budget("500k-300k"), Some(BudgetRange::new(300_000, 500_000)));
    }

    #[test]
    fn budget_ceiling_forms() {
        assert_eq!(extract_budget("under 700k"), Some(BudgetRange::new(0, 700_000)));
        assert_eq!(extract_budget("up to $700k"), Some(BudgetRange::new(0, 700_000)));
        assert_eq!(extract_budget("$1.2m"), Some(BudgetRange::new(0, 1_200_000)));
        assert_eq!(extract_budget("less than 2M"), Some(BudgetRange::new(0, 2_000_000)));
        assert_eq!(extract_budget("max 450000"), Some(BudgetRange::new(0, 450_000)));
    }

    #[test]
    fn unparseable_budget_is_none() {
        assert_eq!(extract_budget("somewhere nice"), None);
        assert_eq!(extract_budget("not too expensive"), None);
    }

    #[test]
    fn locations_split_on_commas_and_the_word_and() {
        assert_eq!(
            split_locations("Miami, Austin and San Francisco"),
            vec!["Miami", "Austin", "San Francisco"]
        );
        assert_eq!(split_locations("Portland"), vec!["Portland"]);
        assert_eq!(split_locations(" , ,"), Vec::<String>::new());
    }

    #[test]
    fn amenities_are_lower_cased_tokens_with_flags() {
        let (tokens, flags) = extract_amenities("Pool, a big Yard and pet friendly");
        assert_eq!(tokens, vec!["pool", "a big yard", "pet friendly"]);
        assert!(flags.has_pool);
        assert!(flags.has_garden);
        assert!(flags.is_pet_friendly);
        assert!(!flags.has_parking);

        let (_, garage) = extract_amenities("2-car garage");
        assert!(garage.has_parking);
    }

    #[test]
    fn room_counts_use_synonyms() {
        assert_eq!(extract_bedrooms("3 bedroom house"), Some(3));
        assert_eq!(extract_bedrooms("a 2-bed flat"), Some(2));
        assert_eq!(extract_bedrooms("4br"), Some(4));
        assert_eq!(extract_bathrooms("2 baths please"), Some(2));
        assert_eq!(extract_bathrooms("3 bedrooms"), None);
        assert_eq!(extract_bedrooms("2 bathrooms"), None);
    }

    #[test]
    fn bedroom_ranges_also_read_as_a_budget() {
        let fields = Extractor::new().extract("Show me 2-3 bedroom places");
        assert_eq!(fields.budget, Some(BudgetRange::new(2, 3)));
        assert_eq!(fields.bedrooms, Some(3));
        assert_eq!(fields.to_criteria().max_price, Some(3));
    }

    #[test]
    fn amenity_keywords_match_inside_words() {
        let fields = Extractor::new().extract("Are prices competitive here?");
        assert!(fields.amenity_flags.is_pet_friendly);
        assert!(!fields.is_empty());
    }

    #[test]
    fn extractor_builds_ad_hoc_criteria() {
        let extractor = Extractor::with_known_locations(vec!["Miami".into(), "Austin".into()]);
        let fields = extractor.extract("Show me 3 bed houses with a pool in miami under $2m");
        assert_eq!(fields.property_type, Some(PropertyType::House));
        assert_eq!(fields.bedrooms, Some(3));
        assert_eq!(fields.location.as_deref(), Some("Miami"));
        assert_eq!(fields.budget, Some(BudgetRange::new(0, 2_000_000)));
        assert!(fields.amenity_flags.has_pool);

        let criteria = fields.to_criteria();
        assert_eq!(criteria.min_price, None);
        assert_eq!(criteria.max_price, Some(2_000_000));
        assert_eq!(criteria.min_bedrooms, Some(3));
    }

    #[test]
    fn extractor_reports_nothing_for_small_talk() {
        let extractor = Extractor::with_known_locations(vec!["Miami".into()]);
        assert!(extractor.extract("What is the weather like today?").is_empty());
        assert_eq!(
            extractor.rule_names(),
            vec!["property_type", "budget", "bedrooms", "bathrooms", "amenities", "location"]
        );
    }

    #[test]
    fn custom_rules_extend_the_table() {
        let extractor = Extractor::new().push_rule(ExtractionRule::new("luxury", |text, fields| {
            if text.to_lowercase().contains("luxury") {
                fields.budget = Some(BudgetRange::new(2_000_000, 10_000_000));
                return true;
            }
            false
        }));
        let fields = extractor.extract("something luxury");
        assert_eq!(fields.budget, Some(BudgetRange::new(2_000_000, 10_000_000)));
    }
}
