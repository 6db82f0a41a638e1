//! crates/listing_assistant_core/src/domain.rs
//!
//! Defines the core data structures for the listing assistant: the listing
//! records, the filter criteria built from user input, the preferences gathered
//! during a guided conversation, and the chat message log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

//=========================================================================================
// Listings
//=========================================================================================

/// Category of a property. "All" is not a category; it is modelled as the
/// absence of a category constraint (`None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    House,
    Apartment,
    Condo,
    Townhouse,
    Land,
}

impl PropertyType {
    pub const ALL: [PropertyType; 5] = [
        PropertyType::House,
        PropertyType::Apartment,
        PropertyType::Condo,
        PropertyType::Townhouse,
        PropertyType::Land,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::House => "House",
            PropertyType::Apartment => "Apartment",
            PropertyType::Condo => "Condo",
            PropertyType::Townhouse => "Townhouse",
            PropertyType::Land => "Land",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown property type: {0}")]
pub struct UnknownPropertyType(pub String);

impl FromStr for PropertyType {
    type Err = UnknownPropertyType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        PropertyType::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownPropertyType(wanted.to_string()))
    }
}

/// Parses an optional category where "All" (or an empty value) means no constraint.
pub fn parse_property_filter(value: Option<&str>) -> Result<Option<PropertyType>, UnknownPropertyType> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("all") => Ok(None),
        Some(v) => v.parse().map(Some),
    }
}

fn deserialize_property_filter<'de, D>(deserializer: D) -> Result<Option<PropertyType>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    parse_property_filter(raw.as_deref()).map_err(serde::de::Error::custom)
}

/// Boolean amenity flags. On a listing they describe what the property has; inside
/// [`FilterCriteria`] a `true` flag is a requirement and `false` imposes nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AmenityFlags {
    pub is_pet_friendly: bool,
    pub has_parking: bool,
    pub has_pool: bool,
    pub has_garden: bool,
    pub has_air_conditioning: bool,
    pub has_heating: bool,
    pub has_washer: bool,
    pub has_dryer: bool,
    pub has_dishwasher: bool,
}

impl AmenityFlags {
    fn as_array(&self) -> [bool; 9] {
        [
            self.is_pet_friendly,
            self.has_parking,
            self.has_pool,
            self.has_garden,
            self.has_air_conditioning,
            self.has_heating,
            self.has_washer,
            self.has_dryer,
            self.has_dishwasher,
        ]
    }

    /// True when no flag is set.
    pub fn is_empty(&self) -> bool {
        !self.as_array().iter().any(|flag| *flag)
    }

    /// Every flag required by `self` must be present in `offered`.
    pub fn satisfied_by(&self, offered: &AmenityFlags) -> bool {
        self.as_array()
            .iter()
            .zip(offered.as_array().iter())
            .all(|(required, has)| !*required || *has)
    }
}

/// One property record of the catalog. Never mutated after loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub price: u64,
    pub bedrooms: u32,
    pub bathrooms: f32,
    pub square_feet: u32,
    pub property_type: PropertyType,
    pub year_built: u16,
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_new: bool,
    #[serde(flatten)]
    pub amenities: AmenityFlags,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The working set of listings, loaded once at startup.
///
/// Identifiers are expected to be unique but the source data does not guarantee it.
/// Duplicates are reported, never rewritten; lookups return the first record.
#[derive(Debug, Clone, Default)]
pub struct ListingCatalog {
    listings: Vec<Listing>,
    duplicate_ids: Vec<String>,
}

impl ListingCatalog {
    pub fn new(listings: Vec<Listing>) -> Self {
        let mut seen = HashSet::new();
        let mut duplicate_ids = Vec::new();
        for listing in &listings {
            if !seen.insert(listing.id.as_str()) && !duplicate_ids.contains(&listing.id) {
                duplicate_ids.push(listing.id.clone());
            }
        }
        if !duplicate_ids.is_empty() {
            warn!(
                "Listing catalog contains {} duplicated identifier(s): {}",
                duplicate_ids.len(),
                duplicate_ids.join(", ")
            );
        }
        Self {
            listings,
            duplicate_ids,
        }
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn duplicate_ids(&self) -> &[String] {
        &self.duplicate_ids
    }

    pub fn find(&self, id: &str) -> Option<&Listing> {
        self.listings.iter().find(|listing| listing.id == id)
    }

    /// Resolves identifiers to records, keeping the order of `ids` and skipping unknown ones.
    pub fn resolve(&self, ids: &[String]) -> Vec<Listing> {
        ids.iter().filter_map(|id| self.find(id)).cloned().collect()
    }

    /// Distinct city names in catalog order.
    pub fn cities(&self) -> Vec<String> {
        let mut cities: Vec<String> = Vec::new();
        for listing in &self.listings {
            if !cities.iter().any(|c| c.eq_ignore_ascii_case(&listing.city)) {
                cities.push(listing.city.clone());
            }
        }
        cities
    }
}

//=========================================================================================
// Filters and Preferences
//=========================================================================================

/// Constraints used to narrow the catalog. Every field is optional and an absent
/// field means "no constraint". Unknown keys are ignored when deserializing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterCriteria {
    pub location: Option<String>,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    pub min_bedrooms: Option<u32>,
    pub min_bathrooms: Option<f32>,
    #[serde(deserialize_with = "deserialize_property_filter")]
    pub property_type: Option<PropertyType>,
    pub min_area: Option<u32>,
    pub max_area: Option<u32>,
    pub min_year_built: Option<u16>,
    #[serde(flatten)]
    pub amenities: AmenityFlags,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        *self == FilterCriteria::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetRange {
    pub min: u64,
    pub max: u64,
}

impl BudgetRange {
    pub const DEFAULT_CEILING: u64 = 1_000_000;

    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    /// Formats the range the way the assistant reads it back, e.g. `$300K-$1.2M`.
    pub fn display(&self) -> String {
        format!("{}-{}", format_amount(self.min), format_amount(self.max))
    }
}

impl Default for BudgetRange {
    fn default() -> Self {
        Self {
            min: 0,
            max: Self::DEFAULT_CEILING,
        }
    }
}

fn format_amount(amount: u64) -> String {
    if amount >= 1_000_000 {
        format!("${:.1}M", amount as f64 / 1_000_000.0)
    } else {
        format!("${:.0}K", amount as f64 / 1_000.0)
    }
}

/// Preferences accumulated during one guided conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub budget: BudgetRange,
    pub locations: Vec<String>,
    /// `None` reads as "All".
    pub property_type: Option<PropertyType>,
    pub amenities: Vec<String>,
    #[serde(flatten)]
    pub amenity_flags: AmenityFlags,
}

impl Preferences {
    /// Builds the filter applied once every preference has been collected.
    /// Only the first location is used as the location constraint.
    pub fn to_criteria(&self) -> FilterCriteria {
        FilterCriteria {
            location: self.locations.first().cloned(),
            min_price: Some(self.budget.min),
            max_price: Some(self.budget.max),
            property_type: self.property_type,
            amenities: AmenityFlags {
                is_pet_friendly: self.amenity_flags.is_pet_friendly,
                has_parking: self.amenity_flags.has_parking,
                has_pool: self.amenity_flags.has_pool,
                has_garden: self.amenity_flags.has_garden,
                ..AmenityFlags::default()
            },
            ..FilterCriteria::default()
        }
    }
}

//=========================================================================================
// Conversation Log
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One entry of the conversation log shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// One prompt/reply exchange kept in the completion context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextTurn {
    pub prompt: String,
    pub reply: String,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn listing(id: &str, city: &str, price: u64, kind: PropertyType) -> Listing {
        Listing {
            id: id.to_string(),
            title: format!("{} in {}", kind, city),
            address: format!("1 Main St, {}", city),
            city: city.to_string(),
            state: "CA".to_string(),
            zip_code: "90001".to_string(),
            price,
            bedrooms: 3,
            bathrooms: 2.0,
            square_feet: 1800,
            property_type: kind,
            year_built: 2010,
            description: "A place to live.".to_string(),
            features: vec!["Hardwood Floors".to_string(), "Fireplace".to_string()],
            images: vec![],
            is_featured: false,
            is_new: false,
            amenities: AmenityFlags::default(),
            created_at: "2023-01-15T10:30:00Z".parse().unwrap(),
            updated_at: "2023-04-20T14:45:00Z".parse().unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::listing;
    use super::*;

    #[test]
    fn property_filter_treats_all_as_unconstrained() {
        assert_eq!(parse_property_filter(Some("All")), Ok(None));
        assert_eq!(parse_property_filter(None), Ok(None));
        assert_eq!(parse_property_filter(Some("condo")), Ok(Some(PropertyType::Condo)));
        assert!(parse_property_filter(Some("castle")).is_err());
    }

    #[test]
    fn criteria_deserialize_ignores_unknown_keys() {
        let criteria: FilterCriteria = serde_json::from_str(
            r#"{"location":"Miami","propertyType":"All","hasPool":true,"sortBy":"price"}"#,
        )
        .unwrap();
        assert_eq!(criteria.location.as_deref(), Some("Miami"));
        assert_eq!(criteria.property_type, None);
        assert!(criteria.amenities.has_pool);
        assert!(!criteria.amenities.has_garden);
    }

    #[test]
    fn listing_reads_camel_case_record() {
        let raw = r#"{
            "id": "prop-9", "title": "Loft", "address": "123 Tech District", "city": "Boston",
            "state": "MA", "zipCode": "02110", "price": 599000, "bedrooms": 1, "bathrooms": 1,
            "squareFeet": 600, "propertyType": "Apartment", "yearBuilt": 2022,
            "description": "Compact.", "features": ["Gym"], "images": [],
            "isPetFriendly": true, "hasParking": false,
            "createdAt": "2023-03-01T14:00:00Z", "updatedAt": "2023-04-28T15:30:00Z"
        }"#;
        let listing: Listing = serde_json::from_str(raw).unwrap();
        assert_eq!(listing.zip_code, "02110");
        assert!(listing.amenities.is_pet_friendly);
        assert!(!listing.amenities.has_pool);
        assert_eq!(listing.property_type, PropertyType::Apartment);
    }

    #[test]
    fn catalog_reports_duplicates_and_keeps_first() {
        let mut second = listing("prop-4", "Seattle", 650_000, PropertyType::Apartment);
        second.title = "Second".to_string();
        let catalog = ListingCatalog::new(vec![
            listing("prop-4", "Miami", 2_100_000, PropertyType::Condo),
            listing("prop-5", "Austin", 725_000, PropertyType::Townhouse),
            second,
        ]);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.duplicate_ids(), &["prop-4".to_string()]);
        assert_eq!(catalog.find("prop-4").map(|l| l.city.as_str()), Some("Miami"));
        assert_eq!(catalog.cities(), vec!["Miami", "Austin", "Seattle"]);
    }

    #[test]
    fn budget_display_switches_units_at_one_million() {
        assert_eq!(BudgetRange::new(300_000, 500_000).display(), "$300K-$500K");
        assert_eq!(BudgetRange::new(0, 1_200_000).display(), "$0K-$1.2M");
    }

    #[test]
    fn amenity_requirements_only_constrain_true_flags() {
        let required = AmenityFlags {
            has_pool: true,
            ..AmenityFlags::default()
        };
        let with_pool = AmenityFlags {
            has_pool: true,
            has_garden: true,
            ..AmenityFlags::default()
        };
        assert!(required.satisfied_by(&with_pool));
        assert!(!required.satisfied_by(&AmenityFlags::default()));
        assert!(AmenityFlags::default().satisfied_by(&AmenityFlags::default()));
    }
}
