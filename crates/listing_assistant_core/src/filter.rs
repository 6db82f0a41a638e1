//! crates/listing_assistant_core/src/filter.rs
//!
//! Narrows the listing catalog down to the records satisfying a `FilterCriteria`.

use crate::domain::{FilterCriteria, Listing};

/// Returns the listings satisfying every constraint present in `criteria`,
/// in input order. Absent constraints are skipped.
pub fn filter_listings(listings: &[Listing], criteria: &FilterCriteria) -> Vec<Listing> {
    listings
        .iter()
        .filter(|listing| matches_criteria(listing, criteria))
        .cloned()
        .collect()
}

pub fn matches_criteria(listing: &Listing, criteria: &FilterCriteria) -> bool {
    if let Some(location) = criteria.location.as_deref().map(str::trim) {
        if !location.is_empty() && !matches_location(listing, location) {
            return false;
        }
    }

    within(listing.price, criteria.min_price, criteria.max_price)
        && criteria.min_bedrooms.map_or(true, |min| listing.bedrooms >= min)
        && criteria.min_bathrooms.map_or(true, |min| listing.bathrooms >= min)
        && criteria
            .property_type
            .map_or(true, |kind| listing.property_type == kind)
        && within(listing.square_feet, criteria.min_area, criteria.max_area)
        && criteria
            .min_year_built
            .map_or(true, |year| listing.year_built >= year)
        && criteria.amenities.satisfied_by(&listing.amenities)
}

/// Case-insensitive substring match on city, state, postal code or street address.
fn matches_location(listing: &Listing, location: &str) -> bool {
    let needle = location.to_lowercase();
    [
        &listing.city,
        &listing.state,
        &listing.zip_code,
        &listing.address,
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(&needle))
}

fn within<T: PartialOrd>(value: T, min: Option<T>, max: Option<T>) -> bool {
    min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
}
