//! services/api/src/adapters/listings.rs
//!
//! The `ListingSource` adapter. The catalog is a JSON array of listing records,
//! read from a configured path or, by default, from the copy bundled into the binary.

use async_trait::async_trait;
use listing_assistant_core::domain::Listing;
use listing_assistant_core::ports::{ListingSource, PortError, PortResult};
use std::path::PathBuf;
use tracing::info;

const BUNDLED_LISTINGS: &str = include_str!("../../data/listings.json");

pub struct JsonListingSource {
    path: Option<PathBuf>,
}

impl JsonListingSource {
    /// Reads from `path`, or the bundled catalog when `None`.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn bundled() -> Self {
        Self::new(None)
    }
}

fn parse_listings(raw: &str) -> PortResult<Vec<Listing>> {
    serde_json::from_str(raw)
        .map_err(|e| PortError::Unexpected(format!("Malformed listing catalog: {}", e)))
}

#[async_trait]
impl ListingSource for JsonListingSource {
    async fn load_listings(&self) -> PortResult<Vec<Listing>> {
        let listings = match &self.path {
            Some(path) => {
                let raw = tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => PortError::NotFound(path.display().to_string()),
                    _ => PortError::Unexpected(e.to_string()),
                })?;
                parse_listings(&raw)?
            }
            None => parse_listings(BUNDLED_LISTINGS)?,
        };
        info!("Loaded {} listing(s)", listings.len());
        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use listing_assistant_core::domain::{ListingCatalog, PropertyType};

    #[tokio::test]
    async fn bundled_catalog_keeps_duplicated_ids() {
        let listings = JsonListingSource::bundled().load_listings().await.unwrap();
        assert_eq!(listings.len(), 14);

        let catalog = ListingCatalog::new(listings);
        assert_eq!(catalog.duplicate_ids(), &["prop-4", "prop-5", "prop-6"]);

        // Lookups resolve to the first record with the id.
        let first = catalog.find("prop-6").unwrap();
        let all: Vec<_> = catalog.listings().iter().filter(|l| l.id == "prop-6").collect();
        assert_eq!(all.len(), 2);
        assert!(std::ptr::eq(first, all[0]));
        assert_ne!(all[0].city, all[1].city);
    }

    #[tokio::test]
    async fn bundled_catalog_carries_amenities_and_types() {
        let listings = JsonListingSource::bundled().load_listings().await.unwrap();
        assert!(listings.iter().any(|l| l.amenities.has_pool));
        assert!(listings.iter().any(|l| l.property_type == PropertyType::Apartment));
        assert!(listings.iter().all(|l| !l.id.is_empty() && l.price > 0));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let source = JsonListingSource::new(Some(PathBuf::from("/definitely/not/here.json")));
        let err = source.load_listings().await.unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    #[test]
    fn malformed_catalog_is_reported() {
        let err = parse_listings("{\"not\": \"an array\"}").unwrap_err();
        assert!(matches!(err, PortError::Unexpected(ref msg) if msg.starts_with("Malformed")));
    }
}
