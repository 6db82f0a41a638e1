//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use listing_assistant_core::{
    domain::{parse_property_filter, AmenityFlags, FilterCriteria, Listing},
    filter::filter_listings,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_listings_handler,
        get_listing_handler,
    ),
    components(
        schemas(ListingView)
    ),
    tags(
        (name = "Listing Assistant API", description = "Read access to the property listing catalog.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Query Structs
//=========================================================================================

/// Optional filters for `GET /listings`. Every parameter left out imposes no constraint.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase", default)]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct ListingQuery {
    /// Case-insensitive substring of city, state, postal code or address.
    pub location: Option<String>,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    pub min_bedrooms: Option<u32>,
    pub min_bathrooms: Option<f32>,
    /// House, Apartment, Condo, Townhouse, Land or All.
    pub property_type: Option<String>,
    pub min_area: Option<u32>,
    pub max_area: Option<u32>,
    pub min_year_built: Option<u16>,
    pub is_pet_friendly: Option<bool>,
    pub has_parking: Option<bool>,
    pub has_pool: Option<bool>,
    pub has_garden: Option<bool>,
    pub has_air_conditioning: Option<bool>,
    pub has_heating: Option<bool>,
    pub has_washer: Option<bool>,
    pub has_dryer: Option<bool>,
    pub has_dishwasher: Option<bool>,
}

impl ListingQuery {
    pub fn to_criteria(&self) -> Result<FilterCriteria, String> {
        let property_type =
            parse_property_filter(self.property_type.as_deref()).map_err(|e| e.to_string())?;
        let flag = |value: Option<bool>| value.unwrap_or(false);
        Ok(FilterCriteria {
            location: self.location.clone(),
            min_price: self.min_price,
            max_price: self.max_price,
            min_bedrooms: self.min_bedrooms,
            min_bathrooms: self.min_bathrooms,
            property_type,
            min_area: self.min_area,
            max_area: self.max_area,
            min_year_built: self.min_year_built,
            amenities: AmenityFlags {
                is_pet_friendly: flag(self.is_pet_friendly),
                has_parking: flag(self.has_parking),
                has_pool: flag(self.has_pool),
                has_garden: flag(self.has_garden),
                has_air_conditioning: flag(self.has_air_conditioning),
                has_heating: flag(self.has_heating),
                has_washer: flag(self.has_washer),
                has_dryer: flag(self.has_dryer),
                has_dishwasher: flag(self.has_dishwasher),
            },
        })
    }
}

/// One listing as returned by the REST API.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListingView {
    id: String,
    title: String,
    address: String,
    city: String,
    state: String,
    zip_code: String,
    price: u64,
    bedrooms: u32,
    bathrooms: f32,
    square_feet: u32,
    property_type: String,
    year_built: u16,
    description: String,
    features: Vec<String>,
    images: Vec<String>,
    is_featured: bool,
    is_new: bool,
    is_pet_friendly: bool,
    has_parking: bool,
    has_pool: bool,
    has_garden: bool,
    has_air_conditioning: bool,
    has_heating: bool,
    has_washer: bool,
    has_dryer: bool,
    has_dishwasher: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Listing> for ListingView {
    fn from(listing: &Listing) -> Self {
        let amenities = listing.amenities;
        Self {
            id: listing.id.clone(),
            title: listing.title.clone(),
            address: listing.address.clone(),
            city: listing.city.clone(),
            state: listing.state.clone(),
            zip_code: listing.zip_code.clone(),
            price: listing.price,
            bedrooms: listing.bedrooms,
            bathrooms: listing.bathrooms,
            square_feet: listing.square_feet,
            property_type: listing.property_type.to_string(),
            year_built: listing.year_built,
            description: listing.description.clone(),
            features: listing.features.clone(),
            images: listing.images.clone(),
            is_featured: listing.is_featured,
            is_new: listing.is_new,
            is_pet_friendly: amenities.is_pet_friendly,
            has_parking: amenities.has_parking,
            has_pool: amenities.has_pool,
            has_garden: amenities.has_garden,
            has_air_conditioning: amenities.has_air_conditioning,
            has_heating: amenities.has_heating,
            has_washer: amenities.has_washer,
            has_dryer: amenities.has_dryer,
            has_dishwasher: amenities.has_dishwasher,
            created_at: listing.created_at,
            updated_at: listing.updated_at,
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// List the catalog, narrowed by the optional filters.
#[utoipa::path(
    get,
    path = "/listings",
    params(ListingQuery),
    responses(
        (status = 200, description = "Listings matching every supplied filter, in catalog order", body = [ListingView]),
        (status = 400, description = "Unknown property type")
    )
)]
pub async fn list_listings_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<Vec<ListingView>>, (StatusCode, String)> {
    let criteria = query.to_criteria().map_err(|e| {
        warn!("Rejected listing query: {}", e);
        (StatusCode::BAD_REQUEST, e)
    })?;

    let listings = filter_listings(app_state.catalog.listings(), &criteria);
    info!("Listing query matched {} of {}", listings.len(), app_state.catalog.len());
    Ok(Json(listings.iter().map(ListingView::from).collect()))
}

/// Fetch one listing. With duplicated identifiers the first record wins.
#[utoipa::path(
    get,
    path = "/listings/{id}",
    params(
        ("id" = String, Path, description = "The listing identifier, e.g. prop-3.")
    ),
    responses(
        (status = 200, description = "The listing", body = ListingView),
        (status = 404, description = "No listing has this identifier")
    )
)]
pub async fn get_listing_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ListingView>, (StatusCode, String)> {
    app_state
        .catalog
        .find(&id)
        .map(|listing| Json(ListingView::from(listing)))
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Listing {} not found", id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use listing_assistant_core::domain::PropertyType;

    #[test]
    fn empty_query_is_unconstrained() {
        let criteria = ListingQuery::default().to_criteria().unwrap();
        assert!(criteria.is_empty());
    }

    #[test]
    fn query_maps_onto_filter_criteria() {
        let query = ListingQuery {
            location: Some("Miami".to_string()),
            max_price: Some(2_500_000),
            min_bathrooms: Some(2.5),
            property_type: Some("condo".to_string()),
            has_pool: Some(true),
            has_garden: Some(false),
            ..ListingQuery::default()
        };

        let criteria = query.to_criteria().unwrap();

        assert_eq!(criteria.location.as_deref(), Some("Miami"));
        assert_eq!(criteria.max_price, Some(2_500_000));
        assert_eq!(criteria.min_bathrooms, Some(2.5));
        assert_eq!(criteria.property_type, Some(PropertyType::Condo));
        assert!(criteria.amenities.has_pool);
        assert!(!criteria.amenities.has_garden);
    }

    #[test]
    fn all_is_no_type_constraint_and_unknown_types_fail() {
        let all = ListingQuery {
            property_type: Some("All".to_string()),
            ..ListingQuery::default()
        };
        assert_eq!(all.to_criteria().unwrap().property_type, None);

        let castle = ListingQuery {
            property_type: Some("Castle".to_string()),
            ..ListingQuery::default()
        };
        assert!(castle.to_criteria().is_err());
    }

    #[test]
    fn openapi_document_lists_both_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/listings"));
        assert!(doc.paths.paths.contains_key("/listings/{id}"));
    }
}
