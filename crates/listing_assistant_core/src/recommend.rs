//! crates/listing_assistant_core/src/recommend.rs
//!
//! Prompts that ask the completion endpoint about listings: recommendations for
//! the collected preferences, plus the listing-detail helpers (description,
//! similar listings, questions about one listing).

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use tracing::{error, warn};

use crate::completion::{CompletionClient, CompletionContext};
use crate::domain::{Listing, Preferences};

const RECOMMENDATION_TEMPLATE: &str = r#"Based on these preferences: {preferences}, suggest properties from this JSON data: {listings}. Return only the ids of the recommended properties in a JSON array format like this: ["prop-1", "prop-3"]."#;

const SIMILAR_TEMPLATE: &str = r#"Find 3 properties similar to {listing} from this list: {listings}. Return only the ids of the similar properties in a JSON array format like this: ["prop-1", "prop-3"]."#;

const DESCRIPTION_TEMPLATE: &str = r#"Create a brief, engaging description for this property in exactly 3 sentences. First sentence should highlight its location and primary feature. Second sentence should mention the bedrooms, bathrooms, and square footage. Third sentence should highlight unique amenities or features like {features}. Be specific and descriptive.

Property data: {listing}"#;

const QUESTION_TEMPLATE: &str = r#"Based on this property data: {listing}, answer this question in a helpful, concise way: "{question}". If the answer cannot be determined from the data, say "I don't have enough information to answer that question.""#;

static QUOTED_LISTING_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(prop-\d+)""#).expect("valid listing id regex"));

/// Reads identifiers out of a raw completion: a JSON array first, then any
/// quoted `prop-<digits>` in the text. Returns an empty list when both fail.
pub fn parse_listing_ids(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(raw.trim()) {
        Ok(ids) => ids,
        Err(e) => {
            warn!("Completion was not a JSON id array ({}); scanning text instead", e);
            QUOTED_LISTING_ID_RE
                .captures_iter(raw)
                .map(|caps| caps[1].to_string())
                .collect()
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Option<String> {
    serde_json::to_string(value)
        .map_err(|e| error!("Failed to serialize prompt data: {}", e))
        .ok()
}

/// Static description used when the completion endpoint cannot produce one.
pub fn fallback_description(listing: &Listing) -> String {
    let features: Vec<&str> = listing.features.iter().take(3).map(String::as_str).collect();
    format!(
        "Beautiful {} bedroom, {} bathroom property in {}. Features include {}. Located in a desirable neighborhood with great amenities.",
        listing.bedrooms,
        listing.bathrooms,
        listing.city,
        features.join(", ")
    )
}

#[derive(Clone)]
pub struct RecommendationRequester {
    client: CompletionClient,
}

impl RecommendationRequester {
    pub fn new(client: CompletionClient) -> Self {
        Self { client }
    }

    /// Asks for the identifiers of the candidates best matching `preferences`.
    /// Uses a fresh context. Never fails; an unusable answer yields no identifiers.
    pub async fn recommend(
        &self,
        context: &mut CompletionContext,
        preferences: &Preferences,
        candidates: &[Listing],
    ) -> Vec<String> {
        let (Some(preferences), Some(listings)) = (to_json(preferences), to_json(candidates)) else {
            return Vec::new();
        };
        let prompt = RECOMMENDATION_TEMPLATE
            .replace("{preferences}", &preferences)
            .replace("{listings}", &listings);

        let max_retries = self.client.policy().max_retries;
        match self.client.try_complete(context, &prompt, true, max_retries).await {
            Ok(raw) => parse_listing_ids(&raw),
            Err(e) => {
                error!("Recommendation request failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Up to three identifiers of listings similar to `listing`.
    pub async fn similar_listings(&self, listing: &Listing, catalog: &[Listing]) -> Vec<String> {
        let (Some(current), Some(listings)) = (to_json(listing), to_json(catalog)) else {
            return Vec::new();
        };
        let prompt = SIMILAR_TEMPLATE
            .replace("{listing}", &current)
            .replace("{listings}", &listings);

        let mut context = CompletionContext::new();
        let max_retries = self.client.policy().max_retries;
        match self.client.try_complete(&mut context, &prompt, true, max_retries).await {
            Ok(raw) => parse_listing_ids(&raw)
                .into_iter()
                .filter(|id| *id != listing.id)
                .take(3)
                .collect(),
            Err(e) => {
                error!("Similar listings request failed for {}: {}", listing.id, e);
                Vec::new()
            }
        }
    }

    /// Three-sentence description, or [`fallback_description`] on failure.
    pub async fn describe_listing(&self, listing: &Listing) -> String {
        let Some(data) = to_json(listing) else {
            return fallback_description(listing);
        };
        let prompt = DESCRIPTION_TEMPLATE
            .replace("{features}", &listing.features.join(", "))
            .replace("{listing}", &data);

        let mut context = CompletionContext::new();
        let max_retries = self.client.policy().max_retries;
        match self.client.try_complete(&mut context, &prompt, true, max_retries).await {
            Ok(description) => description,
            Err(e) => {
                warn!("Using static description for {}: {}", listing.id, e);
                fallback_description(listing)
            }
        }
    }

    pub async fn answer_listing_question(&self, question: &str, listing: &Listing) -> String {
        let Some(data) = to_json(listing) else {
            return "I don't have enough information to answer that question.".to_string();
        };
        let prompt = QUESTION_TEMPLATE
            .replace("{listing}", &data)
            .replace("{question}", question.trim());

        let mut context = CompletionContext::new();
        self.client.complete(&mut context, &prompt, true).await
    }
}
