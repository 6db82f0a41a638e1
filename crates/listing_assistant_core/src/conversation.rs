//! crates/listing_assistant_core/src/conversation.rs
//!
//! The Conversation Step Controller: a five-state machine that collects the
//! property category, budget, locations and amenities, asks for recommendations,
//! then loops in open-ended chat.

use std::sync::Arc;
use tracing::{debug, info};

use crate::completion::CompletionClient;
use crate::domain::{ChatMessage, FilterCriteria, ListingCatalog};
use crate::extract::{self, Extractor};
use crate::recommend::RecommendationRequester;
use crate::session::{ConversationStep, PreferenceSession};

const BUDGET_RETRY_REPLY: &str = "I'm sorry, I couldn't understand your budget range. Could you please specify it again in a format like \"$300k-500k\" or \"up to $700k\"?";

const FILTERS_UPDATED_REPLY: &str =
    "I've updated the listings based on your request. Let me know if you want to refine your search further.";

const NO_MATCHES_REPLY: &str = "I couldn't find exact matches for all your criteria. I've updated the filters with your preferences, but you might want to adjust them to see more options.";

/// What one user turn produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub reply: String,
    /// A new filter to apply to the displayed listings, if the turn produced one.
    pub filters: Option<FilterCriteria>,
    pub recommended_ids: Vec<String>,
    /// The step the session is in after the turn.
    pub step: ConversationStep,
    /// The session generation the turn ran under.
    pub generation: u64,
}

pub struct ConversationController {
    extractor: Extractor,
    recommender: RecommendationRequester,
    completion: CompletionClient,
    catalog: Arc<ListingCatalog>,
}

impl ConversationController {
    /// The open-ended step recognises every city of `catalog` as a location.
    pub fn new(completion: CompletionClient, catalog: Arc<ListingCatalog>) -> Self {
        Self {
            extractor: Extractor::with_known_locations(catalog.cities()),
            recommender: RecommendationRequester::new(completion.clone()),
            completion,
            catalog,
        }
    }

    pub fn recommender(&self) -> &RecommendationRequester {
        &self.recommender
    }

    pub fn catalog(&self) -> &Arc<ListingCatalog> {
        &self.catalog
    }

    /// Runs one turn. Both the utterance and the reply end up in the session log;
    /// failures of the completion endpoint surface only as apology text.
    pub async fn handle_message(
        &self,
        session: &mut PreferenceSession,
        utterance: &str,
    ) -> TurnOutcome {
        let step = session.step();
        let generation = session.generation();
        debug!("Handling message at step {:?} (generation {})", step, generation);
        session.push_message(ChatMessage::user(utterance));

        let mut filters = None;
        let mut recommended_ids = Vec::new();
        let mut advance = true;

        let reply = match step {
            ConversationStep::PropertyType => {
                if let Some(kind) = extract::extract_property_type(utterance) {
                    session.preferences_mut().property_type = Some(kind);
                }
                let kind = session
                    .preferences()
                    .property_type
                    .map(|kind| kind.as_str().to_lowercase())
                    .unwrap_or_else(|| "property".to_string());
                format!(
                    "Excellent choice! A {} would be a great investment. Now, what's your budget range? Feel free to give me a range like $300k-500k, and I'll find options that fit your budget.",
                    kind
                )
            }
            ConversationStep::Budget => match extract::extract_budget(utterance) {
                Some(budget) => {
                    session.preferences_mut().budget = budget;
                    format!(
                        "Got it, I'll look for properties in the {} range. Which areas or neighborhoods are you interested in? You can mention multiple locations if you'd like.",
                        budget.display()
                    )
                }
                None => {
                    info!("Budget not understood, asking again");
                    advance = false;
                    BUDGET_RETRY_REPLY.to_string()
                }
            },
            ConversationStep::Locations => {
                let locations = extract::split_locations(utterance);
                let first = locations
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "those areas".to_string());
                session.preferences_mut().locations = locations;
                format!(
                    "{} is a great choice! To help me find your perfect home, what amenities are must-haves for you? Think about things like a pool, garden, parking, or anything else that's important to your lifestyle.",
                    first
                )
            }
            ConversationStep::Amenities => {
                let (amenities, flags) = extract::extract_amenities(utterance);
                let preferences = session.preferences_mut();
                preferences.amenities = amenities;
                preferences.amenity_flags = flags;

                let preferences = session.preferences().clone();
                recommended_ids = self
                    .recommender
                    .recommend(session.context_mut(), &preferences, self.catalog.listings())
                    .await;
                filters = Some(preferences.to_criteria());

                info!("Preferences collected, {} recommendation(s)", recommended_ids.len());
                if recommended_ids.is_empty() {
                    NO_MATCHES_REPLY.to_string()
                } else {
                    format!(
                        "I've found {} properties that match your criteria! I've updated the listings to show you the best matches. Feel free to ask me about specific properties or refine your search.",
                        recommended_ids.len()
                    )
                }
            }
            ConversationStep::Open => {
                let fields = self.extractor.extract(utterance);
                if fields.is_empty() {
                    self.completion
                        .complete(session.context_mut(), utterance, false)
                        .await
                } else {
                    filters = Some(fields.to_criteria());
                    FILTERS_UPDATED_REPLY.to_string()
                }
            }
        };

        session.push_message(ChatMessage::assistant(reply.clone()));
        if advance {
            session.advance();
        }

        TurnOutcome {
            reply,
            filters,
            recommended_ids,
            step: session.step(),
            generation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::testing::{failing, ScriptedCompletion};
    use crate::completion::{FallbackReply, RetryPolicy};
    use crate::domain::fixtures::listing;
    use crate::domain::{BudgetRange, PropertyType};
    use crate::session::GREETING;

    fn controller(service: Arc<ScriptedCompletion>) -> ConversationController {
        let catalog = ListingCatalog::new(vec![
            listing("prop-1", "Malibu", 3_750_000, PropertyType::House),
            listing("prop-2", "San Francisco", 1_250_000, PropertyType::Apartment),
            listing("prop-3", "Portland", 850_000, PropertyType::House),
        ]);
        ConversationController::new(
            CompletionClient::new(service, RetryPolicy::default()),
            Arc::new(catalog),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn five_utterances_reach_open_chat() {
        let service = ScriptedCompletion::new(vec![
            Ok(r#"["prop-3"]"#.into()),
            Ok("Happy to help with anything else.".into()),
        ]);
        let controller = controller(service.clone());
        let mut session = PreferenceSession::new();

        let utterances = [
            "I'd like a house",
            "$300k-500k",
            "Portland and Austin",
            "pool, parking",
            "Tell me something interesting",
        ];
        let mut outcomes = Vec::new();
        for utterance in utterances {
            outcomes.push(controller.handle_message(&mut session, utterance).await);
        }

        assert_eq!(session.step(), ConversationStep::Open);
        assert_eq!(session.messages().len(), 2 * utterances.len() + 1);
        assert_eq!(session.messages()[0].content, GREETING);

        let preferences = session.preferences();
        assert_eq!(preferences.property_type, Some(PropertyType::House));
        assert_eq!(preferences.budget, BudgetRange::new(300_000, 500_000));
        assert_eq!(preferences.locations, vec!["Portland", "Austin"]);
        assert_eq!(preferences.amenities, vec!["pool", "parking"]);
        assert!(preferences.amenity_flags.has_pool && preferences.amenity_flags.has_parking);

        assert!(outcomes[0].reply.starts_with("Excellent choice! A house would"));
        assert!(outcomes[1].reply.contains("the $300K-$500K range"));
        assert!(outcomes[2].reply.starts_with("Portland is a great choice!"));
        assert!(outcomes[3].reply.starts_with("I've found 1 properties"));
        assert_eq!(outcomes[3].recommended_ids, vec!["prop-3"]);
        let criteria = outcomes[3].filters.clone().unwrap();
        assert_eq!(criteria.location.as_deref(), Some("Portland"));
        assert_eq!(criteria.max_price, Some(500_000));
        assert_eq!(outcomes[4].reply, "Happy to help with anything else.");
        assert!(outcomes[4].filters.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn unparseable_budget_stays_on_budget_step() {
        let controller = controller(ScriptedCompletion::new(vec![]));
        let mut session = PreferenceSession::new();

        controller.handle_message(&mut session, "a condo").await;
        let outcome = controller.handle_message(&mut session, "somewhere nice").await;

        assert_eq!(outcome.reply, BUDGET_RETRY_REPLY);
        assert_eq!(outcome.step, ConversationStep::Budget);
        assert_eq!(session.preferences().budget, BudgetRange::default());
        assert_eq!(session.messages().len(), 5);

        let outcome = controller.handle_message(&mut session, "up to $1.2m").await;
        assert_eq!(outcome.step, ConversationStep::Locations);
        assert!(outcome.reply.contains("$0K-$1.2M"));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_category_still_advances() {
        let controller = controller(ScriptedCompletion::new(vec![]));
        let mut session = PreferenceSession::new();

        let outcome = controller.handle_message(&mut session, "not sure yet").await;

        assert!(outcome.reply.starts_with("Excellent choice! A property would"));
        assert_eq!(outcome.step, ConversationStep::Budget);
        assert!(session.preferences().property_type.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_recommendation_reports_no_matches() {
        let controller = controller(ScriptedCompletion::new(failing("timeout", 3)));
        let mut session = PreferenceSession::new();
        for utterance in ["apartment", "under 900k", "San Francisco"] {
            controller.handle_message(&mut session, utterance).await;
        }

        let outcome = controller.handle_message(&mut session, "a garden").await;

        assert_eq!(outcome.reply, NO_MATCHES_REPLY);
        assert!(outcome.recommended_ids.is_empty());
        let criteria = outcome.filters.unwrap();
        assert_eq!(criteria.property_type, Some(PropertyType::Apartment));
        assert!(criteria.amenities.has_garden);
        assert_eq!(outcome.step, ConversationStep::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn open_chat_applies_extracted_filters() {
        let service = ScriptedCompletion::new(vec![]);
        let controller = controller(service.clone());
        let mut session = PreferenceSession::new();
        for _ in 0..4 {
            session.advance();
        }

        let outcome = controller
            .handle_message(&mut session, "Anything with 2 bedrooms in san francisco?")
            .await;

        assert_eq!(outcome.reply, FILTERS_UPDATED_REPLY);
        let criteria = outcome.filters.unwrap();
        assert_eq!(criteria.min_bedrooms, Some(2));
        assert_eq!(criteria.location.as_deref(), Some("San Francisco"));
        assert_eq!(service.calls(), 0);
        assert_eq!(outcome.step, ConversationStep::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn open_chat_keeps_rolling_context_and_apologises_on_failure() {
        let mut script = vec![Ok("First answer.".into())];
        script.extend(failing("quota exceeded", 3));
        let service = ScriptedCompletion::new(script);
        let controller = controller(service.clone());
        let mut session = PreferenceSession::new();
        for _ in 0..4 {
            session.advance();
        }

        let first = controller.handle_message(&mut session, "hello there").await;
        let second = controller.handle_message(&mut session, "what else?").await;

        assert_eq!(first.reply, "First answer.");
        assert_eq!(second.reply, FallbackReply::Capacity.message());
        assert_eq!(session.context().len(), 1);
        // The second prompt was sent with the first exchange as history.
        assert_eq!(service.prompts.lock().unwrap()[1].1, 1);
        assert_eq!(session.messages().last().unwrap().content, second.reply);
    }
}
