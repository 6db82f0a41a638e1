pub mod completion;
pub mod conversation;
pub mod domain;
pub mod extract;
pub mod filter;
pub mod ports;
pub mod recommend;
pub mod session;

pub use completion::{CompletionClient, CompletionContext, CompletionFailure, FallbackReply, RetryPolicy};
pub use conversation::{ConversationController, TurnOutcome};
pub use domain::{
    AmenityFlags, BudgetRange, ChatMessage, ChatRole, ContextTurn, FilterCriteria, Listing,
    ListingCatalog, Preferences, PropertyType,
};
pub use extract::{ExtractedFields, ExtractionRule, Extractor};
pub use filter::filter_listings;
pub use ports::{ChatLogStore, CompletionService, ListingSource, PortError, PortResult};
pub use recommend::RecommendationRequester;
pub use session::{ConversationStep, PreferenceSession, CHAT_HISTORY_KEY, GREETING};
