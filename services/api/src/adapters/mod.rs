pub mod completion_llm;
pub mod db;
pub mod listings;
pub mod memory_store;

pub use completion_llm::GeminiCompletionAdapter;
pub use db::DbAdapter;
pub use listings::JsonListingSource;
pub use memory_store::InMemoryChatLogStore;
