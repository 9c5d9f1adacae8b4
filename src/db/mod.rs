pub mod pool;
pub mod store;

pub use pool::create_pool;
pub use store::{ConversationStore, NewFile, PgConversationStore, StoredTurn};
