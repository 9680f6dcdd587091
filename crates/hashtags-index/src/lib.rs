pub mod config;
pub mod counts;
pub mod error;
pub mod forum;
pub mod hooks;
pub mod indexer;
pub mod memory;
pub mod model;
pub mod projector;
pub mod search;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod store;
pub mod telemetry;

pub use config::HashtagConfig;
pub use error::{IndexError, Result};
pub use forum::ForumServices;
pub use hooks::HashtagPlugin;
pub use indexer::{IndexOutcome, PostIndexer, ReindexProgress, ReindexReport, ScoreClock};
pub use memory::{MemoryForum, MemoryStore};
pub use projector::{TagPage, TagPageProjector};
pub use search::{SearchRequest, search};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
pub use store::SortedSetStore;
