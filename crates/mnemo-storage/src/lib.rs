mod factory;
mod json;
#[cfg(feature = "lancedb-backend")]
mod lancedb;
mod traits;
mod types;

pub use factory::{build_store, StoreConfig};
pub use json::JsonFileStore;
#[cfg(feature = "lancedb-backend")]
pub use lancedb::LanceDbStore;
pub use traits::MemoryStore;
pub use types::{ScopeFilter, SearchHit, StoreStats, UpdateFields};
