use std::sync::Arc;

use mnemo_core::error::MnemoError;

use crate::json::JsonFileStore;
#[cfg(feature = "lancedb-backend")]
use crate::lancedb::LanceDbStore;
use crate::traits::MemoryStore;

/// Which backend to construct and where it lives.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// A single-file JSON store, always available.
    Json { path: String, vector_dim: usize },
    /// An embedded LanceDB database directory, available when built with
    /// the `lancedb-backend` feature.
    LanceDb { uri: String },
}

pub fn build_store(cfg: StoreConfig) -> Result<Arc<dyn MemoryStore>, MnemoError> {
    match cfg {
        StoreConfig::Json { path, vector_dim } => {
            Ok(Arc::new(JsonFileStore::open(path, vector_dim)?))
        }
        #[cfg(feature = "lancedb-backend")]
        StoreConfig::LanceDb { uri } => Ok(Arc::new(LanceDbStore::open(uri)?)),
        #[cfg(not(feature = "lancedb-backend"))]
        StoreConfig::LanceDb { .. } => Err(MnemoError::InvalidInput(
            "this build was compiled without the lancedb-backend feature".to_string(),
        )),
    }
}
