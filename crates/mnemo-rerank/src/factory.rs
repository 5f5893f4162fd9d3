use std::sync::Arc;

use crate::config::RerankProviderConfig;
use crate::error::ProviderError;
use crate::providers::VoyageRerankProvider;
use crate::traits::RerankProvider;

pub fn build_rerank_provider(
    cfg: RerankProviderConfig,
) -> Result<Arc<dyn RerankProvider>, ProviderError> {
    match cfg {
        RerankProviderConfig::Voyage(c) => Ok(Arc::new(VoyageRerankProvider::new(c)?)),
    }
}
