//! Shared handler state.

use std::sync::Arc;

use arbor_core::ArborConfig;
use arbor_storage::MemoryStore;
use arbor_tree::DocumentService;

use crate::error::ApiResult;

/// Document service shared by every handler.
pub type AppState = Arc<DocumentService<MemoryStore>>;

/// Build the service over the store named in `config.store`.
pub fn build_state(config: ArborConfig) -> ApiResult<AppState> {
    let store = MemoryStore::from_settings(&config.store)?;
    let service = DocumentService::new(store, config)?;
    Ok(Arc::new(service))
}
