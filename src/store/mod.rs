//! Rate store implementations.

pub mod disk;
pub mod http;
pub mod memory;

use crate::core::config::AppConfig;
use anyhow::{Context, Result};
pub use disk::FjallRateStore;
pub use http::HttpRateStore;
pub use memory::MemoryRateStore;
use std::sync::Arc;

/// Opens the on-disk store under the configured data path.
pub fn open_local_store(config: &AppConfig) -> Result<Arc<FjallRateStore>> {
    let path = config.default_data_path()?.join("store");
    let store = FjallRateStore::open(&path)
        .with_context(|| format!("Failed to open rate store at {}", path.display()))?;
    Ok(Arc::new(store))
}
