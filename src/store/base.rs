use std::sync::Arc;

use tracing::info;

use super::{file_store::FileTokenStore, memory_store::MemoryTokenStore};
use crate::config::StoreConfig;
use crate::error::ClientError;

/// Storage key of the access token.
pub const ACCESS_TOKEN_KEY: &str = "APP_ACCESS_TOKEN";
/// Storage key of the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "APP_REFRESH_TOKEN";

/// Synchronous storage for the two session tokens.
///
/// Implementations must make `store_pair` and `clear` atomic with respect to
/// the single-token accessors, so no reader observes exactly one token set
/// after a login or logout.
pub trait TokenStore: Send + Sync {
    fn access_token(&self) -> Option<String>;
    fn refresh_token(&self) -> Option<String>;
    fn set_access_token(&self, token: &str);
    fn set_refresh_token(&self, token: &str);
    fn clear_access_token(&self);
    fn clear_refresh_token(&self);

    /// Sets both tokens. Backends holding a lock should override this.
    fn store_pair(&self, access: &str, refresh: &str) {
        self.set_access_token(access);
        self.set_refresh_token(refresh);
    }

    /// Clears both tokens. Backends holding a lock should override this.
    fn clear(&self) {
        self.clear_access_token();
        self.clear_refresh_token();
    }
}

/// Creates the configured store backend.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn TokenStore>, ClientError> {
    match config {
        StoreConfig::Memory => {
            info!("Using in-memory token store; the session will not survive restarts.");
            Ok(Arc::new(MemoryTokenStore::new()))
        }
        StoreConfig::File(file_config) => {
            let store = FileTokenStore::open(&file_config.path)?;
            info!("Using file token store at '{}'", file_config.path.display());
            Ok(Arc::new(store))
        }
    }
}
