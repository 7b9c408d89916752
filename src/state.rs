use std::sync::Arc;

use crate::auth::{TokenCodec, TokenVerifier};
use crate::config::{AppConfig, StoreBackend};
use crate::store::{MemoryStore, PostgresStore, PostgrestStore, StoreError, TableStore};

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn TableStore>,
    pub tokens: Arc<TokenCodec>,
    pub verifier: Arc<TokenVerifier>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn TableStore>) -> Self {
        let tokens = Arc::new(TokenCodec::new(
            &config.auth.jwt_secret,
            config.auth.token_ttl(),
            config.auth.token_leeway_secs,
        ));
        let verifier = Arc::new(TokenVerifier::new(
            tokens.clone(),
            store.clone(),
            config.auth.role_lookup_timeout(),
        ));

        Self {
            config: Arc::new(config),
            store,
            tokens,
            verifier,
        }
    }
}

/// Build the table store selected by the configuration.
pub async fn connect_store(config: &AppConfig) -> Result<Arc<dyn TableStore>, StoreError> {
    let settings = &config.store;
    let store: Arc<dyn TableStore> = match settings.backend {
        StoreBackend::Postgrest => Arc::new(PostgrestStore::new(
            settings.supabase_url.as_deref().unwrap_or_default(),
            settings.supabase_key.as_deref().unwrap_or_default(),
            settings.request_timeout(),
        )?),
        StoreBackend::Postgres => Arc::new(
            PostgresStore::connect(
                settings.database_url.as_deref().unwrap_or_default(),
                settings.max_connections,
                settings.request_timeout(),
            )
            .await?,
        ),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };
    tracing::info!(backend = store.backend(), "table store ready");
    Ok(store)
}
