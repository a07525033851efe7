use std::sync::Arc;
use std::time::Duration;

use crate::auth::authorizer::TokenAuthorizer;
use crate::auth::cache::DecisionCache;
use crate::auth::keys::KeyStore;
use crate::controllers::record::RecordController;
use crate::core::config::Args;
use crate::core::error::ConfigError;
use crate::core::store::PgRecordStore;

#[derive(Clone, Debug)]
pub(crate) struct AppState {
    pub(crate) authorizer: Arc<TokenAuthorizer>,
    pub(crate) decisions: DecisionCache,
    pub(crate) records: RecordController,
}

impl AppState {
    pub(crate) fn new(config: &Args, store: PgRecordStore) -> Result<Self, ConfigError> {
        let upstream_timeout = Duration::from_secs(config.upstream_timeout_secs);

        let keys = KeyStore::new(
            config.jwks_url.clone(),
            Duration::from_secs(config.key_ttl_secs),
            Duration::from_secs(config.key_refresh_cooldown_secs),
            upstream_timeout,
        )?;

        let authorizer = TokenAuthorizer::new(
            keys,
            config.token_issuer.clone(),
            config.token_audience.clone(),
            config.admin_group.clone(),
        );

        Ok(AppState {
            authorizer: Arc::new(authorizer),
            decisions: DecisionCache::new(Duration::from_secs(config.decision_ttl_secs)),
            records: RecordController::new(Arc::new(store), upstream_timeout)?,
        })
    }
}
