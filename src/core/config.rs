use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct Args {
    pub(crate) database_host: String,
    pub(crate) database_port: u16,
    pub(crate) database_name: String,
    pub(crate) database_user: String,
    pub(crate) database_password: String,
    pub(crate) log_level: String,
    pub(crate) port: u16,
    pub(crate) admin_group: String,
    pub(crate) token_issuer: String,
    pub(crate) token_audience: String,
    pub(crate) jwks_url: String,
    pub(crate) key_ttl_secs: u64,
    pub(crate) key_refresh_cooldown_secs: u64,
    pub(crate) decision_ttl_secs: u64,
    pub(crate) upstream_timeout_secs: u64,
}
