use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::auth::authorizer::Authorization;

struct CacheEntry {
    authorization: Authorization,
    expires_at: Instant,
}

/// Allow-decision cache keyed by the raw token string.
///
/// An entry never outlives the token it was derived from, and a separate
/// maximum lifetime forces re-validation of long-lived tokens. Denials are
/// never cached.
#[derive(Clone)]
pub(crate) struct DecisionCache {
    max_ttl: Duration,
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl std::fmt::Debug for DecisionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionCache")
            .field("max_ttl", &self.max_ttl)
            .finish()
    }
}

impl DecisionCache {
    pub(crate) fn new(max_ttl: Duration) -> Self {
        Self {
            max_ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub(crate) async fn get(&self, token: &str) -> Option<Authorization> {
        let entries = self.entries.read().await;
        let entry = entries.get(token)?;

        if entry.expires_at <= Instant::now() {
            return None;
        }

        Some(entry.authorization.clone())
    }

    pub(crate) async fn insert(&self, token: &str, authorization: Authorization) {
        let remaining = remaining_validity(authorization.identity.expiry);

        if remaining.is_zero() {
            return;
        }

        let ttl = remaining.min(self.max_ttl);

        let mut entries = self.entries.write().await;

        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);

        entries.insert(
            token.to_string(),
            CacheEntry {
                authorization,
                expires_at: now + ttl,
            },
        );
    }
}

fn remaining_validity(expiry: usize) -> Duration {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as usize;

    Duration::from_secs(expiry.saturating_sub(now) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::authorizer::{AccessDecision, IdentityContext, ResourceScope};

    fn allow(subject: &str, expiry_offset: i64) -> Authorization {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;

        Authorization {
            decision: AccessDecision {
                scope: ResourceScope::Record(subject.to_string()),
            },
            identity: IdentityContext {
                subject: subject.to_string(),
                is_admin: false,
                expiry: (now + expiry_offset) as usize,
            },
        }
    }

    #[tokio::test]
    async fn caches_and_returns_an_allow() {
        let cache = DecisionCache::new(Duration::from_secs(300));

        cache.insert("token-a", allow("u1", 600)).await;

        let hit = cache.get("token-a").await.unwrap();
        assert_eq!(hit.identity.subject, "u1");
        assert!(cache.get("token-b").await.is_none());
    }

    #[tokio::test]
    async fn refuses_entries_for_already_expired_tokens() {
        let cache = DecisionCache::new(Duration::from_secs(300));

        cache.insert("token-a", allow("u1", -10)).await;

        assert!(cache.get("token-a").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn entry_lifetime_is_bounded_by_max_ttl() {
        let cache = DecisionCache::new(Duration::from_secs(1));

        // Token valid for ten minutes, cache lifetime capped at one second.
        cache.insert("token-a", allow("u1", 600)).await;
        assert!(cache.get("token-a").await.is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("token-a").await.is_none());
    }
}
