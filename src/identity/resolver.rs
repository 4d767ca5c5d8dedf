use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::sync::Cache;

use super::{bounded, IdentityStore, Member};
use crate::auth::generate_tracker;
use crate::error::StoreError;

const MAX_LINEAGE_ATTEMPTS: usize = 3;
const DEFAULT_CACHE_CAPACITY: u64 = 10_000;
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Maps a (possibly absent) prior tracker to the tracker and member the
/// agent should continue as
#[async_trait]
pub trait TrackerResolver: Send + Sync {
    /// Resolve `prior`, or start a new lineage when it is absent or revoked.
    ///
    /// # Errors
    /// Store failures propagate; they never fall back to a fresh identity.
    async fn refresh_sub(&self, prior: Option<&str>) -> Result<(String, Member), StoreError>;

    /// Last member resolved for `tracker`, without a store round-trip
    fn last_known(&self, tracker: &str) -> Option<Member>;

    /// Drop `tracker` from the last-known cache
    fn evict(&self, tracker: &str);
}

/// `TrackerResolver` backed by an `IdentityStore`
///
/// The last-known cache is bounded in size and entries expire after the
/// session lifetime that justified them.
pub struct StoreResolver {
    store: Arc<dyn IdentityStore>,
    timeout: Duration,
    last_known: Cache<String, Member>,
}

impl StoreResolver {
    pub fn new(store: Arc<dyn IdentityStore>, timeout: Duration) -> Self {
        Self::with_cache(store, timeout, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL)
    }

    pub fn with_cache(
        store: Arc<dyn IdentityStore>,
        timeout: Duration,
        capacity: u64,
        time_to_live: Duration,
    ) -> Self {
        let last_known = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(time_to_live)
            .build();

        Self {
            store,
            timeout,
            last_known,
        }
    }

    fn remember(&self, tracker: &str, member: &Member) {
        self.last_known.insert(tracker.to_string(), member.clone());
    }

    async fn new_lineage(&self) -> Result<(String, Member), StoreError> {
        for _ in 0..MAX_LINEAGE_ATTEMPTS {
            let tracker = generate_tracker();
            match bounded(self.timeout, self.store.resolve_or_create(&tracker)).await {
                Ok(member) => {
                    tracing::info!(tracker = %tracker, "New session lineage");
                    return Ok((tracker, member));
                }
                // Collided with a blacklisted tracker; draw again
                Err(StoreError::Revoked(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(StoreError::Unavailable(
            "could not allocate an unrevoked tracker".to_string(),
        ))
    }
}

#[async_trait]
impl TrackerResolver for StoreResolver {
    async fn refresh_sub(&self, prior: Option<&str>) -> Result<(String, Member), StoreError> {
        let resolved = match prior {
            Some(tracker) => match bounded(self.timeout, self.store.resolve_or_create(tracker)).await {
                Ok(member) => (tracker.to_string(), member),
                Err(StoreError::Revoked(_)) => {
                    tracing::warn!(tracker = %tracker, "Revoked tracker presented, starting new lineage");
                    self.evict(tracker);
                    self.new_lineage().await?
                }
                Err(e) => return Err(e),
            },
            None => self.new_lineage().await?,
        };

        self.remember(&resolved.0, &resolved.1);
        Ok(resolved)
    }

    fn last_known(&self, tracker: &str) -> Option<Member> {
        self.last_known.get(tracker)
    }

    fn evict(&self, tracker: &str) {
        self.last_known.invalidate(tracker);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::InMemoryMemberStore;

    struct FailingStore;

    #[async_trait]
    impl IdentityStore for FailingStore {
        async fn resolve_or_create(&self, _tracker: &str) -> Result<Member, StoreError> {
            Err(StoreError::Unavailable("offline".to_string()))
        }

        async fn find_live(&self, _tracker: &str) -> Result<Option<Member>, StoreError> {
            Err(StoreError::Unavailable("offline".to_string()))
        }

        async fn find_by_handle(&self, _handle: &str) -> Result<Option<Member>, StoreError> {
            Err(StoreError::Unavailable("offline".to_string()))
        }

        async fn revoke(&self, _tracker: &str) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
    }

    fn resolver(store: Arc<dyn IdentityStore>) -> StoreResolver {
        StoreResolver::new(store, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_absent_prior_creates_new_lineage() {
        let store = Arc::new(InMemoryMemberStore::new());
        let resolver = resolver(store.clone());

        let (tracker, member) = resolver.refresh_sub(None).await.unwrap();

        assert_eq!(member.handle, tracker);
        assert_eq!(store.len().await, 1);
        assert_eq!(resolver.last_known(&tracker), Some(member));
    }

    #[tokio::test]
    async fn test_prior_tracker_is_kept() {
        let store = Arc::new(InMemoryMemberStore::new());
        let resolver = resolver(store.clone());

        let (tracker, member) = resolver.refresh_sub(Some("abc12345")).await.unwrap();

        assert_eq!(tracker, "abc12345");
        assert_eq!(member.handle, "abc12345");
    }

    #[tokio::test]
    async fn test_revoked_prior_moves_to_new_lineage() {
        let store = Arc::new(InMemoryMemberStore::new());
        let resolver = resolver(store.clone());
        resolver.refresh_sub(Some("abc12345")).await.unwrap();
        store.revoke("abc12345").await.unwrap();

        let (tracker, _) = resolver.refresh_sub(Some("abc12345")).await.unwrap();

        assert_ne!(tracker, "abc12345");
        assert!(resolver.last_known("abc12345").is_none());
    }

    #[tokio::test]
    async fn test_cache_is_bounded() {
        let store = Arc::new(InMemoryMemberStore::new());
        let resolver =
            StoreResolver::with_cache(store, Duration::from_secs(1), 64, Duration::from_secs(60));

        for _ in 0..1_000 {
            resolver.refresh_sub(None).await.unwrap();
        }
        resolver.last_known.run_pending_tasks();

        assert!(resolver.last_known.entry_count() <= 64);
    }

    #[tokio::test]
    async fn test_cache_entries_expire() {
        let store = Arc::new(InMemoryMemberStore::new());
        let resolver = StoreResolver::with_cache(
            store,
            Duration::from_secs(1),
            64,
            Duration::from_millis(50),
        );
        let (tracker, _) = resolver.refresh_sub(None).await.unwrap();
        assert!(resolver.last_known(&tracker).is_some());

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(resolver.last_known(&tracker).is_none());
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let resolver = resolver(Arc::new(FailingStore));

        assert!(matches!(
            resolver.refresh_sub(Some("abc12345")).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(resolver.refresh_sub(None).await, Err(StoreError::Unavailable(_))));
        assert!(resolver.last_known("abc12345").is_none());
    }
}
