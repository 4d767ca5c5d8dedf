/// Identity module
///
/// The identity store the session protocol consults, the `Member` identity it
/// resolves trackers to, and the tracker resolver capability injected into the
/// session filter.

mod member;
mod memory;
mod resolver;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

pub use member::Member;
pub use memory::InMemoryMemberStore;
pub use resolver::{StoreResolver, TrackerResolver};

/// Persistent identities keyed by tracker
///
/// Implementations must make `resolve_or_create` idempotent: concurrent calls
/// for one tracker resolve to a single member.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Find the member owning `tracker`, creating one if none exists
    ///
    /// # Errors
    /// `StoreError::Revoked` if the tracker has been blacklisted.
    async fn resolve_or_create(&self, tracker: &str) -> Result<Member, StoreError>;

    /// Live lookup: `None` for unknown or revoked trackers
    async fn find_live(&self, tracker: &str) -> Result<Option<Member>, StoreError>;

    /// Live member whose display handle is `handle`
    async fn find_by_handle(&self, handle: &str) -> Result<Option<Member>, StoreError>;

    /// Blacklist a tracker. Returns whether a live member was detached.
    async fn revoke(&self, tracker: &str) -> Result<bool, StoreError>;
}

/// Run a store call under a deadline
pub async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| StoreError::Timeout(timeout))?
}
