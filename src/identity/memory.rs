use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{IdentityStore, Member};
use crate::error::StoreError;

#[derive(Default)]
struct Members {
    by_tracker: HashMap<String, Member>,
    revoked: HashSet<String>,
}

/// Process-local identity store
///
/// Creation happens under the write lock with an entry-or-insert, so racing
/// requests for the same tracker all observe the first member inserted.
#[derive(Default)]
pub struct InMemoryMemberStore {
    members: RwLock<Members>,
}

impl InMemoryMemberStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live trackers
    pub async fn len(&self) -> usize {
        self.members.read().await.by_tracker.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl IdentityStore for InMemoryMemberStore {
    async fn resolve_or_create(&self, tracker: &str) -> Result<Member, StoreError> {
        {
            let members = self.members.read().await;
            if let Some(member) = members.by_tracker.get(tracker) {
                return Ok(member.clone());
            }
            if members.revoked.contains(tracker) {
                return Err(StoreError::Revoked(tracker.to_string()));
            }
        }

        let mut members = self.members.write().await;
        if members.revoked.contains(tracker) {
            return Err(StoreError::Revoked(tracker.to_string()));
        }
        let member = members
            .by_tracker
            .entry(tracker.to_string())
            .or_insert_with(|| {
                tracing::info!(tracker = %tracker, "New member");
                Member::new(tracker)
            })
            .clone();
        Ok(member)
    }

    async fn find_live(&self, tracker: &str) -> Result<Option<Member>, StoreError> {
        let members = self.members.read().await;
        Ok(members.by_tracker.get(tracker).cloned())
    }

    async fn find_by_handle(&self, handle: &str) -> Result<Option<Member>, StoreError> {
        let members = self.members.read().await;
        Ok(members
            .by_tracker
            .values()
            .find(|member| member.handle == handle)
            .cloned())
    }

    async fn revoke(&self, tracker: &str) -> Result<bool, StoreError> {
        let mut members = self.members.write().await;
        members.revoked.insert(tracker.to_string());
        let detached = members.by_tracker.remove(tracker).is_some();
        tracing::info!(tracker = %tracker, detached, "Tracker revoked");
        Ok(detached)
    }
}
