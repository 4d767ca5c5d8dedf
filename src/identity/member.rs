use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A member: the identity behind one or more trackers
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Member {
    pub id: Uuid,
    /// Display name; the first tracker the member was seen with
    pub handle: String,
    pub trackers: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Member {
    pub fn new(tracker: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            handle: tracker.to_string(),
            trackers: vec![tracker.to_string()],
            created_at: Utc::now(),
        }
    }

    pub fn owns(&self, tracker: &str) -> bool {
        self.trackers.iter().any(|t| t == tracker)
    }
}
