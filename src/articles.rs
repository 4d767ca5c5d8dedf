/// Article feed
///
/// Process-local list of short articles. Every insert is published on the
/// event hub as an `articleAdded` event.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::identity::Member;
use crate::pubsub::EventHub;

pub const MAX_ARTICLE_LENGTH: usize = 280;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Author {
    pub handle: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: Uuid,
    pub text: String,
    pub author: Author,
    #[serde(skip)]
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Article {
    pub fn new(text: String, author: &Member) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            author: Author {
                handle: author.handle.clone(),
            },
            author_id: author.id,
            created_at: Utc::now(),
        }
    }
}

/// Trim and bound article text
pub fn validate_text(text: &str) -> Result<String, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::EmptyField("text".to_string()));
    }
    if text.chars().count() > MAX_ARTICLE_LENGTH {
        return Err(ValidationError::TooLong("text".to_string(), MAX_ARTICLE_LENGTH));
    }
    Ok(text.to_string())
}

pub struct ArticleStore {
    articles: RwLock<Vec<Article>>,
    hub: Arc<EventHub>,
}

impl ArticleStore {
    pub fn new(hub: Arc<EventHub>) -> Self {
        Self {
            articles: RwLock::new(Vec::new()),
            hub,
        }
    }

    pub async fn insert(&self, text: &str, author: &Member) -> Result<Article, ValidationError> {
        let article = Article::new(validate_text(text)?, author);
        self.articles.write().await.push(article.clone());

        let delivered = self.hub.publish(article.clone());
        tracing::debug!(author = %author.handle, delivered, "New article");
        Ok(article)
    }

    /// Articles in insertion order, optionally by one author handle
    pub async fn list(&self, author: Option<&str>) -> Vec<Article> {
        self.articles
            .read()
            .await
            .iter()
            .filter(|article| author.map_or(true, |handle| article.author.handle == handle))
            .cloned()
            .collect()
    }
}
