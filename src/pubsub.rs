/// In-process publish/subscribe for subscription events

use tokio::sync::broadcast;

use crate::articles::Article;

const DEFAULT_CAPACITY: usize = 256;

/// Fan-out of `articleAdded` events to every open subscription
pub struct EventHub {
    sender: broadcast::Sender<Article>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event; returns how many subscribers will see it
    pub fn publish(&self, article: Article) -> usize {
        // An error only means nobody is listening
        self.sender.send(article).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Article> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
