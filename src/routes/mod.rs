mod articles;
mod health_check;
mod session;
mod subscriptions;

pub use articles::{create_article, list_articles};
pub use health_check::health_check;
pub use session::{current_member, forget, member_by_handle, mutation_probe, ping, refresh};
pub use subscriptions::subscribe;
