/// Subscription Route
///
/// POST /subscriptions opens a server-sent event stream. The session token is
/// taken from the JSON payload, never from cookies; the handshake either
/// fails with 401 and no stream, or answers `subscription_success` followed by
/// `articleAdded` events scoped to the authenticated member.

use actix_web::{http::header, web, HttpResponse};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::articles::Article;
use crate::auth::{SubscriptionAuthenticator, SubscriptionContext};
use crate::error::AppError;
use crate::pubsub::EventHub;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub auth_token: String,
}

#[derive(Serialize)]
struct SubscriptionSuccess<'a> {
    tracker: &'a str,
    handle: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ArticleAdded<'a> {
    article_added: &'a Article,
    /// Whether the subscriber wrote this article
    by_viewer: bool,
}

fn sse_frame(event: &str, data: &impl Serialize) -> Result<web::Bytes, serde_json::Error> {
    let data = serde_json::to_string(data)?;
    Ok(web::Bytes::from(format!("event: {}\ndata: {}\n\n", event, data)))
}

fn article_events(
    events: broadcast::Receiver<Article>,
    context: SubscriptionContext,
) -> impl Stream<Item = Result<web::Bytes, actix_web::Error>> {
    futures::stream::unfold((events, context), |(mut events, context)| async move {
        loop {
            match events.recv().await {
                Ok(article) => {
                    let event = ArticleAdded {
                        article_added: &article,
                        by_viewer: article.author_id == context.member.id,
                    };
                    match sse_frame("articleAdded", &event) {
                        Ok(frame) => return Some((Ok(frame), (events, context))),
                        Err(e) => tracing::error!(error = %e, "Failed to encode event"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(tracker = %context.tracker, skipped, "Subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}

/// POST /subscriptions
///
/// # Errors
/// - 401: token invalid, expired, or its tracker revoked
/// - 503: identity store unavailable
pub async fn subscribe(
    body: web::Json<SubscribeRequest>,
    authenticator: web::Data<SubscriptionAuthenticator>,
    hub: web::Data<EventHub>,
) -> Result<HttpResponse, AppError> {
    let context = authenticator.authenticate(&body.auth_token).await?;

    // Subscribe before acknowledging so nothing published after the ack is lost
    let events = hub.subscribe();
    let ack = sse_frame(
        "subscription_success",
        &SubscriptionSuccess {
            tracker: &context.tracker,
            handle: &context.member.handle,
        },
    )
    .map_err(|e| AppError::Internal(e.to_string()))?;

    let stream = futures::stream::once(futures::future::ready(Ok::<_, actix_web::Error>(ack)))
        .chain(article_events(events, context));

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(stream))
}
