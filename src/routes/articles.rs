use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::articles::ArticleStore;
use crate::auth::SessionContext;
use crate::error::{AppError, ErrorContext};

#[derive(Deserialize)]
pub struct ListQuery {
    pub author: Option<String>,
}

#[derive(Deserialize)]
pub struct NewArticle {
    pub text: String,
}

/// GET /api/articles
pub async fn list_articles(
    query: web::Query<ListQuery>,
    articles: web::Data<ArticleStore>,
) -> HttpResponse {
    HttpResponse::Ok().json(articles.list(query.author.as_deref()).await)
}

/// POST /api/mutations/articles
///
/// Publish an article as the session's member; subscribers receive it as an
/// `articleAdded` event.
///
/// # Errors
/// - 400: empty or over-long text
/// - 401/403: rejected by the mutation middleware before reaching here
pub async fn create_article(
    body: web::Json<NewArticle>,
    session: web::ReqData<SessionContext>,
    articles: web::Data<ArticleStore>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("create_article").with_tracker(session.tracker.as_str());

    let article = articles
        .insert(&body.text, &session.member)
        .await
        .map_err(|e| {
            let e = AppError::from(e);
            context.log_error(&e);
            e
        })?;

    tracing::info!(
        request_id = %context.request_id,
        article_id = %article.id,
        "Article created"
    );

    Ok(HttpResponse::Created().json(article))
}
