/// Session Routes
///
/// Endpoints that expose the identity the session filter attached. All of
/// them are mounted under `SessionMiddleware`; `mutation_probe` and `forget`
/// are additionally behind `MutationMiddleware`.

use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::auth::{Claims, SessionContext, SessionFilter};
use crate::configuration::SessionSettings;
use crate::error::{AppError, ErrorContext};
use crate::identity::{bounded, IdentityStore};

#[derive(Serialize)]
pub struct SessionResponse {
    pub tracker: String,
    pub handle: String,
}

#[derive(Serialize)]
pub struct PingResponse {
    pub tracker: String,
    pub pong: String,
}

#[derive(Serialize)]
pub struct ForgetResponse {
    pub tracker: String,
    pub revoked: bool,
}

/// GET /api/refresh
///
/// Establish or renew the session cookies and report the tracker.
pub async fn refresh(session: web::ReqData<SessionContext>) -> HttpResponse {
    HttpResponse::Ok().json(SessionResponse {
        tracker: session.tracker.clone(),
        handle: session.member.handle.clone(),
    })
}

/// GET /test/ping
pub async fn ping(session: web::ReqData<SessionContext>) -> HttpResponse {
    HttpResponse::Ok().json(PingResponse {
        tracker: session.tracker.clone(),
        pong: chrono::Utc::now().to_rfc3339(),
    })
}

/// GET /test/mutation
///
/// Reachable only with a valid double-submit pair.
pub async fn mutation_probe(
    session: web::ReqData<SessionContext>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "tracker": session.tracker,
        "sub": claims.sub,
    }))
}

/// GET /api/members/me
pub async fn current_member(session: web::ReqData<SessionContext>) -> HttpResponse {
    HttpResponse::Ok().json(&session.member)
}

/// GET /api/members/{handle}
///
/// # Errors
/// - 404: no live member has this handle
/// - 503: identity store unavailable
pub async fn member_by_handle(
    handle: web::Path<String>,
    store: web::Data<dyn IdentityStore>,
    settings: web::Data<SessionSettings>,
) -> Result<HttpResponse, AppError> {
    let member = bounded(settings.store_timeout(), store.find_by_handle(&handle))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("member {}", handle)))?;

    Ok(HttpResponse::Ok().json(member))
}

/// POST /api/mutations/forget
///
/// Revoke the caller's tracker. Subscriptions reject it from now on; the next
/// HTTP request starts a new lineage.
pub async fn forget(
    session: web::ReqData<SessionContext>,
    store: web::Data<dyn IdentityStore>,
    filter: web::Data<SessionFilter>,
    settings: web::Data<SessionSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("forget_tracker").with_tracker(session.tracker.as_str());

    let revoked = bounded(settings.store_timeout(), store.revoke(&session.tracker))
        .await
        .map_err(|e| {
            let e = AppError::from(e);
            context.log_error(&e);
            e
        })?;
    filter.resolver().evict(&session.tracker);

    tracing::info!(
        request_id = %context.request_id,
        tracker = %session.tracker,
        revoked,
        "Tracker forgotten"
    );

    Ok(HttpResponse::Ok().json(ForgetResponse {
        tracker: session.tracker.clone(),
        revoked,
    }))
}
