use actix_web::HttpResponse;

/// Liveness probe. Mounted outside the session filter: it never sets cookies.
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}
