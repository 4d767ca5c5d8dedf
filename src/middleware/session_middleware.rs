/// Session Middleware
///
/// Binds the session filter to actix: reads the token cookies, attaches the
/// resolved `SessionContext` to the request extensions, and writes the
/// filter's cookie instructions onto whatever response the inner service
/// produces.

use actix_web::{
    body::EitherBody,
    cookie::{time::Duration, Cookie, SameSite},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage, ResponseError,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::{CookieInstruction, SessionFilter, REFRESH_COOKIE, SESSION_COOKIE};

pub(crate) fn to_cookie(instruction: &CookieInstruction) -> Cookie<'static> {
    let mut builder = Cookie::build(instruction.name, instruction.value.clone())
        .path("/")
        .http_only(instruction.http_only)
        .secure(instruction.secure)
        .same_site(SameSite::Lax);
    if let Some(max_age) = instruction.max_age {
        builder = builder.max_age(Duration::seconds(max_age));
    }
    builder.finish()
}

/// Associate-and-refresh filter for every API route
pub struct SessionMiddleware {
    filter: Arc<SessionFilter>,
}

impl SessionMiddleware {
    pub fn new(filter: Arc<SessionFilter>) -> Self {
        Self { filter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = SessionMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(SessionMiddlewareService {
            service: Rc::new(service),
            filter: self.filter.clone(),
        }))
    }
}

pub struct SessionMiddlewareService<S> {
    service: Rc<S>,
    filter: Arc<SessionFilter>,
}

impl<S, B> Service<ServiceRequest> for SessionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let refresh = req.cookie(REFRESH_COOKIE).map(|c| c.value().to_string());
        let session = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string());

        let filter = self.filter.clone();
        let service = self.service.clone();

        Box::pin(async move {
            let association = match filter.associate(refresh.as_deref(), session.as_deref()).await {
                Ok(association) => association,
                Err(e) => {
                    let response = e.error_response();
                    let (request, _) = req.into_parts();
                    return Ok(ServiceResponse::new(request, response).map_into_right_body());
                }
            };

            tracing::debug!(
                tracker = %association.context.tracker,
                renewed = association.context.renewed,
                "Session associated"
            );
            req.extensions_mut().insert(association.context);

            let mut res = service.call(req).await?;
            for instruction in &association.cookies {
                if let Err(e) = res.response_mut().add_cookie(&to_cookie(instruction)) {
                    tracing::error!(cookie = instruction.name, error = %e, "Failed to set cookie");
                }
            }

            Ok(res.map_into_left_body())
        })
    }
}
