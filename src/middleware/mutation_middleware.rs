/// Mutation Middleware
///
/// Guards state-changing routes with the double-submit check. Must be nested
/// inside `SessionMiddleware`, which supplies the `SessionContext`. On success
/// the verified header claims are injected into request extensions.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpMessage, ResponseError,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::{MutationGuard, SessionContext};
use crate::error::AppError;

pub struct MutationMiddleware {
    guard: MutationGuard,
}

impl MutationMiddleware {
    pub fn new(guard: MutationGuard) -> Self {
        Self { guard }
    }
}

impl<S, B> Transform<S, ServiceRequest> for MutationMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = MutationMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(MutationMiddlewareService {
            service: Rc::new(service),
            guard: self.guard.clone(),
        }))
    }
}

pub struct MutationMiddlewareService<S> {
    service: Rc<S>,
    guard: MutationGuard,
}

impl<S, B> Service<ServiceRequest> for MutationMiddlewareService<S>
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
        let authorization = req
            .headers()
            .get(header::AUTHORIZATION)
            // A present but non-ASCII header is still present: it fails as unverifiable
            .map(|h| h.to_str().unwrap_or_default().to_string());

        let outcome = match req.extensions().get::<SessionContext>() {
            Some(context) => self
                .guard
                .check(authorization.as_deref(), context)
                .map_err(AppError::from),
            None => Err(AppError::Internal(
                "mutation route mounted outside the session middleware".to_string(),
            )),
        };

        match outcome {
            Ok(claims) => {
                tracing::debug!(tracker = %claims.sub, "Mutation authorized");
                req.extensions_mut().insert(claims);

                let service = self.service.clone();
                Box::pin(async move {
                    service
                        .call(req)
                        .await
                        .map(ServiceResponse::map_into_left_body)
                })
            }
            Err(e) => {
                let response = e.error_response();
                let (request, _) = req.into_parts();
                Box::pin(async move {
                    Ok(ServiceResponse::new(request, response).map_into_right_body())
                })
            }
        }
    }
}
