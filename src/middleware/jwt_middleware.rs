/// Access Token Middleware
///
/// Validates the access token from the `Authorization: Bearer` header or the
/// `access_token` cookie and injects its claims into request extensions.
/// Validation is stateless: no store is consulted.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::TokenValidator;
use crate::error::{AppError, TokenError};
use crate::routes::ACCESS_TOKEN_COOKIE;

/// Middleware for routes that require an access token
pub struct JwtMiddleware {
    validator: TokenValidator,
}

impl JwtMiddleware {
    pub fn new(validator: TokenValidator) -> Self {
        Self { validator }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            validator: self.validator.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    validator: TokenValidator,
}

fn access_token(req: &ServiceRequest) -> Option<String> {
    let bearer = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string);

    bearer.or_else(|| {
        req.request()
            .cookie(ACCESS_TOKEN_COOKIE)
            .map(|c| c.value().to_string())
    })
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
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
        let claims = match access_token(&req) {
            None => Err(TokenError::Malformed),
            Some(token) => self.validator.verify(&token),
        };

        match claims {
            Ok(claims) => {
                tracing::debug!(user_id = %claims.sub, "Access token validated");
                req.extensions_mut().insert(claims);

                let service = self.service.clone();
                Box::pin(async move {
                    service
                        .call(req)
                        .await
                        .map(ServiceResponse::map_into_left_body)
                })
            }
            Err(reason) => {
                tracing::warn!(reason = %reason, path = %req.path(), "Access token rejected");
                // Rendered inside the request-id scope set by RequestLogger.
                Box::pin(async move {
                    Ok(req
                        .error_response(AppError::Unauthenticated(reason))
                        .map_into_right_body())
                })
            }
        }
    }
}
