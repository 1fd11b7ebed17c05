//! The session gate in front of everything below `/api/v1` except the auth
//! endpoints

use std::future::{ready, Ready};

use actix_toolbox::tb_middleware::actix_session::SessionExt;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use futures::future::LocalBoxFuture;

use crate::server::handler::ApiError;

/// Rejects every request whose cookie session is missing the `logged_in`
/// flag.
///
/// `verify_code` sets the flag on a successful login, `logout` purges the
/// whole session.
pub(crate) struct AuthenticationRequired;

impl<S, B> Transform<S, ServiceRequest> for AuthenticationRequired
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Transform = AuthenticationRequiredService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, inner: S) -> Self::Future {
        ready(Ok(AuthenticationRequiredService { inner }))
    }
}

pub(crate) struct AuthenticationRequiredService<S> {
    inner: S,
}

impl<S, B> Service<ServiceRequest> for AuthenticationRequiredService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(inner);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let session = req.get_session();

        let next = self.inner.call(req);
        Box::pin(async move {
            match session.get::<bool>("logged_in") {
                Ok(Some(true)) => next.await,
                Ok(_) => Err(ApiError::Unauthenticated.into()),
                Err(err) => Err(ApiError::SessionGet(err).into()),
            }
        })
    }
}
