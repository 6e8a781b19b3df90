use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};

use crate::auth::token::{Claims, TokenAuthority};
use crate::error::AppError;
use crate::models::Role;

/// Exact-match role check.
///
/// Allow iff the claimed role equals the required role. There is no
/// hierarchy: an admin is denied where role `user` is required, and vice
/// versa. Denial is a 403, distinct from the 401 produced by failed
/// authentication.
pub fn authorize(role: Role, required: Role) -> Result<(), AppError> {
    if role == required {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Authorization failed: insufficient permissions or role.".into(),
        ))
    }
}

/// Authentication middleware.
///
/// Extracts the Bearer token, validates it against the `TokenAuthority`
/// (signature, expiry, revocation registry), and inserts the decoded
/// `Claims` into request extensions for handlers and the role gate.
/// Requests without valid credentials are rejected with a 401 before any
/// handler runs.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService { service }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Login and registration are the only routes inside the scope that
        // must stay reachable without credentials.
        let path = req.path();
        if path.starts_with("/api/auth/login") || path.starts_with("/api/auth/register") {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        let authority = match req.app_data::<web::Data<TokenAuthority>>() {
            Some(authority) => authority.clone(),
            None => {
                let err = AppError::InternalServerError("Token authority not configured".into());
                return Box::pin(async move { Err(err.into()) });
            }
        };

        let bearer = req
            .headers()
            .get("Authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        match bearer {
            Some(token) => match authority.validate(token) {
                Ok(claims) => {
                    req.extensions_mut().insert(claims);
                    let fut = self.service.call(req);
                    Box::pin(fut)
                }
                Err(app_err) => Box::pin(async move { Err(app_err.into()) }),
            },
            None => {
                let app_err = AppError::Unauthorized("Missing token".into());
                Box::pin(async move { Err(app_err.into()) })
            }
        }
    }
}

/// Role gate middleware.
///
/// Runs after `AuthMiddleware` and checks the authenticated claims against
/// a required role held as an explicit field. A request that never passed
/// authentication has no claims and is rejected with a 401; a role mismatch
/// is a 403.
pub struct RequireRole {
    role: Role,
}

impl RequireRole {
    pub fn new(role: Role) -> Self {
        Self { role }
    }

    pub fn admin() -> Self {
        Self::new(Role::Admin)
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequireRole
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RequireRoleService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireRoleService {
            service,
            role: self.role,
        }))
    }
}

pub struct RequireRoleService<S> {
    service: S,
    role: Role,
}

impl<S, B> Service<ServiceRequest> for RequireRoleService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let claimed_role = req.extensions().get::<Claims>().map(|claims| claims.role);

        match claimed_role {
            Some(role) => match authorize(role, self.role) {
                Ok(()) => Box::pin(self.service.call(req)),
                Err(app_err) => Box::pin(async move { Err(app_err.into()) }),
            },
            None => {
                // Authentication comes first; without claims this request
                // never passed the auth middleware.
                let app_err = AppError::Unauthorized("Missing token".into());
                Box::pin(async move { Err(app_err.into()) })
            }
        }
    }
}
