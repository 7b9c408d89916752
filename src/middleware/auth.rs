use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};

use crate::auth::{AuthError, AuthFailure, Principal, RoleGate, TokenVerifier};
use crate::error::ApiError;

/// Verify the bearer token and attach the caller's [`Principal`].
pub async fn authenticate(
    State(verifier): State<Arc<TokenVerifier>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request.headers().get(AUTHORIZATION).cloned();

    let principal = verifier.authenticate(header.as_ref()).await.map_err(|err| {
        if err.kind() != AuthFailure::Unavailable {
            tracing::warn!(
                method = %request.method(),
                path = %request.uri().path(),
                reason = %err,
                "request rejected by token verifier"
            );
        }
        ApiError::from(err)
    })?;

    tracing::debug!(subject = principal.subject_id, role = %principal.role, "request authenticated");
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Let the request through only if the principal's role is in `gate`.
pub async fn enforce_gate(
    State(gate): State<RoleGate>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .copied()
        .ok_or(AuthError::MissingPrincipal)?;

    if let Err(err) = gate.authorize(&principal) {
        tracing::warn!(
            gate = gate.name,
            subject = principal.subject_id,
            role = %principal.role,
            path = %request.uri().path(),
            "role gate denied request"
        );
        return Err(err.into());
    }

    Ok(next.run(request).await)
}

/// Wrap a method router so every handler in it sits behind `gate`.
pub fn gated<S>(gate: RoleGate, route: MethodRouter<S>) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    route.route_layer(middleware::from_fn_with_state(gate, enforce_gate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Role, ADMIN_ONLY, SUPERVISOR_OR_ABOVE};
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    fn router(gate: RoleGate, principal: Option<Principal>) -> Router {
        let mut route = Router::new().route("/", gated(gate, get(|| async { "ok" })));
        if let Some(principal) = principal {
            route = route.layer(axum::Extension(principal));
        }
        route
    }

    async fn status(router: Router) -> StatusCode {
        let request = axum::http::Request::builder().uri("/").body(Body::empty()).unwrap();
        router.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn gate_allows_member_roles() {
        let supervisor = Principal { subject_id: 42, role: Role::Supervisor };
        assert_eq!(status(router(SUPERVISOR_OR_ABOVE, Some(supervisor))).await, StatusCode::OK);
        assert_eq!(status(router(ADMIN_ONLY, Some(supervisor))).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn gate_without_principal_is_a_precondition_failure() {
        assert_eq!(status(router(ADMIN_ONLY, None)).await, StatusCode::BAD_REQUEST);
    }
}
