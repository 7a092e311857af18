use crate::types::AuthenticatedUser;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // user id
    pub exp: usize,
}

#[derive(Clone)]
pub struct AuthSecret(pub Arc<String>);

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}

pub fn authenticate_token(token: &str, secret: &str) -> Option<AuthenticatedUser> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|err| debug!(?err, "Rejected bearer token"))
    .ok()?
    .claims;

    claims.sub.parse().ok().map(AuthenticatedUser)
}

/// Resolves the bearer token into an [`AuthenticatedUser`] request extension.
pub async fn require_user(
    State(secret): State<AuthSecret>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(header) = request.headers().get(AUTHORIZATION) else {
        return unauthorized("token not provided");
    };

    let user = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .and_then(|token| authenticate_token(token, &secret.0));

    match user {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => unauthorized("token invalid"),
    }
}
