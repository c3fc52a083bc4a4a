use axum::{
    extract::Request,
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use helpline_types::api::Claims;
use helpline_types::models::{AdminType, Role};

use crate::error::ApiError;

/// Extract and validate JWT from Authorization header.
pub async fn require_auth(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let secret =
        std::env::var("HELPLINE_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

/// The username of a user principal; admins are rejected.
pub fn require_user(claims: &Claims) -> Result<&str, ApiError> {
    match claims.role {
        Role::User => Ok(&claims.username),
        Role::Admin => Err(ApiError::Unauthorized),
    }
}

/// The (username, admin_type) of an admin principal; users are rejected.
pub fn require_admin(claims: &Claims) -> Result<(&str, AdminType), ApiError> {
    match (claims.role, claims.admin_type) {
        (Role::Admin, Some(admin_type)) => Ok((&claims.username, admin_type)),
        _ => Err(ApiError::Unauthorized),
    }
}
