use std::sync::Arc;

use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
    body::Body,
};
use tracing::debug;

use shared_models::auth::{Actor, User};
use shared_models::error::AppError;
use shared_config::AppConfig;

use crate::jwt::validate_token;

/// Pulls the bearer token out of an `Authorization` header value.
pub fn bearer_token(auth_value: &str) -> Result<&str, AppError> {
    auth_value
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

// Validates the token and stores both the raw `User` and the derived `Actor`
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = bearer_token(auth_value)?.to_string();

    let user = validate_token(&token, &config.supabase_jwt_secret)
        .map_err(AppError::Auth)?;

    let actor = Actor::from_user(&user, &token).map_err(AppError::Auth)?;
    debug!("Authenticated {} as {}", actor.user_id, actor.role);

    request.extensions_mut().insert(user);
    request.extensions_mut().insert(actor);

    Ok(next.run(request).await)
}

pub fn extract_user<B>(request: &Request<B>) -> Result<User, AppError> {
    request
        .extensions()
        .get::<User>()
        .cloned()
        .ok_or_else(|| AppError::Auth("User not found in request extensions".to_string()))
}

pub fn extract_actor<B>(request: &Request<B>) -> Result<Actor, AppError> {
    request
        .extensions()
        .get::<Actor>()
        .cloned()
        .ok_or_else(|| AppError::Auth("Actor not found in request extensions".to_string()))
}
