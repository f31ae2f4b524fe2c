use std::sync::Arc;

use axum::{
    extract::{Extension, Json, State},
    http::HeaderMap,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::{Actor, TokenResponse};
use shared_models::error::AppError;
use shared_utils::extractor::bearer_token;
use shared_utils::jwt::validate_token as decode_token;

fn header_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_value = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    bearer_token(auth_value)
}

pub async fn validate_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = header_token(&headers)?;
    let user = decode_token(token, &config.supabase_jwt_secret).map_err(AppError::Auth)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

/// Never fails on a bad token; answers `{"valid": false}` instead.
pub async fn verify_token(
    State(config): State<Arc<AppConfig>>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Json<Value> {
    let valid = bearer
        .map(|TypedHeader(auth)| decode_token(auth.token(), &config.supabase_jwt_secret).is_ok())
        .unwrap_or(false);

    debug!("Token verification result: {}", valid);
    Json(json!({ "valid": valid }))
}

pub async fn me(Extension(actor): Extension<Actor>) -> Json<Value> {
    let capabilities: Vec<_> = actor.capabilities.iter().collect();

    Json(json!({
        "user_id": actor.user_id,
        "role": actor.role,
        "capabilities": capabilities,
    }))
}
