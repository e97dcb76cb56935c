use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::error::{AppError, Result};
use crate::models::{Claims, CurrentUser};
use crate::AppState;

/// Authentication middleware
/// Extracts and validates the bearer JWT issued by the PINOVARA backend
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => {
            return Err(AppError::Unauthorized(
                "Missing or invalid Authorization header".to_string(),
            ));
        }
    };

    let current_user = validate_token(token, &state.config.jwt.secret)?;
    request.extensions_mut().insert(current_user);

    Ok(next.run(request).await)
}

/// Verify signature and expiry, returning the user the token speaks for
pub fn validate_token(token: &str, secret: &str) -> Result<CurrentUser> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?
    .claims;
    Ok(CurrentUser::from(claims))
}
