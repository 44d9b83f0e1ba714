use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    typed_header::TypedHeaderRejection,
    TypedHeader,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use skyway_core::access::{Capability, Principal};
use skyway_core::models::{Role, User};
use skyway_store::app_config::AuthConfig;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub jti: String,
    pub iat: usize,
    pub exp: usize,
}

/// The authenticated caller, placed in request extensions by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub principal: Principal,
    pub email: String,
    pub jti: String,
    pub exp: usize,
}

impl AuthUser {
    pub fn user_id(&self) -> Uuid {
        self.principal.user_id
    }

    pub fn require(&self, capability: Capability) -> Result<(), AppError> {
        self.principal.require(capability).map_err(AppError::from)
    }

    /// Seconds until the token expires; at least one.
    pub fn remaining_ttl(&self) -> u64 {
        let now = Utc::now().timestamp().max(0) as usize;
        self.exp.saturating_sub(now).max(1) as u64
    }
}

pub fn issue_token(auth: &AuthConfig, user: &User) -> Result<(String, Claims), AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        role: user.role.as_str().to_owned(),
        jti: Uuid::new_v4().to_string(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::seconds(auth.jwt_expiration_seconds as i64)).timestamp() as usize,
    };

    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.jwt_secret.as_bytes()))
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))?;

    Ok((token, claims))
}

// ============================================================================
// Authentication Middleware
// ============================================================================

pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // 1. Bearer token from the Authorization header
    let TypedHeader(Authorization(bearer)) = bearer
        .map_err(|_| AppError::AuthenticationError("Missing bearer token".to_string()))?;

    // 2. Signature and expiry
    let token_data = decode::<Claims>(
        bearer.token(),
        &DecodingKey::from_secret(state.auth.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthenticationError("Invalid or expired token".to_string()))?;
    let claims = token_data.claims;

    // 3. Logged out tokens
    if state.sessions.is_revoked(&claims.jti).await? {
        return Err(AppError::AuthenticationError("Token has been revoked".to_string()));
    }

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::AuthenticationError("Invalid token subject".to_string()))?;
    let role: Role = claims
        .role
        .parse()
        .map_err(|_| AppError::AuthenticationError("Invalid token role".to_string()))?;

    // 4. Inject the caller
    req.extensions_mut().insert(AuthUser {
        principal: Principal::new(user_id, role),
        email: claims.email,
        jti: claims.jti,
        exp: claims.exp,
    });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            jwt_expiration_seconds: 600,
            bcrypt_cost: 4,
            admin_email: None,
            admin_password: None,
        }
    }

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Jane".to_string(),
            email: "jane@example.com".to_string(),
            password_hash: String::new(),
            role,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_issued_token_round_trips() {
        let config = auth_config();
        let user = user(Role::Admin);
        let (token, claims) = issue_token(&config, &user).unwrap();

        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .unwrap()
        .claims;

        assert_eq!(decoded.sub, user.id.to_string());
        assert_eq!(decoded.role, "ADMIN");
        assert_eq!(decoded.jti, claims.jti);
        assert!(decoded.exp > decoded.iat);
    }

    #[test]
    fn test_each_token_gets_fresh_jti() {
        let config = auth_config();
        let user = user(Role::Customer);
        let (_, a) = issue_token(&config, &user).unwrap();
        let (_, b) = issue_token(&config, &user).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_remaining_ttl_never_zero() {
        let expired = AuthUser {
            principal: Principal::new(Uuid::new_v4(), Role::Customer),
            email: String::new(),
            jti: String::new(),
            exp: 0,
        };
        assert_eq!(expired.remaining_ttl(), 1);
    }
}
