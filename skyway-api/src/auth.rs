use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;

use skyway_core::identity::{verify_password, Credentials, Registration};
use skyway_core::models::{Role, User};
use skyway_shared::pii::Masked;

use crate::error::AppError;
use crate::middleware::auth::{auth_middleware, issue_token, AuthUser};
use crate::state::AppState;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user: User,
}

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/v1/auth/logout", post(logout))
        .route("/v1/auth/me", get(me))
        .route_layer(from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/v1/auth/register", post(register))
        .route("/v1/auth/login", post(login))
        .merge(protected)
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<Registration>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = create_account(&state, req, Role::Customer).await?;
    tracing::info!("Registered user {} ({})", user.id, Masked::new(&user.email));
    Ok((StatusCode::CREATED, Json(user)))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<Credentials>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = state
        .users
        .find_by_email(req.email.expose())
        .await?
        .ok_or_else(|| AppError::AuthenticationError(INVALID_CREDENTIALS.to_string()))?;

    let password = req.password.into_inner();
    let hash = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?;
    if !valid {
        tracing::info!("Failed login for user {}", user.id);
        return Err(AppError::AuthenticationError(INVALID_CREDENTIALS.to_string()));
    }

    let (token, _) = issue_token(&state.auth, &user)?;
    Ok(Json(AuthResponse {
        token,
        token_type: "Bearer",
        expires_in: state.auth.jwt_expiration_seconds,
        user,
    }))
}

async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<StatusCode, AppError> {
    state.sessions.revoke(&auth.jti, auth.remaining_ttl()).await?;
    tracing::info!("User {} logged out", auth.user_id());
    Ok(StatusCode::NO_CONTENT)
}

async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<User>, AppError> {
    let user = state
        .users
        .get_user(auth.user_id())
        .await?
        .ok_or_else(|| AppError::NotFoundError("User not found".to_string()))?;
    Ok(Json(user))
}

/// Validates, hashes on a blocking thread, and stores a new account.
async fn create_account(state: &AppState, registration: Registration, role: Role) -> Result<User, AppError> {
    registration.validate()?;
    let cost = state.auth.bcrypt_cost;
    let user = tokio::task::spawn_blocking(move || registration.into_user(role, cost)).await??;
    state.users.create_user(&user).await?;
    Ok(user)
}

/// Creates the configured admin account unless that email is already taken.
/// Returns whether an account was created.
pub async fn ensure_admin(state: &AppState, email: &str, password: &str) -> Result<bool, AppError> {
    if state.users.find_by_email(email).await?.is_some() {
        return Ok(false);
    }

    let registration = Registration {
        name: "Administrator".to_string(),
        email: Masked::new(email.to_string()),
        password: Masked::new(password.to_string()),
    };
    let admin = create_account(state, registration, Role::Admin).await?;
    tracing::info!("Created bootstrap admin {}", admin.id);
    Ok(true)
}
