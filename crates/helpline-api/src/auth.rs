use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use helpline_chat::ChatService;
use helpline_db::{Database, StoreError};
use helpline_gateway::dispatcher::Dispatcher;
use helpline_types::api::{
    AdminRegisterRequest, AuthResponse, Claims, LoginRequest, RegisterRequest,
};
use helpline_types::models::{AdminType, Role};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub chat: Arc<ChatService>,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
}

pub async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_credentials(&req.username, &req.password)?;

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();

    state
        .db
        .create_user(&user_id.to_string(), &req.username, &password_hash)
        .map_err(|e| match e {
            StoreError::Duplicate => ApiError::Conflict("User already exists!"),
            other => ApiError::Chat(other.into()),
        })?;

    let token = create_token(&state.jwt_secret, user_id, &req.username, Role::User, None)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id,
            username: req.username,
            role: Role::User,
            admin_type: None,
            token,
        }),
    ))
}

pub async fn login_user(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .get_user_by_username(&req.username)
        .map_err(|e| ApiError::Chat(e.into()))?
        .ok_or(ApiError::Unauthorized)?;

    verify_password(&req.password, &user.password)?;

    let user_id: Uuid = user.id.parse().map_err(|_| ApiError::Internal)?;
    let token = create_token(&state.jwt_secret, user_id, &user.username, Role::User, None)?;

    Ok(Json(AuthResponse {
        user_id,
        username: user.username,
        role: Role::User,
        admin_type: None,
        token,
    }))
}

pub async fn register_admin(
    State(state): State<AppState>,
    Json(req): Json<AdminRegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_credentials(&req.username, &req.password)?;

    let password_hash = hash_password(&req.password)?;
    let admin_id = Uuid::new_v4();

    state
        .db
        .create_admin(
            &admin_id.to_string(),
            &req.username,
            &password_hash,
            req.admin_type.as_str(),
        )
        .map_err(|e| match e {
            StoreError::Duplicate => ApiError::Conflict("Admin already exists!"),
            other => ApiError::Chat(other.into()),
        })?;

    let token = create_token(
        &state.jwt_secret,
        admin_id,
        &req.username,
        Role::Admin,
        Some(req.admin_type),
    )?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id: admin_id,
            username: req.username,
            role: Role::Admin,
            admin_type: Some(req.admin_type),
            token,
        }),
    ))
}

pub async fn login_admin(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let admin = state
        .db
        .get_admin_by_username(&req.username)
        .map_err(|e| ApiError::Chat(e.into()))?
        .ok_or(ApiError::Unauthorized)?;

    verify_password(&req.password, &admin.password)?;

    let admin_id: Uuid = admin.id.parse().map_err(|_| ApiError::Internal)?;
    let admin_type: AdminType = admin.admin_type.parse().map_err(|_| ApiError::Internal)?;

    let token = create_token(
        &state.jwt_secret,
        admin_id,
        &admin.username,
        Role::Admin,
        Some(admin_type),
    )?;

    Ok(Json(AuthResponse {
        user_id: admin_id,
        username: admin.username,
        role: Role::Admin,
        admin_type: Some(admin_type),
        token,
    }))
}

fn validate_credentials(username: &str, password: &str) -> Result<(), ApiError> {
    if username.len() < 3 || username.len() > 32 {
        return Err(ApiError::BadRequest("username must be 3-32 characters"));
    }
    if password.len() < 8 {
        return Err(ApiError::BadRequest("password must be at least 8 characters"));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| ApiError::Internal)
}

fn verify_password(password: &str, stored_hash: &str) -> Result<(), ApiError> {
    let parsed_hash = PasswordHash::new(stored_hash).map_err(|_| ApiError::Internal)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)
}

fn create_token(
    secret: &str,
    user_id: Uuid,
    username: &str,
    role: Role,
    admin_type: Option<AdminType>,
) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        role,
        admin_type,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| ApiError::Internal)
}
