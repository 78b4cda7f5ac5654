use crate::AppState;
use crate::api::error::AppError;
use crate::api::extract::ApiJson;
use crate::entities::users::{self, PlanTier};
use crate::services::accounts::{NewAccount, ProfileChanges};
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

#[derive(Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(email(message = "Email inválido"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "A senha deve ter no mínimo 6 caracteres"))]
    pub password: String,
    #[serde(default, alias = "nome")]
    #[validate(length(max = 100, message = "Nome muito longo"))]
    pub name: String,
}

#[derive(Serialize, ToSchema)]
pub struct RegisterResponse {
    pub uid: String,
    pub name: String,
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct UserProfile {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
    pub plan: PlanTier,
    pub plan_expires_at: Option<DateTime<Utc>>,
    pub email_verified: bool,
    pub notifications_enabled: bool,
    pub theme: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<users::Model> for UserProfile {
    fn from(user: users::Model) -> Self {
        Self {
            uid: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            photo_url: user.photo_url,
            plan: user.plan,
            plan_expires_at: user.plan_expires_at,
            email_verified: user.email_verified,
            notifications_enabled: user.notifications_enabled,
            theme: user.theme,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct UpdateProfileRequest {
    #[serde(default, alias = "nome")]
    #[validate(length(max = 100, message = "Nome muito longo"))]
    pub name: Option<String>,
    #[serde(default, alias = "telefone")]
    #[validate(length(max = 32, message = "Telefone inválido"))]
    pub phone: Option<String>,
    #[serde(default, alias = "fotoPerfil")]
    pub photo_url: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// First human-readable message of a validation failure.
fn first_message(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Dados inválidos".to_string())
}

fn ensure_owner(claims: &Claims, uid: &str) -> Result<(), AppError> {
    if claims.sub != uid {
        tracing::warn!("User {} tried to act on account {}", claims.sub, uid);
        return Err(AppError::Forbidden("Acesso negado".to_string()));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = RegisterResponse),
        (status = 400, description = "Missing or invalid fields"),
        (status = 409, description = "Email already registered")
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    if payload.email.trim().is_empty()
        || payload.password.is_empty()
        || payload.name.trim().is_empty()
    {
        return Err(AppError::BadRequest(
            "Email, senha e nome são obrigatórios".to_string(),
        ));
    }
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(first_message(&e)))?;

    let user = state
        .accounts
        .register(NewAccount {
            email: payload.email,
            password: payload.password,
            name: payload.name,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            uid: user.id,
            name: user.name,
            email: user.email,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing fields"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::BadRequest(
            "Email e senha são obrigatórios".to_string(),
        ));
    }

    let (token, user) = state
        .accounts
        .login(&payload.email, &payload.password)
        .await?;

    Ok(Json(LoginResponse {
        token,
        user: user.into(),
    }))
}

#[utoipa::path(
    put,
    path = "/auth/profile/{uid}",
    params(("uid" = String, Path, description = "Account id")),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated successfully", body = UserProfile),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Token belongs to another account"),
        (status = 404, description = "User not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "auth"
)]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(uid): Path<String>,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, AppError> {
    ensure_owner(&claims, &uid)?;
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(first_message(&e)))?;

    let user = state
        .accounts
        .update_profile(
            &uid,
            ProfileChanges {
                name: payload.name,
                phone: payload.phone,
                photo_url: payload.photo_url,
            },
        )
        .await?;

    Ok(Json(user.into()))
}

#[utoipa::path(
    delete,
    path = "/auth/delete/{uid}",
    params(("uid" = String, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Token belongs to another account"),
        (status = 404, description = "User not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "auth"
)]
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(uid): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    ensure_owner(&claims, &uid)?;
    state.accounts.delete_account(&uid).await?;

    Ok(Json(MessageResponse {
        message: "Conta deletada com sucesso".to_string(),
    }))
}
