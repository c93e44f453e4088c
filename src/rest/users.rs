//! Registration, token issuance and the caller's own profile.

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use super::{ApiError, ApiJson, CurrentUser, FieldErrors, SharedState};
use crate::auth::verify_password;
use crate::models::{is_valid_email, NewUser, User};

pub(crate) const MAX_CHARS: usize = 255;

pub(crate) const REQUIRED: &str = "This field is required.";
pub(crate) const BLANK: &str = "This field may not be blank.";
const BAD_CREDENTIALS: &str = "Unable to authenticate with provided credentials.";

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "user@example.com")]
    pub email: Option<String>,
    #[schema(example = "testpass123")]
    pub password: Option<String>,
    pub name: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct TokenRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Profile changes; an `email` key is accepted and ignored.
#[derive(Deserialize, ToSchema)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub email: String,
    pub name: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

/// Trimmed value of a required text field; records an error and returns
/// an empty string when it is missing or blank.
pub(crate) fn required_text(errors: &mut FieldErrors, field: &str, value: Option<String>) -> String {
    match value.map(|v| v.trim().to_string()) {
        None => {
            errors.add(field, REQUIRED);
            String::new()
        }
        Some(v) if v.is_empty() => {
            errors.add(field, BLANK);
            v
        }
        Some(v) => v,
    }
}

pub(crate) fn check_max_chars(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.chars().count() > MAX_CHARS {
        errors.add(field, format!("Ensure this field has no more than {MAX_CHARS} characters."));
    }
}

fn check_password(errors: &mut FieldErrors, password: &str, min_len: usize) {
    if password.trim().is_empty() {
        errors.add("password", BLANK);
    } else if password.chars().count() < min_len {
        errors.add("password", format!("Ensure this field has at least {min_len} characters."));
    }
}

async fn hash_in_background(state: &SharedState, password: String) -> Result<String, ApiError> {
    let auth = state.auth.clone();
    Ok(tokio::task::spawn_blocking(move || auth.hash_password(&password)).await??)
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/users/",
    tag = "users",
    security(()),
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Invalid fields or email already registered")
    )
)]
pub async fn register(
    State(state): State<SharedState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let mut errors = FieldErrors::default();
    let email = required_text(&mut errors, "email", payload.email);
    if !email.is_empty() {
        if !is_valid_email(&email) {
            errors.add("email", "Enter a valid email address.");
        }
        check_max_chars(&mut errors, "email", &email);
    }
    match &payload.password {
        Some(password) => check_password(&mut errors, password, state.config.min_password_len),
        None => errors.add("password", REQUIRED),
    }
    let name = required_text(&mut errors, "name", payload.name);
    check_max_chars(&mut errors, "name", &name);
    errors.check()?;

    let password_hash = hash_in_background(&state, payload.password.unwrap_or_default()).await?;
    let user = state.storage.create_user(NewUser {
        email,
        name,
        password_hash,
        ..NewUser::default()
    })?;

    info!(user_id = user.id, "user registered");
    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/users/token/",
    tag = "users",
    security(()),
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Blank fields or bad credentials")
    )
)]
pub async fn create_token(
    State(state): State<SharedState>,
    ApiJson(payload): ApiJson<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let mut errors = FieldErrors::default();
    let email = required_text(&mut errors, "email", payload.email);
    let password = match payload.password {
        Some(password) if password.trim().is_empty() => {
            errors.add("password", BLANK);
            password
        }
        Some(password) => password,
        None => {
            errors.add("password", REQUIRED);
            String::new()
        }
    };
    errors.check()?;

    let user = match state.storage.find_user_by_email(&email)? {
        Some(user) if user.is_active => user,
        _ => return Err(FieldErrors::single("non_field_errors", BAD_CREDENTIALS).into()),
    };

    let hash = user.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash).unwrap_or(false)).await?;
    if !verified {
        info!(user_id = user.id, "token request with wrong password");
        return Err(FieldErrors::single("non_field_errors", BAD_CREDENTIALS).into());
    }

    let token = state.auth.create_jwt(user.id)?;
    Ok(Json(TokenResponse { token }))
}

/// The authenticated account
#[utoipa::path(
    get,
    path = "/users/me/",
    tag = "users",
    responses(
        (status = 200, body = UserResponse),
        (status = 401, body = super::error::ErrorDetail)
    )
)]
pub async fn me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<UserResponse> {
    Json(UserResponse::from(&user))
}

/// Change the caller's name and/or password
#[utoipa::path(
    patch,
    path = "/users/me/",
    tag = "users",
    request_body = ProfileUpdate,
    responses(
        (status = 200, body = UserResponse),
        (status = 400, description = "Invalid fields"),
        (status = 401, body = super::error::ErrorDetail)
    )
)]
pub async fn update_me(
    State(state): State<SharedState>,
    Extension(CurrentUser(mut user)): Extension<CurrentUser>,
    ApiJson(payload): ApiJson<ProfileUpdate>,
) -> Result<Json<UserResponse>, ApiError> {
    let mut errors = FieldErrors::default();
    let name = payload.name.map(|name| {
        let name = required_text(&mut errors, "name", Some(name));
        check_max_chars(&mut errors, "name", &name);
        name
    });
    if let Some(password) = &payload.password {
        check_password(&mut errors, password, state.config.min_password_len);
    }
    errors.check()?;

    if let Some(name) = name {
        user.name = name;
    }
    if let Some(password) = payload.password {
        user.password_hash = hash_in_background(&state, password).await?;
    }
    state.storage.update_user(&user)?;

    Ok(Json(UserResponse::from(&user)))
}
