//! `/tags/` and `/ingredients/`. Both kinds share the handlers below; the
//! public functions only pin the [`LabelKind`] so each route gets its own
//! OpenAPI entry.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::users::{check_max_chars, required_text};
use super::{ApiError, ApiJson, ApiPath, CurrentUser, FieldErrors, SharedState};
use crate::filters::parse_assigned_only;
use crate::models::{Label, LabelKind};

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LabelQuery {
    /// Non-zero: only labels linked to at least one of your recipes.
    #[param(value_type = Option<i64>, example = 1)]
    pub assigned_only: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LabelPayload {
    #[schema(example = "Vegan")]
    pub name: Option<String>,
}

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct LabelResponse {
    pub id: u64,
    pub name: String,
}

impl From<Label> for LabelResponse {
    fn from(label: Label) -> Self {
        Self {
            id: label.id,
            name: label.name,
        }
    }
}

async fn list(
    state: SharedState,
    kind: LabelKind,
    user: &CurrentUser,
    query: LabelQuery,
) -> Result<Json<Vec<LabelResponse>>, ApiError> {
    let assigned_only = parse_assigned_only(query.assigned_only.as_deref())
        .map_err(|e| FieldErrors::single("assigned_only", e.to_string()))?;
    let labels = state.storage.list_labels(kind, user.0.id, assigned_only)?;
    Ok(Json(labels.into_iter().map(LabelResponse::from).collect()))
}

async fn create(
    state: SharedState,
    kind: LabelKind,
    user: &CurrentUser,
    payload: LabelPayload,
) -> Result<(StatusCode, Json<LabelResponse>), ApiError> {
    let mut errors = FieldErrors::default();
    let name = required_text(&mut errors, "name", payload.name);
    check_max_chars(&mut errors, "name", &name);
    errors.check()?;

    let label = state.storage.create_label(kind, user.0.id, &name)?;
    info!(%kind, label_id = label.id, user_id = user.0.id, "label created");
    Ok((StatusCode::CREATED, Json(label.into())))
}

async fn retrieve(state: SharedState, kind: LabelKind, user: &CurrentUser, id: u64) -> Result<Json<LabelResponse>, ApiError> {
    let label = state.storage.get_label(kind, user.0.id, id)?.ok_or(ApiError::NotFound)?;
    Ok(Json(label.into()))
}

/// PUT needs `name`; PATCH without it leaves the label as is.
async fn update(
    state: SharedState,
    kind: LabelKind,
    user: &CurrentUser,
    id: u64,
    partial: bool,
    payload: LabelPayload,
) -> Result<Json<LabelResponse>, ApiError> {
    let owner = user.0.id;
    let name = match payload.name {
        None if partial => {
            let label = state.storage.get_label(kind, owner, id)?.ok_or(ApiError::NotFound)?;
            return Ok(Json(label.into()));
        }
        name => {
            let mut errors = FieldErrors::default();
            let name = required_text(&mut errors, "name", name);
            check_max_chars(&mut errors, "name", &name);
            errors.check()?;
            name
        }
    };
    let label = state.storage.rename_label(kind, owner, id, &name)?;
    Ok(Json(label.into()))
}

async fn destroy(state: SharedState, kind: LabelKind, user: &CurrentUser, id: u64) -> Result<StatusCode, ApiError> {
    state.storage.delete_label(kind, user.0.id, id)?;
    info!(%kind, label_id = id, user_id = user.0.id, "label deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// List your tags
#[utoipa::path(
    get,
    path = "/tags/",
    tag = "tags",
    params(LabelQuery),
    responses(
        (status = 200, body = [LabelResponse]),
        (status = 400, description = "assigned_only is not an integer")
    )
)]
pub async fn list_tags(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<LabelQuery>,
) -> Result<Json<Vec<LabelResponse>>, ApiError> {
    list(state, LabelKind::Tag, &user, query).await
}

/// Create a tag
#[utoipa::path(
    post,
    path = "/tags/",
    tag = "tags",
    request_body = LabelPayload,
    responses(
        (status = 201, body = LabelResponse),
        (status = 400, description = "Missing name or name already used")
    )
)]
pub async fn create_tag(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(payload): ApiJson<LabelPayload>,
) -> Result<(StatusCode, Json<LabelResponse>), ApiError> {
    create(state, LabelKind::Tag, &user, payload).await
}

/// Retrieve one of your tags
#[utoipa::path(
    get,
    path = "/tags/{id}/",
    tag = "tags",
    params(("id" = u64, Path, description = "Tag id")),
    responses(
        (status = 200, body = LabelResponse),
        (status = 404, body = super::error::ErrorDetail)
    )
)]
pub async fn get_tag(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<LabelResponse>, ApiError> {
    retrieve(state, LabelKind::Tag, &user, id).await
}

/// Replace a tag; `name` is required
#[utoipa::path(
    put,
    path = "/tags/{id}/",
    tag = "tags",
    params(("id" = u64, Path, description = "Tag id")),
    request_body = LabelPayload,
    responses(
        (status = 200, body = LabelResponse),
        (status = 400, description = "Missing, invalid or duplicate name"),
        (status = 404, body = super::error::ErrorDetail)
    )
)]
pub async fn replace_tag(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(payload): ApiJson<LabelPayload>,
) -> Result<Json<LabelResponse>, ApiError> {
    update(state, LabelKind::Tag, &user, id, false, payload).await
}

/// Rename a tag
#[utoipa::path(
    patch,
    path = "/tags/{id}/",
    tag = "tags",
    params(("id" = u64, Path, description = "Tag id")),
    request_body = LabelPayload,
    responses(
        (status = 200, body = LabelResponse),
        (status = 400, description = "Invalid or duplicate name"),
        (status = 404, body = super::error::ErrorDetail)
    )
)]
pub async fn update_tag(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(payload): ApiJson<LabelPayload>,
) -> Result<Json<LabelResponse>, ApiError> {
    update(state, LabelKind::Tag, &user, id, true, payload).await
}

/// Delete a tag and unlink it from your recipes
#[utoipa::path(
    delete,
    path = "/tags/{id}/",
    tag = "tags",
    params(("id" = u64, Path, description = "Tag id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, body = super::error::ErrorDetail)
    )
)]
pub async fn delete_tag(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<u64>,
) -> Result<StatusCode, ApiError> {
    destroy(state, LabelKind::Tag, &user, id).await
}

/// List your ingredients
#[utoipa::path(
    get,
    path = "/ingredients/",
    tag = "ingredients",
    params(LabelQuery),
    responses(
        (status = 200, body = [LabelResponse]),
        (status = 400, description = "assigned_only is not an integer")
    )
)]
pub async fn list_ingredients(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<LabelQuery>,
) -> Result<Json<Vec<LabelResponse>>, ApiError> {
    list(state, LabelKind::Ingredient, &user, query).await
}

/// Create an ingredient
#[utoipa::path(
    post,
    path = "/ingredients/",
    tag = "ingredients",
    request_body = LabelPayload,
    responses(
        (status = 201, body = LabelResponse),
        (status = 400, description = "Missing name or name already used")
    )
)]
pub async fn create_ingredient(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(payload): ApiJson<LabelPayload>,
) -> Result<(StatusCode, Json<LabelResponse>), ApiError> {
    create(state, LabelKind::Ingredient, &user, payload).await
}

/// Retrieve one of your ingredients
#[utoipa::path(
    get,
    path = "/ingredients/{id}/",
    tag = "ingredients",
    params(("id" = u64, Path, description = "Ingredient id")),
    responses(
        (status = 200, body = LabelResponse),
        (status = 404, body = super::error::ErrorDetail)
    )
)]
pub async fn get_ingredient(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<LabelResponse>, ApiError> {
    retrieve(state, LabelKind::Ingredient, &user, id).await
}

/// Replace an ingredient; `name` is required
#[utoipa::path(
    put,
    path = "/ingredients/{id}/",
    tag = "ingredients",
    params(("id" = u64, Path, description = "Ingredient id")),
    request_body = LabelPayload,
    responses(
        (status = 200, body = LabelResponse),
        (status = 400, description = "Missing, invalid or duplicate name"),
        (status = 404, body = super::error::ErrorDetail)
    )
)]
pub async fn replace_ingredient(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(payload): ApiJson<LabelPayload>,
) -> Result<Json<LabelResponse>, ApiError> {
    update(state, LabelKind::Ingredient, &user, id, false, payload).await
}

/// Rename an ingredient
#[utoipa::path(
    patch,
    path = "/ingredients/{id}/",
    tag = "ingredients",
    params(("id" = u64, Path, description = "Ingredient id")),
    request_body = LabelPayload,
    responses(
        (status = 200, body = LabelResponse),
        (status = 400, description = "Invalid or duplicate name"),
        (status = 404, body = super::error::ErrorDetail)
    )
)]
pub async fn update_ingredient(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(payload): ApiJson<LabelPayload>,
) -> Result<Json<LabelResponse>, ApiError> {
    update(state, LabelKind::Ingredient, &user, id, true, payload).await
}

/// Delete an ingredient and unlink it from your recipes
#[utoipa::path(
    delete,
    path = "/ingredients/{id}/",
    tag = "ingredients",
    params(("id" = u64, Path, description = "Ingredient id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, body = super::error::ErrorDetail)
    )
)]
pub async fn delete_ingredient(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<u64>,
) -> Result<StatusCode, ApiError> {
    destroy(state, LabelKind::Ingredient, &user, id).await
}
