//! `/recipes/`: owner-scoped CRUD with nested tag/ingredient names, list
//! filters and image upload.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

use super::labels::LabelResponse;
use super::media::{self, ImageFormat};
use super::users::{check_max_chars, required_text, REQUIRED};
use super::{ApiError, ApiJson, ApiMultipart, ApiPath, CurrentUser, FieldErrors, SharedState};
use crate::filters::{parse_id_list, RecipeFilter};
use crate::models::{LabelKind, NewRecipe, Recipe, RecipeChanges};
use crate::price::{Price, PriceInput};
use crate::storage::{Storage, StorageError};

const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

#[derive(Deserialize, ToSchema)]
pub struct LabelName {
    #[schema(example = "Vegan")]
    pub name: String,
}

/// Body of POST, PUT and PATCH. Unknown keys (including `user`) are ignored.
#[derive(Deserialize, ToSchema)]
pub struct RecipePayload {
    #[schema(example = "Thai prawn curry")]
    pub title: Option<String>,
    pub description: Option<String>,
    #[schema(example = 30)]
    pub time_minutes: Option<i64>,
    #[schema(value_type = Option<String>, example = "5.25")]
    pub price: Option<PriceInput>,
    pub link: Option<String>,
    pub tags: Option<Vec<LabelName>>,
    pub ingredients: Option<Vec<LabelName>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Full,
    Partial,
}

impl RecipePayload {
    /// Validates every present field; in `Full` mode title, time and price
    /// must be present too.
    fn validate(self, mode: Mode) -> Result<RecipeChanges, ApiError> {
        let mut errors = FieldErrors::default();

        let title = match (self.title, mode) {
            (None, Mode::Partial) => None,
            (title, _) => {
                let title = required_text(&mut errors, "title", title);
                check_max_chars(&mut errors, "title", &title);
                Some(title)
            }
        };

        let time_minutes = match self.time_minutes {
            None => {
                if mode == Mode::Full {
                    errors.add("time_minutes", REQUIRED);
                }
                None
            }
            Some(minutes) if minutes < 0 => {
                errors.add("time_minutes", "Ensure this value is greater than or equal to 0.");
                None
            }
            Some(minutes) => match i32::try_from(minutes) {
                Ok(minutes) => Some(minutes),
                Err(_) => {
                    errors.add("time_minutes", format!("Ensure this value is less than or equal to {}.", i32::MAX));
                    None
                }
            },
        };

        let price = match self.price {
            None => {
                if mode == Mode::Full {
                    errors.add("price", REQUIRED);
                }
                None
            }
            Some(raw) => match raw.parse() {
                Ok(price) => Some(price),
                Err(e) => {
                    errors.add("price", e.to_string());
                    None
                }
            },
        };

        let description = self.description.map(|d| d.trim().to_string());
        let link = self.link.map(|l| l.trim().to_string());
        if let Some(link) = &link {
            check_max_chars(&mut errors, "link", link);
        }

        let tags = self.tags.map(|names| label_names(&mut errors, "tags", names));
        let ingredients = self.ingredients.map(|names| label_names(&mut errors, "ingredients", names));

        errors.check()?;
        Ok(RecipeChanges {
            title,
            description,
            time_minutes,
            price,
            link,
            tags,
            ingredients,
        })
    }
}

fn label_names(errors: &mut FieldErrors, field: &str, labels: Vec<LabelName>) -> Vec<String> {
    let mut names = Vec::with_capacity(labels.len());
    for label in labels {
        let name = required_text(errors, field, Some(label.name));
        check_max_chars(errors, field, &name);
        names.push(name);
    }
    names
}

impl From<RecipeChanges> for NewRecipe {
    fn from(changes: RecipeChanges) -> Self {
        Self {
            title: changes.title.unwrap_or_default(),
            description: changes.description.unwrap_or_default(),
            time_minutes: changes.time_minutes.unwrap_or_default(),
            price: changes.price.unwrap_or_default(),
            link: changes.link.unwrap_or_default(),
            tags: changes.tags,
            ingredients: changes.ingredients,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RecipeSummary {
    pub id: u64,
    pub title: String,
    pub time_minutes: i32,
    #[schema(value_type = String, example = "5.25")]
    pub price: Price,
    pub link: String,
    pub tags: Vec<LabelResponse>,
    pub ingredients: Vec<LabelResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct RecipeDetail {
    #[serde(flatten)]
    pub summary: RecipeSummary,
    pub description: String,
    /// URL path of the uploaded image.
    pub image: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ImageResponse {
    pub id: u64,
    #[schema(example = "/media/uploads/recipe/7f0c8a1e-5d2b-4c39-9a53-0e6f4f5f2b1d.jpg")]
    pub image: String,
}

/// Multipart body of the upload endpoint (documentation only).
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ImageUpload {
    #[schema(value_type = String, format = Binary)]
    image: Vec<u8>,
}

fn summarize(storage: &Storage, recipe: Recipe) -> Result<RecipeSummary, StorageError> {
    let tags = storage.resolve_labels(LabelKind::Tag, &recipe.tags)?;
    let ingredients = storage.resolve_labels(LabelKind::Ingredient, &recipe.ingredients)?;
    Ok(RecipeSummary {
        id: recipe.id,
        title: recipe.title,
        time_minutes: recipe.time_minutes,
        price: recipe.price,
        link: recipe.link,
        tags: tags.into_iter().map(LabelResponse::from).collect(),
        ingredients: ingredients.into_iter().map(LabelResponse::from).collect(),
    })
}

fn detail(storage: &Storage, mut recipe: Recipe) -> Result<RecipeDetail, StorageError> {
    let description = std::mem::take(&mut recipe.description);
    let image = recipe.image.take().map(|path| media::media_url(&path));
    Ok(RecipeDetail {
        summary: summarize(storage, recipe)?,
        description,
        image,
    })
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecipeQuery {
    /// Comma-separated tag ids.
    #[param(example = "1,2")]
    pub tags: Option<String>,
    /// Comma-separated ingredient ids.
    #[param(example = "3")]
    pub ingredients: Option<String>,
}

impl RecipeQuery {
    fn into_filter(self) -> Result<RecipeFilter, ApiError> {
        let mut errors = FieldErrors::default();
        let mut parse = |field: &str, raw: Option<String>| match raw.as_deref().map(parse_id_list) {
            None => None,
            Some(Ok(ids)) => ids,
            Some(Err(e)) => {
                errors.add(field, e.to_string());
                None
            }
        };
        let tags = parse("tags", self.tags);
        let ingredients = parse("ingredients", self.ingredients);
        errors.check()?;
        Ok(RecipeFilter { tags, ingredients })
    }
}

/// List your recipes, newest first
#[utoipa::path(
    get,
    path = "/recipes/",
    tag = "recipes",
    params(RecipeQuery),
    responses(
        (status = 200, body = [RecipeSummary]),
        (status = 400, description = "Malformed id list"),
        (status = 401, body = super::error::ErrorDetail)
    )
)]
pub async fn list_recipes(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<RecipeQuery>,
) -> Result<Json<Vec<RecipeSummary>>, ApiError> {
    let filter = query.into_filter()?;
    let recipes = state.storage.list_recipes(user.id, &filter)?;
    debug!(user_id = user.id, count = recipes.len(), "listed recipes");

    let summaries = recipes
        .into_iter()
        .map(|recipe| summarize(&state.storage, recipe))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(summaries))
}

/// Create a recipe; tag and ingredient names are reused or created
#[utoipa::path(
    post,
    path = "/recipes/",
    tag = "recipes",
    request_body = RecipePayload,
    responses(
        (status = 201, body = RecipeDetail),
        (status = 400, description = "Invalid fields"),
        (status = 401, body = super::error::ErrorDetail)
    )
)]
pub async fn create_recipe(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(payload): ApiJson<RecipePayload>,
) -> Result<(StatusCode, Json<RecipeDetail>), ApiError> {
    let draft = NewRecipe::from(payload.validate(Mode::Full)?);
    let recipe = state.storage.create_recipe(user.id, draft)?;
    info!(recipe_id = recipe.id, user_id = user.id, "recipe created");
    Ok((StatusCode::CREATED, Json(detail(&state.storage, recipe)?)))
}

/// Retrieve one of your recipes
#[utoipa::path(
    get,
    path = "/recipes/{id}/",
    tag = "recipes",
    params(("id" = u64, Path, description = "Recipe id")),
    responses(
        (status = 200, body = RecipeDetail),
        (status = 404, body = super::error::ErrorDetail)
    )
)]
pub async fn get_recipe(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<RecipeDetail>, ApiError> {
    let recipe = state.storage.get_recipe(user.id, id)?.ok_or(ApiError::NotFound)?;
    Ok(Json(detail(&state.storage, recipe)?))
}

async fn update(state: SharedState, owner: u64, id: u64, payload: RecipePayload, mode: Mode) -> Result<Json<RecipeDetail>, ApiError> {
    let changes = payload.validate(mode)?;
    let recipe = state.storage.update_recipe(owner, id, changes)?;
    Ok(Json(detail(&state.storage, recipe)?))
}

/// Replace a recipe; title, time and price are required
#[utoipa::path(
    put,
    path = "/recipes/{id}/",
    tag = "recipes",
    params(("id" = u64, Path, description = "Recipe id")),
    request_body = RecipePayload,
    responses(
        (status = 200, body = RecipeDetail),
        (status = 400, description = "Invalid fields"),
        (status = 404, body = super::error::ErrorDetail)
    )
)]
pub async fn replace_recipe(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(payload): ApiJson<RecipePayload>,
) -> Result<Json<RecipeDetail>, ApiError> {
    update(state, user.id, id, payload, Mode::Full).await
}

/// Change any subset of a recipe's fields
#[utoipa::path(
    patch,
    path = "/recipes/{id}/",
    tag = "recipes",
    params(("id" = u64, Path, description = "Recipe id")),
    request_body = RecipePayload,
    responses(
        (status = 200, body = RecipeDetail),
        (status = 400, description = "Invalid fields"),
        (status = 404, body = super::error::ErrorDetail)
    )
)]
pub async fn patch_recipe(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(payload): ApiJson<RecipePayload>,
) -> Result<Json<RecipeDetail>, ApiError> {
    update(state, user.id, id, payload, Mode::Partial).await
}

/// Delete one of your recipes
#[utoipa::path(
    delete,
    path = "/recipes/{id}/",
    tag = "recipes",
    params(("id" = u64, Path, description = "Recipe id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, body = super::error::ErrorDetail)
    )
)]
pub async fn delete_recipe(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath(id): ApiPath<u64>,
) -> Result<StatusCode, ApiError> {
    state.storage.delete_recipe(user.id, id)?;
    info!(recipe_id = id, user_id = user.id, "recipe deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Attach an image (multipart field `image`) to one of your recipes
#[utoipa::path(
    post,
    path = "/recipes/{id}/upload-image/",
    tag = "recipes",
    params(("id" = u64, Path, description = "Recipe id")),
    request_body(content = ImageUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = ImageResponse),
        (status = 400, description = "Missing or invalid image"),
        (status = 404, body = super::error::ErrorDetail)
    )
)]
pub async fn upload_image(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath(id): ApiPath<u64>,
    ApiMultipart(mut multipart): ApiMultipart,
) -> Result<Json<ImageResponse>, ApiError> {
    if state.storage.get_recipe(user.id, id)?.is_none() {
        return Err(ApiError::NotFound);
    }

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("image") {
            let file_name = field.file_name().map(str::to_owned);
            upload = Some((file_name, field.bytes().await?));
            break;
        }
    }

    let (file_name, bytes) = upload.ok_or_else(|| FieldErrors::single("image", "No file was submitted."))?;
    if bytes.is_empty() {
        return Err(FieldErrors::single("image", "The submitted file is empty.").into());
    }
    let (format, bytes) = tokio::task::spawn_blocking(move || (ImageFormat::decode(&bytes), bytes)).await?;
    let format = format.ok_or_else(|| FieldErrors::single("image", INVALID_IMAGE))?;

    let relative = media::store_image(&state.config.media_root, file_name.as_deref(), format, &bytes).await?;
    let recipe = state.storage.set_recipe_image(user.id, id, &relative)?;
    info!(recipe_id = id, user_id = user.id, image = %relative, "recipe image stored");

    Ok(Json(ImageResponse {
        id: recipe.id,
        image: media::media_url(&relative),
    }))
}
