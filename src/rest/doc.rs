//! OpenAPI document served at `/api/schema/` and rendered by Swagger UI at
//! `/api/docs/`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::error::ErrorDetail;
use super::labels::{LabelPayload, LabelResponse};
use super::recipes::{ImageResponse, ImageUpload, LabelName, RecipeDetail, RecipePayload, RecipeSummary};
use super::users::{ProfileUpdate, RegisterRequest, TokenRequest, TokenResponse, UserResponse};
use super::HealthResponse;

/// Adds the bearer token scheme issued by `POST /users/token/`.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some("Token from POST /users/token/. `Token <jwt>` is accepted as well."))
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Recipe API",
        description = "Per-user recipes with tags, ingredients and images."
    ),
    security(("bearer_auth" = [])),
    paths(
        super::health_handler,
        super::users::register,
        super::users::create_token,
        super::users::me,
        super::users::update_me,
        super::recipes::list_recipes,
        super::recipes::create_recipe,
        super::recipes::get_recipe,
        super::recipes::replace_recipe,
        super::recipes::patch_recipe,
        super::recipes::delete_recipe,
        super::recipes::upload_image,
        super::labels::list_tags,
        super::labels::create_tag,
        super::labels::get_tag,
        super::labels::replace_tag,
        super::labels::update_tag,
        super::labels::delete_tag,
        super::labels::list_ingredients,
        super::labels::create_ingredient,
        super::labels::get_ingredient,
        super::labels::replace_ingredient,
        super::labels::update_ingredient,
        super::labels::delete_ingredient,
    ),
    components(schemas(
        ErrorDetail,
        HealthResponse,
        RegisterRequest,
        TokenRequest,
        TokenResponse,
        ProfileUpdate,
        UserResponse,
        RecipePayload,
        LabelName,
        RecipeSummary,
        RecipeDetail,
        ImageUpload,
        ImageResponse,
        LabelPayload,
        LabelResponse,
    )),
    tags(
        (name = "users", description = "Registration, tokens and your profile"),
        (name = "recipes", description = "Your recipes"),
        (name = "tags", description = "Your tags"),
        (name = "ingredients", description = "Your ingredients"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_has_every_route_and_scheme() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        for path in [
            "/health/",
            "/users/",
            "/users/token/",
            "/users/me/",
            "/recipes/",
            "/recipes/{id}/",
            "/recipes/{id}/upload-image/",
            "/tags/{id}/",
            "/ingredients/",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("RecipeDetail"));
    }

    #[test]
    fn test_label_detail_lists_every_method() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        for path in ["/tags/{id}/", "/ingredients/{id}/"] {
            for method in ["get", "put", "patch", "delete"] {
                assert!(doc["paths"][path][method].is_object(), "missing {method} {path}");
            }
        }
    }
}
