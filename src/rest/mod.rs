//! REST API layer using Axum.
//!
//! Public routes: registration, token issuance, health, stored media and
//! the OpenAPI document. Everything else sits behind `auth_middleware`,
//! which resolves the bearer token to an active [`User`] and hands it to
//! handlers as a [`CurrentUser`] extension. Handlers only ever pass that
//! user's id to the store, so cross-user rows are invisible.

pub mod doc;
pub mod error;
pub mod labels;
pub mod media;
pub mod recipes;
pub mod users;

#[cfg(test)]
pub(crate) mod test_support;

use axum::{
    async_trait,
    extract::{DefaultBodyLimit, FromRequest, FromRequestParts, Multipart, Request, State},
    http::header,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::Authenticator;
use crate::config::Config;
use crate::models::User;
use crate::storage::Storage;

pub use error::{ApiError, FieldErrors};

/// Shared app state for REST handlers (Arc-wrapped for concurrency)
pub struct AppState {
    pub storage: Storage,
    pub auth: Authenticator,
    pub config: Config,
}

pub type SharedState = Arc<AppState>;

/// The account behind the request's token.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

/// `axum::Json` whose rejection renders as an [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Path` whose rejection is a 404.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// `axum::extract::Multipart` whose rejection renders as an [`ApiError`].
pub struct ApiMultipart(pub Multipart);

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for ApiMultipart {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(Multipart::from_request(req, state).await?))
    }
}

const MISSING_CREDENTIALS: &str = "Authentication credentials were not provided.";
const INVALID_TOKEN: &str = "Invalid token.";
const INACTIVE_USER: &str = "User inactive or deleted.";

async fn auth_middleware(
    State(state): State<SharedState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::Unauthorized(MISSING_CREDENTIALS))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("Token "))
        .ok_or(ApiError::Unauthorized(INVALID_TOKEN))?;

    let user_id = state.auth.validate_jwt(token.trim()).map_err(|e| {
        debug!(error = %e, "token rejected");
        ApiError::Unauthorized(INVALID_TOKEN)
    })?;

    let user = state
        .storage
        .get_user(user_id)?
        .filter(|user| user.is_active)
        .ok_or(ApiError::Unauthorized(INACTIVE_USER))?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

async fn trace_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(req).await;

    info!(
        %method,
        %path,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        "request handled"
    );
    response
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub healthy: bool,
}

/// Health check handler
#[utoipa::path(
    get,
    path = "/health/",
    tag = "health",
    security(()),
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { healthy: true })
}

/// Create Axum router with every endpoint, the auth boundary and Swagger UI.
pub fn create_router(storage: Storage, config: Config) -> Router {
    let state = Arc::new(AppState {
        storage,
        auth: Authenticator::from_config(&config),
        config,
    });
    let upload_limit = state.config.max_upload_bytes;

    let auth_routes = Router::new()
        .route("/users/me/", get(users::me).patch(users::update_me))
        .route("/recipes/", get(recipes::list_recipes).post(recipes::create_recipe))
        .route(
            "/recipes/:id/",
            get(recipes::get_recipe)
                .put(recipes::replace_recipe)
                .patch(recipes::patch_recipe)
                .delete(recipes::delete_recipe),
        )
        .route(
            "/recipes/:id/upload-image/",
            post(recipes::upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/tags/", get(labels::list_tags).post(labels::create_tag))
        .route(
            "/tags/:id/",
            get(labels::get_tag)
                .put(labels::replace_tag)
                .patch(labels::update_tag)
                .delete(labels::delete_tag),
        )
        .route("/ingredients/", get(labels::list_ingredients).post(labels::create_ingredient))
        .route(
            "/ingredients/:id/",
            get(labels::get_ingredient)
                .put(labels::replace_ingredient)
                .patch(labels::update_ingredient)
                .delete(labels::delete_ingredient),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/users/", post(users::register))
        .route("/users/token/", post(users::create_token))
        .route("/health/", get(health_handler))
        .route("/media/uploads/recipe/:file", get(media::serve_image))
        .merge(auth_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/api/docs").url("/api/schema/", doc::ApiDoc::openapi()))
        .layer(middleware::from_fn(trace_requests))
}

#[cfg(test)]
mod tests {
    use super::test_support::TestApp;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_health_needs_no_token() {
        let app = TestApp::new();
        let (status, body) = app.request(Method::GET, "/health/", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"healthy": true}));
    }

    #[tokio::test]
    async fn test_protected_routes_require_a_token() {
        let app = TestApp::new();
        for uri in ["/recipes/", "/tags/", "/ingredients/", "/users/me/"] {
            let (status, body) = app.request(Method::GET, uri, None, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert!(body["detail"].is_string());
        }

        let (status, _) = app.request(Method::GET, "/recipes/", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_prefix_is_accepted() {
        let app = TestApp::new();
        let (_, token) = app.user_with_token("prefix@example.com");
        let response = app
            .raw(
                axum::http::Request::builder()
                    .uri("/recipes/")
                    .header("authorization", format!("Token {token}"))
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_deleted_user_token_is_rejected() {
        let app = TestApp::new();
        let (user, token) = app.user_with_token("gone@example.com");
        app.storage.delete_user(user.id).unwrap();

        let (status, _) = app.request(Method::GET, "/recipes/", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_openapi_document_lists_recipe_paths() {
        let app = TestApp::new();
        let (status, body) = app.request(Method::GET, "/api/schema/", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let paths = body["paths"].as_object().expect("paths object");
        for path in ["/recipes/", "/recipes/{id}/", "/recipes/{id}/upload-image/", "/tags/", "/users/token/"] {
            assert!(paths.contains_key(path), "missing {path}");
        }
        assert!(body["components"]["securitySchemes"]["bearer_auth"].is_object());
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let app = TestApp::new();
        let (_, token) = app.user_with_token("lost@example.com");
        let (status, _) = app.request(Method::GET, "/recipes/abc/", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
