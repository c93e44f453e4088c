//! Router fixtures shared by the handler tests.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use std::path::PathBuf;
use tower::ServiceExt;
use uuid::Uuid;

use super::create_router;
use crate::auth::{hash_password, Authenticator};
use crate::config::Config;
use crate::models::{NewUser, User};
use crate::storage::Storage;

pub const TEST_PASSWORD: &str = "testpass123";

pub struct TestApp {
    pub router: Router,
    pub storage: Storage,
    pub config: Config,
}

impl TestApp {
    pub fn new() -> Self {
        let storage = Storage::temporary().expect("temporary store");
        let config = Config {
            jwt_secret: "test-secret".to_string(),
            ephemeral_secret: false,
            bcrypt_cost: 4,
            media_root: std::env::temp_dir().join(format!("recipe_api_media_{}", Uuid::new_v4().simple())),
            ..Config::default()
        };
        let router = create_router(storage.clone(), config.clone());
        Self { router, storage, config }
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.config.media_root.join("uploads").join("recipe")
    }

    /// Creates an account directly in the store and signs a token for it.
    pub fn user_with_token(&self, email: &str) -> (User, String) {
        let user = self
            .storage
            .create_user(NewUser {
                email: email.to_string(),
                name: "Test name".to_string(),
                password_hash: hash_password(TEST_PASSWORD, 4).expect("hash"),
                ..NewUser::default()
            })
            .expect("create user");
        let token = Authenticator::from_config(&self.config)
            .create_jwt(user.id)
            .expect("token");
        (user, token)
    }

    pub async fn raw(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.expect("router response")
    }

    /// Sends a JSON request and returns the status plus the decoded body
    /// (`Value::Null` for empty bodies).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = self.raw(builder.body(body).expect("request")).await;
        read_json(response).await
    }
}

pub async fn read_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.config.media_root);
    }
}
