//! recipe_api: multi-user recipe service in Rust
//!
//! Users register and obtain a bearer token, then manage their own recipes,
//! tags and ingredients over a JSON REST API (Axum). Everything is persisted
//! in Sled; each user only ever sees rows they own.

pub mod auth;
pub mod config;
// Query-string filters (tag/ingredient id lists, assigned_only)
pub mod filters;
pub mod models;
pub mod price;
// REST API module: Axum handlers, auth middleware, OpenAPI docs
pub mod rest;
pub mod storage;
pub mod telemetry;
