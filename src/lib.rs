//! Country Currency API Library
//!
//! Mirrors world-country data from a public directory, enriches each country
//! with its USD exchange rate and a GDP estimate, and serves the result over
//! HTTP together with a rendered summary image.
//!
//! # Modules
//!
//! - `api`: Router, middleware and OpenAPI document.
//! - `config`: Configuration management.
//! - `db`: Database connection and schema bootstrap.
//! - `db_storage`: Postgres country storage.
//! - `errors`: HTTP-facing error type.
//! - `handlers`: HTTP request handlers and shared state.
//! - `models`: Country records, query and upstream payload models.
//! - `refresh`: The refresh pipeline.
//! - `sources`: Countries directory and exchange-rate clients.
//! - `store`: Storage trait and in-memory backend.
//! - `summary`: Summary image rendering.

pub mod api;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod refresh;
pub mod sources;
pub mod store;
pub mod summary;
