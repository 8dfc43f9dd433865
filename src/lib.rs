//! # lfsgate
//!
//! A self-hosted Git LFS server: a content-addressed blob store, a
//! token-based authorization bridge delegating to an external access-control
//! oracle, and the Batch API plus basic transfer adapter.
//!
//! ## Library usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lfsgate::blobstore::BlobStore;
//! use lfsgate::auth::TokenStore;
//! use lfsgate::config::Config;
//! use lfsgate::server::{AppState, create_router};
//!
//! let config = Arc::new(Config::default());
//! let blob_store = Arc::new(BlobStore::new(&config.data_root, config.repositories.clone()));
//! let token_store = Arc::new(TokenStore::new(config.resolved_token_dir(), config.token_ttl_seconds));
//! let state = Arc::new(AppState { blob_store, token_store, config });
//! let router = create_router(state);
//! // Serve with axum...
//! ```

pub mod auth;
pub mod blobstore;
pub mod cli;
pub mod config;
pub mod error;
pub mod server;
pub mod types;
