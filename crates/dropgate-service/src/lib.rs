//! Dropgate HTTP API service.
//!
//! This crate provides the HTTP API for dropgate, including:
//!
//! - Credit-gated file upload, listing, download, visibility, and deletion
//! - Credit balance lookup
//! - Payment order creation and verification
//! - Identity-provider webhooks
//!
//! # Authentication
//!
//! End-user requests carry a bearer JWT validated against the identity
//! provider's JWKS. The identity webhook authenticates with an HMAC
//! signature instead; the payment verification callback proves itself with
//! the gateway signature over the order and payment ids.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers backed by the sync store stay async for routing

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod storage;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use gateway::{GatewayClient, GatewayError};
pub use routes::create_router;
pub use state::AppState;
pub use storage::{BlobStorage, LocalDiskStorage, StorageError};
