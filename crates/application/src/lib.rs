//! Aisle Application - Authenticated API client core
//!
//! This crate defines the application layer with:
//! - Port traits for the HTTP transport and token persistence
//! - The token store, request pipeline and single-flight refresh coordinator
//! - The auth facade, typed call helpers and registry resources
//! - Application-level error handling

pub mod auth;
pub mod client;
pub mod error;
pub mod pipeline;
pub mod ports;
pub mod registry;

pub use auth::{
    Authenticator, MemoryTokenStorage, RefreshCoordinator, TokenEndpoint, TokenStatus, TokenStore,
};
pub use client::{ApiClient, ClientOptions, DEFAULT_BASE_URL, DEFAULT_REFRESH_TIMEOUT};
pub use error::{ApiError, ApiResult, RefreshError};
pub use pipeline::RequestPipeline;
pub use ports::{HttpTransport, StorageError, TokenStorage, TransportError};
pub use registry::Registry;
