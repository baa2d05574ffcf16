//! Authentication module for the Aisle API client.
//!
//! This module provides:
//! - Process-wide token storage with optional durable persistence
//! - The token endpoint client (login and refresh exchanges)
//! - The single-flight refresh coordinator
//! - The login/logout facade

mod coordinator;
mod endpoint;
mod facade;
mod memory_storage;
mod token_store;

pub use coordinator::RefreshCoordinator;
pub use endpoint::TokenEndpoint;
pub use facade::Authenticator;
pub use memory_storage::MemoryTokenStorage;
pub use token_store::{TokenStatus, TokenStore};
