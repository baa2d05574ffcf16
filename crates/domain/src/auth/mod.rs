//! Authentication domain types

mod types;

pub use types::{
    Credentials, LoginRequest, RefreshRequest, RefreshResponse, TokenKey, TokenPair,
    TokenResponse, token_preview,
};
