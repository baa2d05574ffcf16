//! Aisle Domain - Core types
//!
//! This crate defines the domain model for the Aisle API client:
//! bearer tokens and their wire schemas, request/response values,
//! and the wedding registry resources.
//! All types here are pure Rust with no I/O dependencies.

pub mod auth;
pub mod error;
pub mod registry;
pub mod request;
pub mod response;

pub use auth::{
    Credentials, LoginRequest, RefreshRequest, RefreshResponse, TokenKey, TokenPair,
    TokenResponse, token_preview,
};
pub use error::{DomainError, DomainResult};
pub use registry::{
    GalleryItem, Gift, GiftReservation, Guest, GuestId, GuestRecord, GuestRsvp, NewGalleryItem,
    NewWish, Wish,
};
pub use request::{ApiRequest, Header, Headers, HttpMethod, join_url};
pub use response::{ApiResponse, StatusCode};
