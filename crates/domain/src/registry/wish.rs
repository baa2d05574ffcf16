//! Guest wishes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Guest, GuestId};

/// A wish left by a guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wish {
    /// Wish identifier.
    pub id: Uuid,
    /// Author.
    #[serde(default)]
    pub guest: Option<Guest>,
    /// Message text.
    pub message: String,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of `POST /wishes/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWish {
    /// Author.
    pub guest_id: GuestId,
    /// Message text.
    pub message: String,
}
