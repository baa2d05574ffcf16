//! Photo gallery

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Guest, GuestId};

/// A shared photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryItem {
    /// Item identifier.
    pub id: Uuid,
    /// Uploader, if known.
    #[serde(default)]
    pub guest: Option<Guest>,
    /// Image URL.
    #[serde(default)]
    pub image: Option<String>,
    /// Caption.
    #[serde(default)]
    pub caption: Option<String>,
    /// Upload time.
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// Body of `POST /gallery/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGalleryItem {
    /// Uploader, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<GuestId>,
    /// Image URL.
    pub image: String,
    /// Caption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}
