//! Gift registry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Guest, GuestId};

/// A registry gift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gift {
    /// Gift identifier.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Picture URL.
    #[serde(default)]
    pub image: Option<String>,
    /// Shop link.
    #[serde(default)]
    pub link: Option<String>,
    /// Price as rendered by the backend (decimal string).
    #[serde(default)]
    pub price: Option<String>,
    /// Whether someone already reserved it.
    #[serde(default)]
    pub reserved: bool,
    /// Guest who reserved it.
    #[serde(default)]
    pub reserved_by: Option<Guest>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Gift {
    /// Returns true if the gift can still be reserved.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        !self.reserved
    }
}

/// Body of `PATCH /gifts/{id}/reserve/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftReservation {
    /// The reserving guest.
    pub guest_id: GuestId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_reserved_gift() {
        let gift: Gift = serde_json::from_value(serde_json::json!({
            "id": "6f1c1f5e-51c4-4a43-9a43-0c3a2b2f2a10",
            "title": "Toaster",
            "image": null,
            "price": "49.90",
            "reserved": true,
            "reserved_by": {"id": "g-1", "name": "Ana", "email": "ana@example.com"},
            "created_at": "2026-05-01T10:00:00Z"
        }))
        .expect("valid gift");

        assert!(!gift.is_available());
        assert_eq!(
            gift.reserved_by.map(|g| g.id.to_string()),
            Some("g-1".to_string())
        );
    }

    #[test]
    fn test_reservation_wire_format() {
        let body = GiftReservation {
            guest_id: GuestId::new("g-1").expect("valid id"),
        };
        assert_eq!(
            serde_json::to_value(&body).expect("serializable"),
            serde_json::json!({"guest_id": "g-1"})
        );
    }
}
