//! Guests and RSVP

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DomainError, DomainResult};

/// Identifier of a guest as issued by the backend.
///
/// Kept opaque: the backend may hand out UUIDs or integer primary keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestId(String);

impl GuestId {
    /// Creates a guest identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is empty.
    pub fn new(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::InvalidIdentifier(
                "guest id must not be empty".to_string(),
            ));
        }
        Ok(Self(value))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// RSVP form submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestRsvp {
    /// Full name.
    pub name: String,
    /// Contact e-mail, unique per guest.
    pub email: String,
    /// Optional phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Whether the guest attends.
    pub rsvp_status: bool,
    /// Optional meal preference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meal_preference: Option<String>,
}

/// A guest as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    /// Guest identifier.
    pub id: GuestId,
    /// Full name.
    pub name: String,
    /// Contact e-mail.
    pub email: String,
    /// Phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Whether the guest attends.
    #[serde(default)]
    pub rsvp_status: bool,
    /// Meal preference.
    #[serde(default)]
    pub meal_preference: Option<String>,
    /// When the RSVP was recorded.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Response schema of the RSVP endpoint.
///
/// The identifier is resolved with a fixed fallback order:
/// `id`, then `pk`, then `uuid`. String and integer values are accepted.
/// Any other field is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GuestRecord {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    pk: Option<serde_json::Value>,
    #[serde(default)]
    uuid: Option<serde_json::Value>,
}

impl GuestRecord {
    /// Resolves the guest identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if none of `id`, `pk` or `uuid` holds a usable value.
    pub fn guest_id(&self) -> DomainResult<GuestId> {
        [&self.id, &self.pk, &self.uuid]
            .into_iter()
            .flatten()
            .find_map(id_value)
            .ok_or_else(|| {
                DomainError::InvalidIdentifier(
                    "guest response carries no id, pk or uuid".to_string(),
                )
            })
    }
}

fn id_value(value: &serde_json::Value) -> Option<GuestId> {
    match value {
        serde_json::Value::String(s) => GuestId::new(s.clone()).ok(),
        serde_json::Value::Number(n) => GuestId::new(n.to_string()).ok(),
        _ => None,
    }
}
