//! Wedding registry resources: gifts, guests, wishes and the gallery.

use std::sync::Arc;

use aisle_domain::{
    GalleryItem, Gift, GiftReservation, GuestId, GuestRecord, GuestRsvp, NewGalleryItem, NewWish,
    Wish,
};
use uuid::Uuid;

use crate::client::ApiClient;
use crate::error::{ApiError, ApiResult};

/// Typed access to the registry endpoints.
#[derive(Debug, Clone)]
pub struct Registry {
    client: Arc<ApiClient>,
}

impl Registry {
    /// Creates a registry over a shared client.
    #[must_use]
    pub const fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    /// Lists all gifts.
    ///
    /// # Errors
    ///
    /// Propagates any [`ApiError`] from the call.
    pub async fn list_gifts(&self) -> ApiResult<Vec<Gift>> {
        self.client.get("/gifts/").await
    }

    /// Submits an RSVP and returns the identifier of the created guest.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Decode` if the response carries no usable
    /// identifier, or any error from the call.
    pub async fn rsvp(&self, rsvp: &GuestRsvp) -> ApiResult<GuestId> {
        let record: GuestRecord = self.client.post("/guests/rsvp/", rsvp).await?;
        let guest_id = record
            .guest_id()
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        tracing::info!(guest_id = %guest_id, "RSVP recorded");
        Ok(guest_id)
    }

    /// Reserves a gift for a guest.
    ///
    /// # Errors
    ///
    /// Propagates any [`ApiError`] from the call.
    pub async fn reserve_gift(&self, gift_id: Uuid, guest_id: &GuestId) -> ApiResult<Gift> {
        let body = GiftReservation {
            guest_id: guest_id.clone(),
        };
        let gift: Gift = self
            .client
            .patch(&format!("/gifts/{gift_id}/reserve/"), &body)
            .await?;
        tracing::info!(%gift_id, guest_id = %guest_id, "Gift reserved");
        Ok(gift)
    }

    /// Submits an RSVP, then reserves `gift_id` for the new guest.
    ///
    /// # Errors
    ///
    /// Fails on the first step that fails; no reservation is attempted if
    /// the RSVP does not go through.
    pub async fn rsvp_and_reserve(
        &self,
        rsvp: &GuestRsvp,
        gift_id: Uuid,
    ) -> ApiResult<(GuestId, Gift)> {
        let guest_id = self.rsvp(rsvp).await?;
        let gift = self.reserve_gift(gift_id, &guest_id).await?;
        Ok((guest_id, gift))
    }

    /// Leaves a wish for the couple.
    ///
    /// # Errors
    ///
    /// Propagates any [`ApiError`] from the call.
    pub async fn leave_wish(&self, wish: &NewWish) -> ApiResult<Wish> {
        self.client.post("/wishes/", wish).await
    }

    /// Lists gallery items.
    ///
    /// # Errors
    ///
    /// Propagates any [`ApiError`] from the call.
    pub async fn list_gallery(&self) -> ApiResult<Vec<GalleryItem>> {
        self.client.get("/gallery/").await
    }

    /// Adds a gallery item.
    ///
    /// # Errors
    ///
    /// Propagates any [`ApiError`] from the call.
    pub async fn post_gallery_item(&self, item: &NewGalleryItem) -> ApiResult<GalleryItem> {
        self.client.post("/gallery/", item).await
    }
}
