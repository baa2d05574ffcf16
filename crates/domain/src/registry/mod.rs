//! Wedding registry resources
//!
//! Guests RSVP, reserve gifts, leave wishes and share gallery photos.
//! These types mirror the JSON exchanged with the backend.

mod gallery;
mod gift;
mod guest;
mod wish;

pub use gallery::{GalleryItem, NewGalleryItem};
pub use gift::{Gift, GiftReservation};
pub use guest::{Guest, GuestId, GuestRecord, GuestRsvp};
pub use wish::{NewWish, Wish};
