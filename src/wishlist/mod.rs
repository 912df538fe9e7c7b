//! Wishlists, their products and the client that reads and writes them.

mod api_types;
mod client;
mod keys;
mod models;

pub use client::WishlistClient;
pub use keys::WishlistQueryKey;
pub use models::{
  card_color, progress_percent, LinkedProduct, Priority, PriorityFilter, ProductForm,
  Wishlist, WishlistForm, WishlistSummary, ICONS,
};
