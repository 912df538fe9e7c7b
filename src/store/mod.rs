//! Remote table store.
//!
//! The hosted backend exposes three relational tables through a generic
//! select/insert/update/delete interface. This module describes that
//! interface in typed form so the same query can be rendered as a PostgREST
//! request or evaluated against the in-memory store.
//!
//! Store contracts the application relies on:
//! - deleting a `wishlist` row deletes its `wishlist_products` rows
//! - deleting a `product` row deletes its `wishlist_products` rows
//! - a `(wishlist_id, product_id)` pair appears at most once in
//!   `wishlist_products`

mod memory;
mod postgrest;
mod query;

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;
pub use query::{Column, Select};

use futures::future::BoxFuture;
use serde_json::{Map, Value};

/// A single table row as returned by the store.
pub type Row = Map<String, Value>;

/// Tables of the remote schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
  Wishlist,
  Product,
  WishlistProducts,
}

impl Table {
  pub fn name(self) -> &'static str {
    match self {
      Table::Wishlist => "wishlist",
      Table::Product => "product",
      Table::WishlistProducts => "wishlist_products",
    }
  }
}

/// Errors from remote store calls.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),
  #[error("store returned {status}: {message}")]
  Status { status: u16, message: String },
  #[error("failed to decode response: {0}")]
  Decode(#[from] serde_json::Error),
  #[error("{table} row {id} not found")]
  NotFound { table: &'static str, id: String },
  #[error("conflict: {0}")]
  Conflict(String),
}

/// Generic table access against the hosted backend.
///
/// Every call is an independent request; nothing spans two calls.
pub trait Store: Send + Sync {
  /// Filtered, ordered select with optional relationship embedding.
  fn select(&self, query: Select) -> BoxFuture<'_, Result<Vec<Row>, StoreError>>;

  /// Insert one or more rows, returning them as created (ids and defaults filled in).
  fn insert(&self, table: Table, rows: Vec<Row>) -> BoxFuture<'_, Result<Vec<Row>, StoreError>>;

  /// Update the row with the given id, returning the updated row.
  fn update<'a>(
    &'a self,
    table: Table,
    id: &'a str,
    patch: Row,
  ) -> BoxFuture<'a, Result<Row, StoreError>>;

  /// Delete the row with the given id.
  fn delete<'a>(&'a self, table: Table, id: &'a str) -> BoxFuture<'a, Result<(), StoreError>>;
}
