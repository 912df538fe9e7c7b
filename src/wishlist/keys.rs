//! Cache identities for wishlist data.

use sha2::{Digest, Sha256};

use crate::cache::{Cacheable, QueryKey};

use super::models::{LinkedProduct, Wishlist, WishlistSummary};

impl Cacheable for Wishlist {
  fn cache_key(&self) -> String {
    self.id.clone()
  }

  fn entity_type() -> &'static str {
    "wishlist"
  }
}

impl Cacheable for WishlistSummary {
  fn cache_key(&self) -> String {
    self.id.clone()
  }

  fn entity_type() -> &'static str {
    "wishlist_summary"
  }
}

impl Cacheable for LinkedProduct {
  fn cache_key(&self) -> String {
    self.id.clone()
  }

  fn entity_type() -> &'static str {
    "linked_product"
  }
}

/// Query keys for wishlist reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WishlistQueryKey {
  /// Every wishlist with its links' checked state
  Wishlists,
  /// One wishlist's own fields
  Wishlist { id: String },
  /// Links of one wishlist, joined with products
  WishlistProducts { wishlist_id: String },
  /// Links of every wishlist, joined with products
  AllProducts,
}

impl QueryKey for WishlistQueryKey {
  fn cache_hash(&self) -> String {
    let input = match self {
      Self::Wishlists => "wishlists".to_string(),
      Self::Wishlist { id } => format!("wishlist:{}", id.trim()),
      Self::WishlistProducts { wishlist_id } => {
        format!("wishlist_products:{}", wishlist_id.trim())
      }
      Self::AllProducts => "all_products".to_string(),
    };

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  fn description(&self) -> String {
    match self {
      Self::Wishlists => "all wishlists".to_string(),
      Self::Wishlist { id } => format!("wishlist {}", id),
      Self::WishlistProducts { wishlist_id } => format!("products of wishlist {}", wishlist_id),
      Self::AllProducts => "all products".to_string(),
    }
  }
}
