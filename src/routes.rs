//! Screen routes: `/`, `/list` and `/wishlist/:id`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
  /// Wishlist listing
  Home,
  /// Every product, filterable by priority
  Products,
  /// One wishlist and its products
  Wishlist { id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown route {0:?} (expected /, /list or /wishlist/<id>)")]
pub struct RouteError(String);

impl FromStr for Route {
  type Err = RouteError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let trimmed = s.trim();
    let path = trimmed.trim_end_matches('/');
    match path.split('/').collect::<Vec<_>>().as_slice() {
      [""] => Ok(Route::Home),
      ["", "list"] => Ok(Route::Products),
      ["", "wishlist", id] if !id.is_empty() => Ok(Route::Wishlist { id: id.to_string() }),
      _ => Err(RouteError(trimmed.to_string())),
    }
  }
}

impl fmt::Display for Route {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Route::Home => f.write_str("/"),
      Route::Products => f.write_str("/list"),
      Route::Wishlist { id } => write!(f, "/wishlist/{}", id),
    }
  }
}
