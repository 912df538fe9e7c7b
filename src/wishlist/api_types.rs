//! Row shapes exchanged with the remote store.
//!
//! Reads decode straight into domain types where the shapes match; these types
//! cover the rows that need massaging first and the bodies of inserts.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::store::{Row, StoreError};

use super::models::{LinkedProduct, Priority, ProductRef};

/// Decode a store row into a typed value.
pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, StoreError> {
  Ok(serde_json::from_value(Value::Object(row))?)
}

/// Encode a typed value as a store row.
pub fn to_row(value: impl Serialize) -> Result<Row, StoreError> {
  match serde_json::to_value(value)? {
    Value::Object(row) => Ok(row),
    other => Err(StoreError::Status {
      status: 400,
      message: format!("expected an object row, got {}", other),
    }),
  }
}

/// A link row with its product embedded as `product`.
///
/// The embed is null when the product row is gone.
#[derive(Debug, Deserialize)]
pub struct ApiLinkedProduct {
  pub id: String,
  pub wishlist_id: String,
  #[serde(default)]
  pub checked: bool,
  pub product: Option<ProductRef>,
}

impl ApiLinkedProduct {
  pub fn into_linked(self) -> Option<LinkedProduct> {
    let product = self.product?;
    Some(LinkedProduct {
      id: self.id,
      wishlist_id: self.wishlist_id,
      checked: self.checked,
      product,
    })
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiLink {
  pub id: String,
  pub wishlist_id: String,
  #[serde(default)]
  pub checked: bool,
}

#[derive(Debug, Serialize)]
pub struct NewProductRow<'a> {
  pub name: &'a str,
  pub priority: Priority,
}

#[derive(Debug, Serialize)]
pub struct NewLinkRow<'a> {
  pub wishlist_id: &'a str,
  pub product_id: &'a str,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn row(value: Value) -> Row {
    match value {
      Value::Object(map) => map,
      _ => panic!("not an object"),
    }
  }

  #[test]
  fn test_linked_product_from_row() {
    let api: ApiLinkedProduct = from_row(row(json!({
      "id": "l1",
      "wishlist_id": "w1",
      "checked": true,
      "product": { "id": "p1", "name": "Chaleira", "priority": "high" }
    })))
    .unwrap();
    let linked = api.into_linked().unwrap();
    assert!(linked.checked);
    assert_eq!(linked.product.priority, Some(Priority::High));
  }

  #[test]
  fn test_missing_product_is_dropped() {
    let api: ApiLinkedProduct = from_row(row(json!({
      "id": "l1",
      "wishlist_id": "w1",
      "checked": false,
      "product": null
    })))
    .unwrap();
    assert!(api.into_linked().is_none());
  }

  #[test]
  fn test_bad_row_is_decode_error() {
    let result: Result<ApiLink, _> = from_row(row(json!({ "id": 7 })));
    assert!(matches!(result, Err(StoreError::Decode(_))));
  }

  #[test]
  fn test_to_row() {
    let r = to_row(NewLinkRow {
      wishlist_id: "w1",
      product_id: "p1",
    })
    .unwrap();
    assert_eq!(r["wishlist_id"], "w1");
    assert!(to_row(3).is_err());
  }
}
