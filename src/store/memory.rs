//! In-memory store used for demo mode and tests.
//!
//! Evaluates the same typed selects as the PostgREST client and enforces the
//! store contracts the hosted schema provides (cascading deletes, unique
//! links, foreign keys).

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use serde_json::{json, Value};

use super::query::{Column, Relation, Select};
use super::{Row, Store, StoreError, Table};

type Tables = HashMap<Table, Vec<Row>>;

#[derive(Default)]
pub struct MemoryStore {
  tables: Mutex<Tables>,
  failing: Mutex<HashSet<Table>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// A store pre-filled with a few lists for trying the app without a backend.
  pub fn with_sample_data() -> Self {
    let store = Self::new();
    {
      let mut tables = store.tables();
      let samples: [(&str, &str, &[(&str, Option<&str>, bool)]); 3] = [
        (
          "Cozinha",
          "🍳",
          &[
            ("Chaleira", Some("high"), false),
            ("Panela de pressão", Some("medium"), true),
            ("Pano de prato", None, false),
          ],
        ),
        (
          "Banheiro",
          "🛁",
          &[("Toalhas", Some("low"), false), ("Tapete", Some("medium"), false)],
        ),
        ("Sala", "📺", &[]),
      ];

      for (name, icon, products) in samples {
        let Ok(wishlist) = insert_rows(
          &mut tables,
          Table::Wishlist,
          vec![row(json!({ "name": name, "icon": icon }))],
        ) else {
          continue;
        };
        let Some(wishlist_id) = wishlist.first().and_then(|w| w.get("id")).cloned() else {
          continue;
        };
        for (product_name, priority, checked) in products {
          let Ok(product) = insert_rows(
            &mut tables,
            Table::Product,
            vec![row(json!({ "name": product_name, "priority": priority }))],
          ) else {
            continue;
          };
          if let Some(product_id) = product.first().and_then(|p| p.get("id")).cloned() {
            let _ = insert_rows(
              &mut tables,
              Table::WishlistProducts,
              vec![row(json!({
                "wishlist_id": wishlist_id,
                "product_id": product_id,
                "checked": checked,
              }))],
            );
          }
        }
      }
    }
    store
  }

  /// Make every subsequent write to `table` fail.
  #[cfg(test)]
  pub fn fail_writes_to(&self, table: Table) {
    self
      .failing
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(table);
  }

  /// Number of rows currently in `table`.
  #[cfg(test)]
  pub fn count(&self, table: Table) -> usize {
    self.tables().get(&table).map(Vec::len).unwrap_or(0)
  }

  fn tables(&self) -> MutexGuard<'_, Tables> {
    self.tables.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn check_writable(&self, table: Table) -> Result<(), StoreError> {
    let failing = self.failing.lock().unwrap_or_else(PoisonError::into_inner);
    if failing.contains(&table) {
      return Err(StoreError::Status {
        status: 503,
        message: format!("{} is unavailable", table.name()),
      });
    }
    Ok(())
  }
}

fn row(value: Value) -> Row {
  match value {
    Value::Object(map) => map,
    _ => Row::new(),
  }
}

fn insert_rows(tables: &mut Tables, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
  let mut prepared = Vec::with_capacity(rows.len());
  for mut new_row in rows {
    new_row
      .entry("id")
      .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
    new_row
      .entry("created_at")
      .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));

    match table {
      Table::Wishlist => {
        require(&new_row, "name")?;
        new_row.entry("icon").or_insert(Value::Null);
        new_row.entry("color").or_insert(Value::Null);
      }
      Table::Product => {
        require(&new_row, "name")?;
        new_row.entry("priority").or_insert(Value::Null);
      }
      Table::WishlistProducts => {
        new_row.entry("checked").or_insert(Value::Bool(false));
        check_link(tables, &prepared, &new_row)?;
      }
    }
    prepared.push(new_row);
  }

  tables.entry(table).or_default().extend(prepared.iter().cloned());
  Ok(prepared)
}

fn require(row: &Row, column: &str) -> Result<(), StoreError> {
  match row.get(column) {
    Some(Value::Null) | None => Err(StoreError::Status {
      status: 400,
      message: format!("null value in column \"{}\" violates not-null constraint", column),
    }),
    Some(_) => Ok(()),
  }
}

/// Foreign keys and `(wishlist_id, product_id)` uniqueness.
fn check_link(tables: &Tables, pending: &[Row], link: &Row) -> Result<(), StoreError> {
  let references = |table: Table, column: &str| {
    let target = link.get(column);
    target.is_some()
      && tables
        .get(&table)
        .is_some_and(|rows| rows.iter().any(|r| r.get("id") == target))
  };
  if !references(Table::Wishlist, "wishlist_id") || !references(Table::Product, "product_id") {
    return Err(StoreError::Conflict(
      "insert on wishlist_products violates foreign key constraint".to_string(),
    ));
  }

  let same_pair = |other: &Row| {
    other.get("wishlist_id") == link.get("wishlist_id")
      && other.get("product_id") == link.get("product_id")
  };
  let existing = tables
    .get(&Table::WishlistProducts)
    .map(|rows| rows.iter().any(same_pair))
    .unwrap_or(false);
  if existing || pending.iter().any(same_pair) {
    return Err(StoreError::Conflict(
      "duplicate key value violates unique constraint on (wishlist_id, product_id)".to_string(),
    ));
  }
  Ok(())
}

fn evaluate(tables: &Tables, query: &Select) -> Vec<Row> {
  let rows = tables.get(&query.table).map(Vec::as_slice).unwrap_or(&[]);

  let mut matched: Vec<&Row> = rows
    .iter()
    .filter(|row| {
      query
        .filters
        .iter()
        .all(|f| row.get(f.column).unwrap_or(&Value::Null) == &f.value)
    })
    .collect();

  if let Some(order) = query.order {
    matched.sort_by(|a, b| {
      let ord = compare(a.get(order.column), b.get(order.column));
      if order.ascending {
        ord
      } else {
        ord.reverse()
      }
    });
  }

  matched
    .into_iter()
    .map(|row| project(tables, row, &query.columns))
    .collect()
}

fn project(tables: &Tables, row: &Row, columns: &[Column]) -> Row {
  if columns.is_empty() {
    return row.clone();
  }

  let mut out = Row::new();
  for column in columns {
    match column {
      Column::All => {
        out.extend(row.iter().map(|(k, v)| (k.clone(), v.clone())));
      }
      Column::Field(name) => {
        out.insert(
          (*name).to_string(),
          row.get(*name).cloned().unwrap_or(Value::Null),
        );
      }
      Column::Embed(Relation::Many { table, foreign_key }, inner) => {
        let id = row.get("id");
        let children = tables
          .get(table)
          .map(|rows| {
            rows
              .iter()
              .filter(|child| id.is_some() && child.get(*foreign_key) == id)
              .map(|child| Value::Object(project(tables, child, inner)))
              .collect()
          })
          .unwrap_or_default();
        out.insert(table.name().to_string(), Value::Array(children));
      }
      Column::Embed(
        Relation::One {
          alias,
          table,
          column,
        },
        inner,
      ) => {
        let target = row.get(*column).filter(|v| !v.is_null());
        let found = tables
          .get(table)
          .and_then(|rows| rows.iter().find(|r| target.is_some() && r.get("id") == target))
          .map(|r| Value::Object(project(tables, r, inner)))
          .unwrap_or(Value::Null);
        out.insert((*alias).to_string(), found);
      }
    }
  }
  out
}

/// Postgres ordering: nulls sort last ascending, first descending.
fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
  let a = a.filter(|v| !v.is_null());
  let b = b.filter(|v| !v.is_null());
  match (a, b) {
    (None, None) => Ordering::Equal,
    (None, Some(_)) => Ordering::Greater,
    (Some(_), None) => Ordering::Less,
    (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
    (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
    (Some(Value::Number(x)), Some(Value::Number(y))) => x
      .as_f64()
      .partial_cmp(&y.as_f64())
      .unwrap_or(Ordering::Equal),
    _ => Ordering::Equal,
  }
}

impl Store for MemoryStore {
  fn select(&self, query: Select) -> BoxFuture<'_, Result<Vec<Row>, StoreError>> {
    let result = evaluate(&self.tables(), &query);
    async move { Ok(result) }.boxed()
  }

  fn insert(&self, table: Table, rows: Vec<Row>) -> BoxFuture<'_, Result<Vec<Row>, StoreError>> {
    let result = self
      .check_writable(table)
      .and_then(|()| insert_rows(&mut self.tables(), table, rows));
    async move { result }.boxed()
  }

  fn update<'a>(
    &'a self,
    table: Table,
    id: &'a str,
    patch: Row,
  ) -> BoxFuture<'a, Result<Row, StoreError>> {
    let result = self.check_writable(table).and_then(|()| {
      let mut tables = self.tables();
      let existing = tables
        .get_mut(&table)
        .and_then(|rows| rows.iter_mut().find(|r| r.get("id") == Some(&json!(id))))
        .ok_or_else(|| StoreError::NotFound {
          table: table.name(),
          id: id.to_string(),
        })?;
      for (key, value) in patch {
        if key != "id" {
          existing.insert(key, value);
        }
      }
      Ok(existing.clone())
    });
    async move { result }.boxed()
  }

  fn delete<'a>(&'a self, table: Table, id: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
    let result = self.check_writable(table).map(|()| {
      let mut tables = self.tables();
      let id = json!(id);
      if let Some(rows) = tables.get_mut(&table) {
        rows.retain(|r| r.get("id") != Some(&id));
      }
      let cascade_column = match table {
        Table::Wishlist => Some("wishlist_id"),
        Table::Product => Some("product_id"),
        Table::WishlistProducts => None,
      };
      if let Some(column) = cascade_column {
        if let Some(links) = tables.get_mut(&Table::WishlistProducts) {
          links.retain(|r| r.get(column) != Some(&id));
        }
      }
    });
    async move { result }.boxed()
  }
}
