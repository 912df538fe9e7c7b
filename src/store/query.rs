//! Typed select queries.

use serde_json::Value;

use super::Table;

/// A relationship embedded in a select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
  /// Rows of `table` whose `foreign_key` references this row's `id`.
  Many {
    table: Table,
    foreign_key: &'static str,
  },
  /// The `table` row referenced by this row's `column`, exposed as `alias`.
  One {
    alias: &'static str,
    table: Table,
    column: &'static str,
  },
}

/// A projected column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
  All,
  Field(&'static str),
  Embed(Relation, Vec<Column>),
}

impl Column {
  pub fn many(table: Table, foreign_key: &'static str, columns: Vec<Column>) -> Self {
    Column::Embed(Relation::Many { table, foreign_key }, columns)
  }

  pub fn one(
    alias: &'static str,
    table: Table,
    column: &'static str,
    columns: Vec<Column>,
  ) -> Self {
    Column::Embed(
      Relation::One {
        alias,
        table,
        column,
      },
      columns,
    )
  }

  /// Render a column list in PostgREST `select` syntax.
  pub fn render_list(columns: &[Column]) -> String {
    if columns.is_empty() {
      return "*".to_string();
    }
    columns
      .iter()
      .map(Column::render)
      .collect::<Vec<_>>()
      .join(",")
  }

  fn render(&self) -> String {
    match self {
      Column::All => "*".to_string(),
      Column::Field(name) => (*name).to_string(),
      Column::Embed(Relation::Many { table, .. }, inner) => {
        format!("{}({})", table.name(), Column::render_list(inner))
      }
      Column::Embed(Relation::One { alias, column, .. }, inner) => {
        format!("{}:{}({})", alias, column, Column::render_list(inner))
      }
    }
  }
}

/// Equality filter on a column.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
  pub column: &'static str,
  pub value: Value,
}

impl Filter {
  /// Operator and value in PostgREST filter syntax. Null needs `is`.
  pub fn render_condition(&self) -> String {
    match &self.value {
      Value::String(s) => format!("eq.{}", s),
      Value::Null => "is.null".to_string(),
      other => format!("eq.{}", other),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
  pub column: &'static str,
  pub ascending: bool,
}

/// A select against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
  pub table: Table,
  pub columns: Vec<Column>,
  pub filters: Vec<Filter>,
  pub order: Option<Order>,
}

impl Select {
  pub fn from(table: Table) -> Self {
    Self {
      table,
      columns: Vec::new(),
      filters: Vec::new(),
      order: None,
    }
  }

  pub fn columns(mut self, columns: Vec<Column>) -> Self {
    self.columns = columns;
    self
  }

  pub fn eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
    self.filters.push(Filter {
      column,
      value: value.into(),
    });
    self
  }

  pub fn order(mut self, column: &'static str, ascending: bool) -> Self {
    self.order = Some(Order { column, ascending });
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_columns_render_as_star() {
    assert_eq!(Column::render_list(&[]), "*");
  }

  #[test]
  fn test_render_many_embed() {
    let cols = vec![
      Column::All,
      Column::many(
        Table::WishlistProducts,
        "wishlist_id",
        vec![Column::Field("id"), Column::Field("checked")],
      ),
    ];
    assert_eq!(
      Column::render_list(&cols),
      "*,wishlist_products(id,checked)"
    );
  }

  #[test]
  fn test_render_one_embed_with_alias() {
    let cols = vec![
      Column::Field("id"),
      Column::Field("checked"),
      Column::one(
        "product",
        Table::Product,
        "product_id",
        vec![
          Column::Field("id"),
          Column::Field("name"),
          Column::Field("priority"),
        ],
      ),
    ];
    assert_eq!(
      Column::render_list(&cols),
      "id,checked,product:product_id(id,name,priority)"
    );
  }

  #[test]
  fn test_filter_values() {
    let select = Select::from(Table::WishlistProducts)
      .eq("wishlist_id", "abc")
      .eq("checked", true)
      .eq("priority", Value::Null);
    assert_eq!(select.filters[0].render_condition(), "eq.abc");
    assert_eq!(select.filters[1].render_condition(), "eq.true");
    assert_eq!(select.filters[2].render_condition(), "is.null");
  }
}
