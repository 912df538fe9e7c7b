//! Domain types for wishlists, their products and the forms that create them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Emoji a wishlist can be tagged with.
pub const ICONS: [&str; 9] = ["🏡", "🍳", "🛁", "📺", "🛏️", "✂️", "🐈", "🛠️", "🛍️"];

/// Card background used when a wishlist has no color of its own.
const CARD_COLORS: [&str; 4] = ["#ffd977", "#c9f2f1", "#c7dab8", "#ffba78"];

pub fn card_color(index: usize) -> &'static str {
  CARD_COLORS[index % CARD_COLORS.len()]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
  Low,
  #[default]
  Medium,
  High,
}

impl Priority {
  pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

  pub fn as_str(self) -> &'static str {
    match self {
      Priority::Low => "low",
      Priority::Medium => "medium",
      Priority::High => "high",
    }
  }

  /// Sort position: high first, unset last.
  pub fn rank(priority: Option<Priority>) -> u8 {
    match priority {
      Some(Priority::High) => 0,
      Some(Priority::Medium) => 1,
      Some(Priority::Low) => 2,
      None => 3,
    }
  }

  pub fn next(self) -> Priority {
    match self {
      Priority::Low => Priority::Medium,
      Priority::Medium => Priority::High,
      Priority::High => Priority::Low,
    }
  }

  pub fn prev(self) -> Priority {
    match self {
      Priority::Low => Priority::High,
      Priority::Medium => Priority::Low,
      Priority::High => Priority::Medium,
    }
  }
}

impl fmt::Display for Priority {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A wishlist's own fields, as shown on the detail screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wishlist {
  pub id: String,
  pub name: String,
  pub icon: Option<String>,
  pub color: Option<String>,
  pub created_at: DateTime<Utc>,
}

/// Checked state of one link, embedded in a wishlist summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkState {
  pub id: String,
  pub checked: bool,
}

/// A wishlist with the checked state of each of its links, for the listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistSummary {
  pub id: String,
  pub name: String,
  pub icon: Option<String>,
  pub color: Option<String>,
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub wishlist_products: Vec<LinkState>,
}

impl WishlistSummary {
  pub fn total_items(&self) -> usize {
    self.wishlist_products.len()
  }

  pub fn completed_items(&self) -> usize {
    self.wishlist_products.iter().filter(|l| l.checked).count()
  }

  /// Percentage of checked links, `0.0` for an empty list.
  pub fn progress(&self) -> f64 {
    progress_percent(self.completed_items(), self.total_items())
  }
}

/// Share of `done` in `total` as a percentage, `0.0` when `total` is zero.
pub fn progress_percent(done: usize, total: usize) -> f64 {
  if total == 0 {
    return 0.0;
  }
  done as f64 / total as f64 * 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRef {
  pub id: String,
  pub name: String,
  pub priority: Option<Priority>,
}

/// A link row joined with its product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedProduct {
  pub id: String,
  pub wishlist_id: String,
  pub checked: bool,
  pub product: ProductRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
  #[error("Name is required")]
  EmptyName,
  #[error("Unknown icon {0:?}")]
  UnknownIcon(String),
}

/// Validated input for a new wishlist row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewWishlist {
  pub name: String,
  pub icon: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WishlistForm {
  pub name: String,
  pub icon: String,
}

impl Default for WishlistForm {
  fn default() -> Self {
    Self {
      name: String::new(),
      icon: ICONS[0].to_string(),
    }
  }
}

impl WishlistForm {
  pub fn validate(&self) -> Result<NewWishlist, FormError> {
    let name = self.name.trim();
    if name.is_empty() {
      return Err(FormError::EmptyName);
    }
    if !ICONS.contains(&self.icon.as_str()) {
      return Err(FormError::UnknownIcon(self.icon.clone()));
    }
    Ok(NewWishlist {
      name: name.to_string(),
      icon: self.icon.clone(),
    })
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProduct {
  pub name: String,
  pub priority: Priority,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductForm {
  pub name: String,
  pub priority: Priority,
}

impl Default for ProductForm {
  fn default() -> Self {
    Self {
      name: String::new(),
      priority: Priority::default(),
    }
  }
}

impl ProductForm {
  pub fn validate(&self) -> Result<NewProduct, FormError> {
    let name = self.name.trim();
    if name.is_empty() {
      return Err(FormError::EmptyName);
    }
    Ok(NewProduct {
      name: name.to_string(),
      priority: self.priority,
    })
  }
}

/// Client-side priority filter for the flat product list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriorityFilter {
  selected: Option<Priority>,
}

impl PriorityFilter {
  pub fn selected(&self) -> Option<Priority> {
    self.selected
  }

  /// Select `priority`, or clear the filter if it is already selected.
  pub fn select(&mut self, priority: Priority) {
    self.selected = if self.selected == Some(priority) {
      None
    } else {
      Some(priority)
    };
  }

  pub fn clear(&mut self) {
    self.selected = None;
  }

  pub fn apply<'a>(&self, links: &'a [LinkedProduct]) -> Vec<&'a LinkedProduct> {
    links
      .iter()
      .filter(|l| match self.selected {
        Some(p) => l.product.priority == Some(p),
        None => true,
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn summary(states: &[bool]) -> WishlistSummary {
    WishlistSummary {
      id: "w1".to_string(),
      name: "Cozinha".to_string(),
      icon: Some("🍳".to_string()),
      color: None,
      created_at: Utc::now(),
      wishlist_products: states
        .iter()
        .enumerate()
        .map(|(i, checked)| LinkState {
          id: format!("l{}", i),
          checked: *checked,
        })
        .collect(),
    }
  }

  fn link(id: &str, priority: Option<Priority>) -> LinkedProduct {
    LinkedProduct {
      id: id.to_string(),
      wishlist_id: "w1".to_string(),
      checked: false,
      product: ProductRef {
        id: format!("p-{}", id),
        name: id.to_string(),
        priority,
      },
    }
  }

  #[test]
  fn test_progress_empty_is_zero() {
    let s = summary(&[]);
    assert_eq!(s.total_items(), 0);
    assert_eq!(s.completed_items(), 0);
    assert_eq!(s.progress(), 0.0);
  }

  #[test]
  fn test_progress_ratio() {
    let s = summary(&[true, false, false, true]);
    assert_eq!(s.completed_items(), 2);
    assert_eq!(s.progress(), 50.0);

    assert_eq!(summary(&[true, true]).progress(), 100.0);
    assert_eq!(summary(&[false]).progress(), 0.0);
  }

  #[test]
  fn test_progress_percent_matches_summary() {
    assert_eq!(progress_percent(0, 0), 0.0);
    assert_eq!(progress_percent(1, 4), 25.0);
    let s = summary(&[true, false, true]);
    assert_eq!(
      s.progress(),
      progress_percent(s.completed_items(), s.total_items())
    );
  }

  #[test]
  fn test_summary_without_links_field() {
    let json = r#"{"id":"w1","name":"Sala","icon":null,"color":null,"created_at":"2024-03-01T10:00:00+00:00"}"#;
    let s: WishlistSummary = serde_json::from_str(json).unwrap();
    assert!(s.wishlist_products.is_empty());
  }

  #[test]
  fn test_wishlist_form_rejects_blank_name() {
    let form = WishlistForm {
      name: "   ".to_string(),
      ..Default::default()
    };
    assert_eq!(form.validate(), Err(FormError::EmptyName));
  }

  #[test]
  fn test_wishlist_form_rejects_unknown_icon() {
    let form = WishlistForm {
      name: "Casa".to_string(),
      icon: "🚀".to_string(),
    };
    assert!(matches!(form.validate(), Err(FormError::UnknownIcon(_))));
  }

  #[test]
  fn test_wishlist_form_trims_name() {
    let form = WishlistForm {
      name: "  Kitchen ".to_string(),
      icon: "🍳".to_string(),
    };
    let new = form.validate().unwrap();
    assert_eq!(new.name, "Kitchen");
    assert_eq!(new.icon, "🍳");
  }

  #[test]
  fn test_product_form() {
    let mut form = ProductForm::default();
    assert_eq!(form.validate(), Err(FormError::EmptyName));

    form.name = "Kettle".to_string();
    form.priority = Priority::High;
    assert_eq!(
      form.validate().unwrap(),
      NewProduct {
        name: "Kettle".to_string(),
        priority: Priority::High,
      }
    );
  }

  #[test]
  fn test_priority_serde_is_lowercase() {
    assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"high\"");
    let p: Option<Priority> = serde_json::from_str("null").unwrap();
    assert_eq!(p, None);
  }

  #[test]
  fn test_priority_rank_and_cycle() {
    let mut ranked = vec![None, Some(Priority::Low), Some(Priority::High), Some(Priority::Medium)];
    ranked.sort_by_key(|p| Priority::rank(*p));
    assert_eq!(
      ranked,
      vec![Some(Priority::High), Some(Priority::Medium), Some(Priority::Low), None]
    );

    for p in Priority::ALL {
      assert_eq!(p.next().prev(), p);
    }
  }

  #[test]
  fn test_filter_select_twice_clears() {
    let mut filter = PriorityFilter::default();
    filter.select(Priority::High);
    assert_eq!(filter.selected(), Some(Priority::High));
    filter.select(Priority::High);
    assert_eq!(filter.selected(), None);
  }

  #[test]
  fn test_filter_apply() {
    let links = vec![
      link("a", Some(Priority::High)),
      link("b", Some(Priority::Low)),
      link("c", None),
      link("d", Some(Priority::High)),
    ];
    let mut filter = PriorityFilter::default();
    assert_eq!(filter.apply(&links).len(), 4);

    filter.select(Priority::High);
    let ids: Vec<_> = filter.apply(&links).iter().map(|l| l.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "d"]);

    filter.select(Priority::Low);
    let ids: Vec<_> = filter.apply(&links).iter().map(|l| l.id.as_str()).collect();
    assert_eq!(ids, vec!["b"]);

    filter.clear();
    assert_eq!(filter.apply(&links).len(), 4);
  }

  #[test]
  fn test_card_color_wraps() {
    assert_eq!(card_color(0), "#ffd977");
    assert_eq!(card_color(5), "#c9f2f1");
  }
}
