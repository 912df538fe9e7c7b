use crate::cache::{CacheResult, CacheSource};
use crate::query::{MutationSet, Query, QueryState};
use crate::routes::Route;
use crate::ui::components::Notification;
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{priority_color, truncate};
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::ui::views::WishlistDetailView;
use crate::wishlist::{LinkedProduct, Priority, PriorityFilter, WishlistClient, WishlistQueryKey};
use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use tracing::warn;

/// Every product across wishlists, high priority first, filterable by priority
pub struct ProductListView {
  client: WishlistClient,
  query: Query<CacheResult<Vec<LinkedProduct>>>,
  filter: PriorityFilter,
  list_state: ListState,
  // keyed by link id
  toggles: MutationSet<String, bool>,
  notification: Option<Notification>,
}

impl ProductListView {
  pub fn new(client: WishlistClient) -> Self {
    let client_for_query = client.clone();
    let mut query = Query::new(move || {
      let client = client_for_query.clone();
      async move { client.all_products().await.map_err(|e| e.to_string()) }
    });
    query.fetch();

    Self {
      client,
      query,
      filter: PriorityFilter::default(),
      list_state: ListState::default(),
      toggles: MutationSet::new(),
      notification: None,
    }
  }

  fn visible(&self) -> Vec<&LinkedProduct> {
    let links = self.query.data().map(|r| r.data.as_slice()).unwrap_or(&[]);
    self.filter.apply(links)
  }

  fn selected(&self) -> Option<&LinkedProduct> {
    let idx = self.list_state.selected()?;
    self.visible().get(idx).copied()
  }

  fn set_filter(&mut self, priority: Option<Priority>) {
    match priority {
      Some(p) => self.filter.select(p),
      None => self.filter.clear(),
    }
    self.list_state.select(Some(0));
  }

  fn toggle_selected(&mut self) {
    let Some(link) = self.selected() else {
      return;
    };
    let id = link.id.clone();
    let checked = !link.checked;
    let client = self.client.clone();
    let started = self.toggles.start(id.clone(), async move {
      client
        .set_checked(&id, checked)
        .await
        .map_err(|e| e.to_string())?;
      Ok(checked)
    });
    if !started {
      self.notification = Some(Notification::error("Still saving this product."));
    }
  }

  fn render_filters(&self, frame: &mut Frame, area: Rect) {
    let tab = |label: String, active: bool| {
      let style = if active {
        Style::default().fg(Color::Black).bg(Color::Cyan)
      } else {
        Style::default().fg(Color::Gray)
      };
      Span::styled(format!(" {} ", label), style)
    };

    let selected = self.filter.selected();
    let mut spans = vec![tab("0 all".to_string(), selected.is_none())];
    for (idx, priority) in Priority::ALL.iter().enumerate() {
      spans.push(Span::styled("│", Style::default().fg(Color::DarkGray)));
      spans.push(tab(
        format!("{} {}", idx + 1, priority),
        selected == Some(*priority),
      ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.visible().len();
    ensure_valid_selection(&mut self.list_state, len);

    let title = match self.query.state() {
      QueryState::Loading => " Products (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Products (error: {}) ", e),
      _ => format!(" Products ({}) ", len),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load products. Press 'r' to retry."
      } else if self.filter.selected().is_some() {
        "No products with this priority."
      } else {
        "No products yet."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = self
      .visible()
      .iter()
      .map(|link| {
        let checkbox = if link.checked { "[x]" } else { "[ ]" };
        let name_style = if link.checked {
          Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::CROSSED_OUT)
        } else {
          Style::default()
        };
        let priority = link
          .product
          .priority
          .map(|p| p.to_string())
          .unwrap_or_else(|| "-".to_string());

        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<8}", priority),
            Style::default().fg(priority_color(link.product.priority)),
          ),
          Span::raw(format!("{} ", checkbox)),
          Span::styled(truncate(&link.product.name, 60), name_style),
        ]))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }

  fn handle_navigation(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.list_state.select_next();
        Some(ViewAction::None)
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.list_state.select_previous();
        Some(ViewAction::None)
      }
      _ => None,
    }
  }

  fn handle_filters(&mut self, key: KeyEvent) -> Option<ViewAction> {
    let priority = match key.code {
      KeyCode::Char('0') => None,
      KeyCode::Char('1') => Some(Priority::Low),
      KeyCode::Char('2') => Some(Priority::Medium),
      KeyCode::Char('3') => Some(Priority::High),
      _ => return None,
    };
    self.set_filter(priority);
    Some(ViewAction::None)
  }

  fn handle_actions(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char(' ') => {
        self.toggle_selected();
        Some(ViewAction::None)
      }
      KeyCode::Enter => {
        let wishlist_id = self.selected()?.wishlist_id.clone();
        Some(ViewAction::Push(Box::new(WishlistDetailView::new(
          wishlist_id,
          self.client.clone(),
        ))))
      }
      KeyCode::Char('r') => {
        if let Err(e) = self.client.invalidate(&WishlistQueryKey::AllProducts) {
          warn!(error = %e, "failed to invalidate products");
        }
        self.query.refetch();
        Some(ViewAction::None)
      }
      KeyCode::Char('q') | KeyCode::Esc => Some(ViewAction::Pop),
      _ => None,
    }
  }
}

impl View for ProductListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    self
      .handle_navigation(key)
      .or_else(|| self.handle_filters(key))
      .or_else(|| self.handle_actions(key))
      .unwrap_or(ViewAction::None)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(1), Constraint::Min(0)])
      .split(area);

    self.render_filters(frame, chunks[0]);
    self.render_list(frame, chunks[1]);
  }

  fn breadcrumb_label(&self) -> String {
    match self.filter.selected() {
      Some(p) => format!("Products [{}]", p),
      None => "Products".to_string(),
    }
  }

  fn route(&self) -> Route {
    Route::Products
  }

  fn data_source(&self) -> Option<(CacheSource, Option<DateTime<Utc>>)> {
    self.query.data().map(|r| (r.source, r.cached_at))
  }

  fn tick(&mut self) -> ViewAction {
    self.query.poll();

    for (id, result) in self.toggles.poll() {
      match result {
        Ok(checked) => {
          self.query.update_data(|r| {
            for link in r.data.iter_mut().filter(|l| l.id == id) {
              link.checked = checked;
            }
          });
        }
        Err(e) => {
          warn!(link = %id, error = %e, "toggle failed");
          self.notification = Some(Notification::error(
            "Failed to update product. Please try again.",
          ));
        }
      }
    }
    ViewAction::None
  }

  fn on_resume(&mut self) {
    self.query.refetch();
  }

  fn reload(&mut self) {
    self.query.refetch();
  }

  fn take_notification(&mut self) -> Option<Notification> {
    self.notification.take()
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("0-3", "priority"),
      Shortcut::new("space", "check"),
      Shortcut::new("enter", "wishlist"),
      Shortcut::new("r", "refresh"),
      Shortcut::new("q", "back").with_priority(200),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::MemoryStore;
  use crate::ui::views::test_support::{client, draw, key, press, settle};
  use std::sync::Arc;

  async fn products() -> ProductListView {
    let mut view = ProductListView::new(client(Arc::new(MemoryStore::with_sample_data())));
    settle(&mut view).await;
    draw(&mut view);
    view
  }

  #[tokio::test]
  async fn test_priority_filter_toggles() {
    let mut view = products().await;
    assert_eq!(view.visible().len(), 5);
    assert_eq!(
      view.visible()[0].product.priority,
      Some(Priority::High)
    );

    press(&mut view, "2");
    assert_eq!(view.visible().len(), 2);
    assert!(view
      .visible()
      .iter()
      .all(|l| l.product.priority == Some(Priority::Medium)));
    assert_eq!(
      view.breadcrumb_label(),
      format!("Products [{}]", Priority::Medium)
    );

    // same key again clears
    press(&mut view, "2");
    assert_eq!(view.visible().len(), 5);
    press(&mut view, "10");
    assert_eq!(view.filter.selected(), None);
    assert_eq!(view.breadcrumb_label(), "Products");
  }

  #[tokio::test]
  async fn test_toggles_on_two_rows_both_apply() {
    let mut view = products().await;
    let before: Vec<(String, bool)> = view
      .visible()
      .iter()
      .map(|l| (l.id.clone(), l.checked))
      .collect();

    press(&mut view, " ");
    view.handle_key(key(KeyCode::Down));
    press(&mut view, " ");
    assert!(view.take_notification().is_none());
    settle(&mut view).await;

    for (id, was) in &before[..2] {
      let link = view.visible().into_iter().find(|l| &l.id == id).unwrap();
      assert_eq!(link.checked, !was);
    }
    for (id, was) in &before[2..] {
      let link = view.visible().into_iter().find(|l| &l.id == id).unwrap();
      assert_eq!(link.checked, *was);
    }
  }

  #[tokio::test]
  async fn test_enter_opens_owning_wishlist() {
    let mut view = products().await;
    let wishlist_id = view.visible()[0].wishlist_id.clone();
    match view.handle_key(key(KeyCode::Enter)) {
      ViewAction::Push(detail) => {
        assert_eq!(detail.route(), Route::Wishlist { id: wishlist_id })
      }
      _ => panic!("expected the detail view"),
    }
  }
}
