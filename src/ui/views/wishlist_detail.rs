use crate::cache::{CacheResult, CacheSource};
use crate::query::{Mutation, MutationSet, Query, QueryState};
use crate::routes::Route;
use crate::ui::components::{
  ConfirmEvent, ConfirmPrompt, FormEvent, KeyResult, Notification, ProductFormPopup,
};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{priority_color, progress_bar, truncate};
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::wishlist::{
  progress_percent, LinkedProduct, ProductForm, Wishlist, WishlistClient, WishlistQueryKey,
};
use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use tracing::warn;

/// One wishlist with its products: check them off, add, remove, or delete the list
pub struct WishlistDetailView {
  id: String,
  client: WishlistClient,
  wishlist: Query<CacheResult<Wishlist>>,
  products: Query<CacheResult<Vec<LinkedProduct>>>,
  list_state: ListState,

  form: ProductFormPopup,
  confirm: ConfirmPrompt,

  add: Mutation<LinkedProduct>,
  // keyed by link id
  toggles: MutationSet<String, bool>,
  removals: MutationSet<String, ()>,
  delete: Mutation<()>,

  notification: Option<Notification>,
  closing: bool,
}

impl WishlistDetailView {
  pub fn new(id: String, client: WishlistClient) -> Self {
    let wishlist_client = client.clone();
    let wishlist_id = id.clone();
    let mut wishlist = Query::new(move || {
      let client = wishlist_client.clone();
      let id = wishlist_id.clone();
      async move { client.get_wishlist(&id).await.map_err(|e| e.to_string()) }
    });

    let products_client = client.clone();
    let products_id = id.clone();
    let mut products = Query::new(move || {
      let client = products_client.clone();
      let id = products_id.clone();
      async move {
        client
          .wishlist_products(&id)
          .await
          .map_err(|e| e.to_string())
      }
    });

    wishlist.fetch();
    products.fetch();

    Self {
      id,
      client,
      wishlist,
      products,
      list_state: ListState::default(),
      form: ProductFormPopup::new(),
      confirm: ConfirmPrompt::new(),
      add: Mutation::new(),
      toggles: MutationSet::new(),
      removals: MutationSet::new(),
      delete: Mutation::new(),
      notification: None,
      closing: false,
    }
  }

  fn links(&self) -> &[LinkedProduct] {
    self.products.data().map(|r| r.data.as_slice()).unwrap_or(&[])
  }

  fn selected(&self) -> Option<&LinkedProduct> {
    self
      .list_state
      .selected()
      .and_then(|idx| self.links().get(idx))
  }

  fn is_loading(&self) -> bool {
    self.wishlist.is_loading() || self.products.is_loading()
  }

  fn refresh(&mut self) {
    let keys = [
      WishlistQueryKey::Wishlist {
        id: self.id.clone(),
      },
      WishlistQueryKey::WishlistProducts {
        wishlist_id: self.id.clone(),
      },
    ];
    for key in &keys {
      if let Err(e) = self.client.invalidate(key) {
        warn!(?key, error = %e, "failed to invalidate");
      }
    }
    self.wishlist.refetch();
    self.products.refetch();
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

  fn remove_selected(&mut self) {
    let Some(link) = self.selected() else {
      return;
    };
    let id = link.id.clone();
    let client = self.client.clone();
    let started = self.removals.start(id.clone(), async move {
      client.remove_link(&id).await.map_err(|e| e.to_string())
    });
    if !started {
      self.notification = Some(Notification::error("Still removing this product."));
    }
  }

  fn delete_wishlist(&mut self) {
    let id = self.id.clone();
    let client = self.client.clone();
    self
      .delete
      .start(async move { client.delete_wishlist(&id).await.map_err(|e| e.to_string()) });
  }

  fn submit(&mut self, form: ProductForm) {
    if let Err(e) = form.validate() {
      self.notification = Some(Notification::error(e.to_string()));
      return;
    }
    let id = self.id.clone();
    let client = self.client.clone();
    let started = self.add.start(async move {
      client
        .add_product(&id, &form)
        .await
        .map_err(|e| e.to_string())
    });
    if started {
      self.form.set_saving(true);
    }
  }

  fn poll_mutations(&mut self) {
    match self.add.poll() {
      Some(Ok(link)) => {
        self.form.reset();
        self
          .products
          .update_data(|r| r.data.push(link));
        self.notification = Some(Notification::success("Product added to the list"));
      }
      Some(Err(e)) => {
        warn!(error = %e, "add product failed");
        self.form.set_saving(false);
        self.notification = Some(Notification::error("Failed to add product. Please try again."));
      }
      None => {}
    }

    for (id, result) in self.toggles.poll() {
      match result {
        Ok(checked) => {
          self.products.update_data(|r| {
            for link in r.data.iter_mut().filter(|l| l.id == id) {
              link.checked = checked;
            }
          });
        }
        Err(e) => {
          warn!(link = %id, error = %e, "toggle failed");
          self.notification = Some(Notification::error("Failed to update product. Please try again."));
        }
      }
    }

    for (id, result) in self.removals.poll() {
      match result {
        Ok(()) => {
          self.products.update_data(|r| r.data.retain(|l| l.id != id));
          self.notification = Some(Notification::success("Product removed from the list"));
        }
        Err(e) => {
          warn!(link = %id, error = %e, "remove link failed");
          self.notification = Some(Notification::error("Failed to remove product."));
        }
      }
    }

    match self.delete.poll() {
      Some(Ok(())) => {
        self.notification = Some(Notification::success("Wishlist deleted"));
        self.closing = true;
      }
      Some(Err(e)) => {
        warn!(error = %e, "delete wishlist failed");
        self.notification = Some(Notification::error("Failed to delete wishlist."));
      }
      None => {}
    }
  }

  fn render_summary(&self, frame: &mut Frame, area: Rect) {
    let links = self.links();
    let total = links.len();
    let done = links.iter().filter(|l| l.checked).count();
    let percent = progress_percent(done, total);

    let heading = match self.wishlist.state() {
      QueryState::Error(e) => Line::styled(
        format!("Failed to load wishlist: {}", e),
        Style::default().fg(Color::Red),
      ),
      _ => match self.wishlist.data() {
        Some(r) => Line::from(vec![
          Span::raw(format!("{} ", r.data.icon.as_deref().unwrap_or(" "))),
          Span::styled(r.data.name.as_str(), Style::default().fg(Color::Yellow).bold()),
        ]),
        None => Line::styled("loading...", Style::default().fg(Color::DarkGray)),
      },
    };
    let progress = Line::from(vec![
      Span::styled(progress_bar(percent, 20), Style::default().fg(Color::Green)),
      Span::styled(
        format!("  {} de {} itens", done, total),
        Style::default().fg(Color::Gray),
      ),
    ]);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    frame.render_widget(Paragraph::new(vec![heading, progress]).block(block), area);
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.links().len();
    ensure_valid_selection(&mut self.list_state, len);

    let title = if self.is_loading() {
      " Products (loading...) ".to_string()
    } else if let Some(e) = self.products.error() {
      format!(" Products (error: {}) ", e)
    } else {
      format!(" Products ({}) ", len)
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 && !self.is_loading() {
      let content = if self.products.is_error() {
        "Failed to load products. Press 'r' to retry."
      } else {
        "No products yet. Press 'a' to add one."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = self
      .links()
      .iter()
      .map(|link| {
        let (checkbox, name_style) = if link.checked {
          (
            "[x]",
            Style::default()
              .fg(Color::DarkGray)
              .add_modifier(Modifier::CROSSED_OUT),
          )
        } else {
          ("[ ]", Style::default())
        };
        let priority = link
          .product
          .priority
          .map(|p| p.to_string())
          .unwrap_or_default();

        ListItem::new(Line::from(vec![
          Span::raw(format!("{} ", checkbox)),
          Span::styled(format!("{:<40}", truncate(&link.product.name, 40)), name_style),
          Span::raw(" "),
          Span::styled(
            priority,
            Style::default().fg(priority_color(link.product.priority)),
          ),
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

  fn handle_overlays(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match self.confirm.handle_key(key) {
      KeyResult::Handled | KeyResult::Event(ConfirmEvent::Declined) => {
        return Some(ViewAction::None)
      }
      KeyResult::Event(ConfirmEvent::Confirmed) => {
        self.delete_wishlist();
        return Some(ViewAction::None);
      }
      KeyResult::NotHandled => {}
    }

    match self.form.handle_key(key) {
      KeyResult::Handled | KeyResult::Event(FormEvent::Cancelled) => Some(ViewAction::None),
      KeyResult::Event(FormEvent::Submitted(form)) => {
        self.submit(form);
        Some(ViewAction::None)
      }
      KeyResult::NotHandled => None,
    }
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

  fn handle_actions(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char(' ') | KeyCode::Enter => self.toggle_selected(),
      KeyCode::Char('a') => self.form.open(),
      KeyCode::Char('d') => self.remove_selected(),
      KeyCode::Char('D') => {
        let name = self
          .wishlist
          .data()
          .map(|r| r.data.name.clone())
          .unwrap_or_else(|| "this wishlist".to_string());
        self.confirm.ask(format!("Delete \"{}\" and its links?", name));
      }
      KeyCode::Char('r') => self.refresh(),
      KeyCode::Char('q') | KeyCode::Esc => return Some(ViewAction::Pop),
      _ => return None,
    }
    Some(ViewAction::None)
  }
}

impl View for WishlistDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    self
      .handle_overlays(key)
      .or_else(|| self.handle_navigation(key))
      .or_else(|| self.handle_actions(key))
      .unwrap_or(ViewAction::None)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(4), Constraint::Min(0)])
      .split(area);

    self.render_summary(frame, chunks[0]);
    self.render_list(frame, chunks[1]);
    self.form.render_overlay(frame, area);
    self.confirm.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    match self.wishlist.data() {
      Some(r) => r.data.name.clone(),
      None => self.id.clone(),
    }
  }

  fn route(&self) -> Route {
    Route::Wishlist {
      id: self.id.clone(),
    }
  }

  fn data_source(&self) -> Option<(CacheSource, Option<DateTime<Utc>>)> {
    let sources = [
      self.wishlist.data().map(|r| (r.source, r.cached_at)),
      self.products.data().map(|r| (r.source, r.cached_at)),
    ];
    // Offline wins so a partially stale screen is still flagged.
    sources
      .iter()
      .flatten()
      .copied()
      .find(|(s, _)| s.is_offline())
      .or(sources[1])
      .or(sources[0])
  }

  fn captures_input(&self) -> bool {
    self.form.is_open() || self.confirm.is_active()
  }

  fn tick(&mut self) -> ViewAction {
    self.wishlist.poll();
    self.products.poll();
    self.poll_mutations();

    if self.closing {
      ViewAction::Pop
    } else {
      ViewAction::None
    }
  }

  fn on_resume(&mut self) {
    self.wishlist.refetch();
    self.products.refetch();
  }

  fn reload(&mut self) {
    self.wishlist.refetch();
    self.products.refetch();
  }

  fn take_notification(&mut self) -> Option<Notification> {
    self.notification.take()
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("space", "check"),
      Shortcut::new("a", "add"),
      Shortcut::new("d", "remove"),
      Shortcut::new("D", "delete list"),
      Shortcut::new("r", "refresh"),
      Shortcut::new("q", "back").with_priority(200),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::{MemoryStore, Table};
  use crate::ui::views::test_support::{client, draw, key, press, sample_id, settle};
  use std::sync::Arc;
  use std::time::Duration;

  async fn kitchen(store: Arc<MemoryStore>) -> WishlistDetailView {
    let client = client(store);
    let id = sample_id(&client, "Cozinha").await;
    let mut view = WishlistDetailView::new(id, client);
    settle(&mut view).await;
    draw(&mut view);
    view
  }

  fn checked(view: &WishlistDetailView) -> Vec<bool> {
    view.links().iter().map(|l| l.checked).collect()
  }

  #[tokio::test]
  async fn test_loading_until_both_fetches_arrive() {
    let client = client(Arc::new(MemoryStore::with_sample_data()));
    let id = sample_id(&client, "Cozinha").await;
    let mut view = WishlistDetailView::new(id, client);
    assert!(view.is_loading());

    tokio::time::sleep(Duration::from_millis(20)).await;
    view.wishlist.poll();
    assert!(view.wishlist.data().is_some());
    assert!(view.is_loading());

    view.products.poll();
    assert!(!view.is_loading());
    assert_eq!(view.breadcrumb_label(), "Cozinha");
  }

  #[tokio::test]
  async fn test_toggles_on_two_rows_both_apply() {
    let mut view = kitchen(Arc::new(MemoryStore::with_sample_data())).await;
    assert_eq!(checked(&view), vec![false, true, false]);

    press(&mut view, " ");
    view.handle_key(key(KeyCode::Down));
    press(&mut view, " ");
    assert!(view.take_notification().is_none());
    settle(&mut view).await;

    assert_eq!(checked(&view), vec![true, false, false]);
    let cached = view.client.wishlist_products(&view.id).await.unwrap();
    let flags: Vec<bool> = cached.data.iter().map(|l| l.checked).collect();
    assert_eq!(flags, vec![true, false, false]);
  }

  #[tokio::test]
  async fn test_toggle_on_busy_row_is_reported() {
    let mut view = kitchen(Arc::new(MemoryStore::with_sample_data())).await;

    press(&mut view, "  ");
    let n = view.take_notification().unwrap();
    assert_eq!(n.message, "Still saving this product.");
    settle(&mut view).await;

    assert_eq!(checked(&view), vec![true, true, false]);
  }

  #[tokio::test]
  async fn test_failed_add_keeps_form_filled_and_editable() {
    let store = Arc::new(MemoryStore::with_sample_data());
    store.fail_writes_to(Table::Product);
    let mut view = kitchen(store).await;

    press(&mut view, "aChaleira");
    assert!(view.captures_input());
    view.handle_key(key(KeyCode::Enter));
    // locked while the write runs
    press(&mut view, "x");
    assert_eq!(view.form.form().name, "Chaleira");

    settle(&mut view).await;
    let n = view.take_notification().unwrap();
    assert_eq!(n.message, "Failed to add product. Please try again.");
    assert!(view.form.is_open());
    press(&mut view, "!");
    assert_eq!(view.form.form().name, "Chaleira!");
    assert_eq!(view.links().len(), 3);
  }

  #[tokio::test]
  async fn test_add_appends_link_and_closes_form() {
    let mut view = kitchen(Arc::new(MemoryStore::with_sample_data())).await;

    press(&mut view, "aFruteira");
    view.handle_key(key(KeyCode::Enter));
    settle(&mut view).await;

    assert!(!view.form.is_open());
    assert_eq!(
      view.take_notification().map(|n| n.message),
      Some("Product added to the list".to_string())
    );
    let names: Vec<&str> = view.links().iter().map(|l| l.product.name.as_str()).collect();
    assert_eq!(names.len(), 4);
    assert_eq!(names[3], "Fruteira");
  }

  #[tokio::test]
  async fn test_remove_drops_selected_link() {
    let mut view = kitchen(Arc::new(MemoryStore::with_sample_data())).await;

    press(&mut view, "d");
    settle(&mut view).await;

    let names: Vec<&str> = view.links().iter().map(|l| l.product.name.as_str()).collect();
    assert_eq!(names, vec!["Panela de pressão", "Pano de prato"]);
  }

  #[tokio::test]
  async fn test_confirmed_delete_pops_back() {
    let store = Arc::new(MemoryStore::with_sample_data());
    let mut view = kitchen(store.clone()).await;

    press(&mut view, "D");
    assert!(view.captures_input());
    press(&mut view, "n");
    assert!(!view.captures_input());
    assert!(matches!(view.tick(), ViewAction::None));
    assert_eq!(store.count(Table::Wishlist), 3);

    press(&mut view, "Dy");
    settle(&mut view).await;

    assert!(matches!(view.tick(), ViewAction::Pop));
    assert_eq!(
      view.take_notification().map(|n| n.message),
      Some("Wishlist deleted".to_string())
    );
    assert_eq!(store.count(Table::Wishlist), 2);
  }
}
