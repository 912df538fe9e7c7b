use crate::cache::{CacheResult, CacheSource};
use crate::query::{Mutation, Query, QueryState};
use crate::routes::Route;
use crate::ui::components::{FormEvent, KeyResult, Notification, WishlistFormPopup};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{hex_color, progress_bar, truncate};
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::ui::views::{ProductListView, WishlistDetailView};
use crate::wishlist::{
  card_color, Wishlist, WishlistClient, WishlistForm, WishlistQueryKey, WishlistSummary,
};
use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use tracing::warn;

/// Home screen: one card per wishlist with its progress
pub struct WishlistListView {
  client: WishlistClient,
  query: Query<CacheResult<Vec<WishlistSummary>>>,
  list_state: ListState,
  form: WishlistFormPopup,
  create: Mutation<Wishlist>,
  notification: Option<Notification>,
}

impl WishlistListView {
  pub fn new(client: WishlistClient) -> Self {
    let client_for_query = client.clone();
    let mut query = Query::new(move || {
      let client = client_for_query.clone();
      async move { client.list_wishlists().await.map_err(|e| e.to_string()) }
    });
    query.fetch();

    Self {
      client,
      query,
      list_state: ListState::default(),
      form: WishlistFormPopup::new(),
      create: Mutation::new(),
      notification: None,
    }
  }

  fn wishlists(&self) -> &[WishlistSummary] {
    self.query.data().map(|r| r.data.as_slice()).unwrap_or(&[])
  }

  fn selected(&self) -> Option<&WishlistSummary> {
    self
      .list_state
      .selected()
      .and_then(|idx| self.wishlists().get(idx))
  }

  fn refresh(&mut self) {
    if let Err(e) = self.client.invalidate(&WishlistQueryKey::Wishlists) {
      warn!(error = %e, "failed to invalidate wishlists");
    }
    self.query.refetch();
  }

  fn submit(&mut self, form: WishlistForm) {
    if let Err(e) = form.validate() {
      self.notification = Some(Notification::error(e.to_string()));
      return;
    }
    let client = self.client.clone();
    let started = self.create.start(async move {
      client.create_wishlist(&form).await.map_err(|e| e.to_string())
    });
    if started {
      self.form.set_saving(true);
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.wishlists().len();
    ensure_valid_selection(&mut self.list_state, len);

    let title = match self.query.state() {
      QueryState::Loading => " Wishlists (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Wishlists (error: {}) ", e),
      _ => format!(" Wishlists ({}) ", len),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load wishlists. Press 'r' to retry."
      } else {
        "No wishlists yet. Press 'n' to create one."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = self
      .wishlists()
      .iter()
      .enumerate()
      .map(|(idx, wishlist)| {
        let color = wishlist
          .color
          .as_deref()
          .and_then(hex_color)
          .or_else(|| hex_color(card_color(idx)))
          .unwrap_or(Color::White);
        let icon = wishlist.icon.as_deref().unwrap_or(" ");

        let name = Line::from(vec![
          Span::raw(format!("{} ", icon)),
          Span::styled(truncate(&wishlist.name, 40), Style::default().fg(color).bold()),
        ]);
        let progress = Line::from(vec![
          Span::raw("   "),
          Span::styled(
            progress_bar(wishlist.progress(), 20),
            Style::default().fg(color),
          ),
          Span::styled(
            format!(
              "  {} de {} itens",
              wishlist.completed_items(),
              wishlist.total_items()
            ),
            Style::default().fg(Color::Gray),
          ),
        ]);
        ListItem::new(vec![name, progress])
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
      KeyCode::Char('n') => {
        self.form.open();
        Some(ViewAction::None)
      }
      KeyCode::Char('r') => {
        self.refresh();
        Some(ViewAction::None)
      }
      KeyCode::Char('l') => Some(ViewAction::Push(Box::new(ProductListView::new(
        self.client.clone(),
      )))),
      KeyCode::Enter => {
        let id = self.selected()?.id.clone();
        Some(ViewAction::Push(Box::new(WishlistDetailView::new(
          id,
          self.client.clone(),
        ))))
      }
      KeyCode::Char('q') | KeyCode::Esc => Some(ViewAction::Pop),
      _ => None,
    }
  }
}

impl View for WishlistListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    self
      .handle_overlays(key)
      .or_else(|| self.handle_navigation(key))
      .or_else(|| self.handle_actions(key))
      .unwrap_or(ViewAction::None)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
    self.form.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Wishlists".to_string()
  }

  fn route(&self) -> Route {
    Route::Home
  }

  fn data_source(&self) -> Option<(CacheSource, Option<DateTime<Utc>>)> {
    self.query.data().map(|r| (r.source, r.cached_at))
  }

  fn captures_input(&self) -> bool {
    self.form.is_open()
  }

  fn tick(&mut self) -> ViewAction {
    self.query.poll();

    match self.create.poll() {
      Some(Ok(wishlist)) => {
        self.form.reset();
        self.notification = Some(Notification::success(format!(
          "Wishlist \"{}\" created",
          wishlist.name
        )));
        self.query.refetch();
      }
      Some(Err(e)) => {
        warn!(error = %e, "create wishlist failed");
        self.form.set_saving(false);
        self.notification = Some(Notification::error(
          "Failed to create wishlist. Please try again.",
        ));
      }
      None => {}
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
      Shortcut::new("n", "new"),
      Shortcut::new("enter", "open"),
      Shortcut::new("l", "all products"),
      Shortcut::new("r", "refresh"),
      Shortcut::new("q", "quit").with_priority(200),
    ]
  }
}
