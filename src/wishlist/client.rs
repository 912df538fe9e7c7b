//! Data-access client for wishlists with transparent caching.

use std::sync::Arc;

use color_eyre::{Report, Result};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::cache::{AnyStorage, CacheLayer, CacheResult, MemoryStorage, SqliteStorage};
use crate::config::Config;
use crate::store::{
  Column, MemoryStore, PostgrestStore, Row, Select, Store, StoreError, Table,
};

use super::api_types::{from_row, to_row, ApiLink, ApiLinkedProduct, NewLinkRow, NewProductRow};
use super::keys::WishlistQueryKey;
use super::models::{
  LinkState, LinkedProduct, Priority, ProductForm, ProductRef, Wishlist, WishlistForm,
  WishlistSummary,
};

/// Reads go through the cache; writes go to the store and then patch or
/// invalidate the cached entries they affect.
#[derive(Clone)]
pub struct WishlistClient {
  store: Arc<dyn Store>,
  cache: CacheLayer<AnyStorage>,
}

impl WishlistClient {
  pub fn new(store: Arc<dyn Store>, cache: CacheLayer<AnyStorage>) -> Self {
    Self { store, cache }
  }

  /// Build a client from configuration. `demo` uses a seeded in-memory store.
  pub fn from_config(config: &Config, demo: bool) -> Result<Self> {
    let store: Arc<dyn Store> = if demo {
      info!("using in-memory demo store");
      Arc::new(MemoryStore::with_sample_data())
    } else {
      Arc::new(PostgrestStore::new(config)?)
    };

    let storage = if config.cache.persistent && !demo {
      AnyStorage::Sqlite(SqliteStorage::open(&Config::data_dir()?.join("cache.db"))?)
    } else {
      AnyStorage::Memory(MemoryStorage::new())
    };
    // Capped at a year so the duration cannot overflow.
    let stale_seconds = config.cache.stale_seconds.min(365 * 24 * 3600) as i64;
    let cache = CacheLayer::new(storage).with_stale_time(chrono::Duration::seconds(stale_seconds));

    Ok(Self::new(store, cache))
  }

  /// Every wishlist with its links' checked state, ordered by name.
  pub async fn list_wishlists(&self) -> Result<CacheResult<Vec<WishlistSummary>>> {
    self
      .cache
      .fetch_list(&WishlistQueryKey::Wishlists, || self.fetch_wishlists())
      .await
  }

  pub async fn get_wishlist(&self, id: &str) -> Result<CacheResult<Wishlist>> {
    let key = WishlistQueryKey::Wishlist { id: id.to_string() };
    self.cache.fetch_one(&key, || self.fetch_wishlist(id)).await
  }

  /// Links of one wishlist with their products, in creation order.
  pub async fn wishlist_products(
    &self,
    wishlist_id: &str,
  ) -> Result<CacheResult<Vec<LinkedProduct>>> {
    let key = WishlistQueryKey::WishlistProducts {
      wishlist_id: wishlist_id.to_string(),
    };
    let query = linked_products_query().eq("wishlist_id", wishlist_id);
    self.cache.fetch_list(&key, || self.fetch_linked(query)).await
  }

  /// Links of every wishlist, high priority first.
  pub async fn all_products(&self) -> Result<CacheResult<Vec<LinkedProduct>>> {
    self
      .cache
      .fetch_list(&WishlistQueryKey::AllProducts, || async {
        let mut links = self.fetch_linked(linked_products_query()).await?;
        links.sort_by_key(|l| Priority::rank(l.product.priority));
        Ok::<_, Report>(links)
      })
      .await
  }

  pub async fn create_wishlist(&self, form: &WishlistForm) -> Result<Wishlist> {
    let new = form.validate()?;
    let rows = self
      .store
      .insert(Table::Wishlist, vec![to_row(&new)?])
      .await?;
    let wishlist: Wishlist = from_row(first_row(rows, Table::Wishlist)?)?;
    info!(id = %wishlist.id, name = %wishlist.name, "created wishlist");

    self.cache.invalidate(&WishlistQueryKey::Wishlists)?;
    Ok(wishlist)
  }

  /// Create a product and link it to `wishlist_id`.
  ///
  /// If the link cannot be written the product row is deleted again.
  pub async fn add_product(&self, wishlist_id: &str, form: &ProductForm) -> Result<LinkedProduct> {
    let new = form.validate()?;
    let product_row = to_row(NewProductRow {
      name: &new.name,
      priority: new.priority,
    })?;
    let rows = self.store.insert(Table::Product, vec![product_row]).await?;
    let product: ProductRef = from_row(first_row(rows, Table::Product)?)?;

    let link_row = to_row(NewLinkRow {
      wishlist_id,
      product_id: &product.id,
    })?;
    let link = self
      .store
      .insert(Table::WishlistProducts, vec![link_row])
      .await
      .and_then(|rows| first_row(rows, Table::WishlistProducts))
      .and_then(from_row::<ApiLink>);
    let link = match link {
      Ok(link) => link,
      Err(e) => {
        warn!(product = %product.id, error = %e, "linking failed, removing product");
        if let Err(undo) = self.store.delete(Table::Product, &product.id).await {
          warn!(product = %product.id, error = %undo, "failed to remove unlinked product");
        }
        return Err(e.into());
      }
    };
    info!(wishlist = %wishlist_id, product = %product.id, "added product");

    self.cache.invalidate(&WishlistQueryKey::WishlistProducts {
      wishlist_id: wishlist_id.to_string(),
    })?;
    self.cache.invalidate(&WishlistQueryKey::Wishlists)?;
    self.cache.invalidate(&WishlistQueryKey::AllProducts)?;

    Ok(LinkedProduct {
      id: link.id,
      wishlist_id: link.wishlist_id,
      checked: link.checked,
      product,
    })
  }

  /// Write a link's checked flag and patch every cached copy of it.
  pub async fn set_checked(&self, link_id: &str, checked: bool) -> Result<()> {
    self
      .store
      .update(
        Table::WishlistProducts,
        link_id,
        to_row(json!({ "checked": checked }))?,
      )
      .await?;
    info!(link = %link_id, checked, "updated link");

    self.cache.patch::<LinkedProduct>(|l| {
      if l.id == link_id && l.checked != checked {
        l.checked = checked;
        true
      } else {
        false
      }
    })?;
    self.cache.patch::<WishlistSummary>(|w| {
      let mut changed = false;
      for state in w.wishlist_products.iter_mut().filter(|s| s.id == link_id) {
        if state.checked != checked {
          state.checked = checked;
          changed = true;
        }
      }
      changed
    })?;
    Ok(())
  }

  /// Remove a product from a wishlist. The product row itself is kept.
  pub async fn remove_link(&self, link_id: &str) -> Result<()> {
    self.store.delete(Table::WishlistProducts, link_id).await?;
    info!(link = %link_id, "removed link");

    self.cache.remove::<LinkedProduct>(link_id)?;
    self.cache.patch::<WishlistSummary>(|w| {
      let before = w.wishlist_products.len();
      w.wishlist_products.retain(|s: &LinkState| s.id != link_id);
      w.wishlist_products.len() != before
    })?;
    Ok(())
  }

  /// Delete a wishlist; the store removes its links.
  pub async fn delete_wishlist(&self, id: &str) -> Result<()> {
    self.store.delete(Table::Wishlist, id).await?;
    info!(id = %id, "deleted wishlist");

    self.cache.invalidate(&WishlistQueryKey::Wishlists)?;
    self.cache.invalidate(&WishlistQueryKey::Wishlist { id: id.to_string() })?;
    self.cache.invalidate(&WishlistQueryKey::WishlistProducts {
      wishlist_id: id.to_string(),
    })?;
    self.cache.invalidate(&WishlistQueryKey::AllProducts)?;
    self.cache.remove::<WishlistSummary>(id)?;
    self.cache.remove::<Wishlist>(id)?;
    Ok(())
  }

  /// Mark one query stale so its next read goes to the store.
  pub fn invalidate(&self, key: &WishlistQueryKey) -> Result<()> {
    self.cache.invalidate(key)
  }

  /// Forget everything cached.
  pub fn clear_cache(&self) -> Result<()> {
    self.cache.clear()
  }

  async fn fetch_wishlists(&self) -> Result<Vec<WishlistSummary>> {
    let query = Select::from(Table::Wishlist)
      .columns(vec![
        Column::All,
        Column::many(
          Table::WishlistProducts,
          "wishlist_id",
          vec![Column::Field("id"), Column::Field("checked")],
        ),
      ])
      .order("name", true);
    let rows = self.store.select(query).await?;
    let wishlists = rows
      .into_iter()
      .map(from_row)
      .collect::<Result<Vec<WishlistSummary>, _>>()?;
    Ok(wishlists)
  }

  async fn fetch_wishlist(&self, id: &str) -> Result<Wishlist> {
    let query = Select::from(Table::Wishlist).eq("id", id);
    let row = self
      .store
      .select(query)
      .await?
      .into_iter()
      .next()
      .ok_or_else(|| StoreError::NotFound {
        table: Table::Wishlist.name(),
        id: id.to_string(),
      })?;
    Ok(from_row(row)?)
  }

  async fn fetch_linked(&self, query: Select) -> Result<Vec<LinkedProduct>> {
    debug!(table = query.table.name(), filters = query.filters.len(), "fetching links");
    let rows = self.store.select(query).await?;
    let mut links = Vec::with_capacity(rows.len());
    for row in rows {
      let api: ApiLinkedProduct = from_row(row)?;
      let id = api.id.clone();
      match api.into_linked() {
        Some(link) => links.push(link),
        None => warn!(link = %id, "link without product, skipping"),
      }
    }
    Ok(links)
  }
}

fn linked_products_query() -> Select {
  Select::from(Table::WishlistProducts)
    .columns(vec![
      Column::Field("id"),
      Column::Field("wishlist_id"),
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
    ])
    .order("created_at", true)
}

fn first_row(rows: Vec<Row>, table: Table) -> Result<Row, StoreError> {
  rows.into_iter().next().ok_or_else(|| StoreError::Status {
    status: 500,
    message: format!("insert into {} returned no rows", table.name()),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheSource;
  use crate::wishlist::models::FormError;

  fn client_with(store: Arc<MemoryStore>) -> WishlistClient {
    WishlistClient::new(store, CacheLayer::new(AnyStorage::Memory(MemoryStorage::new())))
  }

  fn kitchen() -> WishlistForm {
    WishlistForm {
      name: "Kitchen".to_string(),
      icon: "🍳".to_string(),
    }
  }

  fn product(name: &str, priority: Priority) -> ProductForm {
    ProductForm {
      name: name.to_string(),
      priority,
    }
  }

  async fn summary_of(client: &WishlistClient, id: &str) -> WishlistSummary {
    client
      .list_wishlists()
      .await
      .unwrap()
      .data
      .into_iter()
      .find(|w| w.id == id)
      .unwrap()
  }

  #[tokio::test]
  async fn test_kitchen_scenario() {
    let store = Arc::new(MemoryStore::new());
    let client = client_with(store);

    let wishlist = client.create_wishlist(&kitchen()).await.unwrap();
    let summary = summary_of(&client, &wishlist.id).await;
    assert_eq!(summary.total_items(), 0);
    assert_eq!(summary.completed_items(), 0);

    let link = client
      .add_product(&wishlist.id, &product("Kettle", Priority::High))
      .await
      .unwrap();
    let summary = summary_of(&client, &wishlist.id).await;
    assert_eq!(summary.total_items(), 1);
    assert_eq!(summary.progress(), 0.0);

    client.set_checked(&link.id, true).await.unwrap();
    let summary = summary_of(&client, &wishlist.id).await;
    assert_eq!(summary.completed_items(), 1);
    assert_eq!(summary.progress(), 100.0);

    client.remove_link(&link.id).await.unwrap();
    let summary = summary_of(&client, &wishlist.id).await;
    assert_eq!(summary.total_items(), 0);
    assert_eq!(summary.progress(), 0.0);
  }

  #[tokio::test]
  async fn test_toggle_twice_keeps_cached_entries_in_agreement() {
    let store = Arc::new(MemoryStore::new());
    let client = client_with(store);
    let wishlist = client.create_wishlist(&kitchen()).await.unwrap();
    let link = client
      .add_product(&wishlist.id, &product("Kettle", Priority::High))
      .await
      .unwrap();

    // Populate every entry that lists the link.
    client.list_wishlists().await.unwrap();
    client.wishlist_products(&wishlist.id).await.unwrap();
    client.all_products().await.unwrap();

    for expected in [true, false] {
      client.set_checked(&link.id, expected).await.unwrap();

      let listing = client.list_wishlists().await.unwrap();
      assert_eq!(listing.source, CacheSource::CacheFresh);
      assert_eq!(listing.data[0].wishlist_products[0].checked, expected);

      let detail = client.wishlist_products(&wishlist.id).await.unwrap();
      assert_eq!(detail.source, CacheSource::CacheFresh);
      assert_eq!(detail.data[0].checked, expected);

      let all = client.all_products().await.unwrap();
      assert_eq!(all.source, CacheSource::CacheFresh);
      assert_eq!(all.data[0].checked, expected);
    }
  }

  #[tokio::test]
  async fn test_remove_link_drops_exactly_one() {
    let store = Arc::new(MemoryStore::new());
    let client = client_with(store.clone());
    let wishlist = client.create_wishlist(&kitchen()).await.unwrap();
    let kettle = client
      .add_product(&wishlist.id, &product("Kettle", Priority::High))
      .await
      .unwrap();
    client
      .add_product(&wishlist.id, &product("Pan", Priority::Low))
      .await
      .unwrap();

    let before = client.wishlist_products(&wishlist.id).await.unwrap().data;
    assert_eq!(before.len(), 2);

    client.remove_link(&kettle.id).await.unwrap();
    let after = client.wishlist_products(&wishlist.id).await.unwrap();
    assert_eq!(after.source, CacheSource::CacheFresh);
    assert_eq!(after.data.len(), 1);
    assert_eq!(after.data[0].product.name, "Pan");

    // The product row survives.
    assert_eq!(store.count(Table::Product), 2);
  }

  #[tokio::test]
  async fn test_empty_name_rejected_before_remote_call() {
    let store = Arc::new(MemoryStore::new());
    store.fail_writes_to(Table::Wishlist);
    let client = client_with(store.clone());

    let err = client
      .create_wishlist(&WishlistForm {
        name: " ".to_string(),
        icon: "🍳".to_string(),
      })
      .await
      .unwrap_err();
    assert_eq!(err.downcast_ref::<FormError>(), Some(&FormError::EmptyName));
    assert_eq!(store.count(Table::Wishlist), 0);
  }

  #[tokio::test]
  async fn test_failed_link_removes_product() {
    let store = Arc::new(MemoryStore::new());
    let client = client_with(store.clone());
    let wishlist = client.create_wishlist(&kitchen()).await.unwrap();

    store.fail_writes_to(Table::WishlistProducts);
    let err = client
      .add_product(&wishlist.id, &product("Kettle", Priority::High))
      .await
      .unwrap_err();
    assert!(err.downcast_ref::<StoreError>().is_some());
    assert_eq!(store.count(Table::Product), 0);
    assert_eq!(store.count(Table::WishlistProducts), 0);
  }

  #[tokio::test]
  async fn test_linking_to_missing_wishlist_is_compensated() {
    let store = Arc::new(MemoryStore::new());
    let client = client_with(store.clone());

    let err = client
      .add_product("missing", &product("Kettle", Priority::High))
      .await
      .unwrap_err();
    assert!(matches!(
      err.downcast_ref::<StoreError>(),
      Some(StoreError::Conflict(_))
    ));
    assert_eq!(store.count(Table::Product), 0);
  }

  #[tokio::test]
  async fn test_delete_wishlist_cascades_and_invalidates() {
    let store = Arc::new(MemoryStore::new());
    let client = client_with(store.clone());
    let wishlist = client.create_wishlist(&kitchen()).await.unwrap();
    client
      .add_product(&wishlist.id, &product("Kettle", Priority::High))
      .await
      .unwrap();
    client.list_wishlists().await.unwrap();
    client.all_products().await.unwrap();

    client.delete_wishlist(&wishlist.id).await.unwrap();

    assert_eq!(store.count(Table::WishlistProducts), 0);
    let listing = client.list_wishlists().await.unwrap();
    assert_eq!(listing.source, CacheSource::Network);
    assert!(listing.data.is_empty());
    assert!(client.all_products().await.unwrap().data.is_empty());
    assert!(client.get_wishlist(&wishlist.id).await.is_err());
  }

  #[tokio::test]
  async fn test_get_wishlist_not_found() {
    let client = client_with(Arc::new(MemoryStore::new()));
    let err = client.get_wishlist("nope").await.unwrap_err();
    assert!(matches!(
      err.downcast_ref::<StoreError>(),
      Some(StoreError::NotFound { .. })
    ));
  }

  #[tokio::test]
  async fn test_listing_sorted_by_name() {
    let client = client_with(Arc::new(MemoryStore::with_sample_data()));
    let names: Vec<_> = client
      .list_wishlists()
      .await
      .unwrap()
      .data
      .into_iter()
      .map(|w| w.name)
      .collect();
    assert_eq!(names, vec!["Banheiro", "Cozinha", "Sala"]);
  }

  #[tokio::test]
  async fn test_all_products_ranked_by_priority() {
    let client = client_with(Arc::new(MemoryStore::with_sample_data()));
    let ranks: Vec<_> = client
      .all_products()
      .await
      .unwrap()
      .data
      .iter()
      .map(|l| Priority::rank(l.product.priority))
      .collect();
    assert_eq!(ranks.len(), 5);
    assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
  }

  #[tokio::test]
  async fn test_invalidate_refetches() {
    let store = Arc::new(MemoryStore::new());
    let client = client_with(store);
    client.list_wishlists().await.unwrap();
    assert_eq!(
      client.list_wishlists().await.unwrap().source,
      CacheSource::CacheFresh
    );

    client.invalidate(&WishlistQueryKey::Wishlists).unwrap();
    assert_eq!(
      client.list_wishlists().await.unwrap().source,
      CacheSource::Network
    );
  }
}
