//! Cache storage trait with in-memory and SQLite implementations.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::traits::Cacheable;

/// Result of a cached query lookup.
#[derive(Debug, Clone)]
pub struct CachedQueryResult<T> {
  /// The cached entities in order
  pub entities: Vec<T>,
  /// When the query result was cached
  pub cached_at: DateTime<Utc>,
  /// Marked stale by an explicit invalidation
  pub invalidated: bool,
}

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Store entities from a query result, replacing any previous result for `key`.
  fn store_query_result<T: Cacheable>(
    &self,
    key: &str,
    description: &str,
    entities: &[T],
  ) -> Result<()>;

  /// Get cached entities for a query.
  fn get_query_result<T: Cacheable>(&self, key: &str) -> Result<Option<CachedQueryResult<T>>>;

  /// Mark a query result stale so the next read refetches it.
  /// Returns whether an entry existed.
  fn invalidate(&self, key: &str) -> Result<bool>;

  /// Apply `patch` to every cached entity of type `T`.
  /// The closure returns whether it changed the entity; returns the number changed.
  fn patch_entities<T: Cacheable>(&self, patch: &mut dyn FnMut(&mut T) -> bool)
    -> Result<usize>;

  /// Drop an entity from every query result that lists it.
  /// Returns the number of query results it was removed from.
  fn remove_entity<T: Cacheable>(&self, entity_key: &str) -> Result<usize>;

  /// Remove everything.
  fn clear(&self) -> Result<()>;
}

// ============================================================================
// In-memory storage
// ============================================================================

#[derive(Debug)]
struct QueryEntry {
  entity_type: &'static str,
  keys: Vec<String>,
  cached_at: DateTime<Utc>,
  invalidated: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
  entities: HashMap<(&'static str, String), Value>,
  queries: HashMap<String, QueryEntry>,
}

impl MemoryState {
  /// Drop entities of `entity_type` that no query result lists anymore.
  fn prune(&mut self, entity_type: &'static str) {
    let referenced: HashSet<&str> = self
      .queries
      .values()
      .filter(|q| q.entity_type == entity_type)
      .flat_map(|q| q.keys.iter().map(String::as_str))
      .collect();
    self
      .entities
      .retain(|(ty, key), _| *ty != entity_type || referenced.contains(key.as_str()));
  }
}

/// Process-local cache storage. Lives as long as the app.
#[derive(Debug, Default)]
pub struct MemoryStorage {
  state: Mutex<MemoryState>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
    self.state.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

impl CacheStorage for MemoryStorage {
  fn store_query_result<T: Cacheable>(
    &self,
    key: &str,
    _description: &str,
    entities: &[T],
  ) -> Result<()> {
    let mut state = self.state()?;
    let entity_type = T::entity_type();

    let mut keys = Vec::with_capacity(entities.len());
    for entity in entities {
      let entity_key = entity.cache_key();
      let data = serde_json::to_value(entity)
        .map_err(|e| eyre!("Failed to serialize entity: {}", e))?;
      state.entities.insert((entity_type, entity_key.clone()), data);
      keys.push(entity_key);
    }

    state.queries.insert(
      key.to_string(),
      QueryEntry {
        entity_type,
        keys,
        cached_at: Utc::now(),
        invalidated: false,
      },
    );
    state.prune(entity_type);
    Ok(())
  }

  fn get_query_result<T: Cacheable>(&self, key: &str) -> Result<Option<CachedQueryResult<T>>> {
    let state = self.state()?;
    let entity_type = T::entity_type();

    let entry = match state.queries.get(key) {
      Some(entry) if entry.entity_type == entity_type => entry,
      _ => return Ok(None),
    };

    let entities = entry
      .keys
      .iter()
      .filter_map(|k| state.entities.get(&(entity_type, k.clone())))
      .map(|data| serde_json::from_value(data.clone()))
      .collect::<Result<Vec<T>, _>>()
      .map_err(|e| eyre!("Failed to deserialize entity: {}", e))?;

    Ok(Some(CachedQueryResult {
      entities,
      cached_at: entry.cached_at,
      invalidated: entry.invalidated,
    }))
  }

  fn invalidate(&self, key: &str) -> Result<bool> {
    let mut state = self.state()?;
    Ok(match state.queries.get_mut(key) {
      Some(entry) => {
        entry.invalidated = true;
        true
      }
      None => false,
    })
  }

  fn patch_entities<T: Cacheable>(
    &self,
    patch: &mut dyn FnMut(&mut T) -> bool,
  ) -> Result<usize> {
    let mut state = self.state()?;
    let entity_type = T::entity_type();
    let mut changed = 0;

    for ((ty, _), data) in state.entities.iter_mut() {
      if *ty != entity_type {
        continue;
      }
      let mut entity: T = serde_json::from_value(data.clone())
        .map_err(|e| eyre!("Failed to deserialize entity: {}", e))?;
      if patch(&mut entity) {
        *data = serde_json::to_value(&entity)
          .map_err(|e| eyre!("Failed to serialize entity: {}", e))?;
        changed += 1;
      }
    }
    Ok(changed)
  }

  fn remove_entity<T: Cacheable>(&self, entity_key: &str) -> Result<usize> {
    let mut state = self.state()?;
    let entity_type = T::entity_type();
    state
      .entities
      .remove(&(entity_type, entity_key.to_string()));

    let mut affected = 0;
    for entry in state.queries.values_mut() {
      if entry.entity_type != entity_type {
        continue;
      }
      let before = entry.keys.len();
      entry.keys.retain(|k| k != entity_key);
      if entry.keys.len() != before {
        affected += 1;
      }
    }
    Ok(affected)
  }

  fn clear(&self) -> Result<()> {
    let mut state = self.state()?;
    state.entities.clear();
    state.queries.clear();
    Ok(())
  }
}

// ============================================================================
// SQLite storage
// ============================================================================

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the cache database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Cache database that lives only as long as this value.
  #[cfg(test)]
  pub fn in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    self
      .conn()?
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Generic entity cache (stores serialized JSON)
CREATE TABLE IF NOT EXISTS entity_cache (
    entity_type TEXT NOT NULL,
    entity_key TEXT NOT NULL,
    data BLOB NOT NULL,
    PRIMARY KEY (entity_type, entity_key)
);

-- Query result tracking
CREATE TABLE IF NOT EXISTS query_cache (
    query_hash TEXT PRIMARY KEY,
    query_description TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    cached_at TEXT NOT NULL,
    invalidated INTEGER NOT NULL DEFAULT 0,
    result_count INTEGER NOT NULL
);

-- Query to entity mapping (preserves order)
CREATE TABLE IF NOT EXISTS query_results (
    query_hash TEXT NOT NULL,
    entity_key TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (query_hash, entity_key)
);

CREATE INDEX IF NOT EXISTS idx_query_results_hash ON query_results(query_hash);
CREATE INDEX IF NOT EXISTS idx_query_results_entity ON query_results(entity_key);
"#;

impl CacheStorage for SqliteStorage {
  fn store_query_result<T: Cacheable>(
    &self,
    key: &str,
    description: &str,
    entities: &[T],
  ) -> Result<()> {
    let mut conn = self.conn()?;
    let entity_type = T::entity_type();

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    // Delete existing query results
    tx.execute(
      "DELETE FROM query_results WHERE query_hash = ?",
      params![key],
    )
    .map_err(|e| eyre!("Failed to delete old query results: {}", e))?;

    tx.execute(
      "INSERT OR REPLACE INTO query_cache
         (query_hash, query_description, entity_type, cached_at, invalidated, result_count)
       VALUES (?, ?, ?, ?, 0, ?)",
      params![
        key,
        description,
        entity_type,
        Utc::now().to_rfc3339(),
        entities.len()
      ],
    )
    .map_err(|e| eyre!("Failed to update query cache: {}", e))?;

    for (position, entity) in entities.iter().enumerate() {
      let entity_key = entity.cache_key();
      let data =
        serde_json::to_vec(entity).map_err(|e| eyre!("Failed to serialize entity: {}", e))?;

      tx.execute(
        "INSERT OR REPLACE INTO entity_cache (entity_type, entity_key, data) VALUES (?, ?, ?)",
        params![entity_type, entity_key, data],
      )
      .map_err(|e| eyre!("Failed to store entity: {}", e))?;

      tx.execute(
        "INSERT OR REPLACE INTO query_results (query_hash, entity_key, position) VALUES (?, ?, ?)",
        params![key, entity_key, position],
      )
      .map_err(|e| eyre!("Failed to store query result: {}", e))?;
    }

    // Entities the replaced result held may now be unreferenced
    tx.execute(
      "DELETE FROM entity_cache WHERE entity_type = ?1 AND entity_key NOT IN (
         SELECT qr.entity_key FROM query_results qr
         INNER JOIN query_cache qc ON qc.query_hash = qr.query_hash
         WHERE qc.entity_type = ?1)",
      params![entity_type],
    )
    .map_err(|e| eyre!("Failed to prune cached entities: {}", e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn get_query_result<T: Cacheable>(&self, key: &str) -> Result<Option<CachedQueryResult<T>>> {
    let conn = self.conn()?;
    let entity_type = T::entity_type();

    let query_info: Option<(String, bool)> = conn
      .query_row(
        "SELECT cached_at, invalidated FROM query_cache
         WHERE query_hash = ? AND entity_type = ?",
        params![key, entity_type],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read query cache: {}", e))?;

    let (cached_at_str, invalidated) = match query_info {
      Some(info) => info,
      None => return Ok(None),
    };
    let cached_at = parse_datetime(&cached_at_str)?;

    // Get entities in order
    let mut stmt = conn
      .prepare(
        "SELECT ec.data FROM entity_cache ec
         INNER JOIN query_results qr ON ec.entity_type = ? AND ec.entity_key = qr.entity_key
         WHERE qr.query_hash = ?
         ORDER BY qr.position",
      )
      .map_err(|e| eyre!("Failed to prepare entity query: {}", e))?;

    let rows = stmt
      .query_map(params![entity_type, key], |row| row.get::<_, Vec<u8>>(0))
      .map_err(|e| eyre!("Failed to query entities: {}", e))?;

    let mut entities = Vec::new();
    for data in rows {
      let data = data.map_err(|e| eyre!("Failed to read entity: {}", e))?;
      let entity: T = serde_json::from_slice(&data)
        .map_err(|e| eyre!("Failed to deserialize entity: {}", e))?;
      entities.push(entity);
    }

    Ok(Some(CachedQueryResult {
      entities,
      cached_at,
      invalidated,
    }))
  }

  fn invalidate(&self, key: &str) -> Result<bool> {
    let updated = self
      .conn()?
      .execute(
        "UPDATE query_cache SET invalidated = 1 WHERE query_hash = ?",
        params![key],
      )
      .map_err(|e| eyre!("Failed to invalidate query: {}", e))?;
    Ok(updated > 0)
  }

  fn patch_entities<T: Cacheable>(
    &self,
    patch: &mut dyn FnMut(&mut T) -> bool,
  ) -> Result<usize> {
    let mut conn = self.conn()?;
    let entity_type = T::entity_type();

    let cached: Vec<(String, Vec<u8>)> = {
      let mut stmt = conn
        .prepare("SELECT entity_key, data FROM entity_cache WHERE entity_type = ?")
        .map_err(|e| eyre!("Failed to prepare entity query: {}", e))?;
      let rows = stmt
        .query_map(params![entity_type], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(|e| eyre!("Failed to query entities: {}", e))?;
      let cached = rows
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| eyre!("Failed to read entity: {}", e))?;
      cached
    };

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;
    let mut changed = 0;
    for (entity_key, data) in cached {
      let mut entity: T = serde_json::from_slice(&data)
        .map_err(|e| eyre!("Failed to deserialize entity: {}", e))?;
      if !patch(&mut entity) {
        continue;
      }
      let data =
        serde_json::to_vec(&entity).map_err(|e| eyre!("Failed to serialize entity: {}", e))?;
      tx.execute(
        "UPDATE entity_cache SET data = ? WHERE entity_type = ? AND entity_key = ?",
        params![data, entity_type, entity_key],
      )
      .map_err(|e| eyre!("Failed to update entity: {}", e))?;
      changed += 1;
    }
    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(changed)
  }

  fn remove_entity<T: Cacheable>(&self, entity_key: &str) -> Result<usize> {
    let mut conn = self.conn()?;
    let entity_type = T::entity_type();

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "DELETE FROM entity_cache WHERE entity_type = ? AND entity_key = ?",
      params![entity_type, entity_key],
    )
    .map_err(|e| eyre!("Failed to delete entity: {}", e))?;

    let affected = tx
      .execute(
        "DELETE FROM query_results WHERE entity_key = ?1
           AND query_hash IN (SELECT query_hash FROM query_cache WHERE entity_type = ?2)",
        params![entity_key, entity_type],
      )
      .map_err(|e| eyre!("Failed to delete query results: {}", e))?;

    tx.execute(
      "UPDATE query_cache SET result_count =
         (SELECT COUNT(*) FROM query_results qr WHERE qr.query_hash = query_cache.query_hash)
       WHERE entity_type = ?",
      params![entity_type],
    )
    .map_err(|e| eyre!("Failed to update result counts: {}", e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(affected)
  }

  fn clear(&self) -> Result<()> {
    self
      .conn()?
      .execute_batch("DELETE FROM query_results; DELETE FROM query_cache; DELETE FROM entity_cache;")
      .map_err(|e| eyre!("Failed to clear cache: {}", e))?;
    Ok(())
  }
}

/// Parse a stored RFC 3339 timestamp.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

// ============================================================================
// Storage selection
// ============================================================================

/// Storage chosen at startup from configuration.
pub enum AnyStorage {
  Memory(MemoryStorage),
  Sqlite(SqliteStorage),
}

impl CacheStorage for AnyStorage {
  fn store_query_result<T: Cacheable>(
    &self,
    key: &str,
    description: &str,
    entities: &[T],
  ) -> Result<()> {
    match self {
      AnyStorage::Memory(s) => s.store_query_result(key, description, entities),
      AnyStorage::Sqlite(s) => s.store_query_result(key, description, entities),
    }
  }

  fn get_query_result<T: Cacheable>(&self, key: &str) -> Result<Option<CachedQueryResult<T>>> {
    match self {
      AnyStorage::Memory(s) => s.get_query_result(key),
      AnyStorage::Sqlite(s) => s.get_query_result(key),
    }
  }

  fn invalidate(&self, key: &str) -> Result<bool> {
    match self {
      AnyStorage::Memory(s) => s.invalidate(key),
      AnyStorage::Sqlite(s) => s.invalidate(key),
    }
  }

  fn patch_entities<T: Cacheable>(
    &self,
    patch: &mut dyn FnMut(&mut T) -> bool,
  ) -> Result<usize> {
    match self {
      AnyStorage::Memory(s) => s.patch_entities(patch),
      AnyStorage::Sqlite(s) => s.patch_entities(patch),
    }
  }

  fn remove_entity<T: Cacheable>(&self, entity_key: &str) -> Result<usize> {
    match self {
      AnyStorage::Memory(s) => s.remove_entity::<T>(entity_key),
      AnyStorage::Sqlite(s) => s.remove_entity::<T>(entity_key),
    }
  }

  fn clear(&self) -> Result<()> {
    match self {
      AnyStorage::Memory(s) => s.clear(),
      AnyStorage::Sqlite(s) => s.clear(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::{Deserialize, Serialize};

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Item {
    id: String,
    done: bool,
  }

  impl Cacheable for Item {
    fn cache_key(&self) -> String {
      self.id.clone()
    }

    fn entity_type() -> &'static str {
      "item"
    }
  }

  fn item(id: &str) -> Item {
    Item {
      id: id.to_string(),
      done: false,
    }
  }

  fn backends() -> Vec<AnyStorage> {
    vec![
      AnyStorage::Memory(MemoryStorage::new()),
      AnyStorage::Sqlite(SqliteStorage::in_memory().unwrap()),
    ]
  }

  #[test]
  fn test_round_trip_preserves_order() {
    for storage in backends() {
      storage
        .store_query_result("q", "query", &[item("b"), item("a"), item("c")])
        .unwrap();
      let cached = storage.get_query_result::<Item>("q").unwrap().unwrap();
      let ids: Vec<_> = cached.entities.iter().map(|i| i.id.as_str()).collect();
      assert_eq!(ids, vec!["b", "a", "c"]);
      assert!(!cached.invalidated);
    }
  }

  #[test]
  fn test_missing_key() {
    for storage in backends() {
      assert!(storage.get_query_result::<Item>("nope").unwrap().is_none());
      assert!(!storage.invalidate("nope").unwrap());
    }
  }

  #[test]
  fn test_invalidate_marks_entry() {
    for storage in backends() {
      storage.store_query_result("q", "query", &[item("a")]).unwrap();
      assert!(storage.invalidate("q").unwrap());
      let cached = storage.get_query_result::<Item>("q").unwrap().unwrap();
      assert!(cached.invalidated);
      assert_eq!(cached.entities.len(), 1);

      // storing again clears the flag
      storage.store_query_result("q", "query", &[item("a")]).unwrap();
      let cached = storage.get_query_result::<Item>("q").unwrap().unwrap();
      assert!(!cached.invalidated);
    }
  }

  #[test]
  fn test_patch_reaches_every_query() {
    for storage in backends() {
      storage
        .store_query_result("detail", "detail", &[item("a"), item("b")])
        .unwrap();
      storage
        .store_query_result("all", "all", &[item("c"), item("a")])
        .unwrap();

      let changed = storage
        .patch_entities::<Item>(&mut |i: &mut Item| {
          if i.id == "a" {
            i.done = true;
            true
          } else {
            false
          }
        })
        .unwrap();
      assert_eq!(changed, 1);

      for key in ["detail", "all"] {
        let cached = storage.get_query_result::<Item>(key).unwrap().unwrap();
        let a = cached.entities.iter().find(|i| i.id == "a").unwrap();
        assert!(a.done, "entity not patched in {key}");
      }
    }
  }

  #[test]
  fn test_remove_entity_from_all_queries() {
    for storage in backends() {
      storage
        .store_query_result("detail", "detail", &[item("a"), item("b")])
        .unwrap();
      storage
        .store_query_result("all", "all", &[item("a"), item("c")])
        .unwrap();

      assert_eq!(storage.remove_entity::<Item>("a").unwrap(), 2);

      let detail = storage.get_query_result::<Item>("detail").unwrap().unwrap();
      assert_eq!(detail.entities, vec![item("b")]);
      let all = storage.get_query_result::<Item>("all").unwrap().unwrap();
      assert_eq!(all.entities, vec![item("c")]);
    }
  }

  #[test]
  fn test_replacing_result_drops_unreferenced_entities() {
    for storage in backends() {
      storage
        .store_query_result("other", "other", &[item("shared"), item("keep")])
        .unwrap();
      for round in 0..100 {
        let mut items: Vec<Item> = (0..9).map(|n| item(&format!("{round}-{n}"))).collect();
        items.push(item("shared"));
        storage.store_query_result("q", "query", &items).unwrap();
      }

      let held = storage
        .patch_entities::<Item>(&mut |_: &mut Item| true)
        .unwrap();
      // nine from the latest round, plus "shared" and "keep"
      assert_eq!(held, 11);

      let q = storage.get_query_result::<Item>("q").unwrap().unwrap();
      assert_eq!(q.entities.len(), 10);
      let other = storage.get_query_result::<Item>("other").unwrap().unwrap();
      assert_eq!(other.entities, vec![item("shared"), item("keep")]);
    }
  }

  #[test]
  fn test_clear() {
    for storage in backends() {
      storage.store_query_result("q", "query", &[item("a")]).unwrap();
      storage.clear().unwrap();
      assert!(storage.get_query_result::<Item>("q").unwrap().is_none());
    }
  }

  #[test]
  fn test_sqlite_file_survives_reopen() {
    let dir = std::env::temp_dir().join(format!("wishlist-cache-{}", uuid::Uuid::new_v4()));
    let path = dir.join("cache.db");
    {
      let storage = SqliteStorage::open(&path).unwrap();
      storage.store_query_result("q", "query", &[item("a")]).unwrap();
    }
    let storage = SqliteStorage::open(&path).unwrap();
    let cached = storage.get_query_result::<Item>("q").unwrap().unwrap();
    assert_eq!(cached.entities, vec![item("a")]);
    drop(storage);
    let _ = std::fs::remove_dir_all(dir);
  }
}
