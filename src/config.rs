use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub store: StoreConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Custom title for header (defaults to "Wishlist")
  pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
  /// Project base url, e.g. https://xyz.supabase.co
  #[serde(default)]
  pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Seconds before a cache entry is considered stale
  #[serde(default = "default_stale_seconds")]
  pub stale_seconds: u64,
  /// Keep the cache in a SQLite file so it survives restarts and serves offline reads
  #[serde(default)]
  pub persistent: bool,
}

fn default_stale_seconds() -> u64 {
  300
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_seconds: default_stale_seconds(),
      persistent: false,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./wishlist.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/wishlist/config.yaml
  ///
  /// Returns `Ok(None)` when no file exists and none was requested explicitly.
  pub fn load(explicit_path: Option<&Path>) -> Result<Option<Self>> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    path.map(|p| Self::load_from_path(&p)).transpose()
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("wishlist.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("wishlist").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.store.url.trim().is_empty() {
      return Err(eyre!("store.url is required"));
    }
    Ok(config)
  }

  /// Header title.
  pub fn title(&self) -> &str {
    self.title.as_deref().unwrap_or("Wishlist")
  }

  /// Get the store API key from environment variables.
  ///
  /// Checks WISHLIST_SUPABASE_KEY first, then SUPABASE_ANON_KEY as fallback.
  pub fn get_api_key() -> Result<String> {
    std::env::var("WISHLIST_SUPABASE_KEY")
      .or_else(|_| std::env::var("SUPABASE_ANON_KEY"))
      .map_err(|_| {
        eyre!("Store API key not found. Set WISHLIST_SUPABASE_KEY or SUPABASE_ANON_KEY environment variable.")
      })
  }

  /// Directory for the log file and persistent cache.
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("wishlist"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_minimal() {
    let config = Config::parse("store:\n  url: https://demo.supabase.co\n").unwrap();
    assert_eq!(config.store.url, "https://demo.supabase.co");
    assert_eq!(config.cache.stale_seconds, 300);
    assert!(!config.cache.persistent);
    assert_eq!(config.title(), "Wishlist");
  }

  #[test]
  fn test_parse_full() {
    let yaml = r#"
store:
  url: http://localhost:54321
cache:
  stale_seconds: 30
  persistent: true
title: Home Wishlist
"#;
    let config = Config::parse(yaml).unwrap();
    assert_eq!(config.cache.stale_seconds, 30);
    assert!(config.cache.persistent);
    assert_eq!(config.title(), "Home Wishlist");
  }

  #[test]
  fn test_missing_url_is_rejected() {
    assert!(Config::parse("title: x\n").is_err());
  }

  #[test]
  fn test_missing_explicit_path() {
    assert!(Config::load(Some(Path::new("/definitely/not/here.yaml"))).is_err());
  }
}
