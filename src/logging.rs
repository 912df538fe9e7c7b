//! File logging. The terminal belongs to the UI, so nothing is written to stdout.

use std::path::{Path, PathBuf};

use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

const LOG_ENV: &str = "WISHLIST_LOG";

/// Install the global subscriber. Keep the guard alive until exit so
/// buffered lines are flushed.
pub fn init(log_file: Option<&Path>) -> Result<WorkerGuard> {
  let path = match log_file {
    Some(path) => path.to_path_buf(),
    None => Config::data_dir()?.join("wishlist.log"),
  };
  let (dir, file_name) = split_path(&path)?;
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::never(dir, file_name);
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::registry()
    .with(build_env_filter())
    .with(
      tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true),
    )
    .try_init()
    .map_err(|e| eyre!("Failed to install logger: {}", e))?;

  Ok(guard)
}

fn build_env_filter() -> EnvFilter {
  EnvFilter::try_from_env(LOG_ENV)
    .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn,rustls=warn"))
}

fn split_path(path: &Path) -> Result<(PathBuf, PathBuf)> {
  let file_name = path
    .file_name()
    .ok_or_else(|| eyre!("Log path {} has no file name", path.display()))?;
  let dir = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
    _ => PathBuf::from("."),
  };
  Ok((dir, PathBuf::from(file_name)))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_split_path() {
    let (dir, file) = split_path(Path::new("/tmp/wishlist/app.log")).unwrap();
    assert_eq!(dir, PathBuf::from("/tmp/wishlist"));
    assert_eq!(file, PathBuf::from("app.log"));

    let (dir, file) = split_path(Path::new("app.log")).unwrap();
    assert_eq!(dir, PathBuf::from("."));
    assert_eq!(file, PathBuf::from("app.log"));

    assert!(split_path(Path::new("/")).is_err());
  }
}
