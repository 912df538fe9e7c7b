mod app;
mod cache;
mod commands;
mod config;
mod event;
mod logging;
mod query;
mod routes;
mod store;
mod ui;
mod wishlist;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "wishlist")]
#[command(about = "A terminal UI for shared household shopping lists")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/wishlist/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Route to open: /, /list or /wishlist/<id>
  #[arg(short, long, default_value = "/")]
  route: String,

  /// Run against a seeded in-memory store instead of the remote backend
  #[arg(long)]
  demo: bool,

  /// Log file (default: <data dir>/wishlist/wishlist.log)
  #[arg(long)]
  log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = logging::init(args.log_file.as_deref())?;

  let route: routes::Route = args.route.parse()?;

  // Load configuration; demo mode runs without one
  let config = match config::Config::load(args.config.as_deref())? {
    Some(config) => config,
    None if args.demo => config::Config::default(),
    None => {
      return Err(eyre!(
        "No config file found. Create ./wishlist.yaml or $XDG_CONFIG_HOME/wishlist/config.yaml, or run with --demo."
      ))
    }
  };

  let client = wishlist::WishlistClient::from_config(&config, args.demo)?;

  // Initialize and run the app
  let mut app = app::App::new(&config, client, &route);
  if let Err(e) = app.run().await {
    error!(error = %e, "app exited with an error");
    return Err(e);
  }

  Ok(())
}
