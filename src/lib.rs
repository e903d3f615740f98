pub mod api;
pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod conversation;
pub mod history;
pub mod logging;
pub mod model;
pub mod output;
pub mod repl;
pub mod store;

#[cfg(test)]
mod test_support;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use api::HttpGateway;
use app::App;
use cli::Args;
use config::EnvDefaults;
use store::FileStore;

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = logging::init();

    let args = Args::parse();
    let defaults = EnvDefaults::from_env();
    let gateway = HttpGateway::new(defaults.request_timeout_secs)?;
    let store = FileStore::current_dir()?;
    let timeout_secs = defaults.request_timeout_secs;
    let mut app = App::load(gateway, store, defaults);
    info!(
        api_url = %app.api_url(),
        timeout_secs,
        store_root = %app.store().root().display(),
        "loaded runtime configuration"
    );

    cli::execute(&mut app, args.mode()).await
}
