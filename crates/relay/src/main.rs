use std::sync::Arc;

use relay_core::{config::Config, directory::RelayDirectory, store};

#[tokio::main]
async fn main() -> Result<(), relay_core::Error> {
    relay_core::logging::init("relay")?;

    let cfg = Arc::new(Config::load()?);

    let store = store::open(&cfg.store)?;
    let directory = Arc::new(RelayDirectory::open(store).await);

    relay_telegram::router::run_webhook(cfg, directory)
        .await
        .map_err(|e| relay_core::Error::Transport(format!("relay server failed: {e}")))?;

    Ok(())
}
