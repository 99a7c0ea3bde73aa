use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{info, warn};

use relay_core::{
    config::Config,
    directory::RelayDirectory,
    dispatch::Dispatcher,
    domain::BotIdentity,
    messaging::{
        port::RelayPort,
        throttled::{ThrottleConfig, ThrottledRelayPort},
    },
};

use crate::{webhook, TelegramRelay};

/// Discover the bot, register the webhook and serve until the listener fails.
pub async fn run_webhook(cfg: Arc<Config>, directory: Arc<RelayDirectory>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());
    let telegram = TelegramRelay::new(bot);

    let bot_identity = resolve_identity(&telegram, &cfg).await?;
    info!(
        bot_id = bot_identity.id.0,
        username = bot_identity.username.as_deref().unwrap_or("-"),
        operators = cfg.operators.len(),
        "relay started"
    );

    match cfg.webhook_url() {
        Some(url) => {
            telegram.register_webhook(&url).await?;
            info!(%url, "webhook registered");
        }
        None => warn!("no WEBHOOK_URL or RENDER_EXTERNAL_URL set; skipping webhook registration"),
    }

    // Throttle outbound calls to stay under flood limits. The adapter still
    // retries once on an explicit RetryAfter.
    let raw: Arc<dyn RelayPort> = Arc::new(telegram);
    let port: Arc<dyn RelayPort> = Arc::new(ThrottledRelayPort::new(raw, ThrottleConfig::default()));

    let dispatcher = Arc::new(Dispatcher::new(
        port,
        directory,
        cfg.operators.clone(),
        bot_identity,
    ));

    let addr = cfg.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "webhook server listening");
    axum::serve(listener, webhook::routes(dispatcher)).await?;

    Ok(())
}

async fn resolve_identity(telegram: &TelegramRelay, cfg: &Config) -> anyhow::Result<BotIdentity> {
    let mut identity = telegram.identity().await?;
    if let Some(username) = &cfg.bot_username {
        identity.username = Some(username.clone());
    }
    Ok(identity)
}
