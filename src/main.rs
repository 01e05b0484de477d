use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinequiz::config::Config;
use cinequiz::state::AppState;
use cinequiz::storage::sheets::SheetsStore;
use cinequiz::telegram::{poll, webhook, Bot};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinequiz=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting CinéQuiz bot...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    // Fail fast on an unusable service-account key; every later store call
    // would fail anyway.
    let store = match SheetsStore::new(
        config.spreadsheet_id.clone(),
        &config.service_account_json,
    ) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Google Sheets setup failed: {e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.bot_token);

    // The contest launch message deep-links to the bot; resolve the
    // username once at startup when it is not configured.
    let bot_username = match &config.bot_username {
        Some(username) => Some(username.clone()),
        None => match bot.get_me().await {
            Ok(me) => me.username,
            Err(e) => {
                tracing::warn!(
                    "getMe failed ({e}); contest launches will have no reply link"
                );
                None
            }
        },
    };

    let state = Arc::new(AppState::new(store, bot_username));

    match &config.webhook {
        Some(webhook_config) => {
            let url = webhook::webhook_url(&webhook_config.base_url);
            if let Err(e) = bot.set_webhook(&url).await {
                tracing::error!("setWebhook failed: {e}");
                std::process::exit(1);
            }

            let app = webhook::router(bot, config.channel_id, state);
            let addr = SocketAddr::from(([0, 0, 0, 0], webhook_config.port));
            tracing::info!("Webhook mode, listening on http://{addr} for {url}");

            let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
            axum::serve(listener, app).await.unwrap();
        }
        None => {
            tracing::info!("Long-polling mode");
            poll::run_polling(bot, config.channel_id, state).await;
        }
    }
}
