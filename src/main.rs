//! ozon_report_bot: Telegram sales reports for Ozon FBO sellers.
//!
//! Entry point. Loads configuration, initialises structured logging, opens
//! the settings database, wires the Ozon client, report pipeline and
//! Telegram dispatcher, and serves the webhook until Ctrl-C.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use ozon_report_bot::bot::dispatcher::{Dispatcher, DispatcherOptions};
use ozon_report_bot::bot::TelegramClient;
use ozon_report_bot::config::{self, AppConfig};
use ozon_report_bot::marketplace::ozon::OzonClient;
use ozon_report_bot::marketplace::MarketplaceClient;
use ozon_report_bot::normalizer::ProductNameNormalizer;
use ozon_report_bot::report::ReportAggregator;
use ozon_report_bot::server::{self, ServerState};
use ozon_report_bot::settings::sqlite::SqliteSettingsStore;
use ozon_report_bot::settings::SettingsStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var(config::CONFIG_PATH_ENV).unwrap_or_else(|_| config::DEFAULT_CONFIG_PATH.into());
    let cfg = AppConfig::load_with_env(&config_path)?;

    init_logging();

    info!(
        config = %config_path,
        port = cfg.server.port,
        ozon = %cfg.ozon.base_url,
        database = %cfg.database.url,
        timezone_offset_hours = cfg.report.timezone_offset_hours,
        "ozon_report_bot starting up"
    );

    // -- Initialise components -------------------------------------------

    let settings: Arc<dyn SettingsStore> =
        Arc::new(SqliteSettingsStore::connect(&cfg.database.url).await?);

    let ozon = OzonClient::with_timeout(&cfg.ozon.base_url, settings.clone(), cfg.ozon.timeout())?;
    let marketplace =
        MarketplaceClient::with_limits(Arc::new(ozon), cfg.ozon.page_size, cfg.ozon.max_pages);
    let normalizer = ProductNameNormalizer::new(cfg.report.product_prefixes.clone());
    let reports = ReportAggregator::new(settings.clone(), marketplace, normalizer);

    let bot = TelegramClient::new(
        &cfg.telegram.api_url,
        cfg.telegram_token()?,
        cfg.telegram.timeout(),
    )?;
    let dispatcher = Dispatcher::new(
        Arc::new(bot),
        settings,
        reports,
        DispatcherOptions {
            timezone_offset_hours: cfg.report.timezone_offset_hours,
            report_webapp_url: cfg.telegram.report_webapp_url.clone(),
        },
    );

    let webhook_secret = cfg.webhook_secret();
    if webhook_secret.is_none() {
        warn!("No webhook secret configured, accepting unauthenticated updates");
    }

    let state = Arc::new(ServerState {
        dispatcher,
        webhook_secret,
    });

    // -- Serve --------------------------------------------------------------

    server::serve(state, cfg.server.port, shutdown_signal()).await?;
    info!("ozon_report_bot shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ozon_report_bot=info,tower_http=info"));

    let json_logging = std::env::var("BOT_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
