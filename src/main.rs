//! Studio booking bot
//!
//! A Telegram bot that books appointments for a nail studio and gives the
//! owner and a technical administrator a small management panel.

mod access;
mod catalog;
mod config;
mod notifier;
mod runtime;
mod state_machine;
mod store;
mod telegram;
mod validation;

use access::{AccessControl, ParticipantId};
use catalog::Catalog;
use config::BotConfig;
use notifier::Notifier;
use runtime::{RuntimeSettings, SessionManager, Shared, DEFAULT_SESSION_IDLE};
use std::sync::Arc;
use store::{LoggingStore, SupabaseStore};
use teloxide::Bot;
use telegram::TelegramOutlet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine; the real environment may carry everything
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "booking_bot=info,teloxide=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = BotConfig::from_env()?;
    let utc_offset = config.utc_offset()?;
    tracing::info!(?config, "Configuration loaded");

    // Record store
    let store = LoggingStore::new(SupabaseStore::new(
        &config.supabase_url,
        &config.supabase_key,
        &config.bookings_table,
    )?);

    // Chat transport
    let bot = Bot::new(&config.telegram_token);
    let outlet = TelegramOutlet::new(bot.clone());

    let access = AccessControl::new(
        ParticipantId(config.owner_chat_id),
        ParticipantId(config.tech_admin_chat_id),
    );
    let notifier = Notifier::spawn(outlet.clone(), access.owner());

    let manager = Arc::new(SessionManager::new(Shared {
        store,
        outlet,
        access,
        catalog: Catalog::default(),
        notifier,
        settings: RuntimeSettings {
            studio_name: config.studio_name.clone(),
            utc_offset,
            session_idle: DEFAULT_SESSION_IDLE,
        },
    }));

    tracing::info!(
        studio = %config.studio_name,
        table = %config.bookings_table,
        "Booking bot starting"
    );
    telegram::run(bot, manager).await;

    Ok(())
}
