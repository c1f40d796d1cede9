//! Inline File Search Telegram Bot
//!
//! Main application entry point. Loads configuration, opens the file index
//! and runs the dispatcher that answers inline search queries.

use std::sync::Arc;

use subscription::{ChannelSubscription, SubscriptionCheck};
use teloxide::{prelude::*, types::ChatId};
use telegram::inline::{BannedUsers, InlineSearch};
use tracing::{info, warn};

mod db;
mod format;
mod index;
mod logging;
mod subscription;
mod system;
mod telegram;

/// Custom error type for the application
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// Application entry point
///
/// Initializes logging, the file index and the inline search context,
/// then starts the update dispatcher.
///
/// # Returns
/// * `Result<(), Error>` - Success or error status of bot execution
#[tokio::main]
async fn main() -> Result<(), Error> {
    let _log_guard = logging::setup_tracing();
    info!("Preconfigure...");

    let settings = Arc::new(system::get_config()?);
    let bot = Bot::new(settings.token.clone());

    let index = index::create_index(&settings.index).await?;
    if let Some(seed_file) = &settings.index.seed_file {
        index::load_seed(index.as_ref(), seed_file).await?;
    }

    let banned: BannedUsers = Arc::new(settings.banned_users.iter().copied().collect());

    let subscription = settings.inline.auth_channel.map(|channel| {
        info!("Inline search requires a subscription to {}", channel);
        Arc::new(ChannelSubscription::new(bot.clone(), ChatId(channel))) as Arc<dyn SubscriptionCheck>
    });

    let search = Arc::new(InlineSearch::new(
        settings.inline.clone(),
        banned.clone(),
        index,
        subscription,
    )?);

    info!("Starting bot...");
    match bot.get_me().await {
        Ok(me) => info!("Logged in as @{}", me.username()),
        Err(e) => warn!("GetMe failed: {}", e),
    }

    Dispatcher::builder(bot, telegram::get_handler())
        .dependencies(dptree::deps![search, banned, settings])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
