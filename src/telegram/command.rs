//! Command Handler Module
//!
//! Private-chat commands: the landing page reached from the inline
//! switch-to-PM button, and ban list moderation for admins.
use std::sync::Arc;

use dashmap::DashSet;
use teloxide::{
    Bot,
    prelude::*,
    types::{InlineKeyboardMarkup, Me, Message, UserId},
    utils::command::BotCommands,
};
use tracing::info;

use crate::{
    system::Settings,
    telegram::inline::{BannedUsers, InlineSearch},
};

/// Bot commands enumeration
///
/// Uses lowercase naming convention for command matching.
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
pub enum Command {
    #[command(description = "bot conversation start.")]
    Start(String),
    #[command(description = "displays description of all commands.")]
    Help,
    #[command(description = "ban a user from inline search (admins only).")]
    Ban(u64),
    #[command(description = "lift a ban (admins only).")]
    Unban(u64),
}

fn is_admin(settings: &Settings, user_id: UserId) -> bool {
    settings.admins.contains(&user_id.0)
}

/// Adds or removes a user from the ban list
///
/// # Returns
/// * `bool` - Whether the set changed
fn set_banned(banned: &DashSet<u64>, user_id: u64, ban: bool) -> bool {
    if ban {
        banned.insert(user_id)
    } else {
        banned.remove(&user_id).is_some()
    }
}

/// Applies a ban list change requested by `msg`'s sender
async fn moderate(
    bot: &Bot,
    msg: &Message,
    banned: &DashSet<u64>,
    settings: &Settings,
    user_id: u64,
    ban: bool,
) -> ResponseResult<()> {
    let Some(admin) = msg.from.as_ref() else {
        return Ok(());
    };
    if !is_admin(settings, admin.id) {
        bot.send_message(msg.chat.id, "Only admins can change the ban list.")
            .await?;
        return Ok(());
    }

    let changed = set_banned(banned, user_id, ban);
    info!("Admin {} set banned={} for {} (changed: {})", admin.id, ban, user_id, changed);

    let reply = match (ban, changed) {
        (true, true) => format!("User {} is banned.", user_id),
        (true, false) => format!("User {} was already banned.", user_id),
        (false, true) => format!("User {} is unbanned.", user_id),
        (false, false) => format!("User {} was not banned.", user_id),
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

fn usage(me: &Me) -> String {
    format!(
        "Type @{} <name> in any chat to search files.\n\
         Narrow the search by type with @{} <name> | <type>, e.g. video or document.",
        me.username(),
        me.username()
    )
}

/// Main command handler function
///
/// # Arguments
/// * `bot` - Telegram Bot instance
/// * `msg` - Incoming message containing the command
/// * `me` - The bot's own account
/// * `command` - Parsed command enum
/// * `banned` - Shared banned-user set
/// * `settings` - Loaded configuration
/// * `search` - Inline search context, used for the channel button
///
/// # Returns
/// * `ResponseResult<()>` - Result of the command execution
pub async fn command_handler(
    bot: Bot,
    msg: Message,
    me: Me,
    command: Command,
    banned: BannedUsers,
    settings: Arc<Settings>,
    search: Arc<InlineSearch>,
) -> ResponseResult<()> {
    match command {
        Command::Start(param) => {
            if param.trim() == "subscribe" {
                bot.send_message(msg.chat.id, "Join the channel, then try the search again.")
                    .reply_markup(InlineKeyboardMarkup::new(vec![vec![search.channel_button()]]))
                    .await?;
            } else {
                bot.send_message(msg.chat.id, format!("Welcome!\n\n{}", usage(&me)))
                    .await?;
            }
        }
        Command::Help => {
            bot.send_message(
                msg.chat.id,
                format!("{}\n\n{}", Command::descriptions(), usage(&me)),
            )
            .await?;
        }
        Command::Ban(user_id) => {
            moderate(&bot, &msg, &banned, &settings, user_id, true).await?;
        }
        Command::Unban(user_id) => {
            moderate(&bot, &msg, &banned, &settings, user_id, false).await?;
        }
    };

    Ok(())
}
