use teloxide::{Bot, prelude::*, types::Message};
use tracing::debug;

/// Private message handler
///
/// Anything that is not a command gets a pointer to inline mode.
///
/// # Returns
/// * `ResponseResult<()>` - Result of sending the hint
pub async fn message_handler(bot: Bot, msg: Message) -> ResponseResult<()> {
    if !msg.chat.is_private() {
        return Ok(());
    }

    debug!("Plain message received from chat {}", msg.chat.id);
    bot.send_message(
        msg.chat.id,
        "Search works inline: type my username followed by a file name in any chat. Use /help for details.",
    )
    .await?;
    Ok(())
}
