//! Channel subscription check used to gate inline search.
use async_trait::async_trait;
use teloxide::{
    Bot,
    prelude::Requester,
    types::{ChatId, ChatMemberKind, UserId},
};
use tracing::{debug, warn};

/// Restricted users still count while they remain in the channel.
fn is_member(kind: &ChatMemberKind) -> bool {
    match kind {
        ChatMemberKind::Restricted(restricted) => restricted.is_member,
        other => !(other.is_left() || other.is_banned()),
    }
}

#[async_trait]
pub trait SubscriptionCheck: Send + Sync {
    async fn is_subscribed(&self, user_id: UserId) -> bool;
}

/// Asks Telegram whether a user is a current member of the required channel
pub struct ChannelSubscription {
    bot: Bot,
    channel: ChatId,
}

impl ChannelSubscription {
    pub fn new(bot: Bot, channel: ChatId) -> Self {
        Self { bot, channel }
    }
}

#[async_trait]
impl SubscriptionCheck for ChannelSubscription {
    async fn is_subscribed(&self, user_id: UserId) -> bool {
        match self.bot.get_chat_member(self.channel, user_id).await {
            Ok(member) => {
                let subscribed = is_member(&member.kind);
                debug!("User {} subscribed to {}: {}", user_id, self.channel, subscribed);
                subscribed
            }
            Err(e) => {
                warn!(
                    "Subscription check for user {} in {} failed: {}",
                    user_id, self.channel, e
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};
    use teloxide::types::ChatMember;

    use super::*;

    fn kind(status: Value) -> ChatMemberKind {
        let mut member = json!({ "user": { "id": 7, "is_bot": false, "first_name": "Reader" } });
        if let (Some(target), Some(fields)) = (member.as_object_mut(), status.as_object()) {
            target.extend(fields.clone());
        }
        serde_json::from_value::<ChatMember>(member).unwrap().kind
    }

    fn restricted(is_member: bool) -> ChatMemberKind {
        kind(json!({
            "status": "restricted",
            "until_date": 0,
            "is_member": is_member,
            "can_send_messages": false,
            "can_send_audios": false,
            "can_send_documents": false,
            "can_send_photos": false,
            "can_send_videos": false,
            "can_send_video_notes": false,
            "can_send_voice_notes": false,
            "can_send_polls": false,
            "can_send_other_messages": false,
            "can_add_web_page_previews": false,
            "can_change_info": false,
            "can_invite_users": false,
            "can_pin_messages": false,
            "can_manage_topics": false
        }))
    }

    #[test]
    fn test_present_members_are_subscribed() {
        assert!(is_member(&kind(json!({ "status": "member" }))));
        assert!(is_member(&kind(json!({ "status": "creator", "is_anonymous": false }))));
        assert!(is_member(&restricted(true)));
    }

    #[test]
    fn test_departed_members_are_not_subscribed() {
        assert!(!is_member(&kind(json!({ "status": "left" }))));
        assert!(!is_member(&kind(json!({ "status": "kicked", "until_date": 0 }))));
        assert!(!is_member(&restricted(false)));
    }
}
