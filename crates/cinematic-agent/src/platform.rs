//! Chat platform boundary

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// Identifies one message on the platform
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub channel_id: String,
    pub message_id: String,
}

impl MessageRef {
    pub fn new(channel_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            message_id: message_id.into(),
        }
    }
}

/// A message as currently stored on the platform
#[derive(Debug, Clone)]
pub struct PostedMessage {
    pub reference: MessageRef,
    pub author_id: String,
    pub content: String,
}

/// A new message event
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub reference: MessageRef,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    /// User ids mentioned in the message
    pub mentions: Vec<String>,
    /// The message this one replies to
    pub reply_to: Option<MessageRef>,
}

/// A reaction-added event
#[derive(Debug, Clone)]
pub struct ReactionEvent {
    pub message: MessageRef,
    pub user_id: String,
    pub emoji: String,
}

/// Message delivery on the chat platform
#[async_trait]
pub trait Platform: Send + Sync {
    /// The bot's own user id
    fn bot_id(&self) -> &str;

    async fn fetch(&self, reference: &MessageRef) -> Result<PostedMessage>;

    /// Post a reply to `to`, returning the new message
    async fn reply(&self, to: &MessageRef, content: &str) -> Result<MessageRef>;

    /// Replace the content of one of the bot's messages
    async fn edit(&self, reference: &MessageRef, content: &str) -> Result<()>;

    /// Set the bot's displayed activity
    async fn set_status(&self, activity: &str) -> Result<()>;
}

/// Where a resolution renders its progress
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn render(&self, content: &str) -> Result<()>;
}

/// A bot message on a platform, edited in place
pub struct PlatformMessage {
    platform: Arc<dyn Platform>,
    reference: MessageRef,
}

impl PlatformMessage {
    pub fn new(platform: Arc<dyn Platform>, reference: MessageRef) -> Self {
        Self {
            platform,
            reference,
        }
    }
}

#[async_trait]
impl MessageSink for PlatformMessage {
    async fn render(&self, content: &str) -> Result<()> {
        self.platform.edit(&self.reference, content).await
    }
}
