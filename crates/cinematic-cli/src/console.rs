//! Local console standing in for a chat platform
//!
//! Every line typed is a message that mentions the bot. Bot replies are
//! numbered and printed as `[#N] content` each time they change.
//!
//! ```text
//! add alien             new conversation
//! >3 and aliens         reply to bot message 3
//! !flag 3               thumbs-down bot message 3
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use cinematic_agent::{
    Error, InboundMessage, MessageRef, Platform, PostedMessage, ReactionEvent, Result,
    bot::REVIEW_EMOJI,
};
use parking_lot::Mutex;

const CHANNEL: &str = "console";
const BOT_ID: &str = "0";
const USER_ID: &str = "1";

/// A parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Message { text: String, reply_to: Option<u64> },
    Flag(u64),
    Quit,
    Empty,
}

pub fn parse_line(line: &str) -> ConsoleInput {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleInput::Empty;
    }
    if matches!(line, "/quit" | "/exit") {
        return ConsoleInput::Quit;
    }
    if let Some(rest) = line.strip_prefix("!flag") {
        if let Ok(id) = rest.trim().parse() {
            return ConsoleInput::Flag(id);
        }
    }
    if let Some(rest) = line.strip_prefix('>') {
        let (id, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        if let Ok(id) = id.parse() {
            return ConsoleInput::Message {
                text: text.trim().to_string(),
                reply_to: Some(id),
            };
        }
    }
    ConsoleInput::Message {
        text: line.to_string(),
        reply_to: None,
    }
}

pub struct ConsolePlatform {
    user_name: String,
    next_id: AtomicU64,
    messages: Mutex<Vec<PostedMessage>>,
}

impl ConsolePlatform {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            next_id: AtomicU64::new(1),
            messages: Mutex::new(Vec::new()),
        }
    }

    fn store(&self, author_id: &str, content: &str) -> MessageRef {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let reference = MessageRef::new(CHANNEL, id.to_string());
        self.messages.lock().push(PostedMessage {
            reference: reference.clone(),
            author_id: author_id.to_string(),
            content: content.to_string(),
        });
        reference
    }

    fn reference(id: u64) -> MessageRef {
        MessageRef::new(CHANNEL, id.to_string())
    }

    /// Record a typed message and build the event for it
    pub fn inbound(&self, text: &str, reply_to: Option<u64>) -> InboundMessage {
        let reference = self.store(USER_ID, text);
        InboundMessage {
            reference,
            author_id: USER_ID.to_string(),
            author_name: self.user_name.clone(),
            content: text.to_string(),
            mentions: vec![BOT_ID.to_string()],
            reply_to: reply_to.map(Self::reference),
        }
    }

    /// Build a thumbs-down reaction on message `id`
    pub fn flag(&self, id: u64) -> ReactionEvent {
        ReactionEvent {
            message: Self::reference(id),
            user_id: USER_ID.to_string(),
            emoji: REVIEW_EMOJI.to_string(),
        }
    }

    fn show(reference: &MessageRef, content: &str) {
        println!("[#{}] {}", reference.message_id, content);
    }
}

#[async_trait]
impl Platform for ConsolePlatform {
    fn bot_id(&self) -> &str {
        BOT_ID
    }

    async fn fetch(&self, reference: &MessageRef) -> Result<PostedMessage> {
        self.messages
            .lock()
            .iter()
            .find(|m| &m.reference == reference)
            .cloned()
            .ok_or_else(|| Error::Platform(format!("no message #{}", reference.message_id)))
    }

    async fn reply(&self, _to: &MessageRef, content: &str) -> Result<MessageRef> {
        let reference = self.store(BOT_ID, content);
        Self::show(&reference, content);
        Ok(reference)
    }

    async fn edit(&self, reference: &MessageRef, content: &str) -> Result<()> {
        {
            let mut messages = self.messages.lock();
            let message = messages
                .iter_mut()
                .find(|m| &m.reference == reference)
                .ok_or_else(|| Error::Platform(format!("no message #{}", reference.message_id)))?;
            message.content = content.to_string();
        }
        Self::show(reference, content);
        Ok(())
    }

    async fn set_status(&self, activity: &str) -> Result<()> {
        println!("(watching {})", activity);
        Ok(())
    }
}
