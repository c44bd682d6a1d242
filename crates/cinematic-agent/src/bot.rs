//! Platform event handlers
//!
//! [`Bot`] turns inbound platform events into resolutions. Each qualifying
//! message gets its own task; the handler returns as soon as the placeholder
//! reply is posted.

use std::sync::{Arc, LazyLock};

use cinematic_ai::Turn;
use regex::Regex;
use tokio::task::JoinHandle;

use crate::{
    error::Result,
    gate::{RelevanceGate, Verdict},
    platform::{InboundMessage, MessageRef, MessageSink, Platform, PlatformMessage, ReactionEvent},
    prompt,
    render::{self, REFUSAL_TEXT, Status},
    resolver::{ResolutionState, Resolver},
    services::{ExampleSource, ReviewSink, UserContext},
    thread::{self, NotReconstructible},
};

/// Reaction that submits a reply for manual review
pub const REVIEW_EMOJI: &str = "👎";

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[@#]&?\d+>").expect("invalid mention regex"));

/// Strip mention tokens and newlines from a message body
pub fn clean_text(content: &str) -> String {
    let without_mentions = MENTION_RE.replace_all(content, "");
    without_mentions
        .replace(['\r', '\n'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Handles messages and reactions for one bot account
pub struct Bot {
    platform: Arc<dyn Platform>,
    gate: RelevanceGate,
    examples: Arc<dyn ExampleSource>,
    resolver: Resolver,
    review: Arc<dyn ReviewSink>,
}

impl Bot {
    pub fn new(
        platform: Arc<dyn Platform>,
        gate: RelevanceGate,
        examples: Arc<dyn ExampleSource>,
        resolver: Resolver,
        review: Arc<dyn ReviewSink>,
    ) -> Self {
        Self {
            platform,
            gate,
            examples,
            resolver,
            review,
        }
    }

    /// Handle a new message.
    ///
    /// Returns the task resolving it, or `None` when the message is not for us.
    pub async fn handle_message(
        self: &Arc<Self>,
        message: InboundMessage,
    ) -> Result<Option<JoinHandle<()>>> {
        let bot_id = self.platform.bot_id();
        if message.author_id == bot_id || !message.mentions.iter().any(|m| m == bot_id) {
            return Ok(None);
        }

        let text = clean_text(&message.content);
        if text.is_empty() {
            return Ok(None);
        }

        let history = match &message.reply_to {
            Some(reference) => match self.thread_history(reference).await? {
                Some(turns) => turns,
                None => return Ok(None),
            },
            None => Vec::new(),
        };

        tracing::info!(
            user = %message.author_name,
            user_id = %message.author_id,
            prior_turns = history.len(),
            "message received: {}",
            text
        );

        let start = render::start_text(history.iter().map(|t| t.content.as_str()), &text);
        let placeholder = render::status_line(&start, Status::InProgress, prompt::placeholder());
        let reply = self.platform.reply(&message.reference, &placeholder).await?;

        let bot = Arc::clone(self);
        let user = UserContext::new(message.author_id, message.author_name);
        Ok(Some(tokio::spawn(async move {
            bot.converse(reply, start, history, text, user).await;
        })))
    }

    /// Turns from the replied-to message, or `None` if the reply must be ignored
    async fn thread_history(&self, reference: &MessageRef) -> Result<Option<Vec<Turn>>> {
        let prior = self.platform.fetch(reference).await?;
        match thread::reconstruct(&prior.content, &prior.author_id, self.platform.bot_id()) {
            Ok(turns) => Ok(Some(turns)),
            // replying to someone else's message starts a fresh conversation
            Err(NotReconstructible::ForeignAuthor) => Ok(Some(Vec::new())),
            Err(reason) => {
                tracing::debug!(?reason, "ignoring reply to unfinished exchange");
                Ok(None)
            }
        }
    }

    async fn converse(
        &self,
        reply: MessageRef,
        start: String,
        history: Vec<Turn>,
        text: String,
        user: UserContext,
    ) {
        let sink = PlatformMessage::new(Arc::clone(&self.platform), reply);

        let gate_input: String = thread::user_lines(&history)
            .flat_map(|line| [line, "\n"])
            .chain([text.as_str()])
            .collect();
        if self.gate.check(&gate_input).await == Verdict::Refuse {
            if let Err(e) = sink.render(&render::refusal(&start, REFUSAL_TEXT)).await {
                tracing::warn!(error = %e, "failed to render refusal");
            }
            return;
        }

        let primed = match self.examples.get_examples(&gate_input).await {
            Ok(turns) => turns,
            Err(e) => {
                tracing::warn!(error = %e, "example retrieval failed");
                Vec::new()
            }
        };

        let mut turns: Vec<Turn> = prompt::greeting(&user.user_name).into();
        turns.extend(history);
        turns.push(Turn::user(text));

        let state = ResolutionState::new(start, turns, user).with_primed(primed);
        if let Err(e) = self.resolver.resolve(state, &sink).await {
            tracing::error!(error = %e, "resolution failed");
        }
    }

    /// Handle a reaction; a thumbs-down on a finished reply flags it for review.
    pub async fn handle_reaction(&self, reaction: ReactionEvent) -> Result<()> {
        if reaction.emoji != REVIEW_EMOJI {
            return Ok(());
        }

        let message = self.platform.fetch(&reaction.message).await?;
        if message.author_id != self.platform.bot_id()
            || !render::is_completed(&message.content)
            || render::is_flagged(&message.content)
        {
            return Ok(());
        }

        tracing::info!(user_id = %reaction.user_id, "reply submitted for review");
        self.review.submit(&message.content).await?;
        self.platform
            .edit(&reaction.message, &render::flagged(&message.content))
            .await
    }
}
