//! cinematic-agent: conversation orchestration for the media assistant
//!
//! This crate turns chat messages into model conversations, runs the commands
//! the model embeds in its answers, and keeps the rendered reply up to date
//! until the exchange resolves.

pub mod bot;
pub mod budget;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod gate;
pub mod platform;
pub mod prompt;
pub mod protocol;
pub mod render;
pub mod resolver;
pub mod services;
pub mod status;
pub mod thread;

#[cfg(test)]
mod testing;

pub use bot::Bot;
pub use budget::TokenBudget;
pub use dispatch::Dispatcher;
pub use error::{Error, Result};
pub use events::{ResolutionEvent, StopReason};
pub use gate::{RelevanceGate, Verdict};
pub use platform::{InboundMessage, MessageRef, MessageSink, Platform, PostedMessage, ReactionEvent};
pub use resolver::{Resolution, ResolutionState, Resolver, ResolverConfig};
pub use services::{
    CatalogService, ExampleSource, MemoryService, NoExamples, ReviewSink, Services, UserContext,
    WebSearch,
};
pub use status::StatusRefresher;
