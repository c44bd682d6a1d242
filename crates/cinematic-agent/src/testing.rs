//! Test doubles shared by the unit tests

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use cinematic_ai::{Completion, CompletionProvider, CompletionRequest};
use parking_lot::Mutex;

use crate::{
    error::{Error, Result},
    platform::{MessageRef, MessageSink, Platform, PostedMessage},
    services::{CatalogService, MemoryService, ReviewSink, Services, WebSearch},
};

enum Script {
    Queue(Mutex<VecDeque<String>>),
    Repeat(String),
    Fail,
}

/// Completion provider answering from a fixed script, recording requests
pub struct ScriptedProvider {
    script: Script,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_script(Script::Queue(Mutex::new(
            responses.into_iter().map(Into::into).collect(),
        )))
    }

    pub fn repeating(response: impl Into<String>) -> Self {
        Self::with_script(Script::Repeat(response.into()))
    }

    pub fn failing() -> Self {
        Self::with_script(Script::Fail)
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, request: &CompletionRequest) -> cinematic_ai::Result<Completion> {
        self.requests.lock().push(request.clone());
        match &self.script {
            Script::Queue(queue) => queue
                .lock()
                .pop_front()
                .map(Completion::text)
                .ok_or_else(|| cinematic_ai::Error::UnexpectedResponse("script exhausted".into())),
            Script::Repeat(text) => Ok(Completion::text(text.clone())),
            Script::Fail => Err(cinematic_ai::Error::api("server_error", "endpoint down")),
        }
    }
}

/// Catalog that echoes its inputs and records every call
pub struct StubCatalog {
    name: String,
    fail_on: Option<String>,
    lookups: Mutex<Vec<String>>,
    adds: Mutex<Vec<String>>,
    updates: Mutex<Vec<String>>,
}

impl StubCatalog {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail_on: None,
            lookups: Mutex::new(Vec::new()),
            adds: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
        }
    }

    /// Fail any call whose term or fields equal `term`
    pub fn failing_on(mut self, term: &str) -> Self {
        self.fail_on = Some(term.to_string());
        self
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().clone()
    }

    pub fn adds(&self) -> Vec<String> {
        self.adds.lock().clone()
    }

    pub fn updates(&self) -> Vec<String> {
        self.updates.lock().clone()
    }

    fn check(&self, operation: &str, term: &str) -> Result<()> {
        if self.fail_on.as_deref() == Some(term) {
            return Err(Error::service(
                &self.name,
                format!("{} failed for {}", operation, term),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogService for StubCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, term: &str, filter_hint: &str) -> Result<String> {
        self.lookups.lock().push(term.to_string());
        self.check("lookup", term)?;
        Ok(format!("{}:{}:{}", self.name, term, filter_hint))
    }

    async fn add(&self, term: &str, options: &str) -> Result<()> {
        self.adds.lock().push(format!("{}:{}", term, options));
        self.check("add", term)
    }

    async fn update(&self, fields: &str) -> Result<()> {
        self.updates.lock().push(fields.to_string());
        self.check("update", fields)
    }
}

#[derive(Default)]
pub struct StubMemory {
    updates: Mutex<Vec<String>>,
}

impl StubMemory {
    pub fn updates(&self) -> Vec<String> {
        self.updates.lock().clone()
    }
}

#[async_trait]
impl MemoryService for StubMemory {
    async fn get_memory(&self, user_name: &str, user_id: &str, query: &str) -> Result<String> {
        Ok(format!("{}/{} remembers: {}", user_name, user_id, query))
    }

    async fn update_memory(&self, user_name: &str, user_id: &str, instruction: &str) -> Result<()> {
        self.updates
            .lock()
            .push(format!("{}/{}:{}", user_name, user_id, instruction));
        Ok(())
    }
}

#[derive(Default)]
pub struct StubWeb {
    queries: Mutex<Vec<String>>,
}

impl StubWeb {
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl WebSearch for StubWeb {
    async fn search(&self, query: &str) -> Result<String> {
        self.queries.lock().push(query.to_string());
        Ok(format!("answer for {}", query))
    }
}

pub fn services_with(movies: Arc<StubCatalog>, series: Arc<StubCatalog>) -> Services {
    Services {
        movies,
        series,
        memory: Arc::new(StubMemory::default()),
        web: Arc::new(StubWeb::default()),
    }
}

/// Sink recording every render
#[derive(Default)]
pub struct RecordingSink {
    renders: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn renders(&self) -> Vec<String> {
        self.renders.lock().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.renders.lock().last().cloned()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn render(&self, content: &str) -> Result<()> {
        self.renders.lock().push(content.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingReview {
    submitted: Mutex<Vec<String>>,
}

impl RecordingReview {
    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl ReviewSink for RecordingReview {
    async fn submit(&self, rendered: &str) -> Result<()> {
        self.submitted.lock().push(rendered.to_string());
        Ok(())
    }
}

/// In-memory platform holding every posted message
pub struct MemoryPlatform {
    bot_id: String,
    next_id: AtomicU64,
    messages: Mutex<Vec<PostedMessage>>,
    statuses: Mutex<Vec<String>>,
}

impl MemoryPlatform {
    pub fn new(bot_id: &str) -> Self {
        Self {
            bot_id: bot_id.to_string(),
            next_id: AtomicU64::new(1000),
            messages: Mutex::new(Vec::new()),
            statuses: Mutex::new(Vec::new()),
        }
    }

    /// Store a message as if it had been posted earlier
    pub fn seed(&self, author_id: &str, content: &str) -> MessageRef {
        let reference = MessageRef::new(
            "chan",
            self.next_id.fetch_add(1, Ordering::Relaxed).to_string(),
        );
        self.messages.lock().push(PostedMessage {
            reference: reference.clone(),
            author_id: author_id.to_string(),
            content: content.to_string(),
        });
        reference
    }

    pub fn bot_messages(&self) -> Vec<PostedMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.author_id == self.bot_id)
            .cloned()
            .collect()
    }

    pub fn content(&self, reference: &MessageRef) -> Option<String> {
        self.messages
            .lock()
            .iter()
            .find(|m| &m.reference == reference)
            .map(|m| m.content.clone())
    }

    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().clone()
    }
}

#[async_trait]
impl Platform for MemoryPlatform {
    fn bot_id(&self) -> &str {
        &self.bot_id
    }

    async fn fetch(&self, reference: &MessageRef) -> Result<PostedMessage> {
        self.messages
            .lock()
            .iter()
            .find(|m| &m.reference == reference)
            .cloned()
            .ok_or_else(|| Error::Platform(format!("unknown message {}", reference.message_id)))
    }

    async fn reply(&self, _to: &MessageRef, content: &str) -> Result<MessageRef> {
        Ok(self.seed(&self.bot_id, content))
    }

    async fn edit(&self, reference: &MessageRef, content: &str) -> Result<()> {
        let mut messages = self.messages.lock();
        let message = messages
            .iter_mut()
            .find(|m| &m.reference == reference)
            .ok_or_else(|| Error::Platform(format!("unknown message {}", reference.message_id)))?;
        message.content = content.to_string();
        Ok(())
    }

    async fn set_status(&self, activity: &str) -> Result<()> {
        self.statuses.lock().push(activity.to_string());
        Ok(())
    }
}
