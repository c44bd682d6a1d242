//! Concrete collaborators wired into the bot

pub mod arr;
pub mod examples;
pub mod memory;
pub mod review;
pub mod web;

use std::sync::Arc;

use cinematic_ai::{CompletionProvider, CompletionRequest, RetryConfig, Turn};

/// The cheaper model used to summarise raw data for the main conversation
#[derive(Clone)]
pub struct UtilityModel {
    provider: Arc<dyn CompletionProvider>,
    model: String,
    temperature: f32,
    retry: RetryConfig,
}

impl UtilityModel {
    pub fn new(provider: Arc<dyn CompletionProvider>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            retry: RetryConfig::default(),
        }
    }

    /// Run one completion and return its trimmed text
    pub async fn ask(&self, turns: Vec<Turn>) -> cinematic_agent::Result<String> {
        let request = CompletionRequest::new(self.model.clone(), turns).with_temperature(self.temperature);
        let completion = self.retry.complete(self.provider.as_ref(), &request).await?;
        tracing::debug!(
            model = %self.model,
            tokens = completion.usage.total(),
            "utility completion"
        );
        Ok(completion.text.trim().to_string())
    }
}

/// Stand-in for a catalog server that is not configured
pub struct Unconfigured {
    pub name: &'static str,
}

#[async_trait::async_trait]
impl cinematic_agent::CatalogService for Unconfigured {
    fn name(&self) -> &str {
        self.name
    }

    async fn lookup(&self, _term: &str, _filter_hint: &str) -> cinematic_agent::Result<String> {
        Err(self.error())
    }

    async fn add(&self, _term: &str, _options: &str) -> cinematic_agent::Result<()> {
        Err(self.error())
    }

    async fn update(&self, _fields: &str) -> cinematic_agent::Result<()> {
        Err(self.error())
    }
}

impl Unconfigured {
    fn error(&self) -> cinematic_agent::Error {
        cinematic_agent::Error::service(self.name, "server is not configured")
    }
}

/// The fixed exchange telling the model that preceding turns were examples
pub fn examples_acknowledged(user: &str, assistant: &str) -> [Turn; 2] {
    [Turn::user(user), Turn::assistant(assistant)]
}
