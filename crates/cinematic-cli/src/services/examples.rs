//! Example exchanges picked by intent to prime the model

use async_trait::async_trait;
use cinematic_agent::{Error, ExampleSource, Result};
use cinematic_ai::{Role, Turn};
use serde::Deserialize;

use crate::services::{UtilityModel, examples_acknowledged};

const BUILTIN: &str = include_str!("examples.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct Example {
    /// Intents this example illustrates
    pub queries: Vec<String>,
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
struct Catalog {
    example: Vec<Example>,
}

/// Static example catalog with model-picked intents
pub struct ExampleCatalog {
    examples: Vec<Example>,
    model: UtilityModel,
}

impl ExampleCatalog {
    /// Load the built-in catalog
    pub fn builtin(model: UtilityModel) -> Result<Self> {
        Self::from_toml(BUILTIN, model)
    }

    pub fn from_toml(source: &str, model: UtilityModel) -> Result<Self> {
        let catalog: Catalog = toml::from_str(source)
            .map_err(|e| Error::service("examples", format!("invalid catalog: {}", e)))?;
        Ok(Self {
            examples: catalog.example,
            model,
        })
    }

    /// Every distinct intent, in catalog order
    fn intents(&self) -> Vec<&str> {
        let mut intents: Vec<&str> = Vec::new();
        for query in self.examples.iter().flat_map(|e| &e.queries) {
            if !intents.contains(&query.as_str()) {
                intents.push(query);
            }
        }
        intents
    }

    /// Expand the examples matching any picked intent
    fn expand(&self, picked: &[String]) -> Vec<Turn> {
        let mut turns: Vec<Turn> = self
            .examples
            .iter()
            .filter(|e| {
                e.queries
                    .iter()
                    .any(|q| picked.contains(&q.trim().to_lowercase()))
            })
            .flat_map(|e| prompt_turns(&e.prompt))
            .collect();

        if !turns.is_empty() {
            turns.extend(examples_acknowledged(
                "The above are examples, you make replies more themed with personality, do you understand?",
                "I understand, the above are not real conversations only for me to learn how to format responses, I will always prompt for new information 📰, I will be helpful and informative in my real responses, often adding emojis to my responses, I'll usually end my responses with a followup question such as 'what did you think of it?'",
            ));
        }
        turns
    }
}

fn prompt_turns(prompt: &str) -> Vec<Turn> {
    prompt
        .lines()
        .filter_map(|line| {
            let line = line.trim_start();
            let (role, content) = if let Some(rest) = line.strip_prefix("U:") {
                (Role::User, rest)
            } else if let Some(rest) = line.strip_prefix("A:") {
                (Role::Assistant, rest)
            } else if let Some(rest) = line.strip_prefix("S:") {
                (Role::System, rest)
            } else {
                return None;
            };
            Some(Turn::new(role, content.trim()))
        })
        .collect()
}

#[async_trait]
impl ExampleSource for ExampleCatalog {
    async fn get_examples(&self, query_text: &str) -> Result<Vec<Turn>> {
        let answer = self
            .model
            .ask(vec![
                Turn::system("You get provided with a users message, and a list of queries that the message could match, you need to choose which examples are relevant, if its only potentially relevant still include it, return a list of the relevant examples separated by ; Examples: what resolution is silly man? wants resolution queried;asking about a collection of media;queries resolution"),
                Turn::user(format!("queries:{}", self.intents().join(", "))),
                Turn::user(query_text),
            ])
            .await?;

        let picked: Vec<String> = answer
            .split(';')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        let turns = self.expand(&picked);
        tracing::debug!(intents = ?picked, turns = turns.len(), "examples selected");
        Ok(turns)
    }
}
