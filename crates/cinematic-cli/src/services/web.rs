//! Web search through the DuckDuckGo instant answer API

use async_trait::async_trait;
use cinematic_agent::{Error, Result, WebSearch};
use cinematic_ai::Turn;
use serde::Deserialize;

use crate::services::UtilityModel;

const ENDPOINT: &str = "https://api.duckduckgo.com/";
const NOT_FOUND: &str = "Could not find an answer to your question";
/// Characters of search context handed to the model
const MAX_CONTEXT: usize = 4096;

pub struct DuckDuckGo {
    http: reqwest::Client,
    endpoint: String,
    model: UtilityModel,
}

impl DuckDuckGo {
    pub fn new(model: UtilityModel) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: ENDPOINT.to_string(),
            model,
        }
    }

    async fn instant_answer(&self, query: &str) -> Result<InstantAnswer> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| Error::service("web", e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::service("web", format!("HTTP {}", response.status().as_u16())));
        }
        response
            .json()
            .await
            .map_err(|e| Error::service("web", e.to_string()))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct InstantAnswer {
    heading: String,
    abstract_text: String,
    abstract_source: String,
    answer: String,
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct RelatedTopic {
    text: Option<String>,
    /// Present on grouped topics
    topics: Vec<RelatedTopic>,
}

impl InstantAnswer {
    /// Flatten the answer into plain text context, empty when nothing useful came back
    fn context(&self) -> String {
        let mut lines = Vec::new();
        if !self.answer.is_empty() {
            lines.push(self.answer.clone());
        }
        if !self.abstract_text.is_empty() {
            lines.push(format!("{} ({}): {}", self.heading, self.abstract_source, self.abstract_text));
        }
        collect_topics(&self.related_topics, &mut lines);

        let mut context = lines.join("\n");
        if let Some((cut, _)) = context.char_indices().nth(MAX_CONTEXT) {
            context.truncate(cut);
        }
        context
    }
}

fn collect_topics(topics: &[RelatedTopic], lines: &mut Vec<String>) {
    for topic in topics {
        if let Some(text) = topic.text.as_ref().filter(|t| !t.is_empty()) {
            lines.push(text.clone());
        }
        collect_topics(&topic.topics, lines);
    }
}

fn is_no_answer(answer: &str) -> bool {
    let answer = answer.trim().trim_end_matches(['.', '!']);
    answer.is_empty() || answer.eq_ignore_ascii_case("no answer")
}

#[async_trait]
impl WebSearch for DuckDuckGo {
    async fn search(&self, query: &str) -> Result<String> {
        let context = self.instant_answer(query).await?.context();
        if context.is_empty() {
            tracing::debug!(query, "no search results");
            return Ok(NOT_FOUND.to_string());
        }

        let answer = self
            .model
            .ask(vec![Turn::user(format!(
                "{}\nAbove are web search results, give an answer to '{}', if the context is insufficient, reply 'no answer'",
                context, query
            ))])
            .await?;

        if is_no_answer(&answer) {
            Ok(NOT_FOUND.to_string())
        } else {
            Ok(answer)
        }
    }
}
