//! Cheap in-domain check run before a full resolution

use std::sync::Arc;

use cinematic_ai::{CompletionProvider, CompletionRequest, RetryConfig, Turn};

const CLASSIFIER_INSTRUCTION: &str = "You determine if a users message is irrelevant to you, is it related to movies, series, asking for recommendations, changing resolution, adding or removing media etc? You reply with a single word answer, yes or no. If you are unsure respond with no.";

const AFFIRMATIVE: &str = "yes";
/// The answer is a single word
const ANSWER_MAX_TOKENS: u32 = 5;

/// Outcome of the relevance check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Proceed,
    Refuse,
}

/// Asks the model whether a message is off-topic
pub struct RelevanceGate {
    provider: Arc<dyn CompletionProvider>,
    model: String,
    temperature: f32,
    retry: RetryConfig,
}

impl RelevanceGate {
    pub fn new(provider: Arc<dyn CompletionProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Classify `text` (prior user lines plus the new message).
    ///
    /// A failed classification lets the message through.
    pub async fn check(&self, text: &str) -> Verdict {
        let request = CompletionRequest::new(
            self.model.clone(),
            vec![
                Turn::system(CLASSIFIER_INSTRUCTION),
                Turn::user(format!(
                    "{}\nDo not respond to the above message, is the above text irrelevant, reply with a single word answer?",
                    text
                )),
            ],
        )
        .with_temperature(self.temperature)
        .with_max_tokens(ANSWER_MAX_TOKENS);

        match self.retry.complete(self.provider.as_ref(), &request).await {
            Ok(completion) => {
                let verdict = classify(&completion.text);
                tracing::info!(answer = %completion.text.replace('\n', " "), ?verdict, "relevance check");
                verdict
            }
            Err(e) => {
                tracing::warn!(error = %e, "relevance check failed, letting message through");
                Verdict::Proceed
            }
        }
    }
}

/// Only an answer starting with the affirmative token refuses.
pub fn classify(answer: &str) -> Verdict {
    let answer = answer.trim_start();
    let refuses = answer
        .get(..AFFIRMATIVE.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(AFFIRMATIVE));
    if refuses {
        Verdict::Refuse
    } else {
        Verdict::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;

    #[test]
    fn test_classify() {
        assert_eq!(classify("No, this is about movies"), Verdict::Proceed);
        assert_eq!(classify("Yes"), Verdict::Refuse);
        assert_eq!(classify("YES."), Verdict::Refuse);
        assert_eq!(classify("no"), Verdict::Proceed);
        assert_eq!(classify(""), Verdict::Proceed);
        assert_eq!(classify("Ye"), Verdict::Proceed);
    }

    #[tokio::test]
    async fn test_check_sends_history_and_message() {
        let provider = Arc::new(ScriptedProvider::new(["No, this is about movies"]));
        let gate = RelevanceGate::new(provider.clone(), "gpt-4");

        let verdict = gate.check("add alien\nand aliens").await;

        assert_eq!(verdict, Verdict::Proceed);
        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].max_tokens, Some(ANSWER_MAX_TOKENS));
        assert!(requests[0].messages[1].content.starts_with("add alien\nand aliens\n"));
    }

    #[tokio::test]
    async fn test_affirmative_refuses() {
        let provider = Arc::new(ScriptedProvider::new(["Yes"]));
        let gate = RelevanceGate::new(provider, "gpt-4");
        assert_eq!(gate.check("what's the weather").await, Verdict::Refuse);
    }

    #[tokio::test]
    async fn test_failure_fails_open() {
        let provider = Arc::new(ScriptedProvider::failing());
        let gate = RelevanceGate::new(provider, "gpt-4").with_retry(RetryConfig::none());
        assert_eq!(gate.check("add alien").await, Verdict::Proceed);
    }
}
