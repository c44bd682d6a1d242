//! Periodic refresh of the bot's displayed activity

use std::{sync::Arc, time::Duration};

use cinematic_ai::{CompletionProvider, CompletionRequest, Turn};
use tokio_util::sync::CancellationToken;

use crate::{error::Result, platform::Platform};

const TITLE_PROMPT: &str =
    "Give me a random movie or tv series, just the title nothing else, doesn't need to be popular";

/// Picks a random title every interval and shows it as the bot's status
pub struct StatusRefresher {
    provider: Arc<dyn CompletionProvider>,
    platform: Arc<dyn Platform>,
    model: String,
    interval: Duration,
}

impl StatusRefresher {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        platform: Arc<dyn Platform>,
        model: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            provider,
            platform,
            model: model.into(),
            interval,
        }
    }

    /// Refresh immediately, then every interval until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            if let Err(e) = self.refresh().await {
                tracing::warn!(error = %e, "status refresh failed");
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        tracing::debug!("status refresher stopped");
    }

    /// Pick a title and set it as the status
    pub async fn refresh(&self) -> Result<String> {
        let request = CompletionRequest::new(self.model.clone(), vec![Turn::user(TITLE_PROMPT)]);
        let completion = self.provider.complete(&request).await?;
        let title = strip_quotes(completion.text.trim()).to_string();
        self.platform.set_status(&title).await?;
        tracing::debug!(title = %title, "status updated");
        Ok(title)
    }
}

fn strip_quotes(title: &str) -> &str {
    title
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(title)
}
