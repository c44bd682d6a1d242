//! The multi-step resolution loop
//!
//! One resolution turns a user message into a finished reply:
//!
//! 1. compose preamble + primed examples + budgeted history
//! 2. ask the model
//! 3. normalize and parse the answer, append it to history
//! 4. render the visible part with a pending or done marker
//! 5. dispatch retrievals and loop, or dispatch actions and stop
//!
//! The loop is bounded by `max_depth` continuations, so a model that keeps
//! asking for data still terminates after `max_depth + 1` completions.

use std::sync::Arc;

use cinematic_ai::{CompletionProvider, CompletionRequest, RetryConfig, Turn};
use tokio::sync::broadcast;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    budget::TokenBudget,
    dispatch::Dispatcher,
    error::Result,
    events::{ResolutionEvent, StopReason},
    platform::MessageSink,
    prompt,
    protocol,
    render::{self, FAILURE_TEXT, Status},
    services::UserContext,
};

/// Default number of continuations after the first completion
pub const DEFAULT_MAX_DEPTH: u32 = 3;

/// Resolver settings
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub model: String,
    pub temperature: f32,
    pub max_depth: u32,
    pub budget: TokenBudget,
    pub retry: RetryConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            temperature: 0.7,
            max_depth: DEFAULT_MAX_DEPTH,
            budget: TokenBudget::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// Everything one resolution owns while it runs
#[derive(Debug, Clone)]
pub struct ResolutionState {
    pub id: Uuid,
    /// Fixed rendered prefix: carried-over lines plus the user's utterance
    pub start: String,
    /// Current rendered reply
    pub visible: String,
    pub history: Vec<Turn>,
    pub primed: Vec<Turn>,
    pub depth: u32,
    pub user: UserContext,
}

impl ResolutionState {
    pub fn new(start: impl Into<String>, history: Vec<Turn>, user: UserContext) -> Self {
        let start = start.into();
        Self {
            id: Uuid::new_v4(),
            visible: start.clone(),
            start,
            history,
            primed: Vec::new(),
            depth: 0,
            user,
        }
    }

    pub fn with_primed(mut self, primed: Vec<Turn>) -> Self {
        self.primed = primed;
        self
    }
}

/// How a resolution ended
#[derive(Debug, Clone)]
pub struct Resolution {
    pub id: Uuid,
    pub completions: u32,
    pub reason: StopReason,
    /// Last rendered reply
    pub rendered: String,
    pub history: Vec<Turn>,
}

/// Drives model completions and command dispatch for one message at a time
pub struct Resolver {
    provider: Arc<dyn CompletionProvider>,
    dispatcher: Dispatcher,
    config: ResolverConfig,
    /// Fixed preamble; built from the clock per resolution when unset
    preamble: Option<Vec<Turn>>,
    event_tx: broadcast::Sender<ResolutionEvent>,
}

impl Resolver {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        dispatcher: Dispatcher,
        config: ResolverConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            provider,
            dispatcher,
            config,
            preamble: None,
            event_tx,
        }
    }

    /// Use a fixed preamble instead of the dated default
    pub fn with_preamble(mut self, preamble: Vec<Turn>) -> Self {
        self.preamble = Some(preamble);
        self
    }

    /// Subscribe to resolution events
    pub fn subscribe(&self) -> broadcast::Receiver<ResolutionEvent> {
        self.event_tx.subscribe()
    }

    /// Run a resolution to its terminal state.
    ///
    /// Returns an error only when the completion endpoint fails; the sink has
    /// already been told about it by then.
    pub async fn resolve(&self, state: ResolutionState, sink: &dyn MessageSink) -> Result<Resolution> {
        let span = tracing::info_span!("resolve", id = %state.id, user = %state.user.user_name);
        self.run(state, sink).instrument(span).await
    }

    async fn run(&self, mut state: ResolutionState, sink: &dyn MessageSink) -> Result<Resolution> {
        let id = state.id;
        let _ = self.event_tx.send(ResolutionEvent::Started { id });
        tracing::info!(history = state.history.len(), primed = state.primed.len(), "resolution started");

        let preamble = self
            .preamble
            .clone()
            .unwrap_or_else(|| prompt::instruction_preamble(chrono::Local::now()));
        let mut completions = 0u32;
        let mut last_status = None;

        let reason = loop {
            let request = self.compose(&preamble, &mut state);
            let completion = match self.config.retry.complete(self.provider.as_ref(), &request).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!(error = %e, depth = state.depth, "completion failed");
                    let _ = self.event_tx.send(ResolutionEvent::Error {
                        id,
                        message: e.to_string(),
                    });
                    let content = render::refusal(&state.start, FAILURE_TEXT);
                    self.render(sink, &mut state, content).await;
                    return Err(e.into());
                }
            };
            completions += 1;

            let response = protocol::normalize(&completion.text);
            let parsed = protocol::parse(&response);
            let _ = self.event_tx.send(ResolutionEvent::CompletionReceived {
                id,
                depth: state.depth,
                commands: parsed.commands().count(),
            });
            tracing::debug!(depth = state.depth, response = %response, "completion received");
            state.history.push(Turn::assistant(response.clone()));

            let can_continue = state.depth < self.config.max_depth;
            if !parsed.visible.is_empty() {
                let status = if parsed.has_retrieval() && can_continue {
                    Status::InProgress
                } else {
                    Status::Done
                };
                let content = render::status_line(&state.start, status, &parsed.visible);
                self.render(sink, &mut state, content).await;
                last_status = Some((status, parsed.visible.clone()));
            }

            if parsed.has_retrieval() {
                let skipped = parsed.actions().count();
                if skipped > 0 {
                    tracing::info!(skipped, "skipping actions issued alongside retrievals");
                }
                let results = self
                    .dispatcher
                    .dispatch_retrievals(parsed.retrievals(), &state.user)
                    .await;
                let _ = self.event_tx.send(ResolutionEvent::ResultsAppended {
                    id,
                    depth: state.depth,
                    bytes: results.len(),
                });
                state.history.push(Turn::system(results));

                if !can_continue {
                    tracing::warn!(depth = state.depth, "depth ceiling reached with retrievals pending");
                    break StopReason::DepthExhausted;
                }
                state.depth += 1;
                continue;
            }

            if parsed.has_action() {
                let count = self
                    .dispatcher
                    .dispatch_actions(parsed.actions(), &state.user)
                    .await;
                let _ = self.event_tx.send(ResolutionEvent::ActionsDispatched { id, count });
                break StopReason::ActionsDispatched;
            }

            break StopReason::Answered;
        };

        // A pending line left behind would make the exchange unreconstructible
        if let Some((Status::InProgress, text)) = last_status {
            let content = render::status_line(&state.start, Status::Done, &text);
            self.render(sink, &mut state, content).await;
        }

        tracing::info!(completions, ?reason, "resolution finished");
        let _ = self.event_tx.send(ResolutionEvent::Finished {
            id,
            completions,
            reason,
        });

        Ok(Resolution {
            id,
            completions,
            reason,
            rendered: state.visible,
            history: state.history,
        })
    }

    /// Trim history to the budget and build the request
    fn compose(&self, preamble: &[Turn], state: &mut ResolutionState) -> CompletionRequest {
        let mut messages: Vec<Turn> = preamble.iter().chain(&state.primed).cloned().collect();

        let first_kept = self.config.budget.first_kept_index(&messages, &state.history);
        if first_kept > 0 {
            tracing::debug!(dropped = first_kept, "trimming history to budget");
            state.history.drain(..first_kept);
        }
        messages.extend(state.history.iter().cloned());

        CompletionRequest::new(self.config.model.clone(), messages)
            .with_temperature(self.config.temperature)
    }

    async fn render(&self, sink: &dyn MessageSink, state: &mut ResolutionState, content: String) {
        if let Err(e) = sink.render(&content).await {
            tracing::warn!(error = %e, "failed to update reply");
        }
        state.visible = content;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSink, ScriptedProvider, StubCatalog, services_with};
    use cinematic_ai::Role;

    fn user() -> UserContext {
        UserContext::new("42", "ripley")
    }

    fn resolver(provider: Arc<ScriptedProvider>, movies: Arc<StubCatalog>) -> Resolver {
        let dispatcher = Dispatcher::new(services_with(movies, Arc::new(StubCatalog::new("sonarr"))));
        let config = ResolverConfig {
            retry: RetryConfig::none(),
            ..ResolverConfig::default()
        };
        Resolver::new(provider, dispatcher, config).with_preamble(vec![Turn::user("preamble")])
    }

    fn state() -> ResolutionState {
        ResolutionState::new("💬 add alien\n", vec![Turn::user("add alien")], user())
    }

    #[tokio::test]
    async fn test_plain_answer_finishes_in_one_completion() {
        let provider = Arc::new(ScriptedProvider::new(["Alien is a 1979 film."]));
        let sink = RecordingSink::default();

        let resolution = resolver(provider.clone(), Arc::new(StubCatalog::new("radarr")))
            .resolve(state(), &sink)
            .await
            .unwrap();

        assert_eq!(resolution.completions, 1);
        assert_eq!(resolution.reason, StopReason::Answered);
        assert_eq!(sink.last().as_deref(), Some("💬 add alien\n✅ Alien is a 1979 film."));
        assert_eq!(provider.requests()[0].messages[0].content, "preamble");
    }

    #[tokio::test]
    async fn test_retrieval_then_action() {
        let provider = Arc::new(ScriptedProvider::new([
            "[CMDRET~movie_lookup~Alien~id] Looking up Alien",
            "[CMD~movie_post~348~4] Added Alien in 1080p",
        ]));
        let movies = Arc::new(StubCatalog::new("radarr"));
        let sink = RecordingSink::default();

        let resolution = resolver(provider.clone(), movies.clone())
            .resolve(state(), &sink)
            .await
            .unwrap();

        assert_eq!(resolution.completions, 2);
        assert_eq!(resolution.reason, StopReason::ActionsDispatched);
        assert_eq!(
            sink.renders(),
            vec![
                "💬 add alien\n⌛ Looking up Alien".to_string(),
                "💬 add alien\n✅ Added Alien in 1080p".to_string(),
            ]
        );
        assert_eq!(movies.adds(), vec!["348:4".to_string()]);

        // second request sees the raw answer and the result turn
        let second = &provider.requests()[1].messages;
        let tail = &second[second.len() - 2..];
        assert_eq!(tail[0].role, Role::Assistant);
        assert_eq!(tail[0].content, "[CMDRET~movie_lookup~Alien~id] Looking up Alien");
        assert_eq!(tail[1].role, Role::System);
        assert_eq!(tail[1].content, "[RES~radarr:Alien:id]");
    }

    #[tokio::test]
    async fn test_depth_ceiling_bounds_completions() {
        let provider = Arc::new(ScriptedProvider::repeating(
            "[CMDRET~movie_lookup~Alien~id] Still looking",
        ));
        let sink = RecordingSink::default();

        let resolution = resolver(provider.clone(), Arc::new(StubCatalog::new("radarr")))
            .resolve(state(), &sink)
            .await
            .unwrap();

        assert_eq!(provider.requests().len(), 4);
        assert_eq!(resolution.completions, 4);
        assert_eq!(resolution.reason, StopReason::DepthExhausted);
        let last = sink.last().unwrap();
        assert!(last.contains("✅ Still looking"), "got {}", last);
        assert!(render::is_completed(&resolution.rendered));
    }

    #[tokio::test]
    async fn test_pending_line_is_finalized() {
        // the last visible text was pending, the final answer has no visible text
        let provider = Arc::new(ScriptedProvider::new([
            "[CMDRET~movie_lookup~Alien~id] Checking the server",
            "[CMD~movie_post~348~4]",
        ]));
        let sink = RecordingSink::default();

        let resolution = resolver(provider, Arc::new(StubCatalog::new("radarr")))
            .resolve(state(), &sink)
            .await
            .unwrap();

        assert_eq!(resolution.rendered, "💬 add alien\n✅ Checking the server");
        assert_eq!(sink.renders().len(), 2);
    }

    #[tokio::test]
    async fn test_actions_alongside_retrievals_are_skipped() {
        let provider = Arc::new(ScriptedProvider::new([
            "[CMDRET~movie_lookup~Alien~id][CMD~movie_post~348~4] Looking",
            "Done looking",
        ]));
        let movies = Arc::new(StubCatalog::new("radarr"));
        let sink = RecordingSink::default();

        resolver(provider, movies.clone())
            .resolve(state(), &sink)
            .await
            .unwrap();

        assert_eq!(movies.lookups().len(), 1);
        assert!(movies.adds().is_empty());
    }

    #[tokio::test]
    async fn test_completion_failure_renders_failure_line() {
        let provider = Arc::new(ScriptedProvider::failing());
        let sink = RecordingSink::default();

        let result = resolver(provider, Arc::new(StubCatalog::new("radarr")))
            .resolve(state(), &sink)
            .await;

        assert!(result.is_err());
        assert_eq!(
            sink.last().unwrap(),
            format!("💬 add alien\n❌ {}", FAILURE_TEXT)
        );
    }

    #[tokio::test]
    async fn test_history_is_trimmed_to_budget() {
        let provider = Arc::new(ScriptedProvider::new(["ok"]));
        let dispatcher = Dispatcher::new(services_with(
            Arc::new(StubCatalog::new("radarr")),
            Arc::new(StubCatalog::new("sonarr")),
        ));
        let config = ResolverConfig {
            budget: TokenBudget::new(20.0),
            retry: RetryConfig::none(),
            ..ResolverConfig::default()
        };
        let resolver = Resolver::new(provider.clone(), dispatcher, config).with_preamble(vec![]);
        let history = vec![Turn::user("x".repeat(200)), Turn::user("add alien")];

        let resolution = resolver
            .resolve(ResolutionState::new("💬 add alien\n", history, user()), &RecordingSink::default())
            .await
            .unwrap();

        let sent = &provider.requests()[0].messages;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].content, "add alien");
        assert_eq!(resolution.history.len(), 2);
    }

    #[tokio::test]
    async fn test_events_are_published() {
        let provider = Arc::new(ScriptedProvider::new(["hello"]));
        let resolver = resolver(provider, Arc::new(StubCatalog::new("radarr")));
        let mut events = resolver.subscribe();

        resolver.resolve(state(), &RecordingSink::default()).await.unwrap();

        assert!(matches!(events.recv().await.unwrap(), ResolutionEvent::Started { .. }));
        assert!(matches!(
            events.recv().await.unwrap(),
            ResolutionEvent::CompletionReceived { depth: 0, commands: 0, .. }
        ));
        let finished = events.recv().await.unwrap();
        assert!(finished.is_terminal());
    }
}
