//! Resolution event types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a resolution stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model answered without asking for more data
    Answered,
    /// The final response issued action commands
    ActionsDispatched,
    /// The model kept asking for data past the depth ceiling
    DepthExhausted,
}

/// Events emitted while a resolution runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolutionEvent {
    Started { id: Uuid },

    /// A completion came back and was parsed
    CompletionReceived {
        id: Uuid,
        depth: u32,
        commands: usize,
    },

    /// Retrieval results were appended to the history
    ResultsAppended { id: Uuid, depth: u32, bytes: usize },

    ActionsDispatched { id: Uuid, count: usize },

    Finished {
        id: Uuid,
        completions: u32,
        reason: StopReason,
    },

    /// The completion endpoint failed after retries
    Error { id: Uuid, message: String },
}

impl ResolutionEvent {
    /// Check if this is a terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResolutionEvent::Finished { .. } | ResolutionEvent::Error { .. }
        )
    }

    pub fn resolution_id(&self) -> Uuid {
        match self {
            ResolutionEvent::Started { id }
            | ResolutionEvent::CompletionReceived { id, .. }
            | ResolutionEvent::ResultsAppended { id, .. }
            | ResolutionEvent::ActionsDispatched { id, .. }
            | ResolutionEvent::Finished { id, .. }
            | ResolutionEvent::Error { id, .. } => *id,
        }
    }
}
