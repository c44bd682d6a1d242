//! External collaborators the core talks to
//!
//! Only the interface boundary lives here; concrete clients for the catalog
//! servers, the memory store, and web search are provided by the binary.
//! Handles are built once at startup and shared across resolutions.

use std::sync::Arc;

use async_trait::async_trait;
use cinematic_ai::Turn;

use crate::error::Result;

/// A movie or series catalog server
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Short name used in logs ("radarr", "sonarr")
    fn name(&self) -> &str;

    /// Look up `term` and answer `filter_hint` from what was found
    async fn lookup(&self, term: &str, filter_hint: &str) -> Result<String>;

    /// Add the item identified by `term` with the given options
    async fn add(&self, term: &str, options: &str) -> Result<()>;

    /// Update an existing item from a JSON object of changed fields
    async fn update(&self, fields: &str) -> Result<()>;
}

/// Per-user long-term memory
#[async_trait]
pub trait MemoryService: Send + Sync {
    async fn get_memory(&self, user_name: &str, user_id: &str, query: &str) -> Result<String>;

    async fn update_memory(&self, user_name: &str, user_id: &str, instruction: &str)
    -> Result<()>;
}

/// Free-text web search
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<String>;
}

/// Retrieval of example exchanges to prime the model
#[async_trait]
pub trait ExampleSource: Send + Sync {
    async fn get_examples(&self, query_text: &str) -> Result<Vec<Turn>>;
}

/// Destination for exchanges flagged for manual review
#[async_trait]
pub trait ReviewSink: Send + Sync {
    async fn submit(&self, rendered: &str) -> Result<()>;
}

/// An example source that never primes anything
pub struct NoExamples;

#[async_trait]
impl ExampleSource for NoExamples {
    async fn get_examples(&self, _query_text: &str) -> Result<Vec<Turn>> {
        Ok(Vec::new())
    }
}

/// The collaborator handles commands are routed to
#[derive(Clone)]
pub struct Services {
    pub movies: Arc<dyn CatalogService>,
    pub series: Arc<dyn CatalogService>,
    pub memory: Arc<dyn MemoryService>,
    pub web: Arc<dyn WebSearch>,
}

/// Who the current resolution is acting for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: String,
    pub user_name: String,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
        }
    }
}
