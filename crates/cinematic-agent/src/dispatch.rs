//! Routing of parsed commands to external collaborators

use futures::future::join_all;

use crate::{
    error::{Error, Result},
    protocol::{Command, CommandKind, serialize_result},
    services::{CatalogService, Services, UserContext},
};

/// Executes commands against the collaborators in [`Services`].
///
/// A failing collaborator never aborts its siblings: retrieval failures come
/// back to the model as an error-shaped result, action failures are logged.
#[derive(Clone)]
pub struct Dispatcher {
    services: Services,
}

impl Dispatcher {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    /// Execute one command. Returns serialized `RES` markers for retrieval
    /// commands and `None` for actions and anything not routed.
    pub async fn dispatch(&self, command: &Command, user: &UserContext) -> Option<String> {
        if let CommandKind::Unknown(name) = &command.kind {
            tracing::debug!(kind = %name, "ignoring unknown command");
            return None;
        }
        if command.is_retrieval != command.kind.returns_data() {
            tracing::debug!(
                kind = %command.kind,
                is_retrieval = command.is_retrieval,
                "ignoring command issued under the wrong tag"
            );
            return None;
        }

        tracing::debug!(kind = %command.kind, args = ?command.arguments, "dispatching command");
        let services = &self.services;

        match &command.kind {
            CommandKind::WebSearch => Some(
                as_result(async {
                    let query = required(command, 0, "query")?;
                    services.web.search(query).await
                }
                .await),
            ),
            CommandKind::MovieLookup => Some(lookup_each(services.movies.as_ref(), command).await),
            CommandKind::SeriesLookup => Some(lookup_each(services.series.as_ref(), command).await),
            CommandKind::MemoryGet => Some(
                as_result(async {
                    let query = required(command, 0, "query")?;
                    services
                        .memory
                        .get_memory(&user.user_name, &user.user_id, query)
                        .await
                }
                .await),
            ),
            CommandKind::MovieAdd => {
                log_action(command, add(services.movies.as_ref(), command).await);
                None
            }
            CommandKind::SeriesAdd => {
                log_action(command, add(services.series.as_ref(), command).await);
                None
            }
            CommandKind::MovieUpdate => {
                log_action(command, update(services.movies.as_ref(), command).await);
                None
            }
            CommandKind::SeriesUpdate => {
                log_action(command, update(services.series.as_ref(), command).await);
                None
            }
            CommandKind::MemoryUpdate => {
                let result = async {
                    let instruction = required(command, 0, "instruction")?;
                    services
                        .memory
                        .update_memory(&user.user_name, &user.user_id, instruction)
                        .await
                }
                .await;
                log_action(command, result);
                None
            }
            CommandKind::Unknown(_) => None,
        }
    }

    /// Run a batch of retrieval commands concurrently and concatenate their
    /// results in command order.
    pub async fn dispatch_retrievals<'a>(
        &self,
        commands: impl IntoIterator<Item = &'a Command>,
        user: &UserContext,
    ) -> String {
        join_all(commands.into_iter().map(|c| self.dispatch(c, user)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Run a batch of action commands concurrently; returns how many ran.
    pub async fn dispatch_actions<'a>(
        &self,
        commands: impl IntoIterator<Item = &'a Command>,
        user: &UserContext,
    ) -> usize {
        let futures: Vec<_> = commands
            .into_iter()
            .map(|c| self.dispatch(c, user))
            .collect();
        let count = futures.len();
        join_all(futures).await;
        count
    }
}

fn required<'a>(command: &'a Command, index: usize, name: &str) -> Result<&'a str> {
    command
        .arg(index)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| Error::Other(format!("{} is missing its {} argument", command.kind, name)))
}

fn as_result(result: Result<String>) -> String {
    match result {
        Ok(payload) => serialize_result(&payload),
        Err(e) => {
            tracing::warn!(error = %e, "retrieval command failed");
            serialize_result(&format!("Error: {}", e))
        }
    }
}

fn log_action(command: &Command, result: Result<()>) {
    if let Err(e) = result {
        tracing::warn!(kind = %command.kind, error = %e, "action command failed");
    }
}

/// One lookup per multi-value term, each producing its own result marker.
async fn lookup_each(catalog: &dyn CatalogService, command: &Command) -> String {
    let terms = command.arg_values(0);
    if terms.is_empty() {
        return as_result(required(command, 0, "term").map(str::to_string));
    }
    let hint = command.arg(1).unwrap_or_default();

    join_all(terms.iter().map(|term| catalog.lookup(term, hint)))
        .await
        .into_iter()
        .map(as_result)
        .collect()
}

async fn add(catalog: &dyn CatalogService, command: &Command) -> Result<()> {
    let term = required(command, 0, "id")?;
    let options = command.arg(1).unwrap_or_default();
    catalog.add(term, options).await
}

async fn update(catalog: &dyn CatalogService, command: &Command) -> Result<()> {
    let fields = required(command, 0, "fields")?;
    catalog.update(fields).await
}
