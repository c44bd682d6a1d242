//! Per-user memories kept in a JSON file

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cinematic_agent::{Error, MemoryService, Result};
use cinematic_ai::Turn;
use tokio::sync::Mutex;

use crate::services::{UtilityModel, examples_acknowledged};

const NO_MEMORIES: &str = "no memories";

/// Memory summaries keyed by user id, queried and rewritten by the model
pub struct JsonMemoryStore {
    path: PathBuf,
    model: UtilityModel,
    /// Serialises read-modify-write cycles on the file
    write_lock: Mutex<()>,
}

impl JsonMemoryStore {
    pub fn new(path: impl Into<PathBuf>, model: UtilityModel) -> Self {
        Self {
            path: path.into(),
            model,
            write_lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>> {
        read_memories(&self.path).await
    }
}

async fn read_memories(path: &Path) -> Result<BTreeMap<String, String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
        Ok(content) => serde_json::from_str(&content)
            .map_err(|e| Error::service("memory", format!("corrupt memory file: {}", e))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(Error::service("memory", e.to_string())),
    }
}

async fn write_memories(path: &Path, memories: &BTreeMap<String, String>) -> Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::service("memory", e.to_string()))?;
    }
    let content = serde_json::to_string_pretty(memories)
        .map_err(|e| Error::service("memory", e.to_string()))?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| Error::service("memory", e.to_string()))
}

fn acknowledged() -> [Turn; 2] {
    examples_acknowledged(
        "the above are examples, do you understand?",
        "yes I understand those are examples and future messages are the real ones",
    )
}

#[async_trait]
impl MemoryService for JsonMemoryStore {
    async fn get_memory(&self, user_name: &str, user_id: &str, query: &str) -> Result<String> {
        let memories = self.read_all().await?;
        let Some(summary) = memories.get(user_id) else {
            return Ok(NO_MEMORIES.to_string());
        };
        tracing::debug!(user = user_name, query, "querying memories");

        let mut turns = vec![
            Turn::user("You are a memory access assistant, you view a memory file and query it for information"),
            Turn::user("memories:requested all 7 abc movies, enjoyed eastworld"),
            Turn::user("user requested abc movie 2?"),
            Turn::assistant("yes user requested abc 2"),
            Turn::user("user requested eastworld?"),
            Turn::assistant("no user has not requested eastworld, but they mentioned they enjoyed it"),
        ];
        turns.extend(acknowledged());
        turns.push(Turn::user(format!("memories:{}", summary)));
        turns.push(Turn::user(query));

        self.model.ask(turns).await
    }

    async fn update_memory(&self, user_name: &str, user_id: &str, instruction: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut memories = self.read_all().await?;
        let current = memories.get(user_id).cloned().unwrap_or_default();

        let mut turns = vec![
            Turn::user("You are a memory writer assistant, you view a memory file and update it with information, you write extremely brief summaries"),
            Turn::user("memories:enjoyed movie puppet 1, wants series eastworld"),
            Turn::user("Add 'loved movie stingate 1995'"),
            Turn::assistant("enjoyed movie puppet 1 and loved movie stingate 1995, wants series eastworld"),
            Turn::user("Add 'doesnt want series eastworld'"),
            Turn::assistant("enjoyed movie puppet 1 and loved movie stingate 1995"),
        ];
        turns.extend(acknowledged());
        turns.push(Turn::user(format!("memories:{}", current)));
        turns.push(Turn::user(format!("Add '{}'", instruction)));

        let summary = self.model.ask(turns).await?;
        tracing::info!(user = user_name, "memory updated");
        memories.insert(user_id.to_string(), summary);
        write_memories(&self.path, &memories).await
    }
}
