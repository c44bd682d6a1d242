//! Append-only log of replies flagged for review

use std::path::PathBuf;

use async_trait::async_trait;
use cinematic_agent::{Error, Result, ReviewSink};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub struct ReviewLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ReviewLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

/// One line per entry: timestamp, then the reply with newlines escaped
fn log_line(rendered: &str) -> String {
    format!(
        "{} {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        rendered.replace('\\', "\\\\").replace('\n', "\\n")
    )
}

#[async_trait]
impl ReviewSink for ReviewLog {
    async fn submit(&self, rendered: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| Error::service("review", e.to_string()))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| Error::service("review", e.to_string()))?;
        file.write_all(log_line(rendered).as_bytes())
            .await
            .map_err(|e| Error::service("review", e.to_string()))
    }
}
