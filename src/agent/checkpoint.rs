//! Checkpoints
//!
//! The executor saves a checkpoint after every node. A checkpoint holds the
//! state, the node to run next and, when the run is suspended, the pending
//! interrupt.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::agent::graph::Node;
use crate::agent::state::ConversationState;
use crate::core::{EventflowError, Result};

/// A run suspended after a node, waiting for a resume signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingInterrupt {
    pub after: Node,
    pub interrupted_at: DateTime<Utc>,
}

/// Durable snapshot of a thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub state: ConversationState,
    /// Node to run next; `None` once the run reached its end
    pub next: Option<Node>,
    /// Nodes executed over the lifetime of the thread
    pub step: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupt: Option<PendingInterrupt>,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(state: ConversationState, next: Option<Node>, step: u64) -> Self {
        Self {
            state,
            next,
            step,
            interrupt: None,
            saved_at: Utc::now(),
        }
    }

    pub fn interrupted(mut self, after: Node) -> Self {
        self.interrupt = Some(PendingInterrupt {
            after,
            interrupted_at: Utc::now(),
        });
        self
    }

    pub fn thread_id(&self) -> &str {
        &self.state.thread_id
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.is_some()
    }
}

/// Checkpoint persistence
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Replace the checkpoint of the thread
    async fn put(&self, checkpoint: &Checkpoint) -> Result<()>;

    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>>;

    async fn delete(&self, thread_id: &str) -> Result<()>;
}

/// Checkpoints held in process memory
#[derive(Default)]
pub struct MemoryCheckpointer {
    checkpoints: RwLock<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for MemoryCheckpointer {
    async fn put(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.checkpoints
            .write()
            .await
            .insert(checkpoint.thread_id().to_string(), checkpoint.clone());
        Ok(())
    }

    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self.checkpoints.read().await.get(thread_id).cloned())
    }

    async fn delete(&self, thread_id: &str) -> Result<()> {
        self.checkpoints.write().await.remove(thread_id);
        Ok(())
    }
}

/// One JSON file per thread, replaced atomically on every save
pub struct FileCheckpointer {
    dir: PathBuf,
}

impl FileCheckpointer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, thread_id: &str) -> Result<PathBuf> {
        let valid = !thread_id.is_empty()
            && thread_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && !thread_id.starts_with('.');
        if !valid {
            return Err(EventflowError::checkpoint(format!(
                "invalid thread id '{}'",
                thread_id
            )));
        }
        Ok(self.dir.join(format!("{}.json", thread_id)))
    }
}

#[async_trait]
impl Checkpointer for FileCheckpointer {
    async fn put(&self, checkpoint: &Checkpoint) -> Result<()> {
        let path = self.path_for(checkpoint.thread_id())?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let body = serde_json::to_vec_pretty(checkpoint)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::trace!(path = %path.display(), step = checkpoint.step, "checkpoint saved");
        Ok(())
    }

    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let path = self.path_for(thread_id)?;
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let checkpoint = serde_json::from_slice(&body).map_err(|e| {
            EventflowError::checkpoint(format!("corrupt checkpoint {}: {}", path.display(), e))
        })?;
        Ok(Some(checkpoint))
    }

    async fn delete(&self, thread_id: &str) -> Result<()> {
        let path = self.path_for(thread_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
