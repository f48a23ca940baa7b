//! In-memory key-value store implementation for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::command::{Pipeline, Reply};
use crate::value::{Backend, Value, apply};
use crate::{KVError, KVResult, KVStore};

/// An in-memory key-value store backed by a HashMap.
///
/// Clones share the same data. Every call to [`KVStore::exec`] counts as one
/// round trip; see [`MemoryStore::exec_count`].
#[derive(Clone)]
pub struct MemoryStore {
    data: Arc<Mutex<HashMap<String, Value>>>,
    execs: Arc<AtomicUsize>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            execs: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of pipelines executed so far.
    pub fn exec_count(&self) -> usize {
        self.execs.load(Ordering::SeqCst)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for HashMap<String, Value> {
    fn load(&mut self, key: &str) -> KVResult<Option<Value>> {
        Ok(self.get(key).cloned())
    }

    fn store(&mut self, key: &str, value: Value) -> KVResult<()> {
        self.insert(key.to_string(), value);
        Ok(())
    }

    fn erase(&mut self, key: &str) -> KVResult<bool> {
        Ok(self.remove(key).is_some())
    }
}

#[async_trait]
impl KVStore for MemoryStore {
    async fn exec(&self, pipeline: Pipeline) -> KVResult<Vec<Reply>> {
        self.execs.fetch_add(1, Ordering::SeqCst);
        let mut data = self
            .data
            .lock()
            .map_err(|e| KVError::Storage(e.to_string()))?;

        // Commands run in order; an error leaves earlier writes in place.
        let mut replies = Vec::with_capacity(pipeline.len());
        for cmd in pipeline.into_commands() {
            replies.push(apply(&mut *data, cmd)?);
        }
        Ok(replies)
    }
}
