//! Redb-based persistent key-value store implementation.
//!
//! Each pipeline runs inside one redb write transaction, so a pipeline is one
//! durable commit. Values are stored MessagePack-encoded.

use std::path::Path;

use async_trait::async_trait;
use redb::{Database, ReadableTable, Table, TableDefinition};

use crate::command::{Pipeline, Reply};
use crate::value::{Backend, Value, apply};
use crate::{KVError, KVResult, KVStore};

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

/// A persistent key-value store backed by redb.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create a redb store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> KVResult<Self> {
        let db = Database::create(path).map_err(storage)?;

        // Create the table if it doesn't exist
        let tx = db.begin_write().map_err(storage)?;
        {
            let _ = tx.open_table(TABLE).map_err(storage)?;
        }
        tx.commit().map_err(storage)?;

        Ok(Self { db })
    }
}

impl Backend for Table<'_, &'static str, &'static [u8]> {
    fn load(&mut self, key: &str) -> KVResult<Option<Value>> {
        let raw = self.get(key).map_err(storage)?.map(|v| v.value().to_vec());
        raw.map(|data| Value::decode(&data)).transpose()
    }

    fn store(&mut self, key: &str, value: Value) -> KVResult<()> {
        let data = value.encode()?;
        self.insert(key, data.as_slice()).map_err(storage)?;
        Ok(())
    }

    fn erase(&mut self, key: &str) -> KVResult<bool> {
        let removed = self.remove(key).map_err(storage)?;
        Ok(removed.is_some())
    }
}

#[async_trait]
impl KVStore for RedbStore {
    async fn exec(&self, pipeline: Pipeline) -> KVResult<Vec<Reply>> {
        let tx = self.db.begin_write().map_err(storage)?;
        let mut replies = Vec::with_capacity(pipeline.len());
        {
            let mut table = tx.open_table(TABLE).map_err(storage)?;
            for cmd in pipeline.into_commands() {
                // Dropping the transaction on error aborts it.
                replies.push(apply(&mut table, cmd)?);
            }
        }
        tx.commit().map_err(storage)?;
        Ok(replies)
    }
}

fn storage<E: std::fmt::Display>(e: E) -> KVError {
    KVError::Storage(e.to_string())
}
