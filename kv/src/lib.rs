//! Key-value store interface and implementations.
//!
//! Keys hold one of three value kinds: plain bytes, a hash of fields, or a set
//! of string members. Commands are queued into a [`Pipeline`] and executed by
//! [`KVStore::exec`] in a single round trip, with replies returned in queue
//! order.
//!
//! Two backends are provided: an in-memory store for tests and ephemeral use,
//! and a redb-based store for persistence.

pub mod command;
pub mod memory;
pub mod redb;
mod value;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

pub use command::{Command, Pipeline, Reply};
pub use memory::MemoryStore;
pub use crate::redb::RedbStore;

/// Errors that can occur in KV store operations.
#[derive(Error, Debug)]
pub enum KVError {
    #[error("kv: storage error: {0}")]
    Storage(String),

    #[error("kv: serialization error: {0}")]
    Serialization(String),

    #[error("kv: wrong value kind at {key}: want {want}")]
    WrongType { key: String, want: &'static str },

    #[error("kv: unexpected reply for {command}")]
    UnexpectedReply { command: &'static str },
}

/// Result type for KV operations.
pub type KVResult<T> = Result<T, KVError>;

/// Key-value store trait.
///
/// `exec` is the only required method; every convenience method below wraps a
/// one-command pipeline and therefore costs one round trip.
#[async_trait]
pub trait KVStore: Send + Sync {
    /// Execute every queued command in one round trip.
    ///
    /// Replies are ordered to match the queue. Execution is not atomic: a
    /// failing command may leave earlier commands of the same pipeline applied.
    async fn exec(&self, pipeline: Pipeline) -> KVResult<Vec<Reply>>;

    /// Get a string value.
    async fn get(&self, key: &str) -> KVResult<Option<Vec<u8>>> {
        let mut p = Pipeline::new();
        p.get(key);
        single(self.exec(p).await?)?.into_bytes()
    }

    /// Set a string value.
    async fn set(&self, key: &str, value: &[u8]) -> KVResult<()> {
        let mut p = Pipeline::new();
        p.set(key, value);
        self.exec(p).await.map(|_| ())
    }

    /// Report whether a key exists, without reading its value.
    async fn exists(&self, key: &str) -> KVResult<bool> {
        let mut p = Pipeline::new();
        p.exists(key);
        Ok(single(self.exec(p).await?)?.into_int()? > 0)
    }

    /// Delete a key of any kind. No error if the key does not exist.
    async fn del(&self, key: &str) -> KVResult<()> {
        let mut p = Pipeline::new();
        p.del(key);
        self.exec(p).await.map(|_| ())
    }

    /// Get one field of a hash.
    async fn hget(&self, key: &str, field: &str) -> KVResult<Option<Vec<u8>>> {
        let mut p = Pipeline::new();
        p.hget(key, field);
        single(self.exec(p).await?)?.into_bytes()
    }

    /// Get every field of a hash. Returns None if the key does not exist.
    async fn hgetall(&self, key: &str) -> KVResult<Option<BTreeMap<String, Vec<u8>>>> {
        let mut p = Pipeline::new();
        p.hgetall(key);
        single(self.exec(p).await?)?.into_hash()
    }

    /// Set fields of a hash, creating it if needed.
    async fn hset(&self, key: &str, fields: &[(&str, &[u8])]) -> KVResult<()> {
        let mut p = Pipeline::new();
        p.hset(key, fields);
        self.exec(p).await.map(|_| ())
    }

    /// Add members to a set. Returns the number of newly added members.
    async fn sadd(&self, key: &str, members: &[&str]) -> KVResult<i64> {
        let mut p = Pipeline::new();
        p.sadd(key, members);
        single(self.exec(p).await?)?.into_int()
    }

    /// Remove members from a set. Returns the number of removed members.
    async fn srem(&self, key: &str, members: &[&str]) -> KVResult<i64> {
        let mut p = Pipeline::new();
        p.srem(key, members);
        single(self.exec(p).await?)?.into_int()
    }

    /// List the members of a set in lexicographic order.
    async fn smembers(&self, key: &str) -> KVResult<Vec<String>> {
        let mut p = Pipeline::new();
        p.smembers(key);
        single(self.exec(p).await?)?.into_members()
    }

    /// Count the members of a set.
    async fn scard(&self, key: &str) -> KVResult<i64> {
        let mut p = Pipeline::new();
        p.scard(key);
        single(self.exec(p).await?)?.into_int()
    }
}

impl fmt::Debug for dyn KVStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KVStore {{ ... }}")
    }
}

fn single(replies: Vec<Reply>) -> KVResult<Reply> {
    replies.into_iter().next().ok_or(KVError::UnexpectedReply {
        command: "pipeline",
    })
}
