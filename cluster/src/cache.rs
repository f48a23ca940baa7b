//! Read-through / write-through embedding cache keyed by feedback id.
//!
//! Reads never fail: storage errors and malformed payloads degrade to a miss.
//! Writes propagate errors so a failed persist is never assumed to succeed.
//! Entries never expire; they go away only through [`EmbeddingCache::delete`]
//! or [`EmbeddingCache::invalidate`].

use std::sync::Arc;

use tracing::warn;
use triage_kv::{KVStore, Pipeline, Reply};

use crate::error::ClusterError;
use crate::keys::embedding_key;
use crate::types::encode_vector;

#[derive(Clone)]
pub struct EmbeddingCache {
    store: Arc<dyn KVStore>,
    ns: String,
}

impl EmbeddingCache {
    pub fn new(store: Arc<dyn KVStore>, ns: impl Into<String>) -> Self {
        Self {
            store,
            ns: ns.into(),
        }
    }

    /// Cached vector for `id`, or None on miss, storage error or bad payload.
    pub async fn get(&self, id: &str) -> Option<Vec<f32>> {
        match self.store.get(&embedding_key(&self.ns, id)).await {
            Ok(raw) => raw.and_then(|data| decode(id, &data)),
            Err(e) => {
                warn!(id, error = %e, "cache: read failed, treating as miss");
                None
            }
        }
    }

    /// Write a vector.
    pub async fn set(&self, id: &str, vector: &[f32]) -> Result<(), ClusterError> {
        let data = encode_vector(vector)?;
        self.store
            .set(&embedding_key(&self.ns, id), data.as_bytes())
            .await?;
        Ok(())
    }

    /// Report whether an entry exists, without decoding it.
    pub async fn has(&self, id: &str) -> bool {
        self.store
            .exists(&embedding_key(&self.ns, id))
            .await
            .unwrap_or_else(|e| {
                warn!(id, error = %e, "cache: exists failed, treating as miss");
                false
            })
    }

    /// Look up many ids in one round trip. Results follow `ids` order.
    ///
    /// If the pipeline itself fails, falls back to one [`EmbeddingCache::get`]
    /// per id.
    pub async fn batch_get(&self, ids: &[&str]) -> Vec<Option<Vec<f32>>> {
        if ids.is_empty() {
            return Vec::new();
        }

        let mut p = Pipeline::with_capacity(ids.len());
        for id in ids {
            p.get(&embedding_key(&self.ns, id));
        }

        match self.store.exec(p).await {
            Ok(replies) if replies.len() == ids.len() => ids
                .iter()
                .zip(replies)
                .map(|(id, reply)| match reply {
                    Reply::Bytes(data) => decode(id, &data),
                    _ => None,
                })
                .collect(),
            Ok(replies) => {
                warn!(got = replies.len(), want = ids.len(), "cache: short pipeline reply, retrying one by one");
                self.get_each(ids).await
            }
            Err(e) => {
                warn!(error = %e, n = ids.len(), "cache: pipeline read failed, retrying one by one");
                self.get_each(ids).await
            }
        }
    }

    /// Write many vectors in one round trip.
    pub async fn batch_set(&self, items: &[(&str, &[f32])]) -> Result<(), ClusterError> {
        if items.is_empty() {
            return Ok(());
        }
        let mut p = Pipeline::with_capacity(items.len());
        for (id, vector) in items {
            let data = encode_vector(vector)?;
            p.set(&embedding_key(&self.ns, id), data.as_bytes());
        }
        self.store.exec(p).await?;
        Ok(())
    }

    /// Best-effort removal; storage errors are logged and dropped.
    pub async fn delete(&self, id: &str) {
        if let Err(e) = self.store.del(&embedding_key(&self.ns, id)).await {
            warn!(id, error = %e, "cache: delete failed");
        }
    }

    /// Drop the entries for `ids` in one round trip.
    pub async fn invalidate(&self, ids: &[&str]) -> Result<(), ClusterError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut p = Pipeline::with_capacity(ids.len());
        for id in ids {
            p.del(&embedding_key(&self.ns, id));
        }
        self.store.exec(p).await?;
        Ok(())
    }

    /// Not supported: wiping every cached embedding would mean walking the
    /// whole keyspace. Use [`EmbeddingCache::invalidate`] with explicit ids.
    pub async fn clear(&self) -> Result<(), ClusterError> {
        Err(ClusterError::Unsupported(
            "clearing the whole embedding cache; invalidate explicit ids instead",
        ))
    }

    async fn get_each(&self, ids: &[&str]) -> Vec<Option<Vec<f32>>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            out.push(self.get(id).await);
        }
        out
    }
}

fn decode(id: &str, data: &[u8]) -> Option<Vec<f32>> {
    match serde_json::from_slice::<Vec<f32>>(data) {
        Ok(v) if !v.is_empty() => Some(v),
        Ok(_) => {
            warn!(id, "cache: empty cached embedding, treating as miss");
            None
        }
        Err(e) => {
            warn!(id, error = %e, "cache: malformed cached embedding, treating as miss");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::FlakyStore;
    use triage_kv::MemoryStore;

    fn cache_with(store: MemoryStore) -> EmbeddingCache {
        EmbeddingCache::new(Arc::new(store), "t")
    }

    #[tokio::test]
    async fn set_then_get() {
        let cache = cache_with(MemoryStore::new());
        assert_eq!(cache.get("a").await, None);
        assert!(!cache.has("a").await);

        cache.set("a", &[0.5, -1.0]).await.unwrap();
        assert_eq!(cache.get("a").await, Some(vec![0.5, -1.0]));
        assert!(cache.has("a").await);
    }

    #[tokio::test]
    async fn malformed_payload_is_a_miss() {
        let store = MemoryStore::new();
        store.set("t:emb:bad", b"{not json").await.unwrap();
        store.set("t:emb:empty", b"[]").await.unwrap();
        let cache = cache_with(store);

        assert_eq!(cache.get("bad").await, None);
        assert_eq!(cache.get("empty").await, None);
    }

    #[tokio::test]
    async fn batch_get_is_one_round_trip_in_order() {
        let store = MemoryStore::new();
        let cache = cache_with(store.clone());
        cache
            .batch_set(&[("a", &[1.0][..]), ("c", &[3.0][..])])
            .await
            .unwrap();
        store.set("t:emb:b", b"garbage").await.unwrap();

        let before = store.exec_count();
        let got = cache.batch_get(&["c", "missing", "a", "b"]).await;
        assert_eq!(store.exec_count(), before + 1);
        assert_eq!(got, vec![Some(vec![3.0]), None, Some(vec![1.0]), None]);
    }

    #[tokio::test]
    async fn batch_get_falls_back_when_pipeline_fails() {
        let inner = MemoryStore::new();
        inner.set("t:emb:a", b"[1.0,2.0]").await.unwrap();
        let flaky = FlakyStore::new(inner);
        flaky.fail_multi_command_pipelines(true);
        let cache = EmbeddingCache::new(Arc::new(flaky.clone()), "t");

        let got = cache.batch_get(&["a", "b"]).await;
        assert_eq!(got, vec![Some(vec![1.0, 2.0]), None]);
    }

    #[tokio::test]
    async fn read_errors_degrade_but_write_errors_surface() {
        let flaky = FlakyStore::new(MemoryStore::new());
        flaky.fail_all(true);
        let cache = EmbeddingCache::new(Arc::new(flaky.clone()), "t");

        assert_eq!(cache.get("a").await, None);
        assert!(!cache.has("a").await);
        assert_eq!(cache.batch_get(&["a", "b"]).await, vec![None, None]);
        cache.delete("a").await;

        assert!(cache.set("a", &[1.0]).await.is_err());
        assert!(cache.batch_set(&[("a", &[1.0][..])]).await.is_err());
    }

    #[tokio::test]
    async fn invalidate_and_clear() {
        let cache = cache_with(MemoryStore::new());
        cache.set("a", &[1.0]).await.unwrap();
        cache.set("b", &[2.0]).await.unwrap();

        cache.invalidate(&["a"]).await.unwrap();
        assert_eq!(cache.get("a").await, None);
        assert_eq!(cache.get("b").await, Some(vec![2.0]));

        assert!(matches!(cache.clear().await, Err(ClusterError::Unsupported(_))));
    }
}
