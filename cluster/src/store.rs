//! Feedback items as seen by the clustering core.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use triage_kv::{KVStore, Pipeline, Reply};

use crate::error::ClusterError;
use crate::keys::{backlog_key, cluster_index_key, feedback_index_key, feedback_key};
use crate::types::FeedbackItem;

/// Read access to stored feedback.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Load one item. Missing is None; a malformed record is an error.
    async fn get_item(&self, id: &str) -> Result<Option<FeedbackItem>, ClusterError>;

    /// Load many items in input order; missing or malformed records are None.
    async fn get_items(&self, ids: &[&str]) -> Result<Vec<Option<FeedbackItem>>, ClusterError>;

    /// Ids waiting to be clustered.
    async fn list_unclustered_ids(&self) -> Result<Vec<String>, ClusterError>;

    /// Every known cluster id.
    async fn list_cluster_ids(&self) -> Result<Vec<String>, ClusterError>;
}

/// [`FeedbackStore`] over a [`KVStore`], plus ingestion.
#[derive(Clone)]
pub struct KVFeedbackStore {
    store: Arc<dyn KVStore>,
    ns: String,
}

impl KVFeedbackStore {
    pub fn new(store: Arc<dyn KVStore>, ns: impl Into<String>) -> Self {
        Self {
            store,
            ns: ns.into(),
        }
    }

    /// Store one item and queue it for clustering. False if the id was
    /// already ingested.
    pub async fn add_item(&self, item: &FeedbackItem) -> Result<bool, ClusterError> {
        Ok(!self.add_items(std::slice::from_ref(item)).await?.is_empty())
    }

    /// Store new items and queue them for clustering; returns the ids stored.
    ///
    /// Stored records are never overwritten: ids that already exist, and
    /// repeats within `items`, are skipped. One round trip to check, one to
    /// write.
    pub async fn add_items(&self, items: &[FeedbackItem]) -> Result<Vec<String>, ClusterError> {
        let mut seen = HashSet::new();
        let candidates: Vec<&FeedbackItem> =
            items.iter().filter(|it| seen.insert(it.id.as_str())).collect();
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut check = Pipeline::with_capacity(candidates.len());
        for item in &candidates {
            check.exists(&feedback_key(&self.ns, &item.id));
        }
        let replies = self.store.exec(check).await?;
        let mut fresh = Vec::with_capacity(candidates.len());
        for (item, reply) in candidates.into_iter().zip(replies) {
            if reply.into_int()? > 0 {
                debug!(id = %item.id, "store: already ingested, skipping");
            } else {
                fresh.push(item);
            }
        }
        if fresh.is_empty() {
            return Ok(Vec::new());
        }

        let mut p = Pipeline::with_capacity(fresh.len() + 2);
        for item in &fresh {
            let fields = item.to_fields();
            let fields: Vec<(&str, &[u8])> =
                fields.iter().map(|(k, v)| (*k, v.as_bytes())).collect();
            p.hset(&feedback_key(&self.ns, &item.id), &fields);
        }
        let ids: Vec<&str> = fresh.iter().map(|it| it.id.as_str()).collect();
        p.sadd(&feedback_index_key(&self.ns), &ids);
        p.sadd(&backlog_key(&self.ns), &ids);
        self.store.exec(p).await?;

        info!(
            items = ids.len(),
            skipped = items.len() - ids.len(),
            "store: ingested feedback"
        );
        Ok(ids.into_iter().map(String::from).collect())
    }

    /// Every ingested id, clustered or not.
    pub async fn list_all_ids(&self) -> Result<Vec<String>, ClusterError> {
        Ok(self.store.smembers(&feedback_index_key(&self.ns)).await?)
    }

    /// Number of items in the backlog.
    pub async fn backlog_len(&self) -> Result<usize, ClusterError> {
        Ok(self.store.scard(&backlog_key(&self.ns)).await?.max(0) as usize)
    }

    fn decode(&self, id: &str, fields: &BTreeMap<String, Vec<u8>>) -> Result<FeedbackItem, ClusterError> {
        FeedbackItem::from_fields(&feedback_key(&self.ns, id), fields)
    }
}

#[async_trait]
impl FeedbackStore for KVFeedbackStore {
    async fn get_item(&self, id: &str) -> Result<Option<FeedbackItem>, ClusterError> {
        match self.store.hgetall(&feedback_key(&self.ns, id)).await? {
            Some(fields) => self.decode(id, &fields).map(Some),
            None => Ok(None),
        }
    }

    async fn get_items(&self, ids: &[&str]) -> Result<Vec<Option<FeedbackItem>>, ClusterError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut p = Pipeline::with_capacity(ids.len());
        for id in ids {
            p.hgetall(&feedback_key(&self.ns, id));
        }
        let replies = self.store.exec(p).await?;
        Ok(ids
            .iter()
            .zip(replies)
            .map(|(id, reply)| match reply {
                Reply::Hash(fields) => match self.decode(id, &fields) {
                    Ok(item) => Some(item),
                    Err(e) => {
                        warn!(error = %e, "store: skipping malformed feedback record");
                        None
                    }
                },
                _ => None,
            })
            .collect())
    }

    async fn list_unclustered_ids(&self) -> Result<Vec<String>, ClusterError> {
        Ok(self.store.smembers(&backlog_key(&self.ns)).await?)
    }

    async fn list_cluster_ids(&self) -> Result<Vec<String>, ClusterError> {
        Ok(self.store.smembers(&cluster_index_key(&self.ns)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::item;
    use triage_kv::MemoryStore;

    #[tokio::test]
    async fn add_and_read_back() {
        let kv = MemoryStore::new();
        let store = KVFeedbackStore::new(Arc::new(kv.clone()), "t");
        let items = vec![item("b", "Crash", "x"), item("a", "Slow", "y")];

        assert_eq!(store.add_items(&items).await.unwrap(), vec!["b", "a"]);
        assert_eq!(kv.exec_count(), 2);

        assert_eq!(store.get_item("a").await.unwrap(), Some(items[1].clone()));
        assert_eq!(store.get_item("zz").await.unwrap(), None);
        assert_eq!(store.list_unclustered_ids().await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.backlog_len().await.unwrap(), 2);
        assert_eq!(store.list_all_ids().await.unwrap(), vec!["a", "b"]);
        assert!(store.list_cluster_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_items_in_order_with_sentinels() {
        let kv = MemoryStore::new();
        let store = KVFeedbackStore::new(Arc::new(kv.clone()), "t");
        assert!(store.add_item(&item("a", "A", "")).await.unwrap());
        kv.hset("t:fb:broken", &[("id", b"broken".as_slice())])
            .await
            .unwrap();

        let got = store.get_items(&["missing", "a", "broken"]).await.unwrap();
        assert_eq!(got[0], None);
        assert_eq!(got[1].as_ref().map(|i| i.title.as_str()), Some("A"));
        assert_eq!(got[2], None);

        assert!(matches!(
            store.get_item("broken").await,
            Err(ClusterError::InvalidRecord { .. })
        ));
    }

    #[tokio::test]
    async fn existing_ids_are_not_overwritten() {
        let kv = MemoryStore::new();
        let store = KVFeedbackStore::new(Arc::new(kv.clone()), "t");
        store.add_item(&item("a", "Original", "")).await.unwrap();
        kv.hset("t:fb:a", &[("clustered", b"1".as_slice())]).await.unwrap();
        kv.srem("t:fb:unclustered", &["a"]).await.unwrap();

        let added = store
            .add_items(&[item("a", "Replaced", ""), item("b", "B", ""), item("b", "B again", "")])
            .await
            .unwrap();
        assert_eq!(added, vec!["b"]);

        let a = store.get_item("a").await.unwrap().unwrap();
        assert_eq!(a.title, "Original");
        assert!(a.clustered);
        assert_eq!(store.get_item("b").await.unwrap().unwrap().title, "B");
        assert_eq!(store.list_unclustered_ids().await.unwrap(), vec!["b"]);

        let before = kv.exec_count();
        assert!(!store.add_item(&item("a", "Again", "")).await.unwrap());
        assert_eq!(kv.exec_count(), before + 1, "nothing new: existence check only");
    }
}
