//! Batched cluster persistence.
//!
//! Every operation here costs a fixed number of round trips no matter how many
//! clusters or items it touches: writes are queued into one [`Pipeline`] and
//! executed once; bulk reads do the same and return results in input order.
//!
//! Pipelines are not transactions. A failed commit may leave some commands
//! applied and must be treated as unknown partial state by the caller.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use triage_kv::{KVStore, Pipeline, Reply};
use triage_summarize::Summary;

use crate::error::ClusterError;
use crate::keys::{backlog_key, cluster_index_key, cluster_key, feedback_key, members_key};
use crate::types::{
    ClusterData, ClusterRecord, ClusterUpdate, DEFAULT_TITLE, STATUS_NEW, encode_vector,
};

/// A cluster record together with its membership.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCluster {
    pub record: ClusterRecord,
    pub members: Vec<String>,
}

impl StoredCluster {
    pub fn to_data(&self) -> ClusterData {
        ClusterData {
            id: self.record.id.clone(),
            members: self.members.clone(),
            centroid: self.record.centroid.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ClusterPersistence {
    store: Arc<dyn KVStore>,
    ns: String,
}

impl ClusterPersistence {
    pub fn new(store: Arc<dyn KVStore>, ns: impl Into<String>) -> Self {
        Self {
            store,
            ns: ns.into(),
        }
    }

    /// Write every update in one pipeline.
    ///
    /// New clusters get a full record and are added to the cluster index.
    /// Existing clusters only get their mutable fields patched. In both cases
    /// the membership set is rewritten and each member is flagged clustered.
    pub async fn commit_cluster_updates(&self, updates: &[ClusterUpdate]) -> Result<(), ClusterError> {
        if updates.is_empty() {
            return Ok(());
        }
        if let Some(empty) = updates.iter().find(|u| u.members.is_empty()) {
            return Err(ClusterError::InvalidRecord {
                key: cluster_key(&self.ns, &empty.cluster_id),
                reason: "cluster has no members".into(),
            });
        }

        let now = Utc::now().to_rfc3339();
        let index = cluster_index_key(&self.ns);
        let mut p = Pipeline::new();
        let mut created = 0usize;

        for u in updates {
            let key = cluster_key(&self.ns, &u.cluster_id);
            let centroid = encode_vector(&u.centroid)?;

            let mut fields: Vec<(&str, String)> =
                vec![("updated_at", now.clone()), ("centroid", centroid)];
            if u.is_new {
                created += 1;
                fields.push(("id", u.cluster_id.clone()));
                fields.push(("status", STATUS_NEW.to_string()));
                fields.push(("created_at", now.clone()));
                if u.summary.is_none() {
                    fields.push(("title", DEFAULT_TITLE.to_string()));
                    fields.push(("summary", String::new()));
                }
            }
            if let Some(s) = &u.summary {
                push_summary_fields(&mut fields, s);
            }
            p.hset(&key, &as_bytes(&fields));
            if u.is_new {
                p.sadd(&index, &[u.cluster_id.as_str()]);
            }

            let mkey = members_key(&self.ns, &u.cluster_id);
            let members: Vec<&str> = u.members.iter().map(String::as_str).collect();
            p.del(&mkey);
            p.sadd(&mkey, &members);
            for m in &members {
                p.hset(
                    &feedback_key(&self.ns, m),
                    &[("clustered", b"1".as_slice()), ("cluster_id", u.cluster_id.as_bytes())],
                );
            }
        }

        let commands = p.len();
        self.store.exec(p).await?;
        info!(
            clusters = updates.len(),
            created,
            commands,
            "persist: committed cluster updates"
        );
        Ok(())
    }

    /// Flag items as clustered and take them off the backlog, in one pipeline.
    pub async fn mark_clustered(&self, ids: &[&str]) -> Result<(), ClusterError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut p = Pipeline::with_capacity(ids.len() + 1);
        for id in ids {
            p.hset(&feedback_key(&self.ns, id), &[("clustered", b"1".as_slice())]);
        }
        p.srem(&backlog_key(&self.ns), ids);
        self.store.exec(p).await?;
        Ok(())
    }

    /// Take items off the backlog in one round trip.
    pub async fn remove_from_backlog(&self, ids: &[&str]) -> Result<(), ClusterError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.store.srem(&backlog_key(&self.ns), ids).await?;
        Ok(())
    }

    /// Cluster records for `ids`, in order; None for missing or malformed ones.
    pub async fn get_clusters(&self, ids: &[&str]) -> Result<Vec<Option<ClusterRecord>>, ClusterError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut p = Pipeline::with_capacity(ids.len());
        for id in ids {
            p.hgetall(&cluster_key(&self.ns, id));
        }
        let replies = self.store.exec(p).await?;
        Ok(ids
            .iter()
            .zip(replies)
            .map(|(id, reply)| self.decode_record(id, reply))
            .collect())
    }

    /// Member counts for `ids`, in order; 0 for missing clusters.
    pub async fn get_cluster_counts(&self, ids: &[&str]) -> Result<Vec<usize>, ClusterError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut p = Pipeline::with_capacity(ids.len());
        for id in ids {
            p.scard(&members_key(&self.ns, id));
        }
        let replies = self.store.exec(p).await?;
        Ok(replies
            .into_iter()
            .map(|r| match r {
                Reply::Int(n) if n > 0 => n as usize,
                _ => 0,
            })
            .collect())
    }

    /// Member ids for `ids`, in order; empty for missing clusters.
    pub async fn get_cluster_member_ids(&self, ids: &[&str]) -> Result<Vec<Vec<String>>, ClusterError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut p = Pipeline::with_capacity(ids.len());
        for id in ids {
            p.smembers(&members_key(&self.ns, id));
        }
        let replies = self.store.exec(p).await?;
        Ok(replies.into_iter().map(members_or_empty).collect())
    }

    /// Every indexed cluster with its members.
    ///
    /// Two round trips: the index, then records and memberships together.
    /// Clusters with a missing record, no members or no centroid are skipped.
    pub async fn load_clusters(&self) -> Result<Vec<StoredCluster>, ClusterError> {
        let ids = self.store.smembers(&cluster_index_key(&self.ns)).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut p = Pipeline::with_capacity(ids.len() * 2);
        for id in &ids {
            p.hgetall(&cluster_key(&self.ns, id));
            p.smembers(&members_key(&self.ns, id));
        }
        let mut replies = self.store.exec(p).await?.into_iter();

        let mut out = Vec::with_capacity(ids.len());
        for id in &ids {
            let (Some(record), Some(members)) = (replies.next(), replies.next()) else {
                warn!(id = %id, "persist: short reply while loading clusters");
                break;
            };
            let Some(record) = self.decode_record(id, record) else {
                continue;
            };
            let members = members_or_empty(members);
            if members.is_empty() || record.centroid.is_empty() {
                warn!(id = %id, "persist: skipping empty cluster");
                continue;
            }
            out.push(StoredCluster { record, members });
        }
        Ok(out)
    }

    /// Delete every indexed cluster and put its members back on the backlog.
    ///
    /// Returns the number of clusters removed. Embeddings are left alone.
    pub async fn reset(&self) -> Result<usize, ClusterError> {
        let index = cluster_index_key(&self.ns);
        let ids = self.store.smembers(&index).await?;
        if ids.is_empty() {
            return Ok(0);
        }
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let members = self.get_cluster_member_ids(&refs).await?;

        let backlog = backlog_key(&self.ns);
        let mut p = Pipeline::new();
        for (id, members) in ids.iter().zip(&members) {
            p.del(&cluster_key(&self.ns, id));
            p.del(&members_key(&self.ns, id));
            for m in members {
                p.hdel(&feedback_key(&self.ns, m), &["clustered", "cluster_id"]);
            }
            if !members.is_empty() {
                let refs: Vec<&str> = members.iter().map(String::as_str).collect();
                p.sadd(&backlog, &refs);
            }
        }
        p.del(&index);
        self.store.exec(p).await?;

        info!(clusters = ids.len(), "persist: reset clusters");
        Ok(ids.len())
    }

    fn decode_record(&self, id: &str, reply: Reply) -> Option<ClusterRecord> {
        let Reply::Hash(fields) = reply else {
            return None;
        };
        let key = cluster_key(&self.ns, id);
        match ClusterRecord::from_fields(&key, &fields) {
            Ok(r) => Some(r),
            Err(e) => {
                warn!(error = %e, "persist: skipping malformed cluster record");
                None
            }
        }
    }
}

fn push_summary_fields(fields: &mut Vec<(&str, String)>, s: &Summary) {
    let title = if s.title.trim().is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        s.title.clone()
    };
    fields.push(("title", title));
    fields.push(("summary", s.summary.clone()));
    fields.push(("issue_title", s.issue_title.clone()));
    fields.push(("issue_description", s.issue_description.clone()));
    if let Some(url) = &s.repo_url {
        fields.push(("repo_url", url.clone()));
    }
}

fn as_bytes<'a>(fields: &'a [(&'a str, String)]) -> Vec<(&'a str, &'a [u8])> {
    fields.iter().map(|(k, v)| (*k, v.as_bytes())).collect()
}

fn members_or_empty(reply: Reply) -> Vec<String> {
    match reply {
        Reply::Members(m) => m,
        _ => Vec::new(),
    }
}
