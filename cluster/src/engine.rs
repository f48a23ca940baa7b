//! Sequential nearest-centroid clustering.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};
use triage_embed::Embedder;
use triage_vecmath::{calculate_weighted_centroid, cosine_similarity, find_best_cluster};
use uuid::Uuid;

use crate::cache::EmbeddingCache;
use crate::error::ClusterError;
use crate::types::{
    Assignment, BatchOutcome, ClusterData, ClusterDelta, Decision, FeedbackItem, prepare_text,
};

/// Default similarity threshold for joining an existing cluster.
pub const DEFAULT_THRESHOLD: f32 = 0.72;

/// Default number of body characters embedded per item.
pub const DEFAULT_BODY_CHARS: usize = 1500;

/// Resolves embeddings and assigns items to clusters.
pub struct ClusterEngine {
    cache: EmbeddingCache,
    embedder: Arc<dyn Embedder>,
    body_chars: usize,
}

impl ClusterEngine {
    pub fn new(cache: EmbeddingCache, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            cache,
            embedder,
            body_chars: DEFAULT_BODY_CHARS,
        }
    }

    /// Set how many body characters are embedded per item (0 = whole body).
    pub fn with_body_chars(mut self, n: usize) -> Self {
        self.body_chars = n;
        self
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Cluster `items` against `existing` clusters.
    ///
    /// Items are assigned strictly in input order so each one sees the
    /// centroids left by the items before it. Repeated ids are processed once.
    /// Nothing is persisted except newly generated embeddings.
    pub async fn cluster_batch(
        &self,
        items: &[FeedbackItem],
        existing: Vec<ClusterData>,
        threshold: f32,
    ) -> Result<BatchOutcome, ClusterError> {
        let items = dedup_by_id(items);
        let embeddings = self.resolve_embeddings(&items).await?;

        let mut assigner = Assigner::new(existing);
        let results = items
            .iter()
            .zip(&embeddings)
            .map(|(item, emb)| assigner.assign(&item.id, emb, threshold))
            .collect();

        let outcome = BatchOutcome {
            results,
            updated_clusters: assigner.into_deltas(),
        };
        info!(
            items = items.len(),
            touched = outcome.updated_clusters.len(),
            created = outcome.updated_clusters.iter().filter(|d| d.is_new).count(),
            "cluster: batch assigned"
        );
        Ok(outcome)
    }

    /// Embedding per item, in order: cache hits are reused, misses are
    /// generated in one provider call and written back before returning.
    pub async fn resolve_embeddings(
        &self,
        items: &[&FeedbackItem],
    ) -> Result<Vec<Vec<f32>>, ClusterError> {
        let ids: Vec<&str> = items.iter().map(|it| it.id.as_str()).collect();
        let cached = self.cache.batch_get(&ids).await;

        let missing: Vec<usize> = cached
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_none())
            .map(|(i, _)| i)
            .collect();
        debug!(hits = items.len() - missing.len(), misses = missing.len(), "cluster: cache lookup");

        if missing.is_empty() {
            return Ok(cached.into_iter().flatten().collect());
        }

        let texts: Vec<String> = missing
            .iter()
            .map(|&i| prepare_text(items[i], self.body_chars))
            .collect();
        let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        let generated = self.embedder.embed_batch(&refs).await?;
        if generated.len() != missing.len() {
            return Err(ClusterError::EmbeddingCount {
                got: generated.len(),
                want: missing.len(),
            });
        }

        let writes: Vec<(&str, &[f32])> = missing
            .iter()
            .zip(&generated)
            .map(|(&i, v)| (ids[i], v.as_slice()))
            .collect();
        self.cache.batch_set(&writes).await?;

        let mut out = cached;
        for (i, v) in missing.into_iter().zip(generated) {
            out[i] = Some(v);
        }
        Ok(out.into_iter().flatten().collect())
    }
}

fn dedup_by_id(items: &[FeedbackItem]) -> Vec<&FeedbackItem> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|it| {
            let first = seen.insert(it.id.as_str());
            if !first {
                debug!(id = %it.id, "cluster: skipping repeated item");
            }
            first
        })
        .collect()
}

/// In-memory assignment state for one run.
///
/// Holds every known cluster (pre-existing first, then the ones created
/// during the run), which cluster owns each member id, and which clusters
/// were touched. An id never gets a second owner.
pub struct Assigner {
    clusters: Vec<ClusterData>,
    existing: usize,
    previous_counts: Vec<usize>,
    owners: HashMap<String, usize>,
    touched: Vec<usize>,
}

impl Assigner {
    pub fn new(existing: Vec<ClusterData>) -> Self {
        let previous_counts = existing.iter().map(|c| c.count()).collect();
        let owners = existing
            .iter()
            .enumerate()
            .flat_map(|(i, c)| c.members.iter().map(move |m| (m.clone(), i)))
            .collect();
        Self {
            existing: existing.len(),
            clusters: existing,
            previous_counts,
            owners,
            touched: Vec::new(),
        }
    }

    /// Assign one item and update the chosen cluster's centroid.
    ///
    /// An item that already belongs to a cluster stays there untouched,
    /// even if another centroid is now closer.
    pub fn assign(&mut self, item_id: &str, embedding: &[f32], threshold: f32) -> Assignment {
        if let Some(&idx) = self.owners.get(item_id) {
            let cluster = &self.clusters[idx];
            debug!(item = item_id, cluster = %cluster.id, "cluster: already a member");
            return Assignment {
                item_id: item_id.to_string(),
                cluster_id: cluster.id.clone(),
                similarity: cosine_similarity(embedding, &cluster.centroid),
                is_new_cluster: false,
                decision: self.decision(idx),
            };
        }

        let best = find_best_cluster(embedding, &self.clusters);

        if let Some(idx) = best.index
            && best.similarity >= threshold
        {
            let decision = self.decision(idx);
            let cluster = &mut self.clusters[idx];
            cluster.centroid =
                calculate_weighted_centroid(&cluster.centroid, cluster.count(), embedding);
            cluster.members.push(item_id.to_string());
            debug!(item = item_id, cluster = %cluster.id, similarity = best.similarity, ?decision, "cluster: joined");
            let assignment = Assignment {
                item_id: item_id.to_string(),
                cluster_id: cluster.id.clone(),
                similarity: best.similarity,
                is_new_cluster: false,
                decision,
            };
            self.owners.insert(item_id.to_string(), idx);
            self.touch(idx);
            return assignment;
        }

        let id = Uuid::new_v4().to_string();
        debug!(item = item_id, cluster = %id, best = best.similarity, "cluster: created");
        self.clusters.push(ClusterData {
            id: id.clone(),
            members: vec![item_id.to_string()],
            centroid: embedding.to_vec(),
        });
        self.previous_counts.push(0);
        self.owners.insert(item_id.to_string(), self.clusters.len() - 1);
        self.touch(self.clusters.len() - 1);

        Assignment {
            item_id: item_id.to_string(),
            cluster_id: id,
            similarity: 0.0,
            is_new_cluster: true,
            decision: Decision::CreatedNew,
        }
    }

    /// Final state of every touched cluster, in first-touch order.
    pub fn into_deltas(self) -> Vec<ClusterDelta> {
        let mut slots: Vec<Option<ClusterData>> = self.clusters.into_iter().map(Some).collect();
        self.touched
            .into_iter()
            .filter_map(|i| {
                slots[i].take().map(|cluster| ClusterDelta {
                    cluster,
                    is_new: i >= self.existing,
                    previous_count: self.previous_counts[i],
                })
            })
            .collect()
    }

    fn decision(&self, idx: usize) -> Decision {
        if idx < self.existing {
            Decision::JoinedExisting
        } else {
            Decision::JoinedBatch
        }
    }

    fn touch(&mut self, idx: usize) {
        if !self.touched.contains(&idx) {
            self.touched.push(idx);
        }
    }
}
