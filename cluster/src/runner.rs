//! One clustering pass over the unclustered backlog.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use triage_summarize::{Summarizer, Summary};

use crate::engine::{ClusterEngine, DEFAULT_THRESHOLD};
use crate::error::ClusterError;
use crate::jobs::JobLog;
use crate::persist::ClusterPersistence;
use crate::store::FeedbackStore;
use crate::summary::{SummaryOptions, generate_cluster_summary, should_regenerate};
use crate::types::{Assignment, ClusterData, ClusterDelta, ClusterUpdate, FeedbackItem};

/// Members handed to the summarizer per cluster, most recent joins first.
pub const DEFAULT_MAX_SUMMARY_ITEMS: usize = 50;

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Minimum cosine similarity to join an existing cluster.
    pub threshold: f32,
    /// Regenerate every touched cluster's summary regardless of growth.
    pub force_summary: bool,
    /// Cap on members sent to the summarizer; 0 sends them all.
    pub max_summary_items: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            force_summary: false,
            max_summary_items: DEFAULT_MAX_SUMMARY_ITEMS,
        }
    }
}

/// What one run did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub items_clustered: usize,
    pub new_clusters: usize,
    pub updated_clusters: usize,
    pub summaries_regenerated: usize,
    /// Backlog ids with no stored record; retired without clustering.
    pub stale_ids: usize,
    /// Backlog ids whose record is already in a cluster; retired as is.
    #[serde(default)]
    pub already_clustered: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignments: Vec<Assignment>,
}

/// Drives backlog → engine → summaries → persistence.
///
/// Assumes no other run on the same namespace is in flight.
pub struct Runner {
    feedback: Arc<dyn FeedbackStore>,
    engine: ClusterEngine,
    persistence: ClusterPersistence,
    summarizer: Arc<dyn Summarizer>,
    config: RunnerConfig,
    jobs: Option<JobLog>,
}

impl Runner {
    pub fn new(
        feedback: Arc<dyn FeedbackStore>,
        engine: ClusterEngine,
        persistence: ClusterPersistence,
        summarizer: Arc<dyn Summarizer>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            feedback,
            engine,
            persistence,
            summarizer,
            config,
            jobs: None,
        }
    }

    /// Record every run in `jobs`.
    pub fn with_job_log(mut self, jobs: JobLog) -> Self {
        self.jobs = Some(jobs);
        self
    }

    /// Cluster everything on the backlog.
    ///
    /// The backlog is only touched after the cluster commit succeeds, so a
    /// failure anywhere earlier leaves every item queued for the next run.
    /// With a job log, the run is recorded whether or not it succeeds.
    pub async fn run(&self) -> Result<RunStats, ClusterError> {
        let Some(jobs) = &self.jobs else {
            return self.run_pass().await;
        };
        let job = jobs.start().await?;
        let outcome = self.run_pass().await;
        if let Err(e) = jobs.finish(job, &outcome).await {
            warn!(error = %e, "runner: could not record job outcome");
        }
        outcome
    }

    async fn run_pass(&self) -> Result<RunStats, ClusterError> {
        let ids = self.feedback.list_unclustered_ids().await?;
        if ids.is_empty() {
            info!("runner: backlog empty");
            return Ok(RunStats::default());
        }

        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let loaded = self.feedback.get_items(&id_refs).await?;
        let mut stale = Vec::new();
        let mut settled = Vec::new();
        let mut items = Vec::with_capacity(loaded.len());
        for (id, item) in ids.iter().zip(loaded) {
            match item {
                Some(item) if item.clustered => {
                    warn!(id = %id, "runner: backlog id already clustered, retiring");
                    settled.push(id.as_str());
                }
                Some(item) => items.push(item),
                None => {
                    warn!(id = %id, "runner: backlog id has no record, retiring");
                    stale.push(id.as_str());
                }
            }
        }
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let stored = self.persistence.load_clusters().await?;
        let existing_summaries: HashMap<String, Summary> = stored
            .iter()
            .map(|c| (c.record.id.clone(), c.record.summary_fields()))
            .collect();
        let existing = stored.iter().map(|c| c.to_data()).collect();

        let outcome = self
            .engine
            .cluster_batch(&items, existing, self.config.threshold)
            .await?;

        let members = self.load_members_to_summarize(&items, &outcome.updated_clusters).await?;

        let mut stats = RunStats {
            items_clustered: outcome.results.len(),
            stale_ids: stale.len(),
            already_clustered: settled.len(),
            ..Default::default()
        };
        let mut updates: Vec<ClusterUpdate> = Vec::with_capacity(outcome.updated_clusters.len());
        for delta in outcome.updated_clusters {
            let opts = SummaryOptions {
                existing: existing_summaries.get(&delta.cluster.id).cloned(),
                old_count: delta.previous_count,
                new_count: delta.cluster.count(),
                force: self.config.force_summary,
            };
            let cluster_items: Vec<FeedbackItem> = self
                .summary_members(&delta.cluster)
                .iter()
                .filter_map(|m| members.get(m).cloned())
                .collect();
            let out = generate_cluster_summary(self.summarizer.as_ref(), &cluster_items, &opts).await?;

            if delta.is_new {
                stats.new_clusters += 1;
            } else {
                stats.updated_clusters += 1;
            }
            let summary = if out.regenerated {
                stats.summaries_regenerated += 1;
                Some(out.summary)
            } else {
                None
            };
            updates.push(delta.into_update(summary));
        }

        self.persistence.commit_cluster_updates(&updates).await?;

        let mut retire: Vec<&str> = outcome.results.iter().map(|a| a.item_id.as_str()).collect();
        retire.extend(stale);
        retire.extend(settled);
        self.persistence.remove_from_backlog(&retire).await?;

        stats.assignments = outcome.results;
        info!(
            items = stats.items_clustered,
            new = stats.new_clusters,
            updated = stats.updated_clusters,
            summaries = stats.summaries_regenerated,
            stale = stats.stale_ids,
            already_clustered = stats.already_clustered,
            "runner: run complete"
        );
        Ok(stats)
    }

    /// Items of every cluster whose summary will be regenerated, keyed by id.
    /// Items from this run are reused; the rest are fetched in one round trip.
    async fn load_members_to_summarize(
        &self,
        run_items: &[FeedbackItem],
        deltas: &[ClusterDelta],
    ) -> Result<HashMap<String, FeedbackItem>, ClusterError> {
        let mut known: HashMap<String, FeedbackItem> = run_items
            .iter()
            .map(|it| (it.id.clone(), it.clone()))
            .collect();

        let mut wanted = HashSet::new();
        for d in deltas {
            if should_regenerate(d.previous_count, d.cluster.count(), self.config.force_summary) {
                wanted.extend(
                    self.summary_members(&d.cluster)
                        .iter()
                        .filter(|m| !known.contains_key(*m))
                        .map(String::as_str),
                );
            }
        }
        if wanted.is_empty() {
            return Ok(known);
        }

        let mut wanted: Vec<&str> = wanted.into_iter().collect();
        wanted.sort_unstable();
        let fetched = self.feedback.get_items(&wanted).await?;
        for item in fetched.into_iter().flatten() {
            known.insert(item.id.clone(), item);
        }
        Ok(known)
    }

    /// The members a summary is built from: the latest joins, up to the cap.
    fn summary_members<'a>(&self, cluster: &'a ClusterData) -> &'a [String] {
        let cap = self.config.max_summary_items;
        let m = &cluster.members;
        if cap == 0 || m.len() <= cap {
            m
        } else {
            &m[m.len() - cap..]
        }
    }
}
