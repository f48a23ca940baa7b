//! Shared fakes and end-to-end scenarios.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use triage_embed::{EmbedError, Embedder};
use triage_kv::{KVError, KVResult, KVStore, MemoryStore, Pipeline, Reply};
use triage_summarize::{SummarizeError, Summarizer, Summary, SummaryItem};

use crate::cache::EmbeddingCache;
use crate::engine::ClusterEngine;
use crate::error::ClusterError;
use crate::jobs::{JobLog, JobStatus};
use crate::persist::ClusterPersistence;
use crate::runner::{Runner, RunnerConfig};
use crate::store::{FeedbackStore, KVFeedbackStore};
use crate::types::{ClusterUpdate, Decision, FeedbackItem, Source};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Wraps a [`MemoryStore`] and fails pipelines on demand.
#[derive(Clone)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    fail_all: Arc<AtomicBool>,
    fail_multi: Arc<AtomicBool>,
}

impl FlakyStore {
    pub(crate) fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_all: Arc::new(AtomicBool::new(false)),
            fail_multi: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn fail_all(&self, on: bool) {
        self.fail_all.store(on, Ordering::SeqCst);
    }

    /// Fail only pipelines with more than one command.
    pub(crate) fn fail_multi_command_pipelines(&self, on: bool) {
        self.fail_multi.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl KVStore for FlakyStore {
    async fn exec(&self, pipeline: Pipeline) -> KVResult<Vec<Reply>> {
        if self.fail_all.load(Ordering::SeqCst)
            || (pipeline.len() > 1 && self.fail_multi.load(Ordering::SeqCst))
        {
            return Err(KVError::Storage("injected failure".into()));
        }
        self.inner.exec(pipeline).await
    }
}

/// Embeds by title: titles listed in `vectors` get that vector, anything else
/// gets `[0, 0, 1]`. Records every batch it is asked for.
#[derive(Default)]
pub(crate) struct CountingEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    batches: Mutex<Vec<usize>>,
}

impl CountingEmbedder {
    pub(crate) fn with(mut self, title: &str, v: Vec<f32>) -> Self {
        self.vectors.insert(title.to_string(), v);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub(crate) fn texts_embedded(&self) -> usize {
        self.batches.lock().unwrap().iter().sum()
    }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Err(EmbedError::EmptyInput);
        }
        self.batches.lock().unwrap().push(texts.len());
        Ok(texts
            .iter()
            .map(|t| {
                let title = t.split("\n\n").next().unwrap_or_default();
                self.vectors
                    .get(title)
                    .cloned()
                    .unwrap_or_else(|| vec![0.0, 0.0, 1.0])
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        3
    }
}

/// Summarizes as "first title" and counts calls.
#[derive(Default)]
pub(crate) struct CountingSummarizer {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingSummarizer {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for CountingSummarizer {
    async fn summarize(&self, items: &[SummaryItem]) -> Result<Summary, SummarizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SummarizeError::Api("injected failure".into()));
        }
        let first = items.first().ok_or(SummarizeError::EmptyInput)?;
        Ok(Summary {
            title: first.title.clone(),
            summary: format!("{} reports", items.len()),
            issue_title: first.title.clone(),
            issue_description: String::new(),
            repo_url: None,
        })
    }
}

fn epoch() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
        .map(|t| t.with_timezone(&Utc))
        .unwrap()
}

/// Feedback item with a fixed timestamp.
pub(crate) fn item(id: &str, title: &str, body: &str) -> FeedbackItem {
    FeedbackItem {
        id: id.into(),
        title: title.into(),
        body: body.into(),
        source: Source::Manual,
        external_id: None,
        created_at: epoch(),
        clustered: false,
    }
}

fn item_at(id: &str, title: &str, minutes: i64) -> FeedbackItem {
    FeedbackItem {
        created_at: epoch() + Duration::minutes(minutes),
        ..item(id, title, "")
    }
}

// ---------------------------------------------------------------------------
// Engine + cache
// ---------------------------------------------------------------------------

fn engine(store: &MemoryStore, embedder: Arc<CountingEmbedder>) -> ClusterEngine {
    ClusterEngine::new(EmbeddingCache::new(Arc::new(store.clone()), "t"), embedder)
}

#[tokio::test]
async fn all_cache_hits_skip_the_provider() {
    let store = MemoryStore::new();
    let embedder = Arc::new(CountingEmbedder::default());
    let eng = engine(&store, embedder.clone());
    eng.cache()
        .batch_set(&[("a", &[1.0, 0.0, 0.0][..]), ("b", &[0.0, 1.0, 0.0][..])])
        .await
        .unwrap();

    let out = eng
        .cluster_batch(&[item("a", "A", ""), item("b", "B", "")], Vec::new(), 0.72)
        .await
        .unwrap();

    assert_eq!(embedder.calls(), 0);
    assert_eq!(out.results.len(), 2);
    assert_eq!(out.updated_clusters.len(), 2);
}

#[tokio::test]
async fn one_cached_one_uncached_is_one_provider_call() {
    let store = MemoryStore::new();
    let embedder = Arc::new(CountingEmbedder::default().with("B", vec![0.0, 1.0, 0.0]));
    let eng = engine(&store, embedder.clone());
    eng.cache().set("a", &[1.0, 0.0, 0.0]).await.unwrap();

    eng.cluster_batch(&[item("a", "A", ""), item("b", "B", "")], Vec::new(), 0.72)
        .await
        .unwrap();

    assert_eq!(embedder.calls(), 1);
    assert_eq!(embedder.texts_embedded(), 1);
    assert_eq!(eng.cache().get("b").await, Some(vec![0.0, 1.0, 0.0]), "written back");

    eng.cluster_batch(&[item("a", "A", ""), item("b", "B", "")], Vec::new(), 0.72)
        .await
        .unwrap();
    assert_eq!(embedder.calls(), 1, "second pass is all hits");
}

#[tokio::test]
async fn misses_are_embedded_in_one_batch() {
    let store = MemoryStore::new();
    let embedder = Arc::new(CountingEmbedder::default());
    let eng = engine(&store, embedder.clone());
    let items: Vec<FeedbackItem> = (0..7).map(|i| item(&format!("f{i}"), "x", "")).collect();

    eng.cluster_batch(&items, Vec::new(), 0.72).await.unwrap();
    assert_eq!(embedder.calls(), 1);
    assert_eq!(embedder.texts_embedded(), 7);
}

#[tokio::test]
async fn batch_groups_similar_items_in_order() {
    let store = MemoryStore::new();
    let embedder = Arc::new(
        CountingEmbedder::default()
            .with("login crash", vec![1.0, 0.0, 0.0])
            .with("crash at login", vec![0.95, 0.1, 0.0])
            .with("dark mode", vec![0.0, 1.0, 0.0]),
    );
    let eng = engine(&store, embedder);
    let items = vec![
        item("a", "login crash", ""),
        item("b", "dark mode", ""),
        item("c", "crash at login", ""),
        item("a", "login crash", ""),
    ];

    let out = eng.cluster_batch(&items, Vec::new(), 0.72).await.unwrap();

    assert_eq!(out.results.len(), 3, "repeated id processed once");
    assert_eq!(out.results[0].decision, Decision::CreatedNew);
    assert_eq!(out.results[1].decision, Decision::CreatedNew);
    assert_eq!(out.results[2].decision, Decision::JoinedBatch);
    assert_eq!(out.results[2].cluster_id, out.results[0].cluster_id);
    assert_eq!(out.updated_clusters.len(), 2);
    assert_eq!(out.updated_clusters[0].cluster.members, vec!["a", "c"]);
}

#[tokio::test]
async fn provider_count_mismatch_is_an_error() {
    struct Short;

    #[async_trait]
    impl Embedder for Short {
        async fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Ok(vec![vec![1.0]])
        }

        fn dimension(&self) -> usize {
            1
        }
    }

    let store = MemoryStore::new();
    let eng = ClusterEngine::new(EmbeddingCache::new(Arc::new(store), "t"), Arc::new(Short));
    let err = eng
        .cluster_batch(&[item("a", "A", ""), item("b", "B", "")], Vec::new(), 0.72)
        .await
        .unwrap_err();
    assert!(matches!(err, ClusterError::EmbeddingCount { got: 1, want: 2 }));
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

struct Harness {
    kv: MemoryStore,
    feedback: KVFeedbackStore,
    persistence: ClusterPersistence,
    embedder: Arc<CountingEmbedder>,
    summarizer: Arc<CountingSummarizer>,
}

impl Harness {
    fn new() -> Self {
        let kv = MemoryStore::new();
        let store: Arc<dyn KVStore> = Arc::new(kv.clone());
        Self {
            feedback: KVFeedbackStore::new(store.clone(), "t"),
            persistence: ClusterPersistence::new(store, "t"),
            kv,
            embedder: Arc::new(
                CountingEmbedder::default()
                    .with("login crash", vec![1.0, 0.0, 0.0])
                    .with("crash at login", vec![0.95, 0.1, 0.0])
                    .with("login fails", vec![0.9, 0.15, 0.0])
                    .with("dark mode", vec![0.0, 1.0, 0.0]),
            ),
            summarizer: Arc::new(CountingSummarizer::default()),
        }
    }

    fn runner(&self, force_summary: bool) -> Runner {
        let store: Arc<dyn KVStore> = Arc::new(self.kv.clone());
        Runner::new(
            Arc::new(self.feedback.clone()),
            ClusterEngine::new(EmbeddingCache::new(store, "t"), self.embedder.clone()),
            self.persistence.clone(),
            self.summarizer.clone(),
            RunnerConfig {
                force_summary,
                ..Default::default()
            },
        )
    }
}

#[tokio::test]
async fn runner_clusters_backlog_and_retires_it() {
    let h = Harness::new();
    h.feedback
        .add_items(&[
            item_at("b", "dark mode", 1),
            item_at("a", "login crash", 0),
            item_at("c", "crash at login", 2),
        ])
        .await
        .unwrap();

    let stats = h.runner(false).run().await.unwrap();
    assert_eq!(stats.items_clustered, 3);
    assert_eq!(stats.new_clusters, 2);
    assert_eq!(stats.summaries_regenerated, 2);
    assert_eq!(stats.assignments[0].item_id, "a", "oldest first");
    assert_eq!(h.summarizer.calls(), 2);

    assert_eq!(h.feedback.backlog_len().await.unwrap(), 0);
    let clusters = h.persistence.load_clusters().await.unwrap();
    assert_eq!(clusters.len(), 2);
    let login = clusters
        .iter()
        .find(|c| c.members.contains(&"a".to_string()))
        .unwrap();
    assert_eq!(login.members, vec!["a", "c"]);
    assert_eq!(login.record.title, "login crash");

    let again = h.runner(false).run().await.unwrap();
    assert_eq!(again.items_clustered, 0);
}

#[tokio::test]
async fn runner_applies_growth_policy() {
    let h = Harness::new();
    h.feedback.add_item(&item_at("a", "login crash", 0)).await.unwrap();
    h.feedback.add_item(&item_at("c", "crash at login", 1)).await.unwrap();
    h.runner(false).run().await.unwrap();
    assert_eq!(h.summarizer.calls(), 1);

    // 2 -> 3 members is exactly 50% growth: summary kept.
    h.feedback.add_item(&item_at("d", "login fails", 2)).await.unwrap();
    let stats = h.runner(false).run().await.unwrap();
    assert_eq!(stats.updated_clusters, 1);
    assert_eq!(stats.summaries_regenerated, 0);
    assert_eq!(h.summarizer.calls(), 1);
    let c = &h.persistence.load_clusters().await.unwrap()[0];
    assert_eq!(c.members, vec!["a", "c", "d"]);
    assert_eq!(c.record.summary, "2 reports");

    // Forced regeneration fetches the older members too.
    h.feedback.add_item(&item_at("e", "login crash", 3)).await.unwrap();
    let stats = h.runner(true).run().await.unwrap();
    assert_eq!(stats.summaries_regenerated, 1);
    let c = &h.persistence.load_clusters().await.unwrap()[0];
    assert_eq!(c.record.summary, "4 reports");
}

#[tokio::test]
async fn runner_retires_stale_ids() {
    let h = Harness::new();
    h.feedback.add_item(&item("a", "login crash", "")).await.unwrap();
    h.kv.sadd("t:fb:unclustered", &["ghost"]).await.unwrap();

    let stats = h.runner(false).run().await.unwrap();
    assert_eq!(stats.items_clustered, 1);
    assert_eq!(stats.stale_ids, 1);
    assert_eq!(h.feedback.backlog_len().await.unwrap(), 0);
}

#[tokio::test]
async fn failed_summary_leaves_backlog_untouched() {
    let kv = MemoryStore::new();
    let store: Arc<dyn KVStore> = Arc::new(kv.clone());
    let feedback = KVFeedbackStore::new(store.clone(), "t");
    feedback.add_item(&item("a", "login crash", "")).await.unwrap();

    let runner = Runner::new(
        Arc::new(feedback.clone()),
        ClusterEngine::new(
            EmbeddingCache::new(store.clone(), "t"),
            Arc::new(CountingEmbedder::default()),
        ),
        ClusterPersistence::new(store.clone(), "t"),
        Arc::new(CountingSummarizer::failing()),
        RunnerConfig::default(),
    );

    assert!(matches!(runner.run().await, Err(ClusterError::Summarize(_))));
    assert_eq!(feedback.list_unclustered_ids().await.unwrap(), vec!["a"]);
    assert!(feedback.list_cluster_ids().await.unwrap().is_empty());
}

#[tokio::test]
async fn reset_requeues_members_and_keeps_embeddings() {
    let h = Harness::new();
    h.feedback
        .add_items(&[item_at("a", "login crash", 0), item_at("b", "dark mode", 1)])
        .await
        .unwrap();
    h.runner(false).run().await.unwrap();
    assert_eq!(h.embedder.calls(), 1);

    assert_eq!(h.persistence.reset().await.unwrap(), 2);
    assert_eq!(h.feedback.backlog_len().await.unwrap(), 2);

    let stats = h.runner(false).run().await.unwrap();
    assert_eq!(stats.new_clusters, 2);
    assert_eq!(h.embedder.calls(), 1, "embeddings survive a cluster reset");
}

#[tokio::test]
async fn reingested_member_stays_in_its_cluster() {
    let h = Harness::new();
    h.feedback
        .add_items(&[item("a", "login crash", ""), item("m", "m", ""), item("y", "y", "")])
        .await
        .unwrap();
    let update = |id: &str, members: &[&str], centroid: Vec<f32>| ClusterUpdate {
        cluster_id: id.into(),
        members: members.iter().map(|m| m.to_string()).collect(),
        centroid,
        is_new: true,
        summary: None,
    };
    h.persistence
        .commit_cluster_updates(&[
            update("X", &["a", "m"], vec![0.7, 0.7, 0.0]),
            update("Y", &["y"], vec![1.0, 0.05, 0.0]),
        ])
        .await
        .unwrap();
    h.persistence.remove_from_backlog(&["a", "m", "y"]).await.unwrap();

    // Y is now closer to a than X is.
    assert!(!h.feedback.add_item(&item("a", "login crash", "again")).await.unwrap());
    assert_eq!(h.feedback.backlog_len().await.unwrap(), 0);

    // Even if the id reaches the backlog some other way, it is not re-clustered.
    h.kv.sadd("t:fb:unclustered", &["a"]).await.unwrap();
    let stats = h.runner(false).run().await.unwrap();
    assert_eq!(stats.items_clustered, 0);
    assert_eq!(stats.already_clustered, 1);
    assert_eq!(h.feedback.backlog_len().await.unwrap(), 0);

    let members = h.persistence.get_cluster_member_ids(&["X", "Y"]).await.unwrap();
    assert_eq!(members[0], vec!["a", "m"]);
    assert_eq!(members[1], vec!["y"]);
    assert_eq!(h.summarizer.calls(), 0);
}

/// Records how many items each summary was built from.
#[derive(Default)]
struct SizeRecorder(Mutex<Vec<usize>>);

#[async_trait]
impl Summarizer for SizeRecorder {
    async fn summarize(&self, items: &[SummaryItem]) -> Result<Summary, SummarizeError> {
        self.0.lock().unwrap().push(items.len());
        Ok(Summary {
            title: items.last().map(|i| i.title.clone()).unwrap_or_default(),
            ..Default::default()
        })
    }
}

#[tokio::test]
async fn summaries_use_the_latest_members_up_to_the_cap() {
    let kv = MemoryStore::new();
    let store: Arc<dyn KVStore> = Arc::new(kv.clone());
    let feedback = KVFeedbackStore::new(store.clone(), "t");
    let items: Vec<FeedbackItem> = (0..5)
        .map(|i| FeedbackItem {
            title: format!("login crash {i}"),
            ..item_at(&format!("f{i}"), "", i)
        })
        .collect();
    feedback.add_items(&items).await.unwrap();

    let recorder = Arc::new(SizeRecorder::default());
    let runner = Runner::new(
        Arc::new(feedback),
        ClusterEngine::new(
            EmbeddingCache::new(store.clone(), "t"),
            Arc::new(CountingEmbedder::default()),
        ),
        ClusterPersistence::new(store.clone(), "t"),
        recorder.clone(),
        RunnerConfig {
            max_summary_items: 3,
            ..Default::default()
        },
    );
    let stats = runner.run().await.unwrap();

    assert_eq!(stats.new_clusters, 1);
    assert_eq!(*recorder.0.lock().unwrap(), vec![3]);
    let c = &ClusterPersistence::new(store, "t").load_clusters().await.unwrap()[0];
    assert_eq!(c.members.len(), 5);
    assert_eq!(c.record.title, "login crash 4");
}

#[tokio::test]
async fn runs_are_recorded_in_the_job_log() {
    let h = Harness::new();
    let jobs = JobLog::new(Arc::new(h.kv.clone()), "t");
    h.feedback.add_item(&item("a", "login crash", "")).await.unwrap();

    let stats = h.runner(false).with_job_log(jobs.clone()).run().await.unwrap();
    let listed = jobs.list(None).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, JobStatus::Succeeded);
    let recorded = listed[0].stats.as_ref().unwrap();
    assert_eq!(recorded.items_clustered, stats.items_clustered);
    assert!(recorded.assignments.is_empty());

    let flaky = FlakyStore::new(h.kv.clone());
    h.feedback.add_item(&item("b", "dark mode", "")).await.unwrap();
    let failing = Runner::new(
        Arc::new(h.feedback.clone()),
        ClusterEngine::new(EmbeddingCache::new(Arc::new(h.kv.clone()), "t"), h.embedder.clone()),
        ClusterPersistence::new(Arc::new(flaky.clone()), "t"),
        h.summarizer.clone(),
        RunnerConfig::default(),
    )
    .with_job_log(jobs.clone());
    flaky.fail_all(true);
    assert!(failing.run().await.is_err());

    let listed = jobs.list(None).await.unwrap();
    assert_eq!(listed.len(), 2);
    let failed = listed.iter().find(|j| j.status == JobStatus::Failed).unwrap();
    assert!(failed.error.as_deref().unwrap_or_default().contains("injected"));
}
