//! History of clustering runs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use triage_kv::{KVStore, Pipeline, Reply};
use uuid::Uuid;

use crate::error::ClusterError;
use crate::keys::{job_index_key, job_key};
use crate::runner::RunStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
}

/// One clustering run. A job left `Running` was interrupted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Counters only; per-item assignments are not kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<RunStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Job records stored as JSON under `{ns}:job:{id}`, indexed by `{ns}:jobs`.
#[derive(Clone)]
pub struct JobLog {
    store: Arc<dyn KVStore>,
    ns: String,
}

impl JobLog {
    pub fn new(store: Arc<dyn KVStore>, ns: impl Into<String>) -> Self {
        Self {
            store,
            ns: ns.into(),
        }
    }

    /// Record a new running job.
    pub async fn start(&self) -> Result<JobRecord, ClusterError> {
        let job = JobRecord {
            id: Uuid::new_v4().to_string(),
            status: JobStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            stats: None,
            error: None,
        };
        let mut p = Pipeline::with_capacity(2);
        p.set(&job_key(&self.ns, &job.id), &encode(&job)?);
        p.sadd(&job_index_key(&self.ns), &[job.id.as_str()]);
        self.store.exec(p).await?;
        Ok(job)
    }

    /// Close `job` with the run's outcome.
    pub async fn finish(
        &self,
        mut job: JobRecord,
        outcome: &Result<RunStats, ClusterError>,
    ) -> Result<JobRecord, ClusterError> {
        job.finished_at = Some(Utc::now());
        match outcome {
            Ok(stats) => {
                job.status = JobStatus::Succeeded;
                job.stats = Some(RunStats {
                    assignments: Vec::new(),
                    ..stats.clone()
                });
            }
            Err(e) => {
                job.status = JobStatus::Failed;
                job.error = Some(e.to_string());
            }
        }
        self.store.set(&job_key(&self.ns, &job.id), &encode(&job)?).await?;
        Ok(job)
    }

    /// Jobs newest first. Malformed records are skipped.
    pub async fn list(&self, limit: Option<usize>) -> Result<Vec<JobRecord>, ClusterError> {
        let ids = self.store.smembers(&job_index_key(&self.ns)).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut p = Pipeline::with_capacity(ids.len());
        for id in &ids {
            p.get(&job_key(&self.ns, id));
        }
        let replies = self.store.exec(p).await?;

        let mut jobs: Vec<JobRecord> = ids
            .iter()
            .zip(replies)
            .filter_map(|(id, reply)| {
                let Reply::Bytes(raw) = reply else {
                    return None;
                };
                serde_json::from_slice::<JobRecord>(&raw)
                    .inspect_err(|e| warn!(id = %id, error = %e, "jobs: skipping malformed record"))
                    .ok()
            })
            .collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| a.id.cmp(&b.id)));
        if let Some(n) = limit {
            jobs.truncate(n);
        }
        Ok(jobs)
    }
}

fn encode(job: &JobRecord) -> Result<Vec<u8>, ClusterError> {
    serde_json::to_vec(job).map_err(|e| ClusterError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_kv::MemoryStore;

    fn setup() -> (MemoryStore, JobLog) {
        let kv = MemoryStore::new();
        let log = JobLog::new(Arc::new(kv.clone()), "t");
        (kv, log)
    }

    #[tokio::test]
    async fn start_then_succeed() {
        let (_kv, log) = setup();
        let job = log.start().await.unwrap();
        assert_eq!(log.list(None).await.unwrap()[0].status, JobStatus::Running);

        let stats = RunStats {
            items_clustered: 3,
            new_clusters: 1,
            ..Default::default()
        };
        let done = log.finish(job, &Ok(stats)).await.unwrap();
        assert_eq!(done.status, JobStatus::Succeeded);

        let listed = log.list(None).await.unwrap();
        assert_eq!(listed, vec![done]);
        assert_eq!(listed[0].stats.as_ref().map(|s| s.items_clustered), Some(3));
        assert!(listed[0].finished_at.is_some());
    }

    #[tokio::test]
    async fn failure_keeps_the_error() {
        let (_kv, log) = setup();
        let job = log.start().await.unwrap();
        let outcome = Err(ClusterError::Unsupported("boom"));
        let done = log.finish(job, &outcome).await.unwrap();
        assert_eq!(done.status, JobStatus::Failed);
        assert!(done.error.unwrap().contains("boom"));
        assert!(done.stats.is_none());
    }

    #[tokio::test]
    async fn list_is_newest_first_and_skips_garbage() {
        let (kv, log) = setup();
        let first = log.start().await.unwrap();
        let second = log.start().await.unwrap();
        kv.set("t:job:bad", b"{").await.unwrap();
        kv.sadd("t:jobs", &["bad"]).await.unwrap();

        let listed = log.list(None).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].started_at >= listed[1].started_at);
        let ids: Vec<&str> = listed.iter().map(|j| j.id.as_str()).collect();
        assert!(ids.contains(&first.id.as_str()) && ids.contains(&second.id.as_str()));

        assert_eq!(log.list(Some(1)).await.unwrap().len(), 1);
    }
}
