use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use triage_summarize::{Summary, SummaryItem};
use triage_vecmath::HasCentroid;

use crate::error::ClusterError;

// ---------------------------------------------------------------------------
// FeedbackItem
// ---------------------------------------------------------------------------

/// Where a feedback item came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Entered by hand.
    #[default]
    Manual,
    /// Issue tracker / error reporter webhook.
    Sentry,
    /// Crawled from a forum.
    Reddit,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Manual => "manual",
            Source::Sentry => "sentry",
            Source::Reddit => "reddit",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Source::Manual),
            "sentry" => Ok(Source::Sentry),
            "reddit" => Ok(Source::Reddit),
            other => Err(format!("unknown source {other:?}")),
        }
    }
}

/// A single piece of ingested feedback. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set once the item has been committed to a cluster. Never written by
    /// ingestion; decoded from the `clustered`/`cluster_id` flags.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub clustered: bool,
}

impl FeedbackItem {
    /// Hash fields written for this item.
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("id", self.id.clone()),
            ("title", self.title.clone()),
            ("body", self.body.clone()),
            ("source", self.source.as_str().to_string()),
            ("created_at", self.created_at.to_rfc3339()),
        ];
        if let Some(ext) = &self.external_id {
            fields.push(("external_id", ext.clone()));
        }
        fields
    }

    /// Decode a stored hash. `key` is only used in error messages.
    pub fn from_fields(key: &str, fields: &BTreeMap<String, Vec<u8>>) -> Result<Self, ClusterError> {
        let r = FieldReader { key, fields };
        let source = r.required("source")?;
        Ok(Self {
            id: r.required("id")?,
            title: r.optional("title")?.unwrap_or_default(),
            body: r.optional("body")?.unwrap_or_default(),
            source: source.parse().map_err(|e| r.invalid(e))?,
            external_id: r.optional("external_id")?,
            created_at: r.timestamp("created_at")?,
            clustered: r.optional("clustered")?.is_some_and(|v| v == "1")
                || r.optional("cluster_id")?.is_some_and(|v| !v.is_empty()),
        })
    }

    pub fn to_summary_item(&self) -> SummaryItem {
        SummaryItem {
            title: self.title.clone(),
            body: self.body.clone(),
            source: self.source.to_string(),
        }
    }
}

/// Build the text embedded for an item: title and body separated by a blank
/// line, body cut to `body_chars` characters (0 keeps it whole).
pub fn prepare_text(item: &FeedbackItem, body_chars: usize) -> String {
    let title = item.title.trim();
    let mut body = item.body.trim();
    if body_chars > 0 {
        if let Some((idx, _)) = body.char_indices().nth(body_chars) {
            body = &body[..idx];
        }
    }
    match (title.is_empty(), body.is_empty()) {
        (false, false) => format!("{title}\n\n{body}"),
        (false, true) => title.to_string(),
        _ => body.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Clusters
// ---------------------------------------------------------------------------

/// Membership and centroid of one cluster, as the engine sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterData {
    pub id: String,
    /// Member feedback ids, no duplicates.
    pub members: Vec<String>,
    pub centroid: Vec<f32>,
}

impl ClusterData {
    pub fn count(&self) -> usize {
        self.members.len()
    }
}

impl HasCentroid for ClusterData {
    fn id(&self) -> &str {
        &self.id
    }

    fn centroid(&self) -> &[f32] {
        &self.centroid
    }
}

pub const STATUS_NEW: &str = "new";
pub const DEFAULT_TITLE: &str = "Feedback cluster";

/// A persisted cluster record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub centroid: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
}

impl ClusterRecord {
    /// Decode a stored hash. `key` is only used in error messages.
    pub fn from_fields(key: &str, fields: &BTreeMap<String, Vec<u8>>) -> Result<Self, ClusterError> {
        let r = FieldReader { key, fields };
        let centroid = match r.optional("centroid")? {
            Some(s) => decode_vector(&s).map_err(|e| r.invalid(e))?,
            None => Vec::new(),
        };
        Ok(Self {
            id: r.required("id")?,
            title: r.optional("title")?.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            summary: r.optional("summary")?.unwrap_or_default(),
            status: r.optional("status")?.unwrap_or_else(|| STATUS_NEW.to_string()),
            created_at: r.timestamp("created_at")?,
            updated_at: r.timestamp("updated_at")?,
            centroid,
            issue_title: r.optional("issue_title")?,
            issue_description: r.optional("issue_description")?,
            repo_url: r.optional("repo_url")?,
        })
    }

    /// The record's summary fields, as last generated.
    pub fn summary_fields(&self) -> Summary {
        Summary {
            title: self.title.clone(),
            summary: self.summary.clone(),
            issue_title: self.issue_title.clone().unwrap_or_default(),
            issue_description: self.issue_description.clone().unwrap_or_default(),
            repo_url: self.repo_url.clone(),
        }
    }
}

/// One cluster's post-run state, handed to
/// [`crate::ClusterPersistence::commit_cluster_updates`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterUpdate {
    pub cluster_id: String,
    /// Full membership; replaces what is stored.
    pub members: Vec<String>,
    pub centroid: Vec<f32>,
    pub is_new: bool,
    /// Summary fields to write; None leaves stored ones untouched.
    pub summary: Option<Summary>,
}

// ---------------------------------------------------------------------------
// Engine output
// ---------------------------------------------------------------------------

/// Why an item landed in its cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// No cluster passed the threshold; the item seeded a new one.
    CreatedNew,
    /// Joined a cluster that existed before this run.
    JoinedExisting,
    /// Joined a cluster created earlier in the same run.
    JoinedBatch,
}

/// Per-item outcome of [`crate::ClusterEngine::cluster_batch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub item_id: String,
    pub cluster_id: String,
    /// Similarity to the chosen centroid; 0 for a new cluster.
    pub similarity: f32,
    pub is_new_cluster: bool,
    pub decision: Decision,
}

/// A cluster touched during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterDelta {
    pub cluster: ClusterData,
    pub is_new: bool,
    /// Member count before the run (0 for new clusters).
    pub previous_count: usize,
}

impl ClusterDelta {
    pub fn into_update(self, summary: Option<Summary>) -> ClusterUpdate {
        ClusterUpdate {
            cluster_id: self.cluster.id,
            members: self.cluster.members,
            centroid: self.cluster.centroid,
            is_new: self.is_new,
            summary,
        }
    }
}

/// Result of one clustering pass.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// One entry per distinct input item, in input order.
    pub results: Vec<Assignment>,
    /// Every cluster touched, in first-touch order.
    pub updated_clusters: Vec<ClusterDelta>,
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

pub(crate) fn encode_vector(v: &[f32]) -> Result<String, ClusterError> {
    serde_json::to_string(v).map_err(|e| ClusterError::Serialization(e.to_string()))
}

pub(crate) fn decode_vector(s: &str) -> Result<Vec<f32>, String> {
    serde_json::from_str(s).map_err(|e| e.to_string())
}

struct FieldReader<'a> {
    key: &'a str,
    fields: &'a BTreeMap<String, Vec<u8>>,
}

impl FieldReader<'_> {
    fn optional(&self, name: &str) -> Result<Option<String>, ClusterError> {
        match self.fields.get(name) {
            None => Ok(None),
            Some(raw) => String::from_utf8(raw.clone())
                .map(Some)
                .map_err(|_| self.invalid(format!("field {name} is not utf-8"))),
        }
    }

    fn required(&self, name: &str) -> Result<String, ClusterError> {
        self.optional(name)?
            .ok_or_else(|| self.invalid(format!("missing field {name}")))
    }

    fn timestamp(&self, name: &str) -> Result<DateTime<Utc>, ClusterError> {
        let raw = self.required(name)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| self.invalid(format!("field {name}: {e}")))
    }

    fn invalid(&self, reason: impl Into<String>) -> ClusterError {
        ClusterError::InvalidRecord {
            key: self.key.to_string(),
            reason: reason.into(),
        }
    }
}
