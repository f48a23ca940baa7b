//! Feedback ingestion.

use chrono::{DateTime, Utc};
use clap::Args;
use serde::{Deserialize, Serialize};
use triage_cluster::{FeedbackItem, Source};
use uuid::Uuid;

use super::{Project, load_request, output_result};
use crate::Cli;

/// Add feedback items to the backlog.
///
/// The file holds a list of items (YAML, or JSON with a .json extension):
///
///   - title: Login crash
///     body: App closes after submitting the form
///     source: sentry
///     external_id: EVT-1234
///
/// Missing ids are generated; missing timestamps default to now. Ids that
/// were already ingested are skipped; stored feedback is never overwritten.
#[derive(Args)]
pub struct IngestCommand {
    /// Items file
    file: String,
}

#[derive(Debug, Deserialize)]
struct IngestItem {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    source: Source,
    #[serde(default)]
    external_id: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl IngestItem {
    fn into_item(self, now: DateTime<Utc>) -> anyhow::Result<FeedbackItem> {
        if self.title.trim().is_empty() && self.body.trim().is_empty() {
            anyhow::bail!("feedback item has neither title nor body");
        }
        Ok(FeedbackItem {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            title: self.title,
            body: self.body,
            source: self.source,
            external_id: self.external_id,
            created_at: self.created_at.unwrap_or(now),
            clustered: false,
        })
    }
}

#[derive(Serialize)]
struct IngestResult {
    ingested: usize,
    skipped: usize,
    ids: Vec<String>,
}

impl IngestCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let raw: Vec<IngestItem> = load_request(&self.file)?;
        let now = Utc::now();
        let items = raw
            .into_iter()
            .map(|r| r.into_item(now))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let project = Project::open(cli)?;
        let ids = project.feedback().add_items(&items).await?;

        output_result(
            cli,
            &IngestResult {
                ingested: ids.len(),
                skipped: items.len() - ids.len(),
                ids,
            },
        )
    }
}
