//! Summary regeneration policy.

use tracing::debug;
use triage_summarize::{Summarizer, Summary, SummaryItem};

use crate::error::ClusterError;
use crate::types::FeedbackItem;

/// Growth ratio above which a summary is considered stale.
pub const REGENERATE_GROWTH: f64 = 0.5;

/// Inputs to [`generate_cluster_summary`].
#[derive(Debug, Clone, Default)]
pub struct SummaryOptions {
    /// Summary currently stored for the cluster, if any.
    pub existing: Option<Summary>,
    /// Member count before this run.
    pub old_count: usize,
    /// Member count after this run.
    pub new_count: usize,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOutcome {
    pub summary: Summary,
    /// False when the existing summary was carried forward.
    pub regenerated: bool,
}

/// Regenerate for new clusters, when forced, or when the cluster grew by
/// more than half since the last summary.
pub fn should_regenerate(old_count: usize, new_count: usize, force: bool) -> bool {
    if old_count == 0 || force {
        return true;
    }
    let growth = new_count.saturating_sub(old_count) as f64 / old_count as f64;
    growth > REGENERATE_GROWTH
}

/// Summary for a cluster made of `items`.
///
/// Calls the summarizer only when [`should_regenerate`] says so; otherwise the
/// existing summary is returned unchanged. Summarizer errors propagate.
pub async fn generate_cluster_summary(
    summarizer: &dyn Summarizer,
    items: &[FeedbackItem],
    opts: &SummaryOptions,
) -> Result<SummaryOutcome, ClusterError> {
    let regenerate = should_regenerate(opts.old_count, opts.new_count, opts.force);
    if !regenerate {
        if let Some(existing) = &opts.existing {
            return Ok(SummaryOutcome {
                summary: existing.clone(),
                regenerated: false,
            });
        }
        debug!(old = opts.old_count, "summary: nothing to carry forward, regenerating");
    }

    let input: Vec<SummaryItem> = items.iter().map(FeedbackItem::to_summary_item).collect();
    let summary = summarizer.summarize(&input).await?;
    debug!(items = items.len(), title = %summary.title, "summary: regenerated");
    Ok(SummaryOutcome {
        summary,
        regenerated: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{CountingSummarizer, item};

    #[test]
    fn policy() {
        assert!(should_regenerate(0, 1, false));
        assert!(should_regenerate(2, 5, false));
        assert!(!should_regenerate(1, 1, false));
        assert!(!should_regenerate(4, 6, false), "exactly 50% is not enough");
        assert!(should_regenerate(4, 7, false));
        assert!(should_regenerate(10, 10, true));
    }

    #[tokio::test]
    async fn carries_existing_forward() {
        let s = CountingSummarizer::default();
        let existing = Summary {
            title: "Old".into(),
            ..Default::default()
        };
        let opts = SummaryOptions {
            existing: Some(existing.clone()),
            old_count: 3,
            new_count: 4,
            force: false,
        };

        let out = generate_cluster_summary(&s, &[item("a", "t", "b")], &opts)
            .await
            .unwrap();
        assert!(!out.regenerated);
        assert_eq!(out.summary, existing);
        assert_eq!(s.calls(), 0);
    }

    #[tokio::test]
    async fn regenerates_new_cluster() {
        let s = CountingSummarizer::default();
        let opts = SummaryOptions {
            old_count: 0,
            new_count: 1,
            ..Default::default()
        };

        let out = generate_cluster_summary(&s, &[item("a", "Crash", "b")], &opts)
            .await
            .unwrap();
        assert!(out.regenerated);
        assert_eq!(out.summary.title, "Crash");
        assert_eq!(s.calls(), 1);
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let s = CountingSummarizer::failing();
        let opts = SummaryOptions {
            force: true,
            old_count: 5,
            new_count: 5,
            ..Default::default()
        };
        let err = generate_cluster_summary(&s, &[item("a", "t", "b")], &opts).await;
        assert!(matches!(err, Err(ClusterError::Summarize(_))));
    }
}
