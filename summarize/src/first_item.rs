use crate::error::SummarizeError;
use crate::summarize::{Summarizer, Summary, SummaryItem};

const FALLBACK_TEXT: &str = "Feedback cluster";
const SUMMARY_CHARS: usize = 200;

/// Offline summarizer that describes a cluster by its first item.
///
/// Title is the first item's title, summary its body cut to 200 characters,
/// and the issue description lists every member title.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstItem;

#[async_trait::async_trait]
impl Summarizer for FirstItem {
    async fn summarize(&self, items: &[SummaryItem]) -> Result<Summary, SummarizeError> {
        let first = items.first().ok_or(SummarizeError::EmptyInput)?;

        let title = non_empty_or(first.title.trim(), FALLBACK_TEXT);
        let body: String = first.body.trim().chars().take(SUMMARY_CHARS).collect();
        let summary = non_empty_or(&body, FALLBACK_TEXT);

        let mut description = format!("{} related reports:\n", items.len());
        for item in items {
            let t = non_empty_or(item.title.trim(), "(untitled)");
            description.push_str(&format!("- [{}] {}\n", item.source, t));
        }

        Ok(Summary {
            issue_title: title.clone(),
            title,
            summary,
            issue_description: description,
            repo_url: None,
        })
    }
}

fn non_empty_or(s: &str, fallback: &str) -> String {
    if s.is_empty() { fallback.to_string() } else { s.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, body: &str) -> SummaryItem {
        SummaryItem {
            title: title.into(),
            body: body.into(),
            source: "manual".into(),
        }
    }

    #[tokio::test]
    async fn uses_first_item() {
        let s = FirstItem
            .summarize(&[item("Login crash", "App dies on submit"), item("", "same")])
            .await
            .unwrap();
        assert_eq!(s.title, "Login crash");
        assert_eq!(s.issue_title, "Login crash");
        assert_eq!(s.summary, "App dies on submit");
        assert!(s.issue_description.starts_with("2 related reports"));
        assert!(s.issue_description.contains("(untitled)"));
    }

    #[tokio::test]
    async fn falls_back_and_truncates() {
        let long = "x".repeat(500);
        let s = FirstItem.summarize(&[item("", &long)]).await.unwrap();
        assert_eq!(s.title, FALLBACK_TEXT);
        assert_eq!(s.summary.chars().count(), SUMMARY_CHARS);
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        assert!(matches!(
            FirstItem.summarize(&[]).await,
            Err(SummarizeError::EmptyInput)
        ));
    }
}
