//! LLM prompt construction for cluster summaries.

use crate::summarize::SummaryItem;

/// Default per-item body budget, in characters.
pub const DEFAULT_BODY_CHARS: usize = 1500;

pub fn build_system_prompt() -> &'static str {
    PROMPT_SYSTEM
}

/// Render the cluster's items as numbered reports, bodies cut to
/// `body_chars` characters.
pub fn build_items_text(items: &[SummaryItem], body_chars: usize) -> String {
    let mut sb = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            sb.push_str("\n\n");
        }
        sb.push_str(&format!("### Report {} [{}]\n", i + 1, item.source));
        if !item.title.trim().is_empty() {
            sb.push_str(item.title.trim());
            sb.push('\n');
        }
        let body: String = item.body.trim().chars().take(body_chars).collect();
        sb.push_str(&body);
    }
    sb
}

const PROMPT_SYSTEM: &str = r#"You are a feedback triage assistant. You receive several user reports that were grouped because they describe the same underlying problem or request.

## Instructions

1. Read every report.
2. Write a short title (under 80 characters) naming the shared problem.
3. Write a summary (2-4 sentences) of what users experience and how often it shows up.
4. Draft a GitHub issue: an imperative issue title and a markdown description with reproduction hints quoted from the reports.
5. If the reports name a source repository URL, return it; otherwise return null.

## Output

Reply with a single JSON object:

{
  "title": "...",
  "summary": "...",
  "issue_title": "...",
  "issue_description": "...",
  "repo_url": null
}"#;
