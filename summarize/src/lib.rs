//! Cluster summarization providers.
//!
//! A [`Summarizer`] turns the feedback items of one cluster into a
//! human-readable [`Summary`] plus a draft issue.

pub mod error;
pub mod first_item;
pub mod openai;
pub mod prompt;
pub mod summarize;

pub use error::SummarizeError;
pub use first_item::FirstItem;
pub use openai::OpenAIChat;
pub use summarize::{Summarizer, Summary, SummaryItem};
