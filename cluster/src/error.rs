use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("cluster: kv error: {0}")]
    KV(#[from] triage_kv::KVError),

    #[error("cluster: embed error: {0}")]
    Embed(#[from] triage_embed::EmbedError),

    #[error("cluster: summarize error: {0}")]
    Summarize(#[from] triage_summarize::SummarizeError),

    #[error("cluster: invalid record {key}: {reason}")]
    InvalidRecord { key: String, reason: String },

    #[error("cluster: serialization error: {0}")]
    Serialization(String),

    #[error("cluster: unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("cluster: got {got} embeddings for {want} items")]
    EmbeddingCount { got: usize, want: usize },
}
