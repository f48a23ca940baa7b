use crate::error::EmbedError;

/// Turns feedback text into vectors for similarity search.
///
/// Every vector from one embedder has [`Embedder::dimension`] components,
/// and the same text always maps to the same vector, which is what lets
/// callers cache results by item id.
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.embed_batch(&[text])
            .await?
            .pop()
            .ok_or(EmbedError::MissingIndex(0))
    }

    /// One vector per input, same order. Providers chunk internally.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError>;

    fn dimension(&self) -> usize;
}
