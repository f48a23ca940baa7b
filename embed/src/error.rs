use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("embed: empty input")]
    EmptyInput,

    #[error("embed: transport: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embed: provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("embed: no embedding for input {0}")]
    MissingIndex(usize),

    #[error("embed: index {index} outside batch of {batch_size}")]
    UnexpectedIndex { index: usize, batch_size: usize },

    #[error("embed: {got} embeddings for {want} inputs")]
    CountMismatch { got: usize, want: usize },
}

/// Fail on a non-2xx status, otherwise decode the JSON body.
pub(crate) async fn decode_json<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, EmbedError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(EmbedError::Status { status: status.as_u16(), body });
    }
    Ok(resp.json().await?)
}
