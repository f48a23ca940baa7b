use thiserror::Error;

#[derive(Error, Debug)]
pub enum SummarizeError {
    #[error("summarize: empty input")]
    EmptyInput,

    #[error("summarize: API error: {0}")]
    Api(String),

    #[error("summarize: invalid response: {0}")]
    InvalidResponse(String),
}
