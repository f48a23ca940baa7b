//! Text embedding providers.
//!
//! [`Embedder`] is the contract the clustering engine consumes; [`OpenAI`]
//! and [`Gemini`] are HTTP clients for hosted embedding models.

pub mod config;
pub mod embed;
pub mod error;
pub mod gemini;
pub mod openai;

pub use config::EmbedConfig;
pub use embed::Embedder;
pub use error::EmbedError;
pub use gemini::Gemini;
pub use openai::OpenAI;
