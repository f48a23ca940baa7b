/// Builder-style configuration for embedder implementations.
///
/// Empty or zero fields fall back to the provider's defaults.
#[derive(Debug, Clone, Default)]
pub struct EmbedConfig {
    pub model: String,
    pub dimension: usize,
    pub base_url: String,
}

impl EmbedConfig {
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_dimension(mut self, dim: usize) -> Self {
        self.dimension = dim;
        self
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub(crate) fn model_or(&self, default: &str) -> String {
        if self.model.is_empty() {
            default.to_string()
        } else {
            self.model.clone()
        }
    }

    pub(crate) fn dimension_or(&self, default: usize) -> usize {
        if self.dimension == 0 { default } else { self.dimension }
    }

    pub(crate) fn base_url_or(&self, default: &str) -> String {
        if self.base_url.is_empty() {
            default.to_string()
        } else {
            self.base_url.clone()
        }
    }
}
