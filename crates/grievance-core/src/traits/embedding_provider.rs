use crate::errors::IngestError;
use crate::models::SourceChannel;

/// What an embedding is a function of: the normalized text plus the
/// report metadata that is allowed to shape it.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddingInput<'a> {
    pub report_id: &'a str,
    pub text: &'a str,
    pub channel: SourceChannel,
    pub region: Option<&'a str>,
}

/// Embedding provider. Implementations must be deterministic: the same
/// input always yields the same vector.
pub trait IEmbeddingProvider: Send + Sync {
    /// Embed a single report.
    fn embed(&self, input: &EmbeddingInput<'_>) -> Result<Vec<f32>, IngestError>;

    /// Embed a batch. The default embeds one by one.
    fn embed_batch(&self, inputs: &[EmbeddingInput<'_>]) -> Vec<Result<Vec<f32>, IngestError>> {
        inputs.iter().map(|input| self.embed(input)).collect()
    }

    /// Output dimensionality.
    fn dimensions(&self) -> usize;

    /// Provider name, for logs.
    fn name(&self) -> &str;
}
