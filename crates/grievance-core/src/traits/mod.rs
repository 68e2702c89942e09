mod clock;
mod embedding_provider;

pub use clock::{Clock, FixedClock, SystemClock};
pub use embedding_provider::{EmbeddingInput, IEmbeddingProvider};
