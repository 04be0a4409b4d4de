pub mod embeddings_service;
pub mod event_queue;
pub mod source_provider;
pub mod vector_index;

pub use embeddings_service::{EmbeddingsService, EmbeddingsServiceError};
pub use event_queue::{EventQueue, EventQueueError};
pub use source_provider::{SourceProvider, SourceProviderError};
pub use vector_index::{VectorIndex, VectorIndexError};
