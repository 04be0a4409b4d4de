pub mod ollama_embeddings_service;
pub mod sync_engine;
