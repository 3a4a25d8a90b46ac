use thiserror::Error;

#[derive(Debug, Error)]
pub enum TerrainError {
    #[error("out of chunk IDs ({capacity}); raise the configured max_chunks")]
    ChunkCapacityExceeded { capacity: usize },
    #[error("out of shared vertex IDs ({capacity}); raise the configured max_shared_vertices")]
    SharedVertexCapacityExceeded { capacity: usize },
    #[error("invalid terrain config: {0}")]
    InvalidConfig(String),
}
