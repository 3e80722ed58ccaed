pub mod memory;
pub mod qdrant;

pub use memory::InMemoryIndex;
pub use qdrant::{QdrantConfig, QdrantIndex};
