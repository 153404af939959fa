mod chunker;

pub use chunker::{Chunk, ContentChunker};
