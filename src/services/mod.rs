mod batch;
mod chunker;
mod embedding;
mod ids;
mod pipeline;
mod pool;
mod progress;
mod splitter;
#[cfg(test)]
pub(crate) mod testing;
mod tokenizer;
mod vector_store;

pub use batch::{BatchAccumulator, BatchOutcome, BatchProcessor};
pub use chunker::{ChunkOutcome, Chunker};
pub use embedding::{EmbeddingClient, EmbeddingService};
pub use ids::{IdAllocator, PointIdMapper};
pub use pipeline::Pipeline;
pub use pool::{BatchSender, PoolTotals, WorkerPool};
pub use progress::{ProgressOutput, ProgressReporter, ProgressSnapshot};
pub use splitter::{split_lines, split_paragraphs};
pub use tokenizer::{
    HeuristicTokenizer, HfTokenizer, Tokenizer, WordTokenizer, build_tokenizer,
};
pub use vector_store::{CollectionInfo, QdrantBackend, VectorStore, create_backend};
