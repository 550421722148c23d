pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod reference;
pub mod runner;
pub mod storage;

// Re-export vision types for convenience
pub use facefind_vision::{
    EmbeddingExtractor, Embedding, FaceRegion, Metric, OnnxExtractor,
};

pub use aggregator::{BestResultTable, ResultAggregator};
pub use classifier::{Label, MatchOptions, MatchRecord};
pub use reference::{build_reference, ReferenceBuild, ReferenceSet, SkipReason, SkippedImage};
pub use runner::{BatchRunner, Concurrency, RunReport};
