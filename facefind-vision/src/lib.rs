pub mod extractor;
pub mod face;
pub mod io;
pub mod model;
pub mod onnx;
pub mod yunet;

// Re-export commonly used types
pub use extractor::EmbeddingExtractor;
pub use face::{face_distance, Embedding, FaceRegion, Metric};
pub use io::{downscale, load_image};
pub use onnx::{DetectionParams, OnnxExtractor};
