use anyhow::Result;
use image::DynamicImage;

use crate::face::{Embedding, FaceRegion};

/// Face detection and embedding backend.
///
/// Implementations hold inference state (ONNX sessions, caches) and are
/// therefore used through `&mut self`. One instance serves one thread.
pub trait EmbeddingExtractor {
    /// Locate every face in the image.
    fn detect_faces(&mut self, img: &DynamicImage) -> Result<Vec<FaceRegion>>;

    /// One embedding per detected face, in detection order.
    fn encode_faces(&mut self, img: &DynamicImage) -> Result<Vec<Embedding>>;
}

impl<E: EmbeddingExtractor + ?Sized> EmbeddingExtractor for &mut E {
    fn detect_faces(&mut self, img: &DynamicImage) -> Result<Vec<FaceRegion>> {
        (**self).detect_faces(img)
    }

    fn encode_faces(&mut self, img: &DynamicImage) -> Result<Vec<Embedding>> {
        (**self).encode_faces(img)
    }
}

impl<E: EmbeddingExtractor + ?Sized> EmbeddingExtractor for Box<E> {
    fn detect_faces(&mut self, img: &DynamicImage) -> Result<Vec<FaceRegion>> {
        (**self).detect_faces(img)
    }

    fn encode_faces(&mut self, img: &DynamicImage) -> Result<Vec<Embedding>> {
        (**self).encode_faces(img)
    }
}
