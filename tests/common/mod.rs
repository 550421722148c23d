#![allow(dead_code)]

use anyhow::{bail, Result};
use facefind::{Embedding, EmbeddingExtractor, FaceRegion};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Extractor whose answer depends only on the colour of pixel (0, 0).
///
/// Colours without an entry have no faces.
#[derive(Debug, Clone, Default)]
pub struct StubExtractor {
    faces: HashMap<[u8; 3], Vec<Vec<f32>>>,
    failing: HashSet<[u8; 3]>,
}

impl StubExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faces(mut self, color: [u8; 3], faces: Vec<Vec<f32>>) -> Self {
        self.faces.insert(color, faces);
        self
    }

    pub fn failing_on(mut self, color: [u8; 3]) -> Self {
        self.failing.insert(color);
        self
    }

    fn lookup(&self, img: &DynamicImage) -> Result<&[Vec<f32>]> {
        let px = img.get_pixel(0, 0);
        let color = [px[0], px[1], px[2]];
        if self.failing.contains(&color) {
            bail!("stub failure for {:?}", color);
        }
        Ok(self.faces.get(&color).map(Vec::as_slice).unwrap_or(&[]))
    }
}

impl EmbeddingExtractor for StubExtractor {
    fn detect_faces(&mut self, img: &DynamicImage) -> Result<Vec<FaceRegion>> {
        Ok(self
            .lookup(img)?
            .iter()
            .enumerate()
            .map(|(i, _)| FaceRegion {
                bbox: [i as f32 * 10.0, 0.0, 8.0, 8.0],
                score: 0.9,
                landmarks: [0.0; 10],
            })
            .collect())
    }

    fn encode_faces(&mut self, img: &DynamicImage) -> Result<Vec<Embedding>> {
        Ok(self
            .lookup(img)?
            .iter()
            .map(|v| Embedding::new(v.clone()))
            .collect())
    }
}

/// Write a small solid-colour PNG; the extension of `path` is irrelevant.
pub fn write_image(path: &Path, color: [u8; 3]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    RgbImage::from_pixel(4, 4, Rgb(color))
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
}
