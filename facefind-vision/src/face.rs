use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// A face found by the detector, in source image pixels.
#[derive(Debug, Clone)]
pub struct FaceRegion {
    pub bbox: [f32; 4], // x, y, w, h
    pub score: f32,
    pub landmarks: [f32; 10], // right eye, left eye, nose tip, mouth corners (x, y pairs)
}

/// Fixed-length feature vector for one detected face.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Array1<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            vector: Array1::from(values),
        }
    }

    pub fn dim(&self) -> usize {
        self.vector.len()
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.vector.to_vec()
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// Distance function used to compare embeddings. Lower is more alike.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Euclidean,
    /// `1 - cosine similarity`, in [0, 2].
    Cosine,
}

impl Metric {
    pub fn distance(self, a: &Embedding, b: &Embedding) -> f32 {
        match self {
            Metric::Euclidean => {
                let diff = &a.vector - &b.vector;
                diff.dot(&diff).sqrt()
            }
            Metric::Cosine => {
                let denom = a.vector.dot(&a.vector).sqrt() * b.vector.dot(&b.vector).sqrt();
                if denom > 0.0 {
                    1.0 - (a.vector.dot(&b.vector) / denom).clamp(-1.0, 1.0)
                } else {
                    1.0
                }
            }
        }
    }
}

/// Distance from `probe` to every embedding in `known`, index-aligned with `known`.
///
/// All embeddings must share one dimension; callers check this up front.
pub fn face_distance(metric: Metric, known: &[Embedding], probe: &Embedding) -> Vec<f32> {
    known.iter().map(|k| metric.distance(k, probe)).collect()
}

/// Greedy non-maximum suppression, highest score first.
pub fn nms(regions: &[FaceRegion], iou_threshold: f32) -> Vec<FaceRegion> {
    let mut sorted = regions.to_vec();
    sorted.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<FaceRegion> = Vec::new();
    for candidate in sorted {
        if keep
            .iter()
            .all(|kept| iou(&kept.bbox, &candidate.bbox) <= iou_threshold)
        {
            keep.push(candidate);
        }
    }
    keep
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = (a[0] + a[2]).min(b[0] + b[2]);
    let y2 = (a[1] + a[3]).min(b[1] + b[3]);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let inter = (x2 - x1) * (y2 - y1);
    inter / (a[2] * a[3] + b[2] * b[3] - inter)
}
