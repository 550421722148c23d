use anyhow::{Context, Result};
use facefind_vision::{
    downscale, face_distance, load_image, Embedding, EmbeddingExtractor, Metric,
};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::reference::ReferenceSet;

#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    pub tolerance: f32,
    pub metric: Metric,
    pub max_dimension: u32,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            tolerance: 0.6,
            metric: Metric::Euclidean,
            max_dimension: 1600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    Person(String),
    /// A face was found but nothing in the reference set was within tolerance.
    Unknown,
    /// The image contained no faces.
    NoPerson,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Person(name) => f.write_str(name),
            Label::Unknown => f.write_str("Unknown person"),
            Label::NoPerson => f.write_str("No person found"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub source: PathBuf,
    pub label: Label,
    /// Present only for [`Label::Person`].
    pub distance: Option<f32>,
}

/// Load, shrink and classify one unknown image.
pub fn classify_image<E>(
    extractor: &mut E,
    path: &Path,
    reference: &ReferenceSet,
    options: &MatchOptions,
) -> Result<Vec<MatchRecord>>
where
    E: EmbeddingExtractor + ?Sized,
{
    let img = downscale(load_image(path)?, options.max_dimension);
    let faces = extractor
        .encode_faces(&img)
        .with_context(|| format!("encoding faces in {}", path.display()))?;

    if let (Some(want), Some(face)) = (reference.dim(), faces.first()) {
        if face.dim() != want {
            anyhow::bail!(
                "{} produced {}-dim embeddings, reference set has {}",
                path.display(),
                face.dim(),
                want
            );
        }
    }

    Ok(classify_embeddings(path, &faces, reference, options))
}

/// Classify already-encoded faces.
///
/// Every reference entry within tolerance yields its own record, so one face
/// can match the same label several times, or several different labels.
pub fn classify_embeddings(
    path: &Path,
    faces: &[Embedding],
    reference: &ReferenceSet,
    options: &MatchOptions,
) -> Vec<MatchRecord> {
    let record = |label, distance| MatchRecord {
        source: path.to_path_buf(),
        label,
        distance,
    };

    if faces.is_empty() {
        return vec![record(Label::NoPerson, None)];
    }

    let mut records = Vec::new();
    for face in faces {
        let distances = face_distance(options.metric, reference.embeddings(), face);
        let before = records.len();

        for (label, &distance) in reference.labels().iter().zip(&distances) {
            if distance <= options.tolerance {
                records.push(record(Label::Person(label.clone()), Some(distance)));
            }
        }

        if records.len() == before {
            records.push(record(Label::Unknown, None));
        }
    }
    records
}
