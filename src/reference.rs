//! Reference set construction from a labelled folder tree.
//!
//! ```text
//! people/
//!   alice/  a1.jpg a2.jpg
//!   bob/    b1.png
//! ```
//!
//! Every subfolder name is a label. A training image contributes exactly one
//! entry, and only when the detector finds exactly one face in it.

use anyhow::{Context, Result};
use facefind_vision::{load_image, Embedding, EmbeddingExtractor};
use log::{debug, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Labels and embeddings, index-aligned: `labels[i]` names `embeddings[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceSet {
    labels: Vec<String>,
    embeddings: Vec<Embedding>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: impl Into<String>, embedding: Embedding) {
        self.labels.push(label.into());
        self.embeddings.push(embedding);
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn embeddings(&self) -> &[Embedding] {
        &self.embeddings
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Embedding)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.embeddings.iter())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Embedding length shared by every entry, `None` when empty.
    pub fn dim(&self) -> Option<usize> {
        self.embeddings.first().map(Embedding::dim)
    }
}

impl<S: Into<String>> FromIterator<(S, Embedding)> for ReferenceSet {
    fn from_iter<I: IntoIterator<Item = (S, Embedding)>>(iter: I) -> Self {
        let mut set = ReferenceSet::new();
        for (label, embedding) in iter {
            set.push(label, embedding);
        }
        set
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoFaces,
    MultipleFaces(usize),
    /// One face was detected but the encoder returned nothing for it.
    NotEncoded,
    Unreadable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoFaces => write!(f, "No faces found"),
            SkipReason::MultipleFaces(_) => write!(f, "More than one face found"),
            SkipReason::NotEncoded => write!(f, "Face could not be encoded"),
            SkipReason::Unreadable(cause) => write!(f, "Could not read image ({cause})"),
        }
    }
}

/// A training image left out of the reference set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedImage {
    /// `<label>/<file>`, relative to the reference root.
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct ReferenceBuild {
    pub reference: ReferenceSet,
    pub skipped: Vec<SkippedImage>,
}

/// Platform metadata files that are never training images.
fn is_housekeeping(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || name == "Thumbs.db" || name == "desktop.ini"
}

fn children(dir: &Path) -> Result<Vec<DirEntry>> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_housekeeping(e))
        .map(|e| e.with_context(|| format!("listing {}", dir.display())))
        .collect()
}

/// Walk `root` and collect one reference entry per single-face training image.
///
/// Rejected images are logged and reported in [`ReferenceBuild::skipped`];
/// only an unreadable `root` or label folder is an error.
pub fn build_reference<E>(extractor: &mut E, root: &Path) -> Result<ReferenceBuild>
where
    E: EmbeddingExtractor + ?Sized,
{
    let mut build = ReferenceBuild::default();

    for person in children(root)? {
        if !person.file_type().is_dir() {
            debug!("ignoring {} outside a label folder", person.path().display());
            continue;
        }
        let label = person.file_name().to_string_lossy().into_owned();

        for image in children(person.path())? {
            if !image.file_type().is_file() {
                continue;
            }
            let relative = Path::new(&label).join(image.file_name());

            match index_image(extractor, image.path()) {
                Ok(embedding) => build.reference.push(label.clone(), embedding),
                Err(reason) => {
                    warn!("{} in {}. Ignoring file.", reason, relative.display());
                    build.skipped.push(SkippedImage {
                        path: relative,
                        reason,
                    });
                }
            }
        }
    }

    debug!(
        "reference set: {} entries, {} skipped",
        build.reference.len(),
        build.skipped.len()
    );
    Ok(build)
}

fn index_image<E>(extractor: &mut E, path: &Path) -> std::result::Result<Embedding, SkipReason>
where
    E: EmbeddingExtractor + ?Sized,
{
    let unreadable = |e: anyhow::Error| SkipReason::Unreadable(format!("{e:#}"));

    let img = load_image(path).map_err(unreadable)?;
    match extractor.detect_faces(&img).map_err(unreadable)?.len() {
        0 => Err(SkipReason::NoFaces),
        1 => extractor
            .encode_faces(&img)
            .map_err(unreadable)?
            .into_iter()
            .next()
            .ok_or(SkipReason::NotEncoded),
        n => Err(SkipReason::MultipleFaces(n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_set_stays_aligned() {
        let set: ReferenceSet = vec![
            ("alice", Embedding::new(vec![1.0])),
            ("bob", Embedding::new(vec![2.0])),
            ("alice", Embedding::new(vec![3.0])),
        ]
        .into_iter()
        .collect();

        assert_eq!(set.len(), 3);
        assert_eq!(set.labels(), ["alice", "bob", "alice"]);
        assert_eq!(set.embeddings()[2], Embedding::new(vec![3.0]));
        let pairs: Vec<_> = set.iter().map(|(l, e)| (l, e.vector[0])).collect();
        assert_eq!(pairs, vec![("alice", 1.0), ("bob", 2.0), ("alice", 3.0)]);
        assert_eq!(set.dim(), Some(1));
        assert_eq!(ReferenceSet::new().dim(), None);
    }

    #[test]
    fn test_skip_reason_messages() {
        assert_eq!(SkipReason::NoFaces.to_string(), "No faces found");
        assert_eq!(
            SkipReason::MultipleFaces(3).to_string(),
            "More than one face found"
        );
    }
}
