use anyhow::{Context, Result};
use facefind_vision::Embedding;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::reference::ReferenceSet;

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    label: String,
    embedding: Vec<f32>,
}

/// Load a cached reference set. A missing file yields `None`.
pub fn load_reference(path: &Path) -> Result<Option<ReferenceSet>> {
    if !path.exists() {
        return Ok(None);
    }

    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let entries: Vec<StoredEntry> = postcard::from_bytes(&data)
        .with_context(|| format!("decoding reference cache {}", path.display()))?;

    let set: ReferenceSet = entries
        .into_iter()
        .map(|e| (e.label, Embedding::new(e.embedding)))
        .collect();
    if let Some(dim) = set.dim() {
        if set.embeddings().iter().any(|e| e.dim() != dim) {
            anyhow::bail!("reference cache {} mixes embedding sizes", path.display());
        }
    }
    Ok(Some(set))
}

pub fn save_reference(path: &Path, reference: &ReferenceSet) -> Result<()> {
    let entries: Vec<StoredEntry> = reference
        .iter()
        .map(|(label, embedding)| StoredEntry {
            label: label.to_string(),
            embedding: embedding.to_vec(),
        })
        .collect();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let data = postcard::to_allocvec(&entries)?;
    std::fs::write(path, data).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
