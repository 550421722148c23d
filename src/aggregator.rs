use anyhow::Result;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use crate::classifier::{Label, MatchRecord};

/// Best distance seen per basename, in first-seen order.
#[derive(Debug, Default)]
pub struct BestResultTable {
    order: Vec<String>,
    best: HashMap<String, Option<f32>>,
}

impl BestResultTable {
    pub fn contains(&self, basename: &str) -> bool {
        self.best.contains_key(basename)
    }

    pub fn best(&self, basename: &str) -> Option<Option<f32>> {
        self.best.get(basename).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f32>)> {
        self.order
            .iter()
            .map(move |name| (name.as_str(), self.best[name]))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns `true` when `basename` had not been seen before.
    fn observe(&mut self, basename: &str, distance: Option<f32>) -> bool {
        match self.best.get_mut(basename) {
            Some(best) => {
                if improves(distance, *best) {
                    *best = distance;
                }
                false
            }
            None => {
                self.order.push(basename.to_string());
                self.best.insert(basename.to_string(), distance);
                true
            }
        }
    }
}

/// An absent distance never improves anything; a present one beats an
/// absent one or a strictly larger present one.
fn improves(candidate: Option<f32>, current: Option<f32>) -> bool {
    match (candidate, current) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(new), Some(old)) => new < old,
    }
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn fmt_distance(distance: Option<f32>) -> String {
    distance.map_or_else(|| "None".to_string(), |d| d.to_string())
}

/// Prints the first result for each file and tracks the best distance for all of them.
pub struct ResultAggregator<W: Write> {
    out: W,
    show_distance: bool,
    table: BestResultTable,
}

impl<W: Write> ResultAggregator<W> {
    pub fn new(out: W, show_distance: bool) -> Self {
        Self {
            out,
            show_distance,
            table: BestResultTable::default(),
        }
    }

    /// Only the first occurrence of a basename is printed; later ones only
    /// update its best distance.
    pub fn record(&mut self, filename: &Path, label: &Label, distance: Option<f32>) -> Result<()> {
        let name = basename(filename);
        if !self.table.observe(&name, distance) {
            return Ok(());
        }
        if self.show_distance {
            writeln!(self.out, "{} -> {},{}", name, label, fmt_distance(distance))?;
        } else {
            writeln!(self.out, "{} -> {}", name, label)?;
        }
        Ok(())
    }

    pub fn record_all(&mut self, records: &[MatchRecord]) -> Result<()> {
        for r in records {
            self.record(&r.source, &r.label, r.distance)?;
        }
        Ok(())
    }

    pub fn summarize(&mut self) -> Result<()> {
        for (name, best) in self.table.iter() {
            writeln!(self.out, "Best performance for {} : {}", name, fmt_distance(best))?;
        }
        self.out.flush()?;
        Ok(())
    }

    pub fn table(&self) -> &BestResultTable {
        &self.table
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
