use anyhow::{anyhow, bail, Context, Result};
use facefind_vision::EmbeddingExtractor;
use log::{debug, error, info};
use rayon::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Mutex};
use walkdir::WalkDir;

use crate::aggregator::ResultAggregator;
use crate::classifier::{classify_image, MatchOptions, MatchRecord};
use crate::reference::ReferenceSet;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    Sequential,
    Fixed(usize),
    AllCores,
}

impl Concurrency {
    /// `1` is sequential, `-1` uses every core, any other positive value caps the pool.
    pub fn from_cpus(cpus: i32) -> Result<Self> {
        match cpus {
            1 => Ok(Concurrency::Sequential),
            -1 => Ok(Concurrency::AllCores),
            n if n > 1 => Ok(Concurrency::Fixed(n as usize)),
            n => bail!("invalid cpu count {}: use -1 for all cores or a positive number", n),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub processed: usize,
    pub failed: usize,
}

/// Image files directly inside `folder`, by case-insensitive extension, sorted by name.
pub fn image_files_in_folder(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("listing {}", folder.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_image = entry
            .path()
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                IMAGE_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false);
        if is_image {
            images.push(entry.into_path());
        }
    }
    Ok(images)
}

pub struct BatchRunner<'a> {
    reference: &'a ReferenceSet,
    options: MatchOptions,
    concurrency: Concurrency,
}

impl<'a> BatchRunner<'a> {
    pub fn new(reference: &'a ReferenceSet, options: MatchOptions, concurrency: Concurrency) -> Self {
        Self {
            reference,
            options,
            concurrency,
        }
    }

    /// Classify `target` (one file, or every image directly inside a folder)
    /// and feed the results to `aggregator`.
    ///
    /// `make_extractor` is called once for sequential runs and once per worker
    /// thread otherwise. A file that fails to classify is logged and counted;
    /// the rest of the batch still runs.
    pub fn run<E, F, W>(
        &self,
        target: &Path,
        mut make_extractor: F,
        aggregator: &mut ResultAggregator<W>,
    ) -> Result<RunReport>
    where
        E: EmbeddingExtractor + Send,
        F: FnMut() -> Result<E>,
        W: Write,
    {
        if !target.is_dir() {
            let mut extractor = make_extractor()?;
            return self.run_sequential(&mut extractor, &[target.to_path_buf()], aggregator);
        }

        let images = image_files_in_folder(target)?;
        info!("{} image(s) to check in {}", images.len(), target.display());

        match self.concurrency {
            Concurrency::Sequential => {
                let mut extractor = make_extractor()?;
                self.run_sequential(&mut extractor, &images, aggregator)
            }
            Concurrency::Fixed(n) => self.run_parallel(n, &images, make_extractor, aggregator),
            Concurrency::AllCores => self.run_parallel(0, &images, make_extractor, aggregator),
        }
    }

    fn run_sequential<E, W>(
        &self,
        extractor: &mut E,
        images: &[PathBuf],
        aggregator: &mut ResultAggregator<W>,
    ) -> Result<RunReport>
    where
        E: EmbeddingExtractor,
        W: Write,
    {
        let mut report = RunReport::default();
        for path in images {
            let outcome = classify_image(extractor, path, self.reference, &self.options);
            fold(&mut report, aggregator, path, outcome)?;
        }
        Ok(report)
    }

    /// `threads == 0` sizes the pool to the machine.
    fn run_parallel<E, F, W>(
        &self,
        threads: usize,
        images: &[PathBuf],
        mut make_extractor: F,
        aggregator: &mut ResultAggregator<W>,
    ) -> Result<RunReport>
    where
        E: EmbeddingExtractor + Send,
        F: FnMut() -> Result<E>,
        W: Write,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("facefind-worker-{i}"))
            .build()
            .context("starting worker pool")?;

        // One extractor per pool thread, picked by thread index, so locks are never contended.
        let workers = (0..pool.current_num_threads())
            .map(|_| make_extractor().map(Mutex::new))
            .collect::<Result<Vec<_>>>()?;
        debug!("running {} workers", workers.len());

        let (tx, rx) = mpsc::channel::<(PathBuf, Result<Vec<MatchRecord>>)>();
        let reference = self.reference;
        let options = self.options;
        let workers = &workers;
        let pool = &pool;

        std::thread::scope(|scope| {
            scope.spawn(move || {
                pool.install(|| {
                    images.par_iter().for_each_with(tx, |tx, path| {
                        let slot = rayon::current_thread_index().unwrap_or(0);
                        let outcome = match workers[slot].lock() {
                            Ok(mut extractor) => {
                                classify_image(&mut *extractor, path, reference, &options)
                            }
                            Err(_) => Err(anyhow!("worker {} extractor poisoned", slot)),
                        };
                        // The receiver only hangs up if the aggregator failed; that error is reported there.
                        let _ = tx.send((path.clone(), outcome));
                    });
                });
            });

            let mut report = RunReport::default();
            for (path, outcome) in rx {
                fold(&mut report, aggregator, &path, outcome)?;
            }
            Ok(report)
        })
    }
}

fn fold<W: Write>(
    report: &mut RunReport,
    aggregator: &mut ResultAggregator<W>,
    path: &Path,
    outcome: Result<Vec<MatchRecord>>,
) -> Result<()> {
    match outcome {
        Ok(records) => {
            report.processed += 1;
            aggregator.record_all(&records)
        }
        Err(e) => {
            report.failed += 1;
            error!("skipping {}: {:#}", path.display(), e);
            Ok(())
        }
    }
}
