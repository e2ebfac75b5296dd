//! Folder-level conversion.

use std::any::Any;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{BatchReport, ConversionRequest, ConversionResult, DOCX_EXTENSION};
use crate::monitor::Checkpoint;

use super::Converter;

/// How batch items are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// One file at a time, start to finish.
    #[default]
    MemoryConstrained,
    /// A fixed pool of workers, each running whole conversions.
    Parallel { workers: usize },
}

/// Batch configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOptions {
    pub mode: BatchMode,

    /// File extension to pick up, compared case-insensitively
    pub extension: String,

    /// Descend into sub-directories
    pub recursive: bool,

    /// Per-page progress logging inside each conversion
    pub verbose: bool,
}

impl BatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: BatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Run on `workers` threads (at least one).
    pub fn parallel(self, workers: usize) -> Self {
        self.with_mode(BatchMode::Parallel {
            workers: workers.max(1),
        })
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            mode: BatchMode::MemoryConstrained,
            extension: "pdf".to_string(),
            recursive: false,
            verbose: false,
        }
    }
}

/// A completed batch item, handed to the observer.
#[derive(Debug, Clone, Copy)]
pub struct BatchItem<'a> {
    /// 1-based completion position
    pub index: usize,
    pub total: usize,
    /// Input path relative to the batch folder
    pub name: &'a str,
    pub result: &'a ConversionResult,
}

type Observer = Box<dyn Fn(&BatchItem<'_>) + Send + Sync>;

struct Job {
    name: String,
    request: ConversionRequest,
    /// Earlier job that already writes this output path
    collides_with: Option<String>,
}

/// Converts every matching file in a folder with one [`Converter`].
pub struct BatchConverter {
    converter: Arc<Converter>,
    options: BatchOptions,
    observer: Option<Observer>,
}

impl BatchConverter {
    pub fn new(converter: Converter, options: BatchOptions) -> Self {
        Self::from_shared(Arc::new(converter), options)
    }

    pub fn from_shared(converter: Arc<Converter>, options: BatchOptions) -> Self {
        Self {
            converter,
            options,
            observer: None,
        }
    }

    /// Call `observer` on the collecting thread after each item.
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&BatchItem<'_>) + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    /// Matching input files under `input_dir`, sorted.
    pub fn discover(&self, input_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        self.collect_files(input_dir, &mut files)?;
        files.sort();
        Ok(files)
    }

    fn collect_files(&self, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                if self.options.recursive {
                    self.collect_files(&path, files)?;
                }
            } else if self.matches_extension(&path) {
                files.push(path);
            }
        }
        Ok(())
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(&self.options.extension))
            .unwrap_or(false)
    }

    /// Convert every matching file in `input_dir`.
    ///
    /// Outputs go to `output_dir` (default: next to the inputs), mirroring
    /// sub-directories in recursive mode. Only folder-level problems are
    /// returned as errors; each item's failure lands in the report.
    pub fn convert_batch(&self, input_dir: &Path, output_dir: Option<&Path>) -> Result<BatchReport> {
        let start = Instant::now();
        let mut report = BatchReport::new();

        if !input_dir.is_dir() {
            log::error!("Folder not found: {}", input_dir.display());
            return Err(Error::NotFound(input_dir.to_path_buf()));
        }
        let output_root = output_dir.unwrap_or(input_dir);
        fs::create_dir_all(output_root).map_err(|e| match e.kind() {
            io::ErrorKind::PermissionDenied => Error::PermissionDenied(output_root.to_path_buf()),
            _ => Error::Io(e),
        })?;

        let files = self.discover(input_dir)?;
        if files.is_empty() {
            log::warn!(
                "No .{} files found in {}",
                self.options.extension,
                input_dir.display()
            );
            report.elapsed_secs = start.elapsed().as_secs_f64();
            return Ok(report);
        }

        let mut jobs: Vec<Job> = files
            .iter()
            .map(|file| self.job_for(file, input_dir, output_root))
            .collect();
        mark_collisions(&mut jobs);
        log::info!("Found {} files in {}", jobs.len(), input_dir.display());

        match self.options.mode {
            BatchMode::MemoryConstrained => {
                log::info!("Memory-constrained mode: converting one file at a time");
                self.run_sequential(&jobs, &mut report);
            }
            BatchMode::Parallel { workers } => {
                log::info!("Using {} workers", workers);
                self.run_parallel(&jobs, workers, &mut report)?;
            }
        }

        report.elapsed_secs = start.elapsed().as_secs_f64();
        report.log_summary();
        Ok(report)
    }

    fn job_for(&self, file: &Path, input_dir: &Path, output_root: &Path) -> Job {
        let relative = file.strip_prefix(input_dir).unwrap_or(file);
        let output = output_root.join(relative).with_extension(DOCX_EXTENSION);
        Job {
            name: relative.display().to_string(),
            request: ConversionRequest::new(file)
                .with_output(output)
                .verbose(self.options.verbose),
            collides_with: None,
        }
    }

    fn run_sequential(&self, jobs: &[Job], report: &mut BatchReport) {
        let total = jobs.len();
        for (i, job) in jobs.iter().enumerate() {
            log::info!("[{}/{}] Processing: {}", i + 1, total, job.name);
            let result = self.run_item(job);
            self.finish_item(report, i + 1, total, &job.name, &result);
        }
    }

    fn run_parallel(&self, jobs: &[Job], workers: usize, report: &mut BatchReport) -> Result<()> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("pdfdocx-worker-{}", i))
            .build()
            .map_err(|e| Error::Other(format!("cannot start worker pool: {}", e)))?;
        let (tx, rx) = crossbeam_channel::bounded::<(usize, ConversionResult)>(workers.max(1));
        let total = jobs.len();

        thread::scope(|scope| {
            scope.spawn(move || {
                pool.install(|| {
                    jobs.par_iter().enumerate().for_each_with(tx, |tx, (i, job)| {
                        let result = self.run_item(job);
                        // the collector only stops once every sender is gone
                        let _ = tx.send((i, result));
                    });
                });
            });

            for (done, (i, result)) in rx.iter().enumerate() {
                let name = &jobs[i].name;
                log::info!("[{}/{}] {}", done + 1, total, name);
                self.finish_item(report, done + 1, total, name, &result);
            }
        });
        Ok(())
    }

    /// Run one conversion, turning an escaped panic into a failure.
    fn run_item(&self, job: &Job) -> ConversionResult {
        if let Some(first) = &job.collides_with {
            let message = format!(
                "output path {} collides with {}",
                job.request.output().display(),
                first
            );
            log::error!("{}: {}", job.name, message);
            return ConversionResult::failure_message(message);
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.converter.convert_with_memory_monitoring(&job.request)
        }))
        .unwrap_or_else(|payload| {
            let message = format!("conversion panicked: {}", panic_message(payload.as_ref()));
            log::error!("{}: {}", job.name, message);
            ConversionResult::failure_message(message)
        });

        let monitor = self.converter.monitor();
        if let Err(payload) =
            panic::catch_unwind(AssertUnwindSafe(|| monitor.reclaim(Checkpoint::BetweenItems)))
        {
            log::warn!(
                "{}: reclaim between items panicked: {}",
                job.name,
                panic_message(payload.as_ref())
            );
        }
        result
    }

    fn finish_item(
        &self,
        report: &mut BatchReport,
        index: usize,
        total: usize,
        name: &str,
        result: &ConversionResult,
    ) {
        report.record(name, result);
        if let Some(observer) = &self.observer {
            observer(&BatchItem {
                index,
                total,
                name,
                result,
            });
        }
    }
}

/// Flag every job whose output path an earlier job already claims.
fn mark_collisions(jobs: &mut [Job]) {
    let mut claimed: HashMap<PathBuf, String> = HashMap::new();
    for job in jobs.iter_mut() {
        let output = job.request.output().to_path_buf();
        match claimed.get(&output) {
            Some(first) => job.collides_with = Some(first.clone()),
            None => {
                claimed.insert(output, job.name.clone());
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
