//! Filter stage: select records by organism and write compacted outputs
//!
//! For an archive `gbbct1.seq.gz` the stage writes, under the save directory:
//! - `gbbct1.seq.bgz`: BGZF intermediate holding the matched records, removed
//!   once the final output is written
//! - `gbbct1.seq.sel.gz`: the final gzip output
//!
//! Archives without a single matching record produce no files.

use crate::classify::ClassificationRule;
use crate::codec::bgzf::{BlockWriter, recompress, remove_if_exists};
use crate::codec::{CodecError, RecordCodec};
use crate::dispatch::{ExecutionStrategy, TaskDispatcher, spread};
use crate::error::{Error, FilterError, Result};
use crate::manifest::ArchivePattern;
use flate2::read::MultiGzDecoder;
use futures::StreamExt;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extension of the BGZF intermediate
const INTERMEDIATE_EXTENSION: &str = "bgz";
/// Extension of the final output
const OUTPUT_EXTENSION: &str = "sel.gz";

/// Matched and scanned record counts for one archive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SelectionResult {
    /// Records written (or that would be written, in a dry run)
    pub matched: u64,
    /// Records scanned
    pub total: u64,
}

/// Outcome of filtering one archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSelection {
    /// The source archive
    pub path: PathBuf,
    /// Record counts
    pub result: SelectionResult,
    /// The final output, when one was written
    pub output: Option<PathBuf>,
}

/// An archive that could not be filtered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    /// The source archive
    pub path: PathBuf,
    /// Error description
    pub reason: String,
}

/// Aggregate of one filter run
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterReport {
    /// Archives processed successfully
    pub files: Vec<FileSelection>,
    /// Archives skipped because of an error
    pub failures: Vec<FileFailure>,
}

impl FilterReport {
    /// Records selected across all archives
    pub fn total_matched(&self) -> u64 {
        self.files.iter().map(|f| f.result.matched).sum()
    }

    /// Records scanned across all archives
    pub fn total_scanned(&self) -> u64 {
        self.files.iter().map(|f| f.result.total).sum()
    }

    /// Selection for one archive, if it was processed
    pub fn selection_for(&self, path: &Path) -> Option<&FileSelection> {
        self.files.iter().find(|f| f.path == path)
    }
}

/// Paths of the BGZF intermediate and the final output for an archive
pub fn output_paths(save_dir: &Path, archive: &Path) -> (PathBuf, PathBuf) {
    let stem = archive
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    (
        save_dir.join(format!("{}.{}", stem, INTERMEDIATE_EXTENSION)),
        save_dir.join(format!("{}.{}", stem, OUTPUT_EXTENSION)),
    )
}

/// List archives in `dir` ending in the pattern's suffix, in index order
pub fn discover_archives(dir: &Path, pattern: &ArchivePattern) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().ends_with(pattern.suffix()) {
            files.push(entry.path());
        }
    }
    pattern.sort_paths(&mut files);
    Ok(files)
}

/// Settings shared by every archive of one filter run
pub struct FilterJob {
    codec: Arc<dyn RecordCodec>,
    rule: ClassificationRule,
    save_dir: PathBuf,
    dry_run: bool,
}

impl FilterJob {
    /// Create a job writing into `save_dir`
    pub fn new(
        codec: Arc<dyn RecordCodec>,
        rule: ClassificationRule,
        save_dir: impl Into<PathBuf>,
        dry_run: bool,
    ) -> Self {
        Self {
            codec,
            rule,
            save_dir: save_dir.into(),
            dry_run,
        }
    }

    /// Filter one archive (blocking)
    ///
    /// The archive is decompressed and decoded as a stream. Matched records
    /// go to the BGZF intermediate as they are found; the intermediate is
    /// only created once the first record matches.
    pub fn process(&self, archive: &Path) -> std::result::Result<FileSelection, FilterError> {
        let (bgz_path, out_path) = output_paths(&self.save_dir, archive);
        let mut writer = None;

        let result = match self.scan(archive, &bgz_path, &mut writer) {
            Ok(result) => result,
            Err(e) => {
                drop(writer);
                discard(&bgz_path);
                return Err(e);
            }
        };

        let Some(writer) = writer else {
            tracing::debug!(path = ?archive, total = result.total, dry_run = self.dry_run, "no output written");
            return Ok(FileSelection {
                path: archive.to_path_buf(),
                result,
                output: None,
            });
        };

        let written = writer
            .finish()
            .and_then(|_| recompress(&bgz_path, &out_path))
            .map_err(|e| FilterError::io(&out_path, e));
        discard(&bgz_path);
        if let Err(e) = written {
            discard(&out_path);
            return Err(e);
        }

        tracing::debug!(
            path = ?archive,
            output = ?out_path,
            matched = result.matched,
            total = result.total,
            "archive filtered"
        );
        Ok(FileSelection {
            path: archive.to_path_buf(),
            result,
            output: Some(out_path),
        })
    }

    fn scan(
        &self,
        archive: &Path,
        bgz_path: &Path,
        writer: &mut Option<BlockWriter>,
    ) -> std::result::Result<SelectionResult, FilterError> {
        let file = File::open(archive).map_err(|e| FilterError::io(archive, e))?;
        let reader = BufReader::new(MultiGzDecoder::new(BufReader::new(file)));

        let mut result = SelectionResult::default();
        for record in self.codec.decode(Box::new(reader)) {
            let record = record.map_err(|e| decode_error(archive, e))?;
            result.total += 1;

            if !self.rule.classify(&record).is_match() {
                continue;
            }
            result.matched += 1;
            if self.dry_run {
                continue;
            }

            if writer.is_none() {
                *writer =
                    Some(BlockWriter::create(bgz_path).map_err(|e| FilterError::io(bgz_path, e))?);
            }
            if let Some(block) = writer.as_mut() {
                block
                    .write_record(self.codec.as_ref(), &record)
                    .map_err(|e| FilterError::io(bgz_path, e))?;
            }
        }
        Ok(result)
    }
}

fn decode_error(archive: &Path, err: CodecError) -> FilterError {
    match err {
        CodecError::Unterminated { line } => FilterError::Malformed {
            path: archive.to_path_buf(),
            reason: format!("record starting at line {} is truncated", line),
        },
        CodecError::Stray { line, content } => FilterError::Malformed {
            path: archive.to_path_buf(),
            reason: format!("line {} does not belong to a record: {:?}", line, content),
        },
        CodecError::Io(e)
            if matches!(
                e.kind(),
                io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof
            ) =>
        {
            FilterError::Malformed {
                path: archive.to_path_buf(),
                reason: format!("corrupt compressed stream: {}", e),
            }
        }
        CodecError::Io(e) => FilterError::io(archive, e),
    }
}

/// Best-effort removal of an intermediate file
fn discard(path: &Path) {
    if let Err(e) = remove_if_exists(path) {
        tracing::warn!(path = ?path, error = %e, "failed to remove intermediate file");
    }
}

/// Filters local archives through a worker pool
pub struct FilterStage {
    pattern: ArchivePattern,
    dispatcher: TaskDispatcher,
}

impl FilterStage {
    /// Create a stage recognising archives by `pattern`
    pub fn new(pattern: ArchivePattern, dispatcher: TaskDispatcher) -> Self {
        Self {
            pattern,
            dispatcher,
        }
    }

    /// Filter every archive found in `release_dir`, in index order
    pub async fn run_dir(&self, release_dir: &Path, job: FilterJob) -> Result<FilterReport> {
        let files = discover_archives(release_dir, &self.pattern)?;
        self.run(files, job).await
    }

    /// Filter the given archives
    ///
    /// A failing archive is recorded in [`FilterReport::failures`] and does
    /// not stop the others.
    pub async fn run(&self, files: Vec<PathBuf>, job: FilterJob) -> Result<FilterReport> {
        if !job.dry_run {
            tokio::fs::create_dir_all(&job.save_dir).await?;
        }
        tracing::info!(
            files = files.len(),
            codec = job.codec.name(),
            dry_run = job.dry_run,
            "filtering archives"
        );

        let job = Arc::new(job);
        let items: Vec<(PathBuf, Arc<FilterJob>)> =
            files.into_iter().map(|f| (f, Arc::clone(&job))).collect();
        let worker = spread(|archive: PathBuf, job: Arc<FilterJob>| async move {
            let outcome = tokio::task::spawn_blocking(move || {
                let result = job.process(&archive);
                (archive, result)
            })
            .await?;
            Ok::<_, Error>(outcome)
        });

        let mut report = FilterReport::default();
        let mut outcomes =
            self.dispatcher
                .stream(items, worker, ExecutionStrategy::PooledMultiArg, true);
        while let Some(outcome) = outcomes.next().await {
            match outcome? {
                (_, Ok(selection)) => {
                    report.files.push(selection);
                    tracing::info!(
                        matched = report.total_matched(),
                        scanned = report.total_scanned(),
                        "cumulative selection"
                    );
                }
                (archive, Err(e)) => {
                    tracing::warn!(path = ?archive, error = %e, "skipping archive");
                    report.failures.push(FileFailure {
                        path: archive,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            selected = report.total_matched(),
            failed = report.failures.len(),
            "selected sequences"
        );
        Ok(report)
    }
}
