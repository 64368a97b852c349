//! Bulk upload: read N local files, upload them concurrently, report once.
//!
//! # Design
//! Every file is read into memory in full and sent in a single request with
//! `overwrite=true`. Uploads run concurrently and fail independently. The
//! `UploadTally` counts `{attempted, succeeded, failed}` and the batch is
//! complete exactly when `attempted == succeeded + failed`, which is when
//! the notifier hears about it, with a distinct outcome for partial failure.

use std::path::{Path, PathBuf};

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::executor::RequestExecutor;
use crate::notify::Notifier;
use crate::transport::Transport;

/// A file to upload, either on disk or already in memory.
#[derive(Debug, Clone)]
pub struct LocalFile {
    name: String,
    source: FileSource,
}

#[derive(Debug, Clone)]
enum FileSource {
    Path(PathBuf),
    Memory(Vec<u8>),
}

impl LocalFile {
    /// Upload `path` under its own file name.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ApiError::InvalidInput(format!("{} has no file name", path.display())))?;
        Ok(Self {
            name: name.to_string(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    pub fn from_bytes(name: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            source: FileSource::Memory(contents),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn read(self) -> Result<(String, Vec<u8>), ApiError> {
        let contents = match self.source {
            FileSource::Path(path) => tokio::fs::read(&path).await?,
            FileSource::Memory(contents) => contents,
        };
        Ok((self.name, contents))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    AllSucceeded,
    CompletedWithFailures,
}

/// Completion counter for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTally {
    attempted: usize,
    succeeded: usize,
    failed: usize,
}

impl UploadTally {
    pub fn new(attempted: usize) -> Self {
        Self {
            attempted,
            succeeded: 0,
            failed: 0,
        }
    }

    pub fn attempted(&self) -> usize {
        self.attempted
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Ignored once every attempted file has settled.
    pub fn record_success(&mut self) {
        if !self.is_complete() {
            self.succeeded += 1;
        }
    }

    /// Ignored once every attempted file has settled.
    pub fn record_failure(&mut self) {
        if !self.is_complete() {
            self.failed += 1;
        }
    }

    pub fn is_complete(&self) -> bool {
        self.succeeded + self.failed == self.attempted
    }

    /// `None` while files are still in flight.
    pub fn outcome(&self) -> Option<BatchOutcome> {
        if !self.is_complete() {
            return None;
        }
        Some(if self.failed == 0 {
            BatchOutcome::AllSucceeded
        } else {
            BatchOutcome::CompletedWithFailures
        })
    }
}

#[derive(Debug, Clone)]
pub struct UploadFailure {
    pub file_name: String,
    pub error: ApiError,
}

/// What happened to a finished batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    tally: UploadTally,
    uploaded: Vec<Value>,
    failures: Vec<UploadFailure>,
}

impl BatchReport {
    pub fn tally(&self) -> UploadTally {
        self.tally
    }

    pub fn outcome(&self) -> BatchOutcome {
        self.tally
            .outcome()
            .unwrap_or(BatchOutcome::CompletedWithFailures)
    }

    /// Server metadata of each uploaded file, in completion order.
    pub fn uploaded(&self) -> &[Value] {
        &self.uploaded
    }

    pub fn failures(&self) -> &[UploadFailure] {
        &self.failures
    }
}

impl<T: Transport> RequestExecutor<T> {
    /// Upload `files` into the server-relative `folder_url`, all at once.
    ///
    /// A failing file is reported to `notifier` as soon as it fails and does
    /// not cancel its siblings. `batch_finished` fires after the last file
    /// settles; an empty batch reports nothing.
    pub async fn upload_files(
        &self,
        site_url: Option<&str>,
        folder_url: &str,
        files: Vec<LocalFile>,
        notifier: &dyn Notifier,
    ) -> BatchReport {
        let mut report = BatchReport {
            tally: UploadTally::new(files.len()),
            uploaded: Vec::new(),
            failures: Vec::new(),
        };
        if files.is_empty() {
            return report;
        }

        let mut in_flight: FuturesUnordered<_> = files
            .into_iter()
            .map(|file| async move {
                let name = file.name().to_string();
                let result = async {
                    let (name, contents) = file.read().await?;
                    debug!(file = %name, bytes = contents.len(), "read local file");
                    self.upload_file(site_url, folder_url, &name, contents, true).await
                }
                .await;
                (name, result)
            })
            .collect();

        while let Some((file_name, result)) = in_flight.next().await {
            match result {
                Ok(metadata) => {
                    report.tally.record_success();
                    report.uploaded.push(metadata);
                }
                Err(error) => {
                    report.tally.record_failure();
                    notifier.upload_failed(&file_name, &error);
                    report.failures.push(UploadFailure { file_name, error });
                }
            }
        }

        info!(
            attempted = report.tally.attempted(),
            succeeded = report.tally.succeeded(),
            failed = report.tally.failed(),
            "upload batch settled"
        );
        notifier.batch_finished(&report);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_completes_only_when_every_file_settled() {
        let mut tally = UploadTally::new(3);
        tally.record_success();
        tally.record_failure();
        assert!(!tally.is_complete());
        assert_eq!(tally.outcome(), None);
        tally.record_success();
        assert!(tally.is_complete());
        assert_eq!(tally.outcome(), Some(BatchOutcome::CompletedWithFailures));
    }

    #[test]
    fn tally_all_succeeded() {
        let mut tally = UploadTally::new(2);
        tally.record_success();
        tally.record_success();
        assert_eq!(tally.outcome(), Some(BatchOutcome::AllSucceeded));
    }

    #[test]
    fn tally_saturates_once_complete() {
        let mut tally = UploadTally::new(1);
        tally.record_failure();
        tally.record_success();
        tally.record_failure();
        assert_eq!((tally.succeeded(), tally.failed()), (0, 1));
        assert_eq!(tally.outcome(), Some(BatchOutcome::CompletedWithFailures));

        let mut empty = UploadTally::new(0);
        empty.record_success();
        assert_eq!(empty.succeeded(), 0);
    }

    #[test]
    fn empty_tally_is_vacuously_complete() {
        assert_eq!(UploadTally::new(0).outcome(), Some(BatchOutcome::AllSucceeded));
    }

    #[test]
    fn local_file_name_comes_from_path() {
        let file = LocalFile::from_path("/tmp/reports/q3.xlsx").unwrap();
        assert_eq!(file.name(), "q3.xlsx");
        assert!(matches!(LocalFile::from_path("/"), Err(ApiError::InvalidInput(_))));
    }
}
