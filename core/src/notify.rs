//! User-facing collaborators the core calls but never implements itself.
//!
//! The library returns typed results; anything shown to a person (an error
//! dialog, an "all uploaded" banner, a delete confirmation) goes through
//! these traits so hosts can plug in their own presentation.

use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::upload::{BatchOutcome, BatchReport};

pub trait Notifier: Send + Sync {
    /// A failed operation the user should hear about.
    fn error(&self, _error: &ApiError) {}

    /// One file of a batch failed. Siblings keep going.
    fn upload_failed(&self, _file_name: &str, error: &ApiError) {
        self.error(error);
    }

    /// Fires once per non-empty batch after every file has settled.
    fn batch_finished(&self, _report: &BatchReport) {}
}

/// Reports through `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn error(&self, err: &ApiError) {
        match err.server_message() {
            Some(message) => error!(server_message = %message, "SharePoint request failed"),
            None => error!(error = %err, "SharePoint request failed"),
        }
    }

    fn upload_failed(&self, file_name: &str, err: &ApiError) {
        warn!(file = file_name, error = %err, "upload failed");
    }

    fn batch_finished(&self, report: &BatchReport) {
        let tally = report.tally();
        match report.outcome() {
            BatchOutcome::AllSucceeded => {
                info!(files = tally.attempted(), "all files uploaded successfully")
            }
            BatchOutcome::CompletedWithFailures => warn!(
                succeeded = tally.succeeded(),
                failed = tally.failed(),
                "upload batch completed with failures"
            ),
        }
    }
}

/// Asks the user before a destructive call.
pub trait Confirm: Send + Sync {
    fn confirm(&self, message: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, message: &str) -> bool {
        self(message)
    }
}
