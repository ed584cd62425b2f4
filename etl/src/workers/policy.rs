use crate::error::{ErrorKind, EtlError};

/// What a worker does after an error.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RetryDirective {
    /// Retry the same step after a backoff delay.
    Timed,
    /// Give up on the unit and move on to the next one.
    Skip,
    /// Stop the table worker.
    Fatal,
}

/// How an [`EtlError`] is handled by table workers.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ErrorHandlingPolicy {
    retry_directive: RetryDirective,
    solution: Option<&'static str>,
}

impl ErrorHandlingPolicy {
    const fn new(retry_directive: RetryDirective, solution: Option<&'static str>) -> Self {
        Self {
            retry_directive,
            solution,
        }
    }

    pub fn retry_directive(&self) -> RetryDirective {
        self.retry_directive
    }

    /// Returns an optional operator-facing hint.
    pub fn solution(&self) -> Option<&'static str> {
        self.solution
    }
}

/// Classifies `error` into an [`ErrorHandlingPolicy`].
pub fn build_error_handling_policy(error: &EtlError) -> ErrorHandlingPolicy {
    match error.kind() {
        // Re-reading the same records cannot make them valid.
        ErrorKind::SchemaMismatch => ErrorHandlingPolicy::new(
            RetryDirective::Skip,
            Some("Fix the producer of the unit or the declared table schema, then re-submit the unit under a new name."),
        ),

        ErrorKind::ReadFailure | ErrorKind::MergeConflict | ErrorKind::WriteFailure => {
            ErrorHandlingPolicy::new(RetryDirective::Timed, None)
        }

        ErrorKind::CheckpointWriteFailure => ErrorHandlingPolicy::new(
            RetryDirective::Fatal,
            Some("Verify the checkpoint location is writable. Units merged but not checkpointed are merged again on restart."),
        ),
        ErrorKind::ConfigError | ErrorKind::MissingTableSchema => ErrorHandlingPolicy::new(
            RetryDirective::Fatal,
            Some("Update the table declarations in the pipeline configuration."),
        ),

        #[cfg(feature = "failpoints")]
        ErrorKind::WithNoRetry => {
            ErrorHandlingPolicy::new(RetryDirective::Fatal, Some("Cannot retry this error."))
        }
        #[cfg(feature = "failpoints")]
        ErrorKind::WithTimedRetry => ErrorHandlingPolicy::new(
            RetryDirective::Timed,
            Some("Will automatically retry after the configured delay."),
        ),

        _ => ErrorHandlingPolicy::new(
            RetryDirective::Fatal,
            Some("There is no single prescribed solution for this error. Inspect the error detail, fix the cause and restart the pipeline."),
        ),
    }
}
