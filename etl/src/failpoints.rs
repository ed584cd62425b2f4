use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};

/// Fires before a deduplicated batch is committed to its target table.
pub const MERGE_BEFORE_COMMIT: &str = "merge.before_commit";
/// Fires after a merge committed and before the unit is recorded as processed.
pub const CHECKPOINT_BEFORE_PERSIST: &str = "checkpoint.before_persist";

pub fn etl_fail_point(name: &str) -> EtlResult<()> {
    fail_point!(name, |parameter| {
        let error_kind = match parameter.as_deref() {
            Some("timed_retry") => ErrorKind::WithTimedRetry,
            Some("merge_conflict") => ErrorKind::MergeConflict,
            Some("write_failure") => ErrorKind::WriteFailure,
            Some("checkpoint_write_failure") => ErrorKind::CheckpointWriteFailure,
            _ => ErrorKind::WithNoRetry,
        };

        bail!(
            error_kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
