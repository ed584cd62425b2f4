use std::fmt;

use crate::error::ErrorKind;
use crate::types::UnitId;

/// Stage a table worker is in.
///
/// A worker cycles `Idle → BatchPending → Reading → Deduplicating → Merging → Checkpointing →
/// Idle`. `Error` is entered when a step failed and is about to be retried or the unit skipped,
/// `Stopped` once the worker has exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelinePhase {
    Idle,
    BatchPending { unit_id: UnitId },
    Reading { unit_id: UnitId },
    Deduplicating { unit_id: UnitId },
    Merging { unit_id: UnitId },
    Checkpointing { unit_id: UnitId },
    Error {
        unit_id: UnitId,
        kind: ErrorKind,
        attempt: u32,
    },
    Stopped,
}

impl PipelinePhase {
    pub fn as_type(&self) -> PipelinePhaseType {
        match self {
            PipelinePhase::Idle => PipelinePhaseType::Idle,
            PipelinePhase::BatchPending { .. } => PipelinePhaseType::BatchPending,
            PipelinePhase::Reading { .. } => PipelinePhaseType::Reading,
            PipelinePhase::Deduplicating { .. } => PipelinePhaseType::Deduplicating,
            PipelinePhase::Merging { .. } => PipelinePhaseType::Merging,
            PipelinePhase::Checkpointing { .. } => PipelinePhaseType::Checkpointing,
            PipelinePhase::Error { .. } => PipelinePhaseType::Error,
            PipelinePhase::Stopped => PipelinePhaseType::Stopped,
        }
    }

    /// Returns the unit the worker is busy with, if any.
    pub fn unit_id(&self) -> Option<&UnitId> {
        match self {
            PipelinePhase::BatchPending { unit_id }
            | PipelinePhase::Reading { unit_id }
            | PipelinePhase::Deduplicating { unit_id }
            | PipelinePhase::Merging { unit_id }
            | PipelinePhase::Checkpointing { unit_id }
            | PipelinePhase::Error { unit_id, .. } => Some(unit_id),
            PipelinePhase::Idle | PipelinePhase::Stopped => None,
        }
    }
}

/// Data-less variant of [`PipelinePhase`], for matching and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelinePhaseType {
    Idle,
    BatchPending,
    Reading,
    Deduplicating,
    Merging,
    Checkpointing,
    Error,
    Stopped,
}

impl PipelinePhaseType {
    pub fn as_static_str(&self) -> &'static str {
        match self {
            PipelinePhaseType::Idle => "idle",
            PipelinePhaseType::BatchPending => "batch_pending",
            PipelinePhaseType::Reading => "reading",
            PipelinePhaseType::Deduplicating => "deduplicating",
            PipelinePhaseType::Merging => "merging",
            PipelinePhaseType::Checkpointing => "checkpointing",
            PipelinePhaseType::Error => "error",
            PipelinePhaseType::Stopped => "stopped",
        }
    }
}

impl fmt::Display for PipelinePhaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_static_str())
    }
}

impl From<&PipelinePhase> for PipelinePhaseType {
    fn from(phase: &PipelinePhase) -> Self {
        phase.as_type()
    }
}
