//! Acquisition error taxonomy and failure policy

use contracts::{ContractError, DriverError, FailurePolicy, SerialNumber, Slot};
use thiserror::Error;

/// What an acquisition error does to the acquirer thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Stop the acquirer
    Fatal,
    /// Skip this tick and continue
    Retryable,
}

/// Failure while turning one trigger into one pair
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// A sensor delivered nothing within the retrieval deadline
    #[error("trigger {sequence}: no buffer from {missing:?} within {waited_ms} ms")]
    Timeout {
        sequence: u64,
        waited_ms: u64,
        missing: Vec<Slot>,
    },

    /// The driver marked a delivered buffer as incomplete
    #[error("trigger {sequence}: buffer from {slot} ({serial}) was incompletely grabbed: {description}")]
    IncompleteFrame {
        sequence: u64,
        slot: Slot,
        serial: SerialNumber,
        code: Option<u32>,
        description: String,
    },

    /// Any other driver-layer failure
    #[error("device error: {0}")]
    Device(#[from] DriverError),

    /// The same slot answered twice for one trigger (stale buffer)
    #[error("trigger {sequence}: {slot} delivered twice")]
    DuplicateSlot { sequence: u64, slot: Slot },

    /// Buffer from a device outside the slot map
    #[error("buffer from unknown camera context {context}")]
    UnknownContext { context: usize },

    /// Assembled pair violates the pairing invariant
    #[error("pairing error: {0}")]
    Pairing(#[source] ContractError),

    /// A run of retryable failures exceeded `max_consecutive_failures`
    #[error("{count} consecutive acquisition failures, last: {last}")]
    FailureLimit {
        count: u32,
        #[source]
        last: Box<AcquisitionError>,
    },
}

impl AcquisitionError {
    /// Classify under the configured failure policy.
    ///
    /// Device, pairing and limit errors are fatal regardless of policy.
    pub fn severity(&self, policy: FailurePolicy) -> Severity {
        match self {
            Self::Timeout { .. }
            | Self::IncompleteFrame { .. }
            | Self::DuplicateSlot { .. }
            | Self::UnknownContext { .. } => match policy {
                FailurePolicy::Abort => Severity::Fatal,
                FailurePolicy::Skip => Severity::Retryable,
            },
            Self::Device(_) | Self::Pairing(_) | Self::FailureLimit { .. } => Severity::Fatal,
        }
    }

    /// Short label (used for metrics)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::IncompleteFrame { .. } => "incomplete_frame",
            Self::Device(_) => "device",
            Self::DuplicateSlot { .. } => "duplicate_slot",
            Self::UnknownContext { .. } => "unknown_context",
            Self::Pairing(_) => "pairing",
            Self::FailureLimit { .. } => "failure_limit",
        }
    }
}
