//! `CoupleError`: unified error type for mesh-couple public APIs
//!
//! Every fallible public operation in this crate reports through this enum.
//! Precondition violations (bad dimension, negative safety factor, phase
//! misuse) indicate a configuration error upstream; communication variants
//! carry the offending neighbor rank so a stalled or malformed exchange can
//! be attributed.

use thiserror::Error;

/// Unified error type for mesh-couple operations.
#[derive(Debug, Error)]
pub enum CoupleError {
    /// Spatial dimension must be at least 1.
    #[error("spatial dimension must be at least 1, got {0}")]
    InvalidDimension(usize),
    /// Safety factor must be non-negative.
    #[error("safety factor must be non-negative, got {0}")]
    InvalidSafetyFactor(f64),
    /// A rank outside the participant's group was named.
    #[error("rank {rank} is not a worker rank in a group of {group_size}")]
    InvalidRank { rank: usize, group_size: usize },
    /// An exchange method was called out of phase order.
    #[error("exchange phase mismatch: expected {expected}, found {found}")]
    ProtocolPhase {
        expected: &'static str,
        found: &'static str,
    },
    /// A coordinator-only operation ran without an inter-participant link.
    #[error("coordinator context is missing its inter-participant link")]
    MissingPeerLink,
    /// A point-to-point transfer failed or produced a malformed payload.
    #[error("communication with rank {neighbor} failed: {source}")]
    CommError {
        neighbor: usize,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CoupleError {
    /// Shorthand for a [`CoupleError::CommError`] with a plain message.
    pub fn comm(neighbor: usize, msg: impl Into<String>) -> Self {
        CoupleError::CommError {
            neighbor,
            source: msg.into().into(),
        }
    }
}
