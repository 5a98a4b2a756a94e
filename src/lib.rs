#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-couple
//!
//! mesh-couple is a Rust library for partition-overlap resolution between
//! coupled, spatially-decomposed simulations. Two participants, each a group
//! of cooperating ranks with its own parallel decomposition, negotiate which
//! remote ranks hold geometry overlapping each local rank's region, so a
//! point-to-point topology for later data mapping can be built without an
//! all-to-all exchange.
//!
//! ## Features
//! - Axis-aligned bounding boxes with merge, safety-margin, and an overlap
//!   predicate that never produces false negatives for non-degenerate boxes
//! - The coordinator/worker exchange choreography for both the receiving
//!   and the providing participant, with explicit phase machines
//! - Pluggable communication backends (no-op, in-process mailbox, MPI) plus
//!   a batch wait primitive for overlapping independent sends
//! - Fixed little-endian wire records for every exchanged payload
//!
//! ## Determinism
//!
//! The protocol is fully synchronous: workers are polled in ascending rank
//! order, feedback maps iterate in ascending rank order, and a body is only
//! ever transmitted behind a non-zero count. Runs are reproducible by
//! construction; unit tests that need randomness fix their seeds.
//!
//! ## Usage
//! Add `mesh-couple` as a dependency in your `Cargo.toml` and enable
//! features as needed:
//!
//! ```toml
//! [dependencies]
//! mesh-couple = "0.1"
//! # Optional features:
//! # features = ["mpi-support"]
//! ```

// Re-export our major subsystems:
pub mod algs;
pub mod couple_error;
pub mod geometry;
pub mod partition;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{CommTag, Communicator, LocalComm, NoComm, Wait, wait_all};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::couple_error::CoupleError;
    pub use crate::geometry::{AxisBox, Extent, MeshBounds};
    pub use crate::partition::{
        CouplingContext, ExchangeCommTags, FeedbackMap, GroupRole, OverlapOutcome, PeerLink,
        ProvideOutcome, ProvidedBoxExchange, ReceivedBoxExchange, overlap_feedback,
    };
}
