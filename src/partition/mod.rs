//! Partition-overlap resolution between two coupled participants.
//!
//! Before field data can flow between two independently-decomposed
//! simulations, every rank must learn which remote ranks hold geometry that
//! spatially overlaps its own region. The modules here implement both sides
//! of that negotiation: the *receiving* participant pulls the remote
//! per-rank bounding boxes in, distributes them through its group, and
//! returns per-rank overlap feedback; the *providing* participant gathers
//! its ranks' boxes, ships them across, and redistributes the feedback.

pub mod channel;
pub mod context;
pub mod provided_boxes;
pub mod received_boxes;

use crate::algs::communicator::CommTag;
use std::collections::BTreeMap;

/// Per-exchange map from local rank id to the ascending list of remote rank
/// ids judged overlapping with that rank's box.
///
/// An absent entry and an entry with an empty list are equivalent; consumers
/// must not distinguish them. The ordered map gives the ascending-rank wire
/// order for free.
pub type FeedbackMap = BTreeMap<usize, Vec<usize>>;

/// Tag block for one complete bounding-box exchange.
///
/// Both participants must construct their block from the same base so the
/// inter-participant messages pair up. Tags on the group channel and on the
/// peer link live in disjoint universes, but distinct values keep mailbox
/// backends honest.
#[derive(Copy, Clone, Debug)]
pub struct ExchangeCommTags {
    /// Peer link: remote worker-rank count, provider → receiver.
    pub remote_count: CommTag,
    /// Peer link: the dense box map, provider → receiver.
    pub box_map: CommTag,
    /// Peer link: aggregated feedback-map entry count, receiver → provider.
    pub aggregate_count: CommTag,
    /// Peer link: feedback-map entry headers, receiver → provider.
    pub aggregate_hdrs: CommTag,
    /// Peer link: concatenated feedback rank ids, receiver → provider.
    pub aggregate_ranks: CommTag,
    /// Receiver group: broadcast of the remote rank count.
    pub bcast_count: CommTag,
    /// Receiver group: broadcast of the remote box map.
    pub bcast_boxes: CommTag,
    /// Receiver group: per-worker feedback length, worker → coordinator.
    pub feedback_count: CommTag,
    /// Receiver group: per-worker feedback ids, worker → coordinator.
    pub feedback_ranks: CommTag,
    /// Provider group: per-worker local box, worker → coordinator.
    pub gather_box: CommTag,
    /// Provider group: broadcast of the feedback-map entry count.
    pub feedback_bcast_count: CommTag,
    /// Provider group: broadcast of the feedback-map entry headers.
    pub feedback_bcast_hdrs: CommTag,
    /// Provider group: broadcast of the concatenated feedback ids.
    pub feedback_bcast_ranks: CommTag,
}

impl ExchangeCommTags {
    /// Construct a tag block from a base, assigning deterministic offsets.
    pub const fn from_base(base: CommTag) -> Self {
        Self {
            remote_count: base,
            box_map: base.offset(1),
            aggregate_count: base.offset(2),
            aggregate_hdrs: base.offset(3),
            aggregate_ranks: base.offset(4),
            bcast_count: base.offset(5),
            bcast_boxes: base.offset(6),
            feedback_count: base.offset(7),
            feedback_ranks: base.offset(8),
            gather_box: base.offset(9),
            feedback_bcast_count: base.offset(10),
            feedback_bcast_hdrs: base.offset(11),
            feedback_bcast_ranks: base.offset(12),
        }
    }
}

impl Default for ExchangeCommTags {
    fn default() -> Self {
        Self::from_base(CommTag::new(0xB0C5))
    }
}

pub use context::{CouplingContext, GroupRole, PeerLink};
pub use provided_boxes::{ProvideOutcome, ProvidedBoxExchange};
pub use received_boxes::{OverlapOutcome, ReceivedBoxExchange, overlap_feedback};
