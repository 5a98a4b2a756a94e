//! Receiving side of the bounding-box exchange.
//!
//! One rank of the receiving participant walks a three-phase machine:
//!
//! 1. **Exchange** (coordinator only): pull the remote worker count and the
//!    dense per-rank box map over the inter-participant link.
//! 2. **Distribute & gather** (all ranks): the coordinator broadcasts the
//!    map through its group, computes its own overlap feedback, then polls
//!    every worker in ascending rank order; workers receive the broadcast,
//!    run the identical overlap predicate, and answer with a count followed
//!    by the id sequence only when the count is non-zero.
//! 3. **Return** (coordinator only): ship the aggregated feedback map back
//!    to the remote coordinator, size first, body only if non-empty.
//!
//! Phase transitions are gated on completion of the prior phase's blocking
//! operations; calling a step out of order is reported, not absorbed.

use log::{debug, trace, warn};

use crate::algs::communicator::Communicator;
use crate::couple_error::CoupleError;
use crate::geometry::{AxisBox, MeshBounds};
use crate::partition::channel;
use crate::partition::context::{CouplingContext, GroupRole};
use crate::partition::{ExchangeCommTags, FeedbackMap};

/// Remote ranks whose box overlaps `local`, in ascending rank order.
pub fn overlap_feedback(local: &AxisBox, remote_boxes: &[AxisBox]) -> Vec<usize> {
    remote_boxes
        .iter()
        .enumerate()
        .filter(|(_, bb)| local.overlaps(bb))
        .map(|(rank, _)| rank)
        .collect()
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ExchangePhase {
    Idle,
    LocalBoxReady,
    RemoteMapReady,
    Done,
}

impl ExchangePhase {
    fn name(self) -> &'static str {
        match self {
            ExchangePhase::Idle => "idle",
            ExchangePhase::LocalBoxReady => "local-box-ready",
            ExchangePhase::RemoteMapReady => "remote-map-ready",
            ExchangePhase::Done => "done",
        }
    }
}

/// Result of one resolved exchange on one rank.
///
/// On the coordinator, `feedback` is the aggregated map for the whole
/// group; on a worker it holds at most the worker's own entry. Empty
/// aggregated feedback is a legitimate outcome (the participants' regions
/// are disjoint), surfaced through [`OverlapOutcome::any_overlap`] rather
/// than an error.
#[derive(Clone, Debug)]
pub struct OverlapOutcome {
    feedback: FeedbackMap,
}

impl OverlapOutcome {
    pub fn feedback(&self) -> &FeedbackMap {
        &self.feedback
    }

    /// Remote ranks judged overlapping with `local_rank`'s box. An absent
    /// entry and an empty entry answer the same.
    pub fn connected_ranks(&self, local_rank: usize) -> &[usize] {
        self.feedback
            .get(&local_rank)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// False when no rank in the map overlaps anything remote.
    pub fn any_overlap(&self) -> bool {
        self.feedback.values().any(|ids| !ids.is_empty())
    }
}

/// The receiving participant's view of one bounding-box exchange. Rebuilt
/// state: the local box and the remote map are reconstructed on every
/// invocation, never cached across coupling setups.
pub struct ReceivedBoxExchange {
    dims: usize,
    safety_factor: f64,
    tags: ExchangeCommTags,
    local_box: AxisBox,
    remote_boxes: Vec<AxisBox>,
    phase: ExchangePhase,
}

impl ReceivedBoxExchange {
    pub fn new(dims: usize, safety_factor: f64) -> Result<Self, CoupleError> {
        if dims == 0 {
            return Err(CoupleError::InvalidDimension(dims));
        }
        if safety_factor < 0.0 {
            return Err(CoupleError::InvalidSafetyFactor(safety_factor));
        }
        Ok(Self {
            dims,
            safety_factor,
            tags: ExchangeCommTags::default(),
            local_box: AxisBox::neutral(dims),
            remote_boxes: Vec::new(),
            phase: ExchangePhase::Idle,
        })
    }

    /// Replace the default tag block. Both participants must agree on it.
    pub fn with_tags(mut self, tags: ExchangeCommTags) -> Self {
        self.tags = tags;
        self
    }

    #[inline]
    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn local_box(&self) -> &AxisBox {
        &self.local_box
    }

    /// The dense remote map, one entry per remote rank. Sentinel entries
    /// remain only if the map was never populated.
    pub fn remote_boxes(&self) -> &[AxisBox] {
        &self.remote_boxes
    }

    fn expect_phase(&self, expected: ExchangePhase) -> Result<(), CoupleError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(CoupleError::ProtocolPhase {
                expected: expected.name(),
                found: self.phase.name(),
            })
        }
    }

    /// Rebuild the local box: reset to neutral, fold in the bounding box of
    /// the upstream mesh of a "from" mapping and/or the downstream mesh of
    /// a "to" mapping, then apply the safety margin. A rank with neither
    /// mapping keeps the neutral box and will report no overlaps.
    ///
    /// May be called from any phase; it restarts the exchange.
    pub fn prepare_local_box(
        &mut self,
        from_mapping: Option<&dyn MeshBounds>,
        to_mapping: Option<&dyn MeshBounds>,
    ) {
        self.local_box = AxisBox::neutral(self.dims);
        if let Some(upstream) = from_mapping {
            self.local_box.merge_from(&upstream.bounding_box());
        }
        if let Some(downstream) = to_mapping {
            self.local_box.merge_from(&downstream.bounding_box());
        }
        self.local_box.apply_margin(self.safety_factor);
        debug!(
            "prepared local box (safety factor {}): {:?}",
            self.safety_factor, self.local_box
        );
        self.remote_boxes.clear();
        self.phase = ExchangePhase::LocalBoxReady;
    }

    /// Phase 1: the coordinator pulls the remote worker count and the
    /// populated box map over the inter-participant link, overwriting a
    /// sentinel-initialized map. Workers pass straight through; their copy
    /// arrives with the phase-2 broadcast.
    pub fn exchange_remote_boxes<G, M>(
        &mut self,
        ctx: &CouplingContext<G, M>,
    ) -> Result<(), CoupleError>
    where
        G: Communicator,
        M: Communicator,
    {
        self.expect_phase(ExchangePhase::LocalBoxReady)?;
        trace!("box exchange: inter-participant phase, rank {}", ctx.rank());

        if ctx.role().is_coordinator() {
            let link = ctx.peer_link()?;
            let n_remote =
                channel::recv_count(link.comm(), link.peer(), self.tags.remote_count)?;
            self.remote_boxes = vec![AxisBox::sentinel(self.dims); n_remote];
            if n_remote > 0 {
                channel::recv_box_map_into(
                    link.comm(),
                    link.peer(),
                    self.tags.box_map,
                    &mut self.remote_boxes,
                )?;
            }
        }

        self.phase = ExchangePhase::RemoteMapReady;
        Ok(())
    }

    /// Phases 2 and 3: distribute the remote map through the group, gather
    /// per-rank overlap feedback, and (coordinator) return the aggregate to
    /// the remote participant.
    pub fn resolve_overlaps<G, M>(
        &mut self,
        ctx: &CouplingContext<G, M>,
    ) -> Result<OverlapOutcome, CoupleError>
    where
        G: Communicator,
        M: Communicator,
    {
        self.expect_phase(ExchangePhase::RemoteMapReady)?;
        trace!("box exchange: intra-participant phase, rank {}", ctx.rank());

        let outcome = match ctx.role() {
            GroupRole::Coordinator => self.resolve_as_coordinator(ctx)?,
            GroupRole::Worker => self.resolve_as_worker(ctx)?,
        };

        self.phase = ExchangePhase::Done;
        Ok(outcome)
    }

    fn resolve_as_coordinator<G, M>(
        &mut self,
        ctx: &CouplingContext<G, M>,
    ) -> Result<OverlapOutcome, CoupleError>
    where
        G: Communicator,
        M: Communicator,
    {
        let group = ctx.group();
        let n_remote = self.remote_boxes.len();

        // Broadcasts precede any feedback traffic.
        channel::broadcast_count(group, ctx.group_size(), self.tags.bcast_count, n_remote);
        if n_remote > 0 {
            channel::broadcast_box_map(
                group,
                ctx.group_size(),
                self.tags.bcast_boxes,
                &self.remote_boxes,
            );
        }

        let mut feedback_map = FeedbackMap::new();
        let own = overlap_feedback(&self.local_box, &self.remote_boxes);
        if !own.is_empty() {
            feedback_map.insert(0, own);
        }

        // Workers are polled sequentially, in ascending rank order.
        for rank in 1..ctx.group_size() {
            let n = channel::recv_count(group, rank, self.tags.feedback_count)?;
            if n != 0 {
                let ids = channel::recv_ranks(group, rank, self.tags.feedback_ranks, n)?;
                feedback_map.insert(rank, ids);
            }
        }

        let link = ctx.peer_link()?;
        channel::send_count(
            link.comm(),
            link.peer(),
            self.tags.aggregate_count,
            feedback_map.len(),
        );
        if feedback_map.is_empty() {
            warn!("aggregated overlap feedback is empty: no local rank overlaps any remote rank");
        } else {
            channel::send_feedback_map(
                link.comm(),
                link.peer(),
                self.tags.aggregate_hdrs,
                self.tags.aggregate_ranks,
                &feedback_map,
            );
        }

        Ok(OverlapOutcome {
            feedback: feedback_map,
        })
    }

    fn resolve_as_worker<G, M>(
        &mut self,
        ctx: &CouplingContext<G, M>,
    ) -> Result<OverlapOutcome, CoupleError>
    where
        G: Communicator,
        M: Communicator,
    {
        let group = ctx.group();
        let n_remote = channel::recv_count(group, 0, self.tags.bcast_count)?;
        self.remote_boxes = vec![AxisBox::sentinel(self.dims); n_remote];
        if n_remote > 0 {
            channel::recv_box_map_into(
                group,
                0,
                self.tags.bcast_boxes,
                &mut self.remote_boxes,
            )?;
        }

        let own = overlap_feedback(&self.local_box, &self.remote_boxes);
        channel::send_count(group, 0, self.tags.feedback_count, own.len());

        let mut feedback_map = FeedbackMap::new();
        if !own.is_empty() {
            channel::send_ranks(group, 0, self.tags.feedback_ranks, &own);
            feedback_map.insert(ctx.rank(), own);
        }

        Ok(OverlapOutcome {
            feedback: feedback_map,
        })
    }
}
