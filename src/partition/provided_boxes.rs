//! Providing side of the bounding-box exchange.
//!
//! The mirror image of [`received_boxes`](crate::partition::received_boxes):
//! workers hand their local box to the coordinator, the coordinator ships
//! the assembled dense map across the inter-participant link, then receives
//! the aggregated overlap feedback and redistributes it through the group.
//! Each rank finally inverts the map into the list of remote ranks that
//! will address it, so later data transfer can prune its sends.

use log::{debug, trace};

use crate::algs::communicator::Communicator;
use crate::couple_error::CoupleError;
use crate::geometry::{AxisBox, MeshBounds};
use crate::partition::channel;
use crate::partition::context::{CouplingContext, GroupRole};
use crate::partition::{ExchangeCommTags, FeedbackMap};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ProvidePhase {
    Idle,
    LocalBoxReady,
    MapSent,
    Done,
}

impl ProvidePhase {
    fn name(self) -> &'static str {
        match self {
            ProvidePhase::Idle => "idle",
            ProvidePhase::LocalBoxReady => "local-box-ready",
            ProvidePhase::MapSent => "map-sent",
            ProvidePhase::Done => "done",
        }
    }
}

/// Result of one completed provide-side exchange on one rank.
#[derive(Clone, Debug)]
pub struct ProvideOutcome {
    feedback: FeedbackMap,
    connected_ranks: Vec<usize>,
}

impl ProvideOutcome {
    /// The aggregated feedback as received: remote (receiving-side) rank →
    /// the providing-side ranks it overlaps.
    pub fn feedback(&self) -> &FeedbackMap {
        &self.feedback
    }

    /// Remote ranks whose region overlaps *this* rank's box, ascending.
    pub fn connected_ranks(&self) -> &[usize] {
        &self.connected_ranks
    }

    pub fn any_overlap(&self) -> bool {
        self.feedback.values().any(|ids| !ids.is_empty())
    }
}

/// The providing participant's view of one bounding-box exchange.
pub struct ProvidedBoxExchange {
    dims: usize,
    tags: ExchangeCommTags,
    local_box: AxisBox,
    box_map: Vec<AxisBox>,
    phase: ProvidePhase,
}

impl ProvidedBoxExchange {
    pub fn new(dims: usize) -> Result<Self, CoupleError> {
        if dims == 0 {
            return Err(CoupleError::InvalidDimension(dims));
        }
        Ok(Self {
            dims,
            tags: ExchangeCommTags::default(),
            local_box: AxisBox::neutral(dims),
            box_map: Vec::new(),
            phase: ProvidePhase::Idle,
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

    /// The assembled dense map; populated on the coordinator after
    /// [`provide_boxes`](Self::provide_boxes), empty on workers.
    pub fn box_map(&self) -> &[AxisBox] {
        &self.box_map
    }

    fn expect_phase(&self, expected: ProvidePhase) -> Result<(), CoupleError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(CoupleError::ProtocolPhase {
                expected: expected.name(),
                found: self.phase.name(),
            })
        }
    }

    /// Rebuild this rank's box from its mesh. The providing side ships raw
    /// mesh extents; the safety margin is applied by the receiving side.
    pub fn set_local_box(&mut self, mesh: &dyn MeshBounds) {
        self.local_box = AxisBox::neutral(self.dims);
        self.local_box.merge_from(&mesh.bounding_box());
        debug!("provided local box: {:?}", self.local_box);
        self.box_map.clear();
        self.phase = ProvidePhase::LocalBoxReady;
    }

    /// Gather the group's boxes on the coordinator and ship the dense map
    /// (count first) across the inter-participant link.
    pub fn provide_boxes<G, M>(
        &mut self,
        ctx: &CouplingContext<G, M>,
    ) -> Result<(), CoupleError>
    where
        G: Communicator,
        M: Communicator,
    {
        self.expect_phase(ProvidePhase::LocalBoxReady)?;
        trace!("box provide: gather phase, rank {}", ctx.rank());

        match ctx.role() {
            GroupRole::Coordinator => {
                let group = ctx.group();
                self.box_map = vec![AxisBox::sentinel(self.dims); ctx.group_size()];
                self.box_map[0] = self.local_box.clone();
                // Workers are collected sequentially, in ascending rank order.
                for rank in 1..ctx.group_size() {
                    channel::recv_box_into(
                        group,
                        rank,
                        self.tags.gather_box,
                        &mut self.box_map[rank],
                    )?;
                }

                let link = ctx.peer_link()?;
                channel::send_count(
                    link.comm(),
                    link.peer(),
                    self.tags.remote_count,
                    self.box_map.len(),
                );
                channel::send_box_map(
                    link.comm(),
                    link.peer(),
                    self.tags.box_map,
                    &self.box_map,
                );
            }
            GroupRole::Worker => {
                channel::send_box(ctx.group(), 0, self.tags.gather_box, &self.local_box);
            }
        }

        self.phase = ProvidePhase::MapSent;
        Ok(())
    }

    /// Receive the aggregated feedback from the remote coordinator,
    /// redistribute it through the group, and invert it for this rank.
    pub fn collect_feedback<G, M>(
        &mut self,
        ctx: &CouplingContext<G, M>,
    ) -> Result<ProvideOutcome, CoupleError>
    where
        G: Communicator,
        M: Communicator,
    {
        self.expect_phase(ProvidePhase::MapSent)?;
        trace!("box provide: feedback phase, rank {}", ctx.rank());

        let feedback = match ctx.role() {
            GroupRole::Coordinator => {
                let link = ctx.peer_link()?;
                let n_entries =
                    channel::recv_count(link.comm(), link.peer(), self.tags.aggregate_count)?;
                let feedback = if n_entries > 0 {
                    channel::recv_feedback_map(
                        link.comm(),
                        link.peer(),
                        self.tags.aggregate_hdrs,
                        self.tags.aggregate_ranks,
                        n_entries,
                    )?
                } else {
                    FeedbackMap::new()
                };

                let group = ctx.group();
                channel::broadcast_count(
                    group,
                    ctx.group_size(),
                    self.tags.feedback_bcast_count,
                    feedback.len(),
                );
                if !feedback.is_empty() {
                    channel::broadcast_feedback_map(
                        group,
                        ctx.group_size(),
                        self.tags.feedback_bcast_hdrs,
                        self.tags.feedback_bcast_ranks,
                        &feedback,
                    );
                }
                feedback
            }
            GroupRole::Worker => {
                let group = ctx.group();
                let n_entries =
                    channel::recv_count(group, 0, self.tags.feedback_bcast_count)?;
                if n_entries > 0 {
                    channel::recv_feedback_map(
                        group,
                        0,
                        self.tags.feedback_bcast_hdrs,
                        self.tags.feedback_bcast_ranks,
                        n_entries,
                    )?
                } else {
                    FeedbackMap::new()
                }
            }
        };

        let connected_ranks = invert_for_rank(&feedback, ctx.rank());
        self.phase = ProvidePhase::Done;
        Ok(ProvideOutcome {
            feedback,
            connected_ranks,
        })
    }
}

/// Remote ranks whose feedback entry names `rank`, in ascending order.
fn invert_for_rank(feedback: &FeedbackMap, rank: usize) -> Vec<usize> {
    feedback
        .iter()
        .filter(|(_, ids)| ids.contains(&rank))
        .map(|(&remote, _)| remote)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;

    #[test]
    fn phases_must_run_in_order() {
        let mut ex = ProvidedBoxExchange::new(2).unwrap();
        let ctx = CouplingContext::<NoComm, NoComm>::worker(NoComm, 1, 2).unwrap();
        assert!(matches!(
            ex.provide_boxes(&ctx),
            Err(CoupleError::ProtocolPhase { .. })
        ));
        assert!(matches!(
            ex.collect_feedback(&ctx),
            Err(CoupleError::ProtocolPhase { .. })
        ));
    }

    #[test]
    fn inversion_lists_remote_ranks_naming_us() {
        let mut feedback = FeedbackMap::new();
        feedback.insert(0, vec![0, 2]);
        feedback.insert(1, vec![1]);
        feedback.insert(3, vec![0]);
        assert_eq!(invert_for_rank(&feedback, 0), vec![0, 3]);
        assert_eq!(invert_for_rank(&feedback, 1), vec![1]);
        assert_eq!(invert_for_rank(&feedback, 4), Vec::<usize>::new());
    }

    #[test]
    fn set_local_box_uses_mesh_extents_unchanged() {
        let mut ex = ProvidedBoxExchange::new(2).unwrap();
        let mesh = AxisBox::from_pairs(&[(0.5, 0.5), (0.5, 0.5)]);
        ex.set_local_box(&mesh);
        assert_eq!(ex.local_box(), &mesh);
    }
}
