//! Explicit role and channel state for one rank of a coupled participant.
//!
//! Role flags and communication handles are passed into the protocol as one
//! context object rather than read from ambient globals: the group role, the
//! intra-participant group communicator, and (on the coordinator only) the
//! link to the remote participant's coordinator.

use crate::algs::communicator::Communicator;
use crate::couple_error::CoupleError;

/// A rank is either its group's single coordinator or a worker.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum GroupRole {
    Coordinator,
    Worker,
}

impl GroupRole {
    #[inline]
    pub fn is_coordinator(self) -> bool {
        matches!(self, GroupRole::Coordinator)
    }
    #[inline]
    pub fn is_worker(self) -> bool {
        matches!(self, GroupRole::Worker)
    }
}

/// Coordinator-to-coordinator link: a communicator plus the peer's id on it.
pub struct PeerLink<M: Communicator> {
    comm: M,
    peer: usize,
}

impl<M: Communicator> PeerLink<M> {
    pub fn new(comm: M, peer: usize) -> Self {
        Self { comm, peer }
    }

    #[inline]
    pub fn comm(&self) -> &M {
        &self.comm
    }
    #[inline]
    pub fn peer(&self) -> usize {
        self.peer
    }
}

/// Everything one rank needs to run an exchange: its role, its position in
/// the group, the group communicator, and (coordinator only) the peer link.
pub struct CouplingContext<G: Communicator, M: Communicator> {
    role: GroupRole,
    rank: usize,
    group_size: usize,
    group: G,
    peer_link: Option<PeerLink<M>>,
}

impl<G: Communicator, M: Communicator> CouplingContext<G, M> {
    /// Context for the group coordinator. The coordinator is rank 0 by
    /// convention and must hold the inter-participant link.
    pub fn coordinator(group: G, group_size: usize, link: PeerLink<M>) -> Result<Self, CoupleError> {
        if group_size == 0 {
            return Err(CoupleError::InvalidRank {
                rank: 0,
                group_size,
            });
        }
        Ok(Self {
            role: GroupRole::Coordinator,
            rank: 0,
            group_size,
            group,
            peer_link: Some(link),
        })
    }

    /// Context for a worker rank (`1 <= rank < group_size`).
    pub fn worker(group: G, rank: usize, group_size: usize) -> Result<Self, CoupleError> {
        if rank == 0 || rank >= group_size {
            return Err(CoupleError::InvalidRank { rank, group_size });
        }
        Ok(Self {
            role: GroupRole::Worker,
            rank,
            group_size,
            group,
            peer_link: None,
        })
    }

    #[inline]
    pub fn role(&self) -> GroupRole {
        self.role
    }
    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }
    #[inline]
    pub fn group_size(&self) -> usize {
        self.group_size
    }
    #[inline]
    pub fn group(&self) -> &G {
        &self.group
    }

    /// The inter-participant link; erring on workers.
    pub fn peer_link(&self) -> Result<&PeerLink<M>, CoupleError> {
        self.peer_link.as_ref().ok_or(CoupleError::MissingPeerLink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;

    #[test]
    fn coordinator_is_rank_zero_with_link() {
        let ctx =
            CouplingContext::coordinator(NoComm, 3, PeerLink::new(NoComm, 0)).unwrap();
        assert!(ctx.role().is_coordinator());
        assert_eq!(ctx.rank(), 0);
        assert!(ctx.peer_link().is_ok());
    }

    #[test]
    fn worker_rank_must_be_in_group() {
        assert!(CouplingContext::<NoComm, NoComm>::worker(NoComm, 0, 3).is_err());
        assert!(CouplingContext::<NoComm, NoComm>::worker(NoComm, 3, 3).is_err());
        let ctx = CouplingContext::<NoComm, NoComm>::worker(NoComm, 2, 3).unwrap();
        assert!(ctx.role().is_worker());
        assert!(matches!(
            ctx.peer_link(),
            Err(CoupleError::MissingPeerLink)
        ));
    }

    #[test]
    fn empty_group_is_rejected() {
        assert!(
            CouplingContext::coordinator(NoComm, 0, PeerLink::new(NoComm, 0)).is_err()
        );
    }
}
