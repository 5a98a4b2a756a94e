//! Typed blocking operations over a [`Communicator`].
//!
//! The exchange protocol is fully synchronous: every helper here posts a
//! nonblocking transfer and waits on it before returning, validating the
//! payload length against the exact-size buffer it posted. Variable-length
//! payloads always travel behind a count (or a header block) so the
//! receiving side can post an exact-size buffer, and a body is only ever
//! sent when the count is non-zero -- symmetric on producer and consumer.
//!
//! Broadcast is one-to-all from the coordinator, built from per-worker
//! point-to-point sends drained with [`wait_all`]; workers receive their
//! copy with the ordinary point-to-point receive from rank 0.

use bytemuck::Zeroable;
use std::mem::size_of;

use crate::algs::communicator::{CommTag, Communicator, Wait, wait_all};
use crate::algs::wire::{
    WireCount, WireExtent, WireFeedbackHdr, WireRank, cast_slice, cast_slice_mut,
};
use crate::couple_error::CoupleError;
use crate::geometry::AxisBox;
use crate::partition::FeedbackMap;

fn send_bytes<C: Communicator>(comm: &C, peer: usize, tag: CommTag, bytes: &[u8]) {
    let _ = comm.isend(peer, tag.as_u16(), bytes).wait();
}

fn recv_exact<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: CommTag,
    len: usize,
) -> Result<Vec<u8>, CoupleError> {
    let mut buf = vec![0u8; len];
    let h = comm.irecv(peer, tag.as_u16(), &mut buf);
    match h.wait() {
        Some(data) if data.len() == len => Ok(data),
        Some(data) => Err(CoupleError::comm(
            peer,
            format!("expected {len} bytes, got {}", data.len()),
        )),
        None => Err(CoupleError::comm(peer, "receive completed without data")),
    }
}

/// Blocking send of a single count.
pub fn send_count<C: Communicator>(comm: &C, peer: usize, tag: CommTag, n: usize) {
    let cnt = WireCount::new(n);
    send_bytes(comm, peer, tag, cast_slice(std::slice::from_ref(&cnt)));
}

/// Blocking receive of a single count.
pub fn recv_count<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: CommTag,
) -> Result<usize, CoupleError> {
    let data = recv_exact(comm, peer, tag, size_of::<WireCount>())?;
    let mut cnt = WireCount::zeroed();
    cast_slice_mut(std::slice::from_mut(&mut cnt)).copy_from_slice(&data);
    Ok(cnt.get())
}

/// Blocking send of a rank sequence. Callers guard against empty payloads;
/// the count travels separately beforehand.
pub fn send_ranks<C: Communicator>(comm: &C, peer: usize, tag: CommTag, ranks: &[usize]) {
    debug_assert!(!ranks.is_empty(), "empty payloads are never transmitted");
    let wire: Vec<WireRank> = ranks.iter().map(|&r| WireRank::new(r)).collect();
    send_bytes(comm, peer, tag, cast_slice(&wire));
}

/// Blocking receive of a rank sequence of known length.
pub fn recv_ranks<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: CommTag,
    n: usize,
) -> Result<Vec<usize>, CoupleError> {
    let data = recv_exact(comm, peer, tag, n * size_of::<WireRank>())?;
    let mut wire = vec![WireRank::zeroed(); n];
    cast_slice_mut(&mut wire).copy_from_slice(&data);
    Ok(wire.iter().map(WireRank::get).collect())
}

fn encode_extents(boxes: &[AxisBox]) -> Vec<WireExtent> {
    boxes
        .iter()
        .flat_map(|bb| bb.extents().iter().map(|e| WireExtent::new(e.min, e.max)))
        .collect()
}

fn overwrite_from_wire(bb: &mut AxisBox, wire: &[WireExtent]) {
    for (e, w) in bb.extents_mut().iter_mut().zip(wire) {
        e.min = w.min();
        e.max = w.max();
    }
}

/// Blocking send of one bounding box. The receiver knows the dimension.
pub fn send_box<C: Communicator>(comm: &C, peer: usize, tag: CommTag, bb: &AxisBox) {
    let wire = encode_extents(std::slice::from_ref(bb));
    send_bytes(comm, peer, tag, cast_slice(&wire));
}

/// Blocking receive of one bounding box into a pre-dimensioned slot.
pub fn recv_box_into<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: CommTag,
    bb: &mut AxisBox,
) -> Result<(), CoupleError> {
    let dims = bb.dims();
    let data = recv_exact(comm, peer, tag, dims * size_of::<WireExtent>())?;
    let mut wire = vec![WireExtent::zeroed(); dims];
    cast_slice_mut(&mut wire).copy_from_slice(&data);
    overwrite_from_wire(bb, &wire);
    Ok(())
}

/// Blocking send of a dense rank-indexed box map. Callers guard against an
/// empty map; its entry count travels separately beforehand.
pub fn send_box_map<C: Communicator>(comm: &C, peer: usize, tag: CommTag, boxes: &[AxisBox]) {
    debug_assert!(!boxes.is_empty(), "empty payloads are never transmitted");
    let wire = encode_extents(boxes);
    send_bytes(comm, peer, tag, cast_slice(&wire));
}

/// Blocking receive of a dense box map into sentinel-initialized slots.
/// Every slot's dimension fixes the expected payload size.
pub fn recv_box_map_into<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: CommTag,
    boxes: &mut [AxisBox],
) -> Result<(), CoupleError> {
    let dims = match boxes.first() {
        Some(bb) => bb.dims(),
        None => return Ok(()),
    };
    let data = recv_exact(comm, peer, tag, boxes.len() * dims * size_of::<WireExtent>())?;
    let mut wire = vec![WireExtent::zeroed(); boxes.len() * dims];
    cast_slice_mut(&mut wire).copy_from_slice(&data);
    for (i, bb) in boxes.iter_mut().enumerate() {
        overwrite_from_wire(bb, &wire[i * dims..(i + 1) * dims]);
    }
    Ok(())
}

fn feedback_wire(map: &FeedbackMap) -> (Vec<WireFeedbackHdr>, Vec<WireRank>) {
    let hdrs = map
        .iter()
        .map(|(&rank, ids)| WireFeedbackHdr::new(rank, ids.len()))
        .collect();
    let ids = map
        .values()
        .flatten()
        .map(|&r| WireRank::new(r))
        .collect();
    (hdrs, ids)
}

/// Blocking send of a feedback map as entry headers followed by the
/// concatenated rank ids (ids only when any entry is non-empty). The entry
/// count travels separately beforehand; callers guard against empty maps.
pub fn send_feedback_map<C: Communicator>(
    comm: &C,
    peer: usize,
    hdr_tag: CommTag,
    ids_tag: CommTag,
    map: &FeedbackMap,
) {
    debug_assert!(!map.is_empty(), "empty payloads are never transmitted");
    let (hdrs, ids) = feedback_wire(map);
    send_bytes(comm, peer, hdr_tag, cast_slice(&hdrs));
    if !ids.is_empty() {
        send_bytes(comm, peer, ids_tag, cast_slice(&ids));
    }
}

/// Blocking receive of a feedback map with a known entry count.
pub fn recv_feedback_map<C: Communicator>(
    comm: &C,
    peer: usize,
    hdr_tag: CommTag,
    ids_tag: CommTag,
    n_entries: usize,
) -> Result<FeedbackMap, CoupleError> {
    let data = recv_exact(comm, peer, hdr_tag, n_entries * size_of::<WireFeedbackHdr>())?;
    let mut hdrs = vec![WireFeedbackHdr::zeroed(); n_entries];
    cast_slice_mut(&mut hdrs).copy_from_slice(&data);

    let total: usize = hdrs.iter().map(WireFeedbackHdr::len).sum();
    let ids = if total > 0 {
        recv_ranks(comm, peer, ids_tag, total)?
    } else {
        Vec::new()
    };

    let mut map = FeedbackMap::new();
    let mut offset = 0;
    for hdr in &hdrs {
        let entry = ids[offset..offset + hdr.len()].to_vec();
        offset += hdr.len();
        map.insert(hdr.rank(), entry);
    }
    Ok(map)
}

fn broadcast_bytes<C: Communicator>(comm: &C, group_size: usize, tag: CommTag, bytes: &[u8]) {
    let handles: Vec<C::SendHandle> = (1..group_size)
        .map(|worker| comm.isend(worker, tag.as_u16(), bytes))
        .collect();
    wait_all(handles);
}

/// Coordinator-side broadcast of a count to every worker.
pub fn broadcast_count<C: Communicator>(comm: &C, group_size: usize, tag: CommTag, n: usize) {
    let cnt = WireCount::new(n);
    broadcast_bytes(comm, group_size, tag, cast_slice(std::slice::from_ref(&cnt)));
}

/// Coordinator-side broadcast of a non-empty box map to every worker.
pub fn broadcast_box_map<C: Communicator>(
    comm: &C,
    group_size: usize,
    tag: CommTag,
    boxes: &[AxisBox],
) {
    debug_assert!(!boxes.is_empty(), "empty payloads are never transmitted");
    let wire = encode_extents(boxes);
    broadcast_bytes(comm, group_size, tag, cast_slice(&wire));
}

/// Coordinator-side broadcast of a non-empty feedback map to every worker.
pub fn broadcast_feedback_map<C: Communicator>(
    comm: &C,
    group_size: usize,
    hdr_tag: CommTag,
    ids_tag: CommTag,
    map: &FeedbackMap,
) {
    debug_assert!(!map.is_empty(), "empty payloads are never transmitted");
    let (hdrs, ids) = feedback_wire(map);
    broadcast_bytes(comm, group_size, hdr_tag, cast_slice(&hdrs));
    if !ids.is_empty() {
        broadcast_bytes(comm, group_size, ids_tag, cast_slice(&ids));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::LocalComm;

    #[test]
    fn count_roundtrip() {
        let a = LocalComm::new(910, 0, 2);
        let b = LocalComm::new(910, 1, 2);
        send_count(&a, 1, CommTag::new(1), 17);
        assert_eq!(recv_count(&b, 0, CommTag::new(1)).unwrap(), 17);
    }

    #[test]
    fn ranks_roundtrip() {
        let a = LocalComm::new(911, 0, 2);
        let b = LocalComm::new(911, 1, 2);
        send_ranks(&a, 1, CommTag::new(2), &[0, 3, 5]);
        assert_eq!(
            recv_ranks(&b, 0, CommTag::new(2), 3).unwrap(),
            vec![0, 3, 5]
        );
    }

    #[test]
    fn box_map_overwrites_sentinels() {
        let a = LocalComm::new(912, 0, 2);
        let b = LocalComm::new(912, 1, 2);
        let sent = vec![
            AxisBox::from_pairs(&[(0.0, 1.0), (0.0, 1.0)]),
            AxisBox::from_pairs(&[(1.0, 2.0), (0.0, 1.0)]),
        ];
        send_box_map(&a, 1, CommTag::new(3), &sent);

        let mut got = vec![AxisBox::sentinel(2); 2];
        recv_box_map_into(&b, 0, CommTag::new(3), &mut got).unwrap();
        assert_eq!(got, sent);
    }

    #[test]
    fn single_box_roundtrip() {
        let a = LocalComm::new(913, 0, 2);
        let b = LocalComm::new(913, 1, 2);
        let sent = AxisBox::from_pairs(&[(-0.5, 0.5), (2.0, 2.0)]);
        send_box(&a, 1, CommTag::new(4), &sent);
        let mut got = AxisBox::sentinel(2);
        recv_box_into(&b, 0, CommTag::new(4), &mut got).unwrap();
        assert_eq!(got, sent);
    }

    #[test]
    fn feedback_map_roundtrip() {
        let a = LocalComm::new(914, 0, 2);
        let b = LocalComm::new(914, 1, 2);
        let mut map = FeedbackMap::new();
        map.insert(0, vec![1, 2]);
        map.insert(3, vec![0]);
        send_feedback_map(&a, 1, CommTag::new(5), CommTag::new(6), &map);
        let got =
            recv_feedback_map(&b, 0, CommTag::new(5), CommTag::new(6), map.len()).unwrap();
        assert_eq!(got, map);
    }

    #[test]
    fn broadcast_reaches_every_worker() {
        let coord = LocalComm::new(915, 0, 3);
        let w1 = LocalComm::new(915, 1, 3);
        let w2 = LocalComm::new(915, 2, 3);
        broadcast_count(&coord, 3, CommTag::new(7), 9);
        assert_eq!(recv_count(&w1, 0, CommTag::new(7)).unwrap(), 9);
        assert_eq!(recv_count(&w2, 0, CommTag::new(7)).unwrap(), 9);
    }

    #[test]
    fn length_mismatch_is_a_comm_error() {
        let a = LocalComm::new(916, 0, 2);
        let b = LocalComm::new(916, 1, 2);
        // Two ranks on the wire, but the receiver expects three.
        send_ranks(&a, 1, CommTag::new(8), &[1, 2]);
        let err = recv_ranks(&b, 0, CommTag::new(8), 3).unwrap_err();
        assert!(matches!(
            err,
            CoupleError::CommError { neighbor: 0, .. }
        ));
    }
}
