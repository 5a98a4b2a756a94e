//! Fixed, little-endian wire records for the bounding-box exchange.
//!
//! All multi-byte integers in these structs are **little-endian** on the
//! wire. We store them pre-LE with `.to_le()` and decode with `from_le`.
//! Floating-point extents travel as their IEEE-754 bit patterns.

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::{align_of, size_of};

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

/// Count of following records (map sizes, feedback lengths, rank counts).
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32,
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

/// A rank id (dense, non-negative) carried on the wire. Never usize.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireRank {
    pub r_le: u32,
}

impl WireRank {
    pub fn new(rank: usize) -> Self {
        Self {
            r_le: (rank as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.r_le) as usize
    }
}

/// One `(min, max)` interval of a bounding box, as f64 bit patterns.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireExtent {
    pub min_bits_le: u64,
    pub max_bits_le: u64,
}

impl WireExtent {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min_bits_le: min.to_bits().to_le(),
            max_bits_le: max.to_bits().to_le(),
        }
    }
    pub fn min(&self) -> f64 {
        f64::from_bits(u64::from_le(self.min_bits_le))
    }
    pub fn max(&self) -> f64 {
        f64::from_bits(u64::from_le(self.max_bits_le))
    }
}

/// Header of one feedback-map entry: the local rank it belongs to and how
/// many overlapping remote rank ids follow in the concatenated id stream.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireFeedbackHdr {
    pub rank_le: u32,
    pub len_le: u32,
}

impl WireFeedbackHdr {
    pub fn new(rank: usize, len: usize) -> Self {
        Self {
            rank_le: (rank as u32).to_le(),
            len_le: (len as u32).to_le(),
        }
    }
    pub fn rank(&self) -> usize {
        u32::from_le(self.rank_le) as usize
    }
    pub fn len(&self) -> usize {
        u32::from_le(self.len_le) as usize
    }
}

// ===== Compile-time sanity checks =========================================

const_assert_eq!(size_of::<WireCount>(), 4);
const_assert_eq!(size_of::<WireRank>(), 4);
const_assert_eq!(size_of::<WireExtent>(), 16);
const_assert_eq!(align_of::<WireExtent>(), 8);
const_assert_eq!(size_of::<WireFeedbackHdr>(), 8);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_count_and_rank() {
        let c = WireCount::new(42);
        let bytes: Vec<u8> = cast_slice(std::slice::from_ref(&c)).to_vec();
        let mut out = WireCount::zeroed();
        cast_slice_mut(std::slice::from_mut(&mut out)).copy_from_slice(&bytes);
        assert_eq!(out.get(), 42);

        let r = WireRank::new(7);
        assert_eq!(r.get(), 7);
    }

    #[test]
    fn roundtrip_extent_preserves_bits() {
        let v = vec![
            WireExtent::new(0.0, 1.0),
            WireExtent::new(f64::MAX, f64::MIN),
            WireExtent::new(-1.0, -1.0),
        ];
        let bytes: Vec<u8> = cast_slice(&v).to_vec();
        let mut out = vec![WireExtent::zeroed(); v.len()];
        cast_slice_mut(&mut out).copy_from_slice(&bytes);
        assert_eq!(out[0].min(), 0.0);
        assert_eq!(out[0].max(), 1.0);
        assert_eq!(out[1].min(), f64::MAX);
        assert_eq!(out[1].max(), f64::MIN);
        assert_eq!(out[2].min(), -1.0);
    }

    #[test]
    fn roundtrip_feedback_hdr() {
        let h = WireFeedbackHdr::new(3, 5);
        let bytes: Vec<u8> = cast_slice(std::slice::from_ref(&h)).to_vec();
        let mut out = WireFeedbackHdr::zeroed();
        cast_slice_mut(std::slice::from_mut(&mut out)).copy_from_slice(&bytes);
        assert_eq!(out.rank(), 3);
        assert_eq!(out.len(), 5);
    }
}
