//! `AxisBox`: the axis-aligned bounding region exchanged between participants.
//!
//! A box holds one `(min, max)` extent per spatial dimension. Two reserved
//! configurations matter to the exchange protocol:
//!
//! - The *neutral* box (`(f64::MAX, f64::MIN)` per dimension) absorbs any
//!   real box on first merge and is never judged overlapping with one. A
//!   rank with no configured mapping keeps it and so reports no overlaps.
//! - The *sentinel* box (`(-1.0, -1.0)` per dimension) marks an entry of a
//!   remote box map that has not yet been overwritten by received data.
//!
//! The overlap predicate deliberately tests both edges of an interval
//! against the other interval's near edge, so a degenerate box whose
//! `min == max` coincides with a boundary is still judged overlapping.

use serde::{Deserialize, Serialize};

/// Smallest side length used when enlarging a box by a safety margin, so a
/// degenerate box still receives a usable non-zero margin.
pub const MIN_SIDE_LENGTH: f64 = 1e-6;

/// One closed interval `[min, max]` along a single axis.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min: f64,
    pub max: f64,
}

impl Extent {
    #[inline]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Signed side length; negative for neutral (not-yet-merged) extents.
    #[inline]
    pub fn length(&self) -> f64 {
        self.max - self.min
    }
}

/// Axis-aligned bounding region, one [`Extent`] per spatial dimension.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisBox {
    extents: Vec<Extent>,
}

impl AxisBox {
    /// Box from explicit per-dimension extents.
    pub fn new(extents: Vec<Extent>) -> Self {
        Self { extents }
    }

    /// Box from `(min, max)` pairs, one per dimension.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        Self {
            extents: pairs.iter().map(|&(lo, hi)| Extent::new(lo, hi)).collect(),
        }
    }

    /// The neutral box: every extent `(f64::MAX, f64::MIN)`. Merging any
    /// real box into it yields that box unchanged.
    pub fn neutral(dims: usize) -> Self {
        Self {
            extents: vec![Extent::new(f64::MAX, f64::MIN); dims],
        }
    }

    /// The uninitialized placeholder used for remote map entries before the
    /// received data overwrites them: every extent `(-1.0, -1.0)`.
    pub fn sentinel(dims: usize) -> Self {
        Self {
            extents: vec![Extent::new(-1.0, -1.0); dims],
        }
    }

    #[inline]
    pub fn dims(&self) -> usize {
        self.extents.len()
    }

    #[inline]
    pub fn extent(&self, d: usize) -> Extent {
        self.extents[d]
    }

    #[inline]
    pub fn extents(&self) -> &[Extent] {
        &self.extents
    }

    pub(crate) fn extents_mut(&mut self) -> &mut [Extent] {
        &mut self.extents
    }

    /// Fold `other` into `self`, per-dimension min/max.
    pub fn merge_from(&mut self, other: &AxisBox) {
        debug_assert_eq!(self.dims(), other.dims(), "merging boxes of unequal dimension");
        for (mine, theirs) in self.extents.iter_mut().zip(&other.extents) {
            if mine.min > theirs.min {
                mine.min = theirs.min;
            }
            if mine.max < theirs.max {
                mine.max = theirs.max;
            }
        }
    }

    /// Enlarge every dimension by `safety_factor` times the largest side
    /// length (floored at [`MIN_SIDE_LENGTH`]), on both sides. The margin is
    /// identical in absolute terms across all dimensions.
    pub fn apply_margin(&mut self, safety_factor: f64) {
        debug_assert!(safety_factor >= 0.0, "safety factor must be non-negative");
        let mut max_side = MIN_SIDE_LENGTH;
        for e in &self.extents {
            max_side = max_side.max(e.length());
        }
        let margin = safety_factor * max_side;
        for e in &mut self.extents {
            e.min -= margin;
            e.max += margin;
        }
    }

    /// True when the boxes overlap in every dimension.
    ///
    /// Per dimension, the intervals are judged disjoint only if both edges
    /// of one lie strictly below the *near* edge of the other. Testing both
    /// edges keeps a `min == max` box that coincides exactly with the other
    /// box's boundary from being reported disjoint.
    pub fn overlaps(&self, other: &AxisBox) -> bool {
        debug_assert_eq!(self.dims(), other.dims(), "comparing boxes of unequal dimension");
        for (a, b) in self.extents.iter().zip(&other.extents) {
            let disjoint =
                (a.min < b.min && a.max < b.min) || (b.min < a.min && b.max < a.min);
            if disjoint {
                return false;
            }
        }
        true
    }
}

/// Capability interface onto the mesh/mapping subsystem: anything that can
/// report the bounding box of its geometry.
pub trait MeshBounds {
    fn bounding_box(&self) -> AxisBox;
}

impl MeshBounds for AxisBox {
    fn bounding_box(&self) -> AxisBox {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> AxisBox {
        AxisBox::from_pairs(&[(0.0, 1.0), (0.0, 1.0)])
    }

    #[test]
    fn merge_absorbs_into_neutral() {
        let mut bb = AxisBox::neutral(2);
        bb.merge_from(&unit_square());
        assert_eq!(bb, unit_square());
    }

    #[test]
    fn merge_with_self_is_identity() {
        let mut bb = unit_square();
        bb.merge_from(&unit_square());
        assert_eq!(bb, unit_square());
    }

    #[test]
    fn merge_order_does_not_matter() {
        let a = AxisBox::from_pairs(&[(0.0, 1.0), (2.0, 3.0)]);
        let b = AxisBox::from_pairs(&[(-1.0, 0.5), (2.5, 4.0)]);
        let mut ab = AxisBox::neutral(2);
        ab.merge_from(&a);
        ab.merge_from(&b);
        let mut ba = AxisBox::neutral(2);
        ba.merge_from(&b);
        ba.merge_from(&a);
        assert_eq!(ab, ba);
        assert_eq!(ab, AxisBox::from_pairs(&[(-1.0, 1.0), (2.0, 4.0)]));
    }

    #[test]
    fn margin_is_isotropic_from_largest_side() {
        // Largest side is 2.0 along dim 0; margin = 0.5 * 2.0 on every side.
        let mut bb = AxisBox::from_pairs(&[(0.0, 2.0), (0.0, 1.0)]);
        bb.apply_margin(0.5);
        assert_eq!(bb, AxisBox::from_pairs(&[(-1.0, 3.0), (-1.0, 2.0)]));
    }

    #[test]
    fn margin_on_point_box_uses_minimum_side() {
        let mut bb = AxisBox::from_pairs(&[(1.0, 1.0)]);
        bb.apply_margin(1.0);
        let e = bb.extent(0);
        assert!(e.min < 1.0 && e.max > 1.0);
        assert!((e.max - e.min - 2.0 * MIN_SIDE_LENGTH).abs() < 1e-12);
    }

    #[test]
    fn margin_zero_leaves_box_unchanged() {
        let mut bb = unit_square();
        bb.apply_margin(0.0);
        assert_eq!(bb, unit_square());
    }

    #[test]
    fn margin_grows_with_safety_factor() {
        let mut small = unit_square();
        let mut large = unit_square();
        small.apply_margin(0.1);
        large.apply_margin(0.2);
        for d in 0..2 {
            assert!(large.extent(d).min < small.extent(d).min);
            assert!(large.extent(d).max > small.extent(d).max);
        }
    }

    #[test]
    fn overlap_is_symmetric_and_reflexive() {
        let a = unit_square();
        let b = AxisBox::from_pairs(&[(0.5, 1.5), (0.5, 1.5)]);
        assert!(a.overlaps(&a));
        assert_eq!(a.overlaps(&b), b.overlaps(&a));
        assert!(a.overlaps(&b));
    }

    #[test]
    fn disjoint_boxes_do_not_overlap() {
        let a = unit_square();
        let b = AxisBox::from_pairs(&[(2.0, 3.0), (0.0, 1.0)]);
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn edge_touch_counts_as_overlap() {
        let a = unit_square();
        let b = AxisBox::from_pairs(&[(1.0, 2.0), (1.0, 2.0)]);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn point_box_on_boundary_overlaps() {
        // Regression for the both-edges rule: a min == max box sitting
        // exactly on the other box's edge must not be reported disjoint.
        let a = unit_square();
        let point = AxisBox::from_pairs(&[(1.0, 1.0), (0.5, 0.5)]);
        assert!(a.overlaps(&point));
        assert!(point.overlaps(&a));
    }

    #[test]
    fn neutral_box_overlaps_nothing_real() {
        let neutral = AxisBox::neutral(2);
        assert!(!neutral.overlaps(&unit_square()));
        assert!(!unit_square().overlaps(&neutral));
    }

    #[test]
    fn sentinel_box_is_a_point_at_minus_one() {
        let s = AxisBox::sentinel(2);
        let around = AxisBox::from_pairs(&[(-2.0, 0.0), (-2.0, 0.0)]);
        assert!(s.overlaps(&around));
        assert!(!s.overlaps(&unit_square()));
    }

    #[test]
    fn serde_round_trip() {
        let bb = AxisBox::from_pairs(&[(0.0, 1.0), (-2.5, 3.75)]);
        let json = serde_json::to_string(&bb).unwrap();
        let back: AxisBox = serde_json::from_str(&json).unwrap();
        assert_eq!(bb, back);
    }
}
