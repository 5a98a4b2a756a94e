//! Algebraic properties of the overlap predicate, merge, and margin.

use mesh_couple::geometry::AxisBox;
use proptest::prelude::*;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

fn arb_box(dims: usize) -> impl Strategy<Value = AxisBox> {
    proptest::collection::vec((-100.0f64..100.0, 0.0f64..50.0), dims).prop_map(|spans| {
        let pairs: Vec<(f64, f64)> = spans.iter().map(|&(lo, len)| (lo, lo + len)).collect();
        AxisBox::from_pairs(&pairs)
    })
}

proptest! {
    #[test]
    fn overlap_is_symmetric(a in arb_box(3), b in arb_box(3)) {
        prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
    }

    #[test]
    fn every_box_overlaps_itself(a in arb_box(3)) {
        prop_assert!(a.overlaps(&a));
    }

    #[test]
    fn neutral_box_overlaps_nothing(a in arb_box(3)) {
        prop_assert!(!AxisBox::neutral(3).overlaps(&a));
    }

    #[test]
    fn margin_never_shrinks(a in arb_box(3), s in 0.0f64..2.0) {
        let mut grown = a.clone();
        grown.apply_margin(s);
        for d in 0..3 {
            prop_assert!(grown.extent(d).min <= a.extent(d).min);
            prop_assert!(grown.extent(d).max >= a.extent(d).max);
        }
    }

    #[test]
    fn merge_contains_both_operands(a in arb_box(2), b in arb_box(2)) {
        let mut merged = a.clone();
        merged.merge_from(&b);
        for d in 0..2 {
            prop_assert!(merged.extent(d).min <= a.extent(d).min.min(b.extent(d).min));
            prop_assert!(merged.extent(d).max >= a.extent(d).max.max(b.extent(d).max));
        }
        prop_assert!(merged.overlaps(&a));
        prop_assert!(merged.overlaps(&b));
    }
}

#[test]
fn merge_is_order_independent() {
    let boxes: Vec<AxisBox> = (0..8)
        .map(|i| {
            let x = i as f64;
            AxisBox::from_pairs(&[(0.5 * x - 1.0, 0.7 * x), (-x, x)])
        })
        .collect();

    let mut reference = AxisBox::neutral(2);
    for bb in &boxes {
        reference.merge_from(bb);
    }

    let mut rng = SmallRng::seed_from_u64(42);
    for _ in 0..16 {
        let mut shuffled = boxes.clone();
        shuffled.shuffle(&mut rng);
        let mut merged = AxisBox::neutral(2);
        for bb in &shuffled {
            merged.merge_from(bb);
        }
        assert_eq!(merged, reference);
    }
}
