//! Geometry primitives for partition-overlap detection.
//!
//! This module provides the axis-aligned bounding region exchanged between
//! coupled participants and the overlap predicate the protocol relies on.

pub mod bounding_box;

pub use bounding_box::{AxisBox, Extent, MeshBounds};
