//! The records written into device buffers.
//!
//! All of them are plain `#[repr(C)]` structs of 32 bit values so that they can be copied into
//! buffers as bytes, in the layout the stroke shaders read them.

use crate::math::Point;
use bytemuck::{Pod, Zeroable};

#[inline]
pub(crate) fn to_array(p: Point) -> [f32; 2] {
    [p.x, p.y]
}

/// One stroke instance of the indirect strategy.
///
/// The GPU draws the instance as a strip with `|num_edges|` edges. The join with the previous
/// segment goes from `p0 - prev_control_point` to the start tangent of the curve.
///
/// A negative `num_edges` means the instance comes from chopping a curve on the CPU: its join is
/// always a round join with a single segment, regardless of `join_type`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct StrokeInstance {
    /// Lines are `[p0, p0, p1, p1]`, quadratics are lifted to cubics and conics are
    /// `[p0, p1, p2, (weight, +inf)]`.
    pub points: [[f32; 2]; 4],
    pub prev_control_point: [f32; 2],
    pub num_edges: f32,
    pub stroke_radius: f32,
    /// -1 for round joins, 0 for bevel joins and the miter limit for miter joins.
    pub join_type: f32,
}

impl StrokeInstance {
    #[inline]
    pub fn is_internal_chop(&self) -> bool {
        self.num_edges < 0.0
    }

    #[inline]
    pub fn is_conic(&self) -> bool {
        self.points[3][1].is_infinite()
    }

    /// Circles are stored as a point stroke: all five points at the center.
    #[inline]
    pub fn is_circle(&self) -> bool {
        let c = self.points[0];
        self.points.iter().all(|p| *p == c) && self.prev_control_point == c
    }

    #[inline]
    pub fn from(&self) -> Point {
        Point::new(self.points[0][0], self.points[0][1])
    }

    #[inline]
    pub fn prev_control_point(&self) -> Point {
        Point::new(self.prev_control_point[0], self.prev_control_point[1])
    }
}

/// What a [StrokePatch] holds.
///
/// The patch points follow reserved patterns for joins, `patch_type` makes them explicit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum PatchType {
    /// A cubic (or a lifted quadratic), with its previous join folded in.
    Curve,
    /// A conic, with its previous join folded in.
    Conic,
    /// A straight line `[p0, p0, p1, p1]`, with its previous join folded in.
    Line,
    /// A join on its own: `[p0, p3, p3, p3]`.
    Join,
    /// A double sided round join on its own: `[p0, p0, p0, p3]`.
    Bowtie,
}

impl PatchType {
    /// Value stored in [StrokePatch::patch_type].
    ///
    /// Curves are zero and lines one. Joins are two, negated for double sided bowties.
    #[inline]
    pub fn to_f32(self) -> f32 {
        match self {
            PatchType::Curve | PatchType::Conic => 0.0,
            PatchType::Line => 1.0,
            PatchType::Join => 2.0,
            PatchType::Bowtie => -2.0,
        }
    }
}

/// One patch of the hardware tessellation strategy.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct StrokePatch {
    pub prev_control_point: [f32; 2],
    pub points: [[f32; 2]; 4],
    /// See [PatchType::to_f32].
    pub patch_type: f32,
    pub stroke_radius: f32,
    pub join_type: f32,
}

impl StrokePatch {
    #[inline]
    pub fn is_join(&self) -> bool {
        self.patch_type >= 2.0 || self.patch_type <= -2.0
    }

    #[inline]
    pub fn is_bowtie(&self) -> bool {
        self.patch_type < 0.0
    }
}

/// Parameters of one indirect draw, in the order most graphics APIs read them.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct DrawIndirectCommand {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub base_vertex: u32,
    pub base_instance: u32,
}

#[test]
fn record_layouts() {
    use std::mem::size_of;
    assert_eq!(size_of::<StrokeInstance>(), 13 * 4);
    assert_eq!(size_of::<StrokePatch>(), 13 * 4);
    assert_eq!(size_of::<DrawIndirectCommand>(), 16);

    let instance = StrokeInstance {
        points: [[1.0, 2.0]; 4],
        prev_control_point: [1.0, 2.0],
        num_edges: -9.0,
        stroke_radius: 1.0,
        join_type: 0.0,
    };
    assert!(instance.is_circle());
    assert!(instance.is_internal_chop());
    assert!(!instance.is_conic());

    let bytes = bytemuck::bytes_of(&instance);
    let decoded: StrokeInstance = bytemuck::pod_read_unaligned(bytes);
    assert_eq!(decoded, instance);
}
