//! The hardware tessellation strategy.
//!
//! Every segment is written as a fixed-size patch that a hardware tessellation stage expands into
//! a triangle strip. The stage can only emit a limited number of segments per patch, so curves
//! and round joins that need more are chopped on the CPU until every piece fits. Joins that don't
//! fit in the patch of the segment that follows them get a patch of their own.
//!
//! Patches are written straight into chunks of vertex space as they are produced. Every chunk is
//! one draw.

use crate::device::{BufferId, BufferSlice, Device};
use crate::geom::utils::{angle_between_vectors, find_bisector, next_log2};
use crate::geom::wangs_formula;
use crate::geom::{ConicSegment, CubicBezierSegment, QuadraticBezierSegment};
use crate::math::{point, vector, Point};
use crate::path::PathEvent;
use crate::records::{to_array, PatchType, StrokePatch};
use crate::{
    AllocationError, DeviceCapabilities, LineCap, LineJoin, StrokeList, StrokeOptions,
    StrokeStrategy, TessellationError, TessellationResult, Tolerances,
};
use std::f32::consts::PI;
use std::mem::size_of;

/// The join that precedes a patch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum JoinKind {
    Miter,
    Round,
    Bevel,
    /// A double sided round join, used between the pieces of a chopped curve and for round caps
    /// when the stroke doesn't have round joins.
    Bowtie,
}

impl From<LineJoin> for JoinKind {
    fn from(join: LineJoin) -> Self {
        match join {
            LineJoin::Miter => JoinKind::Miter,
            LineJoin::Round => JoinKind::Round,
            LineJoin::Bevel => JoinKind::Bevel,
        }
    }
}

/// Number of segments of a strip made of parametric and radial edges.
///
/// The first and last edges are shared by both sets of edges.
#[inline]
fn num_combined_segments(num_parametric_segments: f32, num_radial_segments: f32) -> f32 {
    num_parametric_segments + num_radial_segments - 1.0
}

#[inline]
fn pow4(x: f32) -> f32 {
    let xx = x * x;
    xx * xx
}

/// Where a [PatchWriter] puts the patches it produces.
trait PatchSink {
    fn push_patch(&mut self, patch: StrokePatch);
}

impl PatchSink for Vec<StrokePatch> {
    fn push_patch(&mut self, patch: StrokePatch) {
        self.push(patch);
    }
}

/// Writes the patches of a list of strokes, chopping what doesn't fit in a patch.
struct PatchWriter<Sink> {
    /// Segments the hardware can emit per patch, minus the two extra segments that chopping in
    /// the tessellation shader can introduce.
    max_segments: f32,
    parametric_precision: f32,

    num_radial_segments_per_radian: f32,
    /// Maximum number of parametric segments of a curve rotating 180 and 360 degrees, raised to
    /// the fourth power.
    max_parametric_segments_pow4: [f32; 2],
    /// Same as above, when the patch also holds a worst-case join.
    max_parametric_segments_pow4_with_join: [f32; 2],
    max_combined_segments_with_join: f32,
    solo_round_join_always_fits: bool,
    stroke_join: JoinKind,
    line_cap: LineCap,
    stroke_radius: f32,
    join_type: f32,

    has_last_control_point: bool,
    contour_start: Point,
    contour_first_control_point: Point,
    last_control_point: Point,

    sink: Sink,
}

impl<Sink: PatchSink> PatchWriter<Sink> {
    fn new(tolerances: &Tolerances, max_tessellation_segments: u32, sink: Sink) -> Self {
        let max_segments = (max_tessellation_segments as f32 - 2.0).max(1.0);
        PatchWriter {
            max_segments,
            parametric_precision: tolerances.parametric_precision(),
            num_radial_segments_per_radian: 0.0,
            max_parametric_segments_pow4: [0.0; 2],
            max_parametric_segments_pow4_with_join: [0.0; 2],
            max_combined_segments_with_join: 0.0,
            solo_round_join_always_fits: true,
            stroke_join: JoinKind::Miter,
            line_cap: LineCap::Butt,
            stroke_radius: 0.0,
            join_type: 0.0,
            has_last_control_point: false,
            contour_start: point(0.0, 0.0),
            contour_first_control_point: point(0.0, 0.0),
            last_control_point: point(0.0, 0.0),
            sink,
        }
    }

    fn set_stroke(&mut self, tolerances: &Tolerances, options: &StrokeOptions) {
        self.num_radial_segments_per_radian =
            tolerances.num_radial_segments_per_radian(options.line_width);

        // Worst-case parametric segments for curves that rotate 180 and 360 degrees. Almost every
        // curve is accepted against these without measuring its rotation.
        let radial_180 = (PI * self.num_radial_segments_per_radian).ceil().max(1.0);
        let radial_360 = (2.0 * PI * self.num_radial_segments_per_radian)
            .ceil()
            .max(1.0);
        let max_total_edges = self.max_segments + 1.0;
        let max_parametric = [
            (max_total_edges - radial_180).max(0.0),
            (max_total_edges - radial_360).max(0.0),
        ];
        self.max_parametric_segments_pow4 = [pow4(max_parametric[0]), pow4(max_parametric[1])];

        let worst_case_join_segments = match options.line_join {
            LineJoin::Bevel => 1.0,
            LineJoin::Miter => 2.0,
            LineJoin::Round => radial_180,
        };

        // Folding a join into the patch costs an extra edge between the join and the curve.
        let with_join = |max: f32| pow4((max - worst_case_join_segments - 1.0).max(0.0));
        self.max_parametric_segments_pow4_with_join =
            [with_join(max_parametric[0]), with_join(max_parametric[1])];
        self.max_combined_segments_with_join =
            self.max_segments - worst_case_join_segments - 1.0;
        self.solo_round_join_always_fits = radial_180 <= self.max_segments;

        self.stroke_join = options.line_join.into();
        self.line_cap = options.line_cap;
        self.stroke_radius = options.stroke_radius();
        self.join_type = options.join_type();
    }

    fn line_fits_in_patch_with_join(&self) -> bool {
        self.max_combined_segments_with_join >= 1.0
    }

    fn stroke_180_fits_in_patch(&self, num_parametric_segments_pow4: f32) -> bool {
        num_parametric_segments_pow4 <= self.max_parametric_segments_pow4[0]
    }

    fn stroke_180_fits_in_patch_with_join(&self, num_parametric_segments_pow4: f32) -> bool {
        num_parametric_segments_pow4 <= self.max_parametric_segments_pow4_with_join[0]
    }

    fn stroke_360_fits_in_patch(&self, num_parametric_segments_pow4: f32) -> bool {
        num_parametric_segments_pow4 <= self.max_parametric_segments_pow4[1]
    }

    fn stroke_360_fits_in_patch_with_join(&self, num_parametric_segments_pow4: f32) -> bool {
        num_parametric_segments_pow4 <= self.max_parametric_segments_pow4_with_join[1]
    }

    fn write_path(&mut self, events: impl Iterator<Item = PathEvent>) {
        for event in events {
            match event {
                PathEvent::Begin { at } => self.move_to(at),
                PathEvent::Line { from, to } => {
                    if from == to {
                        continue;
                    }
                    let fits = self.line_fits_in_patch_with_join();
                    self.write_patch_to(fits, [from, from, to, to], from, PatchType::Line);
                }
                PathEvent::Quadratic { from, ctrl, to } => {
                    if ctrl == from || ctrl == to {
                        // The control point may hide a zero-length segment, let the line decide.
                        self.write_line_to(self.stroke_join, from, to);
                        continue;
                    }
                    let curve = QuadraticBezierSegment { from, ctrl, to };
                    if curve.has_cusp() {
                        // The shader can't draw a tangent that turns around.
                        let cusp = curve.sample(curve.mid_tangent_t());
                        self.write_line_to(self.stroke_join, from, cusp);
                        self.write_line_to(JoinKind::Bowtie, cusp, to);
                        continue;
                    }
                    let n4 = wangs_formula::quadratic_pow4(self.parametric_precision, &curve);
                    if !self.stroke_180_fits_in_patch(n4) {
                        self.write_conic_patches_to(self.stroke_join, from, ctrl, to, 1.0, None);
                        continue;
                    }
                    let fits = self.stroke_180_fits_in_patch_with_join(n4);
                    let cubic = curve.to_cubic();
                    self.write_patch_to(fits, cubic.points(), cubic.ctrl2, PatchType::Curve);
                }
                PathEvent::Conic {
                    from,
                    ctrl,
                    to,
                    weight,
                } => {
                    if ctrl == from || ctrl == to {
                        self.write_line_to(self.stroke_join, from, to);
                        continue;
                    }
                    let curve = ConicSegment {
                        from,
                        ctrl,
                        to,
                        weight,
                    };
                    if curve.has_cusp() {
                        let cusp = curve.sample(curve.mid_tangent_t());
                        self.write_line_to(self.stroke_join, from, cusp);
                        self.write_line_to(JoinKind::Bowtie, cusp, to);
                        continue;
                    }
                    let n2 = wangs_formula::conic_pow2(self.parametric_precision, &curve);
                    let n4 = n2 * n2;
                    if !self.stroke_180_fits_in_patch(n4) {
                        self.write_conic_patches_to(self.stroke_join, from, ctrl, to, weight, None);
                        continue;
                    }
                    let fits = self.stroke_180_fits_in_patch_with_join(n4);
                    let pts = [from, ctrl, to, point(weight, f32::INFINITY)];
                    self.write_patch_to(fits, pts, ctrl, PatchType::Conic);
                }
                PathEvent::Cubic {
                    from,
                    ctrl1,
                    ctrl2,
                    to,
                } => {
                    if ctrl1 == ctrl2 && (ctrl1 == from || ctrl1 == to) {
                        // The shader gives these patterns a special meaning.
                        self.write_line_to(self.stroke_join, from, to);
                        continue;
                    }
                    let curve = CubicBezierSegment {
                        from,
                        ctrl1,
                        ctrl2,
                        to,
                    };
                    let n4 = wangs_formula::cubic_pow4(self.parametric_precision, &curve);
                    if !self.stroke_360_fits_in_patch(n4) || curve.has_cusp() {
                        self.write_cubic_convex_180_patches_to(&curve);
                        continue;
                    }
                    let fits = self.stroke_360_fits_in_patch_with_join(n4);
                    let end_control_point = if ctrl2 != to { ctrl2 } else { ctrl1 };
                    self.write_patch_to(fits, curve.points(), end_control_point, PatchType::Curve);
                }
                PathEvent::End {
                    last, close: true, ..
                } => self.write_close(last),
                PathEvent::End {
                    last, close: false, ..
                } => self.write_caps(last),
            }
        }
    }

    fn move_to(&mut self, at: Point) {
        self.contour_start = at;
        self.has_last_control_point = false;
    }

    fn write_line_to(&mut self, prev_join: JoinKind, from: Point, to: Point) {
        // Zero-length segments only get caps, and only when the whole contour has zero length.
        if from == to {
            return;
        }
        let fits = self.line_fits_in_patch_with_join();
        self.internal_patch_to(prev_join, fits, [from, from, to, to], to, PatchType::Line);
    }

    /// Chops a cubic at its inflections and 180 degree turns, then chops each piece until it
    /// fits.
    fn write_cubic_convex_180_patches_to(&mut self, curve: &CubicBezierSegment<f32>) {
        let chops = curve.convex_180_chops();
        match chops.ts.len() {
            0 => self.internal_cubic_convex_180_patches_to(self.stroke_join, curve, None),
            1 => {
                let (mut a, mut b) = curve.split(chops.ts[0]);
                if chops.are_cusps {
                    // On a perfect cusp these three points are equal.
                    a.ctrl2 = a.to;
                    b.ctrl1 = b.from;
                }
                self.internal_cubic_convex_180_patches_to(self.stroke_join, &a, None);
                self.internal_cubic_convex_180_patches_to(JoinKind::Bowtie, &b, None);
            }
            _ => {
                let pieces = curve.split_at(&chops.ts);
                if chops.are_cusps {
                    // Only flat lines with two turnarounds have two cusps.
                    let mut join = self.stroke_join;
                    for piece in &pieces {
                        self.write_line_to(join, piece.from, piece.to);
                        join = JoinKind::Bowtie;
                    }
                    return;
                }
                let mut join = self.stroke_join;
                for piece in &pieces {
                    self.internal_cubic_convex_180_patches_to(join, piece, None);
                    join = JoinKind::Bowtie;
                }
            }
        }
    }

    /// Writes a patch as is, folding the previous join into it if `prev_join_fits` and giving
    /// the join its own patch otherwise.
    fn write_patch_to(
        &mut self,
        prev_join_fits: bool,
        pts: [Point; 4],
        end_control_point: Point,
        patch_type: PatchType,
    ) {
        let next_control_point = if pts[1] != pts[0] { pts[1] } else { pts[2] };
        if !self.has_last_control_point {
            // The first stroke of the contour has no previous join. If the contour closes, the
            // join gets its own patch at the end.
            self.has_last_control_point = true;
            self.contour_first_control_point = next_control_point;
            self.last_control_point = pts[0];
        } else if !prev_join_fits {
            self.internal_join_to(self.stroke_join, pts[0], next_control_point, None);
            self.last_control_point = pts[0];
        }

        self.emit(self.last_control_point, pts, patch_type);
        self.last_control_point = end_control_point;
    }

    fn write_close(&mut self, contour_end: Point) {
        if !self.has_last_control_point {
            // Zero-length contours get caps instead.
            self.write_caps(contour_end);
            return;
        }

        let start = self.contour_start;
        self.write_line_to(self.stroke_join, contour_end, start);
        self.internal_join_to(self.stroke_join, start, self.contour_first_control_point, None);

        self.has_last_control_point = false;
    }

    fn write_caps(&mut self, mut contour_end: Point) {
        let start = self.contour_start;
        if !self.has_last_control_point {
            // Nothing to orient the caps with: they are an axis-aligned square or a circle.
            let outset = vector(1.0, 0.0);
            self.contour_first_control_point = start - outset;
            self.last_control_point = start + outset;
            self.has_last_control_point = true;
            contour_end = start;
        }

        match self.line_cap {
            LineCap::Butt => {}
            LineCap::Round => {
                // A round cap is a 180 degree round join. A bowtie does the same for other joins.
                let join = if self.stroke_join == JoinKind::Round {
                    JoinKind::Round
                } else {
                    JoinKind::Bowtie
                };
                self.internal_join_to(join, contour_end, self.last_control_point, None);
                self.internal_move_to(start, self.contour_first_control_point);
                self.internal_join_to(join, start, self.contour_first_control_point, None);
            }
            LineCap::Square => {
                let last_tangent = contour_end - self.last_control_point;
                let last_tangent = last_tangent * (self.stroke_radius / last_tangent.length());
                self.write_line_to(self.stroke_join, contour_end, contour_end + last_tangent);

                self.internal_move_to(start, self.contour_first_control_point);
                let first_tangent = self.contour_first_control_point - start;
                let first_tangent = first_tangent * (-self.stroke_radius / first_tangent.length());
                self.write_line_to(self.stroke_join, start, start + first_tangent);
            }
        }

        self.has_last_control_point = false;
    }

    fn internal_move_to(&mut self, at: Point, control_point: Point) {
        self.contour_start = at;
        self.contour_first_control_point = control_point;
        self.last_control_point = control_point;
        self.has_last_control_point = true;
    }

    /// Recursively chops a conic (or a quadratic when the weight is one) and its previous join
    /// until the pieces fit.
    fn write_conic_patches_to(
        &mut self,
        prev_join: JoinKind,
        from: Point,
        ctrl: Point,
        to: Point,
        weight: f32,
        max_depth: Option<u32>,
    ) {
        if ctrl == from || ctrl == to || weight == 0.0 {
            self.write_line_to(prev_join, from, to);
            return;
        }

        let quadratic = QuadraticBezierSegment { from, ctrl, to };
        let conic = ConicSegment {
            from,
            ctrl,
            to,
            weight,
        };
        let (pts, patch_type, n4) = if weight == 1.0 {
            let n4 = wangs_formula::quadratic_pow4(self.parametric_precision, &quadratic);
            (quadratic.to_cubic().points(), PatchType::Curve, n4)
        } else {
            let n2 = wangs_formula::conic_pow2(self.parametric_precision, &conic);
            let pts = [from, ctrl, to, point(weight, f32::INFINITY)];
            (pts, PatchType::Conic, n2 * n2)
        };

        if self.stroke_180_fits_in_patch(n4) || max_depth == Some(0) {
            let fits = self.stroke_180_fits_in_patch_with_join(n4);
            self.internal_patch_to(prev_join, fits, pts, to, patch_type);
            return;
        }

        // There may still be enough segments once the actual rotation is known.
        let num_radial = (quadratic.rotation() * self.num_radial_segments_per_radian)
            .ceil()
            .max(1.0);
        let num_parametric = wangs_formula::root4(n4).ceil().max(1.0);
        let num_combined = num_combined_segments(num_parametric, num_radial);
        if num_combined > self.max_segments {
            let depth = max_depth.unwrap_or_else(|| max_chop_depth(num_parametric, num_radial));
            if weight == 1.0 {
                let (a, b) = if num_parametric >= num_radial {
                    quadratic.split(0.5)
                } else {
                    quadratic.split(quadratic.mid_tangent_t())
                };
                self.write_conic_patches_to(
                    prev_join,
                    a.from,
                    a.ctrl,
                    a.to,
                    1.0,
                    Some(depth - 1),
                );
                self.write_conic_patches_to(
                    JoinKind::Bowtie,
                    b.from,
                    b.ctrl,
                    b.to,
                    1.0,
                    Some(depth - 1),
                );
            } else {
                let t = if num_parametric >= num_radial {
                    0.5
                } else {
                    conic.mid_tangent_t()
                };
                let (a, b) = conic.split(t);
                self.write_conic_patches_to(
                    prev_join,
                    a.from,
                    a.ctrl,
                    a.to,
                    a.weight,
                    Some(depth - 1),
                );
                self.write_conic_patches_to(
                    JoinKind::Bowtie,
                    b.from,
                    b.ctrl,
                    b.to,
                    b.weight,
                    Some(depth - 1),
                );
            }
            return;
        }

        let fits = num_combined <= self.max_combined_segments_with_join;
        self.internal_patch_to(prev_join, fits, pts, to, patch_type);
    }

    /// Recursively chops a convex cubic that rotates at most 180 degrees and its previous join
    /// until the pieces fit.
    fn internal_cubic_convex_180_patches_to(
        &mut self,
        prev_join: JoinKind,
        curve: &CubicBezierSegment<f32>,
        max_depth: Option<u32>,
    ) {
        if curve.ctrl1 == curve.ctrl2 && (curve.ctrl1 == curve.from || curve.ctrl1 == curve.to) {
            self.write_line_to(prev_join, curve.from, curve.to);
            return;
        }

        let n4 = wangs_formula::cubic_pow4(self.parametric_precision, curve);
        if self.stroke_180_fits_in_patch(n4) || max_depth == Some(0) {
            let fits = self.stroke_180_fits_in_patch_with_join(n4);
            self.internal_patch_to(prev_join, fits, curve.points(), curve.to, PatchType::Curve);
            return;
        }

        let num_radial = (curve.non_inflecting_rotation() * self.num_radial_segments_per_radian)
            .ceil()
            .max(1.0);
        let num_parametric = wangs_formula::root4(n4).ceil().max(1.0);
        let num_combined = num_combined_segments(num_parametric, num_radial);
        if num_combined > self.max_segments {
            let depth = max_depth.unwrap_or_else(|| max_chop_depth(num_parametric, num_radial));
            let (a, b) = if num_parametric >= num_radial {
                curve.split_half()
            } else {
                curve.split(curve.mid_tangent_t())
            };
            self.internal_cubic_convex_180_patches_to(prev_join, &a, Some(depth - 1));
            self.internal_cubic_convex_180_patches_to(JoinKind::Bowtie, &b, Some(depth - 1));
            return;
        }

        let fits = num_combined <= self.max_combined_segments_with_join;
        self.internal_patch_to(prev_join, fits, curve.points(), curve.to, PatchType::Curve);
    }

    /// Writes a patch as is. A bowtie join only gets a patch when the tangents on both sides of
    /// the junction point in different directions, which only happens at cusps.
    fn internal_patch_to(
        &mut self,
        prev_join: JoinKind,
        mut prev_join_fits: bool,
        pts: [Point; 4],
        end_point: Point,
        patch_type: PatchType,
    ) {
        if prev_join == JoinKind::Bowtie {
            debug_assert!(self.has_last_control_point);
            let next_control_point = if pts[1] == pts[0] { pts[2] } else { pts[1] };
            let a = pts[0] - self.last_control_point;
            let b = next_control_point - pts[0];
            let ab_cos_theta = a.dot(b);
            let ab_pow2 = a.dot(a) * b.dot(b);
            // cos(θ) * |cos(θ)| is one only if the tangents point in the same direction.
            let nearly_equal = (ab_pow2 - ab_cos_theta * ab_cos_theta.abs()).abs()
                <= ab_pow2 * (1.0 / 4096.0);
            if !nearly_equal {
                self.internal_join_to(JoinKind::Bowtie, pts[0], next_control_point, None);
                self.last_control_point = pts[0];
                prev_join_fits = true;
            }
        }

        let end_control_point = if pts[2] != end_point { pts[2] } else { pts[1] };
        self.write_patch_to(prev_join_fits, pts, end_control_point, patch_type);
    }

    /// Writes a join on its own, recursively splitting round joins that need more segments than
    /// a patch has.
    fn internal_join_to(
        &mut self,
        join: JoinKind,
        junction: Point,
        next_control_point: Point,
        max_depth: Option<u32>,
    ) {
        if !self.has_last_control_point {
            return;
        }

        if !self.solo_round_join_always_fits
            && max_depth != Some(0)
            && (join == JoinKind::Round || join == JoinKind::Bowtie)
        {
            let tan0 = junction - self.last_control_point;
            let tan1 = next_control_point - junction;
            let rotation = angle_between_vectors(tan0, tan1);
            let num_radial = rotation * self.num_radial_segments_per_radian;
            if num_radial > self.max_segments {
                let depth = max_depth.unwrap_or_else(|| {
                    next_log2(num_radial / self.max_segments).max(1) as u32
                });

                // c0 ends the first half, c1 starts the second half. c0 - junction has to be
                // exactly -(c1 - junction) or the halves don't meet.
                let mut bisector = find_bisector(tan0, tan1);
                let mut c0 = junction + bisector;
                let mut c1 = junction - bisector;
                for _ in 0..10 {
                    bisector = (junction + bisector) - (junction - bisector);
                    c0 = junction + bisector;
                    c1 = junction - bisector;
                    if c0 - junction == -(c1 - junction) {
                        break;
                    }
                }

                self.internal_join_to(join, junction, c0, Some(depth - 1));
                self.last_control_point = c1;
                self.internal_join_to(join, junction, next_control_point, Some(depth - 1));
                return;
            }
        }

        let (pts, patch_type) = if join == JoinKind::Bowtie {
            (
                [junction, junction, junction, next_control_point],
                PatchType::Bowtie,
            )
        } else {
            (
                [
                    junction,
                    next_control_point,
                    next_control_point,
                    next_control_point,
                ],
                PatchType::Join,
            )
        };
        self.emit(self.last_control_point, pts, patch_type);
        self.last_control_point = next_control_point;
    }

    fn emit(&mut self, prev_control_point: Point, pts: [Point; 4], patch_type: PatchType) {
        self.sink.push_patch(StrokePatch {
            prev_control_point: to_array(prev_control_point),
            points: [
                to_array(pts[0]),
                to_array(pts[1]),
                to_array(pts[2]),
                to_array(pts[3]),
            ],
            patch_type: patch_type.to_f32(),
            stroke_radius: self.stroke_radius,
            join_type: self.join_type,
        });
    }
}

/// Upper bound on the number of times a curve gets chopped in half, in case float precision
/// keeps the pieces from fitting.
fn max_chop_depth(num_parametric_segments: f32, num_radial_segments: f32) -> u32 {
    let depth = next_log2(num_parametric_segments) + next_log2(num_radial_segments) + 1;
    depth.max(1) as u32
}

/// Number of patches to ask for in the first chunk: enough for one in four segments to be chopped
/// and a few caps.
fn patch_prealloc_count(verb_count: usize) -> usize {
    verb_count * 5 / 4 + 8
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct VertexChunk {
    buffer: BufferId,
    base_vertex: u32,
    count: u32,
}

/// Uploads patches as they are written, into chunks of vertex space that double in size.
///
/// A new chunk is only requested once the current one is full. After a failed allocation the
/// remaining patches are only counted.
struct ChunkedPatchUpload<'l> {
    device: &'l mut dyn Device,
    preferred_count: u32,
    /// The space of the last chunk.
    current: Option<BufferSlice>,
    chunks: Vec<VertexChunk>,
    dropped: u32,
}

impl<'l> ChunkedPatchUpload<'l> {
    const STRIDE: usize = size_of::<StrokePatch>();

    fn new(device: &'l mut dyn Device, preferred_count: u32) -> Self {
        ChunkedPatchUpload {
            device,
            preferred_count: preferred_count.max(1),
            current: None,
            chunks: Vec::new(),
            dropped: 0,
        }
    }

    fn has_room(&self) -> bool {
        match (self.current, self.chunks.last()) {
            (Some(slice), Some(chunk)) => chunk.count < slice.count,
            _ => false,
        }
    }

    fn grow(&mut self) -> bool {
        let allocation = self
            .device
            .allocate_vertices_at_least(Self::STRIDE, 1, self.preferred_count);
        let slice = match allocation {
            Some(slice) if slice.count > 0 => slice,
            _ => return false,
        };

        log::trace!("stroke patch chunk of {} patches", slice.count);
        self.chunks.push(VertexChunk {
            buffer: slice.buffer,
            base_vertex: slice.offset,
            count: 0,
        });
        self.current = Some(slice);
        self.preferred_count = self.preferred_count.saturating_mul(2);

        true
    }

    /// Puts back the unused end of the last chunk and returns the chunks to draw.
    ///
    /// If an allocation failed, every chunk is put back instead.
    fn finish(self) -> Result<Vec<VertexChunk>, AllocationError> {
        let written: u32 = self.chunks.iter().map(|chunk| chunk.count).sum();
        let allocated: u32 = match (self.current, self.chunks.last()) {
            (Some(slice), Some(last)) => written - last.count + slice.count,
            _ => 0,
        };

        if self.dropped > 0 {
            log::warn!(
                "failed to allocate {} stroke patches, {} were written",
                self.dropped,
                written
            );
            if allocated > 0 {
                self.device.put_back_vertices(Self::STRIDE, allocated);
            }
            return Err(AllocationError::Vertices {
                count: self.dropped,
            });
        }

        if allocated > written {
            self.device.put_back_vertices(Self::STRIDE, allocated - written);
        }

        Ok(self.chunks)
    }
}

impl<'l> PatchSink for ChunkedPatchUpload<'l> {
    fn push_patch(&mut self, patch: StrokePatch) {
        if self.dropped > 0 || (!self.has_room() && !self.grow()) {
            self.dropped += 1;
            return;
        }

        if let (Some(slice), Some(chunk)) = (self.current, self.chunks.last_mut()) {
            let byte_offset = (slice.offset + chunk.count) as usize * Self::STRIDE;
            self.device.write(slice.buffer, byte_offset, bytemuck::bytes_of(&patch));
            chunk.count += 1;
        }
    }
}

/// Strokes paths with a hardware tessellation stage.
///
/// ## Example
///
/// ```
/// use hachure_tessellation::*;
/// use hachure_tessellation::device::RecordingDevice;
/// use hachure_tessellation::math::point;
/// use hachure_tessellation::path::Path;
///
/// let mut builder = Path::builder();
/// builder.begin(point(0.0, 0.0));
/// builder.line_to(point(10.0, 0.0));
/// builder.end(false);
///
/// let mut strokes = StrokeList::new();
/// strokes.push(builder.build(), StrokeOptions::DEFAULT);
///
/// let caps = DeviceCapabilities::DEFAULT.with_hardware_tessellation(64);
/// let mut tessellator =
///     HardwareStrokeTessellator::new(strokes, &Tolerances::DEFAULT, &caps).unwrap();
///
/// let mut device = RecordingDevice::new();
/// tessellator.prepare(&mut device).unwrap();
/// tessellator.draw(&mut device);
/// assert_eq!(tessellator.patch_count(), 1);
/// assert_eq!(device.drawn_patches().len(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct HardwareStrokeTessellator {
    strokes: StrokeList,
    tolerances: Tolerances,
    max_tessellation_segments: u32,
    chunks: Vec<VertexChunk>,
    patch_count: u32,
}

impl HardwareStrokeTessellator {
    /// Fails if the device has no tessellation stage or if the options of one of the strokes are
    /// invalid.
    pub fn new(
        strokes: StrokeList,
        tolerances: &Tolerances,
        caps: &DeviceCapabilities,
    ) -> Result<Self, TessellationError> {
        if !caps.supports_hardware_tessellation {
            return Err(TessellationError::UnsupportedStrategy(
                StrokeStrategy::HardwareTessellation,
            ));
        }
        for (_, options) in strokes.iter() {
            options.validate()?;
        }

        Ok(HardwareStrokeTessellator {
            strokes,
            tolerances: *tolerances,
            max_tessellation_segments: caps.max_tessellation_segments,
            chunks: Vec::new(),
            patch_count: 0,
        })
    }

    fn write_strokes<Sink: PatchSink>(&self, writer: &mut PatchWriter<Sink>) {
        for (path, options) in self.strokes.iter() {
            writer.set_stroke(&self.tolerances, options);
            writer.write_path(path.iter());
        }
    }

    /// Writes the patches of every stroke, without uploading them.
    pub fn write_patches(&self) -> Vec<StrokePatch> {
        let patches = Vec::with_capacity(patch_prealloc_count(self.strokes.verb_count()));
        let mut writer =
            PatchWriter::new(&self.tolerances, self.max_tessellation_segments, patches);
        self.write_strokes(&mut writer);

        writer.sink
    }

    /// Number of patches written by the last successful `prepare`.
    pub fn patch_count(&self) -> u32 {
        self.patch_count
    }

    /// Writes the patches straight into chunks of vertex space.
    ///
    /// Chunks are requested with a preferred size that starts at an estimate of the number of
    /// patches and doubles with every chunk. The unused end of the last chunk is put back. If an
    /// allocation fails, the chunks written so far are put back and nothing will be drawn.
    pub fn prepare(&mut self, device: &mut dyn Device) -> TessellationResult {
        self.chunks.clear();
        self.patch_count = 0;

        let preferred = patch_prealloc_count(self.strokes.verb_count()) as u32;
        let upload = ChunkedPatchUpload::new(device, preferred);
        let mut writer = PatchWriter::new(&self.tolerances, self.max_tessellation_segments, upload);
        self.write_strokes(&mut writer);
        let chunks = writer.sink.finish()?;

        let patch_count: u32 = chunks.iter().map(|chunk| chunk.count).sum();
        log::debug!(
            "hardware stroke tessellator: {} patches in {} chunks",
            patch_count,
            chunks.len()
        );

        self.patch_count = patch_count;
        self.chunks = chunks;

        Ok(())
    }

    /// Draws every chunk.
    pub fn draw(&self, device: &mut dyn Device) {
        for chunk in &self.chunks {
            device.bind_buffers(None, Some(chunk.buffer));
            device.draw(chunk.count, chunk.base_vertex);
        }
    }
}

#[cfg(test)]
use crate::device::RecordingDevice;
#[cfg(test)]
use crate::path::Path;

#[cfg(test)]
fn patches_of(path: Path, options: StrokeOptions, max_segments: u32) -> Vec<StrokePatch> {
    let mut strokes = StrokeList::new();
    strokes.push(path, options);
    let caps = DeviceCapabilities::DEFAULT.with_hardware_tessellation(max_segments);
    HardwareStrokeTessellator::new(strokes, &Tolerances::DEFAULT, &caps)
        .unwrap()
        .write_patches()
}

#[cfg(test)]
fn count_type(patches: &[StrokePatch], patch_type: PatchType) -> usize {
    patches
        .iter()
        .filter(|p| p.patch_type == patch_type.to_f32())
        .count()
}

#[cfg(test)]
fn triangle() -> Path {
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.line_to(point(10.0, 0.0));
    builder.line_to(point(0.0, 10.0));
    builder.close();
    builder.build()
}

#[test]
fn open_line() {
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.line_to(point(10.0, 0.0));
    builder.end(false);
    let patches = patches_of(builder.build(), StrokeOptions::DEFAULT, 64);

    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].patch_type, PatchType::Line.to_f32());
    // The first patch of a contour has no join.
    assert_eq!(patches[0].prev_control_point, [0.0, 0.0]);
    assert_eq!(patches[0].stroke_radius, 0.5);
    assert_eq!(patches[0].join_type, StrokeOptions::DEFAULT_MITER_LIMIT);
}

#[test]
fn closed_triangle() {
    let patches = patches_of(triangle(), StrokeOptions::DEFAULT, 64);

    // Three lines with their joins folded in, and the join that closes the contour.
    assert_eq!(count_type(&patches, PatchType::Line), 3);
    assert_eq!(count_type(&patches, PatchType::Join), 1);
    let join = patches.last().unwrap();
    assert!(join.is_join() && !join.is_bowtie());
    assert_eq!(join.points[0], [0.0, 0.0]);
    assert_eq!(join.points[1], [10.0, 0.0]);
    assert_eq!(join.prev_control_point, [0.0, 10.0]);
}

#[test]
fn round_caps_are_bowties_without_round_joins() {
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.line_to(point(10.0, 0.0));
    builder.end(false);
    let path = builder.build();

    let options = StrokeOptions::DEFAULT.with_line_cap(LineCap::Round);
    let patches = patches_of(path.clone(), options, 64);
    assert_eq!(patches.len(), 3);
    assert_eq!(count_type(&patches, PatchType::Bowtie), 2);

    let patches = patches_of(path, options.with_line_join(LineJoin::Round), 64);
    assert_eq!(patches.len(), 3);
    assert_eq!(count_type(&patches, PatchType::Join), 2);
}

#[test]
fn zero_length_contours() {
    let mut builder = Path::builder();
    builder.begin(point(5.0, 5.0));
    builder.line_to(point(5.0, 5.0));
    builder.end(false);
    let path = builder.build();

    assert!(patches_of(path.clone(), StrokeOptions::DEFAULT, 64).is_empty());

    let round = StrokeOptions::DEFAULT.with_line_cap(LineCap::Round);
    let patches = patches_of(path.clone(), round, 64);
    assert_eq!(patches.len(), 2);
    assert!(patches.iter().all(|p| p.is_bowtie()));

    let square = StrokeOptions::DEFAULT
        .with_line_cap(LineCap::Square)
        .with_line_width(4.0);
    let patches = patches_of(path, square, 64);
    assert_eq!(count_type(&patches, PatchType::Line), 2);
    let ends: Vec<[f32; 2]> = patches.iter().map(|p| p.points[3]).collect();
    assert!(ends.contains(&[3.0, 5.0]));
    assert!(ends.contains(&[7.0, 5.0]));
}

#[test]
fn long_curves_are_chopped() {
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.cubic_bezier_to(point(0.0, 500.0), point(500.0, 500.0), point(500.0, 0.0));
    builder.end(false);
    let path = builder.build();

    let options = StrokeOptions::DEFAULT.with_line_width(20.0);
    let patches = patches_of(path.clone(), options, 64);
    let few = count_type(&patches, PatchType::Curve);
    let patches = patches_of(path, options, 8);
    let curves: Vec<&StrokePatch> = patches
        .iter()
        .filter(|p| p.patch_type == PatchType::Curve.to_f32())
        .collect();
    assert!(curves.len() > few);

    // The pieces follow each other.
    assert_eq!(curves[0].points[0], [0.0, 0.0]);
    assert_eq!(curves[curves.len() - 1].points[3], [500.0, 0.0]);
    for pair in curves.windows(2) {
        assert_eq!(pair[0].points[3], pair[1].points[0]);
    }
}

#[test]
fn wide_round_joins_are_split() {
    let path = triangle();
    let options = StrokeOptions::DEFAULT
        .with_line_join(LineJoin::Round)
        .with_line_width(1000.0);
    let fitting = patches_of(path.clone(), options, 64);
    let split = patches_of(path, options, 4);
    assert!(count_type(&split, PatchType::Join) > count_type(&fitting, PatchType::Join));
}

#[test]
fn cusps_get_bowties() {
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.cubic_bezier_to(point(100.0, 100.0), point(0.0, 100.0), point(100.0, 0.0));
    builder.end(false);
    let patches = patches_of(builder.build(), StrokeOptions::DEFAULT, 64);

    assert_eq!(count_type(&patches, PatchType::Bowtie), 1);
    assert_eq!(count_type(&patches, PatchType::Curve), 2);
}

#[test]
fn unsupported_device() {
    let mut strokes = StrokeList::new();
    strokes.push(triangle(), StrokeOptions::DEFAULT);
    let result =
        HardwareStrokeTessellator::new(strokes, &Tolerances::DEFAULT, &DeviceCapabilities::DEFAULT);
    assert_eq!(
        result.err(),
        Some(TessellationError::UnsupportedStrategy(
            StrokeStrategy::HardwareTessellation
        ))
    );
}

#[test]
fn chunked_uploads() {
    let mut strokes = StrokeList::new();
    strokes.push(triangle(), StrokeOptions::DEFAULT);
    let caps = DeviceCapabilities::DEFAULT.with_hardware_tessellation(64);
    let mut tessellator =
        HardwareStrokeTessellator::new(strokes, &Tolerances::DEFAULT, &caps).unwrap();
    let expected = tessellator.write_patches();

    // Too small for the preferred chunk size: every chunk holds a single patch.
    let budget = expected.len() * size_of::<StrokePatch>();
    let mut device = RecordingDevice::with_byte_budget(budget);
    tessellator.prepare(&mut device).unwrap();
    tessellator.draw(&mut device);

    assert_eq!(device.draw_calls().len(), expected.len());
    assert_eq!(device.drawn_patches(), expected);

    let mut device = RecordingDevice::new();
    tessellator.prepare(&mut device).unwrap();
    tessellator.draw(&mut device);
    assert_eq!(device.draw_calls().len(), 1);
    assert_eq!(device.drawn_patches(), expected);
    // The unused end of the chunk was given back.
    assert_eq!(device.allocated_bytes(), budget);
}

#[test]
fn failed_allocations_draw_nothing() {
    let mut strokes = StrokeList::new();
    strokes.push(triangle(), StrokeOptions::DEFAULT);
    let caps = DeviceCapabilities::DEFAULT.with_hardware_tessellation(64);
    let mut tessellator =
        HardwareStrokeTessellator::new(strokes, &Tolerances::DEFAULT, &caps).unwrap();

    let mut device = RecordingDevice::with_byte_budget(0);
    assert_eq!(
        tessellator.prepare(&mut device),
        Err(TessellationError::Allocation(AllocationError::Vertices {
            count: 4
        }))
    );
    tessellator.draw(&mut device);
    assert!(device.draw_calls().is_empty());
    assert_eq!(tessellator.patch_count(), 0);
}

#[test]
fn failed_chunks_are_put_back() {
    let mut strokes = StrokeList::new();
    strokes.push(triangle(), StrokeOptions::DEFAULT);
    let caps = DeviceCapabilities::DEFAULT.with_hardware_tessellation(64);
    let mut tessellator =
        HardwareStrokeTessellator::new(strokes, &Tolerances::DEFAULT, &caps).unwrap();
    let expected = tessellator.write_patches();
    assert_eq!(expected.len(), 4);

    // Room for two single-patch chunks, the third chunk can't be allocated.
    let mut device = RecordingDevice::with_byte_budget(2 * size_of::<StrokePatch>());
    assert_eq!(
        tessellator.prepare(&mut device),
        Err(TessellationError::Allocation(AllocationError::Vertices {
            count: 2
        }))
    );
    assert_eq!(device.buffer_count(), 2);
    assert_eq!(device.allocated_bytes(), 0);

    tessellator.draw(&mut device);
    assert!(device.draw_calls().is_empty());
    assert_eq!(tessellator.patch_count(), 0);

    // A later prepare starts from scratch.
    let mut device = RecordingDevice::new();
    tessellator.prepare(&mut device).unwrap();
    tessellator.draw(&mut device);
    assert_eq!(tessellator.patch_count(), 4);
    assert_eq!(device.drawn_patches(), expected);
}
