//! The indirect draw strategy.
//!
//! Instances are binned by resolve level. The counting pass runs when the tessellator is created
//! and decides the level of every instance, which gives the size of every bin. The instances are
//! written when the tessellator is prepared: each bin gets a contiguous range of the instance
//! buffer and one indirect draw command.

use crate::device::{BufferSlice, Device};
use crate::geom::arrayvec::ArrayVec;
use crate::geom::{ConicSegment, CubicBezierSegment, QuadraticBezierSegment};
use crate::math::{point, Point};
use crate::path::Path;
use crate::records::{to_array, DrawIndirectCommand, StrokeInstance};
use crate::resolve_level::{ResolveLevelCounter, ResolveLevels, SegmentPlan};
use crate::stroke_iterator::{StrokeIterator, StrokeVerb};
use crate::{
    AllocationError, Batching, LineJoin, StrokeOptions, TessellationResult, Tolerances,
    NUM_RESOLVE_LEVELS,
};
use bytemuck::Zeroable;
use std::mem::size_of;

/// A list of paths with the options they are stroked with.
#[derive(Clone, Debug, Default)]
pub struct StrokeList {
    strokes: Vec<(Path, StrokeOptions)>,
}

impl StrokeList {
    pub fn new() -> Self {
        StrokeList {
            strokes: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        StrokeList {
            strokes: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, path: Path, options: StrokeOptions) {
        self.strokes.push((path, options));
    }

    /// Moves the strokes of `other` to the end of this list.
    pub fn concatenate(&mut self, mut other: StrokeList) {
        self.strokes.append(&mut other.strokes);
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &StrokeOptions)> {
        self.strokes.iter().map(|(path, options)| (path, options))
    }

    /// Total number of path verbs, including begin and end verbs.
    pub fn verb_count(&self) -> usize {
        self.strokes.iter().map(|(path, _)| path.verb_count()).sum()
    }

    fn validate(&self) -> TessellationResult {
        for (_, options) in &self.strokes {
            options.validate()?;
        }

        Ok(())
    }
}

impl Extend<(Path, StrokeOptions)> for StrokeList {
    fn extend<I: IntoIterator<Item = (Path, StrokeOptions)>>(&mut self, iter: I) {
        self.strokes.extend(iter);
    }
}

/// Number of edges a join adds to an instance, beyond those of the stroke itself.
fn num_extra_edges_in_join(join: LineJoin) -> u32 {
    match join {
        // Miter joins need an extra edge for the miter tip.
        LineJoin::Miter => 4,
        LineJoin::Round | LineJoin::Bevel => 3,
    }
}

/// Number of edges of the strip of an instance at a given resolve level.
///
/// The stroke has `2^level` segments and therefore one more edge.
#[inline]
fn num_edges_in_resolve_level(level: usize) -> u32 {
    (1 << level) + 1
}

#[derive(Clone, Debug)]
struct IndirectBatch {
    strokes: StrokeList,
    levels: ResolveLevels,
}

#[derive(Copy, Clone, Debug)]
struct PreparedBuffers {
    commands: BufferSlice,
    instances: BufferSlice,
}

/// Strokes paths with instanced indirect draws.
///
/// Every non-empty resolve level is one indirect draw command. Several tessellators can be
/// [chained](IndirectStrokeTessellator::chain) so that their instances share buffers and are
/// drawn with a single `draw_indirect` call.
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
/// builder.quadratic_bezier_to(point(50.0, 100.0), point(100.0, 0.0));
/// builder.close();
///
/// let mut strokes = StrokeList::new();
/// strokes.push(builder.build(), StrokeOptions::DEFAULT.with_line_width(4.0));
///
/// let mut tessellator =
///     IndirectStrokeTessellator::new(strokes, &Tolerances::DEFAULT, Batching::Lanes).unwrap();
/// // A curve and a line.
/// assert_eq!(tessellator.total_instance_count(), 2);
///
/// let mut device = RecordingDevice::new();
/// tessellator.prepare(&mut device).unwrap();
/// tessellator.draw(&mut device);
/// assert_eq!(device.drawn_instances().len(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct IndirectStrokeTessellator {
    batches: Vec<IndirectBatch>,
    level_counts: [u32; NUM_RESOLVE_LEVELS],
    instance_count: u32,
    draw_indirect_count: u32,
    max_extra_edges_in_join: u32,
    prepared: Option<PreparedBuffers>,
}

impl IndirectStrokeTessellator {
    /// Counts the instances of every stroke at each resolve level.
    ///
    /// Fails if the options of one of the strokes are invalid.
    pub fn new(
        strokes: StrokeList,
        tolerances: &Tolerances,
        batching: Batching,
    ) -> Result<Self, crate::TessellationError> {
        strokes.validate()?;

        let mut counter = ResolveLevelCounter::new(tolerances, batching, strokes.verb_count());
        let mut max_extra_edges_in_join = 0;
        for (path, options) in strokes.iter() {
            max_extra_edges_in_join =
                max_extra_edges_in_join.max(num_extra_edges_in_join(options.line_join));
            counter.count_path(path, options);
        }

        let levels = counter.finish();
        let instance_count = levels.total_instance_count();
        let draw_indirect_count = levels.non_empty_level_count();
        log::debug!(
            "indirect stroke tessellator: {} strokes, {} instances in {} bins",
            strokes.len(),
            instance_count,
            draw_indirect_count,
        );

        Ok(IndirectStrokeTessellator {
            level_counts: levels.counts,
            batches: vec![IndirectBatch { strokes, levels }],
            instance_count,
            draw_indirect_count,
            max_extra_edges_in_join,
            prepared: None,
        })
    }

    /// Appends the strokes of another tessellator, to be prepared and drawn together with the
    /// strokes of this one.
    pub fn chain(&mut self, mut other: IndirectStrokeTessellator) {
        debug_assert!(self.prepared.is_none());
        self.batches.append(&mut other.batches);
        for (count, other_count) in self.level_counts.iter_mut().zip(other.level_counts.iter()) {
            *count += *other_count;
        }
        self.instance_count += other.instance_count;
        self.draw_indirect_count += other.draw_indirect_count;
        self.max_extra_edges_in_join = self
            .max_extra_edges_in_join
            .max(other.max_extra_edges_in_join);
    }

    /// Number of instances at each resolve level, over all chained tessellators.
    pub fn level_counts(&self) -> &[u32; NUM_RESOLVE_LEVELS] {
        &self.level_counts
    }

    pub fn total_instance_count(&self) -> u32 {
        self.instance_count
    }

    /// Number of indirect draw commands, over all chained tessellators.
    pub fn draw_indirect_count(&self) -> u32 {
        self.draw_indirect_count
    }

    /// Allocates the buffers and writes the commands and the instances.
    ///
    /// Does nothing if there is nothing to draw. If an allocation fails, the space that was
    /// already allocated is given back and nothing will be drawn.
    pub fn prepare(&mut self, device: &mut dyn Device) -> TessellationResult {
        self.prepared = None;
        if self.draw_indirect_count == 0 {
            return Ok(());
        }

        let commands = match device.allocate_indirect_commands(self.draw_indirect_count) {
            Some(slice) => slice,
            None => {
                log::warn!(
                    "failed to allocate {} indirect draw commands",
                    self.draw_indirect_count
                );
                return Err(AllocationError::IndirectCommands {
                    count: self.draw_indirect_count,
                }
                .into());
            }
        };

        let stride = size_of::<StrokeInstance>();
        let instances = match device.allocate_vertices(stride, self.instance_count) {
            Some(slice) => slice,
            None => {
                log::warn!("failed to allocate {} stroke instances", self.instance_count);
                device.put_back_indirect_commands(commands.count);
                return Err(AllocationError::Instances {
                    count: self.instance_count,
                }
                .into());
            }
        };

        let mut staged_commands = Vec::with_capacity(self.draw_indirect_count as usize);
        let mut staged_instances = vec![StrokeInstance::zeroed(); self.instance_count as usize];

        let mut base_instance = instances.offset;
        let mut start = 0;
        for batch in &self.batches {
            let end = start + batch.levels.total_instance_count() as usize;
            let mut writer = BinningInstanceWriter::new(
                &mut staged_commands,
                &mut staged_instances[start..end],
                base_instance,
                self.max_extra_edges_in_join,
                &batch.levels.counts,
            );
            write_instances(&mut writer, batch);
            writer.finish();

            base_instance += batch.levels.total_instance_count();
            start = end;
        }

        debug_assert_eq!(staged_commands.len(), self.draw_indirect_count as usize);

        device.write(
            commands.buffer,
            commands.offset as usize * size_of::<DrawIndirectCommand>(),
            bytemuck::cast_slice(&staged_commands),
        );
        device.write(
            instances.buffer,
            instances.offset as usize * stride,
            bytemuck::cast_slice(&staged_instances),
        );

        self.prepared = Some(PreparedBuffers {
            commands,
            instances,
        });

        Ok(())
    }

    /// Issues the indirect draw. Does nothing if the tessellator wasn't successfully prepared.
    pub fn draw(&self, device: &mut dyn Device) {
        if let Some(prepared) = self.prepared {
            device.bind_buffers(Some(prepared.instances.buffer), None);
            device.draw_indirect(
                prepared.commands.buffer,
                prepared.commands.offset,
                self.draw_indirect_count,
            );
        }
    }
}

/// The points of a stroke instance.
///
/// Conics hold their weight in the fourth point, see [StrokeInstance::points].
type InstancePoints = [Point; 4];

/// Partitions the instances of a batch into one bin per resolve level, writes the indirect draw
/// command of each bin and places instances in their bin.
struct BinningInstanceWriter<'l> {
    instances: &'l mut [StrokeInstance],
    cursors: [usize; NUM_RESOLVE_LEVELS],
    ends: [usize; NUM_RESOLVE_LEVELS],
    num_edges: [f32; NUM_RESOLVE_LEVELS],
    stroke_radius: f32,
    join_type: f32,
    /// Instances that didn't fit in their bin.
    dropped: u32,
}

impl<'l> BinningInstanceWriter<'l> {
    fn new(
        commands: &mut Vec<DrawIndirectCommand>,
        instances: &'l mut [StrokeInstance],
        base_instance: u32,
        max_extra_edges_in_join: u32,
        counts: &[u32; NUM_RESOLVE_LEVELS],
    ) -> Self {
        let mut cursors = [0; NUM_RESOLVE_LEVELS];
        let mut ends = [0; NUM_RESOLVE_LEVELS];
        let mut num_edges = [0.0; NUM_RESOLVE_LEVELS];
        let mut running = 0;
        for (level, count) in counts.iter().enumerate() {
            let edges = max_extra_edges_in_join + num_edges_in_resolve_level(level);
            num_edges[level] = edges as f32;
            cursors[level] = running as usize;
            if *count != 0 {
                log::trace!("resolve level {}: {} instances", level, count);
                commands.push(DrawIndirectCommand {
                    vertex_count: edges * 2,
                    instance_count: *count,
                    base_vertex: 0,
                    base_instance: base_instance + running,
                });
            }
            running += *count;
            ends[level] = running as usize;
        }
        debug_assert_eq!(running as usize, instances.len());

        BinningInstanceWriter {
            instances,
            cursors,
            ends,
            num_edges,
            stroke_radius: 0.0,
            join_type: 0.0,
            dropped: 0,
        }
    }

    fn set_stroke(&mut self, options: &StrokeOptions) {
        self.stroke_radius = options.stroke_radius();
        self.join_type = options.join_type();
    }

    /// Writes a stroke. Internal chops have a negative edge count: their join is always a single
    /// segment round join.
    fn write_stroke(
        &mut self,
        level: u32,
        pts: &InstancePoints,
        prev_control_point: Point,
        is_internal_chop: bool,
    ) {
        let num_edges = self.num_edges[level as usize];
        self.push(
            level,
            StrokeInstance {
                points: [
                    to_array(pts[0]),
                    to_array(pts[1]),
                    to_array(pts[2]),
                    to_array(pts[3]),
                ],
                prev_control_point: to_array(prev_control_point),
                num_edges: if is_internal_chop {
                    -num_edges
                } else {
                    num_edges
                },
                stroke_radius: self.stroke_radius,
                join_type: self.join_type,
            },
        );
    }

    /// Writes a 180 degree point stroke, which renders as a stroke-width circle.
    ///
    /// The edge count is negative so that the empty join before it gets as few edges as possible.
    fn write_circle(&mut self, level: u32, center: Point) {
        let c = to_array(center);
        let num_edges = self.num_edges[level as usize];
        self.push(
            level,
            StrokeInstance {
                points: [c; 4],
                prev_control_point: c,
                num_edges: -num_edges,
                stroke_radius: self.stroke_radius,
                join_type: self.join_type,
            },
        );
    }

    fn push(&mut self, level: u32, instance: StrokeInstance) {
        let level = level as usize;
        let idx = self.cursors[level];
        if idx < self.ends[level] {
            self.instances[idx] = instance;
            self.cursors[level] += 1;
        } else {
            log::warn!(
                "resolve level {} has more instances than counted, dropping one",
                level
            );
            self.dropped += 1;
        }
    }

    fn finish(self) {
        debug_assert_eq!(self.dropped, 0, "resolve level bins overflowed");
        debug_assert_eq!(
            self.cursors, self.ends,
            "the instances don't match the counting pass"
        );
    }
}

/// Walks the plan of the counting pass.
struct PlanReader<'l> {
    plan: std::slice::Iter<'l, SegmentPlan>,
    chop_ts: &'l [f32],
}

impl<'l> PlanReader<'l> {
    fn new(levels: &'l ResolveLevels) -> Self {
        PlanReader {
            plan: levels.plan.iter(),
            chop_ts: &levels.chop_ts,
        }
    }

    fn next_entry(&mut self) -> SegmentPlan {
        let entry = self.plan.next().copied();
        debug_assert!(entry.is_some(), "the plan is shorter than the strokes");
        entry.unwrap_or(SegmentPlan::Direct(0))
    }

    fn next_level(&mut self) -> u32 {
        match self.next_entry() {
            SegmentPlan::Direct(level) => level,
            other => {
                debug_assert!(false, "expected a resolve level, got {:?}", other);
                0
            }
        }
    }

    fn take_chop_ts(&mut self, count: u32) -> &'l [f32] {
        let count = (count as usize).min(self.chop_ts.len());
        let (ts, rest) = self.chop_ts.split_at(count);
        self.chop_ts = rest;
        ts
    }

    fn is_done(&self) -> bool {
        self.plan.len() == 0 && self.chop_ts.is_empty()
    }
}

/// Point where the join of the next stroke comes from.
///
/// Degenerate pieces leave it unchanged.
fn update_last_control_point(pts: &InstancePoints, is_conic: bool, last_control_point: &mut Point) {
    if pts[2] != pts[3] && !is_conic {
        *last_control_point = pts[2];
    } else if pts[1] != pts[2] {
        *last_control_point = pts[1];
    } else if pts[0] != pts[1] {
        *last_control_point = pts[0];
    }
}

fn line_points(from: Point, to: Point) -> InstancePoints {
    [from, from, to, to]
}

fn write_instances(writer: &mut BinningInstanceWriter, batch: &IndirectBatch) {
    let mut plan = PlanReader::new(&batch.levels);

    for (path, options) in batch.strokes.iter() {
        writer.set_stroke(options);
        let is_round_join = options.line_join == LineJoin::Round;

        let mut last_control_point = point(0.0, 0.0);
        let mut has_last_control_point = false;
        // The first stroke of a contour waits until its previous control point is known.
        let mut deferred: Option<(u32, InstancePoints)> = None;

        for step in StrokeIterator::new(path.iter(), options) {
            let mut pieces: ArrayVec<(u32, InstancePoints), 3> = ArrayVec::new();
            let mut is_conic = false;

            match step.verb {
                StrokeVerb::Circle(center) => {
                    writer.write_circle(plan.next_level(), center);
                    last_control_point = center;
                    has_last_control_point = true;
                    continue;
                }
                StrokeVerb::MoveWithinContour(to) => {
                    // The next stroke isn't joined with anything.
                    last_control_point = to;
                    has_last_control_point = true;
                    continue;
                }
                StrokeVerb::ContourFinished => {
                    debug_assert!(has_last_control_point);
                    if let Some((level, pts)) = deferred.take() {
                        writer.write_stroke(level, &pts, last_control_point, false);
                    }
                    has_last_control_point = false;
                    continue;
                }
                StrokeVerb::Line([from, to]) => {
                    let level = if is_round_join { plan.next_level() } else { 0 };
                    pieces.push((level, line_points(from, to)));
                }
                StrokeVerb::Quadratic([from, ctrl, to]) => match plan.next_entry() {
                    SegmentPlan::Cusp { circle_level } => {
                        let curve = QuadraticBezierSegment { from, ctrl, to };
                        let cusp = curve.sample(curve.mid_tangent_t());
                        write_cusp(
                            writer,
                            &mut plan,
                            &mut pieces,
                            is_round_join,
                            circle_level,
                            [from, cusp, to],
                        );
                    }
                    plan_entry => {
                        let level = direct_level(plan_entry);
                        let cubic = QuadraticBezierSegment { from, ctrl, to }.to_cubic();
                        pieces.push((level, cubic.points()));
                    }
                },
                StrokeVerb::Conic([from, ctrl, to], weight) => match plan.next_entry() {
                    SegmentPlan::Cusp { circle_level } => {
                        let curve = ConicSegment {
                            from,
                            ctrl,
                            to,
                            weight,
                        };
                        let cusp = curve.sample(curve.mid_tangent_t());
                        write_cusp(
                            writer,
                            &mut plan,
                            &mut pieces,
                            is_round_join,
                            circle_level,
                            [from, cusp, to],
                        );
                    }
                    plan_entry => {
                        is_conic = true;
                        let level = direct_level(plan_entry);
                        pieces.push((level, [from, ctrl, to, point(weight, f32::INFINITY)]));
                    }
                },
                StrokeVerb::Cubic(pts) => match plan.next_entry() {
                    SegmentPlan::Chop {
                        num_chops,
                        cusp_level,
                    } => {
                        let ts = plan.take_chop_ts(num_chops);
                        let chopped = CubicBezierSegment::from_points(pts).split_at(ts);
                        if let Some(cusp_level) = cusp_level {
                            for piece in chopped.iter().skip(1) {
                                writer.write_circle(cusp_level, piece.from);
                            }
                        }
                        for piece in &chopped {
                            pieces.push((plan.next_level(), piece.points()));
                        }
                    }
                    plan_entry => {
                        pieces.push((direct_level(plan_entry), pts));
                    }
                },
            }

            for (i, (level, pts)) in pieces.iter().enumerate() {
                if has_last_control_point {
                    writer.write_stroke(*level, pts, last_control_point, i != 0);
                } else {
                    debug_assert!(deferred.is_none());
                    deferred = Some((*level, *pts));
                }
                update_last_control_point(pts, is_conic, &mut last_control_point);
                has_last_control_point = true;
            }
        }

        debug_assert!(deferred.is_none());
    }

    debug_assert!(plan.is_done(), "the plan is longer than the strokes");
}

fn direct_level(plan_entry: SegmentPlan) -> u32 {
    match plan_entry {
        SegmentPlan::Direct(level) => level,
        other => {
            debug_assert!(false, "expected a resolve level, got {:?}", other);
            0
        }
    }
}

/// A quadratic or conic that turns around is drawn as two lines with a circle at the
/// turnaround. The second line is an internal chop at level zero.
fn write_cusp(
    writer: &mut BinningInstanceWriter,
    plan: &mut PlanReader,
    pieces: &mut ArrayVec<(u32, InstancePoints), 3>,
    is_round_join: bool,
    circle_level: u32,
    [from, cusp, to]: [Point; 3],
) {
    writer.write_circle(circle_level, cusp);
    let level = if is_round_join { plan.next_level() } else { 0 };
    pieces.push((level, line_points(from, cusp)));
    pieces.push((0, line_points(cusp, to)));
}

#[cfg(test)]
use crate::device::{DrawCall, RecordingDevice};
#[cfg(test)]
use crate::{LineCap, TessellationError};

#[cfg(test)]
fn polyline(points: &[Point], close: bool) -> Path {
    let mut builder = Path::builder();
    builder.begin(points[0]);
    for p in &points[1..] {
        builder.line_to(*p);
    }
    builder.end(close);
    builder.build()
}

#[cfg(test)]
fn tessellate(strokes: StrokeList) -> (IndirectStrokeTessellator, RecordingDevice) {
    let mut tessellator =
        IndirectStrokeTessellator::new(strokes, &Tolerances::DEFAULT, Batching::Lanes).unwrap();
    let mut device = RecordingDevice::new();
    tessellator.prepare(&mut device).unwrap();
    tessellator.draw(&mut device);
    (tessellator, device)
}

#[test]
fn triangle_with_bevel_joins() {
    let path = polyline(
        &[point(0.0, 0.0), point(10.0, 0.0), point(0.0, 10.0)],
        true,
    );
    let mut strokes = StrokeList::new();
    strokes.push(path, StrokeOptions::DEFAULT.with_line_join(LineJoin::Bevel));
    let (tessellator, device) = tessellate(strokes);

    assert_eq!(tessellator.total_instance_count(), 3);
    assert_eq!(tessellator.draw_indirect_count(), 1);

    let instances = device.drawn_instances();
    assert_eq!(instances.len(), 3);
    for instance in &instances {
        assert!(!instance.is_internal_chop());
        assert_eq!(instance.num_edges, (3 + 2) as f32);
        assert_eq!(instance.join_type, 0.0);
        assert_eq!(instance.stroke_radius, 0.5);
        // Every line is joined with the line before it.
        assert_ne!(instance.prev_control_point(), instance.from());
    }

    // The first line is written last, joined with the closing line.
    let first = instances
        .iter()
        .find(|i| i.from() == point(0.0, 0.0))
        .unwrap();
    assert_eq!(first.prev_control_point(), point(0.0, 10.0));

    match device.draw_calls()[0] {
        DrawCall::Indirect { count, .. } => assert_eq!(count, 1),
        other => panic!("unexpected draw {:?}", other),
    }
    let commands = device.indirect_commands(crate::device::BufferId(0));
    assert_eq!(
        commands,
        vec![DrawIndirectCommand {
            vertex_count: 10,
            instance_count: 3,
            base_vertex: 0,
            base_instance: 0,
        }]
    );
}

#[test]
fn cusp_cubic_is_chopped() {
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.cubic_bezier_to(point(100.0, 100.0), point(0.0, 100.0), point(100.0, 0.0));
    builder.end(false);

    let mut strokes = StrokeList::new();
    strokes.push(builder.build(), StrokeOptions::DEFAULT);
    let (_, device) = tessellate(strokes);

    let instances = device.drawn_instances();
    assert_eq!(instances.len(), 3);
    let circles: Vec<_> = instances.iter().filter(|i| i.is_circle()).collect();
    assert_eq!(circles.len(), 1);
    let chops = instances
        .iter()
        .filter(|i| !i.is_circle() && i.is_internal_chop())
        .count();
    assert_eq!(chops, 1);
    // The second piece starts at the cusp.
    let second = instances
        .iter()
        .find(|i| !i.is_circle() && i.is_internal_chop())
        .unwrap();
    assert_eq!(second.from(), circles[0].from());
}

#[test]
fn conics_keep_their_weight() {
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.conic_to(point(10.0, 0.0), point(10.0, 10.0), 0.5);
    builder.end(false);

    let mut strokes = StrokeList::new();
    strokes.push(builder.build(), StrokeOptions::DEFAULT);
    let (_, device) = tessellate(strokes);

    let instances = device.drawn_instances();
    assert_eq!(instances.len(), 1);
    assert!(instances[0].is_conic());
    assert_eq!(instances[0].points[3][0], 0.5);
}

#[test]
fn chained_tessellators_share_one_draw() {
    let mut a = StrokeList::new();
    a.push(
        polyline(&[point(0.0, 0.0), point(10.0, 0.0)], false),
        StrokeOptions::DEFAULT
            .with_line_cap(LineCap::Round)
            .with_line_join(LineJoin::Bevel),
    );
    let mut b = StrokeList::new();
    b.push(
        polyline(&[point(0.0, 5.0), point(10.0, 5.0), point(10.0, 15.0)], false),
        StrokeOptions::DEFAULT.with_line_join(LineJoin::Miter),
    );

    let mut first =
        IndirectStrokeTessellator::new(a, &Tolerances::DEFAULT, Batching::Lanes).unwrap();
    let second =
        IndirectStrokeTessellator::new(b, &Tolerances::DEFAULT, Batching::Scalar).unwrap();
    let first_count = first.total_instance_count();
    let second_count = second.total_instance_count();
    let draw_count = first.draw_indirect_count() + second.draw_indirect_count();
    first.chain(second);

    assert_eq!(first.total_instance_count(), first_count + second_count);
    assert_eq!(first.draw_indirect_count(), draw_count);

    let mut device = RecordingDevice::new();
    first.prepare(&mut device).unwrap();
    first.draw(&mut device);

    assert_eq!(device.draw_calls().len(), 1);
    let instances = device.drawn_instances();
    assert_eq!(instances.len() as u32, first_count + second_count);
    // Miter joins anywhere in the chain set the edge count of every bin.
    let level_zero_edges = (4 + 2) as f32;
    for instance in &instances {
        if !instance.is_circle() {
            assert_eq!(instance.num_edges.abs(), level_zero_edges);
        }
    }
}

#[test]
fn allocation_failures_are_reported() {
    let path = polyline(&[point(0.0, 0.0), point(10.0, 0.0)], false);
    let mut strokes = StrokeList::new();
    strokes.push(path, StrokeOptions::DEFAULT);
    let mut tessellator =
        IndirectStrokeTessellator::new(strokes, &Tolerances::DEFAULT, Batching::Lanes).unwrap();

    // Room for the command but not for the instance.
    let mut device = RecordingDevice::with_byte_budget(20);
    assert_eq!(
        tessellator.prepare(&mut device),
        Err(TessellationError::Allocation(AllocationError::Instances {
            count: 1
        }))
    );
    assert_eq!(device.allocated_bytes(), 0);

    tessellator.draw(&mut device);
    assert!(device.draw_calls().is_empty());

    let mut device = RecordingDevice::with_byte_budget(0);
    assert_eq!(
        tessellator.prepare(&mut device),
        Err(TessellationError::Allocation(
            AllocationError::IndirectCommands { count: 1 }
        ))
    );
}

#[test]
fn invalid_options_are_rejected() {
    let mut strokes = StrokeList::new();
    strokes.push(
        polyline(&[point(0.0, 0.0), point(1.0, 0.0)], false),
        StrokeOptions::DEFAULT.with_line_width(-1.0),
    );
    assert_eq!(
        IndirectStrokeTessellator::new(strokes, &Tolerances::DEFAULT, Batching::Lanes).err(),
        Some(TessellationError::InvalidStrokeWidth(-1.0))
    );

    // The builder methods don't check their values, the constructors do.
    let mut strokes = StrokeList::new();
    strokes.push(
        polyline(&[point(0.0, 0.0), point(1.0, 0.0)], false),
        StrokeOptions::DEFAULT.with_miter_limit(0.5),
    );
    assert_eq!(
        IndirectStrokeTessellator::new(strokes, &Tolerances::DEFAULT, Batching::Lanes).err(),
        Some(TessellationError::InvalidMiterLimit(0.5))
    );
}

#[test]
fn overflowing_bins_drop_instances() {
    let mut counts = [0; NUM_RESOLVE_LEVELS];
    counts[2] = 1;
    let mut commands = Vec::new();
    let mut instances = vec![StrokeInstance::zeroed(); 1];
    let mut writer = BinningInstanceWriter::new(&mut commands, &mut instances, 0, 0, &counts);

    writer.write_circle(2, point(1.0, 2.0));
    writer.write_circle(2, point(3.0, 4.0));
    assert_eq!(writer.dropped, 1);
    drop(writer);

    assert_eq!(commands.len(), 1);
    assert_eq!(instances[0].points[0], [1.0, 2.0]);
}

#[test]
fn empty_list_draws_nothing() {
    let (tessellator, device) = tessellate(StrokeList::new());
    assert_eq!(tessellator.draw_indirect_count(), 0);
    assert_eq!(device.buffer_count(), 0);
    assert!(device.draw_calls().is_empty());
}

#[test]
fn concatenated_lists_count_like_chained_tessellators() {
    let a = polyline(&[point(0.0, 0.0), point(10.0, 0.0)], false);
    let b = polyline(&[point(0.0, 0.0), point(5.0, 5.0), point(10.0, 0.0)], true);

    let mut list = StrokeList::new();
    list.push(a.clone(), StrokeOptions::DEFAULT);
    let mut other = StrokeList::with_capacity(1);
    other.extend(Some((b.clone(), StrokeOptions::DEFAULT.with_line_width(3.0))));
    list.concatenate(other);
    assert_eq!(list.len(), 2);
    assert_eq!(list.verb_count(), a.verb_count() + b.verb_count());

    let concatenated =
        IndirectStrokeTessellator::new(list, &Tolerances::DEFAULT, Batching::Lanes).unwrap();

    let mut first_list = StrokeList::new();
    first_list.push(a, StrokeOptions::DEFAULT);
    let mut second_list = StrokeList::new();
    second_list.push(b, StrokeOptions::DEFAULT.with_line_width(3.0));
    let mut chained =
        IndirectStrokeTessellator::new(first_list, &Tolerances::DEFAULT, Batching::Lanes).unwrap();
    chained.chain(
        IndirectStrokeTessellator::new(second_list, &Tolerances::DEFAULT, Batching::Lanes)
            .unwrap(),
    );

    assert_eq!(concatenated.level_counts(), chained.level_counts());
    assert_eq!(
        concatenated.total_instance_count(),
        chained.total_instance_count()
    );
}
