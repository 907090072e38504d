//! Resolve levels of stroke instances.
//!
//! The number of edges a stroke instance needs is the sum of the edges needed to follow the
//! curve (Wang's formula, the *parametric* segments) and the edges needed to keep the outer side
//! of the stroke smooth while it rotates (the *radial* segments, which depend on the stroke
//! width). Rotation includes the preceding join when joins are round. The resolve level is the
//! base 2 logarithm of that number, rounded up and pinned to `[0, MAX_RESOLVE_LEVEL]`.
//!
//! Segments are queued by kind and their levels are computed four at a time, or one at a time
//! with [Batching::Scalar]. The result is the same either way. Since levels are computed later
//! than the segments are visited, each segment reserves a slot in the plan that is filled when its
//! queue is flushed.

use crate::geom::arrayvec::ArrayVec;
use crate::geom::classify::{classify_cubic, classify_quadratic};
use crate::geom::{CubicBezierSegment, QuadraticBezierSegment};
use crate::math::Point;
use crate::path::Path;
use crate::simd::{angle_between_vectors, next_log2_pinned, F32x4, LaneVector, Lanes};
use crate::stroke_iterator::{StrokeIterator, StrokeStep, StrokeVerb};
use crate::{
    Batching, LineJoin, StrokeOptions, Tolerances, MAX_RESOLVE_LEVEL, NUM_RESOLVE_LEVELS,
};

/// How the counting pass decided to draw a stroke.
///
/// The plan is consumed in order by the pass that writes the instances. Lines without round
/// joins are always drawn at level zero and don't have an entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SegmentPlan {
    /// A single instance at this resolve level.
    Direct(u32),
    /// A cubic chopped at the next `num_chops` chop parameters. It is followed by one `Direct`
    /// entry per piece.
    ///
    /// When the chops are cusps, a circle is drawn at each of them at `cusp_level`.
    Chop {
        num_chops: u32,
        cusp_level: Option<u32>,
    },
    /// A quadratic or conic that turns around on itself, drawn as two lines with a circle at
    /// the turnaround. When joins are round it is followed by a `Direct` entry for the first line.
    Cusp { circle_level: u32 },
}

/// What the counting pass produces.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolveLevels {
    /// Number of instances at each resolve level.
    pub counts: [u32; NUM_RESOLVE_LEVELS],
    pub plan: Vec<SegmentPlan>,
    pub chop_ts: Vec<f32>,
}

impl ResolveLevels {
    pub fn total_instance_count(&self) -> u32 {
        self.counts.iter().sum()
    }

    /// Number of levels with at least one instance.
    pub fn non_empty_level_count(&self) -> u32 {
        self.counts.iter().filter(|c| **c != 0).count() as u32
    }
}

#[derive(Copy, Clone, Debug)]
struct Pending<const N: usize> {
    pts: [Point; N],
    last_control_point: Point,
    slot: usize,
}

const QUEUE_SIZE: usize = 4;

type LevelFn<const N: usize> = fn(&ResolveLevelCounter, &[Pending<N>]) -> [u32; 4];

/// Counts the instances at each resolve level for a list of strokes.
pub struct ResolveLevelCounter {
    tolerances: Tolerances,
    batching: Batching,

    stroke: Option<(f32, bool)>,
    is_round_join: bool,
    num_radial_segments_per_radian: f32,
    circle_level: u32,
    wangs_term_quadratic: f32,
    wangs_term_cubic: f32,

    levels: ResolveLevels,
    plan_bound: usize,
    chop_ts_bound: usize,

    lines: ArrayVec<Pending<2>, QUEUE_SIZE>,
    quadratics: ArrayVec<Pending<3>, QUEUE_SIZE>,
    cubics: ArrayVec<Pending<4>, QUEUE_SIZE>,
}

impl ResolveLevelCounter {
    /// Creates a counter for strokes with at most `verb_count` path verbs in total.
    ///
    /// Every verb produces at most four plan entries (a chop entry and three pieces) and two chop
    /// parameters, plus two entries for the caps of a contour without a begin verb.
    pub fn new(tolerances: &Tolerances, batching: Batching, verb_count: usize) -> Self {
        let plan_bound = verb_count * (3 + 1) + 2;
        let chop_ts_bound = verb_count * 2;
        ResolveLevelCounter {
            tolerances: *tolerances,
            batching,
            stroke: None,
            is_round_join: false,
            num_radial_segments_per_radian: 0.0,
            circle_level: 1,
            wangs_term_quadratic: 0.0,
            wangs_term_cubic: 0.0,
            levels: ResolveLevels {
                counts: [0; NUM_RESOLVE_LEVELS],
                plan: Vec::with_capacity(plan_bound),
                chop_ts: Vec::with_capacity(chop_ts_bound),
            },
            plan_bound,
            chop_ts_bound,
            lines: ArrayVec::new(),
            quadratics: ArrayVec::new(),
            cubics: ArrayVec::new(),
        }
    }

    pub fn is_round_join(&self) -> bool {
        self.is_round_join
    }

    /// The resolve level of circles with the current stroke width.
    pub fn circle_level(&self) -> u32 {
        self.circle_level
    }

    /// Switches to the tolerances of a new stroke, if its width or its join kind changed.
    pub fn set_stroke(&mut self, options: &StrokeOptions) {
        let is_round_join = options.line_join == LineJoin::Round;
        let stroke = (options.line_width, is_round_join);
        if self.stroke == Some(stroke) {
            return;
        }

        // Queued segments were counted with the previous tolerances.
        self.flush();

        let precision = self.tolerances.parametric_precision();
        self.stroke = Some(stroke);
        self.is_round_join = is_round_join;
        self.num_radial_segments_per_radian = self
            .tolerances
            .num_radial_segments_per_radian(options.line_width);
        self.circle_level =
            Tolerances::resolve_level_for_circles(self.num_radial_segments_per_radian);
        self.wangs_term_quadratic = crate::geom::wangs_formula::length_term(2, precision);
        self.wangs_term_cubic = crate::geom::wangs_formula::length_term(3, precision);
    }

    /// Counts every stroke of a path.
    pub fn count_path(&mut self, path: &Path, options: &StrokeOptions) {
        self.set_stroke(options);
        for step in StrokeIterator::new(path.iter(), options) {
            self.count_step(&step);
        }
    }

    pub fn count_step(&mut self, step: &StrokeStep) {
        let start = match step.verb.first_point() {
            Some(p) if step.verb.is_geometric() => p,
            _ => return,
        };

        // Round joins need the direction of the previous stroke. It doesn't have to be the exact
        // control point the instance will use after chopping.
        let last_control_point = if self.is_round_join {
            join_control_point(&step.prev, start)
        } else {
            start
        };

        match step.verb {
            StrokeVerb::Line(pts) => self.count_line(pts, last_control_point),
            StrokeVerb::Quadratic(pts) | StrokeVerb::Conic(pts, _) => {
                // Conics use the quadratic formula, ignoring the weight.
                let curve = QuadraticBezierSegment {
                    from: pts[0],
                    ctrl: pts[1],
                    to: pts[2],
                };
                if classify_quadratic(&curve).chops_are_cusps {
                    // Two lines and a circle instead of a curve.
                    let circle_level = self.count_circles(1);
                    self.levels.plan.push(SegmentPlan::Cusp { circle_level });
                    self.count_line([pts[0], pts[1]], last_control_point);
                    self.levels.counts[0] += 1;
                } else {
                    self.count_quadratic(pts, last_control_point);
                }
            }
            StrokeVerb::Cubic(pts) => {
                let curve = CubicBezierSegment::from_points(pts);
                let classification = classify_cubic(&curve);
                if classification.is_convex_180() {
                    self.count_cubic(pts, last_control_point);
                    return;
                }

                let num_chops = classification.chops.len() as u32;
                let cusp_level = if classification.chops_are_cusps {
                    Some(self.count_circles(num_chops))
                } else {
                    None
                };
                self.levels.plan.push(SegmentPlan::Chop {
                    num_chops,
                    cusp_level,
                });
                self.levels
                    .chop_ts
                    .extend_from_slice(&classification.chops);

                for (i, piece) in curve.split_at(&classification.chops).iter().enumerate() {
                    // Pieces after the first continue smoothly from the previous one.
                    let cp = if i == 0 {
                        last_control_point
                    } else {
                        piece.from
                    };
                    self.count_cubic(piece.points(), cp);
                }
            }
            StrokeVerb::Circle(_) => {
                let level = self.count_circles(1);
                self.levels.plan.push(SegmentPlan::Direct(level));
            }
            StrokeVerb::MoveWithinContour(_) | StrokeVerb::ContourFinished => {}
        }
    }

    /// Counts 180 degree point strokes, which render as circles with a diameter equal to the
    /// stroke width. Returns their resolve level.
    pub fn count_circles(&mut self, count: u32) -> u32 {
        self.levels.counts[self.circle_level as usize] += count;
        self.circle_level
    }

    fn count_line(&mut self, pts: [Point; 2], last_control_point: Point) {
        if !self.is_round_join {
            // Lines don't have a resolve level of their own.
            self.levels.counts[0] += 1;
            return;
        }

        let slot = self.reserve_slot();
        self.lines.push(Pending {
            pts,
            last_control_point,
            slot,
        });
        if self.lines.len() >= self.queue_capacity() {
            self.flush_lines();
        }
    }

    fn count_quadratic(&mut self, pts: [Point; 3], last_control_point: Point) {
        let slot = self.reserve_slot();
        self.quadratics.push(Pending {
            pts,
            last_control_point,
            slot,
        });
        if self.quadratics.len() >= self.queue_capacity() {
            self.flush_quadratics();
        }
    }

    fn count_cubic(&mut self, pts: [Point; 4], last_control_point: Point) {
        let slot = self.reserve_slot();
        self.cubics.push(Pending {
            pts,
            last_control_point,
            slot,
        });
        if self.cubics.len() >= self.queue_capacity() {
            self.flush_cubics();
        }
    }

    fn reserve_slot(&mut self) -> usize {
        let slot = self.levels.plan.len();
        // Filled when the queue is flushed.
        self.levels.plan.push(SegmentPlan::Direct(0));
        slot
    }

    fn queue_capacity(&self) -> usize {
        match self.batching {
            Batching::Scalar => 1,
            Batching::Lanes => QUEUE_SIZE,
        }
    }

    /// Computes the levels of every queued segment.
    pub fn flush(&mut self) {
        self.flush_lines();
        self.flush_quadratics();
        self.flush_cubics();
    }

    /// Flushes the queues and returns the counts and the plan.
    pub fn finish(mut self) -> ResolveLevels {
        self.flush();
        debug_assert!(self.levels.plan.len() <= self.plan_bound);
        debug_assert!(self.levels.chop_ts.len() <= self.chop_ts_bound);

        self.levels
    }

    fn flush_lines(&mut self) {
        let queue = std::mem::take(&mut self.lines);
        self.flush_queue(&queue, Self::line_levels::<f32>, Self::line_levels::<F32x4>);
    }

    fn flush_quadratics(&mut self) {
        let queue = std::mem::take(&mut self.quadratics);
        self.flush_queue(
            &queue,
            Self::quadratic_levels::<f32>,
            Self::quadratic_levels::<F32x4>,
        );
    }

    fn flush_cubics(&mut self) {
        let queue = std::mem::take(&mut self.cubics);
        self.flush_queue(&queue, Self::cubic_levels::<f32>, Self::cubic_levels::<F32x4>);
    }

    fn flush_queue<const N: usize>(
        &mut self,
        queue: &[Pending<N>],
        scalar: LevelFn<N>,
        lanes: LevelFn<N>,
    ) {
        let (chunk_size, compute_levels) = match self.batching {
            Batching::Scalar => (1, scalar),
            Batching::Lanes => (QUEUE_SIZE, lanes),
        };

        for chunk in queue.chunks(chunk_size) {
            let levels = compute_levels(self, chunk);
            for (entry, level) in chunk.iter().zip(levels.iter()) {
                self.levels.plan[entry.slot] = SegmentPlan::Direct(*level);
                self.levels.counts[*level as usize] += 1;
            }
        }
    }

    fn line_levels<L: Lanes>(&self, batch: &[Pending<2>]) -> [u32; 4] {
        let p0 = load_points::<L, 2>(batch, 0);
        let p1 = load_points::<L, 2>(batch, 1);
        let last_cp = load_control_points::<L, 2>(batch);

        // A line only rotates in its join.
        let rotation = angle_between_vectors(p0 - last_cp, p1 - p0);

        self.resolve_levels(L::splat(0.0), rotation)
    }

    fn quadratic_levels<L: Lanes>(&self, batch: &[Pending<3>]) -> [u32; 4] {
        let p0 = load_points::<L, 3>(batch, 0);
        let p1 = load_points::<L, 3>(batch, 1);
        let p2 = load_points::<L, 3>(batch, 2);

        let v = p1.scale(L::splat(-2.0)) + p2 + p0;
        let parametric = (L::splat(self.wangs_term_quadratic) * v.square_length().sqrt()).sqrt();

        let tan0 = p1 - p0;
        let tan1 = p2 - p1;
        let mut rotation = angle_between_vectors(tan0, tan1);
        if self.is_round_join {
            let last_cp = load_control_points::<L, 3>(batch);
            let next_tan = tan0.or_if_zero(tan1);
            rotation = rotation + angle_between_vectors(p0 - last_cp, next_tan);
        }

        self.resolve_levels(parametric, rotation)
    }

    fn cubic_levels<L: Lanes>(&self, batch: &[Pending<4>]) -> [u32; 4] {
        let p0 = load_points::<L, 4>(batch, 0);
        let p1 = load_points::<L, 4>(batch, 1);
        let p2 = load_points::<L, 4>(batch, 2);
        let p3 = load_points::<L, 4>(batch, 3);

        let l0 = (p1.scale(L::splat(-2.0)) + p2 + p0).square_length();
        let l1 = (p2.scale(L::splat(-2.0)) + p3 + p1).square_length();
        let parametric = (L::splat(self.wangs_term_cubic) * l0.max(l1).sqrt()).sqrt();

        let tan0 = (p1 - p0).or_if_zero(p2 - p0);
        let tan1 = (p3 - p2).or_if_zero(p3 - p1);
        let mut rotation = angle_between_vectors(tan0, tan1);
        if self.is_round_join {
            // Zero where the control point is the start point, so there is no need to skip them.
            let last_cp = load_control_points::<L, 4>(batch);
            let next_tan = tan0.or_if_zero(tan1);
            rotation = rotation + angle_between_vectors(p0 - last_cp, next_tan);
        }

        self.resolve_levels(parametric, rotation)
    }

    fn resolve_levels<L: Lanes>(&self, parametric: L, rotation: L) -> [u32; 4] {
        let num_combined_segments =
            L::splat(self.num_radial_segments_per_radian) * rotation + parametric;

        next_log2_pinned(num_combined_segments, MAX_RESOLVE_LEVEL)
    }
}

/// The point the join at the start of a stroke comes from.
///
/// Strokes that follow a circle or a move have no join: the start point itself is returned so
/// that the incoming direction is zero.
pub(crate) fn join_control_point(prev: &StrokeVerb, start: Point) -> Point {
    match *prev {
        StrokeVerb::Cubic(p) if p[2] != p[3] => p[2],
        StrokeVerb::Cubic([p0, p1, p2, _])
        | StrokeVerb::Quadratic([p0, p1, p2])
        | StrokeVerb::Conic([p0, p1, p2], _) => {
            if p1 != p2 {
                p1
            } else {
                p0
            }
        }
        StrokeVerb::Line([p0, _]) => p0,
        StrokeVerb::Circle(_)
        | StrokeVerb::MoveWithinContour(_)
        | StrokeVerb::ContourFinished => start,
    }
}

fn load_points<L: Lanes, const N: usize>(batch: &[Pending<N>], idx: usize) -> LaneVector<L> {
    load(batch, |entry| entry.pts[idx])
}

fn load_control_points<L: Lanes, const N: usize>(batch: &[Pending<N>]) -> LaneVector<L> {
    load(batch, |entry| entry.last_control_point)
}

fn load<L: Lanes, const N: usize>(
    batch: &[Pending<N>],
    point: impl Fn(&Pending<N>) -> Point,
) -> LaneVector<L> {
    debug_assert!(batch.len() <= L::COUNT);
    let mut xs = [0.0; 4];
    let mut ys = [0.0; 4];
    for (i, entry) in batch.iter().enumerate() {
        let p = point(entry);
        xs[i] = p.x;
        ys[i] = p.y;
    }

    LaneVector::new(L::load(&xs[..batch.len()]), L::load(&ys[..batch.len()]))
}

#[cfg(test)]
use crate::math::point;

#[cfg(test)]
fn count(path: &Path, options: &StrokeOptions, batching: Batching) -> ResolveLevels {
    let mut counter = ResolveLevelCounter::new(&Tolerances::DEFAULT, batching, path.verb_count());
    counter.count_path(path, options);
    counter.finish()
}

#[cfg(test)]
fn single_cubic(from: Point, ctrl1: Point, ctrl2: Point, to: Point) -> Path {
    let mut builder = Path::builder();
    builder.begin(from);
    builder.cubic_bezier_to(ctrl1, ctrl2, to);
    builder.end(false);
    builder.build()
}

#[test]
fn lines_without_round_joins_have_no_plan() {
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.line_to(point(10.0, 0.0));
    builder.line_to(point(10.0, 10.0));
    builder.end(false);
    let path = builder.build();

    let levels = count(&path, &StrokeOptions::DEFAULT, Batching::Lanes);
    assert!(levels.plan.is_empty());
    assert_eq!(levels.counts[0], 2);
    assert_eq!(levels.total_instance_count(), 2);
    assert_eq!(levels.non_empty_level_count(), 1);
}

#[test]
fn round_joins_add_rotation_to_lines() {
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.line_to(point(10.0, 0.0));
    builder.line_to(point(10.0, 10.0));
    builder.end(false);
    let path = builder.build();

    let options = StrokeOptions::DEFAULT
        .with_line_join(LineJoin::Round)
        .with_line_width(20.0);
    let levels = count(&path, &options, Batching::Lanes);
    assert_eq!(levels.plan.len(), 2);
    // The second line is emitted first, joined at a right angle.
    match levels.plan[0] {
        SegmentPlan::Direct(level) => assert!(level > 0),
        other => panic!("unexpected plan {:?}", other),
    }
    // The first line follows a move and has no join.
    assert_eq!(levels.plan[1], SegmentPlan::Direct(0));
}

#[test]
fn cusp_cubic_plan() {
    let path = single_cubic(
        point(0.0, 0.0),
        point(100.0, 100.0),
        point(0.0, 100.0),
        point(100.0, 0.0),
    );
    let levels = count(&path, &StrokeOptions::DEFAULT, Batching::Scalar);
    match levels.plan[0] {
        SegmentPlan::Chop {
            num_chops: 1,
            cusp_level: Some(level),
        } => assert!(level >= 1),
        other => panic!("unexpected plan {:?}", other),
    }
    assert_eq!(levels.chop_ts.len(), 1);
    assert!((levels.chop_ts[0] - 0.5).abs() < 1e-3);
    // One chop entry, two pieces, and one circle.
    assert_eq!(levels.plan.len(), 3);
    assert_eq!(levels.total_instance_count(), 3);
}

#[test]
fn flat_quadratic_turnaround() {
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.quadratic_bezier_to(point(10.0, 0.0), point(5.0, 0.0));
    builder.end(false);
    let path = builder.build();

    let levels = count(&path, &StrokeOptions::DEFAULT, Batching::Lanes);
    let circle_level = Tolerances::resolve_level_for_circles(
        Tolerances::DEFAULT.num_radial_segments_per_radian(1.0),
    );
    assert_eq!(levels.plan, vec![SegmentPlan::Cusp { circle_level }]);
    assert_eq!(levels.counts[0], 2);
    assert_eq!(levels.counts[circle_level as usize], 1);
}

#[test]
fn levels_are_pinned() {
    let path = single_cubic(
        point(0.0, 0.0),
        point(1e9, 1e9),
        point(2e9, 1e9),
        point(3e9, 0.0),
    );
    let levels = count(&path, &StrokeOptions::DEFAULT, Batching::Lanes);
    assert!(levels.plan.contains(&SegmentPlan::Direct(MAX_RESOLVE_LEVEL)));
}

#[test]
fn partial_batches_match_scalar() {
    // Three curves don't fill a batch of four.
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.cubic_bezier_to(point(10.0, 20.0), point(20.0, 20.0), point(30.0, 0.0));
    builder.quadratic_bezier_to(point(40.0, -30.0), point(50.0, 0.0));
    builder.cubic_bezier_to(point(60.0, 1.0), point(70.0, -1.0), point(80.0, 0.0));
    builder.close();
    let path = builder.build();

    for join in &[LineJoin::Miter, LineJoin::Round] {
        let options = StrokeOptions::DEFAULT
            .with_line_join(*join)
            .with_line_width(3.0);
        assert_eq!(
            count(&path, &options, Batching::Scalar),
            count(&path, &options, Batching::Lanes)
        );
    }
}

#[test]
fn join_control_points() {
    let start = point(9.0, 9.0);
    let line = StrokeVerb::Line([point(0.0, 0.0), point(1.0, 0.0)]);
    assert_eq!(join_control_point(&line, start), point(0.0, 0.0));

    let cubic = StrokeVerb::Cubic([
        point(0.0, 0.0),
        point(1.0, 0.0),
        point(2.0, 2.0),
        point(2.0, 2.0),
    ]);
    assert_eq!(join_control_point(&cubic, start), point(1.0, 0.0));

    let circle = StrokeVerb::Circle(point(3.0, 3.0));
    assert_eq!(join_control_point(&circle, start), start);
}
