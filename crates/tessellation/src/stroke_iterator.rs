//! Walks the events of a path and produces the sequence of strokes to draw.
//!
//! Each step pairs the stroke to draw with the stroke that precedes it, so that the consumer can
//! work out the join between the two. Caps are turned into extra strokes: round caps become
//! circles and square caps become short lines that extend the contour by half the stroke width.
//! Closing a contour draws a line back to its start if needed.
//!
//! The first stroke of every contour is held back until the end of the contour, once it is known
//! what it joins with.
//!
//! Segments whose control points all coincide are dropped. A contour that only contains such
//! segments (or no segment at all) has zero length and gets a circle for round caps, a square for
//! square caps, and nothing for butt caps.

use crate::geom::arrayvec::ArrayVec;
use crate::math::{vector, Point, Vector};
use crate::path::PathEvent;
use crate::{LineCap, StrokeOptions};

/// What a [StrokeStep] draws.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum StrokeVerb {
    Line([Point; 2]),
    Quadratic([Point; 3]),
    Conic([Point; 3], f32),
    Cubic([Point; 4]),
    /// A stroke-width circle, drawn as a 180 degree point stroke.
    Circle(Point),
    /// Moves within the contour without drawing. The stroke that follows is not joined with the
    /// stroke that precedes it.
    MoveWithinContour(Point),
    /// The end of a contour.
    ContourFinished,
}

impl StrokeVerb {
    /// Whether the verb draws something.
    #[inline]
    pub fn is_geometric(&self) -> bool {
        !matches!(
            self,
            StrokeVerb::MoveWithinContour(_) | StrokeVerb::ContourFinished
        )
    }

    /// The points of the verb. Empty for `ContourFinished`.
    pub fn points(&self) -> &[Point] {
        match self {
            StrokeVerb::Line(pts) => pts,
            StrokeVerb::Quadratic(pts) | StrokeVerb::Conic(pts, _) => pts,
            StrokeVerb::Cubic(pts) => pts,
            StrokeVerb::Circle(p) | StrokeVerb::MoveWithinContour(p) => std::slice::from_ref(p),
            StrokeVerb::ContourFinished => &[],
        }
    }

    pub fn first_point(&self) -> Option<Point> {
        self.points().first().copied()
    }

    pub fn last_point(&self) -> Option<Point> {
        self.points().last().copied()
    }

    /// Direction of the stroke at its end, skipping control points that coincide with the end.
    fn end_tangent(&self) -> Vector {
        let pts = self.points();
        let n = pts.len();
        let mut tangent = vector(0.0, 0.0);
        for i in (0..n.saturating_sub(1)).rev() {
            tangent = pts[n - 1] - pts[i];
            if tangent != vector(0.0, 0.0) {
                break;
            }
        }

        tangent
    }

    /// Direction of the stroke at its start, skipping control points that coincide with the
    /// start.
    fn start_tangent(&self) -> Vector {
        let pts = self.points();
        let mut tangent = vector(0.0, 0.0);
        for p in pts.iter().skip(1) {
            tangent = *p - pts[0];
            if tangent != vector(0.0, 0.0) {
                break;
            }
        }

        tangent
    }
}

/// A stroke to draw, paired with the stroke that precedes it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StrokeStep {
    pub prev: StrokeVerb,
    pub verb: StrokeVerb,
}

const QUEUE_CAPACITY: usize = 8;

/// An iterator of [StrokeStep] over the events of a path.
pub struct StrokeIterator<Iter> {
    events: Iter,
    line_cap: LineCap,
    stroke_radius: f32,
    queue: ArrayVec<StrokeVerb, QUEUE_CAPACITY>,
    first_verb_in_contour: Option<StrokeVerb>,
    last_degenerate_point: Option<Point>,
}

impl<Iter: Iterator<Item = PathEvent>> StrokeIterator<Iter> {
    pub fn new(events: Iter, options: &StrokeOptions) -> Self {
        StrokeIterator {
            events,
            line_cap: options.line_cap,
            stroke_radius: options.stroke_radius(),
            queue: ArrayVec::new(),
            first_verb_in_contour: None,
            last_degenerate_point: None,
        }
    }

    fn enqueue(&mut self, verb: StrokeVerb) {
        debug_assert!(!self.queue.is_full());
        self.queue.push(verb);
    }

    fn current_step(&self) -> StrokeStep {
        debug_assert!(self.queue.len() >= 2);
        StrokeStep {
            prev: self.queue[0],
            verb: self.queue[1],
        }
    }

    /// Enqueues a segment, or drops it if it is degenerate.
    ///
    /// Returns true if the segment was the first of its contour, in which case it has to wait
    /// for the end of the contour before being emitted.
    fn add_segment(&mut self, verb: StrokeVerb) -> bool {
        let pts = verb.points();
        if pts.iter().all(|p| *p == pts[0]) {
            self.last_degenerate_point = verb.last_point();
            return true;
        }

        self.enqueue(verb);
        if self.queue.len() == 1 {
            self.first_verb_in_contour = Some(verb);
            return true;
        }

        false
    }

    fn close_contour(&mut self, last: Point) -> bool {
        let first_verb = match self.first_verb_in_contour {
            Some(verb) if !self.queue.is_empty() => verb,
            _ => {
                self.last_degenerate_point = Some(last);
                return self.finish_open_contour();
            }
        };

        let first = first_verb.first_point().unwrap_or(last);
        if last != first {
            self.enqueue(StrokeVerb::Line([last, first]));
        }
        // Repeat the first verb, this time as the current stroke instead of the previous one.
        self.enqueue(first_verb);
        self.enqueue(StrokeVerb::ContourFinished);
        self.first_verb_in_contour = None;
        self.last_degenerate_point = None;

        true
    }

    /// Finishes the current contour without closing it, adding the caps and the first stroke of
    /// the contour.
    ///
    /// Returns false if there is nothing to finish.
    fn finish_open_contour(&mut self) -> bool {
        if let Some(first_verb) = self.first_verb_in_contour.filter(|_| !self.queue.is_empty()) {
            let first = first_verb.first_point().unwrap_or_else(Point::origin);
            let back = self.queue[self.queue.len() - 1];
            let last = back.last_point().unwrap_or(first);
            match self.line_cap {
                LineCap::Butt => {
                    // No caps, but the move keeps the first stroke from being joined with the
                    // end of the contour.
                    self.enqueue(StrokeVerb::MoveWithinContour(first));
                }
                LineCap::Round => {
                    // The circles also act as a barrier between the end and the start. The start
                    // goes last.
                    self.enqueue(StrokeVerb::Circle(last));
                    self.enqueue(StrokeVerb::Circle(first));
                }
                LineCap::Square => {
                    let end_tangent = back.end_tangent();
                    let end_cap = last + end_tangent * (self.stroke_radius / end_tangent.length());
                    let start_tangent = first_verb.start_tangent();
                    let start_cap =
                        first + start_tangent * (-self.stroke_radius / start_tangent.length());

                    self.enqueue(StrokeVerb::Line([last, end_cap]));
                    self.enqueue(StrokeVerb::MoveWithinContour(start_cap));
                    self.enqueue(StrokeVerb::Line([start_cap, first]));
                }
            }
            self.enqueue(first_verb);
        } else if let Some(p) = self.last_degenerate_point {
            // Only round and square caps are drawn on zero-length contours.
            match self.line_cap {
                LineCap::Butt => {
                    self.last_degenerate_point = None;
                    return false;
                }
                LineCap::Round => {
                    // The move keeps the cap from being joined with anything.
                    self.enqueue(StrokeVerb::MoveWithinContour(p));
                    self.enqueue(StrokeVerb::Circle(p));
                }
                LineCap::Square => {
                    // An axis-aligned square, drawn as a horizontal line through the point.
                    let r = vector(self.stroke_radius, 0.0);
                    self.enqueue(StrokeVerb::MoveWithinContour(p - r));
                    self.enqueue(StrokeVerb::Line([p - r, p + r]));
                }
            }
        } else {
            return false;
        }

        self.enqueue(StrokeVerb::ContourFinished);
        self.first_verb_in_contour = None;
        self.last_degenerate_point = None;

        true
    }
}

impl<Iter: Iterator<Item = PathEvent>> Iterator for StrokeIterator<Iter> {
    type Item = StrokeStep;

    fn next(&mut self) -> Option<StrokeStep> {
        if !self.queue.is_empty() {
            debug_assert!(self.queue.len() >= 2);
            self.queue.remove(0);
            if self.queue.len() >= 2 {
                return Some(self.current_step());
            }
            if self.queue.first() == Some(&StrokeVerb::ContourFinished) {
                // ContourFinished is never the previous stroke of anything.
                self.queue.clear();
            }
        }

        while let Some(event) = self.events.next() {
            let ready = match event {
                PathEvent::Begin { at } => {
                    debug_assert!(self.queue.is_empty());
                    // A contour without any segment still gets caps.
                    self.last_degenerate_point = Some(at);
                    false
                }
                PathEvent::Line { from, to } => !self.add_segment(StrokeVerb::Line([from, to])),
                PathEvent::Quadratic { from, ctrl, to } => {
                    !self.add_segment(StrokeVerb::Quadratic([from, ctrl, to]))
                }
                PathEvent::Conic {
                    from,
                    ctrl,
                    to,
                    weight,
                } => !self.add_segment(StrokeVerb::Conic([from, ctrl, to], weight)),
                PathEvent::Cubic {
                    from,
                    ctrl1,
                    ctrl2,
                    to,
                } => !self.add_segment(StrokeVerb::Cubic([from, ctrl1, ctrl2, to])),
                PathEvent::End {
                    last, close: true, ..
                } => self.close_contour(last),
                PathEvent::End { close: false, .. } => self.finish_open_contour(),
            };

            if ready {
                return Some(self.current_step());
            }
        }

        if self.finish_open_contour() {
            return Some(self.current_step());
        }

        None
    }
}

#[cfg(test)]
use crate::math::point;
#[cfg(test)]
use crate::path::Path;

#[cfg(test)]
fn verbs(path: &Path, options: &StrokeOptions) -> Vec<StrokeVerb> {
    StrokeIterator::new(path.iter(), options)
        .map(|step| step.verb)
        .collect()
}

#[test]
fn open_contour_with_butt_caps() {
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.line_to(point(10.0, 0.0));
    builder.line_to(point(10.0, 10.0));
    builder.end(false);
    let path = builder.build();

    let steps: Vec<StrokeStep> =
        StrokeIterator::new(path.iter(), &StrokeOptions::DEFAULT).collect();
    let a = StrokeVerb::Line([point(0.0, 0.0), point(10.0, 0.0)]);
    let b = StrokeVerb::Line([point(10.0, 0.0), point(10.0, 10.0)]);
    let mv = StrokeVerb::MoveWithinContour(point(0.0, 0.0));

    assert_eq!(
        steps,
        vec![
            StrokeStep { prev: a, verb: b },
            StrokeStep { prev: b, verb: mv },
            StrokeStep { prev: mv, verb: a },
            StrokeStep {
                prev: a,
                verb: StrokeVerb::ContourFinished
            },
        ]
    );
}

#[test]
fn closed_contour_repeats_first_stroke() {
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.line_to(point(10.0, 0.0));
    builder.line_to(point(10.0, 10.0));
    builder.close();
    let path = builder.build();

    let steps: Vec<StrokeStep> =
        StrokeIterator::new(path.iter(), &StrokeOptions::DEFAULT).collect();
    let a = StrokeVerb::Line([point(0.0, 0.0), point(10.0, 0.0)]);
    let b = StrokeVerb::Line([point(10.0, 0.0), point(10.0, 10.0)]);
    let c = StrokeVerb::Line([point(10.0, 10.0), point(0.0, 0.0)]);

    assert_eq!(
        steps,
        vec![
            StrokeStep { prev: a, verb: b },
            StrokeStep { prev: b, verb: c },
            StrokeStep { prev: c, verb: a },
            StrokeStep {
                prev: a,
                verb: StrokeVerb::ContourFinished
            },
        ]
    );
}

#[test]
fn closing_at_the_start_point_adds_no_line() {
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.line_to(point(10.0, 0.0));
    builder.line_to(point(0.0, 0.0));
    builder.close();
    let path = builder.build();

    let verbs = verbs(&path, &StrokeOptions::DEFAULT);
    assert_eq!(verbs.len(), 3);
    assert_eq!(verbs[2], StrokeVerb::ContourFinished);
}

#[test]
fn round_caps_are_circles() {
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.quadratic_bezier_to(point(5.0, 5.0), point(10.0, 0.0));
    builder.end(false);
    let path = builder.build();

    let options = StrokeOptions::DEFAULT.with_line_cap(LineCap::Round);
    let verbs = verbs(&path, &options);
    assert_eq!(
        verbs,
        vec![
            StrokeVerb::Circle(point(10.0, 0.0)),
            StrokeVerb::Circle(point(0.0, 0.0)),
            StrokeVerb::Quadratic([point(0.0, 0.0), point(5.0, 5.0), point(10.0, 0.0)]),
            StrokeVerb::ContourFinished,
        ]
    );
}

#[test]
fn square_caps_extend_the_contour() {
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.line_to(point(10.0, 0.0));
    builder.end(false);
    let path = builder.build();

    let options = StrokeOptions::DEFAULT
        .with_line_cap(LineCap::Square)
        .with_line_width(4.0);
    let verbs = verbs(&path, &options);
    assert_eq!(
        verbs,
        vec![
            StrokeVerb::Line([point(10.0, 0.0), point(12.0, 0.0)]),
            StrokeVerb::MoveWithinContour(point(-2.0, 0.0)),
            StrokeVerb::Line([point(-2.0, 0.0), point(0.0, 0.0)]),
            StrokeVerb::Line([point(0.0, 0.0), point(10.0, 0.0)]),
            StrokeVerb::ContourFinished,
        ]
    );
}

#[test]
fn degenerate_segments_are_dropped() {
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.line_to(point(0.0, 0.0));
    builder.line_to(point(5.0, 0.0));
    builder.cubic_bezier_to(point(5.0, 0.0), point(5.0, 0.0), point(5.0, 0.0));
    builder.line_to(point(5.0, 5.0));
    builder.end(false);
    let path = builder.build();

    let verbs = verbs(&path, &StrokeOptions::DEFAULT);
    assert_eq!(
        verbs,
        vec![
            StrokeVerb::Line([point(5.0, 0.0), point(5.0, 5.0)]),
            StrokeVerb::MoveWithinContour(point(0.0, 0.0)),
            StrokeVerb::Line([point(0.0, 0.0), point(5.0, 0.0)]),
            StrokeVerb::ContourFinished,
        ]
    );
}

#[test]
fn zero_length_contours() {
    let mut builder = Path::builder();
    builder.begin(point(10.0, 10.0));
    builder.end(false);
    let lone_point = builder.build();

    let mut builder = Path::builder();
    builder.begin(point(3.0, 4.0));
    builder.line_to(point(3.0, 4.0));
    builder.close();
    let collapsed = builder.build();

    let butt = StrokeOptions::DEFAULT;
    assert!(verbs(&lone_point, &butt).is_empty());
    assert!(verbs(&collapsed, &butt).is_empty());

    let round = butt.with_line_cap(LineCap::Round);
    assert_eq!(
        verbs(&lone_point, &round),
        vec![
            StrokeVerb::Circle(point(10.0, 10.0)),
            StrokeVerb::ContourFinished
        ]
    );
    assert_eq!(
        verbs(&collapsed, &round),
        vec![
            StrokeVerb::Circle(point(3.0, 4.0)),
            StrokeVerb::ContourFinished
        ]
    );

    let square = butt.with_line_cap(LineCap::Square).with_line_width(2.0);
    assert_eq!(
        verbs(&lone_point, &square),
        vec![
            StrokeVerb::Line([point(9.0, 10.0), point(11.0, 10.0)]),
            StrokeVerb::ContourFinished
        ]
    );
}

#[test]
fn several_contours() {
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.line_to(point(1.0, 0.0));
    builder.end(false);
    builder.begin(point(5.0, 5.0));
    builder.end(false);
    builder.begin(point(0.0, 2.0));
    builder.line_to(point(1.0, 2.0));
    builder.line_to(point(1.0, 3.0));
    builder.close();
    let path = builder.build();

    let options = StrokeOptions::DEFAULT.with_line_cap(LineCap::Round);
    let steps: Vec<StrokeStep> = StrokeIterator::new(path.iter(), &options).collect();

    let finished = steps
        .iter()
        .filter(|s| s.verb == StrokeVerb::ContourFinished)
        .count();
    assert_eq!(finished, 3);
    // ContourFinished never precedes anything.
    assert!(steps
        .iter()
        .all(|s| s.prev != StrokeVerb::ContourFinished));
    assert!(steps.contains(&StrokeStep {
        prev: StrokeVerb::MoveWithinContour(point(5.0, 5.0)),
        verb: StrokeVerb::Circle(point(5.0, 5.0)),
    }));
}
