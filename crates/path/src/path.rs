//! The default path data structure.

use crate::math::*;
use crate::PathEvent;

use core::fmt;
use core::iter::IntoIterator;

/// Enumeration corresponding to the [Event](../enum.Event.html) enum without the parameters.
///
/// This is used by the [Path](struct.Path.html) data structure to store path events a tad
/// more efficiently.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub(crate) enum Verb {
    LineTo,
    QuadraticTo,
    ConicTo,
    CubicTo,
    Begin,
    Close,
    End,
}

/// A simple path data structure.
///
/// # Representation
///
/// Paths contain three buffers:
/// - a buffer of commands (Begin, Line, Quadratic, Conic, Cubic, Close or End),
/// - a buffer of points that can be endpoints or control points,
/// - a buffer of conic weights, one per conic.
///
/// The order of storage for points and weights is determined by the sequence of commands.
///
/// ```ascii
///  ______________________________
/// |       |      |       |       |
/// | Begin | Line | Conic | Close | ...
/// |_______|______|_______|_______|_
///  _____________________________________________
/// |         |         |          |         |
/// |start x,y| to x, y | ctrl x,y | to x, y | ...
/// |_________|_________|__________|_________|_
///  ______
/// |      |
/// |weight| ...
/// |______|_
/// ```
#[derive(Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct Path {
    points: Box<[Point]>,
    verbs: Box<[Verb]>,
    weights: Box<[f32]>,
}

impl Path {
    /// Creates a [Builder](struct.Builder.html) to build a path.
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Creates an Empty `Path`.
    #[inline]
    pub fn new() -> Path {
        Path {
            points: Box::new([]),
            verbs: Box::new([]),
            weights: Box::new([]),
        }
    }

    /// Iterates over the entire `Path`.
    pub fn iter(&self) -> Iter {
        Iter::new(&self.points[..], &self.verbs[..], &self.weights[..])
    }

    /// Number of commands in the path, including begin, close and end commands.
    ///
    /// Useful to compute upper bounds for the amount of geometry a path can produce.
    #[inline]
    pub fn verb_count(&self) -> usize {
        self.verbs.len()
    }

    /// Number of endpoints and control points.
    #[inline]
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Number of conic weights, which is also the number of conics.
    #[inline]
    pub fn weight_count(&self) -> usize {
        self.weights.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.verbs.is_empty()
    }

    /// Axis-aligned bounding box of all endpoints and control points.
    ///
    /// Bézier curves are contained in the convex hull of their control points, so this box
    /// contains the whole path. Returns an empty box at the origin if the path has no points.
    pub fn bounding_box(&self) -> Box2D {
        if self.points.is_empty() {
            return Box2D::zero();
        }

        Box2D::from_points(self.points.iter())
    }

    /// Concatenate two paths.
    pub fn merge(&self, other: &Self) -> Self {
        let mut verbs = Vec::with_capacity(self.verbs.len() + other.verbs.len());
        let mut points = Vec::with_capacity(self.points.len() + other.points.len());
        let mut weights = Vec::with_capacity(self.weights.len() + other.weights.len());
        verbs.extend_from_slice(&self.verbs);
        verbs.extend_from_slice(&other.verbs);
        points.extend_from_slice(&self.points);
        points.extend_from_slice(&other.points);
        weights.extend_from_slice(&self.weights);
        weights.extend_from_slice(&other.weights);

        Path {
            verbs: verbs.into_boxed_slice(),
            points: points.into_boxed_slice(),
            weights: weights.into_boxed_slice(),
        }
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "\"")?;
        for evt in self.iter() {
            match evt {
                PathEvent::Begin { at } => write!(formatter, "M {} {} ", at.x, at.y)?,
                PathEvent::Line { to, .. } => write!(formatter, "L {} {} ", to.x, to.y)?,
                PathEvent::Quadratic { ctrl, to, .. } => {
                    write!(formatter, "Q {} {} {} {} ", ctrl.x, ctrl.y, to.x, to.y)?
                }
                PathEvent::Conic {
                    ctrl, to, weight, ..
                } => write!(
                    formatter,
                    "K {} {} {} {} w {} ",
                    ctrl.x, ctrl.y, to.x, to.y, weight
                )?,
                PathEvent::Cubic {
                    ctrl1, ctrl2, to, ..
                } => write!(
                    formatter,
                    "C {} {} {} {} {} {} ",
                    ctrl1.x, ctrl1.y, ctrl2.x, ctrl2.y, to.x, to.y
                )?,
                PathEvent::End { close: true, .. } => write!(formatter, "Z ")?,
                PathEvent::End { close: false, .. } => {}
            }
        }
        write!(formatter, "\"")
    }
}

impl<'l> IntoIterator for &'l Path {
    type Item = PathEvent;
    type IntoIter = Iter<'l>;

    fn into_iter(self) -> Iter<'l> {
        self.iter()
    }
}

/// Builds path objects.
///
/// Every contour starts with `begin` and finishes with `end` (or `close`).
#[derive(Clone)]
pub struct Builder {
    points: Vec<Point>,
    verbs: Vec<Verb>,
    weights: Vec<f32>,
    first: Point,
    current: Point,
    in_contour: bool,
}

impl Builder {
    pub fn new() -> Self {
        Builder::with_capacity(0, 0)
    }

    pub fn with_capacity(points: usize, edges: usize) -> Self {
        Builder {
            points: Vec::with_capacity(points),
            verbs: Vec::with_capacity(edges),
            weights: Vec::new(),
            first: point(0.0, 0.0),
            current: point(0.0, 0.0),
            in_contour: false,
        }
    }

    /// Starts a new contour at the provided position.
    pub fn begin(&mut self, at: Point) {
        debug_assert!(!self.in_contour, "begin() called twice without end()");
        self.in_contour = true;
        nan_check(at);

        self.first = at;
        self.current = at;
        self.points.push(at);
        self.verbs.push(Verb::Begin);
    }

    /// Ends the current contour, optionally closing it with an edge back to its first point.
    pub fn end(&mut self, close: bool) {
        debug_assert!(self.in_contour, "end() called without begin()");
        self.in_contour = false;

        self.current = self.first;
        self.verbs.push(if close { Verb::Close } else { Verb::End });
    }

    /// Shorthand for `end(true)`.
    #[inline]
    pub fn close(&mut self) {
        self.end(true)
    }

    pub fn line_to(&mut self, to: Point) {
        self.check_in_contour();
        nan_check(to);

        self.current = to;
        self.points.push(to);
        self.verbs.push(Verb::LineTo);
    }

    pub fn quadratic_bezier_to(&mut self, ctrl: Point, to: Point) {
        self.check_in_contour();
        nan_check(ctrl);
        nan_check(to);

        self.current = to;
        self.points.push(ctrl);
        self.points.push(to);
        self.verbs.push(Verb::QuadraticTo);
    }

    /// Adds a rational quadratic bézier segment.
    ///
    /// A weight of 1 is equivalent to `quadratic_bezier_to`.
    pub fn conic_to(&mut self, ctrl: Point, to: Point, weight: f32) {
        self.check_in_contour();
        nan_check(ctrl);
        nan_check(to);
        debug_assert!(weight.is_finite() && weight > 0.0, "invalid conic weight {weight}");

        self.current = to;
        self.points.push(ctrl);
        self.points.push(to);
        self.weights.push(weight);
        self.verbs.push(Verb::ConicTo);
    }

    pub fn cubic_bezier_to(&mut self, ctrl1: Point, ctrl2: Point, to: Point) {
        self.check_in_contour();
        nan_check(ctrl1);
        nan_check(ctrl2);
        nan_check(to);

        self.current = to;
        self.points.push(ctrl1);
        self.points.push(ctrl2);
        self.points.push(to);
        self.verbs.push(Verb::CubicTo);
    }

    #[inline]
    fn check_in_contour(&self) {
        debug_assert!(self.in_contour, "segment added outside of a contour");
    }

    /// The position of the last endpoint that was added.
    #[inline]
    pub fn current_position(&self) -> Point {
        self.current
    }

    pub fn build(self) -> Path {
        debug_assert!(!self.in_contour, "build() called before end()");
        Path {
            points: self.points.into_boxed_slice(),
            verbs: self.verbs.into_boxed_slice(),
            weights: self.weights.into_boxed_slice(),
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new()
    }
}

#[inline]
fn nan_check(p: Point) {
    debug_assert!(p.x.is_finite());
    debug_assert!(p.y.is_finite());
}

/// An iterator for `Path` and `PathSlice`.
#[derive(Clone)]
pub struct Iter<'l> {
    points: core::slice::Iter<'l, Point>,
    verbs: core::slice::Iter<'l, Verb>,
    weights: core::slice::Iter<'l, f32>,
    current: Point,
    first: Point,
}

impl<'l> Iter<'l> {
    fn new(points: &'l [Point], verbs: &'l [Verb], weights: &'l [f32]) -> Self {
        Iter {
            points: points.iter(),
            verbs: verbs.iter(),
            weights: weights.iter(),
            current: point(0.0, 0.0),
            first: point(0.0, 0.0),
        }
    }

    #[inline]
    fn next_point(&mut self) -> Point {
        match self.points.next() {
            Some(p) => *p,
            None => point(0.0, 0.0),
        }
    }
}

impl<'l> Iterator for Iter<'l> {
    type Item = PathEvent;
    #[inline]
    fn next(&mut self) -> Option<PathEvent> {
        match self.verbs.next() {
            Some(&Verb::Begin) => {
                self.current = self.next_point();
                self.first = self.current;
                Some(PathEvent::Begin { at: self.current })
            }
            Some(&Verb::LineTo) => {
                let from = self.current;
                self.current = self.next_point();
                Some(PathEvent::Line {
                    from,
                    to: self.current,
                })
            }
            Some(&Verb::QuadraticTo) => {
                let from = self.current;
                let ctrl = self.next_point();
                self.current = self.next_point();
                Some(PathEvent::Quadratic {
                    from,
                    ctrl,
                    to: self.current,
                })
            }
            Some(&Verb::ConicTo) => {
                let from = self.current;
                let ctrl = self.next_point();
                self.current = self.next_point();
                let weight = self.weights.next().copied().unwrap_or(1.0);
                Some(PathEvent::Conic {
                    from,
                    ctrl,
                    to: self.current,
                    weight,
                })
            }
            Some(&Verb::CubicTo) => {
                let from = self.current;
                let ctrl1 = self.next_point();
                let ctrl2 = self.next_point();
                self.current = self.next_point();
                Some(PathEvent::Cubic {
                    from,
                    ctrl1,
                    ctrl2,
                    to: self.current,
                })
            }
            Some(&Verb::Close) => {
                let last = self.current;
                self.current = self.first;
                Some(PathEvent::End {
                    last,
                    first: self.first,
                    close: true,
                })
            }
            Some(&Verb::End) => {
                let last = self.current;
                self.current = self.first;
                Some(PathEvent::End {
                    last,
                    first: self.first,
                    close: false,
                })
            }
            None => None,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.verbs.size_hint()
    }
}

#[test]
fn test_path_builder_simple() {
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.line_to(point(1.0, 0.0));
    builder.quadratic_bezier_to(point(2.0, 0.0), point(2.0, 1.0));
    builder.conic_to(point(2.0, 2.0), point(1.0, 2.0), 0.5);
    builder.cubic_bezier_to(point(0.0, 2.0), point(0.0, 1.5), point(0.0, 1.0));
    assert_eq!(builder.current_position(), point(0.0, 1.0));
    builder.close();
    assert_eq!(builder.current_position(), point(0.0, 0.0));

    builder.begin(point(10.0, 0.0));
    builder.end(false);

    let path = builder.build();
    let mut it = path.iter();
    assert_eq!(it.next(), Some(PathEvent::Begin { at: point(0.0, 0.0) }));
    assert_eq!(
        it.next(),
        Some(PathEvent::Line {
            from: point(0.0, 0.0),
            to: point(1.0, 0.0)
        })
    );
    assert_eq!(
        it.next(),
        Some(PathEvent::Quadratic {
            from: point(1.0, 0.0),
            ctrl: point(2.0, 0.0),
            to: point(2.0, 1.0)
        })
    );
    assert_eq!(
        it.next(),
        Some(PathEvent::Conic {
            from: point(2.0, 1.0),
            ctrl: point(2.0, 2.0),
            to: point(1.0, 2.0),
            weight: 0.5,
        })
    );
    assert_eq!(
        it.next(),
        Some(PathEvent::Cubic {
            from: point(1.0, 2.0),
            ctrl1: point(0.0, 2.0),
            ctrl2: point(0.0, 1.5),
            to: point(0.0, 1.0)
        })
    );
    assert_eq!(
        it.next(),
        Some(PathEvent::End {
            last: point(0.0, 1.0),
            first: point(0.0, 0.0),
            close: true
        })
    );
    assert_eq!(it.next(), Some(PathEvent::Begin { at: point(10.0, 0.0) }));
    assert_eq!(
        it.next(),
        Some(PathEvent::End {
            last: point(10.0, 0.0),
            first: point(10.0, 0.0),
            close: false
        })
    );
    assert_eq!(it.next(), None);

    assert_eq!(path.verb_count(), 8);
    assert_eq!(path.point_count(), 10);
    assert_eq!(path.weight_count(), 1);
}

#[test]
fn test_bounding_box() {
    let mut builder = Path::builder();
    builder.begin(point(-1.0, 2.0));
    builder.cubic_bezier_to(point(5.0, -3.0), point(0.0, 0.0), point(4.0, 4.0));
    builder.end(false);
    let path = builder.build();

    let bounds = path.bounding_box();
    assert_eq!(bounds.min, point(-1.0, -3.0));
    assert_eq!(bounds.max, point(5.0, 4.0));

    assert_eq!(Path::new().bounding_box(), Box2D::zero());
    assert!(Path::new().is_empty());
}

#[test]
fn test_merge() {
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.conic_to(point(1.0, 0.0), point(1.0, 1.0), 2.0);
    builder.end(false);
    let a = builder.build();

    let mut builder = Path::builder();
    builder.begin(point(5.0, 5.0));
    builder.line_to(point(6.0, 5.0));
    builder.close();
    let b = builder.build();

    let merged = a.merge(&b);
    assert_eq!(merged.verb_count(), a.verb_count() + b.verb_count());
    assert_eq!(merged.weight_count(), 1);
    let events: Vec<PathEvent> = merged.iter().collect();
    assert_eq!(events.len(), 6);
    assert_eq!(events[3], PathEvent::Begin { at: point(5.0, 5.0) });
}

#[test]
#[should_panic]
#[cfg(debug_assertions)]
fn test_build_without_end() {
    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.line_to(point(1.0, 0.0));
    let _ = builder.build();
}
