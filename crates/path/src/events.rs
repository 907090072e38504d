use crate::math::Point;

/// What iterating over a [Path](crate::Path) produces.
///
/// Each contour starts with `Begin` and finishes with `End`. Segments carry their start point so
/// that they can be processed without remembering the previous event.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum PathEvent {
    Begin {
        at: Point,
    },
    Line {
        from: Point,
        to: Point,
    },
    Quadratic {
        from: Point,
        ctrl: Point,
        to: Point,
    },
    /// A rational quadratic bézier curve, see `hachure_geom::ConicSegment`.
    Conic {
        from: Point,
        ctrl: Point,
        to: Point,
        weight: f32,
    },
    Cubic {
        from: Point,
        ctrl1: Point,
        ctrl2: Point,
        to: Point,
    },
    /// `last` is the end of the last segment and `first` the start of the contour. A closed
    /// contour has an implicit line from `last` to `first`.
    End {
        last: Point,
        first: Point,
        close: bool,
    },
}

impl PathEvent {
    /// True for segments, and for the end of closed contours.
    pub fn is_edge(&self) -> bool {
        matches!(
            self,
            PathEvent::Line { .. }
                | PathEvent::Quadratic { .. }
                | PathEvent::Conic { .. }
                | PathEvent::Cubic { .. }
                | PathEvent::End { close: true, .. }
        )
    }

    pub fn from(&self) -> Point {
        match *self {
            PathEvent::Begin { at } => at,
            PathEvent::Line { from, .. }
            | PathEvent::Quadratic { from, .. }
            | PathEvent::Conic { from, .. }
            | PathEvent::Cubic { from, .. } => from,
            PathEvent::End { last, .. } => last,
        }
    }

    pub fn to(&self) -> Point {
        match *self {
            PathEvent::Begin { at } => at,
            PathEvent::Line { to, .. }
            | PathEvent::Quadratic { to, .. }
            | PathEvent::Conic { to, .. }
            | PathEvent::Cubic { to, .. } => to,
            PathEvent::End { first, .. } => first,
        }
    }
}

#[test]
fn event_endpoints() {
    use crate::math::point;

    let end = PathEvent::End {
        last: point(1.0, 2.0),
        first: point(0.0, 0.0),
        close: true,
    };
    assert!(end.is_edge());
    assert_eq!(end.from(), point(1.0, 2.0));
    assert_eq!(end.to(), point(0.0, 0.0));

    let begin = PathEvent::Begin { at: point(3.0, 3.0) };
    assert!(!begin.is_edge());
    assert_eq!(begin.from(), begin.to());
}
