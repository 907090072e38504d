use crate::scalar::Scalar;
use crate::{CubicBezierSegment, Point, Vector};

/// A linear segment.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct LineSegment<S> {
    pub from: Point<S>,
    pub to: Point<S>,
}

impl<S: Scalar> LineSegment<S> {
    /// Sample the segment at t (expecting t between 0 and 1).
    #[inline]
    pub fn sample(&self, t: S) -> Point<S> {
        self.from.lerp(self.to, t)
    }

    /// Returns the vector between this segment's `from` and `to` points.
    #[inline]
    pub fn to_vector(&self) -> Vector<S> {
        self.to - self.from
    }

    #[inline]
    pub fn length(&self) -> S {
        self.to_vector().length()
    }

    /// Returns true if both endpoints are the same point.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.from == self.to
    }

    /// Split this segment into two sub-segments.
    pub fn split(&self, t: S) -> (Self, Self) {
        let split_point = self.sample(t);
        (
            LineSegment {
                from: self.from,
                to: split_point,
            },
            LineSegment {
                from: split_point,
                to: self.to,
            },
        )
    }

    /// Represents this segment as a cubic whose control points sit on the endpoints.
    ///
    /// This is the flat-line representation the stroke shaders expect: `[from, from, to, to]`.
    #[inline]
    pub fn to_cubic(&self) -> CubicBezierSegment<S> {
        CubicBezierSegment {
            from: self.from,
            ctrl1: self.from,
            ctrl2: self.to,
            to: self.to,
        }
    }

    /// Returns the same segment with `from` and `to` swapped.
    #[inline]
    pub fn flip(&self) -> Self {
        LineSegment {
            from: self.to,
            to: self.from,
        }
    }
}

#[test]
fn line_to_cubic() {
    use crate::point;

    let line = LineSegment {
        from: point(1.0f32, 2.0),
        to: point(5.0, 2.0),
    };
    let cubic = line.to_cubic();
    assert_eq!(cubic.from, cubic.ctrl1);
    assert_eq!(cubic.ctrl2, cubic.to);
    assert_eq!(cubic.sample(0.5), point(3.0, 2.0));
    assert_eq!(line.split(0.25).0.to, point(2.0, 2.0));
    assert_eq!(line.flip().from, line.to);
    assert!(!line.is_degenerate());
}
