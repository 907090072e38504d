use crate::scalar::Scalar;
use crate::utils::{angle_between_vectors, find_bisector};
use crate::{CubicBezierSegment, Point, Vector};

/// A 2d curve segment defined by three points: the beginning of the segment, a control
/// point and the end of the segment.
///
/// The curve is defined by equation:
/// ```∀ t ∈ [0..1],  P(t) = (1 - t)² * from + 2 * (1 - t) * t * ctrl + t² * to```
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct QuadraticBezierSegment<S> {
    pub from: Point<S>,
    pub ctrl: Point<S>,
    pub to: Point<S>,
}

impl<S: Scalar> QuadraticBezierSegment<S> {
    /// Sample the curve at t (expecting t between 0 and 1).
    pub fn sample(&self, t: S) -> Point<S> {
        let t2 = t * t;
        let one_t = S::ONE - t;
        let one_t2 = one_t * one_t;

        self.from * one_t2 + self.ctrl.to_vector() * S::TWO * one_t * t + self.to.to_vector() * t2
    }

    /// Sample the curve's derivative at t (expecting t between 0 and 1).
    pub fn derivative(&self, t: S) -> Vector<S> {
        let (c0, c1, c2) = (S::TWO * t - S::TWO, -S::FOUR * t + S::TWO, S::TWO * t);
        self.from.to_vector() * c0 + self.ctrl.to_vector() * c1 + self.to.to_vector() * c2
    }

    /// Split this curve into two sub-curves.
    pub fn split(&self, t: S) -> (QuadraticBezierSegment<S>, QuadraticBezierSegment<S>) {
        let ctrl_a = self.from.lerp(self.ctrl, t);
        let ctrl_b = self.ctrl.lerp(self.to, t);
        let split_point = ctrl_a.lerp(ctrl_b, t);

        (
            QuadraticBezierSegment {
                from: self.from,
                ctrl: ctrl_a,
                to: split_point,
            },
            QuadraticBezierSegment {
                from: split_point,
                ctrl: ctrl_b,
                to: self.to,
            },
        )
    }

    /// Elevate this curve to a third order bézier.
    ///
    /// The control points are placed two thirds of the way towards `ctrl`, so a control point
    /// that coincides with an endpoint stays exactly on it.
    pub fn to_cubic(&self) -> CubicBezierSegment<S> {
        let two_thirds = S::TWO / S::THREE;
        CubicBezierSegment {
            from: self.from,
            ctrl1: self.from + (self.ctrl - self.from) * two_thirds,
            ctrl2: self.to + (self.ctrl - self.to) * two_thirds,
            to: self.to,
        }
    }

    /// Returns true if all three points are the same point.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.from == self.ctrl && self.ctrl == self.to
    }

    /// Returns true if the curve folds back on itself.
    ///
    /// A quadratic can only have a cusp if it is a flat line with a 180 degree turnaround: the
    /// tangents at both ends are parallel and point in opposite directions.
    pub fn has_cusp(&self) -> bool {
        let a = self.ctrl - self.from;
        let b = self.to - self.ctrl;
        a.cross(b) == S::ZERO && a.dot(b) < S::ZERO
    }

    /// Total rotation of the tangent along the curve, in radians.
    ///
    /// A quadratic can't inflect or rotate more than 180 degrees so this is the angle between the
    /// start and end tangents. It is zero if the control point coincides with an endpoint.
    pub fn rotation(&self) -> S {
        angle_between_vectors(self.ctrl - self.from, self.to - self.ctrl)
    }

    /// Finds the parameter where the tangent is halfway between the start and end tangents.
    ///
    /// Tangents point in the direction of increasing t, so the start tangent and the reversed end
    /// tangent both point toward the mid-tangent. Their bisector is orthogonal to it.
    pub fn mid_tangent_t(&self) -> S {
        let tan0 = self.ctrl - self.from;
        let tan1 = self.to - self.ctrl;
        let bisector = find_bisector(tan0, -tan1);

        // F'(t) . bisector = 0 is linear in t for a quadratic.
        let t = tan0.dot(bisector) / (tan0 - tan1).dot(bisector);
        if t > S::ZERO && t < S::ONE {
            t
        } else {
            S::HALF
        }
    }

    /// The parameter of maximum curvature, clamped to `[0, 1]`.
    pub fn max_curvature_t(&self) -> S {
        let a = self.ctrl - self.from;
        let b = self.from.to_vector() - self.ctrl.to_vector() * S::TWO + self.to.to_vector();
        let numer = -a.dot(b);
        let denom = b.square_length();
        if numer <= S::ZERO || denom == S::ZERO {
            return S::ZERO;
        }
        if numer >= denom {
            return S::ONE;
        }

        numer / denom
    }
}

#[cfg(test)]
use crate::point;

#[test]
fn split_quadratic() {
    let curve = QuadraticBezierSegment {
        from: point(0.0f32, 0.0),
        ctrl: point(10.0, 20.0),
        to: point(20.0, 0.0),
    };
    let (a, b) = curve.split(0.5);
    assert_eq!(a.to, b.from);
    assert_eq!(a.to, curve.sample(0.5));
    assert_eq!(a.to, point(10.0, 10.0));
}

#[test]
fn quadratic_cusp() {
    let cusp = QuadraticBezierSegment {
        from: point(0.0f32, 0.0),
        ctrl: point(10.0, 0.0),
        to: point(5.0, 0.0),
    };
    assert!(cusp.has_cusp());

    let arch = QuadraticBezierSegment {
        from: point(0.0f32, 0.0),
        ctrl: point(10.0, 10.0),
        to: point(20.0, 0.0),
    };
    assert!(!arch.has_cusp());

    // The cusp is where the curve turns around: the farthest point along x.
    let t = cusp.mid_tangent_t();
    assert!(cusp.derivative(t).x.abs() < 1e-4);
    let p = cusp.sample(t);
    assert!(p.x > 6.0 && p.x <= 10.0);
}

#[test]
fn quadratic_mid_tangent_of_symmetric_arch() {
    let arch = QuadraticBezierSegment {
        from: point(0.0f32, 0.0),
        ctrl: point(10.0, 10.0),
        to: point(20.0, 0.0),
    };
    assert!((arch.mid_tangent_t() - 0.5).abs() < 1e-6);
    assert!((arch.max_curvature_t() - 0.5).abs() < 1e-6);
    assert!((arch.rotation() - core::f32::consts::FRAC_PI_2).abs() < 1e-5);
}

#[test]
fn quadratic_to_cubic_keeps_endpoints_exact() {
    let curve = QuadraticBezierSegment {
        from: point(0.1f32, 0.7),
        ctrl: point(0.1, 0.7),
        to: point(3.3, 1.9),
    };
    let cubic = curve.to_cubic();
    assert_eq!(cubic.ctrl1, curve.from);
    for i in 0..=10 {
        let t = i as f32 / 10.0;
        let a = curve.sample(t);
        let b = cubic.sample(t);
        assert!((a - b).length() < 1e-4);
    }
}
