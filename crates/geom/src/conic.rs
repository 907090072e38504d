//! Conic sections represented as rational quadratic bézier curves.

use crate::scalar::Scalar;
use crate::utils::{find_bisector, solve_mid_tangent};
use crate::{point, Point, QuadraticBezierSegment, Vector};

/// A rational quadratic bézier curve: a quadratic whose control point carries a weight.
///
/// A weight of 1 is an ordinary quadratic bézier curve, weights below 1 describe elliptical arcs
/// and weights above 1 hyperbolic ones.
///
/// The curve is defined by equation:
/// ```∀ t ∈ [0..1],  P(t) = ((1 - t)² * from + 2 * (1 - t) * t * w * ctrl + t² * to) / ((1 - t)² + 2 * (1 - t) * t * w + t²)```
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct ConicSegment<S> {
    pub from: Point<S>,
    pub ctrl: Point<S>,
    pub to: Point<S>,
    pub weight: S,
}

impl<S: Scalar> ConicSegment<S> {
    /// Sample the curve at t (expecting t between 0 and 1).
    pub fn sample(&self, t: S) -> Point<S> {
        let one_t = S::ONE - t;
        let a = one_t * one_t;
        let b = S::TWO * one_t * t * self.weight;
        let c = t * t;
        let denom = a + b + c;

        let numer = self.from.to_vector() * a + self.ctrl.to_vector() * b + self.to.to_vector() * c;
        (numer / denom).to_point()
    }

    /// A vector in the direction of the curve's tangent at t.
    ///
    /// The derivative of a conic has a quartic denominator that scales both coordinates
    /// uniformly. It is dropped so the returned vector only has the right direction.
    pub fn tangent_direction(&self, t: S) -> Vector<S> {
        let (a, b, c) = self.tangent_coefficients();
        a * t * t + b * t + c
    }

    /// Split this curve into two sub-curves.
    ///
    /// The split happens on the homogeneous control points, and each half is brought back to
    /// standard form where the end weights are 1.
    pub fn split(&self, t: S) -> (ConicSegment<S>, ConicSegment<S>) {
        let w = self.weight;
        let lerp = |a: S, b: S| a + (b - a) * t;

        // Homogeneous coordinates (x * w, y * w, w).
        let p0 = (self.from.x, self.from.y, S::ONE);
        let p1 = (self.ctrl.x * w, self.ctrl.y * w, w);
        let p2 = (self.to.x, self.to.y, S::ONE);

        let ab = (lerp(p0.0, p1.0), lerp(p0.1, p1.1), lerp(p0.2, p1.2));
        let bc = (lerp(p1.0, p2.0), lerp(p1.1, p2.1), lerp(p1.2, p2.2));
        let mid = (lerp(ab.0, bc.0), lerp(ab.1, bc.1), lerp(ab.2, bc.2));

        let split_point = point(mid.0 / mid.2, mid.1 / mid.2);
        let root = mid.2.sqrt();

        (
            ConicSegment {
                from: self.from,
                ctrl: point(ab.0 / ab.2, ab.1 / ab.2),
                to: split_point,
                weight: ab.2 / root,
            },
            ConicSegment {
                from: split_point,
                ctrl: point(bc.0 / bc.2, bc.1 / bc.2),
                to: self.to,
                weight: bc.2 / root,
            },
        )
    }

    /// The control polygon as a quadratic bézier curve, ignoring the weight.
    #[inline]
    pub fn to_quadratic(&self) -> QuadraticBezierSegment<S> {
        QuadraticBezierSegment {
            from: self.from,
            ctrl: self.ctrl,
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
    /// Like quadratics, a conic of any weight can only have a cusp if it is a flat line with a
    /// 180 degree turnaround.
    #[inline]
    pub fn has_cusp(&self) -> bool {
        self.to_quadratic().has_cusp()
    }

    /// Finds the parameter where the tangent is halfway between the start and end tangents.
    pub fn mid_tangent_t(&self) -> S {
        let tan0 = self.ctrl - self.from;
        let tan1 = self.to - self.ctrl;
        let bisector = find_bisector(tan0, -tan1);

        let (a, b, c) = self.tangent_coefficients();
        solve_mid_tangent(bisector.dot(a), -S::HALF * bisector.dot(b), bisector.dot(c))
    }

    // Power basis coefficients of the tangent direction: a*t² + b*t + c.
    fn tangent_coefficients(&self) -> (Vector<S>, Vector<S>, Vector<S>) {
        let p20 = self.to - self.from;
        let p10 = self.ctrl - self.from;
        let w = self.weight;

        (p20 * (w - S::ONE), p20 - p10 * (w * S::TWO), p10 * w)
    }
}

#[test]
fn conic_with_unit_weight_is_a_quadratic() {
    let conic = ConicSegment {
        from: point(0.0f32, 0.0),
        ctrl: point(10.0, 20.0),
        to: point(20.0, 0.0),
        weight: 1.0,
    };
    let quad = conic.to_quadratic();
    for i in 0..=8 {
        let t = i as f32 / 8.0;
        assert!((conic.sample(t) - quad.sample(t)).length() < 1e-4);
    }
    assert!((conic.mid_tangent_t() - quad.mid_tangent_t()).abs() < 1e-5);
}

#[test]
fn quarter_circle() {
    let w = core::f32::consts::FRAC_1_SQRT_2;
    let arc = ConicSegment {
        from: point(1.0f32, 0.0),
        ctrl: point(1.0, 1.0),
        to: point(0.0, 1.0),
        weight: w,
    };
    for i in 0..=8 {
        let p = arc.sample(i as f32 / 8.0);
        assert!((p.to_vector().length() - 1.0).abs() < 1e-5);
    }

    let (a, b) = arc.split(0.5);
    assert_eq!(a.to, b.from);
    assert!((a.to.to_vector().length() - 1.0).abs() < 1e-5);
    assert!((a.weight - b.weight).abs() < 1e-6);
    for i in 0..=8 {
        let p = b.sample(i as f32 / 8.0);
        assert!((p.to_vector().length() - 1.0).abs() < 1e-5);
    }

    // The tangent at the middle of a symmetric arc is perpendicular to the diagonal.
    let t = arc.mid_tangent_t();
    assert!((t - 0.5).abs() < 1e-5);
    let tangent = arc.tangent_direction(t);
    assert!((tangent.x + tangent.y).abs() < 1e-5);
}

#[test]
fn conic_cusp() {
    let conic = ConicSegment {
        from: point(0.0f32, 0.0),
        ctrl: point(10.0, 0.0),
        to: point(4.0, 0.0),
        weight: 2.0,
    };
    assert!(conic.has_cusp());
    let t = conic.mid_tangent_t();
    assert!(conic.tangent_direction(t).x.abs() < 1e-3);
}
