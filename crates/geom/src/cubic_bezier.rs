use crate::scalar::Scalar;
use crate::utils::{angle_between_vectors, cubic_polynomial_roots, find_bisector, solve_mid_tangent};
use crate::{Point, Vector};
use arrayvec::ArrayVec;

/// A 2d curve segment defined by four points: the beginning of the segment, two control
/// points and the end of the segment.
///
/// The curve is defined by equation:
/// ```∀ t ∈ [0..1],  P(t) = (1 - t)³ * from + 3 * (1 - t)² * t * ctrl1 + 3 * t² * (1 - t) * ctrl2 + t³ * to```
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct CubicBezierSegment<S> {
    pub from: Point<S>,
    pub ctrl1: Point<S>,
    pub ctrl2: Point<S>,
    pub to: Point<S>,
}

/// Parameters where a cubic must be chopped so that each piece is convex and rotates no more
/// than 180 degrees.
///
/// See [`CubicBezierSegment::convex_180_chops`].
#[derive(Clone, Debug, PartialEq)]
pub struct Convex180Chops<S> {
    /// Zero, one or two sorted parameters, all inside `[ε, 1 - ε)`.
    pub ts: ArrayVec<S, 2>,
    /// True if the chop points are cusps rather than inflections or 180 degree turns.
    pub are_cusps: bool,
}

impl<S: Scalar> CubicBezierSegment<S> {
    /// Sample the curve at t (expecting t between 0 and 1).
    pub fn sample(&self, t: S) -> Point<S> {
        let t2 = t * t;
        let t3 = t2 * t;
        let one_t = S::ONE - t;
        let one_t2 = one_t * one_t;
        let one_t3 = one_t2 * one_t;

        self.from * one_t3
            + self.ctrl1.to_vector() * S::THREE * one_t2 * t
            + self.ctrl2.to_vector() * S::THREE * one_t * t2
            + self.to.to_vector() * t3
    }

    /// Sample the curve's derivative at t (expecting t between 0 and 1).
    pub fn derivative(&self, t: S) -> Vector<S> {
        let one_t = S::ONE - t;
        (self.ctrl1 - self.from) * S::THREE * one_t * one_t
            + (self.ctrl2 - self.ctrl1) * S::SIX * one_t * t
            + (self.to - self.ctrl2) * S::THREE * t * t
    }

    /// Split this curve into two sub-curves.
    pub fn split(&self, t: S) -> (CubicBezierSegment<S>, CubicBezierSegment<S>) {
        let ctrl1a = self.from.lerp(self.ctrl1, t);
        let ctrl2a = self.ctrl1.lerp(self.ctrl2, t);
        let ctrl1aa = ctrl1a.lerp(ctrl2a, t);
        let ctrl3a = self.ctrl2.lerp(self.to, t);
        let ctrl2aa = ctrl2a.lerp(ctrl3a, t);
        let ctrl1aaa = ctrl1aa.lerp(ctrl2aa, t);

        (
            CubicBezierSegment {
                from: self.from,
                ctrl1: ctrl1a,
                ctrl2: ctrl1aa,
                to: ctrl1aaa,
            },
            CubicBezierSegment {
                from: ctrl1aaa,
                ctrl1: ctrl2aa,
                ctrl2: ctrl3a,
                to: self.to,
            },
        )
    }

    /// Split this curve at up to two increasing parameters.
    ///
    /// The second parameter is renormalized onto the remainder of the curve after the first
    /// split. If float precision pushes it out of `(0, 1)`, the last piece collapses onto the
    /// end point instead.
    pub fn split_at(&self, ts: &[S]) -> ArrayVec<Self, 3> {
        debug_assert!(ts.len() <= 2);
        debug_assert!(ts.windows(2).all(|w| w[0] < w[1]));

        let mut pieces = ArrayVec::new();
        let mut remainder = *self;
        let mut prev_t = S::ZERO;
        for &t in ts.iter().take(2) {
            let local_t = (t - prev_t) / (S::ONE - prev_t);
            if !(local_t > S::ZERO && local_t < S::ONE) {
                pieces.push(remainder);
                remainder = CubicBezierSegment {
                    from: remainder.to,
                    ctrl1: remainder.to,
                    ctrl2: remainder.to,
                    to: remainder.to,
                };
                prev_t = t;
                continue;
            }
            let (a, b) = remainder.split(local_t);
            pieces.push(a);
            remainder = b;
            prev_t = t;
        }
        pieces.push(remainder);

        pieces
    }

    /// Split this curve at t = 0.5.
    #[inline]
    pub fn split_half(&self) -> (CubicBezierSegment<S>, CubicBezierSegment<S>) {
        self.split(S::HALF)
    }

    #[inline]
    pub fn points(&self) -> [Point<S>; 4] {
        [self.from, self.ctrl1, self.ctrl2, self.to]
    }

    #[inline]
    pub fn from_points(points: [Point<S>; 4]) -> Self {
        CubicBezierSegment {
            from: points[0],
            ctrl1: points[1],
            ctrl2: points[2],
            to: points[3],
        }
    }

    /// Returns true if all four points are the same point.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.from == self.ctrl1 && self.ctrl1 == self.ctrl2 && self.ctrl2 == self.to
    }

    /// Tangent at the start of the curve, skipping a control point that coincides with `from`.
    #[inline]
    pub fn start_tangent(&self) -> Vector<S> {
        if self.from == self.ctrl1 {
            self.ctrl2 - self.from
        } else {
            self.ctrl1 - self.from
        }
    }

    /// Tangent at the end of the curve, skipping a control point that coincides with `to`.
    #[inline]
    pub fn end_tangent(&self) -> Vector<S> {
        if self.ctrl2 == self.to {
            self.to - self.ctrl1
        } else {
            self.to - self.ctrl2
        }
    }

    /// Finds the parameters where this cubic needs to be chopped so that every piece is convex
    /// and rotates no more than 180 degrees.
    ///
    /// Chops closer than 2⁻¹¹ to either end of the curve are dropped: tangents get unstable that
    /// close to the end points and the error stays well under one tessellation segment.
    ///
    /// If the inflection function has a double root, the chop is a cusp. Flat lines can have two
    /// cusps (two 180 degree turnarounds), found where the tangent becomes perpendicular to the
    /// start tangent.
    pub fn convex_180_chops(&self) -> Convex180Chops<S> {
        let epsilon = S::ONE / S::value(2048.0);
        let inside = |t: S| t >= epsilon && t < S::ONE - epsilon;

        // Power basis coefficients of the tangent direction: A*T² + 2B*T + C.
        let c = self.ctrl1 - self.from;
        let d = self.ctrl2 - self.ctrl1;
        let e = self.to - self.from;
        let b = d - c;
        let a = e - d * S::THREE;

        // Inflections are at F' x F'' = 0, a quadratic in T.
        let mut qa = a.cross(b);
        let qb = a.cross(c);
        let mut qc = b.cross(c);
        let mut b_over_minus_2 = -S::HALF * qb;
        let mut discr_over_4 = b_over_minus_2 * b_over_minus_2 - qa * qc;

        // Roots closer than ε to each other count as a single cusp.
        let mut cusp_threshold = qa * (epsilon / S::TWO);
        cusp_threshold = cusp_threshold * cusp_threshold;

        let mut ts = ArrayVec::new();

        if discr_over_4 < -cusp_threshold {
            // No inflection. The curve may still rotate more than 180 degrees: chop where the
            // tangent is parallel to the start tangent again, at T = -2c/b.
            let root = qc / b_over_minus_2;
            if inside(root) {
                ts.push(root);
            }
            return Convex180Chops {
                ts,
                are_cusps: false,
            };
        }

        let are_cusps = discr_over_4 <= cusp_threshold;
        if are_cusps {
            if qa != S::ZERO || b_over_minus_2 != S::ZERO || qc != S::ZERO {
                // Average of the two roots.
                let root = b_over_minus_2 / qa;
                if inside(root) {
                    ts.push(root);
                }
                return Convex180Chops { ts, are_cusps };
            }

            // A flat line. Its cusps are where the tangent is perpendicular to tan0.
            let tan0 = if c != Vector::zero() { c } else { self.ctrl2 - self.from };
            qa = tan0.dot(a);
            b_over_minus_2 = -tan0.dot(b);
            qc = tan0.dot(c);
            discr_over_4 = (b_over_minus_2 * b_over_minus_2 - qa * qc).max(S::ZERO);
        }

        let mut q = discr_over_4.sqrt();
        q = q.copysign(b_over_minus_2);
        q = q + b_over_minus_2;
        let mut r0 = q / qa;
        let mut r1 = qc / q;

        let inside0 = r0 > epsilon && r0 < S::ONE - epsilon;
        let inside1 = r1 > epsilon && r1 < S::ONE - epsilon;
        if inside0 {
            if inside1 && r0 != r1 {
                if r0 > r1 {
                    core::mem::swap(&mut r0, &mut r1);
                }
                ts.push(r0);
                ts.push(r1);
            } else {
                ts.push(r0);
            }
        } else if inside1 {
            ts.push(r1);
        }

        Convex180Chops { ts, are_cusps }
    }

    /// Returns true if the two roots of the inflection function are within 2⁻¹¹ of each other.
    ///
    /// Curves where `from == ctrl1` or `ctrl2 == to` aren't reported unless they are flat lines,
    /// because their cusp sits at an end point and doesn't need special handling.
    pub fn has_cusp(&self) -> bool {
        let c = self.ctrl1 - self.from;
        let d = self.ctrl2 - self.ctrl1;
        let e = self.to - self.from;
        let b = d - c;
        let a = e - d * S::THREE;

        let qa = a.cross(b);
        let qb = a.cross(c);
        let qc = b.cross(c);
        let discr = qb * qb - S::FOUR * qa * qc;

        let epsilon = S::ONE / S::value(2048.0);
        let mut cusp_threshold = (S::TWO * epsilon) * qa;
        cusp_threshold = cusp_threshold * cusp_threshold;

        let is_flat = qa == S::ZERO && qb == S::ZERO && qc == S::ZERO;
        let end_cusp = self.from == self.ctrl1 || self.ctrl2 == self.to;

        discr.abs() <= cusp_threshold && (!end_cusp || is_flat)
    }

    /// Finds the parameter where the tangent is halfway between the start and end tangents.
    ///
    /// Flat lines have no single point of mid-tangent and return 0.5.
    pub fn mid_tangent_t(&self) -> S {
        let tan0 = self.start_tangent();
        let tan1 = self.end_tangent();
        let bisector = find_bisector(tan0, -tan1);

        let p0 = self.from.to_vector();
        let p1 = self.ctrl1.to_vector();
        let p2 = self.ctrl2.to_vector();
        let p3 = self.to.to_vector();

        // Derivative in power basis, dotted with the bisector.
        let c2 = (p3 - p0) + (p1 - p2) * S::THREE;
        let c1 = (p0 - p1 * S::TWO + p2) * S::TWO;
        let c0 = p1 - p0;
        let a = c2.dot(bisector);
        let b = c1.dot(bisector);
        let c = c0.dot(bisector);

        let discr = b * b - S::FOUR * a * c;
        if discr > S::ZERO {
            solve_mid_tangent(a, -S::HALF * b, c)
        } else {
            S::HALF
        }
    }

    /// Total rotation of the tangent along a curve that has no inflection, in radians.
    ///
    /// With no coincident points and no inflections, the rotation is 360 degrees minus the two
    /// interior angles of the control polygon.
    pub fn non_inflecting_rotation(&self) -> S {
        let a = self.ctrl1 - self.from;
        let b = self.ctrl2 - self.ctrl1;
        let c = self.to - self.ctrl2;
        if a == Vector::zero() {
            return angle_between_vectors(b, c);
        }
        if b == Vector::zero() {
            return angle_between_vectors(a, c);
        }
        if c == Vector::zero() {
            return angle_between_vectors(a, b);
        }

        S::TWO * S::PI() - angle_between_vectors(a, -b) - angle_between_vectors(b, -c)
    }

    /// Parameters of local maximum curvature, sorted, in `[0, 1]`.
    ///
    /// These are the roots of F' · F'' = 0.
    pub fn max_curvature_ts(&self) -> ArrayVec<S, 3> {
        let coefficients = |p0: S, p1: S, p2: S, p3: S| {
            let a = p1 - p0;
            let b = p2 - p1 * S::TWO + p0;
            let c = p3 + (p1 - p2) * S::THREE - p0;
            [
                c * c,
                S::THREE * b * c,
                S::TWO * b * b + c * a,
                a * b,
            ]
        };
        let x = coefficients(self.from.x, self.ctrl1.x, self.ctrl2.x, self.to.x);
        let y = coefficients(self.from.y, self.ctrl1.y, self.ctrl2.y, self.to.y);

        let mut result = ArrayVec::new();
        for t in cubic_polynomial_roots(x[0] + y[0], x[1] + y[1], x[2] + y[2], x[3] + y[3]) {
            if t >= S::ZERO && t <= S::ONE && !result.contains(&t) {
                result.push(t);
            }
        }
        result.sort_by(|a: &S, b: &S| a.partial_cmp(b).unwrap_or(core::cmp::Ordering::Equal));

        result
    }
}

#[cfg(test)]
use crate::point;

#[cfg(test)]
fn cusp_cubic() -> CubicBezierSegment<f32> {
    // Symmetric curve whose derivative vanishes at t = 0.5.
    CubicBezierSegment {
        from: point(0.0, 0.0),
        ctrl1: point(1.0, 1.0),
        ctrl2: point(0.0, 1.0),
        to: point(1.0, 0.0),
    }
}

#[test]
fn split_cubic() {
    let curve = CubicBezierSegment {
        from: point(0.0f32, 0.0),
        ctrl1: point(0.0, 10.0),
        ctrl2: point(10.0, 10.0),
        to: point(10.0, 0.0),
    };
    let (a, b) = curve.split(0.5);
    assert_eq!(a.to, b.from);
    assert_eq!(a.to, point(5.0, 7.5));
    assert_eq!(a.from, curve.from);
    assert_eq!(b.to, curve.to);
}

#[test]
fn split_at_renormalizes() {
    let curve = CubicBezierSegment {
        from: point(0.0f32, 0.0),
        ctrl1: point(10.0, 0.0),
        ctrl2: point(20.0, 0.0),
        to: point(30.0, 0.0),
    };
    let pieces = curve.split_at(&[0.25, 0.75]);
    assert_eq!(pieces.len(), 3);
    assert!((pieces[0].to.x - 7.5).abs() < 1e-4);
    assert!((pieces[1].to.x - 22.5).abs() < 1e-4);
    assert_eq!(pieces[2].to, curve.to);

    // A second parameter that renormalizes to 1 collapses the last piece.
    let pieces = curve.split_at(&[0.5, 1.0]);
    assert_eq!(pieces.len(), 3);
    assert!(pieces[2].is_degenerate());
    assert_eq!(pieces[2].from, curve.to);
}

#[test]
fn convex_cubic_has_no_chops() {
    let arch = CubicBezierSegment {
        from: point(0.0f32, 0.0),
        ctrl1: point(0.0, 10.0),
        ctrl2: point(10.0, 10.0),
        to: point(10.0, 0.0),
    };
    let chops = arch.convex_180_chops();
    assert!(chops.ts.is_empty());
    assert!(!arch.has_cusp());
}

#[test]
fn serpentine_chops_at_inflection() {
    let s = CubicBezierSegment {
        from: point(0.0f32, 0.0),
        ctrl1: point(10.0, 10.0),
        ctrl2: point(20.0, -10.0),
        to: point(30.0, 0.0),
    };
    let chops = s.convex_180_chops();
    assert!(!chops.are_cusps);
    assert_eq!(chops.ts.len(), 1);
    assert!((chops.ts[0] - 0.5).abs() < 1e-4);
}

#[test]
fn loop_chops_at_180_degrees() {
    // Control points cross over, making the tangent rotate more than 180 degrees.
    let curve = CubicBezierSegment {
        from: point(0.0f32, 0.0),
        ctrl1: point(30.0, 30.0),
        ctrl2: point(-20.0, 30.0),
        to: point(10.0, 0.0),
    };
    let chops = curve.convex_180_chops();
    assert!(!chops.are_cusps);
    assert!(!chops.ts.is_empty());
    for piece in curve.split_at(&chops.ts) {
        assert!(piece.non_inflecting_rotation() <= core::f32::consts::PI + 1e-3);
    }
}

#[test]
fn cubic_cusp_round_trip() {
    let curve = cusp_cubic();
    assert!(curve.has_cusp());
    assert!(curve.derivative(0.5).length() < 1e-6);

    let chops = curve.convex_180_chops();
    assert!(chops.are_cusps);
    assert_eq!(&chops.ts[..], &[0.5]);

    for piece in curve.split_at(&chops.ts) {
        assert!(piece.convex_180_chops().ts.is_empty());
        assert!(!piece.has_cusp());
    }
}

#[test]
fn flat_line_with_two_turnarounds() {
    let line = CubicBezierSegment {
        from: point(0.0f32, 0.0),
        ctrl1: point(10.0, 0.0),
        ctrl2: point(-5.0, 0.0),
        to: point(5.0, 0.0),
    };
    let chops = line.convex_180_chops();
    assert!(chops.are_cusps);
    assert_eq!(chops.ts.len(), 2);
    assert!(chops.ts[0] < chops.ts[1]);
    for &t in &chops.ts {
        assert!(line.derivative(t).x.abs() < 1e-3);
    }
    assert!(line.has_cusp());
}

#[test]
fn cubic_mid_tangent() {
    let arch = CubicBezierSegment {
        from: point(0.0f32, 0.0),
        ctrl1: point(0.0, 10.0),
        ctrl2: point(10.0, 10.0),
        to: point(10.0, 0.0),
    };
    assert!((arch.mid_tangent_t() - 0.5).abs() < 1e-5);
    assert!((arch.non_inflecting_rotation() - core::f32::consts::PI).abs() < 1e-5);

    let ts = arch.max_curvature_ts();
    assert!(!ts.is_empty());
    assert!(ts.iter().all(|&t| (0.0..=1.0).contains(&t)));
}
