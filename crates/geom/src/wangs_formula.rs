//! Wang's formula: an upper bound on the number of line segments a bézier curve must be divided
//! into so that the linear approximation stays within `1 / precision` of the curve.
//!
//! The formula only depends on the control points, so it is cheap enough to run on every curve of
//! every path before deciding how to tessellate it. The `_pow4` and `_pow2` variants skip the
//! final roots and are useful for comparisons against precomputed limits.
//!
//! Segment counts returned here are not rounded. Callers usually take `ceil` or `ceil(log2)`.

use crate::scalar::Scalar;
use crate::{ConicSegment, CubicBezierSegment, QuadraticBezierSegment, Vector};

/// The value by which to multiply the length of the second difference vector.
///
/// `degree * (degree - 1) / 8 * precision`.
#[inline]
pub fn length_term<S: Scalar>(degree: u32, precision: S) -> S {
    let degree = S::value(degree as f32);
    degree * (degree - S::ONE) / S::EIGHT * precision
}

/// Square of [`length_term`].
#[inline]
pub fn length_term_pow2<S: Scalar>(degree: u32, precision: S) -> S {
    let term = length_term(degree, precision);
    term * term
}

/// Fourth root.
#[inline]
pub fn root4<S: Scalar>(x: S) -> S {
    x.sqrt().sqrt()
}

/// Wang's formula raised to the fourth power, for a quadratic bézier curve.
pub fn quadratic_pow4<S: Scalar>(precision: S, curve: &QuadraticBezierSegment<S>) -> S {
    let v = second_difference(
        curve.from.to_vector(),
        curve.ctrl.to_vector(),
        curve.to.to_vector(),
    );
    v.square_length() * length_term_pow2(2, precision)
}

/// Number of segments needed to approximate a quadratic bézier curve.
#[inline]
pub fn quadratic<S: Scalar>(precision: S, curve: &QuadraticBezierSegment<S>) -> S {
    root4(quadratic_pow4(precision, curve))
}

/// Wang's formula raised to the fourth power, for a cubic bézier curve.
pub fn cubic_pow4<S: Scalar>(precision: S, curve: &CubicBezierSegment<S>) -> S {
    let p0 = curve.from.to_vector();
    let p1 = curve.ctrl1.to_vector();
    let p2 = curve.ctrl2.to_vector();
    let p3 = curve.to.to_vector();
    let l0 = second_difference(p0, p1, p2).square_length();
    let l1 = second_difference(p1, p2, p3).square_length();

    l0.max(l1) * length_term_pow2(3, precision)
}

/// Number of segments needed to approximate a cubic bézier curve.
#[inline]
pub fn cubic<S: Scalar>(precision: S, curve: &CubicBezierSegment<S>) -> S {
    root4(cubic_pow4(precision, curve))
}

/// Wang's formula for conics, squared.
///
/// Conics need their own bound because the weight changes how fast the curve moves along its
/// control polygon. The points are first centered on their bounding box so that the bound only
/// depends on the shape and not on where the curve is.
pub fn conic_pow2<S: Scalar>(precision: S, curve: &ConicSegment<S>) -> S {
    let min = curve.from.min(curve.ctrl).min(curve.to);
    let max = curve.from.max(curve.ctrl).max(curve.to);
    let center = (min.to_vector() + max.to_vector()) * S::HALF;
    let p0 = curve.from.to_vector() - center;
    let p1 = curve.ctrl.to_vector() - center;
    let p2 = curve.to.to_vector() - center;
    let w = curve.weight;

    let max_len = p0
        .square_length()
        .max(p1.square_length().max(p2.square_length()))
        .sqrt();

    let dp = p1 * (-S::TWO * w) + p0 + p2;
    let dw = (-S::TWO * w + S::TWO).abs();

    // Sederberg states the bound with a tolerance, which is 1 / precision here.
    let rp_minus_1 = (max_len * precision - S::ONE).max(S::ZERO);
    let numer = dp.length() * precision + rp_minus_1 * dw;
    let denom = S::FOUR * w.min(S::ONE);

    numer / denom
}

/// Number of segments needed to approximate a conic.
#[inline]
pub fn conic<S: Scalar>(precision: S, curve: &ConicSegment<S>) -> S {
    conic_pow2(precision, curve).sqrt()
}

#[inline]
fn second_difference<S: Scalar>(p0: Vector<S>, p1: Vector<S>, p2: Vector<S>) -> Vector<S> {
    p1 * -S::TWO + p2 + p0
}

#[cfg(test)]
use crate::point;

#[test]
fn straight_lines_need_one_segment_or_less() {
    let line = CubicBezierSegment {
        from: point(0.0f32, 0.0),
        ctrl1: point(1.0, 0.0),
        ctrl2: point(2.0, 0.0),
        to: point(3.0, 0.0),
    };
    assert_eq!(cubic(4.0, &line), 0.0);

    let quad = QuadraticBezierSegment {
        from: point(0.0f32, 0.0),
        ctrl: point(5.0, 5.0),
        to: point(10.0, 10.0),
    };
    assert_eq!(quadratic(4.0, &quad), 0.0);
}

#[test]
fn segment_count_grows_with_precision_and_size() {
    let quad = QuadraticBezierSegment {
        from: point(0.0f32, 0.0),
        ctrl: point(50.0, 100.0),
        to: point(100.0, 0.0),
    };
    // |p0 - 2p1 + p2| = 200, term = 2 * 1 / 8 * 4 = 1.
    assert!((quadratic(4.0, &quad) - 200.0f32.sqrt()).abs() < 1e-3);
    assert!(quadratic(16.0, &quad) > quadratic(4.0, &quad));

    let bigger = QuadraticBezierSegment {
        from: point(0.0f32, 0.0),
        ctrl: point(100.0, 200.0),
        to: point(200.0, 0.0),
    };
    assert!(quadratic(4.0, &bigger) > quadratic(4.0, &quad));
    assert!((root4(quadratic_pow4(4.0, &bigger)) - quadratic(4.0, &bigger)).abs() < 1e-3);
}

#[test]
fn cubic_uses_the_largest_second_difference() {
    let curve = CubicBezierSegment {
        from: point(0.0f32, 0.0),
        ctrl1: point(0.0, 0.0),
        ctrl2: point(10.0, 0.0),
        to: point(100.0, 0.0),
    };
    // l0 = |(10, 0)|² = 100, l1 = |(80, 0)|² = 6400, term = 3 * 2 / 8 * 1.
    let expected = (0.75f32 * 80.0).sqrt();
    assert!((cubic(1.0, &curve) - expected).abs() < 1e-4);
}

#[test]
fn conic_segments() {
    let arc = ConicSegment {
        from: point(100.0f32, 0.0),
        ctrl: point(100.0, 100.0),
        to: point(0.0, 100.0),
        weight: core::f32::consts::FRAC_1_SQRT_2,
    };
    let n = conic(4.0, &arc);
    assert!(n > 1.0);
    assert!((conic_pow2(4.0, &arc).sqrt() - n).abs() < 1e-4);

    let tighter = conic(16.0, &arc);
    assert!(tighter > n);
}
