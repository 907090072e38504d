//! Small numeric helpers shared by the segment types and the curve classifier.

use crate::scalar::Scalar;
use crate::{vector, Vector};
use arrayvec::ArrayVec;

/// Measures the angle in radians between two vectors, in `[0, π]`.
///
/// The cosine is pinned to `[-1, 1]` before `acos`, and a NaN cosine (one of the vectors is zero)
/// is pinned to 1, which makes the angle zero.
#[inline]
pub fn angle_between_vectors<S: Scalar>(a: Vector<S>, b: Vector<S>) -> S {
    let cos_theta = a.dot(b) / (a.square_length() * b.square_length()).sqrt();
    // Float::min returns the non-NaN operand.
    S::ONE.min(cos_theta).max(-S::ONE).acos()
}

/// Returns a vector that bisects `a` and `b`.
///
/// When the vectors are more than 90 degrees apart, the bisector is computed from their interior
/// normals instead so that the two vectors don't cancel each other out.
pub fn find_bisector<S: Scalar>(a: Vector<S>, b: Vector<S>) -> Vector<S> {
    let (v0, v1) = if a.dot(b) >= S::ZERO {
        (a, b)
    } else if a.cross(b) >= S::ZERO {
        (vector(-a.y, a.x), vector(b.y, -b.x))
    } else {
        (vector(a.y, -a.x), vector(-b.y, b.x))
    };

    let inv0 = S::ONE / v0.square_length().sqrt();
    let inv1 = S::ONE / v1.square_length().sqrt();

    vector(v0.x * inv0 + v1.x * inv1, v0.y * inv0 + v1.y * inv1)
}

/// Computes `ceil(log2(x))` by manipulating the exponent bits of `x`.
///
/// Negative values, zero, denormals, NaN and values below one all return 0.
#[inline]
pub fn next_log2(x: f32) -> i32 {
    let mut bits = x.to_bits();
    // Bump the exponent unless x is an exact power of two.
    bits = bits.wrapping_add((1 << 23) - 1);
    let exp = ((bits as i32) >> 23) - 127;
    exp & !(exp >> 31)
}

/// Picks the root of `a*T^2 - 2*b_over_minus_2*T + c = 0` closest to `T = 0.5`.
///
/// Returns 0.5 when no root lies strictly inside `(0, 1)`, which happens for flat curves or
/// when float precision fails. A negative discriminant yields NaN, which also falls back to 0.5.
pub fn solve_mid_tangent<S: Scalar>(a: S, b_over_minus_2: S, c: S) -> S {
    let discr_over_4 = b_over_minus_2 * b_over_minus_2 - a * c;
    let mut q = discr_over_4.sqrt();
    q = q.copysign(b_over_minus_2);
    q = q + b_over_minus_2;

    // The roots are q/a and c/q.
    let half_qa = -S::HALF * q * a;
    let t = if (q * q + half_qa).abs() < (a * c + half_qa).abs() {
        q / a
    } else {
        c / q
    };

    if t > S::ZERO && t < S::ONE {
        t
    } else {
        S::HALF
    }
}

/// Real roots of `a*x^3 + b*x^2 + c*x + d = 0`, unsorted.
pub fn cubic_polynomial_roots<S: Scalar>(a: S, b: S, c: S, d: S) -> ArrayVec<S, 3> {
    let mut result = ArrayVec::new();

    let epsilon = S::value(1e-6);
    if a.abs() < epsilon {
        if b.abs() < epsilon {
            if c.abs() >= epsilon {
                result.push(-d / c);
            }
            return result;
        }
        let delta = c * c - S::FOUR * b * d;
        if delta > S::ZERO {
            let sqrt_delta = delta.sqrt();
            result.push((-c - sqrt_delta) / (S::TWO * b));
            result.push((-c + sqrt_delta) / (S::TWO * b));
        } else if delta.abs() < epsilon {
            result.push(-c / (S::TWO * b));
        }
        return result;
    }

    let frac_1_3 = S::ONE / S::THREE;

    let bn = b / a;
    let cn = c / a;
    let dn = d / a;

    let delta0 = (S::THREE * cn - bn * bn) / S::value(9.0);
    let delta1 =
        (S::value(9.0) * bn * cn - S::value(27.0) * dn - S::TWO * bn * bn * bn) / S::value(54.0);
    let delta_01 = delta0 * delta0 * delta0 + delta1 * delta1;

    if delta_01 >= S::ZERO {
        let delta_p_sqrt = delta1 + delta_01.sqrt();
        let delta_m_sqrt = delta1 - delta_01.sqrt();

        let s = delta_p_sqrt.signum() * delta_p_sqrt.abs().powf(frac_1_3);
        let t = delta_m_sqrt.signum() * delta_m_sqrt.abs().powf(frac_1_3);

        result.push(-bn * frac_1_3 + (s + t));

        if (s - t).abs() < S::value(1e-5) && (s + t).abs() >= S::value(1e-5) {
            result.push(-bn * frac_1_3 - (s + t) / S::TWO);
        }
    } else {
        let theta = (delta1 / (-delta0 * delta0 * delta0).sqrt()).acos();
        let two_sqrt_delta0 = S::TWO * (-delta0).sqrt();
        result.push(two_sqrt_delta0 * (theta * frac_1_3).cos() - bn * frac_1_3);
        result.push(
            two_sqrt_delta0 * ((theta + S::TWO * S::PI()) * frac_1_3).cos() - bn * frac_1_3,
        );
        result.push(
            two_sqrt_delta0 * ((theta + S::FOUR * S::PI()) * frac_1_3).cos() - bn * frac_1_3,
        );
    }

    result
}

#[test]
fn next_log2_values() {
    assert_eq!(next_log2(-1.0), 0);
    assert_eq!(next_log2(0.0), 0);
    assert_eq!(next_log2(f32::NAN), 0);
    assert_eq!(next_log2(0.25), 0);
    assert_eq!(next_log2(1.0), 0);
    assert_eq!(next_log2(1.0001), 1);
    assert_eq!(next_log2(2.0), 1);
    assert_eq!(next_log2(3.0), 2);
    assert_eq!(next_log2(4.0), 2);
    assert_eq!(next_log2(4.5), 3);
    assert_eq!(next_log2(1024.0), 10);
    assert_eq!(next_log2(1025.0), 11);
}

#[test]
fn angle_between_degenerate_vectors() {
    assert_eq!(angle_between_vectors(vector(0.0f32, 0.0), vector(1.0, 0.0)), 0.0);
    assert_eq!(angle_between_vectors(vector(1.0f32, 0.0), vector(0.0, 0.0)), 0.0);
    let right = angle_between_vectors(vector(1.0f32, 0.0), vector(0.0, 3.0));
    assert!((right - core::f32::consts::FRAC_PI_2).abs() < 1e-6);
    let back = angle_between_vectors(vector(2.0f32, 0.0), vector(-5.0, 0.0));
    assert!((back - core::f32::consts::PI).abs() < 1e-6);
}

#[test]
fn bisector_of_opposite_vectors() {
    let b = find_bisector(vector(1.0f32, 0.0), vector(0.0, 1.0));
    assert!((b.x - b.y).abs() < 1e-6);
    assert!(b.x > 0.0);

    // Anti-parallel vectors bisect along a normal.
    let b = find_bisector(vector(1.0f32, 0.0), vector(-1.0, 0.0));
    assert!(b.x.abs() < 1e-6);
    assert!(b.y.abs() > 1.0);
}

#[test]
fn cubic_polynomial() {
    fn assert_roots(mut roots: ArrayVec<f32, 3>, expected: &[f32]) {
        roots.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(roots.len(), expected.len(), "{roots:?} != {expected:?}");
        for (a, b) in roots.iter().zip(expected) {
            assert!((a - b).abs() <= 0.001, "{roots:?} != {expected:?}");
        }
    }

    // (x - 1)(x - 2)(x - 3)
    assert_roots(cubic_polynomial_roots(1.0, -6.0, 11.0, -6.0), &[1.0, 2.0, 3.0]);
    // 2(x - 0.5)(x + 0.5) as a degenerate cubic.
    assert_roots(cubic_polynomial_roots(0.0, 2.0, 0.0, -0.5), &[-0.5, 0.5]);
    // x - 4 = 0
    assert_roots(cubic_polynomial_roots(0.0, 0.0, 1.0, -4.0), &[4.0]);
    // x^3 = 8
    assert_roots(cubic_polynomial_roots(1.0, 0.0, 0.0, -8.0), &[2.0]);
}
