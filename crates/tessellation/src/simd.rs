//! A tiny lane abstraction so that resolve levels can be computed one segment at a time or four
//! segments at a time with the same code.
//!
//! Every operation is applied independently to each lane with plain `f32` arithmetic, in the same
//! order for both implementations, so the results are bit-identical.

use std::ops::{Add, Div, Mul, Neg, Sub};

pub(crate) trait Lanes:
    Copy
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    const COUNT: usize;

    fn splat(value: f32) -> Self;

    /// Loads up to `COUNT` values, padding the remaining lanes with zero.
    fn load(values: &[f32]) -> Self;

    fn lane(self, idx: usize) -> f32;

    fn sqrt(self) -> Self;

    fn acos(self) -> Self;

    /// Lane-wise `f32::min`, which returns the non-NaN operand.
    fn min(self, other: Self) -> Self;

    /// Lane-wise `f32::max`, which returns the non-NaN operand.
    fn max(self, other: Self) -> Self;

    /// Per lane, `if_zero` where both `x` and `y` are zero, `otherwise` elsewhere.
    fn select_if_zero(x: Self, y: Self, if_zero: Self, otherwise: Self) -> Self;
}

impl Lanes for f32 {
    const COUNT: usize = 1;

    #[inline]
    fn splat(value: f32) -> Self {
        value
    }

    #[inline]
    fn load(values: &[f32]) -> Self {
        values.first().copied().unwrap_or(0.0)
    }

    #[inline]
    fn lane(self, idx: usize) -> f32 {
        debug_assert_eq!(idx, 0);
        self
    }

    #[inline]
    fn sqrt(self) -> Self {
        f32::sqrt(self)
    }

    #[inline]
    fn acos(self) -> Self {
        f32::acos(self)
    }

    #[inline]
    fn min(self, other: Self) -> Self {
        f32::min(self, other)
    }

    #[inline]
    fn max(self, other: Self) -> Self {
        f32::max(self, other)
    }

    #[inline]
    fn select_if_zero(x: Self, y: Self, if_zero: Self, otherwise: Self) -> Self {
        if x == 0.0 && y == 0.0 {
            if_zero
        } else {
            otherwise
        }
    }
}

/// Four `f32` lanes.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct F32x4(pub [f32; 4]);

impl F32x4 {
    #[inline]
    fn map(self, f: impl Fn(f32) -> f32) -> Self {
        let [a, b, c, d] = self.0;
        F32x4([f(a), f(b), f(c), f(d)])
    }

    #[inline]
    fn zip(self, other: Self, f: impl Fn(f32, f32) -> f32) -> Self {
        let [a, b, c, d] = self.0;
        let [x, y, z, w] = other.0;
        F32x4([f(a, x), f(b, y), f(c, z), f(d, w)])
    }
}

macro_rules! impl_binary_op {
    ($Trait:ident, $fn:ident, $op:tt) => {
        impl $Trait for F32x4 {
            type Output = Self;
            #[inline]
            fn $fn(self, other: Self) -> Self {
                self.zip(other, |a, b| a $op b)
            }
        }
    };
}

impl_binary_op!(Add, add, +);
impl_binary_op!(Sub, sub, -);
impl_binary_op!(Mul, mul, *);
impl_binary_op!(Div, div, /);

impl Neg for F32x4 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        self.map(|a| -a)
    }
}

impl Lanes for F32x4 {
    const COUNT: usize = 4;

    #[inline]
    fn splat(value: f32) -> Self {
        F32x4([value; 4])
    }

    #[inline]
    fn load(values: &[f32]) -> Self {
        debug_assert!(values.len() <= 4);
        let mut lanes = [0.0; 4];
        for (lane, value) in lanes.iter_mut().zip(values) {
            *lane = *value;
        }
        F32x4(lanes)
    }

    #[inline]
    fn lane(self, idx: usize) -> f32 {
        self.0[idx]
    }

    #[inline]
    fn sqrt(self) -> Self {
        self.map(f32::sqrt)
    }

    #[inline]
    fn acos(self) -> Self {
        self.map(f32::acos)
    }

    #[inline]
    fn min(self, other: Self) -> Self {
        self.zip(other, f32::min)
    }

    #[inline]
    fn max(self, other: Self) -> Self {
        self.zip(other, f32::max)
    }

    #[inline]
    fn select_if_zero(x: Self, y: Self, if_zero: Self, otherwise: Self) -> Self {
        let mut lanes = otherwise.0;
        for i in 0..4 {
            if x.0[i] == 0.0 && y.0[i] == 0.0 {
                lanes[i] = if_zero.0[i];
            }
        }
        F32x4(lanes)
    }
}

/// A 2D vector per lane.
#[derive(Copy, Clone, Debug)]
pub(crate) struct LaneVector<L> {
    pub x: L,
    pub y: L,
}

impl<L: Lanes> LaneVector<L> {
    #[inline]
    pub fn new(x: L, y: L) -> Self {
        LaneVector { x, y }
    }

    #[inline]
    pub fn dot(self, other: Self) -> L {
        self.x * other.x + self.y * other.y
    }

    #[inline]
    pub fn square_length(self) -> L {
        self.dot(self)
    }

    #[inline]
    pub fn scale(self, s: L) -> Self {
        LaneVector::new(self.x * s, self.y * s)
    }

    /// Per lane, `fallback` where this vector is zero.
    #[inline]
    pub fn or_if_zero(self, fallback: Self) -> Self {
        LaneVector::new(
            L::select_if_zero(self.x, self.y, fallback.x, self.x),
            L::select_if_zero(self.x, self.y, fallback.y, self.y),
        )
    }
}

impl<L: Lanes> Add for LaneVector<L> {
    type Output = Self;
    #[inline]
    fn add(self, other: Self) -> Self {
        LaneVector::new(self.x + other.x, self.y + other.y)
    }
}

impl<L: Lanes> Sub for LaneVector<L> {
    type Output = Self;
    #[inline]
    fn sub(self, other: Self) -> Self {
        LaneVector::new(self.x - other.x, self.y - other.y)
    }
}

/// Angle between two vectors per lane, in `[0, π]`, zero where either vector is zero.
#[inline]
pub(crate) fn angle_between_vectors<L: Lanes>(a: LaneVector<L>, b: LaneVector<L>) -> L {
    let cos_theta = a.dot(b) / (a.square_length() * b.square_length()).sqrt();
    L::splat(1.0).min(cos_theta).max(L::splat(-1.0)).acos()
}

/// `ceil(log2(x))` per lane, pinned to `[0, max]`.
///
/// Same exponent-bit trick as `geom::utils::next_log2`.
#[inline]
pub(crate) fn next_log2_pinned<L: Lanes>(x: L, max: u32) -> [u32; 4] {
    let mut levels = [0; 4];
    for (i, level) in levels.iter_mut().enumerate().take(L::COUNT) {
        let log2 = crate::geom::utils::next_log2(x.lane(i));
        *level = (log2.max(0) as u32).min(max);
    }
    levels
}

#[test]
fn lanes_match_scalar() {
    let a = [0.5f32, -3.0, 1e-20, 7.25];
    let b = [2.0f32, 0.0, 3.0, -1.5];
    let va = F32x4::load(&a);
    let vb = F32x4::load(&b);

    let sum = (va * vb + vb) / (va - vb);
    for i in 0..4 {
        let scalar = (a[i] * b[i] + b[i]) / (a[i] - b[i]);
        assert_eq!(sum.lane(i).to_bits(), scalar.to_bits());
    }

    let v = LaneVector::new(va, vb);
    let w = LaneVector::new(vb, va);
    let angles = angle_between_vectors(v, w);
    for i in 0..4 {
        let scalar = angle_between_vectors(
            LaneVector::new(a[i], b[i]),
            LaneVector::new(b[i], a[i]),
        );
        assert_eq!(angles.lane(i).to_bits(), scalar.to_bits());
    }
}

#[test]
fn zero_vectors_have_no_angle() {
    let zero = LaneVector::new(0.0f32, 0.0);
    let v = LaneVector::new(1.0f32, 2.0);
    assert_eq!(angle_between_vectors(zero, v), 0.0);
    assert_eq!(angle_between_vectors(v, zero), 0.0);
}

#[test]
fn select_and_fallbacks() {
    let v = LaneVector::new(F32x4([0.0, 1.0, 0.0, 0.0]), F32x4([0.0, 0.0, 2.0, 0.0]));
    let fallback = LaneVector::new(F32x4::splat(9.0), F32x4::splat(8.0));
    let r = v.or_if_zero(fallback);
    assert_eq!(r.x.0, [9.0, 1.0, 0.0, 9.0]);
    assert_eq!(r.y.0, [8.0, 0.0, 2.0, 8.0]);

    assert_eq!(next_log2_pinned(F32x4([0.0, 1.0, 5.0, 1e30]), 15), [0, 0, 3, 15]);
    assert_eq!(next_log2_pinned(3.0f32, 15), [2, 0, 0, 0]);
}
