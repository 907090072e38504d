#![deny(bare_trait_objects)]
#![deny(unconditional_recursion)]
#![allow(clippy::excessive_precision)]
#![allow(clippy::let_and_return)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::float_cmp)]

//! 2D bézier segments and the curve analysis needed to stroke them with GPU tessellation.
//!
//! This crate is reexported in [hachure](https://docs.rs/hachure/).
//!
//! # Overview.
//!
//! This crate implements the maths to work with:
//!
//! - line segments,
//! - quadratic and cubic bézier curves,
//! - conics (rational quadratic bézier curves with a weight),
//!
//! as well as the analysis a stroker performs before handing curves to the GPU:
//!
//! - [Wang's formula](wangs_formula/index.html), which estimates how many line segments a curve
//!   needs to be approximated within a given precision,
//! - the [curve classifier](classify/index.html), which finds cusps, inflections and points
//!   where a curve rotates more than 180 degrees so that the curve can be chopped into pieces a
//!   single stroke instance can represent.
//!
//! # Precision
//!
//! Wang's formula takes a `precision` rather than a tolerance. The precision is the inverse of
//! the tolerance: a precision of 4 means the linear approximation stays within a quarter of a unit
//! of the curve. Multiplying the precision by the maximum scale factor of a transform gives the
//! number of segments needed after the transform is applied.

pub use arrayvec;
pub use euclid;

#[cfg(feature = "serialization")]
#[macro_use]
pub extern crate serde;

pub mod classify;
pub mod conic;
pub mod cubic_bezier;
mod line;
pub mod quadratic_bezier;
pub mod utils;
pub mod wangs_formula;

#[doc(inline)]
pub use crate::conic::ConicSegment;
#[doc(inline)]
pub use crate::cubic_bezier::CubicBezierSegment;
#[doc(inline)]
pub use crate::line::LineSegment;
#[doc(inline)]
pub use crate::quadratic_bezier::QuadraticBezierSegment;

pub use crate::scalar::Scalar;

mod scalar {
    pub(crate) use num_traits::{Float, FloatConst, NumCast};

    use core::fmt::{Debug, Display};
    use core::ops::{AddAssign, DivAssign, MulAssign, SubAssign};

    pub trait Scalar:
        Float
        + NumCast
        + FloatConst
        + Sized
        + Display
        + Debug
        + AddAssign
        + SubAssign
        + MulAssign
        + DivAssign
    {
        const HALF: Self;
        const ZERO: Self;
        const ONE: Self;
        const TWO: Self;
        const THREE: Self;
        const FOUR: Self;
        const SIX: Self;
        const EIGHT: Self;


        fn value(v: f32) -> Self;
    }

    impl Scalar for f32 {
        const HALF: Self = 0.5;
        const ZERO: Self = 0.0;
        const ONE: Self = 1.0;
        const TWO: Self = 2.0;
        const THREE: Self = 3.0;
        const FOUR: Self = 4.0;
        const SIX: Self = 6.0;
        const EIGHT: Self = 8.0;


        #[inline]
        fn value(v: f32) -> Self {
            v
        }
    }

    impl Scalar for f64 {
        const HALF: Self = 0.5;
        const ZERO: Self = 0.0;
        const ONE: Self = 1.0;
        const TWO: Self = 2.0;
        const THREE: Self = 3.0;
        const FOUR: Self = 4.0;
        const SIX: Self = 6.0;
        const EIGHT: Self = 8.0;


        #[inline]
        fn value(v: f32) -> Self {
            v as f64
        }
    }
}

/// Alias for `euclid::default::Point2D`.
pub use euclid::default::Point2D as Point;

/// Alias for `euclid::default::Vector2D`.
pub use euclid::default::Vector2D as Vector;

/// Alias for `euclid::default::Box2D`
pub use euclid::default::Box2D;

/// Shorthand for `Vector::new(x, y)`.
#[inline]
pub fn vector<S>(x: S, y: S) -> Vector<S> {
    Vector::new(x, y)
}

/// Shorthand for `Point::new(x, y)`.
#[inline]
pub fn point<S>(x: S, y: S) -> Point<S> {
    Point::new(x, y)
}
