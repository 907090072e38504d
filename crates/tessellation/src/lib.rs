#![deny(bare_trait_objects)]
#![deny(unconditional_recursion)]
#![allow(clippy::float_cmp)]
#![allow(clippy::too_many_arguments)]

//! Stroke tessellation for GPUs.
//!
//! This crate is reexported in [hachure](https://docs.rs/hachure/).
//!
//! ## Overview
//!
//! Strokes are not turned into triangles on the CPU. Instead, every segment of a path is written
//! out as a small record holding its control points, and the GPU expands each record into a
//! triangle strip that follows the curve, including the join with the previous segment. The CPU
//! side decides how finely each segment has to be subdivided and groups the records so that they
//! can be drawn with very few draw calls.
//!
//! There are two strategies:
//!
//! * [IndirectStrokeTessellator](struct.IndirectStrokeTessellator.html) computes a *resolve level*
//!   for every stroke instance (the instance is drawn with `2^level` edges) and bins the instances
//!   by level. Each non-empty bin becomes one indirect draw command.
//! * [HardwareStrokeTessellator](struct.HardwareStrokeTessellator.html) writes fixed-size patches
//!   for a hardware tessellation stage and only chops curves that need more segments than the
//!   hardware can produce.
//!
//! [StrokeStrategy::choose](enum.StrokeStrategy.html#method.choose) picks one of them from the
//! [DeviceCapabilities](struct.DeviceCapabilities.html), and
//! [StrokeTessellator](enum.StrokeTessellator.html) wraps either behind the
//! [Tessellate](trait.Tessellate.html) trait.
//!
//! Both strategies write into buffers provided by a [Device](device/trait.Device.html).
//! [RecordingDevice](device/struct.RecordingDevice.html) keeps everything in memory.
//!
//! ## Tolerances
//!
//! Segment counts are derived from [Tolerances](struct.Tolerances.html): a *precision* (the
//! inverse of the maximum distance between the stroke and its approximation, in device pixels) and
//! the maximum scale factor of the transform the strokes are drawn with.
//!
//! ## Example
//!
//! ```
//! use hachure_tessellation::*;
//! use hachure_tessellation::device::RecordingDevice;
//! use hachure_tessellation::math::point;
//! use hachure_tessellation::path::Path;
//!
//! let mut builder = Path::builder();
//! builder.begin(point(0.0, 0.0));
//! builder.line_to(point(10.0, 0.0));
//! builder.cubic_bezier_to(point(20.0, 0.0), point(20.0, 10.0), point(10.0, 10.0));
//! builder.end(false);
//! let path = builder.build();
//!
//! let mut strokes = StrokeList::new();
//! strokes.push(path, StrokeOptions::DEFAULT.with_line_width(2.0).with_line_cap(LineCap::Round));
//!
//! let mut tessellator = IndirectStrokeTessellator::new(
//!     strokes,
//!     &Tolerances::DEFAULT,
//!     Batching::Lanes,
//! ).unwrap();
//!
//! let mut device = RecordingDevice::new();
//! tessellator.prepare(&mut device).unwrap();
//! tessellator.draw(&mut device);
//!
//! assert_eq!(device.draw_calls().len(), 1);
//! ```

pub use hachure_path as path;

#[cfg(feature = "serialization")]
#[macro_use]
pub extern crate serde;

pub mod device;
mod error;
mod indirect;
mod patches;
mod records;
mod resolve_level;
mod simd;
mod strategy;
mod stroke_iterator;

#[cfg(test)]
mod stroke_tests;

pub use crate::path::geom;
pub use crate::path::math;

#[doc(inline)]
pub use crate::error::*;

#[doc(inline)]
pub use crate::indirect::{IndirectStrokeTessellator, StrokeList};

#[doc(inline)]
pub use crate::patches::HardwareStrokeTessellator;

#[doc(inline)]
pub use crate::records::{DrawIndirectCommand, PatchType, StrokeInstance, StrokePatch};

#[doc(inline)]
pub use crate::resolve_level::{ResolveLevelCounter, ResolveLevels, SegmentPlan};

#[doc(inline)]
pub use crate::strategy::{StrokeStrategy, StrokeTessellator, Tessellate};

#[doc(inline)]
pub use crate::stroke_iterator::{StrokeIterator, StrokeStep, StrokeVerb};

pub use crate::path::{LineCap, LineJoin};

/// The highest resolve level a stroke instance can be drawn with.
///
/// An instance at resolve level `L` is approximated by `2^L` edges, plus the edges of its join.
pub const MAX_RESOLVE_LEVEL: u32 = 15;

/// Number of resolve-level bins, one per level.
pub const NUM_RESOLVE_LEVELS: usize = MAX_RESOLVE_LEVEL as usize + 1;

/// Parameters for the stroke tessellators.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[non_exhaustive]
pub struct StrokeOptions {
    /// Line width, in local coordinates.
    ///
    /// Must be finite and greater than zero.
    /// Default value: `StrokeOptions::DEFAULT_LINE_WIDTH`.
    pub line_width: f32,

    /// What cap to use at both ends of each open sub-path.
    ///
    /// Default value: `LineCap::Butt`.
    pub line_cap: LineCap,

    /// See the SVG specification.
    ///
    /// Default value: `LineJoin::Miter`.
    pub line_join: LineJoin,

    /// See the SVG specification.
    ///
    /// Must be greater than or equal to 1.0.
    /// Default value: `StrokeOptions::DEFAULT_MITER_LIMIT`.
    pub miter_limit: f32,
}

impl StrokeOptions {
    /// Minimum miter limit as defined by the SVG specification.
    ///
    /// See [StrokeMiterLimitProperty](https://svgwg.org/specs/strokes/#StrokeMiterlimitProperty)
    pub const MINIMUM_MITER_LIMIT: f32 = 1.0;
    /// Default miter limit as defined by the SVG specification.
    ///
    /// See [StrokeMiterLimitProperty](https://svgwg.org/specs/strokes/#StrokeMiterlimitProperty)
    pub const DEFAULT_MITER_LIMIT: f32 = 4.0;
    pub const DEFAULT_LINE_CAP: LineCap = LineCap::Butt;
    pub const DEFAULT_LINE_JOIN: LineJoin = LineJoin::Miter;
    pub const DEFAULT_LINE_WIDTH: f32 = 1.0;

    pub const DEFAULT: Self = StrokeOptions {
        line_width: Self::DEFAULT_LINE_WIDTH,
        line_cap: Self::DEFAULT_LINE_CAP,
        line_join: Self::DEFAULT_LINE_JOIN,
        miter_limit: Self::DEFAULT_MITER_LIMIT,
    };

    #[inline]
    pub const fn with_line_cap(mut self, cap: LineCap) -> Self {
        self.line_cap = cap;
        self
    }

    #[inline]
    pub const fn with_line_join(mut self, join: LineJoin) -> Self {
        self.line_join = join;
        self
    }

    #[inline]
    pub const fn with_line_width(mut self, width: f32) -> Self {
        self.line_width = width;
        self
    }

    /// Like the other builder methods, this doesn't check the value. Limits below
    /// `MINIMUM_MITER_LIMIT` are reported by [StrokeOptions::validate], which the tessellator
    /// constructors call.
    #[inline]
    pub const fn with_miter_limit(mut self, limit: f32) -> Self {
        self.miter_limit = limit;
        self
    }

    /// Half of the line width.
    #[inline]
    pub fn stroke_radius(&self) -> f32 {
        self.line_width * 0.5
    }

    /// The join type as the stroke shaders read it: -1 for round joins, 0 for bevel joins and the
    /// miter limit for miter joins.
    #[inline]
    pub fn join_type(&self) -> f32 {
        match self.line_join {
            LineJoin::Round => -1.0,
            LineJoin::Bevel => 0.0,
            LineJoin::Miter => self.miter_limit,
        }
    }

    /// Checks the options that the tessellators can't work with.
    ///
    /// The miter limit is only checked for miter joins.
    pub fn validate(&self) -> TessellationResult {
        if !self.line_width.is_finite() || self.line_width <= 0.0 {
            return Err(TessellationError::InvalidStrokeWidth(self.line_width));
        }
        if self.line_join == LineJoin::Miter
            && !(self.miter_limit >= Self::MINIMUM_MITER_LIMIT)
        {
            return Err(TessellationError::InvalidMiterLimit(self.miter_limit));
        }

        Ok(())
    }
}

impl Default for StrokeOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// How finely strokes are approximated.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct Tolerances {
    /// Inverse of the maximum distance, in device pixels, between a curve and its linear
    /// approximation.
    ///
    /// Default value: `Tolerances::DEFAULT_PRECISION` (a quarter of a pixel).
    pub precision: f32,

    /// Maximum scale factor of the transform the strokes are drawn with.
    ///
    /// Default value: 1.0.
    pub matrix_max_scale: f32,
}

impl Tolerances {
    pub const DEFAULT_PRECISION: f32 = 4.0;

    pub const DEFAULT: Self = Tolerances {
        precision: Self::DEFAULT_PRECISION,
        matrix_max_scale: 1.0,
    };

    #[inline]
    pub const fn with_precision(mut self, precision: f32) -> Self {
        self.precision = precision;
        self
    }

    #[inline]
    pub const fn with_matrix_max_scale(mut self, scale: f32) -> Self {
        self.matrix_max_scale = scale;
        self
    }

    /// The precision to use with Wang's formula for curves in local coordinates.
    #[inline]
    pub fn parametric_precision(&self) -> f32 {
        self.precision * self.matrix_max_scale
    }

    /// Number of radial segments a stroke of the given width needs per radian of rotation so
    /// that its outer edge stays within tolerance.
    pub fn num_radial_segments_per_radian(&self, stroke_width: f32) -> f32 {
        let cos_theta = 1.0 - (1.0 / self.parametric_precision()) / stroke_width;
        0.5 / cos_theta.max(-1.0).acos()
    }

    /// Resolve level of a circle (a 180 degree point stroke) drawn with the given number of radial
    /// segments per radian.
    pub fn resolve_level_for_circles(num_radial_segments_per_radian: f32) -> u32 {
        let num_radial_segments = num_radial_segments_per_radian * std::f32::consts::PI;
        let level = geom::utils::next_log2(num_radial_segments) as u32;
        level.max(1).min(MAX_RESOLVE_LEVEL)
    }
}

impl Default for Tolerances {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// What the device can do, passed explicitly to the code that picks a strategy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct DeviceCapabilities {
    /// Whether draws can read their parameters from a buffer.
    pub supports_indirect_draws: bool,
    /// Whether the pipeline has a hardware tessellation stage.
    pub supports_hardware_tessellation: bool,
    /// Maximum number of segments the tessellation stage emits for a single patch.
    pub max_tessellation_segments: u32,
}

impl DeviceCapabilities {
    /// Commonly guaranteed by tessellation-capable hardware.
    pub const DEFAULT_MAX_TESSELLATION_SEGMENTS: u32 = 64;

    pub const DEFAULT: Self = DeviceCapabilities {
        supports_indirect_draws: true,
        supports_hardware_tessellation: false,
        max_tessellation_segments: Self::DEFAULT_MAX_TESSELLATION_SEGMENTS,
    };

    #[inline]
    pub const fn with_indirect_draws(mut self, supported: bool) -> Self {
        self.supports_indirect_draws = supported;
        self
    }

    #[inline]
    pub const fn with_hardware_tessellation(mut self, max_segments: u32) -> Self {
        self.supports_hardware_tessellation = true;
        self.max_tessellation_segments = max_segments;
        self
    }
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Whether resolve levels are computed one segment at a time or four at a time.
///
/// Both produce exactly the same levels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum Batching {
    Scalar,
    Lanes,
}

impl Default for Batching {
    fn default() -> Self {
        Batching::Lanes
    }
}

#[test]
fn stroke_options_validation() {
    assert!(StrokeOptions::DEFAULT.validate().is_ok());
    assert_eq!(
        StrokeOptions::DEFAULT.with_line_width(0.0).validate(),
        Err(TessellationError::InvalidStrokeWidth(0.0))
    );
    assert!(StrokeOptions::DEFAULT
        .with_line_width(f32::NAN)
        .validate()
        .is_err());

    let options = StrokeOptions::DEFAULT.with_miter_limit(0.5);
    assert_eq!(
        options.validate(),
        Err(TessellationError::InvalidMiterLimit(0.5))
    );
    // Only miter joins look at the limit.
    assert!(options.with_line_join(LineJoin::Round).validate().is_ok());
}

#[test]
fn join_types() {
    let options = StrokeOptions::DEFAULT.with_miter_limit(2.5);
    assert_eq!(options.join_type(), 2.5);
    assert_eq!(options.with_line_join(LineJoin::Bevel).join_type(), 0.0);
    assert_eq!(options.with_line_join(LineJoin::Round).join_type(), -1.0);
}

#[test]
fn radial_segments_grow_with_stroke_width() {
    let tolerances = Tolerances::DEFAULT;
    let thin = tolerances.num_radial_segments_per_radian(1.0);
    let wide = tolerances.num_radial_segments_per_radian(100.0);
    assert!(thin > 0.0);
    assert!(wide > thin);

    let thin_level = Tolerances::resolve_level_for_circles(thin);
    let wide_level = Tolerances::resolve_level_for_circles(wide);
    assert!(thin_level >= 1);
    assert!(wide_level > thin_level);
    assert!(wide_level <= MAX_RESOLVE_LEVEL);
}
