#![deny(bare_trait_objects)]

//! GPU stroke rendering.
//!
//! Paths are stroked by the GPU: the CPU only analyses the curves and writes compact records
//! that vertex or tessellation shaders expand into the final geometry.
//!
//! This crate reexports the following crates:
//!
//! * [hachure_tessellation](https://docs.rs/hachure_tessellation/), the stroke tessellators,
//!   the device interface and the records they write.
//! * [hachure_path](https://docs.rs/hachure_path/), paths and their builder.
//! * [hachure_geom](https://docs.rs/hachure_geom/), bézier and conic segments, Wang's formula and
//!   the curve classifier.
//!
//! ## Example
//!
//! ```
//! use hachure::math::point;
//! use hachure::path::Path;
//! use hachure::tessellation::device::RecordingDevice;
//! use hachure::tessellation::*;
//!
//! let mut builder = Path::builder();
//! builder.begin(point(0.0, 0.0));
//! builder.quadratic_bezier_to(point(10.0, 20.0), point(20.0, 0.0));
//! builder.line_to(point(20.0, 20.0));
//! builder.end(false);
//!
//! let mut strokes = StrokeList::new();
//! strokes.push(builder.build(), StrokeOptions::DEFAULT.with_line_width(3.0));
//!
//! let caps = DeviceCapabilities::DEFAULT;
//! let strategy = StrokeStrategy::choose(&caps, strokes.verb_count()).unwrap();
//! let mut tessellator = StrokeTessellator::new(
//!     strategy,
//!     strokes,
//!     &Tolerances::DEFAULT,
//!     &caps,
//!     Batching::Lanes,
//! ).unwrap();
//!
//! let mut device = RecordingDevice::new();
//! tessellator.prepare(&mut device).unwrap();
//! tessellator.draw(&mut device);
//!
//! assert_eq!(device.drawn_instances().len(), 2);
//! ```

pub extern crate hachure_tessellation;

pub use hachure_tessellation as tessellation;
pub use tessellation::geom;
pub use tessellation::path;

pub use path::math;
