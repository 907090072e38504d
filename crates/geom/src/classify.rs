//! Curve classification for stroking.
//!
//! Before a segment is handed to the GPU, the stroker needs to know whether it collapses to a
//! point, and where it has to be chopped so that every piece is convex and rotates no more than
//! 180 degrees. A stroke instance can't represent a tangent that flips direction, so cusps are
//! reported separately: the stroker replaces them with two straight pieces and a round join.
//!
//! Quadratics and conics can only have a cusp when they are flat lines that turn around, and
//! can never inflect. Cubics go through [`CubicBezierSegment::convex_180_chops`].

use crate::scalar::Scalar;
use crate::{ConicSegment, CubicBezierSegment, LineSegment, QuadraticBezierSegment};
use arrayvec::ArrayVec;

/// What a stroker needs to know about a segment.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification<S> {
    /// All the control points are at the same location.
    ///
    /// A degenerate segment contributes no geometry but can still end up needing a join or caps.
    pub degenerate: bool,
    /// Parameters of local maximum curvature, sorted.
    pub max_curvature_ts: ArrayVec<S, 3>,
    /// Sorted parameters at which the segment must be chopped before it can be stroked.
    pub chops: ArrayVec<S, 2>,
    /// The chops are at cusps and need a round join at the chop point.
    pub chops_are_cusps: bool,
}

impl<S: Scalar> Classification<S> {
    fn degenerate() -> Self {
        Classification {
            degenerate: true,
            max_curvature_ts: ArrayVec::new(),
            chops: ArrayVec::new(),
            chops_are_cusps: false,
        }
    }

    /// True if the segment can be stroked as a single piece.
    #[inline]
    pub fn is_convex_180(&self) -> bool {
        self.chops.is_empty()
    }
}

pub fn classify_line<S: Scalar>(line: &LineSegment<S>) -> Classification<S> {
    if line.is_degenerate() {
        return Classification::degenerate();
    }

    Classification {
        degenerate: false,
        max_curvature_ts: ArrayVec::new(),
        chops: ArrayVec::new(),
        chops_are_cusps: false,
    }
}

pub fn classify_quadratic<S: Scalar>(curve: &QuadraticBezierSegment<S>) -> Classification<S> {
    if curve.is_degenerate() {
        return Classification::degenerate();
    }

    let mut max_curvature_ts = ArrayVec::new();
    max_curvature_ts.push(curve.max_curvature_t());

    let mut chops = ArrayVec::new();
    let chops_are_cusps = curve.has_cusp();
    if chops_are_cusps {
        chops.push(curve.mid_tangent_t());
    }

    Classification {
        degenerate: false,
        max_curvature_ts,
        chops,
        chops_are_cusps,
    }
}

pub fn classify_conic<S: Scalar>(curve: &ConicSegment<S>) -> Classification<S> {
    if curve.is_degenerate() {
        return Classification::degenerate();
    }

    // The weight doesn't move the point of maximum curvature of the control polygon by much,
    // and strokers only use it as a hint.
    let mut max_curvature_ts = ArrayVec::new();
    max_curvature_ts.push(curve.to_quadratic().max_curvature_t());

    let mut chops = ArrayVec::new();
    let chops_are_cusps = curve.has_cusp();
    if chops_are_cusps {
        chops.push(curve.mid_tangent_t());
    }

    Classification {
        degenerate: false,
        max_curvature_ts,
        chops,
        chops_are_cusps,
    }
}

pub fn classify_cubic<S: Scalar>(curve: &CubicBezierSegment<S>) -> Classification<S> {
    if curve.is_degenerate() {
        return Classification::degenerate();
    }

    let chops = curve.convex_180_chops();
    let chops_are_cusps = chops.are_cusps && !chops.ts.is_empty();

    Classification {
        degenerate: false,
        max_curvature_ts: curve.max_curvature_ts(),
        chops: chops.ts,
        chops_are_cusps,
    }
}

#[cfg(test)]
use crate::point;

#[test]
fn degenerate_segments() {
    let p = point(3.0f32, 4.0);
    assert!(classify_line(&LineSegment { from: p, to: p }).degenerate);
    assert!(classify_quadratic(&QuadraticBezierSegment { from: p, ctrl: p, to: p }).degenerate);
    assert!(
        classify_cubic(&CubicBezierSegment {
            from: p,
            ctrl1: p,
            ctrl2: p,
            to: p
        })
        .degenerate
    );

    // A zero-length line with a control point elsewhere is not degenerate.
    let c = classify_quadratic(&QuadraticBezierSegment {
        from: p,
        ctrl: point(10.0, 0.0),
        to: p,
    });
    assert!(!c.degenerate);
    assert!(c.chops_are_cusps);
}

#[test]
fn quadratic_cusp_is_chopped_once() {
    let c = classify_quadratic(&QuadraticBezierSegment {
        from: point(0.0f32, 0.0),
        ctrl: point(10.0, 0.0),
        to: point(5.0, 0.0),
    });
    assert!(!c.degenerate);
    assert!(c.chops_are_cusps);
    assert_eq!(c.chops.len(), 1);
    assert!(c.chops[0] > 0.0 && c.chops[0] < 1.0);
}

#[test]
fn conics_classify_like_quadratics() {
    let quadratic = QuadraticBezierSegment {
        from: point(0.0f32, 0.0),
        ctrl: point(10.0, 0.0),
        to: point(5.0, 0.0),
    };
    let conic = ConicSegment {
        from: quadratic.from,
        ctrl: quadratic.ctrl,
        to: quadratic.to,
        weight: 2.0,
    };
    let c = classify_conic(&conic);
    assert!(c.chops_are_cusps);
    assert_eq!(c.chops.len(), 1);

    let arch = ConicSegment {
        ctrl: point(5.0, 10.0),
        ..conic
    };
    assert!(classify_conic(&arch).is_convex_180());
}

#[test]
fn cusp_pieces_classify_cleanly() {
    let curve = CubicBezierSegment {
        from: point(0.0f32, 0.0),
        ctrl1: point(1.0, 1.0),
        ctrl2: point(0.0, 1.0),
        to: point(1.0, 0.0),
    };
    let c = classify_cubic(&curve);
    assert!(c.chops_are_cusps);
    assert_eq!(c.chops.len(), 1);

    for piece in curve.split_at(&c.chops) {
        let pc = classify_cubic(&piece);
        assert!(pc.is_convex_180());
        assert!(!pc.chops_are_cusps);
    }
}

#[test]
fn arch_is_convex() {
    let c = classify_cubic(&CubicBezierSegment {
        from: point(0.0f32, 0.0),
        ctrl1: point(0.0, 10.0),
        ctrl2: point(10.0, 10.0),
        to: point(10.0, 0.0),
    });
    assert!(c.is_convex_180());
    assert_eq!(c.max_curvature_ts.len(), 1);
}
