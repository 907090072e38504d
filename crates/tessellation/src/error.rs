use crate::StrokeStrategy;
use thiserror::Error;

/// The result type of the stroke tessellators.
pub type TessellationResult = Result<(), TessellationError>;

/// A device allocation that could not be satisfied.
///
/// The batch that requested it is not drawn.
#[derive(Error, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AllocationError {
    #[error("could not allocate {count} indirect draw commands")]
    IndirectCommands { count: u32 },
    #[error("could not allocate {count} stroke instances")]
    Instances { count: u32 },
    #[error("could not allocate {count} stroke patches")]
    Vertices { count: u32 },
}

/// The stroke tessellators' error enumeration.
#[derive(Error, Copy, Clone, Debug, PartialEq)]
pub enum TessellationError {
    #[error("invalid stroke width {0}, expected a finite value greater than zero")]
    InvalidStrokeWidth(f32),
    #[error("invalid miter limit {0}, expected a value greater than or equal to 1")]
    InvalidMiterLimit(f32),
    #[error("the device does not support the {0:?} stroke strategy")]
    UnsupportedStrategy(StrokeStrategy),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
}
