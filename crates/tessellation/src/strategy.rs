//! Picking between the indirect and the hardware tessellation strategies.

use crate::device::Device;
use crate::{
    Batching, DeviceCapabilities, HardwareStrokeTessellator, IndirectStrokeTessellator, StrokeList,
    TessellationError, TessellationResult, Tolerances,
};

/// The ways strokes can be turned into GPU work.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum StrokeStrategy {
    /// Instances binned by resolve level, see [IndirectStrokeTessellator].
    Indirect,
    /// Patches for a hardware tessellation stage, see [HardwareStrokeTessellator].
    HardwareTessellation,
}

impl StrokeStrategy {
    /// Above this number of verbs, hardware tessellation is preferred when available.
    ///
    /// Small batches don't make up for the cost of switching to a tessellation pipeline.
    pub const HARDWARE_TESSELLATION_MIN_VERBS: usize = 50;

    /// Picks a strategy for a batch of strokes with `total_verb_count` verbs.
    ///
    /// Returns `None` if the device supports neither strategy.
    pub fn choose(caps: &DeviceCapabilities, total_verb_count: usize) -> Option<Self> {
        if caps.supports_hardware_tessellation
            && total_verb_count > Self::HARDWARE_TESSELLATION_MIN_VERBS
        {
            return Some(StrokeStrategy::HardwareTessellation);
        }

        if caps.supports_indirect_draws {
            return Some(StrokeStrategy::Indirect);
        }

        if caps.supports_hardware_tessellation {
            return Some(StrokeStrategy::HardwareTessellation);
        }

        None
    }
}

/// The two steps every stroke tessellator goes through once created.
pub trait Tessellate {
    /// Allocates device buffers and writes the records into them.
    ///
    /// If this fails, `draw` does nothing.
    fn prepare(&mut self, device: &mut dyn Device) -> TessellationResult;

    /// Issues the draws of the last successful `prepare`.
    fn draw(&self, device: &mut dyn Device);
}

impl Tessellate for IndirectStrokeTessellator {
    fn prepare(&mut self, device: &mut dyn Device) -> TessellationResult {
        IndirectStrokeTessellator::prepare(self, device)
    }

    fn draw(&self, device: &mut dyn Device) {
        IndirectStrokeTessellator::draw(self, device)
    }
}

impl Tessellate for HardwareStrokeTessellator {
    fn prepare(&mut self, device: &mut dyn Device) -> TessellationResult {
        HardwareStrokeTessellator::prepare(self, device)
    }

    fn draw(&self, device: &mut dyn Device) {
        HardwareStrokeTessellator::draw(self, device)
    }
}

/// A stroke tessellator using either strategy.
///
/// # Example
///
/// ```
/// use hachure_tessellation::*;
/// use hachure_tessellation::device::RecordingDevice;
/// use hachure_tessellation::math::point;
/// use hachure_tessellation::path::Path;
///
/// let mut builder = Path::builder();
/// builder.begin(point(0.0, 0.0));
/// builder.line_to(point(10.0, 0.0));
/// builder.end(false);
///
/// let mut strokes = StrokeList::new();
/// strokes.push(builder.build(), StrokeOptions::DEFAULT);
///
/// let caps = DeviceCapabilities::DEFAULT;
/// let strategy = StrokeStrategy::choose(&caps, strokes.verb_count()).unwrap();
/// assert_eq!(strategy, StrokeStrategy::Indirect);
///
/// let mut tessellator = StrokeTessellator::new(
///     strategy,
///     strokes,
///     &Tolerances::DEFAULT,
///     &caps,
///     Batching::default(),
/// ).unwrap();
///
/// let mut device = RecordingDevice::new();
/// tessellator.prepare(&mut device).unwrap();
/// tessellator.draw(&mut device);
/// assert_eq!(device.drawn_instances().len(), 1);
/// ```
#[derive(Clone, Debug)]
pub enum StrokeTessellator {
    Indirect(IndirectStrokeTessellator),
    Hardware(HardwareStrokeTessellator),
}

impl StrokeTessellator {
    /// Creates the tessellator of the given strategy.
    ///
    /// `batching` only matters for the indirect strategy. Fails if the device doesn't support the
    /// strategy or if the options of one of the strokes are invalid.
    pub fn new(
        strategy: StrokeStrategy,
        strokes: StrokeList,
        tolerances: &Tolerances,
        caps: &DeviceCapabilities,
        batching: Batching,
    ) -> Result<Self, TessellationError> {
        match strategy {
            StrokeStrategy::Indirect => {
                if !caps.supports_indirect_draws {
                    return Err(TessellationError::UnsupportedStrategy(strategy));
                }
                IndirectStrokeTessellator::new(strokes, tolerances, batching)
                    .map(StrokeTessellator::Indirect)
            }
            StrokeStrategy::HardwareTessellation => {
                HardwareStrokeTessellator::new(strokes, tolerances, caps)
                    .map(StrokeTessellator::Hardware)
            }
        }
    }

    pub fn strategy(&self) -> StrokeStrategy {
        match self {
            StrokeTessellator::Indirect(_) => StrokeStrategy::Indirect,
            StrokeTessellator::Hardware(_) => StrokeStrategy::HardwareTessellation,
        }
    }
}

impl Tessellate for StrokeTessellator {
    fn prepare(&mut self, device: &mut dyn Device) -> TessellationResult {
        match self {
            StrokeTessellator::Indirect(tess) => tess.prepare(device),
            StrokeTessellator::Hardware(tess) => tess.prepare(device),
        }
    }

    fn draw(&self, device: &mut dyn Device) {
        match self {
            StrokeTessellator::Indirect(tess) => tess.draw(device),
            StrokeTessellator::Hardware(tess) => tess.draw(device),
        }
    }
}

#[test]
fn choose_strategy() {
    let indirect_only = DeviceCapabilities::DEFAULT;
    let both = DeviceCapabilities::DEFAULT.with_hardware_tessellation(64);
    let hardware_only = both.with_indirect_draws(false);
    let neither = indirect_only.with_indirect_draws(false);

    assert_eq!(
        StrokeStrategy::choose(&indirect_only, 1000),
        Some(StrokeStrategy::Indirect)
    );
    assert_eq!(
        StrokeStrategy::choose(&both, 10),
        Some(StrokeStrategy::Indirect)
    );
    assert_eq!(
        StrokeStrategy::choose(&both, 51),
        Some(StrokeStrategy::HardwareTessellation)
    );
    assert_eq!(
        StrokeStrategy::choose(&hardware_only, 10),
        Some(StrokeStrategy::HardwareTessellation)
    );
    assert_eq!(StrokeStrategy::choose(&neither, 10), None);
}

#[test]
fn unsupported_strategies_are_rejected() {
    let neither = DeviceCapabilities::DEFAULT.with_indirect_draws(false);
    let indirect = StrokeTessellator::new(
        StrokeStrategy::Indirect,
        StrokeList::new(),
        &Tolerances::DEFAULT,
        &neither,
        Batching::Scalar,
    );
    assert_eq!(
        indirect.err(),
        Some(TessellationError::UnsupportedStrategy(
            StrokeStrategy::Indirect
        ))
    );

    let hardware = StrokeTessellator::new(
        StrokeStrategy::HardwareTessellation,
        StrokeList::new(),
        &Tolerances::DEFAULT,
        &neither,
        Batching::Scalar,
    );
    assert_eq!(
        hardware.err(),
        Some(TessellationError::UnsupportedStrategy(
            StrokeStrategy::HardwareTessellation
        ))
    );
}

#[test]
fn tessellate_through_the_trait() {
    use crate::device::RecordingDevice;
    use crate::math::point;
    use crate::path::Path;
    use crate::StrokeOptions;

    let mut builder = Path::builder();
    builder.begin(point(0.0, 0.0));
    builder.line_to(point(10.0, 0.0));
    builder.line_to(point(10.0, 10.0));
    builder.end(false);
    let path = builder.build();

    let caps = DeviceCapabilities::DEFAULT.with_hardware_tessellation(64);
    let mut tessellators: Vec<Box<dyn Tessellate>> = Vec::new();
    for strategy in &[StrokeStrategy::Indirect, StrokeStrategy::HardwareTessellation] {
        let mut strokes = StrokeList::new();
        strokes.push(path.clone(), StrokeOptions::DEFAULT);
        let tessellator =
            StrokeTessellator::new(*strategy, strokes, &Tolerances::DEFAULT, &caps, Batching::Lanes)
                .unwrap();
        assert_eq!(tessellator.strategy(), *strategy);
        tessellators.push(Box::new(tessellator));
    }

    let mut device = RecordingDevice::new();
    for tessellator in &mut tessellators {
        tessellator.prepare(&mut device).unwrap();
        tessellator.draw(&mut device);
    }

    assert_eq!(device.draw_calls().len(), 2);
    assert_eq!(device.drawn_instances().len(), 2);
    assert_eq!(device.drawn_patches().len(), 2);
}
