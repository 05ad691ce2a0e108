use crate::domain::error::PipelineError;
use crate::domain::request::ModelId;
use crate::ports::extractor::ToolStatus;
use ndarray::{Array3, ArrayView2};
use std::fmt;

/// Compute device a model was placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cuda,
    Cpu,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cuda => write!(f, "cuda"),
            Device::Cpu => write!(f, "cpu"),
        }
    }
}

/// A loaded separation model, treated as an opaque capability.
pub trait StemModel: Send {
    /// Output category names, in output order.
    fn sources(&self) -> &[String];

    fn sample_rate(&self) -> u32;

    fn channels(&self) -> usize;

    /// Exact input length accepted by [`StemModel::infer`].
    fn segment_samples(&self) -> usize;

    fn device(&self) -> Device;

    /// Separate one `[channels, segment_samples]` window into
    /// `[sources, channels, segment_samples]`.
    fn infer(&mut self, segment: ArrayView2<'_, f32>) -> Result<Array3<f32>, PipelineError>;
}

pub trait ModelLoader: Send + Sync {
    fn load(&self, model: ModelId) -> Result<Box<dyn StemModel>, PipelineError>;

    /// Whether `model` could be loaded, without loading it.
    /// Loaders that cannot tell ahead of time report ready.
    fn probe(&self, _model: ModelId) -> ToolStatus {
        ToolStatus::ok()
    }
}
