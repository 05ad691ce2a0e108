//! Separation model backends.

use crate::domain::error::PipelineError;
use crate::ports::model::ModelLoader;
#[cfg(not(feature = "onnx"))]
use crate::{domain::request::ModelId, ports::extractor::ToolStatus, ports::model::StemModel};
use ndarray::Array3;
use std::path::Path;
use std::sync::Arc;

/// The loader this build ships with.
pub fn default_loader(model_dir: &Path) -> Arc<dyn ModelLoader> {
    #[cfg(feature = "onnx")]
    {
        Arc::new(onnx::OnnxModelLoader::new(model_dir))
    }
    #[cfg(not(feature = "onnx"))]
    {
        Arc::new(UnavailableModelLoader::new(model_dir))
    }
}

/// Reshape a raw `[1, sources, channels, samples]` output tensor.
pub fn stems_from_output(
    dims: &[i64],
    data: &[f32],
    expected: (usize, usize, usize),
) -> Result<Array3<f32>, PipelineError> {
    let (sources, channels, samples) = expected;
    let wanted = [1, sources as i64, channels as i64, samples as i64];
    if dims != wanted.as_slice() {
        return Err(PipelineError::Separation(format!(
            "unexpected output shape {:?}, expected {:?}",
            dims, wanted
        )));
    }
    Array3::from_shape_vec(expected, data.to_vec())
        .map_err(|e| PipelineError::Separation(format!("failed to reshape output: {}", e)))
}

fn missing_model(path: &Path) -> String {
    format!("model file not found: {}", path.display())
}

/// Stand-in used when no inference backend was compiled in.
#[cfg(not(feature = "onnx"))]
pub struct UnavailableModelLoader {
    model_dir: std::path::PathBuf,
}

#[cfg(not(feature = "onnx"))]
impl UnavailableModelLoader {
    pub fn new(model_dir: &Path) -> Self {
        Self {
            model_dir: model_dir.to_path_buf(),
        }
    }

    fn reason(&self, model: ModelId) -> String {
        format!(
            "cannot load '{}' from {}: no inference backend compiled in (rebuild with --features onnx)",
            model,
            self.model_dir.display()
        )
    }
}

#[cfg(not(feature = "onnx"))]
impl ModelLoader for UnavailableModelLoader {
    fn load(&self, model: ModelId) -> Result<Box<dyn StemModel>, PipelineError> {
        Err(PipelineError::Separation(self.reason(model)))
    }

    fn probe(&self, model: ModelId) -> ToolStatus {
        ToolStatus::unavailable(self.reason(model))
    }
}

#[cfg(feature = "onnx")]
pub mod onnx {
    use super::{missing_model, stems_from_output};
    use crate::domain::error::PipelineError;
    use crate::domain::request::ModelId;
    use crate::ports::extractor::ToolStatus;
    use crate::ports::model::{Device, ModelLoader, StemModel};
    use ndarray::{Array3, ArrayView2, Axis};
    use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider, ExecutionProvider};
    use ort::session::Session;
    use ort::value::Value;
    use std::path::{Path, PathBuf};

    fn separation_error(context: &str, err: impl std::fmt::Display) -> PipelineError {
        PipelineError::Separation(format!("{}: {}", context, err))
    }

    /// Loads `<model_dir>/<model id>.onnx`.
    pub struct OnnxModelLoader {
        model_dir: PathBuf,
    }

    impl OnnxModelLoader {
        pub fn new(model_dir: &Path) -> Self {
            Self {
                model_dir: model_dir.to_path_buf(),
            }
        }

        fn model_path(&self, model: ModelId) -> PathBuf {
            self.model_dir.join(format!("{}.onnx", model.as_str()))
        }
    }

    impl ModelLoader for OnnxModelLoader {
        fn load(&self, model: ModelId) -> Result<Box<dyn StemModel>, PipelineError> {
            let path = self.model_path(model);
            if !path.is_file() {
                return Err(PipelineError::Separation(missing_model(&path)));
            }

            let cuda = CUDAExecutionProvider::default();
            let device = if cuda.is_available().unwrap_or(false) {
                Device::Cuda
            } else {
                Device::Cpu
            };

            tracing::info!(model = %model, path = %path.display(), %device, "loading separation model");
            let session = Session::builder()
                .map_err(|e| separation_error("failed to create session builder", e))?
                .with_execution_providers([cuda.build(), CPUExecutionProvider::default().build()])
                .map_err(|e| separation_error("failed to register execution providers", e))?
                .commit_from_file(&path)
                .map_err(|e| separation_error(&format!("failed to load {}", path.display()), e))?;

            Ok(Box::new(OnnxStemModel {
                session,
                sources: model.sources().iter().map(|s| s.to_string()).collect(),
                sample_rate: model.sample_rate(),
                channels: model.channels(),
                segment: model.segment_samples(),
                device,
            }))
        }

        fn probe(&self, model: ModelId) -> ToolStatus {
            let path = self.model_path(model);
            if path.is_file() {
                ToolStatus::ok()
            } else {
                ToolStatus::unavailable(missing_model(&path))
            }
        }
    }

    pub struct OnnxStemModel {
        session: Session,
        sources: Vec<String>,
        sample_rate: u32,
        channels: usize,
        segment: usize,
        device: Device,
    }

    impl StemModel for OnnxStemModel {
        fn sources(&self) -> &[String] {
            &self.sources
        }

        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        fn channels(&self) -> usize {
            self.channels
        }

        fn segment_samples(&self) -> usize {
            self.segment
        }

        fn device(&self) -> Device {
            self.device
        }

        fn infer(&mut self, segment: ArrayView2<'_, f32>) -> Result<Array3<f32>, PipelineError> {
            let input = segment.to_owned().insert_axis(Axis(0));
            let value = Value::from_array(input).map_err(|e| separation_error("failed to build input tensor", e))?;

            let outputs = self
                .session
                .run(ort::inputs![value])
                .map_err(|e| separation_error("inference failed", e))?;
            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| separation_error("failed to read output tensor", e))?;

            stems_from_output(shape, data, (self.sources.len(), self.channels, self.segment))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_tensor_is_reshaped() {
        let data: Vec<f32> = (0..4 * 2 * 3).map(|v| v as f32).collect();
        let stems = stems_from_output(&[1, 4, 2, 3], &data, (4, 2, 3)).unwrap();
        assert_eq!(stems.dim(), (4, 2, 3));
        assert_eq!(stems[[1, 0, 2]], 8.0);
        assert_eq!(stems[[3, 1, 2]], 23.0);
    }

    #[test]
    fn test_output_with_wrong_source_count_is_rejected() {
        let data = vec![0.0; 6 * 2 * 3];
        let err = stems_from_output(&[1, 6, 2, 3], &data, (4, 2, 3)).unwrap_err();
        assert!(matches!(err, PipelineError::Separation(_)));
        assert!(err.to_string().contains("unexpected output shape [1, 6, 2, 3]"));
    }

    #[test]
    fn test_output_without_batch_axis_is_rejected() {
        let data = vec![0.0; 4 * 2 * 3];
        let err = stems_from_output(&[4, 2, 3], &data, (4, 2, 3)).unwrap_err();
        assert!(matches!(err, PipelineError::Separation(_)));
    }

    #[test]
    fn test_output_with_short_data_is_rejected() {
        let err = stems_from_output(&[1, 4, 2, 3], &[0.0; 5], (4, 2, 3)).unwrap_err();
        assert!(err.to_string().contains("failed to reshape output"));
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_default_loader_reports_missing_backend() {
        let loader = default_loader(Path::new("./models"));
        let status = loader.probe(ModelId::HtDemucs);
        assert!(!status.available);
        assert!(status.message.contains("--features onnx"));

        let err = loader.load(ModelId::HtDemucs).err().unwrap();
        assert!(matches!(err, PipelineError::Separation(_)));
        assert!(err.to_string().contains("htdemucs"));
        assert!(err.to_string().contains("onnx"));
    }

    #[cfg(feature = "onnx")]
    #[test]
    fn test_onnx_probe_checks_model_file() {
        use crate::domain::request::ModelId;

        let dir = tempfile::tempdir().unwrap();
        let loader = default_loader(dir.path());

        let missing = loader.probe(ModelId::HtDemucs6s);
        assert!(!missing.available);
        assert!(missing.message.contains("htdemucs_6s.onnx"));

        std::fs::write(dir.path().join("htdemucs_6s.onnx"), b"onnx").unwrap();
        assert!(loader.probe(ModelId::HtDemucs6s).available);
        assert!(loader.load(ModelId::MdxExtraQ).is_err());
    }
}
