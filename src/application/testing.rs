//! Fakes shared by the application tests.

use crate::domain::error::PipelineError;
use crate::domain::request::ModelId;
use crate::ports::extractor::{AudioExtractor, ToolStatus};
use crate::ports::model::{Device, ModelLoader, StemModel};
use async_trait::async_trait;
use hound::{SampleFormat, WavSpec, WavWriter};
use ndarray::{Array3, ArrayView2, Axis};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Writes a short mono tone, or fails with canned diagnostics.
pub struct ToneExtractor {
    failure: Option<String>,
    pub seen: Mutex<Vec<PathBuf>>,
}

impl ToneExtractor {
    pub fn ok() -> Self {
        Self { failure: None, seen: Mutex::new(Vec::new()) }
    }
    pub fn failing(msg: &str) -> Self {
        Self { failure: Some(msg.to_string()), seen: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl AudioExtractor for ToneExtractor {
    async fn extract(&self, source: &Path, dest: &Path) -> Result<(), PipelineError> {
        if !source.exists() {
            return Err(PipelineError::NotFound(source.to_path_buf()));
        }
        self.seen.lock().unwrap().push(dest.to_path_buf());
        if let Some(msg) = &self.failure {
            return Err(PipelineError::Extraction(format!("FFmpeg failed to extract audio: {}", msg)));
        }
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(dest, spec).unwrap();
        for i in 0..2000 {
            let v = ((i as f32 * 0.05).sin() * 8000.0) as i16;
            writer.write_sample(v).unwrap();
        }
        writer.finalize().unwrap();
        Ok(())
    }

    async fn probe(&self) -> ToolStatus {
        ToolStatus::ok()
    }
}

/// Splits the input evenly across four categories.
pub struct QuarterModel {
    sources: Vec<String>,
    poisoned: bool,
}

impl StemModel for QuarterModel {
    fn sources(&self) -> &[String] {
        &self.sources
    }
    fn sample_rate(&self) -> u32 {
        44100
    }
    fn channels(&self) -> usize {
        2
    }
    fn segment_samples(&self) -> usize {
        4096
    }
    fn device(&self) -> Device {
        Device::Cpu
    }
    fn infer(&mut self, segment: ArrayView2<'_, f32>) -> Result<Array3<f32>, PipelineError> {
        let gain = if self.poisoned { f32::NAN } else { 0.25 };
        let quarter = segment.mapv(|v| v * gain).insert_axis(Axis(0));
        let views = vec![quarter.view(); self.sources.len()];
        Ok(ndarray::concatenate(Axis(0), &views).unwrap())
    }
}

pub struct QuarterLoader;

impl ModelLoader for QuarterLoader {
    fn load(&self, model: ModelId) -> Result<Box<dyn StemModel>, PipelineError> {
        Ok(Box::new(QuarterModel {
            sources: model.sources().iter().map(|s| s.to_string()).collect(),
            poisoned: false,
        }))
    }
}

/// Like [`QuarterLoader`] but every output sample is NaN.
pub struct NanLoader;

impl ModelLoader for NanLoader {
    fn load(&self, model: ModelId) -> Result<Box<dyn StemModel>, PipelineError> {
        Ok(Box::new(QuarterModel {
            sources: model.sources().iter().map(|s| s.to_string()).collect(),
            poisoned: true,
        }))
    }
}

/// Reports every model as missing.
pub struct OfflineLoader;

impl ModelLoader for OfflineLoader {
    fn load(&self, model: ModelId) -> Result<Box<dyn StemModel>, PipelineError> {
        Err(PipelineError::Separation(format!("{}.onnx was never loaded", model)))
    }

    fn probe(&self, model: ModelId) -> ToolStatus {
        ToolStatus::unavailable(format!("model file not found: models/{}.onnx", model))
    }
}

pub struct FailingLoader;

impl ModelLoader for FailingLoader {
    fn load(&self, _model: ModelId) -> Result<Box<dyn StemModel>, PipelineError> {
        Err(PipelineError::Separation("CUDA out of memory".into()))
    }
}
