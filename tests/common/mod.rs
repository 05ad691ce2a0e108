#![allow(dead_code)]

use async_trait::async_trait;
use audiostem::application::orchestrator::Orchestrator;
use audiostem::application::separator::{DeviceGate, Separator};
use audiostem::domain::error::PipelineError;
use audiostem::ports::extractor::{AudioExtractor, ToolStatus};
use audiostem::ports::model::{Device, ModelLoader, StemModel};
use audiostem::ModelId;
use hound::{SampleFormat, WavSpec, WavWriter};
use ndarray::{Array3, ArrayView2, Axis};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const TONE_SAMPLES: usize = 4410;

pub fn tone(i: usize) -> f32 {
    (i as f32 * 2.0 * std::f32::consts::PI * 440.0 / 44100.0).sin() * 0.25
}

/// Stands in for ffmpeg: writes a mono 440 Hz tone.
pub struct ToneExtractor;

#[async_trait]
impl AudioExtractor for ToneExtractor {
    async fn extract(&self, source: &Path, dest: &Path) -> Result<(), PipelineError> {
        if !source.exists() {
            return Err(PipelineError::NotFound(source.to_path_buf()));
        }
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(dest, spec).map_err(|e| PipelineError::Extraction(e.to_string()))?;
        for i in 0..TONE_SAMPLES {
            writer
                .write_sample((tone(i) * i16::MAX as f32) as i16)
                .map_err(|e| PipelineError::Extraction(e.to_string()))?;
        }
        writer.finalize().map_err(|e| PipelineError::Extraction(e.to_string()))
    }

    async fn probe(&self) -> ToolStatus {
        ToolStatus::ok()
    }
}

/// How the fake model distributes its input over categories.
#[derive(Clone, Copy)]
pub enum Split {
    /// Everything is "vocals", the rest is silent.
    AllVocals,
    /// Three non-vocal categories share the input equally.
    NoVocals,
}

pub struct FakeModel {
    split: Split,
    sources: Vec<String>,
}

impl StemModel for FakeModel {
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
        8192
    }
    fn device(&self) -> Device {
        Device::Cpu
    }
    fn infer(&mut self, segment: ArrayView2<'_, f32>) -> Result<Array3<f32>, PipelineError> {
        let (channels, len) = segment.dim();
        let mut out = Array3::<f32>::zeros((self.sources.len(), channels, len));
        match self.split {
            Split::AllVocals => {
                let vocals = self.sources.iter().position(|s| s == "vocals").unwrap_or(0);
                out.index_axis_mut(Axis(0), vocals).assign(&segment);
            }
            Split::NoVocals => {
                for mut stem in out.outer_iter_mut() {
                    stem.assign(&segment.mapv(|v| v / 3.0));
                }
            }
        }
        Ok(out)
    }
}

pub struct FakeLoader {
    pub split: Split,
    pub loads: AtomicUsize,
}

impl FakeLoader {
    pub fn new(split: Split) -> Arc<Self> {
        Arc::new(Self {
            split,
            loads: AtomicUsize::new(0),
        })
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ModelLoader for FakeLoader {
    fn load(&self, model: ModelId) -> Result<Box<dyn StemModel>, PipelineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let sources = match self.split {
            Split::AllVocals => model.sources().iter().map(|s| s.to_string()).collect(),
            Split::NoVocals => vec!["drums".into(), "bass".into(), "other".into()],
        };
        Ok(Box::new(FakeModel {
            split: self.split,
            sources,
        }))
    }
}

/// A backend whose model files were never installed.
pub struct MissingModelLoader;

impl ModelLoader for MissingModelLoader {
    fn load(&self, model: ModelId) -> Result<Box<dyn StemModel>, PipelineError> {
        Err(PipelineError::Separation(format!("model file not found: models/{}.onnx", model)))
    }

    fn probe(&self, model: ModelId) -> ToolStatus {
        ToolStatus::unavailable(format!("model file not found: models/{}.onnx", model))
    }
}

pub fn orchestrator(
    extractor: Arc<dyn AudioExtractor>,
    loader: Arc<dyn ModelLoader>,
    workspaces: &Path,
) -> Orchestrator {
    Orchestrator::new(extractor, Separator::new(loader, DeviceGate::default()))
        .with_workspace_root(workspaces)
}

pub fn write_video(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"\x00\x00\x00\x18ftypmp42").unwrap();
    path
}
