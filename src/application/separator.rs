//! Model invocation: normalization, randomized shift passes and overlapped
//! chunking around an opaque [`StemModel`].

use crate::domain::audio::{match_channels, Waveform};
use crate::domain::error::PipelineError;
use crate::domain::request::{ModelId, Quality};
use crate::domain::stems::StemSet;
use crate::ports::extractor::ToolStatus;
use crate::ports::model::{ModelLoader, StemModel};
use ndarray::{s, Array1, Array2, Array3, ArrayView2, Axis};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub const DEFAULT_SEPARATION_TIMEOUT: Duration = Duration::from_secs(7200);
pub const DEFAULT_OVERLAP: f32 = 0.25;
const NORM_EPSILON: f32 = 1e-8;
/// Maximum random shift, in seconds.
const MAX_SHIFT_SECS: f32 = 0.5;

/// Admission control in front of the compute device.
///
/// Waiters are served in arrival order. A permit is held for the whole
/// inference, including after a timed-out caller has given up on it, so
/// later callers time out while the device stays busy.
#[derive(Clone)]
pub struct DeviceGate {
    permits: Arc<Semaphore>,
}

impl DeviceGate {
    pub fn new(slots: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(slots.max(1))),
        }
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    async fn acquire(&self) -> Result<OwnedSemaphorePermit, PipelineError> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| PipelineError::Pipeline(format!("device gate closed: {}", e)))
    }
}

impl Default for DeviceGate {
    fn default() -> Self {
        Self::new(1)
    }
}

#[derive(Clone)]
pub struct Separator {
    loader: Arc<dyn ModelLoader>,
    gate: DeviceGate,
    timeout: Duration,
    overlap: f32,
}

impl Separator {
    pub fn new(loader: Arc<dyn ModelLoader>, gate: DeviceGate) -> Self {
        Self {
            loader,
            gate,
            timeout: DEFAULT_SEPARATION_TIMEOUT,
            overlap: DEFAULT_OVERLAP,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether `model` can be loaded by the configured backend.
    pub fn probe(&self, model: ModelId) -> ToolStatus {
        self.loader.probe(model)
    }

    /// Split `waveform` into the model's labeled categories.
    ///
    /// The timeout covers waiting for the device as well as inference.
    pub async fn separate(
        &self,
        waveform: Waveform,
        sample_rate: u32,
        model: ModelId,
        quality: Quality,
    ) -> Result<StemSet, PipelineError> {
        let loader = self.loader.clone();
        let overlap = self.overlap;
        let gate = self.gate.clone();

        let run = async move {
            let permit = gate.acquire().await?;
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let mut stem_model = loader.load(model)?;
                tracing::info!(
                    model = %model,
                    shifts = quality.shifts(),
                    device = %stem_model.device(),
                    "running separation"
                );
                separate_blocking(
                    stem_model.as_mut(),
                    waveform,
                    sample_rate,
                    quality.shifts(),
                    overlap,
                    &mut rand::rng(),
                )
            })
            .await?
        };

        match tokio::time::timeout(self.timeout, run).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    model = %model,
                    timeout = ?self.timeout,
                    busy = self.gate.available() == 0,
                    "separation timed out"
                );
                Err(PipelineError::Separation(format!(
                    "inference did not finish within {:?}",
                    self.timeout
                )))
            }
        }
    }
}

/// Runs on a blocking thread; everything here is synchronous.
pub fn separate_blocking<R: Rng>(
    model: &mut dyn StemModel,
    waveform: Waveform,
    sample_rate: u32,
    shifts: u32,
    overlap: f32,
    rng: &mut R,
) -> Result<StemSet, PipelineError> {
    if sample_rate != model.sample_rate() {
        return Err(PipelineError::Separation(format!(
            "audio is {} Hz but the model expects {} Hz",
            sample_rate,
            model.sample_rate()
        )));
    }
    let wav = match_channels(waveform, model.channels());
    if wav.len_of(Axis(1)) == 0 {
        return Err(PipelineError::Separation(String::from("extracted audio is empty")));
    }

    let (mean, std) = reference_stats(&wav);
    let normalized = wav.mapv(|v| (v - mean) / (std + NORM_EPSILON));

    let max_shift = (MAX_SHIFT_SECS * sample_rate as f32) as usize;
    let mut sources = apply_shifted(model, normalized.view(), shifts, max_shift, overlap, rng)?;
    sources.mapv_inplace(|v| v * std + mean);

    let count = sources.len_of(Axis(0));
    StemSet::new(model.sources().to_vec(), sources, sample_rate).ok_or_else(|| {
        PipelineError::Separation(format!(
            "model produced {} outputs for {} labels",
            count,
            model.sources().len()
        ))
    })
}

/// Mean and sample standard deviation of the channel-averaged signal.
fn reference_stats(wav: &Waveform) -> (f32, f32) {
    let Some(reference) = wav.mean_axis(Axis(0)) else {
        return (0.0, 0.0);
    };
    let n = reference.len();
    let mean = reference.sum() / n as f32;
    if n < 2 {
        return (mean, 0.0);
    }
    let var = reference.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / (n - 1) as f32;
    (mean, var.sqrt())
}

/// Average of `shifts` passes, each on a randomly offset copy of the mix.
fn apply_shifted<R: Rng>(
    model: &mut dyn StemModel,
    mix: ArrayView2<'_, f32>,
    shifts: u32,
    max_shift: usize,
    overlap: f32,
    rng: &mut R,
) -> Result<Array3<f32>, PipelineError> {
    if shifts == 0 || max_shift == 0 {
        return apply_chunked(model, mix, overlap);
    }

    let (channels, length) = mix.dim();
    let mut padded = Array2::<f32>::zeros((channels, length + 2 * max_shift));
    padded.slice_mut(s![.., max_shift..max_shift + length]).assign(&mix);

    let mut out: Option<Array3<f32>> = None;
    for _ in 0..shifts {
        let offset = rng.random_range(0..max_shift);
        let shifted = padded.slice(s![.., offset..length + max_shift]);
        let separated = apply_chunked(model, shifted, overlap)?;
        let start = max_shift - offset;
        let cropped = separated.slice(s![.., .., start..start + length]);
        match out.as_mut() {
            Some(acc) => *acc += &cropped,
            None => out = Some(cropped.to_owned()),
        }
    }

    let mut out = out.ok_or_else(|| PipelineError::Pipeline(String::from("no shift pass ran")))?;
    out /= shifts as f32;
    Ok(out)
}

/// Triangular blend window peaking at 1 in the middle of the segment.
pub fn triangular_weight(segment: usize) -> Array1<f32> {
    let half = segment / 2;
    let rising = (1..=half).map(|v| v as f32);
    let falling = (1..=segment - half).rev().map(|v| v as f32);
    let weight: Array1<f32> = rising.chain(falling).collect();
    let peak = weight.iter().cloned().fold(0.0f32, f32::max);
    if peak > 0.0 {
        weight / peak
    } else {
        weight
    }
}

/// Overlapped fixed-length inference blended back into one signal.
fn apply_chunked(
    model: &mut dyn StemModel,
    mix: ArrayView2<'_, f32>,
    overlap: f32,
) -> Result<Array3<f32>, PipelineError> {
    let (channels, length) = mix.dim();
    let segment = model.segment_samples().max(1);
    let stride = (((1.0 - overlap) * segment as f32) as usize).max(1);
    let sources = model.sources().len();
    let weight = triangular_weight(segment);

    let mut out = Array3::<f32>::zeros((sources, channels, length));
    let mut sum_weight = Array1::<f32>::zeros(length);
    let mut window = Array2::<f32>::zeros((channels, segment));

    for offset in (0..length).step_by(stride) {
        let chunk_len = segment.min(length - offset);
        window.fill(0.0);
        window
            .slice_mut(s![.., ..chunk_len])
            .assign(&mix.slice(s![.., offset..offset + chunk_len]));

        let chunk_out = model.infer(window.view())?;
        if chunk_out.dim() != (sources, channels, segment) {
            return Err(PipelineError::Separation(format!(
                "model returned shape {:?}, expected {:?}",
                chunk_out.dim(),
                (sources, channels, segment)
            )));
        }

        let w = weight.slice(s![..chunk_len]);
        let weighted = &chunk_out.slice(s![.., .., ..chunk_len]) * &w;
        let mut target = out.slice_mut(s![.., .., offset..offset + chunk_len]);
        target += &weighted;
        let mut total = sum_weight.slice_mut(s![offset..offset + chunk_len]);
        total += &w;
    }

    out /= &sum_weight;
    Ok(out)
}
