//! WAV reading and clipping-safe writing.

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use ndarray::{Array2, ArrayView2, Axis};
use std::path::Path;

/// Planar audio, shape `[channels, samples]`.
pub type Waveform = Array2<f32>;

/// Read a WAV file into planar `f32` samples in [-1, 1].
pub fn read_wav(path: &Path) -> Result<(Waveform, u32), hound::Error> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<Result<_, _>>()?
        }
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
    };

    let frames = interleaved.len() / channels;
    let mut waveform = Array2::<f32>::zeros((channels, frames));
    for (i, frame) in interleaved.chunks_exact(channels).enumerate() {
        for (ch, &sample) in frame.iter().enumerate() {
            waveform[[ch, i]] = sample;
        }
    }

    Ok((waveform, spec.sample_rate))
}

/// Scale the whole signal down when its peak exceeds full scale.
///
/// Returns the gain that was applied (1.0 when nothing changed).
pub fn rescale_to_full_scale(waveform: &mut Waveform) -> f32 {
    let peak = waveform.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak <= 1.0 || !peak.is_finite() {
        return 1.0;
    }
    let gain = 1.0 / peak;
    waveform.mapv_inplace(|s| s * gain);
    gain
}

/// Number of NaN or infinite samples.
pub fn count_non_finite(waveform: &Waveform) -> usize {
    waveform.iter().filter(|s| !s.is_finite()).count()
}

/// Write 16-bit PCM, rescaling instead of hard-clipping.
pub fn write_wav_rescaled(
    path: &Path,
    mut waveform: Waveform,
    sample_rate: u32,
) -> Result<(), hound::Error> {
    let gain = rescale_to_full_scale(&mut waveform);
    if gain < 1.0 {
        tracing::info!(gain, "rescaled output to avoid clipping");
    }
    write_pcm16(path, waveform.view(), sample_rate)
}

fn write_pcm16(path: &Path, waveform: ArrayView2<f32>, sample_rate: u32) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels: waveform.len_of(Axis(0)) as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for frame in waveform.axis_iter(Axis(1)) {
        for &sample in frame.iter() {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            writer.write_sample(value)?;
        }
    }
    writer.finalize()
}

/// Duplicate or fold channels so the waveform has exactly `channels` rows.
pub fn match_channels(waveform: Waveform, channels: usize) -> Waveform {
    let current = waveform.len_of(Axis(0));
    if current == channels {
        return waveform;
    }
    if current == 1 {
        let row = waveform.row(0);
        let mut out = Array2::<f32>::zeros((channels, row.len()));
        for mut target in out.rows_mut() {
            target.assign(&row);
        }
        return out;
    }
    // Fold to mono, then spread.
    let mono = waveform
        .mean_axis(Axis(0))
        .map(|m| m.insert_axis(Axis(0)))
        .unwrap_or_else(|| Array2::zeros((1, 0)));
    match_channels(mono, channels)
}
