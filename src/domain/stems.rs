//! Labeled separation output and the background mix built from it.

use super::audio::Waveform;
use super::request::VOCALS;
use ndarray::{Array2, Array3, ArrayView2, Axis};

/// Per-category waveforms, shape `[sources, channels, samples]`.
#[derive(Debug, Clone, PartialEq)]
pub struct StemSet {
    names: Vec<String>,
    data: Array3<f32>,
    sample_rate: u32,
}

impl StemSet {
    /// Returns `None` when the label count does not match the source axis.
    pub fn new(names: Vec<String>, data: Array3<f32>, sample_rate: u32) -> Option<Self> {
        if names.len() != data.len_of(Axis(0)) {
            return None;
        }
        Some(Self {
            names,
            data,
            sample_rate,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn samples(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<ArrayView2<'_, f32>> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.data.index_axis(Axis(0), i))
    }

    pub fn has_vocals(&self) -> bool {
        self.names.iter().any(|n| n == VOCALS)
    }

    /// Sum of every category except vocals, or of all categories when the
    /// model has no vocal category.
    pub fn background(&self) -> Waveform {
        let mut mix = Array2::<f32>::zeros((self.channels(), self.samples()));
        for (name, stem) in self.names.iter().zip(self.data.outer_iter()) {
            if name == VOCALS {
                continue;
            }
            mix += &stem;
        }
        mix
    }
}
