use super::error::RequestError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Subdirectory created beside the source when no output directory is given.
pub const DEFAULT_OUTPUT_SUBDIR: &str = "AudioStem-Pro_output";

/// Suffix appended to the source file stem for the written result.
pub const OUTPUT_SUFFIX: &str = "_background_music";

pub const OUTPUT_EXTENSION: &str = "wav";

/// Name of the category removed by the combiner.
pub const VOCALS: &str = "vocals";

const FOUR_STEMS: &[&str] = &["drums", "bass", "other", VOCALS];
const SIX_STEMS: &[&str] = &["drums", "bass", "other", VOCALS, "guitar", "piano"];

/// Pretrained separation model bags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelId {
    #[default]
    #[serde(rename = "htdemucs")]
    HtDemucs,
    #[serde(rename = "mdx_extra_q")]
    MdxExtraQ,
    #[serde(rename = "htdemucs_6s")]
    HtDemucs6s,
}

impl ModelId {
    pub const ALL: [ModelId; 3] = [ModelId::HtDemucs, ModelId::MdxExtraQ, ModelId::HtDemucs6s];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::HtDemucs => "htdemucs",
            ModelId::MdxExtraQ => "mdx_extra_q",
            ModelId::HtDemucs6s => "htdemucs_6s",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModelId::HtDemucs => "HTDemucs (default, 4 stems)",
            ModelId::MdxExtraQ => "MDX Extra Q (high quality, 4 stems)",
            ModelId::HtDemucs6s => "HTDemucs 6-stem (drums, bass, other, vocals, piano, guitar)",
        }
    }

    /// Output categories in model order.
    pub fn sources(&self) -> &'static [&'static str] {
        match self {
            ModelId::HtDemucs | ModelId::MdxExtraQ => FOUR_STEMS,
            ModelId::HtDemucs6s => SIX_STEMS,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        44100
    }

    pub fn channels(&self) -> usize {
        2
    }

    /// Inference window length in samples at the native rate.
    pub fn segment_samples(&self) -> usize {
        match self {
            // 7.8 s, the transformer models' training segment
            ModelId::HtDemucs | ModelId::HtDemucs6s => 343_980,
            // 44 s for the convolutional MDX bag
            ModelId::MdxExtraQ => 1_940_400,
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelId {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelId::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| RequestError::UnknownModel(s.to_string()))
    }
}

/// Number of randomized time-shift passes averaged during separation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quality(u32);

impl Quality {
    pub const FAST: Quality = Quality(1);
    pub const BALANCED: Quality = Quality(2);
    pub const HIGH: Quality = Quality(5);
    pub const BEST: Quality = Quality(10);

    pub const ALL: [Quality; 4] = [Quality::FAST, Quality::BALANCED, Quality::HIGH, Quality::BEST];

    pub fn shifts(&self) -> u32 {
        self.0
    }

    pub fn label(&self) -> &'static str {
        match self.0 {
            1 => "Fast (1 shift)",
            2 => "Balanced (2 shifts)",
            5 => "High (5 shifts)",
            _ => "Best (10 shifts)",
        }
    }
}

impl Default for Quality {
    fn default() -> Self {
        Quality::FAST
    }
}

impl TryFrom<u32> for Quality {
    type Error = RequestError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Quality::ALL
            .into_iter()
            .find(|q| q.0 == value)
            .ok_or_else(|| RequestError::UnsupportedQuality(value.to_string()))
    }
}

impl From<Quality> for u32 {
    fn from(q: Quality) -> Self {
        q.0
    }
}

impl FromStr for Quality {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u32 = s
            .trim()
            .parse()
            .map_err(|_| RequestError::UnsupportedQuality(s.to_string()))?;
        Quality::try_from(value)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable description of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub source: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub model: ModelId,
    pub quality: Quality,
}

impl RunRequest {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output_dir: None,
            model: ModelId::default(),
            quality: Quality::default(),
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_model(mut self, model: ModelId) -> Self {
        self.model = model;
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    /// Directory the result lands in.
    pub fn resolved_output_dir(&self) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => self
                .source
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(DEFAULT_OUTPUT_SUBDIR),
        }
    }

    pub fn output_file_name(&self) -> String {
        output_file_name(&self.source)
    }
}

/// `{source_stem}_background_music.wav`
pub fn output_file_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("output"));
    format!("{}{}.{}", stem, OUTPUT_SUFFIX, OUTPUT_EXTENSION)
}
