use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Checkpoints of a run, in the only order they may occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Started,
    Extracted,
    Separating,
    Separated,
    Combining,
    Done,
}

impl Stage {
    pub const SEQUENCE: [Stage; 6] = [
        Stage::Started,
        Stage::Extracted,
        Stage::Separating,
        Stage::Separated,
        Stage::Combining,
        Stage::Done,
    ];

    pub fn percent(&self) -> u8 {
        match self {
            Stage::Started => 0,
            Stage::Extracted => 25,
            Stage::Separating => 35,
            Stage::Separated => 85,
            Stage::Combining => 90,
            Stage::Done => 100,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Started | Stage::Extracted => "Extracting audio from video…",
            Stage::Separating | Stage::Separated => "Running AI separation (Demucs)…",
            Stage::Combining => "Combining background stems…",
            Stage::Done => "Done",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub label: String,
    pub percent: u8,
}

impl From<Stage> for ProgressEvent {
    fn from(stage: Stage) -> Self {
        Self {
            stage,
            label: stage.label().to_string(),
            percent: stage.percent(),
        }
    }
}

pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;
pub type ProgressReceiver = mpsc::UnboundedReceiver<ProgressEvent>;

pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Emits checkpoints for one run to at most one subscriber.
///
/// Stages must be reported in [`Stage::SEQUENCE`] order; a stage at or before
/// the last one emitted is dropped so the stream stays strictly increasing.
pub struct ProgressReporter {
    sender: Option<ProgressSender>,
    last: Option<Stage>,
}

impl ProgressReporter {
    pub fn new(sender: Option<ProgressSender>) -> Self {
        Self { sender, last: None }
    }

    pub fn report(&mut self, stage: Stage) {
        if self.last.is_some_and(|last| stage <= last) {
            tracing::warn!(?stage, last = ?self.last, "ignoring out-of-order progress stage");
            return;
        }
        self.last = Some(stage);
        tracing::debug!(percent = stage.percent(), "{}", stage.label());

        if let Some(sender) = &self.sender {
            // A subscriber that went away just stops receiving.
            if sender.send(ProgressEvent::from(stage)).is_err() {
                self.sender = None;
            }
        }
    }

    pub fn last(&self) -> Option<Stage> {
        self.last
    }
}
