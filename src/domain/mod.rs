//! Domain layer - Pure values and algorithms.

pub mod audio;
pub mod error;
pub mod jobs;
pub mod progress;
pub mod request;
pub mod stems;
