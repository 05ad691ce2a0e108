//! AudioStem - Background music extraction from video
//!
//! Hexagonal Architecture:
//! - domain/: Pure values and algorithms (requests, progress, stems, audio, jobs)
//! - ports/: Trait definitions (command runner, extractor, model, job repository)
//! - adapters/: Concrete implementations (ffmpeg, model backends, memory store, HTTP)
//! - application/: Services (orchestrator, separator, job service, run worker)
//! - config: Environment configuration
//!
//! # Features
//! - `onnx`: ONNX Runtime separation backend

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports for convenience
pub use application::orchestrator::Orchestrator;
pub use config::Config;
pub use domain::error::{ErrorKind, PipelineError, RequestError};
pub use domain::progress::{ProgressEvent, Stage};
pub use domain::request::{ModelId, Quality, RunRequest};
