//! Ports - Trait seams between the pipeline and the outside world.

pub mod command;
pub mod extractor;
pub mod model;
pub mod repository;
