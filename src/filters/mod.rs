//! Denoise and sharpen filters
//!
//! The pipeline always runs denoise before sharpen and always starts from the
//! image it is given; it never holds state between runs.

pub mod pipeline;
pub mod steps;

pub use pipeline::{FilterParams, Pipeline, StepTiming};
