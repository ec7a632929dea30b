//! Individual filter steps

pub mod denoise;
pub mod sharpen;
