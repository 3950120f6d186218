//! Utility modules shared across the pipeline.

pub mod gzip;
pub mod minify;
pub mod path;
pub mod token;
