//! Audio capture and normalization.

pub mod capture;
#[cfg(feature = "cpal-audio")]
pub mod cpal_source;
pub mod normalizer;
