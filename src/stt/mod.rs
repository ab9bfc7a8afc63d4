//! Speech-to-text backends.

pub mod google;
pub mod recognizer;
