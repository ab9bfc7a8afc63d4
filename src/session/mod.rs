//! Session lifecycle, chunking, and pipeline types.

pub mod chunk_buffer;
pub mod controller;
pub mod frame;
