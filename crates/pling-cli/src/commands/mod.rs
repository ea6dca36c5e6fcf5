//! CLI command implementations.

pub mod bench;
pub mod common;
pub mod engines;
pub mod patch;
pub mod play;
pub mod ports;
pub mod render;
