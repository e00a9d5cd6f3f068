//! Spectral audio visualizer: a per-refresh analysis loop feeding seven
//! visual styles, painted onto a display surface and a fixed-resolution
//! capture surface that is encoded to video.

pub mod audio;
pub mod capture;
pub mod config;
pub mod encode;
pub mod error;
pub mod palette;
pub mod render;
pub mod schedule;
pub mod session;
pub mod visual;

pub use error::{Result, VisualizerError};
