use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::Path;

use super::color::Rgba8;

/// A CPU pixel buffer sized in device pixels.
///
/// Reallocating the buffer clears it, so callers go through
/// [`Surface::resize_if_needed`] and only pay for a clear when the size
/// actually changes.
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<Rgba8>,
    generation: u64,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgba8::default(); width as usize * height as usize],
            generation: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Number of times the backing buffer has been reallocated.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Reallocates the backing buffer when `width`/`height` differ from the
    /// current size. Returns whether a reallocation (and therefore a clear)
    /// happened.
    pub fn resize_if_needed(&mut self, width: u32, height: u32) -> bool {
        if self.width == width && self.height == height {
            return false;
        }
        log::debug!(
            "Surface resize {}x{} -> {}x{}",
            self.width,
            self.height,
            width,
            height
        );
        self.width = width;
        self.height = height;
        self.pixels = vec![Rgba8::default(); width as usize * height as usize];
        self.generation += 1;
        true
    }

    pub fn fill(&mut self, color: Rgba8) {
        self.pixels.par_iter_mut().for_each(|px| *px = color);
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }

    pub fn pixels(&self) -> &[Rgba8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [Rgba8] {
        &mut self.pixels
    }

    /// Raw RGBA bytes, row-major, no padding.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        image::save_buffer(
            path,
            self.as_bytes(),
            self.width,
            self.height,
            image::ExtendedColorType::Rgba8,
        )
        .with_context(|| format!("Failed to write snapshot: {}", path.display()))?;
        log::info!("Snapshot written: {} ({}x{})", path.display(), self.width, self.height);
        Ok(())
    }
}
