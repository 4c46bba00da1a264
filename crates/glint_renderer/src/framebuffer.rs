//! Shared pixel buffer written by render workers.

use std::sync::atomic::{AtomicU32, Ordering};

use glint_math::Color;

/// Clamp a linear color to 8-bit RGBA. No tone mapping or gamma.
pub fn color_to_rgba(color: Color) -> [u8; 4] {
    let to_byte = |c: f32| (255.0 * c.clamp(0.0, 1.0)) as u8;
    [to_byte(color.x), to_byte(color.y), to_byte(color.z), 255]
}

/// `width x height` image of unclamped linear radiance.
///
/// Each channel is an atomic `f32` bit pattern so workers can fill disjoint
/// rows through a shared reference while the display thread reads a
/// snapshot.
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<[AtomicU32; 3]>,
}

impl FrameBuffer {
    /// Create a new buffer filled with black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: (0..width as usize * height as usize)
                .map(|_| [AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0)])
                .collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Store `color` at `(x, y)` as is.
    pub fn set(&self, x: u32, y: u32, color: Color) {
        let pixel = &self.pixels[self.index(x, y)];
        for (channel, value) in pixel.iter().zip(color.to_array()) {
            channel.store(value.to_bits(), Ordering::Relaxed);
        }
    }

    /// Linear color stored at `(x, y)`.
    pub fn color(&self, x: u32, y: u32) -> Color {
        load(&self.pixels[self.index(x, y)])
    }

    /// Display value at `(x, y)`, packed as `0x00RRGGBB`.
    pub fn get(&self, x: u32, y: u32) -> u32 {
        pack(self.color(x, y))
    }

    /// Display copy of every pixel, row-major `0x00RRGGBB`.
    pub fn snapshot(&self) -> Vec<u32> {
        self.pixels.iter().map(|p| pack(load(p))).collect()
    }

    /// Convert to RGBA bytes (for saving).
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 4);
        for pixel in &self.pixels {
            bytes.extend_from_slice(&color_to_rgba(load(pixel)));
        }
        bytes
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

fn load(pixel: &[AtomicU32; 3]) -> Color {
    let [r, g, b] = pixel.each_ref().map(|c| f32::from_bits(c.load(Ordering::Relaxed)));
    Color::new(r, g, b)
}

fn pack(color: Color) -> u32 {
    let [r, g, b, _] = color_to_rgba(color);
    (r as u32) << 16 | (g as u32) << 8 | b as u32
}
