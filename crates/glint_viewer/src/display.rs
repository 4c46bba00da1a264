//! Framebuffer window that forwards keyboard and mouse input to an
//! [`InputListener`].

use anyhow::{Context, Result};
use glint_renderer::{InputListener, Key, Mouse};
use minifb::{KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

pub struct Display {
    window: Window,
    width: usize,
    height: usize,
    mouse: Mouse,
}

impl Display {
    pub fn open(title: &str, width: u32, height: u32) -> Result<Self> {
        let (width, height) = (width as usize, height as usize);
        let window = Window::new(title, width, height, WindowOptions::default())
            .with_context(|| format!("failed to open {}x{} window", width, height))?;

        Ok(Self {
            window,
            width,
            height,
            mouse: Mouse::default(),
        })
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(minifb::Key::Escape)
    }

    pub fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }

    /// Present a `0x00RRGGBB` buffer and pump window events.
    pub fn update(&mut self, pixels: &[u32]) -> Result<()> {
        self.window
            .update_with_buffer(pixels, self.width, self.height)
            .context("failed to present frame")
    }

    /// Deliver input gathered by the last `update` to `listener`.
    pub fn poll(&mut self, listener: &mut dyn InputListener) {
        for key in self.window.get_keys_pressed(KeyRepeat::No) {
            listener.on_key_pressed(translate_key(key));
        }

        let left = self.window.get_mouse_down(MouseButton::Left);
        let (x, y) = self
            .window
            .get_mouse_pos(MouseMode::Pass)
            .unwrap_or((self.mouse.x, self.mouse.y));
        let current = Mouse { x, y, left };

        if left && !self.mouse.left {
            listener.on_mouse_button_down(current);
        } else if (x, y) != (self.mouse.x, self.mouse.y) {
            listener.on_mouse_move(current);
        }
        self.mouse = current;
    }
}

fn translate_key(key: minifb::Key) -> Key {
    match key {
        minifb::Key::W => Key::W,
        minifb::Key::S => Key::S,
        _ => Key::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_key() {
        assert_eq!(translate_key(minifb::Key::W), Key::W);
        assert_eq!(translate_key(minifb::Key::S), Key::S);
        assert_eq!(translate_key(minifb::Key::Space), Key::Other);
    }
}
