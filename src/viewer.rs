//! Preview window for annotated frames.

use std::time::Duration;

use anyhow::{Result, anyhow};
use minifb::{Key, Window, WindowOptions};

use crate::{
    pipeline::FrameSink,
    types::{Frame, Pose},
};

const UPDATE_INTERVAL: Duration = Duration::from_micros(16_600);

/// A minifb window, created lazily on the first frame.
///
/// Esc or Q closes it. For still images `finish` keeps the last frame on
/// screen until the window is closed.
pub struct Viewer {
    title: String,
    window: Option<Window>,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
    hold_last_frame: bool,
}

impl Viewer {
    pub fn new(title: &str, hold_last_frame: bool) -> Self {
        Self {
            title: title.to_string(),
            window: None,
            buffer: Vec::new(),
            width: 0,
            height: 0,
            hold_last_frame,
        }
    }

    fn ensure_window(&mut self, width: usize, height: usize) -> Result<&mut Window> {
        if self.window.is_none() {
            let mut window = Window::new(
                &self.title,
                width,
                height,
                WindowOptions {
                    resize: true,
                    ..WindowOptions::default()
                },
            )
            .map_err(|e| anyhow!("failed to create window: {e}"))?;
            window.limit_update_rate(Some(UPDATE_INTERVAL));
            self.window = Some(window);
        }
        self.window
            .as_mut()
            .ok_or_else(|| anyhow!("preview window missing"))
    }

    fn is_closed(window: &Window) -> bool {
        !window.is_open() || window.is_key_down(Key::Escape) || window.is_key_down(Key::Q)
    }
}

/// Packs RGB bytes as minifb's `0x00RRGGBB`.
fn pack_rgb(rgb: &[u8], out: &mut Vec<u32>) {
    out.clear();
    out.extend(rgb.chunks_exact(3).map(|px| {
        (u32::from(px[0]) << 16) | (u32::from(px[1]) << 8) | u32::from(px[2])
    }));
}

impl FrameSink for Viewer {
    fn present(&mut self, frame: &Frame, _pose: &Pose) -> Result<bool> {
        let (width, height) = (frame.width as usize, frame.height as usize);
        pack_rgb(&frame.rgb, &mut self.buffer);
        self.width = width;
        self.height = height;

        let buffer = std::mem::take(&mut self.buffer);
        let window = self.ensure_window(width, height)?;
        let closed = Self::is_closed(window);
        let updated = if closed {
            Ok(())
        } else {
            window
                .update_with_buffer(&buffer, width, height)
                .map_err(|e| anyhow!("failed to update window: {e}"))
        };
        self.buffer = buffer;
        updated?;
        Ok(!closed)
    }

    fn finish(&mut self) -> Result<()> {
        if !self.hold_last_frame || self.buffer.is_empty() {
            return Ok(());
        }
        let Some(window) = self.window.as_mut() else {
            return Ok(());
        };
        log::info!("press Esc or Q to close the preview");
        while !Self::is_closed(window) {
            window
                .update_with_buffer(&self.buffer, self.width, self.height)
                .map_err(|e| anyhow!("failed to update window: {e}"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_rgb_into_u32() {
        let mut out = vec![7];
        pack_rgb(&[0x12, 0x34, 0x56, 255, 0, 1], &mut out);
        assert_eq!(out, vec![0x0012_3456, 0x00ff_0001]);
    }
}
