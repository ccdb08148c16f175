use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use video_rs::decode::Decoder;

use crate::types::Frame;

/// Frames decoded lazily from a video file through ffmpeg.
///
/// The stream ends at end of file or on the first decode error. The decoder
/// is released when the source is dropped.
pub struct VideoSource {
    path: PathBuf,
    decoder: Option<Decoder>,
    frames_read: usize,
}

impl VideoSource {
    pub fn open(path: &Path) -> Result<Self> {
        video_rs::init().map_err(|err| anyhow!("failed to initialise ffmpeg: {err}"))?;
        let decoder = Decoder::new(path)
            .with_context(|| format!("failed to open video {}", path.display()))?;
        let (width, height) = decoder.size();
        log::info!(
            "video {} opened ({}x{} @ {:.2} fps)",
            path.display(),
            width,
            height,
            decoder.frame_rate()
        );

        Ok(Self {
            path: path.to_path_buf(),
            decoder: Some(decoder),
            frames_read: 0,
        })
    }

    fn close(&mut self) {
        if self.decoder.take().is_some() {
            log::info!(
                "video {} released after {} frame(s)",
                self.path.display(),
                self.frames_read
            );
        }
    }
}

impl Iterator for VideoSource {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        let decoder = self.decoder.as_mut()?;
        let frame = match decoder.decode() {
            Ok((_ts, frame)) => frame,
            Err(err) => {
                log::debug!("video decode stopped: {err}");
                self.close();
                return None;
            }
        };

        match video_frame_to_frame(&frame) {
            Ok(frame) => {
                self.frames_read += 1;
                Some(frame)
            }
            Err(err) => {
                log::warn!("failed to convert video frame, ending stream: {err:?}");
                self.close();
                None
            }
        }
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn video_frame_to_frame(arr: &video_rs::Frame) -> Result<Frame> {
    let shape = arr.shape();
    if shape.len() != 3 || shape[2] != 3 {
        return Err(anyhow!("unexpected video frame shape {:?}", shape));
    }
    let height = u32::try_from(shape[0]).context("video frame height exceeds u32::MAX")?;
    let width = u32::try_from(shape[1]).context("video frame width exceeds u32::MAX")?;

    let rgb = match arr.as_slice() {
        Some(slice) => slice.to_vec(),
        None => arr.iter().copied().collect(),
    };

    Frame::new(rgb, width, height)
}
