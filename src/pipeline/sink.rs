use anyhow::Result;

use crate::types::{Frame, Pose};

/// Receives annotated frames as they are produced.
pub trait FrameSink {
    /// Returns `false` once the sink wants no more frames.
    fn present(&mut self, frame: &Frame, pose: &Pose) -> Result<bool>;

    /// Called once after the last frame.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn present(&mut self, frame: &Frame, pose: &Pose) -> Result<bool> {
        (**self).present(frame, pose)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// Headless sink: logs each frame's detected keypoints.
#[derive(Debug, Default)]
pub struct KeypointLogger {
    frames: usize,
}

impl KeypointLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> usize {
        self.frames
    }
}

pub fn describe_pose(pose: &Pose) -> String {
    if pose.is_empty() {
        return "no keypoints".to_string();
    }
    pose.detected()
        .map(|(part, kp)| format!("{part}=({}, {}) {:.2}", kp.x, kp.y, kp.confidence))
        .collect::<Vec<_>>()
        .join(", ")
}

impl FrameSink for KeypointLogger {
    fn present(&mut self, frame: &Frame, pose: &Pose) -> Result<bool> {
        log::info!(
            "frame {} ({}x{}): {} keypoint(s): {}",
            self.frames,
            frame.width,
            frame.height,
            pose.detected_count(),
            describe_pose(pose)
        );
        self.frames += 1;
        Ok(true)
    }

    fn finish(&mut self) -> Result<()> {
        log::info!("logged {} frame(s)", self.frames);
        Ok(())
    }
}
