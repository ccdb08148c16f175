use anyhow::{Result, anyhow};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{
        ApiBackend, CameraIndex, CameraInfo, FrameFormat, RequestedFormat, RequestedFormatType,
    },
};

use super::rgb_converter;
use crate::types::Frame;

// Prefer pixel formats that are widely supported on macOS (the built-in cameras
// often reject YUYV even though Nokhwa reports it).
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

fn requested_formats() -> [RequestedFormat<'static>; 4] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestResolution,
            PREFERRED_PIXEL_FORMATS,
        ),
        // Fall back to any format Nokhwa can decode, but prefer higher FPS to
        // avoid very low default rates (e.g. 15 FPS) that some drivers reject.
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: CameraIndex,
    pub label: String,
}

pub fn available_cameras() -> Result<Vec<CameraDevice>> {
    let cameras = query(ApiBackend::Auto)?;
    Ok(cameras
        .into_iter()
        .map(|info| CameraDevice {
            index: info.index().clone(),
            label: format_camera_label(&info),
        })
        .collect())
}

fn format_camera_label(info: &CameraInfo) -> String {
    info.human_name()
}

fn build_camera(index: CameraIndex) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats() {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

/// Live frames from a capture device, pulled on demand.
///
/// The stream ends on the first failed read. The device is closed when the
/// source is dropped.
pub struct CameraSource {
    camera: Option<Camera>,
    frames_read: usize,
}

impl CameraSource {
    pub fn open(index: u32) -> Result<Self> {
        let camera = build_camera(CameraIndex::Index(index))?;
        log::info!(
            "camera {index} opened ({}, {:?})",
            camera.info().human_name(),
            camera.camera_format()
        );
        Ok(Self {
            camera: Some(camera),
            frames_read: 0,
        })
    }

    /// A source that never yields, used when no device could be opened.
    pub fn unavailable() -> Self {
        Self {
            camera: None,
            frames_read: 0,
        }
    }

    fn close(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(err) = camera.stop_stream() {
                log::warn!("failed to stop camera stream: {err:?}");
            }
            log::info!("camera released after {} frame(s)", self.frames_read);
        }
    }
}

impl Iterator for CameraSource {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        loop {
            let camera = self.camera.as_mut()?;
            let buffer = match camera.frame() {
                Ok(buffer) => buffer,
                Err(err) => {
                    log::warn!("camera frame read failed, ending stream: {err:?}");
                    self.close();
                    return None;
                }
            };

            match rgb_converter::convert_camera_frame(&buffer) {
                Ok(frame) => {
                    self.frames_read += 1;
                    return Some(frame);
                }
                Err(err) => {
                    log::warn!("failed to decode camera frame {err:?}");
                }
            }
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.close();
    }
}
