//! Input sources: still images, video files and live cameras.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::types::Frame;

#[cfg(feature = "camera-nokhwa")]
use super::camera::CameraSource;
#[cfg(feature = "video")]
use super::video::VideoSource;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm", "m4v", "mpeg", "mpg"];

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to open video {path}: {reason}")]
    Video { path: PathBuf, reason: String },
    #[error("{0} support was not compiled in (enable the `{1}` feature)")]
    FeatureDisabled(&'static str, &'static str),
}

/// Where frames come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    Image(PathBuf),
    Video(PathBuf),
    Camera(u32),
}

impl Source {
    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Video(_) | Self::Camera(_))
    }
}

impl From<&str> for Source {
    fn from(s: &str) -> Self {
        if let Ok(index) = s.parse::<u32>() {
            return Self::Camera(index);
        }

        let path = PathBuf::from(s);
        if let Some(ext) = path.extension() {
            let ext = ext.to_string_lossy().to_lowercase();
            if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
                return Self::Video(path);
            }
        }

        Self::Image(path)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image(path) => write!(f, "image {}", path.display()),
            Self::Video(path) => write!(f, "video {}", path.display()),
            Self::Camera(index) => write!(f, "camera {index}"),
        }
    }
}

/// An opened source, yielding frames one at a time.
///
/// Capture handles live inside the variants and are released on drop.
pub enum FrameSource {
    Image(Option<Frame>),
    #[cfg(feature = "video")]
    Video(VideoSource),
    #[cfg(feature = "camera-nokhwa")]
    Camera(CameraSource),
}

impl FrameSource {
    /// Opens `source`. An unreadable image or video is an error; a camera
    /// that cannot be opened becomes an empty stream.
    pub fn open(source: &Source) -> Result<Self, SourceError> {
        match source {
            Source::Image(path) => {
                let image = image::open(path).map_err(|source| SourceError::Image {
                    path: path.clone(),
                    source,
                })?;
                Ok(Self::Image(Some(Frame::from(image))))
            }
            Source::Video(path) => open_video(path),
            Source::Camera(index) => open_camera(*index),
        }
    }

    pub fn from_frame(frame: Frame) -> Self {
        Self::Image(Some(frame))
    }
}

#[cfg(feature = "video")]
fn open_video(path: &Path) -> Result<FrameSource, SourceError> {
    VideoSource::open(path)
        .map(FrameSource::Video)
        .map_err(|err| SourceError::Video {
            path: path.to_path_buf(),
            reason: format!("{err:#}"),
        })
}

#[cfg(not(feature = "video"))]
fn open_video(_path: &Path) -> Result<FrameSource, SourceError> {
    Err(SourceError::FeatureDisabled("video", "video"))
}

#[cfg(feature = "camera-nokhwa")]
fn open_camera(index: u32) -> Result<FrameSource, SourceError> {
    match CameraSource::open(index) {
        Ok(camera) => Ok(FrameSource::Camera(camera)),
        Err(err) => {
            log::warn!("camera {index} unavailable, no frames will be produced: {err:#}");
            Ok(FrameSource::Camera(CameraSource::unavailable()))
        }
    }
}

#[cfg(not(feature = "camera-nokhwa"))]
fn open_camera(_index: u32) -> Result<FrameSource, SourceError> {
    Err(SourceError::FeatureDisabled("camera", "camera-nokhwa"))
}

impl Iterator for FrameSource {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        match self {
            Self::Image(frame) => frame.take(),
            #[cfg(feature = "video")]
            Self::Video(video) => video.next(),
            #[cfg(feature = "camera-nokhwa")]
            Self::Camera(camera) => camera.next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_from_string() {
        assert_eq!(Source::from("0"), Source::Camera(0));
        assert_eq!(Source::from("2"), Source::Camera(2));
        assert_eq!(
            Source::from("clip.MP4"),
            Source::Video(PathBuf::from("clip.MP4"))
        );
        assert!(matches!(Source::from("walk.avi"), Source::Video(_)));
        assert!(matches!(Source::from("walk.mov"), Source::Video(_)));
        assert_eq!(
            Source::from("stand.jpg"),
            Source::Image(PathBuf::from("stand.jpg"))
        );
        assert!(matches!(Source::from("pose.png"), Source::Image(_)));
    }

    #[test]
    fn streams_are_flagged() {
        assert!(Source::Camera(0).is_stream());
        assert!(Source::Video(PathBuf::from("a.mp4")).is_stream());
        assert!(!Source::Image(PathBuf::from("a.png")).is_stream());
    }

    #[test]
    fn image_source_yields_once() {
        let mut source = FrameSource::from_frame(Frame::filled(2, 2, [1, 2, 3]));
        assert!(source.next().is_some());
        assert!(source.next().is_none());
    }

    #[cfg(feature = "camera-nokhwa")]
    #[test]
    fn missing_camera_opens_as_empty_stream() {
        let mut source = FrameSource::open(&Source::Camera(u32::MAX)).unwrap();
        assert!(matches!(source, FrameSource::Camera(_)));
        assert!(source.next().is_none());
        assert!(source.next().is_none());
    }

    #[cfg(not(feature = "camera-nokhwa"))]
    #[test]
    fn camera_needs_its_feature() {
        assert!(matches!(
            FrameSource::open(&Source::Camera(0)),
            Err(SourceError::FeatureDisabled("camera", "camera-nokhwa"))
        ));
    }

    #[test]
    fn unreadable_image_is_reported() {
        let path = std::env::temp_dir().join(format!(
            "pose-estimator-corrupt-{}.png",
            std::process::id()
        ));
        std::fs::write(&path, b"definitely not a png").unwrap();
        let result = FrameSource::open(&Source::Image(path.clone()));
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(SourceError::Image { .. })));

        let missing = FrameSource::open(&Source::Image(PathBuf::from("/nonexistent/pose.jpg")));
        assert!(matches!(missing, Err(SourceError::Image { .. })));
    }

    #[test]
    fn readable_image_becomes_rgb_frame() {
        let path = std::env::temp_dir().join(format!(
            "pose-estimator-readable-{}.png",
            std::process::id()
        ));
        image::RgbImage::from_pixel(5, 3, image::Rgb([9, 8, 7]))
            .save(&path)
            .unwrap();
        let mut source = FrameSource::open(&Source::Image(path.clone())).unwrap();
        std::fs::remove_file(&path).ok();

        let frame = source.next().unwrap();
        assert_eq!((frame.width, frame.height), (5, 3));
        assert_eq!(frame.pixel(4, 2), Some([9, 8, 7]));
        assert!(source.next().is_none());
    }
}
