#[cfg(feature = "camera-nokhwa")]
pub mod camera;
pub mod estimator;
#[cfg(feature = "camera-nokhwa")]
pub mod rgb_converter;
pub mod sink;
pub mod skeleton;
pub mod source;
#[cfg(feature = "video")]
pub mod video;

// Re-exports for convenience
#[cfg(feature = "camera-nokhwa")]
pub use camera::{CameraDevice, CameraSource, available_cameras};
pub use estimator::{OrtEngine, PoseEngine, PoseEstimator, run_frame_loop};
pub use sink::{FrameSink, KeypointLogger};
pub use skeleton::{POSE_PAIRS, draw_skeleton};
pub use source::{FrameSource, Source, SourceError};
