//! Human pose estimation: runs an OpenPose-style body network on frames,
//! decodes its heat-maps into 19 body-part keypoints and draws the skeleton
//! back onto the frame.

pub mod cli;
pub mod config;
pub mod model_download;
pub mod pipeline;
pub mod types;
#[cfg(feature = "viewer")]
pub mod viewer;

pub use config::{ChannelOrder, EstimatorConfig, TensorLayout, Threshold};
pub use pipeline::{
    FrameSink, FrameSource, PoseEngine, PoseEstimator, Source, draw_skeleton, run_frame_loop,
};
pub use types::{BODY_PART_COUNT, BodyPart, Frame, Keypoint, Pose};
