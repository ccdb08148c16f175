//! Estimator configuration.
//!
//! Defaults match the OpenPose body model: a 368x368 input with a per-channel
//! mean of 127.5, unit scale and RGB channel order.

use clap::ValueEnum;
use thiserror::Error;

pub const INPUT_SIZE: u32 = 368;
pub const DEFAULT_MEAN: f32 = 127.5;
pub const DEFAULT_SCALE: f32 = 1.0;
pub const DEFAULT_THRESHOLD_PERCENT: u8 = 20;
pub const THRESHOLD_STEP_PERCENT: u8 = 5;
const DEFAULT_INTRA_THREADS: usize = 2;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("threshold {0} is outside [0, 1]")]
    ThresholdOutOfRange(f32),
    #[error("threshold {0}% is above 100%")]
    PercentOutOfRange(u8),
    #[error("threshold {0}% is not a multiple of 5%")]
    PercentOffStep(u8),
    #[error("input size must be non-zero, got {0}x{1}")]
    EmptyInput(u32, u32),
}

/// Minimum heat-map confidence for a keypoint to count as detected.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Threshold(f32);

impl Threshold {
    pub fn new(value: f32) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::ThresholdOutOfRange(value));
        }
        Ok(Self(value))
    }

    /// Percentages are accepted in steps of 5, the granularity of the CLI.
    pub fn from_percent(percent: u8) -> Result<Self, ConfigError> {
        if percent > 100 {
            return Err(ConfigError::PercentOutOfRange(percent));
        }
        if percent % THRESHOLD_STEP_PERCENT != 0 {
            return Err(ConfigError::PercentOffStep(percent));
        }
        Ok(Self(f32::from(percent) / 100.0))
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(f32::from(DEFAULT_THRESHOLD_PERCENT) / 100.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

/// Memory layout of both the input tensor and the heat-map output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum TensorLayout {
    #[default]
    Nchw,
    Nhwc,
}

/// How frames are turned into network input and how the output is laid out.
/// The detection threshold is not part of it; it is passed per call.
#[derive(Clone, Debug, PartialEq)]
pub struct EstimatorConfig {
    pub input_width: u32,
    pub input_height: u32,
    pub mean: [f32; 3],
    pub scale: f32,
    pub channel_order: ChannelOrder,
    pub layout: TensorLayout,
    pub intra_threads: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            input_width: INPUT_SIZE,
            input_height: INPUT_SIZE,
            mean: [DEFAULT_MEAN; 3],
            scale: DEFAULT_SCALE,
            channel_order: ChannelOrder::default(),
            layout: TensorLayout::default(),
            intra_threads: DEFAULT_INTRA_THREADS,
        }
    }
}

impl EstimatorConfig {
    pub fn with_input_size(mut self, width: u32, height: u32) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::EmptyInput(width, height));
        }
        self.input_width = width;
        self.input_height = height;
        Ok(self)
    }

    pub fn with_channel_order(mut self, order: ChannelOrder) -> Self {
        self.channel_order = order;
        self
    }

    pub fn with_layout(mut self, layout: TensorLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = threads.max(1);
        self
    }
}
