mod common;
mod ort;

use anyhow::Result;
use ndarray::{Array4, ArrayD};

use super::{sink::FrameSink, skeleton};
use crate::{
    config::{EstimatorConfig, Threshold},
    types::{Frame, Pose},
};

pub use self::common::{HeatmapError, decode_heatmaps, heatmaps_from_output, prepare_frame};
pub use self::ort::{OrtEngine, describe_model};

/// One forward pass of a pose network: a prepared input tensor in, the raw
/// heat-map tensor out.
pub trait PoseEngine {
    fn forward(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>>;
}

impl<E: PoseEngine + ?Sized> PoseEngine for Box<E> {
    fn forward(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>> {
        (**self).forward(input)
    }
}

pub struct PoseEstimator<E> {
    engine: E,
    config: EstimatorConfig,
}

impl<E: PoseEngine> PoseEstimator<E> {
    pub fn new(engine: E, config: EstimatorConfig) -> Self {
        Self { engine, config }
    }

    /// Runs the network on `frame` and decodes one keypoint slot per body part.
    pub fn estimate(&mut self, frame: &Frame, threshold: Threshold) -> Result<Pose> {
        let input = common::prepare_frame(frame, &self.config)?;
        let output = self.engine.forward(input)?;
        let heatmaps = common::heatmaps_from_output(output.view(), self.config.layout)?;
        let pose = common::decode_heatmaps(heatmaps.view(), frame.width, frame.height, threshold)?;
        Ok(pose)
    }

    /// Like [`estimate`](Self::estimate), then draws the skeleton onto `frame`.
    pub fn annotate(&mut self, frame: &mut Frame, threshold: Threshold) -> Result<Pose> {
        let pose = self.estimate(frame, threshold)?;
        skeleton::draw_skeleton(frame, &pose);
        Ok(pose)
    }
}

/// Pulls frames one at a time, annotates each and hands it to `sink`.
///
/// `frames` is consumed and dropped before returning, whatever the exit path,
/// so capture handles it owns are released here. Returns the number of frames
/// that reached the sink.
pub fn run_frame_loop<E, I, S>(
    estimator: &mut PoseEstimator<E>,
    frames: I,
    threshold: Threshold,
    sink: &mut S,
) -> Result<usize>
where
    E: PoseEngine,
    I: IntoIterator<Item = Frame>,
    S: FrameSink + ?Sized,
{
    let mut presented = 0;

    for mut frame in frames {
        let pose = match estimator.annotate(&mut frame, threshold) {
            Ok(pose) => pose,
            Err(err) => {
                log::warn!("pose inference failed: {err:?}");
                continue;
            }
        };

        log::debug!(
            "frame {}x{}: {} keypoint(s)",
            frame.width,
            frame.height,
            pose.detected_count()
        );

        presented += 1;
        if !sink.present(&frame, &pose)? {
            log::info!("output closed, stopping after {presented} frame(s)");
            break;
        }
    }

    Ok(presented)
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use anyhow::anyhow;
    use ndarray::Array4;

    use super::*;
    use crate::{config::TensorLayout, types::BodyPart};

    struct FixedEngine {
        output: Array4<f32>,
        calls: usize,
    }

    impl PoseEngine for FixedEngine {
        fn forward(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>> {
            assert_eq!(input.shape(), &[1, 3, 368, 368]);
            self.calls += 1;
            Ok(self.output.clone().into_dyn())
        }
    }

    /// Answers channels-last input with a channels-last output.
    struct ChannelsLastEngine {
        output: Array4<f32>,
    }

    impl PoseEngine for ChannelsLastEngine {
        fn forward(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>> {
            assert_eq!(input.shape(), &[1, 368, 368, 3]);
            Ok(self.output.clone().into_dyn())
        }
    }

    struct FailingEngine;

    impl PoseEngine for FailingEngine {
        fn forward(&mut self, _input: Array4<f32>) -> Result<ArrayD<f32>> {
            Err(anyhow!("forward pass exploded"))
        }
    }

    fn engine_with_peaks(peaks: &[(BodyPart, usize, usize, f32)]) -> FixedEngine {
        let mut output = Array4::<f32>::zeros((1, 57, 46, 46));
        for &(part, y, x, v) in peaks {
            output[[0, part.index(), y, x]] = v;
        }
        FixedEngine { output, calls: 0 }
    }

    #[derive(Default)]
    struct CollectSink {
        frames: Vec<(Frame, Pose)>,
        stop_after: Option<usize>,
    }

    impl FrameSink for CollectSink {
        fn present(&mut self, frame: &Frame, pose: &Pose) -> Result<bool> {
            self.frames.push((frame.clone(), pose.clone()));
            Ok(self.stop_after.is_none_or(|n| self.frames.len() < n))
        }
    }

    struct TrackedFrames {
        remaining: usize,
        pulled: Rc<Cell<usize>>,
        released: Rc<Cell<bool>>,
    }

    impl Iterator for TrackedFrames {
        type Item = Frame;

        fn next(&mut self) -> Option<Frame> {
            if self.remaining == 0 {
                return None;
            }
            self.remaining -= 1;
            self.pulled.set(self.pulled.get() + 1);
            Some(Frame::filled(92, 92, [40, 40, 40]))
        }
    }

    impl Drop for TrackedFrames {
        fn drop(&mut self) {
            self.released.set(true);
        }
    }

    fn threshold(value: f32) -> Threshold {
        Threshold::new(value).unwrap()
    }

    #[test]
    fn flat_heatmaps_leave_frame_unchanged() {
        let mut estimator = PoseEstimator::new(engine_with_peaks(&[]), EstimatorConfig::default());
        let mut frame = Frame::filled(120, 80, [12, 34, 56]);
        let before = frame.rgb.clone();

        let pose = estimator.annotate(&mut frame, threshold(0.2)).unwrap();
        assert!(pose.is_empty());
        assert_eq!(frame.rgb, before);
    }

    #[test]
    fn estimate_maps_peaks_into_frame_space() {
        let engine = engine_with_peaks(&[
            (BodyPart::Neck, 10, 23, 0.8),
            (BodyPart::RShoulder, 12, 30, 0.6),
            (BodyPart::LShoulder, 12, 16, 0.1),
        ]);
        let mut estimator = PoseEstimator::new(engine, EstimatorConfig::default());
        let frame = Frame::filled(460, 230, [0, 0, 0]);

        let pose = estimator.estimate(&frame, threshold(0.2)).unwrap();
        assert_eq!(pose.get(BodyPart::Neck).unwrap().position(), (230, 50));
        assert_eq!(pose.get(BodyPart::RShoulder).unwrap().position(), (300, 60));
        assert!(pose.get(BodyPart::LShoulder).is_none());
        assert_eq!(pose.keypoints().len(), 19);
    }

    #[test]
    fn annotate_is_repeatable_on_fresh_copies() {
        let engine = engine_with_peaks(&[
            (BodyPart::Neck, 10, 23, 0.9),
            (BodyPart::Nose, 5, 23, 0.9),
            (BodyPart::RShoulder, 12, 30, 0.9),
        ]);
        let mut estimator = PoseEstimator::new(engine, EstimatorConfig::default());
        let original = Frame::filled(200, 200, [90, 90, 90]);

        let mut first = original.clone();
        let mut second = original.clone();
        let pose_a = estimator.annotate(&mut first, threshold(0.2)).unwrap();
        let pose_b = estimator.annotate(&mut second, threshold(0.2)).unwrap();

        assert_eq!(pose_a, pose_b);
        assert_eq!(first.rgb, second.rgb);
        assert_ne!(first.rgb, original.rgb);
    }

    #[test]
    fn too_few_channels_is_an_error() {
        let engine = FixedEngine {
            output: Array4::<f32>::zeros((1, 5, 46, 46)),
            calls: 0,
        };
        let mut estimator = PoseEstimator::new(engine, EstimatorConfig::default());
        let err = estimator
            .estimate(&Frame::filled(10, 10, [0, 0, 0]), threshold(0.2))
            .unwrap_err();
        assert!(err.downcast_ref::<HeatmapError>().is_some());
    }

    #[test]
    fn loop_stops_when_sink_closes_and_releases_source() {
        let pulled = Rc::new(Cell::new(0));
        let released = Rc::new(Cell::new(false));
        let frames = TrackedFrames {
            remaining: 10,
            pulled: pulled.clone(),
            released: released.clone(),
        };
        let mut estimator = PoseEstimator::new(engine_with_peaks(&[]), EstimatorConfig::default());
        let mut sink = CollectSink {
            stop_after: Some(3),
            ..CollectSink::default()
        };

        let presented = run_frame_loop(&mut estimator, frames, threshold(0.2), &mut sink).unwrap();
        assert_eq!(presented, 3);
        assert_eq!(pulled.get(), 3);
        assert!(released.get());
    }

    #[test]
    fn loop_drains_finite_source() {
        let pulled = Rc::new(Cell::new(0));
        let released = Rc::new(Cell::new(false));
        let frames = TrackedFrames {
            remaining: 4,
            pulled: pulled.clone(),
            released: released.clone(),
        };
        let mut estimator = PoseEstimator::new(engine_with_peaks(&[]), EstimatorConfig::default());
        let mut sink = CollectSink::default();

        let presented = run_frame_loop(&mut estimator, frames, threshold(0.2), &mut sink).unwrap();
        assert_eq!(presented, 4);
        assert_eq!(sink.frames.len(), 4);
        assert!(released.get());
        assert_eq!(estimator.engine.calls, 4);
    }

    #[test]
    fn failed_frames_are_skipped() {
        let released = Rc::new(Cell::new(false));
        let frames = TrackedFrames {
            remaining: 2,
            pulled: Rc::new(Cell::new(0)),
            released: released.clone(),
        };
        let mut estimator = PoseEstimator::new(FailingEngine, EstimatorConfig::default());
        let mut sink = CollectSink::default();

        let presented = run_frame_loop(&mut estimator, frames, threshold(0.2), &mut sink).unwrap();
        assert_eq!(presented, 0);
        assert!(sink.frames.is_empty());
        assert!(released.get());
    }

    #[test]
    fn call_threshold_alone_gates_detections() {
        let engine = engine_with_peaks(&[(BodyPart::Neck, 10, 23, 0.5)]);
        let mut estimator = PoseEstimator::new(engine, EstimatorConfig::default());
        let frame = Frame::filled(46, 46, [0, 0, 0]);

        let strict = estimator.estimate(&frame, threshold(0.9)).unwrap();
        let lenient = estimator.estimate(&frame, threshold(0.2)).unwrap();
        assert_eq!(strict.detected_count(), 0);
        assert_eq!(lenient.detected_count(), 1);
        assert_eq!(lenient.get(BodyPart::Neck).unwrap().position(), (23, 10));
    }

    #[test]
    fn channels_last_layout_runs_end_to_end() {
        let mut output = Array4::<f32>::zeros((1, 46, 46, 57));
        output[[0, 10, 23, BodyPart::Neck.index()]] = 0.8;
        output[[0, 12, 30, BodyPart::RShoulder.index()]] = 0.7;
        // PAF channels past the first 19 must not leak into the pose.
        output[[0, 40, 40, 30]] = 0.99;
        let config = EstimatorConfig::default().with_layout(TensorLayout::Nhwc);
        let mut estimator = PoseEstimator::new(ChannelsLastEngine { output }, config);
        let mut frame = Frame::filled(460, 230, [0, 0, 0]);

        let pose = estimator.annotate(&mut frame, threshold(0.2)).unwrap();
        assert_eq!(pose.detected_count(), 2);
        assert_eq!(pose.get(BodyPart::Neck).unwrap().position(), (230, 50));
        assert_eq!(pose.get(BodyPart::RShoulder).unwrap().position(), (300, 60));
        assert_eq!(frame.pixel(265, 55), Some([0, 255, 0]));
    }
}
