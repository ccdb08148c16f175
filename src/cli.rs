//! Command-line front end.

use std::{path::PathBuf, time::Instant};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::{
    config::{ChannelOrder, DEFAULT_THRESHOLD_PERCENT, EstimatorConfig, TensorLayout, Threshold},
    model_download::{default_model_path, ensure_model_ready},
    pipeline::{
        FrameSink, FrameSource, KeypointLogger, OrtEngine, PoseEstimator, Source,
        estimator::describe_model, run_frame_loop,
    },
};

#[cfg(feature = "viewer")]
const WINDOW_TITLE: &str = "Pose Estimation";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Examples:
    pose-estimator estimate stand.jpg
    pose-estimator estimate stand.jpg --threshold 35
    pose-estimator estimate walk.mp4 --no-show
    pose-estimator estimate 0
    pose-estimator model-info --model models/graph_opt.onnx

Video files (mp4, avi, mov, ...) need a build with `--features video`,
which links against the system ffmpeg libraries."#)]
pub struct Cli {
    /// Show debug output
    #[arg(long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Estimate poses on an image, a video file or a camera
    Estimate(EstimateArgs),
    /// List capture devices
    Cameras,
    /// Print the model's inputs and outputs
    ModelInfo(ModelArgs),
}

#[derive(Args, Debug)]
pub struct ModelArgs {
    /// Path to the ONNX pose model
    #[arg(short, long, default_value_os_t = default_model_path())]
    pub model: PathBuf,

    /// URL to fetch the model from when it is missing
    #[arg(long)]
    pub model_url: Option<String>,
}

#[derive(Args, Debug)]
pub struct EstimateArgs {
    /// Image path, video path or camera index
    pub source: String,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Keypoint confidence threshold in percent (0-100, steps of 5)
    #[arg(short, long, default_value_t = DEFAULT_THRESHOLD_PERCENT, value_parser = parse_threshold_percent)]
    pub threshold: u8,

    /// Feed the network BGR instead of RGB
    #[arg(long, default_value_t = false)]
    pub bgr: bool,

    /// Tensor layout of the model's input and output
    #[arg(long, value_enum, default_value_t = TensorLayout::Nchw)]
    pub layout: TensorLayout,

    /// ONNX Runtime intra-op threads
    #[arg(long, default_value_t = 2)]
    pub threads: usize,

    /// Log keypoints instead of opening a preview window
    #[arg(long, default_value_t = false)]
    pub no_show: bool,
}

fn parse_threshold_percent(s: &str) -> Result<u8, String> {
    let percent: u8 = s
        .parse()
        .map_err(|_| format!("`{s}` is not a whole percentage"))?;
    Threshold::from_percent(percent).map_err(|err| err.to_string())?;
    Ok(percent)
}

impl EstimateArgs {
    pub fn confidence_threshold(&self) -> Result<Threshold> {
        Ok(Threshold::from_percent(self.threshold)?)
    }

    pub fn estimator_config(&self) -> EstimatorConfig {
        let order = if self.bgr {
            ChannelOrder::Bgr
        } else {
            ChannelOrder::Rgb
        };
        EstimatorConfig::default()
            .with_channel_order(order)
            .with_layout(self.layout)
            .with_intra_threads(self.threads)
    }
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Estimate(args) => estimate(&args),
        Commands::Cameras => list_cameras(),
        Commands::ModelInfo(args) => {
            ensure_model_ready(&args.model, args.model_url.as_deref(), |_evt| {})?;
            print!("{}", describe_model(&args.model)?);
            Ok(())
        }
    }
}

fn estimate(args: &EstimateArgs) -> Result<()> {
    let threshold = args.confidence_threshold()?;
    let config = args.estimator_config();
    let model_path = &args.model.model;

    // Any failure up to here aborts before a single frame is read.
    ensure_model_ready(model_path, args.model.model_url.as_deref(), |_evt| {})?;
    let engine = OrtEngine::new(model_path, &config)?;
    log::info!("pose model ready using {}", model_path.display());

    let mut estimator = PoseEstimator::new(engine, config);

    let source = Source::from(args.source.as_str());
    let frames = match FrameSource::open(&source) {
        Ok(frames) => frames,
        Err(err) => {
            log::error!("no output produced: {err}");
            return Ok(());
        }
    };
    log::info!(
        "estimating poses on {source} (threshold {:.2})",
        threshold.value()
    );

    let mut sink = build_sink(args.no_show, !source.is_stream());
    let started = Instant::now();
    let presented = run_frame_loop(&mut estimator, frames, threshold, &mut sink)?;
    sink.finish()?;

    if presented == 0 {
        log::warn!("no output produced from {source}");
    } else {
        log::info!(
            "processed {presented} frame(s) in {:.2?}",
            started.elapsed()
        );
    }
    Ok(())
}

#[cfg(feature = "viewer")]
fn build_sink(no_show: bool, hold_last_frame: bool) -> Box<dyn FrameSink> {
    if no_show {
        Box::new(KeypointLogger::new())
    } else {
        Box::new(crate::viewer::Viewer::new(WINDOW_TITLE, hold_last_frame))
    }
}

#[cfg(not(feature = "viewer"))]
fn build_sink(no_show: bool, _hold_last_frame: bool) -> Box<dyn FrameSink> {
    if !no_show {
        log::warn!("built without the `viewer` feature, logging keypoints instead");
    }
    Box::new(KeypointLogger::new())
}

#[cfg(feature = "camera-nokhwa")]
fn list_cameras() -> Result<()> {
    let cameras = crate::pipeline::available_cameras()?;
    if cameras.is_empty() {
        println!("No cameras found");
    }
    for device in cameras {
        println!("{:?}: {}", device.index, device.label);
    }
    Ok(())
}

#[cfg(not(feature = "camera-nokhwa"))]
fn list_cameras() -> Result<()> {
    Err(anyhow::anyhow!(
        "camera support was not compiled in (enable the `camera-nokhwa` feature)"
    ))
}
