use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use ndarray::{Array3, Array4, ArrayView2, ArrayView3, ArrayViewD, Axis, Ix4, s};
use rayon::prelude::*;
use thiserror::Error;

use crate::{
    config::{ChannelOrder, EstimatorConfig, TensorLayout, Threshold},
    types::{BODY_PART_COUNT, Frame, Keypoint, Pose},
};

#[derive(Debug, Error, PartialEq)]
pub enum HeatmapError {
    #[error("expected a rank-4 heat-map tensor, got shape {0:?}")]
    Rank(Vec<usize>),
    #[error("heat-map tensor has {found} channels, need at least {needed}")]
    TooFewChannels { found: usize, needed: usize },
    #[error("heat-map tensor is empty (shape {0:?})")]
    Empty(Vec<usize>),
}

/// Stretches the frame to the network input size (no crop, no letterbox) and
/// normalises every channel as `(value - mean) * scale`.
pub fn prepare_frame(frame: &Frame, config: &EstimatorConfig) -> Result<Array4<f32>> {
    let expected_len = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(3);
    if frame.rgb.len() != expected_len {
        return Err(anyhow!(
            "frame buffer size mismatch: got {}, expected {}",
            frame.rgb.len(),
            expected_len
        ));
    }
    if frame.width == 0 || frame.height == 0 {
        return Err(anyhow!(
            "cannot prepare an empty {}x{} frame",
            frame.width,
            frame.height
        ));
    }

    let (dst_w, dst_h) = (config.input_width, config.input_height);
    let src_image = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgb.clone(),
        fir::PixelType::U8x3,
    )?;
    let mut dst_image = fir::images::Image::new(dst_w, dst_h, fir::PixelType::U8x3);
    let mut resizer = fir::Resizer::new();
    let resize_options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    resizer
        .resize(&src_image, &mut dst_image, Some(&resize_options))
        .context("fast resize failed")?;
    let resized = dst_image.into_vec();

    let order = match config.channel_order {
        ChannelOrder::Rgb => [0, 1, 2],
        ChannelOrder::Bgr => [2, 1, 0],
    };
    let mean = config.mean;
    let scale = config.scale;
    let normalize = |px: &[u8], channel: usize| (f32::from(px[order[channel]]) - mean[channel]) * scale;

    let (w, h) = (dst_w as usize, dst_h as usize);
    let input = match config.layout {
        TensorLayout::Nchw => {
            let plane = w * h;
            let mut data = vec![0f32; plane * 3];
            {
                let (c0, rest) = data.split_at_mut(plane);
                let (c1, c2) = rest.split_at_mut(plane);
                c0.par_iter_mut()
                    .zip(c1.par_iter_mut())
                    .zip(c2.par_iter_mut())
                    .zip(resized.par_chunks_exact(3))
                    .for_each(|(((v0, v1), v2), px)| {
                        *v0 = normalize(px, 0);
                        *v1 = normalize(px, 1);
                        *v2 = normalize(px, 2);
                    });
            }
            Array4::<f32>::from_shape_vec((1, 3, h, w), data)
        }
        TensorLayout::Nhwc => {
            let data: Vec<f32> = resized
                .par_chunks_exact(3)
                .flat_map_iter(|px| [normalize(px, 0), normalize(px, 1), normalize(px, 2)])
                .collect();
            Array4::<f32>::from_shape_vec((1, h, w, 3), data)
        }
    }
    .map_err(|err| anyhow!("failed to build input tensor: {err}"))?;

    Ok(input)
}

/// Takes the first batch entry of a raw network output and returns the body
/// part heat-maps as `(part, y, x)`, dropping any channels past the catalog.
pub fn heatmaps_from_output(
    output: ArrayViewD<'_, f32>,
    layout: TensorLayout,
) -> Result<Array3<f32>, HeatmapError> {
    let shape = output.shape().to_vec();
    let output = output
        .into_dimensionality::<Ix4>()
        .map_err(|_| HeatmapError::Rank(shape.clone()))?;
    if output.len() == 0 {
        return Err(HeatmapError::Empty(shape));
    }

    let first = output.index_axis_move(Axis(0), 0);
    let chw = match layout {
        TensorLayout::Nchw => first,
        TensorLayout::Nhwc => first.permuted_axes([2, 0, 1]),
    };

    let channels = chw.len_of(Axis(0));
    if channels < BODY_PART_COUNT {
        return Err(HeatmapError::TooFewChannels {
            found: channels,
            needed: BODY_PART_COUNT,
        });
    }

    Ok(chw.slice(s![..BODY_PART_COUNT, .., ..]).to_owned())
}

/// Picks the strongest cell of each part's heat-map and maps it into frame
/// pixels. Parts whose peak is not strictly above `threshold` stay `None`.
pub fn decode_heatmaps(
    heatmaps: ArrayView3<'_, f32>,
    frame_width: u32,
    frame_height: u32,
    threshold: Threshold,
) -> Result<Pose, HeatmapError> {
    let (channels, heat_h, heat_w) = heatmaps.dim();
    if channels < BODY_PART_COUNT {
        return Err(HeatmapError::TooFewChannels {
            found: channels,
            needed: BODY_PART_COUNT,
        });
    }
    if heat_h == 0 || heat_w == 0 {
        return Err(HeatmapError::Empty(heatmaps.shape().to_vec()));
    }

    let mut keypoints = [None; BODY_PART_COUNT];
    for (idx, slot) in keypoints.iter_mut().enumerate() {
        let Some((px, py, confidence)) = locate_peak(heatmaps.index_axis(Axis(0), idx)) else {
            continue;
        };
        if confidence > threshold.value() {
            *slot = Some(Keypoint {
                x: rescale(px, frame_width, heat_w),
                y: rescale(py, frame_height, heat_h),
                confidence,
            });
        }
    }

    Ok(Pose::new(keypoints))
}

/// First maximum in row-major order as `(x, y, value)`. NaN cells never win.
fn locate_peak(heat_map: ArrayView2<'_, f32>) -> Option<(usize, usize, f32)> {
    let mut best: Option<(usize, usize, f32)> = None;
    for ((y, x), &value) in heat_map.indexed_iter() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some((_, _, current)) if value <= current => {}
            _ => best = Some((x, y, value)),
        }
    }
    best
}

fn rescale(coord: usize, frame_dim: u32, heat_dim: usize) -> u32 {
    ((u64::from(frame_dim) * coord as u64) / heat_dim as u64) as u32
}
