use anyhow::{Result, anyhow};
use nokhwa::{Buffer, utils::FrameFormat};
use rayon::prelude::*;
use yuv::{
    YuvBiPlanarImage, YuvConversionMode, YuvPackedImage, YuvRange, YuvStandardMatrix,
    yuv_nv12_to_rgb, yuyv422_to_rgb,
};
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

use crate::types::Frame;

pub fn convert_camera_frame(frame: &Buffer) -> Result<Frame> {
    let resolution = frame.resolution();
    let width = resolution.width_x;
    let height = resolution.height_y;
    let data = frame.buffer();

    let (rgb, width, height) = match frame.source_frame_format() {
        FrameFormat::NV12 => (nv12_to_rgb(data, width, height)?, width, height),
        FrameFormat::YUYV => (yuyv_to_rgb(data, width, height)?, width, height),
        FrameFormat::MJPEG => mjpeg_to_rgb(data)?,
        FrameFormat::RAWRGB => (raw_rgb_to_rgb(data, width, height, false)?, width, height),
        FrameFormat::RAWBGR => (raw_rgb_to_rgb(data, width, height, true)?, width, height),
        FrameFormat::GRAY => (gray_to_rgb(data, width, height)?, width, height),
    };

    Frame::new(rgb, width, height)
}

fn nv12_to_rgb(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let y_plane_len = width as usize * height as usize;
    let uv_plane_len = y_plane_len / 2;

    if data.len() < y_plane_len + uv_plane_len {
        return Err(anyhow!(
            "NV12 buffer too small: got {}, expected {}",
            data.len(),
            y_plane_len + uv_plane_len
        ));
    }

    let image = YuvBiPlanarImage {
        y_plane: &data[..y_plane_len],
        y_stride: width,
        uv_plane: &data[y_plane_len..y_plane_len + uv_plane_len],
        uv_stride: width,
        width,
        height,
    };

    let mut rgb = vec![0u8; y_plane_len * 3];
    yuv_nv12_to_rgb(
        &image,
        &mut rgb,
        width * 3,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| anyhow!("NV12→RGB failed: {err:?}"))?;

    Ok(rgb)
}

fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let expected_len = width as usize * height as usize * 2;
    if data.len() < expected_len {
        return Err(anyhow!(
            "YUYV buffer too small: got {}, expected {}",
            data.len(),
            expected_len
        ));
    }

    let packed = YuvPackedImage {
        yuy: data,
        yuy_stride: width * 2,
        width,
        height,
    };

    let mut rgb = vec![0u8; width as usize * height as usize * 3];
    yuyv422_to_rgb(
        &packed,
        &mut rgb,
        width * 3,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
    )
    .map_err(|err| anyhow!("YUYV422→RGB failed: {err:?}"))?;

    Ok(rgb)
}

/// MJPEG frames carry their own dimensions, which win over the negotiated
/// camera resolution.
fn mjpeg_to_rgb(data: &[u8]) -> Result<(Vec<u8>, u32, u32)> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGB);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let mut rgb = decoder
        .decode()
        .map_err(|err| anyhow!("MJPEG decode failed: {err:?}"))?;

    let info = decoder
        .info()
        .ok_or_else(|| anyhow!("MJPEG decoder reported no image info"))?;
    let width =
        u32::try_from(info.width).map_err(|_| anyhow!("MJPEG width does not fit u32"))?;
    let height =
        u32::try_from(info.height).map_err(|_| anyhow!("MJPEG height does not fit u32"))?;
    let expected_len = width as usize * height as usize * 3;
    if rgb.len() < expected_len {
        return Err(anyhow!(
            "MJPEG decode produced too few bytes: got {}, expected {}",
            rgb.len(),
            expected_len
        ));
    }
    rgb.truncate(expected_len);

    Ok((rgb, width, height))
}

fn raw_rgb_to_rgb(data: &[u8], width: u32, height: u32, swap_rb: bool) -> Result<Vec<u8>> {
    let expected_len = width as usize * height as usize * 3;
    if data.len() < expected_len {
        return Err(anyhow!(
            "RGB buffer too small: got {}, expected {}",
            data.len(),
            expected_len
        ));
    }

    let mut rgb = data[..expected_len].to_vec();
    if swap_rb {
        rgb.par_chunks_exact_mut(3).for_each(|px| px.swap(0, 2));
    }

    Ok(rgb)
}

fn gray_to_rgb(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let expected_len = width as usize * height as usize;
    if data.len() < expected_len {
        return Err(anyhow!(
            "GRAY buffer too small: got {}, expected {}",
            data.len(),
            expected_len
        ));
    }

    let mut rgb = vec![0u8; expected_len * 3];
    rgb.par_chunks_mut(3)
        .zip(data[..expected_len].par_iter().copied())
        .for_each(|(dst, value)| {
            dst[0] = value;
            dst[1] = value;
            dst[2] = value;
        });

    Ok(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgr_is_swapped_to_rgb() {
        let rgb = raw_rgb_to_rgb(&[1, 2, 3, 4, 5, 6], 2, 1, true).unwrap();
        assert_eq!(rgb, vec![3, 2, 1, 6, 5, 4]);
        let rgb = raw_rgb_to_rgb(&[1, 2, 3, 4, 5, 6, 7], 2, 1, false).unwrap();
        assert_eq!(rgb, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn gray_is_replicated() {
        let rgb = gray_to_rgb(&[9, 200], 2, 1).unwrap();
        assert_eq!(rgb, vec![9, 9, 9, 200, 200, 200]);
    }

    #[test]
    fn short_buffers_are_rejected() {
        assert!(raw_rgb_to_rgb(&[0; 5], 2, 1, false).is_err());
        assert!(gray_to_rgb(&[0; 3], 2, 2).is_err());
        assert!(yuyv_to_rgb(&[0; 7], 2, 2).is_err());
        assert!(nv12_to_rgb(&[0; 5], 2, 2).is_err());
    }
}
