use std::{fmt, str::FromStr, time::Instant};

use anyhow::{Result, anyhow};
use image::DynamicImage;

/// Packed RGB frame, row-major, 3 bytes per pixel.
#[derive(Clone, Debug)]
pub struct Frame {
    pub rgb: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(rgb: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected_len = (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(3);
        if rgb.len() != expected_len {
            return Err(anyhow!(
                "frame buffer size mismatch: got {}, expected {}",
                rgb.len(),
                expected_len
            ));
        }
        Ok(Self {
            rgb,
            width,
            height,
            timestamp: Instant::now(),
        })
    }

    /// Solid-colour frame, mostly useful for fixtures.
    pub fn filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let len = width as usize * height as usize;
        let mut rgb = Vec::with_capacity(len * 3);
        for _ in 0..len {
            rgb.extend_from_slice(&color);
        }
        Self {
            rgb,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        self.rgb
            .get(idx..idx + 3)
            .map(|px| [px[0], px[1], px[2]])
    }
}

impl From<DynamicImage> for Frame {
    fn from(image: DynamicImage) -> Self {
        let rgb = image.into_rgb8();
        let (width, height) = rgb.dimensions();
        Self {
            rgb: rgb.into_raw(),
            width,
            height,
            timestamp: Instant::now(),
        }
    }
}

pub const BODY_PART_COUNT: usize = 19;

/// Body parts in the order of the network's heat-map channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BodyPart {
    Nose,
    Neck,
    RShoulder,
    RElbow,
    RWrist,
    LShoulder,
    LElbow,
    LWrist,
    RHip,
    RKnee,
    RAnkle,
    LHip,
    LKnee,
    LAnkle,
    REye,
    LEye,
    REar,
    LEar,
    Background,
}

impl BodyPart {
    pub const ALL: [BodyPart; BODY_PART_COUNT] = [
        BodyPart::Nose,
        BodyPart::Neck,
        BodyPart::RShoulder,
        BodyPart::RElbow,
        BodyPart::RWrist,
        BodyPart::LShoulder,
        BodyPart::LElbow,
        BodyPart::LWrist,
        BodyPart::RHip,
        BodyPart::RKnee,
        BodyPart::RAnkle,
        BodyPart::LHip,
        BodyPart::LKnee,
        BodyPart::LAnkle,
        BodyPart::REye,
        BodyPart::LEye,
        BodyPart::REar,
        BodyPart::LEar,
        BodyPart::Background,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn label(&self) -> &'static str {
        match self {
            BodyPart::Nose => "Nose",
            BodyPart::Neck => "Neck",
            BodyPart::RShoulder => "RShoulder",
            BodyPart::RElbow => "RElbow",
            BodyPart::RWrist => "RWrist",
            BodyPart::LShoulder => "LShoulder",
            BodyPart::LElbow => "LElbow",
            BodyPart::LWrist => "LWrist",
            BodyPart::RHip => "RHip",
            BodyPart::RKnee => "RKnee",
            BodyPart::RAnkle => "RAnkle",
            BodyPart::LHip => "LHip",
            BodyPart::LKnee => "LKnee",
            BodyPart::LAnkle => "LAnkle",
            BodyPart::REye => "REye",
            BodyPart::LEye => "LEye",
            BodyPart::REar => "REar",
            BodyPart::LEar => "LEar",
            BodyPart::Background => "Background",
        }
    }
}

impl fmt::Display for BodyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BodyPart {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|part| part.label() == s)
            .ok_or_else(|| anyhow!("unknown body part label {s:?}"))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    pub x: u32,
    pub y: u32,
    pub confidence: f32,
}

impl Keypoint {
    pub fn position(&self) -> (u32, u32) {
        (self.x, self.y)
    }
}

/// One slot per body part; `None` means the part fell below the threshold.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pose {
    keypoints: [Option<Keypoint>; BODY_PART_COUNT],
}

impl Pose {
    pub fn new(keypoints: [Option<Keypoint>; BODY_PART_COUNT]) -> Self {
        Self { keypoints }
    }

    pub fn get(&self, part: BodyPart) -> Option<&Keypoint> {
        self.keypoints[part.index()].as_ref()
    }

    pub fn keypoints(&self) -> &[Option<Keypoint>; BODY_PART_COUNT] {
        &self.keypoints
    }

    pub fn detected(&self) -> impl Iterator<Item = (BodyPart, &Keypoint)> {
        BodyPart::ALL
            .iter()
            .copied()
            .zip(self.keypoints.iter())
            .filter_map(|(part, kp)| kp.as_ref().map(|kp| (part, kp)))
    }

    pub fn detected_count(&self) -> usize {
        self.keypoints.iter().filter(|kp| kp.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.detected_count() == 0
    }
}
