use crate::types::{BodyPart, Frame, Pose};

pub const POSE_PAIR_COUNT: usize = 17;

pub const POSE_PAIRS: [(BodyPart, BodyPart); POSE_PAIR_COUNT] = [
    (BodyPart::Neck, BodyPart::RShoulder),
    (BodyPart::Neck, BodyPart::LShoulder),
    (BodyPart::RShoulder, BodyPart::RElbow),
    (BodyPart::RElbow, BodyPart::RWrist),
    (BodyPart::LShoulder, BodyPart::LElbow),
    (BodyPart::LElbow, BodyPart::LWrist),
    (BodyPart::Neck, BodyPart::RHip),
    (BodyPart::RHip, BodyPart::RKnee),
    (BodyPart::RKnee, BodyPart::RAnkle),
    (BodyPart::Neck, BodyPart::LHip),
    (BodyPart::LHip, BodyPart::LKnee),
    (BodyPart::LKnee, BodyPart::LAnkle),
    (BodyPart::Neck, BodyPart::Nose),
    (BodyPart::Nose, BodyPart::REye),
    (BodyPart::REye, BodyPart::REar),
    (BodyPart::Nose, BodyPart::LEye),
    (BodyPart::LEye, BodyPart::LEar),
];

pub const SKELETON_LINE_THICKNESS: i32 = 3;
pub const KEYPOINT_RADIUS: i32 = 3;
pub const LINE_COLOR: [u8; 3] = [0, 255, 0];
pub const KEYPOINT_COLOR: [u8; 3] = [255, 0, 0];

/// Draws every pose pair whose two endpoints were detected. Pairs are drawn
/// in table order, each as a line followed by a marker on both ends.
pub fn draw_skeleton(frame: &mut Frame, pose: &Pose) {
    let (width, height) = (frame.width, frame.height);
    let buffer = frame.rgb.as_mut_slice();

    for &(from, to) in &POSE_PAIRS {
        let (Some(a), Some(b)) = (pose.get(from), pose.get(to)) else {
            continue;
        };
        let pa = (a.x as i32, a.y as i32);
        let pb = (b.x as i32, b.y as i32);

        draw_line(
            buffer,
            width,
            height,
            pa,
            pb,
            LINE_COLOR,
            SKELETON_LINE_THICKNESS,
        );
        draw_circle(buffer, width, height, pa, KEYPOINT_RADIUS, KEYPOINT_COLOR);
        draw_circle(buffer, width, height, pb, KEYPOINT_RADIUS, KEYPOINT_COLOR);
    }
}

fn draw_line(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    p0: (i32, i32),
    p1: (i32, i32),
    color: [u8; 3],
    thickness: i32,
) {
    let (mut x0, mut y0) = p0;
    let (x1, y1) = p1;
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let radius = (thickness.max(1) - 1) / 2;

    loop {
        put_pixel_safe(buffer, width, height, x0, y0, color);
        if radius > 0 {
            for ox in -radius..=radius {
                for oy in -radius..=radius {
                    if ox == 0 && oy == 0 {
                        continue;
                    }
                    if ox.abs() + oy.abs() <= radius {
                        put_pixel_safe(buffer, width, height, x0 + ox, y0 + oy, color);
                    }
                }
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_circle(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    center: (i32, i32),
    radius: i32,
    color: [u8; 3],
) {
    let (cx, cy) = center;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel_safe(buffer, width, height, cx + dx, cy + dy, color);
            }
        }
    }
}

fn put_pixel_safe(buffer: &mut [u8], width: u32, height: u32, x: i32, y: i32, color: [u8; 3]) {
    if x < 0 || y < 0 {
        return;
    }
    let (ux, uy) = (x as u32, y as u32);
    if ux >= width || uy >= height {
        return;
    }
    let idx = (uy as usize * width as usize + ux as usize) * 3;
    if idx + 2 < buffer.len() {
        buffer[idx..idx + 3].copy_from_slice(&color);
    }
}
