// mathlib.rs: vector helpers shared by the renderer and the editor

pub type Vec2 = [f32; 2];
pub type Vec3 = [f32; 3];

/// 8-bit RGB triplet as stored in vertex lighting caches.
pub type Rgb8 = [u8; 3];

pub const VX: usize = 0;
pub const VY: usize = 1;
pub const VZ: usize = 2;

#[inline]
pub fn dot_product(a: &Vec3, b: &Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn vector_subtract(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn vector_add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// veca + scale * vecb
pub fn vector_ma(veca: &Vec3, scale: f32, vecb: &Vec3) -> Vec3 {
    [
        veca[0] + scale * vecb[0],
        veca[1] + scale * vecb[1],
        veca[2] + scale * vecb[2],
    ]
}

pub fn vector_scale(v: &Vec3, scale: f32) -> Vec3 {
    [v[0] * scale, v[1] * scale, v[2] * scale]
}

pub fn vector_length(v: &Vec3) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Normalize in place, returns original length.
pub fn vector_normalize(v: &mut Vec3) -> f32 {
    let length = vector_length(v);
    if length != 0.0 {
        let ilength = 1.0 / length;
        v[0] *= ilength;
        v[1] *= ilength;
        v[2] *= ilength;
    }
    length
}

pub fn vector_distance(a: &Vec3, b: &Vec3) -> f32 {
    vector_length(&vector_subtract(a, b))
}

/// Cheap 2D distance estimate: max(|dx|, |dy|) + min(|dx|, |dy|) / 2.
///
/// Overestimates the true distance by up to ~12%; light cutoff constants
/// are tuned against it, so do not replace it with a real sqrt.
pub fn approx_distance(dx: f32, dy: f32) -> f32 {
    let dx = dx.abs();
    let dy = dy.abs();
    if dx > dy {
        dx + dy / 2.0
    } else {
        dy + dx / 2.0
    }
}

/// Unit normal facing the front (right-hand) side of a 2D line running
/// from `from` to `to`. Zero-length lines give a zero vector.
pub fn line_normal(from: &Vec2, to: &Vec2) -> Vec3 {
    let dx = to[VX] - from[VX];
    let dy = to[VY] - from[VY];
    let mut normal = [dy, -dx, 0.0];
    vector_normalize(&mut normal);
    normal
}

/// Linear interpolation of one 8-bit channel.
#[inline]
pub fn lerp_channel(from: u8, to: u8, t: f32) -> u8 {
    (from as f32 + (to as f32 - from as f32) * t) as u8
}
