/// Column-major 4x4 matrix, laid out the way WGSL `mat4x4<f32>` expects.
pub type Mat4 = [f32; 16];

pub const IDENTITY: Mat4 = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Orthographic projection of the `[left, right] x [bottom, top]` box onto
/// clip space, with depth fixed to the `[-1, 1]` slab.
pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32) -> Mat4 {
    let mut m = IDENTITY;
    m[0] = 2.0 / (right - left);
    m[5] = 2.0 / (top - bottom);
    m[10] = -1.0;
    m[12] = -(right + left) / (right - left);
    m[13] = -(top + bottom) / (top - bottom);
    m
}

/// Maps normalized image coordinates (origin top-left, y down) to clip space.
pub fn normalized_image_projection() -> Mat4 {
    orthographic(0.0, 1.0, 1.0, 0.0)
}
