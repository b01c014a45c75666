// r_view.rs - view setup: viewport, projection and modelview matrices
//
// Matrices are column-major, laid out the way glLoadMatrixf expects.

use qview_common::q_shared::{cross_product, dot_product, vector_add, vector_normalize, vector_subtract, Vec3};

pub type Mat4 = [f32; 16];

/// World up axis.
pub const VIEW_UP: Vec3 = [0.0, 0.0, 1.0];

pub fn identity() -> Mat4 {
    let mut m = [0.0; 16];
    m[0] = 1.0;
    m[5] = 1.0;
    m[10] = 1.0;
    m[15] = 1.0;
    m
}

/// glFrustum.
pub fn frustum(left: f32, right: f32, bottom: f32, top: f32, z_near: f32, z_far: f32) -> Mat4 {
    let mut m = [0.0; 16];
    m[0] = 2.0 * z_near / (right - left);
    m[5] = 2.0 * z_near / (top - bottom);
    m[8] = (right + left) / (right - left);
    m[9] = (top + bottom) / (top - bottom);
    m[10] = -(z_far + z_near) / (z_far - z_near);
    m[11] = -1.0;
    m[14] = -2.0 * z_far * z_near / (z_far - z_near);
    m
}

/// gluLookAt.
pub fn look_at(eye: &Vec3, center: &Vec3, up: &Vec3) -> Mat4 {
    let mut f = vector_subtract(center, eye);
    vector_normalize(&mut f);

    let mut s = cross_product(&f, up);
    if vector_normalize(&mut s) == 0.0 {
        // looking along the up axis
        s = cross_product(&f, &[0.0, 1.0, 0.0]);
        vector_normalize(&mut s);
    }
    let u = cross_product(&s, &f);

    let mut m = identity();
    m[0] = s[0];
    m[4] = s[1];
    m[8] = s[2];
    m[1] = u[0];
    m[5] = u[1];
    m[9] = u[2];
    m[2] = -f[0];
    m[6] = -f[1];
    m[10] = -f[2];
    m[12] = -dot_product(&s, eye);
    m[13] = -dot_product(&u, eye);
    m[14] = dot_product(&f, eye);
    m
}

/// Applies `m` to the point `(p, 1)`.
pub fn transform_point(m: &Mat4, p: &Vec3) -> [f32; 4] {
    let mut out = [0.0; 4];
    for (row, o) in out.iter_mut().enumerate() {
        *o = m[row] * p[0] + m[4 + row] * p[1] + m[8 + row] * p[2] + m[12 + row];
    }
    out
}

/// Everything the backend needs to set up a frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewSetup {
    /// x, y, width, height
    pub viewport: [u32; 4],
    pub projection: Mat4,
    pub modelview: Mat4,
    pub origin: Vec3,
    pub forward: Vec3,
}

impl ViewSetup {
    /// Symmetric frustum one unit wide at the near plane, with the height
    /// following the viewport aspect ratio, looking from `origin` along
    /// `forward` with +Z up.
    pub fn new(width: u32, height: u32, z_near: f32, z_far: f32, origin: Vec3, forward: Vec3) -> Self {
        let aspect = if width == 0 { 1.0 } else { height as f32 / width as f32 };
        Self {
            viewport: [0, 0, width, height],
            projection: frustum(-1.0, 1.0, -aspect, aspect, z_near, z_far),
            modelview: look_at(&origin, &vector_add(&origin, &forward), &VIEW_UP),
            origin,
            forward,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_frustum_matches_gl() {
        let m = frustum(-1.0, 1.0, -0.75, 0.75, 1.0, 5000.0);
        assert!(close(m[0], 1.0));
        assert!(close(m[5], 1.0 / 0.75));
        assert_eq!(m[8], 0.0);
        assert_eq!(m[11], -1.0);
        assert_eq!(m[15], 0.0);

        // near plane maps to -1, far to +1 in NDC
        let near = transform_point(&m, &[0.0, 0.0, -1.0]);
        assert!(close(near[2] / near[3], -1.0));
        let far = transform_point(&m, &[0.0, 0.0, -5000.0]);
        assert!(close(far[2] / far[3], 1.0));
    }

    #[test]
    fn test_look_at_puts_target_down_negative_z() {
        let eye = [540.0, 260.0, 100.0];
        let m = look_at(&eye, &[540.0, 360.0, 100.0], &VIEW_UP);
        let p = transform_point(&m, &[540.0, 360.0, 100.0]);
        assert!(close(p[0], 0.0));
        assert!(close(p[1], 0.0));
        assert!(close(p[2], -100.0));

        // +Z in the world is up on screen
        let up = transform_point(&m, &[540.0, 360.0, 110.0]);
        assert!(close(up[1], 10.0));
    }

    #[test]
    fn test_look_at_straight_up() {
        let m = look_at(&[0.0; 3], &[0.0, 0.0, 1.0], &VIEW_UP);
        let p = transform_point(&m, &[0.0, 0.0, 5.0]);
        assert!(close(p[2], -5.0));
    }

    #[test]
    fn test_view_setup() {
        let view = ViewSetup::new(640, 480, 1.0, 5000.0, [1.0, 2.0, 3.0], [1.0, 0.0, 0.0]);
        assert_eq!(view.viewport, [0, 0, 640, 480]);
        assert!(close(view.projection[5], 1.0 / 0.75));
        let p = transform_point(&view.modelview, &[11.0, 2.0, 3.0]);
        assert!(close(p[2], -10.0));
    }
}
