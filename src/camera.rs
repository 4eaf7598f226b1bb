// Camera
//
// Projection and view matrices in Vulkan conventions: depth maps to [0, 1],
// the camera looks down +Z and world -Y is up on screen.

use glam::{Mat4, Vec3, Vec4};

/// World "up" for the view helpers (Vulkan's y axis points down)
pub const DEFAULT_UP: Vec3 = Vec3::new(0.0, -1.0, 0.0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    projection: Mat4,
    view: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Box projection. `top` maps to the top of the screen (ndc y = -1).
    pub fn set_orthographic_projection(
        &mut self,
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    ) {
        // glam's `bottom` is the edge mapped to ndc y = -1
        self.projection = Mat4::orthographic_lh(left, right, top, bottom, near, far);
    }

    /// `fovy` in radians; `aspect` is width / height.
    pub fn set_perspective_projection(&mut self, fovy: f32, aspect: f32, near: f32, far: f32) {
        assert!(
            aspect.is_finite() && aspect > 0.0,
            "Camera aspect ratio must be positive, got {aspect}"
        );
        self.projection = Mat4::perspective_lh(fovy, aspect, near, far);
    }

    /// Look from `position` along `direction`.
    pub fn set_view_direction(&mut self, position: Vec3, direction: Vec3, up: Vec3) {
        let w = direction.normalize();
        let u = w.cross(up).normalize();
        let v = w.cross(u);
        self.view = view_from_basis(position, u, v, w);
    }

    /// Look from `position` at `target`.
    pub fn set_view_target(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        self.set_view_direction(position, target - position, up);
    }

    /// Camera oriented by Tait-Bryan angles (radians, applied Y, then X, then Z),
    /// the same convention as `TransformComponent`.
    pub fn set_view_yxz(&mut self, position: Vec3, rotation: Vec3) {
        let (s1, c1) = rotation.y.sin_cos();
        let (s2, c2) = rotation.x.sin_cos();
        let (s3, c3) = rotation.z.sin_cos();
        let u = Vec3::new(c1 * c3 + s1 * s2 * s3, c2 * s3, c1 * s2 * s3 - c3 * s1);
        let v = Vec3::new(c3 * s1 * s2 - c1 * s3, c2 * c3, c1 * c3 * s2 + s1 * s3);
        let w = Vec3::new(c2 * s1, -s2, c1 * c2);
        self.view = view_from_basis(position, u, v, w);
    }

    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    pub fn view(&self) -> &Mat4 {
        &self.view
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// World-to-camera transform for an orthonormal camera basis
fn view_from_basis(position: Vec3, u: Vec3, v: Vec3, w: Vec3) -> Mat4 {
    Mat4::from_cols(
        Vec4::new(u.x, v.x, w.x, 0.0),
        Vec4::new(u.y, v.y, w.y, 0.0),
        Vec4::new(u.z, v.z, w.z, 0.0),
        Vec4::new(-u.dot(position), -v.dot(position), -w.dot(position), 1.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_3};

    fn approx_mat(a: &Mat4, b: &Mat4) -> bool {
        a.abs_diff_eq(*b, 1e-5)
    }

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn default_camera_is_identity() {
        let camera = Camera::new();
        assert_eq!(camera.view_projection(), Mat4::IDENTITY);
    }

    #[test]
    fn orthographic_maps_box_to_ndc() {
        let mut camera = Camera::new();
        camera.set_orthographic_projection(-2.0, 2.0, -1.0, 1.0, 0.0, 10.0);
        let p = camera.projection();

        assert!(approx(p.project_point3(Vec3::new(-2.0, -1.0, 0.0)), Vec3::new(-1.0, -1.0, 0.0)));
        assert!(approx(p.project_point3(Vec3::new(2.0, 1.0, 10.0)), Vec3::new(1.0, 1.0, 1.0)));
        assert!(approx(p.project_point3(Vec3::ZERO), Vec3::new(0.0, 0.0, 0.0)));
    }

    #[test]
    fn perspective_depth_runs_zero_to_one() {
        let mut camera = Camera::new();
        camera.set_perspective_projection(FRAC_PI_3, 1.5, 0.1, 10.0);
        let p = camera.projection();

        assert!((p.project_point3(Vec3::new(0.0, 0.0, 0.1)).z - 0.0).abs() < 1e-5);
        assert!((p.project_point3(Vec3::new(0.0, 0.0, 10.0)).z - 1.0).abs() < 1e-5);

        // Top edge of the frustum at distance 1 lands on the ndc border
        let half = (FRAC_PI_3 / 2.0).tan();
        let edge = p.project_point3(Vec3::new(0.0, half, 1.0));
        assert!((edge.y - 1.0).abs() < 1e-5);
        let side = p.project_point3(Vec3::new(half * 1.5, 0.0, 1.0));
        assert!((side.x - 1.0).abs() < 1e-5);
    }

    #[test]
    #[should_panic(expected = "aspect ratio must be positive")]
    fn perspective_rejects_degenerate_aspect() {
        Camera::new().set_perspective_projection(FRAC_PI_3, 0.0, 0.1, 10.0);
    }

    #[test]
    fn looking_down_z_from_origin_is_identity() {
        let mut camera = Camera::new();
        camera.set_view_direction(Vec3::ZERO, Vec3::Z, DEFAULT_UP);
        assert!(approx_mat(camera.view(), &Mat4::IDENTITY));

        camera.set_view_yxz(Vec3::ZERO, Vec3::ZERO);
        assert!(approx_mat(camera.view(), &Mat4::IDENTITY));
    }

    #[test]
    fn view_moves_the_world_opposite_the_camera() {
        let mut camera = Camera::new();
        camera.set_view_direction(Vec3::new(1.0, 2.0, -5.0), Vec3::Z, DEFAULT_UP);
        let p = camera.view().transform_point3(Vec3::new(1.0, 2.0, 0.0));
        assert!(approx(p, Vec3::new(0.0, 0.0, 5.0)));
    }

    #[test]
    fn target_matches_direction() {
        let position = Vec3::new(0.0, -1.0, -3.0);
        let target = Vec3::new(0.5, 0.0, 2.0);

        let mut by_target = Camera::new();
        by_target.set_view_target(position, target, DEFAULT_UP);
        let mut by_direction = Camera::new();
        by_direction.set_view_direction(position, target - position, DEFAULT_UP);

        assert!(approx_mat(by_target.view(), by_direction.view()));
        // The target sits on the camera's forward axis
        let t = by_target.view().transform_point3(target);
        assert!(t.x.abs() < 1e-5 && t.y.abs() < 1e-5 && t.z > 0.0);
    }

    #[test]
    fn yaw_matches_looking_along_x() {
        let position = Vec3::new(3.0, 0.0, 1.0);

        let mut yaw = Camera::new();
        yaw.set_view_yxz(position, Vec3::new(0.0, FRAC_PI_2, 0.0));
        let mut direction = Camera::new();
        direction.set_view_direction(position, Vec3::X, DEFAULT_UP);

        assert!(approx_mat(yaw.view(), direction.view()));
    }
}
