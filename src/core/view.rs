//! Per-frame view state handed over by the renderer

use crate::core::types::{DMat4, DVec3};

/// View and projection of the current frame plus the viewport size.
///
/// Everything is double precision so that world-scale coordinates survive
/// without re-centering.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewState {
    /// World to camera transform
    pub view: DMat4,
    /// Camera to clip transform (perspective)
    pub projection: DMat4,
    /// Viewport width in pixels
    pub viewport_width: u32,
    /// Viewport height in pixels
    pub viewport_height: u32,
}

impl ViewState {
    /// Create a view state from explicit matrices
    pub fn new(view: DMat4, projection: DMat4, viewport_width: u32, viewport_height: u32) -> Self {
        Self {
            view,
            projection,
            viewport_width,
            viewport_height,
        }
    }

    /// Create a perspective view looking from `eye` at `target`
    pub fn look_at(
        eye: DVec3,
        target: DVec3,
        fov_y_degrees: f64,
        viewport_width: u32,
        viewport_height: u32,
    ) -> Self {
        let aspect = viewport_width.max(1) as f64 / viewport_height.max(1) as f64;
        let view = DMat4::look_at_rh(eye, target, DVec3::Y);
        let projection = DMat4::perspective_rh(fov_y_degrees.to_radians(), aspect, 0.01, 1.0e7);
        Self::new(view, projection, viewport_width, viewport_height)
    }

    /// Get combined view-projection matrix
    pub fn view_projection(&self) -> DMat4 {
        self.projection * self.view
    }

    /// Camera position in world space
    pub fn camera_position(&self) -> DVec3 {
        self.view.inverse().w_axis.truncate()
    }

    /// tan(fov_y / 2), recovered from the projection matrix
    pub fn tan_half_fov(&self) -> f64 {
        let y_scale = self.projection.y_axis.y;
        if y_scale.abs() <= f64::EPSILON {
            1.0
        } else {
            1.0 / y_scale.abs()
        }
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::look_at(DVec3::new(0.0, 0.0, 5.0), DVec3::ZERO, 60.0, 1280, 720)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_position_roundtrip() {
        let eye = DVec3::new(10.0, -4.0, 250.0);
        let view = ViewState::look_at(eye, DVec3::ZERO, 60.0, 800, 600);
        let pos = view.camera_position();
        assert!((pos - eye).length() < 1e-9);
    }

    #[test]
    fn test_tan_half_fov() {
        let view = ViewState::look_at(DVec3::new(0.0, 0.0, 5.0), DVec3::ZERO, 90.0, 800, 600);
        assert!((view.tan_half_fov() - 1.0).abs() < 1e-9);

        let view = ViewState::look_at(DVec3::new(0.0, 0.0, 5.0), DVec3::ZERO, 60.0, 800, 600);
        let expected = (30.0_f64).to_radians().tan();
        assert!((view.tan_half_fov() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_view_matrix_translation() {
        let view = ViewState::look_at(DVec3::new(10.0, 0.0, 0.0), DVec3::new(10.0, 0.0, -1.0), 60.0, 800, 600);
        let origin_in_camera = view.view.transform_point3(DVec3::ZERO);
        assert!((origin_in_camera.x - (-10.0)).abs() < 1e-9);
    }
}
