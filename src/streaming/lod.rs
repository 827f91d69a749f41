//! Screen-space level of detail metrics
//!
//! A node is refined into its children while its projected size on screen
//! exceeds a fraction of the viewport height.

use crate::core::view::ViewState;
use crate::math::Aabb;

/// Projected size of a box in pixels.
///
/// `viewport_h / 2 * size / (tan(fov / 2) * distance)`, where `size` is the
/// largest edge of the box and `distance` is measured from the camera to the
/// box center. The result is clamped to `[0, viewport_h]`; a camera inside the
/// box yields `viewport_h`.
///
/// # Examples
/// ```
/// use pointstream::core::{DVec3, ViewState};
/// use pointstream::math::Aabb;
/// use pointstream::streaming::lod::projected_size;
///
/// let view = ViewState::look_at(DVec3::new(0.0, 0.0, 10.0), DVec3::ZERO, 90.0, 800, 600);
/// let bbox = Aabb::new(DVec3::splat(-1.0), DVec3::splat(1.0));
/// assert!((projected_size(&bbox, &view) - 60.0).abs() < 1e-9);
/// ```
pub fn projected_size(bbox: &Aabb, view: &ViewState) -> f64 {
    let height = view.viewport_height as f64;
    let camera = view.camera_position();
    if bbox.contains_point(camera) {
        return height;
    }

    let distance = camera.distance(bbox.center());
    let size = bbox.max_extent();
    let projected = height * 0.5 * size / (view.tan_half_fov() * distance);
    if projected.is_nan() {
        return 0.0;
    }
    projected.clamp(0.0, height)
}

/// Projected size above which a node is refined
///
/// # Examples
/// ```
/// use pointstream::streaming::lod::size_threshold;
///
/// assert_eq!(size_threshold(0.5, 600), 300.0);
/// assert_eq!(size_threshold(1.0, 600), 600.0);
/// assert_eq!(size_threshold(7.0, 600), 600.0); // modifier clamped to 1
/// ```
pub fn size_threshold(modifier: f64, viewport_height: u32) -> f64 {
    modifier.clamp(0.0, 1.0) * viewport_height as f64
}

/// True when a node of this projected size should be refined
pub fn should_refine(projected: f64, threshold: f64) -> bool {
    projected > threshold
}
