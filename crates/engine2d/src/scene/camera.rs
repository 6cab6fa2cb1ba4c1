//! Scene camera
//!
//! World units are converted to pixels with `pixel_ratio * zoom`. Screen
//! points have their origin at the bottom-left corner of the surface, with Y
//! growing upward like the world.

use crate::foundation::math::Vector;
use crate::spatial::Aabb;

use super::SceneError;

/// Smallest allowed zoom
pub const MIN_ZOOM: f32 = 0.1;

/// Largest allowed zoom
pub const MAX_ZOOM: f32 = 10.0;

/// Margin added around the frame when culling, in world units
pub const CULL_MARGIN: f32 = 0.5;

/// View parameters of the main camera
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub(crate) position: Vector,
    resolution: Vector,
    pixel_ratio: f32,
    zoom: f32,
}

impl Camera {
    /// Camera at the origin
    pub const fn new(resolution: Vector, pixel_ratio: f32) -> Self {
        Self {
            position: Vector::zero(),
            resolution,
            pixel_ratio,
            zoom: 1.0,
        }
    }

    /// World position of the frame center
    pub const fn position(&self) -> Vector {
        self.position
    }

    /// Surface size in pixels
    pub const fn resolution(&self) -> Vector {
        self.resolution
    }

    pub(crate) fn set_resolution(&mut self, resolution: Vector) {
        self.resolution = resolution;
    }

    /// Pixels per world unit at zoom 1
    pub const fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    /// Current zoom
    pub const fn zoom(&self) -> f32 {
        self.zoom
    }

    pub(crate) fn set_zoom(&mut self, zoom: f32) -> Result<(), SceneError> {
        if !(MIN_ZOOM..=MAX_ZOOM).contains(&zoom) {
            return Err(SceneError::InvalidZoom(zoom));
        }
        self.zoom = zoom;
        Ok(())
    }

    /// Pixels per world unit, zoom included
    pub fn ratio(&self) -> f32 {
        self.pixel_ratio * self.zoom
    }

    /// Visible extent in world units
    pub fn frame_size(&self) -> Vector {
        self.resolution / self.ratio()
    }

    /// Visible region in world units
    pub fn frame(&self) -> Aabb {
        Aabb::from_center(self.position, self.frame_size())
    }

    /// Extent searched when collecting renderable entities
    pub fn culling_size(&self) -> Vector {
        (self.resolution / self.pixel_ratio + Vector::unit() * CULL_MARGIN) / self.zoom
    }

    /// Whether a box centered at `position` with `size` overlaps the frame.
    /// Boxes that only touch the frame edge are outside.
    pub fn in_frame(&self, position: Vector, size: Vector) -> bool {
        let frame = self.frame_size();
        let size = size.abs();
        let dist = (position - self.position).abs();
        let depth_x = (frame.x + size.x) / 2.0 - dist.x;
        let depth_y = (frame.y + size.y) / 2.0 - dist.y;
        depth_x > 0.0 && depth_y > 0.0
    }

    /// Screen point (origin bottom-left) to world position
    pub fn screen_to_world(&self, screen: Vector) -> Vector {
        self.position + (screen - self.resolution / 2.0) / self.ratio()
    }

    /// World position to screen point (origin bottom-left)
    pub fn world_to_screen(&self, world: Vector) -> Vector {
        (world - self.position) * self.ratio() + self.resolution / 2.0
    }

    /// World-space length in pixels
    pub fn unit_to_pixels(&self, units: f32) -> f32 {
        units * self.ratio()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_frame_from_resolution_and_ratio() {
        let camera = Camera::new(Vector::new(640.0, 640.0), 64.0);
        assert_eq!(camera.frame_size(), Vector::new(10.0, 10.0));
        assert!(camera.in_frame(Vector::zero(), Vector::new(2.0, 2.0)));
        assert!(!camera.in_frame(Vector::new(-6.0, 0.0), Vector::new(2.0, 2.0)));
        assert!(camera.in_frame(Vector::new(-5.9, 0.0), Vector::new(2.0, 2.0)));
    }

    #[test]
    fn test_zoom_bounds() {
        let mut camera = Camera::new(Vector::new(640.0, 640.0), 64.0);
        assert!(camera.set_zoom(2.0).is_ok());
        assert_eq!(camera.frame_size(), Vector::new(5.0, 5.0));
        assert!(matches!(camera.set_zoom(0.05), Err(SceneError::InvalidZoom(_))));
        assert!(camera.set_zoom(10.5).is_err());
        assert!((camera.zoom() - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_screen_world_round_trip() {
        let mut camera = Camera::new(Vector::new(800.0, 600.0), 50.0);
        camera.position = Vector::new(3.0, -2.0);
        assert_abs_diff_eq!(camera.screen_to_world(Vector::new(400.0, 300.0)), camera.position);
        assert_abs_diff_eq!(camera.screen_to_world(Vector::zero()), Vector::new(-5.0, -8.0));
        let world = Vector::new(1.25, 0.5);
        assert_abs_diff_eq!(
            camera.screen_to_world(camera.world_to_screen(world)),
            world,
            epsilon = 1e-4
        );
    }
}
