//! Visible viewport resource.
//!
//! Describes the world-space rectangle that ends up on screen: the camera
//! origin (when the camera is on) and the scaled render size. Sprite drawing
//! culls against it before issuing any GPU work.

use bevy_ecs::prelude::Resource;
use raylib::prelude::Vector2;

/// World-space rectangle visible this frame.
#[derive(Resource, Clone, Copy, Debug)]
pub struct Viewport {
    /// Top-left corner of the camera in world units.
    pub camera: Vector2,
    /// When off, the viewport starts at the world origin.
    pub camera_on: bool,
    /// Render width in world units.
    pub width: f32,
    /// Render height in world units.
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            camera: Vector2 { x: 0.0, y: 0.0 },
            camera_on: false,
            width,
            height,
        }
    }

    /// Point the camera at `camera` and turn it on.
    pub fn with_camera(mut self, camera: Vector2) -> Self {
        self.camera = camera;
        self.camera_on = true;
        self
    }

    /// Top-left corner of the visible rectangle.
    pub fn origin(&self) -> Vector2 {
        if self.camera_on {
            self.camera
        } else {
            Vector2 { x: 0.0, y: 0.0 }
        }
    }

    /// Whether the rectangle at `origin` with `size` overlaps the viewport.
    ///
    /// Rectangles that only touch an edge do not overlap.
    pub fn intersects(&self, origin: Vector2, size: Vector2) -> bool {
        let view = self.origin();
        origin.x < view.x + self.width
            && view.x < origin.x + size.x
            && origin.y < view.y + self.height
            && view.y < origin.y + size.y
    }
}
