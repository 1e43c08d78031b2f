//! Per-frame render counters.

use bevy_ecs::prelude::Resource;

/// Counters updated by [`render_sprites`](crate::systems::render::render_sprites).
#[derive(Resource, Clone, Copy, Debug, Default)]
pub struct RenderStats {
    /// Sprites that submitted a quad in the last frame.
    pub drawn: u32,
    /// Sprites skipped in the last frame (unbound, hidden or culled).
    pub skipped: u32,
    /// Triangles submitted since startup.
    pub faces: u64,
    /// Frames rendered since startup.
    pub frames: u64,
}
