use bevy_ecs::prelude::*;
use log::debug;

use crate::components::sprite::Sprite;
use crate::gpu::GpuBackend;
use crate::resources::renderstats::RenderStats;
use crate::resources::spritecache::SpriteDefinitionCache;
use crate::resources::texturecache::TextureCache;
use crate::resources::viewport::Viewport;

/// Faces submitted per sprite quad.
const FACES_PER_QUAD: u64 = 2;

/// Draw every [`Sprite`] in the world through `gpu`.
///
/// Sprites are submitted in query order; culling and visibility gates live
/// in [`Sprite::draw`]. GPU objects queued for release since the last frame
/// are deleted first. [`RenderStats`] is updated when present.
pub fn render_sprites(world: &mut World, gpu: &mut dyn GpuBackend) {
    let viewport = *world.resource::<Viewport>();

    let (drawn, skipped) = world.resource_scope(|world, mut textures: Mut<TextureCache>| {
        textures.release_pending(&mut *gpu);

        let mut query = world.query::<&Sprite>();
        let defs = world.resource::<SpriteDefinitionCache>();
        let mut drawn = 0u32;
        let mut skipped = 0u32;
        for sprite in query.iter(world) {
            if sprite.draw(defs, &mut textures, &viewport, &mut *gpu) {
                drawn += 1;
            } else {
                skipped += 1;
            }
        }
        (drawn, skipped)
    });

    if let Some(mut stats) = world.get_resource_mut::<RenderStats>() {
        stats.drawn = drawn;
        stats.skipped = skipped;
        stats.faces += drawn as u64 * FACES_PER_QUAD;
        stats.frames += 1;
    }
}

/// Free every sprite definition and texture, deleting their GPU objects.
///
/// Call once at shutdown while the GPU context is still alive. Running it
/// again is harmless.
pub fn cleanup_render_resources(world: &mut World, gpu: &mut dyn GpuBackend) {
    let sprites = world
        .get_resource_mut::<SpriteDefinitionCache>()
        .map(|mut defs| defs.free_all())
        .unwrap_or(0);
    let textures = world
        .get_resource_mut::<TextureCache>()
        .map(|mut textures| textures.free_all(gpu))
        .unwrap_or(0);
    debug!(
        "Released render resources: {} sprites, {} textures",
        sprites, textures
    );
}
