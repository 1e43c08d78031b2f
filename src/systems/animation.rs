//! Sprite animation system.
//!
//! Advances every [`Sprite`] along its definition's `next` chain using the
//! [`WorldTime`] clock. Sprites without a successor, or whose delay has not
//! elapsed yet, are left untouched.
//!
//! # Related
//!
//! - [`crate::components::sprite::Sprite::animate`] – per-instance transition rule
//! - [`crate::resources::spritecache::SpriteDefinitionCache`] – where the chain is defined

use bevy_ecs::prelude::*;

use crate::components::sprite::Sprite;
use crate::resources::spritecache::SpriteDefinitionCache;
use crate::resources::worldtime::WorldTime;

/// Animate every sprite against the current world time.
pub fn sprite_animation(
    mut query: Query<&mut Sprite>,
    defs: Res<SpriteDefinitionCache>,
    time: Res<WorldTime>,
) {
    let now = time.elapsed_msec();
    for mut sprite in query.iter_mut() {
        sprite.animate(&defs, now);
    }
}
