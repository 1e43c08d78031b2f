//! Time update system.
//!
//! Updates the shared [`WorldTime`](crate::resources::worldtime::WorldTime)
//! resource once per frame, applying `time_scale` to the provided delta.
//! Sprite animation reads the resulting clock through
//! [`WorldTime::elapsed_msec`], so pausing (`time_scale = 0`) freezes it.
use bevy_ecs::prelude::*;

use crate::resources::worldtime::WorldTime;

/// Update elapsed and delta seconds on the `WorldTime` resource.
///
/// `dt` is expected to be the unscaled frame delta in seconds. The system
/// applies the current `time_scale` and writes both `elapsed` and `delta`.
pub fn update_world_time(world: &mut World, dt: f32) {
    let mut wt = world.resource_mut::<WorldTime>();
    let scaled_dt = dt * wt.time_scale;
    wt.elapsed += scaled_dt;
    wt.delta = scaled_dt;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_scale_applies_to_elapsed() {
        let mut world = World::new();
        world.insert_resource(WorldTime::default());
        update_world_time(&mut world, 0.5);
        world.resource_mut::<WorldTime>().time_scale = 0.0;
        update_world_time(&mut world, 0.5);
        let wt = world.resource::<WorldTime>();
        assert_eq!(wt.elapsed_msec(), 500);
        assert_eq!(wt.delta, 0.0);
    }
}
