use bevy_ecs::prelude::Resource;

#[derive(Resource, Clone, Copy)]
pub struct WorldTime {
    pub elapsed: f32,
    pub delta: f32,
    pub time_scale: f32,
}

impl Default for WorldTime {
    fn default() -> Self {
        WorldTime {
            elapsed: 0.0,
            delta: 0.0,
            time_scale: 1.0,
        }
    }
}

impl WorldTime {
    /// Scaled time since startup in whole milliseconds; sprite timestamps use this clock.
    pub fn elapsed_msec(&self) -> u64 {
        (self.elapsed.max(0.0) as f64 * 1000.0) as u64
    }
}
