//! Sprite viewer entry point.
//!
//! Loads a sprite configuration and shows sprites with:
//! - **raylib** for the window and the rlgl GPU backend
//! - **bevy_ecs** for the world, resources and systems
//!
//! # Modes
//!
//! - default: open a window and animate the sprites named with `--show`
//!   (every defined sprite when none is given), laid out in a row
//! - `--headless`: run `--frames` frames against the recording backend and
//!   log render statistics
//! - `--list`: print every sprite definition as JSON and exit
//!
//! # Running
//!
//! ```sh
//! cargo run --release -- --sprites assets/sprites.cfg --show ship --show explosion
//! ```

// Do not create console on Windows
#![cfg_attr(target_os = "windows", windows_subsystem = "windows")]

use std::path::PathBuf;

use bevy_ecs::prelude::*;
use clap::Parser;
use log::{info, warn};
use raylib::prelude::*;

use spriteforge::components::sprite::Sprite;
use spriteforge::gpu::{GpuBackend, RecordingGpu, RlglGpu};
use spriteforge::resources::gameconfig::GameConfig;
use spriteforge::resources::renderstats::RenderStats;
use spriteforge::resources::spritecache::SpriteDefinitionCache;
use spriteforge::resources::texturecache::TextureCache;
use spriteforge::resources::worldtime::WorldTime;
use spriteforge::systems::animation::sprite_animation;
use spriteforge::systems::render::{cleanup_render_resources, render_sprites};
use spriteforge::systems::time::update_world_time;
use spriteforge::texture::FileDecoder;

/// Gap between showcased sprites, in render units.
const SHOWCASE_GAP: f32 = 8.0;

/// spriteforge sprite viewer
#[derive(Parser)]
#[command(version, about = "Preview sprites defined in a spriteforge sprite config.")]
struct Cli {
    /// INI configuration file.
    #[arg(long, value_name = "PATH", default_value = "./config.ini")]
    config: PathBuf,

    /// Sprite configuration file (overrides `[assets] sprites`).
    #[arg(long, value_name = "PATH")]
    sprites: Option<PathBuf>,

    /// Sprite to show; repeat for several. Shows every sprite when omitted.
    #[arg(long = "show", value_name = "NAME")]
    show: Vec<String>,

    /// Render without a window using the recording backend.
    #[arg(long)]
    headless: bool,

    /// Frames to run in headless mode.
    #[arg(long, default_value_t = 60)]
    frames: u32,

    /// Print sprite definitions as JSON and exit.
    #[arg(long)]
    list: bool,
}

/// Build the world and its resources from the configuration.
fn setup_world(config: GameConfig) -> World {
    let mut world = World::new();
    world.insert_resource(WorldTime::default());
    world.insert_resource(config.viewport());
    world.insert_resource(RenderStats::default());
    world.insert_resource(TextureCache::new(config.render_scale));
    world.insert_resource(SpriteDefinitionCache::new());
    world.insert_resource(config);
    world
}

/// Parse the configured sprite file into the world's caches.
fn load_sprites(world: &mut World, gpu: &mut dyn GpuBackend) -> usize {
    let path = world.resource::<GameConfig>().sprites_path.clone();
    world.resource_scope(|world, mut textures: Mut<TextureCache>| {
        let mut defs = world.resource_mut::<SpriteDefinitionCache>();
        let added = defs.parse_file(&path, &mut textures, &FileDecoder, gpu);
        info!(
            "Loaded {} sprites from {:?} ({} textures)",
            added,
            path,
            textures.len()
        );
        added
    })
}

/// Spawn one sprite per name, left to right, vertically centred.
fn spawn_showcase(world: &mut World, names: &[String]) -> usize {
    let render_height = world.resource::<GameConfig>().render_height as f32;
    let now = world.resource::<WorldTime>().elapsed_msec();
    let sprites: Vec<Sprite> = {
        let defs = world.resource::<SpriteDefinitionCache>();
        let names: Vec<String> = if names.is_empty() {
            let mut all: Vec<String> = defs.names().map(str::to_string).collect();
            all.sort();
            all
        } else {
            names.to_vec()
        };
        if names.is_empty() {
            warn!("No sprites to show");
        }

        let mut cursor = SHOWCASE_GAP;
        names
            .iter()
            .filter_map(|name| {
                let mut sprite = Sprite::named(name, defs, now);
                if !sprite.is_bound() {
                    return None;
                }
                sprite.origin = Vector2 {
                    x: cursor,
                    y: (render_height - sprite.size.y) / 2.0,
                };
                cursor += sprite.size.x + SHOWCASE_GAP;
                Some(sprite)
            })
            .collect()
    };
    let count = sprites.len();
    for sprite in sprites {
        world.spawn(sprite);
    }
    count
}

fn run_list(mut world: World) {
    let mut gpu = RecordingGpu::new();
    load_sprites(&mut world, &mut gpu);
    let infos = {
        let defs = world.resource::<SpriteDefinitionCache>();
        defs.describe(world.resource::<TextureCache>())
    };
    match serde_json::to_string_pretty(&infos) {
        Ok(json) => println!("{}", json),
        Err(e) => warn!("Failed to serialize sprite list: {}", e),
    }
    cleanup_render_resources(&mut world, &mut gpu);
}

fn run_headless(mut world: World, mut update: Schedule, names: &[String], frames: u32) {
    let mut gpu = RecordingGpu::new();
    load_sprites(&mut world, &mut gpu);
    let shown = spawn_showcase(&mut world, names);

    let fps = world.resource::<GameConfig>().target_fps.max(1);
    let dt = 1.0 / fps as f32;
    let mut uploads = 0;
    for _ in 0..frames {
        update_world_time(&mut world, dt);
        update.run(&mut world);
        render_sprites(&mut world, &mut gpu);
        uploads += gpu.upload_count();
        gpu.clear();
    }

    let stats = *world.resource::<RenderStats>();
    info!(
        "Headless run: {} frames, {} sprites shown, {} drawn / {} skipped last frame, {} faces, {} texture uploads",
        stats.frames, shown, stats.drawn, stats.skipped, stats.faces, uploads
    );
    cleanup_render_resources(&mut world, &mut gpu);
}

fn run_window(mut world: World, mut update: Schedule, names: &[String]) {
    let config = world.resource::<GameConfig>().clone();
    let mut builder = raylib::init();
    builder
        .size(config.window_width as i32, config.window_height as i32)
        .resizable()
        .title("spriteview");
    if config.vsync {
        builder.vsync();
    }
    let (mut rl, thread) = builder.build();
    rl.set_target_fps(config.target_fps);

    let mut gpu = RlglGpu::new();
    load_sprites(&mut world, &mut gpu);
    spawn_showcase(&mut world, names);

    while !rl.window_should_close() {
        let dt = rl.get_frame_time();
        update_world_time(&mut world, dt);
        update.run(&mut world);

        // Stretch the render area over the window.
        let scale_x = rl.get_screen_width() as f32 / config.render_width.max(1) as f32;
        let scale_y = rl.get_screen_height() as f32 / config.render_height.max(1) as f32;

        let mut d = rl.begin_drawing(&thread);
        d.clear_background(Color::DARKGRAY);
        gpu.push_matrix();
        gpu.scale(scale_x, scale_y);
        render_sprites(&mut world, &mut gpu);
        gpu.pop_matrix();
        d.draw_fps(4, 4);
    }

    // The GL context must still be alive here.
    cleanup_render_resources(&mut world, &mut gpu);
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = GameConfig::new();
    if let Err(e) = config.load_from_file(&cli.config) {
        warn!("{}; using defaults", e);
    }
    if let Some(sprites) = cli.sprites {
        config.sprites_path = sprites;
    }

    let world = setup_world(config);
    if cli.list {
        run_list(world);
        return;
    }

    let mut update = Schedule::default();
    update.add_systems(sprite_animation);

    if cli.headless {
        run_headless(world, update, &cli.show, cli.frames);
    } else {
        run_window(world, update, &cli.show);
    }
}
