//! Viewer configuration resource.
//!
//! Settings loaded from an INI configuration file. Defaults allow a safe
//! start without any file; missing keys keep their current values.
//!
//! # Configuration File Format
//!
//! ```ini
//! [render]
//! width = 640
//! height = 360
//! scale = 2
//!
//! [window]
//! width = 1280
//! height = 720
//! vsync = true
//! target_fps = 60
//!
//! [assets]
//! sprites = ./assets/sprites.cfg
//! ```

use bevy_ecs::prelude::*;
use configparser::ini::Ini;
use log::info;
use std::path::{Path, PathBuf};

use crate::resources::texturecache::{DEFAULT_RENDER_SCALE, MAX_RENDER_SCALE};
use crate::resources::viewport::Viewport;

/// Default safe values for startup
const DEFAULT_RENDER_WIDTH: u32 = 640;
const DEFAULT_RENDER_HEIGHT: u32 = 360;
const DEFAULT_WINDOW_WIDTH: u32 = 1280;
const DEFAULT_WINDOW_HEIGHT: u32 = 720;
const DEFAULT_TARGET_FPS: u32 = 60;
const DEFAULT_VSYNC: bool = true;
const DEFAULT_SPRITES_PATH: &str = "./assets/sprites.cfg";

/// Viewer configuration resource.
#[derive(Resource, Debug, Clone)]
pub struct GameConfig {
    /// Logical render width in world units.
    pub render_width: u32,
    /// Logical render height in world units.
    pub render_height: u32,
    /// Magnification applied to textures sampled smoothly (1 to 16).
    pub render_scale: u32,
    /// Window width in pixels.
    pub window_width: u32,
    /// Window height in pixels.
    pub window_height: u32,
    /// Target frames per second.
    pub target_fps: u32,
    /// Enable vertical sync.
    pub vsync: bool,
    /// Sprite configuration file parsed at startup.
    pub sprites_path: PathBuf,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl GameConfig {
    /// Create a new configuration with safe default values.
    pub fn new() -> Self {
        Self {
            render_width: DEFAULT_RENDER_WIDTH,
            render_height: DEFAULT_RENDER_HEIGHT,
            render_scale: DEFAULT_RENDER_SCALE,
            window_width: DEFAULT_WINDOW_WIDTH,
            window_height: DEFAULT_WINDOW_HEIGHT,
            target_fps: DEFAULT_TARGET_FPS,
            vsync: DEFAULT_VSYNC,
            sprites_path: PathBuf::from(DEFAULT_SPRITES_PATH),
        }
    }

    /// Load configuration from an INI file.
    ///
    /// Missing values retain their current values. Returns an error if the
    /// file cannot be read or parsed.
    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<(), String> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|e| format!("Failed to load config file {:?}: {}", path, e))?;

        // [render] section
        if let Some(width) = config.getuint("render", "width").ok().flatten() {
            self.render_width = width as u32;
        }
        if let Some(height) = config.getuint("render", "height").ok().flatten() {
            self.render_height = height as u32;
        }
        if let Some(scale) = config.getuint("render", "scale").ok().flatten() {
            self.render_scale = scale.clamp(1, MAX_RENDER_SCALE as u64) as u32;
        }

        // [window] section
        if let Some(width) = config.getuint("window", "width").ok().flatten() {
            self.window_width = width as u32;
        }
        if let Some(height) = config.getuint("window", "height").ok().flatten() {
            self.window_height = height as u32;
        }
        if let Some(fps) = config.getuint("window", "target_fps").ok().flatten() {
            self.target_fps = fps as u32;
        }
        if let Some(vsync) = config.getbool("window", "vsync").ok().flatten() {
            self.vsync = vsync;
        }

        // [assets] section
        if let Some(sprites) = config.get("assets", "sprites") {
            self.sprites_path = PathBuf::from(sprites);
        }

        info!(
            "Loaded config: {}x{} render (scale {}), {}x{} window, fps={}, vsync={}, sprites={:?}",
            self.render_width,
            self.render_height,
            self.render_scale,
            self.window_width,
            self.window_height,
            self.target_fps,
            self.vsync,
            self.sprites_path
        );

        Ok(())
    }

    /// Save configuration to an INI file, creating it if needed.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), String> {
        let path = path.as_ref();
        let mut config = Ini::new();

        config.set("render", "width", Some(self.render_width.to_string()));
        config.set("render", "height", Some(self.render_height.to_string()));
        config.set("render", "scale", Some(self.render_scale.to_string()));

        config.set("window", "width", Some(self.window_width.to_string()));
        config.set("window", "height", Some(self.window_height.to_string()));
        config.set("window", "target_fps", Some(self.target_fps.to_string()));
        config.set("window", "vsync", Some(self.vsync.to_string()));

        config.set(
            "assets",
            "sprites",
            Some(self.sprites_path.to_string_lossy().into_owned()),
        );

        config
            .write(path)
            .map_err(|e| format!("Failed to save config file {:?}: {}", path, e))?;

        info!("Saved config to {:?}", path);

        Ok(())
    }

    /// Get the window size.
    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }

    /// Viewport covering the render area with the camera off.
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.render_width as f32, self.render_height as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GameConfig::default();
        assert_eq!(config.render_scale, DEFAULT_RENDER_SCALE);
        assert_eq!(config.window_size(), (1280, 720));
        let vp = config.viewport();
        assert_eq!((vp.width, vp.height), (640.0, 360.0));
        assert!(!vp.camera_on);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(
            &path,
            "[render]\nwidth = 320\nscale = 0\n\n[assets]\nsprites = data/sprites.cfg\n",
        )
        .unwrap();

        let mut config = GameConfig::new();
        config.load_from_file(&path).unwrap();
        assert_eq!(config.render_width, 320);
        assert_eq!(config.render_height, 360);
        assert_eq!(config.render_scale, 1);
        assert_eq!(config.sprites_path, PathBuf::from("data/sprites.cfg"));
        assert!(config.vsync);
    }

    #[test]
    fn test_huge_scale_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[render]\nscale = 4294967296000\n").unwrap();
        let mut config = GameConfig::new();
        config.load_from_file(&path).unwrap();
        assert_eq!(config.render_scale, MAX_RENDER_SCALE);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GameConfig::new();
        let err = config.load_from_file(dir.path().join("nope.ini")).unwrap_err();
        assert!(err.starts_with("Failed to load config file"));
        assert_eq!(config.render_width, 640);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.ini");
        let mut config = GameConfig::new();
        config.render_scale = 4;
        config.target_fps = 30;
        config.vsync = false;
        config.save_to_file(&path).unwrap();

        let mut loaded = GameConfig::new();
        loaded.load_from_file(&path).unwrap();
        assert_eq!(loaded.render_scale, 4);
        assert_eq!(loaded.target_fps, 30);
        assert!(!loaded.vsync);
    }
}
