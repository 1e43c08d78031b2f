//! Texture cache resource.
//!
//! Maps image paths to loaded, GPU-resident [`Texture`]s through a
//! [`NamedRegistry`]. Loading the same path twice returns the same handle.
//! A path that fails to decode is still registered but stays unrenderable;
//! drawing with it degrades to untextured geometry.
//!
//! GPU objects are released through a deferred queue: the registry's cleanup
//! hook drops the surface and posts the GPU handle to a channel, and the cache
//! drains that channel into the backend whenever it is handed one
//! ([`TextureCache::free`], [`TextureCache::free_all`],
//! [`TextureCache::release_pending`]).

use std::path::Path;

use bevy_ecs::prelude::Resource;
use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, warn};
use raylib::prelude::Vector2;

use crate::gpu::{BlendMode, GpuBackend, GpuTexture};
use crate::registry::{AllocPolicy, CleanupHook, NamedHandle, NamedRegistry};
use crate::texture::{ImageDecoder, Texture};

/// Default render scale used when upscaling textures for smooth sampling.
pub const DEFAULT_RENDER_SCALE: u32 = 2;

/// Largest accepted render scale.
pub const MAX_RENDER_SCALE: u32 = 16;

/// Loaded textures keyed by file path.
#[derive(Resource)]
pub struct TextureCache {
    registry: NamedRegistry<Texture>,
    render_scale: u32,
    release_tx: Sender<GpuTexture>,
    release_rx: Receiver<GpuTexture>,
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new(DEFAULT_RENDER_SCALE)
    }
}

impl TextureCache {
    pub fn new(render_scale: u32) -> Self {
        let (release_tx, release_rx) = unbounded();
        Self {
            registry: NamedRegistry::new(),
            render_scale: render_scale.clamp(1, MAX_RENDER_SCALE),
            release_tx,
            release_rx,
        }
    }

    pub fn render_scale(&self) -> u32 {
        self.render_scale
    }

    /// Applies to uploads from now on; already upscaled textures keep their size.
    pub fn set_render_scale(&mut self, render_scale: u32) {
        self.render_scale = render_scale.clamp(1, MAX_RENDER_SCALE);
    }

    fn cleanup_hook(&self) -> CleanupHook<Texture> {
        let release_tx = self.release_tx.clone();
        Box::new(move |texture: &mut Texture| {
            if let Some(handle) = texture.take_resources() {
                // The receiver lives as long as the cache; a failed send means it is being dropped.
                let _ = release_tx.send(handle);
            }
        })
    }

    /// Load (or fetch) the texture for `path`.
    ///
    /// A fresh entry is decoded, deseamed and uploaded in isolated layout.
    /// Decode failure is logged and leaves the entry unrenderable; the next
    /// load of the same path tries again.
    pub fn load(
        &mut self,
        path: impl AsRef<Path>,
        decoder: &dyn ImageDecoder,
        gpu: &mut dyn GpuBackend,
    ) -> Option<NamedHandle<Texture>> {
        let path = path.as_ref();
        let key = path.to_string_lossy();
        let hook = self.cleanup_hook();
        let allocation = self
            .registry
            .alloc(&key, Some(hook), AllocPolicy::ReturnExisting)?;
        let render_scale = self.render_scale;
        let texture = self.registry.resolve_mut(allocation.handle)?;
        if texture.surface().is_some() {
            return Some(allocation.handle);
        }

        match decoder.decode(path) {
            Ok(surface) => {
                texture.set_surface(surface);
                texture.upload(gpu, render_scale);
                debug!("Loaded texture '{}'", key);
            }
            Err(e) => warn!("Texture '{}' not loaded: {}", key, e),
        }
        Some(allocation.handle)
    }

    /// Cut a region out of a loaded texture into a new tiled texture.
    ///
    /// The result is not registered; the caller owns it and releases it with
    /// [`Texture::release`]. It stays valid after `source` is freed.
    pub fn extract(
        &self,
        source: NamedHandle<Texture>,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        gpu: &mut dyn GpuBackend,
    ) -> Option<Texture> {
        self.registry
            .resolve(source)?
            .extract(x, y, w, h, gpu, self.render_scale)
    }

    /// Bind a texture for the next draw and set the blend mode; `None`
    /// disables texturing.
    pub fn select(
        &mut self,
        texture: Option<NamedHandle<Texture>>,
        smooth: bool,
        additive: bool,
        gpu: &mut dyn GpuBackend,
    ) {
        let render_scale = self.render_scale;
        match texture.and_then(|handle| self.registry.resolve_mut(handle)) {
            Some(texture) => texture.select(smooth, additive, gpu, render_scale),
            None => {
                gpu.set_blend(if additive {
                    BlendMode::Additive
                } else {
                    BlendMode::Alpha
                });
                gpu.bind_texture(None);
            }
        }
    }

    pub fn get(&self, handle: NamedHandle<Texture>) -> Option<&Texture> {
        self.registry.resolve(handle)
    }

    pub fn get_mut(&mut self, handle: NamedHandle<Texture>) -> Option<&mut Texture> {
        self.registry.resolve_mut(handle)
    }

    /// Handle of an already loaded path.
    pub fn handle(&self, path: impl AsRef<Path>) -> Option<NamedHandle<Texture>> {
        self.registry.handle(&path.as_ref().to_string_lossy())
    }

    pub fn path_of(&self, handle: NamedHandle<Texture>) -> Option<&str> {
        self.registry.name_of(handle)
    }

    /// Decoded size of a texture; zero when unknown or undecoded.
    pub fn size(&self, handle: NamedHandle<Texture>) -> Vector2 {
        self.registry
            .resolve(handle)
            .map(Texture::size)
            .unwrap_or(Vector2 { x: 0.0, y: 0.0 })
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Delete GPU objects queued by cleanup hooks. Returns how many.
    pub fn release_pending(&mut self, gpu: &mut dyn GpuBackend) -> usize {
        let mut released = 0;
        for handle in self.release_rx.try_iter() {
            gpu.delete_texture(handle);
            released += 1;
        }
        released
    }

    pub fn free(&mut self, handle: NamedHandle<Texture>, gpu: &mut dyn GpuBackend) -> bool {
        let freed = self.registry.free(handle);
        self.release_pending(gpu);
        freed
    }

    /// Free every texture and its GPU object. Safe to call repeatedly.
    pub fn free_all(&mut self, gpu: &mut dyn GpuBackend) -> usize {
        let freed = self.registry.free_all();
        let released = self.release_pending(gpu);
        debug!("Freed {} textures ({} GPU objects)", freed, released);
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::RecordingGpu;
    use image::{Rgba, RgbaImage};
    use std::cell::Cell;

    /// Decoder serving solid images for any path containing "ok".
    struct FakeDecoder {
        calls: Cell<usize>,
    }

    impl FakeDecoder {
        fn new() -> Self {
            Self {
                calls: Cell::new(0),
            }
        }
    }

    impl ImageDecoder for FakeDecoder {
        fn decode(&self, path: &Path) -> Result<RgbaImage, String> {
            self.calls.set(self.calls.get() + 1);
            if path.to_string_lossy().contains("ok") {
                Ok(RgbaImage::from_pixel(48, 24, Rgba([255, 0, 0, 255])))
            } else {
                Err("no such file".to_string())
            }
        }
    }

    #[test]
    fn test_load_returns_same_handle() {
        let mut gpu = RecordingGpu::new();
        let decoder = FakeDecoder::new();
        let mut cache = TextureCache::new(2);
        let a = cache.load("ok.png", &decoder, &mut gpu).unwrap();
        let b = cache.load("ok.png", &decoder, &mut gpu).unwrap();
        assert_eq!(a, b);
        assert_eq!(decoder.calls.get(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(gpu.upload_count(), 1);
    }

    #[test]
    fn test_load_uses_isolated_layout() {
        let mut gpu = RecordingGpu::new();
        let mut cache = TextureCache::new(2);
        let h = cache.load("ok.png", &FakeDecoder::new(), &mut gpu).unwrap();
        let tex = cache.get(h).unwrap();
        assert!(!tex.is_tiled());
        assert_eq!(tex.pow2_size(), (64, 32));
        assert!((tex.scale_uv().x - 48.0 / 64.0).abs() < 1e-6);
        assert!((tex.scale_uv().y - 24.0 / 32.0).abs() < 1e-6);
        assert_eq!(cache.size(h).x, 48.0);
        assert_eq!(cache.size(h).y, 24.0);
    }

    #[test]
    fn test_failed_decode_registers_inert_texture() {
        let mut gpu = RecordingGpu::new();
        let decoder = FakeDecoder::new();
        let mut cache = TextureCache::new(2);
        let h = cache.load("missing.png", &decoder, &mut gpu).unwrap();
        let tex = cache.get(h).unwrap();
        assert!(!tex.is_renderable());
        assert!(tex.gpu_handle().is_none());
        assert_eq!(cache.size(h).x, 0.0);
        assert_eq!(gpu.live_textures(), 0);

        cache.select(Some(h), false, false, &mut gpu);
        assert!(gpu.calls.contains(&crate::gpu::GpuCall::BindTexture(None)));

        cache.load("missing.png", &decoder, &mut gpu);
        assert_eq!(decoder.calls.get(), 2);
    }

    #[test]
    fn test_free_all_releases_gpu_objects() {
        let mut gpu = RecordingGpu::new();
        let decoder = FakeDecoder::new();
        let mut cache = TextureCache::new(2);
        cache.load("ok_a.png", &decoder, &mut gpu);
        cache.load("ok_b.png", &decoder, &mut gpu);
        cache.load("missing.png", &decoder, &mut gpu);
        assert_eq!(gpu.live_textures(), 2);

        assert_eq!(cache.free_all(&mut gpu), 3);
        assert_eq!(gpu.live_textures(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.free_all(&mut gpu), 0);
    }

    #[test]
    fn test_free_single_texture() {
        let mut gpu = RecordingGpu::new();
        let decoder = FakeDecoder::new();
        let mut cache = TextureCache::new(2);
        let a = cache.load("ok_a.png", &decoder, &mut gpu).unwrap();
        let b = cache.load("ok_b.png", &decoder, &mut gpu).unwrap();
        assert!(cache.free(a, &mut gpu));
        assert!(cache.get(a).is_none());
        assert!(cache.get(b).unwrap().is_renderable());
        assert_eq!(gpu.live_textures(), 1);
    }

    #[test]
    fn test_extract_outlives_source() {
        let mut gpu = RecordingGpu::new();
        let mut cache = TextureCache::new(2);
        let h = cache.load("ok.png", &FakeDecoder::new(), &mut gpu).unwrap();
        let piece = cache.extract(h, 4, 4, 16, 16, &mut gpu).unwrap();
        let piece_gpu = piece.gpu_handle().unwrap();

        cache.free_all(&mut gpu);
        assert!(gpu.is_live(piece_gpu));
        assert!(piece.is_renderable());
        assert_eq!(piece.size().x, 16.0);
        assert_eq!(piece.scale_uv().x, 1.0);

        piece.release(&mut gpu);
        assert!(!gpu.is_live(piece_gpu));
    }

    #[test]
    fn test_select_none_disables_texturing() {
        let mut gpu = RecordingGpu::new();
        let mut cache = TextureCache::default();
        cache.select(None, true, false, &mut gpu);
        assert_eq!(
            gpu.calls,
            vec![
                crate::gpu::GpuCall::SetBlend(BlendMode::Alpha),
                crate::gpu::GpuCall::BindTexture(None)
            ]
        );
    }

    #[test]
    fn test_render_scale_is_at_least_one() {
        let mut cache = TextureCache::new(0);
        assert_eq!(cache.render_scale(), 1);
        cache.set_render_scale(3);
        assert_eq!(cache.render_scale(), 3);
        cache.set_render_scale(u32::MAX);
        assert_eq!(cache.render_scale(), MAX_RENDER_SCALE);
    }
}
