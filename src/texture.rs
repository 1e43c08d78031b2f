//! Textures and the power-of-two packer.
//!
//! Source images come in arbitrary sizes; the GPU gets power-of-two buffers.
//! [`pack`] adapts one to the other in one of two layouts:
//!
//! - **Tiled** – the image is stretched over the whole power-of-two buffer so
//!   that `[0, 1]` texture coordinates (and repeat wrapping) cover exactly the
//!   image. UV scale is always `(1, 1)`.
//! - **Isolated** – the image is copied to `(1, 1)` inside a buffer one texel
//!   larger than needed, leaving a transparent border against bleeding. UV
//!   scale is the fraction of the buffer holding image data.
//!
//! A [`Texture`] owns its decoded surface and its GPU handle and releases both
//! together. Registered textures live in
//! [`TextureCache`](crate::resources::texturecache::TextureCache); textures cut
//! out with [`Texture::extract`] belong to the caller.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use log::debug;
use raylib::prelude::Vector2;

use crate::gpu::{BlendMode, FilterMode, GpuBackend, GpuTexture, UvTransform, WrapMode};

/// Image loading collaborator. Failure is reported, never fatal.
pub trait ImageDecoder {
    fn decode(&self, path: &Path) -> Result<RgbaImage, String>;
}

/// Decodes image files from disk with the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileDecoder;

impl ImageDecoder for FileDecoder {
    fn decode(&self, path: &Path) -> Result<RgbaImage, String> {
        image::open(path)
            .map(|img| img.to_rgba8())
            .map_err(|e| format!("Failed to decode image {:?}: {}", path, e))
    }
}

/// Largest packed edge in texels, before power-of-two rounding.
const MAX_PACKED_SIZE: u32 = 1 << 16;

/// Smallest power of two that is `>= n` (and at least 1).
pub fn next_pow2(n: u32) -> u32 {
    n.max(1).next_power_of_two()
}

/// A surface laid out for upload.
#[derive(Debug, Clone)]
pub struct PackedSurface {
    pub pixels: RgbaImage,
    pub pow2_width: u32,
    pub pow2_height: u32,
    pub scale_uv: Vector2,
}

/// Lay `surface` out in a power-of-two buffer.
///
/// `scale` magnifies the source first (1 = no upscale).
pub fn pack(surface: &RgbaImage, tile: bool, scale: u32) -> PackedSurface {
    let scale = scale.max(1);
    let (src_w, src_h) = surface.dimensions();
    let real_w = src_w.saturating_mul(scale).clamp(1, MAX_PACKED_SIZE);
    let real_h = src_h.saturating_mul(scale).clamp(1, MAX_PACKED_SIZE);
    let empty = src_w == 0 || src_h == 0;

    if tile {
        let pow2_width = next_pow2(real_w);
        let pow2_height = next_pow2(real_h);
        let pixels = if empty {
            RgbaImage::new(pow2_width, pow2_height)
        } else {
            imageops::resize(surface, pow2_width, pow2_height, FilterType::Nearest)
        };
        return PackedSurface {
            pixels,
            pow2_width,
            pow2_height,
            scale_uv: Vector2 { x: 1.0, y: 1.0 },
        };
    }

    let pow2_width = next_pow2(real_w + 1);
    let pow2_height = next_pow2(real_h + 1);
    let mut pixels = RgbaImage::new(pow2_width, pow2_height);
    if !empty {
        if scale == 1 {
            imageops::replace(&mut pixels, surface, 1, 1);
        } else {
            let magnified = imageops::resize(surface, real_w, real_h, FilterType::Nearest);
            imageops::replace(&mut pixels, &magnified, 1, 1);
        }
    }
    PackedSurface {
        pixels,
        pow2_width,
        pow2_height,
        scale_uv: Vector2 {
            x: real_w as f32 / pow2_width as f32,
            y: real_h as f32 / pow2_height as f32,
        },
    }
}

/// Give fully transparent texels next to visible ones the neighbour's colour.
///
/// Alpha stays 0, so nothing becomes visible, but bilinear filtering at the
/// edge of a sprite blends towards the sprite's colour instead of black.
pub fn deseam(surface: &mut RgbaImage) {
    const NEIGHBOURS: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

    let source = surface.clone();
    let (w, h) = source.dimensions();
    for y in 0..h {
        for x in 0..w {
            if source.get_pixel(x, y)[3] != 0 {
                continue;
            }
            let neighbour = NEIGHBOURS.iter().find_map(|(dx, dy)| {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                    return None;
                }
                let p = source.get_pixel(nx as u32, ny as u32);
                (p[3] != 0).then_some(*p)
            });
            if let Some(p) = neighbour {
                surface.put_pixel(x, y, Rgba([p[0], p[1], p[2], 0]));
            }
        }
    }
}

/// Decoded image plus the GPU object it was uploaded to.
#[derive(Debug)]
pub struct Texture {
    surface: Option<RgbaImage>,
    gpu: Option<GpuTexture>,
    pow2_width: u32,
    pow2_height: u32,
    scale_uv: Vector2,
    tile: bool,
    upscale: bool,
}

impl Default for Texture {
    fn default() -> Self {
        Self {
            surface: None,
            gpu: None,
            pow2_width: 0,
            pow2_height: 0,
            scale_uv: Vector2 { x: 1.0, y: 1.0 },
            tile: false,
            upscale: false,
        }
    }
}

impl Texture {
    /// Wrap a decoded surface. The surface is deseamed; nothing is uploaded yet.
    pub fn from_surface(mut surface: RgbaImage, tile: bool) -> Self {
        deseam(&mut surface);
        Self {
            surface: Some(surface),
            tile,
            ..Self::default()
        }
    }

    pub(crate) fn set_surface(&mut self, mut surface: RgbaImage) {
        deseam(&mut surface);
        self.surface = Some(surface);
    }

    /// Decoded size in pixels; zero without a surface.
    pub fn size(&self) -> Vector2 {
        match &self.surface {
            Some(s) => Vector2 {
                x: s.width() as f32,
                y: s.height() as f32,
            },
            None => Vector2 { x: 0.0, y: 0.0 },
        }
    }

    pub fn surface(&self) -> Option<&RgbaImage> {
        self.surface.as_ref()
    }

    pub fn gpu_handle(&self) -> Option<GpuTexture> {
        self.gpu
    }

    pub fn pow2_size(&self) -> (u32, u32) {
        (self.pow2_width, self.pow2_height)
    }

    pub fn scale_uv(&self) -> Vector2 {
        self.scale_uv
    }

    pub fn is_tiled(&self) -> bool {
        self.tile
    }

    /// Switch layout before the next upload.
    pub fn set_tiled(&mut self, tile: bool) {
        self.tile = tile;
    }

    pub fn is_upscaled(&self) -> bool {
        self.upscale
    }

    pub fn is_renderable(&self) -> bool {
        self.surface.is_some() && self.gpu.is_some()
    }

    /// Pack the surface and (re)upload it. No-op without a surface.
    ///
    /// The GPU object is created on the first upload only.
    pub fn upload(&mut self, gpu: &mut dyn GpuBackend, render_scale: u32) {
        let Some(surface) = &self.surface else {
            return;
        };
        let scale = if self.upscale { render_scale.max(1) } else { 1 };
        let packed = pack(surface, self.tile, scale);
        self.pow2_width = packed.pow2_width;
        self.pow2_height = packed.pow2_height;
        self.scale_uv = packed.scale_uv;

        let handle = match self.gpu {
            Some(handle) => handle,
            None => {
                let handle = gpu.create_texture();
                self.gpu = Some(handle);
                handle
            }
        };
        gpu.upload_texture(
            handle,
            packed.pow2_width,
            packed.pow2_height,
            packed.pixels.as_raw(),
        );
        // Isolated textures sit inside a padded buffer; repeating would pull in the border.
        let wrap = if self.tile {
            WrapMode::Repeat
        } else {
            WrapMode::ClampToEdge
        };
        gpu.set_wrap(handle, wrap);
        debug!(
            "Uploaded texture {:?}: {}x{} in {}x{} (uv scale {:.3}, {:.3})",
            handle,
            surface.width(),
            surface.height(),
            packed.pow2_width,
            packed.pow2_height,
            packed.scale_uv.x,
            packed.scale_uv.y
        );
    }

    /// Texture-coordinate transform mapping a unit quad onto the image data.
    pub fn uv_transform(&self) -> UvTransform {
        let offset = if self.tile || self.pow2_width == 0 || self.pow2_height == 0 {
            [0.0, 0.0]
        } else {
            [1.0 / self.pow2_width as f32, 1.0 / self.pow2_height as f32]
        };
        UvTransform {
            offset,
            scale: [self.scale_uv.x, self.scale_uv.y],
        }
    }

    /// Bind for the next draw and set sampling and blend state.
    ///
    /// Smooth sampling of a texture that was uploaded without upscaling
    /// re-packs and re-uploads it first. A texture without a GPU object
    /// leaves texturing disabled.
    pub fn select(
        &mut self,
        smooth: bool,
        additive: bool,
        gpu: &mut dyn GpuBackend,
        render_scale: u32,
    ) {
        if smooth && !self.upscale && self.surface.is_some() {
            self.upscale = true;
            self.upload(gpu, render_scale);
        }

        gpu.set_blend(if additive {
            BlendMode::Additive
        } else {
            BlendMode::Alpha
        });

        let Some(handle) = self.gpu else {
            gpu.bind_texture(None);
            return;
        };
        gpu.bind_texture(Some(handle));
        let mag = if smooth {
            FilterMode::Linear
        } else {
            FilterMode::Nearest
        };
        gpu.set_filter(handle, FilterMode::Linear, mag);
        gpu.set_uv_transform(self.uv_transform());
    }

    /// Copy a region into a new tiled texture owned by the caller.
    ///
    /// The region is clamped to the surface. Returns `None` when there is no
    /// surface or nothing is left after clamping. Release the result with
    /// [`Texture::release`].
    pub fn extract(
        &self,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        gpu: &mut dyn GpuBackend,
        render_scale: u32,
    ) -> Option<Texture> {
        let surface = self.surface.as_ref()?;
        let (src_w, src_h) = surface.dimensions();
        if x >= src_w || y >= src_h {
            return None;
        }
        let w = w.min(src_w - x);
        let h = h.min(src_h - y);
        if w == 0 || h == 0 {
            return None;
        }
        let region = imageops::crop_imm(surface, x, y, w, h).to_image();
        let mut texture = Texture::from_surface(region, true);
        texture.upload(gpu, render_scale);
        Some(texture)
    }

    /// Drop the surface and hand back the GPU object, if any.
    pub(crate) fn take_resources(&mut self) -> Option<GpuTexture> {
        self.surface = None;
        self.gpu.take()
    }

    /// Release an unregistered texture: surface and GPU object together.
    pub fn release(mut self, gpu: &mut dyn GpuBackend) {
        if let Some(handle) = self.take_resources() {
            gpu.delete_texture(handle);
        }
    }
}
