//! raylib rlgl backend.
//!
//! Drives raylib's immediate-mode layer through FFI. rlgl textures cannot be
//! resized in place, so every upload replaces the underlying rl texture and the
//! backend keeps a map from logical [`GpuTexture`] ids to rl ids.
//!
//! Requires a live raylib window (GL context). Draw calls must happen inside
//! raylib's drawing scope.

use std::ffi::c_void;

use raylib::ffi;
use rustc_hash::FxHashMap;

use super::{BlendMode, FilterMode, GpuBackend, GpuTexture, UvTransform, Vertex, WrapMode};

// rlgl.h constants
const RL_QUADS: i32 = 0x0007;
const RL_TEXTURE_MAG_FILTER: i32 = 0x2800;
const RL_TEXTURE_MIN_FILTER: i32 = 0x2801;
const RL_TEXTURE_WRAP_S: i32 = 0x2802;
const RL_TEXTURE_WRAP_T: i32 = 0x2803;
const RL_TEXTURE_FILTER_NEAREST: i32 = 0x2600;
const RL_TEXTURE_FILTER_LINEAR: i32 = 0x2601;
const RL_TEXTURE_WRAP_REPEAT: i32 = 0x2901;
const RL_TEXTURE_WRAP_CLAMP: i32 = 0x812F;

/// GPU backend on top of raylib's rlgl.
pub struct RlglGpu {
    /// Logical id -> rl texture id (0 until the first upload).
    textures: FxHashMap<GpuTexture, u32>,
    next_id: u32,
    bound: u32,
    uv: UvTransform,
    color: [u8; 4],
}

impl Default for RlglGpu {
    fn default() -> Self {
        Self::new()
    }
}

impl RlglGpu {
    pub fn new() -> Self {
        Self {
            textures: FxHashMap::default(),
            next_id: 0,
            bound: 0,
            uv: UvTransform::IDENTITY,
            color: [255, 255, 255, 255],
        }
    }

    fn rl_id(&self, texture: GpuTexture) -> u32 {
        self.textures.get(&texture).copied().unwrap_or(0)
    }
}

fn filter_value(filter: FilterMode) -> i32 {
    match filter {
        FilterMode::Nearest => RL_TEXTURE_FILTER_NEAREST,
        FilterMode::Linear => RL_TEXTURE_FILTER_LINEAR,
    }
}

impl GpuBackend for RlglGpu {
    fn create_texture(&mut self) -> GpuTexture {
        self.next_id += 1;
        let texture = GpuTexture(self.next_id);
        self.textures.insert(texture, 0);
        texture
    }

    fn delete_texture(&mut self, texture: GpuTexture) {
        match self.textures.remove(&texture) {
            Some(id) if id != 0 => unsafe { ffi::rlUnloadTexture(id) },
            _ => {}
        }
    }

    fn upload_texture(&mut self, texture: GpuTexture, width: u32, height: u32, rgba: &[u8]) {
        let old = self.rl_id(texture);
        if old != 0 {
            unsafe { ffi::rlUnloadTexture(old) };
        }
        let id = unsafe {
            ffi::rlLoadTexture(
                rgba.as_ptr() as *const c_void,
                width as i32,
                height as i32,
                ffi::PixelFormat::PIXELFORMAT_UNCOMPRESSED_R8G8B8A8 as i32,
                1,
            )
        };
        self.textures.insert(texture, id);
    }

    fn set_wrap(&mut self, texture: GpuTexture, wrap: WrapMode) {
        let id = self.rl_id(texture);
        if id == 0 {
            return;
        }
        let value = match wrap {
            WrapMode::Repeat => RL_TEXTURE_WRAP_REPEAT,
            WrapMode::ClampToEdge => RL_TEXTURE_WRAP_CLAMP,
        };
        unsafe {
            ffi::rlTextureParameters(id, RL_TEXTURE_WRAP_S, value);
            ffi::rlTextureParameters(id, RL_TEXTURE_WRAP_T, value);
        }
    }

    fn set_filter(&mut self, texture: GpuTexture, min: FilterMode, mag: FilterMode) {
        let id = self.rl_id(texture);
        if id == 0 {
            return;
        }
        unsafe {
            ffi::rlTextureParameters(id, RL_TEXTURE_MIN_FILTER, filter_value(min));
            ffi::rlTextureParameters(id, RL_TEXTURE_MAG_FILTER, filter_value(mag));
        }
    }

    fn bind_texture(&mut self, texture: Option<GpuTexture>) {
        self.bound = texture.map(|t| self.rl_id(t)).unwrap_or(0);
    }

    fn set_uv_transform(&mut self, transform: UvTransform) {
        self.uv = transform;
    }

    fn set_blend(&mut self, blend: BlendMode) {
        let mode = match blend {
            BlendMode::Alpha => ffi::BlendMode::BLEND_ALPHA,
            BlendMode::Additive => ffi::BlendMode::BLEND_ADDITIVE,
        };
        unsafe { ffi::rlSetBlendMode(mode as i32) };
    }

    fn set_color(&mut self, rgba: [u8; 4]) {
        self.color = rgba;
    }

    fn push_matrix(&mut self) {
        unsafe { ffi::rlPushMatrix() };
    }

    fn pop_matrix(&mut self) {
        unsafe { ffi::rlPopMatrix() };
    }

    fn translate(&mut self, x: f32, y: f32, z: f32) {
        unsafe { ffi::rlTranslatef(x, y, z) };
    }

    fn rotate(&mut self, degrees: f32) {
        unsafe { ffi::rlRotatef(degrees, 0.0, 0.0, 1.0) };
    }

    fn scale(&mut self, x: f32, y: f32) {
        unsafe { ffi::rlScalef(x, y, 1.0) };
    }

    fn draw_quad(&mut self, vertices: &[Vertex; 4]) {
        let [r, g, b, a] = self.color;
        unsafe {
            ffi::rlSetTexture(self.bound);
            ffi::rlBegin(RL_QUADS);
            ffi::rlColor4ub(r, g, b, a);
            for vertex in vertices {
                let [u, v] = self.uv.apply(vertex.uv);
                ffi::rlTexCoord2f(u, v);
                ffi::rlVertex2f(vertex.position[0], vertex.position[1]);
            }
            ffi::rlEnd();
            ffi::rlSetTexture(0);
        }
    }
}
