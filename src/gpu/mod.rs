//! GPU boundary.
//!
//! Textures and sprites never talk to a graphics API directly. They issue
//! calls through [`GpuBackend`], which mirrors the small immediate-mode surface
//! the renderer needs: texture objects, sampling/blend state, a matrix stack
//! and quad submission.
//!
//! Backends:
//! - [`recording::RecordingGpu`] – headless backend that records every call
//! - [`rlgl::RlglGpu`] – raylib's rlgl layer, used by the viewer window

pub mod recording;
pub mod rlgl;

pub use recording::{GpuCall, RecordingGpu};
pub use rlgl::RlglGpu;

/// Logical GPU texture object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuTexture(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// `src_alpha, one_minus_src_alpha`
    Alpha,
    /// `src_alpha, one`
    Additive,
}

/// Texture-coordinate transform: `uv * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvTransform {
    pub offset: [f32; 2],
    pub scale: [f32; 2],
}

impl UvTransform {
    pub const IDENTITY: UvTransform = UvTransform {
        offset: [0.0, 0.0],
        scale: [1.0, 1.0],
    };

    pub fn apply(&self, uv: [f32; 2]) -> [f32; 2] {
        [
            uv[0] * self.scale[0] + self.offset[0],
            uv[1] * self.scale[1] + self.offset[1],
        ]
    }
}

impl Default for UvTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Quad corner in model space with its texture coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

/// Two triangles over the four corners of a quad.
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

/// Graphics API surface consumed by textures and sprites.
///
/// All calls happen on the render thread; implementations are not required
/// to be `Send`.
pub trait GpuBackend {
    /// Allocate a texture object. No storage until [`GpuBackend::upload_texture`].
    fn create_texture(&mut self) -> GpuTexture;
    fn delete_texture(&mut self, texture: GpuTexture);
    /// Replace the texture's storage with tightly packed RGBA8 pixels.
    fn upload_texture(&mut self, texture: GpuTexture, width: u32, height: u32, rgba: &[u8]);
    fn set_wrap(&mut self, texture: GpuTexture, wrap: WrapMode);
    fn set_filter(&mut self, texture: GpuTexture, min: FilterMode, mag: FilterMode);
    /// Bind a texture for the next draw; `None` disables texturing.
    fn bind_texture(&mut self, texture: Option<GpuTexture>);
    fn set_uv_transform(&mut self, transform: UvTransform);
    fn set_blend(&mut self, blend: BlendMode);
    /// Current vertex colour as RGBA8.
    fn set_color(&mut self, rgba: [u8; 4]);
    fn push_matrix(&mut self);
    fn pop_matrix(&mut self);
    fn translate(&mut self, x: f32, y: f32, z: f32);
    /// Rotate around the z axis.
    fn rotate(&mut self, degrees: f32);
    fn scale(&mut self, x: f32, y: f32);
    /// Submit one textured quad (see [`QUAD_INDICES`] for the triangle split).
    fn draw_quad(&mut self, vertices: &[Vertex; 4]);
}
