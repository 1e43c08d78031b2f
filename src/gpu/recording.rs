//! Headless GPU backend.
//!
//! Records every call instead of talking to a graphics API. Used by tests and
//! by the viewer's `--headless` mode to count the work a frame would submit.

use rustc_hash::FxHashMap;

use super::{BlendMode, FilterMode, GpuBackend, GpuTexture, UvTransform, Vertex, WrapMode};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCall {
    CreateTexture(GpuTexture),
    DeleteTexture(GpuTexture),
    UploadTexture {
        texture: GpuTexture,
        width: u32,
        height: u32,
    },
    SetWrap(GpuTexture, WrapMode),
    SetFilter {
        texture: GpuTexture,
        min: FilterMode,
        mag: FilterMode,
    },
    BindTexture(Option<GpuTexture>),
    SetUvTransform(UvTransform),
    SetBlend(BlendMode),
    SetColor([u8; 4]),
    PushMatrix,
    PopMatrix,
    Translate(f32, f32, f32),
    Rotate(f32),
    Scale(f32, f32),
    DrawQuad([Vertex; 4]),
}

#[derive(Debug, Default)]
pub struct RecordingGpu {
    pub calls: Vec<GpuCall>,
    next_id: u32,
    /// Live texture objects and the size of their last upload.
    textures: FxHashMap<GpuTexture, Option<(u32, u32)>>,
}

impl RecordingGpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget recorded calls; texture objects stay alive.
    pub fn clear(&mut self) {
        self.calls.clear();
    }

    pub fn draw_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, GpuCall::DrawQuad(_)))
            .count()
    }

    pub fn upload_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, GpuCall::UploadTexture { .. }))
            .count()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn is_live(&self, texture: GpuTexture) -> bool {
        self.textures.contains_key(&texture)
    }

    /// Size of the last upload to `texture`, if it is alive and was uploaded.
    pub fn uploaded_size(&self, texture: GpuTexture) -> Option<(u32, u32)> {
        self.textures.get(&texture).copied().flatten()
    }

    pub fn last_draw(&self) -> Option<&[Vertex; 4]> {
        self.calls.iter().rev().find_map(|call| match call {
            GpuCall::DrawQuad(vertices) => Some(vertices),
            _ => None,
        })
    }

    pub fn last_uv_transform(&self) -> Option<UvTransform> {
        self.calls.iter().rev().find_map(|call| match call {
            GpuCall::SetUvTransform(t) => Some(*t),
            _ => None,
        })
    }
}

impl GpuBackend for RecordingGpu {
    fn create_texture(&mut self) -> GpuTexture {
        self.next_id += 1;
        let texture = GpuTexture(self.next_id);
        self.textures.insert(texture, None);
        self.calls.push(GpuCall::CreateTexture(texture));
        texture
    }

    fn delete_texture(&mut self, texture: GpuTexture) {
        self.textures.remove(&texture);
        self.calls.push(GpuCall::DeleteTexture(texture));
    }

    fn upload_texture(&mut self, texture: GpuTexture, width: u32, height: u32, rgba: &[u8]) {
        debug_assert_eq!(rgba.len(), (width * height * 4) as usize);
        if let Some(size) = self.textures.get_mut(&texture) {
            *size = Some((width, height));
        }
        self.calls.push(GpuCall::UploadTexture {
            texture,
            width,
            height,
        });
    }

    fn set_wrap(&mut self, texture: GpuTexture, wrap: WrapMode) {
        self.calls.push(GpuCall::SetWrap(texture, wrap));
    }

    fn set_filter(&mut self, texture: GpuTexture, min: FilterMode, mag: FilterMode) {
        self.calls.push(GpuCall::SetFilter { texture, min, mag });
    }

    fn bind_texture(&mut self, texture: Option<GpuTexture>) {
        self.calls.push(GpuCall::BindTexture(texture));
    }

    fn set_uv_transform(&mut self, transform: UvTransform) {
        self.calls.push(GpuCall::SetUvTransform(transform));
    }

    fn set_blend(&mut self, blend: BlendMode) {
        self.calls.push(GpuCall::SetBlend(blend));
    }

    fn set_color(&mut self, rgba: [u8; 4]) {
        self.calls.push(GpuCall::SetColor(rgba));
    }

    fn push_matrix(&mut self) {
        self.calls.push(GpuCall::PushMatrix);
    }

    fn pop_matrix(&mut self) {
        self.calls.push(GpuCall::PopMatrix);
    }

    fn translate(&mut self, x: f32, y: f32, z: f32) {
        self.calls.push(GpuCall::Translate(x, y, z));
    }

    fn rotate(&mut self, degrees: f32) {
        self.calls.push(GpuCall::Rotate(degrees));
    }

    fn scale(&mut self, x: f32, y: f32) {
        self.calls.push(GpuCall::Scale(x, y));
    }

    fn draw_quad(&mut self, vertices: &[Vertex; 4]) {
        self.calls.push(GpuCall::DrawQuad(*vertices));
    }
}
