//! Sprite instance component.
//!
//! A [`Sprite`] is the per-entity render state bound to a named
//! [`SpriteDefinition`]: where it is drawn, how large, rotated, tinted and
//! flipped, and when its current frame started. It holds a non-owning handle
//! into the [`SpriteDefinitionCache`]; the definition and its texture are
//! shared by every instance using them.
//!
//! A sprite that is not bound to a definition (never initialized, unknown
//! name, or its definition was freed) draws nothing and ignores
//! placement helpers.
//!
//! # Animation
//!
//! Definitions can name a successor (`next { frame_2 100 }`). Calling
//! [`Sprite::play`] every frame with the same name keeps advancing through the
//! chain: the instance re-binds to the successor once its delay has elapsed
//! but keeps reporting the name that was played, so callers never track frame
//! names themselves.
//!
//! Times are milliseconds on the caller's clock, usually
//! [`WorldTime::elapsed_msec`](crate::resources::worldtime::WorldTime::elapsed_msec).

use bevy_ecs::prelude::Component;
use log::warn;
use raylib::prelude::{Color, Vector2};

use crate::gpu::{GpuBackend, Vertex};
use crate::registry::{Name, NamedHandle, bounded_name};
use crate::resources::spritecache::{SpriteDefinition, SpriteDefinitionCache};
use crate::resources::texturecache::TextureCache;
use crate::resources::viewport::Viewport;

const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

/// Component-wise product of two colours.
pub fn modulate(a: Color, b: Color) -> Color {
    Color::new(
        ((a.r as u16 * b.r as u16) / 255) as u8,
        ((a.g as u16 * b.g as u16) / 255) as u8,
        ((a.b as u16 * b.b as u16) / 255) as u8,
        ((a.a as u16 * b.a as u16) / 255) as u8,
    )
}

/// `value` divided by `total`; `fallback` when `total` is zero.
fn normalize(value: f32, total: f32, fallback: f32) -> f32 {
    if total > 0.0 { value / total } else { fallback }
}

/// Render state of one sprite use-site.
#[derive(Component, Clone, Debug)]
pub struct Sprite {
    def: Option<NamedHandle<SpriteDefinition>>,
    name: Name,
    init_msec: u64,
    /// Top-left corner in world units.
    pub origin: Vector2,
    /// Drawn size in world units; reset to the definition's box on init.
    pub size: Vector2,
    /// Rotation around the pivot in radians.
    pub angle: f32,
    /// Depth; positive values are behind the camera and not drawn.
    pub z: f32,
    pub modulate: Color,
    /// Vertical flip, combined (XOR) with the definition's flag.
    pub flip: bool,
    /// Horizontal mirror, combined (XOR) with the definition's flag.
    pub mirror: bool,
}

impl Default for Sprite {
    fn default() -> Self {
        Self::new()
    }
}

impl Sprite {
    /// An unbound sprite.
    pub fn new() -> Self {
        Self {
            def: None,
            name: Name::new(),
            init_msec: 0,
            origin: ZERO,
            size: ZERO,
            angle: 0.0,
            z: 0.0,
            modulate: Color::WHITE,
            flip: false,
            mirror: false,
        }
    }

    /// A sprite bound to `name` (left unbound if the name is unknown).
    pub fn named(name: &str, defs: &SpriteDefinitionCache, now_msec: u64) -> Self {
        let mut sprite = Self::new();
        sprite.init(name, defs, now_msec);
        sprite
    }

    pub fn is_bound(&self) -> bool {
        self.def.is_some()
    }

    /// Name last passed to [`Sprite::init`] or [`Sprite::play`].
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn init_msec(&self) -> u64 {
        self.init_msec
    }

    pub fn definition<'a>(&self, defs: &'a SpriteDefinitionCache) -> Option<&'a SpriteDefinition> {
        self.def.and_then(|handle| defs.resolve(handle))
    }

    /// Bind to the definition called `name`.
    ///
    /// On success size, modulation, name and timestamp are reset and the
    /// flip/mirror overrides cleared; origin, angle and depth are kept. On
    /// failure the sprite is left unbound.
    pub fn init(&mut self, name: &str, defs: &SpriteDefinitionCache, now_msec: u64) -> bool {
        self.def = None;
        self.name = Name::new();
        self.size = ZERO;
        self.modulate = Color::WHITE;
        self.flip = false;
        self.mirror = false;
        self.init_msec = now_msec;

        if name.is_empty() {
            return false;
        }
        let Some(handle) = defs.handle(name) else {
            warn!("Sprite '{}' not loaded", name);
            return false;
        };
        let Some(def) = defs.resolve(handle) else {
            return false;
        };
        self.def = Some(handle);
        self.size = def.box_size;
        self.name = bounded_name(name);
        true
    }

    /// Re-bind to the animation successor once its delay has elapsed.
    ///
    /// The sprite keeps its current name across the transition.
    pub fn animate(&mut self, defs: &SpriteDefinitionCache, now_msec: u64) {
        let Some(def) = self.definition(defs) else {
            return;
        };
        let Some(next) = &def.next else {
            return;
        };
        if self.init_msec.saturating_add(next.delay_msec) > now_msec {
            return;
        }
        let saved = self.name;
        self.init(&next.name, defs, now_msec);
        self.name = saved;
    }

    /// Show `name`; playing the current name again advances its animation instead.
    pub fn play(&mut self, name: &str, defs: &SpriteDefinitionCache, now_msec: u64) -> bool {
        if self.is_bound() && bounded_name(name) == self.name {
            self.animate(defs, now_msec);
            return true;
        }
        self.init(name, defs, now_msec)
    }

    /// Pivot relative to `origin`, in render units.
    ///
    /// The definition's centre is mirrored/flipped by the instance overrides
    /// and scaled from box space into the current size.
    pub fn center(&self, defs: &SpriteDefinitionCache) -> Vector2 {
        let Some(def) = self.definition(defs) else {
            return ZERO;
        };
        let mut center = def.center;
        if self.mirror {
            center.x = def.box_size.x - center.x;
        }
        if self.flip {
            center.y = def.box_size.y - center.y;
        }
        Vector2 {
            x: normalize(center.x * self.size.x, def.box_size.x, 0.0),
            y: normalize(center.y * self.size.y, def.box_size.y, 0.0),
        }
    }

    /// Move the sprite so its pivot sits at the middle of a box.
    pub fn center_on(&mut self, origin: Vector2, size: Vector2, defs: &SpriteDefinitionCache) {
        if self.definition(defs).is_none() {
            return;
        }
        let center = self.center(defs);
        self.origin = Vector2 {
            x: origin.x + size.x / 2.0 - center.x,
            y: origin.y + size.y / 2.0 - center.y,
        };
    }

    /// Turn the sprite so the pivot-to-`target` direction is its facing.
    pub fn look_at(&mut self, target: Vector2, defs: &SpriteDefinitionCache) {
        if self.definition(defs).is_none() {
            return;
        }
        let center = self.center(defs);
        let dx = target.x - (self.origin.x + center.x);
        let dy = target.y - (self.origin.y + center.y);
        self.angle = dy.atan2(dx);
    }

    /// Submit the sprite as one textured quad.
    ///
    /// Returns `false` without touching the GPU when the sprite is unbound,
    /// behind the camera (`z > 0`), fully transparent, outside the viewport
    /// or its texture has nothing on the GPU.
    pub fn draw(
        &self,
        defs: &SpriteDefinitionCache,
        textures: &mut TextureCache,
        viewport: &Viewport,
        gpu: &mut dyn GpuBackend,
    ) -> bool {
        let Some(def) = self.definition(defs) else {
            return false;
        };
        if self.z > 0.0 || self.modulate.a == 0 {
            return false;
        }
        if !viewport.intersects(self.origin, self.size) {
            return false;
        }
        // Art that failed to load is skipped; only definitions without a file draw untextured.
        if let Some(texture) = def.texture
            && textures.get(texture).is_none_or(|t| !t.is_renderable())
        {
            return false;
        }

        gpu.push_matrix();
        let half = Vector2 {
            x: self.size.x / 2.0,
            y: self.size.y / 2.0,
        };
        gpu.translate(self.origin.x + half.x, self.origin.y + half.y, self.z);
        let smooth = self.angle != 0.0;
        if smooth {
            let pivot = self.center(defs);
            let (tx, ty) = (pivot.x - half.x, pivot.y - half.y);
            gpu.translate(tx, ty, 0.0);
            gpu.rotate(self.angle.to_degrees());
            gpu.translate(-tx, -ty, 0.0);
        }
        let flip = self.flip ^ def.flip;
        let mirror = self.mirror ^ def.mirror;
        gpu.scale(
            if mirror { -self.size.x } else { self.size.x },
            if flip { -self.size.y } else { self.size.y },
        );

        textures.select(def.texture, smooth, def.additive, gpu);
        let color = modulate(self.modulate, def.modulate);
        gpu.set_color([color.r, color.g, color.b, color.a]);

        // UVs address the decoded image; the texture's UV transform maps them into the padded buffer.
        let surface = def.texture.map(|t| textures.size(t)).unwrap_or(ZERO);
        let u0 = normalize(def.box_origin.x, surface.x, 0.0);
        let v0 = normalize(def.box_origin.y, surface.y, 0.0);
        let u1 = normalize(def.box_origin.x + def.box_size.x, surface.x, 1.0);
        let v1 = normalize(def.box_origin.y + def.box_size.y, surface.y, 1.0);
        gpu.draw_quad(&[
            Vertex {
                position: [-0.5, -0.5],
                uv: [u0, v0],
            },
            Vertex {
                position: [-0.5, 0.5],
                uv: [u0, v1],
            },
            Vertex {
                position: [0.5, 0.5],
                uv: [u1, v1],
            },
            Vertex {
                position: [0.5, -0.5],
                uv: [u1, v0],
            },
        ]);
        gpu.pop_matrix();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuCall, RecordingGpu};
    use crate::texture::ImageDecoder;
    use image::{Rgba, RgbaImage};
    use std::path::Path;

    const EPSILON: f32 = 1e-4;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    struct FakeDecoder;

    impl ImageDecoder for FakeDecoder {
        fn decode(&self, path: &Path) -> Result<RgbaImage, String> {
            if path.to_string_lossy().contains("missing") {
                return Err("not found".to_string());
            }
            Ok(RgbaImage::from_pixel(128, 64, Rgba([255, 255, 255, 255])))
        }
    }

    struct Fixture {
        defs: SpriteDefinitionCache,
        textures: TextureCache,
        gpu: RecordingGpu,
        viewport: Viewport,
    }

    fn fixture() -> Fixture {
        let cfg = "
            ship { file ships.png box { 0 0 32 16 } center { 8 4 } color { 255 255 255 128 } }
            walk_1 { file ships.png box { 0 16 16 16 } next { walk_2 500 } }
            walk_2 { file ships.png box { 16 16 16 16 } next { walk_1 500 } }
            dangling { file ships.png next { nowhere 0 } }
            flipped { file ships.png box { 0 0 32 16 } flip additive }
            glow { box { 0 0 8 8 } additive }
            ghost { file missing.png box { 0 0 8 8 } }
        ";
        let mut defs = SpriteDefinitionCache::new();
        let mut textures = TextureCache::new(2);
        let mut gpu = RecordingGpu::new();
        defs.parse_str("fixture", cfg, Path::new(""), &mut textures, &FakeDecoder, &mut gpu);
        gpu.clear();
        Fixture {
            defs,
            textures,
            gpu,
            viewport: Viewport::new(320.0, 240.0),
        }
    }

    #[test]
    fn test_init_binds_and_resets() {
        let f = fixture();
        let mut s = Sprite::new();
        s.flip = true;
        s.origin = Vector2 { x: 5.0, y: 6.0 };
        assert!(s.init("ship", &f.defs, 100));
        assert!(s.is_bound());
        assert_eq!(s.name(), "ship");
        assert_eq!(s.init_msec(), 100);
        assert_eq!((s.size.x, s.size.y), (32.0, 16.0));
        assert!(!s.flip);
        assert_eq!(s.origin.x, 5.0);
    }

    #[test]
    fn test_init_twice_resets_timestamp() {
        let f = fixture();
        let mut s = Sprite::new();
        s.init("ship", &f.defs, 100);
        s.size.x = 99.0;
        assert!(s.init("ship", &f.defs, 250));
        assert_eq!(s.init_msec(), 250);
        assert_eq!(s.size.x, 32.0);
        assert_eq!(s.name(), "ship");
    }

    #[test]
    fn test_init_unknown_leaves_unbound() {
        let f = fixture();
        let mut s = Sprite::named("ship", &f.defs, 0);
        assert!(!s.init("does-not-exist", &f.defs, 0));
        assert!(!s.is_bound());
        assert_eq!(s.name(), "");
        assert!(!s.init("", &f.defs, 0));
    }

    #[test]
    fn test_unbound_sprite_is_inert() {
        let mut f = fixture();
        let mut s = Sprite::new();
        s.size = Vector2 { x: 10.0, y: 10.0 };
        assert!(!s.draw(&f.defs, &mut f.textures, &f.viewport, &mut f.gpu));
        s.center_on(ZERO, Vector2 { x: 10.0, y: 10.0 }, &f.defs);
        s.look_at(Vector2 { x: 100.0, y: 0.0 }, &f.defs);
        assert_eq!(s.origin.x, 0.0);
        assert_eq!(s.angle, 0.0);
        assert!(f.gpu.calls.is_empty());
    }

    #[test]
    fn test_animate_waits_for_delay() {
        let f = fixture();
        let mut s = Sprite::named("walk_1", &f.defs, 1000);
        let walk_1 = f.defs.handle("walk_1");
        s.animate(&f.defs, 1499);
        assert_eq!(s.def, walk_1);

        s.animate(&f.defs, 1500);
        assert_eq!(s.def, f.defs.handle("walk_2"));
        assert_eq!(s.name(), "walk_1");
        assert_eq!(s.init_msec(), 1500);
    }

    #[test]
    fn test_play_same_name_advances_chain() {
        let f = fixture();
        let mut s = Sprite::new();
        assert!(s.play("walk_1", &f.defs, 0));
        assert!(s.play("walk_1", &f.defs, 600));
        assert_eq!(s.def, f.defs.handle("walk_2"));
        assert!(s.play("walk_1", &f.defs, 1200));
        assert_eq!(s.def, f.defs.handle("walk_1"));
        assert_eq!(s.name(), "walk_1");
    }

    #[test]
    fn test_play_other_name_rebinds() {
        let f = fixture();
        let mut s = Sprite::named("walk_1", &f.defs, 0);
        assert!(s.play("ship", &f.defs, 10));
        assert_eq!(s.name(), "ship");
        assert_eq!(s.init_msec(), 10);
        assert!(!s.play("unknown", &f.defs, 20));
        assert!(!s.is_bound());
    }

    #[test]
    fn test_animate_to_missing_successor_unbinds() {
        let f = fixture();
        let mut s = Sprite::named("dangling", &f.defs, 0);
        s.animate(&f.defs, 0);
        assert!(!s.is_bound());
        assert_eq!(s.name(), "dangling");
    }

    #[test]
    fn test_center_scales_and_mirrors() {
        let f = fixture();
        let mut s = Sprite::named("ship", &f.defs, 0);
        let c = s.center(&f.defs);
        assert_eq!((c.x, c.y), (8.0, 4.0));

        s.size = Vector2 { x: 64.0, y: 32.0 };
        let c = s.center(&f.defs);
        assert_eq!((c.x, c.y), (16.0, 8.0));

        s.mirror = true;
        s.flip = true;
        let c = s.center(&f.defs);
        assert_eq!((c.x, c.y), (48.0, 24.0));
    }

    #[test]
    fn test_center_on_places_pivot_in_box_center() {
        let f = fixture();
        let mut s = Sprite::named("ship", &f.defs, 0);
        s.center_on(
            Vector2 { x: 100.0, y: 50.0 },
            Vector2 { x: 20.0, y: 10.0 },
            &f.defs,
        );
        assert_eq!((s.origin.x, s.origin.y), (102.0, 51.0));
    }

    #[test]
    fn test_look_at() {
        let f = fixture();
        let mut s = Sprite::named("ship", &f.defs, 0);
        s.origin = Vector2 { x: -8.0, y: -4.0 };
        s.look_at(Vector2 { x: 0.0, y: 10.0 }, &f.defs);
        assert!(approx_eq(s.angle, std::f32::consts::FRAC_PI_2));
        s.look_at(Vector2 { x: -10.0, y: 0.0 }, &f.defs);
        assert!(approx_eq(s.angle.abs(), std::f32::consts::PI));
    }

    #[test]
    fn test_draw_submits_one_quad() {
        let mut f = fixture();
        let mut s = Sprite::named("ship", &f.defs, 0);
        s.origin = Vector2 { x: 10.0, y: 20.0 };
        assert!(s.draw(&f.defs, &mut f.textures, &f.viewport, &mut f.gpu));
        assert_eq!(f.gpu.draw_count(), 1);
        assert_eq!(f.gpu.calls.first(), Some(&GpuCall::PushMatrix));
        assert_eq!(f.gpu.calls.last(), Some(&GpuCall::PopMatrix));
        assert!(f.gpu.calls.contains(&GpuCall::Translate(26.0, 28.0, 0.0)));
        assert!(f.gpu.calls.contains(&GpuCall::Scale(32.0, 16.0)));
        assert!(f.gpu.calls.contains(&GpuCall::SetColor([255, 255, 255, 128])));

        let quad = f.gpu.last_draw().unwrap();
        assert_eq!(quad[0].uv, [0.0, 0.0]);
        assert_eq!(quad[2].uv, [0.25, 0.25]);
    }

    #[test]
    fn test_draw_uv_uses_decoded_size() {
        let mut f = fixture();
        let s = Sprite::named("walk_2", &f.defs, 0);
        assert!(s.draw(&f.defs, &mut f.textures, &f.viewport, &mut f.gpu));
        let quad = f.gpu.last_draw().unwrap();
        assert_eq!(quad[0].uv, [0.125, 0.25]);
        assert_eq!(quad[2].uv, [0.25, 0.5]);
    }

    #[test]
    fn test_draw_culls_offscreen() {
        let mut f = fixture();
        let mut s = Sprite::named("ship", &f.defs, 0);
        s.origin = Vector2 { x: 1000.0, y: 0.0 };
        assert!(!s.draw(&f.defs, &mut f.textures, &f.viewport, &mut f.gpu));
        assert!(f.gpu.calls.is_empty());

        let moved = f.viewport.with_camera(Vector2 { x: 900.0, y: 0.0 });
        assert!(s.draw(&f.defs, &mut f.textures, &moved, &mut f.gpu));
    }

    #[test]
    fn test_draw_skips_hidden() {
        let mut f = fixture();
        let mut s = Sprite::named("ship", &f.defs, 0);
        s.z = 1.0;
        assert!(!s.draw(&f.defs, &mut f.textures, &f.viewport, &mut f.gpu));
        s.z = -1.0;
        s.modulate.a = 0;
        assert!(!s.draw(&f.defs, &mut f.textures, &f.viewport, &mut f.gpu));
        assert!(f.gpu.calls.is_empty());
    }

    #[test]
    fn test_draw_flip_xor_and_additive() {
        let mut f = fixture();
        let mut s = Sprite::named("flipped", &f.defs, 0);
        s.draw(&f.defs, &mut f.textures, &f.viewport, &mut f.gpu);
        assert!(f.gpu.calls.contains(&GpuCall::Scale(32.0, -16.0)));
        assert!(f.gpu.calls.contains(&GpuCall::SetBlend(crate::gpu::BlendMode::Additive)));

        f.gpu.clear();
        s.flip = true;
        s.mirror = true;
        s.draw(&f.defs, &mut f.textures, &f.viewport, &mut f.gpu);
        assert!(f.gpu.calls.contains(&GpuCall::Scale(-32.0, 16.0)));
    }

    #[test]
    fn test_untextured_sprite_sets_its_own_blend() {
        let mut f = fixture();
        let glow = Sprite::named("glow", &f.defs, 0);
        assert!(glow.draw(&f.defs, &mut f.textures, &f.viewport, &mut f.gpu));
        assert!(f.gpu.calls.contains(&GpuCall::SetBlend(crate::gpu::BlendMode::Additive)));
        assert!(f.gpu.calls.contains(&GpuCall::BindTexture(None)));
        assert_eq!(f.gpu.draw_count(), 1);
    }

    #[test]
    fn test_untextured_sprite_resets_alpha_blend() {
        let mut f = fixture();
        let glow = Sprite::named("glow", &f.defs, 0);
        glow.draw(&f.defs, &mut f.textures, &f.viewport, &mut f.gpu);
        f.gpu.clear();

        let mut defs = SpriteDefinitionCache::new();
        defs.parse_str(
            "plain",
            "plain { box { 0 0 8 8 } }",
            Path::new(""),
            &mut f.textures,
            &FakeDecoder,
            &mut f.gpu,
        );
        let plain = Sprite::named("plain", &defs, 0);
        assert!(plain.draw(&defs, &mut f.textures, &f.viewport, &mut f.gpu));
        assert!(f.gpu.calls.contains(&GpuCall::SetBlend(crate::gpu::BlendMode::Alpha)));
    }

    #[test]
    fn test_failed_texture_skips_draw() {
        let mut f = fixture();
        let ghost = Sprite::named("ghost", &f.defs, 0);
        assert!(ghost.is_bound());
        assert!(!ghost.draw(&f.defs, &mut f.textures, &f.viewport, &mut f.gpu));
        assert_eq!(f.gpu.draw_count(), 0);
        assert!(f.gpu.calls.is_empty());
    }

    #[test]
    fn test_rotated_draw_upscales_texture() {
        let mut f = fixture();
        let mut s = Sprite::named("ship", &f.defs, 0);
        s.angle = std::f32::consts::FRAC_PI_2;
        s.draw(&f.defs, &mut f.textures, &f.viewport, &mut f.gpu);
        assert!(f.gpu.calls.iter().any(|c| matches!(c, GpuCall::Rotate(d) if approx_eq(*d, 90.0))));
        assert_eq!(f.gpu.upload_count(), 1);
        let tex = f.defs.get("ship").unwrap().texture.unwrap();
        assert!(f.textures.get(tex).unwrap().is_upscaled());
    }

    #[test]
    fn test_modulate_colors() {
        let c = modulate(Color::new(255, 128, 0, 255), Color::new(128, 255, 255, 128));
        assert_eq!((c.r, c.g, c.b, c.a), (128, 128, 0, 128));
    }
}
