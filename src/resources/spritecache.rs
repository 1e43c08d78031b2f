//! Sprite definition cache resource.
//!
//! Sprite definitions are parsed from configuration files and never change
//! afterwards. Each one names a region of a texture, its pivot, colour
//! modulation, blend/flip flags and an optional animation successor.
//!
//! # Configuration format
//!
//! ```text
//! include common.cfg
//!
//! ship {
//!     file ship.png          # texture, loaded through the TextureCache
//!     box { 0 0 32 32 }      # x y w h within the texture (default: whole texture)
//!     center { 16 20 }       # pivot (default: middle of the box)
//!     color { 255 200 200 }  # modulation, 0-255, optional alpha (default: white)
//!     additive               # additive blending
//!     flip                   # default vertical flip
//!     mirror                 # default horizontal mirror
//!     next { ship_2 100 }    # switch to `ship_2` after 100 ms
//! }
//! ```
//!
//! Keywords are case-insensitive. Relative `file` and `include` paths are
//! resolved against the directory of the file being parsed. Problems (duplicate
//! names, unknown fields or commands, unreadable files) are logged and parsing
//! carries on with the next token.

use std::path::{Path, PathBuf};

use bevy_ecs::prelude::Resource;
use log::{debug, warn};
use raylib::prelude::{Color, Vector2};
use serde::Serialize;
use smallvec::SmallVec;

use crate::gpu::GpuBackend;
use crate::registry::{AllocPolicy, NamedHandle, NamedRegistry};
use crate::resources::texturecache::TextureCache;
use crate::texture::{ImageDecoder, Texture};
use crate::tokenizer::Tokenizer;

/// Deepest include nesting accepted before giving up.
const MAX_INCLUDE_DEPTH: usize = 16;

/// Successor frame of an animated sprite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationLink {
    pub name: String,
    pub delay_msec: u64,
}

/// Parsed, immutable description of how to draw a named sprite.
#[derive(Debug, Clone)]
pub struct SpriteDefinition {
    /// Shared texture; its lifetime is managed by the [`TextureCache`].
    pub texture: Option<NamedHandle<Texture>>,
    pub box_origin: Vector2,
    pub box_size: Vector2,
    /// Rotation pivot in texture pixels relative to `box_origin`.
    pub center: Vector2,
    pub modulate: Color,
    pub additive: bool,
    pub flip: bool,
    pub mirror: bool,
    pub next: Option<AnimationLink>,
}

impl Default for SpriteDefinition {
    fn default() -> Self {
        Self {
            texture: None,
            box_origin: Vector2 { x: 0.0, y: 0.0 },
            box_size: Vector2 { x: 0.0, y: 0.0 },
            center: Vector2 { x: 0.0, y: 0.0 },
            modulate: Color::WHITE,
            additive: false,
            flip: false,
            mirror: false,
            next: None,
        }
    }
}

/// Serializable summary of a definition, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct SpriteInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(rename = "box")]
    pub bbox: [f32; 4],
    pub center: [f32; 2],
    pub color: [u8; 4],
    pub additive: bool,
    pub flip: bool,
    pub mirror: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<(String, u64)>,
}

/// Registry of sprite definitions keyed by sprite name.
#[derive(Resource, Default)]
pub struct SpriteDefinitionCache {
    registry: NamedRegistry<SpriteDefinition>,
}

impl SpriteDefinitionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a sprite configuration file. Returns how many definitions were added.
    pub fn parse_file(
        &mut self,
        path: impl AsRef<Path>,
        textures: &mut TextureCache,
        decoder: &dyn ImageDecoder,
        gpu: &mut dyn GpuBackend,
    ) -> usize {
        let mut parser = SpriteParser {
            defs: &mut self.registry,
            textures,
            decoder,
            gpu,
            includes: SmallVec::new(),
        };
        parser.parse_file(path.as_ref())
    }

    /// Parse configuration text; relative paths resolve against `base_dir`.
    pub fn parse_str(
        &mut self,
        source_name: &str,
        text: &str,
        base_dir: &Path,
        textures: &mut TextureCache,
        decoder: &dyn ImageDecoder,
        gpu: &mut dyn GpuBackend,
    ) -> usize {
        let mut parser = SpriteParser {
            defs: &mut self.registry,
            textures,
            decoder,
            gpu,
            includes: SmallVec::new(),
        };
        parser.parse_source(source_name, text, base_dir)
    }

    pub fn get(&self, name: &str) -> Option<&SpriteDefinition> {
        self.registry.get(name)
    }

    pub fn handle(&self, name: &str) -> Option<NamedHandle<SpriteDefinition>> {
        self.registry.handle(name)
    }

    pub fn resolve(&self, handle: NamedHandle<SpriteDefinition>) -> Option<&SpriteDefinition> {
        self.registry.resolve(handle)
    }

    /// Bounding-box size of a named sprite, or zero if it is not defined.
    pub fn size_of(&self, name: &str) -> Vector2 {
        self.registry
            .get(name)
            .map(|def| def.box_size)
            .unwrap_or(Vector2 { x: 0.0, y: 0.0 })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.registry.iter().map(|(name, _)| name)
    }

    /// Drop every definition. Textures stay in their cache.
    pub fn free_all(&mut self) -> usize {
        self.registry.free_all()
    }

    /// Summaries of all definitions sorted by name.
    pub fn describe(&self, textures: &TextureCache) -> Vec<SpriteInfo> {
        let mut infos: Vec<SpriteInfo> = self
            .registry
            .iter()
            .map(|(name, def)| SpriteInfo {
                name: name.to_string(),
                file: def
                    .texture
                    .and_then(|t| textures.path_of(t))
                    .map(str::to_string),
                bbox: [
                    def.box_origin.x,
                    def.box_origin.y,
                    def.box_size.x,
                    def.box_size.y,
                ],
                center: [def.center.x, def.center.y],
                color: [def.modulate.r, def.modulate.g, def.modulate.b, def.modulate.a],
                additive: def.additive,
                flip: def.flip,
                mirror: def.mirror,
                next: def
                    .next
                    .as_ref()
                    .map(|link| (link.name.clone(), link.delay_msec)),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }
}

fn resolve_path(base_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Colour channel from a 0-255 float.
fn channel(value: f32) -> u8 {
    value.clamp(0.0, 255.0).round() as u8
}

struct SpriteParser<'a> {
    defs: &'a mut NamedRegistry<SpriteDefinition>,
    textures: &'a mut TextureCache,
    decoder: &'a dyn ImageDecoder,
    gpu: &'a mut dyn GpuBackend,
    /// Files currently being parsed, outermost first.
    includes: SmallVec<[PathBuf; 4]>,
}

impl SpriteParser<'_> {
    fn parse_file(&mut self, path: &Path) -> usize {
        let identity = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if self.includes.contains(&identity) {
            warn!("Sprite config '{}' includes itself, skipping", path.display());
            return 0;
        }
        if self.includes.len() >= MAX_INCLUDE_DEPTH {
            warn!(
                "Sprite config '{}' nested too deeply, skipping",
                path.display()
            );
            return 0;
        }
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to read sprite config '{}': {}", path.display(), e);
                return 0;
            }
        };
        debug!("Parsing sprite config '{}'", path.display());

        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        self.includes.push(identity);
        let added = self.parse_source(&path.display().to_string(), &text, &base_dir);
        self.includes.pop();
        added
    }

    fn parse_source(&mut self, source_name: &str, text: &str, base_dir: &Path) -> usize {
        let mut tok = Tokenizer::new(text);
        let mut added = 0;

        while !tok.is_at_end() {
            let Some(token) = tok.token() else {
                warn!("Stray '}}' in sprite config '{}'", source_name);
                tok.skip_token();
                continue;
            };

            // Commands
            if !tok.open_brace() {
                if token.eq_ignore_ascii_case("include") {
                    match tok.token() {
                        Some(path) => added += self.parse_file(&resolve_path(base_dir, &path)),
                        None => warn!("'include' without a path in '{}'", source_name),
                    }
                } else {
                    warn!("Unrecognized command '{}' in '{}'", token, source_name);
                }
                continue;
            }

            // Sprite section
            match self.defs.alloc(&token, None, AllocPolicy::FailIfExists) {
                Some(allocation) => {
                    let def = self.parse_section(&mut tok, &token, base_dir);
                    if let Some(slot) = self.defs.resolve_mut(allocation.handle) {
                        *slot = def;
                    }
                    added += 1;
                }
                None => warn!("Sprite '{}' already defined", token),
            }
            tok.close_brace();
        }
        added
    }

    fn parse_section(&mut self, tok: &mut Tokenizer, name: &str, base_dir: &Path) -> SpriteDefinition {
        let mut def = SpriteDefinition::default();
        let mut have_box = false;
        let mut have_center = false;

        while let Some(token) = tok.token() {
            match token.to_ascii_lowercase().as_str() {
                "file" => match tok.token() {
                    Some(file) => {
                        def.texture = self.textures.load(
                            resolve_path(base_dir, &file),
                            self.decoder,
                            &mut *self.gpu,
                        );
                    }
                    None => warn!("Sprite '{}': 'file' without a path", name),
                },
                "color" if tok.open_brace() => {
                    let r = channel(tok.token_f32());
                    let g = channel(tok.token_f32());
                    let b = channel(tok.token_f32());
                    let a = tok
                        .token()
                        .and_then(|t| t.parse::<f32>().ok())
                        .map(channel)
                        .unwrap_or(255);
                    def.modulate = Color::new(r, g, b, a);
                    tok.close_brace();
                }
                "additive" => def.additive = true,
                "flip" => def.flip = true,
                "mirror" => def.mirror = true,
                "box" if tok.open_brace() => {
                    def.box_origin.x = tok.token_i32() as f32;
                    def.box_origin.y = tok.token_i32() as f32;
                    def.box_size.x = tok.token_i32() as f32;
                    def.box_size.y = tok.token_i32() as f32;
                    tok.close_brace();
                    have_box = true;
                }
                "center" if tok.open_brace() => {
                    def.center.x = tok.token_i32() as f32;
                    def.center.y = tok.token_i32() as f32;
                    tok.close_brace();
                    have_center = true;
                }
                "next" if tok.open_brace() => {
                    let next_name = tok.token().unwrap_or_default();
                    let delay = tok.token_i32().max(0) as u64;
                    tok.close_brace();
                    def.next = (!next_name.is_empty()).then_some(AnimationLink {
                        name: next_name,
                        delay_msec: delay,
                    });
                }
                _ => {
                    warn!("Unknown sprite param '{}' in '{}'", token, name);
                    if tok.open_brace() {
                        tok.close_brace();
                    }
                }
            }
        }

        if !have_box {
            def.box_size = match def.texture {
                Some(texture) => self.textures.size(texture),
                None => Vector2 { x: 0.0, y: 0.0 },
            };
        }
        if !have_center {
            def.center = Vector2 {
                x: def.box_size.x / 2.0,
                y: def.box_size.y / 2.0,
            };
        }
        def
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::RecordingGpu;
    use image::{Rgba, RgbaImage};

    /// Serves a 64x32 image for "*.png" paths that don't mention "missing".
    struct FakeDecoder;

    impl ImageDecoder for FakeDecoder {
        fn decode(&self, path: &Path) -> Result<RgbaImage, String> {
            let p = path.to_string_lossy();
            if p.ends_with(".png") && !p.contains("missing") {
                Ok(RgbaImage::from_pixel(64, 32, Rgba([0, 255, 0, 255])))
            } else {
                Err("not found".to_string())
            }
        }
    }

    fn parse(text: &str) -> (SpriteDefinitionCache, TextureCache, RecordingGpu) {
        let mut defs = SpriteDefinitionCache::new();
        let mut textures = TextureCache::new(2);
        let mut gpu = RecordingGpu::new();
        defs.parse_str("test", text, Path::new(""), &mut textures, &FakeDecoder, &mut gpu);
        (defs, textures, gpu)
    }

    #[test]
    fn test_explicit_box_and_center() {
        let (defs, _, _) = parse("ship { file ship.png box { 0 0 64 32 } center { 10 12 } }");
        let def = defs.get("ship").unwrap();
        assert_eq!(defs.size_of("ship").x, 64.0);
        assert_eq!(defs.size_of("ship").y, 32.0);
        assert_eq!(def.center.x, 10.0);
        assert_eq!(def.center.y, 12.0);
        assert!(def.texture.is_some());
    }

    #[test]
    fn test_defaults_from_texture() {
        let (defs, _, _) = parse("ship { file ship.png }");
        let def = defs.get("ship").unwrap();
        assert_eq!(def.box_size.x, 64.0);
        assert_eq!(def.box_size.y, 32.0);
        assert_eq!(def.center.x, 32.0);
        assert_eq!(def.center.y, 16.0);
        assert_eq!(def.modulate.r, 255);
        assert_eq!(def.modulate.a, 255);
        assert!(!def.additive && !def.flip && !def.mirror);
        assert!(def.next.is_none());
    }

    #[test]
    fn test_missing_texture_gives_zero_size() {
        let (defs, textures, _) = parse("ghost { file missing.png }");
        assert_eq!(defs.size_of("ghost").x, 0.0);
        assert_eq!(textures.len(), 1);
    }

    #[test]
    fn test_size_of_unknown_is_zero() {
        let (defs, _, _) = parse("");
        let size = defs.size_of("nope");
        assert_eq!((size.x, size.y), (0.0, 0.0));
    }

    #[test]
    fn test_flags_color_and_next() {
        let (defs, _, _) = parse(
            "Boom { FILE boom.png Additive FLIP mirror color { 255 128 0 64 } NEXT { boom2 250 } }",
        );
        let def = defs.get("Boom").unwrap();
        assert!(def.additive && def.flip && def.mirror);
        assert_eq!(
            (def.modulate.r, def.modulate.g, def.modulate.b, def.modulate.a),
            (255, 128, 0, 64)
        );
        assert_eq!(
            def.next,
            Some(AnimationLink {
                name: "boom2".to_string(),
                delay_msec: 250
            })
        );
    }

    #[test]
    fn test_color_alpha_defaults_to_opaque() {
        let (defs, _, _) = parse("a { color { 10 20 30 } }");
        let c = defs.get("a").unwrap().modulate;
        assert_eq!((c.r, c.g, c.b, c.a), (10, 20, 30, 255));
    }

    #[test]
    fn test_duplicate_keeps_first_and_skips_body() {
        let (defs, _, _) = parse(
            "a { box { 0 0 8 8 } }\n a { box { 0 0 99 99 } }\n b { box { 0 0 4 4 } }",
        );
        assert_eq!(defs.len(), 2);
        assert_eq!(defs.size_of("a").x, 8.0);
        assert_eq!(defs.size_of("b").x, 4.0);
    }

    #[test]
    fn test_unknown_fields_and_commands_are_skipped() {
        let (defs, _, _) = parse(
            "bogus_command\n a { sparkle box { 0 0 5 6 } wobble } b { mirror }",
        );
        assert_eq!(defs.len(), 2);
        assert_eq!(defs.size_of("a").y, 6.0);
        assert!(defs.get("b").unwrap().mirror);
    }

    #[test]
    fn test_unknown_field_with_block_is_skipped_whole() {
        let (defs, _, _) = parse("a { glow { 1 2 { 3 } } box { 0 0 5 6 } } b { }");
        assert_eq!(defs.len(), 2);
        assert!(!defs.contains("box"));
        let size = defs.size_of("a");
        assert_eq!((size.x, size.y), (5.0, 6.0));
        assert!(defs.contains("b"));
    }

    #[test]
    fn test_stray_closing_brace_is_skipped() {
        let (defs, _, _) = parse("} a { box { 0 0 2 2 } }");
        assert_eq!(defs.size_of("a").x, 2.0);
    }

    #[test]
    fn test_same_texture_is_shared() {
        let (defs, textures, gpu) = parse("a { file s.png } b { file s.png box { 0 0 8 8 } }");
        assert_eq!(defs.get("a").unwrap().texture, defs.get("b").unwrap().texture);
        assert_eq!(textures.len(), 1);
        assert_eq!(gpu.live_textures(), 1);
    }

    #[test]
    fn test_describe_is_sorted() {
        let (defs, textures, _) = parse("zed { file z.png } alpha { next { zed 10 } }");
        let infos = defs.describe(&textures);
        assert_eq!(infos[0].name, "alpha");
        assert_eq!(infos[0].next, Some(("zed".to_string(), 10)));
        assert_eq!(infos[1].file.as_deref(), Some("z.png"));
        let json = serde_json::to_string(&infos).unwrap();
        assert!(json.contains("\"box\":[0.0,0.0,64.0,32.0]"));
    }

    #[test]
    fn test_free_all() {
        let (mut defs, _, _) = parse("a { } b { }");
        assert_eq!(defs.free_all(), 2);
        assert!(defs.is_empty());
        assert_eq!(defs.free_all(), 0);
    }
}
