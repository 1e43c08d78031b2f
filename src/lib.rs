//! spriteforge library.
//!
//! Resource and rendering layer for 2D sprites: named registries with
//! allocation policies and cleanup hooks, a texture cache that packs images
//! into power-of-two GPU buffers, sprite definitions parsed from config files
//! and the per-entity [`Sprite`](components::sprite::Sprite) component that
//! animates and draws them through a [`GpuBackend`](gpu::GpuBackend).

pub mod components;
pub mod gpu;
pub mod registry;
pub mod resources;
pub mod systems;
pub mod texture;
pub mod tokenizer;
