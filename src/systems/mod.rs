//! Engine systems.
//!
//! Submodules overview
//! - [`animation`] – advance sprite animation chains
//! - [`render`] – draw sprites through a GPU backend and release render resources
//! - [`time`] – update simulation time and delta

pub mod animation;
pub mod render;
pub mod time;
