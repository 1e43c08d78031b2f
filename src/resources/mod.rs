//! ECS resources made available to systems.
//!
//! Overview
//! - `gameconfig` – viewer settings loaded from an INI file
//! - `renderstats` – per-frame draw counters
//! - `spritecache` – sprite definitions parsed from config files
//! - `texturecache` – loaded textures keyed by file path
//! - `viewport` – world-space rectangle visible this frame
//! - `worldtime` – simulation time and delta
pub mod gameconfig;
pub mod renderstats;
pub mod spritecache;
pub mod texturecache;
pub mod viewport;
pub mod worldtime;
