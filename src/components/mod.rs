//! ECS components for entities.
//!
//! Submodules overview:
//! - [`sprite`] – sprite instance bound to a named definition: placement,
//!   animation and drawing

pub mod sprite;
