//! Command implementations.

pub mod fetch_assets;
pub mod render;
