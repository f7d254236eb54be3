//! # Lumen Core
//!
//! Simulation-side building blocks shared by the Lumen renderer:
//! - [`scene`] - the live scene graph (world, actors, components, camera)
//! - [`cvars`] - typed console-variable registry for runtime tunables
//! - [`ids`] - typed handles naming GPU-side assets
//! - [`pool`] - capacity-preserving recycling of frame-scoped containers
//! - [`profiling`] - optional Tracy instrumentation

pub mod cvars;
pub mod ids;
pub mod pool;
pub mod profiling;
pub mod scene;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the core library banner.
pub fn init() {
    log::info!("Lumen Core v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
