//! # Lumen Graphics
//!
//! Frame-proxy render pipeline for the Lumen renderer.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`proxy`] - per-frame immutable [`SceneProxy`] snapshots built from a
//!   live [`World`](lumen_core::scene::World) into a [`RenderProxyArena`]
//! - [`targets`] - the resolution-dependent render-target pool and its
//!   reallocation state machine
//! - [`passes`] - the scene passes and the data-driven post-process chain
//! - [`SceneRenderer`] - the per-frame pass orchestrator
//! - [`FramePipeline`] - the producer/consumer handoff to a render thread
//! - [`light_probe`] - tile-atlas allocation for reflection probes and
//!   irradiance volumes
//! - [`GraphicsDevice`] over a [`GpuBackend`](backend::GpuBackend), with a
//!   recording [`DummyBackend`] for headless runs and tests
//!
//! ## Example
//!
//! ```ignore
//! use lumen_graphics::{BuildSceneProxy, FramePipeline, GraphicsDevice, PipelineConfig};
//!
//! let (device, _backend) = GraphicsDevice::with_dummy_backend();
//! let mut pipeline = FramePipeline::spawn(device, PipelineConfig::default())?;
//!
//! let arena = pipeline.acquire_arena();
//! let proxy = world.build_scene_proxy(request, arena, &mut probes, pipeline.assets());
//! pipeline.submit(proxy);
//! pipeline.shutdown();
//! ```

pub mod assets;
pub mod backend;
pub mod commands;
pub mod device;
pub mod error;
pub mod light_probe;
pub mod passes;
pub mod profiling;
pub mod proxy;
pub mod render_thread;
pub mod renderer;
pub mod resources;
pub mod settings;
pub mod sync;
pub mod targets;
pub mod types;

pub use assets::{GpuAssets, GpuMesh, MaterialDescriptor, MaterialInstance};
pub use backend::{BackendEvent, DummyBackend};
pub use commands::{CommandEncoder, CommandList};
pub use device::{DeviceCapabilities, GraphicsDevice};
pub use error::GraphicsError;
pub use light_probe::{LightProbeConfig, LightProbeSystem, TileAllocator, TileId};
pub use passes::{PassKind, PostProcessPlan, PostStage, RenderPass};
pub use proxy::{
    ArenaPool, BuildSceneProxy, MAX_LANDSCAPE_PATCHES, ProxyRequest, ProxySource,
    RenderProxyArena, SceneProxy, Screenshot, ScreenshotRequest,
};
pub use render_thread::{FrameCompletion, FramePipeline, PipelineConfig};
pub use renderer::{FrameOutput, FrameReport, RendererConfig, SceneRenderer};
pub use resources::{Buffer, Program, Texture};
pub use settings::{RenderSettings, SettingsOverride};
pub use sync::Fence;
pub use targets::{RenderResolution, SceneRenderTargets, TargetKey, TargetState};
pub use types::{Extent2d, TextureDescriptor, TextureFormat, TextureUsage};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the graphics library banner.
pub fn init() {
    log::info!("Lumen Graphics v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_dummy_device() {
        let (device, backend) = GraphicsDevice::with_dummy_backend();
        assert_eq!(device.name(), "Dummy Backend");
        assert_eq!(backend.live_texture_count(), 0);
    }
}
