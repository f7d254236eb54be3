//! Per-frame scene snapshots.
//!
//! The producer thread turns the live [`World`](lumen_core::scene::World)
//! into a [`SceneProxy`]: a self-contained, read-only description of what the
//! render thread should draw. Proxies live in a [`RenderProxyArena`] that is
//! recycled once the frame has been consumed.
//!
//! ## Lifecycle
//!
//! ```text
//! acquire arena -> SceneProxy::new -> push_* (build) -> finalize
//!      -> [render thread] prepare_view -> passes read -> into_arena -> release
//! ```
//!
//! Lists are append-only while building and frozen by
//! [`SceneProxy::finalize`]; every later phase only reads them.
//!
//! ## Example
//!
//! ```ignore
//! use lumen_graphics::proxy::{BuildSceneProxy, ProxyRequest, RenderProxyArena};
//!
//! let request = ProxyRequest::new(frame, camera, Extent2d::new(1920, 1080));
//! let proxy = world.build_scene_proxy(request, arena, &mut probes, &assets);
//! pipeline.submit(proxy);
//! ```

mod arena;
mod builder;
mod scene_proxy;
mod types;

pub use arena::{ArenaPool, ArenaProxy, DEFAULT_ARENA_BYTES, ProxyHandle, RenderProxyArena};
pub use builder::{
    BuildSceneProxy, ContributeProxy, ContributionContext, MAX_LANDSCAPE_PATCHES,
};
pub use scene_proxy::{
    MeshPass, ProxyCounts, ProxyList, ProxyRequest, ProxySource, SceneProxy, Screenshot,
    ScreenshotRequest,
};
pub use types::{
    CameraProxy, DirectionalLightProxy, IrradianceVolumeProxy, LandscapeProxy, PointLightProxy,
    RectLightProxy, ReflectionProbeProxy, SkyProxy, StaticMeshProxy,
};
