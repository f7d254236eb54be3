//! Shared fixtures for the pipeline integration tests.
//!
//! Everything runs on the recording [`DummyBackend`], so tests can inspect
//! created textures, labels and submitted command lists.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Quat, UVec3, Vec2, Vec3};

use lumen_core::ids::{MaterialId, MeshId};
use lumen_core::scene::{
    Camera, CloudLayer, DirectionalLight, IrradianceVolume, Landscape, PointLight, RectLight,
    ReflectionProbe, SkyAtmosphere, StaticMesh, Transform, World,
};
use lumen_graphics::backend::{BackendEvent, ResourceId};
use lumen_graphics::commands::{Command, CommandList};
use lumen_graphics::types::BlendMode;
use lumen_graphics::{
    BuildSceneProxy, DummyBackend, Extent2d, GpuAssets, GraphicsDevice, LightProbeConfig,
    LightProbeSystem, MaterialDescriptor, ProxyRequest, RenderProxyArena, SceneProxy,
};

/// Cube mesh.
pub const CUBE: MeshId = MeshId::new(1);
/// Opaque surface material.
pub const STONE: MaterialId = MaterialId::new(1);
/// Alpha-blended material.
pub const GLASS: MaterialId = MaterialId::new(2);
/// Terrain material.
pub const TERRAIN: MaterialId = MaterialId::new(3);

/// Arena budget used by tests.
pub const TEST_ARENA_BYTES: usize = 256 * 1024;

/// Install a test logger once.
pub fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

/// Device on a recording dummy backend.
pub fn dummy_device() -> (Arc<GraphicsDevice>, Arc<DummyBackend>) {
    init_logging();
    GraphicsDevice::with_dummy_backend()
}

/// Make the cube mesh and the three materials resident.
pub fn upload_assets(device: &Arc<GraphicsDevice>, assets: &GpuAssets) {
    let vertices: Vec<u8> = bytemuck::cast_slice(&[[0.0f32; 8]; 24]).to_vec();
    let indices: Vec<u32> = (0..36).collect();
    assets
        .upload_mesh(device, CUBE, &vertices, &indices, Vec3::ZERO, 0.87)
        .expect("cube upload");
    assets
        .create_material(device, STONE, MaterialDescriptor::new("gbuffer_standard"))
        .expect("stone material");
    assets
        .create_material(
            device,
            GLASS,
            MaterialDescriptor::new("forward_glass").with_blend(BlendMode::AlphaBlend),
        )
        .expect("glass material");
    assets
        .create_material(device, TERRAIN, MaterialDescriptor::new("gbuffer_landscape"))
        .expect("terrain material");
}

/// A scene exercising every component kind:
/// a shadowed sun, a fill light, two point lights (one shadowed), a rect
/// light, three opaque cubes, two glass cubes at different depths, terrain,
/// a cloudy sky, a baked reflection probe and a baked irradiance volume.
pub fn demo_world() -> World {
    let mut world = World::new();

    let sun = world.spawn(
        "Sun",
        Transform::IDENTITY.looking_at(Vec3::new(-0.3, -1.0, -0.4), Vec3::Y),
    );
    add(&mut world, sun, DirectionalLight {
        intensity: 100_000.0,
        primary: true,
        ..Default::default()
    });
    let fill = world.spawn("Fill", Transform::from_rotation(Quat::from_rotation_x(-0.5)));
    add(&mut world, fill, DirectionalLight {
        intensity: 500.0,
        cast_shadows: false,
        ..Default::default()
    });

    let lamp = world.spawn("Lamp", Transform::from_xyz(2.0, 3.0, -4.0));
    add(&mut world, lamp, PointLight {
        intensity: 800.0,
        radius: 8.0,
        cast_shadows: true,
        ..Default::default()
    });
    let candle = world.spawn("Candle", Transform::from_xyz(-2.0, 1.0, -6.0));
    add(&mut world, candle, PointLight {
        intensity: 20.0,
        radius: 2.0,
        ..Default::default()
    });
    let panel = world.spawn("Panel", Transform::from_xyz(0.0, 4.0, -8.0));
    add(&mut world, panel, RectLight {
        size: Vec2::new(2.0, 1.0),
        ..Default::default()
    });

    for (i, x) in [-3.0, 0.0, 3.0].into_iter().enumerate() {
        let cube = world.spawn(format!("Cube{i}"), Transform::from_xyz(x, 0.5, -6.0));
        add(&mut world, cube, StaticMesh::new(CUBE, STONE));
    }
    let near_glass = world.spawn("GlassNear", Transform::from_xyz(0.5, 1.0, -3.0));
    add(&mut world, near_glass, StaticMesh::new(CUBE, GLASS));
    let far_glass = world.spawn("GlassFar", Transform::from_xyz(-0.5, 1.0, -9.0));
    add(&mut world, far_glass, StaticMesh::new(CUBE, GLASS));

    let terrain = world.spawn("Terrain", Transform::IDENTITY);
    add(&mut world, terrain, Landscape {
        material: Some(TERRAIN),
        size: Vec2::splat(64.0),
        patches: 8,
        ..Default::default()
    });

    let sky = world.spawn("Sky", Transform::IDENTITY);
    add(&mut world, sky, SkyAtmosphere {
        clouds: Some(CloudLayer::default()),
        ..Default::default()
    });

    let probe = world.spawn("Probe", Transform::from_xyz(0.0, 2.0, -6.0));
    add(&mut world, probe, ReflectionProbe {
        baked: true,
        ..Default::default()
    });
    add(&mut world, probe, IrradianceVolume {
        resolution: UVec3::new(2, 2, 2),
        baked: true,
        ..Default::default()
    });

    world
}

fn add(
    world: &mut World,
    id: lumen_core::scene::ActorId,
    component: impl Into<lumen_core::scene::Component>,
) {
    world
        .actor_mut(id)
        .expect("actor just spawned")
        .add_component(component);
}

/// Camera looking down -Z at the demo scene.
pub fn demo_camera() -> Camera {
    Camera::look_at(Vec3::new(0.0, 2.0, 4.0), Vec3::new(0.0, 1.0, -6.0), Vec3::Y)
        .with_clip_planes(0.1, 200.0)
}

/// Producer-side state for building proxies outside a [`FramePipeline`](lumen_graphics::FramePipeline).
pub struct Producer {
    /// Scene graph.
    pub world: World,
    /// Persistent atlas allocations.
    pub probes: LightProbeSystem,
    /// Residency registry shared with the renderer.
    pub assets: Arc<GpuAssets>,
}

impl Producer {
    /// Demo scene with every asset resident.
    pub fn demo(device: &Arc<GraphicsDevice>) -> Self {
        let assets = Arc::new(GpuAssets::new());
        upload_assets(device, &assets);
        Self {
            world: demo_world(),
            probes: LightProbeSystem::new(LightProbeConfig::default()),
            assets,
        }
    }

    /// Build a proxy into a fresh arena.
    pub fn build(&mut self, request: ProxyRequest) -> SceneProxy {
        self.build_into(request, RenderProxyArena::new(TEST_ARENA_BYTES))
    }

    /// Build a proxy into `arena`.
    pub fn build_into(&mut self, request: ProxyRequest, arena: RenderProxyArena) -> SceneProxy {
        self.world
            .build_scene_proxy(request, arena, &mut self.probes, &self.assets)
    }
}

/// Main-scene request for `frame` at `width` x `height`.
pub fn request(frame: u64, width: u32, height: u32) -> ProxyRequest {
    ProxyRequest::new(frame, demo_camera(), Extent2d::new(width, height))
}

/// Labels of the render passes in a submitted list.
pub fn pass_labels(list: &CommandList) -> Vec<String> {
    list.render_pass_labels()
        .into_iter()
        .map(str::to_owned)
        .collect()
}

/// Labels of textures created in `events`, in creation order.
pub fn created_textures(events: &[BackendEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            BackendEvent::CreateTexture { label, .. } => label.clone(),
            _ => None,
        })
        .collect()
}

/// Index of the first event matching `predicate`.
pub fn position(events: &[BackendEvent], predicate: impl Fn(&BackendEvent) -> bool) -> usize {
    events
        .iter()
        .position(predicate)
        .expect("event not recorded")
}

/// Size of every texture created in `events`.
pub fn texture_sizes(events: &[BackendEvent]) -> HashMap<ResourceId, Extent2d> {
    events
        .iter()
        .filter_map(|event| match event {
            BackendEvent::CreateTexture { id, size, .. } => Some((*id, size.xy())),
            _ => None,
        })
        .collect()
}

/// Blits recorded in a command list as `(src size, dst size)`.
pub fn blit_sizes(list: &CommandList, sizes: &HashMap<ResourceId, Extent2d>) -> Vec<(Extent2d, Extent2d)> {
    list.commands()
        .iter()
        .filter_map(|command| match command {
            Command::BlitTexture { src, dst, .. } => Some((sizes[src], sizes[dst])),
            _ => None,
        })
        .collect()
}

/// Draw commands recorded inside the render pass labelled `label`.
pub fn draws_in_pass(list: &CommandList, label: &str) -> usize {
    list.commands()
        .iter()
        .skip_while(|command| {
            !matches!(command, Command::BeginRenderPass { label: l, .. } if l == label)
        })
        .take_while(|command| !matches!(command, Command::EndRenderPass))
        .filter(|command| matches!(command, Command::DrawIndexed { .. } | Command::Draw { .. }))
        .count()
}
