use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use glam::Vec3;

use lumen_core::ids::{MaterialId, MeshId};
use lumen_core::scene::{Camera, DirectionalLight, PointLight, StaticMesh, Transform, World};
use lumen_graphics::{
    BuildSceneProxy, DeviceCapabilities, DummyBackend, Extent2d, FrameOutput, GpuAssets,
    GraphicsDevice, LightProbeConfig, LightProbeSystem, MaterialDescriptor, PostProcessPlan,
    ProxyRequest, ProxySource, RenderProxyArena, RenderSettings, RendererConfig, SceneRenderer,
    TextureDescriptor, TextureFormat, TextureUsage, TileAllocator,
};

const MESH: MeshId = MeshId::new(1);
const MATERIAL: MaterialId = MaterialId::new(1);

fn quiet_device() -> Arc<GraphicsDevice> {
    GraphicsDevice::new(Arc::new(DummyBackend::quiet()), DeviceCapabilities::default())
}

fn resident_assets(device: &Arc<GraphicsDevice>) -> Arc<GpuAssets> {
    let assets = Arc::new(GpuAssets::new());
    let vertices = vec![0u8; 24 * 32];
    let indices: Vec<u32> = (0..36).collect();
    assets
        .upload_mesh(device, MESH, &vertices, &indices, Vec3::ZERO, 0.87)
        .unwrap();
    assets
        .create_material(device, MATERIAL, MaterialDescriptor::new("gbuffer_standard"))
        .unwrap();
    assets
}

/// A grid of `side * side` cubes lit by a sun and a few point lights.
fn grid_world(side: u32) -> World {
    let mut world = World::new();
    let sun = world.spawn(
        "Sun",
        Transform::IDENTITY.looking_at(Vec3::new(-0.3, -1.0, -0.4), Vec3::Y),
    );
    world
        .actor_mut(sun)
        .unwrap()
        .add_component(DirectionalLight::default());
    for i in 0..8 {
        let light = world.spawn(format!("Light{i}"), Transform::from_xyz(i as f32 * 4.0, 3.0, -10.0));
        world.actor_mut(light).unwrap().add_component(PointLight {
            cast_shadows: i < 2,
            ..Default::default()
        });
    }
    for x in 0..side {
        for z in 0..side {
            let cube = world.spawn(
                format!("Cube{x}_{z}"),
                Transform::from_xyz(x as f32 * 2.0, 0.5, -(z as f32) * 2.0),
            );
            world
                .actor_mut(cube)
                .unwrap()
                .add_component(StaticMesh::new(MESH, MATERIAL));
        }
    }
    world
}

fn camera() -> Camera {
    Camera::look_at(Vec3::new(0.0, 5.0, 10.0), Vec3::new(10.0, 0.0, -10.0), Vec3::Y)
}

// ---------------------------------------------------------------------------
// Proxy building
// ---------------------------------------------------------------------------

fn bench_build_proxy(c: &mut Criterion) {
    let device = quiet_device();
    let assets = resident_assets(&device);
    let mut world = grid_world(16);
    let mut probes = LightProbeSystem::new(LightProbeConfig::default());
    let mut arena = Some(RenderProxyArena::default());
    let mut frame = 0;

    c.bench_function("build_scene_proxy_256_meshes", |b| {
        b.iter(|| {
            frame += 1;
            let request = ProxyRequest::new(frame, camera(), Extent2d::new(1920, 1080));
            let recycled = arena.take().unwrap_or_default();
            let proxy = world.build_scene_proxy(request, recycled, &mut probes, &assets);
            black_box(proxy.counts());
            arena = Some(proxy.into_arena());
        });
    });
}

// ---------------------------------------------------------------------------
// Atlas allocation
// ---------------------------------------------------------------------------

fn bench_tile_allocator_churn(c: &mut Criterion) {
    c.bench_function("tile_allocator_churn_256", |b| {
        b.iter(|| {
            let mut tiles = TileAllocator::new(256);
            let mut live = Vec::with_capacity(64);
            for round in 0..64u32 {
                let count = 1 + round % 6;
                let first = tiles.allocate(count);
                if first.is_valid() {
                    live.push((first.index(), count));
                }
                if round % 3 == 2
                    && let Some((first, count)) = live.pop()
                {
                    tiles.free(first, first + count - 1);
                }
            }
            black_box(tiles.largest_free_run());
        });
    });
}

// ---------------------------------------------------------------------------
// Post planning
// ---------------------------------------------------------------------------

fn bench_post_plan(c: &mut Criterion) {
    let settings = RenderSettings {
        depth_of_field: true,
        ..Default::default()
    };
    c.bench_function("post_process_plan_build", |b| {
        b.iter(|| black_box(PostProcessPlan::build(black_box(&settings), ProxySource::MainScene)));
    });
}

// ---------------------------------------------------------------------------
// Whole frames on the dummy backend
// ---------------------------------------------------------------------------

fn bench_render_frame(c: &mut Criterion) {
    let device = quiet_device();
    let assets = resident_assets(&device);
    let mut renderer =
        SceneRenderer::with_assets(Arc::clone(&device), Arc::clone(&assets), RendererConfig::default())
            .unwrap();
    let output = FrameOutput::new(
        device
            .create_texture(&TextureDescriptor::from_extent(
                Extent2d::new(1920, 1080),
                TextureFormat::Rgba8UnormSrgb,
                TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_DST,
            ))
            .unwrap(),
    );
    let mut world = grid_world(8);
    let mut probes = LightProbeSystem::new(LightProbeConfig::default());
    let mut frame = 0;

    c.bench_function("render_frame_64_meshes", |b| {
        b.iter(|| {
            frame += 1;
            let request = ProxyRequest::new(frame, camera(), Extent2d::new(1920, 1080));
            let mut proxy =
                world.build_scene_proxy(request, RenderProxyArena::default(), &mut probes, &assets);
            black_box(renderer.render(&mut proxy, &output));
        });
    });
}

criterion_group!(
    benches,
    bench_build_proxy,
    bench_tile_allocator_churn,
    bench_post_plan,
    bench_render_frame,
);
criterion_main!(benches);
