//! The demo scene rendered by the `lumen` binary.

use std::sync::Arc;

use glam::{Quat, UVec3, Vec2, Vec3};

use lumen_core::ids::{MaterialId, MeshId};
use lumen_core::scene::{
    ActorId, Camera, CloudLayer, Component, DirectionalLight, IrradianceVolume, Landscape,
    PointLight, RectLight, ReflectionProbe, SkyAtmosphere, StaticMesh, Transform, World,
};
use lumen_graphics::types::BlendMode;
use lumen_graphics::{GpuAssets, GraphicsDevice, GraphicsError, MaterialDescriptor};

/// Unit cube mesh.
pub const CUBE: MeshId = MeshId::new(1);
/// Opaque surface.
pub const STONE: MaterialId = MaterialId::new(1);
/// Alpha-blended surface.
pub const GLASS: MaterialId = MaterialId::new(2);
/// Terrain surface.
pub const TERRAIN: MaterialId = MaterialId::new(3);

/// Make the demo meshes and materials resident.
///
/// # Errors
///
/// Returns the first upload or program creation failure.
pub fn upload_assets(device: &Arc<GraphicsDevice>, assets: &GpuAssets) -> Result<(), GraphicsError> {
    // Position, normal and UV per vertex.
    let vertices = vec![[0.0f32; 8]; 24];
    let indices: Vec<u32> = (0..6u32)
        .flat_map(|face| {
            let base = face * 4;
            [base, base + 1, base + 2, base, base + 2, base + 3]
        })
        .collect();
    assets.upload_mesh(
        device,
        CUBE,
        bytemuck::cast_slice(&vertices),
        &indices,
        Vec3::ZERO,
        3.0f32.sqrt() * 0.5,
    )?;
    assets.create_material(device, STONE, MaterialDescriptor::new("gbuffer_standard"))?;
    assets.create_material(
        device,
        GLASS,
        MaterialDescriptor::new("forward_glass").with_blend(BlendMode::AlphaBlend),
    )?;
    assets.create_material(device, TERRAIN, MaterialDescriptor::new("gbuffer_landscape"))?;
    log::info!("Demo assets resident: 1 mesh, 3 materials");
    Ok(())
}

/// Build the demo world: a courtyard of cubes and glass panes under a cloudy
/// sky, lit by a sun, a lamp and a panel light, with one baked probe set.
pub fn build_world() -> World {
    let mut world = World::new();

    let sun = world.spawn(
        "Sun",
        Transform::IDENTITY.looking_at(Vec3::new(-0.4, -1.0, -0.3), Vec3::Y),
    );
    add(&mut world, sun, DirectionalLight {
        intensity: 100_000.0,
        primary: true,
        ..Default::default()
    });
    let moon = world.spawn("Moon", Transform::from_rotation(Quat::from_rotation_x(-0.7)));
    add(&mut world, moon, DirectionalLight {
        intensity: 0.3,
        cast_shadows: false,
        ..Default::default()
    });

    let lamp = world.spawn("Lamp", Transform::from_xyz(2.0, 3.0, -4.0));
    add(&mut world, lamp, PointLight {
        intensity: 800.0,
        radius: 10.0,
        cast_shadows: true,
        ..Default::default()
    });
    let panel = world.spawn("Panel", Transform::from_xyz(0.0, 4.0, -10.0));
    add(&mut world, panel, RectLight {
        size: Vec2::new(3.0, 1.0),
        ..Default::default()
    });

    for row in 0..3 {
        for column in 0..4 {
            let x = column as f32 * 3.0 - 4.5;
            let z = -4.0 - row as f32 * 3.0;
            let cube = world.spawn(format!("Pillar{row}_{column}"), Transform::from_xyz(x, 0.5, z));
            add(&mut world, cube, StaticMesh::new(CUBE, STONE));
        }
    }
    for (i, z) in [-2.5, -6.5, -9.5].into_iter().enumerate() {
        let pane = world.spawn(format!("Glass{i}"), Transform::from_xyz(0.0, 1.0, z));
        add(&mut world, pane, StaticMesh::new(CUBE, GLASS));
    }

    let ground = world.spawn("Ground", Transform::IDENTITY);
    add(&mut world, ground, Landscape {
        material: Some(TERRAIN),
        size: Vec2::splat(128.0),
        patches: 16,
        ..Default::default()
    });

    let sky = world.spawn("Sky", Transform::IDENTITY);
    add(&mut world, sky, SkyAtmosphere {
        clouds: Some(CloudLayer::default()),
        ..Default::default()
    });

    let probes = world.spawn("Probes", Transform::from_xyz(0.0, 2.0, -7.0));
    add(&mut world, probes, ReflectionProbe {
        baked: true,
        ..Default::default()
    });
    add(&mut world, probes, IrradianceVolume {
        resolution: UVec3::new(4, 2, 4),
        baked: true,
        ..Default::default()
    });

    log::info!("Demo world: {} actors", world.len());
    world
}

fn add(world: &mut World, id: ActorId, component: impl Into<Component>) {
    if let Some(actor) = world.actor_mut(id) {
        actor.add_component(component);
    }
}

/// Camera orbiting the courtyard; one revolution every 600 frames.
pub fn orbit_camera(frame: u64) -> Camera {
    let angle = (frame % 600) as f32 / 600.0 * std::f32::consts::TAU;
    let center = Vec3::new(0.0, 0.5, -7.0);
    let eye = center + Vec3::new(angle.sin() * 12.0, 5.0, angle.cos() * 12.0);
    Camera::look_at(eye, center, Vec3::Y).with_clip_planes(0.1, 500.0)
}
