//! Building a [`SceneProxy`] from the live scene graph.
//!
//! The builder runs on the producer thread at a frame boundary:
//!
//! 1. start the proxy in a fresh arena,
//! 2. recompute world transforms and let every component of every live
//!    actor contribute its proxies,
//! 3. resolve the sun,
//! 4. assign light-probe atlas tiles,
//! 5. finalize.
//!
//! Components whose GPU data is not ready (mesh or material not resident,
//! probe not baked) contribute nothing. A partially streamed scene still
//! produces a valid proxy.

use glam::{Mat4, Vec3};

use lumen_core::scene::{
    ActorId, Component, DirectionalLight, IrradianceVolume, Landscape, PointLight, RectLight,
    ReflectionProbe, SkyAtmosphere, StaticMesh, World,
};

use crate::assets::GpuAssets;
use crate::light_probe::LightProbeSystem;

use super::arena::RenderProxyArena;
use super::scene_proxy::{MeshPass, ProxyRequest, SceneProxy};
use super::types::{
    DirectionalLightProxy, IrradianceVolumeProxy, LandscapeProxy, PointLightProxy,
    RectLightProxy, ReflectionProbeProxy, SkyProxy, StaticMeshProxy,
};

/// Largest landscape grid, in patches per side, that is drawn.
pub const MAX_LANDSCAPE_PATCHES: u32 = 1024;

/// State shared by the contributions of one component.
pub struct ContributionContext<'a> {
    /// Proxy under construction.
    pub proxy: &'a mut SceneProxy,
    /// Residency registry.
    pub assets: &'a GpuAssets,
    /// Owning actor.
    pub owner: ActorId,
    /// Index of the component on its actor.
    pub component_index: u32,
    /// Actor's world matrix.
    pub world: Mat4,
}

impl ContributionContext<'_> {
    fn owner_bits(&self) -> u64 {
        self.owner.to_bits()
    }

    fn position(&self) -> Vec3 {
        self.world.w_axis.truncate()
    }

    /// World-space forward axis (-Z of the actor).
    fn forward(&self) -> Vec3 {
        self.world.transform_vector3(Vec3::NEG_Z).normalize_or_zero()
    }
}

/// A component that can add proxies to a frame.
pub trait ContributeProxy {
    /// Append this component's proxies, or nothing if its data is not ready.
    fn contribute(&self, ctx: &mut ContributionContext<'_>);
}

impl ContributeProxy for DirectionalLight {
    fn contribute(&self, ctx: &mut ContributionContext<'_>) {
        let light = DirectionalLightProxy {
            owner: ctx.owner_bits(),
            direction: ctx.forward(),
            color: self.color,
            intensity: self.intensity,
            cast_shadows: self.cast_shadows,
            primary: self.primary,
            ..Default::default()
        };
        ctx.proxy.push_directional_light(light);
    }
}

impl ContributeProxy for PointLight {
    fn contribute(&self, ctx: &mut ContributionContext<'_>) {
        let light = PointLightProxy {
            owner: ctx.owner_bits(),
            position: ctx.position(),
            color: self.color,
            intensity: self.intensity,
            radius: self.radius,
            cast_shadows: self.cast_shadows,
            ..Default::default()
        };
        ctx.proxy.push_point_light(light);
    }
}

impl ContributeProxy for RectLight {
    fn contribute(&self, ctx: &mut ContributionContext<'_>) {
        let light = RectLightProxy {
            owner: ctx.owner_bits(),
            position: ctx.position(),
            normal: ctx.forward(),
            right: ctx.world.transform_vector3(Vec3::X) * (self.size.x * 0.5),
            up: ctx.world.transform_vector3(Vec3::Y) * (self.size.y * 0.5),
            size: self.size,
            color: self.color,
            intensity: self.intensity,
            range: self.range,
            two_sided: self.two_sided,
            ..Default::default()
        };
        ctx.proxy.push_rect_light(light);
    }
}

impl ContributeProxy for StaticMesh {
    fn contribute(&self, ctx: &mut ContributionContext<'_>) {
        if !self.visible {
            return;
        }
        let (Some(mesh_id), Some(material_id)) = (self.mesh, self.material) else {
            return;
        };
        let (Some(mesh), Some(material)) = (ctx.assets.mesh(mesh_id), ctx.assets.material(material_id))
        else {
            log::trace!("SceneProxyBuilder: {mesh_id}/{material_id} not resident, skipping");
            return;
        };

        let scale = ctx.world.x_axis.truncate().length()
            .max(ctx.world.y_axis.truncate().length())
            .max(ctx.world.z_axis.truncate().length());
        let proxy = StaticMeshProxy {
            owner: ctx.owner_bits(),
            mesh: mesh_id,
            material: material_id,
            world: ctx.world,
            bounds_center: ctx.world.transform_point3(mesh.bounds_center),
            bounds_radius: mesh.bounds_radius * scale,
            cast_shadows: self.cast_shadows,
            view_depth: 0.0,
        };
        let pass = if material.is_translucent() {
            MeshPass::Translucent
        } else {
            MeshPass::Opaque
        };
        ctx.proxy.push_static_mesh(proxy, pass);
    }
}

impl ContributeProxy for Landscape {
    fn contribute(&self, ctx: &mut ContributionContext<'_>) {
        let Some(material) = self.material else {
            return;
        };
        if !ctx.assets.has_material(material) || self.patches == 0 {
            return;
        }
        if self.patches > MAX_LANDSCAPE_PATCHES {
            log::warn!(
                "SceneProxyBuilder: landscape on actor {:#x} has {} patches per side, \
                 limit is {MAX_LANDSCAPE_PATCHES}; skipped",
                ctx.owner_bits(),
                self.patches
            );
            return;
        }
        let landscape = LandscapeProxy {
            owner: ctx.owner_bits(),
            heightmap: self.heightmap,
            material,
            world: ctx.world,
            size: self.size,
            height_scale: self.height_scale,
            patches: self.patches,
            cast_shadows: self.cast_shadows,
        };
        ctx.proxy.push_landscape(landscape);
    }
}

impl ContributeProxy for ReflectionProbe {
    fn contribute(&self, ctx: &mut ContributionContext<'_>) {
        if !self.baked {
            return;
        }
        let probe = ReflectionProbeProxy {
            owner: ctx.owner_bits(),
            component: ctx.component_index,
            position: ctx.position(),
            half_extents: self.half_extents,
            blend_distance: self.blend_distance,
            intensity: self.intensity,
            ..Default::default()
        };
        ctx.proxy.push_reflection_probe(probe);
    }
}

impl ContributeProxy for IrradianceVolume {
    fn contribute(&self, ctx: &mut ContributionContext<'_>) {
        if !self.baked || self.sample_count() == Some(0) {
            return;
        }
        let volume = IrradianceVolumeProxy {
            owner: ctx.owner_bits(),
            component: ctx.component_index,
            position: ctx.position(),
            half_extents: self.half_extents,
            resolution: self.resolution,
            intensity: self.intensity,
            ..Default::default()
        };
        ctx.proxy.push_irradiance_volume(volume);
    }
}

impl ContributeProxy for SkyAtmosphere {
    fn contribute(&self, ctx: &mut ContributionContext<'_>) {
        let sky = SkyProxy {
            owner: ctx.owner_bits(),
            rayleigh: self.rayleigh,
            mie: self.mie,
            sun_disk_radius: self.sun_disk_radius,
            clouds: self.clouds,
        };
        if !ctx.proxy.set_sky(sky) {
            log::warn!(
                "SceneProxyBuilder: ignoring extra sky on actor {:#x}",
                ctx.owner_bits()
            );
        }
    }
}

impl ContributeProxy for Component {
    fn contribute(&self, ctx: &mut ContributionContext<'_>) {
        match self {
            Component::DirectionalLight(c) => c.contribute(ctx),
            Component::PointLight(c) => c.contribute(ctx),
            Component::RectLight(c) => c.contribute(ctx),
            Component::StaticMesh(c) => c.contribute(ctx),
            Component::Landscape(c) => c.contribute(ctx),
            Component::ReflectionProbe(c) => c.contribute(ctx),
            Component::IrradianceVolume(c) => c.contribute(ctx),
            Component::SkyAtmosphere(c) => c.contribute(ctx),
        }
    }
}

/// Snapshot a scene graph into a [`SceneProxy`].
pub trait BuildSceneProxy {
    /// Build the proxy for one frame.
    ///
    /// Takes `&mut self` because world transforms are recomputed first.
    fn build_scene_proxy(
        &mut self,
        request: ProxyRequest,
        arena: RenderProxyArena,
        light_probes: &mut LightProbeSystem,
        assets: &GpuAssets,
    ) -> SceneProxy;
}

impl BuildSceneProxy for World {
    fn build_scene_proxy(
        &mut self,
        request: ProxyRequest,
        arena: RenderProxyArena,
        light_probes: &mut LightProbeSystem,
        assets: &GpuAssets,
    ) -> SceneProxy {
        lumen_core::profile_function!();

        let mut proxy = SceneProxy::new(request, arena);

        self.update_world_transforms();
        for (id, actor) in self.iter_actors() {
            let mut ctx = ContributionContext {
                proxy: &mut proxy,
                assets,
                owner: id,
                component_index: 0,
                world: actor.world_matrix(),
            };
            for (index, component) in actor.components().iter().enumerate() {
                ctx.component_index = index as u32;
                component.contribute(&mut ctx);
            }
        }

        proxy.resolve_sun();
        light_probes.resolve(&mut proxy);
        proxy.finalize();

        log::debug!(
            "SceneProxyBuilder: frame {} {:?}: {:?}, arena {} bytes",
            proxy.frame_number(),
            proxy.source(),
            proxy.counts(),
            proxy.arena().used_bytes()
        );
        proxy
    }
}
