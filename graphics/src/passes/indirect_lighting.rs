//! Indirect lighting from light probes and the sky.
//!
//! Two additive full-screen draws: the diffuse term from irradiance volumes
//! (falling back to sky irradiance), then the specular term from reflection
//! probes (falling back to the prefiltered sky). Probes whose atlas
//! allocation failed carry [`TileId::INVALID`](crate::light_probe::TileId)
//! and are left out of the probe blocks.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Vec4;

use crate::commands::{ColorAttachment, UniformSlot};
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::proxy::{IrradianceVolumeProxy, ReflectionProbeProxy};
use crate::types::{BlendMode, Viewport};

use super::{PassContext, PassKind, PassProgram, RenderPass};

/// Probes uploaded per draw; extra probes are ignored.
pub const MAX_PROBES_PER_DRAW: usize = 64;

/// One reflection probe as seen by the specular shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ReflectionProbeGpu {
    /// Center, blend distance in `w`.
    pub position_blend: Vec4,
    /// Half extents, intensity in `w`.
    pub extents_intensity: Vec4,
    /// First tile, tile count, tiles per atlas row.
    pub tiles: [u32; 4],
}

impl ReflectionProbeGpu {
    fn new(probe: &ReflectionProbeProxy, tiles_per_row: u32) -> Self {
        Self {
            position_blend: probe.position.extend(probe.blend_distance),
            extents_intensity: probe.half_extents.extend(probe.intensity),
            tiles: [probe.atlas_tile.0, probe.tile_count, tiles_per_row, 0],
        }
    }
}

/// One irradiance volume as seen by the diffuse shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct IrradianceVolumeGpu {
    /// Center, intensity in `w`.
    pub position_intensity: Vec4,
    /// Half extents.
    pub half_extents: Vec4,
    /// Samples per axis, first tile in `w`.
    pub resolution_tile: [u32; 4],
}

impl IrradianceVolumeGpu {
    fn new(volume: &IrradianceVolumeProxy) -> Self {
        Self {
            position_intensity: volume.position.extend(volume.intensity),
            half_extents: volume.half_extents.extend(0.0),
            resolution_tile: [
                volume.resolution.x,
                volume.resolution.y,
                volume.resolution.z,
                volume.first_tile.0,
            ],
        }
    }
}

/// Pack the valid reflection probes of a frame.
pub fn pack_reflection_probes<'a>(
    probes: impl Iterator<Item = &'a ReflectionProbeProxy>,
    tiles_per_row: u32,
) -> Vec<ReflectionProbeGpu> {
    probes
        .filter(|probe| probe.atlas_tile.is_valid())
        .take(MAX_PROBES_PER_DRAW)
        .map(|probe| ReflectionProbeGpu::new(probe, tiles_per_row))
        .collect()
}

/// Pack the valid irradiance volumes of a frame.
pub fn pack_irradiance_volumes<'a>(
    volumes: impl Iterator<Item = &'a IrradianceVolumeProxy>,
) -> Vec<IrradianceVolumeGpu> {
    volumes
        .filter(|volume| volume.first_tile.is_valid())
        .take(MAX_PROBES_PER_DRAW)
        .map(IrradianceVolumeGpu::new)
        .collect()
}

/// Diffuse then specular image-based lighting.
#[derive(Debug)]
pub struct IndirectLightingPass {
    diffuse: PassProgram,
    specular: PassProgram,
    uploaded: (usize, usize),
}

impl IndirectLightingPass {
    /// Create the pass.
    pub fn new() -> Self {
        Self {
            diffuse: PassProgram::new("indirect_diffuse", BlendMode::Additive),
            specular: PassProgram::new("indirect_specular", BlendMode::Additive),
            uploaded: (0, 0),
        }
    }

    /// Irradiance volumes and reflection probes uploaded in the last frame.
    pub fn last_probe_counts(&self) -> (usize, usize) {
        self.uploaded
    }
}

impl Default for IndirectLightingPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass for IndirectLightingPass {
    fn kind(&self) -> PassKind {
        PassKind::IndirectLighting
    }

    fn initialize_resources(&mut self, device: &Arc<GraphicsDevice>) -> Result<(), GraphicsError> {
        self.diffuse.initialize(device)?;
        self.specular.initialize(device)
    }

    fn release_resources(&mut self) {
        self.diffuse.release();
        self.specular.release();
    }

    fn render(&mut self, ctx: &mut PassContext<'_>) {
        lumen_core::profile_scope!("IndirectLightingPass");

        let proxy = ctx.proxy;
        let targets = ctx.targets;
        let fixed = ctx.fixed;
        let state = proxy.light_probes();

        let volumes = pack_irradiance_volumes(proxy.irradiance_volumes());
        let probes = pack_reflection_probes(proxy.reflection_probes(), state.reflection_tiles_per_row);
        self.uploaded = (volumes.len(), probes.len());

        ctx.encoder.begin_render_pass(
            "IndirectLighting",
            &[ColorAttachment::load(&targets.lighting)],
            None,
        );
        ctx.encoder
            .set_viewport(Viewport::from_extent(targets.resolution.internal));

        ctx.encoder.bind_program(&self.diffuse.get());
        ctx.bind_view();
        ctx.encoder.bind_texture(0, &targets.gbuffer_albedo);
        ctx.encoder.bind_texture(1, &targets.gbuffer_normal);
        ctx.encoder.bind_texture(2, &targets.scene_depth);
        ctx.encoder.bind_texture(3, &targets.ssao);
        ctx.encoder.bind_texture(4, &fixed.irradiance_atlas);
        ctx.encoder.bind_texture(5, &fixed.sky_irradiance);
        ctx.encoder.set_uniforms(
            UniformSlot::Pass,
            &[volumes.len() as u32, state.irradiance_tiles_per_row, 0, 0],
        );
        ctx.encoder
            .set_uniform_bytes(UniformSlot::Object, bytemuck::cast_slice(&volumes));
        ctx.encoder.draw_fullscreen();

        ctx.encoder.bind_program(&self.specular.get());
        ctx.bind_view();
        ctx.encoder.bind_texture(0, &targets.gbuffer_albedo);
        ctx.encoder.bind_texture(1, &targets.gbuffer_normal);
        ctx.encoder.bind_texture(2, &targets.scene_depth);
        ctx.encoder.bind_texture(3, &targets.gbuffer_material);
        ctx.encoder.bind_texture(4, &fixed.reflection_atlas);
        ctx.encoder.bind_texture(5, &fixed.sky_prefiltered);
        ctx.encoder.bind_texture(6, &fixed.brdf_lut);
        ctx.encoder.set_uniforms(
            UniformSlot::Pass,
            &[probes.len() as u32, state.reflection_tiles_per_row, 0, 0],
        );
        ctx.encoder
            .set_uniform_bytes(UniformSlot::Object, bytemuck::cast_slice(&probes));
        ctx.encoder.draw_fullscreen();

        ctx.encoder.end_render_pass();
    }
}

#[cfg(test)]
mod tests {
    use glam::{UVec3, Vec3};

    use super::*;
    use crate::light_probe::TileId;

    #[test]
    fn test_invalid_probes_are_not_packed() {
        let probes = [
            ReflectionProbeProxy {
                atlas_tile: TileId(0),
                tile_count: 6,
                intensity: 1.0,
                ..Default::default()
            },
            ReflectionProbeProxy {
                atlas_tile: TileId::INVALID,
                ..Default::default()
            },
            ReflectionProbeProxy {
                atlas_tile: TileId(6),
                tile_count: 6,
                position: Vec3::X,
                ..Default::default()
            },
        ];
        let packed = pack_reflection_probes(probes.iter(), 16);
        assert_eq!(packed.len(), 2);
        assert_eq!(packed[1].tiles, [6, 6, 16, 0]);
        assert_eq!(packed[1].position_blend.truncate(), Vec3::X);
    }

    #[test]
    fn test_volume_packing_keeps_resolution() {
        let volumes = [IrradianceVolumeProxy {
            resolution: UVec3::new(4, 2, 3),
            first_tile: TileId(10),
            tile_count: 24,
            ..Default::default()
        }];
        let packed = pack_irradiance_volumes(volumes.iter());
        assert_eq!(packed[0].resolution_tile, [4, 2, 3, 10]);
    }

    #[test]
    fn test_packing_is_capped() {
        let probes = vec![
            ReflectionProbeProxy {
                atlas_tile: TileId(0),
                ..Default::default()
            };
            MAX_PROBES_PER_DRAW + 5
        ];
        assert_eq!(pack_reflection_probes(probes.iter(), 1).len(), MAX_PROBES_PER_DRAW);
    }
}
