//! Proxy structs.
//!
//! Plain `Copy` snapshots of scene components, stored in a
//! [`RenderProxyArena`](super::RenderProxyArena). World-space fields are
//! filled by the builder; `view_*` fields stay zero until
//! [`SceneProxy::prepare_view`](super::SceneProxy::prepare_view) runs on the
//! render thread.

use glam::{Mat4, UVec3, Vec2, Vec3};

use lumen_core::ids::{MaterialId, MeshId, TextureId};
use lumen_core::scene::{Camera, CloudLayer};

use crate::light_probe::TileId;
use crate::types::Extent2d;

/// Camera matrices for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraProxy {
    /// World to view.
    pub view: Mat4,
    /// View to clip.
    pub projection: Mat4,
    /// World to clip.
    pub view_projection: Mat4,
    /// World-space eye position.
    pub position: Vec3,
    /// World-space forward axis.
    pub forward: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Near plane.
    pub near: f32,
    /// Far plane.
    pub far: f32,
    /// Exposure multiplier.
    pub exposure: f32,
    /// Width over height of the output.
    pub aspect: f32,
}

impl CameraProxy {
    /// Snapshot `camera` for an output of `extent`.
    pub fn from_camera(camera: &Camera, extent: Extent2d) -> Self {
        let aspect = extent.aspect_ratio();
        let view = camera.view_matrix();
        let projection = camera.projection_matrix(aspect);
        Self {
            view,
            projection,
            view_projection: projection * view,
            position: camera.position,
            forward: camera.forward(),
            fov_y: camera.fov_y,
            near: camera.near,
            far: camera.far,
            exposure: camera.exposure,
            aspect,
        }
    }
}

/// Directional light.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DirectionalLightProxy {
    /// Packed owning actor id.
    pub owner: u64,
    /// World-space direction the light travels in.
    pub direction: Vec3,
    /// Direction in view space.
    pub view_direction: Vec3,
    /// Linear color.
    pub color: Vec3,
    /// Illuminance.
    pub intensity: f32,
    /// Renders cascaded shadows.
    pub cast_shadows: bool,
    /// Flagged as the sun by its component.
    pub primary: bool,
}

/// Point light.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointLightProxy {
    /// Packed owning actor id.
    pub owner: u64,
    /// World-space position.
    pub position: Vec3,
    /// Position in view space.
    pub view_position: Vec3,
    /// Linear color.
    pub color: Vec3,
    /// Luminous intensity.
    pub intensity: f32,
    /// Attenuation radius.
    pub radius: f32,
    /// Requests an omni shadow.
    pub cast_shadows: bool,
    /// Cube slot in the omni shadow array, assigned during view preparation.
    pub shadow_slot: Option<u32>,
}

/// Rectangular area light.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectLightProxy {
    /// Packed owning actor id.
    pub owner: u64,
    /// World-space center.
    pub position: Vec3,
    /// Center in view space.
    pub view_position: Vec3,
    /// World-space emission direction.
    pub normal: Vec3,
    /// Emission direction in view space.
    pub view_normal: Vec3,
    /// World-space half-width axis.
    pub right: Vec3,
    /// World-space half-height axis.
    pub up: Vec3,
    /// Width and height.
    pub size: Vec2,
    /// Linear color.
    pub color: Vec3,
    /// Luminance.
    pub intensity: f32,
    /// Attenuation range.
    pub range: f32,
    /// Emits from both faces.
    pub two_sided: bool,
}

/// A static mesh draw.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StaticMeshProxy {
    /// Packed owning actor id.
    pub owner: u64,
    /// Geometry.
    pub mesh: MeshId,
    /// Material.
    pub material: MaterialId,
    /// Local to world.
    pub world: Mat4,
    /// World-space bounding sphere center.
    pub bounds_center: Vec3,
    /// World-space bounding sphere radius.
    pub bounds_radius: f32,
    /// Rendered into shadow maps.
    pub cast_shadows: bool,
    /// View-space depth of the bounds center, for sorting.
    pub view_depth: f32,
}

/// A heightfield terrain draw.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LandscapeProxy {
    /// Packed owning actor id.
    pub owner: u64,
    /// Height texture, if any.
    pub heightmap: Option<TextureId>,
    /// Material.
    pub material: MaterialId,
    /// Local to world.
    pub world: Mat4,
    /// Horizontal extent.
    pub size: Vec2,
    /// Height multiplier.
    pub height_scale: f32,
    /// Patches per side.
    pub patches: u32,
    /// Rendered into shadow maps.
    pub cast_shadows: bool,
}

impl LandscapeProxy {
    /// Vertices drawn for the patch grid (two triangles per patch).
    pub fn vertex_count(&self) -> u32 {
        self.patches.saturating_mul(self.patches).saturating_mul(6)
    }
}

/// Reflection probe placed in the reflection atlas.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReflectionProbeProxy {
    /// Packed owning actor id.
    pub owner: u64,
    /// Component index within the actor.
    pub component: u32,
    /// World-space center.
    pub position: Vec3,
    /// Half size of the influence box.
    pub half_extents: Vec3,
    /// Fade distance at the box border.
    pub blend_distance: f32,
    /// Intensity multiplier.
    pub intensity: f32,
    /// First atlas tile, or invalid when the atlas had no room.
    pub atlas_tile: TileId,
    /// Tiles used.
    pub tile_count: u32,
}

/// Irradiance volume placed in the irradiance atlas.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IrradianceVolumeProxy {
    /// Packed owning actor id.
    pub owner: u64,
    /// Component index within the actor.
    pub component: u32,
    /// World-space center.
    pub position: Vec3,
    /// Half size of the volume.
    pub half_extents: Vec3,
    /// Samples per axis.
    pub resolution: UVec3,
    /// Intensity multiplier.
    pub intensity: f32,
    /// First atlas tile, or invalid when the atlas had no room.
    pub first_tile: TileId,
    /// Tiles used.
    pub tile_count: u32,
}

/// Sky atmosphere and optional clouds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SkyProxy {
    /// Packed owning actor id.
    pub owner: u64,
    /// Rayleigh scattering tint.
    pub rayleigh: Vec3,
    /// Mie scattering coefficient.
    pub mie: f32,
    /// Sun disk angular radius.
    pub sun_disk_radius: f32,
    /// Cloud layer.
    pub clouds: Option<CloudLayer>,
}

impl SkyProxy {
    /// Whether the sky has a cloud layer.
    pub fn has_clouds(&self) -> bool {
        self.clouds.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landscape_vertex_count() {
        let landscape = LandscapeProxy {
            patches: 32,
            ..Default::default()
        };
        assert_eq!(landscape.vertex_count(), 32 * 32 * 6);

        let oversized = LandscapeProxy {
            patches: 40_000,
            ..Default::default()
        };
        assert_eq!(oversized.vertex_count(), u32::MAX);
    }
}
