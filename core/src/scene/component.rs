//! Components attached to actors.
//!
//! [`Component`] is a closed set: the renderer matches on it to decide which
//! proxy list each component contributes to. Optional asset ids and the
//! `baked` flag on probes express "GPU data not ready yet"; such components
//! are skipped when a frame snapshot is built.

use glam::{UVec3, Vec2, Vec3};

use crate::ids::{MaterialId, MeshId, TextureId};

/// Infinitely distant light shining along the actor's forward axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Linear RGB color.
    pub color: Vec3,
    /// Illuminance in lux.
    pub intensity: f32,
    /// Whether cascaded shadow maps are rendered for this light.
    pub cast_shadows: bool,
    /// Marks this light as the scene's sun.
    pub primary: bool,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            cast_shadows: true,
            primary: false,
        }
    }
}

/// Omnidirectional light at the actor's position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    /// Linear RGB color.
    pub color: Vec3,
    /// Luminous intensity.
    pub intensity: f32,
    /// Distance at which the light's contribution reaches zero.
    pub radius: f32,
    /// Whether an omnidirectional shadow map is rendered for this light.
    pub cast_shadows: bool,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            radius: 10.0,
            cast_shadows: false,
        }
    }
}

/// Rectangular area light facing the actor's forward axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectLight {
    /// Linear RGB color.
    pub color: Vec3,
    /// Luminance.
    pub intensity: f32,
    /// Width and height of the emitting rectangle.
    pub size: Vec2,
    /// Distance at which the light's contribution reaches zero.
    pub range: f32,
    /// Whether the light emits from both faces.
    pub two_sided: bool,
}

impl Default for RectLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            size: Vec2::ONE,
            range: 10.0,
            two_sided: false,
        }
    }
}

/// Static geometry drawn with a material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticMesh {
    /// Mesh to draw, `None` while the asset is not assigned.
    pub mesh: Option<MeshId>,
    /// Material to draw with, `None` while the asset is not assigned.
    pub material: Option<MaterialId>,
    /// Whether the mesh is drawn into shadow maps.
    pub cast_shadows: bool,
    /// Hidden meshes contribute nothing.
    pub visible: bool,
}

impl StaticMesh {
    /// Visible shadow-casting mesh.
    pub fn new(mesh: MeshId, material: MaterialId) -> Self {
        Self {
            mesh: Some(mesh),
            material: Some(material),
            cast_shadows: true,
            visible: true,
        }
    }
}

/// Heightmap terrain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landscape {
    /// Height texture.
    pub heightmap: Option<TextureId>,
    /// Surface material.
    pub material: Option<MaterialId>,
    /// World-space extent on the XZ plane.
    pub size: Vec2,
    /// Height of a fully white heightmap texel.
    pub height_scale: f32,
    /// Patches per side.
    pub patches: u32,
    /// Whether terrain is drawn into shadow maps.
    pub cast_shadows: bool,
}

impl Default for Landscape {
    fn default() -> Self {
        Self {
            heightmap: None,
            material: None,
            size: Vec2::splat(1024.0),
            height_scale: 100.0,
            patches: 32,
            cast_shadows: true,
        }
    }
}

/// Box-projected reflection capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflectionProbe {
    /// Half extents of the influence box.
    pub half_extents: Vec3,
    /// Blend distance at the box border.
    pub blend_distance: f32,
    /// Intensity multiplier.
    pub intensity: f32,
    /// Whether a capture has completed.
    pub baked: bool,
}

impl Default for ReflectionProbe {
    fn default() -> Self {
        Self {
            half_extents: Vec3::splat(5.0),
            blend_distance: 1.0,
            intensity: 1.0,
            baked: false,
        }
    }
}

/// Grid of irradiance samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrradianceVolume {
    /// Half extents of the volume.
    pub half_extents: Vec3,
    /// Number of samples along each axis.
    pub resolution: UVec3,
    /// Intensity multiplier.
    pub intensity: f32,
    /// Whether the samples have been baked.
    pub baked: bool,
}

impl IrradianceVolume {
    /// Total number of samples in the grid, or `None` if it does not fit in
    /// a `u32`.
    pub fn sample_count(&self) -> Option<u32> {
        self.resolution
            .x
            .checked_mul(self.resolution.y)?
            .checked_mul(self.resolution.z)
    }
}

impl Default for IrradianceVolume {
    fn default() -> Self {
        Self {
            half_extents: Vec3::splat(10.0),
            resolution: UVec3::splat(4),
            intensity: 1.0,
            baked: false,
        }
    }
}

/// Volumetric cloud layer parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudLayer {
    /// Fraction of the sky covered, 0..1.
    pub coverage: f32,
    /// Extinction scale.
    pub density: f32,
    /// Altitude of the layer bottom in meters.
    pub altitude: f32,
    /// Layer thickness in meters.
    pub thickness: f32,
    /// Wind velocity in meters per second on the XZ plane.
    pub wind: Vec2,
}

impl Default for CloudLayer {
    fn default() -> Self {
        Self {
            coverage: 0.5,
            density: 1.0,
            altitude: 1500.0,
            thickness: 2000.0,
            wind: Vec2::new(10.0, 0.0),
        }
    }
}

/// Sky atmosphere with optional clouds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyAtmosphere {
    /// Rayleigh scattering tint.
    pub rayleigh: Vec3,
    /// Mie scattering coefficient.
    pub mie: f32,
    /// Angular radius of the sun disk in radians.
    pub sun_disk_radius: f32,
    /// Cloud layer, if any.
    pub clouds: Option<CloudLayer>,
}

impl Default for SkyAtmosphere {
    fn default() -> Self {
        Self {
            rayleigh: Vec3::new(5.8e-3, 13.5e-3, 33.1e-3),
            mie: 3.996e-3,
            sun_disk_radius: 0.00465,
            clouds: None,
        }
    }
}

/// A component attached to an actor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Component {
    /// Directional light.
    DirectionalLight(DirectionalLight),
    /// Point light.
    PointLight(PointLight),
    /// Rectangular area light.
    RectLight(RectLight),
    /// Static mesh.
    StaticMesh(StaticMesh),
    /// Terrain.
    Landscape(Landscape),
    /// Reflection probe.
    ReflectionProbe(ReflectionProbe),
    /// Irradiance volume.
    IrradianceVolume(IrradianceVolume),
    /// Sky and clouds.
    SkyAtmosphere(SkyAtmosphere),
}

impl Component {
    /// Short name of the component kind, for logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::DirectionalLight(_) => "DirectionalLight",
            Self::PointLight(_) => "PointLight",
            Self::RectLight(_) => "RectLight",
            Self::StaticMesh(_) => "StaticMesh",
            Self::Landscape(_) => "Landscape",
            Self::ReflectionProbe(_) => "ReflectionProbe",
            Self::IrradianceVolume(_) => "IrradianceVolume",
            Self::SkyAtmosphere(_) => "SkyAtmosphere",
        }
    }
}

macro_rules! impl_from_component {
    ($($ty:ident),* $(,)?) => {
        $(
            impl From<$ty> for Component {
                fn from(value: $ty) -> Self {
                    Self::$ty(value)
                }
            }
        )*
    };
}

impl_from_component!(
    DirectionalLight,
    PointLight,
    RectLight,
    StaticMesh,
    Landscape,
    ReflectionProbe,
    IrradianceVolume,
    SkyAtmosphere,
);

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(UVec3::splat(4), Some(64))]
    #[case(UVec3::new(4, 2, 4), Some(32))]
    #[case(UVec3::new(8, 0, 8), Some(0))]
    #[case(UVec3::new(4096, 4096, 512), None)]
    #[case(UVec3::splat(u32::MAX), None)]
    fn test_irradiance_sample_count(#[case] resolution: UVec3, #[case] expected: Option<u32>) {
        let volume = IrradianceVolume {
            resolution,
            ..Default::default()
        };
        assert_eq!(volume.sample_count(), expected);
    }
}
