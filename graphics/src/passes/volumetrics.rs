//! Volumetric clouds and god rays.
//!
//! Both effects render at half internal resolution before the G-buffer and
//! are composited over the lighting buffer after reflections.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::types::BlendMode;

use super::{PassContext, PassKind, PassProgram, RenderPass};

/// Cloud layer parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct CloudUniforms {
    /// Coverage, density, altitude, thickness.
    layer: Vec4,
    /// Wind offset accumulated over time in `xy`, time in `z`.
    wind: Vec4,
    /// Direction towards the sun, intensity in `w`.
    sun: Vec4,
}

/// Raymarches the sky's cloud layer.
#[derive(Debug)]
pub struct VolumetricCloudPass {
    program: PassProgram,
    time: f32,
}

impl VolumetricCloudPass {
    /// Create the pass.
    pub fn new() -> Self {
        Self {
            program: PassProgram::new("volumetric_clouds", BlendMode::Opaque),
            time: 0.0,
        }
    }
}

impl Default for VolumetricCloudPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass for VolumetricCloudPass {
    fn kind(&self) -> PassKind {
        PassKind::VolumetricClouds
    }

    fn initialize_resources(&mut self, device: &Arc<GraphicsDevice>) -> Result<(), GraphicsError> {
        self.program.initialize(device)
    }

    fn release_resources(&mut self) {
        self.program.release();
    }

    fn render(&mut self, ctx: &mut PassContext<'_>) {
        lumen_core::profile_scope!("VolumetricCloudPass");

        let Some(clouds) = ctx.proxy.sky().and_then(|sky| sky.clouds) else {
            return;
        };
        self.time += ctx.proxy.delta_time();

        let (sun_direction, sun_intensity) = ctx
            .proxy
            .sun()
            .map(|sun| (-sun.direction, sun.intensity))
            .unwrap_or((Vec3::Y, 0.0));
        let params = CloudUniforms {
            layer: Vec4::new(clouds.coverage, clouds.density, clouds.altitude, clouds.thickness),
            wind: (clouds.wind * self.time).extend(self.time).extend(0.0),
            sun: sun_direction.extend(sun_intensity),
        };

        let targets = ctx.targets;
        let fixed = ctx.fixed;
        ctx.fullscreen(
            "VolumetricClouds",
            &self.program.get(),
            &targets.clouds,
            Some([0.0, 0.0, 0.0, 1.0]),
            &[&targets.scene_depth, &fixed.sky_irradiance],
            bytemuck::bytes_of(&params),
        );
    }
}

/// Sun position on screen for the radial blur.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct GodRayUniforms {
    /// Sun position in UV space in `xy`, visibility in `z`, intensity in `w`.
    sun_screen: Vec4,
}

/// Renders the sun silhouette occluded by scene depth.
#[derive(Debug)]
pub struct GodRayPass {
    program: PassProgram,
}

impl GodRayPass {
    /// Create the pass.
    pub fn new() -> Self {
        Self {
            program: PassProgram::new("god_rays", BlendMode::Opaque),
        }
    }
}

impl Default for GodRayPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass for GodRayPass {
    fn kind(&self) -> PassKind {
        PassKind::GodRays
    }

    fn initialize_resources(&mut self, device: &Arc<GraphicsDevice>) -> Result<(), GraphicsError> {
        self.program.initialize(device)
    }

    fn release_resources(&mut self) {
        self.program.release();
    }

    fn render(&mut self, ctx: &mut PassContext<'_>) {
        lumen_core::profile_scope!("GodRayPass");

        let Some(sun) = ctx.proxy.sun() else {
            return;
        };
        let camera = ctx.camera;
        let towards_sun = -sun.direction.normalize_or_zero();
        let far_point = camera.position + towards_sun * camera.far * 0.5;
        let clip = camera.view_projection.project_point3(far_point);
        // Sun behind the camera: render the pass but fade the effect out.
        let visibility = towards_sun.dot(camera.forward).clamp(0.0, 1.0);
        let params = GodRayUniforms {
            sun_screen: Vec4::new(
                clip.x * 0.5 + 0.5,
                0.5 - clip.y * 0.5,
                visibility,
                sun.intensity,
            ),
        };

        let targets = ctx.targets;
        ctx.fullscreen(
            "GodRays",
            &self.program.get(),
            &targets.god_rays,
            Some([0.0; 4]),
            &[&targets.scene_depth],
            bytemuck::bytes_of(&params),
        );
    }
}

/// Enabled layers for the composite shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct CompositeUniforms {
    /// Clouds in `x`, god rays in `y`.
    layers: Vec4,
}

/// Blends clouds and god rays over the lighting buffer.
///
/// The renderer sets which layers were produced this frame with
/// [`set_layers`](Self::set_layers) before running the pass.
#[derive(Debug)]
pub struct VolumetricCompositePass {
    program: PassProgram,
    clouds: bool,
    god_rays: bool,
}

impl VolumetricCompositePass {
    /// Create the pass.
    pub fn new() -> Self {
        Self {
            program: PassProgram::new("volumetric_composite", BlendMode::AlphaBlend),
            clouds: false,
            god_rays: false,
        }
    }

    /// Layers rendered earlier in the frame.
    pub fn set_layers(&mut self, clouds: bool, god_rays: bool) {
        self.clouds = clouds;
        self.god_rays = god_rays;
    }
}

impl Default for VolumetricCompositePass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass for VolumetricCompositePass {
    fn kind(&self) -> PassKind {
        PassKind::VolumetricComposite
    }

    fn initialize_resources(&mut self, device: &Arc<GraphicsDevice>) -> Result<(), GraphicsError> {
        self.program.initialize(device)
    }

    fn release_resources(&mut self) {
        self.program.release();
    }

    fn render(&mut self, ctx: &mut PassContext<'_>) {
        lumen_core::profile_scope!("VolumetricCompositePass");

        if !self.clouds && !self.god_rays {
            return;
        }
        let params = CompositeUniforms {
            layers: Vec4::new(
                f32::from(u8::from(self.clouds)),
                f32::from(u8::from(self.god_rays)),
                0.0,
                0.0,
            ),
        };
        let targets = ctx.targets;
        ctx.fullscreen(
            "VolumetricComposite",
            &self.program.get(),
            &targets.lighting,
            None,
            &[&targets.clouds, &targets.god_rays, &targets.scene_depth],
            bytemuck::bytes_of(&params),
        );
    }
}
