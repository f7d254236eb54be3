//! Screen-space ambient occlusion and reflections.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Vec4;

use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::types::BlendMode;

use super::{PassContext, PassKind, PassProgram, RenderPass};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SsaoUniforms {
    /// Radius, bias, intensity, sample count.
    params: Vec4,
}

/// Hemisphere-sampled ambient occlusion from depth and normals.
#[derive(Debug)]
pub struct SsaoPass {
    program: PassProgram,
    /// World-space sampling radius.
    pub radius: f32,
    /// Depth bias against self-occlusion.
    pub bias: f32,
    /// Occlusion strength.
    pub intensity: f32,
    /// Samples per pixel.
    pub samples: u32,
}

impl SsaoPass {
    /// Create the pass with default parameters.
    pub fn new() -> Self {
        Self {
            program: PassProgram::new("ssao", BlendMode::Opaque),
            radius: 0.5,
            bias: 0.025,
            intensity: 1.0,
            samples: 16,
        }
    }
}

impl Default for SsaoPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass for SsaoPass {
    fn kind(&self) -> PassKind {
        PassKind::Ssao
    }

    fn initialize_resources(&mut self, device: &Arc<GraphicsDevice>) -> Result<(), GraphicsError> {
        self.program.initialize(device)
    }

    fn release_resources(&mut self) {
        self.program.release();
    }

    fn render(&mut self, ctx: &mut PassContext<'_>) {
        lumen_core::profile_scope!("SsaoPass");

        let params = SsaoUniforms {
            params: Vec4::new(self.radius, self.bias, self.intensity, self.samples as f32),
        };
        let targets = ctx.targets;
        ctx.fullscreen(
            "SSAO",
            &self.program.get(),
            &targets.ssao,
            Some([1.0; 4]),
            &[&targets.scene_depth, &targets.gbuffer_normal],
            bytemuck::bytes_of(&params),
        );
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SsrUniforms {
    /// Max ray distance, thickness, max steps, roughness cutoff.
    params: Vec4,
}

/// Traces reflections against the depth buffer, then adds them to lighting.
#[derive(Debug)]
pub struct ScreenSpaceReflectionPass {
    trace: PassProgram,
    composite: PassProgram,
    /// Maximum ray length in world units.
    pub max_distance: f32,
    /// Depth thickness assumed for hits.
    pub thickness: f32,
    /// Ray march steps.
    pub max_steps: u32,
    /// Surfaces rougher than this get no reflection.
    pub roughness_cutoff: f32,
}

impl ScreenSpaceReflectionPass {
    /// Create the pass with default parameters.
    pub fn new() -> Self {
        Self {
            trace: PassProgram::new("ssr_trace", BlendMode::Opaque),
            composite: PassProgram::new("ssr_composite", BlendMode::Additive),
            max_distance: 50.0,
            thickness: 0.2,
            max_steps: 64,
            roughness_cutoff: 0.6,
        }
    }
}

impl Default for ScreenSpaceReflectionPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass for ScreenSpaceReflectionPass {
    fn kind(&self) -> PassKind {
        PassKind::Ssr
    }

    fn initialize_resources(&mut self, device: &Arc<GraphicsDevice>) -> Result<(), GraphicsError> {
        self.trace.initialize(device)?;
        self.composite.initialize(device)
    }

    fn release_resources(&mut self) {
        self.trace.release();
        self.composite.release();
    }

    fn render(&mut self, ctx: &mut PassContext<'_>) {
        lumen_core::profile_scope!("ScreenSpaceReflectionPass");

        let params = SsrUniforms {
            params: Vec4::new(
                self.max_distance,
                self.thickness,
                self.max_steps as f32,
                self.roughness_cutoff,
            ),
        };
        let targets = ctx.targets;

        ctx.encoder.push_debug_group("SSR");
        ctx.fullscreen(
            "SSR.Trace",
            &self.trace.get(),
            &targets.ssr,
            Some([0.0; 4]),
            &[
                &targets.lighting,
                &targets.scene_depth,
                &targets.gbuffer_normal,
                &targets.gbuffer_material,
            ],
            bytemuck::bytes_of(&params),
        );
        ctx.fullscreen(
            "SSR.Composite",
            &self.composite.get(),
            &targets.lighting,
            None,
            &[&targets.ssr, &targets.gbuffer_albedo, &targets.gbuffer_material],
            &[],
        );
        ctx.encoder.pop_debug_group();
    }
}
