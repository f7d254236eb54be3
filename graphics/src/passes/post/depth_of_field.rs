//! Depth of field.
//!
//! Runs at the resolution of its input: working size after super-resolution,
//! internal size otherwise. Scene depth is always sampled at internal size.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Vec4;

use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::passes::{PassContext, PassProgram};
use crate::resources::Texture;
use crate::types::BlendMode;

use super::{PostProcessPass, PostStage};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DofUniforms {
    /// Focus distance, focus range, max blur radius in pixels, aperture.
    params: Vec4,
}

/// Gather-based depth of field.
#[derive(Debug)]
pub struct DepthOfFieldPass {
    program: PassProgram,
    /// Depth range around the focus distance that stays sharp.
    pub focus_range: f32,
    /// Maximum blur radius in output pixels.
    pub max_blur: f32,
    /// Aperture (f-number).
    pub aperture: f32,
}

impl DepthOfFieldPass {
    /// Create the pass.
    pub fn new() -> Self {
        Self {
            program: PassProgram::new("depth_of_field", BlendMode::Opaque),
            focus_range: 2.0,
            max_blur: 12.0,
            aperture: 2.8,
        }
    }
}

impl Default for DepthOfFieldPass {
    fn default() -> Self {
        Self::new()
    }
}

impl PostProcessPass for DepthOfFieldPass {
    fn stage(&self) -> PostStage {
        PostStage::DepthOfField
    }

    fn initialize_resources(&mut self, device: &Arc<GraphicsDevice>) -> Result<(), GraphicsError> {
        self.program.initialize(device)
    }

    fn release_resources(&mut self) {
        self.program.release();
    }

    fn render(&mut self, ctx: &mut PassContext<'_>, input: &Texture, output: &Texture) {
        lumen_core::profile_scope!("DepthOfFieldPass");

        let targets = ctx.targets;
        let params = DofUniforms {
            params: Vec4::new(
                ctx.settings.dof_focus_distance,
                self.focus_range,
                self.max_blur,
                self.aperture,
            ),
        };
        ctx.fullscreen(
            "Post.DepthOfField",
            &self.program.get(),
            output,
            None,
            &[input, &targets.scene_depth],
            bytemuck::bytes_of(&params),
        );
    }
}
