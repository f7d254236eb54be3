//! Upscale from internal to working resolution.

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
struct UpscaleUniforms {
    /// Input size in `xy`, output size in `zw`.
    sizes: Vec4,
    /// Scale factor, sharpness.
    params: Vec4,
}

/// Edge-adaptive spatial upscaler followed by a sharpening step in the
/// same program.
#[derive(Debug)]
pub struct SuperResolutionPass {
    program: PassProgram,
    /// Sharpening strength, 0..1.
    pub sharpness: f32,
}

impl SuperResolutionPass {
    /// Create the pass.
    pub fn new() -> Self {
        Self {
            program: PassProgram::new("super_resolution", BlendMode::Opaque),
            sharpness: 0.2,
        }
    }
}

impl Default for SuperResolutionPass {
    fn default() -> Self {
        Self::new()
    }
}

impl PostProcessPass for SuperResolutionPass {
    fn stage(&self) -> PostStage {
        PostStage::SuperResolution
    }

    fn initialize_resources(&mut self, device: &Arc<GraphicsDevice>) -> Result<(), GraphicsError> {
        self.program.initialize(device)
    }

    fn release_resources(&mut self) {
        self.program.release();
    }

    fn render(&mut self, ctx: &mut PassContext<'_>, input: &Texture, output: &Texture) {
        lumen_core::profile_scope!("SuperResolutionPass");

        let params = UpscaleUniforms {
            sizes: Vec4::new(
                input.width() as f32,
                input.height() as f32,
                output.width() as f32,
                output.height() as f32,
            ),
            params: Vec4::new(ctx.settings.super_resolution.factor(), self.sharpness, 0.0, 0.0),
        };
        ctx.fullscreen(
            "Post.SuperResolution",
            &self.program.get(),
            output,
            None,
            &[input],
            bytemuck::bytes_of(&params),
        );
    }
}
