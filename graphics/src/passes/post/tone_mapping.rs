//! HDR to display resolve.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Vec4;

use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::passes::{PassContext, PassProgram};
use crate::resources::Texture;
use crate::types::BlendMode;

use super::{PostProcessPass, PostStage};

/// Tone curve applied by [`ToneMappingPass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToneCurve {
    /// ACES filmic fit.
    #[default]
    Aces,
    /// Reinhard on luminance.
    Reinhard,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ToneMappingUniforms {
    /// Exposure, curve index, output is sRGB-encoded.
    params: Vec4,
}

/// Tone mapping stage. Always planned.
#[derive(Debug)]
pub struct ToneMappingPass {
    program: PassProgram,
    /// Curve used for the resolve.
    pub curve: ToneCurve,
}

impl ToneMappingPass {
    /// Create the pass.
    pub fn new() -> Self {
        Self {
            program: PassProgram::new("tone_mapping", BlendMode::Opaque),
            curve: ToneCurve::default(),
        }
    }
}

impl Default for ToneMappingPass {
    fn default() -> Self {
        Self::new()
    }
}

impl PostProcessPass for ToneMappingPass {
    fn stage(&self) -> PostStage {
        PostStage::ToneMapping
    }

    fn initialize_resources(&mut self, device: &Arc<GraphicsDevice>) -> Result<(), GraphicsError> {
        self.program.initialize(device)
    }

    fn release_resources(&mut self) {
        self.program.release();
    }

    fn render(&mut self, ctx: &mut PassContext<'_>, input: &Texture, output: &Texture) {
        lumen_core::profile_scope!("ToneMappingPass");

        let exposure = ctx.settings.exposure * ctx.camera.exposure;
        let srgb = output.format().is_srgb();
        let params = ToneMappingUniforms {
            params: Vec4::new(
                exposure,
                self.curve as u32 as f32,
                f32::from(u8::from(srgb)),
                0.0,
            ),
        };
        ctx.fullscreen(
            "Post.ToneMapping",
            &self.program.get(),
            output,
            None,
            &[input],
            bytemuck::bytes_of(&params),
        );
    }
}
