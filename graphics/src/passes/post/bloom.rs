//! HDR bloom.
//!
//! Bright pixels are prefiltered into the first mip of the bloom chain, blurred
//! down the chain, accumulated back up with additive tent filters, and finally
//! added to the scene color at `bloom_intensity`.

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
struct BloomUniforms {
    /// Threshold, soft knee, intensity, source mip.
    params: Vec4,
}

/// Bloom stage.
#[derive(Debug)]
pub struct BloomPass {
    prefilter: PassProgram,
    downsample: PassProgram,
    upsample: PassProgram,
    composite: PassProgram,
    /// Luminance where bloom starts.
    pub threshold: f32,
    /// Width of the soft threshold knee.
    pub knee: f32,
}

impl BloomPass {
    /// Create the pass.
    pub fn new() -> Self {
        Self {
            prefilter: PassProgram::new("bloom_prefilter", BlendMode::Opaque),
            downsample: PassProgram::new("bloom_downsample", BlendMode::Opaque),
            upsample: PassProgram::new("bloom_upsample", BlendMode::Additive),
            composite: PassProgram::new("bloom_composite", BlendMode::Opaque),
            threshold: 1.0,
            knee: 0.5,
        }
    }

    fn params(&self, intensity: f32, mip: usize) -> BloomUniforms {
        BloomUniforms {
            params: Vec4::new(self.threshold, self.knee, intensity, mip as f32),
        }
    }
}

impl Default for BloomPass {
    fn default() -> Self {
        Self::new()
    }
}

impl PostProcessPass for BloomPass {
    fn stage(&self) -> PostStage {
        PostStage::Bloom
    }

    fn initialize_resources(&mut self, device: &Arc<GraphicsDevice>) -> Result<(), GraphicsError> {
        self.prefilter.initialize(device)?;
        self.downsample.initialize(device)?;
        self.upsample.initialize(device)?;
        self.composite.initialize(device)
    }

    fn release_resources(&mut self) {
        self.prefilter.release();
        self.downsample.release();
        self.upsample.release();
        self.composite.release();
    }

    fn render(&mut self, ctx: &mut PassContext<'_>, input: &Texture, output: &Texture) {
        lumen_core::profile_scope!("BloomPass");

        let targets = ctx.targets;
        let chain = &targets.bloom_chain;
        let intensity = ctx.settings.bloom_intensity;
        let Some(first) = chain.first() else {
            return;
        };

        let params = self.params(intensity, 0);
        ctx.fullscreen(
            "Post.Bloom.Prefilter",
            &self.prefilter.get(),
            first,
            Some([0.0; 4]),
            &[input],
            bytemuck::bytes_of(&params),
        );

        let downsample = self.downsample.get();
        for mip in 1..chain.len() {
            let params = self.params(intensity, mip - 1);
            ctx.fullscreen(
                &format!("Post.Bloom.Down{mip}"),
                &downsample,
                &chain[mip],
                Some([0.0; 4]),
                &[&chain[mip - 1]],
                bytemuck::bytes_of(&params),
            );
        }

        let upsample = self.upsample.get();
        for mip in (0..chain.len().saturating_sub(1)).rev() {
            let params = self.params(intensity, mip + 1);
            ctx.fullscreen(
                &format!("Post.Bloom.Up{mip}"),
                &upsample,
                &chain[mip],
                None,
                &[&chain[mip + 1]],
                bytemuck::bytes_of(&params),
            );
        }

        ctx.fullscreen(
            "Post.Bloom",
            &self.composite.get(),
            output,
            None,
            &[input, first],
            bytemuck::bytes_of(&params),
        );
    }
}
