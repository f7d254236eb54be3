//! FXAA and TAA. The plan never schedules both in one frame.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec4};

use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::passes::{PassContext, PassProgram};
use crate::resources::Texture;
use crate::types::BlendMode;

use super::{PostProcessPass, PostStage};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct FxaaUniforms {
    /// Inverse output size in `xy`, edge threshold, subpixel quality.
    params: Vec4,
}

/// Fast approximate anti-aliasing.
#[derive(Debug)]
pub struct FxaaPass {
    program: PassProgram,
    /// Minimum local contrast treated as an edge.
    pub edge_threshold: f32,
    /// Amount of sub-pixel blending.
    pub subpixel: f32,
}

impl FxaaPass {
    /// Create the pass.
    pub fn new() -> Self {
        Self {
            program: PassProgram::new("fxaa", BlendMode::Opaque),
            edge_threshold: 0.125,
            subpixel: 0.75,
        }
    }
}

impl Default for FxaaPass {
    fn default() -> Self {
        Self::new()
    }
}

impl PostProcessPass for FxaaPass {
    fn stage(&self) -> PostStage {
        PostStage::Fxaa
    }

    fn initialize_resources(&mut self, device: &Arc<GraphicsDevice>) -> Result<(), GraphicsError> {
        self.program.initialize(device)
    }

    fn release_resources(&mut self) {
        self.program.release();
    }

    fn render(&mut self, ctx: &mut PassContext<'_>, input: &Texture, output: &Texture) {
        lumen_core::profile_scope!("FxaaPass");

        let extent = output.extent();
        let params = FxaaUniforms {
            params: Vec4::new(
                1.0 / extent.width as f32,
                1.0 / extent.height as f32,
                self.edge_threshold,
                self.subpixel,
            ),
        };
        ctx.fullscreen(
            "Post.FXAA",
            &self.program.get(),
            output,
            None,
            &[input],
            bytemuck::bytes_of(&params),
        );
    }
}

/// Element `index` of the Halton low-discrepancy sequence in `base`.
pub fn halton(mut index: u32, base: u32) -> f32 {
    let mut result = 0.0;
    let mut fraction = 1.0;
    while index > 0 {
        fraction /= base as f32;
        result += fraction * (index % base) as f32;
        index /= base;
    }
    result
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct TaaUniforms {
    /// Sub-pixel jitter in `xy`, history weight, history valid.
    params: Vec4,
}

/// Temporal anti-aliasing with a history buffer.
///
/// History is discarded whenever the render targets were rebuilt.
#[derive(Debug)]
pub struct TaaPass {
    program: PassProgram,
    /// Weight of the accumulated history.
    pub history_weight: f32,
    history_generation: Option<u64>,
}

/// Jitter sequence length.
const JITTER_PHASES: u64 = 8;

impl TaaPass {
    /// Create the pass.
    pub fn new() -> Self {
        Self {
            program: PassProgram::new("taa_resolve", BlendMode::Opaque),
            history_weight: 0.9,
            history_generation: None,
        }
    }

    /// Sub-pixel jitter for `frame_number`, in pixels centered on zero.
    pub fn jitter(frame_number: u64) -> Vec2 {
        let phase = (frame_number % JITTER_PHASES) as u32 + 1;
        Vec2::new(halton(phase, 2) - 0.5, halton(phase, 3) - 0.5)
    }
}

impl Default for TaaPass {
    fn default() -> Self {
        Self::new()
    }
}

impl PostProcessPass for TaaPass {
    fn stage(&self) -> PostStage {
        PostStage::Taa
    }

    fn initialize_resources(&mut self, device: &Arc<GraphicsDevice>) -> Result<(), GraphicsError> {
        self.program.initialize(device)
    }

    fn release_resources(&mut self) {
        self.program.release();
        self.history_generation = None;
    }

    fn render(&mut self, ctx: &mut PassContext<'_>, input: &Texture, output: &Texture) {
        lumen_core::profile_scope!("TaaPass");

        let targets = ctx.targets;
        let history = &targets.taa_history;
        let history_valid = self.history_generation == Some(ctx.target_generation);
        if !history_valid {
            log::debug!(
                "TaaPass: resetting history for target generation {}",
                ctx.target_generation
            );
        }

        let jitter = Self::jitter(ctx.proxy.frame_number());
        let params = TaaUniforms {
            params: Vec4::new(
                jitter.x,
                jitter.y,
                self.history_weight,
                f32::from(u8::from(history_valid)),
            ),
        };
        ctx.fullscreen(
            "Post.TAA",
            &self.program.get(),
            output,
            None,
            &[input, history, &targets.scene_depth],
            bytemuck::bytes_of(&params),
        );

        if output.extent() == history.extent() {
            ctx.encoder.copy_texture(output, history);
            self.history_generation = Some(ctx.target_generation);
        } else {
            self.history_generation = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halton() {
        assert_eq!(halton(1, 2), 0.5);
        assert_eq!(halton(2, 2), 0.25);
        assert_eq!(halton(3, 2), 0.75);
        assert!((halton(1, 3) - 1.0 / 3.0).abs() < 1e-6);
        assert!((halton(2, 3) - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_jitter_is_periodic_and_bounded() {
        for frame in 0..JITTER_PHASES {
            let jitter = TaaPass::jitter(frame);
            assert!(jitter.x.abs() <= 0.5 && jitter.y.abs() <= 0.5);
            assert_eq!(jitter, TaaPass::jitter(frame + JITTER_PHASES));
        }
        assert_ne!(TaaPass::jitter(0), TaaPass::jitter(1));
    }
}
