//! Post-processing chain.
//!
//! The enabled stages are planned once per frame by
//! [`PostProcessPlan::build`]: optional bloom, mandatory tone mapping,
//! optional FXAA or TAA, optional super-resolution, optional depth of field.
//! Exactly the last planned stage writes to the frame's final target; every
//! other stage writes an intermediate that becomes the next stage's input.
//!
//! Light-probe captures plan no stages at all.
//!
//! ## Intermediates
//!
//! | Stage | Input | Intermediate output |
//! |-------|-------|---------------------|
//! | Bloom | lighting (HDR) | `post_hdr` |
//! | Tone mapping, AA, DoF before upscale | previous | `post_ldr` ping-pong |
//! | Super-resolution, DoF after upscale | previous | `post_working` ping-pong |
//!
//! ## Example
//!
//! ```
//! use lumen_graphics::passes::{PostProcessPlan, PostStage, StageOutput};
//! use lumen_graphics::proxy::ProxySource;
//! use lumen_graphics::settings::{AntiAliasingMode, RenderSettings};
//!
//! let settings = RenderSettings {
//!     bloom: false,
//!     anti_aliasing: AntiAliasingMode::Off,
//!     ..RenderSettings::default()
//! };
//! let plan = PostProcessPlan::build(&settings, ProxySource::MainScene);
//! assert_eq!(plan.sequence(), vec![(PostStage::ToneMapping, StageOutput::Final)]);
//! ```

mod anti_aliasing;
mod bloom;
mod depth_of_field;
mod super_resolution;
mod tone_mapping;

use std::fmt;
use std::sync::Arc;

use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, fatal};
use crate::proxy::ProxySource;
use crate::resources::Texture;
use crate::settings::{AntiAliasingMode, RenderSettings};

use super::PassContext;

pub use anti_aliasing::{FxaaPass, TaaPass, halton};
pub use bloom::BloomPass;
pub use depth_of_field::DepthOfFieldPass;
pub use super_resolution::SuperResolutionPass;
pub use tone_mapping::{ToneCurve, ToneMappingPass};

/// A post-processing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostStage {
    /// HDR bloom.
    Bloom,
    /// HDR to display resolve.
    ToneMapping,
    /// Fast approximate anti-aliasing.
    Fxaa,
    /// Temporal anti-aliasing.
    Taa,
    /// Upscale from internal to working size.
    SuperResolution,
    /// Depth of field.
    DepthOfField,
}

impl PostStage {
    /// Stages in chain order.
    pub const ALL: [PostStage; 6] = [
        PostStage::Bloom,
        PostStage::ToneMapping,
        PostStage::Fxaa,
        PostStage::Taa,
        PostStage::SuperResolution,
        PostStage::DepthOfField,
    ];

    /// Label used for debug groups and reports.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bloom => "Bloom",
            Self::ToneMapping => "ToneMapping",
            Self::Fxaa => "FXAA",
            Self::Taa => "TAA",
            Self::SuperResolution => "SuperResolution",
            Self::DepthOfField => "DepthOfField",
        }
    }
}

impl fmt::Display for PostStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a stage writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageOutput {
    /// An intermediate buffer read by the next stage.
    Intermediate,
    /// The frame's final target.
    Final,
}

/// One stage of a frame's plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedStage {
    /// Stage to run.
    pub stage: PostStage,
    /// Where it writes.
    pub output: StageOutput,
}

/// The ordered post stages enabled for one frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PostProcessPlan {
    stages: Vec<PlannedStage>,
}

impl PostProcessPlan {
    /// Plan the chain for `settings`.
    ///
    /// Light-probe captures get an empty plan.
    pub fn build(settings: &RenderSettings, source: ProxySource) -> Self {
        if source.is_light_probe_capture() {
            return Self::default();
        }

        let mut enabled = Vec::with_capacity(PostStage::ALL.len());
        if settings.bloom {
            enabled.push(PostStage::Bloom);
        }
        enabled.push(PostStage::ToneMapping);
        match settings.anti_aliasing {
            AntiAliasingMode::Off => {}
            AntiAliasingMode::Fxaa => enabled.push(PostStage::Fxaa),
            AntiAliasingMode::Taa => enabled.push(PostStage::Taa),
        }
        if settings.super_resolution.is_enabled() {
            enabled.push(PostStage::SuperResolution);
        }
        if settings.depth_of_field {
            enabled.push(PostStage::DepthOfField);
        }

        let last = enabled.len() - 1;
        let stages = enabled
            .into_iter()
            .enumerate()
            .map(|(i, stage)| PlannedStage {
                stage,
                output: if i == last {
                    StageOutput::Final
                } else {
                    StageOutput::Intermediate
                },
            })
            .collect();
        Self { stages }
    }

    /// Planned stages in order.
    pub fn stages(&self) -> &[PlannedStage] {
        &self.stages
    }

    /// `(stage, output)` pairs in order.
    pub fn sequence(&self) -> Vec<(PostStage, StageOutput)> {
        self.stages.iter().map(|s| (s.stage, s.output)).collect()
    }

    /// Whether no stage runs.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether `stage` is planned.
    pub fn contains(&self, stage: PostStage) -> bool {
        self.stages.iter().any(|s| s.stage == stage)
    }

    /// The stage writing the final target.
    pub fn final_stage(&self) -> Option<PostStage> {
        self.stages.last().map(|s| s.stage)
    }
}

impl fmt::Display for PostProcessPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stages.is_empty() {
            return f.write_str("<none>");
        }
        for (i, planned) in self.stages.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", planned.stage)?;
            if planned.output == StageOutput::Final {
                f.write_str("(final)")?;
            }
        }
        Ok(())
    }
}

/// One stage implementation.
pub trait PostProcessPass: Send {
    /// Stage this pass implements.
    fn stage(&self) -> PostStage;

    /// Create programs. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the device error if a program cannot be created.
    fn initialize_resources(&mut self, device: &Arc<GraphicsDevice>) -> Result<(), GraphicsError>;

    /// Drop programs. Safe before initialization.
    fn release_resources(&mut self);

    /// Read `input`, write `output`.
    fn render(&mut self, ctx: &mut PassContext<'_>, input: &Texture, output: &Texture);
}

/// Owns one pass per stage and runs them in plan order.
pub struct PostProcessChain {
    passes: Vec<Box<dyn PostProcessPass>>,
}

impl PostProcessChain {
    /// Chain with the built-in pass for every stage.
    pub fn new() -> Self {
        Self::with_passes(vec![
            Box::new(BloomPass::new()),
            Box::new(ToneMappingPass::new()),
            Box::new(FxaaPass::new()),
            Box::new(TaaPass::new()),
            Box::new(SuperResolutionPass::new()),
            Box::new(DepthOfFieldPass::new()),
        ])
    }

    /// Chain with caller-provided passes.
    pub fn with_passes(passes: Vec<Box<dyn PostProcessPass>>) -> Self {
        Self { passes }
    }

    /// Initialize every pass.
    ///
    /// # Errors
    ///
    /// Returns the first pass error.
    pub fn initialize_resources(&mut self, device: &Arc<GraphicsDevice>) -> Result<(), GraphicsError> {
        for pass in &mut self.passes {
            pass.initialize_resources(device)?;
        }
        Ok(())
    }

    /// Release every pass.
    pub fn release_resources(&mut self) {
        for pass in &mut self.passes {
            pass.release_resources();
        }
    }

    /// Run `plan`, starting from the lighting target and ending in
    /// `final_target`. Returns the stages that ran.
    ///
    /// # Panics
    ///
    /// Panics if a planned stage has no registered pass.
    pub fn render<'t>(
        &mut self,
        ctx: &mut PassContext<'t>,
        plan: &PostProcessPlan,
        final_target: &'t Texture,
    ) -> Vec<PostStage> {
        lumen_core::profile_scope!("PostProcessChain");

        let targets = ctx.targets;
        let mut input: &Texture = &targets.lighting;
        let mut upscaled = false;
        let mut executed = Vec::with_capacity(plan.len());

        for planned in plan.stages() {
            let output: &Texture = match (planned.output, planned.stage) {
                (StageOutput::Final, _) => final_target,
                (StageOutput::Intermediate, PostStage::Bloom) => &targets.post_hdr,
                (StageOutput::Intermediate, PostStage::SuperResolution) => {
                    other_of(&targets.post_working, input)
                }
                (StageOutput::Intermediate, _) if upscaled => other_of(&targets.post_working, input),
                (StageOutput::Intermediate, _) => other_of(&targets.post_ldr, input),
            };

            let Some(pass) = self.passes.iter_mut().find(|p| p.stage() == planned.stage) else {
                fatal(
                    "PostProcessChain",
                    format_args!("no pass registered for {}", planned.stage),
                );
            };
            ctx.encoder.push_debug_group(planned.stage.name());
            pass.render(ctx, input, output);
            ctx.encoder.pop_debug_group();

            executed.push(planned.stage);
            if planned.stage == PostStage::SuperResolution {
                upscaled = true;
            }
            input = output;
        }
        executed
    }
}

impl Default for PostProcessChain {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PostProcessChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.passes.iter().map(|p| p.stage()))
            .finish()
    }
}

/// The buffer of a ping-pong pair that is not `input`.
fn other_of<'t>(pair: &'t [Arc<Texture>; 2], input: &Texture) -> &'t Texture {
    if pair[0].id() == input.id() {
        &pair[1]
    } else {
        &pair[0]
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::settings::SuperResolutionMode;

    use PostStage::*;
    use StageOutput::*;

    fn settings(
        bloom: bool,
        anti_aliasing: AntiAliasingMode,
        super_resolution: SuperResolutionMode,
        depth_of_field: bool,
    ) -> RenderSettings {
        RenderSettings {
            bloom,
            anti_aliasing,
            super_resolution,
            depth_of_field,
            ..RenderSettings::default()
        }
    }

    #[test]
    fn test_bloom_and_taa() {
        let plan = PostProcessPlan::build(
            &settings(true, AntiAliasingMode::Taa, SuperResolutionMode::Off, false),
            ProxySource::MainScene,
        );
        assert_eq!(
            plan.sequence(),
            vec![(Bloom, Intermediate), (ToneMapping, Intermediate), (Taa, Final)]
        );
        assert_eq!(plan.to_string(), "Bloom -> ToneMapping -> TAA(final)");
    }

    #[test]
    fn test_tone_mapping_only() {
        let plan = PostProcessPlan::build(
            &settings(false, AntiAliasingMode::Off, SuperResolutionMode::Off, false),
            ProxySource::MainScene,
        );
        assert_eq!(plan.sequence(), vec![(ToneMapping, Final)]);
        assert_eq!(plan.final_stage(), Some(ToneMapping));
    }

    #[test]
    fn test_everything_enabled() {
        let plan = PostProcessPlan::build(
            &settings(true, AntiAliasingMode::Fxaa, SuperResolutionMode::Quality, true),
            ProxySource::SceneCapture,
        );
        assert_eq!(
            plan.sequence(),
            vec![
                (Bloom, Intermediate),
                (ToneMapping, Intermediate),
                (Fxaa, Intermediate),
                (SuperResolution, Intermediate),
                (DepthOfField, Final),
            ]
        );
        assert!(!plan.contains(Taa));
    }

    #[rstest]
    #[case(ProxySource::RadianceCapture)]
    #[case(ProxySource::IrradianceCapture)]
    fn test_light_probe_captures_plan_nothing(#[case] source: ProxySource) {
        let plan = PostProcessPlan::build(&RenderSettings::default(), source);
        assert!(plan.is_empty());
        assert_eq!(plan.final_stage(), None);
        assert_eq!(plan.to_string(), "<none>");
    }

    #[rstest]
    #[case(false, AntiAliasingMode::Off, SuperResolutionMode::Off, false)]
    #[case(true, AntiAliasingMode::Off, SuperResolutionMode::Balanced, false)]
    #[case(false, AntiAliasingMode::Taa, SuperResolutionMode::Off, true)]
    #[case(true, AntiAliasingMode::Fxaa, SuperResolutionMode::Performance, true)]
    fn test_exactly_one_final_stage(
        #[case] bloom: bool,
        #[case] aa: AntiAliasingMode,
        #[case] sr: SuperResolutionMode,
        #[case] dof: bool,
    ) {
        let plan = PostProcessPlan::build(&settings(bloom, aa, sr, dof), ProxySource::MainScene);
        let finals = plan.stages().iter().filter(|s| s.output == Final).count();
        assert_eq!(finals, 1);
        assert_eq!(plan.stages().last().map(|s| s.output), Some(Final));
        assert!(plan.contains(ToneMapping));
    }
}
