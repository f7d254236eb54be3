//! Scene renderer: turns one [`SceneProxy`] into one submitted command list.
//!
//! # Frame steps
//!
//! | Step | Work | Gate |
//! |------|------|------|
//! | 1 | Reconcile render targets | always |
//! | 2 | Depth pre-pass | `depth_prepass` |
//! | 3 | Sun cascades, then point light cubes | shadows and shadow-casting lights |
//! | 4 | Clouds, god rays | settings and sky/sun presence |
//! | 5 | G-buffer (`Equal` depth test after step 2) | always |
//! | 6 | SSAO | `ssao` |
//! | 7 | Clear lighting, direct, indirect, emissive, SSR, volumetric composite | per feature |
//! | 8 | Translucency | translucent meshes present |
//! | 9 | Post chain | not a light-probe capture |
//! | 10 | Screenshot readback | request present |
//! | 11 | Blit to output | post chain did not write the output |
//!
//! Every frame is recorded into a single [`CommandList`](crate::commands::CommandList)
//! and submitted once, signalling the renderer's frame fence to the frame
//! number. Readback waits on that fence.
//!
//! # Example
//!
//! ```ignore
//! let mut renderer = SceneRenderer::new(device.clone(), RendererConfig::default())?;
//! let output = FrameOutput::new(output_texture);
//! let report = renderer.render(&mut proxy, &output);
//! log::info!("{:?}", report.passes);
//! ```

use std::sync::Arc;

use crate::assets::GpuAssets;
use crate::commands::{ColorAttachment, CommandEncoder};
use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, fatal};
use crate::light_probe::LightProbeConfig;
use crate::passes::{
    BlitPass, DepthPrepass, DirectLightingPass, DirectionalShadowPass, EmissiveResolvePass,
    GBufferPass, GodRayPass, IndirectLightingPass, LightingStats, OmniShadowPass, PassContext,
    PassGates, PassKind, PostProcessChain, PostProcessPlan, PostStage, ReadbackPass, RenderPass,
    ScreenSpaceReflectionPass, SsaoPass, TranslucencyPass, VolumetricCloudPass,
    VolumetricCompositePass, clear_lighting,
};
use crate::proxy::{ProxySource, SceneProxy};
use crate::resources::Texture;
use crate::sync::Fence;
use crate::targets::{RenderResolution, SceneRenderTargets, TargetKey};
use crate::types::Extent2d;

/// Static renderer configuration.
#[derive(Debug, Clone, Default)]
pub struct RendererConfig {
    /// Light-probe atlas layout; must match the producer's `LightProbeSystem`.
    pub light_probes: LightProbeConfig,
}

/// The caller's output for one frame.
#[derive(Debug, Clone)]
pub struct FrameOutput {
    texture: Arc<Texture>,
}

impl FrameOutput {
    /// Wrap the texture the frame ends in.
    pub fn new(texture: Arc<Texture>) -> Self {
        Self { texture }
    }

    /// Output texture.
    pub fn texture(&self) -> &Arc<Texture> {
        &self.texture
    }

    /// Output size.
    pub fn extent(&self) -> Extent2d {
        self.texture.extent()
    }
}

/// What happened in one rendered frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    /// Frame number of the proxy.
    pub frame_number: u64,
    /// Proxy source kind.
    pub source: ProxySource,
    /// Steps in execution order.
    pub passes: Vec<PassKind>,
    /// Post chain plan for the frame.
    pub post_plan: PostProcessPlan,
    /// Output, working and internal sizes.
    pub resolution: RenderResolution,
    /// Whether step 1 rebuilt the resolution-dependent targets.
    pub targets_reallocated: bool,
    /// Device submission index of the frame.
    pub submission: u64,
    /// Whether a screenshot was delivered.
    pub screenshot_delivered: bool,
    /// Commands recorded.
    pub command_count: usize,
    /// Draw commands recorded.
    pub draw_count: usize,
}

impl FrameReport {
    /// Whether `kind` ran.
    pub fn ran(&self, kind: PassKind) -> bool {
        self.passes.contains(&kind)
    }

    /// Post stages that ran, in order.
    pub fn post_stages(&self) -> Vec<PostStage> {
        self.passes
            .iter()
            .filter_map(|kind| match kind {
                PassKind::Post(stage) => Some(*stage),
                _ => None,
            })
            .collect()
    }
}

/// Owns the passes and render targets and renders proxies in frame order.
pub struct SceneRenderer {
    device: Arc<GraphicsDevice>,
    assets: Arc<GpuAssets>,
    targets: SceneRenderTargets,
    frame_fence: Fence,
    last_frame: Option<u64>,
    initialized: bool,

    depth_prepass: DepthPrepass,
    directional_shadows: DirectionalShadowPass,
    omni_shadows: OmniShadowPass,
    clouds: VolumetricCloudPass,
    god_rays: GodRayPass,
    gbuffer: GBufferPass,
    ssao: SsaoPass,
    direct_lighting: DirectLightingPass,
    indirect_lighting: IndirectLightingPass,
    emissive: EmissiveResolvePass,
    ssr: ScreenSpaceReflectionPass,
    volumetric_composite: VolumetricCompositePass,
    translucency: TranslucencyPass,
    post: PostProcessChain,
    readback: ReadbackPass,
    blit: BlitPass,
}

static_assertions::assert_impl_all!(SceneRenderer: Send);

impl SceneRenderer {
    /// Create a renderer with its own asset registry.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while initializing a pass.
    pub fn new(device: Arc<GraphicsDevice>, config: RendererConfig) -> Result<Self, GraphicsError> {
        Self::with_assets(device, Arc::new(GpuAssets::new()), config)
    }

    /// Create a renderer resolving meshes and materials from `assets`.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while initializing a pass.
    pub fn with_assets(
        device: Arc<GraphicsDevice>,
        assets: Arc<GpuAssets>,
        config: RendererConfig,
    ) -> Result<Self, GraphicsError> {
        let frame_fence = device.create_fence("SceneRenderer.Frame");
        let mut renderer = Self {
            targets: SceneRenderTargets::new(config.light_probes),
            device,
            assets,
            frame_fence,
            last_frame: None,
            initialized: false,
            depth_prepass: DepthPrepass::new(),
            directional_shadows: DirectionalShadowPass::new(),
            omni_shadows: OmniShadowPass::new(),
            clouds: VolumetricCloudPass::new(),
            god_rays: GodRayPass::new(),
            gbuffer: GBufferPass::new(),
            ssao: SsaoPass::new(),
            direct_lighting: DirectLightingPass::new(),
            indirect_lighting: IndirectLightingPass::new(),
            emissive: EmissiveResolvePass::new(),
            ssr: ScreenSpaceReflectionPass::new(),
            volumetric_composite: VolumetricCompositePass::new(),
            translucency: TranslucencyPass::new(),
            post: PostProcessChain::new(),
            readback: ReadbackPass::new(),
            blit: BlitPass::new(),
        };

        let device = Arc::clone(&renderer.device);
        for pass in renderer.scene_passes_mut() {
            pass.initialize_resources(&device)?;
        }
        renderer.post.initialize_resources(&device)?;
        renderer.initialized = true;

        log::info!(
            "SceneRenderer: initialized on '{}' with {} programs",
            device.name(),
            device.program_count()
        );
        Ok(renderer)
    }

    fn scene_passes_mut(&mut self) -> [&mut dyn RenderPass; 13] {
        [
            &mut self.depth_prepass,
            &mut self.directional_shadows,
            &mut self.omni_shadows,
            &mut self.clouds,
            &mut self.god_rays,
            &mut self.gbuffer,
            &mut self.ssao,
            &mut self.direct_lighting,
            &mut self.indirect_lighting,
            &mut self.emissive,
            &mut self.ssr,
            &mut self.volumetric_composite,
            &mut self.translucency,
        ]
    }

    /// Render one proxy into `output`.
    ///
    /// Computes view data on the proxy, records steps 1 to 11, submits the
    /// frame and, if requested, delivers the screenshot.
    ///
    /// # Panics
    ///
    /// Panics if frame numbers do not strictly increase, if the renderer was
    /// shut down, or on any fatal pipeline condition (target creation,
    /// submission failure).
    pub fn render(&mut self, proxy: &mut SceneProxy, output: &FrameOutput) -> FrameReport {
        lumen_core::profile_function!();

        let frame_number = proxy.frame_number();
        if !self.initialized {
            fatal(
                "SceneRenderer",
                format_args!("render of frame {frame_number} after shutdown"),
            );
        }
        if let Some(last) = self.last_frame
            && frame_number <= last
        {
            fatal(
                "SceneRenderer",
                format_args!("frame {frame_number} rendered after frame {last}"),
            );
        }
        self.last_frame = Some(frame_number);

        let settings = proxy.effective_settings();

        // Step 1.
        let key = TargetKey::new(output.extent(), &settings);
        let reallocated = self
            .targets
            .reconcile(&self.device, frame_number, key, &settings);

        proxy.prepare_view(&settings);
        let proxy: &SceneProxy = proxy;

        let plan = PostProcessPlan::build(&settings, proxy.source());
        let gates = PassGates::evaluate(&settings, proxy);
        log::debug!(
            "SceneRenderer: frame {frame_number} {:?} gates {:?}, post {plan}",
            proxy.source(),
            gates
        );

        let targets = self.targets.sized();
        let fixed = self.targets.fixed();
        let resolution = targets.resolution;
        let mut encoder = CommandEncoder::new(format!("Frame {frame_number}"));
        let mut passes = Vec::with_capacity(24);
        let mut readback_texture = None;

        {
            let mut ctx = PassContext {
                proxy,
                camera: proxy.camera(),
                settings: &settings,
                targets,
                fixed,
                target_generation: self.targets.generation(),
                assets: &self.assets,
                encoder: &mut encoder,
                depth_prepass_ran: false,
            };

            // Steps 2-4.
            if gates.depth_prepass {
                run_pass(&mut self.depth_prepass, &mut ctx, &mut passes);
            }
            if gates.directional_shadows {
                run_pass(&mut self.directional_shadows, &mut ctx, &mut passes);
            }
            if gates.omni_shadows {
                run_pass(&mut self.omni_shadows, &mut ctx, &mut passes);
            }
            if gates.volumetric_clouds {
                run_pass(&mut self.clouds, &mut ctx, &mut passes);
            }
            if gates.god_rays {
                run_pass(&mut self.god_rays, &mut ctx, &mut passes);
            }

            // Steps 5-6.
            run_pass(&mut self.gbuffer, &mut ctx, &mut passes);
            if gates.ssao {
                run_pass(&mut self.ssao, &mut ctx, &mut passes);
            } else {
                // Unoccluded, so lighting can sample it unconditionally.
                ctx.encoder.begin_render_pass(
                    "SSAO.Clear",
                    &[ColorAttachment::clear(&targets.ssao, [1.0; 4])],
                    None,
                );
                ctx.encoder.end_render_pass();
            }

            // Step 7.
            clear_lighting(&mut ctx);
            passes.push(PassKind::ClearLighting);
            if gates.direct_lighting {
                run_pass(&mut self.direct_lighting, &mut ctx, &mut passes);
            }
            if gates.indirect_lighting {
                run_pass(&mut self.indirect_lighting, &mut ctx, &mut passes);
            }
            if gates.emissive {
                run_pass(&mut self.emissive, &mut ctx, &mut passes);
            }
            if gates.ssr {
                run_pass(&mut self.ssr, &mut ctx, &mut passes);
            }
            if gates.volumetric_composite() {
                self.volumetric_composite
                    .set_layers(gates.volumetric_clouds, gates.god_rays);
                run_pass(&mut self.volumetric_composite, &mut ctx, &mut passes);
            }

            // Step 8.
            if gates.translucency {
                run_pass(&mut self.translucency, &mut ctx, &mut passes);
            }

            // Step 9.
            let writes_output = !plan.is_empty() && resolution.writes_output_directly();
            let final_target: &Arc<Texture> = if plan.is_empty() {
                &targets.lighting
            } else if writes_output {
                output.texture()
            } else {
                &targets.final_color
            };
            let stages = self.post.render(&mut ctx, &plan, final_target);
            passes.extend(stages.into_iter().map(PassKind::Post));

            // Step 10.
            if let Some(request) = proxy.screenshot_request() {
                readback_texture = Some(self.readback.record(
                    &self.device,
                    ctx.encoder,
                    final_target,
                    request,
                ));
                passes.push(PassKind::Readback);
            }

            // Step 11.
            if !writes_output {
                self.blit.record(ctx.encoder, final_target, output.texture());
                passes.push(PassKind::Blit);
            }
        }

        let list = encoder.finish();
        let command_count = list.len();
        let draw_count = list.draw_count();
        let submission = self
            .device
            .submit(list, Some((&self.frame_fence, frame_number)))
            .unwrap_or_else(|err| fatal("SceneRenderer: submit", err));

        let screenshot_delivered = match (proxy.screenshot_request(), readback_texture) {
            (Some(request), Some(texture)) => self.readback.complete(
                &self.device,
                &self.frame_fence,
                proxy.readback_fence_value().unwrap_or(frame_number),
                &texture,
                request,
                frame_number,
            ),
            _ => false,
        };

        let report = FrameReport {
            frame_number,
            source: proxy.source(),
            passes,
            post_plan: plan,
            resolution,
            targets_reallocated: reallocated,
            submission,
            screenshot_delivered,
            command_count,
            draw_count,
        };
        crate::profiling::plot_frame(&report);
        lumen_core::frame_mark!();
        report
    }

    /// Release every pass and render target. Further `render` calls are fatal.
    pub fn shutdown(&mut self) {
        if !self.initialized {
            return;
        }
        for pass in self.scene_passes_mut() {
            pass.release_resources();
        }
        self.post.release_resources();
        self.readback.release_resources();
        self.targets.release();
        self.initialized = false;
        log::info!("SceneRenderer: shut down after frame {:?}", self.last_frame);
    }

    /// The device frames are submitted to.
    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    /// Mesh and material registry.
    pub fn assets(&self) -> &Arc<GpuAssets> {
        &self.assets
    }

    /// Render targets.
    pub fn targets(&self) -> &SceneRenderTargets {
        &self.targets
    }

    /// Fence signalled to each frame number on completion.
    pub fn frame_fence(&self) -> &Fence {
        &self.frame_fence
    }

    /// Last rendered frame number.
    pub fn last_frame(&self) -> Option<u64> {
        self.last_frame
    }

    /// Light counts of the last frame's direct lighting.
    pub fn lighting_stats(&self) -> LightingStats {
        self.direct_lighting.last_stats()
    }

    /// Owners of the translucent meshes drawn last frame, in draw order.
    pub fn translucent_draw_order(&self) -> &[u64] {
        self.translucency.last_draw_order()
    }

    /// Whether passes hold their resources.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl Drop for SceneRenderer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SceneRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneRenderer")
            .field("device", &self.device.name())
            .field("targets", &self.targets.state())
            .field("last_frame", &self.last_frame)
            .field("post", &self.post)
            .finish_non_exhaustive()
    }
}

fn run_pass(pass: &mut dyn RenderPass, ctx: &mut PassContext<'_>, passes: &mut Vec<PassKind>) {
    let kind = pass.kind();
    ctx.encoder.push_debug_group(kind.name());
    pass.render(ctx);
    ctx.encoder.pop_debug_group();
    passes.push(kind);
}
