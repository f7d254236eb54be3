//! Scene render targets and their reallocation policy.
//!
//! Two scale factors turn the caller's output size into render sizes, and
//! they apply in order:
//!
//! ```text
//! output ──(resolution scale %)──► working ──(÷ super-resolution factor)──► internal
//! ```
//!
//! Scene passes render at the internal size. Super-resolution upsamples to
//! the working size. The final blit takes the working size to the output.
//!
//! [`SceneRenderTargets`] is a two-state machine, `Unallocated` and
//! `Allocated(key)`. A transition happens only when the requested
//! [`TargetKey`] differs from the current one. On a transition the complete
//! replacement set of resolution-dependent targets is created and labeled
//! first, and only then are the old textures dropped. Resolution-independent
//! targets (shadow atlases, BRDF LUT, sky and probe atlases) are created on
//! the first transition and kept afterwards.

use std::sync::Arc;

use crate::device::GraphicsDevice;
use crate::error::fatal;
use crate::light_probe::LightProbeConfig;
use crate::resources::Texture;
use crate::settings::{RenderSettings, SuperResolutionMode};
use crate::types::{Extent2d, TextureDescriptor, TextureFormat, TextureUsage};

/// Number of bloom downsample levels.
pub const BLOOM_LEVELS: usize = 5;

/// Format of the lighting accumulation and other HDR targets.
pub const HDR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
/// Format of display-referred targets after tone mapping.
pub const LDR_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
/// Depth format.
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// The three sizes a frame is rendered at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderResolution {
    /// Caller's output size.
    pub output: Extent2d,
    /// Output after the resolution-scale percentage.
    pub working: Extent2d,
    /// Working size divided by the super-resolution factor.
    pub internal: Extent2d,
}

impl RenderResolution {
    /// Derive working and internal sizes from an output request.
    ///
    /// ```
    /// use lumen_graphics::settings::SuperResolutionMode;
    /// use lumen_graphics::targets::RenderResolution;
    /// use lumen_graphics::types::Extent2d;
    ///
    /// let r = RenderResolution::compute(Extent2d::new(1920, 1080), 50, SuperResolutionMode::Off);
    /// assert_eq!(r.internal, Extent2d::new(960, 540));
    /// assert_eq!(r.output, Extent2d::new(1920, 1080));
    /// ```
    pub fn compute(
        output: Extent2d,
        resolution_scale_percent: u32,
        super_resolution: SuperResolutionMode,
    ) -> Self {
        let working = output.scaled(resolution_scale_percent as f32 / 100.0);
        let internal = if super_resolution.is_enabled() {
            working.scaled(1.0 / super_resolution.factor())
        } else {
            working
        };
        Self {
            output,
            working,
            internal,
        }
    }

    /// Whether the working size matches the output, so post-processing can
    /// write straight into the caller's target.
    pub fn writes_output_directly(&self) -> bool {
        self.working == self.output
    }
}

/// Key of the allocation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetKey {
    /// Output width.
    pub width: u32,
    /// Output height.
    pub height: u32,
    /// Resolution scale in percent.
    pub resolution_scale_percent: u32,
    /// Super-resolution mode.
    pub super_resolution: SuperResolutionMode,
}

impl TargetKey {
    /// Key for an output size under `settings`.
    pub fn new(output: Extent2d, settings: &RenderSettings) -> Self {
        Self {
            width: output.width,
            height: output.height,
            resolution_scale_percent: settings.resolution_scale_percent,
            super_resolution: settings.super_resolution,
        }
    }

    /// Sizes this key allocates for.
    pub fn resolution(&self) -> RenderResolution {
        RenderResolution::compute(
            Extent2d::new(self.width, self.height),
            self.resolution_scale_percent,
            self.super_resolution,
        )
    }
}

/// Allocation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetState {
    /// Nothing allocated yet.
    #[default]
    Unallocated,
    /// Targets exist for this key.
    Allocated(TargetKey),
}

/// Targets that depend on the render resolution.
#[derive(Debug)]
pub struct ResolutionTargets {
    /// Sizes the set was created for.
    pub resolution: RenderResolution,
    /// Scene depth at internal size.
    pub scene_depth: Arc<Texture>,
    /// G-buffer base color.
    pub gbuffer_albedo: Arc<Texture>,
    /// G-buffer view-space normals.
    pub gbuffer_normal: Arc<Texture>,
    /// G-buffer metallic, roughness and occlusion.
    pub gbuffer_material: Arc<Texture>,
    /// G-buffer emissive radiance.
    pub gbuffer_emissive: Arc<Texture>,
    /// Ambient occlusion.
    pub ssao: Arc<Texture>,
    /// Lighting accumulation (HDR).
    pub lighting: Arc<Texture>,
    /// Screen-space reflections.
    pub ssr: Arc<Texture>,
    /// Volumetric clouds at half internal size.
    pub clouds: Arc<Texture>,
    /// God-ray occlusion at half internal size.
    pub god_rays: Arc<Texture>,
    /// Bloom downsample chain, largest first.
    pub bloom_chain: Vec<Arc<Texture>>,
    /// HDR post intermediate at internal size.
    pub post_hdr: Arc<Texture>,
    /// LDR post ping-pong pair at internal size.
    pub post_ldr: [Arc<Texture>; 2],
    /// Previous frame's anti-aliased color.
    pub taa_history: Arc<Texture>,
    /// LDR post ping-pong pair at working size.
    pub post_working: [Arc<Texture>; 2],
    /// Final color at working size, used when post-processing cannot write
    /// into the caller's output.
    pub final_color: Arc<Texture>,
}

impl ResolutionTargets {
    fn create(device: &Arc<GraphicsDevice>, resolution: RenderResolution) -> Self {
        let internal = resolution.internal;
        let half = internal.divided(2);
        let working = resolution.working;
        let attachment = TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING;

        let make = |label: &str, extent: Extent2d, format: TextureFormat, usage: TextureUsage| {
            create_texture(
                device,
                TextureDescriptor::from_extent(extent, format, usage).with_label(label),
            )
        };

        let bloom_chain = (0..BLOOM_LEVELS)
            .map(|level| {
                make(
                    &format!("Bloom.Mip{level}"),
                    internal.divided(2 << level),
                    HDR_FORMAT,
                    attachment,
                )
            })
            .collect();

        Self {
            resolution,
            scene_depth: make("SceneDepth", internal, DEPTH_FORMAT, attachment),
            gbuffer_albedo: make("GBuffer.Albedo", internal, TextureFormat::Rgba8UnormSrgb, attachment),
            gbuffer_normal: make("GBuffer.Normal", internal, TextureFormat::Rgb10a2Unorm, attachment),
            gbuffer_material: make("GBuffer.Material", internal, TextureFormat::Rgba8Unorm, attachment),
            gbuffer_emissive: make("GBuffer.Emissive", internal, HDR_FORMAT, attachment),
            ssao: make("SSAO", internal, TextureFormat::R8Unorm, attachment),
            lighting: make("Lighting", internal, HDR_FORMAT, attachment | TextureUsage::COPY_SRC),
            ssr: make("SSR", internal, HDR_FORMAT, attachment),
            clouds: make("Clouds", half, HDR_FORMAT, attachment),
            god_rays: make("GodRays", half, TextureFormat::R16Float, attachment),
            bloom_chain,
            post_hdr: make("Post.HDR", internal, HDR_FORMAT, attachment),
            post_ldr: [
                make("Post.LDR0", internal, LDR_FORMAT, attachment | TextureUsage::COPY_SRC),
                make("Post.LDR1", internal, LDR_FORMAT, attachment | TextureUsage::COPY_SRC),
            ],
            taa_history: make("TAA.History", internal, LDR_FORMAT, attachment | TextureUsage::COPY_DST),
            post_working: [
                make("Post.Working0", working, LDR_FORMAT, attachment),
                make("Post.Working1", working, LDR_FORMAT, attachment),
            ],
            final_color: make(
                "FinalColor",
                working,
                LDR_FORMAT,
                attachment | TextureUsage::COPY_SRC,
            ),
        }
    }

    /// Number of textures in the set.
    pub fn texture_count(&self) -> usize {
        17 + self.bloom_chain.len()
    }
}

/// Targets created once and kept across resolution changes.
#[derive(Debug)]
pub struct FixedTargets {
    /// Directional shadow cascades, one layer per cascade.
    pub shadow_atlas: Arc<Texture>,
    /// Point light shadow cubes.
    pub omni_shadows: Arc<Texture>,
    /// Split-sum BRDF integration table.
    pub brdf_lut: Arc<Texture>,
    /// Diffuse sky irradiance cube.
    pub sky_irradiance: Arc<Texture>,
    /// Specular prefiltered sky cube.
    pub sky_prefiltered: Arc<Texture>,
    /// Reflection probe atlas.
    pub reflection_atlas: Arc<Texture>,
    /// Irradiance volume atlas.
    pub irradiance_atlas: Arc<Texture>,
}

impl FixedTargets {
    fn create(
        device: &Arc<GraphicsDevice>,
        settings: &RenderSettings,
        probes: &LightProbeConfig,
    ) -> Self {
        let attachment = TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING;
        Self {
            shadow_atlas: create_texture(
                device,
                TextureDescriptor::new_2d_array(
                    settings.shadow_map_size,
                    settings.shadow_map_size,
                    settings.shadow_cascades.max(1),
                    DEPTH_FORMAT,
                    attachment,
                )
                .with_label("Shadow.Cascades"),
            ),
            omni_shadows: create_texture(
                device,
                TextureDescriptor::new_cube_array(
                    settings.omni_shadow_size,
                    settings.max_omni_shadows.max(1),
                    DEPTH_FORMAT,
                    attachment,
                )
                .with_label("Shadow.Omni"),
            ),
            brdf_lut: create_texture(
                device,
                TextureDescriptor::new_2d(512, 512, TextureFormat::Rg16Float, attachment)
                    .with_label("BRDF.LUT"),
            ),
            sky_irradiance: create_texture(
                device,
                TextureDescriptor::new_cube_array(32, 1, HDR_FORMAT, attachment)
                    .with_label("Sky.Irradiance"),
            ),
            sky_prefiltered: create_texture(
                device,
                TextureDescriptor::new_cube_array(128, 1, HDR_FORMAT, attachment)
                    .with_mip_levels(5)
                    .with_label("Sky.Prefiltered"),
            ),
            reflection_atlas: create_texture(
                device,
                TextureDescriptor::new_2d(
                    probes.reflection_atlas_size,
                    probes.reflection_atlas_size,
                    HDR_FORMAT,
                    attachment | TextureUsage::COPY_DST,
                )
                .with_label("Probes.Reflection"),
            ),
            irradiance_atlas: create_texture(
                device,
                TextureDescriptor::new_2d(
                    probes.irradiance_atlas_size,
                    probes.irradiance_atlas_size,
                    HDR_FORMAT,
                    attachment | TextureUsage::COPY_DST,
                )
                .with_label("Probes.Irradiance"),
            ),
        }
    }
}

fn create_texture(device: &Arc<GraphicsDevice>, descriptor: TextureDescriptor) -> Arc<Texture> {
    device.create_texture(&descriptor).unwrap_or_else(|err| {
        fatal(
            &format!(
                "SceneRenderTargets: creating {}",
                descriptor.label.as_deref().unwrap_or("texture")
            ),
            err,
        )
    })
}

/// Pool of sized GPU targets owned by the render thread.
#[derive(Debug)]
pub struct SceneRenderTargets {
    probe_config: LightProbeConfig,
    state: TargetState,
    resolution: Option<ResolutionTargets>,
    fixed: Option<FixedTargets>,
    reconciled_frame: Option<u64>,
    reallocations: u64,
}

impl SceneRenderTargets {
    /// Empty pool; nothing is created until the first [`reconcile`](Self::reconcile).
    pub fn new(probe_config: LightProbeConfig) -> Self {
        Self {
            probe_config,
            state: TargetState::Unallocated,
            resolution: None,
            fixed: None,
            reconciled_frame: None,
            reallocations: 0,
        }
    }

    /// Make the pool match `key` for `frame_number`.
    ///
    /// Returns `true` if resolution-dependent targets were (re)created.
    ///
    /// # Panics
    ///
    /// Panics if called twice for the same frame or if a target cannot be
    /// created.
    pub fn reconcile(
        &mut self,
        device: &Arc<GraphicsDevice>,
        frame_number: u64,
        key: TargetKey,
        settings: &RenderSettings,
    ) -> bool {
        if self.reconciled_frame == Some(frame_number) {
            fatal(
                "SceneRenderTargets",
                format_args!("reconcile called twice in frame {frame_number}"),
            );
        }
        self.reconciled_frame = Some(frame_number);

        if self.state == TargetState::Allocated(key) {
            return false;
        }

        lumen_core::profile_scope!("reallocate_targets");

        if self.fixed.is_none() {
            self.fixed = Some(FixedTargets::create(device, settings, &self.probe_config));
            log::info!(
                "SceneRenderTargets: created fixed targets (shadow {}x{} cascades, omni {} x{})",
                settings.shadow_map_size,
                settings.shadow_cascades,
                settings.omni_shadow_size,
                settings.max_omni_shadows
            );
        }

        let resolution = key.resolution();
        let replacement = ResolutionTargets::create(device, resolution);
        // The replacement is complete; only now release the previous set.
        drop(self.resolution.replace(replacement));

        log::info!(
            "SceneRenderTargets: {:?} -> output {} working {} internal {}",
            self.state,
            resolution.output,
            resolution.working,
            resolution.internal
        );
        self.state = TargetState::Allocated(key);
        self.reallocations += 1;
        true
    }

    /// Current state.
    pub fn state(&self) -> TargetState {
        self.state
    }

    /// Number of transitions so far.
    pub fn reallocation_count(&self) -> u64 {
        self.reallocations
    }

    /// Alias of [`reallocation_count`](Self::reallocation_count): bumped on every transition.
    pub fn generation(&self) -> u64 {
        self.reallocations
    }

    /// Sizes of the current allocation.
    pub fn resolution(&self) -> Option<RenderResolution> {
        self.resolution.as_ref().map(|t| t.resolution)
    }

    /// Resolution-dependent targets.
    ///
    /// # Panics
    ///
    /// Panics before the first [`reconcile`](Self::reconcile).
    pub fn sized(&self) -> &ResolutionTargets {
        match &self.resolution {
            Some(targets) => targets,
            None => fatal("SceneRenderTargets", "targets used before reconcile"),
        }
    }

    /// Resolution-independent targets.
    ///
    /// # Panics
    ///
    /// Panics before the first [`reconcile`](Self::reconcile).
    pub fn fixed(&self) -> &FixedTargets {
        match &self.fixed {
            Some(targets) => targets,
            None => fatal("SceneRenderTargets", "targets used before reconcile"),
        }
    }

    /// Light-probe atlas configuration.
    pub fn probe_config(&self) -> &LightProbeConfig {
        &self.probe_config
    }

    /// Drop every target and return to `Unallocated`.
    pub fn release(&mut self) {
        self.resolution = None;
        self.fixed = None;
        self.state = TargetState::Unallocated;
    }
}
