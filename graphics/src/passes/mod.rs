//! Render passes.
//!
//! A pass is a stateful object owned by the [`SceneRenderer`]. It creates its
//! programs once in [`RenderPass::initialize_resources`], then records
//! commands for every frame it is gated into through
//! [`RenderPass::render`]. Passes never own frame data: the
//! [`PassContext`] lends them the proxy, the targets and the encoder for the
//! duration of one call.
//!
//! ## Frame order
//!
//! ```text
//! DepthPrepass -> DirectionalShadows -> OmniShadows
//!   -> VolumetricClouds, GodRays
//!   -> GBuffer -> Ssao
//!   -> ClearLighting -> DirectLighting -> IndirectLighting -> Emissive -> Ssr
//!   -> VolumetricComposite -> Translucency
//!   -> Post(..) -> Readback -> Blit
//! ```
//!
//! [`SceneRenderer`]: crate::renderer::SceneRenderer

mod blit;
mod depth_prepass;
mod gbuffer;
mod indirect_lighting;
mod lighting;
pub mod post;
mod readback;
mod screen_space;
mod shadows;
mod translucency;
mod volumetrics;

use std::fmt;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use lumen_core::ids::MaterialId;

use crate::assets::{GpuAssets, MaterialInstance};
use crate::commands::{ColorAttachment, CommandEncoder, UniformSlot};
use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, fatal};
use crate::proxy::{CameraProxy, LandscapeProxy, SceneProxy, StaticMeshProxy};
use crate::resources::{Program, Texture};
use crate::settings::RenderSettings;
use crate::targets::{FixedTargets, ResolutionTargets};
use crate::types::{BlendMode, ProgramDescriptor, Viewport};

pub use blit::BlitPass;
pub use depth_prepass::DepthPrepass;
pub use gbuffer::GBufferPass;
pub use indirect_lighting::{
    IndirectLightingPass, IrradianceVolumeGpu, MAX_PROBES_PER_DRAW, ReflectionProbeGpu,
    pack_irradiance_volumes, pack_reflection_probes,
};
pub use lighting::{
    DirectLightingPass, EmissiveResolvePass, LightingStats, clear_lighting, light_scissor,
};
pub use post::{
    PlannedStage, PostProcessChain, PostProcessPass, PostProcessPlan, PostStage, StageOutput,
};
pub use readback::ReadbackPass;
pub use screen_space::{ScreenSpaceReflectionPass, SsaoPass};
pub use shadows::{
    CascadeUniforms, DirectionalShadowPass, OmniShadowPass, SPLIT_LAMBDA, cascade_splits,
    omni_face_view_projection,
};
pub use translucency::{TranslucencyPass, sort_back_to_front};
pub use volumetrics::{GodRayPass, VolumetricCloudPass, VolumetricCompositePass};

/// Identifies a step of the frame in a [`FrameReport`](crate::renderer::FrameReport).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Depth-only opaque geometry.
    DepthPrepass,
    /// Cascaded sun shadows.
    DirectionalShadows,
    /// Point light cube shadows.
    OmniShadows,
    /// Cloud raymarch.
    VolumetricClouds,
    /// Sun silhouette for god rays.
    GodRays,
    /// Opaque and landscape surface attributes.
    GBuffer,
    /// Ambient occlusion.
    Ssao,
    /// Lighting accumulation clear.
    ClearLighting,
    /// Analytic lights.
    DirectLighting,
    /// Probe and sky lighting.
    IndirectLighting,
    /// Emissive resolve.
    Emissive,
    /// Screen-space reflections.
    Ssr,
    /// Clouds and god rays composited over lighting.
    VolumetricComposite,
    /// Forward-shaded translucent meshes.
    Translucency,
    /// One post-processing stage.
    Post(PostStage),
    /// CPU readback of the final target.
    Readback,
    /// Copy of the final target into the caller's output.
    Blit,
}

impl PassKind {
    /// Label used for debug groups and logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::DepthPrepass => "DepthPrepass",
            Self::DirectionalShadows => "DirectionalShadows",
            Self::OmniShadows => "OmniShadows",
            Self::VolumetricClouds => "VolumetricClouds",
            Self::GodRays => "GodRays",
            Self::GBuffer => "GBuffer",
            Self::Ssao => "SSAO",
            Self::ClearLighting => "ClearLighting",
            Self::DirectLighting => "DirectLighting",
            Self::IndirectLighting => "IndirectLighting",
            Self::Emissive => "Emissive",
            Self::Ssr => "SSR",
            Self::VolumetricComposite => "VolumetricComposite",
            Self::Translucency => "Translucency",
            Self::Post(stage) => stage.name(),
            Self::Readback => "Readback",
            Self::Blit => "Blit",
        }
    }

    /// Whether this is a post-processing stage.
    pub fn is_post(self) -> bool {
        matches!(self, Self::Post(_))
    }
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Borrowed frame state handed to a pass for one `render` call.
pub struct PassContext<'a> {
    /// Finalized, view-prepared proxy.
    pub proxy: &'a SceneProxy,
    /// The proxy's camera.
    pub camera: &'a CameraProxy,
    /// Effective settings for the frame.
    pub settings: &'a RenderSettings,
    /// Resolution-dependent targets.
    pub targets: &'a ResolutionTargets,
    /// Resolution-independent targets.
    pub fixed: &'a FixedTargets,
    /// Target generation; changes whenever `targets` was rebuilt.
    pub target_generation: u64,
    /// Resident meshes and materials.
    pub assets: &'a GpuAssets,
    /// Command stream for the frame.
    pub encoder: &'a mut CommandEncoder,
    /// Scene depth already holds opaque depth from the pre-pass.
    pub depth_prepass_ran: bool,
}

impl PassContext<'_> {
    /// The material to draw opaque geometry with, or `None` if it is no
    /// longer resident.
    ///
    /// The depth pre-pass and the G-buffer both filter through this, so
    /// `Equal` depth testing sees the same set of surfaces.
    pub fn opaque_material(&self, id: MaterialId) -> Option<Arc<MaterialInstance>> {
        self.assets.material(id)
    }

    /// Upload the camera block to [`UniformSlot::View`].
    pub fn bind_view(&mut self) {
        let view = ViewUniforms::new(self.camera, self.proxy.frame_number());
        self.encoder.set_uniforms(UniformSlot::View, &view);
    }

    /// Draw a resident static mesh with the bound program.
    ///
    /// `view_projection` is the matrix of the view being rendered (camera,
    /// cascade or cube face). Returns `false` if the mesh was evicted since
    /// the proxy was built.
    pub fn draw_mesh(&mut self, mesh: &StaticMeshProxy, view_projection: Mat4) -> bool {
        let Some(gpu) = self.assets.mesh(mesh.mesh) else {
            log::trace!("draw_mesh: {} evicted since the proxy was built", mesh.mesh);
            return false;
        };
        let object = ObjectUniforms::new(mesh.world, view_projection);
        self.encoder.set_uniforms(UniformSlot::Object, &object);
        self.encoder
            .draw_indexed(&gpu.vertex_buffer, &gpu.index_buffer, gpu.index_count, 1);
        true
    }

    /// Draw a landscape patch grid with the bound program.
    pub fn draw_landscape(&mut self, landscape: &LandscapeProxy, view_projection: Mat4) {
        let object = ObjectUniforms::new(landscape.world, view_projection);
        self.encoder.set_uniforms(UniformSlot::Object, &object);
        self.encoder
            .set_uniforms(UniformSlot::Pass, &LandscapeUniforms::new(landscape));
        self.encoder.draw(landscape.vertex_count(), 1);
    }

    /// Record a render pass with one full-screen draw.
    ///
    /// `output` is cleared to `clear` first, or loaded when `None`. `inputs`
    /// are bound to texture slots in order. `params` goes to
    /// [`UniformSlot::Pass`] when non-empty.
    pub fn fullscreen(
        &mut self,
        label: &str,
        program: &Program,
        output: &Texture,
        clear: Option<[f32; 4]>,
        inputs: &[&Texture],
        params: &[u8],
    ) {
        let attachment = match clear {
            Some(color) => ColorAttachment::clear(output, color),
            None => ColorAttachment::load(output),
        };
        self.encoder.begin_render_pass(label, &[attachment], None);
        self.encoder
            .set_viewport(Viewport::from_extent(output.extent()));
        self.encoder.bind_program(program);
        self.bind_view();
        if !params.is_empty() {
            self.encoder.set_uniform_bytes(UniformSlot::Pass, params);
        }
        for (slot, texture) in inputs.iter().enumerate() {
            self.encoder.bind_texture(slot as u32, texture);
        }
        self.encoder.draw_fullscreen();
        self.encoder.end_render_pass();
    }
}

/// A stateful step of the frame.
pub trait RenderPass: Send {
    /// Which step this pass implements.
    fn kind(&self) -> PassKind;

    /// Debug name.
    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Create programs and other persistent resources. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the device error if a resource cannot be created.
    fn initialize_resources(&mut self, device: &Arc<GraphicsDevice>) -> Result<(), GraphicsError>;

    /// Drop persistent resources. Safe to call before initialization and
    /// more than once.
    fn release_resources(&mut self);

    /// Record this pass into `ctx.encoder`.
    fn render(&mut self, ctx: &mut PassContext<'_>);
}

/// A program a pass creates once and binds every frame.
#[derive(Debug)]
pub(crate) struct PassProgram {
    descriptor: ProgramDescriptor,
    program: Option<Arc<Program>>,
}

impl PassProgram {
    pub(crate) fn new(shader: &str, blend: BlendMode) -> Self {
        Self {
            descriptor: ProgramDescriptor::new(shader)
                .with_label(shader)
                .with_blend(blend),
            program: None,
        }
    }

    pub(crate) fn with_define(mut self, name: &str, value: &str) -> Self {
        self.descriptor = self.descriptor.with_define(name, value);
        self
    }

    pub(crate) fn initialize(&mut self, device: &Arc<GraphicsDevice>) -> Result<(), GraphicsError> {
        if self.program.is_none() {
            self.program = Some(device.create_program(&self.descriptor)?);
        }
        Ok(())
    }

    pub(crate) fn release(&mut self) {
        self.program = None;
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.program.is_some()
    }

    /// The program, shared so it can be bound while the context is borrowed.
    ///
    /// # Panics
    ///
    /// Panics if the owning pass was never initialized.
    pub(crate) fn get(&self) -> Arc<Program> {
        match &self.program {
            Some(program) => Arc::clone(program),
            None => fatal(
                "RenderPass",
                format_args!("program '{}' used before initialize_resources", self.descriptor.shader),
            ),
        }
    }
}

/// Camera block shared by every program.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ViewUniforms {
    /// World to view.
    pub view: Mat4,
    /// View to clip.
    pub projection: Mat4,
    /// World to clip.
    pub view_projection: Mat4,
    /// Clip to world.
    pub inverse_view_projection: Mat4,
    /// Eye position, exposure in `w`.
    pub position_exposure: Vec4,
    /// Near, far, aspect and the frame number modulo 1024.
    pub params: Vec4,
}

impl ViewUniforms {
    /// Camera block for `camera` in frame `frame_number`.
    pub fn new(camera: &CameraProxy, frame_number: u64) -> Self {
        Self {
            view: camera.view,
            projection: camera.projection,
            view_projection: camera.view_projection,
            inverse_view_projection: camera.view_projection.inverse(),
            position_exposure: camera.position.extend(camera.exposure),
            params: Vec4::new(
                camera.near,
                camera.far,
                camera.aspect,
                (frame_number % 1024) as f32,
            ),
        }
    }
}

/// Per-draw transform block.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectUniforms {
    /// Local to world.
    pub world: Mat4,
    /// Local to clip for the view being rendered.
    pub world_view_projection: Mat4,
}

impl ObjectUniforms {
    /// Block for an object at `world` seen through `view_projection`.
    pub fn new(world: Mat4, view_projection: Mat4) -> Self {
        Self {
            world,
            world_view_projection: view_projection * world,
        }
    }
}

/// Patch grid parameters for landscape draws.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LandscapeUniforms {
    /// Width, depth, height scale and patches per side.
    pub size_height_patches: Vec4,
}

impl LandscapeUniforms {
    /// Block for `landscape`.
    pub fn new(landscape: &LandscapeProxy) -> Self {
        Self {
            size_height_patches: Vec4::new(
                landscape.size.x,
                landscape.size.y,
                landscape.height_scale,
                landscape.patches as f32,
            ),
        }
    }
}

/// Which scene passes run this frame.
///
/// Evaluated once per frame from the effective settings and the proxy
/// contents; the renderer consults only these flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassGates {
    /// Step 2.
    pub depth_prepass: bool,
    /// Step 3, sun cascades.
    pub directional_shadows: bool,
    /// Step 3, point light cubes.
    pub omni_shadows: bool,
    /// Step 4, clouds.
    pub volumetric_clouds: bool,
    /// Step 4, god rays.
    pub god_rays: bool,
    /// Step 6.
    pub ssao: bool,
    /// Step 7, analytic lights.
    pub direct_lighting: bool,
    /// Step 7, probes and sky.
    pub indirect_lighting: bool,
    /// Step 7, emissive.
    pub emissive: bool,
    /// Step 7, reflections.
    pub ssr: bool,
    /// Step 8.
    pub translucency: bool,
}

impl PassGates {
    /// Gates for `proxy` under `settings`. The proxy must be view-prepared.
    pub fn evaluate(settings: &RenderSettings, proxy: &SceneProxy) -> Self {
        let sun_casts = proxy.sun().is_some_and(|sun| sun.cast_shadows);
        let omni = proxy.point_lights().any(|light| light.shadow_slot.is_some());
        Self {
            depth_prepass: settings.depth_prepass,
            directional_shadows: settings.shadows && sun_casts,
            omni_shadows: settings.shadows && omni,
            volumetric_clouds: settings.volumetric_clouds
                && proxy.sky().is_some_and(|sky| sky.has_clouds()),
            god_rays: settings.god_rays && proxy.sun().is_some(),
            ssao: settings.ssao,
            direct_lighting: settings.direct_lighting,
            indirect_lighting: settings.indirect_lighting,
            emissive: settings.emissive,
            ssr: settings.ssr,
            translucency: proxy.translucent_meshes().next().is_some(),
        }
    }

    /// Whether a volumetric composite is needed.
    pub fn volumetric_composite(&self) -> bool {
        self.volumetric_clouds || self.god_rays
    }
}
