//! G-buffer pass.

use std::sync::Arc;

use lumen_core::ids::MaterialId;

use crate::assets::MaterialInstance;
use crate::commands::{ColorAttachment, CommandEncoder, DepthAttachment, DepthTest, UniformSlot};
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::types::Viewport;

use super::{PassContext, PassKind, RenderPass};

/// Writes albedo, normal, material and emissive channels for opaque meshes
/// and landscapes.
///
/// When the depth pre-pass ran this frame the pass tests `Equal` against its
/// depth without writing; otherwise it clears depth and runs a full
/// `LessEqual` test.
///
/// Programs come from the material registry, so the pass owns no resources.
#[derive(Debug, Default)]
pub struct GBufferPass {
    draws: u32,
    skipped: u32,
}

impl GBufferPass {
    /// Create the pass.
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws recorded in the last frame.
    pub fn last_draw_count(&self) -> u32 {
        self.draws
    }

    /// Draws skipped in the last frame because their material was evicted.
    pub fn last_skipped_count(&self) -> u32 {
        self.skipped
    }
}

pub(super) fn bind_material(encoder: &mut CommandEncoder, material: &MaterialInstance) {
    encoder.bind_program(&material.program);
    if !material.uniforms.is_empty() {
        encoder.set_uniform_bytes(UniformSlot::Material, &material.uniforms);
    }
    for parameter in &material.textures {
        encoder.bind_texture(parameter.slot, &parameter.texture);
    }
}

impl RenderPass for GBufferPass {
    fn kind(&self) -> PassKind {
        PassKind::GBuffer
    }

    fn initialize_resources(&mut self, _device: &Arc<GraphicsDevice>) -> Result<(), GraphicsError> {
        Ok(())
    }

    fn release_resources(&mut self) {}

    fn render(&mut self, ctx: &mut PassContext<'_>) {
        lumen_core::profile_scope!("GBufferPass");

        let proxy = ctx.proxy;
        let targets = ctx.targets;
        let view_projection = ctx.camera.view_projection;

        let depth = if ctx.depth_prepass_ran {
            DepthAttachment::read_only(&targets.scene_depth, DepthTest::Equal)
        } else {
            DepthAttachment::clear(&targets.scene_depth)
        };
        let colors = [
            ColorAttachment::clear(&targets.gbuffer_albedo, [0.0; 4]),
            ColorAttachment::clear(&targets.gbuffer_normal, [0.5, 0.5, 1.0, 0.0]),
            ColorAttachment::clear(&targets.gbuffer_material, [0.0; 4]),
            ColorAttachment::clear(&targets.gbuffer_emissive, [0.0; 4]),
        ];

        ctx.encoder.begin_render_pass("GBuffer", &colors, Some(depth));
        ctx.encoder
            .set_viewport(Viewport::from_extent(targets.resolution.internal));

        self.draws = 0;
        self.skipped = 0;
        let mut bound: Option<MaterialId> = None;

        for mesh in proxy.opaque_meshes() {
            if bound != Some(mesh.material) {
                let Some(material) = ctx.opaque_material(mesh.material) else {
                    self.skipped += 1;
                    continue;
                };
                bind_material(ctx.encoder, &material);
                ctx.bind_view();
                bound = Some(mesh.material);
            }
            if ctx.draw_mesh(mesh, view_projection) {
                self.draws += 1;
            } else {
                self.skipped += 1;
            }
        }

        for landscape in proxy.landscapes() {
            if bound != Some(landscape.material) {
                let Some(material) = ctx.opaque_material(landscape.material) else {
                    self.skipped += 1;
                    continue;
                };
                bind_material(ctx.encoder, &material);
                ctx.bind_view();
                bound = Some(landscape.material);
            }
            ctx.draw_landscape(landscape, view_projection);
            self.draws += 1;
        }

        ctx.encoder.end_render_pass();

        if self.skipped > 0 {
            log::debug!(
                "GBufferPass: frame {} skipped {} draws with evicted assets",
                proxy.frame_number(),
                self.skipped
            );
        }
    }
}
