//! Depth-only pre-pass over opaque geometry.

use std::sync::Arc;

use crate::commands::DepthAttachment;
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::types::{BlendMode, Viewport};

use super::{PassContext, PassKind, PassProgram, RenderPass};

/// Lays down opaque depth so the G-buffer can shade each pixel once.
#[derive(Debug)]
pub struct DepthPrepass {
    mesh_program: PassProgram,
    landscape_program: PassProgram,
}

impl DepthPrepass {
    /// Create the pass. Programs are built by `initialize_resources`.
    pub fn new() -> Self {
        Self {
            mesh_program: PassProgram::new("depth_only", BlendMode::Opaque),
            landscape_program: PassProgram::new("depth_only", BlendMode::Opaque)
                .with_define("LANDSCAPE", "1"),
        }
    }
}

impl Default for DepthPrepass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass for DepthPrepass {
    fn kind(&self) -> PassKind {
        PassKind::DepthPrepass
    }

    fn initialize_resources(&mut self, device: &Arc<GraphicsDevice>) -> Result<(), GraphicsError> {
        self.mesh_program.initialize(device)?;
        self.landscape_program.initialize(device)
    }

    fn release_resources(&mut self) {
        self.mesh_program.release();
        self.landscape_program.release();
    }

    fn render(&mut self, ctx: &mut PassContext<'_>) {
        lumen_core::profile_scope!("DepthPrepass");

        let proxy = ctx.proxy;
        let targets = ctx.targets;
        let view_projection = ctx.camera.view_projection;

        ctx.encoder.begin_render_pass(
            "DepthPrepass",
            &[],
            Some(DepthAttachment::clear(&targets.scene_depth)),
        );
        ctx.encoder
            .set_viewport(Viewport::from_extent(targets.resolution.internal));

        ctx.encoder.bind_program(&self.mesh_program.get());
        ctx.bind_view();
        for mesh in proxy.opaque_meshes() {
            if ctx.opaque_material(mesh.material).is_some() {
                ctx.draw_mesh(mesh, view_projection);
            }
        }

        let landscapes: Vec<_> = proxy
            .landscapes()
            .filter(|landscape| ctx.opaque_material(landscape.material).is_some())
            .collect();
        if !landscapes.is_empty() {
            ctx.encoder.bind_program(&self.landscape_program.get());
            ctx.bind_view();
            for landscape in landscapes {
                ctx.draw_landscape(landscape, view_projection);
            }
        }

        ctx.encoder.end_render_pass();
        ctx.depth_prepass_ran = true;
    }
}
