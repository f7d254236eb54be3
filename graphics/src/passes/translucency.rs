//! Forward-shaded translucent meshes.

use std::sync::Arc;

use crate::commands::{ColorAttachment, DepthAttachment, DepthTest};
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::proxy::StaticMeshProxy;
use crate::types::Viewport;

use super::gbuffer::bind_material;
use super::{PassContext, PassKind, RenderPass};

/// Order translucent meshes back to front by view depth.
///
/// Equal depths keep their list order.
pub fn sort_back_to_front<'a>(meshes: impl Iterator<Item = &'a StaticMeshProxy>) -> Vec<&'a StaticMeshProxy> {
    let mut sorted: Vec<_> = meshes.collect();
    sorted.sort_by(|a, b| b.view_depth.total_cmp(&a.view_depth));
    sorted
}

/// Blends translucent meshes over lighting, tested against opaque depth
/// without writing it.
#[derive(Debug, Default)]
pub struct TranslucencyPass {
    order: Vec<u64>,
}

impl TranslucencyPass {
    /// Create the pass.
    pub fn new() -> Self {
        Self::default()
    }

    /// Owners of the meshes drawn last frame, in draw order.
    pub fn last_draw_order(&self) -> &[u64] {
        &self.order
    }
}

impl RenderPass for TranslucencyPass {
    fn kind(&self) -> PassKind {
        PassKind::Translucency
    }

    fn initialize_resources(&mut self, _device: &Arc<GraphicsDevice>) -> Result<(), GraphicsError> {
        Ok(())
    }

    fn release_resources(&mut self) {
        self.order.clear();
    }

    fn render(&mut self, ctx: &mut PassContext<'_>) {
        lumen_core::profile_scope!("TranslucencyPass");

        let proxy = ctx.proxy;
        let targets = ctx.targets;
        let view_projection = ctx.camera.view_projection;
        self.order.clear();

        ctx.encoder.begin_render_pass(
            "Translucency",
            &[ColorAttachment::load(&targets.lighting)],
            Some(DepthAttachment::read_only(&targets.scene_depth, DepthTest::LessEqual)),
        );
        ctx.encoder
            .set_viewport(Viewport::from_extent(targets.resolution.internal));

        for mesh in sort_back_to_front(proxy.translucent_meshes()) {
            let Some(material) = ctx.assets.material(mesh.material) else {
                continue;
            };
            bind_material(ctx.encoder, &material);
            ctx.bind_view();
            ctx.encoder.bind_texture(8, &targets.ssao);
            if ctx.draw_mesh(mesh, view_projection) {
                self.order.push(mesh.owner);
            }
        }

        ctx.encoder.end_render_pass();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_to_front() {
        let meshes = [
            StaticMeshProxy { owner: 1, view_depth: 2.0, ..Default::default() },
            StaticMeshProxy { owner: 2, view_depth: 9.0, ..Default::default() },
            StaticMeshProxy { owner: 3, view_depth: 5.0, ..Default::default() },
            StaticMeshProxy { owner: 4, view_depth: 5.0, ..Default::default() },
        ];
        let order: Vec<u64> = sort_back_to_front(meshes.iter()).iter().map(|m| m.owner).collect();
        assert_eq!(order, vec![2, 3, 4, 1]);
    }
}
