//! Shadow map passes.
//!
//! The sun renders one orthographic depth map per cascade into the layers of
//! the shadow atlas. Shadowed point lights render six perspective faces into
//! their cube of the omni shadow array. Slots were assigned by
//! [`SceneProxy::prepare_view`](crate::proxy::SceneProxy::prepare_view).
//!
//! Cascade matrices are a pure function of the camera and sun direction so
//! the lighting pass can rebuild them without sharing state with this pass.

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use crate::commands::DepthAttachment;
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::proxy::{CameraProxy, PointLightProxy};
use crate::settings::MAX_SHADOW_CASCADES;
use crate::types::{BlendMode, Extent2d, Viewport};

use super::{PassContext, PassKind, PassProgram, RenderPass};

const MAX_CASCADES: usize = MAX_SHADOW_CASCADES as usize;

/// Blend between logarithmic and uniform splits.
pub const SPLIT_LAMBDA: f32 = 0.75;

/// Near plane of omni shadow faces.
const OMNI_NEAR: f32 = 0.05;

/// Cascade boundaries using the practical split scheme.
///
/// Entry `i` is the near distance of cascade `i`, entry `count` is `far`.
/// Entries past `count` repeat `far`.
///
/// # Example
///
/// ```
/// use lumen_graphics::passes::cascade_splits;
///
/// let splits = cascade_splits(0.1, 100.0, 2, 0.5);
/// assert_eq!(splits[0], 0.1);
/// assert_eq!(splits[2], 100.0);
/// assert!(splits[1] > 0.1 && splits[1] < 100.0);
/// ```
pub fn cascade_splits(near: f32, far: f32, count: u32, lambda: f32) -> [f32; MAX_CASCADES + 1] {
    let count = count.clamp(1, MAX_SHADOW_CASCADES);
    let mut splits = [far; MAX_CASCADES + 1];
    splits[0] = near;
    for i in 1..count {
        let t = i as f32 / count as f32;
        let log = near * (far / near).powf(t);
        let uniform = near + (far - near) * t;
        splits[i as usize] = lambda * log + (1.0 - lambda) * uniform;
    }
    splits
}

/// Shadow data read by the lighting pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CascadeUniforms {
    /// World to light clip per cascade.
    pub view_projections: [Mat4; MAX_CASCADES],
    /// Far distance of each cascade.
    pub split_far: Vec4,
    /// Cascade count in `x`.
    pub count: Vec4,
}

impl CascadeUniforms {
    /// Cascades for `camera` and a sun travelling along `direction`.
    pub fn compute(camera: &CameraProxy, direction: Vec3, count: u32) -> Self {
        let count = count.clamp(1, MAX_SHADOW_CASCADES);
        let splits = cascade_splits(camera.near, camera.far, count, SPLIT_LAMBDA);
        let mut view_projections = [Mat4::IDENTITY; MAX_CASCADES];
        for (i, matrix) in view_projections.iter_mut().take(count as usize).enumerate() {
            *matrix = cascade_view_projection(camera, direction, splits[i], splits[i + 1]);
        }
        Self {
            view_projections,
            split_far: Vec4::new(splits[1], splits[2], splits[3], splits[4]),
            count: Vec4::new(count as f32, 0.0, 0.0, 0.0),
        }
    }

    /// Cascades in use.
    pub fn cascade_count(&self) -> u32 {
        self.count.x as u32
    }
}

/// Orthographic light matrix enclosing the camera frustum slice `[near, far]`.
fn cascade_view_projection(camera: &CameraProxy, direction: Vec3, near: f32, far: f32) -> Mat4 {
    let tan_y = (camera.fov_y * 0.5).tan();
    let tan_x = tan_y * camera.aspect;
    let mid = (near + far) * 0.5;
    let far_corner = Vec3::new(far * tan_x, far * tan_y, far - mid);
    let near_corner = Vec3::new(near * tan_x, near * tan_y, mid - near);
    let radius = far_corner.length().max(near_corner.length()).max(1e-3);

    let center = camera.position + camera.forward * mid;
    let direction = direction.try_normalize().unwrap_or(Vec3::NEG_Y);
    let up = if direction.y.abs() > 0.99 { Vec3::Z } else { Vec3::Y };
    let eye = center - direction * radius * 2.0;
    let view = Mat4::look_at_rh(eye, center, up);
    let projection = Mat4::orthographic_rh(-radius, radius, -radius, radius, 0.0, radius * 4.0);
    projection * view
}

/// Renders sun cascades into the shadow atlas.
#[derive(Debug)]
pub struct DirectionalShadowPass {
    mesh_program: PassProgram,
    landscape_program: PassProgram,
}

impl DirectionalShadowPass {
    /// Create the pass.
    pub fn new() -> Self {
        Self {
            mesh_program: PassProgram::new("shadow_depth", BlendMode::Opaque),
            landscape_program: PassProgram::new("shadow_depth", BlendMode::Opaque)
                .with_define("LANDSCAPE", "1"),
        }
    }
}

impl Default for DirectionalShadowPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass for DirectionalShadowPass {
    fn kind(&self) -> PassKind {
        PassKind::DirectionalShadows
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
        lumen_core::profile_scope!("DirectionalShadowPass");

        let proxy = ctx.proxy;
        let Some(sun) = proxy.sun().filter(|sun| sun.cast_shadows) else {
            return;
        };
        let fixed = ctx.fixed;
        let atlas = &fixed.shadow_atlas;
        // The atlas keeps its first-allocation layer count.
        let layers = atlas.size().depth;
        let count = ctx.settings.shadow_cascades.min(layers);
        let cascades = CascadeUniforms::compute(ctx.camera, sun.direction, count);
        let viewport = Viewport::from_extent(atlas.extent());
        let mesh_program = self.mesh_program.get();
        let landscape_program = self.landscape_program.get();

        ctx.encoder.push_debug_group("DirectionalShadows");
        for cascade in 0..cascades.cascade_count() {
            let view_projection = cascades.view_projections[cascade as usize];
            ctx.encoder.begin_render_pass(
                &format!("Shadow.Cascade{cascade}"),
                &[],
                Some(DepthAttachment::clear(atlas).with_layer(cascade)),
            );
            ctx.encoder.set_viewport(viewport);

            ctx.encoder.bind_program(&mesh_program);
            for mesh in proxy.shadow_casters() {
                if sphere_in_ortho(view_projection, mesh.bounds_center, mesh.bounds_radius) {
                    ctx.draw_mesh(mesh, view_projection);
                }
            }

            let mut landscapes = proxy.landscapes().filter(|l| l.cast_shadows).peekable();
            if landscapes.peek().is_some() {
                ctx.encoder.bind_program(&landscape_program);
                for landscape in landscapes {
                    ctx.draw_landscape(landscape, view_projection);
                }
            }
            ctx.encoder.end_render_pass();
        }
        ctx.encoder.pop_debug_group();
    }
}

/// Conservative test of a world-space sphere against an orthographic volume.
fn sphere_in_ortho(view_projection: Mat4, center: Vec3, radius: f32) -> bool {
    let clip = view_projection.project_point3(center);
    let scale = view_projection.x_axis.truncate().length();
    let margin = 1.0 + radius * scale;
    clip.x.abs() <= margin && clip.y.abs() <= margin
}

/// View-projection of cube face `face` for a light at `position`.
///
/// Faces follow the +X, -X, +Y, -Y, +Z, -Z layer order.
pub fn omni_face_view_projection(position: Vec3, radius: f32, face: u32) -> Mat4 {
    let (forward, up) = match face {
        0 => (Vec3::X, Vec3::NEG_Y),
        1 => (Vec3::NEG_X, Vec3::NEG_Y),
        2 => (Vec3::Y, Vec3::Z),
        3 => (Vec3::NEG_Y, Vec3::NEG_Z),
        4 => (Vec3::Z, Vec3::NEG_Y),
        _ => (Vec3::NEG_Z, Vec3::NEG_Y),
    };
    let view = Mat4::look_at_rh(position, position + forward, up);
    let projection = Mat4::perspective_rh(FRAC_PI_2, 1.0, OMNI_NEAR, radius.max(OMNI_NEAR * 2.0));
    projection * view
}

/// Renders cube shadows for point lights that were given a slot.
#[derive(Debug)]
pub struct OmniShadowPass {
    program: PassProgram,
}

impl OmniShadowPass {
    /// Create the pass.
    pub fn new() -> Self {
        Self {
            program: PassProgram::new("shadow_depth", BlendMode::Opaque).with_define("OMNI", "1"),
        }
    }

    fn render_light(&self, ctx: &mut PassContext<'_>, light: &PointLightProxy, slot: u32) {
        let proxy = ctx.proxy;
        let fixed = ctx.fixed;
        let cubes = &fixed.omni_shadows;
        let face_size = cubes.width();
        let program = self.program.get();

        for face in 0..6 {
            let view_projection = omni_face_view_projection(light.position, light.radius, face);
            ctx.encoder.begin_render_pass(
                &format!("Shadow.Omni{slot}.Face{face}"),
                &[],
                Some(DepthAttachment::clear(cubes).with_layer(slot * 6 + face)),
            );
            ctx.encoder
                .set_viewport(Viewport::from_extent(Extent2d::new(face_size, face_size)));
            ctx.encoder.bind_program(&program);
            for mesh in proxy.shadow_casters() {
                let reach = light.radius + mesh.bounds_radius;
                if mesh.bounds_center.distance_squared(light.position) <= reach * reach {
                    ctx.draw_mesh(mesh, view_projection);
                }
            }
            ctx.encoder.end_render_pass();
        }
    }
}

impl Default for OmniShadowPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass for OmniShadowPass {
    fn kind(&self) -> PassKind {
        PassKind::OmniShadows
    }

    fn initialize_resources(&mut self, device: &Arc<GraphicsDevice>) -> Result<(), GraphicsError> {
        self.program.initialize(device)
    }

    fn release_resources(&mut self) {
        self.program.release();
    }

    fn render(&mut self, ctx: &mut PassContext<'_>) {
        lumen_core::profile_scope!("OmniShadowPass");

        let proxy = ctx.proxy;
        let capacity = ctx.fixed.omni_shadows.size().depth / 6;

        ctx.encoder.push_debug_group("OmniShadows");
        for light in proxy.point_lights() {
            let Some(slot) = light.shadow_slot else {
                continue;
            };
            if slot >= capacity {
                log::warn!(
                    "OmniShadowPass: slot {slot} exceeds the {capacity} cubes allocated at startup"
                );
                continue;
            }
            self.render_light(ctx, light, slot);
        }
        ctx.encoder.pop_debug_group();
    }
}
