//! Direct lighting and emissive resolve into the lighting accumulation target.
//!
//! Everything here blends additively; [`clear_lighting`] runs first every
//! frame regardless of which lighting features are enabled.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use crate::commands::{ColorAttachment, UniformSlot};
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::types::{BlendMode, Extent2d, ScissorRect, Viewport};

use super::shadows::CascadeUniforms;
use super::{PassContext, PassKind, PassProgram, RenderPass};

/// Clear the lighting accumulation target to black.
pub fn clear_lighting(ctx: &mut PassContext<'_>) {
    let targets = ctx.targets;
    ctx.encoder.begin_render_pass(
        "ClearLighting",
        &[ColorAttachment::clear(&targets.lighting, [0.0; 4])],
        None,
    );
    ctx.encoder.end_render_pass();
}

/// Pixel rectangle covering a world-space sphere, clipped to `extent`.
///
/// Returns the full target when the sphere straddles the camera plane and
/// `None` when it projects entirely off screen.
///
/// # Example
///
/// ```
/// use glam::{Mat4, Vec3};
/// use lumen_graphics::passes::light_scissor;
/// use lumen_graphics::types::Extent2d;
///
/// let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
/// let projection = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
/// let extent = Extent2d::new(100, 100);
///
/// let centered = light_scissor(projection * view, Vec3::ZERO, 1.0, extent).unwrap();
/// assert!(centered.width < 100);
///
/// assert!(light_scissor(projection * view, Vec3::new(500.0, 0.0, 0.0), 1.0, extent).is_none());
/// ```
pub fn light_scissor(
    view_projection: Mat4,
    center: Vec3,
    radius: f32,
    extent: Extent2d,
) -> Option<ScissorRect> {
    let full = ScissorRect::new(0, 0, extent.width, extent.height);
    let mut min = glam::Vec2::splat(f32::MAX);
    let mut max = glam::Vec2::splat(f32::MIN);

    for i in 0..8 {
        let offset = Vec3::new(
            if i & 1 == 0 { -radius } else { radius },
            if i & 2 == 0 { -radius } else { radius },
            if i & 4 == 0 { -radius } else { radius },
        );
        let clip = view_projection * (center + offset).extend(1.0);
        if clip.w <= 1e-5 {
            return Some(full);
        }
        let ndc = clip.truncate() / clip.w;
        let pixel = glam::Vec2::new(
            (ndc.x * 0.5 + 0.5) * extent.width as f32,
            (0.5 - ndc.y * 0.5) * extent.height as f32,
        );
        min = min.min(pixel);
        max = max.max(pixel);
    }

    let size = glam::Vec2::new(extent.width as f32, extent.height as f32);
    let min = min.clamp(glam::Vec2::ZERO, size).floor();
    let max = max.clamp(glam::Vec2::ZERO, size).ceil();
    if max.x <= min.x || max.y <= min.y {
        return None;
    }
    Some(ScissorRect::new(
        min.x as u32,
        min.y as u32,
        (max.x - min.x) as u32,
        (max.y - min.y) as u32,
    ))
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DirectionalUniforms {
    /// View-space direction, shadowed flag in `w`.
    direction: Vec4,
    /// Color times intensity.
    radiance: Vec4,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct PointUniforms {
    /// View-space position, radius in `w`.
    position_radius: Vec4,
    /// Color times intensity, shadow slot in `w` (negative when unshadowed).
    radiance_slot: Vec4,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct RectUniforms {
    /// View-space center, range in `w`.
    position_range: Vec4,
    /// View-space normal, two-sided flag in `w`.
    normal: Vec4,
    /// World-space half axes.
    right: Vec4,
    up: Vec4,
    /// Color times intensity.
    radiance: Vec4,
}

/// Per-frame counts, for tests and tooling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LightingStats {
    /// Directional draws.
    pub directional: u32,
    /// Point light draws.
    pub point: u32,
    /// Rect light draws.
    pub rect: u32,
    /// Lights skipped because their bounds were off screen.
    pub culled: u32,
}

/// Analytic lights: directional, then point, then rect.
///
/// Directional lights cover the screen; local lights are scissored to the
/// screen rectangle of their influence sphere.
#[derive(Debug)]
pub struct DirectLightingPass {
    directional: PassProgram,
    point: PassProgram,
    rect: PassProgram,
    stats: LightingStats,
}

impl DirectLightingPass {
    /// Create the pass.
    pub fn new() -> Self {
        Self {
            directional: PassProgram::new("light_directional", BlendMode::Additive),
            point: PassProgram::new("light_point", BlendMode::Additive),
            rect: PassProgram::new("light_rect", BlendMode::Additive),
            stats: LightingStats::default(),
        }
    }

    /// Counts from the last rendered frame.
    pub fn last_stats(&self) -> LightingStats {
        self.stats
    }

    fn bind_gbuffer(ctx: &mut PassContext<'_>) {
        let targets = ctx.targets;
        ctx.encoder.bind_texture(0, &targets.gbuffer_albedo);
        ctx.encoder.bind_texture(1, &targets.gbuffer_normal);
        ctx.encoder.bind_texture(2, &targets.gbuffer_material);
        ctx.encoder.bind_texture(3, &targets.scene_depth);
        ctx.encoder.bind_texture(4, &targets.ssao);
    }
}

impl Default for DirectLightingPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass for DirectLightingPass {
    fn kind(&self) -> PassKind {
        PassKind::DirectLighting
    }

    fn initialize_resources(&mut self, device: &Arc<GraphicsDevice>) -> Result<(), GraphicsError> {
        self.directional.initialize(device)?;
        self.point.initialize(device)?;
        self.rect.initialize(device)
    }

    fn release_resources(&mut self) {
        self.directional.release();
        self.point.release();
        self.rect.release();
    }

    fn render(&mut self, ctx: &mut PassContext<'_>) {
        lumen_core::profile_scope!("DirectLightingPass");

        let proxy = ctx.proxy;
        let targets = ctx.targets;
        let fixed = ctx.fixed;
        let camera = ctx.camera;
        let extent = targets.resolution.internal;
        let shadows = ctx.settings.shadows;
        self.stats = LightingStats::default();

        ctx.encoder.begin_render_pass(
            "DirectLighting",
            &[ColorAttachment::load(&targets.lighting)],
            None,
        );
        ctx.encoder.set_viewport(Viewport::from_extent(extent));

        let sun_owner = proxy.sun().map(|sun| sun.owner);
        let mut directional = proxy.directional_lights().peekable();
        if directional.peek().is_some() {
            ctx.encoder.bind_program(&self.directional.get());
            ctx.bind_view();
            Self::bind_gbuffer(ctx);
            ctx.encoder.bind_texture(5, &fixed.shadow_atlas);
            for light in directional {
                let shadowed = shadows && light.cast_shadows && Some(light.owner) == sun_owner;
                if shadowed {
                    let layers = fixed.shadow_atlas.size().depth;
                    let cascades = CascadeUniforms::compute(
                        camera,
                        light.direction,
                        ctx.settings.shadow_cascades.min(layers),
                    );
                    ctx.encoder.set_uniforms(UniformSlot::Pass, &cascades);
                }
                let params = DirectionalUniforms {
                    direction: light.view_direction.extend(f32::from(u8::from(shadowed))),
                    radiance: (light.color * light.intensity).extend(1.0),
                };
                ctx.encoder.set_uniforms(UniformSlot::Object, &params);
                ctx.encoder.draw_fullscreen();
                self.stats.directional += 1;
            }
        }

        let mut points = proxy.point_lights().peekable();
        if points.peek().is_some() {
            ctx.encoder.bind_program(&self.point.get());
            ctx.bind_view();
            Self::bind_gbuffer(ctx);
            ctx.encoder.bind_texture(5, &fixed.omni_shadows);
            for light in points {
                let Some(scissor) =
                    light_scissor(camera.view_projection, light.position, light.radius, extent)
                else {
                    self.stats.culled += 1;
                    continue;
                };
                let slot = light.shadow_slot.map_or(-1.0, |slot| slot as f32);
                let params = PointUniforms {
                    position_radius: light.view_position.extend(light.radius),
                    radiance_slot: (light.color * light.intensity).extend(slot),
                };
                ctx.encoder.set_scissor(Some(scissor));
                ctx.encoder.set_uniforms(UniformSlot::Object, &params);
                ctx.encoder.draw_fullscreen();
                self.stats.point += 1;
            }
            ctx.encoder.set_scissor(None);
        }

        let mut rects = proxy.rect_lights().peekable();
        if rects.peek().is_some() {
            ctx.encoder.bind_program(&self.rect.get());
            ctx.bind_view();
            Self::bind_gbuffer(ctx);
            for light in rects {
                let reach = light.range + light.size.length() * 0.5;
                let Some(scissor) =
                    light_scissor(camera.view_projection, light.position, reach, extent)
                else {
                    self.stats.culled += 1;
                    continue;
                };
                let params = RectUniforms {
                    position_range: light.view_position.extend(light.range),
                    normal: light.view_normal.extend(f32::from(u8::from(light.two_sided))),
                    right: light.right.extend(0.0),
                    up: light.up.extend(0.0),
                    radiance: (light.color * light.intensity).extend(1.0),
                };
                ctx.encoder.set_scissor(Some(scissor));
                ctx.encoder.set_uniforms(UniformSlot::Object, &params);
                ctx.encoder.draw_fullscreen();
                self.stats.rect += 1;
            }
            ctx.encoder.set_scissor(None);
        }

        ctx.encoder.end_render_pass();
        log::trace!("DirectLightingPass: {:?}", self.stats);
    }
}

/// Adds G-buffer emissive radiance to lighting.
#[derive(Debug)]
pub struct EmissiveResolvePass {
    program: PassProgram,
}

impl EmissiveResolvePass {
    /// Create the pass.
    pub fn new() -> Self {
        Self {
            program: PassProgram::new("emissive_resolve", BlendMode::Additive),
        }
    }
}

impl Default for EmissiveResolvePass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass for EmissiveResolvePass {
    fn kind(&self) -> PassKind {
        PassKind::Emissive
    }

    fn initialize_resources(&mut self, device: &Arc<GraphicsDevice>) -> Result<(), GraphicsError> {
        self.program.initialize(device)
    }

    fn release_resources(&mut self) {
        self.program.release();
    }

    fn render(&mut self, ctx: &mut PassContext<'_>) {
        lumen_core::profile_scope!("EmissiveResolvePass");

        let targets = ctx.targets;
        ctx.fullscreen(
            "Emissive",
            &self.program.get(),
            &targets.lighting,
            None,
            &[&targets.gbuffer_emissive],
            &[],
        );
    }
}
