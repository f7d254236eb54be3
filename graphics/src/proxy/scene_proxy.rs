//! One frame's snapshot of the scene.

use std::fmt;

use crossbeam_channel::{Receiver, Sender};

use lumen_core::scene::Camera;

use crate::error::fatal;
use crate::light_probe::LightProbeState;
use crate::settings::{RenderSettings, SettingsOverride};
use crate::types::{Extent2d, TextureFormat};

use super::arena::{ArenaProxy, ProxyHandle, RenderProxyArena};
use super::types::{
    CameraProxy, DirectionalLightProxy, IrradianceVolumeProxy, LandscapeProxy, PointLightProxy,
    RectLightProxy, ReflectionProbeProxy, SkyProxy, StaticMeshProxy,
};

/// What a scene proxy is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProxySource {
    /// The player's view.
    #[default]
    MainScene,
    /// An off-screen capture that still runs post-processing.
    SceneCapture,
    /// Reflection probe capture. No post-processing.
    RadianceCapture,
    /// Irradiance probe capture. No post-processing.
    IrradianceCapture,
}

impl ProxySource {
    /// Light-probe captures write HDR radiance and skip post-processing.
    pub fn is_light_probe_capture(self) -> bool {
        matches!(self, Self::RadianceCapture | Self::IrradianceCapture)
    }
}

/// Pixels read back from a frame's final target.
#[derive(Clone, PartialEq)]
pub struct Screenshot {
    /// Frame the pixels belong to.
    pub frame_number: u64,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel format of `pixels`.
    pub format: TextureFormat,
    /// Tightly packed rows.
    pub pixels: Vec<u8>,
}

impl fmt::Debug for Screenshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Screenshot")
            .field("frame_number", &self.frame_number)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Request to read back one frame.
#[derive(Debug, Clone)]
pub struct ScreenshotRequest {
    /// Size of the returned image; the final target's size when `None`.
    pub size: Option<Extent2d>,
    /// Receives the pixels once the frame's GPU work has completed.
    pub reply: Sender<Screenshot>,
}

impl ScreenshotRequest {
    /// Request and the receiver the screenshot will arrive on.
    pub fn new(size: Option<Extent2d>) -> (Self, Receiver<Screenshot>) {
        let (reply, receiver) = crossbeam_channel::bounded(1);
        (Self { size, reply }, receiver)
    }
}

/// Everything the builder needs besides the scene graph itself.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// What the frame is rendered for.
    pub source: ProxySource,
    /// Strictly increasing frame number.
    pub frame_number: u64,
    /// View.
    pub camera: Camera,
    /// Simulation time step in seconds.
    pub delta_time: f32,
    /// Size of the caller's output target.
    pub output_extent: Extent2d,
    /// Settings snapshot taken on the producer side.
    pub settings: RenderSettings,
    /// Per-proxy overrides.
    pub settings_override: Option<SettingsOverride>,
    /// Optional readback.
    pub screenshot: Option<ScreenshotRequest>,
}

impl ProxyRequest {
    /// Main-scene request with default settings.
    pub fn new(frame_number: u64, camera: Camera, output_extent: Extent2d) -> Self {
        Self {
            source: ProxySource::MainScene,
            frame_number,
            camera,
            delta_time: 1.0 / 60.0,
            output_extent,
            settings: RenderSettings::default(),
            settings_override: None,
            screenshot: None,
        }
    }

    /// Set the source kind.
    pub fn with_source(mut self, source: ProxySource) -> Self {
        self.source = source;
        self
    }

    /// Set the settings snapshot.
    pub fn with_settings(mut self, settings: RenderSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Attach an override.
    pub fn with_override(mut self, settings_override: SettingsOverride) -> Self {
        self.settings_override = Some(settings_override);
        self
    }

    /// Attach a screenshot request.
    pub fn with_screenshot(mut self, request: ScreenshotRequest) -> Self {
        self.screenshot = Some(request);
        self
    }

    /// Set the time step.
    pub fn with_delta_time(mut self, delta_time: f32) -> Self {
        self.delta_time = delta_time;
        self
    }
}

/// Append-only list of arena handles.
///
/// Frozen when the owning proxy is finalized; pushing afterwards is fatal.
pub struct ProxyList<T> {
    name: &'static str,
    handles: Vec<ProxyHandle<T>>,
    frozen: bool,
}

impl<T> ProxyList<T> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            handles: Vec::new(),
            frozen: false,
        }
    }

    /// Append a handle.
    ///
    /// # Panics
    ///
    /// Panics if the list is frozen.
    pub fn push(&mut self, handle: ProxyHandle<T>) {
        if self.frozen {
            fatal(
                "ProxyList",
                format_args!("push to frozen list '{}'", self.name),
            );
        }
        self.handles.push(handle);
    }

    /// Handles in insertion order.
    pub fn handles(&self) -> &[ProxyHandle<T>] {
        &self.handles
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Whether the list is frozen.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn freeze(&mut self) {
        self.frozen = true;
    }
}

impl<T> fmt::Debug for ProxyList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyList")
            .field("name", &self.name)
            .field("len", &self.handles.len())
            .field("frozen", &self.frozen)
            .finish()
    }
}

/// Which mesh list a static mesh proxy goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshPass {
    /// Deferred G-buffer path.
    Opaque,
    /// Forward blended path.
    Translucent,
}

/// Number of entries in every proxy list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProxyCounts {
    /// Directional lights.
    pub directional_lights: usize,
    /// Point lights.
    pub point_lights: usize,
    /// Rect lights.
    pub rect_lights: usize,
    /// Opaque meshes.
    pub opaque_meshes: usize,
    /// Translucent meshes.
    pub translucent_meshes: usize,
    /// Shadow-casting meshes.
    pub shadow_casters: usize,
    /// Landscapes.
    pub landscapes: usize,
    /// Reflection probes.
    pub reflection_probes: usize,
    /// Irradiance volumes.
    pub irradiance_volumes: usize,
    /// Whether a sky is present.
    pub has_sky: bool,
}

/// Immutable description of one frame.
///
/// Built on the producer thread, then moved to the render thread. After
/// [`finalize`](Self::finalize) the lists are frozen. The render thread calls
/// [`prepare_view`](Self::prepare_view) exactly once to fill view-space fields;
/// every pass afterwards sees `&SceneProxy`. The arena travels with the proxy
/// and is handed back by [`into_arena`](Self::into_arena) once the frame's
/// work is submitted.
#[derive(Debug)]
pub struct SceneProxy {
    source: ProxySource,
    frame_number: u64,
    delta_time: f32,
    output_extent: Extent2d,
    settings: RenderSettings,
    settings_override: Option<SettingsOverride>,
    screenshot: Option<ScreenshotRequest>,
    readback_fence_value: Option<u64>,

    arena: RenderProxyArena,
    camera: ProxyHandle<CameraProxy>,
    directional_lights: ProxyList<DirectionalLightProxy>,
    point_lights: ProxyList<PointLightProxy>,
    rect_lights: ProxyList<RectLightProxy>,
    opaque_meshes: ProxyList<StaticMeshProxy>,
    translucent_meshes: ProxyList<StaticMeshProxy>,
    shadow_casters: ProxyList<StaticMeshProxy>,
    landscapes: ProxyList<LandscapeProxy>,
    reflection_probes: ProxyList<ReflectionProbeProxy>,
    irradiance_volumes: ProxyList<IrradianceVolumeProxy>,
    sun: Option<ProxyHandle<DirectionalLightProxy>>,
    sky: Option<ProxyHandle<SkyProxy>>,
    light_probes: LightProbeState,

    finalized: bool,
    view_prepared: bool,
}

impl SceneProxy {
    /// Start a proxy backed by `arena`. The arena is reset if it holds data.
    pub fn new(request: ProxyRequest, mut arena: RenderProxyArena) -> Self {
        if arena.used_bytes() > 0 {
            arena.reset();
        }
        let camera = arena.allocate_with(CameraProxy::from_camera(
            &request.camera,
            request.output_extent,
        ));
        // Frame numbers are strictly increasing, so they double as fence values.
        let readback_fence_value = request.screenshot.as_ref().map(|_| request.frame_number);

        Self {
            source: request.source,
            frame_number: request.frame_number,
            delta_time: request.delta_time,
            output_extent: request.output_extent,
            settings: request.settings,
            settings_override: request.settings_override,
            screenshot: request.screenshot,
            readback_fence_value,
            arena,
            camera,
            directional_lights: ProxyList::new("directional_lights"),
            point_lights: ProxyList::new("point_lights"),
            rect_lights: ProxyList::new("rect_lights"),
            opaque_meshes: ProxyList::new("opaque_meshes"),
            translucent_meshes: ProxyList::new("translucent_meshes"),
            shadow_casters: ProxyList::new("shadow_casters"),
            landscapes: ProxyList::new("landscapes"),
            reflection_probes: ProxyList::new("reflection_probes"),
            irradiance_volumes: ProxyList::new("irradiance_volumes"),
            sun: None,
            sky: None,
            light_probes: LightProbeState::default(),
            finalized: false,
            view_prepared: false,
        }
    }

    fn assert_building(&self, what: &str) {
        if self.finalized {
            fatal(
                "SceneProxy",
                format_args!("{what} after finalize (frame {})", self.frame_number),
            );
        }
    }

    // ---- construction -------------------------------------------------

    /// Append a directional light.
    pub fn push_directional_light(
        &mut self,
        light: DirectionalLightProxy,
    ) -> ProxyHandle<DirectionalLightProxy> {
        self.assert_building("push_directional_light");
        let handle = self.arena.allocate_with(light);
        self.directional_lights.push(handle);
        handle
    }

    /// Append a point light.
    pub fn push_point_light(&mut self, light: PointLightProxy) -> ProxyHandle<PointLightProxy> {
        self.assert_building("push_point_light");
        let handle = self.arena.allocate_with(light);
        self.point_lights.push(handle);
        handle
    }

    /// Append a rect light.
    pub fn push_rect_light(&mut self, light: RectLightProxy) -> ProxyHandle<RectLightProxy> {
        self.assert_building("push_rect_light");
        let handle = self.arena.allocate_with(light);
        self.rect_lights.push(handle);
        handle
    }

    /// Append a static mesh to the opaque or translucent list, and to the
    /// shadow casters if it casts shadows.
    pub fn push_static_mesh(
        &mut self,
        mesh: StaticMeshProxy,
        pass: MeshPass,
    ) -> ProxyHandle<StaticMeshProxy> {
        self.assert_building("push_static_mesh");
        let handle = self.arena.allocate_with(mesh);
        match pass {
            MeshPass::Opaque => self.opaque_meshes.push(handle),
            MeshPass::Translucent => self.translucent_meshes.push(handle),
        }
        if mesh.cast_shadows {
            self.shadow_casters.push(handle);
        }
        handle
    }

    /// Append a landscape.
    pub fn push_landscape(&mut self, landscape: LandscapeProxy) -> ProxyHandle<LandscapeProxy> {
        self.assert_building("push_landscape");
        let handle = self.arena.allocate_with(landscape);
        self.landscapes.push(handle);
        handle
    }

    /// Append a reflection probe.
    pub fn push_reflection_probe(
        &mut self,
        probe: ReflectionProbeProxy,
    ) -> ProxyHandle<ReflectionProbeProxy> {
        self.assert_building("push_reflection_probe");
        let handle = self.arena.allocate_with(probe);
        self.reflection_probes.push(handle);
        handle
    }

    /// Append an irradiance volume.
    pub fn push_irradiance_volume(
        &mut self,
        volume: IrradianceVolumeProxy,
    ) -> ProxyHandle<IrradianceVolumeProxy> {
        self.assert_building("push_irradiance_volume");
        let handle = self.arena.allocate_with(volume);
        self.irradiance_volumes.push(handle);
        handle
    }

    /// Set the sky. Returns `false` and keeps the existing sky if one is set.
    pub fn set_sky(&mut self, sky: SkyProxy) -> bool {
        self.assert_building("set_sky");
        if self.sky.is_some() {
            return false;
        }
        self.sky = Some(self.arena.allocate_with(sky));
        true
    }

    /// Pick the sun: the first light flagged `primary`, otherwise the
    /// brightest directional light. Earlier lights win ties.
    pub fn resolve_sun(&mut self) {
        self.assert_building("resolve_sun");
        let arena = &self.arena;
        let handles = self.directional_lights.handles();
        let primary = handles.iter().copied().find(|h| arena.get(*h).primary);
        self.sun = primary.or_else(|| {
            handles.iter().copied().fold(None, |best, h| match best {
                Some(b) if arena.get(b).intensity >= arena.get(h).intensity => Some(b),
                _ => Some(h),
            })
        });
    }

    pub(crate) fn probe_lists_mut(
        &mut self,
    ) -> (
        &ProxyList<ReflectionProbeProxy>,
        &ProxyList<IrradianceVolumeProxy>,
        &mut RenderProxyArena,
    ) {
        self.assert_building("light probe resolve");
        (
            &self.reflection_probes,
            &self.irradiance_volumes,
            &mut self.arena,
        )
    }

    pub(crate) fn set_light_probe_state(&mut self, state: LightProbeState) {
        self.assert_building("set_light_probe_state");
        self.light_probes = state;
    }

    /// Freeze every list. The proxy is read-only from here on, except for
    /// [`prepare_view`](Self::prepare_view).
    pub fn finalize(&mut self) {
        self.assert_building("finalize");
        self.directional_lights.freeze();
        self.point_lights.freeze();
        self.rect_lights.freeze();
        self.opaque_meshes.freeze();
        self.translucent_meshes.freeze();
        self.shadow_casters.freeze();
        self.landscapes.freeze();
        self.reflection_probes.freeze();
        self.irradiance_volumes.freeze();
        self.finalized = true;
    }

    /// Whether [`finalize`](Self::finalize) ran.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    // ---- view preparation ----------------------------------------------

    /// Compute view-space light data, mesh sort depths and omni shadow slots.
    ///
    /// # Panics
    ///
    /// Panics if the proxy is not finalized or if called a second time.
    pub fn prepare_view(&mut self, settings: &RenderSettings) {
        if !self.finalized {
            fatal(
                "SceneProxy",
                format_args!("prepare_view before finalize (frame {})", self.frame_number),
            );
        }
        if self.view_prepared {
            fatal(
                "SceneProxy",
                format_args!("prepare_view called twice (frame {})", self.frame_number),
            );
        }

        let view = self.arena.get(self.camera).view;

        for &handle in self.directional_lights.handles() {
            let light = self.arena.get_mut(handle);
            light.view_direction = view.transform_vector3(light.direction).normalize_or_zero();
        }

        let mut next_slot = 0;
        for &handle in self.point_lights.handles() {
            let light = self.arena.get_mut(handle);
            light.view_position = view.transform_point3(light.position);
            light.shadow_slot = if settings.shadows
                && light.cast_shadows
                && next_slot < settings.max_omni_shadows
            {
                next_slot += 1;
                Some(next_slot - 1)
            } else {
                None
            };
        }

        for &handle in self.rect_lights.handles() {
            let light = self.arena.get_mut(handle);
            light.view_position = view.transform_point3(light.position);
            light.view_normal = view.transform_vector3(light.normal).normalize_or_zero();
        }

        for &handle in self
            .opaque_meshes
            .handles()
            .iter()
            .chain(self.translucent_meshes.handles())
        {
            let mesh = self.arena.get_mut(handle);
            mesh.view_depth = -view.transform_point3(mesh.bounds_center).z;
        }

        self.view_prepared = true;
    }

    /// Whether [`prepare_view`](Self::prepare_view) ran.
    pub fn is_view_prepared(&self) -> bool {
        self.view_prepared
    }

    // ---- read access -----------------------------------------------------

    /// Source kind.
    pub fn source(&self) -> ProxySource {
        self.source
    }

    /// Frame number.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Time step.
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Requested output size.
    pub fn output_extent(&self) -> Extent2d {
        self.output_extent
    }

    /// Settings snapshot taken by the producer.
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Per-proxy override, if any.
    pub fn settings_override(&self) -> Option<&SettingsOverride> {
        self.settings_override.as_ref()
    }

    /// Snapshot with the override applied.
    pub fn effective_settings(&self) -> RenderSettings {
        match &self.settings_override {
            Some(o) => self.settings.with_override(o),
            None => self.settings,
        }
    }

    /// Pending screenshot request.
    pub fn screenshot_request(&self) -> Option<&ScreenshotRequest> {
        self.screenshot.as_ref()
    }

    /// Fence value the readback waits for, set when a screenshot is requested.
    pub fn readback_fence_value(&self) -> Option<u64> {
        self.readback_fence_value
    }

    /// Camera.
    pub fn camera(&self) -> &CameraProxy {
        self.arena.get(self.camera)
    }

    /// Resolve a handle allocated for this proxy.
    pub fn get<T: ArenaProxy>(&self, handle: ProxyHandle<T>) -> &T {
        self.arena.get(handle)
    }

    fn iter<'a, T: ArenaProxy>(&'a self, list: &'a ProxyList<T>) -> impl Iterator<Item = &'a T> + 'a {
        list.handles().iter().map(move |h| self.arena.get(*h))
    }

    /// Directional lights.
    pub fn directional_lights(&self) -> impl Iterator<Item = &DirectionalLightProxy> {
        self.iter(&self.directional_lights)
    }

    /// Point lights.
    pub fn point_lights(&self) -> impl Iterator<Item = &PointLightProxy> {
        self.iter(&self.point_lights)
    }

    /// Rect lights.
    pub fn rect_lights(&self) -> impl Iterator<Item = &RectLightProxy> {
        self.iter(&self.rect_lights)
    }

    /// Opaque meshes.
    pub fn opaque_meshes(&self) -> impl Iterator<Item = &StaticMeshProxy> {
        self.iter(&self.opaque_meshes)
    }

    /// Translucent meshes, in insertion order.
    pub fn translucent_meshes(&self) -> impl Iterator<Item = &StaticMeshProxy> {
        self.iter(&self.translucent_meshes)
    }

    /// Meshes that cast shadows.
    pub fn shadow_casters(&self) -> impl Iterator<Item = &StaticMeshProxy> {
        self.iter(&self.shadow_casters)
    }

    /// Landscapes.
    pub fn landscapes(&self) -> impl Iterator<Item = &LandscapeProxy> {
        self.iter(&self.landscapes)
    }

    /// Reflection probes, including ones without an atlas tile.
    pub fn reflection_probes(&self) -> impl Iterator<Item = &ReflectionProbeProxy> {
        self.iter(&self.reflection_probes)
    }

    /// Irradiance volumes, including ones without atlas tiles.
    pub fn irradiance_volumes(&self) -> impl Iterator<Item = &IrradianceVolumeProxy> {
        self.iter(&self.irradiance_volumes)
    }

    /// The sun, if any directional light exists.
    pub fn sun(&self) -> Option<&DirectionalLightProxy> {
        self.sun.map(|h| self.arena.get(h))
    }

    /// The sky.
    pub fn sky(&self) -> Option<&SkyProxy> {
        self.sky.map(|h| self.arena.get(h))
    }

    /// Light-probe summary.
    pub fn light_probes(&self) -> &LightProbeState {
        &self.light_probes
    }

    /// List sizes.
    pub fn counts(&self) -> ProxyCounts {
        ProxyCounts {
            directional_lights: self.directional_lights.len(),
            point_lights: self.point_lights.len(),
            rect_lights: self.rect_lights.len(),
            opaque_meshes: self.opaque_meshes.len(),
            translucent_meshes: self.translucent_meshes.len(),
            shadow_casters: self.shadow_casters.len(),
            landscapes: self.landscapes.len(),
            reflection_probes: self.reflection_probes.len(),
            irradiance_volumes: self.irradiance_volumes.len(),
            has_sky: self.sky.is_some(),
        }
    }

    /// Whether any directional or point light requests shadows.
    pub fn has_shadow_casting_lights(&self) -> bool {
        self.directional_lights().any(|l| l.cast_shadows)
            || self.point_lights().any(|l| l.cast_shadows)
    }

    /// Backing arena.
    pub fn arena(&self) -> &RenderProxyArena {
        &self.arena
    }

    /// Give up the proxy and return its arena for recycling.
    pub fn into_arena(self) -> RenderProxyArena {
        self.arena
    }
}

static_assertions::assert_impl_all!(SceneProxy: Send);

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    fn proxy() -> SceneProxy {
        let camera = Camera::look_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        SceneProxy::new(
            ProxyRequest::new(1, camera, Extent2d::new(640, 360)),
            RenderProxyArena::new(64 * 1024),
        )
    }

    #[test]
    fn test_sun_prefers_primary() {
        let mut p = proxy();
        p.push_directional_light(DirectionalLightProxy {
            intensity: 10.0,
            ..Default::default()
        });
        p.push_directional_light(DirectionalLightProxy {
            intensity: 2.0,
            primary: true,
            ..Default::default()
        });
        p.resolve_sun();
        assert_eq!(p.sun().unwrap().intensity, 2.0);
    }

    #[test]
    fn test_sun_falls_back_to_brightest() {
        let mut p = proxy();
        for intensity in [1.0, 5.0, 3.0, 5.0] {
            p.push_directional_light(DirectionalLightProxy {
                intensity,
                owner: intensity as u64,
                ..Default::default()
            });
        }
        p.resolve_sun();
        assert_eq!(p.sun().unwrap().intensity, 5.0);
        assert_eq!(p.sun().unwrap().owner, 5);
    }

    #[test]
    fn test_no_sun_without_lights() {
        let mut p = proxy();
        p.resolve_sun();
        assert!(p.sun().is_none());
    }

    #[test]
    fn test_single_sky() {
        let mut p = proxy();
        assert!(p.set_sky(SkyProxy::default()));
        assert!(!p.set_sky(SkyProxy::default()));
        assert!(p.counts().has_sky);
    }

    #[test]
    fn test_shadow_casters_share_handles() {
        let mut p = proxy();
        let handle = p.push_static_mesh(
            StaticMeshProxy {
                cast_shadows: true,
                ..Default::default()
            },
            MeshPass::Opaque,
        );
        p.push_static_mesh(StaticMeshProxy::default(), MeshPass::Translucent);
        let counts = p.counts();
        assert_eq!(counts.opaque_meshes, 1);
        assert_eq!(counts.translucent_meshes, 1);
        assert_eq!(counts.shadow_casters, 1);
        assert_eq!(p.shadow_casters.handles()[0], handle);
    }

    #[test]
    #[should_panic(expected = "after finalize")]
    fn test_push_after_finalize_panics() {
        let mut p = proxy();
        p.finalize();
        p.push_point_light(PointLightProxy::default());
    }

    #[test]
    fn test_prepare_view_fills_view_space() {
        let mut p = proxy();
        p.push_point_light(PointLightProxy {
            position: Vec3::ZERO,
            cast_shadows: true,
            ..Default::default()
        });
        p.push_point_light(PointLightProxy {
            cast_shadows: true,
            ..Default::default()
        });
        p.push_static_mesh(StaticMeshProxy::default(), MeshPass::Opaque);
        p.finalize();

        let settings = RenderSettings {
            max_omni_shadows: 1,
            ..RenderSettings::default()
        };
        p.prepare_view(&settings);

        let lights: Vec<_> = p.point_lights().collect();
        assert!((lights[0].view_position.z + 10.0).abs() < 1e-4);
        assert_eq!(lights[0].shadow_slot, Some(0));
        assert_eq!(lights[1].shadow_slot, None);
        assert!((p.opaque_meshes().next().unwrap().view_depth - 10.0).abs() < 1e-4);
    }

    #[test]
    #[should_panic(expected = "prepare_view called twice")]
    fn test_prepare_view_twice_panics() {
        let mut p = proxy();
        p.finalize();
        p.prepare_view(&RenderSettings::default());
        p.prepare_view(&RenderSettings::default());
    }

    #[test]
    fn test_readback_fence_value_follows_request() {
        let camera = Camera::default();
        let (request, _rx) = ScreenshotRequest::new(None);
        let p = SceneProxy::new(
            ProxyRequest::new(42, camera, Extent2d::new(8, 8)).with_screenshot(request),
            RenderProxyArena::new(4096),
        );
        assert_eq!(p.readback_fence_value(), Some(42));
        assert_eq!(proxy().readback_fence_value(), None);
    }
}
