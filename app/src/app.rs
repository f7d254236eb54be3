//! The headless frame loop.
//!
//! The main thread plays the game thread: each frame it snapshots the world
//! into a [`SceneProxy`](lumen_graphics::SceneProxy) and hands it to the
//! [`FramePipeline`]. Completed frames come back with their arenas, which are
//! recycled for later proxies.
//!
//! ```text
//!   main thread                          render thread
//!   -----------                          -------------
//!   cvars -> RenderSettings
//!   world.build_scene_proxy(arena) --->  SceneRenderer::render
//!   poll_completed / recycle       <---  FrameCompletion { report, arena }
//!   save screenshot (PNG)
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::Receiver;

use lumen_core::cvars::{CVarValue, ConsoleVariables};
use lumen_core::scene::World;
use lumen_graphics::{
    BuildSceneProxy, DeviceCapabilities, DummyBackend, FrameCompletion, FramePipeline,
    GraphicsDevice, LightProbeSystem, PipelineConfig, ProxyRequest, RenderSettings, Screenshot,
    ScreenshotRequest, TextureFormat,
};

use crate::args::AppArgs;
use crate::error::AppError;
use crate::scene;

/// Fixed simulation step.
const DELTA_TIME: f32 = 1.0 / 60.0;

/// Totals of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Frames that completed on the render thread.
    pub frames_rendered: u64,
    /// Frames whose render targets were rebuilt.
    pub reallocations: u64,
    /// Draw commands over all frames.
    pub draws: u64,
    /// Commands over all frames.
    pub commands: u64,
    /// Device submissions.
    pub submissions: u64,
    /// Arenas the pool had to create.
    pub arenas_created: usize,
    /// Where the screenshot was written.
    pub screenshot: Option<PathBuf>,
}

struct PendingScreenshot {
    frame: u64,
    path: PathBuf,
    receiver: Receiver<Screenshot>,
}

/// Register the renderer's console variables, then apply the `--cvars` file
/// and every `--set` assignment in order.
///
/// # Errors
///
/// Fails if the file cannot be read or parsed, or if an assignment names an
/// unknown variable or has the wrong type.
pub fn load_cvars(args: &AppArgs) -> Result<ConsoleVariables, AppError> {
    let mut cvars = ConsoleVariables::new();
    RenderSettings::register_cvars(&mut cvars)?;

    if let Some(path) = &args.cvars {
        let source = std::fs::read_to_string(path).map_err(|source| AppError::Io {
            path: path.clone(),
            source,
        })?;
        let applied = cvars.load_toml_str(&source)?;
        log::info!("Loaded {applied} console variables from {}", path.display());
    }
    for assignment in &args.sets {
        apply_assignment(&mut cvars, assignment)?;
    }
    Ok(cvars)
}

/// Apply one `name=value` assignment.
///
/// The value is read as a bool, then an integer, then a float, and falls back
/// to a string.
///
/// # Errors
///
/// Fails on a missing `=`, an unknown name or a type mismatch.
pub fn apply_assignment(cvars: &mut ConsoleVariables, assignment: &str) -> Result<(), AppError> {
    let (name, value) = assignment
        .split_once('=')
        .ok_or_else(|| AppError::Assignment(assignment.to_string()))?;
    let (name, value) = (name.trim(), value.trim());
    if name.is_empty() {
        return Err(AppError::Assignment(assignment.to_string()));
    }

    let value = if let Ok(v) = value.parse::<bool>() {
        CVarValue::Bool(v)
    } else if let Ok(v) = value.parse::<i64>() {
        CVarValue::Int(v)
    } else if let Ok(v) = value.parse::<f64>() {
        CVarValue::Float(v)
    } else {
        CVarValue::Str(value.to_string())
    };
    cvars.set(name, value)?;
    Ok(())
}

/// Write an RGBA8 screenshot as PNG.
///
/// # Errors
///
/// Fails for non-RGBA8 formats, for pixel data that does not match the size,
/// or if the file cannot be written.
pub fn save_screenshot(screenshot: Screenshot, path: &Path) -> Result<(), AppError> {
    if !matches!(
        screenshot.format,
        TextureFormat::Rgba8Unorm | TextureFormat::Rgba8UnormSrgb
    ) {
        return Err(AppError::UnsupportedFormat(screenshot.format));
    }
    let (width, height, len) = (screenshot.width, screenshot.height, screenshot.pixels.len());
    let image = image::RgbaImage::from_raw(width, height, screenshot.pixels)
        .ok_or(AppError::MalformedScreenshot { width, height, len })?;
    image.save(path).map_err(|source| AppError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!(
        "Saved frame {} screenshot ({width}x{height}) to {}",
        screenshot.frame_number,
        path.display()
    );
    Ok(())
}

/// Drives the producer side of the pipeline for a fixed number of frames.
pub struct App {
    args: AppArgs,
    cvars: ConsoleVariables,
    settings_revision: Option<u64>,
    settings: RenderSettings,
    world: World,
    probes: LightProbeSystem,
    pipeline: FramePipeline,
    backend: Arc<DummyBackend>,
    screenshot: Option<PendingScreenshot>,
    stats: RunStats,
}

impl App {
    /// Create the device, start the render thread and load the demo scene.
    ///
    /// # Errors
    ///
    /// Fails if console variables cannot be loaded or the pipeline or demo
    /// assets cannot be created.
    pub fn new(args: AppArgs) -> Result<Self, AppError> {
        let cvars = load_cvars(&args)?;

        let backend = Arc::new(DummyBackend::quiet());
        let device = GraphicsDevice::new(backend.clone(), DeviceCapabilities::default());
        let config = PipelineConfig {
            frames_in_flight: args.frames_in_flight,
            ..Default::default()
        };
        let probes = LightProbeSystem::new(config.renderer.light_probes);
        let pipeline = FramePipeline::spawn(Arc::clone(&device), config)?;
        scene::upload_assets(&device, pipeline.assets())?;

        Ok(Self {
            args,
            cvars,
            settings_revision: None,
            settings: RenderSettings::default(),
            world: scene::build_world(),
            probes,
            pipeline,
            backend,
            screenshot: None,
            stats: RunStats::default(),
        })
    }

    /// Console variables, for changes between frames.
    pub fn cvars_mut(&mut self) -> &mut ConsoleVariables {
        &mut self.cvars
    }

    /// Render every frame, wait for the render thread and shut it down.
    ///
    /// # Errors
    ///
    /// Fails if the requested screenshot cannot be written.
    pub fn run(mut self) -> Result<RunStats, AppError> {
        let frames = self.args.frames;
        log::info!(
            "Rendering {frames} frames at {} ({} in flight)",
            self.args.size,
            self.pipeline.frames_in_flight()
        );

        for frame in 1..=frames {
            self.submit_frame(frame);
            for completion in self.pipeline.poll_completed() {
                self.complete(completion)?;
            }
        }

        if frames > 0 {
            for completion in self.pipeline.wait_for_frame(frames) {
                self.complete(completion)?;
            }
        }
        for completion in self.pipeline.shutdown() {
            self.complete(completion)?;
        }

        if let Some(pending) = self.screenshot.take() {
            return Err(AppError::ScreenshotMissing(pending.frame));
        }

        self.stats.submissions = self.backend.submission_count();
        self.stats.arenas_created = self.pipeline.arena_pool().created_count();
        log::info!(
            "Done: {} frames, {} target reallocations, {} draws, {} arenas",
            self.stats.frames_rendered,
            self.stats.reallocations,
            self.stats.draws,
            self.stats.arenas_created
        );
        Ok(self.stats)
    }

    fn current_settings(&mut self) -> RenderSettings {
        let revision = self.cvars.revision();
        if self.settings_revision != Some(revision) {
            self.settings = RenderSettings::from_cvars(&self.cvars);
            self.settings_revision = Some(revision);
            log::debug!("Render settings refreshed at cvar revision {revision}");
        }
        self.settings
    }

    fn submit_frame(&mut self, frame: u64) {
        lumen_core::profile_function!();

        let extent = self.args.size_at(frame);
        let mut request = ProxyRequest::new(frame, scene::orbit_camera(frame), extent)
            .with_settings(self.current_settings())
            .with_delta_time(DELTA_TIME);

        if self.args.screenshot_target() == Some(frame)
            && let Some(path) = self.args.screenshot.clone()
        {
            let (screenshot, receiver) = ScreenshotRequest::new(self.args.screenshot_size);
            request = request.with_screenshot(screenshot);
            self.screenshot = Some(PendingScreenshot {
                frame,
                path,
                receiver,
            });
        }

        let arena = self.pipeline.acquire_arena();
        let proxy = self.world.build_scene_proxy(
            request,
            arena,
            &mut self.probes,
            self.pipeline.assets(),
        );
        self.pipeline.submit(proxy);
    }

    fn complete(&mut self, completion: FrameCompletion) -> Result<(), AppError> {
        let frame = completion.frame_number;
        let report = self.pipeline.recycle(completion);

        self.stats.frames_rendered += 1;
        self.stats.draws += report.draw_count as u64;
        self.stats.commands += report.command_count as u64;
        if report.targets_reallocated {
            self.stats.reallocations += 1;
            log::info!(
                "Frame {frame}: render targets now {} (internal {})",
                report.resolution.output,
                report.resolution.internal
            );
        }
        log::debug!(
            "Frame {frame}: {} passes, {} draws, post {:?}",
            report.passes.len(),
            report.draw_count,
            report.post_stages()
        );

        if let Some(pending) = self.screenshot.take_if(|pending| pending.frame == frame) {
            let screenshot = pending
                .receiver
                .try_recv()
                .map_err(|_| AppError::ScreenshotMissing(frame))?;
            save_screenshot(screenshot, &pending.path)?;
            self.stats.screenshot = Some(pending.path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("r.Bloom=false", "r.Bloom", CVarValue::Bool(false))]
    #[case("r.ResolutionScale = 50", "r.ResolutionScale", CVarValue::Int(50))]
    #[case("r.Exposure=2", "r.Exposure", CVarValue::Float(2.0))]
    #[case("r.Exposure=0.5", "r.Exposure", CVarValue::Float(0.5))]
    fn test_apply_assignment(
        #[case] assignment: &str,
        #[case] name: &str,
        #[case] expected: CVarValue,
    ) {
        let mut cvars = load_cvars(&AppArgs::default()).unwrap();
        apply_assignment(&mut cvars, assignment).unwrap();
        assert_eq!(cvars.get(name).map(|v| v.value().clone()), Some(expected));
    }

    #[rstest]
    #[case("r.Bloom")]
    #[case("=1")]
    #[case("r.Unknown=1")]
    #[case("r.Bloom=yes")]
    fn test_apply_assignment_rejects(#[case] assignment: &str) {
        let mut cvars = load_cvars(&AppArgs::default()).unwrap();
        assert!(apply_assignment(&mut cvars, assignment).is_err());
    }

    #[test]
    fn test_sets_reach_render_settings() {
        let args = AppArgs {
            sets: vec!["r.ResolutionScale=50".into(), "r.SSAO=false".into()],
            ..Default::default()
        };
        let cvars = load_cvars(&args).unwrap();
        let settings = RenderSettings::from_cvars(&cvars);
        assert_eq!(settings.resolution_scale_percent, 50);
        assert!(!settings.ssao);
    }

    #[test]
    fn test_missing_cvar_file() {
        let args = AppArgs {
            cvars: Some(PathBuf::from("/nonexistent/lumen-cvars.toml")),
            ..Default::default()
        };
        assert!(matches!(load_cvars(&args), Err(AppError::Io { .. })));
    }

    #[test]
    fn test_save_screenshot_rejects_hdr() {
        let screenshot = Screenshot {
            frame_number: 1,
            width: 1,
            height: 1,
            format: TextureFormat::Rgba16Float,
            pixels: vec![0; 8],
        };
        let result = save_screenshot(screenshot, Path::new("unused.png"));
        assert!(matches!(result, Err(AppError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_save_screenshot_rejects_short_buffer() {
        let screenshot = Screenshot {
            frame_number: 1,
            width: 4,
            height: 4,
            format: TextureFormat::Rgba8Unorm,
            pixels: vec![0; 10],
        };
        let result = save_screenshot(screenshot, Path::new("unused.png"));
        assert!(matches!(result, Err(AppError::MalformedScreenshot { len: 10, .. })));
    }

    #[test]
    fn test_run_with_resize_and_screenshot() {
        let path = std::env::temp_dir().join(format!("lumen-app-test-{}.png", std::process::id()));
        let args = AppArgs {
            frames: 12,
            size: lumen_graphics::Extent2d::new(320, 180),
            resizes: vec![crate::args::Resize {
                size: lumen_graphics::Extent2d::new(160, 90),
                frame: 6,
            }],
            screenshot: Some(path.clone()),
            screenshot_frame: Some(8),
            ..Default::default()
        };

        let stats = App::new(args).unwrap().run().unwrap();

        assert_eq!(stats.frames_rendered, 12);
        assert_eq!(stats.submissions, 12);
        assert_eq!(stats.reallocations, 2);
        assert_eq!(stats.screenshot.as_deref(), Some(path.as_path()));
        let image = image::open(&path).unwrap();
        assert_eq!((image.width(), image.height()), (160, 90));
        let _ = std::fs::remove_file(&path);
    }
}
