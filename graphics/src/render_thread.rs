//! Producer/consumer frame pipeline.
//!
//! [`FramePipeline`] moves finalized [`SceneProxy`] snapshots from the
//! simulation thread to a dedicated render thread, which owns the
//! [`SceneRenderer`] and every render target.
//!
//! # Threads
//!
//! ```text
//! ┌──────────────────────────────┐                 ┌──────────────────────────────┐
//! │        Producer thread       │                 │         Render thread        │
//! │                              │   SceneProxy    │                              │
//! │  acquire_arena               │ ──────────────► │  recreate output if resized  │
//! │  World::build_scene_proxy    │ bounded channel │  SceneRenderer::render       │
//! │  LightProbeSystem::resolve   │ (frames in      │  submit + readback           │
//! │  submit / try_submit         │  flight)        │                              │
//! │                              │ FrameCompletion │                              │
//! │  poll_completed / recycle    │ ◄────────────── │  proxy.into_arena()          │
//! └──────────────────────────────┘                 └──────────────────────────────┘
//! ```
//!
//! # Ownership
//!
//! | Object | Owner | Crosses threads |
//! |--------|-------|-----------------|
//! | Live scene graph, `LightProbeSystem` | producer | never |
//! | `SceneProxy` and its arena | producer until submit, then render thread | by move |
//! | `SceneRenderer`, `SceneRenderTargets`, output texture | render thread | never |
//! | `RenderProxyArena` after the frame | producer again | by move, in `FrameCompletion` |
//!
//! # Frame Overlap
//!
//! With 2 frames in flight, the producer builds frame N+1 while frame N
//! renders, and blocks in [`FramePipeline::submit`] only when two proxies are
//! already queued:
//!
//! ```text
//! Producer: [build 0] [build 1] [build 2] [wait slot] [build 3] ──────────►
//! Render:             [render 0]          [render 1]  [render 2] ─────────►
//!
//! Time ───────────────────────────────────────────────────────────────────►
//! ```
//!
//! An arena is only handed back once the render thread has submitted every
//! command that reads its proxy, so recycling it can never race the frame.
//!
//! # Shutdown
//!
//! [`FramePipeline::shutdown`] closes the queue. Every proxy already queued is
//! still rendered; the render thread then releases its passes and targets and
//! joins. There is no way to abort a queued frame.
//!
//! # Example
//!
//! ```ignore
//! use lumen_graphics::render_thread::{FramePipeline, PipelineConfig};
//!
//! let mut pipeline = FramePipeline::spawn(device, PipelineConfig::default())?;
//!
//! for frame in 1..=frames {
//!     let arena = pipeline.acquire_arena();
//!     let proxy = world.build_scene_proxy(request(frame), arena, &mut probes, pipeline.assets());
//!     pipeline.submit(proxy);
//!
//!     for completion in pipeline.poll_completed() {
//!         let report = pipeline.recycle(completion);
//!         log::debug!("frame {} done", report.frame_number);
//!     }
//! }
//!
//! pipeline.shutdown();
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::assets::GpuAssets;
use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, fatal};
use crate::proxy::{ArenaPool, DEFAULT_ARENA_BYTES, RenderProxyArena, SceneProxy};
use crate::renderer::{FrameOutput, FrameReport, RendererConfig, SceneRenderer};
use crate::types::{TextureDescriptor, TextureFormat, TextureUsage};

/// Static pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Proxies queued before [`FramePipeline::submit`] blocks. At least 1.
    pub frames_in_flight: usize,
    /// Byte budget of each proxy arena.
    pub arena_bytes: usize,
    /// Renderer configuration.
    pub renderer: RendererConfig,
    /// Format of the output texture the render thread owns.
    pub output_format: TextureFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            arena_bytes: DEFAULT_ARENA_BYTES,
            renderer: RendererConfig::default(),
            output_format: TextureFormat::Rgba8UnormSrgb,
        }
    }
}

/// A rendered frame handed back to the producer.
#[derive(Debug)]
pub struct FrameCompletion {
    /// Frame number of the proxy.
    pub frame_number: u64,
    /// Renderer report.
    pub report: FrameReport,
    /// The proxy's arena, ready to be recycled.
    pub arena: RenderProxyArena,
}

static_assertions::assert_impl_all!(FrameCompletion: Send);

/// Producer-side handle to the render thread.
///
/// Owned by a single producer thread.
#[derive(Debug)]
pub struct FramePipeline {
    proxies: Option<Sender<SceneProxy>>,
    completions: Receiver<FrameCompletion>,
    thread: Option<JoinHandle<()>>,
    arenas: ArenaPool,
    assets: Arc<GpuAssets>,
    frames_in_flight: usize,
    last_submitted: Option<u64>,
    last_completed: Option<u64>,
    buffered: VecDeque<FrameCompletion>,
}

impl FramePipeline {
    /// Create the renderer on the calling thread and start the render thread.
    ///
    /// # Errors
    ///
    /// Returns an error if a pass fails to initialize or the thread cannot be
    /// spawned.
    ///
    /// # Panics
    ///
    /// Panics if `config.frames_in_flight` is 0.
    pub fn spawn(device: Arc<GraphicsDevice>, config: PipelineConfig) -> Result<Self, GraphicsError> {
        assert!(
            config.frames_in_flight > 0,
            "frames_in_flight must be at least 1"
        );

        let assets = Arc::new(GpuAssets::new());
        let renderer = SceneRenderer::with_assets(
            Arc::clone(&device),
            Arc::clone(&assets),
            config.renderer.clone(),
        )?;

        let (proxy_tx, proxy_rx) = crossbeam_channel::bounded(config.frames_in_flight);
        let (done_tx, done_rx) = crossbeam_channel::unbounded();
        let output_format = config.output_format;

        let thread = std::thread::Builder::new()
            .name("lumen-render".into())
            .spawn(move || render_loop(renderer, proxy_rx, done_tx, output_format))
            .map_err(|err| {
                GraphicsError::InitializationFailed(format!("spawning render thread: {err}"))
            })?;

        log::info!(
            "FramePipeline: render thread started ({} frames in flight, {} KiB arenas)",
            config.frames_in_flight,
            config.arena_bytes / 1024
        );

        Ok(Self {
            proxies: Some(proxy_tx),
            completions: done_rx,
            thread: Some(thread),
            // One arena per queued frame, one rendering and one being built.
            arenas: ArenaPool::new(config.arena_bytes, config.frames_in_flight + 2),
            assets,
            frames_in_flight: config.frames_in_flight,
            last_submitted: None,
            last_completed: None,
            buffered: VecDeque::new(),
        })
    }

    /// A reset arena for the next proxy.
    pub fn acquire_arena(&mut self) -> RenderProxyArena {
        self.arenas.acquire()
    }

    /// Mesh and material registry the render thread resolves against.
    pub fn assets(&self) -> &Arc<GpuAssets> {
        &self.assets
    }

    /// Hand a finalized proxy to the render thread, blocking while the queue
    /// is full.
    ///
    /// # Panics
    ///
    /// Panics if the proxy is not finalized, if its frame number does not
    /// exceed the previous submission, or if the render thread has exited.
    pub fn submit(&mut self, proxy: SceneProxy) {
        lumen_core::profile_function!();

        let frame_number = self.check_submission(&proxy);
        if self.sender().send(proxy).is_err() {
            fatal(
                "FramePipeline",
                format_args!("render thread exited before frame {frame_number}"),
            );
        }
        self.last_submitted = Some(frame_number);
        log::trace!("FramePipeline: queued frame {frame_number}");
    }

    /// Hand a finalized proxy to the render thread without blocking.
    ///
    /// # Errors
    ///
    /// Returns the proxy unchanged if the queue is full.
    ///
    /// # Panics
    ///
    /// Same conditions as [`submit`](Self::submit).
    pub fn try_submit(&mut self, proxy: SceneProxy) -> Result<(), SceneProxy> {
        let frame_number = self.check_submission(&proxy);
        match self.sender().try_send(proxy) {
            Ok(()) => {
                self.last_submitted = Some(frame_number);
                Ok(())
            }
            Err(TrySendError::Full(proxy)) => {
                log::trace!("FramePipeline: queue full, frame {frame_number} not queued");
                Err(proxy)
            }
            Err(TrySendError::Disconnected(_)) => fatal(
                "FramePipeline",
                format_args!("render thread exited before frame {frame_number}"),
            ),
        }
    }

    fn check_submission(&self, proxy: &SceneProxy) -> u64 {
        let frame_number = proxy.frame_number();
        if !proxy.is_finalized() {
            fatal(
                "FramePipeline",
                format_args!("frame {frame_number} submitted before finalize"),
            );
        }
        if let Some(last) = self.last_submitted
            && frame_number <= last
        {
            fatal(
                "FramePipeline",
                format_args!("frame {frame_number} submitted after frame {last}"),
            );
        }
        frame_number
    }

    fn sender(&self) -> &Sender<SceneProxy> {
        match &self.proxies {
            Some(sender) => sender,
            None => fatal("FramePipeline", "submit after shutdown"),
        }
    }

    /// Completions received so far, oldest first. Never blocks.
    pub fn poll_completed(&mut self) -> Vec<FrameCompletion> {
        let mut done: Vec<_> = self.buffered.drain(..).collect();
        done.extend(self.completions.try_iter());
        if let Some(last) = done.last() {
            self.last_completed = Some(last.frame_number);
        }
        done
    }

    /// Block until `frame_number` has rendered.
    ///
    /// Returns every completion up to and including it, oldest first.
    /// Returns an empty list if that frame was already reported.
    ///
    /// # Panics
    ///
    /// Panics if `frame_number` was never submitted or the render thread has
    /// exited.
    pub fn wait_for_frame(&mut self, frame_number: u64) -> Vec<FrameCompletion> {
        lumen_core::profile_function!();

        if self.last_completed.is_some_and(|last| last >= frame_number) {
            return Vec::new();
        }
        if self.last_submitted.is_none_or(|last| last < frame_number) {
            fatal(
                "FramePipeline",
                format_args!("waiting for frame {frame_number}, which was never submitted"),
            );
        }

        let mut done: Vec<_> = self.buffered.drain(..).collect();
        while done.last().is_none_or(|c| c.frame_number < frame_number) {
            match self.completions.recv() {
                Ok(completion) => done.push(completion),
                Err(_) => fatal(
                    "FramePipeline",
                    format_args!("render thread exited before frame {frame_number}"),
                ),
            }
        }

        // Frames past the one waited for stay queued for the next poll.
        let split = done
            .iter()
            .position(|c| c.frame_number > frame_number)
            .unwrap_or(done.len());
        self.buffered.extend(done.drain(split..));
        self.last_completed = done.last().map(|c| c.frame_number).or(self.last_completed);
        done
    }

    /// Return a completion's arena to the pool and keep its report.
    pub fn recycle(&mut self, completion: FrameCompletion) -> FrameReport {
        self.arenas.release(completion.arena);
        completion.report
    }

    /// Arena pool, for inspection.
    pub fn arena_pool(&self) -> &ArenaPool {
        &self.arenas
    }

    /// Queue capacity.
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Last submitted frame number.
    pub fn last_submitted(&self) -> Option<u64> {
        self.last_submitted
    }

    /// Whether the render thread is still running.
    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Render every queued proxy, stop the render thread and release its
    /// resources.
    ///
    /// Returns the completions not yet collected.
    ///
    /// # Panics
    ///
    /// Re-raises a panic from the render thread.
    pub fn shutdown(&mut self) -> Vec<FrameCompletion> {
        let Some(thread) = self.thread.take() else {
            return Vec::new();
        };
        // Closing the queue ends the render loop once it is drained.
        self.proxies = None;

        if let Err(payload) = thread.join() {
            log::error!("FramePipeline: render thread panicked");
            std::panic::resume_unwind(payload);
        }

        let remaining = self.poll_completed();
        log::info!(
            "FramePipeline: render thread stopped after frame {:?}",
            self.last_completed
        );
        remaining
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.proxies = None;
            return;
        }
        let _ = self.shutdown();
    }
}

fn render_loop(
    mut renderer: SceneRenderer,
    proxies: Receiver<SceneProxy>,
    completions: Sender<FrameCompletion>,
    output_format: TextureFormat,
) {
    lumen_core::set_thread_name!("Render Thread");

    let device = Arc::clone(renderer.device());
    let mut output: Option<FrameOutput> = None;

    for mut proxy in proxies.iter() {
        let extent = proxy.output_extent();
        let frame_output = match output.take() {
            Some(current) if current.extent() == extent => current,
            previous => {
                if let Some(previous) = previous {
                    log::info!(
                        "FramePipeline: output {} -> {extent}",
                        previous.extent()
                    );
                }
                let descriptor = TextureDescriptor::from_extent(
                    extent,
                    output_format,
                    TextureUsage::RENDER_ATTACHMENT
                        | TextureUsage::COPY_DST
                        | TextureUsage::COPY_SRC,
                )
                .with_label("Frame.Output");
                let texture = device
                    .create_texture(&descriptor)
                    .unwrap_or_else(|err| fatal("FramePipeline: creating Frame.Output", err));
                FrameOutput::new(texture)
            }
        };

        let report = renderer.render(&mut proxy, &frame_output);
        output = Some(frame_output);
        crate::profiling::plot_arena(proxy.arena());

        let completion = FrameCompletion {
            frame_number: report.frame_number,
            report,
            arena: proxy.into_arena(),
        };
        if completions.send(completion).is_err() {
            log::debug!("FramePipeline: completion receiver dropped");
        }
    }

    drop(output);
    renderer.shutdown();
}
