//! # Lumen App
//!
//! Headless driver for the Lumen renderer. It plays the game thread against a
//! [`FramePipeline`](lumen_graphics::FramePipeline): each frame it snapshots the
//! demo [`World`](lumen_core::scene::World) into a scene proxy, submits it to
//! the render thread and recycles the arenas of completed frames.
//!
//! Renderer settings come from console variables. They are registered by
//! [`RenderSettings::register_cvars`](lumen_graphics::RenderSettings::register_cvars),
//! can be loaded from a TOML file and overridden one by one on the command line.
//!
//! ## Example
//!
//! ```ignore
//! use lumen_app::{App, AppArgs};
//!
//! let args = AppArgs::try_parse_from(["lumen", "--frames", "10"])?;
//! let stats = App::new(args)?.run()?;
//! assert_eq!(stats.frames_rendered, 10);
//! ```

mod app;
mod args;
mod error;
pub mod scene;

pub use app::{App, RunStats, apply_assignment, load_cvars, save_screenshot};
pub use args::{AppArgs, Resize, Size};
pub use error::AppError;

/// App version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the core and graphics libraries.
pub fn init() {
    lumen_core::init();
    lumen_graphics::init();
    log::info!("Lumen App v{} initialized", VERSION);
}
