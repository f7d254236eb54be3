//! Profiling support via Tracy.
//!
//! This module re-exports CPU profiling from [`lumen_core::profiling`] and adds
//! per-frame plots for the render pipeline.
//!
//! # Enabling Profiling
//!
//! ```bash
//! cargo run -p lumen-app --features profiling
//! ```
//!
//! Without the feature every macro expands to nothing and the plot helpers
//! compile to empty functions.
//!
//! # Plots
//!
//! | Plot | Source |
//! |------|--------|
//! | `Commands` | commands recorded for the frame |
//! | `Draws` | draw commands recorded for the frame |
//! | `Passes` | steps that ran, post stages included |
//! | `Arena KiB` | peak arena usage of the frame's proxy |
//!
//! ```ignore
//! let report = renderer.render(&mut proxy, &output);
//! lumen_graphics::profiling::plot_frame(&report);
//! ```

pub use lumen_core::profiling::*;

use crate::proxy::RenderProxyArena;
use crate::renderer::FrameReport;

/// Plot command, draw and pass counts of a rendered frame.
pub fn plot_frame(report: &FrameReport) {
    profile_plot!("Commands", report.command_count);
    profile_plot!("Draws", report.draw_count);
    profile_plot!("Passes", report.passes.len());
}

/// Plot the peak usage of a proxy arena.
pub fn plot_arena(arena: &RenderProxyArena) {
    profile_plot!("Arena KiB", arena.peak_bytes() / 1024);
}
