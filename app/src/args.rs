//! Command line arguments.
//!
//! Parsed with clap. Every option has a default, so `lumen` alone renders a
//! short headless run of the demo scene:
//!
//! ```text
//! lumen --frames 120 --size 1920x1080 --resize 1280x720@60 \
//!       --cvars settings.toml --screenshot shot.png --screenshot-frame 90
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use lumen_graphics::Extent2d;

/// A `WIDTHxHEIGHT` pair as typed on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size(pub Extent2d);

impl FromStr for Size {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, height) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
        let width: u32 = width
            .trim()
            .parse()
            .map_err(|err| format!("bad width '{width}': {err}"))?;
        let height: u32 = height
            .trim()
            .parse()
            .map_err(|err| format!("bad height '{height}': {err}"))?;
        if width == 0 || height == 0 {
            return Err(format!("size must be non-zero, got {width}x{height}"));
        }
        Ok(Self(Extent2d::new(width, height)))
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An output size change at a given frame: `WIDTHxHEIGHT@FRAME`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resize {
    /// New output size.
    pub size: Extent2d,
    /// First frame rendered at the new size.
    pub frame: u64,
}

impl FromStr for Resize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (size, frame) = s
            .split_once('@')
            .ok_or_else(|| format!("expected WIDTHxHEIGHT@FRAME, got '{s}'"))?;
        let Size(size) = size.parse()?;
        let frame = frame
            .trim()
            .parse()
            .map_err(|err| format!("bad frame '{frame}': {err}"))?;
        Ok(Self { size, frame })
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "lumen",
    about = "Render the Lumen demo scene headlessly",
    long_about = "Builds a scene proxy per frame on the main thread and renders it on a \
        dedicated render thread using the recording dummy backend.\n\n\
        Renderer settings are console variables (r.*) and can be loaded from a \
        TOML file with --cvars, or set one by one with --set.\n\n\
        EXAMPLES:\n  \
          lumen --frames 240 --size 1920x1080\n  \
          lumen --resize 960x540@30 --screenshot frame.png\n  \
          lumen --set r.ResolutionScale=50 --set r.Bloom=false",
    version
)]
struct ClapArgs {
    /// Frames to render before exiting.
    #[arg(long, default_value_t = 60)]
    frames: u64,

    /// Initial output size.
    #[arg(long, default_value = "1280x720")]
    size: Size,

    /// Change the output size at a frame, e.g. 1920x1080@30. Repeatable.
    #[arg(long, value_name = "WIDTHxHEIGHT@FRAME")]
    resize: Vec<Resize>,

    /// Proxies queued ahead of the render thread.
    #[arg(long, default_value_t = 2)]
    frames_in_flight: usize,

    /// TOML file of console variables.
    #[arg(long, value_name = "PATH")]
    cvars: Option<PathBuf>,

    /// Set a console variable, e.g. r.Bloom=false. Repeatable; applied after --cvars.
    #[arg(long = "set", value_name = "NAME=VALUE")]
    sets: Vec<String>,

    /// Write a PNG of one frame to this path.
    #[arg(long, value_name = "PATH")]
    screenshot: Option<PathBuf>,

    /// Frame to capture with --screenshot. Defaults to the last frame.
    #[arg(long)]
    screenshot_frame: Option<u64>,

    /// Resize the screenshot to this size.
    #[arg(long)]
    screenshot_size: Option<Size>,

    /// Dump every registered console variable as TOML and exit.
    #[arg(long)]
    list_cvars: bool,
}

/// Validated run options.
#[derive(Debug, Clone, PartialEq)]
pub struct AppArgs {
    /// Frames to render.
    pub frames: u64,
    /// Initial output size.
    pub size: Extent2d,
    /// Output size changes, sorted by frame.
    pub resizes: Vec<Resize>,
    /// Pipeline queue depth.
    pub frames_in_flight: usize,
    /// Console variable file.
    pub cvars: Option<PathBuf>,
    /// `name=value` console variable assignments.
    pub sets: Vec<String>,
    /// Screenshot destination.
    pub screenshot: Option<PathBuf>,
    /// Frame to capture.
    pub screenshot_frame: Option<u64>,
    /// Screenshot size; the final target's size when `None`.
    pub screenshot_size: Option<Extent2d>,
    /// Print console variables and exit.
    pub list_cvars: bool,
}

impl Default for AppArgs {
    fn default() -> Self {
        Self {
            frames: 60,
            size: Extent2d::new(1280, 720),
            resizes: Vec::new(),
            frames_in_flight: 2,
            cvars: None,
            sets: Vec::new(),
            screenshot: None,
            screenshot_frame: None,
            screenshot_size: None,
            list_cvars: false,
        }
    }
}

impl AppArgs {
    /// Parse the process arguments, exiting with a usage message on error.
    pub fn parse() -> Self {
        ClapArgs::parse().into()
    }

    /// Parse an explicit argument list.
    ///
    /// # Errors
    ///
    /// Returns clap's error for unknown flags or malformed values.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        ClapArgs::try_parse_from(args).map(Into::into)
    }

    /// Output size for `frame`, after every resize scheduled up to it.
    pub fn size_at(&self, frame: u64) -> Extent2d {
        self.resizes
            .iter()
            .take_while(|resize| resize.frame <= frame)
            .last()
            .map_or(self.size, |resize| resize.size)
    }

    /// Frame whose screenshot is written, if one was requested.
    pub fn screenshot_target(&self) -> Option<u64> {
        self.screenshot
            .as_ref()
            .map(|_| self.screenshot_frame.unwrap_or(self.frames).clamp(1, self.frames.max(1)))
    }
}

impl From<ClapArgs> for AppArgs {
    fn from(args: ClapArgs) -> Self {
        if args.screenshot_frame.is_some() && args.screenshot.is_none() {
            log::warn!("--screenshot-frame has no effect without --screenshot");
        }
        if args.frames_in_flight == 0 {
            log::warn!("--frames-in-flight 0 is not allowed, using 1");
        }

        let mut resizes = args.resize;
        resizes.sort_by_key(|resize| resize.frame);

        Self {
            frames: args.frames,
            size: args.size.0,
            resizes,
            frames_in_flight: args.frames_in_flight.max(1),
            cvars: args.cvars,
            sets: args.sets,
            screenshot: args.screenshot,
            screenshot_frame: args.screenshot_frame,
            screenshot_size: args.screenshot_size.map(|size| size.0),
            list_cvars: args.list_cvars,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("1280x720", Extent2d::new(1280, 720))]
    #[case("64X32", Extent2d::new(64, 32))]
    #[case(" 800 x 600 ", Extent2d::new(800, 600))]
    fn test_size_parse(#[case] input: &str, #[case] expected: Extent2d) {
        assert_eq!(input.trim().parse::<Size>().map(|s| s.0), Ok(expected));
    }

    #[rstest]
    #[case("1280")]
    #[case("0x720")]
    #[case("ax720")]
    fn test_size_parse_rejects(#[case] input: &str) {
        assert!(input.parse::<Size>().is_err());
    }

    #[test]
    fn test_resize_parse() {
        let resize: Resize = "640x360@12".parse().unwrap();
        assert_eq!(resize.size, Extent2d::new(640, 360));
        assert_eq!(resize.frame, 12);
        assert!("640x360".parse::<Resize>().is_err());
    }

    #[test]
    fn test_defaults() {
        let args = AppArgs::try_parse_from(["lumen"]).unwrap();
        assert_eq!(args, AppArgs::default());
        assert_eq!(args.screenshot_target(), None);
    }

    #[test]
    fn test_size_schedule() {
        let args = AppArgs::try_parse_from([
            "lumen",
            "--size",
            "1920x1080",
            "--resize",
            "640x360@20",
            "--resize",
            "1280x720@10",
        ])
        .unwrap();

        assert_eq!(args.size_at(1), Extent2d::new(1920, 1080));
        assert_eq!(args.size_at(10), Extent2d::new(1280, 720));
        assert_eq!(args.size_at(19), Extent2d::new(1280, 720));
        assert_eq!(args.size_at(50), Extent2d::new(640, 360));
    }

    #[test]
    fn test_screenshot_defaults_to_last_frame() {
        let args =
            AppArgs::try_parse_from(["lumen", "--frames", "30", "--screenshot", "out.png"]).unwrap();
        assert_eq!(args.screenshot_target(), Some(30));

        let args = AppArgs::try_parse_from([
            "lumen",
            "--frames",
            "30",
            "--screenshot",
            "out.png",
            "--screenshot-frame",
            "99",
        ])
        .unwrap();
        assert_eq!(args.screenshot_target(), Some(30));
    }

    #[test]
    fn test_unknown_flag_is_an_error() {
        assert!(AppArgs::try_parse_from(["lumen", "--window"]).is_err());
    }
}
