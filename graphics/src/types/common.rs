//! Common types shared across the graphics system.

/// Width and height of a 2D image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2d {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Extent2d {
    /// Create an extent.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Extent scaled by `factor`, rounded to nearest, at least one pixel per axis.
    pub fn scaled(self, factor: f32) -> Self {
        Self {
            width: ((self.width as f32 * factor).round() as u32).max(1),
            height: ((self.height as f32 * factor).round() as u32).max(1),
        }
    }

    /// Extent divided by `divisor` rounding up, at least one pixel per axis.
    pub fn divided(self, divisor: u32) -> Self {
        Self {
            width: self.width.div_ceil(divisor).max(1),
            height: self.height.div_ceil(divisor).max(1),
        }
    }

    /// Width over height.
    pub fn aspect_ratio(self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Number of pixels.
    pub fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Extent2d {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// 3D extent of a texture; `depth` counts layers for array and cube textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent3d {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Depth or layer count (1 for plain 2D textures).
    pub depth: u32,
}

impl Extent3d {
    /// 2D extent with a single layer.
    pub const fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    /// Extent with an explicit depth or layer count.
    pub const fn new_3d(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Width and height only.
    pub const fn xy(self) -> Extent2d {
        Extent2d::new(self.width, self.height)
    }
}

impl Default for Extent3d {
    fn default() -> Self {
        Self::new_2d(1, 1)
    }
}

impl From<Extent2d> for Extent3d {
    fn from(extent: Extent2d) -> Self {
        Self::new_2d(extent.width, extent.height)
    }
}

/// Viewport in pixels with a `[0, 1]` depth range by default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// X coordinate of the top-left corner.
    pub x: f32,
    /// Y coordinate of the top-left corner.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
    /// Minimum depth.
    pub min_depth: f32,
    /// Maximum depth.
    pub max_depth: f32,
}

impl Viewport {
    /// Viewport covering a whole target.
    pub fn from_extent(extent: Extent2d) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Scissor rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScissorRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl ScissorRect {
    /// Create a scissor rectangle.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the rectangle covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Clear value for an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ClearValue {
    /// Keep existing contents.
    #[default]
    Load,
    /// Clear color attachment with RGBA values.
    Color([f32; 4]),
    /// Clear depth attachment.
    Depth(f32),
}

impl ClearValue {
    /// Transparent black.
    pub const BLACK: Self = Self::Color([0.0, 0.0, 0.0, 0.0]);
    /// Far plane for a `[0, 1]` depth buffer.
    pub const FAR_DEPTH: Self = Self::Depth(1.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_scaled() {
        let extent = Extent2d::new(1920, 1080);
        assert_eq!(extent.scaled(0.5), Extent2d::new(960, 540));
        assert_eq!(Extent2d::new(1, 1).scaled(0.1), Extent2d::new(1, 1));
    }

    #[test]
    fn test_extent_divided_rounds_up() {
        assert_eq!(Extent2d::new(1919, 1079).divided(2), Extent2d::new(960, 540));
        assert_eq!(Extent2d::new(1, 1).divided(4), Extent2d::new(1, 1));
    }

    #[test]
    fn test_extent_display() {
        assert_eq!(Extent2d::new(640, 480).to_string(), "640x480");
    }
}
