//! Texture types and descriptors.

use super::{Extent2d, Extent3d};
use bitflags::bitflags;

/// Texture format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TextureFormat {
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,
    /// 16-bit red channel, float.
    R16Float,
    /// 16-bit RG channels, float.
    Rg16Float,
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
    /// 10-bit RGB, 2-bit alpha, unsigned normalized.
    Rgb10a2Unorm,
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit depth, float.
    Depth32Float,
}

impl TextureFormat {
    /// Returns true if this is a depth format.
    pub fn is_depth(&self) -> bool {
        matches!(self, Self::Depth32Float)
    }

    /// Returns true for floating point color formats.
    pub fn is_hdr(&self) -> bool {
        matches!(self, Self::R16Float | Self::Rg16Float | Self::Rgba16Float)
    }

    /// Returns true if the hardware applies sRGB encoding on write.
    pub fn is_srgb(&self) -> bool {
        matches!(self, Self::Rgba8UnormSrgb)
    }

    /// Returns the size in bytes per pixel.
    pub fn block_size(&self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::R16Float => 2,
            Self::Rg16Float
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Rgb10a2Unorm
            | Self::Depth32Float => 4,
            Self::Rgba16Float => 8,
        }
    }
}

bitflags! {
    /// Usage flags for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Texture can be copied from.
        const COPY_SRC = 1 << 0;
        /// Texture can be copied to.
        const COPY_DST = 1 << 1;
        /// Texture can be sampled in a shader.
        const TEXTURE_BINDING = 1 << 2;
        /// Texture can be used as a render attachment.
        const RENDER_ATTACHMENT = 1 << 3;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Shape of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureDimension {
    /// Plain 2D texture.
    #[default]
    D2,
    /// Array of 2D layers; `size.depth` is the layer count.
    D2Array,
    /// Cubemap array; `size.depth` is six times the cube count.
    CubeArray,
    /// Volume texture.
    D3,
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Debug label for the texture.
    pub label: Option<String>,
    /// Size of the texture.
    pub size: Extent3d,
    /// Shape of the texture.
    pub dimension: TextureDimension,
    /// Mip level count.
    pub mip_level_count: u32,
    /// Texture format.
    pub format: TextureFormat,
    /// Usage flags.
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// Create a new 2D texture descriptor.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            label: None,
            size: Extent3d::new_2d(width, height),
            dimension: TextureDimension::D2,
            mip_level_count: 1,
            format,
            usage,
        }
    }

    /// Create a 2D texture descriptor from an extent.
    pub fn from_extent(extent: Extent2d, format: TextureFormat, usage: TextureUsage) -> Self {
        Self::new_2d(extent.width, extent.height, format, usage)
    }

    /// Create a 2D array texture descriptor.
    pub fn new_2d_array(
        width: u32,
        height: u32,
        layers: u32,
        format: TextureFormat,
        usage: TextureUsage,
    ) -> Self {
        Self {
            size: Extent3d::new_3d(width, height, layers),
            dimension: TextureDimension::D2Array,
            ..Self::new_2d(width, height, format, usage)
        }
    }

    /// Create a cubemap array descriptor holding `cubes` cubemaps.
    pub fn new_cube_array(size: u32, cubes: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            size: Extent3d::new_3d(size, size, cubes * 6),
            dimension: TextureDimension::CubeArray,
            ..Self::new_2d(size, size, format, usage)
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the mip level count.
    pub fn with_mip_levels(mut self, count: u32) -> Self {
        self.mip_level_count = count;
        self
    }

    /// Approximate memory footprint of the top mip, in bytes.
    pub fn byte_size(&self) -> u64 {
        self.size.width as u64
            * self.size.height as u64
            * self.size.depth as u64
            * self.format.block_size() as u64
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self::new_2d(1, 1, TextureFormat::default(), TextureUsage::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_array_layers() {
        let desc = TextureDescriptor::new_cube_array(
            512,
            4,
            TextureFormat::Depth32Float,
            TextureUsage::RENDER_ATTACHMENT,
        );
        assert_eq!(desc.size.depth, 24);
        assert_eq!(desc.dimension, TextureDimension::CubeArray);
    }

    #[test]
    fn test_byte_size() {
        let desc = TextureDescriptor::new_2d(
            4,
            4,
            TextureFormat::Rgba16Float,
            TextureUsage::TEXTURE_BINDING,
        );
        assert_eq!(desc.byte_size(), 128);
    }
}
