//! GPU texture resource.

use std::sync::Arc;

use crate::backend::ResourceId;
use crate::device::GraphicsDevice;
use crate::types::{Extent2d, Extent3d, TextureDescriptor, TextureFormat, TextureUsage};

/// A GPU texture.
///
/// Holds its device alive. The native object is destroyed when the last
/// `Arc<Texture>` is dropped.
pub struct Texture {
    device: Arc<GraphicsDevice>,
    id: ResourceId,
    descriptor: TextureDescriptor,
}

impl Texture {
    pub(crate) fn new(
        device: Arc<GraphicsDevice>,
        id: ResourceId,
        descriptor: TextureDescriptor,
    ) -> Self {
        Self {
            device,
            id,
            descriptor,
        }
    }

    /// Device-unique id.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// The creation descriptor.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    /// Debug label.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Full size including layers.
    pub fn size(&self) -> Extent3d {
        self.descriptor.size
    }

    /// Width and height.
    pub fn extent(&self) -> Extent2d {
        self.descriptor.size.xy()
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.descriptor.size.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.descriptor.size.height
    }

    /// Pixel format.
    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    /// Usage flags.
    pub fn usage(&self) -> TextureUsage {
        self.descriptor.usage
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        log::trace!("Texture {} {:?} dropped", self.id, self.descriptor.label);
        self.device.backend().destroy_texture(self.id);
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("label", &self.descriptor.label)
            .field("size", &self.descriptor.size)
            .field("format", &self.descriptor.format)
            .finish()
    }
}
