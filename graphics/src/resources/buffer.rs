//! GPU buffer resource.

use std::sync::Arc;

use crate::backend::ResourceId;
use crate::device::GraphicsDevice;
use crate::types::{BufferDescriptor, BufferUsage};

/// A GPU buffer.
pub struct Buffer {
    device: Arc<GraphicsDevice>,
    id: ResourceId,
    descriptor: BufferDescriptor,
}

impl Buffer {
    pub(crate) fn new(device: Arc<GraphicsDevice>, id: ResourceId, descriptor: BufferDescriptor) -> Self {
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

    /// Debug label.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    /// Usage flags.
    pub fn usage(&self) -> BufferUsage {
        self.descriptor.usage
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.device.backend().destroy_buffer(self.id);
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.id)
            .field("label", &self.descriptor.label)
            .field("size", &self.descriptor.size)
            .finish()
    }
}
