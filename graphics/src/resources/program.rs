//! Compiled shader program.

use std::sync::Arc;

use crate::backend::ResourceId;
use crate::device::GraphicsDevice;
use crate::types::{BlendMode, ProgramDescriptor};

/// A compiled shader program.
pub struct Program {
    device: Arc<GraphicsDevice>,
    id: ResourceId,
    descriptor: ProgramDescriptor,
}

impl Program {
    pub(crate) fn new(
        device: Arc<GraphicsDevice>,
        id: ResourceId,
        descriptor: ProgramDescriptor,
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

    /// Shader module name.
    pub fn shader(&self) -> &str {
        &self.descriptor.shader
    }

    /// Debug label.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Output blending.
    pub fn blend(&self) -> BlendMode {
        self.descriptor.blend
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        self.device.backend().destroy_program(self.id);
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("id", &self.id)
            .field("shader", &self.descriptor.shader)
            .finish()
    }
}
