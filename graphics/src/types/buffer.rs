//! Buffer descriptors.
//!
//! Buffers back resident mesh geometry and per-material uniform blocks. They
//! are created once when an asset becomes resident and never touched by the
//! per-frame passes except to bind them.

use bitflags::bitflags;

bitflags! {
    /// How a buffer is bound.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u32 {
        /// Vertex stream of a mesh.
        const VERTEX = 1 << 0;
        /// 32-bit index stream of a mesh.
        const INDEX = 1 << 1;
        /// Material or pass uniform block.
        const UNIFORM = 1 << 2;
        /// Written from the CPU after creation.
        const COPY_DST = 1 << 3;
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label, attached to the native object at creation.
    pub label: Option<String>,
    /// Size in bytes. Must be non-zero.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    /// Vertex buffer of `size` bytes, filled at creation.
    pub fn vertices(size: usize) -> Self {
        Self::new(size as u64, BufferUsage::VERTEX | BufferUsage::COPY_DST)
    }

    /// Index buffer holding `count` 32-bit indices, filled at creation.
    pub fn indices(count: usize) -> Self {
        Self::new(
            (count * size_of::<u32>()) as u64,
            BufferUsage::INDEX | BufferUsage::COPY_DST,
        )
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_buffers() {
        let vertices = BufferDescriptor::vertices(24 * 32).with_label("Cube vertices");
        assert_eq!(vertices.size, 768);
        assert!(vertices.usage.contains(BufferUsage::VERTEX | BufferUsage::COPY_DST));
        assert_eq!(vertices.label.as_deref(), Some("Cube vertices"));

        let indices = BufferDescriptor::indices(36);
        assert_eq!(indices.size, 144);
        assert!(indices.usage.contains(BufferUsage::INDEX));
        assert!(!indices.usage.contains(BufferUsage::UNIFORM));
    }
}
