//! Dummy GPU backend for testing and headless runs.
//!
//! This backend doesn't perform GPU work. Submissions complete immediately
//! and readbacks return zeroed pixels. In recording mode every call is kept
//! as a [`BackendEvent`], which lets tests assert ordering contracts such as
//! "replacement targets are created and labeled before the old ones are
//! destroyed".

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::commands::CommandList;
use crate::error::GraphicsError;
use crate::types::{BufferDescriptor, Extent3d, ProgramDescriptor, TextureDescriptor, TextureFormat};

use super::{FenceSignal, GpuBackend, ResourceId};

/// A call observed by the [`DummyBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// Texture created.
    CreateTexture {
        /// Object id.
        id: ResourceId,
        /// Label from the descriptor.
        label: Option<String>,
        /// Size.
        size: Extent3d,
        /// Format.
        format: TextureFormat,
    },
    /// Texture destroyed.
    DestroyTexture {
        /// Object id.
        id: ResourceId,
    },
    /// Buffer created.
    CreateBuffer {
        /// Object id.
        id: ResourceId,
        /// Size in bytes.
        size: u64,
    },
    /// Buffer destroyed.
    DestroyBuffer {
        /// Object id.
        id: ResourceId,
    },
    /// Program created.
    CreateProgram {
        /// Object id.
        id: ResourceId,
        /// Shader module name.
        shader: String,
    },
    /// Program destroyed.
    DestroyProgram {
        /// Object id.
        id: ResourceId,
    },
    /// Debug label attached.
    Label {
        /// Object id.
        id: ResourceId,
        /// Label text.
        label: String,
    },
    /// Command list executed.
    Submit {
        /// Executed commands.
        list: CommandList,
    },
    /// Texture read back to the CPU.
    ReadTexture {
        /// Object id.
        id: ResourceId,
    },
}

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    record: bool,
    fail_texture_creation: AtomicBool,
    events: Mutex<Vec<BackendEvent>>,
    live_textures: Mutex<HashMap<ResourceId, TextureDescriptor>>,
    submissions: AtomicU64,
}

impl DummyBackend {
    /// Backend that records every call.
    pub fn new() -> Self {
        Self::with_recording(true)
    }

    /// Backend that keeps counters only, for long-running headless use.
    pub fn quiet() -> Self {
        Self::with_recording(false)
    }

    fn with_recording(record: bool) -> Self {
        Self {
            record,
            fail_texture_creation: AtomicBool::new(false),
            events: Mutex::new(Vec::new()),
            live_textures: Mutex::new(HashMap::new()),
            submissions: AtomicU64::new(0),
        }
    }

    /// Make every following texture creation fail with `OutOfMemory`.
    pub fn set_fail_texture_creation(&self, fail: bool) {
        self.fail_texture_creation.store(fail, Ordering::Release);
    }

    /// Snapshot of recorded events.
    pub fn events(&self) -> Vec<BackendEvent> {
        self.events.lock().clone()
    }

    /// Take and clear recorded events.
    pub fn take_events(&self) -> Vec<BackendEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Command lists submitted since the last [`take_events`](Self::take_events).
    pub fn submitted_lists(&self) -> Vec<CommandList> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                BackendEvent::Submit { list } => Some(list.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of live textures.
    pub fn live_texture_count(&self) -> usize {
        self.live_textures.lock().len()
    }

    /// Total submissions executed.
    pub fn submission_count(&self) -> u64 {
        self.submissions.load(Ordering::Acquire)
    }

    fn push(&self, event: BackendEvent) {
        if self.record {
            self.events.lock().push(event);
        }
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn create_texture(
        &self,
        id: ResourceId,
        descriptor: &TextureDescriptor,
    ) -> Result<(), GraphicsError> {
        if self.fail_texture_creation.load(Ordering::Acquire) {
            return Err(GraphicsError::OutOfMemory);
        }
        log::trace!(
            "DummyBackend: creating texture {id} {:?} ({}x{}x{})",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.size.depth
        );
        self.live_textures.lock().insert(id, descriptor.clone());
        self.push(BackendEvent::CreateTexture {
            id,
            label: descriptor.label.clone(),
            size: descriptor.size,
            format: descriptor.format,
        });
        Ok(())
    }

    fn destroy_texture(&self, id: ResourceId) {
        log::trace!("DummyBackend: destroying texture {id}");
        self.live_textures.lock().remove(&id);
        self.push(BackendEvent::DestroyTexture { id });
    }

    fn create_buffer(
        &self,
        id: ResourceId,
        descriptor: &BufferDescriptor,
    ) -> Result<(), GraphicsError> {
        log::trace!(
            "DummyBackend: creating buffer {id} {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        self.push(BackendEvent::CreateBuffer {
            id,
            size: descriptor.size,
        });
        Ok(())
    }

    fn destroy_buffer(&self, id: ResourceId) {
        log::trace!("DummyBackend: destroying buffer {id}");
        self.push(BackendEvent::DestroyBuffer { id });
    }

    fn create_program(
        &self,
        id: ResourceId,
        descriptor: &ProgramDescriptor,
    ) -> Result<(), GraphicsError> {
        log::trace!("DummyBackend: creating program {id} '{}'", descriptor.shader);
        self.push(BackendEvent::CreateProgram {
            id,
            shader: descriptor.shader.clone(),
        });
        Ok(())
    }

    fn destroy_program(&self, id: ResourceId) {
        log::trace!("DummyBackend: destroying program {id}");
        self.push(BackendEvent::DestroyProgram { id });
    }

    fn set_label(&self, id: ResourceId, label: &str) {
        self.push(BackendEvent::Label {
            id,
            label: label.to_string(),
        });
    }

    fn write_buffer(&self, id: ResourceId, offset: u64, data: &[u8]) {
        log::trace!(
            "DummyBackend: write_buffer {id} offset={} len={}",
            offset,
            data.len()
        );
    }

    fn submit(&self, list: &CommandList, signal: Option<FenceSignal>) -> Result<(), GraphicsError> {
        log::trace!(
            "DummyBackend: executing '{}' with {} commands",
            list.label(),
            list.len()
        );
        self.submissions.fetch_add(1, Ordering::AcqRel);
        self.push(BackendEvent::Submit { list: list.clone() });

        // No GPU work, so the submission is complete as soon as it is recorded.
        if let Some(signal) = signal {
            signal.fence.signal(signal.value);
        }
        Ok(())
    }

    fn read_texture(
        &self,
        id: ResourceId,
        descriptor: &TextureDescriptor,
    ) -> Result<Vec<u8>, GraphicsError> {
        if !self.live_textures.lock().contains_key(&id) {
            return Err(GraphicsError::InvalidParameter(format!(
                "read_texture: {id} is not a live texture"
            )));
        }
        self.push(BackendEvent::ReadTexture { id });
        Ok(vec![0u8; descriptor.byte_size() as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::Fence;
    use crate::types::TextureUsage;

    fn texture_desc() -> TextureDescriptor {
        TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm, TextureUsage::COPY_SRC)
            .with_label("test")
    }

    #[test]
    fn test_records_texture_lifecycle() {
        let backend = DummyBackend::new();
        backend.create_texture(ResourceId(1), &texture_desc()).unwrap();
        backend.set_label(ResourceId(1), "test");
        backend.destroy_texture(ResourceId(1));

        let events = backend.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], BackendEvent::CreateTexture { id: ResourceId(1), .. }));
        assert!(matches!(events[2], BackendEvent::DestroyTexture { id: ResourceId(1) }));
        assert_eq!(backend.live_texture_count(), 0);
    }

    #[test]
    fn test_quiet_mode_records_nothing() {
        let backend = DummyBackend::quiet();
        backend.create_texture(ResourceId(1), &texture_desc()).unwrap();
        assert!(backend.events().is_empty());
        assert_eq!(backend.live_texture_count(), 1);
    }

    #[test]
    fn test_failure_injection() {
        let backend = DummyBackend::new();
        backend.set_fail_texture_creation(true);
        assert_eq!(
            backend.create_texture(ResourceId(1), &texture_desc()),
            Err(GraphicsError::OutOfMemory)
        );
    }

    #[test]
    fn test_submit_signals_fence() {
        let backend = DummyBackend::new();
        let fence = Fence::new("test");
        let list = CommandList::empty("frame");
        backend
            .submit(
                &list,
                Some(FenceSignal {
                    fence: fence.clone(),
                    value: 3,
                }),
            )
            .unwrap();
        assert_eq!(fence.completed_value(), 3);
        assert_eq!(backend.submission_count(), 1);
    }

    #[test]
    fn test_read_texture_size() {
        let backend = DummyBackend::new();
        let desc = texture_desc();
        backend.create_texture(ResourceId(5), &desc).unwrap();
        let pixels = backend.read_texture(ResourceId(5), &desc).unwrap();
        assert_eq!(pixels.len(), 64);
        assert!(backend.read_texture(ResourceId(6), &desc).is_err());
    }
}
