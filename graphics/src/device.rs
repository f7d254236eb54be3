//! Graphics device.
//!
//! The [`GraphicsDevice`] is the render context threaded through the whole
//! pipeline: every pass, target pool and readback receives it explicitly
//! instead of reaching for a global device handle. It validates descriptors,
//! assigns [`ResourceId`]s, labels every object at creation and forwards
//! work to its [`GpuBackend`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::backend::{DummyBackend, FenceSignal, GpuBackend, ResourceId};
use crate::commands::CommandList;
use crate::error::GraphicsError;
use crate::resources::{Buffer, Program, Texture};
use crate::sync::Fence;
use crate::types::{BufferDescriptor, ProgramDescriptor, TextureDescriptor};

/// Capabilities of a graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceCapabilities {
    /// Maximum texture width or height.
    pub max_texture_dimension: u32,
    /// Maximum array layers per texture.
    pub max_texture_layers: u32,
    /// Maximum buffer size.
    pub max_buffer_size: u64,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            max_texture_dimension: 16384,
            max_texture_layers: 2048,
            max_buffer_size: 1 << 30, // 1 GB
        }
    }
}

/// A graphics device for creating GPU resources and submitting work.
///
/// # Thread Safety
///
/// `GraphicsDevice` is `Send + Sync`. The producer thread uses it to build
/// mesh and material resources while the render thread records and submits
/// frames.
pub struct GraphicsDevice {
    backend: Arc<dyn GpuBackend>,
    name: String,
    capabilities: DeviceCapabilities,
    next_id: AtomicU64,
    submissions: AtomicU64,
    // Weak references so counts reflect live resources only
    buffers: RwLock<Vec<Weak<Buffer>>>,
    textures: RwLock<Vec<Weak<Texture>>>,
    programs: RwLock<Vec<Weak<Program>>>,
}

impl GraphicsDevice {
    /// Create a device on top of `backend`.
    pub fn new(backend: Arc<dyn GpuBackend>, capabilities: DeviceCapabilities) -> Arc<Self> {
        let name = backend.name().to_string();
        log::info!("GraphicsDevice: created on '{name}'");
        Arc::new(Self {
            backend,
            name,
            capabilities,
            next_id: AtomicU64::new(1),
            submissions: AtomicU64::new(0),
            buffers: RwLock::new(Vec::new()),
            textures: RwLock::new(Vec::new()),
            programs: RwLock::new(Vec::new()),
        })
    }

    /// Create a device on a recording [`DummyBackend`] and return both.
    pub fn with_dummy_backend() -> (Arc<Self>, Arc<DummyBackend>) {
        let backend = Arc::new(DummyBackend::new());
        let device = Self::new(backend.clone(), DeviceCapabilities::default());
        (device, backend)
    }

    /// The backend executing this device's work.
    pub fn backend(&self) -> &dyn GpuBackend {
        self.backend.as_ref()
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the device capabilities.
    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn allocate_id(&self) -> ResourceId {
        ResourceId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn label_object(&self, id: ResourceId, label: Option<&str>) {
        if let Some(label) = label {
            self.backend.set_label(id, label);
        }
    }

    /// Create a GPU texture.
    ///
    /// # Errors
    ///
    /// Returns an error if the texture dimensions exceed device limits or allocation fails.
    pub fn create_texture(
        self: &Arc<Self>,
        descriptor: &TextureDescriptor,
    ) -> Result<Arc<Texture>, GraphicsError> {
        let max_dim = self.capabilities.max_texture_dimension;
        if descriptor.size.width > max_dim || descriptor.size.height > max_dim {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture {:?} dimension exceeds maximum {max_dim}",
                descriptor.label
            )));
        }
        if descriptor.size.depth > self.capabilities.max_texture_layers {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture {:?} layer count {} exceeds maximum {}",
                descriptor.label, descriptor.size.depth, self.capabilities.max_texture_layers
            )));
        }
        if descriptor.size.width == 0 || descriptor.size.height == 0 || descriptor.size.depth == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture {:?} dimensions cannot be zero",
                descriptor.label
            )));
        }
        if descriptor.mip_level_count == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture {:?} needs at least one mip level",
                descriptor.label
            )));
        }

        let id = self.allocate_id();
        self.backend.create_texture(id, descriptor)?;
        self.label_object(id, descriptor.label.as_deref());

        let texture = Arc::new(Texture::new(Arc::clone(self), id, descriptor.clone()));
        self.textures.write().push(Arc::downgrade(&texture));

        log::trace!(
            "GraphicsDevice: created texture {:?}, size={}x{}x{}",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.size.depth
        );

        Ok(texture)
    }

    /// Create a GPU buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer size exceeds device limits or allocation fails.
    pub fn create_buffer(
        self: &Arc<Self>,
        descriptor: &BufferDescriptor,
    ) -> Result<Arc<Buffer>, GraphicsError> {
        if descriptor.size > self.capabilities.max_buffer_size {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer size {} exceeds maximum {}",
                descriptor.size, self.capabilities.max_buffer_size
            )));
        }
        if descriptor.size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "buffer size cannot be zero".to_string(),
            ));
        }

        let id = self.allocate_id();
        self.backend.create_buffer(id, descriptor)?;
        self.label_object(id, descriptor.label.as_deref());

        let buffer = Arc::new(Buffer::new(Arc::clone(self), id, descriptor.clone()));
        self.buffers.write().push(Arc::downgrade(&buffer));

        log::trace!(
            "GraphicsDevice: created buffer {:?}, size={}",
            descriptor.label,
            descriptor.size
        );

        Ok(buffer)
    }

    /// Create a buffer and fill it with `data`.
    pub fn create_buffer_init(
        self: &Arc<Self>,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<Arc<Buffer>, GraphicsError> {
        let buffer = self.create_buffer(descriptor)?;
        self.write_buffer(&buffer, 0, data)?;
        Ok(buffer)
    }

    /// Create a shader program.
    ///
    /// # Errors
    ///
    /// Returns an error if the shader name is empty or the backend rejects it.
    pub fn create_program(
        self: &Arc<Self>,
        descriptor: &ProgramDescriptor,
    ) -> Result<Arc<Program>, GraphicsError> {
        if descriptor.shader.is_empty() {
            return Err(GraphicsError::InvalidParameter(
                "program shader name cannot be empty".to_string(),
            ));
        }

        let id = self.allocate_id();
        self.backend.create_program(id, descriptor)?;
        self.label_object(id, descriptor.label.as_deref());

        let program = Arc::new(Program::new(Arc::clone(self), id, descriptor.clone()));
        self.programs.write().push(Arc::downgrade(&program));

        log::trace!("GraphicsDevice: created program '{}'", descriptor.shader);

        Ok(program)
    }

    /// Upload bytes into a buffer.
    pub fn write_buffer(&self, buffer: &Buffer, offset: u64, data: &[u8]) -> Result<(), GraphicsError> {
        let end = offset + data.len() as u64;
        if end > buffer.size() {
            return Err(GraphicsError::InvalidParameter(format!(
                "write of {} bytes at offset {offset} overflows buffer {:?} of {} bytes",
                data.len(),
                buffer.label(),
                buffer.size()
            )));
        }
        self.backend.write_buffer(buffer.id(), offset, data);
        Ok(())
    }

    /// Create a timeline fence.
    pub fn create_fence(&self, label: impl Into<String>) -> Fence {
        Fence::new(label)
    }

    /// Submit a command list, optionally signaling `fence` to `value` on completion.
    ///
    /// Returns the device-wide submission index.
    pub fn submit(
        &self,
        list: CommandList,
        signal: Option<(&Fence, u64)>,
    ) -> Result<u64, GraphicsError> {
        let signal = signal.map(|(fence, value)| FenceSignal {
            fence: fence.clone(),
            value,
        });
        self.backend.submit(&list, signal)?;
        Ok(self.submissions.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Number of submissions made through this device.
    pub fn submission_count(&self) -> u64 {
        self.submissions.load(Ordering::Acquire)
    }

    /// Read a texture back to the CPU.
    ///
    /// The caller must wait on the fence of the submission that wrote it.
    pub fn read_texture(&self, texture: &Texture) -> Result<Vec<u8>, GraphicsError> {
        if texture.format().is_depth() {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture {:?} has a depth format and cannot be read back",
                texture.label()
            )));
        }
        self.backend.read_texture(texture.id(), texture.descriptor())
    }

    /// Get the number of live textures created by this device.
    pub fn texture_count(&self) -> usize {
        self.textures
            .read()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Get the number of live buffers created by this device.
    pub fn buffer_count(&self) -> usize {
        self.buffers
            .read()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Get the number of live programs created by this device.
    pub fn program_count(&self) -> usize {
        self.programs
            .read()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Clean up dead weak references to released resources.
    pub fn cleanup_dead_resources(&self) {
        self.buffers.write().retain(|w| w.strong_count() > 0);
        self.textures.write().retain(|w| w.strong_count() > 0);
        self.programs.write().retain(|w| w.strong_count() > 0);
    }
}

impl std::fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

// Ensure GraphicsDevice is Send + Sync
static_assertions::assert_impl_all!(GraphicsDevice: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendEvent;
    use crate::types::{BufferUsage, TextureFormat, TextureUsage};

    fn create_test_device() -> (Arc<GraphicsDevice>, Arc<DummyBackend>) {
        GraphicsDevice::with_dummy_backend()
    }

    #[test]
    fn test_device_name() {
        let (device, _) = create_test_device();
        assert_eq!(device.name(), "Dummy Backend");
    }

    #[test]
    fn test_create_texture_labels_after_create() {
        let (device, backend) = create_test_device();
        let texture = device
            .create_texture(
                &TextureDescriptor::new_2d(
                    512,
                    512,
                    TextureFormat::Rgba8Unorm,
                    TextureUsage::TEXTURE_BINDING,
                )
                .with_label("albedo"),
            )
            .unwrap();
        assert_eq!(texture.width(), 512);
        assert_eq!(device.texture_count(), 1);

        let events = backend.events();
        assert!(matches!(events[0], BackendEvent::CreateTexture { .. }));
        assert_eq!(
            events[1],
            BackendEvent::Label {
                id: texture.id(),
                label: "albedo".to_string()
            }
        );
    }

    #[test]
    fn test_create_texture_zero_size() {
        let (device, _) = create_test_device();
        let result = device.create_texture(&TextureDescriptor::new_2d(
            0,
            512,
            TextureFormat::Rgba8Unorm,
            TextureUsage::TEXTURE_BINDING,
        ));
        assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
    }

    #[test]
    fn test_create_texture_too_large() {
        let (device, _) = create_test_device();
        let result = device.create_texture(&TextureDescriptor::new_2d(
            32768,
            16,
            TextureFormat::Rgba8Unorm,
            TextureUsage::TEXTURE_BINDING,
        ));
        assert!(result.is_err());
    }

    #[test]
    fn test_backend_failure_propagates() {
        let (device, backend) = create_test_device();
        backend.set_fail_texture_creation(true);
        let result = device.create_texture(&TextureDescriptor::new_2d(
            4,
            4,
            TextureFormat::Rgba8Unorm,
            TextureUsage::TEXTURE_BINDING,
        ));
        assert_eq!(result.unwrap_err(), GraphicsError::OutOfMemory);
        assert_eq!(device.texture_count(), 0);
    }

    #[test]
    fn test_texture_drop_destroys() {
        let (device, backend) = create_test_device();
        {
            let _texture = device
                .create_texture(&TextureDescriptor::new_2d(
                    4,
                    4,
                    TextureFormat::Rgba8Unorm,
                    TextureUsage::TEXTURE_BINDING,
                ))
                .unwrap();
            assert_eq!(backend.live_texture_count(), 1);
        }
        assert_eq!(backend.live_texture_count(), 0);
        device.cleanup_dead_resources();
        assert_eq!(device.texture_count(), 0);
    }

    #[test]
    fn test_buffer_write_bounds() {
        let (device, _) = create_test_device();
        let buffer = device
            .create_buffer(&BufferDescriptor::new(16, BufferUsage::UNIFORM))
            .unwrap();
        assert!(device.write_buffer(&buffer, 0, &[0u8; 16]).is_ok());
        assert!(device.write_buffer(&buffer, 8, &[0u8; 16]).is_err());
    }

    #[test]
    fn test_create_buffer_zero_size() {
        let (device, _) = create_test_device();
        let result = device.create_buffer(&BufferDescriptor::new(0, BufferUsage::VERTEX));
        assert!(result.is_err());
    }

    #[test]
    fn test_create_program() {
        let (device, _) = create_test_device();
        let program = device
            .create_program(&ProgramDescriptor::new("tone_mapping").with_label("tone_mapping"))
            .unwrap();
        assert_eq!(program.shader(), "tone_mapping");
        assert_eq!(device.program_count(), 1);
        assert!(device.create_program(&ProgramDescriptor::new("")).is_err());
    }

    #[test]
    fn test_submit_counts_and_signals() {
        let (device, backend) = create_test_device();
        let fence = device.create_fence("frame");
        let index = device
            .submit(CommandList::empty("frame"), Some((&fence, 1)))
            .unwrap();
        assert_eq!(index, 1);
        assert_eq!(fence.completed_value(), 1);
        assert_eq!(backend.submission_count(), 1);
    }

    #[test]
    fn test_read_texture_rejects_depth() {
        let (device, _) = create_test_device();
        let depth = device
            .create_texture(&TextureDescriptor::new_2d(
                8,
                8,
                TextureFormat::Depth32Float,
                TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC,
            ))
            .unwrap();
        assert!(device.read_texture(&depth).is_err());

        let color = device
            .create_texture(&TextureDescriptor::new_2d(
                8,
                8,
                TextureFormat::Rgba8Unorm,
                TextureUsage::COPY_SRC,
            ))
            .unwrap();
        assert_eq!(device.read_texture(&color).unwrap().len(), 8 * 8 * 4);
    }
}
