//! GPU backend abstraction layer.
//!
//! The renderer talks to the GPU through the [`GpuBackend`] trait. Resources
//! are named by [`ResourceId`]s handed out by the
//! [`GraphicsDevice`](crate::device::GraphicsDevice); the backend maps them to
//! whatever native objects it owns.
//!
//! # Available Backends
//!
//! - [`DummyBackend`]: no GPU. Records every call as a [`BackendEvent`] so
//!   tests can check creation order, labels and submitted command streams.

pub mod dummy;

use std::fmt;

use crate::commands::CommandList;
use crate::error::GraphicsError;
use crate::sync::Fence;
use crate::types::{BufferDescriptor, ProgramDescriptor, TextureDescriptor};

pub use dummy::{BackendEvent, DummyBackend};

/// Device-unique identifier of a GPU object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gpu#{}", self.0)
    }
}

/// Fence value to signal once a submission has executed.
#[derive(Debug, Clone)]
pub struct FenceSignal {
    /// Fence to signal.
    pub fence: Fence,
    /// Value the fence reaches on completion.
    pub value: u64,
}

/// GPU backend trait for abstracting different GPU APIs.
pub trait GpuBackend: Send + Sync + 'static {
    /// Backend name.
    fn name(&self) -> &'static str;

    /// Create the native texture behind `id`.
    fn create_texture(
        &self,
        id: ResourceId,
        descriptor: &TextureDescriptor,
    ) -> Result<(), GraphicsError>;

    /// Destroy the native texture behind `id`.
    fn destroy_texture(&self, id: ResourceId);

    /// Create the native buffer behind `id`.
    fn create_buffer(&self, id: ResourceId, descriptor: &BufferDescriptor)
    -> Result<(), GraphicsError>;

    /// Destroy the native buffer behind `id`.
    fn destroy_buffer(&self, id: ResourceId);

    /// Create the native program behind `id`.
    fn create_program(
        &self,
        id: ResourceId,
        descriptor: &ProgramDescriptor,
    ) -> Result<(), GraphicsError>;

    /// Destroy the native program behind `id`.
    fn destroy_program(&self, id: ResourceId);

    /// Attach a debug name to an object for graphics debuggers.
    fn set_label(&self, id: ResourceId, label: &str);

    /// Upload bytes into a buffer.
    fn write_buffer(&self, id: ResourceId, offset: u64, data: &[u8]);

    /// Execute a command list, then signal `signal` if given.
    fn submit(&self, list: &CommandList, signal: Option<FenceSignal>) -> Result<(), GraphicsError>;

    /// Copy the contents of a texture back to the CPU.
    ///
    /// The caller is responsible for waiting until every submission writing
    /// the texture has completed.
    fn read_texture(
        &self,
        id: ResourceId,
        descriptor: &TextureDescriptor,
    ) -> Result<Vec<u8>, GraphicsError>;
}
