//! GPU resource handles.
//!
//! Resources are created by the [`GraphicsDevice`](crate::GraphicsDevice),
//! shared through `Arc`, and destroyed through the backend when the last
//! handle drops.

mod buffer;
mod program;
mod texture;

pub use buffer::Buffer;
pub use program::Program;
pub use texture::Texture;
