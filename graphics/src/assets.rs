//! Registry of GPU-resident meshes and materials.
//!
//! The scene graph refers to geometry and materials by [`MeshId`] and
//! [`MaterialId`]. [`GpuAssets`] maps those ids to uploaded GPU resources.
//! It is shared between the producer (which checks residency while building
//! a scene proxy) and the render thread (which resolves ids to buffers and
//! programs while recording). Ids are resolved every frame; passes never
//! keep the returned handles beyond a single `render` call.

use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec3;
use parking_lot::RwLock;

use lumen_core::ids::{MaterialId, MeshId};

use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::resources::{Buffer, Program, Texture};
use crate::types::{BlendMode, BufferDescriptor, ProgramDescriptor};

/// Uploaded geometry.
#[derive(Debug)]
pub struct GpuMesh {
    /// Interleaved vertex data.
    pub vertex_buffer: Arc<Buffer>,
    /// 32-bit indices.
    pub index_buffer: Arc<Buffer>,
    /// Number of indices to draw.
    pub index_count: u32,
    /// Local-space bounding sphere center.
    pub bounds_center: Vec3,
    /// Local-space bounding sphere radius.
    pub bounds_radius: f32,
}

/// A texture bound to a material parameter slot.
#[derive(Debug, Clone)]
pub struct TextureParameter {
    /// Parameter name as declared by the shader.
    pub name: String,
    /// Binding slot.
    pub slot: u32,
    /// Bound texture.
    pub texture: Arc<Texture>,
}

/// A compiled material ready for drawing.
///
/// Passes bind what the material reports without interpreting shading
/// semantics: the program, the uniform block bytes and the texture list.
#[derive(Debug)]
pub struct MaterialInstance {
    /// Compiled program.
    pub program: Arc<Program>,
    /// Uniform block contents.
    pub uniforms: Vec<u8>,
    /// Texture parameters.
    pub textures: Vec<TextureParameter>,
    /// Blend mode; anything other than `Opaque` is drawn in the translucency pass.
    pub blend: BlendMode,
}

impl MaterialInstance {
    /// Whether the material is drawn with blending.
    pub fn is_translucent(&self) -> bool {
        self.blend != BlendMode::Opaque
    }
}

/// Description of a material to create.
#[derive(Debug, Clone)]
pub struct MaterialDescriptor {
    /// Shader module name.
    pub shader: String,
    /// Uniform block contents.
    pub uniforms: Vec<u8>,
    /// Texture parameters.
    pub textures: Vec<TextureParameter>,
    /// Blend mode.
    pub blend: BlendMode,
}

impl MaterialDescriptor {
    /// Opaque material with no parameters.
    pub fn new(shader: impl Into<String>) -> Self {
        Self {
            shader: shader.into(),
            uniforms: Vec::new(),
            textures: Vec::new(),
            blend: BlendMode::Opaque,
        }
    }

    /// Set the uniform block from a plain-old-data value.
    pub fn with_uniforms<T: bytemuck::Pod>(mut self, value: &T) -> Self {
        self.uniforms = bytemuck::bytes_of(value).to_vec();
        self
    }

    /// Add a texture parameter.
    pub fn with_texture(mut self, name: impl Into<String>, slot: u32, texture: Arc<Texture>) -> Self {
        self.textures.push(TextureParameter {
            name: name.into(),
            slot,
            texture,
        });
        self
    }

    /// Set the blend mode.
    pub fn with_blend(mut self, blend: BlendMode) -> Self {
        self.blend = blend;
        self
    }
}

/// Shared registry of resident meshes and materials.
#[derive(Debug, Default)]
pub struct GpuAssets {
    meshes: RwLock<HashMap<MeshId, Arc<GpuMesh>>>,
    materials: RwLock<HashMap<MaterialId, Arc<MaterialInstance>>>,
}

impl GpuAssets {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload geometry and register it under `id`, replacing any previous mesh.
    ///
    /// # Errors
    ///
    /// Returns an error if either buffer cannot be created.
    pub fn upload_mesh(
        &self,
        device: &Arc<GraphicsDevice>,
        id: MeshId,
        vertices: &[u8],
        indices: &[u32],
        bounds_center: Vec3,
        bounds_radius: f32,
    ) -> Result<Arc<GpuMesh>, GraphicsError> {
        let vertex_buffer = device.create_buffer_init(
            &BufferDescriptor::vertices(vertices.len())
                .with_label(format!("{id} vertices")),
            vertices,
        )?;
        let index_bytes: &[u8] = bytemuck::cast_slice(indices);
        let index_buffer = device.create_buffer_init(
            &BufferDescriptor::indices(indices.len())
                .with_label(format!("{id} indices")),
            index_bytes,
        )?;

        let mesh = Arc::new(GpuMesh {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
            bounds_center,
            bounds_radius,
        });
        self.meshes.write().insert(id, Arc::clone(&mesh));
        log::debug!("GpuAssets: {id} resident ({} indices)", indices.len());
        Ok(mesh)
    }

    /// Compile a material and register it under `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be created.
    pub fn create_material(
        &self,
        device: &Arc<GraphicsDevice>,
        id: MaterialId,
        descriptor: MaterialDescriptor,
    ) -> Result<Arc<MaterialInstance>, GraphicsError> {
        let program = device.create_program(
            &ProgramDescriptor::new(descriptor.shader.clone())
                .with_label(format!("{id} {}", descriptor.shader))
                .with_blend(descriptor.blend),
        )?;
        let material = Arc::new(MaterialInstance {
            program,
            uniforms: descriptor.uniforms,
            textures: descriptor.textures,
            blend: descriptor.blend,
        });
        self.materials.write().insert(id, Arc::clone(&material));
        log::debug!("GpuAssets: {id} resident ('{}')", descriptor.shader);
        Ok(material)
    }

    /// Resolve a mesh id.
    pub fn mesh(&self, id: MeshId) -> Option<Arc<GpuMesh>> {
        self.meshes.read().get(&id).cloned()
    }

    /// Resolve a material id.
    pub fn material(&self, id: MaterialId) -> Option<Arc<MaterialInstance>> {
        self.materials.read().get(&id).cloned()
    }

    /// Whether a mesh is resident.
    pub fn has_mesh(&self, id: MeshId) -> bool {
        self.meshes.read().contains_key(&id)
    }

    /// Whether a material is resident.
    pub fn has_material(&self, id: MaterialId) -> bool {
        self.materials.read().contains_key(&id)
    }

    /// Evict a mesh. GPU buffers are released once the last frame using them drops its handle.
    pub fn evict_mesh(&self, id: MeshId) -> bool {
        self.meshes.write().remove(&id).is_some()
    }

    /// Evict a material.
    pub fn evict_material(&self, id: MaterialId) -> bool {
        self.materials.write().remove(&id).is_some()
    }

    /// Number of resident meshes.
    pub fn mesh_count(&self) -> usize {
        self.meshes.read().len()
    }

    /// Number of resident materials.
    pub fn material_count(&self) -> usize {
        self.materials.read().len()
    }
}

static_assertions::assert_impl_all!(GpuAssets: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_and_resolve_mesh() {
        let (device, _) = GraphicsDevice::with_dummy_backend();
        let assets = GpuAssets::new();
        let id = MeshId::new(1);
        assert!(!assets.has_mesh(id));

        assets
            .upload_mesh(&device, id, &[0u8; 36], &[0, 1, 2], Vec3::ZERO, 1.0)
            .unwrap();
        let mesh = assets.mesh(id).unwrap();
        assert_eq!(mesh.index_count, 3);
        assert_eq!(mesh.index_buffer.size(), 12);
        assert_eq!(device.buffer_count(), 2);
    }

    #[test]
    fn test_material_blend() {
        let (device, _) = GraphicsDevice::with_dummy_backend();
        let assets = GpuAssets::new();
        let glass = assets
            .create_material(
                &device,
                MaterialId::new(2),
                MaterialDescriptor::new("glass").with_blend(BlendMode::AlphaBlend),
            )
            .unwrap();
        assert!(glass.is_translucent());
        assert_eq!(glass.program.shader(), "glass");
    }

    #[test]
    fn test_evict_releases_after_last_handle() {
        let (device, _) = GraphicsDevice::with_dummy_backend();
        let assets = GpuAssets::new();
        let id = MeshId::new(3);
        assets
            .upload_mesh(&device, id, &[0u8; 12], &[0], Vec3::ZERO, 1.0)
            .unwrap();
        let in_flight = assets.mesh(id).unwrap();
        assert!(assets.evict_mesh(id));
        assert_eq!(device.buffer_count(), 2);
        drop(in_flight);
        assert_eq!(device.buffer_count(), 0);
    }
}
