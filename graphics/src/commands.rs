//! Command recording.
//!
//! Passes record into a [`CommandEncoder`]; the renderer finishes it into a
//! [`CommandList`] and submits it through the device. Commands reference
//! resources by [`ResourceId`], so a finished list holds no borrows of the
//! frame's scene snapshot.

use crate::backend::ResourceId;
use crate::resources::{Buffer, Program, Texture};
use crate::types::{ClearValue, ScissorRect, Viewport};

/// Depth comparison used by a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthTest {
    /// Pass if nearer.
    Less,
    /// Pass if nearer or equal.
    LessEqual,
    /// Pass only where depth matches the stored value (after a depth pre-pass).
    Equal,
    /// Always pass.
    Always,
}

/// Color attachment of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAttachment {
    /// Target texture.
    pub texture: ResourceId,
    /// Array layer rendered to.
    pub layer: u32,
    /// Clear or load.
    pub clear: ClearValue,
}

impl ColorAttachment {
    /// Keep existing contents.
    pub fn load(texture: &Texture) -> Self {
        Self {
            texture: texture.id(),
            layer: 0,
            clear: ClearValue::Load,
        }
    }

    /// Clear to `color` first.
    pub fn clear(texture: &Texture, color: [f32; 4]) -> Self {
        Self {
            texture: texture.id(),
            layer: 0,
            clear: ClearValue::Color(color),
        }
    }

    /// Render to a specific array layer.
    pub fn with_layer(mut self, layer: u32) -> Self {
        self.layer = layer;
        self
    }
}

/// Depth attachment of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthAttachment {
    /// Depth texture.
    pub texture: ResourceId,
    /// Array layer rendered to.
    pub layer: u32,
    /// Clear or load.
    pub clear: ClearValue,
    /// Comparison function.
    pub test: DepthTest,
    /// Whether depth is written.
    pub write: bool,
}

impl DepthAttachment {
    /// Cleared depth with `LessEqual` testing and writes enabled.
    pub fn clear(texture: &Texture) -> Self {
        Self {
            texture: texture.id(),
            layer: 0,
            clear: ClearValue::FAR_DEPTH,
            test: DepthTest::LessEqual,
            write: true,
        }
    }

    /// Existing depth with the given test and no writes.
    pub fn read_only(texture: &Texture, test: DepthTest) -> Self {
        Self {
            texture: texture.id(),
            layer: 0,
            clear: ClearValue::Load,
            test,
            write: false,
        }
    }

    /// Render to a specific array layer.
    pub fn with_layer(mut self, layer: u32) -> Self {
        self.layer = layer;
        self
    }
}

/// Sampling filter for blits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    /// Nearest texel.
    Nearest,
    /// Bilinear.
    Linear,
}

/// Uniform block binding points shared by every program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformSlot {
    /// Per-view data: camera matrices, frame index.
    View,
    /// Per-pass parameters.
    Pass,
    /// Per-draw data: object transform, light.
    Object,
    /// Material parameters reported by the material system.
    Material,
}

/// A recorded GPU command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Open a named debug region.
    PushDebugGroup(String),
    /// Close the innermost debug region.
    PopDebugGroup,
    /// Begin a render pass.
    BeginRenderPass {
        /// Pass label.
        label: String,
        /// Color targets.
        colors: Vec<ColorAttachment>,
        /// Depth target.
        depth: Option<DepthAttachment>,
    },
    /// End the current render pass.
    EndRenderPass,
    /// Set the viewport.
    SetViewport(Viewport),
    /// Set or clear the scissor rectangle.
    SetScissor(Option<ScissorRect>),
    /// Bind a program.
    BindProgram(ResourceId),
    /// Set a uniform block for following draws.
    SetUniforms {
        /// Block slot, see [`UniformSlot`].
        slot: UniformSlot,
        /// Block contents.
        bytes: Vec<u8>,
    },
    /// Bind a texture to a slot.
    BindTexture {
        /// Binding slot.
        slot: u32,
        /// Texture.
        texture: ResourceId,
    },
    /// Indexed draw.
    DrawIndexed {
        /// Vertex buffer.
        vertex_buffer: ResourceId,
        /// Index buffer.
        index_buffer: ResourceId,
        /// Index count.
        index_count: u32,
        /// Instance count.
        instance_count: u32,
    },
    /// Non-indexed draw of procedurally generated vertices.
    Draw {
        /// Vertex count.
        vertex_count: u32,
        /// Instance count.
        instance_count: u32,
    },
    /// Full-screen triangle.
    DrawFullscreen,
    /// Compute dispatch.
    Dispatch {
        /// Groups along X.
        x: u32,
        /// Groups along Y.
        y: u32,
        /// Groups along Z.
        z: u32,
    },
    /// Same-size texture copy.
    CopyTexture {
        /// Source.
        src: ResourceId,
        /// Destination.
        dst: ResourceId,
    },
    /// Scaled texture copy.
    BlitTexture {
        /// Source.
        src: ResourceId,
        /// Destination.
        dst: ResourceId,
        /// Filter.
        filter: Filter,
    },
}

/// A finished, submittable list of commands.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandList {
    label: String,
    commands: Vec<Command>,
}

impl CommandList {
    /// A list with no commands.
    pub fn empty(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            commands: Vec::new(),
        }
    }

    /// List label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Recorded commands.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the list has no commands.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Labels of render passes in recording order.
    pub fn render_pass_labels(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::BeginRenderPass { label, .. } => Some(label.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The `BeginRenderPass` command with the given label.
    pub fn find_render_pass(&self, label: &str) -> Option<&Command> {
        self.commands.iter().find(|command| {
            matches!(command, Command::BeginRenderPass { label: l, .. } if l == label)
        })
    }

    /// Number of draw commands of any kind.
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| {
                matches!(
                    command,
                    Command::DrawIndexed { .. } | Command::Draw { .. } | Command::DrawFullscreen
                )
            })
            .count()
    }
}

/// Records commands for one submission.
#[derive(Debug)]
pub struct CommandEncoder {
    label: String,
    commands: Vec<Command>,
    in_render_pass: bool,
    debug_depth: u32,
}

impl CommandEncoder {
    /// Start recording.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            commands: Vec::with_capacity(256),
            in_render_pass: false,
            debug_depth: 0,
        }
    }

    /// Open a named debug region.
    pub fn push_debug_group(&mut self, label: impl Into<String>) {
        self.debug_depth += 1;
        self.commands.push(Command::PushDebugGroup(label.into()));
    }

    /// Close the innermost debug region.
    ///
    /// # Panics
    ///
    /// Panics if no region is open.
    pub fn pop_debug_group(&mut self) {
        assert!(self.debug_depth > 0, "pop_debug_group without matching push");
        self.debug_depth -= 1;
        self.commands.push(Command::PopDebugGroup);
    }

    /// Begin a render pass.
    ///
    /// # Panics
    ///
    /// Panics if a render pass is already open.
    pub fn begin_render_pass(
        &mut self,
        label: impl Into<String>,
        colors: &[ColorAttachment],
        depth: Option<DepthAttachment>,
    ) {
        let label = label.into();
        assert!(
            !self.in_render_pass,
            "begin_render_pass('{label}') while another render pass is open"
        );
        self.in_render_pass = true;
        self.commands.push(Command::BeginRenderPass {
            label,
            colors: colors.to_vec(),
            depth,
        });
    }

    /// End the current render pass.
    pub fn end_render_pass(&mut self) {
        assert!(self.in_render_pass, "end_render_pass without begin");
        self.in_render_pass = false;
        self.commands.push(Command::EndRenderPass);
    }

    /// Set the viewport.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.commands.push(Command::SetViewport(viewport));
    }

    /// Set or clear the scissor rectangle.
    pub fn set_scissor(&mut self, scissor: Option<ScissorRect>) {
        self.commands.push(Command::SetScissor(scissor));
    }

    /// Bind a program.
    pub fn bind_program(&mut self, program: &Program) {
        self.commands.push(Command::BindProgram(program.id()));
    }

    /// Set a uniform block from a plain-old-data value.
    pub fn set_uniforms<T: bytemuck::Pod>(&mut self, slot: UniformSlot, value: &T) {
        self.set_uniform_bytes(slot, bytemuck::bytes_of(value));
    }

    /// Set a uniform block from raw bytes.
    pub fn set_uniform_bytes(&mut self, slot: UniformSlot, bytes: &[u8]) {
        self.commands.push(Command::SetUniforms {
            slot,
            bytes: bytes.to_vec(),
        });
    }

    /// Bind a texture to a slot.
    pub fn bind_texture(&mut self, slot: u32, texture: &Texture) {
        self.commands.push(Command::BindTexture {
            slot,
            texture: texture.id(),
        });
    }

    /// Indexed draw.
    pub fn draw_indexed(
        &mut self,
        vertex_buffer: &Buffer,
        index_buffer: &Buffer,
        index_count: u32,
        instance_count: u32,
    ) {
        debug_assert!(self.in_render_pass, "draw outside a render pass");
        self.commands.push(Command::DrawIndexed {
            vertex_buffer: vertex_buffer.id(),
            index_buffer: index_buffer.id(),
            index_count,
            instance_count,
        });
    }

    /// Non-indexed draw.
    pub fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        debug_assert!(self.in_render_pass, "draw outside a render pass");
        self.commands.push(Command::Draw {
            vertex_count,
            instance_count,
        });
    }

    /// Full-screen triangle.
    pub fn draw_fullscreen(&mut self) {
        debug_assert!(self.in_render_pass, "draw outside a render pass");
        self.commands.push(Command::DrawFullscreen);
    }

    /// Compute dispatch.
    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        debug_assert!(!self.in_render_pass, "dispatch inside a render pass");
        self.commands.push(Command::Dispatch { x, y, z });
    }

    /// Same-size copy.
    pub fn copy_texture(&mut self, src: &Texture, dst: &Texture) {
        debug_assert_eq!(src.size(), dst.size(), "copy_texture size mismatch");
        self.commands.push(Command::CopyTexture {
            src: src.id(),
            dst: dst.id(),
        });
    }

    /// Scaled copy.
    pub fn blit_texture(&mut self, src: &Texture, dst: &Texture, filter: Filter) {
        self.commands.push(Command::BlitTexture {
            src: src.id(),
            dst: dst.id(),
            filter,
        });
    }

    /// Number of commands recorded so far.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Finish recording.
    ///
    /// # Panics
    ///
    /// Panics if a render pass or debug group is still open.
    pub fn finish(self) -> CommandList {
        assert!(
            !self.in_render_pass,
            "CommandEncoder '{}' finished with an open render pass",
            self.label
        );
        assert_eq!(
            self.debug_depth, 0,
            "CommandEncoder '{}' finished with open debug groups",
            self.label
        );
        CommandList {
            label: self.label,
            commands: self.commands,
        }
    }
}
