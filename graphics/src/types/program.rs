//! Shader program descriptors.
//!
//! Programs are compiled by the material/shader system. The renderer only
//! names them and binds what it is given.

/// How a program's output is combined with the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Overwrite.
    #[default]
    Opaque,
    /// `dst + src`.
    Additive,
    /// `dst * (1 - src.a) + src * src.a`.
    AlphaBlend,
}

/// Descriptor for creating a shader program.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ProgramDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Shader module name resolved by the shader system.
    pub shader: String,
    /// Preprocessor defines.
    pub defines: Vec<(String, String)>,
    /// Output blending.
    pub blend: BlendMode,
}

impl ProgramDescriptor {
    /// Program built from the named shader module.
    pub fn new(shader: impl Into<String>) -> Self {
        Self {
            shader: shader.into(),
            ..Self::default()
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add a preprocessor define.
    pub fn with_define(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defines.push((name.into(), value.into()));
        self
    }

    /// Set the output blend mode.
    pub fn with_blend(mut self, blend: BlendMode) -> Self {
        self.blend = blend;
        self
    }
}
