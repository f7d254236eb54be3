//! Final copy into the caller's output.

use crate::commands::{CommandEncoder, Filter};
use crate::resources::Texture;

/// Copies the final target into the output texture, scaling when the sizes
/// differ.
#[derive(Debug, Clone, Copy)]
pub struct BlitPass {
    /// Filter used when scaling.
    pub filter: Filter,
}

impl BlitPass {
    /// Create the pass with linear filtering.
    pub fn new() -> Self {
        Self {
            filter: Filter::Linear,
        }
    }

    /// Record the copy. Returns `true` if a scaled blit was needed.
    pub fn record(&self, encoder: &mut CommandEncoder, src: &Texture, dst: &Texture) -> bool {
        encoder.push_debug_group("Blit");
        let scaled = src.size() != dst.size() || src.format() != dst.format();
        if scaled {
            encoder.blit_texture(src, dst, self.filter);
        } else {
            encoder.copy_texture(src, dst);
        }
        encoder.pop_debug_group();
        scaled
    }
}

impl Default for BlitPass {
    fn default() -> Self {
        Self::new()
    }
}
