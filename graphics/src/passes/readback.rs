//! Screenshot readback.
//!
//! Recording happens inside the frame's command stream: when the request
//! names a size different from the final target, the target is blitted into
//! a scratch texture of that size. After submission the renderer calls
//! [`ReadbackPass::complete`], which waits on the frame fence before reading
//! the pixels and replying on the request's channel.

use std::sync::Arc;

use crate::commands::{CommandEncoder, Filter};
use crate::device::GraphicsDevice;
use crate::error::fatal;
use crate::proxy::{Screenshot, ScreenshotRequest};
use crate::resources::Texture;
use crate::sync::Fence;
use crate::types::{TextureDescriptor, TextureUsage};

/// Reads the final target back to the CPU on request.
#[derive(Debug, Default)]
pub struct ReadbackPass {
    scratch: Option<Arc<Texture>>,
}

impl ReadbackPass {
    /// Create the pass.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record any resize needed for `request` and return the texture to read.
    ///
    /// # Panics
    ///
    /// Panics if the scratch texture cannot be created.
    pub fn record(
        &mut self,
        device: &Arc<GraphicsDevice>,
        encoder: &mut CommandEncoder,
        source: &Arc<Texture>,
        request: &ScreenshotRequest,
    ) -> Arc<Texture> {
        let Some(size) = request.size.filter(|size| *size != source.extent()) else {
            return Arc::clone(source);
        };

        let scratch = match &self.scratch {
            Some(texture) if texture.extent() == size && texture.format() == source.format() => {
                Arc::clone(texture)
            }
            _ => {
                let descriptor = TextureDescriptor::from_extent(
                    size,
                    source.format(),
                    TextureUsage::COPY_DST
                        | TextureUsage::COPY_SRC
                        | TextureUsage::RENDER_ATTACHMENT,
                )
                .with_label("Screenshot.Resize");
                let texture = device
                    .create_texture(&descriptor)
                    .unwrap_or_else(|err| fatal("ReadbackPass: creating Screenshot.Resize", err));
                self.scratch = Some(Arc::clone(&texture));
                texture
            }
        };
        encoder.push_debug_group("Readback");
        encoder.blit_texture(source, &scratch, Filter::Linear);
        encoder.pop_debug_group();
        scratch
    }

    /// Wait for the frame, read `texture` and send it to the requester.
    ///
    /// Returns `true` if the screenshot was delivered. A failed read or a
    /// dropped receiver is logged and reported as `false`.
    pub fn complete(
        &self,
        device: &GraphicsDevice,
        fence: &Fence,
        fence_value: u64,
        texture: &Texture,
        request: &ScreenshotRequest,
        frame_number: u64,
    ) -> bool {
        lumen_core::profile_scope!("ReadbackPass::complete");

        fence.wait(fence_value);
        let pixels = match device.read_texture(texture) {
            Ok(pixels) => pixels,
            Err(err) => {
                log::error!("ReadbackPass: frame {frame_number}: {err}");
                return false;
            }
        };
        let screenshot = Screenshot {
            frame_number,
            width: texture.width(),
            height: texture.height(),
            format: texture.format(),
            pixels,
        };
        match request.reply.try_send(screenshot) {
            Ok(()) => {
                log::debug!(
                    "ReadbackPass: frame {frame_number} delivered {}",
                    texture.extent()
                );
                true
            }
            Err(err) => {
                log::warn!("ReadbackPass: frame {frame_number} screenshot dropped: {err}");
                false
            }
        }
    }

    /// Drop the scratch texture.
    pub fn release_resources(&mut self) {
        self.scratch = None;
    }
}
