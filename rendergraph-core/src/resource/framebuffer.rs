//! Framebuffers built over texture slots.

use smallvec::SmallVec;

use super::device::{Attachment, AttachmentPoint, Device, NativeHandle};
use super::texture::Texture;
use crate::error::{Error, Result};

/// A render target over one or more texture slots of an instance.
///
/// Holds slot indices, not textures: the instance owns the texture table and
/// resizes it first, then hands it to [`Framebuffer::resize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framebuffer {
    textures: SmallVec<[usize; 4]>,
    handle: Option<NativeHandle>,
    width: u32,
    height: u32,
}

impl Framebuffer {
    pub fn new(textures: impl IntoIterator<Item = usize>) -> Self {
        Self {
            textures: textures.into_iter().collect(),
            handle: None,
            width: 0,
            height: 0,
        }
    }

    /// Texture slots bound by this framebuffer, in binding order.
    pub fn textures(&self) -> &[usize] {
        &self.textures
    }

    pub fn handle(&self) -> Option<NativeHandle> {
        self.handle
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Attachment list for the current texture storage.
    ///
    /// Depth, stencil and depth-stencil formats go to their dedicated points;
    /// every other texture takes the next color index.
    pub fn attachments(&self, table: &[Texture]) -> Result<SmallVec<[Attachment; 4]>> {
        let mut color = 0;
        let mut attachments = SmallVec::new();

        for &slot in &self.textures {
            let texture = table
                .get(slot)
                .ok_or_else(|| Error::IncompleteFramebuffer(format!("no texture slot t{slot}")))?;
            let handle = texture.handle().ok_or_else(|| {
                Error::IncompleteFramebuffer(format!("texture slot t{slot} has no storage"))
            })?;

            let format = texture.format();
            let point = if format.is_depth() {
                AttachmentPoint::Depth
            } else if format.is_stencil() {
                AttachmentPoint::Stencil
            } else if format.is_depth_stencil() {
                AttachmentPoint::DepthStencil
            } else {
                color += 1;
                AttachmentPoint::Color(color - 1)
            };

            attachments.push(Attachment {
                point,
                texture: handle,
            });
        }

        Ok(attachments)
    }

    /// Recreate the native framebuffer at `width` x `height`.
    ///
    /// Every bound texture must already have storage of exactly that size.
    pub fn resize(
        &mut self,
        device: &mut dyn Device,
        table: &[Texture],
        width: u32,
        height: u32,
    ) -> Result<NativeHandle> {
        self.release(device);

        for &slot in &self.textures {
            if let Some(texture) = table.get(slot) {
                if (texture.width(), texture.height()) != (width, height) {
                    return Err(Error::IncompleteFramebuffer(format!(
                        "texture slot t{slot} is {}x{}, framebuffer is {width}x{height}",
                        texture.width(),
                        texture.height()
                    )));
                }
            }
        }

        let attachments = self.attachments(table)?;
        let handle = device.create_framebuffer(&attachments, width, height)?;
        self.handle = Some(handle);
        self.width = width;
        self.height = height;
        Ok(handle)
    }

    pub fn release(&mut self, device: &mut dyn Device) {
        if let Some(handle) = self.handle.take() {
            device.destroy_framebuffer(handle);
        }
    }
}
