//! In-memory device.

use indexmap::IndexMap;

use super::device::{Attachment, AttachmentPoint, Device, NativeHandle};
use super::format::TextureFormat;
use crate::error::{Error, Result};

/// Color attachments a framebuffer may bind.
pub const MAX_COLOR_ATTACHMENTS: usize = 8;

/// What the headless device remembers about a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureRecord {
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
}

/// What the headless device remembers about a framebuffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferRecord {
    pub attachments: Vec<Attachment>,
    pub width: u32,
    pub height: u32,
}

/// A [`Device`] that allocates nothing on a GPU.
///
/// Hands out monotonically increasing handles starting at 1 and keeps a
/// record of every live object, which makes it useful for tests, benchmarks
/// and hosts that run graphs without a window.
#[derive(Debug)]
pub struct HeadlessDevice {
    next_handle: u32,
    textures: IndexMap<NativeHandle, TextureRecord>,
    framebuffers: IndexMap<NativeHandle, FramebufferRecord>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            textures: IndexMap::new(),
            framebuffers: IndexMap::new(),
        }
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn texture(&self, handle: NativeHandle) -> Option<&TextureRecord> {
        self.textures.get(&handle)
    }

    pub fn framebuffer(&self, handle: NativeHandle) -> Option<&FramebufferRecord> {
        self.framebuffers.get(&handle)
    }

    fn allocate(&mut self) -> NativeHandle {
        let handle = NativeHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn check_complete(&self, attachments: &[Attachment]) -> Result<()> {
        if attachments.is_empty() {
            return Err(Error::IncompleteFramebuffer(
                "no attachments".to_string(),
            ));
        }

        let depth_or_stencil = attachments
            .iter()
            .filter(|a| a.point.is_depth_or_stencil())
            .count();
        if depth_or_stencil > 1 {
            return Err(Error::IncompleteFramebuffer(format!(
                "{depth_or_stencil} depth/stencil attachments"
            )));
        }

        let color = attachments.len() - depth_or_stencil;
        if color > MAX_COLOR_ATTACHMENTS {
            return Err(Error::IncompleteFramebuffer(format!(
                "{color} color attachments, at most {MAX_COLOR_ATTACHMENTS} supported"
            )));
        }

        for attachment in attachments {
            if !self.textures.contains_key(&attachment.texture) {
                return Err(Error::IncompleteFramebuffer(format!(
                    "texture {:?} is not live",
                    attachment.texture
                )));
            }
            if let AttachmentPoint::Color(index) = attachment.point {
                if index as usize >= MAX_COLOR_ATTACHMENTS {
                    return Err(Error::IncompleteFramebuffer(format!(
                        "color attachment {index} out of range"
                    )));
                }
            }
        }

        Ok(())
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for HeadlessDevice {
    fn create_texture(
        &mut self,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> Result<NativeHandle> {
        let handle = self.allocate();
        self.textures.insert(
            handle,
            TextureRecord {
                format,
                width,
                height,
            },
        );
        tracing::trace!(?handle, %format, width, height, "texture created");
        Ok(handle)
    }

    fn destroy_texture(&mut self, texture: NativeHandle) {
        self.textures.shift_remove(&texture);
    }

    fn create_framebuffer(
        &mut self,
        attachments: &[Attachment],
        width: u32,
        height: u32,
    ) -> Result<NativeHandle> {
        self.check_complete(attachments)?;
        let handle = self.allocate();
        self.framebuffers.insert(
            handle,
            FramebufferRecord {
                attachments: attachments.to_vec(),
                width,
                height,
            },
        );
        tracing::trace!(?handle, attachments = attachments.len(), "framebuffer created");
        Ok(handle)
    }

    fn destroy_framebuffer(&mut self, framebuffer: NativeHandle) {
        self.framebuffers.shift_remove(&framebuffer);
    }
}
