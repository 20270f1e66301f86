//! The native graphics collaborator.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::format::TextureFormat;
use crate::error::Result;

/// Opaque handle of a native texture or framebuffer object.
///
/// `0` is never handed out by a device; as a framebuffer it names the
/// window surface.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NativeHandle(pub u32);

impl NativeHandle {
    pub const NULL: NativeHandle = NativeHandle(0);

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a texture is bound inside a framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentPoint {
    Color(u32),
    Depth,
    Stencil,
    DepthStencil,
}

impl AttachmentPoint {
    /// True for every point except `Color`.
    pub fn is_depth_or_stencil(&self) -> bool {
        !matches!(self, Self::Color(_))
    }
}

/// One texture bound to one attachment point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachment {
    pub point: AttachmentPoint,
    pub texture: NativeHandle,
}

/// Native resource provisioning.
///
/// Implemented by the host's graphics layer. Creation replaces nothing: the
/// caller destroys the previous object before asking for a new one.
pub trait Device {
    /// Allocate storage for a `width` x `height` texture.
    fn create_texture(
        &mut self,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> Result<NativeHandle>;

    fn destroy_texture(&mut self, texture: NativeHandle);

    /// Create a framebuffer over `attachments`.
    ///
    /// Fails with [`Error::IncompleteFramebuffer`](crate::error::Error::IncompleteFramebuffer)
    /// if the attachment set is not renderable.
    fn create_framebuffer(
        &mut self,
        attachments: &[Attachment],
        width: u32,
        height: u32,
    ) -> Result<NativeHandle>;

    fn destroy_framebuffer(&mut self, framebuffer: NativeHandle);
}
