//! GPU Resources
//!
//! Texture and framebuffer slots of a compiled instance, and the [`Device`]
//! trait through which they reach native graphics storage.
//!
//! The instance never talks to a graphics API directly. Everything native goes
//! through a `Device`, which the host implements; [`HeadlessDevice`] is the
//! in-memory implementation.

mod device;
mod format;
mod framebuffer;
mod headless;
mod texture;

pub use device::{Attachment, AttachmentPoint, Device, NativeHandle};
pub use format::TextureFormat;
pub use framebuffer::Framebuffer;
pub use headless::{FramebufferRecord, HeadlessDevice, TextureRecord, MAX_COLOR_ATTACHMENTS};
pub use texture::Texture;
