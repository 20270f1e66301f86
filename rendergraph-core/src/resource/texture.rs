//! Texture slots.

use super::device::{Device, NativeHandle};
use super::format::TextureFormat;
use crate::error::Result;

/// A texture slot: a format plus, once sized, its native storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    format: TextureFormat,
    width: u32,
    height: u32,
    handle: Option<NativeHandle>,
}

impl Texture {
    /// An unallocated texture. Storage is created by the first `resize`.
    pub fn new(format: TextureFormat) -> Self {
        Self {
            format,
            width: 0,
            height: 0,
            handle: None,
        }
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn handle(&self) -> Option<NativeHandle> {
        self.handle
    }

    /// Drop the old storage and allocate new storage at `width` x `height`.
    pub fn resize(&mut self, device: &mut dyn Device, width: u32, height: u32) -> Result<()> {
        self.release(device);
        let handle = device.create_texture(self.format, width, height)?;
        self.handle = Some(handle);
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Free native storage, if any.
    pub fn release(&mut self, device: &mut dyn Device) {
        if let Some(handle) = self.handle.take() {
            device.destroy_texture(handle);
        }
        self.width = 0;
        self.height = 0;
    }
}
