//! Render buffers: renderable storage that can't be sampled.

use crate::backend::handle::RenderBufferHandle;
use crate::context::{ContextCore, ResourceError};
use crate::pixel::TextureFormat;
use std::cell::Cell;
use std::rc::Rc;

/// A render buffer.
#[derive(Debug)]
pub struct RenderBuffer {
  core: Rc<ContextCore>,
  handle: RenderBufferHandle,
  format: Cell<TextureFormat>,
  width: Cell<u32>,
  height: Cell<u32>,
}

fn check_storage(format: TextureFormat, width: u32, height: u32) -> Result<(), ResourceError> {
  if !(format.is_color_renderable() || format.is_depth()) {
    return Err(ResourceError::InvalidArgument(format!(
      "{:?} is not a renderable format",
      format
    )));
  }

  if width == 0 || height == 0 {
    return Err(ResourceError::InvalidArgument(format!(
      "invalid render buffer size {}x{}",
      width, height
    )));
  }

  Ok(())
}

impl RenderBuffer {
  pub(crate) fn new(
    core: Rc<ContextCore>,
    format: TextureFormat,
    width: u32,
    height: u32,
  ) -> Result<Self, ResourceError> {
    check_storage(format, width, height)?;

    let handle = core
      .backend()
      .create_render_buffer(format, width, height)
      .ok_or_else(|| ResourceError::creation_failed("render buffer"))?;

    Ok(RenderBuffer {
      core,
      handle,
      format: Cell::new(format),
      width: Cell::new(width),
      height: Cell::new(height),
    })
  }

  /// Backend handle.
  pub fn handle(&self) -> RenderBufferHandle {
    self.handle
  }

  /// Storage format.
  pub fn format(&self) -> TextureFormat {
    self.format.get()
  }

  /// Width in pixels.
  pub fn width(&self) -> u32 {
    self.width.get()
  }

  /// Height in pixels.
  pub fn height(&self) -> u32 {
    self.height.get()
  }

  /// Re-specify the storage. Framebuffers this buffer is attached to must be checked for
  /// completeness again.
  pub fn set_storage(
    &self,
    format: TextureFormat,
    width: u32,
    height: u32,
  ) -> Result<(), ResourceError> {
    check_storage(format, width, height)?;

    if (format, width, height) != (self.format(), self.width(), self.height()) {
      self
        .core
        .backend()
        .set_render_buffer_storage(self.handle, format, width, height);
      self.format.set(format);
      self.width.set(width);
      self.height.set(height);
    }

    Ok(())
  }
}

impl Drop for RenderBuffer {
  fn drop(&mut self) {
    self.core.backend().release_render_buffer(self.handle);
    let removed = self.core.registry().render_buffers.remove(self.handle);
    debug_assert!(removed, "render buffer {:?} released twice", self.handle);
  }
}
