//! Buffer objects.

use crate::backend::GlBackend;
use crate::convert::{buffer_access, buffer_target, buffer_usage};
use crate::state::Bind;
use gl::types::*;
use lucent::backend::handle::BufferHandle;
use lucent::buffer::{BufferAccess, BufferBinding, BufferUsage};
use std::os::raw::c_void;
use std::ptr::NonNull;

pub(crate) unsafe fn create(
  backend: &mut GlBackend,
  binding: BufferBinding,
  usage: BufferUsage,
  data: &[u8],
) -> Option<BufferHandle> {
  let mut handle: GLuint = 0;
  gl::GenBuffers(1, &mut handle);

  let buffer = BufferHandle::from_raw(handle.into())?;
  let target = buffer_target(binding);

  backend.state.bind_buffer(target, handle, Bind::Forced);
  gl::BufferData(
    target,
    data.len() as GLsizeiptr,
    data.as_ptr() as *const c_void,
    buffer_usage(usage),
  );

  Some(buffer)
}

pub(crate) unsafe fn update(
  backend: &mut GlBackend,
  buffer: BufferHandle,
  binding: BufferBinding,
  offset: usize,
  data: &[u8],
) {
  let target = buffer_target(binding);

  backend.state.bind_buffer(target, buffer.raw() as GLuint, Bind::Cached);
  gl::BufferSubData(
    target,
    offset as GLintptr,
    data.len() as GLsizeiptr,
    data.as_ptr() as *const c_void,
  );
}

pub(crate) unsafe fn resize(
  backend: &mut GlBackend,
  buffer: BufferHandle,
  binding: BufferBinding,
  usage: BufferUsage,
  data: &[u8],
) {
  let target = buffer_target(binding);

  backend.state.bind_buffer(target, buffer.raw() as GLuint, Bind::Cached);
  gl::BufferData(
    target,
    data.len() as GLsizeiptr,
    data.as_ptr() as *const c_void,
    buffer_usage(usage),
  );
}

pub(crate) unsafe fn map(
  backend: &mut GlBackend,
  buffer: BufferHandle,
  binding: BufferBinding,
  offset: usize,
  len: usize,
  access: BufferAccess,
) -> Option<NonNull<u8>> {
  if !gl::MapBufferRange::is_loaded() {
    log::warn!("buffer mapping is not available on {}", backend.version);
    return None;
  }

  let target = buffer_target(binding);

  backend.state.bind_buffer(target, buffer.raw() as GLuint, Bind::Cached);
  let ptr = gl::MapBufferRange(
    target,
    offset as GLintptr,
    len as GLsizeiptr,
    buffer_access(access),
  );

  NonNull::new(ptr as *mut u8)
}

pub(crate) unsafe fn unmap(
  backend: &mut GlBackend,
  buffer: BufferHandle,
  binding: BufferBinding,
) -> bool {
  let target = buffer_target(binding);

  backend.state.bind_buffer(target, buffer.raw() as GLuint, Bind::Cached);
  gl::UnmapBuffer(target) == gl::TRUE
}

pub(crate) unsafe fn release(backend: &mut GlBackend, buffer: BufferHandle) {
  let handle = buffer.raw() as GLuint;

  gl::DeleteBuffers(1, &handle);
  backend.state.forget_buffer(handle);
}
