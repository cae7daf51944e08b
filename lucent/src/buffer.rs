//! GPU buffers.
//!
//! Every buffer kind wraps the same backend object and only differs by the binding point it is
//! used at: vertex data, indices, uniform blocks ([`ConstantBuffer`]), storage blocks, atomic
//! counters and indirect draw arguments.
//!
//! Buffers can be updated in place with `update` or mapped into CPU-visible memory with `map`,
//! which returns a [`BufferSliceMut`] guard that unmaps on drop. A buffer cannot be updated while
//! mapped.
//!
//! [`ConstantBuffer`] and [`AtomicCounterBuffer`] additionally stage named parameters in a CPU
//! shadow copy; their `update` uploads only the byte range that changed since the last upload.

use crate::backend::handle::BufferHandle;
use crate::component::ComponentType;
use crate::context::{ContextCore, ResourceError};
use crate::shader::{BlockMemberInfo, ShaderDataType};
use bitflags::bitflags;
use log::{error, warn};
use std::cell::{Cell, RefCell};
use std::error;
use std::fmt;
use std::ops::{Deref, DerefMut, Range};
use std::ptr::NonNull;
use std::rc::Rc;
use std::slice;

/// Binding point a buffer is created for.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BufferBinding {
  /// Vertex attributes.
  Vertex,
  /// Indices.
  Index,
  /// Uniform block storage.
  Constant,
  /// Shader storage block.
  Storage,
  /// Atomic counters.
  AtomicCounter,
  /// Indirect draw arguments.
  DrawIndirect,
}

/// Update frequency hint.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BufferUsage {
  /// Set once, drawn many times.
  Static,
  /// Updated often.
  Dynamic,
}

bitflags! {
  /// Access requested when mapping a buffer.
  #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
  pub struct BufferAccess: u32 {
    /// The mapped range will be read.
    const READ = 1 << 0;
    /// The mapped range will be written.
    const WRITE = 1 << 1;
    /// Previous content of the range may be discarded.
    const INVALIDATE_RANGE = 1 << 2;
    /// Previous content of the whole buffer may be discarded.
    const INVALIDATE_BUFFER = 1 << 3;
    /// Written ranges are flushed explicitly.
    const FLUSH_EXPLICIT = 1 << 4;
    /// Do not synchronize with pending GPU work.
    const UNSYNCHRONIZED = 1 << 5;
  }
}

/// Buffer errors.
#[non_exhaustive]
#[derive(Debug, Eq, PartialEq)]
pub enum BufferError {
  /// Write or map past the end of the buffer.
  Overflow {
    /// Requested start.
    offset: usize,
    /// Requested length.
    len: usize,
    /// Buffer size.
    size: usize,
  },

  /// The backend could not map the buffer.
  MapFailed,

  /// The buffer is currently mapped.
  Mapped,

  /// Data size does not match what was expected.
  SizeMismatch {
    /// Expected size, in bytes.
    expected: usize,
    /// Provided size, in bytes.
    found: usize,
  },

  /// No parameter of that name was declared.
  UnknownParam(String),
}

impl fmt::Display for BufferError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      BufferError::Overflow { offset, len, size } => write!(
        f,
        "buffer overflow (range {}..{} in a buffer of {} bytes)",
        offset,
        offset + len,
        size
      ),

      BufferError::MapFailed => f.write_str("buffer mapping failed"),

      BufferError::Mapped => f.write_str("buffer is mapped"),

      BufferError::SizeMismatch { expected, found } => write!(
        f,
        "mismatch buffer data size (expected {} bytes, found {})",
        expected, found
      ),

      BufferError::UnknownParam(ref name) => write!(f, "unknown buffer parameter {}", name),
    }
  }
}

impl error::Error for BufferError {}

// Backend buffer owned by every buffer resource.
#[derive(Debug)]
pub(crate) struct BufferCore {
  core: Rc<ContextCore>,
  handle: BufferHandle,
  binding: BufferBinding,
  usage: BufferUsage,
  size: Cell<usize>,
  mapped: Cell<bool>,
}

impl BufferCore {
  pub(crate) fn new(
    core: Rc<ContextCore>,
    binding: BufferBinding,
    usage: BufferUsage,
    data: &[u8],
  ) -> Result<Self, ResourceError> {
    let handle = core
      .backend()
      .create_buffer(binding, usage, data)
      .ok_or_else(|| ResourceError::creation_failed("buffer"))?;

    Ok(BufferCore {
      core,
      handle,
      binding,
      usage,
      size: Cell::new(data.len()),
      mapped: Cell::new(false),
    })
  }

  pub(crate) fn core(&self) -> &Rc<ContextCore> {
    &self.core
  }

  pub(crate) fn handle(&self) -> BufferHandle {
    self.handle
  }

  pub(crate) fn size(&self) -> usize {
    self.size.get()
  }

  pub(crate) fn update(&self, offset: usize, data: &[u8]) -> Result<(), BufferError> {
    if self.mapped.get() {
      return Err(BufferError::Mapped);
    }

    let size = self.size.get();
    if offset.checked_add(data.len()).map_or(true, |end| end > size) {
      return Err(BufferError::Overflow {
        offset,
        len: data.len(),
        size,
      });
    }

    if !data.is_empty() {
      self
        .core
        .backend()
        .update_buffer(self.handle, self.binding, offset, data);
    }

    Ok(())
  }

  pub(crate) fn set_data(&self, data: &[u8]) -> Result<(), BufferError> {
    if self.mapped.get() {
      return Err(BufferError::Mapped);
    }

    if data.len() == self.size.get() {
      return self.update(0, data);
    }

    self
      .core
      .backend()
      .resize_buffer(self.handle, self.binding, self.usage, data);
    self.size.set(data.len());
    Ok(())
  }

  pub(crate) fn map(
    &self,
    offset: usize,
    len: usize,
    access: BufferAccess,
  ) -> Result<BufferSliceMut<'_>, BufferError> {
    if self.mapped.get() {
      return Err(BufferError::Mapped);
    }

    let size = self.size.get();
    if offset.checked_add(len).map_or(true, |end| end > size) {
      return Err(BufferError::Overflow { offset, len, size });
    }

    let ptr = unsafe {
      self
        .core
        .backend()
        .map_buffer(self.handle, self.binding, offset, len, access)
    };

    match ptr {
      Some(ptr) => {
        self.mapped.set(true);
        Ok(BufferSliceMut {
          buffer: self,
          ptr,
          len,
        })
      }

      None => {
        error!("cannot map buffer {:?}", self.handle);
        Err(BufferError::MapFailed)
      }
    }
  }
}

impl Drop for BufferCore {
  fn drop(&mut self) {
    debug_assert!(!self.mapped.get(), "buffer dropped while mapped");
    self.core.backend().release_buffer(self.handle);
  }
}

/// A mapped byte range of a buffer. Unmapped when dropped.
#[derive(Debug)]
pub struct BufferSliceMut<'a> {
  buffer: &'a BufferCore,
  ptr: NonNull<u8>,
  len: usize,
}

impl<'a> Deref for BufferSliceMut<'a> {
  type Target = [u8];

  fn deref(&self) -> &Self::Target {
    unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
  }
}

impl<'a> DerefMut for BufferSliceMut<'a> {
  fn deref_mut(&mut self) -> &mut Self::Target {
    unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
  }
}

impl<'a> Drop for BufferSliceMut<'a> {
  fn drop(&mut self) {
    self.buffer.mapped.set(false);

    let intact = self
      .buffer
      .core
      .backend()
      .unmap_buffer(self.buffer.handle, self.buffer.binding);

    if !intact {
      warn!(
        "content of buffer {:?} was lost while mapped",
        self.buffer.handle
      );
    }
  }
}

macro_rules! buffer_common {
  ($name:ident, $registry:ident) => {
    impl $name {
      /// Backend handle.
      pub fn handle(&self) -> BufferHandle {
        self.buffer.handle()
      }

      /// Size in bytes.
      pub fn size(&self) -> usize {
        self.buffer.size()
      }

      /// Map a byte range into CPU-visible memory.
      pub fn map(
        &self,
        offset: usize,
        len: usize,
        access: BufferAccess,
      ) -> Result<BufferSliceMut<'_>, BufferError> {
        self.buffer.map(offset, len, access)
      }
    }

    impl Drop for $name {
      fn drop(&mut self) {
        let removed = self
          .buffer
          .core()
          .registry()
          .$registry
          .remove(self.buffer.handle());
        debug_assert!(removed, "buffer {:?} released twice", self.buffer.handle());
      }
    }
  };
}

/// Vertex attribute storage.
#[derive(Debug)]
pub struct VertexBuffer {
  buffer: BufferCore,
  stride: u32,
}

buffer_common!(VertexBuffer, vertex_buffers);

impl VertexBuffer {
  pub(crate) fn new(
    core: Rc<ContextCore>,
    usage: BufferUsage,
    data: &[u8],
    stride: u32,
  ) -> Result<Self, ResourceError> {
    let buffer = BufferCore::new(core, BufferBinding::Vertex, usage, data)?;
    Ok(VertexBuffer { buffer, stride })
  }

  /// Byte distance between two consecutive vertices.
  pub fn stride(&self) -> u32 {
    self.stride
  }

  /// Number of whole vertices stored.
  pub fn vertex_count(&self) -> usize {
    if self.stride == 0 {
      0
    } else {
      self.size() / self.stride as usize
    }
  }

  /// Overwrite part of the buffer.
  pub fn update(&self, offset: usize, data: &[u8]) -> Result<(), BufferError> {
    self.buffer.update(offset, data)
  }

  /// Replace the whole content, resizing if needed.
  pub fn set_data(&self, data: &[u8]) -> Result<(), BufferError> {
    self.buffer.set_data(data)
  }
}

/// Index storage.
#[derive(Debug)]
pub struct IndexBuffer {
  buffer: BufferCore,
  component_type: ComponentType,
}

buffer_common!(IndexBuffer, index_buffers);

impl IndexBuffer {
  pub(crate) fn new(
    core: Rc<ContextCore>,
    usage: BufferUsage,
    component_type: ComponentType,
    data: &[u8],
  ) -> Result<Self, ResourceError> {
    if !component_type.is_index_type() {
      return Err(ResourceError::InvalidArgument(format!(
        "{:?} is not an index type",
        component_type
      )));
    }

    let buffer = BufferCore::new(core, BufferBinding::Index, usage, data)?;
    Ok(IndexBuffer {
      buffer,
      component_type,
    })
  }

  /// Type of one index.
  pub fn component_type(&self) -> ComponentType {
    self.component_type
  }

  /// Number of indices stored.
  pub fn index_count(&self) -> usize {
    self.size() / self.component_type.size_of()
  }

  /// Overwrite part of the buffer.
  pub fn update(&self, offset: usize, data: &[u8]) -> Result<(), BufferError> {
    self.buffer.update(offset, data)
  }

  /// Replace the whole content, resizing if needed.
  pub fn set_data(&self, data: &[u8]) -> Result<(), BufferError> {
    self.buffer.set_data(data)
  }
}

/// A named parameter staged in a [`ConstantBuffer`] or an [`AtomicCounterBuffer`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BufferParam {
  /// Name as declared in the shader.
  pub name: String,
  /// Data type.
  pub ty: ShaderDataType,
  /// Number of array elements.
  pub count: usize,
  /// Byte offset in the buffer.
  pub offset: usize,
}

impl BufferParam {
  fn byte_size(&self) -> usize {
    self.ty.byte_size() * self.count.max(1)
  }
}

// CPU shadow of a buffer, diffed against the last upload.
#[derive(Debug)]
struct Staging {
  params: Vec<BufferParam>,
  shadow: Vec<u8>,
  uploaded: Vec<u8>,
}

impl Staging {
  fn new(data: &[u8]) -> Self {
    Staging {
      params: Vec::new(),
      shadow: data.to_vec(),
      uploaded: data.to_vec(),
    }
  }

  fn add_param(&mut self, param: BufferParam) -> Result<(), BufferError> {
    let end = param.offset + param.byte_size();
    if end > self.shadow.len() {
      return Err(BufferError::Overflow {
        offset: param.offset,
        len: param.byte_size(),
        size: self.shadow.len(),
      });
    }

    self.params.retain(|p| p.name != param.name);
    self.params.push(param);
    Ok(())
  }

  fn set_param(&mut self, name: &str, bytes: &[u8]) -> Result<(), BufferError> {
    let param = self
      .params
      .iter()
      .find(|p| p.name == name)
      .ok_or_else(|| BufferError::UnknownParam(name.to_owned()))?;

    if bytes.len() > param.byte_size() {
      return Err(BufferError::SizeMismatch {
        expected: param.byte_size(),
        found: bytes.len(),
      });
    }

    let offset = param.offset;
    self.shadow[offset..offset + bytes.len()].copy_from_slice(bytes);
    Ok(())
  }

  fn set_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<(), BufferError> {
    let size = self.shadow.len();
    match offset.checked_add(bytes.len()) {
      Some(end) if end <= size => {
        self.shadow[offset..end].copy_from_slice(bytes);
        Ok(())
      }

      _ => Err(BufferError::Overflow {
        offset,
        len: bytes.len(),
        size,
      }),
    }
  }

  fn dirty_range(&self) -> Option<Range<usize>> {
    let pairs = || self.shadow.iter().zip(&self.uploaded);
    let first = pairs().position(|(a, b)| a != b)?;
    let last = pairs().rposition(|(a, b)| a != b)?;
    Some(first..last + 1)
  }

  fn upload(&mut self, buffer: &BufferCore) -> Result<bool, BufferError> {
    match self.dirty_range() {
      Some(range) => {
        buffer.update(range.start, &self.shadow[range.clone()])?;
        self.uploaded[range.clone()].copy_from_slice(&self.shadow[range]);
        Ok(true)
      }

      None => Ok(false),
    }
  }
}

/// Storage of a uniform block, shared by name among every program declaring that block.
#[derive(Debug)]
pub struct ConstantBuffer {
  buffer: BufferCore,
  name: String,
  staging: RefCell<Staging>,
}

buffer_common!(ConstantBuffer, constant_buffers);

impl ConstantBuffer {
  pub(crate) fn new(
    core: Rc<ContextCore>,
    name: &str,
    usage: BufferUsage,
    data: &[u8],
  ) -> Result<Self, ResourceError> {
    let buffer = BufferCore::new(core, BufferBinding::Constant, usage, data)?;
    Ok(ConstantBuffer {
      buffer,
      name: name.to_owned(),
      staging: RefCell::new(Staging::new(data)),
    })
  }

  /// Name of the uniform block this buffer backs.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Declare a parameter.
  pub fn add_param(&self, param: BufferParam) -> Result<(), BufferError> {
    self.staging.borrow_mut().add_param(param)
  }

  /// Declared parameters.
  pub fn params(&self) -> Vec<BufferParam> {
    self.staging.borrow().params.clone()
  }

  /// Stage the value of a declared parameter. Nothing reaches the GPU before
  /// [`ConstantBuffer::update`].
  pub fn set_param(&self, name: &str, bytes: &[u8]) -> Result<(), BufferError> {
    self.staging.borrow_mut().set_param(name, bytes)
  }

  /// Stage raw bytes at an offset.
  pub fn set_bytes(&self, offset: usize, bytes: &[u8]) -> Result<(), BufferError> {
    self.staging.borrow_mut().set_bytes(offset, bytes)
  }

  /// Upload the staged bytes that differ from the last upload. Returns whether anything was
  /// uploaded.
  pub fn update(&self) -> Result<bool, BufferError> {
    self.staging.borrow_mut().upload(&self.buffer)
  }

  // Declare the members of a block the first time this buffer is used with it.
  pub(crate) fn setup_from_block(&self, byte_size: usize, members: &[BlockMemberInfo]) {
    let mut staging = self.staging.borrow_mut();

    if !staging.params.is_empty() {
      return;
    }

    if byte_size > staging.shadow.len() {
      warn!(
        "constant buffer {} is smaller than its block ({} < {} bytes), growing it",
        self.name,
        staging.shadow.len(),
        byte_size
      );

      staging.shadow.resize(byte_size, 0);
      staging.uploaded = staging.shadow.clone();

      if let Err(e) = self.buffer.set_data(&staging.shadow) {
        error!("cannot grow constant buffer {}: {}", self.name, e);
        return;
      }
    }

    for member in members {
      let param = BufferParam {
        name: member.name.clone(),
        ty: member.ty,
        count: member.element_count,
        offset: member.offset,
      };

      if let Err(e) = staging.add_param(param) {
        error!("constant buffer {}: {}", self.name, e);
      }
    }
  }
}

/// Storage of a shader storage block.
#[derive(Debug)]
pub struct StorageBuffer {
  buffer: BufferCore,
  name: String,
}

buffer_common!(StorageBuffer, storage_buffers);

impl StorageBuffer {
  pub(crate) fn new(
    core: Rc<ContextCore>,
    name: &str,
    usage: BufferUsage,
    data: &[u8],
  ) -> Result<Self, ResourceError> {
    let buffer = BufferCore::new(core, BufferBinding::Storage, usage, data)?;
    Ok(StorageBuffer {
      buffer,
      name: name.to_owned(),
    })
  }

  /// Name of the storage block this buffer backs.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Overwrite part of the buffer.
  pub fn update(&self, offset: usize, data: &[u8]) -> Result<(), BufferError> {
    self.buffer.update(offset, data)
  }
}

/// Storage of atomic counters.
#[derive(Debug)]
pub struct AtomicCounterBuffer {
  buffer: BufferCore,
  name: String,
  staging: RefCell<Staging>,
}

buffer_common!(AtomicCounterBuffer, atomic_counter_buffers);

impl AtomicCounterBuffer {
  pub(crate) fn new(
    core: Rc<ContextCore>,
    name: &str,
    usage: BufferUsage,
    data: &[u8],
  ) -> Result<Self, ResourceError> {
    let buffer = BufferCore::new(core, BufferBinding::AtomicCounter, usage, data)?;
    Ok(AtomicCounterBuffer {
      buffer,
      name: name.to_owned(),
      staging: RefCell::new(Staging::new(data)),
    })
  }

  /// Name this buffer is registered under.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Declare a counter at a byte offset.
  pub fn add_counter(&self, name: &str, offset: usize) -> Result<(), BufferError> {
    self.staging.borrow_mut().add_param(BufferParam {
      name: name.to_owned(),
      ty: ShaderDataType::UInt,
      count: 1,
      offset,
    })
  }

  /// Does this buffer declare a counter of that name?
  pub fn contains_counter(&self, name: &str) -> bool {
    self.staging.borrow().params.iter().any(|p| p.name == name)
  }

  /// Stage the value of a counter.
  pub fn set_counter(&self, name: &str, value: u32) -> Result<(), BufferError> {
    self
      .staging
      .borrow_mut()
      .set_param(name, &value.to_ne_bytes())
  }

  /// Upload the staged counters that changed.
  pub fn update(&self) -> Result<bool, BufferError> {
    self.staging.borrow_mut().upload(&self.buffer)
  }
}

/// Arguments of indirect draws.
#[derive(Debug)]
pub struct DrawIndirectBuffer {
  buffer: BufferCore,
}

buffer_common!(DrawIndirectBuffer, draw_indirect_buffers);

impl DrawIndirectBuffer {
  pub(crate) fn new(
    core: Rc<ContextCore>,
    usage: BufferUsage,
    data: &[u8],
  ) -> Result<Self, ResourceError> {
    let buffer = BufferCore::new(core, BufferBinding::DrawIndirect, usage, data)?;
    Ok(DrawIndirectBuffer { buffer })
  }

  /// Overwrite part of the buffer.
  pub fn update(&self, offset: usize, data: &[u8]) -> Result<(), BufferError> {
    self.buffer.update(offset, data)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dirty_range_spans_first_to_last_change() {
    let mut staging = Staging::new(&[0; 16]);
    assert_eq!(staging.dirty_range(), None);

    staging.set_bytes(4, &[1, 2]).unwrap();
    staging.set_bytes(10, &[3]).unwrap();
    assert_eq!(staging.dirty_range(), Some(4..11));
  }

  #[test]
  fn params_are_bounds_checked() {
    let mut staging = Staging::new(&[0; 16]);

    let too_far = BufferParam {
      name: "color".to_owned(),
      ty: ShaderDataType::FloatVec4,
      count: 1,
      offset: 8,
    };
    assert!(matches!(
      staging.add_param(too_far),
      Err(BufferError::Overflow { .. })
    ));

    let ok = BufferParam {
      name: "color".to_owned(),
      ty: ShaderDataType::FloatVec4,
      count: 1,
      offset: 0,
    };
    staging.add_param(ok).unwrap();

    assert_eq!(
      staging.set_param("color", &[0; 20]),
      Err(BufferError::SizeMismatch {
        expected: 16,
        found: 20
      })
    );
    assert_eq!(
      staging.set_param("nope", &[0; 4]),
      Err(BufferError::UnknownParam("nope".to_owned()))
    );
  }
}
