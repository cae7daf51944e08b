//! Strongly-typed backend handles.
//!
//! Every GPU object kind gets its own handle type so that, say, a texture handle can never be
//! passed where a buffer handle is expected. The wrapped value is backend-private: the core never
//! interprets it. Handles are never zero, so `Option<Handle>` is the null handle.

use std::fmt;
use std::num::NonZeroU64;

macro_rules! handles {
  ($( $(#[$doc:meta])* $name:ident ),* $(,)?) => {
    $(
      $(#[$doc])*
      #[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
      pub struct $name(NonZeroU64);

      impl $name {
        /// Wrap a raw backend value; `0` is the null handle and yields `None`.
        pub fn from_raw(raw: u64) -> Option<Self> {
          NonZeroU64::new(raw).map($name)
        }

        /// Backend-private raw value.
        pub fn raw(self) -> u64 {
          self.0.get()
        }
      }

      impl fmt::Debug for $name {
        fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
          write!(f, "{}({})", stringify!($name), self.0)
        }
      }
    )*
  }
}

handles! {
  /// Handle of a buffer object.
  BufferHandle,
  /// Handle of a texture object.
  TextureHandle,
  /// Handle of a render buffer object.
  RenderBufferHandle,
  /// Handle of a framebuffer object.
  FramebufferHandle,
  /// Handle of a single compiled shader stage.
  ShaderStageHandle,
  /// Handle of a shader program.
  ProgramHandle,
  /// Handle of a program pipeline.
  ProgramPipelineHandle,
  /// Handle of an input assembler (vertex array).
  InputAssemblerHandle,
  /// Handle of a depth / stencil state object.
  DepthStencilStateHandle,
  /// Handle of a rasterizer state object.
  RasterizerStateHandle,
  /// Handle of a query object.
  QueryHandle,
  /// Handle of a fence sync object.
  SyncHandle,
  /// Handle of a range of path objects.
  PathHandle,
}

/// Monotonic handle allocator for backends that do not get handles from a driver.
#[derive(Debug)]
pub struct HandleAllocator {
  next: u64,
}

impl HandleAllocator {
  /// Create an allocator whose first handle is `1`.
  pub fn new() -> Self {
    HandleAllocator { next: 1 }
  }

  /// Allocate a fresh raw value; never `0`, never reused.
  pub fn allocate(&mut self) -> u64 {
    let raw = self.next;
    self.next += 1;
    raw
  }
}

impl Default for HandleAllocator {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn zero_is_null() {
    assert!(BufferHandle::from_raw(0).is_none());
    assert_eq!(TextureHandle::from_raw(7).map(TextureHandle::raw), Some(7));
  }

  #[test]
  fn allocator_is_monotonic() {
    let mut alloc = HandleAllocator::new();
    let a = alloc.allocate();
    let b = alloc.allocate();

    assert_eq!(a, 1);
    assert_eq!(b, 2);
  }
}
