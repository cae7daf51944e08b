//! Pipeline state: toggles, rectangles, clear / barrier flags and immutable state objects.
//!
//! [`DepthStencilState`] and [`RasterizerState`] bundle several pieces of fixed-function state in
//! one backend object, applied at once with
//! [`RenderContext::set_depth_stencil_state`](crate::context::RenderContext::set_depth_stencil_state)
//! and [`RenderContext::set_rasterizer_state`](crate::context::RenderContext::set_rasterizer_state).

use crate::backend::handle::{DepthStencilStateHandle, RasterizerStateHandle};
use crate::context::ContextCore;
use crate::depth_stencil::{Comparison, StencilFunctionArgs, StencilOperationArgs};
use bitflags::bitflags;
use std::rc::Rc;

/// Boolean pipeline toggles.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RenderStateFlag {
  /// Blending.
  Blend,
  /// Face culling.
  CullFace,
  /// Depth test.
  DepthTest,
  /// Stencil test.
  StencilTest,
  /// Scissor test.
  ScissorTest,
  /// Depth writes.
  DepthWrite,
  /// Multisampling.
  Multisample,
}

/// An integer rectangle (viewport, scissor, blit regions).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Rect {
  /// Left edge.
  pub x: i32,
  /// Bottom edge.
  pub y: i32,
  /// Width.
  pub width: i32,
  /// Height.
  pub height: i32,
}

impl Rect {
  /// Create a new rectangle.
  pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
    Rect {
      x,
      y,
      width,
      height,
    }
  }

  /// Is the rectangle empty in either dimension?
  pub fn is_degenerate(&self) -> bool {
    self.width == 0 || self.height == 0
  }
}

/// Which faces to cull.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CullMode {
  /// No culling.
  None,
  /// Cull front faces.
  Front,
  /// Cull back faces.
  Back,
  /// Cull everything.
  FrontAndBack,
}

bitflags! {
  /// Buffers to clear.
  #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
  pub struct ClearFlags: u32 {
    /// Color buffers.
    const COLOR = 1 << 0;
    /// Depth buffer.
    const DEPTH = 1 << 1;
    /// Stencil buffer.
    const STENCIL = 1 << 2;
    /// Coverage buffer.
    const COVERAGE = 1 << 3;
  }
}

bitflags! {
  /// GPU memory barriers, ordering memory visibility between successive commands.
  #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
  pub struct MemoryBarrierFlags: u32 {
    /// Vertex attribute fetches.
    const VERTEX_ATTRIB_ARRAY = 1 << 0;
    /// Index fetches.
    const ELEMENT_ARRAY = 1 << 1;
    /// Uniform buffer reads.
    const UNIFORM = 1 << 2;
    /// Texture fetches.
    const TEXTURE_FETCH = 1 << 3;
    /// Image load / store.
    const SHADER_IMAGE_ACCESS = 1 << 4;
    /// Indirect command reads.
    const COMMAND = 1 << 5;
    /// Pixel buffer transfers.
    const PIXEL_BUFFER = 1 << 6;
    /// Texture updates.
    const TEXTURE_UPDATE = 1 << 7;
    /// Buffer updates.
    const BUFFER_UPDATE = 1 << 8;
    /// Framebuffer reads / writes.
    const FRAMEBUFFER = 1 << 9;
    /// Transform feedback writes.
    const TRANSFORM_FEEDBACK = 1 << 10;
    /// Atomic counters.
    const ATOMIC_COUNTER = 1 << 11;
    /// Storage buffers.
    const SHADER_STORAGE = 1 << 12;
    /// Every barrier.
    const ALL = !0;
  }
}

/// Description of a [`DepthStencilState`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct DepthStencilDesc {
  /// Enable the depth test.
  pub depth_test: bool,
  /// Enable depth writes.
  pub depth_write: bool,
  /// Depth comparison.
  pub depth_function: Comparison,
  /// Enable the stencil test.
  pub stencil_test: bool,
  /// Stencil function of front faces.
  pub stencil_function_front: StencilFunctionArgs,
  /// Stencil function of back faces.
  pub stencil_function_back: StencilFunctionArgs,
  /// Stencil operations of front faces.
  pub stencil_operation_front: StencilOperationArgs,
  /// Stencil operations of back faces.
  pub stencil_operation_back: StencilOperationArgs,
}

impl Default for DepthStencilDesc {
  fn default() -> Self {
    DepthStencilDesc {
      depth_test: true,
      depth_write: true,
      depth_function: Comparison::Less,
      stencil_test: false,
      stencil_function_front: StencilFunctionArgs::default(),
      stencil_function_back: StencilFunctionArgs::default(),
      stencil_operation_front: StencilOperationArgs::default(),
      stencil_operation_back: StencilOperationArgs::default(),
    }
  }
}

/// Description of a [`RasterizerState`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterizerDesc {
  /// Constant depth bias.
  pub depth_bias: f32,
  /// Slope-scaled depth bias.
  pub depth_scale: f32,
  /// Face culling.
  pub cull_mode: CullMode,
}

impl Default for RasterizerDesc {
  fn default() -> Self {
    RasterizerDesc {
      depth_bias: 0.,
      depth_scale: 0.,
      cull_mode: CullMode::Back,
    }
  }
}

/// Immutable depth / stencil state object.
#[derive(Debug)]
pub struct DepthStencilState {
  core: Rc<ContextCore>,
  handle: DepthStencilStateHandle,
  desc: DepthStencilDesc,
}

impl DepthStencilState {
  pub(crate) fn new(
    core: Rc<ContextCore>,
    handle: DepthStencilStateHandle,
    desc: DepthStencilDesc,
  ) -> Self {
    DepthStencilState { core, handle, desc }
  }

  /// Backend handle.
  pub fn handle(&self) -> DepthStencilStateHandle {
    self.handle
  }

  /// Description this state was created from.
  pub fn desc(&self) -> &DepthStencilDesc {
    &self.desc
  }
}

impl Drop for DepthStencilState {
  fn drop(&mut self) {
    self.core.backend().release_depth_stencil_state(self.handle);
    let removed = self
      .core
      .registry()
      .depth_stencil_states
      .remove(self.handle);
    debug_assert!(removed, "depth stencil state {:?} released twice", self.handle);
  }
}

/// Immutable rasterizer state object.
#[derive(Debug)]
pub struct RasterizerState {
  core: Rc<ContextCore>,
  handle: RasterizerStateHandle,
  desc: RasterizerDesc,
}

impl RasterizerState {
  pub(crate) fn new(
    core: Rc<ContextCore>,
    handle: RasterizerStateHandle,
    desc: RasterizerDesc,
  ) -> Self {
    RasterizerState { core, handle, desc }
  }

  /// Backend handle.
  pub fn handle(&self) -> RasterizerStateHandle {
    self.handle
  }

  /// Description this state was created from.
  pub fn desc(&self) -> &RasterizerDesc {
    &self.desc
  }
}

impl Drop for RasterizerState {
  fn drop(&mut self) {
    self.core.backend().release_rasterizer_state(self.handle);
    let removed = self.core.registry().rasterizer_states.remove(self.handle);
    debug_assert!(removed, "rasterizer state {:?} released twice", self.handle);
  }
}
