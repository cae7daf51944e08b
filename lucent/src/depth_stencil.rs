//! Depth test and stencil related features.

/// Comparison performed by the depth or stencil test. `a` is the incoming value and `b` the value
/// already stored.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Comparison {
  /// Test never succeeds.
  Never,
  /// Test succeeds if `a < b`.
  Less,
  /// Test succeeds if `a <= b`.
  LessOrEqual,
  /// Test succeeds if `a == b`.
  Equal,
  /// Test succeeds if `a != b`.
  NotEqual,
  /// Test succeeds if `a > b`.
  Greater,
  /// Test succeeds if `a >= b`.
  GreaterOrEqual,
  /// Test always succeeds.
  Always,
}

/// Action taken on the stencil buffer.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum StencilOp {
  /// Keep the stored value.
  Keep,
  /// Set the value to zero.
  Zero,
  /// Replace the value with the reference.
  Replace,
  /// Increment, clamping to the maximum.
  Increment,
  /// Increment, wrapping to zero.
  IncrementWrap,
  /// Decrement, clamping to zero.
  Decrement,
  /// Decrement, wrapping to the maximum.
  DecrementWrap,
  /// Bitwise invert.
  Invert,
}

/// Face a stencil setting applies to.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Face {
  /// Front-facing primitives.
  Front,
  /// Back-facing primitives.
  Back,
}

/// Stencil function.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct StencilFunctionArgs {
  /// Comparison against the reference.
  pub function: Comparison,
  /// Reference value.
  pub reference: u32,
  /// Mask applied to both the reference and the stored value.
  pub mask: u32,
}

impl Default for StencilFunctionArgs {
  fn default() -> Self {
    StencilFunctionArgs {
      function: Comparison::Always,
      reference: 0,
      mask: !0,
    }
  }
}

/// Stencil operations.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct StencilOperationArgs {
  /// Action when the stencil test fails.
  pub stencil_fail: StencilOp,
  /// Action when the stencil test passes but the depth test fails.
  pub depth_fail: StencilOp,
  /// Action when both tests pass.
  pub depth_pass: StencilOp,
}

impl Default for StencilOperationArgs {
  fn default() -> Self {
    StencilOperationArgs {
      stencil_fail: StencilOp::Keep,
      depth_fail: StencilOp::Keep,
      depth_pass: StencilOp::Keep,
    }
  }
}
