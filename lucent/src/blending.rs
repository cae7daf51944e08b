//! That module exports blending-related types and functions.
//!
//! Given two pixels *src* and *dst* – source and destination, we associate each pixel a blending
//! factor – respectively, *srcK* and *dstK*. *src* is the pixel being computed, and *dst* is the
//! pixel that is already stored in the framebuffer.
//!
//! The color and alpha channels have their own factors ([`BlendFunctionArgs`]) and their own
//! equations ([`BlendEquationArgs`]).

/// Blending equation. Used to state how blending factors and pixel data should be blended.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Equation {
  /// `blended = src * srcK + dst * dstK`
  Add,
  /// `blended = src * srcK - dst * dstK`
  Subtract,
  /// `blended = dst * dstK - src * srcK`
  ReverseSubtract,
  /// `blended = min(src, dst)`
  Min,
  /// `blended = max(src, dst)`
  Max,
  /// Advanced `overlay` equation; needs hardware advanced blending.
  Overlay,
  /// Advanced `colorburn` equation; needs hardware advanced blending.
  ColorBurn,
  /// Advanced `colordodge` equation; needs hardware advanced blending.
  ColorDodge,
}

impl Equation {
  /// Is this one of the advanced equations?
  pub fn is_advanced(self) -> bool {
    matches!(
      self,
      Equation::Overlay | Equation::ColorBurn | Equation::ColorDodge
    )
  }
}

/// Blending factors. Pixel data are multiplied by these factors to achieve several effects driven
/// by *blending equations*.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Factor {
  /// `1 * color = factor`
  One,
  /// `0 * color = 0`
  Zero,
  /// `src * color`
  SrcColor,
  /// `(1 - src) * color`
  SrcColorComplement,
  /// `dst * color`
  DstColor,
  /// `(1 - dst) * color`
  DstColorComplement,
  /// `srcA * color`
  SrcAlpha,
  /// `(1 - srcA) * color`
  SrcAlphaComplement,
  /// `dstA * color`
  DstAlpha,
  /// `(1 - dstA) * color`
  DstAlphaComplement,
  /// `constant * color`
  ConstantColor,
  /// `(1 - constant) * color`
  ConstantColorComplement,
  /// `constantA * color`
  ConstantAlpha,
  /// `(1 - constantA) * color`
  ConstantAlphaComplement,
  /// `min(srcA, 1 - dstA) * color`
  SrcAlphaSaturate,
}

/// The four blending factors.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct BlendFunctionArgs {
  /// Source factor of the color channels.
  pub src_rgb: Factor,
  /// Destination factor of the color channels.
  pub dst_rgb: Factor,
  /// Source factor of the alpha channel.
  pub src_alpha: Factor,
  /// Destination factor of the alpha channel.
  pub dst_alpha: Factor,
}

impl BlendFunctionArgs {
  /// Same factors for color and alpha.
  pub fn new(src: Factor, dst: Factor) -> Self {
    BlendFunctionArgs {
      src_rgb: src,
      dst_rgb: dst,
      src_alpha: src,
      dst_alpha: dst,
    }
  }
}

impl Default for BlendFunctionArgs {
  fn default() -> Self {
    BlendFunctionArgs::new(Factor::One, Factor::Zero)
  }
}

/// The two blending equations.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct BlendEquationArgs {
  /// Equation of the color channels.
  pub rgb: Equation,
  /// Equation of the alpha channel.
  pub alpha: Equation,
}

impl BlendEquationArgs {
  /// Same equation for color and alpha.
  pub fn new(equation: Equation) -> Self {
    BlendEquationArgs {
      rgb: equation,
      alpha: equation,
    }
  }
}

impl Default for BlendEquationArgs {
  fn default() -> Self {
    BlendEquationArgs::new(Equation::Add)
  }
}
