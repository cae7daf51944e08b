//! Mapping between lucent types and OpenGL enums.

use gl::types::*;
use lucent::blending::{Equation, Factor};
use lucent::buffer::{BufferAccess, BufferBinding, BufferUsage};
use lucent::component::ComponentType;
use lucent::depth_stencil::{Comparison, Face, StencilOp};
use lucent::framebuffer::{Attachment, BlitFilter, IncompleteReason};
use lucent::input_assembler::DrawMode;
use lucent::pixel::TextureFormat;
use lucent::query::QueryType;
use lucent::render_state::{ClearFlags, MemoryBarrierFlags, RenderStateFlag};
use lucent::shader::{ShaderDataType, ShaderStage, ShaderStageFlags};
use lucent::texture::{CubeFace, ImageAccess, TextureFilter, TextureTarget, TextureWrap};

// enums that the core profile bindings do not carry
pub(crate) const LUMINANCE: GLenum = 0x1909;
pub(crate) const LUMINANCE_ALPHA: GLenum = 0x190A;
pub(crate) const COMPRESSED_RGB_S3TC_DXT1: GLenum = 0x83F0;
pub(crate) const COMPRESSED_RGBA_S3TC_DXT1: GLenum = 0x83F1;
pub(crate) const COMPRESSED_RGBA_S3TC_DXT3: GLenum = 0x83F2;
pub(crate) const COMPRESSED_RGBA_S3TC_DXT5: GLenum = 0x83F3;
pub(crate) const FRAMEBUFFER_INCOMPLETE_DIMENSIONS: GLenum = 0x8CD9;
pub(crate) const OVERLAY_KHR: GLenum = 0x9296;
pub(crate) const COLORDODGE_KHR: GLenum = 0x9299;
pub(crate) const COLORBURN_KHR: GLenum = 0x929A;
pub(crate) const COVERAGE_BUFFER_BIT_NV: GLbitfield = 0x8000;

/// Internal format, pixel format and pixel type of a texture format.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct GlFormat {
  pub(crate) internal: GLenum,
  pub(crate) format: GLenum,
  pub(crate) ty: GLenum,
}

impl GlFormat {
  const fn new(internal: GLenum, format: GLenum, ty: GLenum) -> Self {
    GlFormat {
      internal,
      format,
      ty,
    }
  }
}

/// Pick the OpenGL triple of a format.
///
/// `legacy` selects unsized internal formats (ES2) and the luminance / alpha formats; desktop core
/// profiles get single or dual channel formats instead, swizzled by the caller.
pub(crate) fn texture_format(format: TextureFormat, legacy: bool) -> Option<GlFormat> {
  let gl_format = match format {
    TextureFormat::Unknown => return None,
    TextureFormat::R8 => GlFormat::new(gl::R8, gl::RED, gl::UNSIGNED_BYTE),
    TextureFormat::R16 => GlFormat::new(gl::R16, gl::RED, gl::UNSIGNED_SHORT),
    TextureFormat::R16F => GlFormat::new(gl::R16F, gl::RED, gl::HALF_FLOAT),
    TextureFormat::R32I => GlFormat::new(gl::R32I, gl::RED_INTEGER, gl::INT),
    TextureFormat::R32UI => GlFormat::new(gl::R32UI, gl::RED_INTEGER, gl::UNSIGNED_INT),
    TextureFormat::R32F => GlFormat::new(gl::R32F, gl::RED, gl::FLOAT),
    TextureFormat::RG8 => GlFormat::new(gl::RG8, gl::RG, gl::UNSIGNED_BYTE),
    TextureFormat::RGBA8 => GlFormat::new(gl::RGBA8, gl::RGBA, gl::UNSIGNED_BYTE),
    TextureFormat::RGB8 => GlFormat::new(gl::RGB8, gl::RGB, gl::UNSIGNED_BYTE),
    TextureFormat::SRGB8 => GlFormat::new(gl::SRGB8, gl::RGB, gl::UNSIGNED_BYTE),
    TextureFormat::SRGB8A8 => GlFormat::new(gl::SRGB8_ALPHA8, gl::RGBA, gl::UNSIGNED_BYTE),
    TextureFormat::RGB565 => GlFormat::new(gl::RGB565, gl::RGB, gl::UNSIGNED_SHORT_5_6_5),
    TextureFormat::RGBA5551 => GlFormat::new(gl::RGB5_A1, gl::RGBA, gl::UNSIGNED_SHORT_5_5_5_1),
    TextureFormat::Alpha8 if legacy => GlFormat::new(gl::ALPHA, gl::ALPHA, gl::UNSIGNED_BYTE),
    TextureFormat::Luminance8 if legacy => {
      GlFormat::new(LUMINANCE, LUMINANCE, gl::UNSIGNED_BYTE)
    }
    TextureFormat::LuminanceAlpha8 if legacy => {
      GlFormat::new(LUMINANCE_ALPHA, LUMINANCE_ALPHA, gl::UNSIGNED_BYTE)
    }
    TextureFormat::Alpha8 | TextureFormat::Luminance8 => {
      GlFormat::new(gl::R8, gl::RED, gl::UNSIGNED_BYTE)
    }
    TextureFormat::LuminanceAlpha8 => GlFormat::new(gl::RG8, gl::RG, gl::UNSIGNED_BYTE),
    TextureFormat::RG16F => GlFormat::new(gl::RG16F, gl::RG, gl::HALF_FLOAT),
    TextureFormat::RGBA16F => GlFormat::new(gl::RGBA16F, gl::RGBA, gl::HALF_FLOAT),
    TextureFormat::RG32F => GlFormat::new(gl::RG32F, gl::RG, gl::FLOAT),
    TextureFormat::RGB32F => GlFormat::new(gl::RGB32F, gl::RGB, gl::FLOAT),
    TextureFormat::RGBA32F => GlFormat::new(gl::RGBA32F, gl::RGBA, gl::FLOAT),
    TextureFormat::R11G11B10 => GlFormat::new(
      gl::R11F_G11F_B10F,
      gl::RGB,
      gl::UNSIGNED_INT_10F_11F_11F_REV,
    ),
    TextureFormat::RGB9E5 => GlFormat::new(gl::RGB9_E5, gl::RGB, gl::UNSIGNED_INT_5_9_9_9_REV),
    TextureFormat::RGBDXT1 => GlFormat::new(COMPRESSED_RGB_S3TC_DXT1, gl::RGB, gl::UNSIGNED_BYTE),
    TextureFormat::RGBADXT1 => {
      GlFormat::new(COMPRESSED_RGBA_S3TC_DXT1, gl::RGBA, gl::UNSIGNED_BYTE)
    }
    TextureFormat::RGBADXT3 => {
      GlFormat::new(COMPRESSED_RGBA_S3TC_DXT3, gl::RGBA, gl::UNSIGNED_BYTE)
    }
    TextureFormat::RGBADXT5 => {
      GlFormat::new(COMPRESSED_RGBA_S3TC_DXT5, gl::RGBA, gl::UNSIGNED_BYTE)
    }
    TextureFormat::Depth16 => GlFormat::new(
      gl::DEPTH_COMPONENT16,
      gl::DEPTH_COMPONENT,
      gl::UNSIGNED_SHORT,
    ),
    TextureFormat::Depth24 => {
      GlFormat::new(gl::DEPTH_COMPONENT24, gl::DEPTH_COMPONENT, gl::UNSIGNED_INT)
    }
    TextureFormat::Depth32 => {
      GlFormat::new(gl::DEPTH_COMPONENT32, gl::DEPTH_COMPONENT, gl::UNSIGNED_INT)
    }
    TextureFormat::Depth24Stencil8 => GlFormat::new(
      gl::DEPTH24_STENCIL8,
      gl::DEPTH_STENCIL,
      gl::UNSIGNED_INT_24_8,
    ),
  };

  // ES2 wants the internal format to match the pixel format
  if legacy && format.is_uncompressed() && !format.is_depth() {
    Some(GlFormat {
      internal: gl_format.format,
      ..gl_format
    })
  } else {
    Some(gl_format)
  }
}

/// Swizzle giving single / dual channel stand-ins the look of luminance and alpha formats.
pub(crate) fn legacy_swizzle(format: TextureFormat) -> Option<[GLint; 4]> {
  let (r, g, zero, one) = (
    gl::RED as GLint,
    gl::GREEN as GLint,
    gl::ZERO as GLint,
    gl::ONE as GLint,
  );

  match format {
    TextureFormat::Alpha8 => Some([zero, zero, zero, r]),
    TextureFormat::Luminance8 => Some([r, r, r, one]),
    TextureFormat::LuminanceAlpha8 => Some([r, r, r, g]),
    _ => None,
  }
}

pub(crate) fn texture_target(target: TextureTarget) -> GLenum {
  match target {
    TextureTarget::Texture2D => gl::TEXTURE_2D,
    TextureTarget::Texture2DMultisample => gl::TEXTURE_2D_MULTISAMPLE,
    TextureTarget::Texture2DArray => gl::TEXTURE_2D_ARRAY,
    TextureTarget::TextureCube => gl::TEXTURE_CUBE_MAP,
  }
}

pub(crate) fn cube_face(face: CubeFace) -> GLenum {
  gl::TEXTURE_CUBE_MAP_POSITIVE_X + face.index()
}

pub(crate) fn texture_filter(filter: TextureFilter) -> GLenum {
  match filter {
    TextureFilter::Nearest => gl::NEAREST,
    TextureFilter::Linear => gl::LINEAR,
    TextureFilter::NearestMipmapNearest => gl::NEAREST_MIPMAP_NEAREST,
    TextureFilter::LinearMipmapNearest => gl::LINEAR_MIPMAP_NEAREST,
    TextureFilter::NearestMipmapLinear => gl::NEAREST_MIPMAP_LINEAR,
    TextureFilter::LinearMipmapLinear => gl::LINEAR_MIPMAP_LINEAR,
  }
}

pub(crate) fn texture_wrap(wrap: TextureWrap) -> GLenum {
  match wrap {
    TextureWrap::ClampToEdge => gl::CLAMP_TO_EDGE,
    TextureWrap::MirroredRepeat => gl::MIRRORED_REPEAT,
    TextureWrap::Repeat => gl::REPEAT,
  }
}

pub(crate) fn image_access(access: ImageAccess) -> GLenum {
  match access {
    ImageAccess::ReadOnly => gl::READ_ONLY,
    ImageAccess::WriteOnly => gl::WRITE_ONLY,
    ImageAccess::ReadWrite => gl::READ_WRITE,
  }
}

pub(crate) fn buffer_target(binding: BufferBinding) -> GLenum {
  match binding {
    BufferBinding::Vertex => gl::ARRAY_BUFFER,
    BufferBinding::Index => gl::ELEMENT_ARRAY_BUFFER,
    BufferBinding::Constant => gl::UNIFORM_BUFFER,
    BufferBinding::Storage => gl::SHADER_STORAGE_BUFFER,
    BufferBinding::AtomicCounter => gl::ATOMIC_COUNTER_BUFFER,
    BufferBinding::DrawIndirect => gl::DRAW_INDIRECT_BUFFER,
  }
}

pub(crate) fn buffer_usage(usage: BufferUsage) -> GLenum {
  match usage {
    BufferUsage::Static => gl::STATIC_DRAW,
    BufferUsage::Dynamic => gl::DYNAMIC_DRAW,
  }
}

pub(crate) fn buffer_access(access: BufferAccess) -> GLbitfield {
  [
    (BufferAccess::READ, gl::MAP_READ_BIT),
    (BufferAccess::WRITE, gl::MAP_WRITE_BIT),
    (BufferAccess::INVALIDATE_RANGE, gl::MAP_INVALIDATE_RANGE_BIT),
    (BufferAccess::INVALIDATE_BUFFER, gl::MAP_INVALIDATE_BUFFER_BIT),
    (BufferAccess::FLUSH_EXPLICIT, gl::MAP_FLUSH_EXPLICIT_BIT),
    (BufferAccess::UNSYNCHRONIZED, gl::MAP_UNSYNCHRONIZED_BIT),
  ]
  .iter()
  .filter(|(flag, _)| access.contains(*flag))
  .fold(0, |bits, (_, bit)| bits | bit)
}

/// Vertex attribute / index type; OpenGL has no 64-bit integer attributes.
pub(crate) fn component_type(ty: ComponentType) -> Option<GLenum> {
  match ty {
    ComponentType::UInt8 => Some(gl::UNSIGNED_BYTE),
    ComponentType::Int8 => Some(gl::BYTE),
    ComponentType::UInt16 => Some(gl::UNSIGNED_SHORT),
    ComponentType::Int16 => Some(gl::SHORT),
    ComponentType::UInt32 => Some(gl::UNSIGNED_INT),
    ComponentType::Int32 => Some(gl::INT),
    ComponentType::Float16 => Some(gl::HALF_FLOAT),
    ComponentType::Float32 => Some(gl::FLOAT),
    ComponentType::Float64 => Some(gl::DOUBLE),
    ComponentType::UInt64 | ComponentType::Int64 => None,
  }
}

pub(crate) fn draw_mode(mode: DrawMode) -> GLenum {
  match mode {
    DrawMode::Points => gl::POINTS,
    DrawMode::LineStrip => gl::LINE_STRIP,
    DrawMode::LineLoop => gl::LINE_LOOP,
    DrawMode::Lines => gl::LINES,
    DrawMode::TriangleStrip => gl::TRIANGLE_STRIP,
    DrawMode::TriangleFan => gl::TRIANGLE_FAN,
    DrawMode::Triangles => gl::TRIANGLES,
    DrawMode::Patches => gl::PATCHES,
  }
}

pub(crate) fn comparison(c: Comparison) -> GLenum {
  match c {
    Comparison::Never => gl::NEVER,
    Comparison::Always => gl::ALWAYS,
    Comparison::Equal => gl::EQUAL,
    Comparison::NotEqual => gl::NOTEQUAL,
    Comparison::Less => gl::LESS,
    Comparison::LessOrEqual => gl::LEQUAL,
    Comparison::Greater => gl::GREATER,
    Comparison::GreaterOrEqual => gl::GEQUAL,
  }
}

pub(crate) fn from_gl_comparison(a: GLenum) -> Option<Comparison> {
  match a {
    gl::NEVER => Some(Comparison::Never),
    gl::ALWAYS => Some(Comparison::Always),
    gl::EQUAL => Some(Comparison::Equal),
    gl::NOTEQUAL => Some(Comparison::NotEqual),
    gl::LESS => Some(Comparison::Less),
    gl::LEQUAL => Some(Comparison::LessOrEqual),
    gl::GREATER => Some(Comparison::Greater),
    gl::GEQUAL => Some(Comparison::GreaterOrEqual),
    _ => None,
  }
}

pub(crate) fn stencil_op(op: StencilOp) -> GLenum {
  match op {
    StencilOp::Keep => gl::KEEP,
    StencilOp::Zero => gl::ZERO,
    StencilOp::Replace => gl::REPLACE,
    StencilOp::Increment => gl::INCR,
    StencilOp::IncrementWrap => gl::INCR_WRAP,
    StencilOp::Decrement => gl::DECR,
    StencilOp::DecrementWrap => gl::DECR_WRAP,
    StencilOp::Invert => gl::INVERT,
  }
}

pub(crate) fn face(face: Face) -> GLenum {
  match face {
    Face::Front => gl::FRONT,
    Face::Back => gl::BACK,
  }
}

pub(crate) fn blending_equation(equation: Equation) -> GLenum {
  match equation {
    Equation::Add => gl::FUNC_ADD,
    Equation::Subtract => gl::FUNC_SUBTRACT,
    Equation::ReverseSubtract => gl::FUNC_REVERSE_SUBTRACT,
    Equation::Min => gl::MIN,
    Equation::Max => gl::MAX,
    Equation::Overlay => OVERLAY_KHR,
    Equation::ColorBurn => COLORBURN_KHR,
    Equation::ColorDodge => COLORDODGE_KHR,
  }
}

pub(crate) fn from_gl_blending_equation(data: GLenum) -> Option<Equation> {
  match data {
    gl::FUNC_ADD => Some(Equation::Add),
    gl::FUNC_SUBTRACT => Some(Equation::Subtract),
    gl::FUNC_REVERSE_SUBTRACT => Some(Equation::ReverseSubtract),
    gl::MIN => Some(Equation::Min),
    gl::MAX => Some(Equation::Max),
    OVERLAY_KHR => Some(Equation::Overlay),
    COLORBURN_KHR => Some(Equation::ColorBurn),
    COLORDODGE_KHR => Some(Equation::ColorDodge),
    _ => None,
  }
}

pub(crate) fn blending_factor(factor: Factor) -> GLenum {
  match factor {
    Factor::One => gl::ONE,
    Factor::Zero => gl::ZERO,
    Factor::SrcColor => gl::SRC_COLOR,
    Factor::SrcColorComplement => gl::ONE_MINUS_SRC_COLOR,
    Factor::DstColor => gl::DST_COLOR,
    Factor::DstColorComplement => gl::ONE_MINUS_DST_COLOR,
    Factor::SrcAlpha => gl::SRC_ALPHA,
    Factor::SrcAlphaComplement => gl::ONE_MINUS_SRC_ALPHA,
    Factor::DstAlpha => gl::DST_ALPHA,
    Factor::DstAlphaComplement => gl::ONE_MINUS_DST_ALPHA,
    Factor::ConstantColor => gl::CONSTANT_COLOR,
    Factor::ConstantColorComplement => gl::ONE_MINUS_CONSTANT_COLOR,
    Factor::ConstantAlpha => gl::CONSTANT_ALPHA,
    Factor::ConstantAlphaComplement => gl::ONE_MINUS_CONSTANT_ALPHA,
    Factor::SrcAlphaSaturate => gl::SRC_ALPHA_SATURATE,
  }
}

pub(crate) fn from_gl_blending_factor(factor: GLenum) -> Option<Factor> {
  match factor {
    gl::ONE => Some(Factor::One),
    gl::ZERO => Some(Factor::Zero),
    gl::SRC_COLOR => Some(Factor::SrcColor),
    gl::ONE_MINUS_SRC_COLOR => Some(Factor::SrcColorComplement),
    gl::DST_COLOR => Some(Factor::DstColor),
    gl::ONE_MINUS_DST_COLOR => Some(Factor::DstColorComplement),
    gl::SRC_ALPHA => Some(Factor::SrcAlpha),
    gl::ONE_MINUS_SRC_ALPHA => Some(Factor::SrcAlphaComplement),
    gl::DST_ALPHA => Some(Factor::DstAlpha),
    gl::ONE_MINUS_DST_ALPHA => Some(Factor::DstAlphaComplement),
    gl::CONSTANT_COLOR => Some(Factor::ConstantColor),
    gl::ONE_MINUS_CONSTANT_COLOR => Some(Factor::ConstantColorComplement),
    gl::CONSTANT_ALPHA => Some(Factor::ConstantAlpha),
    gl::ONE_MINUS_CONSTANT_ALPHA => Some(Factor::ConstantAlphaComplement),
    gl::SRC_ALPHA_SATURATE => Some(Factor::SrcAlphaSaturate),
    _ => None,
  }
}

/// Capability toggled by `glEnable`; depth writes go through `glDepthMask` instead.
pub(crate) fn render_state(state: RenderStateFlag) -> Option<GLenum> {
  match state {
    RenderStateFlag::Blend => Some(gl::BLEND),
    RenderStateFlag::CullFace => Some(gl::CULL_FACE),
    RenderStateFlag::DepthTest => Some(gl::DEPTH_TEST),
    RenderStateFlag::StencilTest => Some(gl::STENCIL_TEST),
    RenderStateFlag::ScissorTest => Some(gl::SCISSOR_TEST),
    RenderStateFlag::Multisample => Some(gl::MULTISAMPLE),
    RenderStateFlag::DepthWrite => None,
  }
}

pub(crate) fn clear_mask(flags: ClearFlags) -> GLbitfield {
  let mut mask = 0;

  if flags.contains(ClearFlags::COLOR) {
    mask |= gl::COLOR_BUFFER_BIT;
  }

  if flags.contains(ClearFlags::DEPTH) {
    mask |= gl::DEPTH_BUFFER_BIT;
  }

  if flags.contains(ClearFlags::STENCIL) {
    mask |= gl::STENCIL_BUFFER_BIT;
  }

  if flags.contains(ClearFlags::COVERAGE) {
    mask |= COVERAGE_BUFFER_BIT_NV;
  }

  mask
}

pub(crate) fn memory_barrier(barriers: MemoryBarrierFlags) -> GLbitfield {
  if barriers.is_all() {
    return gl::ALL_BARRIER_BITS;
  }

  [
    (
      MemoryBarrierFlags::VERTEX_ATTRIB_ARRAY,
      gl::VERTEX_ATTRIB_ARRAY_BARRIER_BIT,
    ),
    (
      MemoryBarrierFlags::ELEMENT_ARRAY,
      gl::ELEMENT_ARRAY_BARRIER_BIT,
    ),
    (MemoryBarrierFlags::UNIFORM, gl::UNIFORM_BARRIER_BIT),
    (
      MemoryBarrierFlags::TEXTURE_FETCH,
      gl::TEXTURE_FETCH_BARRIER_BIT,
    ),
    (
      MemoryBarrierFlags::SHADER_IMAGE_ACCESS,
      gl::SHADER_IMAGE_ACCESS_BARRIER_BIT,
    ),
    (MemoryBarrierFlags::COMMAND, gl::COMMAND_BARRIER_BIT),
    (MemoryBarrierFlags::PIXEL_BUFFER, gl::PIXEL_BUFFER_BARRIER_BIT),
    (
      MemoryBarrierFlags::TEXTURE_UPDATE,
      gl::TEXTURE_UPDATE_BARRIER_BIT,
    ),
    (
      MemoryBarrierFlags::BUFFER_UPDATE,
      gl::BUFFER_UPDATE_BARRIER_BIT,
    ),
    (MemoryBarrierFlags::FRAMEBUFFER, gl::FRAMEBUFFER_BARRIER_BIT),
    (
      MemoryBarrierFlags::TRANSFORM_FEEDBACK,
      gl::TRANSFORM_FEEDBACK_BARRIER_BIT,
    ),
    (
      MemoryBarrierFlags::ATOMIC_COUNTER,
      gl::ATOMIC_COUNTER_BARRIER_BIT,
    ),
    (
      MemoryBarrierFlags::SHADER_STORAGE,
      gl::SHADER_STORAGE_BARRIER_BIT,
    ),
  ]
  .iter()
  .filter(|(flag, _)| barriers.contains(*flag))
  .fold(0, |bits, (_, bit)| bits | bit)
}

pub(crate) fn attachment(attachment: Attachment) -> GLenum {
  match attachment {
    Attachment::Color(index) => gl::COLOR_ATTACHMENT0 + index,
    Attachment::Depth => gl::DEPTH_ATTACHMENT,
    Attachment::Stencil => gl::STENCIL_ATTACHMENT,
    Attachment::DepthStencil => gl::DEPTH_STENCIL_ATTACHMENT,
  }
}

pub(crate) fn blit_filter(filter: BlitFilter) -> GLenum {
  match filter {
    BlitFilter::Nearest => gl::NEAREST,
    BlitFilter::Linear => gl::LINEAR,
  }
}

pub(crate) fn framebuffer_status(status: GLenum) -> Result<(), IncompleteReason> {
  match status {
    gl::FRAMEBUFFER_COMPLETE => Ok(()),
    gl::FRAMEBUFFER_UNDEFINED => Err(IncompleteReason::Undefined),
    gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => Err(IncompleteReason::IncompleteAttachment),
    gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => Err(IncompleteReason::MissingAttachment),
    FRAMEBUFFER_INCOMPLETE_DIMENSIONS => Err(IncompleteReason::IncompleteDimensions),
    gl::FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER => Err(IncompleteReason::IncompleteDrawBuffer),
    gl::FRAMEBUFFER_INCOMPLETE_READ_BUFFER => Err(IncompleteReason::IncompleteReadBuffer),
    gl::FRAMEBUFFER_UNSUPPORTED => Err(IncompleteReason::Unsupported),
    gl::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => Err(IncompleteReason::IncompleteMultisample),
    gl::FRAMEBUFFER_INCOMPLETE_LAYER_TARGETS => Err(IncompleteReason::IncompleteLayerTargets),
    _ => {
      log::warn!("unknown framebuffer status {:#x}", status);
      Err(IncompleteReason::Undefined)
    }
  }
}

pub(crate) fn shader_stage(stage: ShaderStage) -> GLenum {
  match stage {
    ShaderStage::Vertex => gl::VERTEX_SHADER,
    ShaderStage::TessControl => gl::TESS_CONTROL_SHADER,
    ShaderStage::TessEval => gl::TESS_EVALUATION_SHADER,
    ShaderStage::Geometry => gl::GEOMETRY_SHADER,
    ShaderStage::Fragment => gl::FRAGMENT_SHADER,
    ShaderStage::Compute => gl::COMPUTE_SHADER,
  }
}

pub(crate) fn shader_stage_bits(stages: ShaderStageFlags) -> GLbitfield {
  [
    (ShaderStageFlags::VERTEX, gl::VERTEX_SHADER_BIT),
    (ShaderStageFlags::TESS_CONTROL, gl::TESS_CONTROL_SHADER_BIT),
    (ShaderStageFlags::TESS_EVAL, gl::TESS_EVALUATION_SHADER_BIT),
    (ShaderStageFlags::GEOMETRY, gl::GEOMETRY_SHADER_BIT),
    (ShaderStageFlags::FRAGMENT, gl::FRAGMENT_SHADER_BIT),
    (ShaderStageFlags::COMPUTE, gl::COMPUTE_SHADER_BIT),
  ]
  .iter()
  .filter(|(flag, _)| stages.contains(*flag))
  .fold(0, |bits, (_, bit)| bits | bit)
}

pub(crate) fn query_type(ty: QueryType) -> GLenum {
  match ty {
    QueryType::TimeElapsed => gl::TIME_ELAPSED,
    QueryType::AnySamplesPassed => gl::ANY_SAMPLES_PASSED,
  }
}

/// Type of an active attribute or uniform, as reported by introspection.
pub(crate) fn shader_data_type(ty: GLenum) -> Option<ShaderDataType> {
  let ty = match ty {
    gl::INT => ShaderDataType::Int,
    gl::INT_VEC2 => ShaderDataType::IntVec2,
    gl::INT_VEC3 => ShaderDataType::IntVec3,
    gl::INT_VEC4 => ShaderDataType::IntVec4,
    gl::UNSIGNED_INT => ShaderDataType::UInt,
    gl::UNSIGNED_INT_VEC2 => ShaderDataType::UIntVec2,
    gl::UNSIGNED_INT_VEC3 => ShaderDataType::UIntVec3,
    gl::UNSIGNED_INT_VEC4 => ShaderDataType::UIntVec4,
    gl::FLOAT => ShaderDataType::Float,
    gl::FLOAT_VEC2 => ShaderDataType::FloatVec2,
    gl::FLOAT_VEC3 => ShaderDataType::FloatVec3,
    gl::FLOAT_VEC4 => ShaderDataType::FloatVec4,
    gl::BOOL => ShaderDataType::Bool,
    gl::BOOL_VEC2 => ShaderDataType::BoolVec2,
    gl::BOOL_VEC3 => ShaderDataType::BoolVec3,
    gl::BOOL_VEC4 => ShaderDataType::BoolVec4,
    gl::FLOAT_MAT3 => ShaderDataType::Matrix3,
    gl::FLOAT_MAT4 => ShaderDataType::Matrix4,
    gl::SAMPLER_2D | gl::SAMPLER_2D_SHADOW | gl::SAMPLER_2D_MULTISAMPLE => {
      ShaderDataType::Texture2D
    }
    gl::SAMPLER_2D_ARRAY | gl::SAMPLER_2D_ARRAY_SHADOW => ShaderDataType::Texture2DArray,
    gl::SAMPLER_CUBE | gl::SAMPLER_CUBE_SHADOW => ShaderDataType::TextureCube,
    gl::IMAGE_2D => ShaderDataType::Image2D,
    _ => return None,
  };

  Some(ty)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn every_known_format_maps() {
    for format in TextureFormat::ALL {
      let mapped = texture_format(format, false);
      assert_eq!(mapped.is_none(), format == TextureFormat::Unknown, "{:?}", format);
    }
  }

  #[test]
  fn legacy_formats_are_unsized() {
    let rgba = texture_format(TextureFormat::RGBA8, true).unwrap();
    assert_eq!(rgba.internal, gl::RGBA);

    let luminance = texture_format(TextureFormat::Luminance8, true).unwrap();
    assert_eq!(luminance.internal, LUMINANCE);

    // depth keeps its sized format
    let depth = texture_format(TextureFormat::Depth16, true).unwrap();
    assert_eq!(depth.internal, gl::DEPTH_COMPONENT16);
  }

  #[test]
  fn core_profile_swizzles_legacy_formats() {
    let alpha = texture_format(TextureFormat::Alpha8, false).unwrap();
    assert_eq!(alpha.internal, gl::R8);
    assert_eq!(
      legacy_swizzle(TextureFormat::Alpha8),
      Some([
        gl::ZERO as GLint,
        gl::ZERO as GLint,
        gl::ZERO as GLint,
        gl::RED as GLint
      ])
    );
    assert_eq!(legacy_swizzle(TextureFormat::RGBA8), None);
  }

  #[test]
  fn no_64_bit_attributes() {
    assert_eq!(component_type(ComponentType::UInt64), None);
    assert_eq!(component_type(ComponentType::Float16), Some(gl::HALF_FLOAT));
  }

  #[test]
  fn barrier_bits() {
    assert_eq!(memory_barrier(MemoryBarrierFlags::ALL), gl::ALL_BARRIER_BITS);
    assert_eq!(
      memory_barrier(MemoryBarrierFlags::SHADER_STORAGE | MemoryBarrierFlags::COMMAND),
      gl::SHADER_STORAGE_BARRIER_BIT | gl::COMMAND_BARRIER_BIT
    );
    assert_eq!(memory_barrier(MemoryBarrierFlags::empty()), 0);
  }

  #[test]
  fn unknown_framebuffer_status() {
    assert_eq!(framebuffer_status(gl::FRAMEBUFFER_COMPLETE), Ok(()));
    assert_eq!(
      framebuffer_status(FRAMEBUFFER_INCOMPLETE_DIMENSIONS),
      Err(IncompleteReason::IncompleteDimensions)
    );
    assert_eq!(
      framebuffer_status(0xdead),
      Err(IncompleteReason::Undefined)
    );
  }

  #[test]
  fn introspected_types() {
    assert_eq!(shader_data_type(gl::FLOAT_MAT4), Some(ShaderDataType::Matrix4));
    assert_eq!(
      shader_data_type(gl::SAMPLER_CUBE),
      Some(ShaderDataType::TextureCube)
    );
    assert_eq!(shader_data_type(gl::FLOAT_MAT2), None);
  }
}
