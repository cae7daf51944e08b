//! Shader stages, programs and constants.
//!
//! A [`ShaderProgram`](program::ShaderProgram) is compiled from GLSL sources by
//! [`RenderContext::compile_source`](crate::context::RenderContext::compile_source). Once linked,
//! the program is introspected: its vertex attributes, its uniforms (wrapped as
//! [`ShaderConstant`](constant::ShaderConstant)s that skip redundant uploads) and its uniform,
//! storage and atomic counter blocks.

pub mod constant;
pub mod program;

use bitflags::bitflags;
use std::error;
use std::fmt;

/// A shader stage.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ShaderStage {
  /// Vertex shader.
  Vertex,
  /// Tessellation control shader.
  TessControl,
  /// Tessellation evaluation shader.
  TessEval,
  /// Geometry shader.
  Geometry,
  /// Fragment shader.
  Fragment,
  /// Compute shader.
  Compute,
}

impl ShaderStage {
  /// Every stage, in pipeline order.
  pub const ALL: [ShaderStage; 6] = [
    ShaderStage::Vertex,
    ShaderStage::TessControl,
    ShaderStage::TessEval,
    ShaderStage::Geometry,
    ShaderStage::Fragment,
    ShaderStage::Compute,
  ];

  /// Flag of this stage.
  pub fn flag(self) -> ShaderStageFlags {
    match self {
      ShaderStage::Vertex => ShaderStageFlags::VERTEX,
      ShaderStage::TessControl => ShaderStageFlags::TESS_CONTROL,
      ShaderStage::TessEval => ShaderStageFlags::TESS_EVAL,
      ShaderStage::Geometry => ShaderStageFlags::GEOMETRY,
      ShaderStage::Fragment => ShaderStageFlags::FRAGMENT,
      ShaderStage::Compute => ShaderStageFlags::COMPUTE,
    }
  }
}

impl fmt::Display for ShaderStage {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      ShaderStage::Vertex => f.write_str("vertex shader"),
      ShaderStage::TessControl => f.write_str("tessellation control shader"),
      ShaderStage::TessEval => f.write_str("tessellation evaluation shader"),
      ShaderStage::Geometry => f.write_str("geometry shader"),
      ShaderStage::Fragment => f.write_str("fragment shader"),
      ShaderStage::Compute => f.write_str("compute shader"),
    }
  }
}

bitflags! {
  /// Set of shader stages.
  #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
  pub struct ShaderStageFlags: u32 {
    /// Vertex shader.
    const VERTEX = 1 << 0;
    /// Tessellation control shader.
    const TESS_CONTROL = 1 << 1;
    /// Tessellation evaluation shader.
    const TESS_EVAL = 1 << 2;
    /// Geometry shader.
    const GEOMETRY = 1 << 3;
    /// Fragment shader.
    const FRAGMENT = 1 << 4;
    /// Compute shader.
    const COMPUTE = 1 << 5;
  }
}

/// Data type of a shader input, uniform or block member.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ShaderDataType {
  Int,
  IntVec2,
  IntVec3,
  IntVec4,
  UInt,
  UIntVec2,
  UIntVec3,
  UIntVec4,
  Float,
  FloatVec2,
  FloatVec3,
  FloatVec4,
  Bool,
  BoolVec2,
  BoolVec3,
  BoolVec4,
  Matrix3,
  Matrix4,
  Texture2D,
  Texture2DArray,
  TextureCube,
  Image2D,
  /// Array of 2D samplers, uploaded at once.
  Texture2DHandleArray,
  /// Array of cube samplers, uploaded at once.
  TextureCubeHandleArray,
}

impl ShaderDataType {
  /// Number of scalar components of one element.
  pub fn component_count(self) -> usize {
    match self {
      ShaderDataType::Int | ShaderDataType::UInt | ShaderDataType::Float | ShaderDataType::Bool => 1,
      ShaderDataType::IntVec2
      | ShaderDataType::UIntVec2
      | ShaderDataType::FloatVec2
      | ShaderDataType::BoolVec2 => 2,
      ShaderDataType::IntVec3
      | ShaderDataType::UIntVec3
      | ShaderDataType::FloatVec3
      | ShaderDataType::BoolVec3 => 3,
      ShaderDataType::IntVec4
      | ShaderDataType::UIntVec4
      | ShaderDataType::FloatVec4
      | ShaderDataType::BoolVec4 => 4,
      ShaderDataType::Matrix3 => 9,
      ShaderDataType::Matrix4 => 16,
      _ => 1,
    }
  }

  /// Size in bytes of one element as uploaded; every scalar is 32-bit.
  pub fn byte_size(self) -> usize {
    self.component_count() * 4
  }

  /// Signed, unsigned or boolean scalar / vector?
  pub fn is_integer(self) -> bool {
    matches!(
      self,
      ShaderDataType::Int
        | ShaderDataType::IntVec2
        | ShaderDataType::IntVec3
        | ShaderDataType::IntVec4
        | ShaderDataType::UInt
        | ShaderDataType::UIntVec2
        | ShaderDataType::UIntVec3
        | ShaderDataType::UIntVec4
        | ShaderDataType::Bool
        | ShaderDataType::BoolVec2
        | ShaderDataType::BoolVec3
        | ShaderDataType::BoolVec4
    )
  }

  /// Matrix type?
  pub fn is_matrix(self) -> bool {
    matches!(self, ShaderDataType::Matrix3 | ShaderDataType::Matrix4)
  }

  /// Sampler or image, bound through a unit?
  pub fn is_opaque(self) -> bool {
    matches!(
      self,
      ShaderDataType::Texture2D
        | ShaderDataType::Texture2DArray
        | ShaderDataType::TextureCube
        | ShaderDataType::Image2D
        | ShaderDataType::Texture2DHandleArray
        | ShaderDataType::TextureCubeHandleArray
    )
  }

  /// Map a GLSL type name.
  pub fn from_glsl(name: &str) -> Option<Self> {
    let ty = match name {
      "int" => ShaderDataType::Int,
      "ivec2" => ShaderDataType::IntVec2,
      "ivec3" => ShaderDataType::IntVec3,
      "ivec4" => ShaderDataType::IntVec4,
      "uint" => ShaderDataType::UInt,
      "uvec2" => ShaderDataType::UIntVec2,
      "uvec3" => ShaderDataType::UIntVec3,
      "uvec4" => ShaderDataType::UIntVec4,
      "float" => ShaderDataType::Float,
      "vec2" => ShaderDataType::FloatVec2,
      "vec3" => ShaderDataType::FloatVec3,
      "vec4" => ShaderDataType::FloatVec4,
      "bool" => ShaderDataType::Bool,
      "bvec2" => ShaderDataType::BoolVec2,
      "bvec3" => ShaderDataType::BoolVec3,
      "bvec4" => ShaderDataType::BoolVec4,
      "mat3" => ShaderDataType::Matrix3,
      "mat4" => ShaderDataType::Matrix4,
      "sampler2D" | "sampler2DShadow" | "sampler2DMS" => ShaderDataType::Texture2D,
      "sampler2DArray" => ShaderDataType::Texture2DArray,
      "samplerCube" => ShaderDataType::TextureCube,
      "image2D" | "uimage2D" | "iimage2D" => ShaderDataType::Image2D,
      _ => return None,
    };

    Some(ty)
  }
}

/// An active vertex attribute.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct AttributeInfo {
  /// Name.
  pub name: String,
  /// Location.
  pub location: i32,
  /// Type.
  pub ty: ShaderDataType,
  /// Number of array elements.
  pub element_count: usize,
}

/// An active uniform outside of any block.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct UniformInfo {
  /// Name, without any `[0]` suffix.
  pub name: String,
  /// Location.
  pub location: i32,
  /// Type.
  pub ty: ShaderDataType,
  /// Number of array elements.
  pub element_count: usize,
  /// Binding declared in the shader, for images; `-1` if none.
  pub binding: i32,
}

/// An active uniform, storage or atomic counter block.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct BlockInfo {
  /// Name.
  pub name: String,
  /// Index of the block in its program.
  pub index: u32,
  /// Binding declared in the shader; `-1` if none.
  pub binding: i32,
  /// Size of the block data, in bytes.
  pub byte_size: usize,
  /// Number of active members.
  pub member_count: usize,
}

/// A member of a uniform block.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct BlockMemberInfo {
  /// Name.
  pub name: String,
  /// Type.
  pub ty: ShaderDataType,
  /// Number of array elements.
  pub element_count: usize,
  /// Byte offset from the start of the block.
  pub offset: usize,
}

/// Shader program errors.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ShaderError {
  /// A stage failed to compile.
  StageCompilationFailed {
    /// Logical shader name.
    name: String,
    /// Stage.
    stage: ShaderStage,
    /// Compiler log.
    log: String,
  },

  /// The program failed to link.
  LinkFailed {
    /// Logical shader name.
    name: String,
    /// Linker log.
    log: String,
  },

  /// The backend does not support a stage.
  UnsupportedStage(ShaderStage),

  /// A non-separable program lacks a vertex stage, or both fragment and geometry stages.
  MissingStage {
    /// Logical shader name.
    name: String,
    /// Stage that would have been needed.
    stage: ShaderStage,
  },

  /// The backend could not create the program object.
  CreationFailed(String),
}

impl fmt::Display for ShaderError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      ShaderError::StageCompilationFailed {
        ref name,
        stage,
        ref log,
      } => write!(f, "{}: {} compilation error: {}", name, stage, log),

      ShaderError::LinkFailed { ref name, ref log } => write!(f, "{}: link error: {}", name, log),

      ShaderError::UnsupportedStage(stage) => write!(f, "unsupported {}", stage),

      ShaderError::MissingStage { ref name, stage } => write!(f, "{}: missing {}", name, stage),

      ShaderError::CreationFailed(ref name) => write!(f, "{}: cannot create program", name),
    }
  }
}

impl error::Error for ShaderError {}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn glsl_types() {
    assert_eq!(ShaderDataType::from_glsl("vec3"), Some(ShaderDataType::FloatVec3));
    assert_eq!(ShaderDataType::from_glsl("samplerCube"), Some(ShaderDataType::TextureCube));
    assert_eq!(ShaderDataType::from_glsl("dmat2"), None);
  }

  #[test]
  fn sizes() {
    assert_eq!(ShaderDataType::Matrix4.byte_size(), 64);
    assert_eq!(ShaderDataType::BoolVec3.byte_size(), 12);
    assert_eq!(ShaderDataType::Texture2D.component_count(), 1);
    assert!(ShaderDataType::BoolVec2.is_integer());
    assert!(!ShaderDataType::Float.is_integer());
  }
}
