//! Shader constants (uniforms).
//!
//! A [`ShaderConstant`] caches the last value it uploaded. Setting a scalar, vector or boolean
//! constant to its cached value never reaches the backend. Matrices always upload. Samplers and
//! images always bind their texture to a unit, but only upload the unit index when it changed.

use crate::backend::handle::ProgramHandle;
use crate::context::ContextCore;
use crate::linear::{M33, M44};
use crate::shader::{ShaderDataType, UniformInfo};
use crate::texture::{Image2D, Texture2D, Texture2DArray, TextureCube};
use std::cell::RefCell;
use std::error;
use std::fmt;

/// A value to set a constant to.
///
/// Slices hold `count` elements of the constant’s type, one after the other: setting a `vec3[2]`
/// takes six floats.
#[derive(Clone, Copy, Debug)]
pub enum ConstantValue<'a> {
  /// `int` and `ivecN`.
  Int(&'a [i32]),
  /// `uint` and `uvecN`.
  UInt(&'a [u32]),
  /// `float` and `vecN`.
  Float(&'a [f32]),
  /// `bool` and `bvecN`; uploaded as `1` / `0`.
  Bool(&'a [bool]),
  /// `mat3`.
  Matrix3 {
    /// Matrices.
    data: &'a [M33],
    /// Upload transposed.
    transpose: bool,
  },
  /// `mat4`.
  Matrix4 {
    /// Matrices.
    data: &'a [M44],
    /// Upload transposed.
    transpose: bool,
  },
  /// `sampler2D`.
  Texture2D(&'a Texture2D),
  /// `sampler2DArray`.
  Texture2DArray(&'a Texture2DArray),
  /// `samplerCube`.
  TextureCube(&'a TextureCube),
  /// `image2D`.
  Image2D(&'a Image2D),
  /// `sampler2D[N]`.
  Texture2DHandles(&'a [&'a Texture2D]),
  /// `samplerCube[N]`.
  TextureCubeHandles(&'a [&'a TextureCube]),
}

impl<'a> ConstantValue<'a> {
  fn kind(&self) -> &'static str {
    match *self {
      ConstantValue::Int(_) => "int",
      ConstantValue::UInt(_) => "uint",
      ConstantValue::Float(_) => "float",
      ConstantValue::Bool(_) => "bool",
      ConstantValue::Matrix3 { .. } => "mat3",
      ConstantValue::Matrix4 { .. } => "mat4",
      ConstantValue::Texture2D(_) => "sampler2D",
      ConstantValue::Texture2DArray(_) => "sampler2DArray",
      ConstantValue::TextureCube(_) => "samplerCube",
      ConstantValue::Image2D(_) => "image2D",
      ConstantValue::Texture2DHandles(_) => "sampler2D[]",
      ConstantValue::TextureCubeHandles(_) => "samplerCube[]",
    }
  }
}

/// Errors when setting a constant.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConstantError {
  /// No active constant of that name.
  NotFound(String),

  /// The value does not have the constant’s type.
  TypeMismatch {
    /// Constant name.
    name: String,
    /// Declared type.
    ty: ShaderDataType,
    /// Kind of value provided.
    found: &'static str,
  },

  /// The value holds a number of elements the constant cannot take.
  SizeMismatch {
    /// Constant name.
    name: String,
    /// Number of array elements of the constant.
    element_count: usize,
    /// Number of scalars provided.
    found: usize,
  },
}

impl fmt::Display for ConstantError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      ConstantError::NotFound(ref name) => write!(f, "inactive constant {}", name),

      ConstantError::TypeMismatch {
        ref name,
        ty,
        found,
      } => write!(f, "constant {} has type {:?}, cannot set it to {}", name, ty, found),

      ConstantError::SizeMismatch {
        ref name,
        element_count,
        found,
      } => write!(
        f,
        "constant {} has {} elements, cannot set it from {} values",
        name, element_count, found
      ),
    }
  }
}

impl error::Error for ConstantError {}

/// A uniform of a linked program.
#[derive(Debug)]
pub struct ShaderConstant {
  name: String,
  location: i32,
  ty: ShaderDataType,
  element_count: usize,
  binding: i32,
  cache: RefCell<Vec<u8>>,
  units: RefCell<Vec<i32>>,
}

impl ShaderConstant {
  pub(crate) fn new(info: UniformInfo) -> Self {
    let ty = match info.ty {
      ShaderDataType::Texture2D if info.element_count > 1 => ShaderDataType::Texture2DHandleArray,
      ShaderDataType::TextureCube if info.element_count > 1 => {
        ShaderDataType::TextureCubeHandleArray
      }
      ty => ty,
    };

    ShaderConstant {
      name: info.name,
      location: info.location,
      ty,
      element_count: info.element_count.max(1),
      binding: info.binding,
      cache: RefCell::new(Vec::new()),
      units: RefCell::new(Vec::new()),
    }
  }

  /// Name.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Location.
  pub fn location(&self) -> i32 {
    self.location
  }

  /// Type, after retagging sampler arrays as handle arrays.
  pub fn ty(&self) -> ShaderDataType {
    self.ty
  }

  /// Number of array elements.
  pub fn element_count(&self) -> usize {
    self.element_count
  }

  /// Binding declared in the shader; `-1` if none.
  pub fn binding(&self) -> i32 {
    self.binding
  }

  /// Units last uploaded, for samplers and images.
  pub fn units(&self) -> Vec<i32> {
    self.units.borrow().clone()
  }

  pub(crate) fn set(
    &self,
    core: &ContextCore,
    program: ProgramHandle,
    value: ConstantValue,
  ) -> Result<(), ConstantError> {
    match value {
      ConstantValue::Int(v) => {
        self.check_family(&value, INT_FAMILY)?;
        let count = self.check_count(v.len())?;
        self.upload_cached(core, program, count, bytemuck::cast_slice(v))
      }

      ConstantValue::UInt(v) => {
        self.check_family(&value, UINT_FAMILY)?;
        let count = self.check_count(v.len())?;
        self.upload_cached(core, program, count, bytemuck::cast_slice(v))
      }

      ConstantValue::Float(v) => {
        self.check_family(&value, FLOAT_FAMILY)?;
        let count = self.check_count(v.len())?;
        self.upload_cached(core, program, count, bytemuck::cast_slice(v))
      }

      ConstantValue::Bool(v) => {
        self.check_family(&value, BOOL_FAMILY)?;
        let count = self.check_count(v.len())?;
        let ints: Vec<i32> = v.iter().map(|&b| if b { 1 } else { 0 }).collect();
        self.upload_cached(core, program, count, bytemuck::cast_slice(&ints))
      }

      ConstantValue::Matrix3 { data, transpose } => {
        self.check_family(&value, &[ShaderDataType::Matrix3])?;
        let count = self.check_count(data.len() * 9)?;
        core.backend().set_constant_value(
          program,
          self.location,
          self.ty,
          count,
          bytemuck::cast_slice(data),
          transpose,
        );
        Ok(())
      }

      ConstantValue::Matrix4 { data, transpose } => {
        self.check_family(&value, &[ShaderDataType::Matrix4])?;
        let count = self.check_count(data.len() * 16)?;
        core.backend().set_constant_value(
          program,
          self.location,
          self.ty,
          count,
          bytemuck::cast_slice(data),
          transpose,
        );
        Ok(())
      }

      ConstantValue::Texture2D(texture) => {
        self.check_family(&value, &[ShaderDataType::Texture2D])?;
        let unit = core.next_texture_unit();
        texture.bind(unit);
        self.upload_units(core, program, &[unit as i32]);
        Ok(())
      }

      ConstantValue::Texture2DArray(texture) => {
        self.check_family(&value, &[ShaderDataType::Texture2DArray])?;
        let unit = core.next_texture_unit();
        texture.bind(unit);
        self.upload_units(core, program, &[unit as i32]);
        Ok(())
      }

      ConstantValue::TextureCube(texture) => {
        self.check_family(&value, &[ShaderDataType::TextureCube])?;
        let unit = core.next_texture_unit();
        texture.bind(unit);
        self.upload_units(core, program, &[unit as i32]);
        Ok(())
      }

      ConstantValue::Image2D(image) => {
        self.check_family(&value, &[ShaderDataType::Image2D])?;
        let unit = self.binding.max(0) as u32;
        image.bind(unit);
        self.upload_units(core, program, &[unit as i32]);
        Ok(())
      }

      ConstantValue::Texture2DHandles(textures) => {
        self.check_family(&value, &[ShaderDataType::Texture2DHandleArray])?;
        self.check_count(textures.len())?;

        let units: Vec<i32> = textures
          .iter()
          .map(|texture| {
            let unit = core.next_texture_unit();
            texture.bind(unit);
            unit as i32
          })
          .collect();

        self.upload_units(core, program, &units);
        Ok(())
      }

      ConstantValue::TextureCubeHandles(textures) => {
        self.check_family(&value, &[ShaderDataType::TextureCubeHandleArray])?;
        self.check_count(textures.len())?;

        let units: Vec<i32> = textures
          .iter()
          .map(|texture| {
            let unit = core.next_texture_unit();
            texture.bind(unit);
            unit as i32
          })
          .collect();

        self.upload_units(core, program, &units);
        Ok(())
      }
    }
  }

  fn check_family(
    &self,
    value: &ConstantValue,
    family: &[ShaderDataType],
  ) -> Result<(), ConstantError> {
    if family.contains(&self.ty) {
      Ok(())
    } else {
      Err(ConstantError::TypeMismatch {
        name: self.name.clone(),
        ty: self.ty,
        found: value.kind(),
      })
    }
  }

  // Number of elements held by `scalars` values (or handles).
  fn check_count(&self, scalars: usize) -> Result<usize, ConstantError> {
    let components = if self.ty.is_opaque() {
      1
    } else {
      self.ty.component_count()
    };

    let count = scalars / components;

    if scalars % components != 0 || count == 0 || count > self.element_count {
      return Err(ConstantError::SizeMismatch {
        name: self.name.clone(),
        element_count: self.element_count,
        found: scalars,
      });
    }

    Ok(count)
  }

  fn upload_cached(
    &self,
    core: &ContextCore,
    program: ProgramHandle,
    count: usize,
    bytes: &[u8],
  ) -> Result<(), ConstantError> {
    let mut cache = self.cache.borrow_mut();

    if cache.as_slice() != bytes {
      core
        .backend()
        .set_constant_value(program, self.location, self.ty, count, bytes, false);
      cache.clear();
      cache.extend_from_slice(bytes);
    }

    Ok(())
  }

  fn upload_units(&self, core: &ContextCore, program: ProgramHandle, units: &[i32]) {
    let mut cached = self.units.borrow_mut();

    if cached.as_slice() != units {
      core.backend().set_constant_value(
        program,
        self.location,
        self.ty,
        units.len(),
        bytemuck::cast_slice(units),
        false,
      );
      cached.clear();
      cached.extend_from_slice(units);
    }
  }
}

const INT_FAMILY: &[ShaderDataType] = &[
  ShaderDataType::Int,
  ShaderDataType::IntVec2,
  ShaderDataType::IntVec3,
  ShaderDataType::IntVec4,
];

const UINT_FAMILY: &[ShaderDataType] = &[
  ShaderDataType::UInt,
  ShaderDataType::UIntVec2,
  ShaderDataType::UIntVec3,
  ShaderDataType::UIntVec4,
];

const FLOAT_FAMILY: &[ShaderDataType] = &[
  ShaderDataType::Float,
  ShaderDataType::FloatVec2,
  ShaderDataType::FloatVec3,
  ShaderDataType::FloatVec4,
];

const BOOL_FAMILY: &[ShaderDataType] = &[
  ShaderDataType::Bool,
  ShaderDataType::BoolVec2,
  ShaderDataType::BoolVec3,
  ShaderDataType::BoolVec4,
];

#[cfg(test)]
mod tests {
  use super::*;

  fn constant(ty: ShaderDataType, element_count: usize) -> ShaderConstant {
    ShaderConstant::new(UniformInfo {
      name: "u".to_owned(),
      location: 3,
      ty,
      element_count,
      binding: -1,
    })
  }

  #[test]
  fn sampler_arrays_are_retagged() {
    assert_eq!(
      constant(ShaderDataType::Texture2D, 4).ty(),
      ShaderDataType::Texture2DHandleArray
    );
    assert_eq!(
      constant(ShaderDataType::TextureCube, 2).ty(),
      ShaderDataType::TextureCubeHandleArray
    );
    assert_eq!(
      constant(ShaderDataType::Texture2D, 1).ty(),
      ShaderDataType::Texture2D
    );
  }

  #[test]
  fn counts() {
    let c = constant(ShaderDataType::FloatVec3, 2);

    assert_eq!(c.check_count(3), Ok(1));
    assert_eq!(c.check_count(6), Ok(2));
    assert!(c.check_count(4).is_err());
    assert!(c.check_count(9).is_err());
    assert!(c.check_count(0).is_err());
  }
}
