//! Scalar component types.
//!
//! A [`ComponentType`] describes one scalar of a vertex attribute or one element of an index
//! buffer.

/// Type of a single scalar component.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ComponentType {
  /// Unsigned 8-bit integer.
  UInt8,
  /// Signed 8-bit integer.
  Int8,
  /// Unsigned 16-bit integer.
  UInt16,
  /// Signed 16-bit integer.
  Int16,
  /// Unsigned 32-bit integer.
  UInt32,
  /// Signed 32-bit integer.
  Int32,
  /// Unsigned 64-bit integer.
  UInt64,
  /// Signed 64-bit integer.
  Int64,
  /// 16-bit (half) floating point.
  Float16,
  /// 32-bit floating point.
  Float32,
  /// 64-bit floating point.
  Float64,
}

impl ComponentType {
  /// Size in bytes of one component.
  pub const fn size_of(self) -> usize {
    match self {
      ComponentType::UInt8 | ComponentType::Int8 => 1,
      ComponentType::UInt16 | ComponentType::Int16 | ComponentType::Float16 => 2,
      ComponentType::UInt32 | ComponentType::Int32 | ComponentType::Float32 => 4,
      ComponentType::UInt64 | ComponentType::Int64 | ComponentType::Float64 => 8,
    }
  }

  /// Whether the component is a floating-point type.
  pub const fn is_floating(self) -> bool {
    matches!(
      self,
      ComponentType::Float16 | ComponentType::Float32 | ComponentType::Float64
    )
  }

  /// Whether the component can be used to index vertices.
  pub const fn is_index_type(self) -> bool {
    matches!(
      self,
      ComponentType::UInt8 | ComponentType::UInt16 | ComponentType::UInt32
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sizes() {
    assert_eq!(ComponentType::UInt8.size_of(), 1);
    assert_eq!(ComponentType::Int16.size_of(), 2);
    assert_eq!(ComponentType::Float16.size_of(), 2);
    assert_eq!(ComponentType::Float32.size_of(), 4);
    assert_eq!(ComponentType::Int64.size_of(), 8);
    assert_eq!(ComponentType::Float64.size_of(), 8);
  }

  #[test]
  fn index_types() {
    assert!(ComponentType::UInt16.is_index_type());
    assert!(!ComponentType::Int16.is_index_type());
    assert!(!ComponentType::Float32.is_index_type());
  }
}
