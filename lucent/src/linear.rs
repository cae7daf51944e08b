//! Aliases types used to make it easier using long linear algebra types.
//!
//! Matrices are column-major: `m[column][row]`, which is the layout the graphics APIs expect when
//! uploading without transposition.

/// 3x3 floating matrix.
pub type M33 = [[f32; 3]; 3];

/// 4x4 floating matrix.
pub type M44 = [[f32; 4]; 4];

/// The 4x4 identity matrix.
pub const IDENTITY44: M44 = [
  [1., 0., 0., 0.],
  [0., 1., 0., 0.],
  [0., 0., 1., 0.],
  [0., 0., 0., 1.],
];

/// Multiply two column-major 4x4 matrices (`a * b`).
pub fn mul44(a: &M44, b: &M44) -> M44 {
  let mut out = [[0.; 4]; 4];

  for col in 0..4 {
    for row in 0..4 {
      out[col][row] = (0..4).map(|k| a[k][row] * b[col][k]).sum();
    }
  }

  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn identity_is_neutral() {
    let m = [
      [1., 2., 3., 4.],
      [5., 6., 7., 8.],
      [9., 10., 11., 12.],
      [13., 14., 15., 16.],
    ];

    assert_eq!(mul44(&IDENTITY44, &m), m);
    assert_eq!(mul44(&m, &IDENTITY44), m);
  }

  #[test]
  fn translation_composes() {
    let mut t = IDENTITY44;
    t[3][0] = 2.;

    let tt = mul44(&t, &t);
    assert_eq!(tt[3][0], 4.);
  }
}
