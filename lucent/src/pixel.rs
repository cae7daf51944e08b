//! Texture and render buffer formats.
//!
//! [`TextureFormat`] is partitioned into three disjoint categories:
//!
//! - Uncompressed color formats ([`TextureFormat::is_uncompressed`]).
//! - Block-compressed formats ([`TextureFormat::is_compressed`]).
//! - Depth and depth / stencil formats ([`TextureFormat::is_depth`]).
//!
//! [`TextureFormat::Unknown`] belongs to none of them.
//!
//! The module also carries a CPU-side codec between texels and a canonical `[f32; 4]` RGBA
//! representation, used when reading back or generating mip levels on the CPU.

/// Gamma exponent applied when encoding 8-bit color channels.
const ENCODE_GAMMA: f32 = 2.2;

/// Gamma exponent applied when decoding 8-bit color channels.
const DECODE_GAMMA: f32 = 1. / 2.2;

/// A texture or render buffer format.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TextureFormat {
  /// Unknown format; not usable.
  Unknown,
  /// 8-bit red.
  R8,
  /// 16-bit red.
  R16,
  /// 16-bit floating red.
  R16F,
  /// 32-bit signed integral red.
  R32I,
  /// 32-bit unsigned integral red.
  R32UI,
  /// 32-bit floating red.
  R32F,
  /// 8-bit red and green.
  RG8,
  /// 8-bit RGBA.
  RGBA8,
  /// 8-bit RGB.
  RGB8,
  /// 8-bit sRGB.
  SRGB8,
  /// 8-bit sRGB with linear alpha.
  SRGB8A8,
  /// Packed 5-6-5 RGB.
  RGB565,
  /// Packed 5-5-5-1 RGBA.
  RGBA5551,
  /// 8-bit alpha only.
  Alpha8,
  /// 8-bit luminance.
  Luminance8,
  /// 8-bit luminance and alpha.
  LuminanceAlpha8,
  /// 16-bit floating red and green.
  RG16F,
  /// 16-bit floating RGBA.
  RGBA16F,
  /// 32-bit floating red and green.
  RG32F,
  /// 32-bit floating RGB.
  RGB32F,
  /// 32-bit floating RGBA.
  RGBA32F,
  /// Packed 11-11-10 floating RGB.
  R11G11B10,
  /// Shared-exponent RGB.
  RGB9E5,
  /// DXT1 compressed RGB.
  RGBDXT1,
  /// DXT1 compressed RGBA.
  RGBADXT1,
  /// DXT3 compressed RGBA.
  RGBADXT3,
  /// DXT5 compressed RGBA.
  RGBADXT5,
  /// 16-bit depth.
  Depth16,
  /// 24-bit depth.
  Depth24,
  /// 32-bit depth.
  Depth32,
  /// 24-bit depth with 8-bit stencil.
  Depth24Stencil8,
}

impl TextureFormat {
  /// Every format, `Unknown` included.
  pub const ALL: [TextureFormat; 32] = [
    TextureFormat::Unknown,
    TextureFormat::R8,
    TextureFormat::R16,
    TextureFormat::R16F,
    TextureFormat::R32I,
    TextureFormat::R32UI,
    TextureFormat::R32F,
    TextureFormat::RG8,
    TextureFormat::RGBA8,
    TextureFormat::RGB8,
    TextureFormat::SRGB8,
    TextureFormat::SRGB8A8,
    TextureFormat::RGB565,
    TextureFormat::RGBA5551,
    TextureFormat::Alpha8,
    TextureFormat::Luminance8,
    TextureFormat::LuminanceAlpha8,
    TextureFormat::RG16F,
    TextureFormat::RGBA16F,
    TextureFormat::RG32F,
    TextureFormat::RGB32F,
    TextureFormat::RGBA32F,
    TextureFormat::R11G11B10,
    TextureFormat::RGB9E5,
    TextureFormat::RGBDXT1,
    TextureFormat::RGBADXT1,
    TextureFormat::RGBADXT3,
    TextureFormat::RGBADXT5,
    TextureFormat::Depth16,
    TextureFormat::Depth24,
    TextureFormat::Depth32,
    TextureFormat::Depth24Stencil8,
  ];

  /// Is this an uncompressed color format?
  pub fn is_uncompressed(self) -> bool {
    !matches!(self, TextureFormat::Unknown) && !self.is_compressed() && !self.is_depth()
  }

  /// Is this a block-compressed format?
  pub fn is_compressed(self) -> bool {
    matches!(
      self,
      TextureFormat::RGBDXT1
        | TextureFormat::RGBADXT1
        | TextureFormat::RGBADXT3
        | TextureFormat::RGBADXT5
    )
  }

  /// Is this a depth (or depth / stencil) format?
  pub fn is_depth(self) -> bool {
    matches!(
      self,
      TextureFormat::Depth16
        | TextureFormat::Depth24
        | TextureFormat::Depth32
        | TextureFormat::Depth24Stencil8
    )
  }

  /// Does the format carry a stencil channel?
  pub fn has_stencil(self) -> bool {
    self == TextureFormat::Depth24Stencil8
  }

  /// Size in bytes of a single texel.
  ///
  /// # Panics
  ///
  /// Only uncompressed and depth formats have a per-texel size. Asking for the size of a
  /// compressed format (or of [`TextureFormat::Unknown`]) is a programming error and panics.
  pub fn byte_size(self) -> usize {
    match self {
      TextureFormat::R8 | TextureFormat::Alpha8 | TextureFormat::Luminance8 => 1,
      TextureFormat::R16
      | TextureFormat::R16F
      | TextureFormat::RG8
      | TextureFormat::RGB565
      | TextureFormat::RGBA5551
      | TextureFormat::LuminanceAlpha8
      | TextureFormat::Depth16 => 2,
      TextureFormat::RGB8 | TextureFormat::SRGB8 | TextureFormat::Depth24 => 3,
      TextureFormat::R32I
      | TextureFormat::R32UI
      | TextureFormat::R32F
      | TextureFormat::RGBA8
      | TextureFormat::SRGB8A8
      | TextureFormat::RG16F
      | TextureFormat::R11G11B10
      | TextureFormat::RGB9E5
      | TextureFormat::Depth32
      | TextureFormat::Depth24Stencil8 => 4,
      TextureFormat::RGBA16F | TextureFormat::RG32F => 8,
      TextureFormat::RGB32F => 12,
      TextureFormat::RGBA32F => 16,
      TextureFormat::Unknown
      | TextureFormat::RGBDXT1
      | TextureFormat::RGBADXT1
      | TextureFormat::RGBADXT3
      | TextureFormat::RGBADXT5 => {
        panic!("byte size is undefined for texture format {:?}", self)
      }
    }
  }

  /// Number of channels carried by a texel.
  pub fn component_count(self) -> usize {
    match self {
      TextureFormat::Unknown => 0,
      TextureFormat::R8
      | TextureFormat::R16
      | TextureFormat::R16F
      | TextureFormat::R32I
      | TextureFormat::R32UI
      | TextureFormat::R32F
      | TextureFormat::Alpha8
      | TextureFormat::Luminance8
      | TextureFormat::Depth16
      | TextureFormat::Depth24
      | TextureFormat::Depth32 => 1,
      TextureFormat::RG8
      | TextureFormat::RG16F
      | TextureFormat::RG32F
      | TextureFormat::LuminanceAlpha8
      | TextureFormat::Depth24Stencil8 => 2,
      TextureFormat::RGB8
      | TextureFormat::SRGB8
      | TextureFormat::RGB565
      | TextureFormat::RGB32F
      | TextureFormat::R11G11B10
      | TextureFormat::RGB9E5
      | TextureFormat::RGBDXT1 => 3,
      TextureFormat::RGBA8
      | TextureFormat::SRGB8A8
      | TextureFormat::RGBA5551
      | TextureFormat::RGBA16F
      | TextureFormat::RGBA32F
      | TextureFormat::RGBADXT1
      | TextureFormat::RGBADXT3
      | TextureFormat::RGBADXT5 => 4,
    }
  }

  /// Size in bytes of a compressed 4x4 block.
  ///
  /// Returns `None` for non-compressed formats.
  pub fn block_byte_size(self) -> Option<usize> {
    match self {
      TextureFormat::RGBDXT1 | TextureFormat::RGBADXT1 => Some(8),
      TextureFormat::RGBADXT3 | TextureFormat::RGBADXT5 => Some(16),
      _ => None,
    }
  }

  /// Number of bytes an image of `width` × `height` texels occupies in this format.
  ///
  /// Compressed formats are rounded up to whole 4x4 blocks. Returns `None` for
  /// [`TextureFormat::Unknown`].
  pub fn image_byte_size(self, width: u32, height: u32) -> Option<usize> {
    if self == TextureFormat::Unknown {
      return None;
    }

    if let Some(block) = self.block_byte_size() {
      let blocks_w = ((width + 3) / 4).max(1) as usize;
      let blocks_h = ((height + 3) / 4).max(1) as usize;
      return Some(blocks_w * blocks_h * block);
    }

    Some(width as usize * height as usize * self.byte_size())
  }

  /// Can the format be used as a color render target?
  pub fn is_color_renderable(self) -> bool {
    self.is_uncompressed()
      && !matches!(
        self,
        TextureFormat::RGB9E5 | TextureFormat::Luminance8 | TextureFormat::LuminanceAlpha8
      )
  }

  /// Decode the texel starting at `offset` in `bytes` to linear RGBA.
  ///
  /// 8-bit color channels are converted to `[0; 1]` and raised to `1 / 2.2` (alpha stays linear).
  /// Half-float and float formats are decoded as-is. Missing color channels decode to `0` and a
  /// missing alpha decodes to `1`.
  ///
  /// Returns `None` if the format has no CPU codec or if `bytes` is too short.
  ///
  /// # Half floats
  ///
  /// Half-float channels go through [`half_to_f32`], which does not handle NaN, infinities or
  /// denormals.
  pub fn decode_to_float(self, bytes: &[u8], offset: usize) -> Option<[f32; 4]> {
    let channels = codec_channels(self)?;
    let texel = bytes.get(offset..offset + self.byte_size())?;
    let mut out = [0., 0., 0., 1.];

    match channels {
      Codec::Unorm8 { count } => {
        for (i, &b) in texel.iter().take(count).enumerate() {
          let v = b as f32 / 255.;
          out[i] = if i < 3 { v.powf(DECODE_GAMMA) } else { v };
        }
      }

      Codec::Half { count } => {
        for i in 0..count {
          let bits = u16::from_ne_bytes([texel[i * 2], texel[i * 2 + 1]]);
          out[i] = half_to_f32(bits);
        }
      }

      Codec::Float { count } => {
        for i in 0..count {
          let mut raw = [0; 4];
          raw.copy_from_slice(&texel[i * 4..i * 4 + 4]);
          out[i] = f32::from_ne_bytes(raw);
        }
      }
    }

    Some(out)
  }

  /// Encode a linear RGBA value into the bytes of one texel of this format.
  ///
  /// 8-bit color channels are clamped to `[0; 1]`, raised to `2.2` and quantized (alpha stays
  /// linear). This is the inverse of [`TextureFormat::decode_to_float`].
  ///
  /// Returns `None` if the format has no CPU codec.
  pub fn encode_from_float(self, value: [f32; 4]) -> Option<Vec<u8>> {
    let channels = codec_channels(self)?;
    let mut out = Vec::with_capacity(self.byte_size());

    match channels {
      Codec::Unorm8 { count } => {
        for (i, v) in value.iter().take(count).enumerate() {
          let v = v.clamp(0., 1.);
          let v = if i < 3 { v.powf(ENCODE_GAMMA) } else { v };
          out.push((v * 255. + 0.5) as u8);
        }
      }

      Codec::Half { count } => {
        for v in value.iter().take(count) {
          out.extend_from_slice(&f32_to_half(*v).to_ne_bytes());
        }
      }

      Codec::Float { count } => {
        for v in value.iter().take(count) {
          out.extend_from_slice(&v.to_ne_bytes());
        }
      }
    }

    Some(out)
  }
}

// Channel layout understood by the CPU codec.
#[derive(Clone, Copy, Debug)]
enum Codec {
  Unorm8 { count: usize },
  Half { count: usize },
  Float { count: usize },
}

fn codec_channels(format: TextureFormat) -> Option<Codec> {
  match format {
    TextureFormat::R8 => Some(Codec::Unorm8 { count: 1 }),
    TextureFormat::RG8 => Some(Codec::Unorm8 { count: 2 }),
    TextureFormat::RGB8 | TextureFormat::SRGB8 => Some(Codec::Unorm8 { count: 3 }),
    TextureFormat::RGBA8 | TextureFormat::SRGB8A8 => Some(Codec::Unorm8 { count: 4 }),
    TextureFormat::R16F => Some(Codec::Half { count: 1 }),
    TextureFormat::RG16F => Some(Codec::Half { count: 2 }),
    TextureFormat::RGBA16F => Some(Codec::Half { count: 4 }),
    TextureFormat::R32F => Some(Codec::Float { count: 1 }),
    TextureFormat::RG32F => Some(Codec::Float { count: 2 }),
    TextureFormat::RGB32F => Some(Codec::Float { count: 3 }),
    TextureFormat::RGBA32F => Some(Codec::Float { count: 4 }),
    _ => None,
  }
}

/// Convert a single-precision float to half precision by moving bits around.
///
/// Only normal, finite values whose exponent fits the half range are converted correctly; ±0 is
/// special-cased. NaN, infinities, denormals and out-of-range exponents produce unspecified bit
/// patterns. This is a known limitation of the mip-generation codec.
pub fn f32_to_half(value: f32) -> u16 {
  let bits = value.to_bits();
  let sign = ((bits >> 16) & 0x8000) as u16;

  if bits & 0x7fff_ffff == 0 {
    return sign;
  }

  let exponent = (((bits >> 23) & 0xff) as i32 - 127 + 15) as u16 & 0x1f;
  let mantissa = ((bits >> 13) & 0x3ff) as u16;

  sign | (exponent << 10) | mantissa
}

/// Convert a half-precision float to single precision by moving bits around.
///
/// Shares the limitations of [`f32_to_half`]: ±0 is special-cased, NaN, infinities and denormals
/// are not.
pub fn half_to_f32(half: u16) -> f32 {
  let sign = ((half & 0x8000) as u32) << 16;

  if half & 0x7fff == 0 {
    return f32::from_bits(sign);
  }

  let exponent = ((half >> 10) & 0x1f) as u32 + 127 - 15;
  let mantissa = ((half & 0x3ff) as u32) << 13;

  f32::from_bits(sign | (exponent << 23) | mantissa)
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_abs_diff_eq;

  #[test]
  fn format_partition() {
    for format in TextureFormat::ALL {
      let categories = [
        format.is_uncompressed(),
        format.is_compressed(),
        format.is_depth(),
      ];
      let count = categories.iter().filter(|c| **c).count();

      if format == TextureFormat::Unknown {
        assert_eq!(count, 0, "{:?}", format);
      } else {
        assert_eq!(count, 1, "{:?}", format);
      }
    }
  }

  #[test]
  fn byte_sizes() {
    assert_eq!(TextureFormat::R8.byte_size(), 1);
    assert_eq!(TextureFormat::RGB8.byte_size(), 3);
    assert_eq!(TextureFormat::RGBA16F.byte_size(), 8);
    assert_eq!(TextureFormat::RGBA32F.byte_size(), 16);
    assert_eq!(TextureFormat::Depth24Stencil8.byte_size(), 4);
  }

  #[test]
  #[should_panic]
  fn compressed_byte_size_panics() {
    TextureFormat::RGBADXT5.byte_size();
  }

  #[test]
  fn compressed_image_size_rounds_to_blocks() {
    assert_eq!(TextureFormat::RGBDXT1.image_byte_size(5, 4), Some(16));
    assert_eq!(TextureFormat::RGBADXT5.image_byte_size(1, 1), Some(16));
    assert_eq!(TextureFormat::RGBA8.image_byte_size(2, 3), Some(24));
    assert_eq!(TextureFormat::Unknown.image_byte_size(2, 3), None);
  }

  #[test]
  fn unorm8_bytes_survive_decode_encode() {
    for b in 0..=255u8 {
      let bytes = [b, b, b, b];
      let v = TextureFormat::RGBA8.decode_to_float(&bytes, 0).unwrap();
      let back = TextureFormat::RGBA8.encode_from_float(v).unwrap();

      assert_eq!(back, bytes.to_vec());
    }
  }

  // Gamma stretches the dark bytes: a color channel comes back within the span of values rounding
  // to its byte, and within 1 / 255 from 0.3 up only. Alpha is always within half a step.
  #[test]
  fn unorm8_floats_survive_encode_decode() {
    for i in 0..=100 {
      let v = i as f32 / 100.;
      let bytes = TextureFormat::RGBA8
        .encode_from_float([v, v, v, v])
        .unwrap();
      let back = TextureFormat::RGBA8.decode_to_float(&bytes, 0).unwrap();

      let b = bytes[0] as f32;
      let low = ((b - 0.5).max(0.) / 255.).powf(DECODE_GAMMA);
      let high = ((b + 0.5).min(255.) / 255.).powf(DECODE_GAMMA);

      for &c in &back[..3] {
        assert!(
          (c - v).abs() <= high - low + 1e-5,
          "{} came back as {} (byte {})",
          v,
          c,
          b
        );

        if v >= 0.3 {
          assert_abs_diff_eq!(c, v, epsilon = 1. / 255.);
        }
      }

      assert_abs_diff_eq!(back[3], v, epsilon = 0.5 / 255. + 1e-6);
    }
  }

  #[test]
  fn dark_unorm8_values_drift_past_one_step() {
    let bytes = TextureFormat::RGBA8
      .encode_from_float([0.1, 0., 0., 1.])
      .unwrap();
    assert_eq!(bytes[0], 2);

    let back = TextureFormat::RGBA8.decode_to_float(&bytes, 0).unwrap();
    assert!(back[0] - 0.1 > 1. / 255.);
  }

  #[test]
  fn alpha_is_linear() {
    let bytes = TextureFormat::RGBA8
      .encode_from_float([0., 0., 0., 0.5])
      .unwrap();
    assert_eq!(bytes[3], 128);

    let bytes = TextureFormat::RGBA8
      .encode_from_float([0.5, 0., 0., 0.])
      .unwrap();
    assert_eq!(bytes[0], 55);
  }

  #[test]
  fn float_formats_are_bit_exact() {
    let value = [0.1, -3.75, 1.0e-3, 12345.678];

    for format in [
      TextureFormat::R32F,
      TextureFormat::RG32F,
      TextureFormat::RGB32F,
      TextureFormat::RGBA32F,
    ] {
      let bytes = format.encode_from_float(value).unwrap();
      let back = format.decode_to_float(&bytes, 0).unwrap();

      for i in 0..format.component_count() {
        assert_eq!(back[i].to_bits(), value[i].to_bits());
      }
    }
  }

  #[test]
  fn decode_reads_at_offset() {
    let bytes = [0, 0, 0, 255, 0, 0];
    let v = TextureFormat::RGB8.decode_to_float(&bytes, 3).unwrap();

    assert_eq!(v, [1., 0., 0., 1.]);
    assert!(TextureFormat::RGB8.decode_to_float(&bytes, 4).is_none());
  }

  #[test]
  fn half_float_round_trip_for_normal_values() {
    for &v in &[0., -0., 1., -2., 0.5, 0.25, 1024., 0.099975586] {
      assert_eq!(half_to_f32(f32_to_half(v)), v);
    }
  }

  #[test]
  fn no_codec_for_packed_formats() {
    assert!(TextureFormat::RGB565.encode_from_float([1.; 4]).is_none());
    assert!(TextureFormat::Depth16.decode_to_float(&[0, 0], 0).is_none());
  }
}
