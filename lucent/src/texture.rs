//! Textures and images.
//!
//! Textures are created empty and receive their storage with `set_texture_data` (one call per mip
//! level; cube textures per face). Uploads always go through texture unit `0`, which is never
//! handed out for long-lived bindings; shader constants bind textures to units starting at `1`.

use crate::backend::handle::TextureHandle;
use crate::capabilities::Capabilities;
use crate::context::{ContextCore, ResourceError};
use crate::pixel::TextureFormat;
use log::warn;
use std::cell::Cell;
use std::error;
use std::fmt;
use std::rc::Rc;

/// Texture kinds.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TextureTarget {
  /// 2D texture.
  Texture2D,
  /// Multisampled 2D texture.
  Texture2DMultisample,
  /// Array of 2D layers.
  Texture2DArray,
  /// Cube map.
  TextureCube,
}

/// Faces of a cube map, in the usual upload order.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CubeFace {
  /// `+X`.
  PositiveX,
  /// `-X`.
  NegativeX,
  /// `+Y`.
  PositiveY,
  /// `-Y`.
  NegativeY,
  /// `+Z`.
  PositiveZ,
  /// `-Z`.
  NegativeZ,
}

impl CubeFace {
  /// All faces.
  pub const ALL: [CubeFace; 6] = [
    CubeFace::PositiveX,
    CubeFace::NegativeX,
    CubeFace::PositiveY,
    CubeFace::NegativeY,
    CubeFace::PositiveZ,
    CubeFace::NegativeZ,
  ];

  /// Index of the face, `0..6`.
  pub fn index(self) -> u32 {
    self as u32
  }
}

/// Minification and magnification filters.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TextureFilter {
  /// Nearest texel.
  Nearest,
  /// Bilinear.
  Linear,
  /// Nearest texel of the nearest mip.
  NearestMipmapNearest,
  /// Bilinear in the nearest mip.
  LinearMipmapNearest,
  /// Nearest texel, blended between mips.
  NearestMipmapLinear,
  /// Trilinear.
  LinearMipmapLinear,
}

impl TextureFilter {
  /// Does this filter read mip levels other than 0?
  pub fn uses_mipmaps(self) -> bool {
    !matches!(self, TextureFilter::Nearest | TextureFilter::Linear)
  }
}

/// Wrapping of coordinates outside `[0, 1]`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TextureWrap {
  /// Clamp to the border texels.
  ClampToEdge,
  /// Repeat, mirroring every other repetition.
  MirroredRepeat,
  /// Repeat.
  Repeat,
}

/// Sampling parameters of a texture.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SamplerParams {
  /// Minification filter.
  pub min_filter: TextureFilter,
  /// Magnification filter; mipmap variants are invalid here.
  pub mag_filter: TextureFilter,
  /// Wrapping along `s`.
  pub wrap_s: TextureWrap,
  /// Wrapping along `t`.
  pub wrap_t: TextureWrap,
  /// Wrapping along `r`.
  pub wrap_r: TextureWrap,
}

impl Default for SamplerParams {
  fn default() -> Self {
    SamplerParams {
      min_filter: TextureFilter::Linear,
      mag_filter: TextureFilter::Linear,
      wrap_s: TextureWrap::ClampToEdge,
      wrap_t: TextureWrap::ClampToEdge,
      wrap_r: TextureWrap::ClampToEdge,
    }
  }
}

/// Image load / store access.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ImageAccess {
  /// Shaders only read.
  ReadOnly,
  /// Shaders only write.
  WriteOnly,
  /// Shaders read and write.
  ReadWrite,
}

/// Errors that might happen when working with textures.
#[non_exhaustive]
#[derive(Debug, Eq, PartialEq)]
pub enum TextureError {
  /// The backend cannot store that format.
  UnsupportedFormat(TextureFormat),
  /// Zero width, height or layer count.
  InvalidDimensions,
  /// Texel data does not match the format and dimensions.
  SizeMismatch {
    /// Expected size, in bytes.
    expected: usize,
    /// Provided size, in bytes.
    found: usize,
  },
  /// The operation is not available on this kind of texture.
  InvalidOperation(&'static str),
}

impl fmt::Display for TextureError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      TextureError::UnsupportedFormat(format) => write!(f, "unsupported texture format {:?}", format),
      TextureError::InvalidDimensions => f.write_str("invalid texture dimensions"),
      TextureError::SizeMismatch { expected, found } => write!(
        f,
        "mismatch texel data size (expected {} bytes, found {})",
        expected, found
      ),
      TextureError::InvalidOperation(op) => write!(f, "invalid texture operation: {}", op),
    }
  }
}

impl error::Error for TextureError {}

fn check_format(caps: Capabilities, format: TextureFormat) -> Result<(), TextureError> {
  let supported = match format {
    TextureFormat::Unknown => false,
    f if f.is_compressed() => caps.are_dxt_images_supported(),
    TextureFormat::Depth24Stencil8 => caps.is_depth_stencil_texture_supported(),
    _ => true,
  };

  if supported {
    Ok(())
  } else {
    Err(TextureError::UnsupportedFormat(format))
  }
}

fn check_upload(
  caps: Capabilities,
  format: TextureFormat,
  width: u32,
  height: u32,
  layers: u32,
  data: Option<&[u8]>,
) -> Result<(), TextureError> {
  check_format(caps, format)?;

  if width == 0 || height == 0 || layers == 0 {
    return Err(TextureError::InvalidDimensions);
  }

  if let Some(data) = data {
    let expected = format
      .image_byte_size(width, height)
      .map(|size| size * layers as usize)
      .ok_or(TextureError::UnsupportedFormat(format))?;

    if data.len() != expected {
      return Err(TextureError::SizeMismatch {
        expected,
        found: data.len(),
      });
    }
  }

  Ok(())
}

fn mip_count(width: u32, height: u32) -> u32 {
  32 - width.max(height).max(1).leading_zeros()
}

// Backend texture owned by every texture resource.
#[derive(Debug)]
pub(crate) struct TextureCore {
  core: Rc<ContextCore>,
  handle: TextureHandle,
  target: TextureTarget,
  format: Cell<TextureFormat>,
  width: Cell<u32>,
  height: Cell<u32>,
  layers: Cell<u32>,
  max_level: Cell<u32>,
  sampler: Cell<SamplerParams>,
  unit: Cell<Option<u32>>,
}

impl TextureCore {
  fn new(core: Rc<ContextCore>, target: TextureTarget) -> Result<Self, ResourceError> {
    let handle = core
      .backend()
      .create_texture(target)
      .ok_or_else(|| ResourceError::creation_failed("texture"))?;

    Ok(TextureCore {
      core,
      handle,
      target,
      format: Cell::new(TextureFormat::Unknown),
      width: Cell::new(0),
      height: Cell::new(0),
      layers: Cell::new(1),
      max_level: Cell::new(0),
      sampler: Cell::new(SamplerParams::default()),
      unit: Cell::new(None),
    })
  }

  fn record_level(&self, level: u32, format: TextureFormat, width: u32, height: u32, layers: u32) {
    if level == 0 {
      self.format.set(format);
      self.width.set(width);
      self.height.set(height);
      self.layers.set(layers);
    }

    self.max_level.set(self.max_level.get().max(level));
  }

  fn set_sampler_params(&self, params: SamplerParams) {
    if params.mag_filter.uses_mipmaps() {
      warn!(
        "mipmap filter {:?} used for magnification of texture {:?}",
        params.mag_filter, self.handle
      );
    }

    if self.sampler.get() != params {
      self.sampler.set(params);
      self
        .core
        .backend()
        .set_sampler_params(self.handle, self.target, &params);
    }
  }

  fn generate_mipmaps(&self) -> Result<(), TextureError> {
    let format = self.format.get();

    if format.is_compressed() || format == TextureFormat::Unknown {
      return Err(TextureError::InvalidOperation(
        "mipmap generation needs an uncompressed level 0",
      ));
    }

    self.core.backend().generate_mipmaps(self.handle, self.target);
    self
      .max_level
      .set(mip_count(self.width.get(), self.height.get()) - 1);
    Ok(())
  }

  fn bind(&self, unit: u32) {
    self.core.backend().bind_texture(self.handle, self.target, unit);
    self.unit.set(Some(unit));
  }
}

impl Drop for TextureCore {
  fn drop(&mut self) {
    self.core.backend().release_texture(self.handle, self.target);
  }
}

macro_rules! texture_common {
  ($name:ident, $registry:ident) => {
    impl $name {
      /// Backend handle.
      pub fn handle(&self) -> TextureHandle {
        self.texture.handle
      }

      /// Format of level 0.
      pub fn format(&self) -> TextureFormat {
        self.texture.format.get()
      }

      /// Width of level 0.
      pub fn width(&self) -> u32 {
        self.texture.width.get()
      }

      /// Height of level 0.
      pub fn height(&self) -> u32 {
        self.texture.height.get()
      }

      /// Highest mip level with storage.
      pub fn max_level(&self) -> u32 {
        self.texture.max_level.get()
      }

      /// Current sampling parameters.
      pub fn sampler_params(&self) -> SamplerParams {
        self.texture.sampler.get()
      }

      /// Change the sampling parameters; no backend call if they are unchanged.
      pub fn set_sampler_params(&self, params: SamplerParams) {
        self.texture.set_sampler_params(params)
      }

      /// Texture unit this texture was last bound to.
      pub fn texture_unit(&self) -> Option<u32> {
        self.texture.unit.get()
      }

      pub(crate) fn bind(&self, unit: u32) {
        self.texture.bind(unit)
      }
    }

    impl Drop for $name {
      fn drop(&mut self) {
        let removed = self
          .texture
          .core
          .registry()
          .$registry
          .remove(self.texture.handle);
        debug_assert!(removed, "texture {:?} released twice", self.texture.handle);
      }
    }
  };
}

/// 2D texture, optionally multisampled.
#[derive(Debug)]
pub struct Texture2D {
  texture: TextureCore,
  samples: u32,
}

texture_common!(Texture2D, textures_2d);

impl Texture2D {
  pub(crate) fn new(core: Rc<ContextCore>) -> Result<Self, ResourceError> {
    let texture = TextureCore::new(core, TextureTarget::Texture2D)?;
    Ok(Texture2D {
      texture,
      samples: 1,
    })
  }

  pub(crate) fn new_multisample(
    core: Rc<ContextCore>,
    samples: u32,
    format: TextureFormat,
    width: u32,
    height: u32,
  ) -> Result<Self, ResourceError> {
    let caps = core.capabilities();

    if !caps.is_multisample_texture_supported() {
      return Err(ResourceError::Unsupported("multisample textures"));
    }

    check_upload(caps, format, width, height, 1, None)
      .map_err(|e| ResourceError::InvalidArgument(e.to_string()))?;

    let samples = samples.clamp(1, core.limits().max_samples.max(1));
    let texture = TextureCore::new(core, TextureTarget::Texture2DMultisample)?;

    texture
      .core
      .backend()
      .set_texture_storage_2d_multisample(texture.handle, samples, format, width, height);
    texture.record_level(0, format, width, height, 1);

    Ok(Texture2D { texture, samples })
  }

  /// Number of samples per texel; `1` for regular textures.
  pub fn samples(&self) -> u32 {
    self.samples
  }

  /// Kind of texture.
  pub fn target(&self) -> TextureTarget {
    self.texture.target
  }

  /// Specify one mip level. `None` allocates storage without uploading anything.
  pub fn set_texture_data(
    &self,
    data: Option<&[u8]>,
    level: u32,
    width: u32,
    height: u32,
    format: TextureFormat,
  ) -> Result<(), TextureError> {
    if self.samples > 1 {
      return Err(TextureError::InvalidOperation(
        "multisample textures have no texel data",
      ));
    }

    check_upload(
      self.texture.core.capabilities(),
      format,
      width,
      height,
      1,
      data,
    )?;

    self.texture.core.backend().set_texture_data_2d(
      self.texture.handle,
      level,
      format,
      width,
      height,
      data,
    );
    self.texture.record_level(level, format, width, height, 1);

    Ok(())
  }

  /// Generate every mip level from level 0.
  pub fn generate_mipmaps(&self) -> Result<(), TextureError> {
    if self.samples > 1 {
      return Err(TextureError::InvalidOperation(
        "multisample textures have no mipmaps",
      ));
    }

    self.texture.generate_mipmaps()
  }
}

/// Array of 2D layers.
#[derive(Debug)]
pub struct Texture2DArray {
  texture: TextureCore,
}

texture_common!(Texture2DArray, texture_arrays);

impl Texture2DArray {
  pub(crate) fn new(core: Rc<ContextCore>) -> Result<Self, ResourceError> {
    if !core.capabilities().is_texture_array_supported() {
      return Err(ResourceError::Unsupported("texture arrays"));
    }

    let texture = TextureCore::new(core, TextureTarget::Texture2DArray)?;
    Ok(Texture2DArray { texture })
  }

  /// Number of layers.
  pub fn layers(&self) -> u32 {
    self.texture.layers.get()
  }

  /// Specify one mip level of every layer. `data` holds the layers one after the other.
  pub fn set_texture_data(
    &self,
    data: Option<&[u8]>,
    level: u32,
    width: u32,
    height: u32,
    layers: u32,
    format: TextureFormat,
  ) -> Result<(), TextureError> {
    check_upload(
      self.texture.core.capabilities(),
      format,
      width,
      height,
      layers,
      data,
    )?;

    self.texture.core.backend().set_texture_data_array(
      self.texture.handle,
      level,
      format,
      width,
      height,
      layers,
      data,
    );
    self.texture.record_level(level, format, width, height, layers);

    Ok(())
  }

  /// Generate every mip level from level 0.
  pub fn generate_mipmaps(&self) -> Result<(), TextureError> {
    self.texture.generate_mipmaps()
  }
}

/// Cube map.
#[derive(Debug)]
pub struct TextureCube {
  texture: TextureCore,
}

texture_common!(TextureCube, texture_cubes);

impl TextureCube {
  pub(crate) fn new(core: Rc<ContextCore>) -> Result<Self, ResourceError> {
    let texture = TextureCore::new(core, TextureTarget::TextureCube)?;
    Ok(TextureCube { texture })
  }

  /// Specify one mip level of one face. Faces must be square.
  pub fn set_texture_data(
    &self,
    face: CubeFace,
    data: Option<&[u8]>,
    level: u32,
    width: u32,
    height: u32,
    format: TextureFormat,
  ) -> Result<(), TextureError> {
    if width != height {
      return Err(TextureError::InvalidDimensions);
    }

    check_upload(
      self.texture.core.capabilities(),
      format,
      width,
      height,
      1,
      data,
    )?;

    self.texture.core.backend().set_texture_data_cube_face(
      self.texture.handle,
      face,
      level,
      format,
      width,
      height,
      data,
    );
    self.texture.record_level(level, format, width, height, 1);

    Ok(())
  }

  /// Generate every mip level from level 0.
  pub fn generate_mipmaps(&self) -> Result<(), TextureError> {
    self.texture.generate_mipmaps()
  }
}

/// One level of a 2D texture, bound for image load / store.
///
/// An image has no backend object of its own; it is registered under the handle of its texture.
#[derive(Debug)]
pub struct Image2D {
  core: Rc<ContextCore>,
  texture: Rc<Texture2D>,
  level: u32,
  access: ImageAccess,
  unit: Cell<Option<u32>>,
}

impl Image2D {
  pub(crate) fn new(
    core: Rc<ContextCore>,
    texture: Rc<Texture2D>,
    level: u32,
    access: ImageAccess,
  ) -> Result<Self, ResourceError> {
    if !core.capabilities().is_shader_image_load_store_supported() {
      return Err(ResourceError::Unsupported("image load / store"));
    }

    Ok(Image2D {
      core,
      texture,
      level,
      access,
      unit: Cell::new(None),
    })
  }

  /// Texture this image views.
  pub fn texture(&self) -> &Rc<Texture2D> {
    &self.texture
  }

  /// Mip level.
  pub fn level(&self) -> u32 {
    self.level
  }

  /// Access mode.
  pub fn access(&self) -> ImageAccess {
    self.access
  }

  /// Image unit this image was last bound to.
  pub fn image_unit(&self) -> Option<u32> {
    self.unit.get()
  }

  pub(crate) fn bind(&self, unit: u32) {
    self.core.backend().bind_image_texture(
      self.texture.handle(),
      unit,
      self.level,
      self.access,
      self.texture.format(),
    );
    self.unit.set(Some(unit));
  }
}

impl Drop for Image2D {
  fn drop(&mut self) {
    let removed = self.core.registry().images.remove(self.texture.handle());
    debug_assert!(removed, "image of {:?} released twice", self.texture.handle());
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mip_counts() {
    assert_eq!(mip_count(1, 1), 1);
    assert_eq!(mip_count(256, 256), 9);
    assert_eq!(mip_count(300, 20), 9);
  }

  #[test]
  fn upload_checks() {
    let caps = Capabilities::empty();

    assert_eq!(
      check_upload(caps, TextureFormat::RGBA8, 2, 2, 1, Some(&[0; 16])),
      Ok(())
    );
    assert_eq!(
      check_upload(caps, TextureFormat::RGBA8, 2, 2, 1, Some(&[0; 12])),
      Err(TextureError::SizeMismatch {
        expected: 16,
        found: 12
      })
    );
    assert_eq!(
      check_upload(caps, TextureFormat::RGBA8, 0, 2, 1, None),
      Err(TextureError::InvalidDimensions)
    );
    assert_eq!(
      check_upload(caps, TextureFormat::RGBADXT5, 4, 4, 1, None),
      Err(TextureError::UnsupportedFormat(TextureFormat::RGBADXT5))
    );
    assert_eq!(
      check_upload(
        Capabilities::DXT_IMAGES,
        TextureFormat::RGBADXT5,
        4,
        4,
        1,
        Some(&[0; 16])
      ),
      Ok(())
    );
  }
}
