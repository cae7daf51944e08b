//! Texture and render buffer objects.
//!
//! Texture unit 0 is never handed out for sampling by the render context; it is used here to bind
//! textures while they are being specified.

use crate::backend::GlBackend;
use crate::convert::{
  cube_face, image_access, legacy_swizzle, texture_filter, texture_format, texture_target,
  texture_wrap, GlFormat,
};
use gl::types::*;
use lucent::backend::handle::{RenderBufferHandle, TextureHandle};
use lucent::pixel::TextureFormat;
use lucent::texture::{CubeFace, ImageAccess, SamplerParams, TextureTarget};
use std::os::raw::c_void;
use std::ptr;

const EDIT_UNIT: u32 = 0;

pub(crate) unsafe fn create(backend: &mut GlBackend, target: TextureTarget) -> Option<TextureHandle> {
  let mut handle: GLuint = 0;
  gl::GenTextures(1, &mut handle);

  let texture = TextureHandle::from_raw(handle.into())?;
  // the first bind gives the texture its target
  bind_for_edit(backend, texture_target(target), handle);

  Some(texture)
}

unsafe fn bind_for_edit(backend: &mut GlBackend, target: GLenum, handle: GLuint) {
  backend.state.set_texture_unit(EDIT_UNIT);
  backend.state.bind_texture(target, handle);
}

fn gl_format(backend: &GlBackend, format: TextureFormat) -> Option<GlFormat> {
  let gl_format = texture_format(format, backend.is_legacy());

  if gl_format.is_none() {
    log::error!("{:?} has no OpenGL equivalent", format);
  }

  gl_format
}

fn data_ptr(data: Option<&[u8]>) -> *const c_void {
  data.map_or(ptr::null(), |d| d.as_ptr() as *const c_void)
}

// Specify one 2D image of `target` (a 2D target or a cube face).
#[allow(clippy::too_many_arguments)]
unsafe fn image_2d(
  backend: &GlBackend,
  target: GLenum,
  level: u32,
  format: TextureFormat,
  gl_format: GlFormat,
  width: u32,
  height: u32,
  data: Option<&[u8]>,
) {
  if format.is_compressed() {
    let size = format.image_byte_size(width, height).unwrap_or(0);

    gl::CompressedTexImage2D(
      target,
      level as GLint,
      gl_format.internal,
      width as GLsizei,
      height as GLsizei,
      0,
      size as GLsizei,
      data_ptr(data),
    );
  } else {
    gl::TexImage2D(
      target,
      level as GLint,
      gl_format.internal as GLint,
      width as GLsizei,
      height as GLsizei,
      0,
      gl_format.format,
      gl_format.ty,
      data_ptr(data),
    );
  }

  if !backend.is_legacy() {
    if let Some(swizzle) = legacy_swizzle(format) {
      let swizzle_target = if target == gl::TEXTURE_2D {
        gl::TEXTURE_2D
      } else {
        gl::TEXTURE_CUBE_MAP
      };

      gl::TexParameteriv(swizzle_target, gl::TEXTURE_SWIZZLE_RGBA, swizzle.as_ptr());
    }
  }
}

#[allow(clippy::too_many_arguments)]
pub(crate) unsafe fn set_data_2d(
  backend: &mut GlBackend,
  texture: TextureHandle,
  level: u32,
  format: TextureFormat,
  width: u32,
  height: u32,
  data: Option<&[u8]>,
) {
  let gl_format = match gl_format(backend, format) {
    Some(f) => f,
    None => return,
  };

  bind_for_edit(backend, gl::TEXTURE_2D, texture.raw() as GLuint);
  image_2d(
    backend,
    gl::TEXTURE_2D,
    level,
    format,
    gl_format,
    width,
    height,
    data,
  );
}

pub(crate) unsafe fn set_storage_2d_multisample(
  backend: &mut GlBackend,
  texture: TextureHandle,
  samples: u32,
  format: TextureFormat,
  width: u32,
  height: u32,
) {
  let gl_format = match gl_format(backend, format) {
    Some(f) => f,
    None => return,
  };

  bind_for_edit(backend, gl::TEXTURE_2D_MULTISAMPLE, texture.raw() as GLuint);

  if gl::TexStorage2DMultisample::is_loaded() {
    gl::TexStorage2DMultisample(
      gl::TEXTURE_2D_MULTISAMPLE,
      samples as GLsizei,
      gl_format.internal,
      width as GLsizei,
      height as GLsizei,
      gl::TRUE,
    );
  } else {
    gl::TexImage2DMultisample(
      gl::TEXTURE_2D_MULTISAMPLE,
      samples as GLsizei,
      gl_format.internal,
      width as GLsizei,
      height as GLsizei,
      gl::TRUE,
    );
  }
}

#[allow(clippy::too_many_arguments)]
pub(crate) unsafe fn set_data_cube_face(
  backend: &mut GlBackend,
  texture: TextureHandle,
  face: CubeFace,
  level: u32,
  format: TextureFormat,
  width: u32,
  height: u32,
  data: Option<&[u8]>,
) {
  let gl_format = match gl_format(backend, format) {
    Some(f) => f,
    None => return,
  };

  bind_for_edit(backend, gl::TEXTURE_CUBE_MAP, texture.raw() as GLuint);
  image_2d(
    backend,
    cube_face(face),
    level,
    format,
    gl_format,
    width,
    height,
    data,
  );
}

#[allow(clippy::too_many_arguments)]
pub(crate) unsafe fn set_data_array(
  backend: &mut GlBackend,
  texture: TextureHandle,
  level: u32,
  format: TextureFormat,
  width: u32,
  height: u32,
  layers: u32,
  data: Option<&[u8]>,
) {
  let gl_format = match gl_format(backend, format) {
    Some(f) => f,
    None => return,
  };

  bind_for_edit(backend, gl::TEXTURE_2D_ARRAY, texture.raw() as GLuint);

  if format.is_compressed() {
    let size = format.image_byte_size(width, height).unwrap_or(0) * layers as usize;

    gl::CompressedTexImage3D(
      gl::TEXTURE_2D_ARRAY,
      level as GLint,
      gl_format.internal,
      width as GLsizei,
      height as GLsizei,
      layers as GLsizei,
      0,
      size as GLsizei,
      data_ptr(data),
    );
  } else {
    gl::TexImage3D(
      gl::TEXTURE_2D_ARRAY,
      level as GLint,
      gl_format.internal as GLint,
      width as GLsizei,
      height as GLsizei,
      layers as GLsizei,
      0,
      gl_format.format,
      gl_format.ty,
      data_ptr(data),
    );
  }
}

pub(crate) unsafe fn set_sampler_params(
  backend: &mut GlBackend,
  texture: TextureHandle,
  target: TextureTarget,
  params: &SamplerParams,
) {
  // multisample textures are never filtered
  if target == TextureTarget::Texture2DMultisample {
    return;
  }

  let gl_target = texture_target(target);
  bind_for_edit(backend, gl_target, texture.raw() as GLuint);

  gl::TexParameteri(
    gl_target,
    gl::TEXTURE_MIN_FILTER,
    texture_filter(params.min_filter) as GLint,
  );
  gl::TexParameteri(
    gl_target,
    gl::TEXTURE_MAG_FILTER,
    texture_filter(params.mag_filter) as GLint,
  );
  gl::TexParameteri(
    gl_target,
    gl::TEXTURE_WRAP_S,
    texture_wrap(params.wrap_s) as GLint,
  );
  gl::TexParameteri(
    gl_target,
    gl::TEXTURE_WRAP_T,
    texture_wrap(params.wrap_t) as GLint,
  );

  // ES2 has no third coordinate
  if !backend.is_legacy() {
    gl::TexParameteri(
      gl_target,
      gl::TEXTURE_WRAP_R,
      texture_wrap(params.wrap_r) as GLint,
    );
  }
}

pub(crate) unsafe fn generate_mipmaps(
  backend: &mut GlBackend,
  texture: TextureHandle,
  target: TextureTarget,
) {
  let gl_target = texture_target(target);

  bind_for_edit(backend, gl_target, texture.raw() as GLuint);
  gl::GenerateMipmap(gl_target);
}

pub(crate) unsafe fn bind(
  backend: &mut GlBackend,
  texture: TextureHandle,
  target: TextureTarget,
  unit: u32,
) {
  backend.state.set_texture_unit(unit);
  backend
    .state
    .bind_texture(texture_target(target), texture.raw() as GLuint);
}

pub(crate) unsafe fn bind_image(
  backend: &mut GlBackend,
  texture: TextureHandle,
  unit: u32,
  level: u32,
  access: ImageAccess,
  format: TextureFormat,
) {
  let gl_format = match gl_format(backend, format) {
    Some(f) => f,
    None => return,
  };

  gl::BindImageTexture(
    unit,
    texture.raw() as GLuint,
    level as GLint,
    gl::FALSE,
    0,
    image_access(access),
    gl_format.internal,
  );
}

pub(crate) unsafe fn release(backend: &mut GlBackend, texture: TextureHandle) {
  let handle = texture.raw() as GLuint;

  gl::DeleteTextures(1, &handle);
  backend.state.forget_texture(handle);
}

pub(crate) unsafe fn create_render_buffer(
  backend: &mut GlBackend,
  format: TextureFormat,
  width: u32,
  height: u32,
) -> Option<RenderBufferHandle> {
  let mut handle: GLuint = 0;
  gl::GenRenderbuffers(1, &mut handle);

  let render_buffer = RenderBufferHandle::from_raw(handle.into())?;
  set_render_buffer_storage(backend, render_buffer, format, width, height);

  Some(render_buffer)
}

pub(crate) unsafe fn set_render_buffer_storage(
  backend: &mut GlBackend,
  render_buffer: RenderBufferHandle,
  format: TextureFormat,
  width: u32,
  height: u32,
) {
  // render buffers take sized formats everywhere, ES2 included
  let internal = match texture_format(format, false) {
    Some(f) => f.internal,
    None => {
      log::error!("{:?} cannot back a render buffer", format);
      return;
    }
  };

  backend
    .state
    .bind_render_buffer(render_buffer.raw() as GLuint);
  gl::RenderbufferStorage(
    gl::RENDERBUFFER,
    internal,
    width as GLsizei,
    height as GLsizei,
  );
}

pub(crate) unsafe fn release_render_buffer(
  backend: &mut GlBackend,
  render_buffer: RenderBufferHandle,
) {
  let handle = render_buffer.raw() as GLuint;

  gl::DeleteRenderbuffers(1, &handle);
  backend.state.forget_render_buffer(handle);
}
