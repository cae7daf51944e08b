//! Framebuffer objects, blits and read-back.

use crate::backend::GlBackend;
use crate::convert::{self, blit_filter, clear_mask, cube_face, texture_format};
use gl::types::*;
use lucent::backend::handle::{FramebufferHandle, RenderBufferHandle, TextureHandle};
use lucent::framebuffer::{Attachment, BlitFilter, IncompleteReason};
use lucent::pixel::TextureFormat;
use lucent::render_state::{ClearFlags, Rect};
use lucent::texture::{CubeFace, TextureTarget};
use std::os::raw::c_void;

pub(crate) unsafe fn create() -> Option<FramebufferHandle> {
  let mut handle: GLuint = 0;
  gl::GenFramebuffers(1, &mut handle);

  FramebufferHandle::from_raw(handle.into())
}

/// A framebuffer bound for editing; [`Editing::done`] rebinds the render target.
struct Editing {
  target: GLenum,
  previous: GLuint,
}

impl Editing {
  unsafe fn start(backend: &mut GlBackend, framebuffer: GLuint) -> Self {
    let previous = backend.state.bound_draw_framebuffer();

    let target = if backend.is_legacy() {
      backend.state.bind_framebuffer(framebuffer);
      gl::FRAMEBUFFER
    } else {
      backend.state.bind_draw_framebuffer(framebuffer);
      gl::DRAW_FRAMEBUFFER
    };

    Editing { target, previous }
  }

  unsafe fn done(self, backend: &mut GlBackend) {
    if backend.is_legacy() {
      backend.state.bind_framebuffer(self.previous);
    } else {
      backend.state.bind_draw_framebuffer(self.previous);
    }
  }
}

// Record a color attachment change and return the draw buffers to route fragment outputs to.
fn track_attachment(
  backend: &mut GlBackend,
  framebuffer: GLuint,
  attachment: Attachment,
  attached: bool,
) -> Option<Vec<GLenum>> {
  let index = match attachment {
    Attachment::Color(index) => index,
    _ => return None,
  };

  let indices = backend.color_attachments.entry(framebuffer).or_default();
  indices.retain(|&i| i != index);

  if attached {
    indices.push(index);
    indices.sort_unstable();
  }

  let buffers = indices.iter().map(|&i| gl::COLOR_ATTACHMENT0 + i).collect();
  Some(buffers)
}

unsafe fn set_draw_buffers(backend: &GlBackend, buffers: Option<Vec<GLenum>>) {
  // ES2 draws to color attachment 0 only
  if backend.is_legacy() {
    return;
  }

  match buffers {
    Some(buffers) if buffers.is_empty() => gl::DrawBuffers(1, &gl::NONE),
    Some(buffers) => gl::DrawBuffers(buffers.len() as GLsizei, buffers.as_ptr()),
    None => (),
  }
}

#[allow(clippy::too_many_arguments)]
pub(crate) unsafe fn attach_texture(
  backend: &mut GlBackend,
  framebuffer: FramebufferHandle,
  attachment: Attachment,
  texture: TextureHandle,
  target: TextureTarget,
  level: u32,
  layer: Option<u32>,
) {
  let fb = framebuffer.raw() as GLuint;
  let tex = texture.raw() as GLuint;
  let gl_attachment = convert::attachment(attachment);
  let draw_buffers = track_attachment(backend, fb, attachment, true);

  let editing = Editing::start(backend, fb);

  match target {
    TextureTarget::Texture2D => gl::FramebufferTexture2D(
      editing.target,
      gl_attachment,
      gl::TEXTURE_2D,
      tex,
      level as GLint,
    ),

    TextureTarget::Texture2DMultisample => gl::FramebufferTexture2D(
      editing.target,
      gl_attachment,
      gl::TEXTURE_2D_MULTISAMPLE,
      tex,
      0,
    ),

    TextureTarget::TextureCube => {
      let face = CubeFace::ALL
        .get(layer.unwrap_or(0) as usize)
        .copied()
        .unwrap_or(CubeFace::PositiveX);

      gl::FramebufferTexture2D(
        editing.target,
        gl_attachment,
        cube_face(face),
        tex,
        level as GLint,
      )
    }

    TextureTarget::Texture2DArray => gl::FramebufferTextureLayer(
      editing.target,
      gl_attachment,
      tex,
      level as GLint,
      layer.unwrap_or(0) as GLint,
    ),
  }

  set_draw_buffers(backend, draw_buffers);
  editing.done(backend);
}

pub(crate) unsafe fn attach_render_buffer(
  backend: &mut GlBackend,
  framebuffer: FramebufferHandle,
  attachment: Attachment,
  render_buffer: RenderBufferHandle,
) {
  let fb = framebuffer.raw() as GLuint;
  let draw_buffers = track_attachment(backend, fb, attachment, true);

  let editing = Editing::start(backend, fb);
  gl::FramebufferRenderbuffer(
    editing.target,
    convert::attachment(attachment),
    gl::RENDERBUFFER,
    render_buffer.raw() as GLuint,
  );
  set_draw_buffers(backend, draw_buffers);
  editing.done(backend);
}

pub(crate) unsafe fn detach(
  backend: &mut GlBackend,
  framebuffer: FramebufferHandle,
  attachment: Attachment,
) {
  let fb = framebuffer.raw() as GLuint;
  let draw_buffers = track_attachment(backend, fb, attachment, false);

  // attaching object 0 detaches whatever is there, whatever its kind
  let editing = Editing::start(backend, fb);
  gl::FramebufferRenderbuffer(
    editing.target,
    convert::attachment(attachment),
    gl::RENDERBUFFER,
    0,
  );
  set_draw_buffers(backend, draw_buffers);
  editing.done(backend);
}

pub(crate) unsafe fn status(
  backend: &mut GlBackend,
  framebuffer: FramebufferHandle,
) -> Result<(), IncompleteReason> {
  let editing = Editing::start(backend, framebuffer.raw() as GLuint);
  let status = gl::CheckFramebufferStatus(editing.target);
  editing.done(backend);

  convert::framebuffer_status(status)
}

pub(crate) unsafe fn set_render_target(backend: &mut GlBackend, framebuffer: Option<FramebufferHandle>) {
  let handle = framebuffer.map_or(0, |fb| fb.raw() as GLuint);

  if backend.is_legacy() {
    backend.state.bind_framebuffer(handle);
  } else {
    backend.state.bind_draw_framebuffer(handle);
  }
}

pub(crate) unsafe fn set_read_target(backend: &mut GlBackend, framebuffer: Option<FramebufferHandle>) {
  let handle = framebuffer.map_or(0, |fb| fb.raw() as GLuint);

  if backend.is_legacy() {
    backend.state.bind_framebuffer(handle);
  } else {
    backend.state.bind_read_framebuffer(handle);
  }
}

pub(crate) unsafe fn blit(
  backend: &mut GlBackend,
  src: Rect,
  dst: Rect,
  flags: ClearFlags,
  filter: BlitFilter,
) {
  if !gl::BlitFramebuffer::is_loaded() {
    log::warn!("framebuffer blits are not available on {}", backend.version);
    return;
  }

  gl::BlitFramebuffer(
    src.x,
    src.y,
    src.x + src.width,
    src.y + src.height,
    dst.x,
    dst.y,
    dst.x + dst.width,
    dst.y + dst.height,
    clear_mask(flags - ClearFlags::COVERAGE),
    blit_filter(filter),
  );
}

pub(crate) unsafe fn read_pixels(
  backend: &mut GlBackend,
  rect: Rect,
  format: TextureFormat,
  out: &mut [u8],
) -> bool {
  if format.is_compressed() {
    return false;
  }

  let gl_format = match texture_format(format, backend.is_legacy()) {
    Some(f) => f,
    None => return false,
  };

  let needed = format.byte_size() * rect.width.max(0) as usize * rect.height.max(0) as usize;
  if out.len() < needed {
    log::error!(
      "read-back needs {} bytes, the output holds {}",
      needed,
      out.len()
    );
    return false;
  }

  gl::ReadPixels(
    rect.x,
    rect.y,
    rect.width,
    rect.height,
    gl_format.format,
    gl_format.ty,
    out.as_mut_ptr() as *mut c_void,
  );

  true
}

pub(crate) unsafe fn release(backend: &mut GlBackend, framebuffer: FramebufferHandle) {
  let handle = framebuffer.raw() as GLuint;

  gl::DeleteFramebuffers(1, &handle);
  backend.state.forget_framebuffer(handle);
  backend.color_attachments.remove(&handle);
}
