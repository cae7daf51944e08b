//! Framebuffers and render targets.
//!
//! A [`FrameBuffer`] starts empty; textures and render buffers are attached to it and the caller
//! checks [`FrameBuffer::is_complete`] before rendering into it. An incomplete framebuffer is
//! never replaced by a fallback target.

use crate::backend::handle::FramebufferHandle;
use crate::context::{ContextCore, ResourceError};
use crate::render_buffer::RenderBuffer;
use crate::texture::{CubeFace, Texture2D, Texture2DArray, TextureCube, TextureTarget};
use log::error;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::error;
use std::fmt;
use std::rc::Rc;

/// Attachment points.
///
/// `DepthStencil` is a combined point, distinct from separate `Depth` and `Stencil` attachments.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Attachment {
  /// Color attachment `n`.
  Color(u32),
  /// Depth.
  Depth,
  /// Stencil.
  Stencil,
  /// Combined depth and stencil.
  DepthStencil,
}

/// Filter used when a blit scales.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BlitFilter {
  /// Nearest texel.
  Nearest,
  /// Bilinear.
  Linear,
}

/// Reason a framebuffer is incomplete.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum IncompleteReason {
  /// Incomplete framebuffer.
  Undefined,
  /// Incomplete attachment (color / depth).
  IncompleteAttachment,
  /// An attachment was missing.
  MissingAttachment,
  /// Attachments have different sizes.
  IncompleteDimensions,
  /// Incomplete draw buffer.
  IncompleteDrawBuffer,
  /// Incomplete read buffer.
  IncompleteReadBuffer,
  /// Unsupported.
  Unsupported,
  /// Incomplete multisample configuration.
  IncompleteMultisample,
  /// Incomplete layer targets.
  IncompleteLayerTargets,
}

impl fmt::Display for IncompleteReason {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      IncompleteReason::Undefined => write!(f, "incomplete reason"),
      IncompleteReason::IncompleteAttachment => write!(f, "incomplete attachment"),
      IncompleteReason::MissingAttachment => write!(f, "missing attachment"),
      IncompleteReason::IncompleteDimensions => write!(f, "incomplete dimensions"),
      IncompleteReason::IncompleteDrawBuffer => write!(f, "incomplete draw buffer"),
      IncompleteReason::IncompleteReadBuffer => write!(f, "incomplete read buffer"),
      IncompleteReason::Unsupported => write!(f, "unsupported"),
      IncompleteReason::IncompleteMultisample => write!(f, "incomplete multisample"),
      IncompleteReason::IncompleteLayerTargets => write!(f, "incomplete layer targets"),
    }
  }
}

/// Framebuffer errors.
#[non_exhaustive]
#[derive(Debug, Eq, PartialEq)]
pub enum FramebufferError {
  /// The framebuffer is incomplete.
  Incomplete(IncompleteReason),
  /// Color attachment index past the number of draw buffers.
  TooManyColorAttachments {
    /// Requested color attachment.
    index: u32,
    /// Number of draw buffers.
    max: u32,
  },
  /// Nothing is attached there.
  NotAttached(Attachment),
}

impl fmt::Display for FramebufferError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      FramebufferError::Incomplete(ref e) => write!(f, "incomplete framebuffer: {}", e),

      FramebufferError::TooManyColorAttachments { index, max } => write!(
        f,
        "color attachment {} out of range ({} draw buffers)",
        index, max
      ),

      FramebufferError::NotAttached(attachment) => write!(f, "nothing attached at {:?}", attachment),
    }
  }
}

impl error::Error for FramebufferError {}

impl From<IncompleteReason> for FramebufferError {
  fn from(e: IncompleteReason) -> Self {
    FramebufferError::Incomplete(e)
  }
}

/// Something attached to a framebuffer. Attachments are kept alive by the framebuffer.
#[derive(Clone, Debug)]
pub enum AttachmentSource {
  /// Level of a 2D texture.
  Texture2D {
    /// Texture.
    texture: Rc<Texture2D>,
    /// Mip level.
    level: u32,
  },
  /// Level of one face of a cube map.
  TextureCube {
    /// Texture.
    texture: Rc<TextureCube>,
    /// Face.
    face: CubeFace,
    /// Mip level.
    level: u32,
  },
  /// Level of one layer of a texture array.
  TextureArrayLayer {
    /// Texture.
    texture: Rc<Texture2DArray>,
    /// Layer.
    layer: u32,
    /// Mip level.
    level: u32,
  },
  /// A render buffer.
  RenderBuffer(Rc<RenderBuffer>),
}

impl AttachmentSource {
  /// A 2D texture, level 0.
  pub fn texture(texture: &Rc<Texture2D>) -> Self {
    AttachmentSource::Texture2D {
      texture: texture.clone(),
      level: 0,
    }
  }

  /// A render buffer.
  pub fn render_buffer(render_buffer: &Rc<RenderBuffer>) -> Self {
    AttachmentSource::RenderBuffer(render_buffer.clone())
  }

  /// Size of the attached image.
  pub fn size(&self) -> [u32; 2] {
    let mip = |size: u32, level: u32| (size >> level).max(1);

    match *self {
      AttachmentSource::Texture2D { ref texture, level } => {
        [mip(texture.width(), level), mip(texture.height(), level)]
      }

      AttachmentSource::TextureCube {
        ref texture, level, ..
      } => [mip(texture.width(), level), mip(texture.height(), level)],

      AttachmentSource::TextureArrayLayer {
        ref texture, level, ..
      } => [mip(texture.width(), level), mip(texture.height(), level)],

      AttachmentSource::RenderBuffer(ref rb) => [rb.width(), rb.height()],
    }
  }
}

/// A framebuffer object.
#[derive(Debug)]
pub struct FrameBuffer {
  core: Rc<ContextCore>,
  handle: FramebufferHandle,
  attachments: RefCell<BTreeMap<Attachment, AttachmentSource>>,
}

impl FrameBuffer {
  pub(crate) fn new(core: Rc<ContextCore>) -> Result<Self, ResourceError> {
    let handle = core
      .backend()
      .create_framebuffer()
      .ok_or_else(|| ResourceError::creation_failed("framebuffer"))?;

    Ok(FrameBuffer {
      core,
      handle,
      attachments: RefCell::new(BTreeMap::new()),
    })
  }

  /// Backend handle.
  pub fn handle(&self) -> FramebufferHandle {
    self.handle
  }

  /// Attach an image, replacing whatever was attached at that point.
  pub fn attach(
    &self,
    attachment: Attachment,
    source: AttachmentSource,
  ) -> Result<(), FramebufferError> {
    if let Attachment::Color(index) = attachment {
      let max = self.core.limits().max_draw_buffers;

      if index >= max {
        error!(
          "framebuffer {:?}: color attachment {} exceeds {} draw buffers",
          self.handle, index, max
        );
        return Err(FramebufferError::TooManyColorAttachments { index, max });
      }
    }

    {
      let mut backend = self.core.backend();

      match source {
        AttachmentSource::Texture2D {
          ref texture,
          level,
        } => backend.framebuffer_attach_texture(
          self.handle,
          attachment,
          texture.handle(),
          texture.target(),
          level,
          None,
        ),

        AttachmentSource::TextureCube {
          ref texture,
          face,
          level,
        } => backend.framebuffer_attach_texture(
          self.handle,
          attachment,
          texture.handle(),
          TextureTarget::TextureCube,
          level,
          Some(face.index()),
        ),

        AttachmentSource::TextureArrayLayer {
          ref texture,
          layer,
          level,
        } => backend.framebuffer_attach_texture(
          self.handle,
          attachment,
          texture.handle(),
          TextureTarget::Texture2DArray,
          level,
          Some(layer),
        ),

        AttachmentSource::RenderBuffer(ref rb) => {
          backend.framebuffer_attach_render_buffer(self.handle, attachment, rb.handle())
        }
      }
    }

    self.attachments.borrow_mut().insert(attachment, source);

    Ok(())
  }

  /// Detach what is attached at `attachment`.
  pub fn detach(&self, attachment: Attachment) -> Result<(), FramebufferError> {
    let previous = self.attachments.borrow_mut().remove(&attachment);

    match previous {
      Some(_) => {
        self.core.backend().framebuffer_detach(self.handle, attachment);
        Ok(())
      }

      None => Err(FramebufferError::NotAttached(attachment)),
    }
  }

  /// What is attached at `attachment`.
  pub fn attachment(&self, attachment: Attachment) -> Option<AttachmentSource> {
    self.attachments.borrow().get(&attachment).cloned()
  }

  /// Every attachment point in use.
  pub fn attachment_points(&self) -> Vec<Attachment> {
    self.attachments.borrow().keys().copied().collect()
  }

  /// Size of the first attachment, if any.
  pub fn size(&self) -> Option<[u32; 2]> {
    self.attachments.borrow().values().next().map(AttachmentSource::size)
  }

  /// Completeness of the framebuffer as reported by the backend.
  pub fn status(&self) -> Result<(), IncompleteReason> {
    self.core.backend().framebuffer_status(self.handle)
  }

  /// Is the framebuffer complete?
  pub fn is_complete(&self) -> bool {
    self.status().is_ok()
  }
}

impl Drop for FrameBuffer {
  fn drop(&mut self) {
    self.core.forget_render_target(self.handle);
    self.core.backend().release_framebuffer(self.handle);
    let removed = self.core.registry().framebuffers.remove(self.handle);
    debug_assert!(removed, "framebuffer {:?} released twice", self.handle);
  }
}
