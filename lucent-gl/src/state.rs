//! Graphics state.
//!
//! The render context above tracks pipeline state (blending, depth, viewport, …) itself and only
//! forwards changes. What it does not see are the object bindings the backend performs on its own
//! to create, fill and attach objects; those are cached here.

use crate::convert::{from_gl_blending_equation, from_gl_blending_factor, from_gl_comparison};
use gl::types::*;
use lucent::backend::{DriverState, StateQueryError};
use lucent::blending::{BlendEquationArgs, BlendFunctionArgs};
use lucent::render_state::Rect;
use std::collections::HashMap;
use std::marker::PhantomData;

/// Cached value.
///
/// A cached value is used to prevent issuing costly GPU commands if we know the target value is
/// already set to what the command tries to set. Some of the bindings get overridden as a side
/// effect of other commands; those are invalidated, which forces the next write.
#[derive(Debug)]
struct Cached<T>(Option<T>)
where
  T: PartialEq;

impl<T> Cached<T>
where
  T: PartialEq,
{
  fn new(initial: T) -> Self {
    Cached(Some(initial))
  }

  fn invalidate(&mut self) {
    self.0 = None;
  }

  fn set(&mut self, value: T) {
    self.0 = Some(value);
  }

  /// A non-cached value is always invalid; a cached one is invalid if it differs.
  fn is_invalid(&self, new_val: &T) -> bool {
    match &self.0 {
      Some(ref t) => t != new_val,
      _ => true,
    }
  }

  fn is(&self, value: &T) -> bool {
    !self.is_invalid(value)
  }
}

/// Whether a binding goes through the cache or is always written.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Bind {
  Forced,
  Cached,
}

/// Object bindings of the current context.
#[derive(Debug)]
pub(crate) struct GlState {
  _a: PhantomData<*const ()>, // !Send and !Sync

  // texture
  current_texture_unit: Cached<GLenum>,
  bound_textures: Vec<(GLenum, GLuint)>,

  // buffers
  bound_array_buffer: Cached<GLuint>,
  bound_element_array_buffer: Cached<GLuint>,
  bound_indexed_buffers: HashMap<(GLenum, u32), GLuint>,

  // render buffer
  bound_render_buffer: Cached<GLuint>,

  // framebuffers, written through but remembered for temporary rebinds
  bound_draw_framebuffer: GLuint,
  bound_read_framebuffer: GLuint,

  // vertex array
  bound_vertex_array: Cached<GLuint>,

  // shader program, written through
  current_program: GLuint,
}

impl GlState {
  /// Initial bindings, with room for `texture_units` units.
  pub(crate) fn new(texture_units: u32) -> Self {
    GlState {
      _a: PhantomData,
      current_texture_unit: Cached::new(0),
      bound_textures: vec![(gl::TEXTURE_2D, 0); texture_units as usize],
      bound_array_buffer: Cached::new(0),
      bound_element_array_buffer: Cached::new(0),
      bound_indexed_buffers: HashMap::new(),
      bound_render_buffer: Cached::new(0),
      bound_draw_framebuffer: 0,
      bound_read_framebuffer: 0,
      bound_vertex_array: Cached::new(0),
      current_program: 0,
    }
  }

  pub(crate) fn current_program(&self) -> GLuint {
    self.current_program
  }

  pub(crate) fn bound_draw_framebuffer(&self) -> GLuint {
    self.bound_draw_framebuffer
  }

  pub(crate) unsafe fn set_texture_unit(&mut self, unit: u32) {
    if self.current_texture_unit.is_invalid(&unit) {
      gl::ActiveTexture(gl::TEXTURE0 + unit);
      self.current_texture_unit.set(unit);
    }
  }

  pub(crate) unsafe fn bind_texture(&mut self, target: GLenum, handle: GLuint) {
    let unit = match self.current_texture_unit.0 {
      Some(unit) => unit as usize,
      None => {
        // unknown unit; write without touching the per-unit cache
        gl::BindTexture(target, handle);
        return;
      }
    };

    match self.bound_textures.get(unit).copied() {
      Some((t, h)) if t == target && h == handle => (),
      Some(_) => {
        gl::BindTexture(target, handle);
        self.bound_textures[unit] = (target, handle);
      }
      None => {
        gl::BindTexture(target, handle);
        self.bound_textures.resize(unit + 1, (gl::TEXTURE_2D, 0));
        self.bound_textures[unit] = (target, handle);
      }
    }
  }

  /// Forget a deleted texture; the driver unbinds it from every unit.
  pub(crate) fn forget_texture(&mut self, handle: GLuint) {
    for binding in &mut self.bound_textures {
      if binding.1 == handle {
        binding.1 = 0;
      }
    }
  }

  /// Bind a buffer to a non-indexed target.
  pub(crate) unsafe fn bind_buffer(&mut self, target: GLenum, handle: GLuint, bind: Bind) {
    match target {
      gl::ARRAY_BUFFER => {
        if bind == Bind::Forced || self.bound_array_buffer.is_invalid(&handle) {
          gl::BindBuffer(target, handle);
          self.bound_array_buffer.set(handle);
        }
      }

      gl::ELEMENT_ARRAY_BUFFER => {
        // the element array binding is vertex array state; never touch a bound assembler
        self.bind_vertex_array(0, Bind::Cached);

        if bind == Bind::Forced || self.bound_element_array_buffer.is_invalid(&handle) {
          gl::BindBuffer(target, handle);
          self.bound_element_array_buffer.set(handle);
        }
      }

      _ => gl::BindBuffer(target, handle),
    }
  }

  /// Bind a buffer to an indexed binding point of `target`.
  pub(crate) unsafe fn bind_buffer_base(&mut self, target: GLenum, index: u32, handle: GLuint) {
    let key = (target, index);

    if self.bound_indexed_buffers.get(&key) != Some(&handle) {
      gl::BindBufferBase(target, index, handle);
      self.bound_indexed_buffers.insert(key, handle);
    }
  }

  /// Forget a deleted buffer.
  pub(crate) fn forget_buffer(&mut self, handle: GLuint) {
    if self.bound_array_buffer.is(&handle) {
      self.bound_array_buffer.set(0);
    }

    if self.bound_element_array_buffer.is(&handle) {
      self.bound_element_array_buffer.invalidate();
    }

    self.bound_indexed_buffers.retain(|_, h| *h != handle);
  }

  pub(crate) unsafe fn bind_render_buffer(&mut self, handle: GLuint) {
    if self.bound_render_buffer.is_invalid(&handle) {
      gl::BindRenderbuffer(gl::RENDERBUFFER, handle);
      self.bound_render_buffer.set(handle);
    }
  }

  pub(crate) fn forget_render_buffer(&mut self, handle: GLuint) {
    if self.bound_render_buffer.is(&handle) {
      self.bound_render_buffer.set(0);
    }
  }

  pub(crate) unsafe fn bind_draw_framebuffer(&mut self, handle: GLuint) {
    gl::BindFramebuffer(gl::DRAW_FRAMEBUFFER, handle);
    self.bound_draw_framebuffer = handle;
  }

  pub(crate) unsafe fn bind_read_framebuffer(&mut self, handle: GLuint) {
    gl::BindFramebuffer(gl::READ_FRAMEBUFFER, handle);
    self.bound_read_framebuffer = handle;
  }

  /// Bind both targets at once; ES2 knows no separate read / draw framebuffers.
  pub(crate) unsafe fn bind_framebuffer(&mut self, handle: GLuint) {
    gl::BindFramebuffer(gl::FRAMEBUFFER, handle);
    self.bound_draw_framebuffer = handle;
    self.bound_read_framebuffer = handle;
  }

  /// Forget a deleted framebuffer; the driver falls back to the default one.
  pub(crate) fn forget_framebuffer(&mut self, handle: GLuint) {
    if self.bound_draw_framebuffer == handle {
      self.bound_draw_framebuffer = 0;
    }

    if self.bound_read_framebuffer == handle {
      self.bound_read_framebuffer = 0;
    }
  }

  pub(crate) unsafe fn bind_vertex_array(&mut self, handle: GLuint, bind: Bind) {
    if !gl::BindVertexArray::is_loaded() {
      return;
    }

    if bind == Bind::Forced || self.bound_vertex_array.is_invalid(&handle) {
      gl::BindVertexArray(handle);
      self.bound_vertex_array.set(handle);
      // the element array binding followed the vertex array
      self.bound_element_array_buffer.invalidate();
    }
  }

  pub(crate) fn forget_vertex_array(&mut self, handle: GLuint) {
    if self.bound_vertex_array.is(&handle) {
      self.bound_vertex_array.set(0);
    }
  }

  pub(crate) unsafe fn use_program(&mut self, handle: GLuint) {
    gl::UseProgram(handle);
    self.current_program = handle;
  }

  pub(crate) fn forget_program(&mut self, handle: GLuint) {
    if self.current_program == handle {
      self.current_program = 0;
    }
  }
}

/// Read back the pipeline state of the current context.
pub(crate) unsafe fn get_driver_state(es: bool) -> Result<DriverState, StateQueryError> {
  let depth_test_enabled = get_ctx_depth_test()?;
  let culling_enabled = get_ctx_face_culling_state()?;

  Ok(DriverState {
    clear_color: get_ctx_clear_color(),
    blend_function: get_ctx_blending_factors()?,
    blend_equation: get_ctx_blending_equations()?,
    culling_enabled,
    depth_function: get_ctx_depth_function()?,
    blending_enabled: get_ctx_blending_state()?,
    depth_write_enabled: get_ctx_boolean(gl::DEPTH_WRITEMASK),
    depth_test_enabled,
    stencil_test_enabled: gl::IsEnabled(gl::STENCIL_TEST) == gl::TRUE,
    scissor_test_enabled: gl::IsEnabled(gl::SCISSOR_TEST) == gl::TRUE,
    scissor_rect: get_ctx_rect(gl::SCISSOR_BOX),
    viewport: get_ctx_rect(gl::VIEWPORT),
    color_writes_enabled: get_ctx_color_writes(),
    // ES has no multisample toggle; it is always on
    multisample_enabled: es || gl::IsEnabled(gl::MULTISAMPLE) == gl::TRUE,
  })
}

unsafe fn get_ctx_rect(name: GLenum) -> Rect {
  let mut data = [0; 4];
  gl::GetIntegerv(name, data.as_mut_ptr());
  Rect::new(data[0], data[1], data[2], data[3])
}

unsafe fn get_ctx_clear_color() -> [f32; 4] {
  let mut color = [0.; 4];
  gl::GetFloatv(gl::COLOR_CLEAR_VALUE, color.as_mut_ptr());
  color
}

unsafe fn get_ctx_boolean(name: GLenum) -> bool {
  let mut value = gl::FALSE;
  gl::GetBooleanv(name, &mut value);
  value == gl::TRUE
}

unsafe fn get_ctx_color_writes() -> bool {
  let mut mask = [gl::FALSE; 4];
  gl::GetBooleanv(gl::COLOR_WRITEMASK, mask.as_mut_ptr());
  mask.iter().all(|&m| m == gl::TRUE)
}

unsafe fn get_ctx_blending_state() -> Result<bool, StateQueryError> {
  let state = gl::IsEnabled(gl::BLEND);

  match state {
    gl::TRUE => Ok(true),
    gl::FALSE => Ok(false),
    _ => Err(StateQueryError::UnknownBlendingState(state)),
  }
}

unsafe fn get_ctx_blending_equations() -> Result<BlendEquationArgs, StateQueryError> {
  let mut rgb = gl::FUNC_ADD as GLint;
  let mut alpha = gl::FUNC_ADD as GLint;

  gl::GetIntegerv(gl::BLEND_EQUATION_RGB, &mut rgb);
  gl::GetIntegerv(gl::BLEND_EQUATION_ALPHA, &mut alpha);

  let map = |data: GLint| {
    from_gl_blending_equation(data as GLenum)
      .ok_or(StateQueryError::UnknownBlendingEquation(data as u32))
  };

  Ok(BlendEquationArgs {
    rgb: map(rgb)?,
    alpha: map(alpha)?,
  })
}

unsafe fn get_ctx_blending_factors() -> Result<BlendFunctionArgs, StateQueryError> {
  let mut src_rgb = gl::ONE as GLint;
  let mut dst_rgb = gl::ZERO as GLint;
  let mut src_alpha = gl::ONE as GLint;
  let mut dst_alpha = gl::ZERO as GLint;

  gl::GetIntegerv(gl::BLEND_SRC_RGB, &mut src_rgb);
  gl::GetIntegerv(gl::BLEND_DST_RGB, &mut dst_rgb);
  gl::GetIntegerv(gl::BLEND_SRC_ALPHA, &mut src_alpha);
  gl::GetIntegerv(gl::BLEND_DST_ALPHA, &mut dst_alpha);

  let src = |k: GLint| {
    from_gl_blending_factor(k as GLenum).ok_or(StateQueryError::UnknownBlendingSrcFactor(k as u32))
  };
  let dst = |k: GLint| {
    from_gl_blending_factor(k as GLenum).ok_or(StateQueryError::UnknownBlendingDstFactor(k as u32))
  };

  Ok(BlendFunctionArgs {
    src_rgb: src(src_rgb)?,
    dst_rgb: dst(dst_rgb)?,
    src_alpha: src(src_alpha)?,
    dst_alpha: dst(dst_alpha)?,
  })
}

unsafe fn get_ctx_depth_test() -> Result<bool, StateQueryError> {
  let state = gl::IsEnabled(gl::DEPTH_TEST);

  match state {
    gl::TRUE => Ok(true),
    gl::FALSE => Ok(false),
    _ => Err(StateQueryError::UnknownDepthTestState(state)),
  }
}

unsafe fn get_ctx_depth_function() -> Result<lucent::depth_stencil::Comparison, StateQueryError> {
  let mut function = gl::LESS as GLint;
  gl::GetIntegerv(gl::DEPTH_FUNC, &mut function);

  from_gl_comparison(function as GLenum)
    .ok_or(StateQueryError::UnknownDepthFunction(function as u32))
}

unsafe fn get_ctx_face_culling_state() -> Result<bool, StateQueryError> {
  let state = gl::IsEnabled(gl::CULL_FACE);

  match state {
    gl::TRUE => Ok(true),
    gl::FALSE => Ok(false),
    _ => Err(StateQueryError::UnknownFaceCullingState(state)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cached_values() {
    let mut cached = Cached::new(3);
    assert!(!cached.is_invalid(&3));
    assert!(cached.is_invalid(&4));

    cached.invalidate();
    assert!(cached.is_invalid(&3));

    cached.set(4);
    assert!(cached.is(&4));
  }

  #[test]
  fn forgotten_objects_fall_back_to_zero() {
    let mut state = GlState::new(4);
    state.bound_textures[2] = (gl::TEXTURE_2D, 7);
    state.bound_draw_framebuffer = 3;
    state.current_program = 9;

    state.forget_texture(7);
    state.forget_framebuffer(3);
    state.forget_program(9);
    state.forget_program(1);

    assert_eq!(state.bound_textures[2], (gl::TEXTURE_2D, 0));
    assert_eq!(state.bound_draw_framebuffer(), 0);
    assert_eq!(state.current_program(), 0);
  }

  #[test]
  fn forgotten_buffers_leave_their_bindings() {
    let mut state = GlState::new(1);
    state.bound_array_buffer.set(5);
    state.bound_element_array_buffer.set(5);
    state.bound_indexed_buffers.insert((gl::UNIFORM_BUFFER, 0), 5);
    state.bound_indexed_buffers.insert((gl::UNIFORM_BUFFER, 1), 6);

    state.forget_buffer(5);

    assert!(state.bound_array_buffer.is(&0));
    assert!(state.bound_element_array_buffer.is_invalid(&0));
    assert_eq!(state.bound_indexed_buffers.len(), 1);
  }
}
