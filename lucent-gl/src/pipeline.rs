//! Pipeline state and draw commands.

use crate::backend::GlBackend;
use crate::convert::{
  blending_equation, blending_factor, clear_mask, comparison, component_type, draw_mode, face,
  memory_barrier, render_state, stencil_op,
};
use crate::state::Bind;
use gl::types::*;
use lucent::backend::handle::{BufferHandle, DepthStencilStateHandle, RasterizerStateHandle};
use lucent::blending::{BlendEquationArgs, BlendFunctionArgs};
use lucent::component::ComponentType;
use lucent::depth_stencil::{Comparison, Face, StencilFunctionArgs, StencilOperationArgs};
use lucent::input_assembler::DrawMode;
use lucent::render_state::{
  ClearFlags, CullMode, DepthStencilDesc, MemoryBarrierFlags, RasterizerDesc, Rect,
  RenderStateFlag,
};
use std::os::raw::c_void;

pub(crate) unsafe fn set_render_state(backend: &GlBackend, enabled: bool, state: RenderStateFlag) {
  match render_state(state) {
    // ES always multisamples when the surface has samples
    Some(gl::MULTISAMPLE) if backend.version.is_es() => (),
    Some(cap) if enabled => gl::Enable(cap),
    Some(cap) => gl::Disable(cap),
    None => gl::DepthMask(if enabled { gl::TRUE } else { gl::FALSE }),
  }
}

pub(crate) unsafe fn set_blend_function(args: BlendFunctionArgs) {
  gl::BlendFuncSeparate(
    blending_factor(args.src_rgb),
    blending_factor(args.dst_rgb),
    blending_factor(args.src_alpha),
    blending_factor(args.dst_alpha),
  );
}

pub(crate) unsafe fn set_blend_equation(args: BlendEquationArgs) {
  // advanced equations cannot be split between color and alpha
  if args.rgb.is_advanced() {
    gl::BlendEquation(blending_equation(args.rgb));
  } else {
    gl::BlendEquationSeparate(blending_equation(args.rgb), blending_equation(args.alpha));
  }
}

pub(crate) unsafe fn set_blend_barrier(backend: &GlBackend) {
  match backend.extensions.blend_barrier {
    Some(barrier) => barrier(),
    None => log::warn!("no blend barrier entry point"),
  }
}

pub(crate) unsafe fn set_depth_function(function: Comparison) {
  gl::DepthFunc(comparison(function));
}

pub(crate) unsafe fn set_viewport(viewport: Rect) {
  gl::Viewport(viewport.x, viewport.y, viewport.width, viewport.height);
}

pub(crate) unsafe fn set_scissor_rect(rect: Rect) {
  gl::Scissor(rect.x, rect.y, rect.width, rect.height);
}

pub(crate) unsafe fn set_clear_color(color: [f32; 4]) {
  gl::ClearColor(color[0], color[1], color[2], color[3]);
}

pub(crate) unsafe fn set_color_writes(enabled: bool) {
  let mask = if enabled { gl::TRUE } else { gl::FALSE };
  gl::ColorMask(mask, mask, mask, mask);
}

pub(crate) unsafe fn set_stencil_function(side: Face, args: StencilFunctionArgs) {
  gl::StencilFuncSeparate(
    face(side),
    comparison(args.function),
    args.reference as GLint,
    args.mask,
  );
}

pub(crate) unsafe fn set_stencil_operation(side: Face, args: StencilOperationArgs) {
  gl::StencilOpSeparate(
    face(side),
    stencil_op(args.stencil_fail),
    stencil_op(args.depth_fail),
    stencil_op(args.depth_pass),
  );
}

// state objects; OpenGL has none, so they are descriptions applied in one go

pub(crate) fn create_depth_stencil_state(
  backend: &mut GlBackend,
  desc: &DepthStencilDesc,
) -> Option<DepthStencilStateHandle> {
  let handle = DepthStencilStateHandle::from_raw(backend.ids.allocate())?;
  backend.depth_stencil_states.insert(handle, *desc);
  Some(handle)
}

pub(crate) unsafe fn set_depth_stencil_state(backend: &GlBackend, state: DepthStencilStateHandle) {
  let desc = match backend.depth_stencil_states.get(&state) {
    Some(desc) => *desc,
    None => return,
  };

  set_render_state(backend, desc.depth_test, RenderStateFlag::DepthTest);
  set_render_state(backend, desc.depth_write, RenderStateFlag::DepthWrite);
  set_depth_function(desc.depth_function);
  set_render_state(backend, desc.stencil_test, RenderStateFlag::StencilTest);

  if desc.stencil_test {
    set_stencil_function(Face::Front, desc.stencil_function_front);
    set_stencil_function(Face::Back, desc.stencil_function_back);
    set_stencil_operation(Face::Front, desc.stencil_operation_front);
    set_stencil_operation(Face::Back, desc.stencil_operation_back);
  }
}

pub(crate) fn release_depth_stencil_state(backend: &mut GlBackend, state: DepthStencilStateHandle) {
  backend.depth_stencil_states.remove(&state);
}

pub(crate) fn create_rasterizer_state(
  backend: &mut GlBackend,
  desc: &RasterizerDesc,
) -> Option<RasterizerStateHandle> {
  let handle = RasterizerStateHandle::from_raw(backend.ids.allocate())?;
  backend.rasterizer_states.insert(handle, *desc);
  Some(handle)
}

pub(crate) unsafe fn set_rasterizer_state(backend: &GlBackend, state: RasterizerStateHandle) {
  let desc = match backend.rasterizer_states.get(&state) {
    Some(desc) => *desc,
    None => return,
  };

  match desc.cull_mode {
    CullMode::None => gl::Disable(gl::CULL_FACE),
    mode => {
      gl::Enable(gl::CULL_FACE);
      gl::CullFace(match mode {
        CullMode::Front => gl::FRONT,
        CullMode::Back => gl::BACK,
        _ => gl::FRONT_AND_BACK,
      });
    }
  }

  if desc.depth_bias != 0. || desc.depth_scale != 0. {
    gl::Enable(gl::POLYGON_OFFSET_FILL);
    gl::PolygonOffset(desc.depth_scale, desc.depth_bias);
  } else {
    gl::Disable(gl::POLYGON_OFFSET_FILL);
  }
}

pub(crate) fn release_rasterizer_state(backend: &mut GlBackend, state: RasterizerStateHandle) {
  backend.rasterizer_states.remove(&state);
}

// draw

pub(crate) unsafe fn clear(flags: ClearFlags) {
  gl::Clear(clear_mask(flags));
}

pub(crate) unsafe fn set_memory_barrier(barriers: MemoryBarrierFlags) {
  if gl::MemoryBarrier::is_loaded() {
    gl::MemoryBarrier(memory_barrier(barriers));
  }
}

pub(crate) unsafe fn draw(mode: DrawMode, count: u32, offset: u32) {
  gl::DrawArrays(draw_mode(mode), offset as GLint, count as GLsizei);
}

pub(crate) unsafe fn draw_indexed(mode: DrawMode, count: u32, index_type: ComponentType, offset: u32) {
  let gl_type = match component_type(index_type) {
    Some(t) => t,
    None => return,
  };

  gl::DrawElements(
    draw_mode(mode),
    count as GLsizei,
    gl_type,
    (offset as usize * index_type.size_of()) as *const c_void,
  );
}

pub(crate) unsafe fn draw_indirect(
  backend: &mut GlBackend,
  mode: DrawMode,
  indirect: BufferHandle,
  offset: usize,
) {
  backend
    .state
    .bind_buffer(gl::DRAW_INDIRECT_BUFFER, indirect.raw() as GLuint, Bind::Forced);
  gl::DrawArraysIndirect(draw_mode(mode), offset as *const c_void);
}

pub(crate) unsafe fn draw_indexed_indirect(
  backend: &mut GlBackend,
  mode: DrawMode,
  index_type: ComponentType,
  indirect: BufferHandle,
  offset: usize,
) {
  let gl_type = match component_type(index_type) {
    Some(t) => t,
    None => return,
  };

  backend
    .state
    .bind_buffer(gl::DRAW_INDIRECT_BUFFER, indirect.raw() as GLuint, Bind::Forced);
  gl::DrawElementsIndirect(draw_mode(mode), gl_type, offset as *const c_void);
}

pub(crate) unsafe fn dispatch_compute(x: u32, y: u32, z: u32) {
  gl::DispatchCompute(x, y, z);
}
