#![allow(dead_code)]

use lucent::backend::null::{CallLog, NullBackend};
use lucent::buffer::BufferUsage;
use lucent::component::ComponentType;
use lucent::input_assembler::{AttribLayout, AttribLayoutEntry, InputAssembler};
use lucent::RenderContext;
use std::rc::Rc;

pub const VS: &str = "
#version 330 core

in vec3 attr_pos;
in vec3 attr_norm;
in vec2 attr_uv;

uniform mat4 model_view_projection;

out vec2 uv;

void main() {
  uv = attr_uv;
  gl_Position = model_view_projection * vec4(attr_pos, 1.);
}
";

pub const FS: &str = "
#version 330 core

in vec2 uv;
out vec4 frag;

uniform vec4 color;

void main() {
  frag = color;
}
";

pub fn init_logger() {
  let _ = env_logger::builder().is_test(true).try_init();
}

pub fn context_with(backend: NullBackend) -> (RenderContext, CallLog) {
  init_logger();

  let log = backend.call_log();
  let ctx = RenderContext::new(Box::new(backend)).expect("render context");
  log.clear();

  (ctx, log)
}

pub fn context() -> (RenderContext, CallLog) {
  context_with(NullBackend::new())
}

/// Three vertices laid out for the inputs of `VS`.
pub fn triangle(ctx: &RenderContext) -> Rc<InputAssembler> {
  let layout = AttribLayout::new(vec![
    AttribLayoutEntry::new("attr_pos", ComponentType::Float32, 3, 0, 0),
    AttribLayoutEntry::new("attr_norm", ComponentType::Float32, 3, 12, 0),
    AttribLayoutEntry::new("attr_uv", ComponentType::Float32, 2, 24, 0),
  ]);
  let vb = ctx
    .create_vertex_buffer(BufferUsage::Static, &[0f32; 3 * 8], 32)
    .expect("vertex buffer");

  ctx
    .create_input_assembler(layout, &[vb], &[], None, 0)
    .expect("input assembler")
}
