mod common;

use common::{context, context_with, FS, VS};
use lucent::backend::null::{CallLog, NullBackend};
use lucent::buffer::{BufferUsage, IndexBuffer, VertexBuffer};
use lucent::capabilities::Limits;
use lucent::component::ComponentType;
use lucent::context::DrawError;
use lucent::input_assembler::{AttribLayout, AttribLayoutEntry, DrawMode, InputAssembler};
use lucent::linear::IDENTITY44;
use lucent::pixel::TextureFormat;
use lucent::shader::constant::ConstantValue;
use lucent::shader::program::ShaderSources;
use lucent::texture::Texture2D;
use lucent::RenderContext;
use std::rc::Rc;

const FLOATS_PER_VERTEX: usize = 8;

fn cube_indices() -> Vec<u16> {
  (0..6u16)
    .flat_map(|face| {
      let b = face * 4;
      [b, b + 1, b + 2, b, b + 2, b + 3]
    })
    .collect()
}

fn cube_layout() -> AttribLayout {
  AttribLayout::new(vec![
    AttribLayoutEntry::new("attr_pos", ComponentType::Float32, 3, 0, 0),
    AttribLayoutEntry::new("attr_norm", ComponentType::Float32, 3, 12, 0),
    AttribLayoutEntry::new("attr_uv", ComponentType::Float32, 2, 24, 0),
  ])
}

struct Cube {
  vb: Rc<VertexBuffer>,
  ib: Rc<IndexBuffer>,
  ia: Rc<InputAssembler>,
}

fn cube(ctx: &RenderContext, layout: AttribLayout) -> Cube {
  let vertices = [0f32; 24 * FLOATS_PER_VERTEX];
  let vb = ctx
    .create_vertex_buffer(
      BufferUsage::Static,
      &vertices,
      (FLOATS_PER_VERTEX * 4) as u32,
    )
    .unwrap();
  let ib = ctx
    .create_index_buffer(BufferUsage::Static, ComponentType::UInt16, &cube_indices())
    .unwrap();
  let ia = ctx
    .create_input_assembler(layout, &[vb.clone()], &[], Some(&ib), 0)
    .unwrap();

  Cube { vb, ib, ia }
}

fn units_bound(log: &CallLog) -> Vec<u32> {
  log
    .calls()
    .iter()
    .filter(|c| c.name == "bind_texture")
    .filter_map(|c| c.args.rsplit(", ").next())
    .filter_map(|unit| unit.trim_end_matches(')').parse().ok())
    .collect()
}

#[test]
fn indexed_cube() {
  let (ctx, log) = context();
  let cube = cube(&ctx, cube_layout());

  assert_eq!(cube.vb.vertex_count(), 24);
  assert_eq!(cube.ib.index_count(), 36);

  let program = ctx
    .compile_source("cube", &ShaderSources::new(VS, FS))
    .unwrap();
  ctx.set_active_shader(Some(&program));
  ctx.set_input_assembler(Some(&cube.ia));
  program
    .set_constant(
      "model_view_projection",
      ConstantValue::Matrix4 {
        data: &[IDENTITY44],
        transpose: false,
      },
    )
    .unwrap();
  log.clear();

  ctx.draw(DrawMode::Triangles, 36, 0).unwrap();

  assert_eq!(
    log.names(),
    vec!["set_input_assembler", "draw_indexed", "set_input_assembler"]
  );
  assert_eq!(
    log.last("draw_indexed").unwrap().args,
    format!(
      "{:?}",
      (DrawMode::Triangles, 36u32, ComponentType::UInt16, 0u32)
    )
  );
}

#[test]
fn array_draw_without_index_buffer() {
  let (ctx, log) = context();
  let vb = ctx
    .create_vertex_buffer(BufferUsage::Static, &[0f32; 3 * FLOATS_PER_VERTEX], 32)
    .unwrap();
  let ia = ctx
    .create_input_assembler(cube_layout(), &[vb], &[], None, 0)
    .unwrap();
  let program = ctx
    .compile_source("triangle", &ShaderSources::new(VS, FS))
    .unwrap();

  ctx.set_active_shader(Some(&program));
  ctx.set_input_assembler(Some(&ia));
  ctx.draw(DrawMode::Triangles, 3, 0).unwrap();

  assert_eq!(log.count("draw"), 1);
  assert_eq!(log.count("draw_indexed"), 0);
}

#[test]
fn draw_preconditions() {
  let (ctx, log) = context();
  let cube = cube(&ctx, cube_layout());
  let program = ctx
    .compile_source("cube", &ShaderSources::new(VS, FS))
    .unwrap();

  ctx.set_active_shader(Some(&program));
  assert_eq!(
    ctx.draw(DrawMode::Triangles, 36, 0),
    Err(DrawError::NoInputAssembler)
  );

  ctx.set_active_shader(None);
  ctx.set_input_assembler(Some(&cube.ia));
  assert_eq!(
    ctx.draw(DrawMode::Triangles, 36, 0),
    Err(DrawError::NoShader)
  );

  assert_eq!(log.count("draw_indexed"), 0);
  assert_eq!(log.count("set_input_assembler"), 0);
}

#[test]
fn attribute_mismatch_never_reaches_the_backend() {
  let (ctx, log) = context();
  let layout = AttribLayout::new(vec![
    AttribLayoutEntry::new("attr_pos", ComponentType::Float32, 3, 0, 0),
    AttribLayoutEntry::new("attr_norm", ComponentType::Float32, 3, 12, 0),
  ]);
  let cube = cube(&ctx, layout);
  let program = ctx
    .compile_source("cube", &ShaderSources::new(VS, FS))
    .unwrap();

  ctx.set_active_shader(Some(&program));
  ctx.set_input_assembler(Some(&cube.ia));

  assert_eq!(
    ctx.draw(DrawMode::Triangles, 36, 0),
    Err(DrawError::MissingAttribute("attr_uv".to_owned()))
  );
  assert_eq!(log.count("draw_indexed"), 0);
  assert_eq!(log.count("set_input_assembler"), 0);
}

#[test]
fn texture_units_wrap_around() {
  let backend = NullBackend::new().with_limits(Limits {
    max_texture_units: 4,
    ..Limits::default()
  });
  let (ctx, log) = context_with(backend);

  let fs = "
    uniform sampler2D textures[6];
    out vec4 frag;
    void main() { frag = texture(textures[5], vec2(0.)); }
  ";
  let program = ctx
    .compile_source("many textures", &ShaderSources::new(VS, fs))
    .unwrap();

  let textures: Vec<Rc<Texture2D>> = (0..6)
    .map(|_| {
      let texture = ctx.create_texture_2d().unwrap();
      texture
        .set_texture_data(None, 0, 4, 4, TextureFormat::RGBA8)
        .unwrap();
      texture
    })
    .collect();
  let refs: Vec<&Texture2D> = textures.iter().map(|t| &**t).collect();

  log.clear();
  program
    .set_constant("textures", ConstantValue::Texture2DHandles(&refs))
    .unwrap();

  let units = units_bound(&log);
  assert_eq!(units, vec![1, 2, 3, 1, 2, 3]);
  assert!(units.iter().all(|&u| u < 4));
}

#[test]
fn texture_units_restart_after_a_draw() {
  let (ctx, log) = context();
  let cube = cube(&ctx, cube_layout());

  let fs = "
    uniform sampler2D diffuse;
    out vec4 frag;
    void main() { frag = texture(diffuse, vec2(0.)); }
  ";
  let program = ctx
    .compile_source("textured", &ShaderSources::new(VS, fs))
    .unwrap();
  let texture = ctx.create_texture_2d().unwrap();
  texture
    .set_texture_data(Some(&[255; 4 * 4 * 4]), 0, 4, 4, TextureFormat::RGBA8)
    .unwrap();

  ctx.set_active_shader(Some(&program));
  ctx.set_input_assembler(Some(&cube.ia));
  log.clear();

  for _ in 0..2 {
    program
      .set_constant("diffuse", ConstantValue::Texture2D(&texture))
      .unwrap();
    ctx.draw(DrawMode::Triangles, 36, 0).unwrap();
  }

  assert_eq!(units_bound(&log), vec![1, 1]);
  // same unit twice, uploaded once
  assert_eq!(log.count("set_constant_value"), 1);
  assert_eq!(texture.texture_unit(), Some(1));
}

#[test]
fn indirect_draw() {
  let (ctx, log) = context();
  let cube = cube(&ctx, cube_layout());
  let program = ctx
    .compile_source("cube", &ShaderSources::new(VS, FS))
    .unwrap();
  let args = ctx
    .create_draw_indirect_buffer(BufferUsage::Static, &[0; 20])
    .unwrap();

  ctx.set_active_shader(Some(&program));
  ctx.set_input_assembler(Some(&cube.ia));
  ctx
    .draw_indirect(DrawMode::Triangles, &args, 0)
    .unwrap();

  assert_eq!(log.count("draw_indexed_indirect"), 1);
  assert_eq!(log.count("draw_indirect"), 0);
}

#[test]
fn compute_dispatch() {
  let (ctx, log) = context();
  let cs = "
    #version 430
    layout (local_size_x = 64) in;
    layout (std430, binding = 3) buffer Particles { vec4 positions[64]; };
    void main() {}
  ";
  let program = ctx.compile_compute_source("particles", cs).unwrap();
  let particles = ctx
    .create_storage_buffer("Particles", BufferUsage::Dynamic, &[0; 64 * 16])
    .unwrap();

  log.clear();
  ctx.dispatch_compute(&program, 1, 1, 1).unwrap();

  assert_eq!(
    log.names(),
    vec![
      "set_active_program",
      "program_set_storage_buffer",
      "dispatch_compute"
    ]
  );
  assert_eq!(
    log.last("program_set_storage_buffer").unwrap().args,
    format!("{:?}", (3u32, particles.handle()))
  );

  let graphics = ctx
    .compile_source("cube", &ShaderSources::new(VS, FS))
    .unwrap();
  assert_eq!(
    ctx.dispatch_compute(&graphics, 1, 1, 1),
    Err(DrawError::NotCompute("cube".to_owned()))
  );
}
