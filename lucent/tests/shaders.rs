mod common;

use common::{context, context_with, triangle, FS, VS};
use lucent::backend::null::NullBackend;
use lucent::buffer::BufferUsage;
use lucent::capabilities::Capabilities;
use lucent::input_assembler::DrawMode;
use lucent::shader::constant::{ConstantError, ConstantValue};
use lucent::shader::program::{ProgramType, ShaderSources};
use lucent::shader::{ShaderDataType, ShaderError, ShaderStage, ShaderStageFlags};
use std::rc::Rc;

const LIT_FS: &str = "
#version 330 core

layout (std140) uniform Lights {
  vec4 ambient;
  vec4 directions[2];
};

out vec4 frag;

void main() {
  frag = ambient;
}
";

#[test]
fn introspection() {
  let (ctx, _log) = context();
  let program = ctx
    .compile_source("basic", &ShaderSources::new(VS, FS))
    .unwrap();

  assert_eq!(program.program_type(), ProgramType::Graphics);
  assert!(!program.is_separable());

  let attributes: Vec<_> = program
    .attributes()
    .iter()
    .map(|a| (a.name.as_str(), a.location, a.ty))
    .collect();
  assert_eq!(
    attributes,
    vec![
      ("attr_pos", 0, ShaderDataType::FloatVec3),
      ("attr_norm", 1, ShaderDataType::FloatVec3),
      ("attr_uv", 2, ShaderDataType::FloatVec2),
    ]
  );

  let mvp = program.constant("model_view_projection").unwrap();
  assert_eq!(mvp.ty(), ShaderDataType::Matrix4);
  assert_eq!(mvp.element_count(), 1);
  assert_eq!(
    program.constant("color").map(|c| c.ty()),
    Some(ShaderDataType::FloatVec4)
  );
  assert!(program.constant("uv").is_none());
}

#[test]
fn compilation_failure_leaves_no_program() {
  let (ctx, log) = context();
  let broken = "
    out vec4 frag;
    #error not finished
    void main() {}
  ";

  let err = ctx
    .compile_source("broken", &ShaderSources::new(VS, broken))
    .unwrap_err();

  match err {
    ShaderError::StageCompilationFailed { name, stage, log } => {
      assert_eq!(name, "broken");
      assert_eq!(stage, ShaderStage::Fragment);
      assert!(log.contains("#error not finished"), "{}", log);
    }
    e => panic!("unexpected error: {}", e),
  }

  assert_eq!(log.count("create_program"), 0);
  assert_eq!(
    log.count("create_shader_stage"),
    log.count("release_shader_stage")
  );
  assert!(ctx.get_shader_program("broken").is_none());
}

#[test]
fn link_failure_leaves_no_program() {
  let (ctx, log) = context();
  // compiles, but has nothing to link against
  let no_entry = "
    out vec4 frag;
    void shade() { frag = vec4(1.); }
  ";

  let err = ctx
    .compile_source("unlinked", &ShaderSources::new(VS, no_entry))
    .unwrap_err();

  match err {
    ShaderError::LinkFailed { name, log } => {
      assert_eq!(name, "unlinked");
      assert_eq!(log, "error: fragment shader lacks `main'");
    }
    e => panic!("unexpected error: {}", e),
  }

  assert_eq!(log.count("create_program"), 1);
  assert_eq!(log.count("link_program"), 1);
  assert_eq!(log.count("release_program"), 1);
  assert_eq!(log.count("create_shader_stage"), 2);
  assert_eq!(log.count("detach_shader_stage"), 2);
  assert_eq!(log.count("release_shader_stage"), 2);
  assert!(ctx.get_shader_program("unlinked").is_none());

  // the name was never taken
  ctx
    .compile_source("unlinked", &ShaderSources::new(VS, FS))
    .unwrap();
}

#[test]
fn missing_stages() {
  let (ctx, log) = context();

  assert_eq!(
    ctx
      .compile_source("no fragment", &ShaderSources::new(VS, "  "))
      .unwrap_err(),
    ShaderError::MissingStage {
      name: "no fragment".to_owned(),
      stage: ShaderStage::Fragment,
    }
  );
  assert_eq!(
    ctx
      .compile_source("no vertex", &ShaderSources::new("", FS))
      .unwrap_err(),
    ShaderError::MissingStage {
      name: "no vertex".to_owned(),
      stage: ShaderStage::Vertex,
    }
  );
  assert!(log.calls().is_empty());
}

#[test]
fn unsupported_stages() {
  let caps = Capabilities::all() - Capabilities::GEOMETRY_STAGE - Capabilities::COMPUTE;
  let (ctx, _log) = context_with(NullBackend::new().with_capabilities(caps));

  let sources = ShaderSources {
    geometry: "void main() {}",
    ..ShaderSources::new(VS, FS)
  };
  assert_eq!(
    ctx.compile_source("geometry", &sources).unwrap_err(),
    ShaderError::UnsupportedStage(ShaderStage::Geometry)
  );
  assert_eq!(
    ctx
      .compile_compute_source("compute", "void main() {}")
      .unwrap_err(),
    ShaderError::UnsupportedStage(ShaderStage::Compute)
  );
}

#[test]
fn programs_are_cached_by_name() {
  let (ctx, log) = context();

  let first = ctx
    .compile_source("basic", &ShaderSources::new(VS, FS))
    .unwrap();
  // sources are ignored on a cache hit
  let second = ctx
    .compile_source("basic", &ShaderSources::new("", ""))
    .unwrap();

  assert!(Rc::ptr_eq(&first, &second));
  assert_eq!(log.count("create_program"), 1);
  assert_eq!(
    ctx.get_shader_program_by_handle(first.handle()).map(|p| p.handle()),
    Some(first.handle())
  );

  drop((first, second));
  assert!(ctx.get_shader_program("basic").is_none());
  assert_eq!(log.count("release_program"), 1);

  ctx
    .compile_source("basic", &ShaderSources::new(VS, FS))
    .unwrap();
  assert_eq!(log.count("create_program"), 2);
}

#[test]
fn dropping_the_active_shader_deactivates_it() {
  let (ctx, log) = context();
  let program = ctx
    .compile_source("basic", &ShaderSources::new(VS, FS))
    .unwrap();

  ctx.set_active_shader(Some(&program));
  log.clear();
  drop(program);

  assert!(ctx.active_shader().is_none());
  assert_eq!(log.names(), vec!["set_active_program", "release_program"]);
}

#[test]
fn constant_uploads_skip_unchanged_values() {
  let (ctx, log) = context();
  let program = ctx
    .compile_source("basic", &ShaderSources::new(VS, FS))
    .unwrap();

  let red = [1., 0., 0., 1.];
  program
    .set_constant("color", ConstantValue::Float(&red))
    .unwrap();
  program
    .set_constant("color", ConstantValue::Float(&red))
    .unwrap();
  assert_eq!(log.count("set_constant_value"), 1);
  // the program was made current once
  assert_eq!(log.count("set_active_program"), 1);

  program
    .set_constant("color", ConstantValue::Float(&[0., 1., 0., 1.]))
    .unwrap();
  assert_eq!(log.count("set_constant_value"), 2);
}

#[test]
fn constant_errors() {
  let (ctx, log) = context();
  let program = ctx
    .compile_source("basic", &ShaderSources::new(VS, FS))
    .unwrap();

  assert_eq!(
    program.set_constant("missing", ConstantValue::Int(&[1])),
    Err(ConstantError::NotFound("missing".to_owned()))
  );
  assert!(matches!(
    program.set_constant("color", ConstantValue::Int(&[1, 2, 3, 4])),
    Err(ConstantError::TypeMismatch {
      ty: ShaderDataType::FloatVec4,
      ..
    })
  ));
  assert!(matches!(
    program.set_constant("color", ConstantValue::Float(&[1., 2.])),
    Err(ConstantError::SizeMismatch { found: 2, .. })
  ));

  assert_eq!(log.count("set_constant_value"), 0);
}

#[test]
fn constant_blocks_are_fed_by_named_buffers() {
  let (ctx, log) = context();
  let ia = triangle(&ctx);
  let program = ctx
    .compile_source("lit", &ShaderSources::new(VS, LIT_FS))
    .unwrap();
  // smaller than the block, grown on first use
  let lights = ctx
    .create_constant_buffer("Lights", BufferUsage::Dynamic, &[0; 16])
    .unwrap();

  ctx.set_active_shader(Some(&program));
  ctx.set_input_assembler(Some(&ia));
  log.clear();

  ctx.draw(DrawMode::Triangles, 3, 0).unwrap();

  assert_eq!(lights.size(), 48);
  let params: Vec<_> = lights
    .params()
    .into_iter()
    .map(|p| (p.name, p.offset))
    .collect();
  assert_eq!(
    params,
    vec![("ambient".to_owned(), 0), ("directions".to_owned(), 16)]
  );
  assert_eq!(
    log.last("program_set_constant_buffer").unwrap().args,
    format!("{:?}", (0u32, lights.handle()))
  );
  assert_eq!(log.count("update_buffer"), 0);

  lights
    .set_param("directions", bytemuck::cast_slice(&[0.1f32; 4]))
    .unwrap();
  log.clear();
  ctx.draw(DrawMode::Triangles, 3, 0).unwrap();

  assert_eq!(log.count("update_buffer"), 1);
  assert!(log.last("update_buffer").unwrap().args.contains(", 16, "));

  // nothing changed since
  log.clear();
  ctx.draw(DrawMode::Triangles, 3, 0).unwrap();
  assert_eq!(log.count("update_buffer"), 0);
}

#[test]
fn programs_do_not_keep_block_buffers_alive() {
  let (ctx, log) = context();
  let ia = triangle(&ctx);
  let program = ctx
    .compile_source("lit", &ShaderSources::new(VS, LIT_FS))
    .unwrap();
  let lights = ctx
    .create_constant_buffer("Lights", BufferUsage::Dynamic, &[0; 48])
    .unwrap();
  let handle = lights.handle();

  ctx.set_active_shader(Some(&program));
  ctx.set_input_assembler(Some(&ia));
  ctx.draw(DrawMode::Triangles, 3, 0).unwrap();

  log.clear();
  drop(lights);

  assert_eq!(log.count("release_buffer"), 1);
  assert!(ctx.get_constant_buffer("Lights").is_none());
  assert!(ctx.get_constant_buffer_by_handle(handle).is_none());

  // the name is free again, and the next draw picks the new buffer up
  let lights = ctx
    .create_constant_buffer("Lights", BufferUsage::Dynamic, &[0; 48])
    .unwrap();
  ctx.draw(DrawMode::Triangles, 3, 0).unwrap();
  assert_eq!(
    log.last("program_set_constant_buffer").unwrap().args,
    format!("{:?}", (0u32, lights.handle()))
  );

  // explicitly set buffers are not owned either
  let explicit = ctx
    .create_constant_buffer("explicit lights", BufferUsage::Dynamic, &[0; 48])
    .unwrap();
  assert!(program.set_constant_buffer("Lights", &explicit));
  let explicit_handle = explicit.handle();
  drop(explicit);
  assert!(ctx.get_constant_buffer_by_handle(explicit_handle).is_none());

  // falls back to the buffer named after the block
  ctx.draw(DrawMode::Triangles, 3, 0).unwrap();
  assert_eq!(
    log.last("program_set_constant_buffer").unwrap().args,
    format!("{:?}", (0u32, lights.handle()))
  );
}

#[test]
fn pipelines_take_separable_programs_only() {
  let (ctx, log) = context();
  let ia = triangle(&ctx);

  let vertex = ctx
    .compile_source(
      "vertex",
      &ShaderSources {
        vertex: VS,
        separable: true,
        ..ShaderSources::default()
      },
    )
    .unwrap();
  let fragment = ctx
    .compile_source(
      "fragment",
      &ShaderSources {
        fragment: FS,
        separable: true,
        ..ShaderSources::default()
      },
    )
    .unwrap();
  let monolithic = ctx
    .compile_source("monolithic", &ShaderSources::new(VS, FS))
    .unwrap();

  let pipeline = ctx.create_program_pipeline().unwrap();
  assert_eq!(
    pipeline.set_program_stages(Some(&monolithic), ShaderStageFlags::VERTEX),
    Err(ShaderError::CreationFailed("monolithic".to_owned()))
  );

  pipeline
    .set_program_stages(Some(&vertex), ShaderStageFlags::VERTEX)
    .unwrap();
  pipeline
    .set_program_stages(Some(&fragment), ShaderStageFlags::FRAGMENT)
    .unwrap();
  assert_eq!(
    pipeline.vertex_program().map(|p| p.handle()),
    Some(vertex.handle())
  );

  ctx.set_active_shader(Some(&monolithic));
  ctx.set_active_program_pipeline(Some(&pipeline));
  assert!(ctx.active_shader().is_none());

  // separable programs are updated in place
  log.clear();
  fragment
    .set_constant("color", ConstantValue::Float(&[1.; 4]))
    .unwrap();
  assert_eq!(log.names(), vec!["set_constant_value"]);

  ctx.set_input_assembler(Some(&ia));
  ctx.draw(DrawMode::Triangles, 3, 0).unwrap();
  assert_eq!(
    log.last("set_input_assembler").unwrap().args,
    format!("{:?}", (None::<u8>, None::<u8>))
  );
  assert_eq!(log.count("draw"), 1);
}
