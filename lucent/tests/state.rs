mod common;

use common::{context, context_with};
use lucent::backend::null::NullBackend;
use lucent::backend::DriverState;
use lucent::blending::{BlendEquationArgs, Equation};
use lucent::capabilities::Capabilities;
use lucent::depth_stencil::Comparison;
use lucent::render_state::{ClearFlags, CullMode, DepthStencilDesc, RasterizerDesc, Rect};

#[test]
fn setters_skip_redundant_calls() {
  let (ctx, log) = context();
  let viewport = Rect::new(0, 0, 640, 480);

  ctx.set_viewport(viewport);
  ctx.set_viewport(viewport);
  assert_eq!(log.count("set_viewport"), 1);
  assert_eq!(ctx.viewport(), viewport);

  ctx.set_blending_enabled(true);
  ctx.set_blending_enabled(true);
  ctx.set_blending_enabled(false);
  assert_eq!(log.count("set_render_state"), 2);

  // already the initial driver value
  ctx.set_depth_function(Comparison::Less);
  assert_eq!(log.count("set_depth_function"), 0);

  ctx.set_depth_function(Comparison::LessOrEqual);
  ctx.set_depth_function(Comparison::Less);
  assert_eq!(log.count("set_depth_function"), 2);
}

#[test]
fn snapshot_is_seeded_from_the_driver() {
  let driver = DriverState {
    viewport: Rect::new(0, 0, 800, 600),
    depth_test_enabled: true,
    clear_color: [0.2, 0.2, 0.2, 1.],
    ..DriverState::default()
  };
  let (ctx, log) = context_with(NullBackend::new().with_driver_state(driver));

  assert_eq!(ctx.viewport(), Rect::new(0, 0, 800, 600));
  assert!(ctx.depth_test_enabled());

  ctx.set_viewport(Rect::new(0, 0, 800, 600));
  ctx.set_depth_test_enabled(true);
  ctx.set_clear_color([0.2, 0.2, 0.2, 1.]);
  assert!(log.calls().is_empty());
}

#[test]
fn forced_pop_restores_every_property() {
  let (ctx, log) = context();
  let before = ctx.hardware_properties();

  ctx.push_property_set();
  ctx.set_viewport(Rect::new(10, 10, 100, 100));
  ctx.pop_property_set(true);

  assert_eq!(ctx.hardware_properties(), before);
  assert_eq!(ctx.property_stack_depth(), 0);

  let names = log.names();
  assert_eq!(names[0], "set_viewport");
  assert_eq!(names.len(), 1 + 17);
  assert_eq!(log.count("set_viewport"), 2);
  assert_eq!(log.count("set_render_state"), 7);
  assert_eq!(log.count("set_clear_color"), 1);
  assert_eq!(log.count("set_render_target"), 1);
  assert_eq!(log.count("set_active_program"), 1);
  assert_eq!(log.count("set_program_pipeline"), 1);
  assert_eq!(
    log.last("set_viewport").unwrap().args,
    format!("{:?}", (before.viewport,))
  );
}

#[test]
fn lazy_pop_restores_changed_properties_only() {
  let (ctx, log) = context();
  let before = ctx.hardware_properties();

  ctx.push_property_set();
  ctx.set_viewport(Rect::new(10, 10, 100, 100));
  ctx.set_blending_enabled(true);
  log.clear();

  ctx.pop_property_set(false);

  assert_eq!(ctx.hardware_properties(), before);
  assert_eq!(log.names(), vec!["set_render_state", "set_viewport"]);
}

#[test]
fn nested_property_sets() {
  let (ctx, _log) = context();

  ctx.set_scissor_test_enabled(true);
  ctx.push_property_set();
  ctx.set_scissor_test_enabled(false);
  ctx.push_property_set();
  ctx.set_scissor_rect(Rect::new(1, 2, 3, 4));
  assert_eq!(ctx.property_stack_depth(), 2);

  ctx.pop_property_set(false);
  assert!(!ctx.scissor_test_enabled());
  assert_eq!(ctx.scissor_rect(), Rect::default());

  ctx.pop_property_set(false);
  assert!(ctx.scissor_test_enabled());
}

#[test]
fn popping_an_empty_stack_does_nothing() {
  let (ctx, log) = context();
  let before = ctx.hardware_properties();

  ctx.pop_property_set(true);

  assert_eq!(ctx.hardware_properties(), before);
  assert!(log.calls().is_empty());
}

#[test]
fn clear_color_is_cached_across_clears() {
  let (ctx, log) = context();

  ctx.set_clear_color([0.8, 0., 0., 1.]);
  ctx.clear(ClearFlags::COLOR);
  ctx.set_clear_color([0.8, 0., 0., 1.]);
  ctx.clear(ClearFlags::COLOR);

  assert_eq!(log.count("set_clear_color"), 1);
  assert_eq!(log.count("clear"), 2);
}

#[test]
fn depth_clear_enables_depth_writes() {
  let (ctx, log) = context();

  ctx.set_depth_write_enabled(false);
  log.clear();

  ctx.clear(ClearFlags::COLOR | ClearFlags::DEPTH);

  assert!(ctx.depth_write_enabled());
  assert_eq!(log.names(), vec!["set_render_state", "clear"]);
}

#[test]
fn state_objects_update_the_snapshot() {
  let (ctx, log) = context();

  let depth_stencil = ctx
    .create_depth_stencil_state(DepthStencilDesc {
      depth_test: true,
      depth_write: false,
      depth_function: Comparison::Greater,
      ..DepthStencilDesc::default()
    })
    .unwrap();
  let rasterizer = ctx
    .create_rasterizer_state(RasterizerDesc {
      cull_mode: CullMode::Front,
      ..RasterizerDesc::default()
    })
    .unwrap();

  ctx.set_depth_stencil_state(&depth_stencil);
  ctx.set_rasterizer_state(&rasterizer);
  log.clear();

  assert!(ctx.depth_test_enabled());
  assert!(!ctx.depth_write_enabled());
  assert_eq!(ctx.depth_function(), Comparison::Greater);
  assert!(ctx.culling_enabled());

  // already applied through the state objects
  ctx.set_depth_function(Comparison::Greater);
  ctx.set_culling_enabled(true);
  assert!(log.calls().is_empty());

  let handle = depth_stencil.handle();
  drop(depth_stencil);
  assert!(ctx.get_depth_stencil_state(handle).is_none());
  assert_eq!(log.count("release_depth_stencil_state"), 1);
}

#[test]
fn advanced_blending_needs_hardware() {
  let caps = Capabilities::all() - Capabilities::ADVANCED_BLEND_NV - Capabilities::ADVANCED_BLEND_KHR;
  let (ctx, log) = context_with(NullBackend::new().with_capabilities(caps));

  ctx.set_blend_equation(BlendEquationArgs::new(Equation::Overlay));
  assert_eq!(log.count("set_blend_equation"), 0);
  assert_eq!(ctx.blend_equation(), BlendEquationArgs::default());

  ctx.set_blend_equation(BlendEquationArgs::new(Equation::Max));
  assert_eq!(log.count("set_blend_equation"), 1);

  // no advanced blending at all, hence no barrier
  ctx.set_blend_barrier();
  assert_eq!(log.count("set_blend_barrier"), 0);
}

#[test]
fn blend_barrier_only_without_coherency() {
  let caps = Capabilities::all() - Capabilities::ADVANCED_BLEND_KHR_COHERENT;
  let (ctx, log) = context_with(NullBackend::new().with_capabilities(caps));

  ctx.set_blend_barrier();
  assert_eq!(log.count("set_blend_barrier"), 1);

  let (ctx, log) = context();
  ctx.set_blend_barrier();
  assert_eq!(log.count("set_blend_barrier"), 0);
}
