mod common;

use common::{context, context_with};
use lucent::backend::handle::FramebufferHandle;
use lucent::backend::null::NullBackend;
use lucent::buffer::{BufferAccess, BufferError, BufferUsage};
use lucent::capabilities::Capabilities;
use lucent::component::ComponentType;
use lucent::context::ResourceError;
use lucent::framebuffer::{Attachment, AttachmentSource, FramebufferError, IncompleteReason};
use lucent::pixel::TextureFormat;
use lucent::render_state::{ClearFlags, Rect};
use lucent::texture::{ImageAccess, TextureError};

#[test]
fn released_resources_leave_the_registry() {
  let (ctx, log) = context();

  let vb = ctx
    .create_vertex_buffer(BufferUsage::Static, &[0f32; 12], 12)
    .unwrap();
  let ib = ctx
    .create_index_buffer(BufferUsage::Static, ComponentType::UInt32, &[0u32, 1, 2])
    .unwrap();
  let (vb_handle, ib_handle) = (vb.handle(), ib.handle());

  assert!(ctx.get_vertex_buffer(vb_handle).is_some());
  assert!(ctx.get_index_buffer(ib_handle).is_some());

  drop(vb);
  assert!(ctx.get_vertex_buffer(vb_handle).is_none());
  assert_eq!(log.count("release_buffer"), 1);

  // a clone keeps it alive
  let kept = ib.clone();
  drop(ib);
  assert!(ctx.get_index_buffer(ib_handle).is_some());
  drop(kept);
  assert!(ctx.get_index_buffer(ib_handle).is_none());
  assert_eq!(log.count("release_buffer"), 2);
}

#[test]
fn offscreen_target_is_complete() {
  let (ctx, _log) = context();

  let color = ctx.create_texture_2d().unwrap();
  color
    .set_texture_data(None, 0, 256, 256, TextureFormat::RGBA8)
    .unwrap();
  let depth = ctx
    .create_render_buffer(TextureFormat::Depth24Stencil8, 256, 256)
    .unwrap();
  let fb = ctx.create_framebuffer().unwrap();

  assert_eq!(fb.status(), Err(IncompleteReason::MissingAttachment));

  fb.attach(Attachment::Color(0), AttachmentSource::texture(&color))
    .unwrap();
  fb.attach(
    Attachment::DepthStencil,
    AttachmentSource::render_buffer(&depth),
  )
  .unwrap();

  assert!(fb.is_complete());
  assert_eq!(fb.size(), Some([256, 256]));
  assert_eq!(
    fb.attachment_points(),
    vec![Attachment::Color(0), Attachment::DepthStencil]
  );
}

#[test]
fn depth_texture_target_is_complete() {
  let (ctx, _log) = context();

  let color = ctx.create_texture_2d().unwrap();
  color
    .set_texture_data(None, 0, 256, 256, TextureFormat::RGBA8)
    .unwrap();
  let depth = ctx.create_texture_2d().unwrap();
  depth
    .set_texture_data(None, 0, 256, 256, TextureFormat::Depth24)
    .unwrap();
  let fb = ctx.create_framebuffer().unwrap();

  fb.attach(Attachment::Color(0), AttachmentSource::texture(&color))
    .unwrap();
  fb.attach(Attachment::Depth, AttachmentSource::texture(&depth))
    .unwrap();

  assert_eq!(fb.status(), Ok(()));
  assert_eq!(fb.size(), Some([256, 256]));

  // a smaller depth texture
  let small_depth = ctx.create_texture_2d().unwrap();
  small_depth
    .set_texture_data(None, 0, 128, 128, TextureFormat::Depth24)
    .unwrap();
  fb.attach(Attachment::Depth, AttachmentSource::texture(&small_depth))
    .unwrap();
  assert_eq!(fb.status(), Err(IncompleteReason::IncompleteDimensions));

  // a color texture where depth is expected
  let not_depth = ctx.create_texture_2d().unwrap();
  not_depth
    .set_texture_data(None, 0, 256, 256, TextureFormat::RGBA8)
    .unwrap();
  fb.attach(Attachment::Depth, AttachmentSource::texture(&not_depth))
    .unwrap();
  assert_eq!(fb.status(), Err(IncompleteReason::IncompleteAttachment));

  fb.attach(Attachment::Depth, AttachmentSource::texture(&depth))
    .unwrap();
  assert!(fb.is_complete());
}

#[test]
fn mismatched_attachments_are_incomplete() {
  let (ctx, _log) = context();

  let color = ctx.create_texture_2d().unwrap();
  color
    .set_texture_data(None, 0, 256, 256, TextureFormat::RGBA8)
    .unwrap();
  let small_depth = ctx
    .create_render_buffer(TextureFormat::Depth24, 128, 128)
    .unwrap();
  let not_depth = ctx
    .create_render_buffer(TextureFormat::RGBA8, 256, 256)
    .unwrap();
  let fb = ctx.create_framebuffer().unwrap();

  fb.attach(Attachment::Color(0), AttachmentSource::texture(&color))
    .unwrap();
  fb.attach(Attachment::Depth, AttachmentSource::render_buffer(&small_depth))
    .unwrap();
  assert_eq!(fb.status(), Err(IncompleteReason::IncompleteDimensions));

  fb.attach(Attachment::Depth, AttachmentSource::render_buffer(&not_depth))
    .unwrap();
  assert_eq!(fb.status(), Err(IncompleteReason::IncompleteAttachment));

  fb.detach(Attachment::Depth).unwrap();
  assert!(fb.is_complete());
  assert_eq!(
    fb.detach(Attachment::Depth),
    Err(FramebufferError::NotAttached(Attachment::Depth))
  );

  assert_eq!(
    fb.attach(Attachment::Color(8), AttachmentSource::texture(&color)),
    Err(FramebufferError::TooManyColorAttachments { index: 8, max: 8 })
  );
}

#[test]
fn dropping_the_render_target_rebinds_the_default_framebuffer() {
  let (ctx, log) = context();
  let fb = ctx.create_framebuffer().unwrap();

  ctx.set_render_target(Some(&fb));
  ctx.push_property_set();
  assert_eq!(ctx.render_target().map(|t| t.handle()), Some(fb.handle()));

  log.clear();
  drop(fb);

  assert!(ctx.render_target().is_none());
  assert_eq!(ctx.hardware_properties().render_target, None);
  assert_eq!(log.names(), vec!["set_render_target", "release_framebuffer"]);

  // the saved set was scrubbed too
  log.clear();
  ctx.pop_property_set(true);
  assert_eq!(
    log.last("set_render_target").unwrap().args,
    format!("{:?}", (None::<FramebufferHandle>,))
  );
}

#[test]
fn clearing_another_target_restores_the_current_one() {
  let (ctx, log) = context();
  let fb = ctx.create_framebuffer().unwrap();

  ctx.clear_render_target(&fb, ClearFlags::COLOR);

  assert!(ctx.render_target().is_none());
  assert_eq!(
    log.names(),
    vec!["set_render_target", "clear", "set_render_target"]
  );
}

#[test]
fn read_back_the_cleared_color() {
  let (ctx, _log) = context();
  ctx.set_clear_color([1., 0., 0., 1.]);
  ctx.clear(ClearFlags::COLOR);

  let mut pixels = vec![0; 2 * 2 * 4];
  ctx
    .read_pixels(Rect::new(0, 0, 2, 2), TextureFormat::RGBA8, &mut pixels)
    .unwrap();
  assert_eq!(&pixels[..4], &[255, 0, 0, 255]);
  assert_eq!(&pixels[12..], &[255, 0, 0, 255]);

  let mut short = vec![0; 3];
  assert_eq!(
    ctx.read_pixels(Rect::new(0, 0, 2, 2), TextureFormat::RGBA8, &mut short),
    Err(TextureError::SizeMismatch {
      expected: 16,
      found: 3
    })
  );
}

#[test]
fn named_buffers_are_unique_while_alive() {
  let (ctx, _log) = context();

  let lights = ctx
    .create_constant_buffer("Lights", BufferUsage::Dynamic, &[0; 64])
    .unwrap();
  assert_eq!(
    ctx
      .create_constant_buffer("Lights", BufferUsage::Dynamic, &[0; 64])
      .unwrap_err(),
    ResourceError::NameInUse("Lights".to_owned())
  );

  assert_eq!(
    ctx.get_constant_buffer("Lights").map(|b| b.handle()),
    Some(lights.handle())
  );

  drop(lights);
  assert!(ctx.get_constant_buffer("Lights").is_none());
  let again = ctx
    .create_constant_buffer("Lights", BufferUsage::Dynamic, &[0; 64])
    .unwrap();
  assert_eq!(again.name(), "Lights");
}

#[test]
fn atomic_counters_are_found_by_counter_name() {
  let (ctx, _log) = context();

  let counters = ctx
    .create_atomic_counter_buffer("Counters", BufferUsage::Dynamic, &[0; 8])
    .unwrap();
  counters.add_counter("visible", 0).unwrap();
  counters.add_counter("culled", 4).unwrap();

  assert_eq!(
    ctx
      .get_atomic_counter_buffer_by_param("culled")
      .map(|b| b.handle()),
    Some(counters.handle())
  );
  assert!(ctx.get_atomic_counter_buffer_by_param("missing").is_none());
}

#[test]
fn missing_capabilities_are_reported() {
  let caps = Capabilities::all()
    - Capabilities::COMPUTE
    - Capabilities::STORAGE_BUFFER
    - Capabilities::CONSTANT_BUFFER
    - Capabilities::MULTISAMPLE_TEXTURE
    - Capabilities::PROGRAM_PIPELINE
    - Capabilities::TIMER_QUERY
    - Capabilities::IMAGE_LOAD_STORE;
  let (ctx, log) = context_with(NullBackend::new().with_capabilities(caps));

  assert_eq!(
    ctx
      .create_constant_buffer("Camera", BufferUsage::Dynamic, &[0; 64])
      .unwrap_err(),
    ResourceError::Unsupported("constant buffers")
  );
  assert_eq!(
    ctx
      .create_storage_buffer("Particles", BufferUsage::Dynamic, &[0; 64])
      .unwrap_err(),
    ResourceError::Unsupported("storage buffers")
  );
  assert_eq!(
    ctx
      .create_draw_indirect_buffer(BufferUsage::Static, &[0; 20])
      .unwrap_err(),
    ResourceError::Unsupported("indirect draws")
  );
  assert_eq!(
    ctx
      .create_texture_2d_multisample(4, TextureFormat::RGBA8, 64, 64)
      .unwrap_err(),
    ResourceError::Unsupported("multisample textures")
  );
  assert_eq!(
    ctx.create_program_pipeline().unwrap_err(),
    ResourceError::Unsupported("program pipelines")
  );
  assert_eq!(
    ctx.create_timer_query().unwrap_err(),
    ResourceError::Unsupported("timer queries")
  );

  let texture = ctx.create_texture_2d().unwrap();
  assert_eq!(
    ctx
      .create_image_2d(&texture, 0, ImageAccess::ReadWrite)
      .unwrap_err(),
    ResourceError::Unsupported("image load / store")
  );

  // nothing reached the backend but the texture
  assert_eq!(log.names(), vec!["create_texture"]);
}

#[test]
fn one_image_per_texture() {
  let (ctx, log) = context();
  let texture = ctx.create_texture_2d().unwrap();
  texture
    .set_texture_data(None, 0, 32, 32, TextureFormat::RGBA8)
    .unwrap();

  let image = ctx
    .create_image_2d(&texture, 0, ImageAccess::WriteOnly)
    .unwrap();
  let same = ctx
    .create_image_2d(&texture, 0, ImageAccess::ReadOnly)
    .unwrap();

  assert!(std::rc::Rc::ptr_eq(&image, &same));
  assert!(ctx.get_image_2d(texture.handle()).is_some());

  drop((image, same));
  assert!(ctx.get_image_2d(texture.handle()).is_none());
  assert_eq!(log.count("release_texture"), 0);
}

#[test]
fn buffer_mapping() {
  let (ctx, log) = context();
  let vb = ctx
    .create_vertex_buffer(BufferUsage::Dynamic, &[0u8; 16], 4)
    .unwrap();

  {
    let mut mapped = vb.map(4, 8, BufferAccess::WRITE).unwrap();
    assert_eq!(mapped.len(), 8);
    mapped.copy_from_slice(&[1; 8]);

    assert_eq!(
      vb.map(0, 4, BufferAccess::READ).unwrap_err(),
      BufferError::Mapped
    );
    assert_eq!(vb.update(0, &[2; 4]), Err(BufferError::Mapped));
  }

  assert_eq!(log.count("unmap_buffer"), 1);

  let mapped = vb.map(0, 16, BufferAccess::READ).unwrap();
  assert_eq!(&mapped[..], &[0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0]);
  drop(mapped);

  assert_eq!(
    vb.map(12, 8, BufferAccess::READ).unwrap_err(),
    BufferError::Overflow {
      offset: 12,
      len: 8,
      size: 16
    }
  );
}

#[test]
fn buffer_updates_and_resizes() {
  let (ctx, log) = context();
  let ib = ctx
    .create_index_buffer(BufferUsage::Dynamic, ComponentType::UInt16, &[0u16; 6])
    .unwrap();

  ib.update(4, &[1, 0, 2, 0]).unwrap();
  assert_eq!(log.count("update_buffer"), 1);
  assert_eq!(
    ib.update(10, &[0; 4]),
    Err(BufferError::Overflow {
      offset: 10,
      len: 4,
      size: 12
    })
  );

  ib.set_data(&[0; 24]).unwrap();
  assert_eq!(log.count("resize_buffer"), 1);
  assert_eq!(ib.index_count(), 12);
}

#[test]
fn timer_query_and_fence() {
  let (ctx, _log) = context();
  let query = ctx.create_timer_query().unwrap();

  assert_eq!(query.result(), None);
  query.begin();
  ctx.clear(ClearFlags::COLOR);
  assert_eq!(query.result(), None);
  query.end();
  assert!(query.result().is_some());

  let fence = ctx.create_fence().unwrap();
  fence.wait();
  assert!(ctx.get_fence(fence.handle()).is_some());

  let paths = ctx.create_path_objects(4).unwrap();
  assert_eq!(paths.range(), 4);
}
