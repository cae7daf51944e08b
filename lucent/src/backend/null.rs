//! A backend that simulates a GPU in memory and records every call it receives.
//!
//! [`NullBackend`] runs anywhere, without a driver. It keeps enough state to behave like a real
//! GPU where the render context can observe it:
//!
//! - Buffers store their bytes, and mapping hands out a pointer into that storage.
//! - Textures and render buffers remember their format and size, so framebuffer completeness is
//!   checked the way a driver would.
//! - Shader stages “compile” unless their source contains an `#error` directive, and programs
//!   fail to link when one of their stages has no `main` function. Linked programs are
//!   introspected by scanning the declarations of their GLSL sources.
//!
//! Every call is appended to a [`CallLog`] shared with whoever asked for it, which makes the
//! backend suitable to check what the render context sends down.

mod glsl;

use crate::backend::handle::{
  BufferHandle, DepthStencilStateHandle, FramebufferHandle, InputAssemblerHandle, PathHandle,
  ProgramHandle, ProgramPipelineHandle, QueryHandle, RasterizerStateHandle, RenderBufferHandle,
  ShaderStageHandle, SyncHandle, TextureHandle,
};
use crate::backend::{Backend, DriverState, StateQueryError};
use crate::blending::{BlendEquationArgs, BlendFunctionArgs};
use crate::buffer::{BufferAccess, BufferBinding, BufferUsage};
use crate::capabilities::{Capabilities, Limits};
use crate::component::ComponentType;
use crate::depth_stencil::{Comparison, Face, StencilFunctionArgs, StencilOperationArgs};
use crate::framebuffer::{Attachment, BlitFilter, IncompleteReason};
use crate::input_assembler::{AttribLayoutEntry, DrawMode};
use crate::pixel::TextureFormat;
use crate::query::QueryType;
use crate::render_state::{
  ClearFlags, DepthStencilDesc, MemoryBarrierFlags, RasterizerDesc, Rect, RenderStateFlag,
};
use crate::shader::{
  AttributeInfo, BlockInfo, BlockMemberInfo, ShaderDataType, ShaderStage, ShaderStageFlags,
  UniformInfo,
};
use crate::texture::{CubeFace, ImageAccess, SamplerParams, TextureTarget};
use crate::version::BackendProfile;
use glsl::Interface;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ptr::NonNull;
use std::rc::Rc;

/// One call received by a [`NullBackend`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordedCall {
  /// Name of the [`Backend`] method.
  pub name: &'static str,
  /// Debug rendering of the arguments.
  pub args: String,
}

/// Shared, append-only log of the calls a [`NullBackend`] received.
#[derive(Clone, Debug, Default)]
pub struct CallLog {
  calls: Rc<RefCell<Vec<RecordedCall>>>,
}

impl CallLog {
  fn push(&self, name: &'static str, args: String) {
    self.calls.borrow_mut().push(RecordedCall { name, args });
  }

  fn len(&self) -> usize {
    self.calls.borrow().len()
  }

  /// Every call so far.
  pub fn calls(&self) -> Vec<RecordedCall> {
    self.calls.borrow().clone()
  }

  /// Names of every call so far, in order.
  pub fn names(&self) -> Vec<&'static str> {
    self.calls.borrow().iter().map(|c| c.name).collect()
  }

  /// Number of calls to a method.
  pub fn count(&self, name: &str) -> usize {
    self.calls.borrow().iter().filter(|c| c.name == name).count()
  }

  /// Last call to a method.
  pub fn last(&self, name: &str) -> Option<RecordedCall> {
    self
      .calls
      .borrow()
      .iter()
      .rev()
      .find(|c| c.name == name)
      .cloned()
  }

  /// Forget every call so far.
  pub fn clear(&self) {
    self.calls.borrow_mut().clear();
  }
}

#[derive(Clone, Copy, Debug)]
struct TextureRecord {
  target: TextureTarget,
  format: TextureFormat,
  width: u32,
  height: u32,
}

#[derive(Clone, Copy, Debug)]
enum Attached {
  Texture { handle: u64, level: u32 },
  RenderBuffer(u64),
}

#[derive(Debug, Default)]
struct ProgramRecord {
  stages: Vec<u64>,
  interface: Option<Interface>,
}

/// The null backend.
#[derive(Debug)]
pub struct NullBackend {
  log: CallLog,
  profile: BackendProfile,
  version: String,
  capabilities: Capabilities,
  limits: Limits,
  driver_state: DriverState,
  next_handle: u64,
  buffers: HashMap<u64, Vec<u8>>,
  mapped: HashSet<u64>,
  textures: HashMap<u64, TextureRecord>,
  render_buffers: HashMap<u64, (TextureFormat, u32, u32)>,
  framebuffers: HashMap<u64, BTreeMap<Attachment, Attached>>,
  stages: HashMap<u64, (ShaderStage, String)>,
  programs: HashMap<u64, ProgramRecord>,
  input_assemblers: HashSet<u64>,
  objects: HashSet<u64>,
  queries: HashMap<u64, (Option<usize>, Option<u64>)>,
  clear_color: [f32; 4],
  color_contents: [f32; 4],
}

impl Default for NullBackend {
  fn default() -> Self {
    Self::new()
  }
}

macro_rules! record {
  ($self:ident, $name:literal) => {
    $self.log.push($name, String::new())
  };

  ($self:ident, $name:literal, $($arg:expr),+) => {
    $self.log.push($name, format!("{:?}", ($($arg,)+)))
  };
}

impl NullBackend {
  /// A backend with every capability, generous limits and the initial OpenGL state.
  pub fn new() -> Self {
    NullBackend {
      log: CallLog::default(),
      profile: BackendProfile::Null,
      version: "null 4.6".to_owned(),
      capabilities: Capabilities::all(),
      limits: Limits {
        max_texture_units: 16,
        max_constant_buffer_units: 16,
        max_draw_buffers: 8,
        max_samples: 8,
        max_texture_size: 16384,
      },
      driver_state: DriverState::default(),
      next_handle: 1,
      buffers: HashMap::new(),
      mapped: HashSet::new(),
      textures: HashMap::new(),
      render_buffers: HashMap::new(),
      framebuffers: HashMap::new(),
      stages: HashMap::new(),
      programs: HashMap::new(),
      input_assemblers: HashSet::new(),
      objects: HashSet::new(),
      queries: HashMap::new(),
      clear_color: [0.; 4],
      color_contents: [0.; 4],
    }
  }

  /// Replace the capabilities.
  pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
    self.capabilities = capabilities;
    self
  }

  /// Replace the limits.
  pub fn with_limits(mut self, limits: Limits) -> Self {
    self.limits = limits;
    self
  }

  /// Replace the state reported as the initial driver state.
  pub fn with_driver_state(mut self, driver_state: DriverState) -> Self {
    self.clear_color = driver_state.clear_color;
    self.driver_state = driver_state;
    self
  }

  /// Handle onto the log of the calls this backend receives.
  pub fn call_log(&self) -> CallLog {
    self.log.clone()
  }

  fn issue(&mut self) -> u64 {
    let handle = self.next_handle;
    self.next_handle += 1;
    handle
  }

  fn interface(&self, program: ProgramHandle) -> Option<&Interface> {
    self.programs.get(&program.raw())?.interface.as_ref()
  }

  // Format and size of an attached image.
  fn attached_image(&self, attached: Attached) -> Option<(TextureFormat, u32, u32)> {
    match attached {
      Attached::Texture { handle, level } => {
        let texture = self.textures.get(&handle)?;

        if texture.format == TextureFormat::Unknown {
          return None;
        }

        Some((
          texture.format,
          (texture.width >> level).max(1),
          (texture.height >> level).max(1),
        ))
      }

      Attached::RenderBuffer(handle) => self.render_buffers.get(&handle).copied(),
    }
  }

  fn store_texture(&mut self, texture: TextureHandle, format: TextureFormat, width: u32, height: u32) {
    if let Some(record) = self.textures.get_mut(&texture.raw()) {
      record.format = format;
      record.width = width;
      record.height = height;
    }
  }
}

impl Backend for NullBackend {
  fn profile(&self) -> BackendProfile {
    self.profile
  }

  fn version_string(&self) -> &str {
    &self.version
  }

  fn capabilities(&self) -> Capabilities {
    self.capabilities
  }

  fn limits(&self) -> Limits {
    self.limits
  }

  fn query_driver_state(&mut self) -> Result<DriverState, StateQueryError> {
    record!(self, "query_driver_state");
    Ok(self.driver_state)
  }

  fn create_buffer(
    &mut self,
    binding: BufferBinding,
    usage: BufferUsage,
    data: &[u8],
  ) -> Option<BufferHandle> {
    record!(self, "create_buffer", binding, usage, data.len());
    let handle = self.issue();
    self.buffers.insert(handle, data.to_vec());
    BufferHandle::from_raw(handle)
  }

  fn update_buffer(
    &mut self,
    buffer: BufferHandle,
    binding: BufferBinding,
    offset: usize,
    data: &[u8],
  ) {
    record!(self, "update_buffer", buffer, binding, offset, data.len());

    if let Some(storage) = self.buffers.get_mut(&buffer.raw()) {
      if let Some(dst) = storage.get_mut(offset..offset + data.len()) {
        dst.copy_from_slice(data);
      }
    }
  }

  fn resize_buffer(
    &mut self,
    buffer: BufferHandle,
    binding: BufferBinding,
    usage: BufferUsage,
    data: &[u8],
  ) {
    record!(self, "resize_buffer", buffer, binding, usage, data.len());

    if let Some(storage) = self.buffers.get_mut(&buffer.raw()) {
      *storage = data.to_vec();
    }
  }

  unsafe fn map_buffer(
    &mut self,
    buffer: BufferHandle,
    binding: BufferBinding,
    offset: usize,
    len: usize,
    access: BufferAccess,
  ) -> Option<NonNull<u8>> {
    record!(self, "map_buffer", buffer, binding, offset, len, access);

    let storage = self.buffers.get_mut(&buffer.raw())?;

    if offset.checked_add(len)? > storage.len() || !self.mapped.insert(buffer.raw()) {
      return None;
    }

    NonNull::new(storage[offset..].as_mut_ptr())
  }

  fn unmap_buffer(&mut self, buffer: BufferHandle, binding: BufferBinding) -> bool {
    record!(self, "unmap_buffer", buffer, binding);
    self.mapped.remove(&buffer.raw())
  }

  fn release_buffer(&mut self, buffer: BufferHandle) {
    record!(self, "release_buffer", buffer);
    self.buffers.remove(&buffer.raw());
    self.mapped.remove(&buffer.raw());
  }

  fn create_texture(&mut self, target: TextureTarget) -> Option<TextureHandle> {
    record!(self, "create_texture", target);
    let handle = self.issue();
    self.textures.insert(
      handle,
      TextureRecord {
        target,
        format: TextureFormat::Unknown,
        width: 0,
        height: 0,
      },
    );
    TextureHandle::from_raw(handle)
  }

  fn set_texture_data_2d(
    &mut self,
    texture: TextureHandle,
    level: u32,
    format: TextureFormat,
    width: u32,
    height: u32,
    data: Option<&[u8]>,
  ) {
    record!(
      self,
      "set_texture_data_2d",
      texture,
      level,
      format,
      width,
      height,
      data.map(<[u8]>::len)
    );

    if level == 0 {
      self.store_texture(texture, format, width, height);
    }
  }

  fn set_texture_storage_2d_multisample(
    &mut self,
    texture: TextureHandle,
    samples: u32,
    format: TextureFormat,
    width: u32,
    height: u32,
  ) {
    record!(
      self,
      "set_texture_storage_2d_multisample",
      texture,
      samples,
      format,
      width,
      height
    );
    self.store_texture(texture, format, width, height);
  }

  fn set_texture_data_cube_face(
    &mut self,
    texture: TextureHandle,
    face: CubeFace,
    level: u32,
    format: TextureFormat,
    width: u32,
    height: u32,
    data: Option<&[u8]>,
  ) {
    record!(
      self,
      "set_texture_data_cube_face",
      texture,
      face,
      level,
      format,
      width,
      height,
      data.map(<[u8]>::len)
    );

    if level == 0 {
      self.store_texture(texture, format, width, height);
    }
  }

  fn set_texture_data_array(
    &mut self,
    texture: TextureHandle,
    level: u32,
    format: TextureFormat,
    width: u32,
    height: u32,
    layers: u32,
    data: Option<&[u8]>,
  ) {
    record!(
      self,
      "set_texture_data_array",
      texture,
      level,
      format,
      width,
      height,
      layers,
      data.map(<[u8]>::len)
    );

    if level == 0 {
      self.store_texture(texture, format, width, height);
    }
  }

  fn set_sampler_params(
    &mut self,
    texture: TextureHandle,
    target: TextureTarget,
    params: &SamplerParams,
  ) {
    record!(self, "set_sampler_params", texture, target, params);
  }

  fn generate_mipmaps(&mut self, texture: TextureHandle, target: TextureTarget) {
    record!(self, "generate_mipmaps", texture, target);
  }

  fn bind_texture(&mut self, texture: TextureHandle, target: TextureTarget, unit: u32) {
    record!(self, "bind_texture", texture, target, unit);
  }

  fn bind_image_texture(
    &mut self,
    texture: TextureHandle,
    unit: u32,
    level: u32,
    access: ImageAccess,
    format: TextureFormat,
  ) {
    record!(self, "bind_image_texture", texture, unit, level, access, format);
  }

  fn release_texture(&mut self, texture: TextureHandle, target: TextureTarget) {
    record!(self, "release_texture", texture, target);

    if let Some(record) = self.textures.remove(&texture.raw()) {
      debug_assert_eq!(record.target, target);
    }
  }

  fn create_render_buffer(
    &mut self,
    format: TextureFormat,
    width: u32,
    height: u32,
  ) -> Option<RenderBufferHandle> {
    record!(self, "create_render_buffer", format, width, height);
    let handle = self.issue();
    self.render_buffers.insert(handle, (format, width, height));
    RenderBufferHandle::from_raw(handle)
  }

  fn set_render_buffer_storage(
    &mut self,
    render_buffer: RenderBufferHandle,
    format: TextureFormat,
    width: u32,
    height: u32,
  ) {
    record!(self, "set_render_buffer_storage", render_buffer, format, width, height);

    if let Some(storage) = self.render_buffers.get_mut(&render_buffer.raw()) {
      *storage = (format, width, height);
    }
  }

  fn release_render_buffer(&mut self, render_buffer: RenderBufferHandle) {
    record!(self, "release_render_buffer", render_buffer);
    self.render_buffers.remove(&render_buffer.raw());
  }

  fn create_framebuffer(&mut self) -> Option<FramebufferHandle> {
    record!(self, "create_framebuffer");
    let handle = self.issue();
    self.framebuffers.insert(handle, BTreeMap::new());
    FramebufferHandle::from_raw(handle)
  }

  fn framebuffer_attach_texture(
    &mut self,
    framebuffer: FramebufferHandle,
    attachment: Attachment,
    texture: TextureHandle,
    target: TextureTarget,
    level: u32,
    layer: Option<u32>,
  ) {
    record!(
      self,
      "framebuffer_attach_texture",
      framebuffer,
      attachment,
      texture,
      target,
      level,
      layer
    );

    if let Some(attachments) = self.framebuffers.get_mut(&framebuffer.raw()) {
      attachments.insert(
        attachment,
        Attached::Texture {
          handle: texture.raw(),
          level,
        },
      );
    }
  }

  fn framebuffer_attach_render_buffer(
    &mut self,
    framebuffer: FramebufferHandle,
    attachment: Attachment,
    render_buffer: RenderBufferHandle,
  ) {
    record!(
      self,
      "framebuffer_attach_render_buffer",
      framebuffer,
      attachment,
      render_buffer
    );

    if let Some(attachments) = self.framebuffers.get_mut(&framebuffer.raw()) {
      attachments.insert(attachment, Attached::RenderBuffer(render_buffer.raw()));
    }
  }

  fn framebuffer_detach(&mut self, framebuffer: FramebufferHandle, attachment: Attachment) {
    record!(self, "framebuffer_detach", framebuffer, attachment);

    if let Some(attachments) = self.framebuffers.get_mut(&framebuffer.raw()) {
      attachments.remove(&attachment);
    }
  }

  fn framebuffer_status(
    &mut self,
    framebuffer: FramebufferHandle,
  ) -> Result<(), IncompleteReason> {
    record!(self, "framebuffer_status", framebuffer);

    let attachments = self
      .framebuffers
      .get(&framebuffer.raw())
      .ok_or(IncompleteReason::Undefined)?;

    if attachments.is_empty() {
      return Err(IncompleteReason::MissingAttachment);
    }

    let mut size = None;

    for (&attachment, &attached) in attachments {
      let (format, width, height) = self
        .attached_image(attached)
        .ok_or(IncompleteReason::IncompleteAttachment)?;

      let fits = match attachment {
        Attachment::Color(_) => format.is_color_renderable(),
        Attachment::Depth => format.is_depth(),
        Attachment::Stencil => format.has_stencil(),
        Attachment::DepthStencil => format.is_depth() && format.has_stencil(),
      };

      if !fits {
        return Err(IncompleteReason::IncompleteAttachment);
      }

      match size {
        None => size = Some((width, height)),
        Some(s) if s != (width, height) => return Err(IncompleteReason::IncompleteDimensions),
        _ => (),
      }
    }

    Ok(())
  }

  fn set_render_target(&mut self, framebuffer: Option<FramebufferHandle>) {
    record!(self, "set_render_target", framebuffer);
  }

  fn set_read_target(&mut self, framebuffer: Option<FramebufferHandle>) {
    record!(self, "set_read_target", framebuffer);
  }

  fn blit_framebuffer(&mut self, src: Rect, dst: Rect, flags: ClearFlags, filter: BlitFilter) {
    record!(self, "blit_framebuffer", src, dst, flags, filter);
  }

  // Every pixel holds the last color cleared to.
  fn read_pixels(&mut self, rect: Rect, format: TextureFormat, out: &mut [u8]) -> bool {
    record!(self, "read_pixels", rect, format, out.len());

    let texel = match format.encode_from_float(self.color_contents) {
      Some(texel) if !texel.is_empty() => texel,
      _ => return false,
    };

    for chunk in out.chunks_mut(texel.len()) {
      chunk.copy_from_slice(&texel[..chunk.len()]);
    }

    true
  }

  fn release_framebuffer(&mut self, framebuffer: FramebufferHandle) {
    record!(self, "release_framebuffer", framebuffer);
    self.framebuffers.remove(&framebuffer.raw());
  }

  fn create_shader_stage(
    &mut self,
    stage: ShaderStage,
    source: &str,
  ) -> Result<ShaderStageHandle, String> {
    record!(self, "create_shader_stage", stage, source.len());

    if source.trim().is_empty() {
      return Err("0:1: empty shader source".to_owned());
    }

    let errors: Vec<String> = source
      .lines()
      .enumerate()
      .filter_map(|(i, line)| {
        let directive = line.trim_start().strip_prefix('#')?.trim_start();
        let message = directive.strip_prefix("error")?;
        Some(format!("0:{}: #error{}", i + 1, message))
      })
      .collect();

    if !errors.is_empty() {
      return Err(errors.join("\n"));
    }

    let handle = self.issue();
    self.stages.insert(handle, (stage, source.to_owned()));
    ShaderStageHandle::from_raw(handle).ok_or_else(|| "handle overflow".to_owned())
  }

  fn release_shader_stage(&mut self, stage: ShaderStageHandle) {
    record!(self, "release_shader_stage", stage);
    self.stages.remove(&stage.raw());
  }

  fn create_program(&mut self, separable: bool) -> Option<ProgramHandle> {
    record!(self, "create_program", separable);
    let handle = self.issue();
    self.programs.insert(handle, ProgramRecord::default());
    ProgramHandle::from_raw(handle)
  }

  fn attach_shader_stage(&mut self, program: ProgramHandle, stage: ShaderStageHandle) {
    record!(self, "attach_shader_stage", program, stage);

    if let Some(record) = self.programs.get_mut(&program.raw()) {
      record.stages.push(stage.raw());
    }
  }

  fn detach_shader_stage(&mut self, program: ProgramHandle, stage: ShaderStageHandle) {
    record!(self, "detach_shader_stage", program, stage);

    if let Some(record) = self.programs.get_mut(&program.raw()) {
      record.stages.retain(|&s| s != stage.raw());
    }
  }

  fn link_program(&mut self, program: ProgramHandle) -> Result<(), String> {
    record!(self, "link_program", program);

    let stages = match self.programs.get(&program.raw()) {
      Some(record) => record.stages.clone(),
      None => return Err("unknown program".to_owned()),
    };

    if stages.is_empty() {
      return Err("no shader stage attached".to_owned());
    }

    let errors: Vec<String> = stages
      .iter()
      .filter_map(|stage| self.stages.get(stage))
      .filter(|(_, source)| !glsl::defines_main(source))
      .map(|(kind, _)| format!("error: {} lacks `main'", kind))
      .collect();

    if !errors.is_empty() {
      return Err(errors.join("\n"));
    }

    let mut interface = Interface::default();
    for stage in &stages {
      if let Some((kind, source)) = self.stages.get(stage) {
        glsl::scan(&mut interface, *kind, source);
      }
    }

    if let Some(record) = self.programs.get_mut(&program.raw()) {
      record.interface = Some(interface);
    }

    Ok(())
  }

  fn set_active_program(&mut self, program: Option<ProgramHandle>) {
    record!(self, "set_active_program", program);
  }

  fn release_program(&mut self, program: ProgramHandle) {
    record!(self, "release_program", program);
    self.programs.remove(&program.raw());
  }

  fn attribute_count(&mut self, program: ProgramHandle) -> usize {
    self.interface(program).map_or(0, |i| i.attributes.len())
  }

  fn attribute_info(&mut self, program: ProgramHandle, index: usize) -> Option<AttributeInfo> {
    self.interface(program)?.attributes.get(index).cloned()
  }

  fn constant_count(&mut self, program: ProgramHandle) -> usize {
    self.interface(program).map_or(0, |i| i.uniforms.len())
  }

  fn constant_info(&mut self, program: ProgramHandle, index: usize) -> Option<UniformInfo> {
    self.interface(program)?.uniforms.get(index).cloned()
  }

  fn constant_block_count(&mut self, program: ProgramHandle) -> usize {
    self.interface(program).map_or(0, |i| i.blocks.len())
  }

  fn constant_block_info(&mut self, program: ProgramHandle, index: usize) -> Option<BlockInfo> {
    self
      .interface(program)?
      .blocks
      .get(index)
      .map(|(info, _)| info.clone())
  }

  fn constant_block_members(
    &mut self,
    program: ProgramHandle,
    index: usize,
  ) -> Vec<BlockMemberInfo> {
    self
      .interface(program)
      .and_then(|i| i.blocks.get(index))
      .map(|(_, members)| members.clone())
      .unwrap_or_default()
  }

  fn storage_block_count(&mut self, program: ProgramHandle) -> usize {
    self.interface(program).map_or(0, |i| i.storage_blocks.len())
  }

  fn storage_block_info(&mut self, program: ProgramHandle, index: usize) -> Option<BlockInfo> {
    self.interface(program)?.storage_blocks.get(index).cloned()
  }

  fn atomic_counter_block_count(&mut self, program: ProgramHandle) -> usize {
    self.interface(program).map_or(0, |i| i.atomic_counters.len())
  }

  fn atomic_counter_block_info(
    &mut self,
    program: ProgramHandle,
    index: usize,
  ) -> Option<BlockInfo> {
    self.interface(program)?.atomic_counters.get(index).cloned()
  }

  fn set_constant_value(
    &mut self,
    program: ProgramHandle,
    location: i32,
    ty: ShaderDataType,
    count: usize,
    data: &[u8],
    transpose: bool,
  ) {
    record!(
      self,
      "set_constant_value",
      program,
      location,
      ty,
      count,
      data,
      transpose
    );
  }

  fn program_set_constant_block(&mut self, program: ProgramHandle, block_index: u32, binding: u32) {
    record!(self, "program_set_constant_block", program, block_index, binding);
  }

  fn program_set_constant_buffer(&mut self, binding: u32, buffer: BufferHandle) {
    record!(self, "program_set_constant_buffer", binding, buffer);
  }

  fn program_set_storage_buffer(&mut self, binding: u32, buffer: BufferHandle) {
    record!(self, "program_set_storage_buffer", binding, buffer);
  }

  fn program_set_atomic_counter_buffer(&mut self, binding: u32, buffer: BufferHandle) {
    record!(self, "program_set_atomic_counter_buffer", binding, buffer);
  }

  fn create_program_pipeline(&mut self) -> Option<ProgramPipelineHandle> {
    record!(self, "create_program_pipeline");
    let handle = self.issue();
    self.objects.insert(handle);
    ProgramPipelineHandle::from_raw(handle)
  }

  fn set_program_stages(
    &mut self,
    pipeline: ProgramPipelineHandle,
    stages: ShaderStageFlags,
    program: Option<ProgramHandle>,
  ) {
    record!(self, "set_program_stages", pipeline, stages, program);
  }

  fn set_program_pipeline(&mut self, pipeline: Option<ProgramPipelineHandle>) {
    record!(self, "set_program_pipeline", pipeline);
  }

  fn release_program_pipeline(&mut self, pipeline: ProgramPipelineHandle) {
    record!(self, "release_program_pipeline", pipeline);
    self.objects.remove(&pipeline.raw());
  }

  fn create_input_assembler(
    &mut self,
    layout: &[AttribLayoutEntry],
    buffers: &[BufferHandle],
    strides: &[u32],
    offsets: &[u32],
    index_buffer: Option<BufferHandle>,
    patch_vertex_count: u32,
  ) -> Option<InputAssemblerHandle> {
    record!(
      self,
      "create_input_assembler",
      layout.len(),
      buffers,
      strides,
      offsets,
      index_buffer,
      patch_vertex_count
    );

    if buffers.iter().any(|b| !self.buffers.contains_key(&b.raw())) {
      return None;
    }

    let handle = self.issue();
    self.input_assemblers.insert(handle);
    InputAssemblerHandle::from_raw(handle)
  }

  fn set_input_assembler(
    &mut self,
    input_assembler: Option<InputAssemblerHandle>,
    program: Option<ProgramHandle>,
  ) -> bool {
    record!(self, "set_input_assembler", input_assembler, program);

    match input_assembler {
      Some(ia) => {
        self.input_assemblers.contains(&ia.raw())
          && program.map_or(false, |p| self.interface(p).is_some())
      }
      None => true,
    }
  }

  fn release_input_assembler(&mut self, input_assembler: InputAssemblerHandle) {
    record!(self, "release_input_assembler", input_assembler);
    self.input_assemblers.remove(&input_assembler.raw());
  }

  fn set_render_state(&mut self, enabled: bool, state: RenderStateFlag) {
    record!(self, "set_render_state", enabled, state);
  }

  fn set_blend_function(&mut self, args: BlendFunctionArgs) {
    record!(self, "set_blend_function", args);
  }

  fn set_blend_equation(&mut self, args: BlendEquationArgs) {
    record!(self, "set_blend_equation", args);
  }

  fn set_blend_barrier(&mut self) {
    record!(self, "set_blend_barrier");
  }

  fn set_depth_function(&mut self, function: Comparison) {
    record!(self, "set_depth_function", function);
  }

  fn set_viewport(&mut self, viewport: Rect) {
    record!(self, "set_viewport", viewport);
  }

  fn set_scissor_rect(&mut self, rect: Rect) {
    record!(self, "set_scissor_rect", rect);
  }

  fn set_clear_color(&mut self, color: [f32; 4]) {
    record!(self, "set_clear_color", color);
    self.clear_color = color;
  }

  fn set_color_writes(&mut self, enabled: bool) {
    record!(self, "set_color_writes", enabled);
  }

  fn set_stencil_function(&mut self, face: Face, args: StencilFunctionArgs) {
    record!(self, "set_stencil_function", face, args);
  }

  fn set_stencil_operation(&mut self, face: Face, args: StencilOperationArgs) {
    record!(self, "set_stencil_operation", face, args);
  }

  fn create_depth_stencil_state(
    &mut self,
    desc: &DepthStencilDesc,
  ) -> Option<DepthStencilStateHandle> {
    record!(self, "create_depth_stencil_state", desc);
    let handle = self.issue();
    self.objects.insert(handle);
    DepthStencilStateHandle::from_raw(handle)
  }

  fn set_depth_stencil_state(&mut self, state: DepthStencilStateHandle) {
    record!(self, "set_depth_stencil_state", state);
  }

  fn release_depth_stencil_state(&mut self, state: DepthStencilStateHandle) {
    record!(self, "release_depth_stencil_state", state);
    self.objects.remove(&state.raw());
  }

  fn create_rasterizer_state(&mut self, desc: &RasterizerDesc) -> Option<RasterizerStateHandle> {
    record!(self, "create_rasterizer_state", desc);
    let handle = self.issue();
    self.objects.insert(handle);
    RasterizerStateHandle::from_raw(handle)
  }

  fn set_rasterizer_state(&mut self, state: RasterizerStateHandle) {
    record!(self, "set_rasterizer_state", state);
  }

  fn release_rasterizer_state(&mut self, state: RasterizerStateHandle) {
    record!(self, "release_rasterizer_state", state);
    self.objects.remove(&state.raw());
  }

  fn clear(&mut self, flags: ClearFlags) {
    record!(self, "clear", flags);

    if flags.contains(ClearFlags::COLOR) {
      self.color_contents = self.clear_color;
    }
  }

  fn set_memory_barrier(&mut self, barriers: MemoryBarrierFlags) {
    record!(self, "set_memory_barrier", barriers);
  }

  fn draw(&mut self, mode: DrawMode, count: u32, offset: u32) {
    record!(self, "draw", mode, count, offset);
  }

  fn draw_indexed(&mut self, mode: DrawMode, count: u32, index_type: ComponentType, offset: u32) {
    record!(self, "draw_indexed", mode, count, index_type, offset);
  }

  fn draw_indirect(&mut self, mode: DrawMode, indirect: BufferHandle, offset: usize) {
    record!(self, "draw_indirect", mode, indirect, offset);
  }

  fn draw_indexed_indirect(
    &mut self,
    mode: DrawMode,
    index_type: ComponentType,
    indirect: BufferHandle,
    offset: usize,
  ) {
    record!(self, "draw_indexed_indirect", mode, index_type, indirect, offset);
  }

  fn dispatch_compute(&mut self, x: u32, y: u32, z: u32) {
    record!(self, "dispatch_compute", x, y, z);
  }

  fn create_query(&mut self) -> Option<QueryHandle> {
    record!(self, "create_query");
    let handle = self.issue();
    self.queries.insert(handle, (None, None));
    QueryHandle::from_raw(handle)
  }

  fn begin_query(&mut self, query: QueryHandle, ty: QueryType) {
    record!(self, "begin_query", query, ty);
    let now = self.log.len();

    if let Some(state) = self.queries.get_mut(&query.raw()) {
      *state = (Some(now), None);
    }
  }

  // Elapsed time is simulated as one microsecond per call received in between.
  fn end_query(&mut self, query: QueryHandle, ty: QueryType) {
    record!(self, "end_query", query, ty);
    let now = self.log.len();

    if let Some(state) = self.queries.get_mut(&query.raw()) {
      if let (Some(start), _) = *state {
        *state = (None, Some((now - start) as u64 * 1000));
      }
    }
  }

  fn query_timestamp(&mut self, query: QueryHandle) {
    record!(self, "query_timestamp", query);
    let now = self.log.len() as u64 * 1000;

    if let Some(state) = self.queries.get_mut(&query.raw()) {
      *state = (None, Some(now));
    }
  }

  fn query_result(&mut self, query: QueryHandle) -> Option<u64> {
    record!(self, "query_result", query);
    self.queries.get(&query.raw())?.1
  }

  fn release_query(&mut self, query: QueryHandle) {
    record!(self, "release_query", query);
    self.queries.remove(&query.raw());
  }

  fn create_sync(&mut self) -> Option<SyncHandle> {
    record!(self, "create_sync");
    let handle = self.issue();
    self.objects.insert(handle);
    SyncHandle::from_raw(handle)
  }

  fn wait_sync(&mut self, sync: SyncHandle) {
    record!(self, "wait_sync", sync);
  }

  fn release_sync(&mut self, sync: SyncHandle) {
    record!(self, "release_sync", sync);
    self.objects.remove(&sync.raw());
  }

  fn create_path_objects(&mut self, range: u32) -> Option<PathHandle> {
    record!(self, "create_path_objects", range);
    let first = self.next_handle;
    self.next_handle += u64::from(range);
    self.objects.insert(first);
    PathHandle::from_raw(first)
  }

  fn release_path_objects(&mut self, paths: PathHandle, range: u32) {
    record!(self, "release_path_objects", paths, range);
    self.objects.remove(&paths.raw());
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn records_calls() {
    let mut backend = NullBackend::new();
    let log = backend.call_log();

    backend.set_viewport(Rect::new(0, 0, 640, 480));
    backend.set_clear_color([1., 0., 0., 1.]);
    backend.set_viewport(Rect::new(0, 0, 320, 240));

    assert_eq!(
      log.names(),
      vec!["set_viewport", "set_clear_color", "set_viewport"]
    );
    assert_eq!(log.count("set_viewport"), 2);

    log.clear();
    assert!(log.calls().is_empty());
  }

  #[test]
  fn buffer_storage_and_mapping() {
    let mut backend = NullBackend::new();
    let buffer = backend
      .create_buffer(BufferBinding::Vertex, BufferUsage::Static, &[0; 8])
      .unwrap();

    backend.update_buffer(buffer, BufferBinding::Vertex, 2, &[1, 2]);

    let ptr = unsafe {
      backend.map_buffer(buffer, BufferBinding::Vertex, 0, 8, BufferAccess::READ)
    }
    .unwrap();
    let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 8) };
    assert_eq!(bytes, &[0, 0, 1, 2, 0, 0, 0, 0]);

    // mapping twice fails
    assert!(unsafe {
      backend.map_buffer(buffer, BufferBinding::Vertex, 0, 8, BufferAccess::READ)
    }
    .is_none());

    assert!(backend.unmap_buffer(buffer, BufferBinding::Vertex));
    assert!(!backend.unmap_buffer(buffer, BufferBinding::Vertex));

    // out of range
    assert!(unsafe {
      backend.map_buffer(buffer, BufferBinding::Vertex, 4, 8, BufferAccess::READ)
    }
    .is_none());
  }

  #[test]
  fn framebuffer_completeness() {
    let mut backend = NullBackend::new();
    let fb = backend.create_framebuffer().unwrap();
    assert_eq!(
      backend.framebuffer_status(fb),
      Err(IncompleteReason::MissingAttachment)
    );

    let color = backend.create_texture(TextureTarget::Texture2D).unwrap();
    backend.framebuffer_attach_texture(
      fb,
      Attachment::Color(0),
      color,
      TextureTarget::Texture2D,
      0,
      None,
    );

    // no storage yet
    assert_eq!(
      backend.framebuffer_status(fb),
      Err(IncompleteReason::IncompleteAttachment)
    );

    backend.set_texture_data_2d(color, 0, TextureFormat::RGBA8, 64, 64, None);
    assert_eq!(backend.framebuffer_status(fb), Ok(()));

    let depth = backend
      .create_render_buffer(TextureFormat::Depth24, 32, 32)
      .unwrap();
    backend.framebuffer_attach_render_buffer(fb, Attachment::Depth, depth);
    assert_eq!(
      backend.framebuffer_status(fb),
      Err(IncompleteReason::IncompleteDimensions)
    );

    backend.set_render_buffer_storage(depth, TextureFormat::Depth24, 64, 64);
    assert_eq!(backend.framebuffer_status(fb), Ok(()));

    backend.framebuffer_attach_render_buffer(fb, Attachment::Stencil, depth);
    assert_eq!(
      backend.framebuffer_status(fb),
      Err(IncompleteReason::IncompleteAttachment)
    );
  }

  #[test]
  fn error_directive_fails_compilation() {
    let mut backend = NullBackend::new();
    let log = backend
      .create_shader_stage(
        ShaderStage::Fragment,
        "void main() {}\n  #error unsupported material\n",
      )
      .unwrap_err();

    assert_eq!(log, "0:2: #error unsupported material");
  }

  #[test]
  fn link_introspects_sources() {
    let mut backend = NullBackend::new();
    let vs = backend
      .create_shader_stage(
        ShaderStage::Vertex,
        "in vec3 attr_pos; uniform mat4 mvp; void main() {}",
      )
      .unwrap();
    let fs = backend
      .create_shader_stage(
        ShaderStage::Fragment,
        "uniform mat4 mvp; uniform vec4 color; void main() {}",
      )
      .unwrap();
    let program = backend.create_program(false).unwrap();

    assert!(backend.link_program(program).is_err());

    backend.attach_shader_stage(program, vs);
    backend.attach_shader_stage(program, fs);
    backend.link_program(program).unwrap();

    assert_eq!(backend.attribute_count(program), 1);
    assert_eq!(backend.constant_count(program), 2);
    assert_eq!(backend.constant_info(program, 1).unwrap().name, "color");
  }

  #[test]
  fn read_back_cleared_color() {
    let mut backend = NullBackend::new();
    let mut out = [0; 8];

    backend.set_clear_color([1., 0., 0., 1.]);
    backend.clear(ClearFlags::COLOR);

    assert!(backend.read_pixels(Rect::new(0, 0, 2, 1), TextureFormat::RGBA8, &mut out));
    assert_eq!(out, [255, 0, 0, 255, 255, 0, 0, 255]);
  }
}
