//! The OpenGL backend type.

use crate::convert::buffer_target;
use crate::input_assembler::InputAssembler;
use crate::state::{get_driver_state, GlState};
use crate::{buffer, framebuffer, input_assembler, pipeline, query, shader, texture};
use gl::types::*;
use lucent::backend::handle::{
  BufferHandle, DepthStencilStateHandle, FramebufferHandle, HandleAllocator,
  InputAssemblerHandle, PathHandle, ProgramHandle, ProgramPipelineHandle, QueryHandle,
  RasterizerStateHandle, RenderBufferHandle, ShaderStageHandle, SyncHandle, TextureHandle,
};
use lucent::backend::{Backend, DriverState, StateQueryError};
use lucent::blending::{BlendEquationArgs, BlendFunctionArgs};
use lucent::buffer::{BufferAccess, BufferBinding, BufferUsage};
use lucent::capabilities::{Capabilities, Limits};
use lucent::component::ComponentType;
use lucent::depth_stencil::{Comparison, Face, StencilFunctionArgs, StencilOperationArgs};
use lucent::framebuffer::{Attachment, BlitFilter, IncompleteReason};
use lucent::input_assembler::{AttribLayoutEntry, DrawMode};
use lucent::pixel::TextureFormat;
use lucent::query::QueryType;
use lucent::render_state::{
  ClearFlags, DepthStencilDesc, MemoryBarrierFlags, RasterizerDesc, Rect, RenderStateFlag,
};
use lucent::shader::{
  AttributeInfo, BlockInfo, BlockMemberInfo, ShaderDataType, ShaderStage, ShaderStageFlags,
  UniformInfo,
};
use lucent::texture::{CubeFace, ImageAccess, SamplerParams, TextureTarget};
use lucent::version::{BackendProfile, GlVersion};
use std::collections::HashMap;
use std::ffi::CStr;
use std::fmt;
use std::mem;
use std::os::raw::{c_char, c_void};
use std::ptr::NonNull;

/// Entry points of extensions the generated bindings do not carry.
pub(crate) struct Extensions {
  pub(crate) blend_barrier: Option<unsafe extern "system" fn()>,
  pub(crate) gen_paths: Option<unsafe extern "system" fn(GLsizei) -> GLuint>,
  pub(crate) delete_paths: Option<unsafe extern "system" fn(GLuint, GLsizei)>,
}

impl Extensions {
  unsafe fn load<F>(mut loader: F) -> Self
  where
    F: FnMut(&str) -> *const c_void,
  {
    let mut lookup = |names: &[&str]| {
      names
        .iter()
        .map(|name| loader(name))
        .find(|ptr| !ptr.is_null())
    };

    Extensions {
      blend_barrier: lookup(&["glBlendBarrierKHR", "glBlendBarrierNV", "glBlendBarrier"])
        .map(|ptr| mem::transmute::<*const c_void, unsafe extern "system" fn()>(ptr)),
      gen_paths: lookup(&["glGenPathsNV"]).map(|ptr| {
        mem::transmute::<*const c_void, unsafe extern "system" fn(GLsizei) -> GLuint>(ptr)
      }),
      delete_paths: lookup(&["glDeletePathsNV"]).map(|ptr| {
        mem::transmute::<*const c_void, unsafe extern "system" fn(GLuint, GLsizei)>(ptr)
      }),
    }
  }
}

impl fmt::Debug for Extensions {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    f.debug_struct("Extensions")
      .field("blend_barrier", &self.blend_barrier.is_some())
      .field("path_rendering", &self.gen_paths.is_some())
      .finish()
  }
}

/// OpenGL backend.
///
/// One type covers OpenGL ES 2.0 up to OpenGL 4.x; the [`BackendProfile`] picked from the version
/// the driver hands out selects the code paths.
///
/// This type is `!Send` and `!Sync`: it drives the context current on the thread it was created
/// on.
#[derive(Debug)]
pub struct GlBackend {
  pub(crate) profile: BackendProfile,
  pub(crate) version: GlVersion,
  version_string: String,
  pub(crate) capabilities: Capabilities,
  limits: Limits,
  pub(crate) state: GlState,
  pub(crate) extensions: Extensions,
  // identifiers of objects OpenGL has no names for
  pub(crate) ids: HandleAllocator,
  pub(crate) input_assemblers: HashMap<InputAssemblerHandle, InputAssembler>,
  pub(crate) enabled_arrays: Vec<GLuint>,
  pub(crate) depth_stencil_states: HashMap<DepthStencilStateHandle, DepthStencilDesc>,
  pub(crate) rasterizer_states: HashMap<RasterizerStateHandle, RasterizerDesc>,
  pub(crate) syncs: HashMap<SyncHandle, GLsync>,
  pub(crate) color_attachments: HashMap<GLuint, Vec<u32>>,
}

impl GlBackend {
  /// Load the OpenGL entry points with `loader` and probe the current context.
  ///
  /// `loader` maps a symbol name (e.g. `"glClear"`) to its address, as windowing libraries expose
  /// it.
  ///
  /// # Safety
  ///
  /// An OpenGL context must be current on the calling thread, and stay current for as long as the
  /// backend is used.
  pub unsafe fn load_with<F>(mut loader: F) -> Result<Self, StateQueryError>
  where
    F: FnMut(&str) -> *const c_void,
  {
    gl::load_with(|name| loader(name));
    let extensions = Extensions::load(&mut loader);

    let version_string = get_string(gl::VERSION).ok_or(StateQueryError::UnavailableState)?;
    let version = GlVersion::parse(&version_string).ok_or_else(|| {
      log::error!("cannot make sense of the driver version {:?}", version_string);
      StateQueryError::UnavailableState
    })?;
    let profile = BackendProfile::from_version(version);

    let extension_names = get_extensions();
    let capabilities = Capabilities::probe(version, &extension_names);
    let limits = get_limits(profile, capabilities);

    log::info!(
      "OpenGL backend on {} ({:?}, {} extensions)",
      version_string,
      profile,
      extension_names.len()
    );
    log::debug!("{:?}", capabilities);
    log::debug!("{:?}", limits);

    // tightly packed pixel rows on both ways
    gl::PixelStorei(gl::UNPACK_ALIGNMENT, 1);
    gl::PixelStorei(gl::PACK_ALIGNMENT, 1);

    if !version.is_es() && version.is_at_least(3, 2) {
      gl::Enable(gl::TEXTURE_CUBE_MAP_SEAMLESS);
    }

    Ok(GlBackend {
      profile,
      version,
      version_string,
      capabilities,
      limits,
      state: GlState::new(limits.max_texture_units),
      extensions,
      ids: HandleAllocator::new(),
      input_assemblers: HashMap::new(),
      enabled_arrays: Vec::new(),
      depth_stencil_states: HashMap::new(),
      rasterizer_states: HashMap::new(),
      syncs: HashMap::new(),
      color_attachments: HashMap::new(),
    })
  }

  /// Version obtained from the driver.
  pub fn version(&self) -> GlVersion {
    self.version
  }

  /// ES2 code paths: unsized formats, no separate read / draw framebuffers.
  pub(crate) fn is_legacy(&self) -> bool {
    self.profile == BackendProfile::Es2
  }
}

unsafe fn get_string(name: GLenum) -> Option<String> {
  let ptr = gl::GetString(name);

  if ptr.is_null() {
    None
  } else {
    Some(
      CStr::from_ptr(ptr as *const c_char)
        .to_string_lossy()
        .into_owned(),
    )
  }
}

unsafe fn get_extensions() -> Vec<String> {
  if gl::GetStringi::is_loaded() {
    let mut count: GLint = 0;
    gl::GetIntegerv(gl::NUM_EXTENSIONS, &mut count);

    // ES2 drivers may export the entry point without supporting the indexed query
    if count > 0 {
      return (0..count as GLuint)
        .filter_map(|i| {
          let ptr = gl::GetStringi(gl::EXTENSIONS, i);
          (!ptr.is_null()).then(|| {
            CStr::from_ptr(ptr as *const c_char)
              .to_string_lossy()
              .into_owned()
          })
        })
        .collect();
    }
  }

  get_string(gl::EXTENSIONS)
    .map(|all| all.split_whitespace().map(str::to_owned).collect())
    .unwrap_or_default()
}

unsafe fn get_integer(name: GLenum) -> u32 {
  let mut value: GLint = 0;
  gl::GetIntegerv(name, &mut value);
  value.max(0) as u32
}

unsafe fn get_limits(profile: BackendProfile, capabilities: Capabilities) -> Limits {
  let defaults = Limits::default();
  let es2 = profile == BackendProfile::Es2;

  Limits {
    max_texture_units: get_integer(gl::MAX_COMBINED_TEXTURE_IMAGE_UNITS)
      .max(defaults.max_texture_units),
    max_constant_buffer_units: if capabilities.is_constant_buffer_supported() {
      get_integer(gl::MAX_UNIFORM_BUFFER_BINDINGS)
    } else {
      0
    },
    max_draw_buffers: if es2 {
      1
    } else {
      get_integer(gl::MAX_DRAW_BUFFERS).max(1)
    },
    max_samples: if es2 {
      1
    } else {
      get_integer(gl::MAX_SAMPLES).max(1)
    },
    max_texture_size: get_integer(gl::MAX_TEXTURE_SIZE).max(defaults.max_texture_size),
  }
}

impl Backend for GlBackend {
  fn profile(&self) -> BackendProfile {
    self.profile
  }

  fn version_string(&self) -> &str {
    &self.version_string
  }

  fn capabilities(&self) -> Capabilities {
    self.capabilities
  }

  fn limits(&self) -> Limits {
    self.limits
  }

  fn query_driver_state(&mut self) -> Result<DriverState, StateQueryError> {
    unsafe { get_driver_state(self.version.is_es()) }
  }

  fn create_buffer(
    &mut self,
    binding: BufferBinding,
    usage: BufferUsage,
    data: &[u8],
  ) -> Option<BufferHandle> {
    unsafe { buffer::create(self, binding, usage, data) }
  }

  fn update_buffer(
    &mut self,
    buffer: BufferHandle,
    binding: BufferBinding,
    offset: usize,
    data: &[u8],
  ) {
    unsafe { buffer::update(self, buffer, binding, offset, data) }
  }

  fn resize_buffer(
    &mut self,
    buffer: BufferHandle,
    binding: BufferBinding,
    usage: BufferUsage,
    data: &[u8],
  ) {
    unsafe { buffer::resize(self, buffer, binding, usage, data) }
  }

  unsafe fn map_buffer(
    &mut self,
    buffer: BufferHandle,
    binding: BufferBinding,
    offset: usize,
    len: usize,
    access: BufferAccess,
  ) -> Option<NonNull<u8>> {
    buffer::map(self, buffer, binding, offset, len, access)
  }

  fn unmap_buffer(&mut self, buffer: BufferHandle, binding: BufferBinding) -> bool {
    unsafe { buffer::unmap(self, buffer, binding) }
  }

  fn release_buffer(&mut self, buffer: BufferHandle) {
    unsafe { buffer::release(self, buffer) }
  }

  fn create_texture(&mut self, target: TextureTarget) -> Option<TextureHandle> {
    unsafe { texture::create(self, target) }
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
    unsafe { texture::set_data_2d(self, texture, level, format, width, height, data) }
  }

  fn set_texture_storage_2d_multisample(
    &mut self,
    texture: TextureHandle,
    samples: u32,
    format: TextureFormat,
    width: u32,
    height: u32,
  ) {
    unsafe { texture::set_storage_2d_multisample(self, texture, samples, format, width, height) }
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
    unsafe { texture::set_data_cube_face(self, texture, face, level, format, width, height, data) }
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
    unsafe { texture::set_data_array(self, texture, level, format, width, height, layers, data) }
  }

  fn set_sampler_params(
    &mut self,
    texture: TextureHandle,
    target: TextureTarget,
    params: &SamplerParams,
  ) {
    unsafe { texture::set_sampler_params(self, texture, target, params) }
  }

  fn generate_mipmaps(&mut self, texture: TextureHandle, target: TextureTarget) {
    unsafe { texture::generate_mipmaps(self, texture, target) }
  }

  fn bind_texture(&mut self, texture: TextureHandle, target: TextureTarget, unit: u32) {
    unsafe { texture::bind(self, texture, target, unit) }
  }

  fn bind_image_texture(
    &mut self,
    texture: TextureHandle,
    unit: u32,
    level: u32,
    access: ImageAccess,
    format: TextureFormat,
  ) {
    unsafe { texture::bind_image(self, texture, unit, level, access, format) }
  }

  fn release_texture(&mut self, texture: TextureHandle, _target: TextureTarget) {
    unsafe { texture::release(self, texture) }
  }

  fn create_render_buffer(
    &mut self,
    format: TextureFormat,
    width: u32,
    height: u32,
  ) -> Option<RenderBufferHandle> {
    unsafe { texture::create_render_buffer(self, format, width, height) }
  }

  fn set_render_buffer_storage(
    &mut self,
    render_buffer: RenderBufferHandle,
    format: TextureFormat,
    width: u32,
    height: u32,
  ) {
    unsafe { texture::set_render_buffer_storage(self, render_buffer, format, width, height) }
  }

  fn release_render_buffer(&mut self, render_buffer: RenderBufferHandle) {
    unsafe { texture::release_render_buffer(self, render_buffer) }
  }

  fn create_framebuffer(&mut self) -> Option<FramebufferHandle> {
    unsafe { framebuffer::create() }
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
    unsafe {
      framebuffer::attach_texture(self, framebuffer, attachment, texture, target, level, layer)
    }
  }

  fn framebuffer_attach_render_buffer(
    &mut self,
    framebuffer: FramebufferHandle,
    attachment: Attachment,
    render_buffer: RenderBufferHandle,
  ) {
    unsafe { framebuffer::attach_render_buffer(self, framebuffer, attachment, render_buffer) }
  }

  fn framebuffer_detach(&mut self, framebuffer: FramebufferHandle, attachment: Attachment) {
    unsafe { framebuffer::detach(self, framebuffer, attachment) }
  }

  fn framebuffer_status(
    &mut self,
    framebuffer: FramebufferHandle,
  ) -> Result<(), IncompleteReason> {
    unsafe { framebuffer::status(self, framebuffer) }
  }

  fn set_render_target(&mut self, framebuffer: Option<FramebufferHandle>) {
    unsafe { framebuffer::set_render_target(self, framebuffer) }
  }

  fn set_read_target(&mut self, framebuffer: Option<FramebufferHandle>) {
    unsafe { framebuffer::set_read_target(self, framebuffer) }
  }

  fn blit_framebuffer(&mut self, src: Rect, dst: Rect, flags: ClearFlags, filter: BlitFilter) {
    unsafe { framebuffer::blit(self, src, dst, flags, filter) }
  }

  fn read_pixels(&mut self, rect: Rect, format: TextureFormat, out: &mut [u8]) -> bool {
    unsafe { framebuffer::read_pixels(self, rect, format, out) }
  }

  fn release_framebuffer(&mut self, framebuffer: FramebufferHandle) {
    unsafe { framebuffer::release(self, framebuffer) }
  }

  fn create_shader_stage(
    &mut self,
    stage: ShaderStage,
    source: &str,
  ) -> Result<ShaderStageHandle, String> {
    unsafe { shader::create_stage(stage, source) }
  }

  fn release_shader_stage(&mut self, stage: ShaderStageHandle) {
    unsafe { shader::release_stage(stage) }
  }

  fn create_program(&mut self, separable: bool) -> Option<ProgramHandle> {
    unsafe { shader::create_program(separable && self.capabilities.is_program_pipeline_supported()) }
  }

  fn attach_shader_stage(&mut self, program: ProgramHandle, stage: ShaderStageHandle) {
    unsafe { shader::attach_stage(program, stage) }
  }

  fn detach_shader_stage(&mut self, program: ProgramHandle, stage: ShaderStageHandle) {
    unsafe { shader::detach_stage(program, stage) }
  }

  fn link_program(&mut self, program: ProgramHandle) -> Result<(), String> {
    unsafe { shader::link(program) }
  }

  fn set_active_program(&mut self, program: Option<ProgramHandle>) {
    unsafe { shader::set_active(self, program) }
  }

  fn release_program(&mut self, program: ProgramHandle) {
    unsafe {
      input_assembler::forget_program(self, program);
      shader::release_program(self, program);
    }
  }

  fn attribute_count(&mut self, program: ProgramHandle) -> usize {
    unsafe { shader::attribute_count(program) }
  }

  fn attribute_info(&mut self, program: ProgramHandle, index: usize) -> Option<AttributeInfo> {
    unsafe { shader::attribute_info(program, index) }
  }

  fn constant_count(&mut self, program: ProgramHandle) -> usize {
    unsafe { shader::constant_count(self, program) }
  }

  fn constant_info(&mut self, program: ProgramHandle, index: usize) -> Option<UniformInfo> {
    unsafe { shader::constant_info(self, program, index) }
  }

  fn constant_block_count(&mut self, program: ProgramHandle) -> usize {
    unsafe { shader::constant_block_count(self, program) }
  }

  fn constant_block_info(&mut self, program: ProgramHandle, index: usize) -> Option<BlockInfo> {
    unsafe { shader::constant_block_info(self, program, index) }
  }

  fn constant_block_members(
    &mut self,
    program: ProgramHandle,
    index: usize,
  ) -> Vec<BlockMemberInfo> {
    unsafe { shader::constant_block_members(self, program, index) }
  }

  fn storage_block_count(&mut self, program: ProgramHandle) -> usize {
    unsafe { shader::storage_block_count(self, program) }
  }

  fn storage_block_info(&mut self, program: ProgramHandle, index: usize) -> Option<BlockInfo> {
    unsafe { shader::storage_block_info(self, program, index) }
  }

  fn atomic_counter_block_count(&mut self, program: ProgramHandle) -> usize {
    unsafe { shader::atomic_counter_block_count(self, program) }
  }

  fn atomic_counter_block_info(
    &mut self,
    program: ProgramHandle,
    index: usize,
  ) -> Option<BlockInfo> {
    unsafe { shader::atomic_counter_block_info(self, program, index) }
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
    unsafe { shader::set_constant_value(self, program, location, ty, count, data, transpose) }
  }

  fn program_set_constant_block(&mut self, program: ProgramHandle, block_index: u32, binding: u32) {
    unsafe { shader::set_constant_block(program, block_index, binding) }
  }

  fn program_set_constant_buffer(&mut self, binding: u32, buffer: BufferHandle) {
    let target = buffer_target(BufferBinding::Constant);
    unsafe { shader::bind_buffer_base(self, target, binding, buffer) }
  }

  fn program_set_storage_buffer(&mut self, binding: u32, buffer: BufferHandle) {
    let target = buffer_target(BufferBinding::Storage);
    unsafe { shader::bind_buffer_base(self, target, binding, buffer) }
  }

  fn program_set_atomic_counter_buffer(&mut self, binding: u32, buffer: BufferHandle) {
    let target = buffer_target(BufferBinding::AtomicCounter);
    unsafe { shader::bind_buffer_base(self, target, binding, buffer) }
  }

  fn create_program_pipeline(&mut self) -> Option<ProgramPipelineHandle> {
    unsafe { shader::create_pipeline() }
  }

  fn set_program_stages(
    &mut self,
    pipeline: ProgramPipelineHandle,
    stages: ShaderStageFlags,
    program: Option<ProgramHandle>,
  ) {
    unsafe { shader::set_program_stages(pipeline, stages, program) }
  }

  fn set_program_pipeline(&mut self, pipeline: Option<ProgramPipelineHandle>) {
    unsafe { shader::set_pipeline(self, pipeline) }
  }

  fn release_program_pipeline(&mut self, pipeline: ProgramPipelineHandle) {
    unsafe { shader::release_pipeline(pipeline) }
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
    input_assembler::create(
      self,
      layout,
      buffers,
      strides,
      offsets,
      index_buffer,
      patch_vertex_count,
    )
  }

  fn set_input_assembler(
    &mut self,
    input_assembler: Option<InputAssemblerHandle>,
    program: Option<ProgramHandle>,
  ) -> bool {
    unsafe { input_assembler::set(self, input_assembler, program) }
  }

  fn release_input_assembler(&mut self, input_assembler: InputAssemblerHandle) {
    unsafe { input_assembler::release(self, input_assembler) }
  }

  fn set_render_state(&mut self, enabled: bool, state: RenderStateFlag) {
    unsafe { pipeline::set_render_state(self, enabled, state) }
  }

  fn set_blend_function(&mut self, args: BlendFunctionArgs) {
    unsafe { pipeline::set_blend_function(args) }
  }

  fn set_blend_equation(&mut self, args: BlendEquationArgs) {
    unsafe { pipeline::set_blend_equation(args) }
  }

  fn set_blend_barrier(&mut self) {
    unsafe { pipeline::set_blend_barrier(self) }
  }

  fn set_depth_function(&mut self, function: Comparison) {
    unsafe { pipeline::set_depth_function(function) }
  }

  fn set_viewport(&mut self, viewport: Rect) {
    unsafe { pipeline::set_viewport(viewport) }
  }

  fn set_scissor_rect(&mut self, rect: Rect) {
    unsafe { pipeline::set_scissor_rect(rect) }
  }

  fn set_clear_color(&mut self, color: [f32; 4]) {
    unsafe { pipeline::set_clear_color(color) }
  }

  fn set_color_writes(&mut self, enabled: bool) {
    unsafe { pipeline::set_color_writes(enabled) }
  }

  fn set_stencil_function(&mut self, face: Face, args: StencilFunctionArgs) {
    unsafe { pipeline::set_stencil_function(face, args) }
  }

  fn set_stencil_operation(&mut self, face: Face, args: StencilOperationArgs) {
    unsafe { pipeline::set_stencil_operation(face, args) }
  }

  fn create_depth_stencil_state(
    &mut self,
    desc: &DepthStencilDesc,
  ) -> Option<DepthStencilStateHandle> {
    pipeline::create_depth_stencil_state(self, desc)
  }

  fn set_depth_stencil_state(&mut self, state: DepthStencilStateHandle) {
    unsafe { pipeline::set_depth_stencil_state(self, state) }
  }

  fn release_depth_stencil_state(&mut self, state: DepthStencilStateHandle) {
    pipeline::release_depth_stencil_state(self, state)
  }

  fn create_rasterizer_state(&mut self, desc: &RasterizerDesc) -> Option<RasterizerStateHandle> {
    pipeline::create_rasterizer_state(self, desc)
  }

  fn set_rasterizer_state(&mut self, state: RasterizerStateHandle) {
    unsafe { pipeline::set_rasterizer_state(self, state) }
  }

  fn release_rasterizer_state(&mut self, state: RasterizerStateHandle) {
    pipeline::release_rasterizer_state(self, state)
  }

  fn clear(&mut self, flags: ClearFlags) {
    unsafe { pipeline::clear(flags) }
  }

  fn set_memory_barrier(&mut self, barriers: MemoryBarrierFlags) {
    unsafe { pipeline::set_memory_barrier(barriers) }
  }

  fn draw(&mut self, mode: DrawMode, count: u32, offset: u32) {
    unsafe { pipeline::draw(mode, count, offset) }
  }

  fn draw_indexed(&mut self, mode: DrawMode, count: u32, index_type: ComponentType, offset: u32) {
    unsafe { pipeline::draw_indexed(mode, count, index_type, offset) }
  }

  fn draw_indirect(&mut self, mode: DrawMode, indirect: BufferHandle, offset: usize) {
    unsafe { pipeline::draw_indirect(self, mode, indirect, offset) }
  }

  fn draw_indexed_indirect(
    &mut self,
    mode: DrawMode,
    index_type: ComponentType,
    indirect: BufferHandle,
    offset: usize,
  ) {
    unsafe { pipeline::draw_indexed_indirect(self, mode, index_type, indirect, offset) }
  }

  fn dispatch_compute(&mut self, x: u32, y: u32, z: u32) {
    unsafe { pipeline::dispatch_compute(x, y, z) }
  }

  fn create_query(&mut self) -> Option<QueryHandle> {
    unsafe { query::create() }
  }

  fn begin_query(&mut self, query: QueryHandle, ty: QueryType) {
    unsafe { query::begin(query, ty) }
  }

  fn end_query(&mut self, _query: QueryHandle, ty: QueryType) {
    unsafe { query::end(ty) }
  }

  fn query_timestamp(&mut self, query: QueryHandle) {
    unsafe { query::timestamp(query) }
  }

  fn query_result(&mut self, query: QueryHandle) -> Option<u64> {
    unsafe { query::result(query) }
  }

  fn release_query(&mut self, query: QueryHandle) {
    unsafe { query::release(query) }
  }

  fn create_sync(&mut self) -> Option<SyncHandle> {
    unsafe { query::create_sync(self) }
  }

  fn wait_sync(&mut self, sync: SyncHandle) {
    unsafe { query::wait_sync(self, sync) }
  }

  fn release_sync(&mut self, sync: SyncHandle) {
    unsafe { query::release_sync(self, sync) }
  }

  fn create_path_objects(&mut self, range: u32) -> Option<PathHandle> {
    unsafe { query::create_paths(self, range) }
  }

  fn release_path_objects(&mut self, paths: PathHandle, range: u32) {
    unsafe { query::release_paths(self, paths, range) }
  }
}
