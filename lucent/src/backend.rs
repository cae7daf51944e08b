//! Backend interface.
//!
//! A [`Backend`] is the single seam behind which a concrete GPU API lives. It exposes raw
//! create / release / bind / set operations keyed by the strongly-typed handles of [`handle`];
//! everything above it (resource objects, the render context, constant binding) is written once
//! against this trait.
//!
//! One backend instance is owned by one [`RenderContext`](crate::context::RenderContext) and is
//! selected at construction time: the `lucent-gl` crate picks its ES2, GL3 or GL4 profile from the
//! context version it obtained, and [`null::NullBackend`] runs anywhere.
//!
//! # Failure semantics
//!
//! Creation functions return `None` (the null handle) on failure; shader stage compilation and
//! program linking return the driver’s diagnostic text instead. Queries about optional features
//! the backend does not support return zero / `None`, never an error: absence of a capability is
//! “nothing found”.

pub mod handle;
pub mod null;

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
use handle::{
  BufferHandle, DepthStencilStateHandle, FramebufferHandle, InputAssemblerHandle, PathHandle,
  ProgramHandle, ProgramPipelineHandle, QueryHandle, RasterizerStateHandle, RenderBufferHandle,
  ShaderStageHandle, SyncHandle, TextureHandle,
};
use std::error;
use std::fmt;
use std::ptr::NonNull;

/// Driver state as read back when a context starts.
///
/// The render context seeds its hardware-property snapshot from this so that it starts accurate
/// without forcing redundant writes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DriverState {
  /// Clear color.
  pub clear_color: [f32; 4],
  /// Blend factors.
  pub blend_function: BlendFunctionArgs,
  /// Blend equations.
  pub blend_equation: BlendEquationArgs,
  /// Face culling toggle.
  pub culling_enabled: bool,
  /// Depth comparison.
  pub depth_function: Comparison,
  /// Blending toggle.
  pub blending_enabled: bool,
  /// Depth write toggle.
  pub depth_write_enabled: bool,
  /// Depth test toggle.
  pub depth_test_enabled: bool,
  /// Stencil test toggle.
  pub stencil_test_enabled: bool,
  /// Scissor test toggle.
  pub scissor_test_enabled: bool,
  /// Scissor rectangle.
  pub scissor_rect: Rect,
  /// Viewport.
  pub viewport: Rect,
  /// Color write mask, all channels at once.
  pub color_writes_enabled: bool,
  /// Multisample toggle.
  pub multisample_enabled: bool,
}

impl Default for DriverState {
  /// Initial OpenGL state.
  fn default() -> Self {
    DriverState {
      clear_color: [0., 0., 0., 0.],
      blend_function: BlendFunctionArgs::default(),
      blend_equation: BlendEquationArgs::default(),
      culling_enabled: false,
      depth_function: Comparison::Less,
      blending_enabled: false,
      depth_write_enabled: true,
      depth_test_enabled: false,
      stencil_test_enabled: false,
      scissor_test_enabled: false,
      scissor_rect: Rect::default(),
      viewport: Rect::default(),
      color_writes_enabled: true,
      multisample_enabled: true,
    }
  }
}

/// Error that might occur when reading back the driver state.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StateQueryError {
  /// The backend has no current context to read from.
  UnavailableState,
  /// Corrupted blending state.
  UnknownBlendingState(u8),
  /// Corrupted blending equation.
  UnknownBlendingEquation(u32),
  /// Corrupted blending source factor.
  UnknownBlendingSrcFactor(u32),
  /// Corrupted blending destination factor.
  UnknownBlendingDstFactor(u32),
  /// Corrupted depth test state.
  UnknownDepthTestState(u8),
  /// Corrupted depth comparison.
  UnknownDepthFunction(u32),
  /// Corrupted face culling state.
  UnknownFaceCullingState(u8),
}

impl fmt::Display for StateQueryError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      StateQueryError::UnavailableState => f.write_str("unavailable graphics state"),
      StateQueryError::UnknownBlendingState(s) => write!(f, "unknown blending state: {}", s),
      StateQueryError::UnknownBlendingEquation(e) => {
        write!(f, "unknown blending equation: {:#x}", e)
      }
      StateQueryError::UnknownBlendingSrcFactor(k) => {
        write!(f, "unknown blending source factor: {:#x}", k)
      }
      StateQueryError::UnknownBlendingDstFactor(k) => {
        write!(f, "unknown blending destination factor: {:#x}", k)
      }
      StateQueryError::UnknownDepthTestState(s) => write!(f, "unknown depth test state: {}", s),
      StateQueryError::UnknownDepthFunction(c) => write!(f, "unknown depth function: {:#x}", c),
      StateQueryError::UnknownFaceCullingState(s) => {
        write!(f, "unknown face culling state: {}", s)
      }
    }
  }
}

impl error::Error for StateQueryError {}

/// The GPU API contract.
///
/// All methods take `&mut self`: a backend is driven from a single thread, in call order. Passing
/// a handle that was not issued by this backend, or that was already released, is a programming
/// error; implementations may ignore such calls.
pub trait Backend: fmt::Debug {
  /// Profile this backend runs.
  fn profile(&self) -> BackendProfile;

  /// Version string of the underlying driver, as obtained (drivers may silently downgrade).
  fn version_string(&self) -> &str;

  /// Capability bits, probed once at construction.
  fn capabilities(&self) -> Capabilities;

  /// Numeric limits, probed once at construction.
  fn limits(&self) -> Limits;

  /// Read back every piece of state the render context tracks.
  fn query_driver_state(&mut self) -> Result<DriverState, StateQueryError>;

  // buffers

  /// Create a buffer and fill it with `data`.
  fn create_buffer(
    &mut self,
    binding: BufferBinding,
    usage: BufferUsage,
    data: &[u8],
  ) -> Option<BufferHandle>;

  /// Overwrite `data.len()` bytes of a buffer, starting at `offset`.
  fn update_buffer(
    &mut self,
    buffer: BufferHandle,
    binding: BufferBinding,
    offset: usize,
    data: &[u8],
  );

  /// Re-specify the whole storage of a buffer.
  fn resize_buffer(
    &mut self,
    buffer: BufferHandle,
    binding: BufferBinding,
    usage: BufferUsage,
    data: &[u8],
  );

  /// Map a byte range of a buffer into CPU-visible memory.
  ///
  /// # Safety
  ///
  /// The returned pointer is valid for `len` bytes until [`Backend::unmap_buffer`] or
  /// [`Backend::release_buffer`] is called on the same buffer, and no other call may touch the
  /// buffer’s storage in between.
  unsafe fn map_buffer(
    &mut self,
    buffer: BufferHandle,
    binding: BufferBinding,
    offset: usize,
    len: usize,
    access: BufferAccess,
  ) -> Option<NonNull<u8>>;

  /// Unmap a previously mapped buffer. Returns `false` if the content got corrupted while mapped.
  fn unmap_buffer(&mut self, buffer: BufferHandle, binding: BufferBinding) -> bool;

  /// Release a buffer.
  fn release_buffer(&mut self, buffer: BufferHandle);

  // textures

  /// Create a texture object for a given target.
  fn create_texture(&mut self, target: TextureTarget) -> Option<TextureHandle>;

  /// Specify one mip level of a 2D texture. `None` data allocates storage only.
  #[allow(clippy::too_many_arguments)]
  fn set_texture_data_2d(
    &mut self,
    texture: TextureHandle,
    level: u32,
    format: TextureFormat,
    width: u32,
    height: u32,
    data: Option<&[u8]>,
  );

  /// Allocate multisampled storage of a 2D texture.
  fn set_texture_storage_2d_multisample(
    &mut self,
    texture: TextureHandle,
    samples: u32,
    format: TextureFormat,
    width: u32,
    height: u32,
  );

  /// Specify one mip level of one face of a cube texture.
  #[allow(clippy::too_many_arguments)]
  fn set_texture_data_cube_face(
    &mut self,
    texture: TextureHandle,
    face: CubeFace,
    level: u32,
    format: TextureFormat,
    width: u32,
    height: u32,
    data: Option<&[u8]>,
  );

  /// Specify one mip level of a 2D texture array, all layers at once.
  #[allow(clippy::too_many_arguments)]
  fn set_texture_data_array(
    &mut self,
    texture: TextureHandle,
    level: u32,
    format: TextureFormat,
    width: u32,
    height: u32,
    layers: u32,
    data: Option<&[u8]>,
  );

  /// Set filtering and wrapping.
  fn set_sampler_params(
    &mut self,
    texture: TextureHandle,
    target: TextureTarget,
    params: &SamplerParams,
  );

  /// Generate the mip chain from level 0.
  fn generate_mipmaps(&mut self, texture: TextureHandle, target: TextureTarget);

  /// Bind a texture to a texture unit.
  fn bind_texture(&mut self, texture: TextureHandle, target: TextureTarget, unit: u32);

  /// Bind a texture level to an image unit for load / store.
  fn bind_image_texture(
    &mut self,
    texture: TextureHandle,
    unit: u32,
    level: u32,
    access: ImageAccess,
    format: TextureFormat,
  );

  /// Release a texture.
  fn release_texture(&mut self, texture: TextureHandle, target: TextureTarget);

  // render buffers

  /// Create a render buffer with storage.
  fn create_render_buffer(
    &mut self,
    format: TextureFormat,
    width: u32,
    height: u32,
  ) -> Option<RenderBufferHandle>;

  /// Re-specify the storage of a render buffer.
  fn set_render_buffer_storage(
    &mut self,
    render_buffer: RenderBufferHandle,
    format: TextureFormat,
    width: u32,
    height: u32,
  );

  /// Release a render buffer.
  fn release_render_buffer(&mut self, render_buffer: RenderBufferHandle);

  // framebuffers

  /// Create an empty framebuffer.
  fn create_framebuffer(&mut self) -> Option<FramebufferHandle>;

  /// Attach a texture level; `layer` selects a cube face index or an array layer.
  #[allow(clippy::too_many_arguments)]
  fn framebuffer_attach_texture(
    &mut self,
    framebuffer: FramebufferHandle,
    attachment: Attachment,
    texture: TextureHandle,
    target: TextureTarget,
    level: u32,
    layer: Option<u32>,
  );

  /// Attach a render buffer.
  fn framebuffer_attach_render_buffer(
    &mut self,
    framebuffer: FramebufferHandle,
    attachment: Attachment,
    render_buffer: RenderBufferHandle,
  );

  /// Detach whatever is attached at `attachment`.
  fn framebuffer_detach(&mut self, framebuffer: FramebufferHandle, attachment: Attachment);

  /// Check completeness.
  fn framebuffer_status(&mut self, framebuffer: FramebufferHandle)
    -> Result<(), IncompleteReason>;

  /// Bind a framebuffer as the draw target; `None` is the default framebuffer.
  fn set_render_target(&mut self, framebuffer: Option<FramebufferHandle>);

  /// Bind a framebuffer as the read target; `None` is the default framebuffer.
  fn set_read_target(&mut self, framebuffer: Option<FramebufferHandle>);

  /// Copy a region of the read target into the draw target.
  fn blit_framebuffer(&mut self, src: Rect, dst: Rect, flags: ClearFlags, filter: BlitFilter);

  /// Read back pixels of the read target. Returns `false` if nothing could be read.
  fn read_pixels(&mut self, rect: Rect, format: TextureFormat, out: &mut [u8]) -> bool;

  /// Release a framebuffer.
  fn release_framebuffer(&mut self, framebuffer: FramebufferHandle);

  // shaders and programs

  /// Compile one stage. On failure, returns the compiler log.
  fn create_shader_stage(
    &mut self,
    stage: ShaderStage,
    source: &str,
  ) -> Result<ShaderStageHandle, String>;

  /// Release a stage.
  fn release_shader_stage(&mut self, stage: ShaderStageHandle);

  /// Create an empty program.
  fn create_program(&mut self, separable: bool) -> Option<ProgramHandle>;

  /// Attach a compiled stage.
  fn attach_shader_stage(&mut self, program: ProgramHandle, stage: ShaderStageHandle);

  /// Detach a stage.
  fn detach_shader_stage(&mut self, program: ProgramHandle, stage: ShaderStageHandle);

  /// Link a program. On failure, returns the linker log.
  fn link_program(&mut self, program: ProgramHandle) -> Result<(), String>;

  /// Make a program current; `None` unbinds.
  fn set_active_program(&mut self, program: Option<ProgramHandle>);

  /// Release a program.
  fn release_program(&mut self, program: ProgramHandle);

  /// Number of active vertex attributes.
  fn attribute_count(&mut self, program: ProgramHandle) -> usize;

  /// Active vertex attribute by index.
  fn attribute_info(&mut self, program: ProgramHandle, index: usize) -> Option<AttributeInfo>;

  /// Number of active uniforms outside of blocks.
  fn constant_count(&mut self, program: ProgramHandle) -> usize;

  /// Active uniform by index.
  fn constant_info(&mut self, program: ProgramHandle, index: usize) -> Option<UniformInfo>;

  /// Number of active uniform blocks.
  fn constant_block_count(&mut self, program: ProgramHandle) -> usize;

  /// Active uniform block by index.
  fn constant_block_info(&mut self, program: ProgramHandle, index: usize) -> Option<BlockInfo>;

  /// Members of an active uniform block.
  fn constant_block_members(&mut self, program: ProgramHandle, index: usize)
    -> Vec<BlockMemberInfo>;

  /// Number of active storage blocks; zero without storage buffer support.
  fn storage_block_count(&mut self, _program: ProgramHandle) -> usize {
    0
  }

  /// Active storage block by index.
  fn storage_block_info(&mut self, _program: ProgramHandle, _index: usize) -> Option<BlockInfo> {
    None
  }

  /// Number of active atomic counter buffers; zero without atomic counter support.
  fn atomic_counter_block_count(&mut self, _program: ProgramHandle) -> usize {
    0
  }

  /// Active atomic counter buffer by index.
  fn atomic_counter_block_info(
    &mut self,
    _program: ProgramHandle,
    _index: usize,
  ) -> Option<BlockInfo> {
    None
  }

  /// Upload a uniform value.
  ///
  /// `data` holds `count` elements of `ty`, tightly packed, in native endianness. Booleans are
  /// 32-bit integers; samplers and images are 32-bit unit indices.
  #[allow(clippy::too_many_arguments)]
  fn set_constant_value(
    &mut self,
    program: ProgramHandle,
    location: i32,
    ty: ShaderDataType,
    count: usize,
    data: &[u8],
    transpose: bool,
  );

  /// Point a uniform block of a program at a buffer binding.
  fn program_set_constant_block(&mut self, program: ProgramHandle, block_index: u32, binding: u32);

  /// Bind a buffer to a uniform buffer binding.
  fn program_set_constant_buffer(&mut self, binding: u32, buffer: BufferHandle);

  /// Bind a buffer to a storage buffer binding.
  fn program_set_storage_buffer(&mut self, binding: u32, buffer: BufferHandle);

  /// Bind a buffer to an atomic counter buffer binding.
  fn program_set_atomic_counter_buffer(&mut self, binding: u32, buffer: BufferHandle);

  // program pipelines

  /// Create a program pipeline.
  fn create_program_pipeline(&mut self) -> Option<ProgramPipelineHandle>;

  /// Use the stages of a separable program in a pipeline; `None` clears them.
  fn set_program_stages(
    &mut self,
    pipeline: ProgramPipelineHandle,
    stages: ShaderStageFlags,
    program: Option<ProgramHandle>,
  );

  /// Make a pipeline current; `None` unbinds.
  fn set_program_pipeline(&mut self, pipeline: Option<ProgramPipelineHandle>);

  /// Release a pipeline.
  fn release_program_pipeline(&mut self, pipeline: ProgramPipelineHandle);

  // input assemblers

  /// Create an input assembler over vertex buffers and an optional index buffer.
  ///
  /// `strides` and `offsets` are per input slot, indexed like `buffers`.
  #[allow(clippy::too_many_arguments)]
  fn create_input_assembler(
    &mut self,
    layout: &[AttribLayoutEntry],
    buffers: &[BufferHandle],
    strides: &[u32],
    offsets: &[u32],
    index_buffer: Option<BufferHandle>,
    patch_vertex_count: u32,
  ) -> Option<InputAssemblerHandle>;

  /// Bind an input assembler for the given program; `None` unbinds. Returns `false` if the
  /// assembler could not be bound.
  fn set_input_assembler(
    &mut self,
    input_assembler: Option<InputAssemblerHandle>,
    program: Option<ProgramHandle>,
  ) -> bool;

  /// Release an input assembler.
  fn release_input_assembler(&mut self, input_assembler: InputAssemblerHandle);

  // pipeline state

  /// Toggle a boolean pipeline state.
  fn set_render_state(&mut self, enabled: bool, state: RenderStateFlag);

  /// Set the blend factors.
  fn set_blend_function(&mut self, args: BlendFunctionArgs);

  /// Set the blend equations.
  fn set_blend_equation(&mut self, args: BlendEquationArgs);

  /// Insert a blend barrier, for non-coherent advanced blending.
  fn set_blend_barrier(&mut self);

  /// Set the depth comparison.
  fn set_depth_function(&mut self, function: Comparison);

  /// Set the viewport.
  fn set_viewport(&mut self, viewport: Rect);

  /// Set the scissor rectangle.
  fn set_scissor_rect(&mut self, rect: Rect);

  /// Set the clear color.
  fn set_clear_color(&mut self, color: [f32; 4]);

  /// Enable or disable writes to every color channel.
  fn set_color_writes(&mut self, enabled: bool);

  /// Set the stencil function of one face.
  fn set_stencil_function(&mut self, face: Face, args: StencilFunctionArgs);

  /// Set the stencil operations of one face.
  fn set_stencil_operation(&mut self, face: Face, args: StencilOperationArgs);

  /// Create a depth / stencil state object.
  fn create_depth_stencil_state(
    &mut self,
    desc: &DepthStencilDesc,
  ) -> Option<DepthStencilStateHandle>;

  /// Apply a depth / stencil state object.
  fn set_depth_stencil_state(&mut self, state: DepthStencilStateHandle);

  /// Release a depth / stencil state object.
  fn release_depth_stencil_state(&mut self, state: DepthStencilStateHandle);

  /// Create a rasterizer state object.
  fn create_rasterizer_state(&mut self, desc: &RasterizerDesc) -> Option<RasterizerStateHandle>;

  /// Apply a rasterizer state object.
  fn set_rasterizer_state(&mut self, state: RasterizerStateHandle);

  /// Release a rasterizer state object.
  fn release_rasterizer_state(&mut self, state: RasterizerStateHandle);

  // draw

  /// Clear buffers of the current render target.
  fn clear(&mut self, flags: ClearFlags);

  /// Order GPU memory accesses.
  fn set_memory_barrier(&mut self, barriers: MemoryBarrierFlags);

  /// Array draw.
  fn draw(&mut self, mode: DrawMode, count: u32, offset: u32);

  /// Indexed draw; `offset` is in indices.
  fn draw_indexed(&mut self, mode: DrawMode, count: u32, index_type: ComponentType, offset: u32);

  /// Array draw with arguments sourced from a buffer.
  fn draw_indirect(&mut self, mode: DrawMode, indirect: BufferHandle, offset: usize);

  /// Indexed draw with arguments sourced from a buffer.
  fn draw_indexed_indirect(
    &mut self,
    mode: DrawMode,
    index_type: ComponentType,
    indirect: BufferHandle,
    offset: usize,
  );

  /// Launch compute work groups with the active program.
  fn dispatch_compute(&mut self, x: u32, y: u32, z: u32);

  // queries, syncs and paths

  /// Create a query object.
  fn create_query(&mut self) -> Option<QueryHandle>;

  /// Start a query.
  fn begin_query(&mut self, query: QueryHandle, ty: QueryType);

  /// End a query.
  fn end_query(&mut self, query: QueryHandle, ty: QueryType);

  /// Record a GPU timestamp into a query.
  fn query_timestamp(&mut self, query: QueryHandle);

  /// Result of a query, or `None` if not available yet.
  fn query_result(&mut self, query: QueryHandle) -> Option<u64>;

  /// Release a query.
  fn release_query(&mut self, query: QueryHandle);

  /// Insert a fence into the command stream.
  fn create_sync(&mut self) -> Option<SyncHandle>;

  /// Make the GPU wait for a fence.
  fn wait_sync(&mut self, sync: SyncHandle);

  /// Release a fence.
  fn release_sync(&mut self, sync: SyncHandle);

  /// Reserve a contiguous range of path objects.
  fn create_path_objects(&mut self, _range: u32) -> Option<PathHandle> {
    None
  }

  /// Release a range of path objects.
  fn release_path_objects(&mut self, _paths: PathHandle, _range: u32) {}
}
