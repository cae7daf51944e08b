//! Render context.
//!
//! The [`RenderContext`] is the single façade through which GPU objects are created, draws are
//! issued and explicit state is mutated.
//!
//! # Hardware properties
//!
//! The context keeps a [`HardwareProperties`] snapshot of the state it pushed to the driver. The
//! snapshot is seeded from the driver at construction, and every setter compares against it:
//! setting a property to its current value is a no-op, and a change issues exactly one backend
//! call. [`RenderContext::push_property_set`] and [`RenderContext::pop_property_set`] save and
//! restore the snapshot around nested renders.
//!
//! # Resources
//!
//! Resources are returned as `Rc`s and own their backend handle; dropping the last reference
//! releases it. The context only keeps weak lookup entries, by handle and, for named buffers and
//! shader programs, by name. Every resource must be dropped before the context: leaks are
//! reported when the context goes away.

use crate::backend::handle::{
  BufferHandle, DepthStencilStateHandle, FramebufferHandle, InputAssemblerHandle, PathHandle,
  ProgramHandle, ProgramPipelineHandle, QueryHandle, RasterizerStateHandle, RenderBufferHandle,
  SyncHandle, TextureHandle,
};
use crate::backend::{Backend, DriverState, StateQueryError};
use crate::blending::{BlendEquationArgs, BlendFunctionArgs};
use crate::buffer::{
  AtomicCounterBuffer, BufferUsage, ConstantBuffer, DrawIndirectBuffer, IndexBuffer,
  StorageBuffer, VertexBuffer,
};
use crate::capabilities::{Capabilities, Limits};
use crate::component::ComponentType;
use crate::depth_stencil::Comparison;
use crate::framebuffer::{BlitFilter, FrameBuffer};
use crate::input_assembler::{AttribLayout, DrawMode, InputAssembler};
use crate::linear::{mul44, M44};
use crate::pixel::TextureFormat;
use crate::program_pipeline::ProgramPipeline;
use crate::query::{Fence, PathObjects, TimerQuery};
use crate::registry::Registry;
use crate::render_buffer::RenderBuffer;
use crate::render_state::{
  ClearFlags, CullMode, DepthStencilDesc, DepthStencilState, MemoryBarrierFlags, RasterizerDesc,
  RasterizerState, Rect, RenderStateFlag,
};
use crate::shader::program::{ProgramType, ShaderProgram, ShaderSources};
use crate::shader::{ShaderDataType, ShaderError};
use crate::texture::{ImageAccess, Image2D, Texture2D, Texture2DArray, TextureCube, TextureError};
use crate::version::BackendProfile;
use bytemuck::Pod;
use log::{debug, error, warn};
use std::cell::{RefCell, RefMut};
use std::error;
use std::fmt;
use std::rc::Rc;

/// Errors when creating a resource.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResourceError {
  /// The backend lacks the capability the resource needs.
  Unsupported(&'static str),
  /// The backend returned a null handle.
  CreationFailed(&'static str),
  /// A live resource is already registered under that name.
  NameInUse(String),
  /// Invalid creation parameters.
  InvalidArgument(String),
}

impl ResourceError {
  pub(crate) fn creation_failed(kind: &'static str) -> Self {
    error!("backend returned a null {} handle", kind);
    ResourceError::CreationFailed(kind)
  }
}

impl fmt::Display for ResourceError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      ResourceError::Unsupported(what) => write!(f, "unsupported: {}", what),
      ResourceError::CreationFailed(what) => write!(f, "cannot create {}", what),
      ResourceError::NameInUse(ref name) => write!(f, "name already in use: {}", name),
      ResourceError::InvalidArgument(ref reason) => write!(f, "invalid argument: {}", reason),
    }
  }
}

impl error::Error for ResourceError {}

/// Errors when drawing or dispatching. The backend is never reached when one occurs.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DrawError {
  /// No input assembler is bound.
  NoInputAssembler,
  /// No shader is active, neither directly nor through a program pipeline.
  NoShader,
  /// A shader input is not fed by the input assembler layout.
  MissingAttribute(String),
  /// A shader input and its layout entry disagree on the number of components.
  AttributeComponentCount {
    /// Attribute name.
    name: String,
    /// Components the shader reads.
    expected: usize,
    /// Components the layout provides.
    found: u32,
  },
  /// An integer shader input is fed floating-point data.
  AttributeType {
    /// Attribute name.
    name: String,
    /// Shader type.
    ty: ShaderDataType,
    /// Layout component type.
    component_type: ComponentType,
  },
  /// A dispatch with a graphics program.
  NotCompute(String),
  /// The backend refused to bind the input assembler.
  InputAssemblerRejected,
}

impl fmt::Display for DrawError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      DrawError::NoInputAssembler => f.write_str("no input assembler bound"),
      DrawError::NoShader => f.write_str("no active shader"),
      DrawError::MissingAttribute(ref name) => {
        write!(f, "attribute {} missing from the input layout", name)
      }
      DrawError::AttributeComponentCount {
        ref name,
        expected,
        found,
      } => write!(
        f,
        "attribute {} reads {} components, the layout provides {}",
        name, expected, found
      ),
      DrawError::AttributeType {
        ref name,
        ty,
        component_type,
      } => write!(
        f,
        "attribute {} of type {:?} cannot be fed {:?} components",
        name, ty, component_type
      ),
      DrawError::NotCompute(ref name) => write!(f, "{} is not a compute program", name),
      DrawError::InputAssemblerRejected => f.write_str("input assembler rejected by the backend"),
    }
  }
}

impl error::Error for DrawError {}

/// Every piece of GPU state the context tracks explicitly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HardwareProperties {
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
  /// Color writes toggle.
  pub color_writes_enabled: bool,
  /// Multisample toggle.
  pub multisample_enabled: bool,
  /// Bound framebuffer; `None` is the default framebuffer.
  pub render_target: Option<FramebufferHandle>,
  /// Input assembler used by the next draw.
  pub input_assembler: Option<InputAssemblerHandle>,
  /// Active shader program.
  pub active_shader: Option<ProgramHandle>,
  /// Active program pipeline.
  pub active_program_pipeline: Option<ProgramPipelineHandle>,
}

impl HardwareProperties {
  fn from_driver(driver: DriverState) -> Self {
    HardwareProperties {
      clear_color: driver.clear_color,
      blend_function: driver.blend_function,
      blend_equation: driver.blend_equation,
      culling_enabled: driver.culling_enabled,
      depth_function: driver.depth_function,
      blending_enabled: driver.blending_enabled,
      depth_write_enabled: driver.depth_write_enabled,
      depth_test_enabled: driver.depth_test_enabled,
      stencil_test_enabled: driver.stencil_test_enabled,
      scissor_test_enabled: driver.scissor_test_enabled,
      scissor_rect: driver.scissor_rect,
      viewport: driver.viewport,
      color_writes_enabled: driver.color_writes_enabled,
      multisample_enabled: driver.multisample_enabled,
      render_target: None,
      input_assembler: None,
      active_shader: None,
      active_program_pipeline: None,
    }
  }
}

// Properties backed by driver state. The input assembler is not one of them: it is bound right
// before each draw and unbound right after.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Property {
  ClearColor,
  BlendFunction,
  BlendEquation,
  Culling,
  DepthFunction,
  Blending,
  DepthWrite,
  DepthTest,
  StencilTest,
  ScissorTest,
  ScissorRect,
  Viewport,
  ColorWrites,
  Multisample,
  RenderTarget,
  ActiveShader,
  ActiveProgramPipeline,
}

impl Property {
  const ALL: [Property; 17] = [
    Property::ClearColor,
    Property::BlendFunction,
    Property::BlendEquation,
    Property::Culling,
    Property::DepthFunction,
    Property::Blending,
    Property::DepthWrite,
    Property::DepthTest,
    Property::StencilTest,
    Property::ScissorTest,
    Property::ScissorRect,
    Property::Viewport,
    Property::ColorWrites,
    Property::Multisample,
    Property::RenderTarget,
    Property::ActiveShader,
    Property::ActiveProgramPipeline,
  ];

  fn differs(self, a: &HardwareProperties, b: &HardwareProperties) -> bool {
    match self {
      Property::ClearColor => a.clear_color != b.clear_color,
      Property::BlendFunction => a.blend_function != b.blend_function,
      Property::BlendEquation => a.blend_equation != b.blend_equation,
      Property::Culling => a.culling_enabled != b.culling_enabled,
      Property::DepthFunction => a.depth_function != b.depth_function,
      Property::Blending => a.blending_enabled != b.blending_enabled,
      Property::DepthWrite => a.depth_write_enabled != b.depth_write_enabled,
      Property::DepthTest => a.depth_test_enabled != b.depth_test_enabled,
      Property::StencilTest => a.stencil_test_enabled != b.stencil_test_enabled,
      Property::ScissorTest => a.scissor_test_enabled != b.scissor_test_enabled,
      Property::ScissorRect => a.scissor_rect != b.scissor_rect,
      Property::Viewport => a.viewport != b.viewport,
      Property::ColorWrites => a.color_writes_enabled != b.color_writes_enabled,
      Property::Multisample => a.multisample_enabled != b.multisample_enabled,
      Property::RenderTarget => a.render_target != b.render_target,
      Property::ActiveShader => a.active_shader != b.active_shader,
      Property::ActiveProgramPipeline => a.active_program_pipeline != b.active_program_pipeline,
    }
  }

  fn write(self, backend: &mut dyn Backend, p: &HardwareProperties) {
    match self {
      Property::ClearColor => backend.set_clear_color(p.clear_color),
      Property::BlendFunction => backend.set_blend_function(p.blend_function),
      Property::BlendEquation => backend.set_blend_equation(p.blend_equation),
      Property::Culling => backend.set_render_state(p.culling_enabled, RenderStateFlag::CullFace),
      Property::DepthFunction => backend.set_depth_function(p.depth_function),
      Property::Blending => backend.set_render_state(p.blending_enabled, RenderStateFlag::Blend),
      Property::DepthWrite => {
        backend.set_render_state(p.depth_write_enabled, RenderStateFlag::DepthWrite)
      }
      Property::DepthTest => {
        backend.set_render_state(p.depth_test_enabled, RenderStateFlag::DepthTest)
      }
      Property::StencilTest => {
        backend.set_render_state(p.stencil_test_enabled, RenderStateFlag::StencilTest)
      }
      Property::ScissorTest => {
        backend.set_render_state(p.scissor_test_enabled, RenderStateFlag::ScissorTest)
      }
      Property::ScissorRect => backend.set_scissor_rect(p.scissor_rect),
      Property::Viewport => backend.set_viewport(p.viewport),
      Property::ColorWrites => backend.set_color_writes(p.color_writes_enabled),
      Property::Multisample => {
        backend.set_render_state(p.multisample_enabled, RenderStateFlag::Multisample)
      }
      Property::RenderTarget => backend.set_render_target(p.render_target),
      Property::ActiveShader => backend.set_active_program(p.active_shader),
      Property::ActiveProgramPipeline => backend.set_program_pipeline(p.active_program_pipeline),
    }
  }
}

#[derive(Debug)]
struct StateTracker {
  props: HardwareProperties,
  stack: Vec<HardwareProperties>,
  next_texture_unit: u32,
  next_constant_buffer_unit: u32,
}

// Weak lookup tables of every live resource.
#[derive(Debug)]
pub(crate) struct Registries {
  pub(crate) vertex_buffers: Registry<BufferHandle, VertexBuffer>,
  pub(crate) index_buffers: Registry<BufferHandle, IndexBuffer>,
  pub(crate) constant_buffers: Registry<BufferHandle, ConstantBuffer>,
  pub(crate) storage_buffers: Registry<BufferHandle, StorageBuffer>,
  pub(crate) atomic_counter_buffers: Registry<BufferHandle, AtomicCounterBuffer>,
  pub(crate) draw_indirect_buffers: Registry<BufferHandle, DrawIndirectBuffer>,
  pub(crate) textures_2d: Registry<TextureHandle, Texture2D>,
  pub(crate) texture_arrays: Registry<TextureHandle, Texture2DArray>,
  pub(crate) texture_cubes: Registry<TextureHandle, TextureCube>,
  pub(crate) images: Registry<TextureHandle, Image2D>,
  pub(crate) render_buffers: Registry<RenderBufferHandle, RenderBuffer>,
  pub(crate) framebuffers: Registry<FramebufferHandle, FrameBuffer>,
  pub(crate) shader_programs: Registry<ProgramHandle, ShaderProgram>,
  pub(crate) program_pipelines: Registry<ProgramPipelineHandle, ProgramPipeline>,
  pub(crate) input_assemblers: Registry<InputAssemblerHandle, InputAssembler>,
  pub(crate) depth_stencil_states: Registry<DepthStencilStateHandle, DepthStencilState>,
  pub(crate) rasterizer_states: Registry<RasterizerStateHandle, RasterizerState>,
  pub(crate) queries: Registry<QueryHandle, TimerQuery>,
  pub(crate) fences: Registry<SyncHandle, Fence>,
  pub(crate) paths: Registry<PathHandle, PathObjects>,
}

impl Registries {
  fn new() -> Self {
    Registries {
      vertex_buffers: Registry::new(),
      index_buffers: Registry::new(),
      constant_buffers: Registry::new(),
      storage_buffers: Registry::new(),
      atomic_counter_buffers: Registry::new(),
      draw_indirect_buffers: Registry::new(),
      textures_2d: Registry::new(),
      texture_arrays: Registry::new(),
      texture_cubes: Registry::new(),
      images: Registry::new(),
      render_buffers: Registry::new(),
      framebuffers: Registry::new(),
      shader_programs: Registry::new(),
      program_pipelines: Registry::new(),
      input_assemblers: Registry::new(),
      depth_stencil_states: Registry::new(),
      rasterizer_states: Registry::new(),
      queries: Registry::new(),
      fences: Registry::new(),
      paths: Registry::new(),
    }
  }

  // Number of live resources per kind, for kinds that have any.
  fn live(&self) -> Vec<(&'static str, usize)> {
    [
      ("vertex buffer", self.vertex_buffers.len()),
      ("index buffer", self.index_buffers.len()),
      ("constant buffer", self.constant_buffers.len()),
      ("storage buffer", self.storage_buffers.len()),
      ("atomic counter buffer", self.atomic_counter_buffers.len()),
      ("draw indirect buffer", self.draw_indirect_buffers.len()),
      ("2D texture", self.textures_2d.len()),
      ("texture array", self.texture_arrays.len()),
      ("cube texture", self.texture_cubes.len()),
      ("image", self.images.len()),
      ("render buffer", self.render_buffers.len()),
      ("framebuffer", self.framebuffers.len()),
      ("shader program", self.shader_programs.len()),
      ("program pipeline", self.program_pipelines.len()),
      ("input assembler", self.input_assemblers.len()),
      ("depth stencil state", self.depth_stencil_states.len()),
      ("rasterizer state", self.rasterizer_states.len()),
      ("timer query", self.queries.len()),
      ("fence", self.fences.len()),
      ("path object range", self.paths.len()),
    ]
    .into_iter()
    .filter(|&(_, count)| count > 0)
    .collect()
  }
}

// State shared by the context and every resource it created.
pub(crate) struct ContextCore {
  backend: RefCell<Box<dyn Backend>>,
  profile: BackendProfile,
  capabilities: Capabilities,
  limits: Limits,
  state: RefCell<StateTracker>,
  registry: RefCell<Registries>,
}

impl fmt::Debug for ContextCore {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    f.debug_struct("ContextCore")
      .field("profile", &self.profile)
      .field("capabilities", &self.capabilities)
      .finish_non_exhaustive()
  }
}

impl ContextCore {
  pub(crate) fn backend(&self) -> RefMut<'_, Box<dyn Backend>> {
    self.backend.borrow_mut()
  }

  pub(crate) fn registry(&self) -> RefMut<'_, Registries> {
    self.registry.borrow_mut()
  }

  pub(crate) fn capabilities(&self) -> Capabilities {
    self.capabilities
  }

  pub(crate) fn limits(&self) -> Limits {
    self.limits
  }

  fn props(&self) -> HardwareProperties {
    self.state.borrow().props
  }

  // Apply `f` to the snapshot and issue one backend call if `property` changed.
  fn update(&self, property: Property, f: impl FnOnce(&mut HardwareProperties)) {
    let props = {
      let mut state = self.state.borrow_mut();
      let before = state.props;
      f(&mut state.props);

      if !property.differs(&before, &state.props) {
        return;
      }

      state.props
    };

    property.write(&mut **self.backend(), &props);
  }

  fn pop_properties(&self, force: bool) {
    let (before, after) = {
      let mut state = self.state.borrow_mut();

      match state.stack.pop() {
        Some(top) => {
          let before = state.props;
          state.props = top;
          (before, top)
        }

        None => {
          error!("property set popped from an empty stack");
          return;
        }
      }
    };

    let mut backend = self.backend();
    for property in Property::ALL {
      if force || property.differs(&before, &after) {
        property.write(&mut **backend, &after);
      }
    }
  }

  pub(crate) fn make_shader_active(&self, program: ProgramHandle) {
    self.update(Property::ActiveShader, |p| p.active_shader = Some(program));
  }

  // Unit 0 is reserved for uploads; wraps back to 1.
  pub(crate) fn next_texture_unit(&self) -> u32 {
    let max = self.limits.max_texture_units;
    let mut state = self.state.borrow_mut();
    let unit = state.next_texture_unit;
    state.next_texture_unit += 1;

    if unit < max {
      return unit;
    }

    if max <= 1 {
      error!("{} texture unit(s) leave none besides the reserved unit 0", max);
      return 1;
    }

    warn!(
      "more textures bound in one draw than the {} available units, wrapping around",
      max
    );

    1 + (unit - 1) % (max - 1)
  }

  pub(crate) fn next_constant_buffer_unit(&self) -> u32 {
    let max = self.limits.max_constant_buffer_units;
    let mut state = self.state.borrow_mut();
    let unit = state.next_constant_buffer_unit;
    state.next_constant_buffer_unit += 1;

    if unit < max {
      return unit;
    }

    warn!(
      "more constant buffers bound in one draw than the {} available units, wrapping around",
      max
    );

    if max > 0 {
      unit % max
    } else {
      0
    }
  }

  fn reset_units(&self) {
    let mut state = self.state.borrow_mut();
    state.next_texture_unit = 1;
    state.next_constant_buffer_unit = 0;
  }

  // The resource behind a tracked handle is going away: clear it from the snapshot and from every
  // stacked snapshot, unbinding it from the driver if it is bound.
  fn forget<H>(
    &self,
    handle: H,
    field: impl Fn(&mut HardwareProperties) -> &mut Option<H>,
    property: Option<Property>,
  ) where
    H: Copy + PartialEq,
  {
    let bound = {
      let mut state = self.state.borrow_mut();

      for props in &mut state.stack {
        let slot = field(props);
        if *slot == Some(handle) {
          *slot = None;
        }
      }

      let slot = field(&mut state.props);
      let bound = *slot == Some(handle);
      if bound {
        *slot = None;
      }

      bound
    };

    if let (true, Some(property)) = (bound, property) {
      property.write(&mut **self.backend(), &self.props());
    }
  }

  pub(crate) fn forget_render_target(&self, framebuffer: FramebufferHandle) {
    self.forget(
      framebuffer,
      |p| &mut p.render_target,
      Some(Property::RenderTarget),
    );
  }

  pub(crate) fn forget_shader(&self, program: ProgramHandle) {
    self.forget(
      program,
      |p| &mut p.active_shader,
      Some(Property::ActiveShader),
    );
  }

  pub(crate) fn forget_program_pipeline(&self, pipeline: ProgramPipelineHandle) {
    self.forget(
      pipeline,
      |p| &mut p.active_program_pipeline,
      Some(Property::ActiveProgramPipeline),
    );
  }

  pub(crate) fn forget_input_assembler(&self, input_assembler: InputAssemblerHandle) {
    self.forget(input_assembler, |p| &mut p.input_assembler, None);
  }
}

/// Compose a projection with the scale and translation mapping `virtual_viewport` onto
/// `actual_viewport`.
///
/// Renders a scene authored for one logical viewport correctly into a physically different one.
/// Equal viewports give back `projection`. If either viewport is degenerate, an error is logged
/// and `projection` is returned unchanged.
pub fn apply_virtual_viewport_to_projection_matrix(
  projection: &M44,
  actual_viewport: Rect,
  virtual_viewport: Rect,
) -> M44 {
  if actual_viewport.is_degenerate() || virtual_viewport.is_degenerate() {
    error!(
      "degenerate viewport ({:?} / {:?}) in virtual viewport mapping",
      actual_viewport, virtual_viewport
    );
    return *projection;
  }

  if actual_viewport == virtual_viewport {
    return *projection;
  }

  let (aw, ah) = (actual_viewport.width as f32, actual_viewport.height as f32);
  let sx = virtual_viewport.width as f32 / aw;
  let sy = virtual_viewport.height as f32 / ah;
  let tx = sx - 1. + 2. * (virtual_viewport.x - actual_viewport.x) as f32 / aw;
  let ty = sy - 1. + 2. * (virtual_viewport.y - actual_viewport.y) as f32 / ah;

  let remap = [
    [sx, 0., 0., 0.],
    [0., sy, 0., 0.],
    [0., 0., 1., 0.],
    [tx, ty, 0., 1.],
  ];

  mul44(&remap, projection)
}

macro_rules! lookup {
  ($(#[$doc:meta])* $fn:ident, $registry:ident, $handle:ty, $res:ty) => {
    $(#[$doc])*
    pub fn $fn(&self, handle: $handle) -> Option<Rc<$res>> {
      self.core.registry().$registry.get(handle)
    }
  };
}

macro_rules! toggle {
  ($(#[$doc:meta])* $get:ident, $set:ident, $field:ident, $property:ident) => {
    $(#[$doc])*
    pub fn $get(&self) -> bool {
      self.core.props().$field
    }

    $(#[$doc])*
    pub fn $set(&self, enabled: bool) {
      self.core.update(Property::$property, |p| p.$field = enabled);
    }
  };
}

/// The render context.
#[derive(Debug)]
pub struct RenderContext {
  core: Rc<ContextCore>,
}

impl RenderContext {
  /// Create a context driving `backend`. The hardware-property snapshot is seeded from the driver.
  pub fn new(mut backend: Box<dyn Backend>) -> Result<Self, StateQueryError> {
    let driver = backend.query_driver_state()?;
    let profile = backend.profile();
    let capabilities = backend.capabilities();
    let limits = backend.limits();

    debug!(
      "render context on {:?} backend ({}), {:?}",
      profile,
      backend.version_string(),
      capabilities
    );

    let core = ContextCore {
      backend: RefCell::new(backend),
      profile,
      capabilities,
      limits,
      state: RefCell::new(StateTracker {
        props: HardwareProperties::from_driver(driver),
        stack: Vec::new(),
        next_texture_unit: 1,
        next_constant_buffer_unit: 0,
      }),
      registry: RefCell::new(Registries::new()),
    };

    Ok(RenderContext {
      core: Rc::new(core),
    })
  }

  /// Profile of the backend.
  pub fn backend_profile(&self) -> BackendProfile {
    self.core.profile
  }

  /// Version string the backend obtained from the driver.
  pub fn version_string(&self) -> String {
    self.core.backend().version_string().to_owned()
  }

  /// Capability bits of the backend.
  pub fn capabilities(&self) -> Capabilities {
    self.core.capabilities
  }

  /// Numeric limits of the backend.
  pub fn limits(&self) -> Limits {
    self.core.limits
  }

  // resource creation

  /// Create a vertex buffer.
  pub fn create_vertex_buffer<T>(
    &self,
    usage: BufferUsage,
    data: &[T],
    stride: u32,
  ) -> Result<Rc<VertexBuffer>, ResourceError>
  where
    T: Pod,
  {
    let vb = Rc::new(VertexBuffer::new(
      self.core.clone(),
      usage,
      bytemuck::cast_slice(data),
      stride,
    )?);
    self
      .core
      .registry()
      .vertex_buffers
      .insert(vb.handle(), None, &vb);
    Ok(vb)
  }

  /// Create an index buffer. `component_type` must be an index type.
  pub fn create_index_buffer<T>(
    &self,
    usage: BufferUsage,
    component_type: ComponentType,
    data: &[T],
  ) -> Result<Rc<IndexBuffer>, ResourceError>
  where
    T: Pod,
  {
    let ib = Rc::new(IndexBuffer::new(
      self.core.clone(),
      usage,
      component_type,
      bytemuck::cast_slice(data),
    )?);
    self
      .core
      .registry()
      .index_buffers
      .insert(ib.handle(), None, &ib);
    Ok(ib)
  }

  fn check_name_free(&self, name: &str, in_use: bool) -> Result<(), ResourceError> {
    if in_use {
      error!("a live buffer is already named {}", name);
      Err(ResourceError::NameInUse(name.to_owned()))
    } else {
      Ok(())
    }
  }

  /// Create the constant buffer backing the uniform blocks named `name`.
  pub fn create_constant_buffer(
    &self,
    name: &str,
    usage: BufferUsage,
    data: &[u8],
  ) -> Result<Rc<ConstantBuffer>, ResourceError> {
    if !self.core.capabilities.is_constant_buffer_supported() {
      return Err(ResourceError::Unsupported("constant buffers"));
    }

    let in_use = self.core.registry().constant_buffers.find(name).is_some();
    self.check_name_free(name, in_use)?;

    let cb = Rc::new(ConstantBuffer::new(self.core.clone(), name, usage, data)?);
    self
      .core
      .registry()
      .constant_buffers
      .insert(cb.handle(), Some(name), &cb);
    Ok(cb)
  }

  /// Create the storage buffer backing the storage blocks named `name`.
  pub fn create_storage_buffer(
    &self,
    name: &str,
    usage: BufferUsage,
    data: &[u8],
  ) -> Result<Rc<StorageBuffer>, ResourceError> {
    if !self.core.capabilities.is_storage_buffer_supported() {
      return Err(ResourceError::Unsupported("storage buffers"));
    }

    let in_use = self.core.registry().storage_buffers.find(name).is_some();
    self.check_name_free(name, in_use)?;

    let sb = Rc::new(StorageBuffer::new(self.core.clone(), name, usage, data)?);
    self
      .core
      .registry()
      .storage_buffers
      .insert(sb.handle(), Some(name), &sb);
    Ok(sb)
  }

  /// Create an atomic counter buffer named `name`.
  pub fn create_atomic_counter_buffer(
    &self,
    name: &str,
    usage: BufferUsage,
    data: &[u8],
  ) -> Result<Rc<AtomicCounterBuffer>, ResourceError> {
    if !self.core.capabilities.is_atomic_counter_buffer_supported() {
      return Err(ResourceError::Unsupported("atomic counter buffers"));
    }

    let in_use = self
      .core
      .registry()
      .atomic_counter_buffers
      .find(name)
      .is_some();
    self.check_name_free(name, in_use)?;

    let ab = Rc::new(AtomicCounterBuffer::new(
      self.core.clone(),
      name,
      usage,
      data,
    )?);
    self
      .core
      .registry()
      .atomic_counter_buffers
      .insert(ab.handle(), Some(name), &ab);
    Ok(ab)
  }

  /// Create a buffer of indirect draw arguments.
  pub fn create_draw_indirect_buffer(
    &self,
    usage: BufferUsage,
    data: &[u8],
  ) -> Result<Rc<DrawIndirectBuffer>, ResourceError> {
    if !self.core.capabilities.is_compute_supported() {
      return Err(ResourceError::Unsupported("indirect draws"));
    }

    let db = Rc::new(DrawIndirectBuffer::new(self.core.clone(), usage, data)?);
    self
      .core
      .registry()
      .draw_indirect_buffers
      .insert(db.handle(), None, &db);
    Ok(db)
  }

  /// Create an empty 2D texture.
  pub fn create_texture_2d(&self) -> Result<Rc<Texture2D>, ResourceError> {
    let texture = Rc::new(Texture2D::new(self.core.clone())?);
    self
      .core
      .registry()
      .textures_2d
      .insert(texture.handle(), None, &texture);
    Ok(texture)
  }

  /// Create a multisampled 2D texture with storage.
  pub fn create_texture_2d_multisample(
    &self,
    samples: u32,
    format: TextureFormat,
    width: u32,
    height: u32,
  ) -> Result<Rc<Texture2D>, ResourceError> {
    let texture = Rc::new(Texture2D::new_multisample(
      self.core.clone(),
      samples,
      format,
      width,
      height,
    )?);
    self
      .core
      .registry()
      .textures_2d
      .insert(texture.handle(), None, &texture);
    Ok(texture)
  }

  /// Create an empty 2D texture array.
  pub fn create_texture_2d_array(&self) -> Result<Rc<Texture2DArray>, ResourceError> {
    let texture = Rc::new(Texture2DArray::new(self.core.clone())?);
    self
      .core
      .registry()
      .texture_arrays
      .insert(texture.handle(), None, &texture);
    Ok(texture)
  }

  /// Create an empty cube texture.
  pub fn create_texture_cube(&self) -> Result<Rc<TextureCube>, ResourceError> {
    let texture = Rc::new(TextureCube::new(self.core.clone())?);
    self
      .core
      .registry()
      .texture_cubes
      .insert(texture.handle(), None, &texture);
    Ok(texture)
  }

  /// View a level of a 2D texture as a load / store image. A texture has at most one image: if
  /// one is alive, it is returned.
  pub fn create_image_2d(
    &self,
    texture: &Rc<Texture2D>,
    level: u32,
    access: ImageAccess,
  ) -> Result<Rc<Image2D>, ResourceError> {
    let existing = self.core.registry().images.get(texture.handle());
    if let Some(image) = existing {
      return Ok(image);
    }

    let image = Rc::new(Image2D::new(
      self.core.clone(),
      texture.clone(),
      level,
      access,
    )?);
    self
      .core
      .registry()
      .images
      .insert(texture.handle(), None, &image);
    Ok(image)
  }

  /// Create a render buffer.
  pub fn create_render_buffer(
    &self,
    format: TextureFormat,
    width: u32,
    height: u32,
  ) -> Result<Rc<RenderBuffer>, ResourceError> {
    let rb = Rc::new(RenderBuffer::new(self.core.clone(), format, width, height)?);
    self
      .core
      .registry()
      .render_buffers
      .insert(rb.handle(), None, &rb);
    Ok(rb)
  }

  /// Create an empty framebuffer.
  pub fn create_framebuffer(&self) -> Result<Rc<FrameBuffer>, ResourceError> {
    let fb = Rc::new(FrameBuffer::new(self.core.clone())?);
    self
      .core
      .registry()
      .framebuffers
      .insert(fb.handle(), None, &fb);
    Ok(fb)
  }

  /// Create an input assembler. `offsets` are per vertex buffer; missing ones are `0`.
  pub fn create_input_assembler(
    &self,
    layout: AttribLayout,
    vertex_buffers: &[Rc<VertexBuffer>],
    offsets: &[u32],
    index_buffer: Option<&Rc<IndexBuffer>>,
    patch_vertex_count: u32,
  ) -> Result<Rc<InputAssembler>, ResourceError> {
    let ia = Rc::new(InputAssembler::new(
      self.core.clone(),
      layout,
      vertex_buffers,
      offsets,
      index_buffer,
      patch_vertex_count,
    )?);
    self
      .core
      .registry()
      .input_assemblers
      .insert(ia.handle(), None, &ia);
    Ok(ia)
  }

  /// Compile and link a graphics program under a logical name.
  ///
  /// If a live program was already compiled under that name, it is returned and the sources are
  /// ignored.
  pub fn compile_source(
    &self,
    name: &str,
    sources: &ShaderSources,
  ) -> Result<Rc<ShaderProgram>, ShaderError> {
    let cached = self.core.registry().shader_programs.find(name);
    if let Some(program) = cached {
      return Ok(program);
    }

    let program = Rc::new(ShaderProgram::compile(self.core.clone(), name, sources)?);
    self
      .core
      .registry()
      .shader_programs
      .insert(program.handle(), Some(name), &program);
    Ok(program)
  }

  /// Compile and link a compute program under a logical name, with the same caching as
  /// [`RenderContext::compile_source`].
  pub fn compile_compute_source(
    &self,
    name: &str,
    source: &str,
  ) -> Result<Rc<ShaderProgram>, ShaderError> {
    let cached = self.core.registry().shader_programs.find(name);
    if let Some(program) = cached {
      return Ok(program);
    }

    let program = Rc::new(ShaderProgram::compile_compute(
      self.core.clone(),
      name,
      source,
    )?);
    self
      .core
      .registry()
      .shader_programs
      .insert(program.handle(), Some(name), &program);
    Ok(program)
  }

  /// Create an empty program pipeline.
  pub fn create_program_pipeline(&self) -> Result<Rc<ProgramPipeline>, ResourceError> {
    let pipeline = Rc::new(ProgramPipeline::new(self.core.clone())?);
    self
      .core
      .registry()
      .program_pipelines
      .insert(pipeline.handle(), None, &pipeline);
    Ok(pipeline)
  }

  /// Create a depth / stencil state object.
  pub fn create_depth_stencil_state(
    &self,
    desc: DepthStencilDesc,
  ) -> Result<Rc<DepthStencilState>, ResourceError> {
    let handle = self
      .core
      .backend()
      .create_depth_stencil_state(&desc)
      .ok_or_else(|| ResourceError::creation_failed("depth stencil state"))?;

    let state = Rc::new(DepthStencilState::new(self.core.clone(), handle, desc));
    self
      .core
      .registry()
      .depth_stencil_states
      .insert(handle, None, &state);
    Ok(state)
  }

  /// Create a rasterizer state object.
  pub fn create_rasterizer_state(
    &self,
    desc: RasterizerDesc,
  ) -> Result<Rc<RasterizerState>, ResourceError> {
    let handle = self
      .core
      .backend()
      .create_rasterizer_state(&desc)
      .ok_or_else(|| ResourceError::creation_failed("rasterizer state"))?;

    let state = Rc::new(RasterizerState::new(self.core.clone(), handle, desc));
    self
      .core
      .registry()
      .rasterizer_states
      .insert(handle, None, &state);
    Ok(state)
  }

  /// Create a timer query.
  pub fn create_timer_query(&self) -> Result<Rc<TimerQuery>, ResourceError> {
    let query = Rc::new(TimerQuery::new(self.core.clone())?);
    self
      .core
      .registry()
      .queries
      .insert(query.handle(), None, &query);
    Ok(query)
  }

  /// Insert a fence in the command stream.
  pub fn create_fence(&self) -> Result<Rc<Fence>, ResourceError> {
    let fence = Rc::new(Fence::new(self.core.clone())?);
    self
      .core
      .registry()
      .fences
      .insert(fence.handle(), None, &fence);
    Ok(fence)
  }

  /// Reserve `range` path objects.
  pub fn create_path_objects(&self, range: u32) -> Result<Rc<PathObjects>, ResourceError> {
    let paths = Rc::new(PathObjects::new(self.core.clone(), range)?);
    self
      .core
      .registry()
      .paths
      .insert(paths.handle(), None, &paths);
    Ok(paths)
  }

  // lookups

  lookup!(
    /// Live vertex buffer of a handle.
    get_vertex_buffer, vertex_buffers, BufferHandle, VertexBuffer
  );
  lookup!(
    /// Live index buffer of a handle.
    get_index_buffer, index_buffers, BufferHandle, IndexBuffer
  );
  lookup!(
    /// Live draw indirect buffer of a handle.
    get_draw_indirect_buffer, draw_indirect_buffers, BufferHandle, DrawIndirectBuffer
  );
  lookup!(
    /// Live 2D texture of a handle.
    get_texture_2d, textures_2d, TextureHandle, Texture2D
  );
  lookup!(
    /// Live texture array of a handle.
    get_texture_2d_array, texture_arrays, TextureHandle, Texture2DArray
  );
  lookup!(
    /// Live cube texture of a handle.
    get_texture_cube, texture_cubes, TextureHandle, TextureCube
  );
  lookup!(
    /// Live image of a texture handle.
    get_image_2d, images, TextureHandle, Image2D
  );
  lookup!(
    /// Live render buffer of a handle.
    get_render_buffer, render_buffers, RenderBufferHandle, RenderBuffer
  );
  lookup!(
    /// Live framebuffer of a handle.
    get_framebuffer, framebuffers, FramebufferHandle, FrameBuffer
  );
  lookup!(
    /// Live shader program of a handle.
    get_shader_program_by_handle, shader_programs, ProgramHandle, ShaderProgram
  );
  lookup!(
    /// Live program pipeline of a handle.
    get_program_pipeline, program_pipelines, ProgramPipelineHandle, ProgramPipeline
  );
  lookup!(
    /// Live input assembler of a handle.
    get_input_assembler, input_assemblers, InputAssemblerHandle, InputAssembler
  );
  lookup!(
    /// Live depth / stencil state of a handle.
    get_depth_stencil_state, depth_stencil_states, DepthStencilStateHandle, DepthStencilState
  );
  lookup!(
    /// Live rasterizer state of a handle.
    get_rasterizer_state, rasterizer_states, RasterizerStateHandle, RasterizerState
  );
  lookup!(
    /// Live timer query of a handle.
    get_timer_query, queries, QueryHandle, TimerQuery
  );
  lookup!(
    /// Live fence of a handle.
    get_fence, fences, SyncHandle, Fence
  );
  lookup!(
    /// Live path object range of a handle.
    get_path_objects, paths, PathHandle, PathObjects
  );

  /// Live constant buffer of a name.
  pub fn get_constant_buffer(&self, name: &str) -> Option<Rc<ConstantBuffer>> {
    self.core.registry().constant_buffers.find(name)
  }

  /// Live constant buffer of a handle.
  pub fn get_constant_buffer_by_handle(&self, handle: BufferHandle) -> Option<Rc<ConstantBuffer>> {
    self.core.registry().constant_buffers.get(handle)
  }

  /// Live storage buffer of a name.
  pub fn get_storage_buffer(&self, name: &str) -> Option<Rc<StorageBuffer>> {
    self.core.registry().storage_buffers.find(name)
  }

  /// Live storage buffer of a handle.
  pub fn get_storage_buffer_by_handle(&self, handle: BufferHandle) -> Option<Rc<StorageBuffer>> {
    self.core.registry().storage_buffers.get(handle)
  }

  /// Live atomic counter buffer of a name.
  pub fn get_atomic_counter_buffer(&self, name: &str) -> Option<Rc<AtomicCounterBuffer>> {
    self.core.registry().atomic_counter_buffers.find(name)
  }

  /// Live atomic counter buffer of a handle.
  pub fn get_atomic_counter_buffer_by_handle(
    &self,
    handle: BufferHandle,
  ) -> Option<Rc<AtomicCounterBuffer>> {
    self.core.registry().atomic_counter_buffers.get(handle)
  }

  /// Live atomic counter buffer declaring a counter of that name.
  pub fn get_atomic_counter_buffer_by_param(&self, counter: &str) -> Option<Rc<AtomicCounterBuffer>> {
    self
      .core
      .registry()
      .atomic_counter_buffers
      .objects()
      .find(|b| b.contains_counter(counter))
  }

  /// Live shader program compiled under a name.
  pub fn get_shader_program(&self, name: &str) -> Option<Rc<ShaderProgram>> {
    self.core.registry().shader_programs.find(name)
  }

  // hardware properties

  /// Current snapshot.
  pub fn hardware_properties(&self) -> HardwareProperties {
    self.core.props()
  }

  /// Clear color.
  pub fn clear_color(&self) -> [f32; 4] {
    self.core.props().clear_color
  }

  /// Set the clear color.
  pub fn set_clear_color(&self, color: [f32; 4]) {
    self.core.update(Property::ClearColor, |p| p.clear_color = color);
  }

  /// Blend factors.
  pub fn blend_function(&self) -> BlendFunctionArgs {
    self.core.props().blend_function
  }

  /// Set the blend factors.
  pub fn set_blend_function(&self, args: BlendFunctionArgs) {
    self.core.update(Property::BlendFunction, |p| p.blend_function = args);
  }

  /// Blend equations.
  pub fn blend_equation(&self) -> BlendEquationArgs {
    self.core.props().blend_equation
  }

  /// Set the blend equations.
  ///
  /// Advanced equations need hardware support; without it, the change is refused and logged, and
  /// callers are expected to use a shader fallback.
  pub fn set_blend_equation(&self, args: BlendEquationArgs) {
    let advanced = args.rgb.is_advanced() || args.alpha.is_advanced();

    if advanced && self.core.capabilities.needs_advanced_blend_fallback() {
      error!("advanced blend equation {:?} without hardware support", args);
      return;
    }

    self.core.update(Property::BlendEquation, |p| p.blend_equation = args);
  }

  /// Insert a blend barrier between draws using non-coherent advanced blending.
  pub fn set_blend_barrier(&self) {
    let caps = self.core.capabilities;

    if caps.is_advanced_blend_hw_supported_khr() && !caps.is_blend_coherency_supported() {
      self.core.backend().set_blend_barrier();
    }
  }

  /// Depth comparison.
  pub fn depth_function(&self) -> Comparison {
    self.core.props().depth_function
  }

  /// Set the depth comparison.
  pub fn set_depth_function(&self, function: Comparison) {
    self.core.update(Property::DepthFunction, |p| p.depth_function = function);
  }

  toggle!(
    /// Face culling.
    culling_enabled, set_culling_enabled, culling_enabled, Culling
  );
  toggle!(
    /// Blending.
    blending_enabled, set_blending_enabled, blending_enabled, Blending
  );
  toggle!(
    /// Depth writes.
    depth_write_enabled, set_depth_write_enabled, depth_write_enabled, DepthWrite
  );
  toggle!(
    /// Depth test.
    depth_test_enabled, set_depth_test_enabled, depth_test_enabled, DepthTest
  );
  toggle!(
    /// Stencil test.
    stencil_test_enabled, set_stencil_test_enabled, stencil_test_enabled, StencilTest
  );
  toggle!(
    /// Scissor test.
    scissor_test_enabled, set_scissor_test_enabled, scissor_test_enabled, ScissorTest
  );
  toggle!(
    /// Color writes.
    color_writes_enabled, set_color_writes_enabled, color_writes_enabled, ColorWrites
  );
  toggle!(
    /// Multisampling.
    multisample_enabled, set_multisample_enabled, multisample_enabled, Multisample
  );

  /// Scissor rectangle.
  pub fn scissor_rect(&self) -> Rect {
    self.core.props().scissor_rect
  }

  /// Set the scissor rectangle.
  pub fn set_scissor_rect(&self, rect: Rect) {
    self.core.update(Property::ScissorRect, |p| p.scissor_rect = rect);
  }

  /// Viewport.
  pub fn viewport(&self) -> Rect {
    self.core.props().viewport
  }

  /// Set the viewport.
  pub fn set_viewport(&self, viewport: Rect) {
    self.core.update(Property::Viewport, |p| p.viewport = viewport);
  }

  /// Bound framebuffer; `None` is the default framebuffer.
  pub fn render_target(&self) -> Option<Rc<FrameBuffer>> {
    let handle = self.core.props().render_target?;
    self.core.registry().framebuffers.get(handle)
  }

  /// Bind a framebuffer; `None` binds the default framebuffer.
  pub fn set_render_target(&self, framebuffer: Option<&FrameBuffer>) {
    let handle = framebuffer.map(FrameBuffer::handle);
    self.core.update(Property::RenderTarget, |p| p.render_target = handle);
  }

  /// Input assembler used by the next draw.
  pub fn input_assembler(&self) -> Option<Rc<InputAssembler>> {
    let handle = self.core.props().input_assembler?;
    self.core.registry().input_assemblers.get(handle)
  }

  /// Set the input assembler used by the next draws. It is bound to the backend at draw time,
  /// once the shader is known.
  pub fn set_input_assembler(&self, input_assembler: Option<&InputAssembler>) {
    let handle = input_assembler.map(InputAssembler::handle);
    self.core.state.borrow_mut().props.input_assembler = handle;
  }

  /// Active shader program.
  pub fn active_shader(&self) -> Option<Rc<ShaderProgram>> {
    let handle = self.core.props().active_shader?;
    self.core.registry().shader_programs.get(handle)
  }

  /// Make a shader program active; `None` deactivates it.
  pub fn set_active_shader(&self, program: Option<&ShaderProgram>) {
    let handle = program.map(ShaderProgram::handle);
    self.core.update(Property::ActiveShader, |p| p.active_shader = handle);
  }

  /// Active program pipeline.
  pub fn active_program_pipeline(&self) -> Option<Rc<ProgramPipeline>> {
    let handle = self.core.props().active_program_pipeline?;
    self.core.registry().program_pipelines.get(handle)
  }

  /// Make a program pipeline active; `None` deactivates it. Activating a pipeline deactivates the
  /// active shader, which would take precedence.
  pub fn set_active_program_pipeline(&self, pipeline: Option<&ProgramPipeline>) {
    let handle = pipeline.map(ProgramPipeline::handle);

    if handle.is_some() {
      self.core.update(Property::ActiveShader, |p| p.active_shader = None);
    }

    self.core.update(Property::ActiveProgramPipeline, |p| {
      p.active_program_pipeline = handle
    });
  }

  /// Apply a depth / stencil state object.
  pub fn set_depth_stencil_state(&self, state: &DepthStencilState) {
    self.core.backend().set_depth_stencil_state(state.handle());

    let desc = state.desc();
    let mut tracker = self.core.state.borrow_mut();
    tracker.props.depth_test_enabled = desc.depth_test;
    tracker.props.depth_write_enabled = desc.depth_write;
    tracker.props.depth_function = desc.depth_function;
    tracker.props.stencil_test_enabled = desc.stencil_test;
  }

  /// Apply a rasterizer state object.
  pub fn set_rasterizer_state(&self, state: &RasterizerState) {
    self.core.backend().set_rasterizer_state(state.handle());
    self.core.state.borrow_mut().props.culling_enabled = state.desc().cull_mode != CullMode::None;
  }

  /// Save the snapshot.
  pub fn push_property_set(&self) {
    let mut state = self.core.state.borrow_mut();
    let props = state.props;
    state.stack.push(props);
  }

  /// Restore the last saved snapshot.
  ///
  /// With `force`, every driver-backed property is written again, whether it changed or not: use
  /// it when the driver state may have been changed behind the context’s back. Otherwise only
  /// the properties that differ are written.
  pub fn pop_property_set(&self, force: bool) {
    self.core.pop_properties(force);
  }

  /// Number of saved snapshots.
  pub fn property_stack_depth(&self) -> usize {
    self.core.state.borrow().stack.len()
  }

  // commands

  /// Clear buffers of the render target.
  ///
  /// Clearing depth while depth writes are disabled would silently do nothing: depth writes get
  /// enabled first.
  pub fn clear(&self, flags: ClearFlags) {
    if flags.contains(ClearFlags::DEPTH) && !self.depth_write_enabled() {
      warn!("depth clear with depth writes disabled; enabling depth writes");
      self.set_depth_write_enabled(true);
    }

    self.core.backend().clear(flags);
  }

  /// Clear buffers of a framebuffer, leaving the bound render target as it was.
  pub fn clear_render_target(&self, framebuffer: &FrameBuffer, flags: ClearFlags) {
    let previous = self.core.props().render_target;

    self.set_render_target(Some(framebuffer));
    self.clear(flags);
    self
      .core
      .update(Property::RenderTarget, |p| p.render_target = previous);
  }

  /// Copy a region of `source` (`None` is the default framebuffer) into the render target.
  pub fn blit_framebuffer(
    &self,
    source: Option<&FrameBuffer>,
    src: Rect,
    dst: Rect,
    flags: ClearFlags,
    filter: BlitFilter,
  ) {
    let mut backend = self.core.backend();
    backend.set_read_target(source.map(FrameBuffer::handle));
    backend.blit_framebuffer(src, dst, flags, filter);
  }

  /// Read back pixels of the render target into `out`, which must hold exactly the region.
  pub fn read_pixels(
    &self,
    rect: Rect,
    format: TextureFormat,
    out: &mut [u8],
  ) -> Result<(), TextureError> {
    if format.is_compressed() || format == TextureFormat::Unknown {
      return Err(TextureError::UnsupportedFormat(format));
    }

    if rect.width <= 0 || rect.height <= 0 {
      return Err(TextureError::InvalidDimensions);
    }

    let expected = format
      .image_byte_size(rect.width as u32, rect.height as u32)
      .ok_or(TextureError::UnsupportedFormat(format))?;

    if out.len() != expected {
      return Err(TextureError::SizeMismatch {
        expected,
        found: out.len(),
      });
    }

    let target = self.core.props().render_target;
    let mut backend = self.core.backend();
    backend.set_read_target(target);

    if backend.read_pixels(rect, format, out) {
      Ok(())
    } else {
      Err(TextureError::InvalidOperation("pixel read back failed"))
    }
  }

  /// Order GPU memory accesses between commands.
  pub fn set_memory_barrier(&self, barriers: MemoryBarrierFlags) {
    self.core.backend().set_memory_barrier(barriers);
  }

  // Resolve the input assembler and shader of a draw, check they match and bind them.
  fn apply_pre_draw_properties(
    &self,
  ) -> Result<(Rc<InputAssembler>, Rc<ShaderProgram>), DrawError> {
    let props = self.core.props();

    let ia = props
      .input_assembler
      .and_then(|h| self.core.registry().input_assemblers.get(h));
    let ia = match ia {
      Some(ia) => ia,
      None => {
        error!("draw without an input assembler");
        return Err(DrawError::NoInputAssembler);
      }
    };

    let program = props
      .active_shader
      .and_then(|h| self.core.registry().shader_programs.get(h))
      .or_else(|| {
        let pipeline = props
          .active_program_pipeline
          .and_then(|h| self.core.registry().program_pipelines.get(h))?;
        pipeline.vertex_program()
      });
    let program = match program {
      Some(program) => program,
      None => {
        error!("draw without an active shader");
        return Err(DrawError::NoShader);
      }
    };

    if let Err(e) = ia.layout().check_attributes(program.attributes()) {
      error!("{}: {}", program.name(), e);
      return Err(e);
    }

    program.bind_buffers();

    let bound = self
      .core
      .backend()
      .set_input_assembler(Some(ia.handle()), Some(program.handle()));

    if !bound {
      error!("{}: input assembler {:?} rejected", program.name(), ia.handle());
      self.core.reset_units();
      return Err(DrawError::InputAssemblerRejected);
    }

    Ok((ia, program))
  }

  fn on_post_draw(&self) {
    self.core.backend().set_input_assembler(None, None);
    self.core.reset_units();
  }

  /// Draw `count` vertices (or indices, if the input assembler is indexed) starting at `offset`.
  pub fn draw(&self, mode: DrawMode, count: u32, offset: u32) -> Result<(), DrawError> {
    let (ia, _program) = self.apply_pre_draw_properties()?;

    {
      let mut backend = self.core.backend();

      match ia.index_buffer() {
        Some(ib) => backend.draw_indexed(mode, count, ib.component_type(), offset),
        None => backend.draw(mode, count, offset),
      }
    }

    self.on_post_draw();
    Ok(())
  }

  /// Draw with arguments read from a buffer at `offset` bytes.
  pub fn draw_indirect(
    &self,
    mode: DrawMode,
    indirect: &DrawIndirectBuffer,
    offset: usize,
  ) -> Result<(), DrawError> {
    let (ia, _program) = self.apply_pre_draw_properties()?;

    {
      let mut backend = self.core.backend();

      match ia.index_buffer() {
        Some(ib) => {
          backend.draw_indexed_indirect(mode, ib.component_type(), indirect.handle(), offset)
        }
        None => backend.draw_indirect(mode, indirect.handle(), offset),
      }
    }

    self.on_post_draw();
    Ok(())
  }

  /// Run a compute program. The program becomes the active shader.
  pub fn dispatch_compute(
    &self,
    program: &ShaderProgram,
    x: u32,
    y: u32,
    z: u32,
  ) -> Result<(), DrawError> {
    if program.program_type() != ProgramType::Compute {
      error!("dispatch with graphics program {}", program.name());
      return Err(DrawError::NotCompute(program.name().to_owned()));
    }

    self.core.make_shader_active(program.handle());
    program.bind_buffers();
    self.core.backend().dispatch_compute(x, y, z);
    self.core.reset_units();

    Ok(())
  }
}

impl Drop for RenderContext {
  fn drop(&mut self) {
    let live = self.core.registry().live();

    for &(kind, count) in &live {
      warn!("{} {}(s) still alive when the render context is dropped", count, kind);
    }

    if !std::thread::panicking() {
      debug_assert!(live.is_empty(), "resources leaked: {:?}", live);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::null::NullBackend;
  use approx::assert_relative_eq;

  fn apply(m: &M44, v: [f32; 4]) -> [f32; 4] {
    let mut out = [0.; 4];
    for (row, o) in out.iter_mut().enumerate() {
      *o = (0..4).map(|col| m[col][row] * v[col]).sum();
    }
    out
  }

  #[test]
  fn equal_viewports_are_identity() {
    let vp = Rect::new(10, 20, 640, 480);
    let proj = [
      [2., 0., 0., 0.],
      [0., 3., 0., 0.],
      [0., 0., -1., -1.],
      [0., 0., -0.2, 0.],
    ];

    assert_eq!(apply_virtual_viewport_to_projection_matrix(&proj, vp, vp), proj);
  }

  #[test]
  fn degenerate_viewports_leave_projection_untouched() {
    let proj = crate::linear::IDENTITY44;
    let out = apply_virtual_viewport_to_projection_matrix(
      &proj,
      Rect::new(0, 0, 0, 480),
      Rect::new(0, 0, 640, 480),
    );

    assert_eq!(out, proj);
  }

  #[test]
  fn virtual_viewport_maps_corners() {
    // a virtual viewport covering the right half of the actual one
    let actual = Rect::new(0, 0, 800, 600);
    let virtual_ = Rect::new(400, 0, 400, 600);
    let m = apply_virtual_viewport_to_projection_matrix(
      &crate::linear::IDENTITY44,
      actual,
      virtual_,
    );

    // virtual NDC -1 lands at x = 400, i.e. actual NDC 0; virtual NDC 1 at actual NDC 1
    let left = apply(&m, [-1., 0., 0., 1.]);
    let right = apply(&m, [1., 0., 0., 1.]);

    assert_relative_eq!(left[0], 0.);
    assert_relative_eq!(right[0], 1.);
    assert_relative_eq!(left[1], 0.);
  }

  const VS: &str = "in vec3 attr_pos; void main() {}";
  const LIT_FS: &str = "
    layout (std140) uniform Lights { vec4 ambient; };
    out vec4 frag;
    void main() { frag = ambient; }
  ";

  fn null_context(backend: NullBackend) -> RenderContext {
    RenderContext::new(Box::new(backend)).unwrap()
  }

  #[test]
  fn a_single_texture_unit_stays_reserved() {
    let limits = Limits {
      max_texture_units: 1,
      ..Limits::default()
    };
    let ctx = null_context(NullBackend::new().with_limits(limits));

    assert_eq!(ctx.core.next_texture_unit(), 1);
    assert_eq!(ctx.core.next_texture_unit(), 1);
  }

  #[test]
  fn texture_units_wrap_past_the_reserved_unit() {
    let limits = Limits {
      max_texture_units: 3,
      ..Limits::default()
    };
    let ctx = null_context(NullBackend::new().with_limits(limits));

    let units: Vec<_> = (0..5).map(|_| ctx.core.next_texture_unit()).collect();
    assert_eq!(units, vec![1, 2, 1, 2, 1]);

    ctx.core.reset_units();
    assert_eq!(ctx.core.next_texture_unit(), 1);
  }

  #[test]
  fn rejected_draws_reset_binding_units() {
    let ctx = null_context(NullBackend::new());
    let program = ctx
      .compile_source("lit", &ShaderSources::new(VS, LIT_FS))
      .unwrap();
    let lights = ctx
      .create_constant_buffer("Lights", BufferUsage::Dynamic, &[0; 16])
      .unwrap();
    let vb = ctx
      .create_vertex_buffer(BufferUsage::Static, &[0f32; 9], 12)
      .unwrap();
    let layout = AttribLayout::new(vec![crate::input_assembler::AttribLayoutEntry::new(
      "attr_pos",
      ComponentType::Float32,
      3,
      0,
      0,
    )]);
    let ia = ctx
      .create_input_assembler(layout, &[vb], &[], None, 0)
      .unwrap();

    ctx.set_active_shader(Some(&program));
    ctx.set_input_assembler(Some(&ia));

    // the driver no longer knows the vertex array
    ctx.core.backend().release_input_assembler(ia.handle());

    assert_eq!(
      ctx.draw(DrawMode::Triangles, 3, 0),
      Err(DrawError::InputAssemblerRejected)
    );

    {
      let state = ctx.core.state.borrow();
      assert_eq!(state.next_constant_buffer_unit, 0);
      assert_eq!(state.next_texture_unit, 1);
    }

    drop((ia, lights, program));
  }

  #[test]
  #[cfg(debug_assertions)]
  #[should_panic(expected = "released twice")]
  fn releasing_an_unregistered_resource_asserts() {
    let ctx = null_context(NullBackend::new());
    let fb = ctx.create_framebuffer().unwrap();

    assert!(ctx.core.registry().framebuffers.remove(fb.handle()));
    drop(fb);
  }
}
