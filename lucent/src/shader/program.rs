//! Shader programs.
//!
//! A program goes through `Unlinked → Linking → Linked`, or ends in `Failed`. Only linked
//! programs are ever handed out: on any compile or link failure, every diagnostic line is logged
//! with a tag naming its stage, the stages and program objects are released and the error is
//! returned. A failed program has no constants and no blocks.

use crate::backend::handle::{ProgramHandle, ShaderStageHandle};
use crate::backend::Backend;
use crate::buffer::{AtomicCounterBuffer, ConstantBuffer, StorageBuffer};
use crate::context::ContextCore;
use crate::shader::constant::{ConstantError, ConstantValue, ShaderConstant};
use crate::shader::{AttributeInfo, BlockInfo, BlockMemberInfo, ShaderError, ShaderStage};
use log::{debug, error, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// Kind of program.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ProgramType {
  /// Vertex / tessellation / geometry / fragment pipeline.
  Graphics,
  /// Single compute stage.
  Compute,
}

/// Sources of a graphics program. Empty sources are omitted stages.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShaderSources<'a> {
  /// Vertex stage.
  pub vertex: &'a str,
  /// Tessellation control stage.
  pub tess_control: &'a str,
  /// Tessellation evaluation stage.
  pub tess_eval: &'a str,
  /// Geometry stage.
  pub geometry: &'a str,
  /// Fragment stage.
  pub fragment: &'a str,
  /// Link as a separable program, usable in a program pipeline.
  pub separable: bool,
}

impl<'a> ShaderSources<'a> {
  /// Vertex and fragment stages only.
  pub fn new(vertex: &'a str, fragment: &'a str) -> Self {
    ShaderSources {
      vertex,
      fragment,
      ..ShaderSources::default()
    }
  }

  fn stages(&self) -> impl Iterator<Item = (ShaderStage, &'a str)> {
    [
      (ShaderStage::Vertex, self.vertex),
      (ShaderStage::TessControl, self.tess_control),
      (ShaderStage::TessEval, self.tess_eval),
      (ShaderStage::Geometry, self.geometry),
      (ShaderStage::Fragment, self.fragment),
    ]
    .into_iter()
    .filter(|(_, source)| !source.trim().is_empty())
  }
}

/// A block of a program and the buffer feeding it.
#[derive(Debug)]
pub struct ShaderBlock<B> {
  info: BlockInfo,
  members: Vec<BlockMemberInfo>,
  buffer: RefCell<Option<Weak<B>>>,
}

impl<B> ShaderBlock<B> {
  fn new(info: BlockInfo, members: Vec<BlockMemberInfo>) -> Self {
    ShaderBlock {
      info,
      members,
      buffer: RefCell::new(None),
    }
  }

  /// Introspected description.
  pub fn info(&self) -> &BlockInfo {
    &self.info
  }

  /// Members, for uniform blocks.
  pub fn members(&self) -> &[BlockMemberInfo] {
    &self.members
  }

  /// Buffer explicitly set to feed the block, if still alive.
  pub fn buffer(&self) -> Option<Rc<B>> {
    self.buffer.borrow().as_ref().and_then(Weak::upgrade)
  }

  fn binding(&self) -> u32 {
    self.info.binding.max(0) as u32
  }

  // Buffer set explicitly, else the one registered under the block name. Neither is retained.
  fn resolve(&self, find: impl FnOnce(&str) -> Option<Rc<B>>) -> Option<Rc<B>> {
    self.buffer().or_else(|| find(&self.info.name))
  }
}

/// A linked shader program.
#[derive(Debug)]
pub struct ShaderProgram {
  core: Rc<ContextCore>,
  handle: ProgramHandle,
  name: String,
  program_type: ProgramType,
  separable: bool,
  attributes: Vec<AttributeInfo>,
  constants: HashMap<String, ShaderConstant>,
  constant_blocks: Vec<ShaderBlock<ConstantBuffer>>,
  storage_blocks: Vec<ShaderBlock<StorageBuffer>>,
  atomic_counter_blocks: Vec<ShaderBlock<AtomicCounterBuffer>>,
}

fn log_diagnostic(name: &str, tag: &str, log: &str) {
  for line in log.lines().filter(|l| !l.trim().is_empty()) {
    error!("{} [{}]: {}", name, tag, line);
  }
}

fn release_stages(backend: &mut dyn Backend, program: Option<ProgramHandle>, stages: &[ShaderStageHandle]) {
  for &stage in stages {
    if let Some(program) = program {
      backend.detach_shader_stage(program, stage);
    }

    backend.release_shader_stage(stage);
  }
}

impl ShaderProgram {
  pub(crate) fn compile(
    core: Rc<ContextCore>,
    name: &str,
    sources: &ShaderSources,
  ) -> Result<Self, ShaderError> {
    let caps = core.capabilities();

    if !sources.separable {
      if sources.vertex.trim().is_empty() {
        error!("{}: a vertex stage is required", name);
        return Err(ShaderError::MissingStage {
          name: name.to_owned(),
          stage: ShaderStage::Vertex,
        });
      }

      if sources.fragment.trim().is_empty() && sources.geometry.trim().is_empty() {
        error!("{}: a fragment or geometry stage is required", name);
        return Err(ShaderError::MissingStage {
          name: name.to_owned(),
          stage: ShaderStage::Fragment,
        });
      }
    } else if !caps.is_program_pipeline_supported() {
      error!("{}: separable programs are not supported", name);
      return Err(ShaderError::CreationFailed(name.to_owned()));
    }

    for (stage, _) in sources.stages() {
      let supported = match stage {
        ShaderStage::TessControl | ShaderStage::TessEval => caps.is_tessellation_supported(),
        ShaderStage::Geometry => caps.is_geometry_stage_supported(),
        _ => true,
      };

      if !supported {
        error!("{}: {} is not supported", name, stage);
        return Err(ShaderError::UnsupportedStage(stage));
      }
    }

    Self::build(core, name, sources.stages(), sources.separable, ProgramType::Graphics)
  }

  pub(crate) fn compile_compute(
    core: Rc<ContextCore>,
    name: &str,
    source: &str,
  ) -> Result<Self, ShaderError> {
    if !core.capabilities().is_compute_supported() {
      error!("{}: compute shaders are not supported", name);
      return Err(ShaderError::UnsupportedStage(ShaderStage::Compute));
    }

    if source.trim().is_empty() {
      return Err(ShaderError::MissingStage {
        name: name.to_owned(),
        stage: ShaderStage::Compute,
      });
    }

    Self::build(
      core,
      name,
      std::iter::once((ShaderStage::Compute, source)),
      false,
      ProgramType::Compute,
    )
  }

  fn build<'a>(
    core: Rc<ContextCore>,
    name: &str,
    stages: impl Iterator<Item = (ShaderStage, &'a str)>,
    separable: bool,
    program_type: ProgramType,
  ) -> Result<Self, ShaderError> {
    let caps = core.capabilities();
    let mut guard = core.backend();
    let backend: &mut dyn Backend = &mut **guard;

    // compile every stage, so that every diagnostic gets reported
    let mut compiled = Vec::new();
    let mut failure = None;

    for (stage, source) in stages {
      match backend.create_shader_stage(stage, source) {
        Ok(handle) => compiled.push(handle),

        Err(log) => {
          log_diagnostic(name, &stage.to_string(), &log);

          if failure.is_none() {
            failure = Some(ShaderError::StageCompilationFailed {
              name: name.to_owned(),
              stage,
              log,
            });
          }
        }
      }
    }

    if let Some(e) = failure {
      release_stages(backend, None, &compiled);
      return Err(e);
    }

    let handle = match backend.create_program(separable) {
      Some(handle) => handle,
      None => {
        error!("{}: cannot create program object", name);
        release_stages(backend, None, &compiled);
        return Err(ShaderError::CreationFailed(name.to_owned()));
      }
    };

    for &stage in &compiled {
      backend.attach_shader_stage(handle, stage);
    }

    let linked = backend.link_program(handle);

    // stages are not needed anymore once linking is done, whatever its outcome
    release_stages(backend, Some(handle), &compiled);

    if let Err(log) = linked {
      log_diagnostic(name, "link", &log);
      backend.release_program(handle);

      return Err(ShaderError::LinkFailed {
        name: name.to_owned(),
        log,
      });
    }

    debug!("linked program {} ({:?})", name, handle);

    let mut attributes: Vec<_> = (0..backend.attribute_count(handle))
      .filter_map(|i| backend.attribute_info(handle, i))
      .collect();
    attributes.sort_by_key(|a| a.location);

    let constants = (0..backend.constant_count(handle))
      .filter_map(|i| backend.constant_info(handle, i))
      .map(|info| (info.name.clone(), ShaderConstant::new(info)))
      .collect();

    let constant_blocks = if caps.is_constant_buffer_supported() {
      (0..backend.constant_block_count(handle))
        .filter_map(|i| {
          let info = backend.constant_block_info(handle, i)?;
          let members = backend.constant_block_members(handle, i);
          Some(ShaderBlock::new(info, members))
        })
        .collect()
    } else {
      Vec::new()
    };

    let storage_blocks = (0..backend.storage_block_count(handle))
      .filter_map(|i| backend.storage_block_info(handle, i))
      .map(|info| ShaderBlock::new(info, Vec::new()))
      .collect();

    let atomic_counter_blocks = (0..backend.atomic_counter_block_count(handle))
      .filter_map(|i| backend.atomic_counter_block_info(handle, i))
      .map(|info| ShaderBlock::new(info, Vec::new()))
      .collect();

    drop(guard);

    Ok(ShaderProgram {
      core,
      handle,
      name: name.to_owned(),
      program_type,
      separable,
      attributes,
      constants,
      constant_blocks,
      storage_blocks,
      atomic_counter_blocks,
    })
  }

  /// Backend handle.
  pub fn handle(&self) -> ProgramHandle {
    self.handle
  }

  /// Logical name the program was compiled under.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Graphics or compute.
  pub fn program_type(&self) -> ProgramType {
    self.program_type
  }

  /// Was the program linked as separable?
  pub fn is_separable(&self) -> bool {
    self.separable
  }

  /// Active vertex attributes, by location.
  pub fn attributes(&self) -> &[AttributeInfo] {
    &self.attributes
  }

  /// An active constant.
  pub fn constant(&self, name: &str) -> Option<&ShaderConstant> {
    self.constants.get(name)
  }

  /// Every active constant.
  pub fn constants(&self) -> impl Iterator<Item = &ShaderConstant> {
    self.constants.values()
  }

  /// Uniform blocks.
  pub fn constant_blocks(&self) -> &[ShaderBlock<ConstantBuffer>] {
    &self.constant_blocks
  }

  /// Storage blocks.
  pub fn storage_blocks(&self) -> &[ShaderBlock<StorageBuffer>] {
    &self.storage_blocks
  }

  /// Atomic counter buffers.
  pub fn atomic_counter_blocks(&self) -> &[ShaderBlock<AtomicCounterBuffer>] {
    &self.atomic_counter_blocks
  }

  /// Set a constant. A non-separable program becomes the active shader of its context; separable
  /// programs are updated in place, leaving the active program pipeline alone.
  pub fn set_constant(&self, name: &str, value: ConstantValue) -> Result<(), ConstantError> {
    let constant = self
      .constants
      .get(name)
      .ok_or_else(|| ConstantError::NotFound(name.to_owned()))?;

    if !self.separable {
      self.core.make_shader_active(self.handle);
    }

    constant.set(&self.core, self.handle, value).map_err(|e| {
      error!("{}: {}", self.name, e);
      e
    })
  }

  /// Feed a uniform block from a buffer. Returns `false` if the program has no such block.
  pub fn set_constant_buffer(&self, block: &str, buffer: &Rc<ConstantBuffer>) -> bool {
    set_block_buffer(&self.constant_blocks, block, buffer)
  }

  /// Feed a storage block from a buffer. Returns `false` if the program has no such block.
  pub fn set_storage_buffer(&self, block: &str, buffer: &Rc<StorageBuffer>) -> bool {
    set_block_buffer(&self.storage_blocks, block, buffer)
  }

  /// Feed an atomic counter buffer. Returns `false` if the program has no such block.
  pub fn set_atomic_counter_buffer(&self, block: &str, buffer: &Rc<AtomicCounterBuffer>) -> bool {
    set_block_buffer(&self.atomic_counter_blocks, block, buffer)
  }

  // Bind every block to its buffer; done for every draw or dispatch using this program.
  pub(crate) fn bind_buffers(&self) {
    for block in &self.constant_blocks {
      let buffer = block.resolve(|name| self.core.registry().constant_buffers.find(name));

      let buffer = match buffer {
        Some(buffer) => buffer,
        None => {
          warn!("{}: no constant buffer for block {}", self.name, block.info.name);
          continue;
        }
      };

      buffer.setup_from_block(block.info.byte_size, &block.members);

      if let Err(e) = buffer.update() {
        error!("{}: cannot update constant buffer {}: {}", self.name, buffer.name(), e);
      }

      let unit = self.core.next_constant_buffer_unit();
      let mut backend = self.core.backend();
      backend.program_set_constant_block(self.handle, block.info.index, unit);
      backend.program_set_constant_buffer(unit, buffer.handle());
    }

    for block in &self.storage_blocks {
      let buffer = block.resolve(|name| self.core.registry().storage_buffers.find(name));

      match buffer {
        Some(buffer) => self
          .core
          .backend()
          .program_set_storage_buffer(block.binding(), buffer.handle()),
        None => warn!("{}: no storage buffer for block {}", self.name, block.info.name),
      }
    }

    for block in &self.atomic_counter_blocks {
      let buffer = block.resolve(|name| {
        let registry = self.core.registry();
        registry.atomic_counter_buffers.find(name).or_else(|| {
          registry
            .atomic_counter_buffers
            .objects()
            .find(|b| b.contains_counter(name))
        })
      });

      match buffer {
        Some(buffer) => {
          if let Err(e) = buffer.update() {
            error!("{}: cannot update atomic counter buffer {}: {}", self.name, buffer.name(), e);
          }

          self
            .core
            .backend()
            .program_set_atomic_counter_buffer(block.binding(), buffer.handle());
        }

        None => warn!(
          "{}: no atomic counter buffer for {}",
          self.name, block.info.name
        ),
      }
    }
  }
}

fn set_block_buffer<B>(blocks: &[ShaderBlock<B>], name: &str, buffer: &Rc<B>) -> bool {
  match blocks.iter().find(|b| b.info.name == name) {
    Some(block) => {
      *block.buffer.borrow_mut() = Some(Rc::downgrade(buffer));
      true
    }

    None => false,
  }
}

impl Drop for ShaderProgram {
  fn drop(&mut self) {
    self.core.forget_shader(self.handle);
    self.core.backend().release_program(self.handle);
    let removed = self.core.registry().shader_programs.remove(self.handle);
    debug_assert!(removed, "program {:?} released twice", self.handle);
  }
}
