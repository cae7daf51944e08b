//! Program pipelines: stages of several separable programs combined into one pipeline.

use crate::backend::handle::ProgramPipelineHandle;
use crate::context::{ContextCore, ResourceError};
use crate::shader::program::ShaderProgram;
use crate::shader::{ShaderError, ShaderStage, ShaderStageFlags};
use log::error;
use std::cell::RefCell;
use std::rc::Rc;

/// A program pipeline.
#[derive(Debug)]
pub struct ProgramPipeline {
  core: Rc<ContextCore>,
  handle: ProgramPipelineHandle,
  programs: RefCell<[Option<Rc<ShaderProgram>>; 6]>,
}

fn stage_index(stage: ShaderStage) -> usize {
  match stage {
    ShaderStage::Vertex => 0,
    ShaderStage::TessControl => 1,
    ShaderStage::TessEval => 2,
    ShaderStage::Geometry => 3,
    ShaderStage::Fragment => 4,
    ShaderStage::Compute => 5,
  }
}

impl ProgramPipeline {
  pub(crate) fn new(core: Rc<ContextCore>) -> Result<Self, ResourceError> {
    if !core.capabilities().is_program_pipeline_supported() {
      return Err(ResourceError::Unsupported("program pipelines"));
    }

    let handle = core
      .backend()
      .create_program_pipeline()
      .ok_or_else(|| ResourceError::creation_failed("program pipeline"))?;

    Ok(ProgramPipeline {
      core,
      handle,
      programs: RefCell::new(Default::default()),
    })
  }

  /// Backend handle.
  pub fn handle(&self) -> ProgramPipelineHandle {
    self.handle
  }

  /// Use the given stages of a separable program; `None` clears them.
  pub fn set_program_stages(
    &self,
    program: Option<&Rc<ShaderProgram>>,
    stages: ShaderStageFlags,
  ) -> Result<(), ShaderError> {
    if let Some(program) = program {
      if !program.is_separable() {
        error!(
          "program {} is not separable and cannot be used in a pipeline",
          program.name()
        );
        return Err(ShaderError::CreationFailed(program.name().to_owned()));
      }
    }

    self
      .core
      .backend()
      .set_program_stages(self.handle, stages, program.map(|p| p.handle()));

    let mut programs = self.programs.borrow_mut();
    for stage in ShaderStage::ALL {
      if stages.contains(stage.flag()) {
        programs[stage_index(stage)] = program.cloned();
      }
    }

    Ok(())
  }

  /// Program providing a stage.
  pub fn program(&self, stage: ShaderStage) -> Option<Rc<ShaderProgram>> {
    self.programs.borrow()[stage_index(stage)].clone()
  }

  /// Program providing the vertex stage.
  pub fn vertex_program(&self) -> Option<Rc<ShaderProgram>> {
    self.program(ShaderStage::Vertex)
  }
}

impl Drop for ProgramPipeline {
  fn drop(&mut self) {
    self.core.forget_program_pipeline(self.handle);
    self.core.backend().release_program_pipeline(self.handle);
    let removed = self.core.registry().program_pipelines.remove(self.handle);
    debug_assert!(removed, "program pipeline {:?} released twice", self.handle);
  }
}
