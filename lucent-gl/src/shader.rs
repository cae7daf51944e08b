//! Shader stages, programs, introspection and program pipelines.

use crate::backend::GlBackend;
use crate::convert::{shader_data_type, shader_stage, shader_stage_bits};
use gl::types::*;
use lucent::backend::handle::{BufferHandle, ProgramHandle, ProgramPipelineHandle, ShaderStageHandle};
use lucent::shader::{
  AttributeInfo, BlockInfo, BlockMemberInfo, ShaderDataType, ShaderStage, ShaderStageFlags,
  UniformInfo,
};
use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr::{null, null_mut};

pub(crate) unsafe fn create_stage(
  stage: ShaderStage,
  source: &str,
) -> Result<ShaderStageHandle, String> {
  let src = CString::new(source.as_bytes()).map_err(|e| format!("invalid source: {}", e))?;
  let handle = gl::CreateShader(shader_stage(stage));

  let shader = match ShaderStageHandle::from_raw(handle.into()) {
    Some(shader) => shader,
    None => return Err(format!("unable to create a {:?} shader", stage)),
  };

  gl::ShaderSource(handle, 1, [src.as_ptr()].as_ptr(), null());
  gl::CompileShader(handle);

  let mut compiled: GLint = gl::FALSE.into();
  gl::GetShaderiv(handle, gl::COMPILE_STATUS, &mut compiled);

  if compiled == gl::TRUE.into() {
    Ok(shader)
  } else {
    let log = shader_info_log(handle);
    gl::DeleteShader(handle);
    Err(log)
  }
}

unsafe fn shader_info_log(handle: GLuint) -> String {
  let mut log_len: GLint = 0;
  gl::GetShaderiv(handle, gl::INFO_LOG_LENGTH, &mut log_len);

  let mut log: Vec<u8> = vec![0; log_len.max(1) as usize];
  let mut written: GLsizei = 0;
  gl::GetShaderInfoLog(
    handle,
    log.len() as GLsizei,
    &mut written,
    log.as_mut_ptr() as *mut GLchar,
  );
  log.truncate(written.max(0) as usize);

  String::from_utf8_lossy(&log).into_owned()
}

unsafe fn program_info_log(handle: GLuint) -> String {
  let mut log_len: GLint = 0;
  gl::GetProgramiv(handle, gl::INFO_LOG_LENGTH, &mut log_len);

  let mut log: Vec<u8> = vec![0; log_len.max(1) as usize];
  let mut written: GLsizei = 0;
  gl::GetProgramInfoLog(
    handle,
    log.len() as GLsizei,
    &mut written,
    log.as_mut_ptr() as *mut GLchar,
  );
  log.truncate(written.max(0) as usize);

  String::from_utf8_lossy(&log).into_owned()
}

pub(crate) unsafe fn release_stage(stage: ShaderStageHandle) {
  gl::DeleteShader(stage.raw() as GLuint);
}

pub(crate) unsafe fn create_program(separable: bool) -> Option<ProgramHandle> {
  let handle = gl::CreateProgram();
  let program = ProgramHandle::from_raw(handle.into())?;

  if separable {
    gl::ProgramParameteri(handle, gl::PROGRAM_SEPARABLE, gl::TRUE.into());
  }

  Some(program)
}

pub(crate) unsafe fn attach_stage(program: ProgramHandle, stage: ShaderStageHandle) {
  gl::AttachShader(program.raw() as GLuint, stage.raw() as GLuint);
}

pub(crate) unsafe fn detach_stage(program: ProgramHandle, stage: ShaderStageHandle) {
  gl::DetachShader(program.raw() as GLuint, stage.raw() as GLuint);
}

pub(crate) unsafe fn link(program: ProgramHandle) -> Result<(), String> {
  let handle = program.raw() as GLuint;
  gl::LinkProgram(handle);

  let mut linked: GLint = gl::FALSE.into();
  gl::GetProgramiv(handle, gl::LINK_STATUS, &mut linked);

  if linked == gl::TRUE.into() {
    Ok(())
  } else {
    Err(program_info_log(handle))
  }
}

pub(crate) unsafe fn set_active(backend: &mut GlBackend, program: Option<ProgramHandle>) {
  backend
    .state
    .use_program(program.map_or(0, |p| p.raw() as GLuint));
}

pub(crate) unsafe fn release_program(backend: &mut GlBackend, program: ProgramHandle) {
  let handle = program.raw() as GLuint;

  gl::DeleteProgram(handle);
  backend.state.forget_program(handle);
}

// introspection

fn program_iv(program: ProgramHandle, name: GLenum) -> GLint {
  let mut value = 0;
  unsafe { gl::GetProgramiv(program.raw() as GLuint, name, &mut value) };
  value
}

// Strip the `[0]` GL appends to the name of arrays.
fn array_base_name(mut name: String) -> String {
  if name.ends_with("[0]") {
    name.truncate(name.len() - 3);
  }

  name
}

fn name_buffer(max_len: GLint) -> Vec<u8> {
  vec![0; max_len.max(1) as usize]
}

fn into_name(mut buffer: Vec<u8>, written: GLsizei) -> String {
  buffer.truncate(written.max(0) as usize);
  String::from_utf8_lossy(&buffer).into_owned()
}

pub(crate) unsafe fn attribute_count(program: ProgramHandle) -> usize {
  program_iv(program, gl::ACTIVE_ATTRIBUTES).max(0) as usize
}

pub(crate) unsafe fn attribute_info(program: ProgramHandle, index: usize) -> Option<AttributeInfo> {
  let handle = program.raw() as GLuint;
  let mut buffer = name_buffer(program_iv(program, gl::ACTIVE_ATTRIBUTE_MAX_LENGTH));
  let mut written = 0;
  let mut size = 0;
  let mut ty = 0;

  gl::GetActiveAttrib(
    handle,
    index as GLuint,
    buffer.len() as GLsizei,
    &mut written,
    &mut size,
    &mut ty,
    buffer.as_mut_ptr() as *mut GLchar,
  );

  let name = array_base_name(into_name(buffer, written));
  let ty = match shader_data_type(ty) {
    Some(ty) => ty,
    None => {
      log::warn!("vertex input {} has an unsupported type {:#x}", name, ty);
      return None;
    }
  };

  let c_name = CString::new(name.as_bytes()).ok()?;
  let location = gl::GetAttribLocation(handle, c_name.as_ptr() as *const c_char);

  Some(AttributeInfo {
    name,
    location,
    ty,
    element_count: size.max(1) as usize,
  })
}

// Indices of the active uniforms living outside of any block.
unsafe fn loose_uniforms(backend: &GlBackend, program: ProgramHandle) -> Vec<GLuint> {
  let count = program_iv(program, gl::ACTIVE_UNIFORMS).max(0) as GLuint;
  let indices: Vec<GLuint> = (0..count).collect();

  if indices.is_empty() || !backend.capabilities.is_constant_buffer_supported() {
    return indices;
  }

  let mut block_indices = vec![-1; indices.len()];
  gl::GetActiveUniformsiv(
    program.raw() as GLuint,
    indices.len() as GLsizei,
    indices.as_ptr(),
    gl::UNIFORM_BLOCK_INDEX,
    block_indices.as_mut_ptr(),
  );

  // atomic counters are reported through their buffers
  let mut atomic_indices = vec![-1; indices.len()];
  if backend.capabilities.is_atomic_counter_buffer_supported() {
    gl::GetActiveUniformsiv(
      program.raw() as GLuint,
      indices.len() as GLsizei,
      indices.as_ptr(),
      gl::UNIFORM_ATOMIC_COUNTER_BUFFER_INDEX,
      atomic_indices.as_mut_ptr(),
    );
  }

  indices
    .into_iter()
    .zip(block_indices.into_iter().zip(atomic_indices))
    .filter(|(_, (block, atomic))| *block == -1 && *atomic == -1)
    .map(|(index, _)| index)
    .collect()
}

pub(crate) unsafe fn constant_count(backend: &GlBackend, program: ProgramHandle) -> usize {
  loose_uniforms(backend, program).len()
}

pub(crate) unsafe fn constant_info(
  backend: &GlBackend,
  program: ProgramHandle,
  index: usize,
) -> Option<UniformInfo> {
  let uniform = *loose_uniforms(backend, program).get(index)?;
  let handle = program.raw() as GLuint;
  let mut buffer = name_buffer(program_iv(program, gl::ACTIVE_UNIFORM_MAX_LENGTH));
  let mut written = 0;
  let mut size = 0;
  let mut ty = 0;

  gl::GetActiveUniform(
    handle,
    uniform,
    buffer.len() as GLsizei,
    &mut written,
    &mut size,
    &mut ty,
    buffer.as_mut_ptr() as *mut GLchar,
  );

  let raw_name = into_name(buffer, written);
  let c_name = CString::new(raw_name.as_bytes()).ok()?;
  let location = gl::GetUniformLocation(handle, c_name.as_ptr() as *const c_char);
  let name = array_base_name(raw_name);

  let ty = match shader_data_type(ty) {
    Some(ty) => ty,
    None => {
      log::warn!("uniform {} has an unsupported type {:#x}", name, ty);
      return None;
    }
  };

  // the binding of an image is the initial value of its uniform
  let binding = if ty == ShaderDataType::Image2D && location >= 0 {
    let mut value = -1;
    gl::GetUniformiv(handle, location, &mut value);
    value
  } else {
    -1
  };

  Some(UniformInfo {
    name,
    location,
    ty,
    element_count: size.max(1) as usize,
    binding,
  })
}

pub(crate) unsafe fn constant_block_count(backend: &GlBackend, program: ProgramHandle) -> usize {
  if !backend.capabilities.is_constant_buffer_supported() {
    return 0;
  }

  program_iv(program, gl::ACTIVE_UNIFORM_BLOCKS).max(0) as usize
}

fn block_iv(program: ProgramHandle, index: GLuint, name: GLenum) -> GLint {
  let mut value = 0;
  unsafe { gl::GetActiveUniformBlockiv(program.raw() as GLuint, index, name, &mut value) };
  value
}

pub(crate) unsafe fn constant_block_info(
  backend: &GlBackend,
  program: ProgramHandle,
  index: usize,
) -> Option<BlockInfo> {
  if index >= constant_block_count(backend, program) {
    return None;
  }

  let block = index as GLuint;
  let mut buffer = name_buffer(block_iv(program, block, gl::UNIFORM_BLOCK_NAME_LENGTH));
  let mut written = 0;

  gl::GetActiveUniformBlockName(
    program.raw() as GLuint,
    block,
    buffer.len() as GLsizei,
    &mut written,
    buffer.as_mut_ptr() as *mut GLchar,
  );

  Some(BlockInfo {
    name: into_name(buffer, written),
    index: block,
    binding: block_iv(program, block, gl::UNIFORM_BLOCK_BINDING),
    byte_size: block_iv(program, block, gl::UNIFORM_BLOCK_DATA_SIZE).max(0) as usize,
    member_count: block_iv(program, block, gl::UNIFORM_BLOCK_ACTIVE_UNIFORMS).max(0) as usize,
  })
}

pub(crate) unsafe fn constant_block_members(
  backend: &GlBackend,
  program: ProgramHandle,
  index: usize,
) -> Vec<BlockMemberInfo> {
  if index >= constant_block_count(backend, program) {
    return Vec::new();
  }

  let handle = program.raw() as GLuint;
  let block = index as GLuint;
  let count = block_iv(program, block, gl::UNIFORM_BLOCK_ACTIVE_UNIFORMS).max(0) as usize;

  let mut raw_indices: Vec<GLint> = vec![0; count];
  gl::GetActiveUniformBlockiv(
    handle,
    block,
    gl::UNIFORM_BLOCK_ACTIVE_UNIFORM_INDICES,
    raw_indices.as_mut_ptr(),
  );
  let indices: Vec<GLuint> = raw_indices.into_iter().map(|i| i as GLuint).collect();

  let uniforms_iv = |name: GLenum| {
    let mut values: Vec<GLint> = vec![0; indices.len()];
    gl::GetActiveUniformsiv(
      handle,
      indices.len() as GLsizei,
      indices.as_ptr(),
      name,
      values.as_mut_ptr(),
    );
    values
  };

  let types = uniforms_iv(gl::UNIFORM_TYPE);
  let sizes = uniforms_iv(gl::UNIFORM_SIZE);
  let offsets = uniforms_iv(gl::UNIFORM_OFFSET);
  let max_len = program_iv(program, gl::ACTIVE_UNIFORM_MAX_LENGTH);

  let mut members = Vec::with_capacity(count);

  for (i, &uniform) in indices.iter().enumerate() {
    let mut buffer = name_buffer(max_len);
    let mut written = 0;

    gl::GetActiveUniformName(
      handle,
      uniform,
      buffer.len() as GLsizei,
      &mut written,
      buffer.as_mut_ptr() as *mut GLchar,
    );

    let name = array_base_name(into_name(buffer, written));

    match shader_data_type(types[i] as GLenum) {
      Some(ty) => members.push(BlockMemberInfo {
        name,
        ty,
        element_count: sizes[i].max(1) as usize,
        offset: offsets[i].max(0) as usize,
      }),
      None => log::warn!("block member {} has an unsupported type {:#x}", name, types[i]),
    }
  }

  members.sort_by_key(|m| m.offset);
  members
}

pub(crate) unsafe fn storage_block_count(backend: &GlBackend, program: ProgramHandle) -> usize {
  if !backend.capabilities.is_storage_buffer_supported() {
    return 0;
  }

  let mut count = 0;
  gl::GetProgramInterfaceiv(
    program.raw() as GLuint,
    gl::SHADER_STORAGE_BLOCK,
    gl::ACTIVE_RESOURCES,
    &mut count,
  );

  count.max(0) as usize
}

pub(crate) unsafe fn storage_block_info(
  backend: &GlBackend,
  program: ProgramHandle,
  index: usize,
) -> Option<BlockInfo> {
  if index >= storage_block_count(backend, program) {
    return None;
  }

  let handle = program.raw() as GLuint;
  let block = index as GLuint;

  let props = [
    gl::NAME_LENGTH,
    gl::BUFFER_BINDING,
    gl::BUFFER_DATA_SIZE,
    gl::NUM_ACTIVE_VARIABLES,
  ];
  let mut values = [0; 4];
  gl::GetProgramResourceiv(
    handle,
    gl::SHADER_STORAGE_BLOCK,
    block,
    props.len() as GLsizei,
    props.as_ptr(),
    values.len() as GLsizei,
    null_mut(),
    values.as_mut_ptr(),
  );

  let mut buffer = name_buffer(values[0]);
  let mut written = 0;
  gl::GetProgramResourceName(
    handle,
    gl::SHADER_STORAGE_BLOCK,
    block,
    buffer.len() as GLsizei,
    &mut written,
    buffer.as_mut_ptr() as *mut GLchar,
  );

  Some(BlockInfo {
    name: into_name(buffer, written),
    index: block,
    binding: values[1],
    byte_size: values[2].max(0) as usize,
    member_count: values[3].max(0) as usize,
  })
}

pub(crate) unsafe fn atomic_counter_block_count(
  backend: &GlBackend,
  program: ProgramHandle,
) -> usize {
  if !backend.capabilities.is_atomic_counter_buffer_supported() {
    return 0;
  }

  program_iv(program, gl::ACTIVE_ATOMIC_COUNTER_BUFFERS).max(0) as usize
}

/// Atomic counter buffers have no name of their own; they go by their first counter.
pub(crate) unsafe fn atomic_counter_block_info(
  backend: &GlBackend,
  program: ProgramHandle,
  index: usize,
) -> Option<BlockInfo> {
  if index >= atomic_counter_block_count(backend, program) {
    return None;
  }

  let handle = program.raw() as GLuint;
  let block = index as GLuint;
  let buffer_iv = |name: GLenum| {
    let mut value = 0;
    gl::GetActiveAtomicCounterBufferiv(handle, block, name, &mut value);
    value
  };

  let binding = buffer_iv(gl::ATOMIC_COUNTER_BUFFER_BINDING);
  let byte_size = buffer_iv(gl::ATOMIC_COUNTER_BUFFER_DATA_SIZE).max(0) as usize;
  let member_count = buffer_iv(gl::ATOMIC_COUNTER_BUFFER_ACTIVE_ATOMIC_COUNTERS).max(0) as usize;

  let mut counters: Vec<GLint> = vec![0; member_count];
  gl::GetActiveAtomicCounterBufferiv(
    handle,
    block,
    gl::ATOMIC_COUNTER_BUFFER_ACTIVE_ATOMIC_COUNTER_INDICES,
    counters.as_mut_ptr(),
  );

  // the counter with the lowest offset names the buffer
  let mut first: Option<(GLint, GLuint)> = None;
  for &counter in &counters {
    let counter = counter as GLuint;
    let mut offset = 0;
    gl::GetActiveUniformsiv(handle, 1, &counter, gl::UNIFORM_OFFSET, &mut offset);

    if first.map_or(true, |(o, _)| offset < o) {
      first = Some((offset, counter));
    }
  }

  let name = match first {
    Some((_, counter)) => {
      let mut buffer = name_buffer(program_iv(program, gl::ACTIVE_UNIFORM_MAX_LENGTH));
      let mut written = 0;
      gl::GetActiveUniformName(
        handle,
        counter,
        buffer.len() as GLsizei,
        &mut written,
        buffer.as_mut_ptr() as *mut GLchar,
      );
      array_base_name(into_name(buffer, written))
    }
    None => String::new(),
  };

  Some(BlockInfo {
    name,
    index: block,
    binding,
    byte_size,
    member_count,
  })
}

// constants

/// Upload `count` elements of `ty` from `data`.
///
/// With program pipelines around, values go straight to the program; otherwise the program must
/// be current, which it is made if needed.
#[allow(clippy::too_many_arguments)]
pub(crate) unsafe fn set_constant_value(
  backend: &mut GlBackend,
  program: ProgramHandle,
  location: i32,
  ty: ShaderDataType,
  count: usize,
  data: &[u8],
  transpose: bool,
) {
  let handle = program.raw() as GLuint;
  let direct = gl::ProgramUniform1fv::is_loaded();

  if !direct && backend.state.current_program() != handle {
    backend.state.use_program(handle);
  }

  let count = count as GLsizei;
  let transpose = if transpose { gl::TRUE } else { gl::FALSE };

  macro_rules! upload {
    ($program_fn:ident, $fn:ident, $t:ty) => {{
      let values: Vec<$t> = bytemuck::pod_collect_to_vec(data);
      if direct {
        gl::$program_fn(handle, location, count, values.as_ptr());
      } else {
        gl::$fn(location, count, values.as_ptr());
      }
    }};

    (matrix $program_fn:ident, $fn:ident) => {{
      let values: Vec<f32> = bytemuck::pod_collect_to_vec(data);
      if direct {
        gl::$program_fn(handle, location, count, transpose, values.as_ptr());
      } else {
        gl::$fn(location, count, transpose, values.as_ptr());
      }
    }};
  }

  match ty {
    ShaderDataType::Int
    | ShaderDataType::Texture2D
    | ShaderDataType::Texture2DArray
    | ShaderDataType::TextureCube
    | ShaderDataType::Image2D
    | ShaderDataType::Texture2DHandleArray
    | ShaderDataType::TextureCubeHandleArray => upload!(ProgramUniform1iv, Uniform1iv, i32),
    ShaderDataType::IntVec2 => upload!(ProgramUniform2iv, Uniform2iv, i32),
    ShaderDataType::IntVec3 => upload!(ProgramUniform3iv, Uniform3iv, i32),
    ShaderDataType::IntVec4 => upload!(ProgramUniform4iv, Uniform4iv, i32),
    ShaderDataType::UInt => upload!(ProgramUniform1uiv, Uniform1uiv, u32),
    ShaderDataType::UIntVec2 => upload!(ProgramUniform2uiv, Uniform2uiv, u32),
    ShaderDataType::UIntVec3 => upload!(ProgramUniform3uiv, Uniform3uiv, u32),
    ShaderDataType::UIntVec4 => upload!(ProgramUniform4uiv, Uniform4uiv, u32),
    ShaderDataType::Float => upload!(ProgramUniform1fv, Uniform1fv, f32),
    ShaderDataType::FloatVec2 => upload!(ProgramUniform2fv, Uniform2fv, f32),
    ShaderDataType::FloatVec3 => upload!(ProgramUniform3fv, Uniform3fv, f32),
    ShaderDataType::FloatVec4 => upload!(ProgramUniform4fv, Uniform4fv, f32),
    ShaderDataType::Bool
    | ShaderDataType::BoolVec2
    | ShaderDataType::BoolVec3
    | ShaderDataType::BoolVec4 => {
      let values: Vec<i32> = bytemuck::pod_collect_to_vec::<u8, i32>(data)
        .into_iter()
        .map(|b| (b != 0) as i32)
        .collect();
      let components = ty.component_count() as GLint;

      match (direct, components) {
        (true, 1) => gl::ProgramUniform1iv(handle, location, count, values.as_ptr()),
        (true, 2) => gl::ProgramUniform2iv(handle, location, count, values.as_ptr()),
        (true, 3) => gl::ProgramUniform3iv(handle, location, count, values.as_ptr()),
        (true, _) => gl::ProgramUniform4iv(handle, location, count, values.as_ptr()),
        (false, 1) => gl::Uniform1iv(location, count, values.as_ptr()),
        (false, 2) => gl::Uniform2iv(location, count, values.as_ptr()),
        (false, 3) => gl::Uniform3iv(location, count, values.as_ptr()),
        (false, _) => gl::Uniform4iv(location, count, values.as_ptr()),
      }
    }
    ShaderDataType::Matrix3 => upload!(matrix ProgramUniformMatrix3fv, UniformMatrix3fv),
    ShaderDataType::Matrix4 => upload!(matrix ProgramUniformMatrix4fv, UniformMatrix4fv),
  }
}

pub(crate) unsafe fn set_constant_block(program: ProgramHandle, block_index: u32, binding: u32) {
  gl::UniformBlockBinding(program.raw() as GLuint, block_index, binding);
}

pub(crate) unsafe fn bind_buffer_base(
  backend: &mut GlBackend,
  target: GLenum,
  binding: u32,
  buffer: BufferHandle,
) {
  backend
    .state
    .bind_buffer_base(target, binding, buffer.raw() as GLuint);
}

// program pipelines

pub(crate) unsafe fn create_pipeline() -> Option<ProgramPipelineHandle> {
  let mut handle: GLuint = 0;
  gl::GenProgramPipelines(1, &mut handle);

  ProgramPipelineHandle::from_raw(handle.into())
}

pub(crate) unsafe fn set_program_stages(
  pipeline: ProgramPipelineHandle,
  stages: ShaderStageFlags,
  program: Option<ProgramHandle>,
) {
  gl::UseProgramStages(
    pipeline.raw() as GLuint,
    shader_stage_bits(stages),
    program.map_or(0, |p| p.raw() as GLuint),
  );
}

pub(crate) unsafe fn set_pipeline(backend: &mut GlBackend, pipeline: Option<ProgramPipelineHandle>) {
  // a current program takes precedence over any pipeline
  if pipeline.is_some() && backend.state.current_program() != 0 {
    backend.state.use_program(0);
  }

  gl::BindProgramPipeline(pipeline.map_or(0, |p| p.raw() as GLuint));
}

pub(crate) unsafe fn release_pipeline(pipeline: ProgramPipelineHandle) {
  let handle = pipeline.raw() as GLuint;
  gl::DeleteProgramPipelines(1, &handle);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn array_names() {
    assert_eq!(array_base_name("lights[0]".to_owned()), "lights");
    assert_eq!(array_base_name("lights[0].color".to_owned()), "lights[0].color");
    assert_eq!(array_base_name("color".to_owned()), "color");
  }

  #[test]
  fn names_stop_at_what_was_written() {
    let mut buffer = name_buffer(16);
    buffer[..5].copy_from_slice(b"color");
    assert_eq!(into_name(buffer, 5), "color");

    assert_eq!(name_buffer(-1).len(), 1);
  }
}
