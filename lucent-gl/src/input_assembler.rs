//! Input assemblers.
//!
//! Attribute locations belong to programs, so an assembler keeps one vertex array object per
//! program it has been bound with. Without vertex array objects (ES2), the attribute pointers are
//! set on every bind and the arrays disabled again on unbind.

use crate::backend::GlBackend;
use crate::convert::component_type;
use crate::shader;
use crate::state::Bind;
use gl::types::*;
use lucent::backend::handle::{BufferHandle, InputAssemblerHandle, ProgramHandle};
use lucent::input_assembler::AttribLayoutEntry;
use lucent::shader::AttributeInfo;
use std::collections::HashMap;
use std::os::raw::c_void;

#[derive(Debug)]
pub(crate) struct InputAssembler {
  layout: Vec<AttribLayoutEntry>,
  buffers: Vec<GLuint>,
  strides: Vec<u32>,
  offsets: Vec<u32>,
  index_buffer: Option<GLuint>,
  patch_vertex_count: u32,
  // program → vertex array
  vertex_arrays: HashMap<GLuint, GLuint>,
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn create(
  backend: &mut GlBackend,
  layout: &[AttribLayoutEntry],
  buffers: &[BufferHandle],
  strides: &[u32],
  offsets: &[u32],
  index_buffer: Option<BufferHandle>,
  patch_vertex_count: u32,
) -> Option<InputAssemblerHandle> {
  if let Some(entry) = layout
    .iter()
    .find(|e| component_type(e.component_type).is_none())
  {
    log::error!(
      "{} uses {:?} components, which OpenGL cannot feed",
      entry.name,
      entry.component_type
    );
    return None;
  }

  let handle = InputAssemblerHandle::from_raw(backend.ids.allocate())?;

  backend.input_assemblers.insert(
    handle,
    InputAssembler {
      layout: layout.to_vec(),
      buffers: buffers.iter().map(|b| b.raw() as GLuint).collect(),
      strides: strides.to_vec(),
      offsets: offsets.to_vec(),
      index_buffer: index_buffer.map(|b| b.raw() as GLuint),
      patch_vertex_count,
      vertex_arrays: HashMap::new(),
    },
  );

  Some(handle)
}

unsafe fn program_attributes(program: ProgramHandle) -> HashMap<String, AttributeInfo> {
  (0..shader::attribute_count(program))
    .filter_map(|i| shader::attribute_info(program, i))
    .map(|a| (a.name.clone(), a))
    .collect()
}

// Point every attribute of the layout the program reads at its buffer; returns the locations.
unsafe fn set_attribute_pointers(
  backend: &mut GlBackend,
  ia: &InputAssembler,
  attributes: &HashMap<String, AttributeInfo>,
) -> Vec<GLuint> {
  let mut enabled = Vec::with_capacity(ia.layout.len());

  for entry in &ia.layout {
    let attribute = match attributes.get(&entry.name) {
      Some(a) if a.location >= 0 => a,
      _ => {
        log::debug!("{} is not read by the program", entry.name);
        continue;
      }
    };

    let slot = entry.input_slot as usize;
    let buffer = match ia.buffers.get(slot) {
      Some(&b) => b,
      None => {
        log::warn!("{} reads from the missing input slot {}", entry.name, slot);
        continue;
      }
    };

    let gl_type = match component_type(entry.component_type) {
      Some(t) => t,
      None => continue,
    };

    let location = attribute.location as GLuint;
    let stride = ia.strides.get(slot).copied().unwrap_or(0) as GLsizei;
    let offset = (ia.offsets.get(slot).copied().unwrap_or(0) + entry.offset) as usize;
    let pointer = offset as *const c_void;

    backend.state.bind_buffer(gl::ARRAY_BUFFER, buffer, Bind::Cached);

    if entry.component_type.is_floating() {
      gl::VertexAttribPointer(
        location,
        entry.num_components as GLint,
        gl_type,
        gl::FALSE,
        stride,
        pointer,
      );
    } else if attribute.ty.is_integer() && gl::VertexAttribIPointer::is_loaded() {
      gl::VertexAttribIPointer(
        location,
        entry.num_components as GLint,
        gl_type,
        stride,
        pointer,
      );
    } else {
      // integers feeding floating inputs are normalized
      gl::VertexAttribPointer(
        location,
        entry.num_components as GLint,
        gl_type,
        gl::TRUE,
        stride,
        pointer,
      );
    }

    gl::EnableVertexAttribArray(location);
    enabled.push(location);
  }

  enabled
}

pub(crate) unsafe fn set(
  backend: &mut GlBackend,
  input_assembler: Option<InputAssemblerHandle>,
  program: Option<ProgramHandle>,
) -> bool {
  let (handle, program) = match (input_assembler, program) {
    (None, _) => {
      unbind(backend);
      return true;
    }
    (Some(handle), Some(program)) => (handle, program),
    (Some(_), None) => {
      log::error!("an input assembler needs a program to resolve attribute locations");
      return false;
    }
  };

  // taken out while bound, so that its buffers can go through the state cache
  let mut ia = match backend.input_assemblers.remove(&handle) {
    Some(ia) => ia,
    None => return false,
  };

  let bound = bind(backend, &mut ia, program.raw() as GLuint, program);

  if bound && ia.patch_vertex_count > 0 && gl::PatchParameteri::is_loaded() {
    gl::PatchParameteri(gl::PATCH_VERTICES, ia.patch_vertex_count as GLint);
  }

  backend.input_assemblers.insert(handle, ia);
  bound
}

unsafe fn bind(
  backend: &mut GlBackend,
  ia: &mut InputAssembler,
  program_name: GLuint,
  program: ProgramHandle,
) -> bool {
  if !gl::GenVertexArrays::is_loaded() {
    // emulated: everything is set again
    unbind(backend);

    let attributes = program_attributes(program);
    backend.enabled_arrays = set_attribute_pointers(backend, ia, &attributes);

    if let Some(index_buffer) = ia.index_buffer {
      backend
        .state
        .bind_buffer(gl::ELEMENT_ARRAY_BUFFER, index_buffer, Bind::Cached);
    }

    return true;
  }

  if let Some(&vao) = ia.vertex_arrays.get(&program_name) {
    backend.state.bind_vertex_array(vao, Bind::Cached);
    return true;
  }

  let mut vao: GLuint = 0;
  gl::GenVertexArrays(1, &mut vao);

  if vao == 0 {
    log::error!("unable to create a vertex array");
    return false;
  }

  backend.state.bind_vertex_array(vao, Bind::Forced);

  let attributes = program_attributes(program);
  set_attribute_pointers(backend, ia, &attributes);

  // captured by the vertex array, hence not cached
  gl::BindBuffer(gl::ELEMENT_ARRAY_BUFFER, ia.index_buffer.unwrap_or(0));

  ia.vertex_arrays.insert(program_name, vao);
  true
}

unsafe fn unbind(backend: &mut GlBackend) {
  if gl::GenVertexArrays::is_loaded() {
    backend.state.bind_vertex_array(0, Bind::Cached);
  } else {
    for location in backend.enabled_arrays.drain(..) {
      gl::DisableVertexAttribArray(location);
    }
  }
}

/// Drop the vertex arrays built for a program that is going away.
pub(crate) unsafe fn forget_program(backend: &mut GlBackend, program: ProgramHandle) {
  let name = program.raw() as GLuint;

  for ia in backend.input_assemblers.values_mut() {
    if let Some(vao) = ia.vertex_arrays.remove(&name) {
      gl::DeleteVertexArrays(1, &vao);
      backend.state.forget_vertex_array(vao);
    }
  }
}

pub(crate) unsafe fn release(backend: &mut GlBackend, input_assembler: InputAssemblerHandle) {
  if let Some(ia) = backend.input_assemblers.remove(&input_assembler) {
    for vao in ia.vertex_arrays.into_values() {
      gl::DeleteVertexArrays(1, &vao);
      backend.state.forget_vertex_array(vao);
    }
  }
}
