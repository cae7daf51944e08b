//! Input assemblers: vertex buffers, an optional index buffer and the attribute layout describing
//! how shader inputs are fetched from them.

use crate::backend::handle::InputAssemblerHandle;
use crate::buffer::{IndexBuffer, VertexBuffer};
use crate::component::ComponentType;
use crate::context::{ContextCore, DrawError, ResourceError};
use crate::shader::AttributeInfo;
use std::rc::Rc;

/// Primitive assembled from vertices.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DrawMode {
  /// Single points.
  Points,
  /// Connected lines.
  LineStrip,
  /// Connected lines, closed.
  LineLoop,
  /// Independent lines.
  Lines,
  /// Triangle strip.
  TriangleStrip,
  /// Triangle fan.
  TriangleFan,
  /// Independent triangles.
  Triangles,
  /// Tessellation patches.
  Patches,
}

/// One vertex attribute of a layout.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct AttribLayoutEntry {
  /// Name of the shader input it feeds.
  pub name: String,
  /// Type of one component.
  pub component_type: ComponentType,
  /// Number of components, 1 to 4.
  pub num_components: u32,
  /// Byte offset inside one vertex.
  pub offset: u32,
  /// Vertex buffer slot it is read from.
  pub input_slot: u32,
}

impl AttribLayoutEntry {
  /// Create an entry.
  pub fn new(
    name: impl Into<String>,
    component_type: ComponentType,
    num_components: u32,
    offset: u32,
    input_slot: u32,
  ) -> Self {
    AttribLayoutEntry {
      name: name.into(),
      component_type,
      num_components,
      offset,
      input_slot,
    }
  }
}

/// Attribute layout: the declarative description of a vertex format.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct AttribLayout {
  entries: Vec<AttribLayoutEntry>,
}

impl AttribLayout {
  /// Create a layout.
  pub fn new(entries: Vec<AttribLayoutEntry>) -> Self {
    AttribLayout { entries }
  }

  /// All entries.
  pub fn entries(&self) -> &[AttribLayoutEntry] {
    &self.entries
  }

  /// Entry of a given attribute name.
  pub fn entry(&self, name: &str) -> Option<&AttribLayoutEntry> {
    self.entries.iter().find(|e| e.name == name)
  }

  /// Number of vertex buffer slots the layout reads from.
  pub fn slot_count(&self) -> usize {
    self
      .entries
      .iter()
      .map(|e| e.input_slot as usize + 1)
      .max()
      .unwrap_or(0)
  }

  /// Check that every active attribute of a program is fed by this layout, with a matching
  /// component count and type.
  pub fn check_attributes(&self, attributes: &[AttributeInfo]) -> Result<(), DrawError> {
    for attribute in attributes {
      let entry = self
        .entry(&attribute.name)
        .ok_or_else(|| DrawError::MissingAttribute(attribute.name.clone()))?;

      let expected = attribute.ty.component_count();
      if entry.num_components as usize != expected {
        return Err(DrawError::AttributeComponentCount {
          name: attribute.name.clone(),
          expected,
          found: entry.num_components,
        });
      }

      if attribute.ty.is_integer() && entry.component_type.is_floating() {
        return Err(DrawError::AttributeType {
          name: attribute.name.clone(),
          ty: attribute.ty,
          component_type: entry.component_type,
        });
      }
    }

    Ok(())
  }
}

/// Vertex buffers, index buffer and layout bundled into one drawable stream.
#[derive(Debug)]
pub struct InputAssembler {
  core: Rc<ContextCore>,
  handle: InputAssemblerHandle,
  layout: AttribLayout,
  vertex_buffers: Vec<Rc<VertexBuffer>>,
  index_buffer: Option<Rc<IndexBuffer>>,
  patch_vertex_count: u32,
}

impl InputAssembler {
  pub(crate) fn new(
    core: Rc<ContextCore>,
    layout: AttribLayout,
    vertex_buffers: &[Rc<VertexBuffer>],
    offsets: &[u32],
    index_buffer: Option<&Rc<IndexBuffer>>,
    patch_vertex_count: u32,
  ) -> Result<Self, ResourceError> {
    if layout.slot_count() > vertex_buffers.len() {
      return Err(ResourceError::InvalidArgument(format!(
        "layout reads {} vertex buffer slots but {} buffers were given",
        layout.slot_count(),
        vertex_buffers.len()
      )));
    }

    if let Some(entry) = layout
      .entries()
      .iter()
      .find(|e| e.num_components == 0 || e.num_components > 4)
    {
      return Err(ResourceError::InvalidArgument(format!(
        "attribute {} has {} components",
        entry.name, entry.num_components
      )));
    }

    let handles: Vec<_> = vertex_buffers.iter().map(|vb| vb.handle()).collect();
    let strides: Vec<_> = vertex_buffers.iter().map(|vb| vb.stride()).collect();
    let offsets: Vec<_> = (0..vertex_buffers.len())
      .map(|i| offsets.get(i).copied().unwrap_or(0))
      .collect();

    let handle = core
      .backend()
      .create_input_assembler(
        layout.entries(),
        &handles,
        &strides,
        &offsets,
        index_buffer.map(|ib| ib.handle()),
        patch_vertex_count,
      )
      .ok_or_else(|| ResourceError::creation_failed("input assembler"))?;

    Ok(InputAssembler {
      core,
      handle,
      layout,
      vertex_buffers: vertex_buffers.to_vec(),
      index_buffer: index_buffer.cloned(),
      patch_vertex_count,
    })
  }

  /// Backend handle.
  pub fn handle(&self) -> InputAssemblerHandle {
    self.handle
  }

  /// Attribute layout.
  pub fn layout(&self) -> &AttribLayout {
    &self.layout
  }

  /// Vertex buffers, by input slot.
  pub fn vertex_buffers(&self) -> &[Rc<VertexBuffer>] {
    &self.vertex_buffers
  }

  /// Index buffer, if drawing is indexed.
  pub fn index_buffer(&self) -> Option<&Rc<IndexBuffer>> {
    self.index_buffer.as_ref()
  }

  /// Vertices per patch, for [`DrawMode::Patches`].
  pub fn patch_vertex_count(&self) -> u32 {
    self.patch_vertex_count
  }

  /// Number of vertices (or indices, if indexed) available to a draw.
  pub fn element_count(&self) -> usize {
    match self.index_buffer {
      Some(ref ib) => ib.index_count(),
      None => self
        .vertex_buffers
        .first()
        .map_or(0, |vb| vb.vertex_count()),
    }
  }
}

impl Drop for InputAssembler {
  fn drop(&mut self) {
    self.core.forget_input_assembler(self.handle);
    self.core.backend().release_input_assembler(self.handle);
    let removed = self.core.registry().input_assemblers.remove(self.handle);
    debug_assert!(removed, "input assembler {:?} released twice", self.handle);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::shader::ShaderDataType;

  fn attribute(name: &str, ty: ShaderDataType) -> AttributeInfo {
    AttributeInfo {
      name: name.to_owned(),
      location: 0,
      ty,
      element_count: 1,
    }
  }

  fn layout() -> AttribLayout {
    AttribLayout::new(vec![
      AttribLayoutEntry::new("attr_pos", ComponentType::Float32, 3, 0, 0),
      AttribLayoutEntry::new("attr_uv", ComponentType::Float32, 2, 12, 0),
      AttribLayoutEntry::new("attr_bones", ComponentType::UInt8, 4, 0, 1),
    ])
  }

  #[test]
  fn slot_count() {
    assert_eq!(layout().slot_count(), 2);
    assert_eq!(AttribLayout::default().slot_count(), 0);
  }

  #[test]
  fn matching_attributes() {
    let attributes = [
      attribute("attr_pos", ShaderDataType::FloatVec3),
      attribute("attr_bones", ShaderDataType::UIntVec4),
    ];

    assert_eq!(layout().check_attributes(&attributes), Ok(()));
  }

  #[test]
  fn mismatching_attributes() {
    assert_eq!(
      layout().check_attributes(&[attribute("attr_norm", ShaderDataType::FloatVec3)]),
      Err(DrawError::MissingAttribute("attr_norm".to_owned()))
    );

    assert_eq!(
      layout().check_attributes(&[attribute("attr_uv", ShaderDataType::FloatVec3)]),
      Err(DrawError::AttributeComponentCount {
        name: "attr_uv".to_owned(),
        expected: 3,
        found: 2
      })
    );

    assert_eq!(
      layout().check_attributes(&[attribute("attr_pos", ShaderDataType::IntVec3)]),
      Err(DrawError::AttributeType {
        name: "attr_pos".to_owned(),
        ty: ShaderDataType::IntVec3,
        component_type: ComponentType::Float32
      })
    );
  }
}
