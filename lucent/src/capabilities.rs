//! Backend capabilities and limits.
//!
//! [`Capabilities`] is populated once, when a backend is constructed, from the driver's version
//! and extension list. It never changes afterwards. Higher layers branch on it to select code
//! paths (for instance a software fallback for advanced blending).

use crate::version::{Api, GlVersion};
use bitflags::bitflags;

bitflags! {
  /// Optional GPU features available on a backend / driver combination.
  #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
  pub struct Capabilities: u32 {
    /// Tessellation control / evaluation stages.
    const TESSELLATION = 1 << 0;
    /// Geometry stage.
    const GEOMETRY_STAGE = 1 << 1;
    /// Compute programs.
    const COMPUTE = 1 << 2;
    /// Shader storage buffers.
    const STORAGE_BUFFER = 1 << 3;
    /// Atomic counter buffers.
    const ATOMIC_COUNTER_BUFFER = 1 << 4;
    /// Image load / store.
    const IMAGE_LOAD_STORE = 1 << 5;
    /// Separable programs bound through program pipelines.
    const PROGRAM_PIPELINE = 1 << 6;
    /// NV path rendering.
    const PATH_RENDERING = 1 << 7;
    /// NV advanced blend equations.
    const ADVANCED_BLEND_NV = 1 << 8;
    /// KHR advanced blend equations.
    const ADVANCED_BLEND_KHR = 1 << 9;
    /// Coherent KHR advanced blend equations (no barrier needed between draws).
    const ADVANCED_BLEND_KHR_COHERENT = 1 << 10;
    /// Multisample textures.
    const MULTISAMPLE_TEXTURE = 1 << 11;
    /// Uniform blocks (constant buffers).
    const CONSTANT_BUFFER = 1 << 12;
    /// DXT compressed images.
    const DXT_IMAGES = 1 << 13;
    /// Depth / stencil textures.
    const DEPTH_STENCIL_TEXTURE = 1 << 14;
    /// Floating point render targets.
    const FP_RENDER_TARGET = 1 << 15;
    /// Timer and sample queries.
    const TIMER_QUERY = 1 << 16;
    /// Fence syncs.
    const COMMAND_SYNC = 1 << 17;
    /// 2D texture arrays.
    const TEXTURE_ARRAY = 1 << 18;
    /// Standard derivatives in fragment shaders.
    const STANDARD_DERIVATIVES = 1 << 19;
    /// Explicit texture LOD in fragment shaders.
    const TEXTURE_LOD = 1 << 20;
  }
}

impl Capabilities {
  /// Derive the capabilities from a driver version and its extension list.
  pub fn probe<S>(version: GlVersion, extensions: &[S]) -> Self
  where
    S: AsRef<str>,
  {
    let has = |name: &str| extensions.iter().any(|e| e.as_ref() == name);
    let at_least = |major, minor| version.is_at_least(major, minor);
    let mut caps = Capabilities::empty();

    match version.api {
      Api::OpenGl => {
        caps.set(
          Capabilities::TESSELLATION,
          at_least(4, 0) || has("GL_ARB_tessellation_shader"),
        );
        caps.set(
          Capabilities::GEOMETRY_STAGE,
          at_least(3, 2) || has("GL_ARB_geometry_shader4"),
        );
        caps.set(
          Capabilities::COMPUTE,
          at_least(4, 3) || has("GL_ARB_compute_shader"),
        );
        caps.set(
          Capabilities::STORAGE_BUFFER,
          at_least(4, 3) || has("GL_ARB_shader_storage_buffer_object"),
        );
        caps.set(
          Capabilities::ATOMIC_COUNTER_BUFFER,
          at_least(4, 2) || has("GL_ARB_shader_atomic_counters"),
        );
        caps.set(
          Capabilities::IMAGE_LOAD_STORE,
          at_least(4, 2) || has("GL_ARB_shader_image_load_store"),
        );
        caps.set(
          Capabilities::PROGRAM_PIPELINE,
          at_least(4, 1) || has("GL_ARB_separate_shader_objects"),
        );
        caps.set(
          Capabilities::MULTISAMPLE_TEXTURE,
          at_least(3, 2) || has("GL_ARB_texture_multisample"),
        );
        caps.set(
          Capabilities::CONSTANT_BUFFER,
          at_least(3, 1) || has("GL_ARB_uniform_buffer_object"),
        );
        caps.set(
          Capabilities::DXT_IMAGES,
          has("GL_EXT_texture_compression_s3tc"),
        );
        caps.set(Capabilities::DEPTH_STENCIL_TEXTURE, at_least(3, 0));
        caps.set(Capabilities::FP_RENDER_TARGET, at_least(3, 0));
        caps.set(
          Capabilities::TIMER_QUERY,
          at_least(3, 3) || has("GL_ARB_timer_query"),
        );
        caps.set(
          Capabilities::COMMAND_SYNC,
          at_least(3, 2) || has("GL_ARB_sync"),
        );
        caps.set(Capabilities::TEXTURE_ARRAY, at_least(3, 0));
        caps.set(Capabilities::STANDARD_DERIVATIVES, true);
        caps.set(Capabilities::TEXTURE_LOD, true);
      }

      Api::OpenGlEs => {
        caps.set(
          Capabilities::TESSELLATION,
          at_least(3, 2) || has("GL_EXT_tessellation_shader"),
        );
        caps.set(
          Capabilities::GEOMETRY_STAGE,
          at_least(3, 2) || has("GL_EXT_geometry_shader"),
        );
        caps.set(Capabilities::COMPUTE, at_least(3, 1));
        caps.set(Capabilities::STORAGE_BUFFER, at_least(3, 1));
        caps.set(Capabilities::ATOMIC_COUNTER_BUFFER, at_least(3, 1));
        caps.set(Capabilities::IMAGE_LOAD_STORE, at_least(3, 1));
        caps.set(Capabilities::PROGRAM_PIPELINE, at_least(3, 1));
        caps.set(Capabilities::MULTISAMPLE_TEXTURE, at_least(3, 1));
        caps.set(Capabilities::CONSTANT_BUFFER, at_least(3, 0));
        caps.set(
          Capabilities::DXT_IMAGES,
          has("GL_EXT_texture_compression_s3tc") || has("GL_EXT_texture_compression_dxt1"),
        );
        caps.set(
          Capabilities::DEPTH_STENCIL_TEXTURE,
          at_least(3, 0) || has("GL_OES_packed_depth_stencil"),
        );
        caps.set(
          Capabilities::FP_RENDER_TARGET,
          has("GL_EXT_color_buffer_float") || has("GL_EXT_color_buffer_half_float"),
        );
        caps.set(
          Capabilities::TIMER_QUERY,
          has("GL_EXT_disjoint_timer_query"),
        );
        caps.set(Capabilities::COMMAND_SYNC, at_least(3, 0));
        caps.set(Capabilities::TEXTURE_ARRAY, at_least(3, 0));
        caps.set(
          Capabilities::STANDARD_DERIVATIVES,
          at_least(3, 0) || has("GL_OES_standard_derivatives"),
        );
        caps.set(
          Capabilities::TEXTURE_LOD,
          at_least(3, 0) || has("GL_EXT_shader_texture_lod"),
        );
      }
    }

    caps.set(Capabilities::PATH_RENDERING, has("GL_NV_path_rendering"));
    caps.set(
      Capabilities::ADVANCED_BLEND_NV,
      has("GL_NV_blend_equation_advanced"),
    );
    caps.set(
      Capabilities::ADVANCED_BLEND_KHR,
      has("GL_KHR_blend_equation_advanced"),
    );
    caps.set(
      Capabilities::ADVANCED_BLEND_KHR_COHERENT,
      has("GL_KHR_blend_equation_advanced_coherent"),
    );

    caps
  }

  /// Tessellation stages available?
  pub fn is_tessellation_supported(self) -> bool {
    self.contains(Capabilities::TESSELLATION)
  }

  /// Geometry stage available?
  pub fn is_geometry_stage_supported(self) -> bool {
    self.contains(Capabilities::GEOMETRY_STAGE)
  }

  /// Compute programs available?
  pub fn is_compute_supported(self) -> bool {
    self.contains(Capabilities::COMPUTE)
  }

  /// Storage buffers available?
  pub fn is_storage_buffer_supported(self) -> bool {
    self.contains(Capabilities::STORAGE_BUFFER)
  }

  /// Atomic counter buffers available?
  pub fn is_atomic_counter_buffer_supported(self) -> bool {
    self.contains(Capabilities::ATOMIC_COUNTER_BUFFER)
  }

  /// Image load / store available?
  pub fn is_shader_image_load_store_supported(self) -> bool {
    self.contains(Capabilities::IMAGE_LOAD_STORE)
  }

  /// Program pipelines available?
  pub fn is_program_pipeline_supported(self) -> bool {
    self.contains(Capabilities::PROGRAM_PIPELINE)
  }

  /// NV path rendering available?
  pub fn is_path_rendering_supported(self) -> bool {
    self.contains(Capabilities::PATH_RENDERING)
  }

  /// NV advanced blend equations available?
  pub fn is_advanced_blend_hw_supported(self) -> bool {
    self.contains(Capabilities::ADVANCED_BLEND_NV)
  }

  /// KHR advanced blend equations available?
  pub fn is_advanced_blend_hw_supported_khr(self) -> bool {
    self.contains(Capabilities::ADVANCED_BLEND_KHR)
  }

  /// Coherent KHR advanced blend equations available?
  pub fn is_blend_coherency_supported(self) -> bool {
    self.contains(Capabilities::ADVANCED_BLEND_KHR_COHERENT)
  }

  /// Is any hardware advanced blending available, or must it be emulated in software?
  pub fn needs_advanced_blend_fallback(self) -> bool {
    !self.intersects(Capabilities::ADVANCED_BLEND_NV | Capabilities::ADVANCED_BLEND_KHR)
  }

  /// Multisample textures available?
  pub fn is_multisample_texture_supported(self) -> bool {
    self.contains(Capabilities::MULTISAMPLE_TEXTURE)
  }

  /// Uniform blocks available?
  pub fn is_constant_buffer_supported(self) -> bool {
    self.contains(Capabilities::CONSTANT_BUFFER)
  }

  /// DXT compressed images available?
  pub fn are_dxt_images_supported(self) -> bool {
    self.contains(Capabilities::DXT_IMAGES)
  }

  /// Depth / stencil textures available?
  pub fn is_depth_stencil_texture_supported(self) -> bool {
    self.contains(Capabilities::DEPTH_STENCIL_TEXTURE)
  }

  /// Floating point render targets available?
  pub fn are_fp_render_targets_supported(self) -> bool {
    self.contains(Capabilities::FP_RENDER_TARGET)
  }

  /// Timer queries available?
  pub fn is_timer_query_supported(self) -> bool {
    self.contains(Capabilities::TIMER_QUERY)
  }

  /// Fence syncs available?
  pub fn is_command_sync_supported(self) -> bool {
    self.contains(Capabilities::COMMAND_SYNC)
  }

  /// Texture arrays available?
  pub fn is_texture_array_supported(self) -> bool {
    self.contains(Capabilities::TEXTURE_ARRAY)
  }

  /// Standard derivatives available?
  pub fn is_standard_derivatives_supported(self) -> bool {
    self.contains(Capabilities::STANDARD_DERIVATIVES)
  }

  /// Explicit texture LOD available?
  pub fn is_texture_lod_supported(self) -> bool {
    self.contains(Capabilities::TEXTURE_LOD)
  }
}

/// Numeric limits of a backend, queried once alongside [`Capabilities`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Limits {
  /// Number of combined texture image units.
  pub max_texture_units: u32,
  /// Number of uniform buffer binding points.
  pub max_constant_buffer_units: u32,
  /// Number of color attachments usable at once.
  pub max_draw_buffers: u32,
  /// Maximum number of samples of a multisample target.
  pub max_samples: u32,
  /// Maximum width / height of a 2D texture.
  pub max_texture_size: u32,
}

impl Default for Limits {
  // minimal guarantees of OpenGL ES 2.0
  fn default() -> Self {
    Limits {
      max_texture_units: 8,
      max_constant_buffer_units: 0,
      max_draw_buffers: 1,
      max_samples: 1,
      max_texture_size: 2048,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gl43_core() {
    let caps = Capabilities::probe::<&str>(GlVersion::new(Api::OpenGl, 4, 3), &[]);

    assert!(caps.is_tessellation_supported());
    assert!(caps.is_compute_supported());
    assert!(caps.is_storage_buffer_supported());
    assert!(caps.is_program_pipeline_supported());
    assert!(!caps.is_path_rendering_supported());
    assert!(caps.needs_advanced_blend_fallback());
  }

  #[test]
  fn gl33_with_extensions() {
    let caps = Capabilities::probe(
      GlVersion::new(Api::OpenGl, 3, 3),
      &["GL_ARB_compute_shader", "GL_KHR_blend_equation_advanced"],
    );

    assert!(!caps.is_tessellation_supported());
    assert!(caps.is_geometry_stage_supported());
    assert!(caps.is_compute_supported());
    assert!(caps.is_timer_query_supported());
    assert!(caps.is_advanced_blend_hw_supported_khr());
    assert!(!caps.is_advanced_blend_hw_supported());
    assert!(!caps.needs_advanced_blend_fallback());
  }

  #[test]
  fn es2_is_bare() {
    let caps = Capabilities::probe(
      GlVersion::new(Api::OpenGlEs, 2, 0),
      &["GL_OES_standard_derivatives"],
    );

    assert!(!caps.is_constant_buffer_supported());
    assert!(!caps.is_texture_array_supported());
    assert!(!caps.is_command_sync_supported());
    assert!(caps.is_standard_derivatives_supported());
    assert!(!caps.is_texture_lod_supported());
  }
}
