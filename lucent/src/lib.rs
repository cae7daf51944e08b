//! # lucent
//!
//! GPU resource and render-context core.
//!
//! This crate maps a single logical rendering API (buffers, textures, shaders, framebuffers and
//! pipeline state) onto a concrete graphics backend. The backend is anything implementing the
//! [`Backend`] trait; the `lucent-gl` crate provides OpenGL (ES2, GL3 and GL4 profiles) and this
//! crate ships a recording [`NullBackend`] that runs everywhere.
//!
//! The central type is [`RenderContext`]. It:
//!
//! - Creates every GPU resource object (vertex buffers, textures, framebuffers, shader programs,
//!   …). Each resource owns exactly one backend handle and releases it when dropped.
//! - Keeps non-owning lookup tables so that code holding only a handle (or, for named buffers,
//!   only a name) can find the owning resource.
//! - Tracks a snapshot of the hardware state it has pushed to the driver, so that setting a
//!   property to its current value never reaches the backend.
//! - Offers a push / pop stack of that snapshot to save and restore state cheaply around nested
//!   renders.
//!
//! # Threading
//!
//! Everything here is single-threaded and synchronous: the types are `!Send` and `!Sync` and every
//! operation is forwarded to the backend on the calling thread, in call order.
//!
//! [`Backend`]: crate::backend::Backend
//! [`NullBackend`]: crate::backend::null::NullBackend
//! [`RenderContext`]: crate::context::RenderContext

#![deny(missing_docs)]

pub mod backend;
pub mod blending;
pub mod buffer;
pub mod capabilities;
pub mod component;
pub mod context;
pub mod depth_stencil;
pub mod framebuffer;
pub mod input_assembler;
pub mod linear;
pub mod pixel;
pub mod program_pipeline;
pub mod query;
pub mod render_buffer;
pub mod render_state;
pub mod shader;
pub mod texture;
pub mod version;

mod registry;

pub use crate::context::RenderContext;
