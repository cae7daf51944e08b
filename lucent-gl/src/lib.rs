//! OpenGL backend.
//!
//! This crate exports an [OpenGL](https://www.khronos.org/opengl/) implementation of the
//! [`Backend`](lucent::backend::Backend) trait of [lucent](https://crates.io/crates/lucent). A
//! single type, [`GlBackend`], drives OpenGL ES 2.0 and later, OpenGL 3.x and OpenGL 4.x; the code
//! paths follow the profile picked from the version string the driver reports.
//!
//! Context creation is out of scope: create a context with the windowing library of your choice,
//! make it current and hand its symbol loader to [`GlBackend::load_with`].

mod backend;
mod buffer;
mod convert;
mod framebuffer;
mod input_assembler;
mod pipeline;
mod query;
mod shader;
mod state;
mod texture;

pub use crate::backend::GlBackend;
