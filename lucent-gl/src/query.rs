//! Queries, fences and path objects.

use crate::backend::GlBackend;
use crate::convert::query_type;
use gl::types::*;
use lucent::backend::handle::{PathHandle, QueryHandle, SyncHandle};
use lucent::query::QueryType;

pub(crate) unsafe fn create() -> Option<QueryHandle> {
  let mut handle: GLuint = 0;
  gl::GenQueries(1, &mut handle);

  QueryHandle::from_raw(handle.into())
}

pub(crate) unsafe fn begin(query: QueryHandle, ty: QueryType) {
  gl::BeginQuery(query_type(ty), query.raw() as GLuint);
}

pub(crate) unsafe fn end(ty: QueryType) {
  gl::EndQuery(query_type(ty));
}

pub(crate) unsafe fn timestamp(query: QueryHandle) {
  if gl::QueryCounter::is_loaded() {
    gl::QueryCounter(query.raw() as GLuint, gl::TIMESTAMP);
  }
}

pub(crate) unsafe fn result(query: QueryHandle) -> Option<u64> {
  let handle = query.raw() as GLuint;

  let mut available: GLuint = 0;
  gl::GetQueryObjectuiv(handle, gl::QUERY_RESULT_AVAILABLE, &mut available);

  if available == 0 {
    return None;
  }

  if gl::GetQueryObjectui64v::is_loaded() {
    let mut value: GLuint64 = 0;
    gl::GetQueryObjectui64v(handle, gl::QUERY_RESULT, &mut value);
    Some(value)
  } else {
    let mut value: GLuint = 0;
    gl::GetQueryObjectuiv(handle, gl::QUERY_RESULT, &mut value);
    Some(value.into())
  }
}

pub(crate) unsafe fn release(query: QueryHandle) {
  let handle = query.raw() as GLuint;
  gl::DeleteQueries(1, &handle);
}

pub(crate) unsafe fn create_sync(backend: &mut GlBackend) -> Option<SyncHandle> {
  let sync = gl::FenceSync(gl::SYNC_GPU_COMMANDS_COMPLETE, 0);

  if sync.is_null() {
    return None;
  }

  let handle = SyncHandle::from_raw(backend.ids.allocate())?;
  backend.syncs.insert(handle, sync);
  Some(handle)
}

pub(crate) unsafe fn wait_sync(backend: &GlBackend, sync: SyncHandle) {
  if let Some(&sync) = backend.syncs.get(&sync) {
    gl::WaitSync(sync, 0, gl::TIMEOUT_IGNORED);
  }
}

pub(crate) unsafe fn release_sync(backend: &mut GlBackend, sync: SyncHandle) {
  if let Some(sync) = backend.syncs.remove(&sync) {
    gl::DeleteSync(sync);
  }
}

pub(crate) unsafe fn create_paths(backend: &GlBackend, range: u32) -> Option<PathHandle> {
  let gen_paths = backend.extensions.gen_paths?;
  PathHandle::from_raw(gen_paths(range as GLsizei).into())
}

pub(crate) unsafe fn release_paths(backend: &GlBackend, paths: PathHandle, range: u32) {
  if let Some(delete_paths) = backend.extensions.delete_paths {
    delete_paths(paths.raw() as GLuint, range as GLsizei);
  }
}
