//! GPU queries, fences and path objects.

use crate::backend::handle::{PathHandle, QueryHandle, SyncHandle};
use crate::context::{ContextCore, ResourceError};
use log::error;
use std::cell::Cell;
use std::rc::Rc;

/// What a query measures.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum QueryType {
  /// GPU time elapsed between begin and end, in nanoseconds.
  TimeElapsed,
  /// Whether any sample passed the depth test between begin and end.
  AnySamplesPassed,
}

/// A timer query.
#[derive(Debug)]
pub struct TimerQuery {
  core: Rc<ContextCore>,
  handle: QueryHandle,
  active: Cell<bool>,
}

impl TimerQuery {
  pub(crate) fn new(core: Rc<ContextCore>) -> Result<Self, ResourceError> {
    if !core.capabilities().is_timer_query_supported() {
      return Err(ResourceError::Unsupported("timer queries"));
    }

    let handle = core
      .backend()
      .create_query()
      .ok_or_else(|| ResourceError::creation_failed("query"))?;

    Ok(TimerQuery {
      core,
      handle,
      active: Cell::new(false),
    })
  }

  /// Backend handle.
  pub fn handle(&self) -> QueryHandle {
    self.handle
  }

  /// Start measuring.
  pub fn begin(&self) {
    if self.active.replace(true) {
      error!("timer query {:?} already started", self.handle);
      return;
    }

    self
      .core
      .backend()
      .begin_query(self.handle, QueryType::TimeElapsed);
  }

  /// Stop measuring.
  pub fn end(&self) {
    if !self.active.replace(false) {
      error!("timer query {:?} was not started", self.handle);
      return;
    }

    self
      .core
      .backend()
      .end_query(self.handle, QueryType::TimeElapsed);
  }

  /// Record the GPU time once every previous command completed.
  pub fn timestamp(&self) {
    self.core.backend().query_timestamp(self.handle);
  }

  /// Measured nanoseconds, or `None` while the GPU is not done.
  pub fn result(&self) -> Option<u64> {
    if self.active.get() {
      return None;
    }

    self.core.backend().query_result(self.handle)
  }
}

impl Drop for TimerQuery {
  fn drop(&mut self) {
    self.core.backend().release_query(self.handle);
    let removed = self.core.registry().queries.remove(self.handle);
    debug_assert!(removed, "query {:?} released twice", self.handle);
  }
}

/// A fence inserted in the command stream when created.
#[derive(Debug)]
pub struct Fence {
  core: Rc<ContextCore>,
  handle: SyncHandle,
}

impl Fence {
  pub(crate) fn new(core: Rc<ContextCore>) -> Result<Self, ResourceError> {
    if !core.capabilities().is_command_sync_supported() {
      return Err(ResourceError::Unsupported("command sync"));
    }

    let handle = core
      .backend()
      .create_sync()
      .ok_or_else(|| ResourceError::creation_failed("sync"))?;

    Ok(Fence { core, handle })
  }

  /// Backend handle.
  pub fn handle(&self) -> SyncHandle {
    self.handle
  }

  /// Make the GPU wait until the commands before the fence completed.
  pub fn wait(&self) {
    self.core.backend().wait_sync(self.handle);
  }
}

impl Drop for Fence {
  fn drop(&mut self) {
    self.core.backend().release_sync(self.handle);
    let removed = self.core.registry().fences.remove(self.handle);
    debug_assert!(removed, "fence {:?} released twice", self.handle);
  }
}

/// A contiguous range of path objects.
#[derive(Debug)]
pub struct PathObjects {
  core: Rc<ContextCore>,
  handle: PathHandle,
  range: u32,
}

impl PathObjects {
  pub(crate) fn new(core: Rc<ContextCore>, range: u32) -> Result<Self, ResourceError> {
    if !core.capabilities().is_path_rendering_supported() {
      return Err(ResourceError::Unsupported("path rendering"));
    }

    if range == 0 {
      return Err(ResourceError::InvalidArgument(
        "empty path object range".to_owned(),
      ));
    }

    let handle = core
      .backend()
      .create_path_objects(range)
      .ok_or_else(|| ResourceError::creation_failed("path objects"))?;

    Ok(PathObjects {
      core,
      handle,
      range,
    })
  }

  /// Backend handle of the first path.
  pub fn handle(&self) -> PathHandle {
    self.handle
  }

  /// Number of paths.
  pub fn range(&self) -> u32 {
    self.range
  }
}

impl Drop for PathObjects {
  fn drop(&mut self) {
    self
      .core
      .backend()
      .release_path_objects(self.handle, self.range);
    let removed = self.core.registry().paths.remove(self.handle);
    debug_assert!(removed, "path objects {:?} released twice", self.handle);
  }
}
