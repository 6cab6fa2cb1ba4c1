//! Backend abstraction for the renderer coupler
//!
//! The coupler decides what is drawn; a backend decides how. Backends are
//! retained: a submitted record stays on screen until it is replaced or
//! released.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::foundation::collections::EntityId;
use crate::foundation::math::Vector;
use crate::physics::DebugShape;

use super::commands::{DrawRecord, FrameInfo};
use super::RenderError;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, RenderError>;

/// Drawing surface
pub trait RenderBackend {
    /// Current surface size in pixels
    fn size(&self) -> Vector;

    /// Start a frame
    fn begin_frame(&mut self, frame: &FrameInfo) -> BackendResult<()>;

    /// Create or replace the record of `record.entity`
    fn submit(&mut self, record: &DrawRecord) -> BackendResult<()>;

    /// Drop everything held for `entity`
    fn release(&mut self, entity: EntityId);

    /// Present the frame
    fn draw(&mut self) -> BackendResult<()>;

    /// Overlay collider outlines
    fn draw_debug(&mut self, shapes: &[DebugShape]) -> BackendResult<()>;
}

/// A call recorded by [`HeadlessBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    /// `begin_frame`
    BeginFrame(FrameInfo),
    /// `submit`
    Submit(DrawRecord),
    /// `release`
    Release(EntityId),
    /// `draw`
    Draw,
    /// `draw_debug` with the number of shapes
    DrawDebug(usize),
}

/// Backend without a surface that records every call.
///
/// Clones share the same log and size, so a test can keep one handle and
/// give the other to the engine.
#[derive(Debug, Clone)]
pub struct HeadlessBackend {
    size: Rc<Cell<Vector>>,
    log: Rc<RefCell<Vec<BackendCall>>>,
}

impl HeadlessBackend {
    /// Backend reporting `size`
    pub fn new(size: Vector) -> Self {
        Self {
            size: Rc::new(Cell::new(size)),
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Pretend the surface was resized
    pub fn set_size(&self, size: Vector) {
        self.size.set(size);
    }

    /// Recorded calls
    pub fn calls(&self) -> Vec<BackendCall> {
        self.log.borrow().clone()
    }

    /// Forget recorded calls
    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }

    /// Entities submitted so far, in order
    pub fn submitted(&self) -> Vec<EntityId> {
        self.log
            .borrow()
            .iter()
            .filter_map(|call| match call {
                BackendCall::Submit(record) => Some(record.entity),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: BackendCall) {
        self.log.borrow_mut().push(call);
    }
}

impl RenderBackend for HeadlessBackend {
    fn size(&self) -> Vector {
        self.size.get()
    }

    fn begin_frame(&mut self, frame: &FrameInfo) -> BackendResult<()> {
        self.record(BackendCall::BeginFrame(frame.clone()));
        Ok(())
    }

    fn submit(&mut self, record: &DrawRecord) -> BackendResult<()> {
        self.record(BackendCall::Submit(record.clone()));
        Ok(())
    }

    fn release(&mut self, entity: EntityId) {
        self.record(BackendCall::Release(entity));
    }

    fn draw(&mut self) -> BackendResult<()> {
        self.record(BackendCall::Draw);
        Ok(())
    }

    fn draw_debug(&mut self, shapes: &[DebugShape]) -> BackendResult<()> {
        self.record(BackendCall::DrawDebug(shapes.len()));
        Ok(())
    }
}
