//! Operations
//!
//! The pluggable units of work invoked by `CALL`.
//!
//! # Overview
//!
//! An [`Operation`] has an `init`/`release` lifecycle and an `execute` that
//! consumes inputs from a [`Parameters`] view and pushes its outputs back. A
//! [`Pass`] is the specialization for framebuffer-bound drawing; wrap it in a
//! [`PassOperation`] to run it as `begin` → `render` → `end` against the render
//! target the instance binds on every resize.
//!
//! Applications register factories under string identifiers in an
//! [`OperationRegistry`]; the compiler instantiates one operation per pass node
//! from the node's `subtype` metadata.

mod registry;

pub use registry::{OperationFactory, OperationRegistry};

use crate::resource::NativeHandle;
use crate::vm::Parameters;

/// The framebuffer an operation draws into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderTarget {
    /// Native framebuffer handle. [`NativeHandle::NULL`] is the window surface.
    pub framebuffer: NativeHandle,
    pub width: u32,
    pub height: u32,
}

/// A unit of work executed by `CALL`.
pub trait Operation: Send {
    /// Called once after creation. Returning false fails compilation.
    fn init(&mut self) -> bool {
        true
    }

    /// Called when the owning instance is released.
    fn release(&mut self) {}

    /// Run the operation.
    ///
    /// Inputs pop last port first; outputs must be pushed in port order.
    /// Returning false stops the current frame.
    fn execute(&mut self, parameters: &mut Parameters<'_>) -> bool;

    /// Bind the render target. Called on every instance resize.
    fn set_framebuffer(&mut self, _target: RenderTarget) {}
}

/// Framebuffer-bound render work.
///
/// `begin` and `end` bracket attachment load/store behavior and default to
/// doing nothing.
pub trait Pass: Send {
    fn init(&mut self) -> bool {
        true
    }

    fn release(&mut self) {}

    fn begin(&mut self, _target: &RenderTarget) -> bool {
        true
    }

    fn render(&mut self, target: &RenderTarget, parameters: &mut Parameters<'_>) -> bool;

    fn end(&mut self, _target: &RenderTarget) -> bool {
        true
    }
}

/// Runs a [`Pass`] as an [`Operation`].
#[derive(Debug, Default)]
pub struct PassOperation<P> {
    pass: P,
    target: RenderTarget,
}

impl<P: Pass> PassOperation<P> {
    pub fn new(pass: P) -> Self {
        Self {
            pass,
            target: RenderTarget::default(),
        }
    }

    pub fn pass(&self) -> &P {
        &self.pass
    }

    /// The render target bound by the last resize.
    pub fn target(&self) -> RenderTarget {
        self.target
    }
}

impl<P: Pass> Operation for PassOperation<P> {
    fn init(&mut self) -> bool {
        self.pass.init()
    }

    fn release(&mut self) {
        self.target = RenderTarget::default();
        self.pass.release();
    }

    fn execute(&mut self, parameters: &mut Parameters<'_>) -> bool {
        if !self.pass.begin(&self.target) {
            return false;
        }
        if !self.pass.render(&self.target, parameters) {
            return false;
        }
        self.pass.end(&self.target)
    }

    fn set_framebuffer(&mut self, target: RenderTarget) {
        self.target = target;
    }
}
