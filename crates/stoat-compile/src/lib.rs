//! # stoat-compile
//!
//! The operator-dispatch compiler: everything between a fully bound
//! abstract operation and a dispatchable kernel instance.
//!
//! - [`grid`] — dispatch-grid planning (iteration domain, alignment)
//! - [`bridge`] — quantization rescale constants (scale/offset, m0/shift)
//! - [`key`] / [`registry`] / [`kernels`] — variant keys and the static
//!   per-backend kernel tables
//! - [`params`] — named kernel parameter layouts
//! - [`op`] — primitive operations and the binding protocol
//! - [`composite`] — virtual ops decomposed into primitive subgraphs
//! - [`compile`] — the finalize pipeline tying it all together

pub mod bridge;
pub mod compile;
pub mod composite;
pub mod grid;
pub mod kernels;
pub mod key;
pub mod op;
pub mod params;
pub mod registry;

pub use compile::{finalize, CompiledKernel};
pub use composite::{BindState, CompositeOp, Decomposition, DenseLayer, SequenceCell};
pub use grid::{plan_grid, DispatchGrid};
pub use key::{BitPacker, VariantKey};
pub use op::{OpKind, PrimitiveOp};
pub use params::{ParamLayout, ParamSlot, ScalarValue};
pub use registry::{Backend, KernelDescriptor, OpFamily};
