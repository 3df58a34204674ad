//! # Stoat
//!
//! The operator-dispatch compiler core of an NPU tensor-graph runtime.
//!
//! This is the top-level facade crate that re-exports everything you need.
//!
//! | Crate | Purpose |
//! |-------|----------|
//! | `stoat-core` | DType, Shape, Quantization, TensorSpec, Error |
//! | `stoat-compile` | Grid planning, quantization bridging, kernel variant tables, composite decomposition, finalize |
//! | `stoat-exec` | Worker pool + FIFO queue executing compiled graphs |
//!
//! The flow: bind an operation's inputs and outputs
//! ([`PrimitiveOp`] directly, or through a [`CompositeOp`] which expands
//! into primitives once its inputs are complete), [`finalize`] it for a
//! [`Backend`] to get a [`CompiledKernel`], and hand the resulting graph
//! to a [`GraphExecutionQueue`].

/// Re-export core value types.
pub use stoat_core::{
    DType, Error, KernelClass, QuantKind, Quantization, Result, Shape, TensorAttr, TensorRef,
    TensorSpec, WithDType,
};

/// Re-export the compiler surface.
pub use stoat_compile::{
    finalize, Backend, BindState, BitPacker, CompiledKernel, CompositeOp, Decomposition,
    DenseLayer, DispatchGrid, KernelDescriptor, OpFamily, OpKind, ParamLayout, ParamSlot,
    PrimitiveOp, ScalarValue, SequenceCell, VariantKey,
};

/// Re-export the compiler internals for table inspection and bridging.
pub mod compile {
    pub use stoat_compile::{bridge, grid, kernels, key, params, registry};
}

/// Re-export the execution queue.
pub use stoat_exec::{CompletionCallback, ExecutableGraph, GraphExecutionQueue};
