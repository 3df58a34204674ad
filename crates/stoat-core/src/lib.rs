//! # stoat-core
//!
//! Core value types for the stoat NPU dispatch compiler.
//!
//! This crate provides:
//! - [`DType`] / [`KernelClass`] — element types and their canonicalized
//!   classes for kernel-variant lookup
//! - [`Shape`] — tensor extents, innermost axis first
//! - [`Quantization`] — how integer storage maps to real values
//! - [`TensorSpec`] — the compile-time description of one tensor
//! - [`Error`] / [`Result`] — the workspace-wide error type

pub mod dtype;
pub mod error;
pub mod quant;
pub mod shape;
pub mod tensor;

pub use dtype::{DType, KernelClass, WithDType};
pub use error::{Error, Result};
pub use quant::{QuantKind, Quantization};
pub use shape::Shape;
pub use tensor::{TensorAttr, TensorRef, TensorSpec};
