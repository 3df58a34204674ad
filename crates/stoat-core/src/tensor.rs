use std::sync::Arc;

use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::quant::Quantization;
use crate::shape::Shape;

// TensorSpec — What the compiler knows about a tensor
//
// The dispatch compiler never sees tensor data. A TensorSpec is the full
// compile-time description: element type, extents, where the tensor lives
// in the graph (attribute), and how its integers map to reals. Specs are
// immutable once created except for set_shape, which must preserve the
// element count.

/// Where a tensor sits in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TensorAttr {
    /// Caller-provided graph input.
    Input,
    /// Caller-visible graph output.
    Output,
    /// Weight or other constant baked into the graph.
    Constant,
    /// Internally allocated, no caller-visible identity; carries data
    /// between primitive operations inside a decomposition.
    Transient,
    /// A not-provided optional operand. Never backed by storage; binding
    /// machinery must forward it transparently rather than allocate.
    Placeholder,
}

/// Compile-time description of one tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorSpec {
    dtype: DType,
    shape: Shape,
    attr: TensorAttr,
    quant: Quantization,
}

/// Shared handle to a tensor spec. Operations hold these in their bound
/// input/output slots; the graph owner and the decomposer share them.
pub type TensorRef = Arc<TensorSpec>;

impl TensorSpec {
    pub fn new(dtype: DType, shape: impl Into<Shape>, attr: TensorAttr, quant: Quantization) -> Self {
        TensorSpec {
            dtype,
            shape: shape.into(),
            attr,
            quant,
        }
    }

    /// An internally allocated transient tensor.
    pub fn transient(dtype: DType, shape: impl Into<Shape>, quant: Quantization) -> TensorRef {
        Arc::new(Self::new(dtype, shape, TensorAttr::Transient, quant))
    }

    /// A placeholder standing in for a not-provided optional operand.
    /// Carries no meaningful dtype or extent.
    pub fn placeholder() -> TensorRef {
        Arc::new(Self::new(
            DType::U8,
            Shape::new(vec![]),
            TensorAttr::Placeholder,
            Quantization::None,
        ))
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn attr(&self) -> TensorAttr {
        self.attr
    }

    pub fn quant(&self) -> &Quantization {
        &self.quant
    }

    pub fn is_placeholder(&self) -> bool {
        self.attr == TensorAttr::Placeholder
    }

    /// Replace the shape. The new shape must describe the same number of
    /// elements; a tensor cannot grow or shrink after creation.
    pub fn set_shape(&mut self, shape: impl Into<Shape>) -> Result<()> {
        let shape = shape.into();
        if shape.elem_count() != self.shape.elem_count() {
            return Err(Error::ElementCountMismatch {
                expected: self.shape.elem_count(),
                got: shape.elem_count(),
                shape,
            });
        }
        self.shape = shape;
        Ok(())
    }

    /// Same spec under a different shape with equal element count.
    /// Used for the trailing reshape a decomposition emits when its
    /// natural output rank differs from the declared contract.
    pub fn reshaped(&self, shape: impl Into<Shape>) -> Result<TensorSpec> {
        let mut out = self.clone();
        out.set_shape(shape)?;
        Ok(out)
    }
}
