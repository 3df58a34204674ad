use stoat_core::{Error, Result, TensorRef};

use crate::kernels::elementwise::EltwiseCode;
use crate::kernels::reduce::ReduceCode;
use crate::registry::OpFamily;

// PrimitiveOp — An operation with a direct hardware kernel
//
// Clients bind inputs one at a time, then outputs, then finalize. The
// binding protocol is strict: every input slot index must be in range,
// no slot is bound twice, and no output may be bound before all required
// inputs are present. Violations are contract errors surfaced as
// BindingOrderViolation; a violated op can never reach the queue.

/// What a primitive operation computes, with its discriminators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpKind {
    /// One-input elementwise op (sigmoid, tanh, relu, copy).
    Unary(EltwiseCode),
    /// Two-input elementwise op (add, sub, mul).
    Binary(EltwiseCode),
    /// Same data under a different shape; lowered to the copy kernel.
    Reshape,
    /// Reduction along one axis.
    Reduce { code: ReduceCode, axis: usize },
    /// Dense matrix multiply, bias optional.
    MatMul { transpose_b: bool },
}

impl OpKind {
    /// (required inputs, total input slots).
    fn input_arity(&self) -> (usize, usize) {
        match self {
            OpKind::Unary(_) | OpKind::Reshape | OpKind::Reduce { .. } => (1, 1),
            OpKind::Binary(_) => (2, 2),
            OpKind::MatMul { .. } => (2, 3), // bias slot is optional
        }
    }

    pub fn family(&self) -> OpFamily {
        match self {
            OpKind::Unary(_) | OpKind::Binary(_) | OpKind::Reshape => OpFamily::Elementwise,
            OpKind::Reduce { .. } => OpFamily::Reduce,
            OpKind::MatMul { .. } => OpFamily::MatMul,
        }
    }

    pub fn name(&self) -> String {
        match self {
            OpKind::Unary(c) | OpKind::Binary(c) => c.name().to_string(),
            OpKind::Reshape => "reshape".to_string(),
            OpKind::Reduce { code, axis } => format!("{}_axis{}", code.name(), axis),
            OpKind::MatMul { transpose_b: false } => "matmul".to_string(),
            OpKind::MatMul { transpose_b: true } => "matmul_transb".to_string(),
        }
    }
}

/// One primitive operation instance, partway through binding.
#[derive(Debug, Clone)]
pub struct PrimitiveOp {
    kind: OpKind,
    inputs: Vec<Option<TensorRef>>,
    outputs: Vec<Option<TensorRef>>,
    required_inputs: usize,
}

impl PrimitiveOp {
    pub fn new(kind: OpKind) -> Self {
        let (required, total) = kind.input_arity();
        PrimitiveOp {
            kind,
            inputs: vec![None; total],
            outputs: vec![None; 1],
            required_inputs: required,
        }
    }

    pub fn kind(&self) -> &OpKind {
        &self.kind
    }

    pub fn name(&self) -> String {
        self.kind.name()
    }

    /// Bind the tensor at input slot `slot`.
    pub fn bind_input(&mut self, slot: usize, tensor: TensorRef) -> Result<()> {
        let declared = self.inputs.len();
        let entry = self.inputs.get_mut(slot).ok_or_else(|| Error::BindingOrderViolation {
            op: self.kind.name(),
            reason: format!("input slot {} past declared count {}", slot, declared),
        })?;
        if entry.is_some() {
            return Err(Error::BindingOrderViolation {
                op: self.kind.name(),
                reason: format!("input slot {} bound twice", slot),
            });
        }
        *entry = Some(tensor);
        Ok(())
    }

    /// Bind the tensor at output slot `slot`. All required inputs must
    /// already be bound.
    pub fn bind_output(&mut self, slot: usize, tensor: TensorRef) -> Result<()> {
        if !self.inputs_complete() {
            return Err(Error::BindingOrderViolation {
                op: self.kind.name(),
                reason: "output bound before all required inputs".to_string(),
            });
        }
        let declared = self.outputs.len();
        let entry = self.outputs.get_mut(slot).ok_or_else(|| Error::BindingOrderViolation {
            op: self.kind.name(),
            reason: format!("output slot {} past declared count {}", slot, declared),
        })?;
        if entry.is_some() {
            return Err(Error::BindingOrderViolation {
                op: self.kind.name(),
                reason: format!("output slot {} bound twice", slot),
            });
        }
        *entry = Some(tensor);
        Ok(())
    }

    /// Whether every required input slot is bound with a non-placeholder.
    pub fn inputs_complete(&self) -> bool {
        self.inputs[..self.required_inputs]
            .iter()
            .all(|s| matches!(s, Some(t) if !t.is_placeholder()))
    }

    /// Whether the op is fully bound and ready to finalize.
    pub fn ready(&self) -> bool {
        self.inputs_complete() && self.outputs.iter().all(Option::is_some)
    }

    /// Bound inputs in slot order, optional unbound slots skipped.
    pub fn bound_inputs(&self) -> Vec<TensorRef> {
        self.inputs.iter().flatten().cloned().collect()
    }

    pub fn bound_outputs(&self) -> Vec<TensorRef> {
        self.outputs.iter().flatten().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stoat_core::{DType, Quantization, TensorAttr, TensorSpec};
    use std::sync::Arc;

    fn t() -> TensorRef {
        Arc::new(TensorSpec::new(
            DType::U8,
            (4, 4),
            TensorAttr::Input,
            Quantization::AsymmetricAffine { scale: 1.0, zero_point: 0 },
        ))
    }

    #[test]
    fn test_output_before_inputs_fails() {
        let mut op = PrimitiveOp::new(OpKind::Binary(EltwiseCode::Add));
        op.bind_input(0, t()).unwrap();
        let err = op.bind_output(0, t()).unwrap_err();
        assert!(matches!(err, Error::BindingOrderViolation { .. }));
        op.bind_input(1, t()).unwrap();
        op.bind_output(0, t()).unwrap();
        assert!(op.ready());
    }

    #[test]
    fn test_slot_out_of_range_fails() {
        let mut op = PrimitiveOp::new(OpKind::Unary(EltwiseCode::Sigmoid));
        let err = op.bind_input(1, t()).unwrap_err();
        assert!(matches!(err, Error::BindingOrderViolation { .. }));
    }

    #[test]
    fn test_double_bind_fails() {
        let mut op = PrimitiveOp::new(OpKind::Unary(EltwiseCode::Tanh));
        op.bind_input(0, t()).unwrap();
        let err = op.bind_input(0, t()).unwrap_err();
        assert!(matches!(err, Error::BindingOrderViolation { .. }));
    }

    #[test]
    fn test_placeholder_does_not_satisfy_required_slot() {
        let mut op = PrimitiveOp::new(OpKind::Unary(EltwiseCode::Relu));
        op.bind_input(0, TensorSpec::placeholder()).unwrap();
        assert!(!op.inputs_complete());
    }

    #[test]
    fn test_optional_bias_slot() {
        let mut op = PrimitiveOp::new(OpKind::MatMul { transpose_b: false });
        op.bind_input(0, t()).unwrap();
        op.bind_input(1, t()).unwrap();
        // Bias left unbound: the op is still complete.
        assert!(op.inputs_complete());
        op.bind_output(0, t()).unwrap();
        assert_eq!(op.bound_inputs().len(), 2);
    }
}
