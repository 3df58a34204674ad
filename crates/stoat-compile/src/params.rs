use stoat_core::{Error, Result, TensorRef};

// ParamLayout — The ordered parameter list a kernel expects
//
// A kernel entry point takes tensors and scalar constants in a fixed
// positional order. Each slot is a named, typed value rather than a magic
// index, and binding validates the bound tensor list against the declared
// slots.

/// Data direction of one parameter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotDir {
    In,
    Out,
}

/// Whether a slot carries a tensor handle or a scalar constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Tensor,
    Scalar,
}

/// One declared parameter slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSlot {
    pub name: &'static str,
    pub dir: SlotDir,
    pub kind: SlotKind,
    pub required: bool,
}

impl ParamSlot {
    pub fn input(name: &'static str) -> Self {
        ParamSlot { name, dir: SlotDir::In, kind: SlotKind::Tensor, required: true }
    }

    pub fn optional_input(name: &'static str) -> Self {
        ParamSlot { name, dir: SlotDir::In, kind: SlotKind::Tensor, required: false }
    }

    pub fn output(name: &'static str) -> Self {
        ParamSlot { name, dir: SlotDir::Out, kind: SlotKind::Tensor, required: true }
    }

    pub fn scalar(name: &'static str) -> Self {
        ParamSlot { name, dir: SlotDir::In, kind: SlotKind::Scalar, required: true }
    }
}

/// The full ordered slot list of one kernel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParamLayout {
    slots: Vec<ParamSlot>,
}

impl ParamLayout {
    pub fn new(slots: Vec<ParamSlot>) -> Self {
        ParamLayout { slots }
    }

    pub fn slots(&self) -> &[ParamSlot] {
        &self.slots
    }

    fn count(&self, dir: SlotDir, required_only: bool) -> usize {
        self.slots
            .iter()
            .filter(|s| s.dir == dir && s.kind == SlotKind::Tensor && (!required_only || s.required))
            .count()
    }

    /// Tensor input slots (required, total).
    pub fn input_arity(&self) -> (usize, usize) {
        (self.count(SlotDir::In, true), self.count(SlotDir::In, false))
    }

    /// Tensor output slots (required, total).
    pub fn output_arity(&self) -> (usize, usize) {
        (self.count(SlotDir::Out, true), self.count(SlotDir::Out, false))
    }

    /// Number of scalar slots the initializer must fill.
    pub fn scalar_count(&self) -> usize {
        self.slots.iter().filter(|s| s.kind == SlotKind::Scalar).count()
    }

    /// Validate a bound tensor list against the declared tensor slots.
    /// Placeholders are accepted only in optional slots.
    pub fn validate(&self, op: &str, inputs: &[TensorRef], outputs: &[TensorRef]) -> Result<()> {
        let (in_req, in_total) = self.input_arity();
        let (out_req, out_total) = self.output_arity();
        if inputs.len() < in_req || inputs.len() > in_total {
            return Err(Error::ParamArityMismatch {
                op: op.to_string(),
                declared: in_total,
                got: inputs.len(),
            });
        }
        if outputs.len() < out_req || outputs.len() > out_total {
            return Err(Error::ParamArityMismatch {
                op: op.to_string(),
                declared: out_total,
                got: outputs.len(),
            });
        }
        let in_slots: Vec<&ParamSlot> = self
            .slots
            .iter()
            .filter(|s| s.dir == SlotDir::In && s.kind == SlotKind::Tensor)
            .collect();
        for (slot, t) in in_slots.iter().zip(inputs.iter()) {
            if t.is_placeholder() && slot.required {
                return Err(Error::BindingOrderViolation {
                    op: op.to_string(),
                    reason: format!("required slot '{}' bound to a placeholder", slot.name),
                });
            }
        }
        Ok(())
    }
}

/// A scalar constant produced by a kernel initializer.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    F32(f32),
    I32(i32),
    U32(u32),
    /// A 16-bit constant replicated across SIMD lanes.
    Lanes(Vec<u16>),
    /// A per-channel constant buffer filling one slot.
    U32Array(Vec<u32>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use stoat_core::{DType, Quantization, TensorAttr, TensorSpec};
    use std::sync::Arc;

    fn tensor() -> TensorRef {
        Arc::new(TensorSpec::new(
            DType::U8,
            (4, 4),
            TensorAttr::Input,
            Quantization::None,
        ))
    }

    fn layout() -> ParamLayout {
        ParamLayout::new(vec![
            ParamSlot::input("input"),
            ParamSlot::optional_input("bias"),
            ParamSlot::output("output"),
            ParamSlot::scalar("scale"),
            ParamSlot::scalar("offset"),
        ])
    }

    #[test]
    fn test_arities() {
        let l = layout();
        assert_eq!(l.input_arity(), (1, 2));
        assert_eq!(l.output_arity(), (1, 1));
        assert_eq!(l.scalar_count(), 2);
    }

    #[test]
    fn test_validate_accepts_optional_omitted() {
        let l = layout();
        l.validate("add", &[tensor()], &[tensor()]).unwrap();
        l.validate("add", &[tensor(), tensor()], &[tensor()]).unwrap();
    }

    #[test]
    fn test_validate_rejects_wrong_arity() {
        let l = layout();
        let err = l.validate("add", &[], &[tensor()]).unwrap_err();
        assert!(matches!(err, Error::ParamArityMismatch { .. }));
        let err = l
            .validate("add", &[tensor(), tensor(), tensor()], &[tensor()])
            .unwrap_err();
        assert!(matches!(err, Error::ParamArityMismatch { .. }));
    }

    #[test]
    fn test_validate_rejects_placeholder_in_required_slot() {
        let l = layout();
        let err = l
            .validate("add", &[TensorSpec::placeholder()], &[tensor()])
            .unwrap_err();
        assert!(matches!(err, Error::BindingOrderViolation { .. }));
        // A placeholder in the optional slot is fine.
        l.validate("add", &[tensor(), TensorSpec::placeholder()], &[tensor()])
            .unwrap();
    }
}
