use stoat_core::{Error, Result, Shape, TensorRef, TensorSpec};

use crate::kernels::elementwise::EltwiseCode;
use crate::op::{OpKind, PrimitiveOp};

// CompositeOpDecomposer — Virtual ops expanded into primitive subgraphs
//
// A composite operation has no hardware kernel; once all of its declared
// inputs are bound it expands into transient tensors plus primitive
// operations, which are then subject to the ordinary binding and finalize
// protocol. Expansion is lazy because transient shapes derive from the
// fully known operand shapes (splitting a stacked weight needs the stack
// extent). The "all inputs present" transition is an explicit, testable
// event: finalize_inputs() fires automatically on the last required bind
// but can also be called (and asserted on) directly.

/// Lifecycle of one composite instance. Binding order is significant:
/// all inputs strictly before any output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindState {
    CollectingInputs,
    Wired,
    CollectingOutputs,
    Finalized,
}

/// One declared input or output slot of a composite contract.
#[derive(Debug, Clone, Copy)]
pub struct SlotSpec {
    pub name: &'static str,
    pub required: bool,
}

impl SlotSpec {
    pub const fn required(name: &'static str) -> Self {
        SlotSpec { name, required: true }
    }
    pub const fn optional(name: &'static str) -> Self {
        SlotSpec { name, required: false }
    }
}

/// A sub-operation output that becomes caller-visible at connect time.
/// `natural` is the tensor the decomposition would naturally produce; if
/// the caller's bound output has a different rank, a trailing reshape is
/// inserted instead of binding directly.
#[derive(Debug, Clone)]
pub struct FinalLink {
    pub op_index: usize,
    pub natural: TensorSpec,
}

/// The expanded subgraph of one composite instance.
pub struct Wiring {
    pub sub_ops: Vec<PrimitiveOp>,
    pub transients: Vec<TensorRef>,
    /// One link per declared output slot, in slot order. The linked
    /// sub-ops are fully input-bound with output slot 0 left open.
    pub finals: Vec<FinalLink>,
}

/// The per-decomposition behavior: declared arity and the expansion
/// itself. Implementations must be reconstructible from their constructor
/// parameters alone so cloning never reuses wired state.
pub trait Decomposition: Send {
    fn name(&self) -> &'static str;
    fn input_slots(&self) -> &'static [SlotSpec];
    fn output_slots(&self) -> &'static [SlotSpec];

    /// Expand into sub-operations and transients. `inputs` has one entry
    /// per declared slot; not-provided optionals are placeholders.
    fn wire(&self, inputs: &[TensorRef]) -> Result<Wiring>;

    fn clone_box(&self) -> Box<dyn Decomposition>;
}

/// A composite operation instance: the bind-state machine around one
/// Decomposition.
pub struct CompositeOp {
    decomposition: Box<dyn Decomposition>,
    state: BindState,
    inputs: Vec<Option<TensorRef>>,
    outputs: Vec<Option<TensorRef>>,
    wiring: Option<Wiring>,
}

impl CompositeOp {
    pub fn new(decomposition: Box<dyn Decomposition>) -> Self {
        let n_in = decomposition.input_slots().len();
        let n_out = decomposition.output_slots().len();
        CompositeOp {
            decomposition,
            state: BindState::CollectingInputs,
            inputs: vec![None; n_in],
            outputs: vec![None; n_out],
            wiring: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.decomposition.name()
    }

    pub fn state(&self) -> BindState {
        self.state
    }

    fn violation(&self, reason: impl Into<String>) -> Error {
        Error::BindingOrderViolation {
            op: self.name().to_string(),
            reason: reason.into(),
        }
    }

    fn required_inputs_bound(&self) -> bool {
        self.decomposition
            .input_slots()
            .iter()
            .zip(self.inputs.iter())
            .all(|(spec, slot)| !spec.required || matches!(slot, Some(t) if !t.is_placeholder()))
    }

    /// Bind the tensor at input slot `slot`. On the transition into the
    /// last required slot the composite wires itself.
    pub fn bind_input(&mut self, slot: usize, tensor: TensorRef) -> Result<()> {
        if self.state != BindState::CollectingInputs {
            // A late optional bind is a contract misuse worth naming: the
            // composite wires itself on the last required input, so
            // optionals provided after that point can never take effect.
            let is_optional = self
                .decomposition
                .input_slots()
                .get(slot)
                .is_some_and(|s| !s.required);
            if is_optional {
                return Err(self.violation(format!(
                    "optional input slot {} bound after wiring; optional inputs must be bound before the last required input",
                    slot
                )));
            }
            return Err(self.violation(format!("input bound in state {:?}", self.state)));
        }
        let name = self.decomposition.name();
        let declared = self.inputs.len();
        let entry = self
            .inputs
            .get_mut(slot)
            .ok_or_else(|| Error::BindingOrderViolation {
                op: name.to_string(),
                reason: format!("input slot {} past declared count {}", slot, declared),
            })?;
        if entry.is_some() {
            return Err(Error::BindingOrderViolation {
                op: name.to_string(),
                reason: format!("input slot {} bound twice", slot),
            });
        }
        *entry = Some(tensor);
        if self.required_inputs_bound() {
            self.finalize_inputs()?;
        }
        Ok(())
    }

    /// The "all inputs present" event: allocate transients, instantiate
    /// and bind the internal primitive operations, move to Wired.
    /// Fails if required inputs are still missing.
    pub fn finalize_inputs(&mut self) -> Result<()> {
        if self.state != BindState::CollectingInputs {
            return Err(self.violation(format!("finalize_inputs in state {:?}", self.state)));
        }
        if !self.required_inputs_bound() {
            return Err(self.violation("finalize_inputs before all required inputs"));
        }
        // Not-provided optionals become placeholders, which the wiring
        // must forward rather than back with storage.
        let inputs: Vec<TensorRef> = self
            .inputs
            .iter()
            .map(|s| s.clone().unwrap_or_else(TensorSpec::placeholder))
            .collect();
        let wiring = self.decomposition.wire(&inputs)?;
        debug_assert_eq!(wiring.finals.len(), self.outputs.len());
        self.wiring = Some(wiring);
        self.state = BindState::Wired;
        Ok(())
    }

    /// Bind the caller-visible output at `slot`; on the last required
    /// slot, connect the decomposition's final tensors and finalize.
    pub fn bind_output(&mut self, slot: usize, tensor: TensorRef) -> Result<()> {
        match self.state {
            BindState::Wired => self.state = BindState::CollectingOutputs,
            BindState::CollectingOutputs => {}
            BindState::CollectingInputs => {
                return Err(self.violation("output bound before all required inputs"));
            }
            BindState::Finalized => {
                return Err(self.violation("output bound after finalization"));
            }
        }
        let name = self.decomposition.name();
        let declared = self.outputs.len();
        let entry = self
            .outputs
            .get_mut(slot)
            .ok_or_else(|| Error::BindingOrderViolation {
                op: name.to_string(),
                reason: format!("output slot {} past declared count {}", slot, declared),
            })?;
        if entry.is_some() {
            return Err(Error::BindingOrderViolation {
                op: name.to_string(),
                reason: format!("output slot {} bound twice", slot),
            });
        }
        *entry = Some(tensor);

        let all_required = self
            .decomposition
            .output_slots()
            .iter()
            .zip(self.outputs.iter())
            .all(|(spec, s)| !spec.required || s.is_some());
        if all_required {
            self.connect_outputs()?;
            self.state = BindState::Finalized;
        }
        Ok(())
    }

    /// Wire each final sub-operation to its caller-visible output,
    /// inserting a trailing reshape where the natural rank differs from
    /// the contract's declared rank.
    fn connect_outputs(&mut self) -> Result<()> {
        let Some(wiring) = self.wiring.as_mut() else {
            stoat_core::bail!("connect_outputs on unwired composite");
        };
        for (idx, bound) in self.outputs.iter().enumerate() {
            let Some(out) = bound else { continue };
            let link = &wiring.finals[idx];
            if out.shape().rank() == link.natural.shape().rank() {
                wiring.sub_ops[link.op_index].bind_output(0, out.clone())?;
            } else {
                let natural: TensorRef = std::sync::Arc::new(link.natural.clone());
                wiring.sub_ops[link.op_index].bind_output(0, natural.clone())?;
                wiring.transients.push(natural.clone());
                let mut reshape = PrimitiveOp::new(OpKind::Reshape);
                reshape.bind_input(0, natural)?;
                reshape.bind_output(0, out.clone())?;
                wiring.sub_ops.push(reshape);
            }
        }
        Ok(())
    }

    /// The expanded subgraph; present from Wired onwards.
    pub fn wiring(&self) -> Option<&Wiring> {
        self.wiring.as_ref()
    }

    /// Reconstruct an equivalent, unbound composite from the
    /// decomposition's constructor parameters alone.
    pub fn clone_op(&self) -> CompositeOp {
        CompositeOp::new(self.decomposition.clone_box())
    }
}

// Dense layer — matmul + optional bias + optional activation
//
// inputs: x [K, N] (features innermost), weight [K, M], bias [M] optional.
// output: [M, N], or any same-count rank the contract declares (a trailing
// reshape bridges the difference).

pub struct DenseLayer {
    pub activation: Option<EltwiseCode>,
}

const DENSE_INPUTS: [SlotSpec; 3] = [
    SlotSpec::required("x"),
    SlotSpec::required("weight"),
    SlotSpec::optional("bias"),
];
const DENSE_OUTPUTS: [SlotSpec; 1] = [SlotSpec::required("out")];

impl Decomposition for DenseLayer {
    fn name(&self) -> &'static str {
        "dense_layer"
    }

    fn input_slots(&self) -> &'static [SlotSpec] {
        &DENSE_INPUTS
    }

    fn output_slots(&self) -> &'static [SlotSpec] {
        &DENSE_OUTPUTS
    }

    fn wire(&self, inputs: &[TensorRef]) -> Result<Wiring> {
        let (x, weight, bias) = (&inputs[0], &inputs[1], &inputs[2]);
        let m = weight.shape().dim(1)?;
        let n = x.shape().dim_or_one(1);
        let natural = TensorSpec::new(
            x.dtype(),
            (m, n),
            stoat_core::TensorAttr::Transient,
            x.quant().clone(),
        );

        let mut sub_ops = Vec::new();
        let mut transients = Vec::new();

        let mut mm = PrimitiveOp::new(OpKind::MatMul { transpose_b: false });
        mm.bind_input(0, x.clone())?;
        mm.bind_input(1, weight.clone())?;
        if !bias.is_placeholder() {
            mm.bind_input(2, bias.clone())?;
        }

        let final_idx = if let Some(act) = self.activation {
            let t0: TensorRef = std::sync::Arc::new(natural.clone());
            mm.bind_output(0, t0.clone())?;
            transients.push(t0.clone());
            sub_ops.push(mm);
            let mut act_op = PrimitiveOp::new(OpKind::Unary(act));
            act_op.bind_input(0, t0)?;
            sub_ops.push(act_op);
            sub_ops.len() - 1
        } else {
            sub_ops.push(mm);
            0
        };

        Ok(Wiring {
            sub_ops,
            transients,
            finals: vec![FinalLink { op_index: final_idx, natural }],
        })
    }

    fn clone_box(&self) -> Box<dyn Decomposition> {
        Box::new(DenseLayer { activation: self.activation })
    }
}

// Sequence cell — one step of a four-gate recurrent unit
//
// inputs: x [K, N], stacked input weight [K, 4H], stacked recurrent
// weight [H, 4H], stacked bias [4H] optional, h_prev [H, N], c_prev [H, N].
// outputs: h [H, N], c [H, N].
//
// Wiring splits the stacked weights into one transient per gate (the
// runtime slices the constant payloads; this core only derives shapes),
// runs both matmuls plus the gate nonlinearity per gate, then combines:
//   c_new = f * c_prev + i * g      h = o * tanh(c_new)

pub struct SequenceCell {
    pub hidden: usize,
}

const CELL_INPUTS: [SlotSpec; 6] = [
    SlotSpec::required("x"),
    SlotSpec::required("weight"),
    SlotSpec::required("recurrent"),
    SlotSpec::optional("bias"),
    SlotSpec::required("h_prev"),
    SlotSpec::required("c_prev"),
];
const CELL_OUTPUTS: [SlotSpec; 2] = [SlotSpec::required("h"), SlotSpec::required("c")];

/// Gate order inside the stacked weight: input, forget, candidate, output.
const GATES: usize = 4;

impl Decomposition for SequenceCell {
    fn name(&self) -> &'static str {
        "sequence_cell"
    }

    fn input_slots(&self) -> &'static [SlotSpec] {
        &CELL_INPUTS
    }

    fn output_slots(&self) -> &'static [SlotSpec] {
        &CELL_OUTPUTS
    }

    fn wire(&self, inputs: &[TensorRef]) -> Result<Wiring> {
        let (x, weight, recurrent, bias) = (&inputs[0], &inputs[1], &inputs[2], &inputs[3]);
        let (h_prev, c_prev) = (&inputs[4], &inputs[5]);
        let h = self.hidden;
        let k = x.shape().dim(0)?;
        let n = x.shape().dim_or_one(1);
        if weight.shape().dim(1)? != GATES * h {
            return Err(Error::InvalidShape {
                shape: weight.shape().clone(),
                reason: format!("stacked weight must have {} gate columns", GATES * h),
            });
        }
        if recurrent.shape().dim(0)? != h || recurrent.shape().dim(1)? != GATES * h {
            return Err(Error::InvalidShape {
                shape: recurrent.shape().clone(),
                reason: format!("stacked recurrent weight must be [{}, {}]", h, GATES * h),
            });
        }

        let dtype = x.dtype();
        let quant = x.quant().clone();
        let gate_shape = Shape::from((h, n));
        let mut sub_ops: Vec<PrimitiveOp> = Vec::new();
        let mut transients: Vec<TensorRef> = Vec::new();

        let transient = |shape: Shape, transients: &mut Vec<TensorRef>| -> TensorRef {
            let t = TensorSpec::transient(dtype, shape, quant.clone());
            transients.push(t.clone());
            t
        };

        // Per-gate activations: sigmoid for i/f/o, tanh for the candidate.
        let mut gate_outs: Vec<TensorRef> = Vec::with_capacity(GATES);
        for gate in 0..GATES {
            // Allocation-only split of the stacked constants.
            let w_g = transient(Shape::from((k, h)), &mut transients);
            let r_g = transient(Shape::from((self.hidden, h)), &mut transients);
            let b_g = if bias.is_placeholder() {
                TensorSpec::placeholder()
            } else {
                transient(Shape::from((h,)), &mut transients)
            };

            let t_x = transient(gate_shape.clone(), &mut transients);
            let mut mm_x = PrimitiveOp::new(OpKind::MatMul { transpose_b: false });
            mm_x.bind_input(0, x.clone())?;
            mm_x.bind_input(1, w_g)?;
            if !b_g.is_placeholder() {
                mm_x.bind_input(2, b_g)?;
            }
            mm_x.bind_output(0, t_x.clone())?;
            sub_ops.push(mm_x);

            let t_h = transient(gate_shape.clone(), &mut transients);
            let mut mm_h = PrimitiveOp::new(OpKind::MatMul { transpose_b: false });
            mm_h.bind_input(0, h_prev.clone())?;
            mm_h.bind_input(1, r_g)?;
            mm_h.bind_output(0, t_h.clone())?;
            sub_ops.push(mm_h);

            let t_sum = transient(gate_shape.clone(), &mut transients);
            let mut add = PrimitiveOp::new(OpKind::Binary(EltwiseCode::Add));
            add.bind_input(0, t_x)?;
            add.bind_input(1, t_h)?;
            add.bind_output(0, t_sum.clone())?;
            sub_ops.push(add);

            let t_act = transient(gate_shape.clone(), &mut transients);
            let code = if gate == 2 { EltwiseCode::Tanh } else { EltwiseCode::Sigmoid };
            let mut act = PrimitiveOp::new(OpKind::Unary(code));
            act.bind_input(0, t_sum)?;
            act.bind_output(0, t_act.clone())?;
            sub_ops.push(act);
            gate_outs.push(t_act);
        }
        let (gate_i, gate_f, gate_g, gate_o) =
            (&gate_outs[0], &gate_outs[1], &gate_outs[2], &gate_outs[3]);

        // c_new = f * c_prev + i * g
        let t_fc = transient(gate_shape.clone(), &mut transients);
        let mut mul_f = PrimitiveOp::new(OpKind::Binary(EltwiseCode::Mul));
        mul_f.bind_input(0, gate_f.clone())?;
        mul_f.bind_input(1, c_prev.clone())?;
        mul_f.bind_output(0, t_fc.clone())?;
        sub_ops.push(mul_f);

        let t_ig = transient(gate_shape.clone(), &mut transients);
        let mut mul_i = PrimitiveOp::new(OpKind::Binary(EltwiseCode::Mul));
        mul_i.bind_input(0, gate_i.clone())?;
        mul_i.bind_input(1, gate_g.clone())?;
        mul_i.bind_output(0, t_ig.clone())?;
        sub_ops.push(mul_i);

        let c_new = transient(gate_shape.clone(), &mut transients);
        let mut add_c = PrimitiveOp::new(OpKind::Binary(EltwiseCode::Add));
        add_c.bind_input(0, t_fc)?;
        add_c.bind_input(1, t_ig)?;
        add_c.bind_output(0, c_new.clone())?;
        sub_ops.push(add_c);

        // h = o * tanh(c_new)
        let t_tanh = transient(gate_shape.clone(), &mut transients);
        let mut tanh_c = PrimitiveOp::new(OpKind::Unary(EltwiseCode::Tanh));
        tanh_c.bind_input(0, c_new.clone())?;
        tanh_c.bind_output(0, t_tanh.clone())?;
        sub_ops.push(tanh_c);

        let mut mul_h = PrimitiveOp::new(OpKind::Binary(EltwiseCode::Mul));
        mul_h.bind_input(0, gate_o.clone())?;
        mul_h.bind_input(1, t_tanh)?;
        sub_ops.push(mul_h);
        let h_idx = sub_ops.len() - 1;

        // The caller-visible c is a copy of c_new so the recurrent wiring
        // above can keep reading the transient.
        let mut copy_c = PrimitiveOp::new(OpKind::Unary(EltwiseCode::Copy));
        copy_c.bind_input(0, c_new)?;
        sub_ops.push(copy_c);
        let c_idx = sub_ops.len() - 1;

        let natural = TensorSpec::new(
            dtype,
            gate_shape,
            stoat_core::TensorAttr::Transient,
            quant,
        );
        Ok(Wiring {
            sub_ops,
            transients,
            finals: vec![
                FinalLink { op_index: h_idx, natural: natural.clone() },
                FinalLink { op_index: c_idx, natural },
            ],
        })
    }

    fn clone_box(&self) -> Box<dyn Decomposition> {
        Box::new(SequenceCell { hidden: self.hidden })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stoat_core::{DType, Quantization, TensorAttr};
    use std::sync::Arc;

    fn half(shape: impl Into<Shape>, attr: TensorAttr) -> TensorRef {
        Arc::new(TensorSpec::new(DType::F16, shape, attr, Quantization::None))
    }

    fn dense() -> CompositeOp {
        CompositeOp::new(Box::new(DenseLayer { activation: Some(EltwiseCode::Relu) }))
    }

    #[test]
    fn test_dense_wires_on_last_required_input() {
        let mut op = dense();
        op.bind_input(0, half((8, 2), TensorAttr::Input)).unwrap();
        assert_eq!(op.state(), BindState::CollectingInputs);
        assert!(op.wiring().is_none());
        op.bind_input(1, half((8, 16), TensorAttr::Constant)).unwrap();
        assert_eq!(op.state(), BindState::Wired);
        let wiring = op.wiring().unwrap();
        assert_eq!(wiring.sub_ops.len(), 2); // matmul + relu
    }

    #[test]
    fn test_output_before_inputs_is_a_violation() {
        let mut op = dense();
        op.bind_input(0, half((8, 2), TensorAttr::Input)).unwrap();
        let err = op.bind_output(0, half((16, 2), TensorAttr::Output)).unwrap_err();
        assert!(matches!(err, Error::BindingOrderViolation { .. }));
    }

    #[test]
    fn test_explicit_finalize_before_required_fails() {
        let mut op = dense();
        op.bind_input(0, half((8, 2), TensorAttr::Input)).unwrap();
        let err = op.finalize_inputs().unwrap_err();
        assert!(matches!(err, Error::BindingOrderViolation { .. }));
    }

    #[test]
    fn test_dense_connects_matching_rank_directly() {
        let mut op = dense();
        op.bind_input(0, half((8, 2), TensorAttr::Input)).unwrap();
        op.bind_input(1, half((8, 16), TensorAttr::Constant)).unwrap();
        op.bind_output(0, half((16, 2), TensorAttr::Output)).unwrap();
        assert_eq!(op.state(), BindState::Finalized);
        let wiring = op.wiring().unwrap();
        assert_eq!(wiring.sub_ops.len(), 2);
        assert!(wiring.sub_ops.iter().all(|o| o.ready()));
    }

    #[test]
    fn test_dense_inserts_trailing_reshape_on_rank_mismatch() {
        let mut op = dense();
        op.bind_input(0, half((8, 2), TensorAttr::Input)).unwrap();
        op.bind_input(1, half((8, 16), TensorAttr::Constant)).unwrap();
        // Contract declares a rank-3 output for the rank-2 natural result.
        op.bind_output(0, half((16, 2, 1), TensorAttr::Output)).unwrap();
        let wiring = op.wiring().unwrap();
        assert_eq!(wiring.sub_ops.len(), 3);
        assert_eq!(wiring.sub_ops[2].kind(), &OpKind::Reshape);
        assert!(wiring.sub_ops.iter().all(|o| o.ready()));
    }

    #[test]
    fn test_dense_bias_placeholder_propagates() {
        let mut op = CompositeOp::new(Box::new(DenseLayer { activation: None }));
        op.bind_input(0, half((8, 2), TensorAttr::Input)).unwrap();
        op.bind_input(2, TensorSpec::placeholder()).unwrap();
        op.bind_input(1, half((8, 16), TensorAttr::Constant)).unwrap();
        let wiring = op.wiring().unwrap();
        // Placeholder bias: the matmul's optional slot stays unbound and
        // no transient was allocated for it.
        assert_eq!(wiring.sub_ops[0].bound_inputs().len(), 2);
        assert!(wiring.transients.is_empty());
    }

    #[test]
    fn test_sequence_cell_wiring() {
        let (k, hidden, n) = (8, 4, 2);
        let mut op = CompositeOp::new(Box::new(SequenceCell { hidden }));
        op.bind_input(0, half((k, n), TensorAttr::Input)).unwrap();
        op.bind_input(1, half((k, 4 * hidden), TensorAttr::Constant)).unwrap();
        op.bind_input(2, half((hidden, 4 * hidden), TensorAttr::Constant)).unwrap();
        op.bind_input(4, half((hidden, n), TensorAttr::Input)).unwrap();
        assert_eq!(op.state(), BindState::CollectingInputs);
        op.bind_input(5, half((hidden, n), TensorAttr::Input)).unwrap();
        assert_eq!(op.state(), BindState::Wired);

        let wiring = op.wiring().unwrap();
        // 4 gates x (mm_x, mm_h, add, act) + f*c, i*g, add, tanh, h-mul, c-copy.
        assert_eq!(wiring.sub_ops.len(), 4 * 4 + 6);
        // No bias: 2 split weights + 4 temps per gate, plus 4 combine temps.
        assert_eq!(wiring.transients.len(), 4 * 6 + 4);

        op.bind_output(0, half((hidden, n), TensorAttr::Output)).unwrap();
        assert_eq!(op.state(), BindState::CollectingOutputs);
        op.bind_output(1, half((hidden, n), TensorAttr::Output)).unwrap();
        assert_eq!(op.state(), BindState::Finalized);
        assert!(op.wiring().unwrap().sub_ops.iter().all(|o| o.ready()));
    }

    #[test]
    fn test_sequence_cell_rejects_bad_stack() {
        let mut op = CompositeOp::new(Box::new(SequenceCell { hidden: 4 }));
        op.bind_input(0, half((8, 2), TensorAttr::Input)).unwrap();
        op.bind_input(1, half((8, 12), TensorAttr::Constant)).unwrap(); // 3 gates, not 4
        op.bind_input(2, half((4, 16), TensorAttr::Constant)).unwrap();
        op.bind_input(4, half((4, 2), TensorAttr::Input)).unwrap();
        let err = op.bind_input(5, half((4, 2), TensorAttr::Input)).unwrap_err();
        assert!(matches!(err, Error::InvalidShape { .. }));
    }

    #[test]
    fn test_sequence_cell_rejects_bad_recurrent() {
        let mut op = CompositeOp::new(Box::new(SequenceCell { hidden: 4 }));
        op.bind_input(0, half((8, 2), TensorAttr::Input)).unwrap();
        op.bind_input(1, half((8, 16), TensorAttr::Constant)).unwrap();
        op.bind_input(2, half((8, 16), TensorAttr::Constant)).unwrap(); // wrong leading dim
        op.bind_input(4, half((4, 2), TensorAttr::Input)).unwrap();
        let err = op.bind_input(5, half((4, 2), TensorAttr::Input)).unwrap_err();
        assert!(matches!(err, Error::InvalidShape { .. }));
    }

    #[test]
    fn test_late_optional_bind_names_the_ordering_contract() {
        let mut op = dense();
        op.bind_input(0, half((8, 2), TensorAttr::Input)).unwrap();
        op.bind_input(1, half((8, 16), TensorAttr::Constant)).unwrap();
        assert_eq!(op.state(), BindState::Wired);
        let err = op.bind_input(2, half((16,), TensorAttr::Constant)).unwrap_err();
        match err {
            Error::BindingOrderViolation { reason, .. } => {
                assert!(reason.contains("before the last required input"), "{}", reason);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_clone_reconstructs_unbound() {
        let mut op = CompositeOp::new(Box::new(SequenceCell { hidden: 4 }));
        op.bind_input(0, half((8, 2), TensorAttr::Input)).unwrap();
        let clone = op.clone_op();
        assert_eq!(clone.state(), BindState::CollectingInputs);
        assert!(clone.wiring().is_none());
        assert_eq!(clone.name(), "sequence_cell");
    }

    #[test]
    fn test_every_composite_rejects_early_output() {
        let composites: Vec<CompositeOp> = vec![
            CompositeOp::new(Box::new(DenseLayer { activation: None })),
            CompositeOp::new(Box::new(SequenceCell { hidden: 4 })),
        ];
        for mut op in composites {
            let err = op.bind_output(0, half((4, 2), TensorAttr::Output)).unwrap_err();
            assert!(
                matches!(err, Error::BindingOrderViolation { .. }),
                "{} tolerated an early output",
                op.name()
            );
        }
    }
}
