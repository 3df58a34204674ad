use log::debug;
use stoat_core::{Error, QuantKind, Result, TensorRef};

use crate::grid::{collapses_to_2d, plan_grid, DispatchGrid};
use crate::kernels::{elementwise, matmul, reduce};
use crate::op::{OpKind, PrimitiveOp};
use crate::params::ScalarValue;
use crate::registry::{self, Backend, InitCtx, KernelDescriptor};

// Finalize — From a fully bound op to a dispatchable kernel instance
//
// The single entry point that ties the pieces together: canonicalize the
// bound dtypes, decide any fast-vs-generic profile (once), pack the
// variant key, look up the descriptor, validate the parameter list, plan
// the grid, and run the initializer. Every compile-time error class
// surfaces here, before anything can reach the execution queue.

/// A kernel instance ready to hand to the hardware runtime.
#[derive(Debug, Clone)]
pub struct CompiledKernel {
    pub op_name: String,
    pub descriptor: &'static KernelDescriptor,
    pub inputs: Vec<TensorRef>,
    pub outputs: Vec<TensorRef>,
    pub scalars: Vec<ScalarValue>,
    pub grid: DispatchGrid,
}

fn variant_key(op: &PrimitiveOp, inputs: &[TensorRef], outputs: &[TensorRef]) -> Result<u32> {
    let in0 = inputs[0].dtype().kernel_class();
    let out0 = outputs[0].dtype().kernel_class();
    // The 2-D collapse is a property of the iteration domain, which for a
    // reduction is the source extent, not the reduced output.
    let domain = match op.kind() {
        OpKind::Reduce { .. } => inputs[0].shape(),
        _ => outputs[0].shape(),
    };
    let image_2d = collapses_to_2d(domain);
    // The quantization kind of the leading input selects the variant's
    // scalar-constant contract; a per-channel weight routes matmul to the
    // per-channel variant regardless of the activation's kind.
    let quant = match op.kind() {
        OpKind::MatMul { .. }
            if inputs
                .iter()
                .take(2)
                .any(|t| t.quant().kind() == QuantKind::AsymmetricPerChannel) =>
        {
            QuantKind::AsymmetricPerChannel
        }
        _ => inputs[0].quant().kind(),
    };
    Ok(match *op.kind() {
        OpKind::Unary(code) => elementwise::pack_key(code, in0, None, out0, image_2d, quant),
        OpKind::Reshape => elementwise::pack_key(elementwise::EltwiseCode::Copy, in0, None, out0, image_2d, quant),
        OpKind::Binary(code) => {
            let in1 = inputs[1].dtype().kernel_class();
            elementwise::pack_key(code, in0, Some(in1), out0, image_2d, quant)
        }
        OpKind::Reduce { code, axis } => {
            if axis > 2 {
                return Err(Error::InvalidShape {
                    shape: inputs[0].shape().clone(),
                    reason: format!("reduce axis {} exceeds the 3-axis iteration domain", axis),
                });
            }
            // Profile decision: made exactly once per finalize, pure in
            // the operand shapes, immutable afterwards.
            let profile = reduce::select_profile(inputs[0].shape(), axis);
            reduce::pack_key(code, axis as u32, in0, out0, image_2d, quant, profile)
        }
        OpKind::MatMul { transpose_b } => {
            let weight = inputs[1].dtype().kernel_class();
            matmul::pack_key(in0, weight, out0, image_2d, quant, transpose_b)
        }
    })
}

/// Compile one fully bound primitive operation for a backend.
pub fn finalize(op: &PrimitiveOp, backend: Backend) -> Result<CompiledKernel> {
    if !op.ready() {
        return Err(Error::BindingOrderViolation {
            op: op.name(),
            reason: "finalize called before all slots were bound".to_string(),
        });
    }
    let inputs = op.bound_inputs();
    let outputs = op.bound_outputs();

    let key = variant_key(op, &inputs, &outputs)?;
    let descriptor = registry::lookup(backend, op.kind().family(), &op.name(), key)?;
    descriptor.param_layout.validate(&op.name(), &inputs, &outputs)?;

    // Reductions iterate the source domain; everything else the output.
    let domain = match op.kind() {
        OpKind::Reduce { .. } => inputs[0].shape(),
        _ => outputs[0].shape(),
    };
    let grid = plan_grid(domain, descriptor.global_scale, descriptor.align)?;

    let scalars = (descriptor.initializer)(&InitCtx {
        inputs: &inputs,
        outputs: &outputs,
        grid: &grid,
    })?;
    // The initializer must fill exactly the scalar slots the layout
    // declares; a short or long list would misalign every parameter after
    // the first missing one at dispatch time.
    if scalars.len() != descriptor.param_layout.scalar_count() {
        return Err(Error::ParamArityMismatch {
            op: op.name(),
            declared: descriptor.param_layout.scalar_count(),
            got: scalars.len(),
        });
    }

    debug!(
        "finalized {} -> {} (key {:#010x}, grid {:?})",
        op.name(),
        descriptor.entry_name,
        key,
        grid.global_size
    );

    Ok(CompiledKernel {
        op_name: op.name(),
        descriptor,
        inputs,
        outputs,
        scalars,
        grid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::elementwise::EltwiseCode;
    use crate::kernels::reduce::ReduceCode;
    use stoat_core::{DType, Quantization, Shape, TensorAttr, TensorSpec};
    use std::sync::Arc;

    fn u8_affine(shape: impl Into<Shape>, scale: f32, zp: i32, attr: TensorAttr) -> TensorRef {
        Arc::new(TensorSpec::new(
            DType::U8,
            shape,
            attr,
            Quantization::AsymmetricAffine { scale, zero_point: zp },
        ))
    }

    #[test]
    fn test_finalize_reduce_prod_example() {
        // 1-D reduce-product over axis 0 on a [7,3] U8 tensor.
        let mut op = PrimitiveOp::new(OpKind::Reduce { code: ReduceCode::Prod, axis: 0 });
        op.bind_input(0, u8_affine((7, 3), 0.5, 10, TensorAttr::Input)).unwrap();
        op.bind_output(0, u8_affine((1, 3), 0.25, 0, TensorAttr::Output)).unwrap();

        let k = finalize(&op, Backend::Cl).unwrap();
        assert_eq!(k.grid.global_size, [8, 3, 1]);
        assert_eq!(k.grid.dim, 2);
        // Inner extent 7 fits a vector register: the fast variant wins.
        assert_eq!(k.descriptor.entry_name, "reduce_prod_fast_U8toU8_2D");
        // Bridge: 0.5/0.25 = 2.0 at the fit boundary.
        assert_eq!(k.scalars[2], ScalarValue::U32(65535));
        assert_eq!(k.scalars[3], ScalarValue::U32(15));
    }

    #[test]
    fn test_finalize_rejects_unready_op() {
        let op = PrimitiveOp::new(OpKind::Unary(EltwiseCode::Sigmoid));
        let err = finalize(&op, Backend::Cl).unwrap_err();
        assert!(matches!(err, Error::BindingOrderViolation { .. }));
    }

    #[test]
    fn test_finalize_miss_is_hard_failure() {
        // Evis ships no F32 elementwise kernels.
        let f32_t = |attr| {
            Arc::new(TensorSpec::new(DType::F32, (4, 4), attr, Quantization::None))
        };
        let mut op = PrimitiveOp::new(OpKind::Unary(EltwiseCode::Sigmoid));
        op.bind_input(0, f32_t(TensorAttr::Input)).unwrap();
        op.bind_output(0, f32_t(TensorAttr::Output)).unwrap();
        let err = finalize(&op, Backend::Evis).unwrap_err();
        assert!(matches!(err, Error::UnsupportedKernelVariant { .. }));
    }

    #[test]
    fn test_finalize_mixed_quant_rejected() {
        let mut op = PrimitiveOp::new(OpKind::Unary(EltwiseCode::Sigmoid));
        op.bind_input(0, u8_affine((4, 4), 0.5, 0, TensorAttr::Input)).unwrap();
        // Output is u8 but unquantized: the bridge must refuse.
        op.bind_output(
            0,
            Arc::new(TensorSpec::new(DType::U8, (4, 4), TensorAttr::Output, Quantization::None)),
        )
        .unwrap();
        let err = finalize(&op, Backend::Cl).unwrap_err();
        assert!(matches!(err, Error::UnsupportedQuantizationPair { .. }));
    }

    #[test]
    fn test_finalize_dfp_fills_declared_scalars() {
        let t = |attr| {
            Arc::new(TensorSpec::new(
                DType::I16,
                (4, 4),
                attr,
                Quantization::DynamicFixedPoint { fl: 7 },
            ))
        };
        let mut op = PrimitiveOp::new(OpKind::Unary(EltwiseCode::Copy));
        op.bind_input(0, t(TensorAttr::Input)).unwrap();
        op.bind_output(
            0,
            Arc::new(TensorSpec::new(
                DType::I16,
                (4, 4),
                TensorAttr::Output,
                Quantization::DynamicFixedPoint { fl: 3 },
            )),
        )
        .unwrap();
        let k = finalize(&op, Backend::Cpu).unwrap();
        assert_eq!(k.descriptor.entry_name, "copy_I16toI16_dfp_2D");
        assert_eq!(k.descriptor.param_layout.scalar_count(), 1);
        assert_eq!(k.scalars, vec![ScalarValue::U32(4)]);
    }

    #[test]
    fn test_finalize_unquantized_u8_has_no_variant() {
        // Integer-class kernels only exist in quantized flavors.
        let t = |attr| {
            Arc::new(TensorSpec::new(DType::U8, (4, 4), attr, Quantization::None))
        };
        let mut op = PrimitiveOp::new(OpKind::Unary(EltwiseCode::Copy));
        op.bind_input(0, t(TensorAttr::Input)).unwrap();
        op.bind_output(0, t(TensorAttr::Output)).unwrap();
        let err = finalize(&op, Backend::Cl).unwrap_err();
        assert!(matches!(err, Error::UnsupportedKernelVariant { .. }));
    }

    #[test]
    fn test_half_and_bf16_share_a_variant() {
        for dtype in [DType::F16, DType::BF16] {
            let t = |attr| Arc::new(TensorSpec::new(dtype, (8, 8), attr, Quantization::None));
            let mut op = PrimitiveOp::new(OpKind::Binary(EltwiseCode::Add));
            op.bind_input(0, t(TensorAttr::Input)).unwrap();
            op.bind_input(1, t(TensorAttr::Input)).unwrap();
            op.bind_output(0, t(TensorAttr::Output)).unwrap();
            let k = finalize(&op, Backend::Evis).unwrap();
            assert_eq!(k.descriptor.entry_name, "add_F16toF16_2D");
        }
    }

    #[test]
    fn test_zero_extent_fails_shape_check() {
        let t = |shape, attr| u8_affine(shape, 1.0, 0, attr);
        let mut op = PrimitiveOp::new(OpKind::Unary(EltwiseCode::Relu));
        op.bind_input(0, t(Shape::from((4, 0)), TensorAttr::Input)).unwrap();
        op.bind_output(0, t(Shape::from((4, 0)), TensorAttr::Output)).unwrap();
        let err = finalize(&op, Backend::Cl).unwrap_err();
        assert!(matches!(err, Error::InvalidShape { .. }));
    }
}
