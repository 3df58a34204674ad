// End-to-end compile tests — bind, finalize, inspect the kernel instance

use std::sync::Arc;

use stoat::compile::kernels::elementwise::EltwiseCode;
use stoat::compile::kernels::reduce::ReduceCode;
use stoat::{
    finalize, Backend, DType, OpKind, PrimitiveOp, Quantization, ScalarValue, Shape, TensorAttr,
    TensorRef, TensorSpec,
};

fn tensor(dtype: DType, shape: impl Into<Shape>, attr: TensorAttr, quant: Quantization) -> TensorRef {
    Arc::new(TensorSpec::new(dtype, shape, attr, quant))
}

fn u8_affine(shape: impl Into<Shape>, scale: f32, zp: i32, attr: TensorAttr) -> TensorRef {
    tensor(
        DType::U8,
        shape,
        attr,
        Quantization::AsymmetricAffine { scale, zero_point: zp },
    )
}

// The worked requantization example: scale 0.5 zp 10 into scale 0.25 zp 0.

#[test]
fn test_requant_example_constants() {
    let mut op = PrimitiveOp::new(OpKind::Unary(EltwiseCode::Sigmoid));
    op.bind_input(0, u8_affine((8, 8), 0.5, 10, TensorAttr::Input)).unwrap();
    op.bind_output(0, u8_affine((8, 8), 0.25, 0, TensorAttr::Output)).unwrap();

    let k = finalize(&op, Backend::Cl).unwrap();
    assert_eq!(k.scalars[0], ScalarValue::F32(2.0));
    assert_eq!(k.scalars[1], ScalarValue::F32(-20.0));
    assert_eq!(k.scalars[2], ScalarValue::U32(65535));
    assert_eq!(k.scalars[3], ScalarValue::U32(15));
}

#[test]
fn test_requant_example_evis_lane_replication() {
    let mut op = PrimitiveOp::new(OpKind::Unary(EltwiseCode::Sigmoid));
    op.bind_input(0, u8_affine((8, 8), 0.5, 10, TensorAttr::Input)).unwrap();
    op.bind_output(0, u8_affine((8, 8), 0.25, 0, TensorAttr::Output)).unwrap();

    let k = finalize(&op, Backend::Evis).unwrap();
    // 8-bit data: the multiplier occupies all 8 lanes of the operand.
    assert_eq!(k.scalars[1], ScalarValue::Lanes(vec![65535; 8]));
    assert_eq!(k.scalars[2], ScalarValue::U32(15));
    assert_eq!(k.grid.global_scale, [8, 1, 1]);
}

// The worked grid example: reduce-product over axis 0 of [7, 3].

#[test]
fn test_reduce_grid_example() {
    let mut op = PrimitiveOp::new(OpKind::Reduce { code: ReduceCode::Prod, axis: 0 });
    op.bind_input(0, u8_affine((7, 3), 1.0, 0, TensorAttr::Input)).unwrap();
    op.bind_output(0, u8_affine((1, 3), 1.0, 0, TensorAttr::Output)).unwrap();

    let k = finalize(&op, Backend::Cl).unwrap();
    assert_eq!(k.grid.dim, 2);
    assert_eq!(k.grid.global_size, [8, 3, 1]);
}

#[test]
fn test_dfp_requant_shift() {
    let dfp = |fl| Quantization::DynamicFixedPoint { fl };
    let mut op = PrimitiveOp::new(OpKind::Unary(EltwiseCode::Copy));
    op.bind_input(0, tensor(DType::I16, (4, 4), TensorAttr::Input, dfp(12))).unwrap();
    op.bind_output(0, tensor(DType::I16, (4, 4), TensorAttr::Output, dfp(8))).unwrap();

    let k = finalize(&op, Backend::Cl).unwrap();
    // fl 12 -> 8 is a pure 4-bit right shift.
    assert_eq!(k.scalars, vec![ScalarValue::U32(4)]);
}

#[test]
fn test_same_op_different_backends_pick_different_kernels() {
    let build = || {
        let mut op = PrimitiveOp::new(OpKind::Binary(EltwiseCode::Add));
        op.bind_input(0, u8_affine((16, 4), 0.5, 0, TensorAttr::Input)).unwrap();
        op.bind_input(1, u8_affine((16, 4), 0.5, 0, TensorAttr::Input)).unwrap();
        op.bind_output(0, u8_affine((16, 4), 0.5, 0, TensorAttr::Output)).unwrap();
        op
    };
    let cl = finalize(&build(), Backend::Cl).unwrap();
    let evis = finalize(&build(), Backend::Evis).unwrap();
    let cpu = finalize(&build(), Backend::Cpu).unwrap();
    assert_eq!(cl.descriptor.entry_name, evis.descriptor.entry_name);
    assert_ne!(cl.descriptor.source_resource, evis.descriptor.source_resource);
    // CPU runs unvectorized: one element per work-item, no alignment.
    assert_eq!(cpu.grid.global_size, [16, 4, 1]);
    assert_eq!(cl.grid.global_size, [4, 4, 1]);
    assert_eq!(evis.grid.global_size, [4, 4, 1]);
}

#[test]
fn test_3d_output_uses_3d_grid_and_variant() {
    let t = |attr| tensor(DType::F16, (16, 8, 2), attr, Quantization::None);
    let mut op = PrimitiveOp::new(OpKind::Unary(EltwiseCode::Tanh));
    op.bind_input(0, t(TensorAttr::Input)).unwrap();
    op.bind_output(0, t(TensorAttr::Output)).unwrap();

    let k = finalize(&op, Backend::Cl).unwrap();
    assert_eq!(k.grid.dim, 3);
    assert_eq!(k.descriptor.entry_name, "tanh_F16toF16");
}

#[test]
fn test_errors_prevent_dispatch() {
    // Each compile-time error class must surface from finalize, before
    // anything could reach the execution queue.
    use stoat::Error;

    // UnsupportedKernelVariant: no F32 on evis.
    let f32_t = |attr| tensor(DType::F32, (4, 4), attr, Quantization::None);
    let mut op = PrimitiveOp::new(OpKind::Unary(EltwiseCode::Relu));
    op.bind_input(0, f32_t(TensorAttr::Input)).unwrap();
    op.bind_output(0, f32_t(TensorAttr::Output)).unwrap();
    assert!(matches!(
        finalize(&op, Backend::Evis),
        Err(Error::UnsupportedKernelVariant { .. })
    ));

    // RescaleOverflow: a scale ratio beyond the multiplier range.
    let mut op = PrimitiveOp::new(OpKind::Unary(EltwiseCode::Copy));
    op.bind_input(0, u8_affine((4, 4), 1.0e6, 0, TensorAttr::Input)).unwrap();
    op.bind_output(0, u8_affine((4, 4), 1.0, 0, TensorAttr::Output)).unwrap();
    assert!(matches!(
        finalize(&op, Backend::Cl),
        Err(Error::RescaleOverflow { .. })
    ));
}
