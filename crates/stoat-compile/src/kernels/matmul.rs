use stoat_core::{KernelClass, QuantKind, Quantization, Result};

use super::{class_tag, init_no_scalars, kind_tag};
use crate::bridge;
use crate::key::VariantKey;
use crate::params::{ParamLayout, ParamSlot, ScalarValue};
use crate::registry::{Backend, InitCtx, Initializer, KernelDescriptor, TableBuilder};

// MatMul family — dense matrix multiply, optionally with bias
//
// Key layout: shared prefix (axis unused, packed 0) plus one transpose-b
// bit. The quantized variants bridge two source domains into the output:
// effective_scale = s_in * s_w / s_out, folded into one fixed-point
// multiplier, with all three zero points handed to the kernel verbatim.
// A per-channel weight selects the _pc variant, which takes one folded
// multiplier/shift pair per output channel as constant buffers.

/// Pack the full matmul key.
pub fn pack_key(
    input: KernelClass,
    weight: KernelClass,
    output: KernelClass,
    is_image_2d: bool,
    quant: QuantKind,
    transpose_b: bool,
) -> u32 {
    VariantKey {
        axis: 0,
        input,
        input2: Some(weight),
        output,
        is_image_2d,
        quant,
    }
    .pack()
    .field("transpose_b", 1, u32::from(transpose_b))
    .finish()
}

fn unsupported(src: &Quantization, dst: &Quantization) -> stoat_core::Error {
    stoat_core::Error::UnsupportedQuantizationPair {
        src: src.to_string(),
        dst: dst.to_string(),
    }
}

/// Fold both source scales into the output domain: one multiplier/shift
/// pair plus the three zero points. All three operands must be affine.
fn init_affine_matmul(ctx: &InitCtx) -> Result<Vec<ScalarValue>> {
    let (inp, weight) = (ctx.inputs[0].quant(), ctx.inputs[1].quant());
    let out = ctx.outputs[0].quant();
    match (inp, weight, out) {
        (
            Quantization::AsymmetricAffine { scale: si, zero_point: zi },
            Quantization::AsymmetricAffine { scale: sw, zero_point: zw },
            Quantization::AsymmetricAffine { scale: so, zero_point: zo },
        ) => {
            let effective = f64::from(*si) * f64::from(*sw) / f64::from(*so);
            let fp = bridge::quantize_multiplier(effective)?;
            Ok(vec![
                ScalarValue::U32(u32::from(fp.m0)),
                ScalarValue::U32(fp.post_shift),
                ScalarValue::I32(*zi),
                ScalarValue::I32(*zw),
                ScalarValue::I32(*zo),
            ])
        }
        (src, _, dst) => Err(unsupported(src, dst)),
    }
}

/// Per-channel weight against an affine input and output. The kernel takes
/// one zero point for the whole weight tensor, so every channel must agree
/// on it; scales fold channel-wise into multiplier/shift constant buffers.
fn init_per_channel_matmul(ctx: &InitCtx) -> Result<Vec<ScalarValue>> {
    let (inp, weight) = (ctx.inputs[0].quant(), ctx.inputs[1].quant());
    let out = ctx.outputs[0].quant();
    match (inp, weight, out) {
        (
            Quantization::AsymmetricAffine { scale: si, zero_point: zi },
            Quantization::AsymmetricPerChannel { scales, zero_points, .. },
            Quantization::AsymmetricAffine { scale: so, zero_point: zo },
        ) => {
            let Some(&zw) = zero_points.first() else {
                return Err(unsupported(weight, out));
            };
            if zero_points.iter().any(|&zp| zp != zw) {
                return Err(unsupported(weight, out));
            }
            let mut m0s = Vec::with_capacity(scales.len());
            let mut shifts = Vec::with_capacity(scales.len());
            for &sc in scales {
                let fp = bridge::quantize_multiplier(f64::from(*si) * f64::from(sc) / f64::from(*so))?;
                m0s.push(u32::from(fp.m0));
                shifts.push(fp.post_shift);
            }
            Ok(vec![
                ScalarValue::U32Array(m0s),
                ScalarValue::U32Array(shifts),
                ScalarValue::I32(*zi),
                ScalarValue::I32(zw),
                ScalarValue::I32(*zo),
            ])
        }
        (src, _, dst) => Err(unsupported(src, dst)),
    }
}

fn layout_for(kind: QuantKind) -> ParamLayout {
    let mut slots = vec![
        ParamSlot::input("input"),
        ParamSlot::input("weight"),
        ParamSlot::optional_input("bias"),
        ParamSlot::output("output"),
    ];
    match kind {
        QuantKind::None => {}
        QuantKind::AsymmetricAffine | QuantKind::DynamicFixedPoint => {
            slots.push(ParamSlot::scalar("m0"));
            slots.push(ParamSlot::scalar("post_shift"));
            slots.push(ParamSlot::scalar("input_zp"));
            slots.push(ParamSlot::scalar("weight_zp"));
            slots.push(ParamSlot::scalar("output_zp"));
        }
        QuantKind::AsymmetricPerChannel => {
            slots.push(ParamSlot::scalar("m0_per_channel"));
            slots.push(ParamSlot::scalar("post_shift_per_channel"));
            slots.push(ParamSlot::scalar("input_zp"));
            slots.push(ParamSlot::scalar("weight_zp"));
            slots.push(ParamSlot::scalar("output_zp"));
        }
    }
    ParamLayout::new(slots)
}

fn init_for(kind: QuantKind) -> Initializer {
    match kind {
        QuantKind::AsymmetricAffine => init_affine_matmul,
        QuantKind::AsymmetricPerChannel => init_per_channel_matmul,
        _ => init_no_scalars,
    }
}

/// Matmul ships affine and per-channel variants for the integer classes;
/// fixed-point matmuls are not specialized.
fn matmul_quant_kinds(class: KernelClass) -> &'static [QuantKind] {
    if super::is_quantized_class(class) {
        &[QuantKind::AsymmetricAffine, QuantKind::AsymmetricPerChannel]
    } else {
        &[QuantKind::None]
    }
}

/// Register every matmul variant this backend ships; the weight may be
/// quantized per-channel against an affine input and output.
pub fn register(backend: Backend, table: &mut TableBuilder) {
    let (classes, prefix, scale, align): (&[KernelClass], _, [u32; 3], u32) = match backend {
        Backend::Cpu => (
            &[KernelClass::U8, KernelClass::I8, KernelClass::Half, KernelClass::F32],
            "cpu/matmul",
            [1, 1, 1],
            1,
        ),
        Backend::Cl => (
            &[KernelClass::U8, KernelClass::I8, KernelClass::Half, KernelClass::F32],
            "cl/matmul",
            [4, 4, 1],
            4,
        ),
        Backend::Evis => (
            &[KernelClass::U8, KernelClass::I8, KernelClass::Half],
            "evis/matmul",
            [4, 4, 1],
            4,
        ),
    };
    for &class in classes {
        for &kind in matmul_quant_kinds(class) {
            for image_2d in [true, false] {
                for transpose_b in [false, true] {
                    let tag = class_tag(class);
                    let suffix = match (image_2d, transpose_b) {
                        (true, false) => "_2D",
                        (true, true) => "_transB_2D",
                        (false, false) => "",
                        (false, true) => "_transB",
                    };
                    table.register(KernelDescriptor {
                        key: pack_key(class, class, class, image_2d, kind, transpose_b),
                        entry_name: format!("gemm_{}to{}{}{}", tag, tag, kind_tag(kind), suffix),
                        source_resource: prefix.to_string(),
                        param_layout: layout_for(kind),
                        global_scale: scale,
                        align,
                        initializer: init_for(kind),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::plan_grid;
    use stoat_core::{DType, Shape, TensorAttr, TensorSpec};
    use std::sync::Arc;

    fn affine(scale: f32, zp: i32, attr: TensorAttr) -> stoat_core::TensorRef {
        Arc::new(TensorSpec::new(
            DType::U8,
            (4, 4),
            attr,
            Quantization::AsymmetricAffine { scale, zero_point: zp },
        ))
    }

    fn per_channel(scales: Vec<f32>, zps: Vec<i32>) -> stoat_core::TensorRef {
        Arc::new(TensorSpec::new(
            DType::U8,
            (4, 4),
            TensorAttr::Constant,
            Quantization::per_channel(0, scales, zps),
        ))
    }

    #[test]
    fn test_quantized_matmul_scalars() {
        let grid = plan_grid(&Shape::from((4, 4)), [4, 4, 1], 4).unwrap();
        let inputs = [affine(0.5, 10, TensorAttr::Input), affine(1.0, 0, TensorAttr::Constant)];
        let outputs = [affine(0.25, 0, TensorAttr::Output)];
        let ctx = InitCtx { inputs: &inputs, outputs: &outputs, grid: &grid };
        let scalars = init_affine_matmul(&ctx).unwrap();
        // effective = 0.5 * 1.0 / 0.25 = 2.0 -> the boundary pair.
        assert_eq!(scalars[0], ScalarValue::U32(65535));
        assert_eq!(scalars[1], ScalarValue::U32(15));
        assert_eq!(scalars[2], ScalarValue::I32(10));
        assert_eq!(scalars[4], ScalarValue::I32(0));
    }

    #[test]
    fn test_per_channel_matmul_folds_every_channel() {
        let grid = plan_grid(&Shape::from((4, 4)), [4, 4, 1], 4).unwrap();
        let inputs = [
            affine(0.5, 10, TensorAttr::Input),
            per_channel(vec![1.0, 0.5], vec![3, 3]),
        ];
        let outputs = [affine(0.25, 7, TensorAttr::Output)];
        let ctx = InitCtx { inputs: &inputs, outputs: &outputs, grid: &grid };
        let scalars = init_per_channel_matmul(&ctx).unwrap();
        assert_eq!(scalars.len(), 5);
        assert_eq!(scalars[0], ScalarValue::U32Array(vec![65535, 65535]));
        assert_eq!(scalars[1], ScalarValue::U32Array(vec![15, 16]));
        assert_eq!(scalars[2], ScalarValue::I32(10));
        assert_eq!(scalars[3], ScalarValue::I32(3));
        assert_eq!(scalars[4], ScalarValue::I32(7));
    }

    #[test]
    fn test_per_channel_matmul_rejects_divergent_zero_points() {
        let grid = plan_grid(&Shape::from((4, 4)), [4, 4, 1], 4).unwrap();
        let inputs = [
            affine(0.5, 10, TensorAttr::Input),
            per_channel(vec![1.0, 1.0], vec![0, 5]),
        ];
        let outputs = [affine(0.25, 0, TensorAttr::Output)];
        let ctx = InitCtx { inputs: &inputs, outputs: &outputs, grid: &grid };
        let err = init_per_channel_matmul(&ctx).unwrap_err();
        assert!(matches!(err, stoat_core::Error::UnsupportedQuantizationPair { .. }));
    }

    #[test]
    fn test_transpose_is_part_of_the_key() {
        let plain = pack_key(KernelClass::Half, KernelClass::Half, KernelClass::Half, true, QuantKind::None, false);
        let trans = pack_key(KernelClass::Half, KernelClass::Half, KernelClass::Half, true, QuantKind::None, true);
        assert_ne!(plain, trans);
    }
}
