// Kernel tables — One module per operation family
//
// Each module registers the hand-specialized variants of its family for
// every backend. Entry names and resource names follow the kernel source
// tree's <op>_<in>to<out>[_2D] convention; keys are packed through
// VariantKey so field ranges cannot overlap. The quantization kind is part
// of the key: affine and fixed-point kernels declare different scalar
// slots, and each variant's initializer produces exactly the constants its
// layout declares (finalize enforces the count).

pub mod elementwise;
pub mod matmul;
pub mod reduce;

use stoat_core::{Error, KernelClass, QuantKind, Result};

use crate::bridge::{self, BridgeConstants, DfpBridge};
use crate::params::ScalarValue;
use crate::registry::InitCtx;

/// Initializer for float kernels: no scalar constants.
pub(crate) fn init_no_scalars(_ctx: &InitCtx) -> Result<Vec<ScalarValue>> {
    Ok(Vec::new())
}

fn unsupported(src: &stoat_core::Quantization, dst: &stoat_core::Quantization) -> Error {
    Error::UnsupportedQuantizationPair {
        src: src.to_string(),
        dst: dst.to_string(),
    }
}

/// Affine requantization constants bridging input 0 into output 0, in the
/// order the affine layouts declare them: scale, offset, m0, post_shift.
pub(crate) fn init_affine(ctx: &InitCtx) -> Result<Vec<ScalarValue>> {
    let (src, dst) = (ctx.inputs[0].quant(), ctx.outputs[0].quant());
    match bridge::bridge(src, dst)? {
        BridgeConstants::Affine { bridge: b, fixed: Some(fp) } => Ok(vec![
            ScalarValue::F32(b.scale),
            ScalarValue::F32(b.offset),
            ScalarValue::U32(u32::from(fp.m0)),
            ScalarValue::U32(fp.post_shift),
        ]),
        _ => Err(unsupported(src, dst)),
    }
}

/// Vector-ISA flavor of init_affine: no float scale slot, and the 16-bit
/// multiplier is replicated across the lanes of one SIMD instruction
/// operand (8 lanes for 8-bit data, 4 for 16-bit).
pub(crate) fn init_affine_lanes(ctx: &InitCtx) -> Result<Vec<ScalarValue>> {
    let lanes = if ctx.inputs[0].dtype().size_in_bytes() == 1 { 8 } else { 4 };
    let (src, dst) = (ctx.inputs[0].quant(), ctx.outputs[0].quant());
    match bridge::bridge(src, dst)? {
        BridgeConstants::Affine { bridge: b, fixed: Some(fp) } => Ok(vec![
            ScalarValue::F32(b.offset),
            ScalarValue::Lanes(bridge::replicate_lanes(fp.m0, lanes)),
            ScalarValue::U32(fp.post_shift),
        ]),
        _ => Err(unsupported(src, dst)),
    }
}

/// Fixed-point requantization: one constant, a right shift or a 2^n
/// multiplier, filling the single rescale slot.
pub(crate) fn init_dfp(ctx: &InitCtx) -> Result<Vec<ScalarValue>> {
    let (src, dst) = (ctx.inputs[0].quant(), ctx.outputs[0].quant());
    match bridge::bridge(src, dst)? {
        BridgeConstants::Dfp(DfpBridge::RightShift(s)) => Ok(vec![ScalarValue::U32(s)]),
        BridgeConstants::Dfp(DfpBridge::Multiplier(m)) => {
            Ok(vec![ScalarValue::U32(u32::from(m))])
        }
        _ => Err(unsupported(src, dst)),
    }
}

/// Vector-ISA flavor of init_dfp: a shift stays one word, a multiplier is
/// lane-replicated like the affine one.
pub(crate) fn init_dfp_lanes(ctx: &InitCtx) -> Result<Vec<ScalarValue>> {
    let lanes = if ctx.inputs[0].dtype().size_in_bytes() == 1 { 8 } else { 4 };
    let (src, dst) = (ctx.inputs[0].quant(), ctx.outputs[0].quant());
    match bridge::bridge(src, dst)? {
        BridgeConstants::Dfp(DfpBridge::RightShift(s)) => Ok(vec![ScalarValue::U32(s)]),
        BridgeConstants::Dfp(DfpBridge::Multiplier(m)) => {
            Ok(vec![ScalarValue::Lanes(bridge::replicate_lanes(m, lanes))])
        }
        _ => Err(unsupported(src, dst)),
    }
}

/// The quantization kinds a class ships variants for. Integer classes
/// carry affine and fixed-point kernels; float classes only the identity.
/// Unquantized data on an integer class has no variant and fails lookup.
pub(crate) fn table_quant_kinds(class: KernelClass) -> &'static [QuantKind] {
    if is_quantized_class(class) {
        &[QuantKind::AsymmetricAffine, QuantKind::DynamicFixedPoint]
    } else {
        &[QuantKind::None]
    }
}

/// Entry-name infix for one quantization kind; affine is the unmarked
/// default in the kernel source tree.
pub(crate) fn kind_tag(kind: QuantKind) -> &'static str {
    match kind {
        QuantKind::None | QuantKind::AsymmetricAffine => "",
        QuantKind::AsymmetricPerChannel => "_pc",
        QuantKind::DynamicFixedPoint => "_dfp",
    }
}

/// Suffix used in entry names for one kernel class.
pub(crate) fn class_tag(class: KernelClass) -> &'static str {
    match class {
        KernelClass::I8 => "I8",
        KernelClass::U8 => "U8",
        KernelClass::I16 => "I16",
        KernelClass::U16 => "U16",
        KernelClass::I32 => "I32",
        KernelClass::Half => "F16",
        KernelClass::F32 => "F32",
    }
}

/// Whether a class carries quantized integer data (and therefore needs
/// requant scalars in its parameter list).
pub(crate) fn is_quantized_class(class: KernelClass) -> bool {
    matches!(
        class,
        KernelClass::I8 | KernelClass::U8 | KernelClass::I16 | KernelClass::U16
    )
}
