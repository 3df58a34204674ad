use stoat_core::{KernelClass, QuantKind};

use super::{
    class_tag, init_affine, init_affine_lanes, init_dfp, init_dfp_lanes, init_no_scalars,
    kind_tag, table_quant_kinds,
};
use crate::key::VariantKey;
use crate::params::{ParamLayout, ParamSlot};
use crate::registry::{Backend, Initializer, KernelDescriptor, TableBuilder};

// Elementwise family — unary and binary kernels
//
// Key layout: shared prefix (axis, input, input2, output, image flag,
// quant kind), then a 4-bit op code. Unary variants pack input2 = None.

/// Family-specific op codes appended to the shared key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EltwiseCode {
    Copy = 0,
    Add = 1,
    Sub = 2,
    Mul = 3,
    Sigmoid = 4,
    Tanh = 5,
    Relu = 6,
}

impl EltwiseCode {
    pub fn is_binary(self) -> bool {
        matches!(self, EltwiseCode::Add | EltwiseCode::Sub | EltwiseCode::Mul)
    }

    pub fn name(self) -> &'static str {
        match self {
            EltwiseCode::Copy => "copy",
            EltwiseCode::Add => "add",
            EltwiseCode::Sub => "sub",
            EltwiseCode::Mul => "mul",
            EltwiseCode::Sigmoid => "sigmoid",
            EltwiseCode::Tanh => "tanh",
            EltwiseCode::Relu => "relu",
        }
    }
}

/// Pack the full elementwise key: shared prefix plus the op code.
pub fn pack_key(
    code: EltwiseCode,
    input: KernelClass,
    input2: Option<KernelClass>,
    output: KernelClass,
    is_image_2d: bool,
    quant: QuantKind,
) -> u32 {
    VariantKey {
        axis: 0,
        input,
        input2,
        output,
        is_image_2d,
        quant,
    }
    .pack()
    .field("eltwise_op", 4, code as u32)
    .finish()
}

const ALL_CODES: [EltwiseCode; 7] = [
    EltwiseCode::Copy,
    EltwiseCode::Add,
    EltwiseCode::Sub,
    EltwiseCode::Mul,
    EltwiseCode::Sigmoid,
    EltwiseCode::Tanh,
    EltwiseCode::Relu,
];

/// Scalar slots appended for one quantization kind. The affine contract
/// differs between the scalar backends (float scale plus fixed-point pair)
/// and the vector ISA (offset plus lane-replicated multiplier).
fn requant_slots(kind: QuantKind, lanes: bool) -> Vec<ParamSlot> {
    match kind {
        QuantKind::None => Vec::new(),
        QuantKind::AsymmetricAffine if lanes => vec![
            ParamSlot::scalar("offset"),
            ParamSlot::scalar("m0"),
            ParamSlot::scalar("post_shift"),
        ],
        QuantKind::AsymmetricAffine | QuantKind::AsymmetricPerChannel => vec![
            ParamSlot::scalar("scale"),
            ParamSlot::scalar("offset"),
            ParamSlot::scalar("m0"),
            ParamSlot::scalar("post_shift"),
        ],
        QuantKind::DynamicFixedPoint => vec![ParamSlot::scalar("rescale")],
    }
}

fn layout_for(code: EltwiseCode, kind: QuantKind, lanes: bool) -> ParamLayout {
    let mut slots = vec![ParamSlot::input("input")];
    if code.is_binary() {
        slots.push(ParamSlot::input("input1"));
    }
    slots.push(ParamSlot::output("output"));
    slots.extend(requant_slots(kind, lanes));
    ParamLayout::new(slots)
}

fn init_for(kind: QuantKind, lanes: bool) -> Initializer {
    match (kind, lanes) {
        (QuantKind::AsymmetricAffine, false) => init_affine,
        (QuantKind::AsymmetricAffine, true) => init_affine_lanes,
        (QuantKind::DynamicFixedPoint, false) => init_dfp,
        (QuantKind::DynamicFixedPoint, true) => init_dfp_lanes,
        _ => init_no_scalars,
    }
}

struct BackendProfile {
    classes: &'static [KernelClass],
    resource_prefix: &'static str,
    scale8: [u32; 3],
    scale16: [u32; 3],
    align: u32,
    lanes: bool,
}

fn profile(backend: Backend) -> BackendProfile {
    match backend {
        Backend::Cpu => BackendProfile {
            classes: &[
                KernelClass::U8,
                KernelClass::I8,
                KernelClass::I16,
                KernelClass::Half,
                KernelClass::F32,
            ],
            resource_prefix: "cpu/eltwise",
            scale8: [1, 1, 1],
            scale16: [1, 1, 1],
            align: 1,
            lanes: false,
        },
        Backend::Cl => BackendProfile {
            classes: &[
                KernelClass::U8,
                KernelClass::I8,
                KernelClass::I16,
                KernelClass::Half,
                KernelClass::F32,
            ],
            resource_prefix: "cl/eltwise",
            scale8: [4, 1, 1],
            scale16: [4, 1, 1],
            align: 4,
            lanes: false,
        },
        Backend::Evis => BackendProfile {
            classes: &[
                KernelClass::U8,
                KernelClass::I8,
                KernelClass::I16,
                KernelClass::Half,
            ],
            resource_prefix: "evis/eltwise",
            scale8: [8, 1, 1],
            scale16: [4, 1, 1],
            align: 4,
            lanes: true,
        },
    }
}

/// Register every elementwise variant this backend ships.
pub fn register(backend: Backend, table: &mut TableBuilder) {
    let p = profile(backend);
    for &code in &ALL_CODES {
        for &class in p.classes {
            for &kind in table_quant_kinds(class) {
                for image_2d in [true, false] {
                    let input2 = if code.is_binary() { Some(class) } else { None };
                    let key = pack_key(code, class, input2, class, image_2d, kind);
                    let tag = class_tag(class);
                    let suffix = if image_2d { "_2D" } else { "" };
                    let scale = if matches!(class, KernelClass::I8 | KernelClass::U8) {
                        p.scale8
                    } else {
                        p.scale16
                    };
                    table.register(KernelDescriptor {
                        key,
                        entry_name: format!(
                            "{}_{}to{}{}{}",
                            code.name(),
                            tag,
                            tag,
                            kind_tag(kind),
                            suffix
                        ),
                        source_resource: format!("{}_{}", p.resource_prefix, code.name()),
                        param_layout: layout_for(code, kind, p.lanes),
                        global_scale: scale,
                        align: p.align,
                        initializer: init_for(kind, p.lanes),
                    });
                }
            }
        }
    }
}
