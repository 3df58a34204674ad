use stoat_core::{KernelClass, QuantKind, Shape};

use super::{
    class_tag, init_affine, init_affine_lanes, init_dfp, init_dfp_lanes, init_no_scalars,
    kind_tag, table_quant_kinds,
};
use crate::key::VariantKey;
use crate::params::{ParamLayout, ParamSlot};
use crate::registry::{Backend, Initializer, KernelDescriptor, TableBuilder};

// Reduce family — sum / product / max along one axis
//
// Key layout: shared prefix with the reduction axis in the axis field,
// then 2 bits of reduce kind and 1 profile bit. The profile bit selects
// the fast fixed-function kernel: an axis-0 reduction whose extent fits a
// single vector register has a dedicated variant that skips the strided
// loop. That choice is made once per finalize from the operand shapes and
// never changes after a variant has been selected.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceCode {
    Sum = 0,
    Prod = 1,
    Max = 2,
}

impl ReduceCode {
    pub fn name(self) -> &'static str {
        match self {
            ReduceCode::Sum => "reduce_sum",
            ReduceCode::Prod => "reduce_prod",
            ReduceCode::Max => "reduce_max",
        }
    }
}

/// Fast fixed-function versus generic strided kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceProfile {
    Fast,
    Generic,
}

/// Extents at or below this along axis 0 fit one vector register.
const FAST_AXIS0_LIMIT: usize = 8;

/// Decide fast-vs-generic from the finalized input shape. Pure function
/// of the operands; finalize computes it exactly once and stores it.
pub fn select_profile(input: &Shape, axis: usize) -> ReduceProfile {
    if axis == 0 && input.dim_or_one(0) <= FAST_AXIS0_LIMIT {
        ReduceProfile::Fast
    } else {
        ReduceProfile::Generic
    }
}

/// Pack the full reduce key.
pub fn pack_key(
    code: ReduceCode,
    axis: u32,
    input: KernelClass,
    output: KernelClass,
    is_image_2d: bool,
    quant: QuantKind,
    profile: ReduceProfile,
) -> u32 {
    VariantKey {
        axis,
        input,
        input2: None,
        output,
        is_image_2d,
        quant,
    }
    .pack()
    .field("reduce_op", 2, code as u32)
    .field("fast", 1, u32::from(profile == ReduceProfile::Fast))
    .finish()
}

const ALL_CODES: [ReduceCode; 3] = [ReduceCode::Sum, ReduceCode::Prod, ReduceCode::Max];

fn layout_for(kind: QuantKind, lanes: bool) -> ParamLayout {
    let mut slots = vec![ParamSlot::input("input"), ParamSlot::output("output")];
    match kind {
        QuantKind::None => {}
        QuantKind::AsymmetricAffine if lanes => {
            slots.push(ParamSlot::scalar("offset"));
            slots.push(ParamSlot::scalar("m0"));
            slots.push(ParamSlot::scalar("post_shift"));
        }
        QuantKind::AsymmetricAffine | QuantKind::AsymmetricPerChannel => {
            slots.push(ParamSlot::scalar("scale"));
            slots.push(ParamSlot::scalar("offset"));
            slots.push(ParamSlot::scalar("m0"));
            slots.push(ParamSlot::scalar("post_shift"));
        }
        QuantKind::DynamicFixedPoint => slots.push(ParamSlot::scalar("rescale")),
    }
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
    align: u32,
    lanes: bool,
}

fn profile(backend: Backend) -> BackendProfile {
    match backend {
        Backend::Cpu => BackendProfile {
            classes: &[KernelClass::U8, KernelClass::I16, KernelClass::Half, KernelClass::F32],
            resource_prefix: "cpu/reduce",
            align: 1,
            lanes: false,
        },
        Backend::Cl => BackendProfile {
            classes: &[KernelClass::U8, KernelClass::I16, KernelClass::Half, KernelClass::F32],
            resource_prefix: "cl/reduce",
            align: 4,
            lanes: false,
        },
        Backend::Evis => BackendProfile {
            classes: &[KernelClass::U8, KernelClass::I16, KernelClass::Half],
            resource_prefix: "evis/reduce",
            align: 4,
            lanes: true,
        },
    }
}

/// Register every reduce variant this backend ships. Fast variants exist
/// only for axis 0; generic variants cover axes 0..3.
pub fn register(backend: Backend, table: &mut TableBuilder) {
    let p = profile(backend);
    for &code in &ALL_CODES {
        for &class in p.classes {
            for &kind in table_quant_kinds(class) {
                let init = init_for(kind, p.lanes);
                for image_2d in [true, false] {
                    let tag = class_tag(class);
                    let suffix = if image_2d { "_2D" } else { "" };
                    for axis in 0..3u32 {
                        table.register(KernelDescriptor {
                            key: pack_key(code, axis, class, class, image_2d, kind, ReduceProfile::Generic),
                            entry_name: format!(
                                "{}_axis{}_{}to{}{}{}",
                                code.name(),
                                axis,
                                tag,
                                tag,
                                kind_tag(kind),
                                suffix
                            ),
                            source_resource: format!("{}_{}", p.resource_prefix, code.name()),
                            param_layout: layout_for(kind, p.lanes),
                            global_scale: [1, 1, 1],
                            align: p.align,
                            initializer: init,
                        });
                    }
                    table.register(KernelDescriptor {
                        key: pack_key(code, 0, class, class, image_2d, kind, ReduceProfile::Fast),
                        entry_name: format!(
                            "{}_fast_{}to{}{}{}",
                            code.name(),
                            tag,
                            tag,
                            kind_tag(kind),
                            suffix
                        ),
                        source_resource: format!("{}_{}_fast", p.resource_prefix, code.name()),
                        param_layout: layout_for(kind, p.lanes),
                        global_scale: [1, 1, 1],
                        align: p.align,
                        initializer: init,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{self, OpFamily};

    #[test]
    fn test_profile_selection() {
        assert_eq!(select_profile(&Shape::from((7, 3)), 0), ReduceProfile::Fast);
        assert_eq!(select_profile(&Shape::from((64, 3)), 0), ReduceProfile::Generic);
        assert_eq!(select_profile(&Shape::from((7, 3)), 1), ReduceProfile::Generic);
    }

    #[test]
    fn test_fast_and_generic_are_distinct_variants() {
        let affine = QuantKind::AsymmetricAffine;
        let fast = pack_key(ReduceCode::Prod, 0, KernelClass::U8, KernelClass::U8, true, affine, ReduceProfile::Fast);
        let generic = pack_key(ReduceCode::Prod, 0, KernelClass::U8, KernelClass::U8, true, affine, ReduceProfile::Generic);
        assert_ne!(fast, generic);
        let f = registry::lookup(Backend::Cl, OpFamily::Reduce, "reduce_prod", fast).unwrap();
        let g = registry::lookup(Backend::Cl, OpFamily::Reduce, "reduce_prod", generic).unwrap();
        assert_eq!(f.entry_name, "reduce_prod_fast_U8toU8_2D");
        assert_eq!(g.entry_name, "reduce_prod_axis0_U8toU8_2D");
    }

    #[test]
    fn test_axis_is_part_of_the_key() {
        let a0 = pack_key(ReduceCode::Sum, 0, KernelClass::Half, KernelClass::Half, false, QuantKind::None, ReduceProfile::Generic);
        let a1 = pack_key(ReduceCode::Sum, 1, KernelClass::Half, KernelClass::Half, false, QuantKind::None, ReduceProfile::Generic);
        assert_ne!(a0, a1);
    }

    #[test]
    fn test_fixed_point_reduce_is_its_own_variant() {
        let dfp = pack_key(ReduceCode::Sum, 0, KernelClass::I16, KernelClass::I16, false, QuantKind::DynamicFixedPoint, ReduceProfile::Generic);
        let desc = registry::lookup(Backend::Cpu, OpFamily::Reduce, "reduce_sum", dfp).unwrap();
        assert_eq!(desc.entry_name, "reduce_sum_axis0_I16toI16_dfp");
        assert_eq!(desc.param_layout.scalar_count(), 1);
    }
}
