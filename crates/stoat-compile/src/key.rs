use stoat_core::{KernelClass, QuantKind};

// VariantKey — Bit-packed kernel-variant discriminator
//
// Every operation family maps (axis, input classes, output class, 2-D flag,
// family-specific profile bits) to a u32 registry key. A silent overlap
// between two fields routes lookups to the wrong kernel with no diagnostic.
// BitPacker builds keys from sequential fields, so ranges are disjoint by
// construction, and panics at table-build time if a value does not fit its
// declared width or the layout exceeds 32 bits. Table construction runs
// under tests, which makes both checks effectively build-time.

/// Sequential bit-field packer for variant keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct BitPacker {
    bits: u32,
    used: u32,
}

impl BitPacker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` in the next `width` bits. Panics if the value does
    /// not fit or the key would exceed 32 bits; both are table-definition
    /// bugs, not runtime conditions.
    pub fn field(mut self, name: &str, width: u32, value: u32) -> Self {
        assert!(
            self.used + width <= 32,
            "variant key overflows 32 bits at field '{}'",
            name
        );
        assert!(
            width == 32 || value < (1u32 << width),
            "field '{}' value {} does not fit {} bits",
            name,
            value,
            width
        );
        self.bits |= value << self.used;
        self.used += width;
        self
    }

    pub fn finish(self) -> u32 {
        self.bits
    }
}

/// The discriminators shared by every operation family's key.
///
/// Families append their own profile bits after these; the shared prefix
/// keeps the enumerated variant sets comparable across families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariantKey {
    pub axis: u32,
    pub input: KernelClass,
    /// Second operand class for binary families; `None` packs as zero.
    pub input2: Option<KernelClass>,
    pub output: KernelClass,
    pub is_image_2d: bool,
    /// Quantization kind of the bridged operands. Affine and fixed-point
    /// kernels take different scalar constants, so they are different
    /// variants even at the same dtype classes.
    pub quant: QuantKind,
}

impl VariantKey {
    /// Pack the shared prefix: axis 4 bits, each class 4 bits, the 2-D
    /// flag, then 2 bits of quantization kind. Returns the packer so a
    /// family can append profile bits.
    pub fn pack(&self) -> BitPacker {
        BitPacker::new()
            .field("axis", 4, self.axis)
            .field("input", 4, self.input.code())
            .field("input2", 4, self.input2.map_or(0, |c| c.code()))
            .field("output", 4, self.output.code())
            .field("image_2d", 1, u32::from(self.is_image_2d))
            .field("quant", 2, self.quant.code())
    }

    /// The key with no family profile bits.
    pub fn finish(&self) -> u32 {
        self.pack().finish()
    }
}
