use std::fmt;

// DType — Supported storage element types
//
// Every tensor carries a DType that determines its element size and which
// kernel variants can consume it. The set mirrors what the NPU backends
// actually ship kernels for:
//
//   I8/U8    — quantized activations and weights
//   I16/U16  — wide quantized data and fixed-point accumulators
//   I32/U32  — indices and per-channel constant buffers
//   F16/BF16 — half-precision float paths
//   F32      — reference float path

/// Enum of all supported element data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F16,
    BF16,
    F32,
}

/// Canonicalized dtype class used for kernel-variant lookup.
///
/// Hand-specialized kernels are rarely written per exact dtype: a kernel
/// whose source is numerically agnostic between f16 and bf16 is registered
/// once under `Half`, and narrow integer types route to a shared class per
/// signedness and width. Variant keys pack a `KernelClass`, never a raw
/// `DType`, so the table stays small and the collapse is explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelClass {
    I8,
    U8,
    I16,
    U16,
    I32,
    Half,
    F32,
}

impl KernelClass {
    /// Value packed into a variant key. Fits in 4 bits.
    pub fn code(self) -> u32 {
        match self {
            KernelClass::I8 => 0,
            KernelClass::U8 => 1,
            KernelClass::I16 => 2,
            KernelClass::U16 => 3,
            KernelClass::I32 => 4,
            KernelClass::Half => 5,
            KernelClass::F32 => 6,
        }
    }
}

impl DType {
    /// Size of one element in bytes.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::I8 | DType::U8 => 1,
            DType::I16 | DType::U16 | DType::F16 | DType::BF16 => 2,
            DType::I32 | DType::U32 | DType::F32 => 4,
        }
    }

    /// Whether this dtype is a floating-point type.
    pub fn is_float(&self) -> bool {
        matches!(self, DType::F16 | DType::BF16 | DType::F32)
    }

    /// Whether this is a half-precision type (F16 or BF16).
    pub fn is_half(&self) -> bool {
        matches!(self, DType::F16 | DType::BF16)
    }

    /// Whether this is a signed integer type.
    pub fn is_signed_int(&self) -> bool {
        matches!(self, DType::I8 | DType::I16 | DType::I32)
    }

    /// Canonical class for kernel-variant lookup.
    ///
    /// F16 and BF16 share the `Half` class; U32 routes to the I32 class
    /// (the index kernels treat both as 32-bit words).
    pub fn kernel_class(&self) -> KernelClass {
        match self {
            DType::I8 => KernelClass::I8,
            DType::U8 => KernelClass::U8,
            DType::I16 => KernelClass::I16,
            DType::U16 => KernelClass::U16,
            DType::I32 | DType::U32 => KernelClass::I32,
            DType::F16 | DType::BF16 => KernelClass::Half,
            DType::F32 => KernelClass::F32,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::I8 => "i8",
            DType::U8 => "u8",
            DType::I16 => "i16",
            DType::U16 => "u16",
            DType::I32 => "i32",
            DType::U32 => "u32",
            DType::F16 => "f16",
            DType::BF16 => "bf16",
            DType::F32 => "f32",
        };
        write!(f, "{}", s)
    }
}

// WithDType — Trait that connects Rust types to the DType enum
//
// Lets scalar-constant plumbing stay generic: a kernel initializer that
// replicates a fixed-point multiplier across SIMD lanes can be written once
// over `T: WithDType` and instantiated per lane width.

/// Trait implemented by Rust types that can be stored in a tensor.
pub trait WithDType: Copy + Send + Sync + 'static + num_traits::NumCast + std::fmt::Debug {
    /// The corresponding DType enum variant.
    const DTYPE: DType;

    /// Convert this value to f64 (for generic numeric code).
    fn to_f64(self) -> f64;

    /// Create a value of this type from f64.
    fn from_f64(v: f64) -> Self;
}

macro_rules! with_dtype_int {
    ($ty:ty, $dtype:expr) => {
        impl WithDType for $ty {
            const DTYPE: DType = $dtype;
            fn to_f64(self) -> f64 {
                self as f64
            }
            fn from_f64(v: f64) -> Self {
                v as $ty
            }
        }
    };
}

with_dtype_int!(i8, DType::I8);
with_dtype_int!(u8, DType::U8);
with_dtype_int!(i16, DType::I16);
with_dtype_int!(u16, DType::U16);
with_dtype_int!(i32, DType::I32);
with_dtype_int!(u32, DType::U32);
with_dtype_int!(f32, DType::F32);

impl WithDType for half::f16 {
    const DTYPE: DType = DType::F16;
    fn to_f64(self) -> f64 {
        self.to_f32() as f64
    }
    fn from_f64(v: f64) -> Self {
        half::f16::from_f64(v)
    }
}

impl WithDType for half::bf16 {
    const DTYPE: DType = DType::BF16;
    fn to_f64(self) -> f64 {
        self.to_f32() as f64
    }
    fn from_f64(v: f64) -> Self {
        half::bf16::from_f64(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_size() {
        assert_eq!(DType::I8.size_in_bytes(), 1);
        assert_eq!(DType::U16.size_in_bytes(), 2);
        assert_eq!(DType::F16.size_in_bytes(), 2);
        assert_eq!(DType::F32.size_in_bytes(), 4);
    }

    #[test]
    fn test_half_types_share_class() {
        assert_eq!(DType::F16.kernel_class(), KernelClass::Half);
        assert_eq!(DType::BF16.kernel_class(), KernelClass::Half);
        assert_ne!(DType::F32.kernel_class(), KernelClass::Half);
    }

    #[test]
    fn test_u32_collapses_to_i32_class() {
        assert_eq!(DType::U32.kernel_class(), DType::I32.kernel_class());
    }

    #[test]
    fn test_class_codes_fit_four_bits() {
        for class in [
            KernelClass::I8,
            KernelClass::U8,
            KernelClass::I16,
            KernelClass::U16,
            KernelClass::I32,
            KernelClass::Half,
            KernelClass::F32,
        ] {
            assert!(class.code() < 16);
        }
    }

    #[test]
    fn test_with_dtype_roundtrip() {
        assert_eq!(u8::from_f64(200.0).to_f64(), 200.0);
        assert_eq!(i16::from_f64(-300.0).to_f64(), -300.0);
        assert_eq!(half::f16::DTYPE, DType::F16);
    }
}
