use std::fmt;

// Quantization — How integer storage maps to real values
//
// Every tensor carries one of these schemes. The compiler never touches
// tensor data; it only reads the scheme to derive the rescale constants a
// kernel needs to move values between quantization domains.
//
//   AsymmetricAffine     real = (stored − zero_point) × scale
//   AsymmetricPerChannel one (scale, zero_point) pair per channel along
//                        channel_dim; used for per-channel weights
//   DynamicFixedPoint    real = stored × 2^(−fl), fl may be negative
//   None                 float storage, identity mapping

/// Tag identifying a quantization scheme, without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantKind {
    None,
    AsymmetricAffine,
    AsymmetricPerChannel,
    DynamicFixedPoint,
}

impl QuantKind {
    /// Value packed into a variant key. Fits in 2 bits. The kind selects
    /// the kernel's scalar-constant contract, so it discriminates variants
    /// the same way the dtype classes do.
    pub fn code(self) -> u32 {
        match self {
            QuantKind::None => 0,
            QuantKind::AsymmetricAffine => 1,
            QuantKind::AsymmetricPerChannel => 2,
            QuantKind::DynamicFixedPoint => 3,
        }
    }
}

/// A tensor's quantization scheme.
///
/// Equality is elementwise: same tag, same scales, same zero points, same
/// channel dim, same fractional length. Two schemes that round-trip to the
/// same values but differ in any field compare unequal.
#[derive(Debug, Clone, PartialEq)]
pub enum Quantization {
    /// Unquantized float storage.
    None,
    /// One (scale, zero_point) pair for the whole tensor.
    AsymmetricAffine { scale: f32, zero_point: i32 },
    /// One (scale, zero_point) pair per channel along `channel_dim`.
    AsymmetricPerChannel {
        channel_dim: usize,
        scales: Vec<f32>,
        zero_points: Vec<i32>,
    },
    /// Signed fractional length: real = stored × 2^(−fl).
    DynamicFixedPoint { fl: i8 },
}

impl Quantization {
    /// Per-channel scheme. Panics if the scale and zero-point vectors have
    /// different lengths; that is a constructor-contract violation, not a
    /// recoverable condition.
    pub fn per_channel(channel_dim: usize, scales: Vec<f32>, zero_points: Vec<i32>) -> Self {
        assert_eq!(
            scales.len(),
            zero_points.len(),
            "per-channel quantization requires scales.len() == zero_points.len() ({} != {})",
            scales.len(),
            zero_points.len()
        );
        assert!(!scales.is_empty(), "per-channel quantization requires at least one channel");
        Quantization::AsymmetricPerChannel {
            channel_dim,
            scales,
            zero_points,
        }
    }

    /// The scheme's tag.
    pub fn kind(&self) -> QuantKind {
        match self {
            Quantization::None => QuantKind::None,
            Quantization::AsymmetricAffine { .. } => QuantKind::AsymmetricAffine,
            Quantization::AsymmetricPerChannel { .. } => QuantKind::AsymmetricPerChannel,
            Quantization::DynamicFixedPoint { .. } => QuantKind::DynamicFixedPoint,
        }
    }

    /// Whether this scheme quantizes at all.
    pub fn is_quantized(&self) -> bool {
        !matches!(self, Quantization::None)
    }

    /// Number of (scale, zero_point) pairs: channel count for per-channel,
    /// 1 for affine, 0 otherwise.
    pub fn pair_count(&self) -> usize {
        match self {
            Quantization::AsymmetricAffine { .. } => 1,
            Quantization::AsymmetricPerChannel { scales, .. } => scales.len(),
            _ => 0,
        }
    }
}

impl fmt::Display for Quantization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantization::None => write!(f, "none"),
            Quantization::AsymmetricAffine { scale, zero_point } => {
                write!(f, "affine(scale={}, zp={})", scale, zero_point)
            }
            Quantization::AsymmetricPerChannel { channel_dim, scales, .. } => {
                write!(f, "per_channel(dim={}, channels={})", channel_dim, scales.len())
            }
            Quantization::DynamicFixedPoint { fl } => write!(f, "dfp(fl={})", fl),
        }
    }
}
