use stoat_core::{Error, Quantization, Result, WithDType};

// QuantizationBridge — Rescale constants between quantization domains
//
// A kernel that reads tensors in one quantization domain and writes another
// needs scalar constants to move values between them. This module derives
// those constants from the tensors' schemes alone; it never touches data.
//
//   affine -> affine   effective_scale = s_src / s_dst
//                      effective_offset = zp_dst - zp_src * effective_scale
//   dfp -> dfp         pure shift (or a 2^n multiplier when shifting left)
//   none -> none       identity
//
// Fixed-point hardware multiplies take a 16-bit multiplier and a right
// shift instead of a float; quantize_multiplier derives that pair with a
// guaranteed one-ULP-of-the-shift error bound and refuses to degrade
// further (RescaleOverflow) when the scale cannot be represented.

/// Largest multiplier the fixed-point multiply unit accepts.
pub const MAX_MULTIPLIER: u32 = u16::MAX as u32;
/// Largest post-multiply right shift the hardware encodes.
pub const MAX_POST_SHIFT: u32 = 31;

/// Float rescale constants for an affine-to-affine bridge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineBridge {
    pub scale: f32,
    pub offset: f32,
}

impl AffineBridge {
    /// The identity bridge (float in, float out).
    pub const IDENTITY: AffineBridge = AffineBridge { scale: 1.0, offset: 0.0 };
}

/// A 16-bit multiplier / right-shift pair approximating a float scale:
/// scale ~= m0 * 2^(-post_shift).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPointScale {
    pub m0: u16,
    pub post_shift: u32,
}

impl FixedPointScale {
    /// The float scale this pair reconstructs.
    pub fn reconstruct(&self) -> f64 {
        f64::from(self.m0) / (1u64 << self.post_shift) as f64
    }
}

/// The constants a dynamic-fixed-point bridge reduces to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DfpBridge {
    /// src.fl >= dst.fl: arithmetic right shift by this many bits.
    RightShift(u32),
    /// src.fl < dst.fl: multiply by 2^(dst.fl - src.fl).
    Multiplier(u16),
}

/// Affine-to-affine bridge: the single (scale, offset) pair that carries a
/// stored source value into the destination's integer domain.
pub fn affine_bridge(src_scale: f32, src_zp: i32, dst_scale: f32, dst_zp: i32) -> AffineBridge {
    let scale = src_scale / dst_scale;
    let offset = dst_zp as f32 - src_zp as f32 * scale;
    AffineBridge { scale, offset }
}

/// Per-channel source against a per-tensor destination: one bridge per
/// channel. Used for per-channel-quantized weights feeding a per-tensor
/// accumulator.
pub fn per_channel_bridge(
    src_scales: &[f32],
    src_zps: &[i32],
    dst_scale: f32,
    dst_zp: i32,
) -> Vec<AffineBridge> {
    src_scales
        .iter()
        .zip(src_zps.iter())
        .map(|(&s, &zp)| affine_bridge(s, zp, dst_scale, dst_zp))
        .collect()
}

/// Quantize a positive float scale to a (m0, post_shift) pair with
/// m0 <= 65535 and 0 <= post_shift <= 31.
///
/// Picks the largest shift whose multiplier still fits, so the error bound
/// |m0 * 2^(-post_shift) - scale| <= 2^(-post_shift) always holds: rounding
/// contributes at most half a ULP of the shift, and the clamp from 65536 to
/// 65535 at the fit boundary at most another half.
pub fn quantize_multiplier(scale: f64) -> Result<FixedPointScale> {
    if !scale.is_finite() || scale < 0.0 {
        return Err(Error::RescaleOverflow {
            scale,
            max_multiplier: MAX_MULTIPLIER,
            max_shift: MAX_POST_SHIFT,
        });
    }

    // Largest shift with scale * 2^shift still inside the multiplier range
    // (65536 is allowed here and clamped below; the clamp stays within the
    // error bound).
    let mut post_shift = MAX_POST_SHIFT;
    while post_shift > 0 && scale * (1u64 << post_shift) as f64 > f64::from(MAX_MULTIPLIER) + 1.0 {
        post_shift -= 1;
    }
    let scaled = scale * (1u64 << post_shift) as f64;
    if scaled > f64::from(MAX_MULTIPLIER) + 1.0 {
        // Even shift 0 overflows: the scale is too large for the hardware.
        return Err(Error::RescaleOverflow {
            scale,
            max_multiplier: MAX_MULTIPLIER,
            max_shift: MAX_POST_SHIFT,
        });
    }

    let m0 = (scaled.round() as u32).min(MAX_MULTIPLIER) as u16;
    Ok(FixedPointScale { m0, post_shift })
}

/// Dynamic-fixed-point bridge between two fractional lengths.
///
/// A non-negative fl delta is a pure right shift, capped at 31 bits; a
/// negative delta becomes a power-of-two multiplier, which must fit the
/// 16-bit multiply unit.
pub fn dfp_bridge(src_fl: i8, dst_fl: i8) -> Result<DfpBridge> {
    let delta = i32::from(src_fl) - i32::from(dst_fl);
    if delta >= 0 {
        Ok(DfpBridge::RightShift((delta as u32).min(MAX_POST_SHIFT)))
    } else {
        let bits = (-delta) as u32;
        if bits > 15 {
            // 2^bits no longer fits the 16-bit multiplier.
            return Err(Error::RescaleOverflow {
                scale: (1u64 << bits.min(63)) as f64,
                max_multiplier: MAX_MULTIPLIER,
                max_shift: MAX_POST_SHIFT,
            });
        }
        Ok(DfpBridge::Multiplier(1u16 << bits))
    }
}

/// Replicate a bridge constant across the lanes of one SIMD instruction
/// operand. 8-bit kernels consume 8 lanes per operand, 16-bit kernels 4;
/// every lane carries the same value.
pub fn replicate_lanes<T: WithDType>(value: T, lanes: usize) -> Vec<T> {
    vec![value; lanes]
}

/// The fully resolved constants of one source-to-destination bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeConstants {
    /// Float path or affine pair: scale and offset, with the fixed-point
    /// form alongside when the scale is representable.
    Affine {
        bridge: AffineBridge,
        fixed: Option<FixedPointScale>,
    },
    /// One affine bridge per channel.
    PerChannel(Vec<AffineBridge>),
    /// Fixed-point shift or power-of-two multiplier.
    Dfp(DfpBridge),
}

/// Derive the bridge constants between two quantization schemes.
///
/// Mixed float/quantized pairs and mismatched quantized tags are rejected
/// with UnsupportedQuantizationPair; no silent coercion exists on the
/// hardware, so none exists here.
pub fn bridge(src: &Quantization, dst: &Quantization) -> Result<BridgeConstants> {
    use Quantization::*;
    match (src, dst) {
        (None, None) => Ok(BridgeConstants::Affine {
            bridge: AffineBridge::IDENTITY,
            fixed: Option::None,
        }),
        (
            AsymmetricAffine { scale: ss, zero_point: szp },
            AsymmetricAffine { scale: ds, zero_point: dzp },
        ) => {
            let b = affine_bridge(*ss, *szp, *ds, *dzp);
            let fixed = quantize_multiplier(f64::from(b.scale))?;
            Ok(BridgeConstants::Affine { bridge: b, fixed: Some(fixed) })
        }
        (
            AsymmetricPerChannel { scales, zero_points, .. },
            AsymmetricAffine { scale: ds, zero_point: dzp },
        ) => Ok(BridgeConstants::PerChannel(per_channel_bridge(
            scales,
            zero_points,
            *ds,
            *dzp,
        ))),
        (DynamicFixedPoint { fl: sfl }, DynamicFixedPoint { fl: dfl }) => {
            Ok(BridgeConstants::Dfp(dfp_bridge(*sfl, *dfl)?))
        }
        (s, d) => Err(Error::UnsupportedQuantizationPair {
            src: s.to_string(),
            dst: d.to_string(),
        }),
    }
}
