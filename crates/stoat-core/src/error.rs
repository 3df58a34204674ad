use crate::shape::Shape;

/// All errors that can occur while compiling an operation for dispatch.
///
/// Every failure mode in the compiler core is a variant here: bad shapes
/// reaching the grid planner, irreconcilable quantization schemes, rescale
/// constants that do not fit the hardware's bit width, missing kernel
/// variants, and binding-protocol violations. Using a single error type
/// across the workspace simplifies propagation.
///
/// All of these are graph-construction-time errors. A graph that produced
/// any of them is never handed to the execution queue.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A zero or inconsistent tensor extent reached the grid planner.
    #[error("invalid shape {shape}: {reason}")]
    InvalidShape { shape: Shape, reason: String },

    /// A quantization bridge was asked to reconcile incompatible schemes
    /// (e.g. a float tensor against an affine-quantized one).
    #[error("unsupported quantization pair: {src} -> {dst}")]
    UnsupportedQuantizationPair { src: String, dst: String },

    /// No representable (multiplier, shift) pair reproduces the required
    /// rescale within the hardware's bit width.
    #[error("rescale overflow: scale {scale} has no (m0 <= {max_multiplier}, shift <= {max_shift}) representation")]
    RescaleOverflow {
        scale: f64,
        max_multiplier: u32,
        max_shift: u32,
    },

    /// No registry entry matches the computed variant key. Names the
    /// operation and the key so the missing kernel can be diagnosed.
    #[error("unsupported kernel variant for {op}: key {key:#010x} not registered for backend {backend}")]
    UnsupportedKernelVariant {
        op: String,
        key: u32,
        backend: String,
    },

    /// The bind-input/bind-output protocol was violated: an output was
    /// bound before all required inputs, or a slot index is out of range.
    /// This is a programming-contract error, never tolerated silently.
    #[error("binding order violation on {op}: {reason}")]
    BindingOrderViolation { op: String, reason: String },

    /// A parameter-layout slot count does not match the bound tensor list.
    #[error("parameter arity mismatch for {op}: layout declares {declared}, got {got}")]
    ParamArityMismatch {
        op: String,
        declared: usize,
        got: usize,
    },

    /// Element count mismatch when reshaping a tensor spec.
    #[error("element count mismatch: shape {shape} requires {expected} elements, got {got}")]
    ElementCountMismatch {
        shape: Shape,
        expected: usize,
        got: usize,
    },

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }
}

/// Convenience Result type used throughout stoat.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}
