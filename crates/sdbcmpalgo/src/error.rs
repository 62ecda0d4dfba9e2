use sdbcmpcrypto::ContextId;
use thiserror::Error;

pub type CompareResult<T> = Result<T, CompareError>;

/// Errors raised by the comparison engine.
///
/// Everything except `Context` is a rejected call: it is detected on
/// plaintext metadata before any homomorphic operation runs, and retrying
/// with the same input fails again. `Context` carries a failure of the
/// evaluation context (exhausted depth budget, refusing oracle, ...)
/// unchanged.
#[derive(Debug, Error)]
pub enum CompareError {
    #[error("bit-vector length mismatch: left has {left} bits, right has {right}")]
    LengthMismatch { left: usize, right: usize },
    #[error("bit range [{min}, {max}) outside [0, {len}]")]
    RangeOutOfBounds { min: usize, max: usize, len: usize },
    #[error("operand bound to context {found:?}, call bound to {expected:?}")]
    ContextMismatch { expected: ContextId, found: ContextId },
    #[error("signed comparison needs at least one bit")]
    EmptySigned,
    #[error("bit extraction width must be at least 1")]
    ZeroWidth,
    #[error("normalization scale must be finite and positive, got {0}")]
    InvalidScale(f64),
    #[error("unknown comparison kind `{0}`")]
    UnknownKind(String),
    #[error(transparent)]
    Context(#[from] anyhow::Error),
}

impl CompareError {
    pub fn is_precondition(&self) -> bool {
        !matches!(self, CompareError::Context(_))
    }
}
