//! sdbcmp-algo: equality, ordering and reciprocal circuits over encrypted
//! bit-vectors.
//!
//! Everything is generic over `sdbcmpcrypto::EvalContext`; the context is
//! passed explicitly to every call and every operand must be bound to it.
//! Bit-vectors are least-significant bit first.
//!
//! ```text
//! bits        per-bit equality, range equality, negation
//! suffix      memoized "bits [i, n) match" flags for one operand pair
//! compare     is_equal, bitwise_compare_optimized and friends
//! reciprocal  Newton iteration for 1/v, v in [0.5, 1.5)
//! ```

pub mod bits;
pub mod compare;
pub mod config;
pub mod error;
pub mod reciprocal;
pub mod suffix;

pub use bits::{
    bit_equals, bit_equals_inverse, encrypt_bits, eq_bits, eq_bits_inverse,
    eq_bits_pairs_inverse, negate, range_equals, range_equals_no_optimization, Bits, NegatedBits,
};
pub use compare::{
    bitwise_compare_optimized, compare, compare_all, compare_values, is_eq_bits_inverse,
    is_eq_bits_pairs_inverse, is_equal, is_equal_inverse, Comparator, ComparisonKind, EncTriSign,
};
pub use config::CompareConfig;
pub use error::{CompareError, CompareResult};
pub use reciprocal::{divide, error_bound, inverse, inverse_scaled, INPUT_RANGE};
pub use suffix::{MemoTable, SuffixEqualityBuilder};
