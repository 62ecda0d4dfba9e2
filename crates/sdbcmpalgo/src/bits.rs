//! Bit-level primitives: encrypted bit vectors, single-bit equality and
//! range equality.
//!
//! Bit vectors are least-significant bit first. Equality of two encrypted
//! bits is `1 - (a xor b)` with `a xor b = a + b - 2ab`, one multiplication.
//! Against a negated operand `b' = 1 - b` the flag is simply `a xor b'`,
//! which saves the constant.

use sdbcmpcrypto::{Bound, EvalContext};
use tracing::trace;

use crate::error::{CompareError, CompareResult};
use crate::suffix::SuffixEqualityBuilder;

/// Encrypted bits of one operand, least-significant first.
#[derive(Clone, Debug)]
pub struct Bits<V>(Vec<V>);

/// Encrypted bits of one operand with every bit replaced by `1 - bit`.
#[derive(Clone, Debug)]
pub struct NegatedBits<V>(Vec<V>);

impl<V> Bits<V> {
    pub fn new(bits: Vec<V>) -> Self {
        Self(bits)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[V] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<V> {
        self.0
    }
}

impl<V> NegatedBits<V> {
    /// Wrap bits the caller has already negated.
    pub fn new(negated: Vec<V>) -> Self {
        Self(negated)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[V] {
        &self.0
    }
}

/// Encrypt the `width` low bits of `value` (two's complement), one fresh
/// encryption per bit.
pub fn encrypt_bits<C: EvalContext>(ctx: &C, value: i64, width: usize) -> CompareResult<Bits<C::Value>> {
    if width == 0 {
        return Err(CompareError::ZeroWidth);
    }
    let bits = (0..width)
        .map(|i| {
            let bit = if i < 64 { (value >> i) & 1 } else { (value >> 63) & 1 };
            ctx.encrypt_const(bit)
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Bits::new(bits))
}

/// Homomorphic negation, `1 - bit` per position. Plaintext operations only.
pub fn negate<C: EvalContext>(ctx: &C, bits: &Bits<C::Value>) -> CompareResult<NegatedBits<C::Value>> {
    check_bound(ctx, bits.as_slice())?;
    let negated = bits
        .as_slice()
        .iter()
        .map(|b| ctx.one_minus(b))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(NegatedBits(negated))
}

// ---------------- precondition checks ----------------

pub(crate) fn check_same_len(left: usize, right: usize) -> CompareResult<()> {
    if left != right {
        return Err(CompareError::LengthMismatch { left, right });
    }
    Ok(())
}

pub(crate) fn check_range(min: usize, max: usize, len: usize) -> CompareResult<()> {
    if min > max || max > len {
        return Err(CompareError::RangeOutOfBounds { min, max, len });
    }
    Ok(())
}

pub(crate) fn check_bound<C: EvalContext>(ctx: &C, values: &[C::Value]) -> CompareResult<()> {
    let expected = ctx.id();
    match values.iter().find(|v| v.context_id() != expected) {
        Some(v) => Err(CompareError::ContextMismatch {
            expected,
            found: v.context_id(),
        }),
        None => Ok(()),
    }
}

pub(crate) fn check_pair<C: EvalContext>(ctx: &C, a: &[C::Value], b: &[C::Value]) -> CompareResult<()> {
    check_same_len(a.len(), b.len())?;
    check_bound(ctx, a)?;
    check_bound(ctx, b)
}

// ---------------- gates ----------------

pub(crate) fn bool_xor<C: EvalContext>(ctx: &C, a: &C::Value, b: &C::Value) -> anyhow::Result<C::Value> {
    let ab = ctx.mul(a, b)?;
    let twoab = ctx.mul_plain(&ab, -2)?;
    let sum = ctx.add(a, b)?;
    ctx.add(&sum, &twoab)
}

/// Balanced product of `flags`; depth `ceil(log2(len))`. Empty input is the
/// encrypted constant 1.
pub(crate) fn product_tree<C: EvalContext>(ctx: &C, mut flags: Vec<C::Value>) -> anyhow::Result<C::Value> {
    if flags.is_empty() {
        return ctx.encrypt_const(1);
    }
    while flags.len() > 1 {
        let mut next = Vec::with_capacity((flags.len() + 1) / 2);
        let mut it = flags.into_iter();
        while let Some(x) = it.next() {
            match it.next() {
                Some(y) => next.push(ctx.mul(&x, &y)?),
                None => next.push(x),
            }
        }
        flags = next;
    }
    Ok(flags.remove(0))
}

// ---------------- bit comparator ----------------

/// Encrypted 1 iff the two encrypted bits are equal.
pub fn bit_equals<C: EvalContext>(ctx: &C, a: &C::Value, b: &C::Value) -> CompareResult<C::Value> {
    check_bound(ctx, std::slice::from_ref(a))?;
    check_bound(ctx, std::slice::from_ref(b))?;
    Ok(raw_bit_equals(ctx, a, b)?)
}

/// Encrypted 1 iff `a` equals the bit whose negation is `b_neg`.
pub fn bit_equals_inverse<C: EvalContext>(ctx: &C, a: &C::Value, b_neg: &C::Value) -> CompareResult<C::Value> {
    check_bound(ctx, std::slice::from_ref(a))?;
    check_bound(ctx, std::slice::from_ref(b_neg))?;
    Ok(bool_xor(ctx, a, b_neg)?)
}

pub(crate) fn raw_bit_equals<C: EvalContext>(ctx: &C, a: &C::Value, b: &C::Value) -> anyhow::Result<C::Value> {
    let x = bool_xor(ctx, a, b)?;
    ctx.one_minus(&x)
}

/// Per-position equality flags.
pub fn eq_bits<C: EvalContext>(
    ctx: &C,
    a: &Bits<C::Value>,
    b: &Bits<C::Value>,
) -> CompareResult<Vec<C::Value>> {
    check_pair(ctx, a.as_slice(), b.as_slice())?;
    Ok(raw_eq_bits(ctx, a.as_slice(), b.as_slice())?)
}

/// Per-position equality flags against a negated operand.
pub fn eq_bits_inverse<C: EvalContext>(
    ctx: &C,
    a: &Bits<C::Value>,
    b_neg: &NegatedBits<C::Value>,
) -> CompareResult<Vec<C::Value>> {
    check_pair(ctx, a.as_slice(), b_neg.as_slice())?;
    Ok(raw_eq_bits_inverse(ctx, a.as_slice(), b_neg.as_slice())?)
}

/// Equality flags of adjacent position pairs `(2j, 2j+1)` against a negated
/// operand; an odd trailing position is passed through on its own. This is
/// the first level of the equality product tree.
pub fn eq_bits_pairs_inverse<C: EvalContext>(
    ctx: &C,
    a: &Bits<C::Value>,
    b_neg: &NegatedBits<C::Value>,
) -> CompareResult<Vec<C::Value>> {
    let flags = eq_bits_inverse(ctx, a, b_neg)?;
    let mut pairs = Vec::with_capacity((flags.len() + 1) / 2);
    for chunk in flags.chunks(2) {
        match chunk {
            [lo, hi] => pairs.push(ctx.mul(lo, hi)?),
            [single] => pairs.push(single.clone()),
            _ => unreachable!("chunks(2) yields one or two elements"),
        }
    }
    Ok(pairs)
}

pub(crate) fn raw_eq_bits<C: EvalContext>(ctx: &C, a: &[C::Value], b: &[C::Value]) -> anyhow::Result<Vec<C::Value>> {
    a.iter().zip(b).map(|(x, y)| raw_bit_equals(ctx, x, y)).collect()
}

pub(crate) fn raw_eq_bits_inverse<C: EvalContext>(
    ctx: &C,
    a: &[C::Value],
    b_neg: &[C::Value],
) -> anyhow::Result<Vec<C::Value>> {
    a.iter().zip(b_neg).map(|(x, y)| bool_xor(ctx, x, y)).collect()
}

/// Encrypted 1 iff `a[i] == b[i]` for every `i` in `[min, max)`.
///
/// Product tree over the per-bit flags through a memoized builder; depth
/// `ceil(log2(max - min)) + 1`.
pub fn range_equals<C: EvalContext>(
    ctx: &C,
    a: &Bits<C::Value>,
    b: &Bits<C::Value>,
    min: usize,
    max: usize,
) -> CompareResult<C::Value> {
    check_range(min, max, a.len())?;
    let mut builder = SuffixEqualityBuilder::new(ctx, a, b)?;
    builder.range_equals(min, max)
}

/// Naive baseline for `range_equals`: a left-to-right fold, one product
/// per position and depth `max - min`. Kept as a correctness oracle and cost
/// reference.
pub fn range_equals_no_optimization<C: EvalContext>(
    ctx: &C,
    a: &Bits<C::Value>,
    b: &Bits<C::Value>,
    min: usize,
    max: usize,
) -> CompareResult<C::Value> {
    check_pair(ctx, a.as_slice(), b.as_slice())?;
    check_range(min, max, a.len())?;
    trace!(min, max, "naive range equality");
    if min == max {
        return Ok(ctx.encrypt_const(1)?);
    }
    let (a, b) = (a.as_slice(), b.as_slice());
    let mut acc = raw_bit_equals(ctx, &a[min], &b[min])?;
    for i in min + 1..max {
        let e = raw_bit_equals(ctx, &a[i], &b[i])?;
        acc = ctx.mul(&acc, &e)?;
    }
    Ok(acc)
}
