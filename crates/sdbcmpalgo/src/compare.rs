//! Equality and ordering of encrypted bit-vectors.
//!
//! Ordering against the negated operand `b' = 1 - b`, per position `i`:
//!
//! ```text
//! p_i  = a_i * b'_i                 a_i = 1, b_i = 0
//! lt_i = 1 - a_i - b'_i + p_i       a_i = 0, b_i = 1
//! eq_i = a_i + b'_i - 2 p_i         a_i = b_i
//! ```
//!
//! With `S_i` the suffix flags over `eq`, `a > b` is `sum_i p_i * S_{i+1}`:
//! the highest differing position decides. At most one term is 1, so the
//! sum is itself a bit.

use std::fmt;
use std::str::FromStr;

use sdbcmpcrypto::{ApproxContext, EvalContext};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bits::{
    check_bound, check_pair, eq_bits_pairs_inverse, negate, product_tree, range_equals,
    range_equals_no_optimization, raw_eq_bits_inverse, Bits, NegatedBits,
};
use crate::config::CompareConfig;
use crate::error::{CompareError, CompareResult};
use crate::reciprocal;
use crate::suffix::SuffixEqualityBuilder;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonKind {
    Equal,
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,
}

impl ComparisonKind {
    pub const ALL: [ComparisonKind; 5] = [
        ComparisonKind::Equal,
        ComparisonKind::Greater,
        ComparisonKind::Less,
        ComparisonKind::GreaterOrEqual,
        ComparisonKind::LessOrEqual,
    ];

    /// Whether `a == b` satisfies this kind.
    pub fn includes_equal(self) -> bool {
        matches!(
            self,
            ComparisonKind::Equal | ComparisonKind::GreaterOrEqual | ComparisonKind::LessOrEqual
        )
    }

    /// The same comparison on cleartexts.
    pub fn eval_plain<T: Ord>(self, a: T, b: T) -> bool {
        match self {
            ComparisonKind::Equal => a == b,
            ComparisonKind::Greater => a > b,
            ComparisonKind::Less => a < b,
            ComparisonKind::GreaterOrEqual => a >= b,
            ComparisonKind::LessOrEqual => a <= b,
        }
    }
}

impl FromStr for ComparisonKind {
    type Err = CompareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eq" | "equal" | "==" => Ok(ComparisonKind::Equal),
            "gt" | "greater" | ">" => Ok(ComparisonKind::Greater),
            "lt" | "less" | "<" => Ok(ComparisonKind::Less),
            "ge" | "greater_or_equal" | ">=" => Ok(ComparisonKind::GreaterOrEqual),
            "le" | "less_or_equal" | "<=" => Ok(ComparisonKind::LessOrEqual),
            _ => Err(CompareError::UnknownKind(s.to_string())),
        }
    }
}

impl fmt::Display for ComparisonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComparisonKind::Equal => "==",
            ComparisonKind::Greater => ">",
            ComparisonKind::Less => "<",
            ComparisonKind::GreaterOrEqual => ">=",
            ComparisonKind::LessOrEqual => "<=",
        };
        f.write_str(s)
    }
}

/// Encrypted three-way comparison result; exactly one field decrypts to 1.
#[derive(Clone, Debug)]
pub struct EncTriSign<V> {
    pub lt: V,
    pub eq: V,
    pub gt: V,
}

/// Encrypted 1 iff `a == b` on every position.
///
/// `use_optimization` picks the memoized product tree; otherwise the naive
/// fold. Both give the same answer.
pub fn is_equal<C: EvalContext>(
    ctx: &C,
    a: &Bits<C::Value>,
    b: &Bits<C::Value>,
    use_optimization: bool,
) -> CompareResult<C::Value> {
    debug!(bits = a.len(), use_optimization, "is_equal");
    if use_optimization {
        range_equals(ctx, a, b, 0, a.len())
    } else {
        range_equals_no_optimization(ctx, a, b, 0, a.len())
    }
}

/// Equality through the suffix builder over negated-operand flags.
pub fn is_eq_bits_inverse<C: EvalContext>(
    ctx: &C,
    a: &Bits<C::Value>,
    b_neg: &NegatedBits<C::Value>,
) -> CompareResult<C::Value> {
    let mut builder = SuffixEqualityBuilder::new_inverse(ctx, a, b_neg)?;
    builder.range_equals(0, a.len())
}

/// Equality as the product tree over pair flags.
pub fn is_eq_bits_pairs_inverse<C: EvalContext>(
    ctx: &C,
    a: &Bits<C::Value>,
    b_neg: &NegatedBits<C::Value>,
) -> CompareResult<C::Value> {
    let pairs = eq_bits_pairs_inverse(ctx, a, b_neg)?;
    Ok(product_tree(ctx, pairs)?)
}

pub fn is_equal_inverse<C: EvalContext>(
    ctx: &C,
    a: &Bits<C::Value>,
    b_neg: &NegatedBits<C::Value>,
    use_optimization: bool,
) -> CompareResult<C::Value> {
    debug!(bits = a.len(), use_optimization, "is_equal_inverse");
    if use_optimization {
        return is_eq_bits_pairs_inverse(ctx, a, b_neg);
    }
    check_pair(ctx, a.as_slice(), b_neg.as_slice())?;
    let mut flags = raw_eq_bits_inverse(ctx, a.as_slice(), b_neg.as_slice())?.into_iter();
    let Some(mut acc) = flags.next() else {
        return Ok(ctx.encrypt_const(1)?);
    };
    for f in flags {
        acc = ctx.mul(&acc, &f)?;
    }
    Ok(acc)
}

/// Encrypted result of `a <kind> b`, given `a` and the negation of `b`.
///
/// `is_signed` reads both operands as two's complement with the sign at
/// position `n - 1`. Only the sums `kind` needs are evaluated.
pub fn bitwise_compare_optimized<C: EvalContext>(
    ctx: &C,
    a: &Bits<C::Value>,
    b_neg: &NegatedBits<C::Value>,
    kind: ComparisonKind,
    is_signed: bool,
) -> CompareResult<C::Value> {
    check_pair(ctx, a.as_slice(), b_neg.as_slice())?;
    if is_signed && a.is_empty() {
        return Err(CompareError::EmptySigned);
    }
    debug!(bits = a.len(), %kind, is_signed, "bitwise compare");

    let want_greater = match kind {
        // no products a_i * b'_i needed
        ComparisonKind::Equal => return is_eq_bits_inverse(ctx, a, b_neg),
        ComparisonKind::Greater | ComparisonKind::GreaterOrEqual => true,
        ComparisonKind::Less | ComparisonKind::LessOrEqual => false,
    };
    let (products, mut builder) = position_flags(ctx, a, b_neg)?;
    let suffix = builder.suffix_flags()?;
    let strict = order_sum(ctx, a, b_neg, &products, &suffix, want_greater, is_signed)?;
    if kind.includes_equal() {
        // disjoint events, so the sum stays a bit
        Ok(ctx.add(&strict, &suffix[0])?)
    } else {
        Ok(strict)
    }
}

/// All three outcomes from one suffix computation.
pub fn compare_all<C: EvalContext>(
    ctx: &C,
    a: &Bits<C::Value>,
    b_neg: &NegatedBits<C::Value>,
    is_signed: bool,
) -> CompareResult<EncTriSign<C::Value>> {
    check_pair(ctx, a.as_slice(), b_neg.as_slice())?;
    if is_signed && a.is_empty() {
        return Err(CompareError::EmptySigned);
    }
    debug!(bits = a.len(), is_signed, "three-way compare");

    let (products, mut builder) = position_flags(ctx, a, b_neg)?;
    let suffix = builder.suffix_flags()?;
    let gt = order_sum(ctx, a, b_neg, &products, &suffix, true, is_signed)?;
    let eq = suffix[0].clone();
    // exactly one of the three is 1
    let lt = ctx.sub(&ctx.one_minus(&eq)?, &gt)?;
    Ok(EncTriSign { lt, eq, gt })
}

/// `a <kind> b` for two plain bit-vectors.
pub fn compare<C: EvalContext>(
    ctx: &C,
    a: &Bits<C::Value>,
    b: &Bits<C::Value>,
    kind: ComparisonKind,
    is_signed: bool,
) -> CompareResult<C::Value> {
    check_pair(ctx, a.as_slice(), b.as_slice())?;
    let b_neg = negate(ctx, b)?;
    bitwise_compare_optimized(ctx, a, &b_neg, kind, is_signed)
}

/// `x <kind> y` for two encrypted integers, decomposed into `width` bits by
/// the context.
pub fn compare_values<C: EvalContext>(
    ctx: &C,
    x: &C::Value,
    y: &C::Value,
    width: usize,
    kind: ComparisonKind,
    is_signed: bool,
) -> CompareResult<C::Value> {
    if width == 0 {
        return Err(CompareError::ZeroWidth);
    }
    check_bound(ctx, std::slice::from_ref(x))?;
    check_bound(ctx, std::slice::from_ref(y))?;
    let a = Bits::new(ctx.extract_bits(x, width)?);
    let b = Bits::new(ctx.extract_bits(y, width)?);
    compare(ctx, &a, &b, kind, is_signed)
}

// Products a_i * b'_i and a builder over the matching equality flags.
fn position_flags<'c, C: EvalContext>(
    ctx: &'c C,
    a: &Bits<C::Value>,
    b_neg: &NegatedBits<C::Value>,
) -> CompareResult<(Vec<C::Value>, SuffixEqualityBuilder<'c, C>)> {
    let mut products = Vec::with_capacity(a.len());
    let mut eq = Vec::with_capacity(a.len());
    for (x, y) in a.as_slice().iter().zip(b_neg.as_slice()) {
        let p = ctx.mul(x, y)?;
        let sum = ctx.add(x, y)?;
        let twop = ctx.mul_plain(&p, -2)?;
        eq.push(ctx.add(&sum, &twop)?);
        products.push(p);
    }
    let builder = SuffixEqualityBuilder::from_flags(ctx, eq)?;
    Ok((products, builder))
}

fn order_sum<C: EvalContext>(
    ctx: &C,
    a: &Bits<C::Value>,
    b_neg: &NegatedBits<C::Value>,
    products: &[C::Value],
    suffix: &[C::Value],
    want_greater: bool,
    is_signed: bool,
) -> anyhow::Result<C::Value> {
    let (a, b_neg) = (a.as_slice(), b_neg.as_slice());
    let n = a.len();
    let mut acc: Option<C::Value> = None;
    for i in 0..n {
        // a 1 in the sign bit makes the number smaller
        let greater_here = want_greater ^ (is_signed && i == n - 1);
        let flag = if greater_here {
            products[i].clone()
        } else {
            let t = ctx.one_minus(&a[i])?;
            let t = ctx.sub(&t, &b_neg[i])?;
            ctx.add(&t, &products[i])?
        };
        // S_n is 1
        let term = if i + 1 == n {
            flag
        } else {
            ctx.mul(&flag, &suffix[i + 1])?
        };
        acc = Some(match acc {
            None => term,
            Some(s) => ctx.add(&s, &term)?,
        });
    }
    match acc {
        Some(v) => Ok(v),
        None => ctx.encrypt_const(0),
    }
}

/// Comparison entry points with widths and modes taken from a
/// `CompareConfig`.
pub struct Comparator<'c, C> {
    ctx: &'c C,
    config: CompareConfig,
}

impl<'c, C: EvalContext> Comparator<'c, C> {
    pub fn new(ctx: &'c C, config: CompareConfig) -> CompareResult<Self> {
        config.validate()?;
        Ok(Self { ctx, config })
    }

    pub fn config(&self) -> &CompareConfig {
        &self.config
    }

    pub fn equal(&self, a: &Bits<C::Value>, b: &Bits<C::Value>) -> CompareResult<C::Value> {
        is_equal(self.ctx, a, b, self.config.use_optimization)
    }

    pub fn compare(
        &self,
        a: &Bits<C::Value>,
        b: &Bits<C::Value>,
        kind: ComparisonKind,
    ) -> CompareResult<C::Value> {
        compare(self.ctx, a, b, kind, self.config.signed)
    }

    pub fn compare_values(
        &self,
        x: &C::Value,
        y: &C::Value,
        kind: ComparisonKind,
    ) -> CompareResult<C::Value> {
        compare_values(self.ctx, x, y, self.config.bit_width, kind, self.config.signed)
    }
}

impl<'c, C: ApproxContext> Comparator<'c, C> {
    pub fn reciprocal(&self, v: &C::Value) -> CompareResult<C::Value> {
        reciprocal::inverse(self.ctx, v, self.config.reciprocal_iterations)
    }

    pub fn divide(&self, num: &C::Value, den: &C::Value) -> CompareResult<C::Value> {
        reciprocal::divide(self.ctx, num, den, self.config.reciprocal_iterations)
    }
}
