//! Newton reciprocal.
//!
//! `x_{k+1} = x_k (2 - v x_k)` from `x_0 = 1`. With `e_k = 1 - v x_k` every
//! step squares the error, `e_{k+1} = e_k^2`, so for `v` in `[0.5, 1.5)`
//! after `k` steps `|x_k - 1/v| = |e_0|^(2^k) / v <= 2 * 2^(-2^k)`.
//!
//! Nothing here can look at `v`: an input outside the interval silently
//! produces garbage.

use std::ops::Range;

use sdbcmpcrypto::ApproxContext;
use tracing::debug;

use crate::bits::check_bound;
use crate::error::{CompareError, CompareResult};

/// Inputs for which `error_bound` holds: closed at 0.5, open at 1.5.
pub const INPUT_RANGE: Range<f64> = 0.5..1.5;

/// Worst-case `|inverse(v, k) - 1/v|` over `INPUT_RANGE`.
pub fn error_bound(iterations: u32) -> f64 {
    2.0 * 0.5f64.powf(2f64.powf(iterations as f64))
}

/// Approximate `1 / v` with `iterations` Newton steps. Each step after the
/// first costs two products and two levels of depth.
pub fn inverse<C: ApproxContext>(ctx: &C, v: &C::Value, iterations: u32) -> CompareResult<C::Value> {
    check_bound(ctx, std::slice::from_ref(v))?;
    debug!(iterations, bound = error_bound(iterations), "newton reciprocal");
    if iterations == 0 {
        return Ok(ctx.encrypt_real(1.0)?);
    }
    // x_1 = 2 - v
    let mut x = two_minus(ctx, v)?;
    for _ in 1..iterations {
        let vx = ctx.mul(v, &x)?;
        let step = two_minus(ctx, &vx)?;
        x = ctx.mul(&x, &step)?;
    }
    Ok(x)
}

/// `num / den` as `num * inverse(den)`; `den` must lie in `INPUT_RANGE`.
pub fn divide<C: ApproxContext>(
    ctx: &C,
    num: &C::Value,
    den: &C::Value,
    iterations: u32,
) -> CompareResult<C::Value> {
    check_bound(ctx, std::slice::from_ref(num))?;
    let r = inverse(ctx, den, iterations)?;
    Ok(ctx.mul(num, &r)?)
}

/// `1 / v` for `v / scale` in `INPUT_RANGE`: normalize by the public
/// `scale`, invert, and undo the scaling.
pub fn inverse_scaled<C: ApproxContext>(
    ctx: &C,
    v: &C::Value,
    scale: f64,
    iterations: u32,
) -> CompareResult<C::Value> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(CompareError::InvalidScale(scale));
    }
    check_bound(ctx, std::slice::from_ref(v))?;
    let normalized = ctx.mul_real(v, scale.recip())?;
    let r = inverse(ctx, &normalized, iterations)?;
    Ok(ctx.mul_real(&r, scale.recip())?)
}

fn two_minus<C: ApproxContext>(ctx: &C, v: &C::Value) -> anyhow::Result<C::Value> {
    let neg = ctx.mul_plain(v, -1)?;
    ctx.add_plain(&neg, 2)
}
