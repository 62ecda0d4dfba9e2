//! Suffix-equality builder.
//!
//! For operands of `n` bits the builder produces `S_i = eq[i, n)` for every
//! `i` in `[0, n]`: an encrypted 1 iff all bits at positions `i..n` match.
//! With least-significant-first vectors these are the "all higher bits
//! agree" flags the ordering circuit needs.
//!
//! `[start, end)` is split at its midpoint. The right half yields
//! `eq[i, end)` for its own positions, the left half yields `eq[i, mid)`,
//! and each left flag is lifted with one product by `eq[mid, end)`. That is
//! `O(n log n)` products at depth `O(log n)` instead of `O(n^2)`.
//!
//! Every range flag is stored in a memo table keyed by `(start, end)`. The
//! table belongs to one builder, and a builder belongs to one operand pair:
//! the operands are fixed at construction, so a stored flag can never be
//! served for different ciphertexts.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use sdbcmpcrypto::EvalContext;
use tracing::{debug, trace};

use crate::bits::{
    check_bound, check_pair, check_range, raw_eq_bits, raw_eq_bits_inverse, Bits, NegatedBits,
};
use crate::error::CompareResult;

/// Per-call cache of range-equality flags.
pub struct MemoTable<V> {
    entries: HashMap<(usize, usize), V>,
    hits: usize,
}

impl<V: Clone> MemoTable<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
        }
    }

    fn get(&mut self, key: (usize, usize)) -> Option<V> {
        let v = self.entries.get(&key).cloned();
        if v.is_some() {
            self.hits += 1;
        }
        v
    }

    // Entries are immutable: a second insert under the same key keeps the
    // first value.
    fn insert(&mut self, key: (usize, usize), v: V) -> V {
        match self.entries.entry(key) {
            Entry::Vacant(slot) => slot.insert(v).clone(),
            Entry::Occupied(slot) => {
                debug_assert!(false, "range {key:?} computed twice");
                slot.get().clone()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}

pub struct SuffixEqualityBuilder<'c, C: EvalContext> {
    ctx: &'c C,
    flags: Vec<C::Value>,
    memo: MemoTable<C::Value>,
}

impl<'c, C: EvalContext> SuffixEqualityBuilder<'c, C> {
    /// Builder for `a` against `b`, using direct per-bit equality.
    pub fn new(ctx: &'c C, a: &Bits<C::Value>, b: &Bits<C::Value>) -> CompareResult<Self> {
        check_pair(ctx, a.as_slice(), b.as_slice())?;
        let flags = raw_eq_bits(ctx, a.as_slice(), b.as_slice())?;
        Ok(Self::with_flags(ctx, flags))
    }

    /// Builder for `a` against the operand whose negation is `b_neg`.
    pub fn new_inverse(ctx: &'c C, a: &Bits<C::Value>, b_neg: &NegatedBits<C::Value>) -> CompareResult<Self> {
        check_pair(ctx, a.as_slice(), b_neg.as_slice())?;
        let flags = raw_eq_bits_inverse(ctx, a.as_slice(), b_neg.as_slice())?;
        Ok(Self::with_flags(ctx, flags))
    }

    /// Builder over per-bit equality flags computed elsewhere.
    pub fn from_flags(ctx: &'c C, flags: Vec<C::Value>) -> CompareResult<Self> {
        check_bound(ctx, &flags)?;
        Ok(Self::with_flags(ctx, flags))
    }

    fn with_flags(ctx: &'c C, flags: Vec<C::Value>) -> Self {
        Self {
            ctx,
            flags,
            memo: MemoTable::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn memo(&self) -> &MemoTable<C::Value> {
        &self.memo
    }

    /// Encrypted 1 iff the operands agree on every position in `[start, end)`.
    pub fn range_equals(&mut self, start: usize, end: usize) -> CompareResult<C::Value> {
        check_range(start, end, self.len())?;
        Ok(self.range(start, end)?)
    }

    /// `[S_0, S_1, ..., S_n]` where `S_i = eq[i, n)`; `S_n` is the encrypted
    /// constant 1.
    pub fn suffix_flags(&mut self) -> CompareResult<Vec<C::Value>> {
        let n = self.len();
        let mut out = if n == 0 { Vec::with_capacity(1) } else { self.suffixes(0, n)? };
        out.push(self.range(n, n)?);
        debug!(
            bits = n,
            memo_entries = self.memo.len(),
            memo_hits = self.memo.hits(),
            "suffix flags built"
        );
        Ok(out)
    }

    fn range(&mut self, start: usize, end: usize) -> anyhow::Result<C::Value> {
        if let Some(v) = self.memo.get((start, end)) {
            return Ok(v);
        }
        let v = match end - start {
            0 => self.ctx.encrypt_const(1)?,
            1 => self.flags[start].clone(),
            len => {
                let mid = start + len / 2;
                let left = self.range(start, mid)?;
                let right = self.range(mid, end)?;
                self.ctx.mul(&left, &right)?
            }
        };
        Ok(self.memo.insert((start, end), v))
    }

    // eq[i, end) for every i in [start, end); requires end > start.
    fn suffixes(&mut self, start: usize, end: usize) -> anyhow::Result<Vec<C::Value>> {
        if end - start == 1 {
            return Ok(vec![self.range(start, end)?]);
        }
        let mid = start + (end - start) / 2;
        let right = self.suffixes(mid, end)?;
        let left = self.suffixes(start, mid)?;
        let tail = right[0].clone();
        trace!(start, mid, end, "lifting left half");

        let mut out = Vec::with_capacity(end - start);
        for (offset, head) in left.iter().enumerate() {
            let key = (start + offset, end);
            let v = match self.memo.get(key) {
                Some(v) => v,
                None => {
                    let v = self.ctx.mul(head, &tail)?;
                    self.memo.insert(key, v)
                }
            };
            out.push(v);
        }
        out.extend(right);
        Ok(out)
    }
}
